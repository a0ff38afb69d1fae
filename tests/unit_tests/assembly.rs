use crate::unit_tests::{constant_action, library_error, source_action};
use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::{DMatrix, DMatrixViewMut, DVector, DVectorView, DVectorViewMut};
use weakform::action::{FunctionAction, MatrixAction, QpInfo, ScalingAction};
use weakform::assembly::{
    AssemblyRegions, BilinearForm, BlockSystem, ItemIntegrator, LinearForm, NonlinearForm, QuadratureOrder,
    TrilinearForm,
};
use weakform::element::FEType::*;
use weakform::error::Error;
use weakform::evaluate::DiffOperator::*;
use weakform::geometry::ReferenceGeometry::Triangle;
use weakform::mesh::procedural::{create_reference_mesh, create_unit_square_uniform_tri_mesh_2d};
use weakform::mesh::ItemKind;
use weakform::space::{FESpace, FEVector};

fn reference_stiffness() -> DMatrix<f64> {
    DMatrix::from_row_slice(3, 3, &[1.0, -0.5, -0.5, -0.5, 0.5, 0.0, -0.5, 0.0, 0.5])
}

fn reference_mass() -> DMatrix<f64> {
    DMatrix::from_row_slice(3, 3, &[2.0, 1.0, 1.0, 1.0, 2.0, 1.0, 1.0, 1.0, 2.0]) / 24.0
}

#[test]
fn reference_triangle_stiffness_matrix() {
    let mesh = create_reference_mesh::<f64>(Triangle).unwrap();
    let space = FESpace::new(&mesh, H1P1 { ncomponents: 1 }).unwrap();
    let identity = ScalingAction::identity(2);

    let form = BilinearForm::new(&space, Gradient, &space, Gradient, &identity);
    assert!(form.uses_symmetric_path());
    let symmetric = DMatrix::from(&form.assemble_csr().unwrap());
    assert_matrix_eq!(symmetric, reference_stiffness(), comp = abs, tol = 1e-14);

    let form = form.with_symmetry(false);
    assert!(!form.uses_symmetric_path());
    let general = DMatrix::from(&form.assemble_csr().unwrap());
    assert_matrix_eq!(general, symmetric, comp = abs, tol = 1e-14);
}

#[test]
fn reference_triangle_mass_matrix() {
    let mesh = create_reference_mesh::<f64>(Triangle).unwrap();
    let space = FESpace::new(&mesh, H1P1 { ncomponents: 1 }).unwrap();
    let identity = ScalingAction::identity(1);
    let mass = BilinearForm::new(&space, Identity, &space, Identity, &identity)
        .assemble_csr()
        .unwrap();
    assert_matrix_eq!(DMatrix::from(&mass), reference_mass(), comp = abs, tol = 1e-14);
}

#[test]
fn test_space_determines_rows() {
    let mesh = create_reference_mesh::<f64>(Triangle).unwrap();
    let constants = FESpace::new(&mesh, L2P0 { ncomponents: 1 }).unwrap();
    let linears = FESpace::new(&mesh, H1P1 { ncomponents: 1 }).unwrap();
    let identity = ScalingAction::identity(1);
    let matrix = BilinearForm::new(&constants, Identity, &linears, Identity, &identity)
        .assemble_csr()
        .unwrap();
    assert_eq!((matrix.nrows(), matrix.ncols()), (1, 3));
    assert_matrix_eq!(
        DMatrix::from(&matrix),
        DMatrix::from_element(1, 3, 1.0 / 6.0),
        comp = abs,
        tol = 1e-14
    );
}

#[test]
fn transposed_copy_mirrors_the_local_matrices() {
    let mesh = create_unit_square_uniform_tri_mesh_2d::<f64>(2).unwrap();
    let velocity = FESpace::new(&mesh, H1P1 { ncomponents: 2 }).unwrap();
    let pressure = FESpace::new(&mesh, L2P0 { ncomponents: 1 }).unwrap();
    let identity = ScalingAction::identity(1);
    let form = BilinearForm::new(&pressure, Identity, &velocity, Divergence, &identity);
    let mut system = BlockSystem::new(&[velocity.ndofs(), pressure.ndofs()]);
    form.assemble_into(&mut system, 1, 0, true).unwrap();

    let lower = system.matrix_block(1, 0).unwrap();
    let upper = system.matrix_block(0, 1).unwrap();
    assert_eq!(upper.transpose(), lower);
    assert_eq!(system.matrix_block(0, 0).unwrap().nnz(), 0);
}

#[test]
fn constant_source_distributes_the_cell_area() {
    let mesh = create_reference_mesh::<f64>(Triangle).unwrap();
    let space = FESpace::new(&mesh, H1P1 { ncomponents: 1 }).unwrap();
    let source = constant_action(1.0, 1);
    let rhs = LinearForm::new(&space, Identity, &source)
        .assemble_vector()
        .unwrap();
    assert_matrix_eq!(rhs, DVector::from_element(3, 1.0 / 6.0), comp = abs, tol = 1e-14);

    let doubled = LinearForm::new(&space, Identity, &source)
        .with_factor(2.0)
        .assemble_vector()
        .unwrap();
    assert_matrix_eq!(doubled, DVector::from_element(3, 1.0 / 3.0), comp = abs, tol = 1e-14);
}

#[test]
fn position_dependent_source() {
    let mesh = create_reference_mesh::<f64>(Triangle).unwrap();
    let space = FESpace::new(&mesh, H1P1 { ncomponents: 1 }).unwrap();
    let source = source_action(1, 1, |x| x[0]);
    let rhs = LinearForm::new(&space, Identity, &source)
        .assemble_vector()
        .unwrap();
    let expected = DVector::from_column_slice(&[1.0 / 24.0, 1.0 / 12.0, 1.0 / 24.0]);
    assert_matrix_eq!(rhs, expected, comp = abs, tol = 1e-14);
}

fn time_source(result: &mut DVectorViewMut<f64>, _: &DVectorView<f64>, info: &QpInfo<f64>) {
    result[0] = info.time;
}

#[test]
fn time_dependent_source_reads_the_assembly_time() {
    let mesh = create_reference_mesh::<f64>(Triangle).unwrap();
    let space = FESpace::new(&mesh, L2P0 { ncomponents: 1 }).unwrap();
    let source = FunctionAction::new(0, 1, time_source).with_time_dependence();
    let rhs = LinearForm::new(&space, Identity, &source)
        .with_time(3.0)
        .assemble_vector()
        .unwrap();
    assert_scalar_eq!(rhs[0], 1.5, comp = abs, tol = 1e-14);
}

#[test]
fn linear_form_with_argument_applies_the_mass_matrix() {
    let mesh = create_unit_square_uniform_tri_mesh_2d::<f64>(2).unwrap();
    let space = FESpace::new(&mesh, H1P1 { ncomponents: 1 }).unwrap();
    let identity = ScalingAction::identity(1);
    let coefficients = DVector::from_fn(space.ndofs(), |i, _| (i as f64).sin());
    let u = FEVector::from_coefficients(&space, coefficients.clone()).unwrap();

    let rhs = LinearForm::new(&space, Identity, &identity)
        .with_argument(&u, Identity)
        .assemble_vector()
        .unwrap();
    let mass = BilinearForm::new(&space, Identity, &space, Identity, &identity)
        .assemble_csr()
        .unwrap();
    assert_matrix_eq!(rhs, &mass * &coefficients, comp = abs, tol = 1e-14);
}

#[test]
fn boundary_mass_is_restricted_to_regions() {
    let mesh = create_unit_square_uniform_tri_mesh_2d::<f64>(3).unwrap();
    let space = FESpace::new(&mesh, H1P1 { ncomponents: 1 }).unwrap();
    let identity = ScalingAction::identity(1);

    let total = |regions: AssemblyRegions| {
        let matrix = BilinearForm::new(&space, Identity, &space, Identity, &identity)
            .with_regions(regions)
            .assemble_csr()
            .unwrap();
        matrix.values().iter().sum::<f64>()
    };
    assert_scalar_eq!(total(AssemblyRegions::boundary_faces()), 4.0, comp = abs, tol = 1e-13);
    assert_scalar_eq!(
        total(AssemblyRegions::boundary_faces().with_regions([1])),
        1.0,
        comp = abs,
        tol = 1e-13
    );
    assert_scalar_eq!(
        total(AssemblyRegions::boundary_faces().with_regions([2, 4])),
        2.0,
        comp = abs,
        tol = 1e-13
    );
}

#[test]
fn assembly_regions_select_items() {
    let mesh = create_unit_square_uniform_tri_mesh_2d::<f64>(2).unwrap();
    assert_eq!(AssemblyRegions::default(), AssemblyRegions::cells());
    assert_eq!(AssemblyRegions::cells().items(&mesh), (0..8).collect::<Vec<_>>());
    assert_eq!(AssemblyRegions::faces().items(&mesh).len(), 16);
    assert_eq!(AssemblyRegions::boundary_faces().items(&mesh).len(), 8);
    assert_eq!(AssemblyRegions::boundary_faces().kind(), ItemKind::BoundaryFaces);

    let bottom = AssemblyRegions::boundary_faces()
        .with_regions([1])
        .items(&mesh);
    assert_eq!(bottom.len(), 2);
    assert!(bottom.iter().all(|&face| mesh.face_region(face) == 1));
    assert!(bottom.windows(2).all(|pair| pair[0] < pair[1]));
}

#[test]
fn quadrature_order_resolution() {
    let mesh = create_reference_mesh::<f64>(Triangle).unwrap();
    let p2 = FESpace::new(&mesh, H1P2 { ncomponents: 1 }).unwrap();
    let p0 = FESpace::new(&mesh, L2P0 { ncomponents: 1 }).unwrap();
    assert_eq!(QuadratureOrder::Auto.resolve(0, &[(&p2, Gradient), (&p2, Gradient)]), 2);
    assert_eq!(QuadratureOrder::Auto.resolve(1, &[(&p2, Identity), (&p0, Identity)]), 3);
    assert_eq!(QuadratureOrder::Auto.resolve(0, &[(&p0, Gradient)]), 0);
    assert_eq!(QuadratureOrder::Exact(5).resolve(0, &[(&p2, Identity)]), 5);

    let identity = ScalingAction::identity(1);
    let form = BilinearForm::new(&p2, Identity, &p2, Identity, &identity)
        .with_quadrature_order(QuadratureOrder::Exact(7));
    assert_eq!(form.quadrature_order(), 7);
}

#[test]
fn action_output_must_match_the_test_operator() {
    let mesh = create_reference_mesh::<f64>(Triangle).unwrap();
    let space = FESpace::new(&mesh, H1P1 { ncomponents: 1 }).unwrap();
    let scalar = ScalingAction::identity(1);
    let form = BilinearForm::new(&space, Gradient, &space, Gradient, &scalar);
    assert_eq!(
        form.validate(),
        Err(Error::ActionLengthMismatch {
            declared: 1,
            required: 2
        })
    );
    let report = form.assemble_csr().unwrap_err();
    assert_eq!(
        library_error(&report),
        &Error::ActionLengthMismatch {
            declared: 1,
            required: 2
        }
    );
}

#[test]
fn action_input_must_match_the_trial_operator() {
    let mesh = create_reference_mesh::<f64>(Triangle).unwrap();
    let space = FESpace::new(&mesh, H1P1 { ncomponents: 1 }).unwrap();
    let action = MatrixAction::new(DMatrix::from_row_slice(1, 3, &[1.0, 0.0, 0.0]));
    let report = BilinearForm::new(&space, Identity, &space, Gradient, &action)
        .assemble_csr()
        .unwrap_err();
    assert_eq!(
        library_error(&report),
        &Error::ActionInputMismatch {
            expected: 3,
            provided: 2
        }
    );

    let source = constant_action(1.0, 1);
    let u = FEVector::zeros(&space);
    let report = LinearForm::new(&space, Identity, &source)
        .with_argument(&u, Identity)
        .assemble_vector()
        .unwrap_err();
    assert_eq!(
        library_error(&report),
        &Error::ActionInputMismatch {
            expected: 0,
            provided: 1
        }
    );
}

fn convection(result: &mut DVectorViewMut<f64>, input: &DVectorView<f64>, _: &QpInfo<f64>) {
    // Input: velocity (2 values) followed by the trial gradient (2 values)
    result[0] = input[0] * input[2] + input[1] * input[3];
}

#[test]
fn trilinear_form_with_constant_velocity_matches_bilinear_convection() {
    let mesh = create_unit_square_uniform_tri_mesh_2d::<f64>(2).unwrap();
    let space = FESpace::new(&mesh, H1P1 { ncomponents: 1 }).unwrap();
    let velocity_space = FESpace::new(&mesh, H1P1 { ncomponents: 2 }).unwrap();
    let n = mesh.num_nodes();
    // Component blocks: x-velocity 1, y-velocity 0
    let coefficients = DVector::from_fn(2 * n, |i, _| if i < n { 1.0 } else { 0.0 });
    let velocity = FEVector::from_coefficients(&velocity_space, coefficients).unwrap();

    let action = FunctionAction::new(4, 1, convection).with_degree(1);
    let form = TrilinearForm::new(&space, Identity, &space, Gradient, &velocity, Identity, &action);
    let mut system = BlockSystem::new(&[space.ndofs()]);
    form.assemble_into(&mut system, 0, 0).unwrap();

    let derivative_x = MatrixAction::new(DMatrix::from_row_slice(1, 2, &[1.0, 0.0]));
    let expected = BilinearForm::new(&space, Identity, &space, Gradient, &derivative_x)
        .with_quadrature_order(QuadratureOrder::Exact(form.quadrature_order()))
        .assemble_csr()
        .unwrap();
    assert_matrix_eq!(
        DMatrix::from(&system.matrix_block(0, 0).unwrap()),
        DMatrix::from(&expected),
        comp = abs,
        tol = 1e-14
    );
}

fn square(result: &mut DVectorViewMut<f64>, input: &DVectorView<f64>, _: &QpInfo<f64>) {
    result[0] = input[0] * input[0];
}

fn square_derivative(mut jacobian: DMatrixViewMut<f64>, input: &DVectorView<f64>, _: &QpInfo<f64>) {
    jacobian[(0, 0)] = 2.0 * input[0];
}

#[test]
fn newton_linearization_of_a_quadratic_reaction() {
    let mesh = create_reference_mesh::<f64>(Triangle).unwrap();
    let space = FESpace::new(&mesh, H1P1 { ncomponents: 1 }).unwrap();
    let c = 3.0;
    let iterate = FEVector::from_coefficients(&space, DVector::from_element(3, c)).unwrap();
    let action = FunctionAction::new(1, 1, square)
        .with_degree(1)
        .with_jacobian(square_derivative);

    let form = NonlinearForm::new(&space, Identity, &iterate, vec![Identity], &action);
    let mut system = BlockSystem::new(&[3]);
    form.assemble_into(&mut system, 0, 0).unwrap();

    // DA(u) = 2c, and DA(u) u - A(u) = c^2
    let matrix = DMatrix::from(&system.matrix_block(0, 0).unwrap());
    assert_matrix_eq!(matrix, reference_mass() * (2.0 * c), comp = abs, tol = 1e-13);
    assert_matrix_eq!(
        system.rhs().clone(),
        DVector::from_element(3, c * c / 6.0),
        comp = abs,
        tol = 1e-13
    );
}

#[test]
fn linear_action_linearizes_to_the_bilinear_form() {
    let mesh = create_unit_square_uniform_tri_mesh_2d::<f64>(2).unwrap();
    let space = FESpace::new(&mesh, H1P1 { ncomponents: 1 }).unwrap();
    let coefficients = DVector::from_fn(space.ndofs(), |i, _| 0.1 * i as f64);
    let iterate = FEVector::from_coefficients(&space, coefficients).unwrap();
    let identity = ScalingAction::identity(2);

    let mut system = BlockSystem::new(&[space.ndofs()]);
    NonlinearForm::new(&space, Gradient, &iterate, vec![Gradient], &identity)
        .assemble_into(&mut system, 0, 0)
        .unwrap();
    let stiffness = BilinearForm::new(&space, Gradient, &space, Gradient, &identity)
        .assemble_csr()
        .unwrap();

    assert_matrix_eq!(
        DMatrix::from(&system.matrix_block(0, 0).unwrap()),
        DMatrix::from(&stiffness),
        comp = abs,
        tol = 1e-14
    );
    assert_matrix_eq!(
        system.rhs().clone(),
        DVector::zeros(space.ndofs()),
        comp = abs,
        tol = 1e-14
    );
}

#[test]
fn item_integrator_integrates_per_item() {
    let mesh = create_unit_square_uniform_tri_mesh_2d::<f64>(2).unwrap();
    let space = FESpace::new(&mesh, H1P1 { ncomponents: 1 }).unwrap();
    let identity = ScalingAction::identity(1);
    let ones = FEVector::from_coefficients(&space, DVector::from_element(space.ndofs(), 1.0)).unwrap();

    let integrator = ItemIntegrator::new(&ones, Identity, &identity);
    let per_cell = integrator.integrate_items().unwrap();
    assert_eq!(per_cell.shape(), (1, 8));
    assert_matrix_eq!(per_cell, DMatrix::from_element(1, 8, 0.125), comp = abs, tol = 1e-14);
    assert_scalar_eq!(integrator.integrate().unwrap()[0], 1.0, comp = abs, tol = 1e-14);

    let perimeter = ItemIntegrator::new(&ones, Identity, &identity)
        .with_regions(AssemblyRegions::boundary_faces())
        .integrate()
        .unwrap();
    assert_scalar_eq!(perimeter[0], 4.0, comp = abs, tol = 1e-13);
}
