use crate::integration_tests::{assemble_operators, shared, source};
use weakform::action::ScalingAction;
use weakform::assembly::AssemblyRegions;
use weakform::element::FEType::*;
use weakform::evaluate::DiffOperator::*;
use weakform::mesh::procedural::{create_unit_square_uniform_quad_mesh_2d, create_unit_square_uniform_tri_mesh_2d};
use weakform::operators::{AssemblyContext, AssemblyEvent, BilinearOperator, DiagonalPenaltyOperator, PdeOperator, RhsOperator};
use weakform::solve::{solve_system, SolverSettings};
use weakform::space::{FESpace, FEVector};

const PENALTY: f64 = 1e8;

#[test]
fn quadratic_solution_is_reproduced_by_quadratic_elements() {
    // -u'' = 2 with u = 0 on the left and right sides and natural conditions elsewhere
    let exact = |x: f64| x * (1.0 - x);
    let mesh = create_unit_square_uniform_tri_mesh_2d::<f64>(3).unwrap();
    let space = FESpace::new(&mesh, H1P2 { ncomponents: 1 }).unwrap();
    let iterates = vec![FEVector::zeros(&space)];
    let context = AssemblyContext::new(&iterates);

    let operators: Vec<PdeOperator<f64>> = vec![
        BilinearOperator::new(0, Gradient, 0, Gradient, shared(ScalingAction::identity(2)))
            .with_symmetry(true)
            .into(),
        RhsOperator::new(0, Identity, source(0, |_| 2.0)).into(),
        DiagonalPenaltyOperator::new(0, PENALTY)
            .with_regions(AssemblyRegions::boundary_faces().with_regions([2, 4]))
            .into(),
    ];
    let mut system = context.create_system();
    assemble_operators(&operators, AssemblyEvent::Setup, &mut system, &context);
    let solution = solve_system(&system, &SolverSettings::default()).unwrap();
    let u = &solution[0];

    for node in 0..mesh.num_nodes() {
        let x = mesh.coordinates()[(0, node)];
        assert!((u[node] - exact(x)).abs() < 1e-6, "node {node}");
    }
    // Edge dofs follow the node dofs and hold the values at the edge midpoints
    for edge in 0..mesh.num_edges() {
        let [a, b] = mesh.edge_nodes(edge);
        let x = 0.5 * (mesh.coordinates()[(0, a)] + mesh.coordinates()[(0, b)]);
        assert!((u[mesh.num_nodes() + edge] - exact(x)).abs() < 1e-6, "edge {edge}");
    }
}

#[test]
fn affine_solution_is_reproduced_on_quadrilaterals() {
    let exact = |x: f64, y: f64| 1.0 + 2.0 * x - y;
    let mesh = create_unit_square_uniform_quad_mesh_2d::<f64>(4).unwrap();
    let space = FESpace::new(&mesh, H1Q1 { ncomponents: 1 }).unwrap();
    let iterates = vec![FEVector::zeros(&space)];
    let context = AssemblyContext::new(&iterates).with_parallel(true);

    let data = (0..mesh.num_nodes())
        .map(|node| exact(mesh.coordinates()[(0, node)], mesh.coordinates()[(1, node)]))
        .collect();
    let operators: Vec<PdeOperator<f64>> = vec![
        BilinearOperator::new(0, Gradient, 0, Gradient, shared(ScalingAction::identity(2))).into(),
        DiagonalPenaltyOperator::new(0, PENALTY)
            .with_data(data)
            .into(),
    ];
    let mut system = context.create_system();
    assemble_operators(&operators, AssemblyEvent::Setup, &mut system, &context);
    let solution = solve_system(&system, &SolverSettings::default()).unwrap();

    for node in 0..mesh.num_nodes() {
        let expected = exact(mesh.coordinates()[(0, node)], mesh.coordinates()[(1, node)]);
        assert!((solution[0][node] - expected).abs() < 1e-6, "node {node}");
    }
}
