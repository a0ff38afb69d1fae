use crate::unit_tests::{library_error, source_action};
use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::{DMatrix, DVector, DVectorView, DVectorViewMut};
use std::sync::Arc;
use weakform::action::{Action, FunctionAction, QpInfo, ScalingAction};
use weakform::assembly::AssemblyRegions;
use weakform::element::FEType::*;
use weakform::error::Error;
use weakform::evaluate::DiffOperator::*;
use weakform::mesh::procedural::create_unit_square_uniform_tri_mesh_2d;
use weakform::operators::{
    AssemblyContext, AssemblyEvent, AssemblyTrigger, BilinearOperator, CopyOperator, DiagonalPenaltyOperator,
    FvUpwindDivergenceOperator, LagrangeMultiplierOperator, NonlinearOperator, PdeOperator, RhsOperator,
    TrilinearOperator,
};
use weakform::space::{FESpace, FEVector};

fn shared<A: Action<f64> + 'static>(action: A) -> Arc<dyn Action<f64>> {
    Arc::new(action)
}

fn time_ramp(result: &mut DVectorViewMut<f64>, _: &DVectorView<f64>, info: &QpInfo<f64>) {
    result[0] = info.time;
}

#[test]
fn triggers_map_events_to_assembly() {
    use AssemblyEvent::*;
    let events = [Setup, TimeStep, Iteration, FinalSolve];
    let table = [
        (AssemblyTrigger::Never, [false, false, false, false]),
        (AssemblyTrigger::Once, [true, false, false, false]),
        (AssemblyTrigger::EveryTimeStep, [true, true, false, false]),
        (AssemblyTrigger::EveryIteration, [true, true, true, false]),
        (AssemblyTrigger::AfterFinalSolve, [false, false, false, true]),
    ];
    for (trigger, expected) in table {
        for (event, expected) in events.into_iter().zip(expected) {
            assert_eq!(trigger.requires_assembly(event), expected, "{trigger:?} at {event:?}");
        }
    }
}

#[test]
fn operator_metadata() {
    let stiffness: PdeOperator<f64> = BilinearOperator::new(0, Gradient, 0, Gradient, shared(ScalingAction::identity(2))).into();
    assert_eq!(stiffness.target_blocks(), vec![(0, 0)]);
    assert!(stiffness.rhs_blocks().is_empty());
    assert_eq!(stiffness.trigger(), AssemblyTrigger::Once);
    assert!(!stiffness.is_nonlinear());
    assert!(!stiffness.is_time_dependent());

    let coupling: PdeOperator<f64> = BilinearOperator::new(1, Identity, 0, Divergence, shared(ScalingAction::identity(1)))
        .with_transposed_copy(true)
        .with_trigger(AssemblyTrigger::EveryIteration)
        .into();
    assert_eq!(coupling.target_blocks(), vec![(1, 0), (0, 1)]);
    assert_eq!(coupling.trigger(), AssemblyTrigger::EveryIteration);

    let ramp = shared(FunctionAction::new(0, 1, time_ramp).with_time_dependence());
    let source: PdeOperator<f64> = RhsOperator::new(0, Identity, ramp.clone()).into();
    assert!(source.target_blocks().is_empty());
    assert_eq!(source.rhs_blocks(), vec![0]);
    assert_eq!(source.trigger(), AssemblyTrigger::EveryTimeStep);
    assert!(source.is_time_dependent());

    let coupled: PdeOperator<f64> = RhsOperator::new(0, Identity, shared(ScalingAction::identity(1)))
        .with_argument(1, Identity)
        .into();
    assert_eq!(coupled.trigger(), AssemblyTrigger::EveryIteration);

    let convection: PdeOperator<f64> =
        TrilinearOperator::new((0, Identity), (0, Gradient), (0, Identity), shared(ScalingAction::identity(1))).into();
    assert!(convection.is_nonlinear());
    let transport: PdeOperator<f64> =
        TrilinearOperator::new((0, Identity), (0, Gradient), (1, Identity), shared(ScalingAction::identity(1))).into();
    assert!(!transport.is_nonlinear());
    assert_eq!(transport.trigger(), AssemblyTrigger::EveryIteration);

    let nonlinear: PdeOperator<f64> =
        NonlinearOperator::new((0, Gradient), 0, vec![Gradient], Arc::new(ScalingAction::<f64>::identity(2))).into();
    assert!(nonlinear.is_nonlinear());
    assert_eq!(nonlinear.target_blocks(), vec![(0, 0)]);
    assert_eq!(nonlinear.rhs_blocks(), vec![0]);

    let multiplier: PdeOperator<f64> =
        LagrangeMultiplierOperator::new((1, Identity), (0, Identity), shared(ScalingAction::identity(1))).into();
    assert_eq!(multiplier.target_blocks(), vec![(1, 0), (0, 1)]);

    let penalty: PdeOperator<f64> = DiagonalPenaltyOperator::new(0, 1e6).into();
    assert!(penalty.rhs_blocks().is_empty());
    let copy: PdeOperator<f64> = CopyOperator::new(0, 1).into();
    assert_eq!(copy.rhs_blocks(), vec![0]);
    let upwind: PdeOperator<f64> = FvUpwindDivergenceOperator::new(0, 1).into();
    assert_eq!(upwind.target_blocks(), vec![(0, 0)]);
    assert!(!upwind.is_nonlinear());
    assert_eq!(upwind.name(), "finite volume upwind divergence operator");
}

#[test]
fn explicit_triggers_override_defaults() {
    use AssemblyTrigger::*;
    let scaling = || shared(ScalingAction::identity(1));
    let operators: Vec<(PdeOperator<f64>, AssemblyTrigger, AssemblyTrigger)> = vec![
        (
            BilinearOperator::new(0, Identity, 0, Identity, scaling()).into(),
            Once,
            AfterFinalSolve,
        ),
        (
            TrilinearOperator::new((0, Identity), (0, Gradient), (1, Identity), scaling()).into(),
            EveryIteration,
            EveryTimeStep,
        ),
        (
            NonlinearOperator::new((0, Gradient), 0, vec![Gradient], Arc::new(ScalingAction::<f64>::identity(2))).into(),
            EveryIteration,
            Never,
        ),
        (
            RhsOperator::new(0, Identity, scaling())
                .with_argument(1, Identity)
                .into(),
            EveryIteration,
            Once,
        ),
        (
            LagrangeMultiplierOperator::new((1, Identity), (0, Identity), scaling()).into(),
            Once,
            EveryIteration,
        ),
        (DiagonalPenaltyOperator::new(0, 1e6).into(), Once, EveryTimeStep),
        (CopyOperator::new(0, 1).into(), EveryIteration, AfterFinalSolve),
        (FvUpwindDivergenceOperator::new(0, 1).into(), EveryIteration, Once),
    ];

    for (operator, default, explicit) in operators {
        assert_eq!(operator.trigger(), default, "default trigger of {}", operator.name());
        let overridden: PdeOperator<f64> = match operator {
            PdeOperator::Bilinear(op) => op.with_trigger(explicit).into(),
            PdeOperator::Trilinear(op) => op.with_trigger(explicit).into(),
            PdeOperator::Nonlinear(op) => op.with_trigger(explicit).into(),
            PdeOperator::Rhs(op) => op.with_trigger(explicit).into(),
            PdeOperator::LagrangeMultiplier(op) => op.with_trigger(explicit).into(),
            PdeOperator::DiagonalPenalty(op) => op.with_trigger(explicit).into(),
            PdeOperator::Copy(op) => op.with_trigger(explicit).into(),
            PdeOperator::FvUpwindDivergence(op) => op.with_trigger(explicit).into(),
        };
        assert_eq!(overridden.trigger(), explicit, "explicit trigger of {}", overridden.name());
        assert_eq!(
            overridden.trigger().requires_assembly(AssemblyEvent::FinalSolve),
            explicit == AfterFinalSolve
        );
    }
}

#[test]
fn bilinear_operator_matches_parallel_assembly() {
    let mesh = create_unit_square_uniform_tri_mesh_2d::<f64>(4).unwrap();
    let space = FESpace::new(&mesh, H1P2 { ncomponents: 1 }).unwrap();
    let iterates = vec![FEVector::zeros(&space)];
    let operators: Vec<PdeOperator<f64>> = vec![
        BilinearOperator::new(0, Gradient, 0, Gradient, shared(ScalingAction::identity(2)))
            .with_symmetry(true)
            .into(),
        RhsOperator::new(0, Identity, shared(source_action(1, 2, |x| x[0] * x[0]))).into(),
    ];

    let assemble = |parallel: bool| {
        let context = AssemblyContext::new(&iterates).with_parallel(parallel);
        let mut system = context.create_system();
        for operator in &operators {
            operator.assemble(&mut system, &context).unwrap();
        }
        system
    };
    let (sequential, parallel) = (assemble(false), assemble(true));
    assert_matrix_eq!(
        DMatrix::from(&parallel.to_csr()),
        DMatrix::from(&sequential.to_csr()),
        comp = abs,
        tol = 1e-12
    );
    assert_matrix_eq!(parallel.rhs().clone(), sequential.rhs().clone(), comp = abs, tol = 1e-14);
}

#[test]
fn time_is_passed_to_actions() {
    let mesh = create_unit_square_uniform_tri_mesh_2d::<f64>(1).unwrap();
    let space = FESpace::new(&mesh, L2P0 { ncomponents: 1 }).unwrap();
    let iterates = vec![FEVector::zeros(&space)];
    let context = AssemblyContext::new(&iterates).with_time(4.0);
    let mut system = context.create_system();
    PdeOperator::from(RhsOperator::new(0, Identity, shared(FunctionAction::new(0, 1, time_ramp))))
        .assemble(&mut system, &context)
        .unwrap();
    assert_matrix_eq!(system.rhs().clone(), DVector::from_element(2, 2.0), comp = abs, tol = 1e-14);
}

#[test]
fn lagrange_multiplier_writes_an_exact_transpose() {
    let mesh = create_unit_square_uniform_tri_mesh_2d::<f64>(3).unwrap();
    let velocity = FESpace::new(&mesh, H1P2 { ncomponents: 2 }).unwrap();
    let pressure = FESpace::new(&mesh, H1P1 { ncomponents: 1 }).unwrap();
    let iterates = vec![FEVector::zeros(&velocity), FEVector::zeros(&pressure)];
    let context = AssemblyContext::new(&iterates);
    let mut system = context.create_system();
    PdeOperator::from(LagrangeMultiplierOperator::new(
        (1, Identity),
        (0, Divergence),
        shared(ScalingAction::new(-1.0, 1)),
    ))
    .assemble(&mut system, &context)
    .unwrap();

    let constraint = system.matrix_block(1, 0).unwrap();
    assert!(constraint.nnz() > 0);
    assert_eq!(system.matrix_block(0, 1).unwrap(), constraint.transpose());
    assert_eq!(system.matrix_block(1, 1).unwrap().nnz(), 0);
}

#[test]
fn diagonal_penalty_on_boundary_dofs() {
    let mesh = create_unit_square_uniform_tri_mesh_2d::<f64>(2).unwrap();
    let space = FESpace::new(&mesh, H1P1 { ncomponents: 1 }).unwrap();
    let penalty = DiagonalPenaltyOperator::new(0, 1e8);
    assert_eq!(penalty.penalized_dofs(&space).len(), 8);

    let bottom = DiagonalPenaltyOperator::new(0, 1e8).with_regions(AssemblyRegions::boundary_faces().with_regions([1]));
    let dofs = bottom.penalized_dofs(&space);
    assert_eq!(dofs.len(), 3);
    assert!(dofs.iter().all(|&node| mesh.coordinates()[(1, node)] == 0.0));

    let data = (0..space.ndofs()).map(|i| i as f64).collect();
    let iterates = vec![FEVector::zeros(&space)];
    let context = AssemblyContext::new(&iterates);
    let mut system = context.create_system();
    PdeOperator::from(bottom.with_data(data))
        .assemble(&mut system, &context)
        .unwrap();
    for i in 0..space.ndofs() {
        let (entry, rhs) = if dofs.contains(&i) { (1e8, 1e8 * i as f64) } else { (0.0, 0.0) };
        assert_eq!(system.matrix().get(i, i).unwrap_or(0.0), entry);
        assert_eq!(system.rhs()[i], rhs);
    }
}

#[test]
fn diagonal_penalty_data_must_cover_the_block() {
    let mesh = create_unit_square_uniform_tri_mesh_2d::<f64>(2).unwrap();
    let space = FESpace::new(&mesh, H1P1 { ncomponents: 1 }).unwrap();
    let iterates = vec![FEVector::zeros(&space)];
    let context = AssemblyContext::new(&iterates);
    let mut system = context.create_system();
    let report = PdeOperator::from(DiagonalPenaltyOperator::new(0, 1.0).with_data(vec![0.0; 3]))
        .assemble(&mut system, &context)
        .unwrap_err();
    assert_eq!(
        library_error(&report),
        &Error::IncompatibleDimensions {
            expected: 9,
            actual: 3
        }
    );
}

#[test]
fn copy_operator_adds_scaled_source() {
    let mesh = create_unit_square_uniform_tri_mesh_2d::<f64>(1).unwrap();
    let space = FESpace::new(&mesh, H1P1 { ncomponents: 1 }).unwrap();
    let previous = DVector::from_column_slice(&[1.0, 2.0, 3.0, 4.0]);
    let iterates = vec![
        FEVector::zeros(&space),
        FEVector::from_coefficients(&space, previous.clone()).unwrap(),
    ];
    let context = AssemblyContext::new(&iterates);
    let mut system = context.create_system();
    let copy = PdeOperator::from(CopyOperator::new(0, 1).with_factor(0.5));
    copy.assemble(&mut system, &context).unwrap();
    copy.assemble(&mut system, &context).unwrap();
    assert_eq!(system.rhs_block(0).unwrap().into_owned(), previous);
    assert_eq!(system.rhs_block(1).unwrap().into_owned(), DVector::zeros(4));
}

#[test]
fn operators_report_missing_blocks() {
    let mesh = create_unit_square_uniform_tri_mesh_2d::<f64>(1).unwrap();
    let space = FESpace::new(&mesh, H1P1 { ncomponents: 1 }).unwrap();
    let iterates = vec![FEVector::zeros(&space)];
    let context = AssemblyContext::new(&iterates);
    let mut system = context.create_system();
    let report = PdeOperator::from(CopyOperator::new(0, 2))
        .assemble(&mut system, &context)
        .unwrap_err();
    assert_eq!(
        library_error(&report),
        &Error::InvalidBlock {
            block: 2,
            num_blocks: 1
        }
    );
}

#[test]
fn upwind_divergence_conserves_interior_fluxes() {
    let mesh = create_unit_square_uniform_tri_mesh_2d::<f64>(3).unwrap();
    let cells = FESpace::new(&mesh, L2P0 { ncomponents: 1 }).unwrap();
    let velocity_space = FESpace::new(&mesh, H1P1 { ncomponents: 2 }).unwrap();
    let n = mesh.num_nodes();
    // Constant velocity (1, 0.5)
    let coefficients = DVector::from_fn(2 * n, |i, _| if i < n { 1.0 } else { 0.5 });
    let iterates = vec![
        FEVector::zeros(&cells),
        FEVector::from_coefficients(&velocity_space, coefficients).unwrap(),
    ];
    let context = AssemblyContext::new(&iterates);
    let mut system = context.create_system();
    PdeOperator::from(FvUpwindDivergenceOperator::new(0, 1))
        .assemble(&mut system, &context)
        .unwrap();

    let matrix = DMatrix::from(&system.matrix_block(0, 0).unwrap());
    for i in 0..matrix.nrows() {
        for j in 0..matrix.ncols() {
            if i == j {
                assert!(matrix[(i, j)] >= 0.0);
            } else {
                assert!(matrix[(i, j)] <= 0.0);
            }
        }
    }
    // Column sums are the boundary outflow of each cell, which leaves through the right and top sides
    let outflow = 1.0 + 0.5;
    assert_scalar_eq!(matrix.sum(), outflow, comp = abs, tol = 1e-13);
    assert!(matrix.column_iter().all(|column| column.sum() >= -1e-13));
}

#[test]
fn upwind_divergence_requires_cellwise_constants() {
    let mesh = create_unit_square_uniform_tri_mesh_2d::<f64>(1).unwrap();
    let space = FESpace::new(&mesh, H1P1 { ncomponents: 1 }).unwrap();
    let velocity_space = FESpace::new(&mesh, H1P1 { ncomponents: 2 }).unwrap();
    let iterates = vec![FEVector::zeros(&space), FEVector::zeros(&velocity_space)];
    let context = AssemblyContext::new(&iterates);
    let mut system = context.create_system();
    let report = PdeOperator::from(FvUpwindDivergenceOperator::new(0, 1))
        .assemble(&mut system, &context)
        .unwrap_err();
    assert!(matches!(library_error(&report), Error::UnsupportedElement { .. }));
}
