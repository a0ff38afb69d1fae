use crate::integration_tests::{assemble_operators, shared, source};
use weakform::action::ScalingAction;
use weakform::element::FEType::*;
use weakform::evaluate::DiffOperator::*;
use weakform::mesh::procedural::create_unit_square_uniform_tri_mesh_2d;
use weakform::operators::{
    AssemblyContext, AssemblyEvent, BilinearOperator, LagrangeMultiplierOperator, PdeOperator, RhsOperator,
};
use weakform::solve::{is_symmetric, solve_system, SolverSettings};
use weakform::space::{FESpace, FEVector};

/// Mixed formulation of `-Δu = 1` with `u = 0` on the boundary: find `σ = -∇u` in RT0 and
/// `u` in P0 with
///
/// ```text
/// ∫ σ·τ - ∫ u div τ = 0,
///       - ∫ div σ v = -∫ v.
/// ```
#[test]
fn mixed_poisson_conserves_mass_in_every_cell() {
    let mesh = create_unit_square_uniform_tri_mesh_2d::<f64>(8).unwrap();
    let fluxes = FESpace::new(&mesh, HDivRT0).unwrap();
    let values = FESpace::new(&mesh, L2P0 { ncomponents: 1 }).unwrap();
    let iterates = vec![FEVector::zeros(&fluxes), FEVector::zeros(&values)];
    let context = AssemblyContext::new(&iterates);

    let operators: Vec<PdeOperator<f64>> = vec![
        BilinearOperator::new(0, Identity, 0, Identity, shared(ScalingAction::identity(2)))
            .with_symmetry(true)
            .into(),
        LagrangeMultiplierOperator::new((1, Identity), (0, Divergence), shared(ScalingAction::new(-1.0, 1))).into(),
        RhsOperator::new(1, Identity, source(0, |_| 1.0))
            .with_factor(-1.0)
            .into(),
    ];
    let mut system = context.create_system();
    assemble_operators(&operators, AssemblyEvent::Setup, &mut system, &context);
    assert!(is_symmetric(&system.to_csr(), 1e-12));

    // The saddle point matrix is indefinite, so the solve falls back to LU
    let strict = SolverSettings::default().with_fallback_to_dense(false);
    assert!(solve_system(&system, &strict).is_err());
    let solution = solve_system(&system, &SolverSettings::default()).unwrap();
    let (sigma, u) = (&solution[0], &solution[1]);

    // Coefficients are fluxes out of the first cell of each face
    let mut outflow = vec![0.0; mesh.num_cells()];
    for face in 0..mesh.num_faces() {
        let flux = sigma[fluxes.face_dofs(face)[0]];
        let (first, second) = mesh.face_cells(face);
        outflow[first] += flux;
        if let Some(second) = second {
            outflow[second] -= flux;
        }
    }
    for cell in 0..mesh.num_cells() {
        assert!((outflow[cell] - mesh.cell_volume(cell)).abs() < 1e-10, "cell {cell}");
    }

    // The maximum of the exact solution is about 0.0737 at the center
    let max = u.max();
    assert!(u.iter().all(|&value| value > 0.0));
    assert!(max > 0.055 && max < 0.085, "max = {max}");
}
