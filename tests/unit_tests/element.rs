use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::{DMatrix, DMatrixViewMut, DVector, DVectorView};
use paste::paste;
use weakform::action::ScalingAction;
use weakform::assembly::{AssemblyRegions, ItemIntegrator};
use weakform::element::{
    dofmap_pattern, get_basis, local_face_dofs, polynomial_order, DofKind, FEType, FEType::*,
};
use weakform::error::Error;
use weakform::evaluate::DiffOperator;
use weakform::geometry::ReferenceGeometry;
use weakform::geometry::ReferenceGeometry::*;
use weakform::mesh::procedural::create_reference_mesh;
use weakform::space::{FESpace, FEVector};

const ELEMENTS: [FEType; 10] = [
    L2P0 { ncomponents: 1 },
    L2P0 { ncomponents: 2 },
    H1P1 { ncomponents: 1 },
    H1P1 { ncomponents: 3 },
    H1Q1 { ncomponents: 1 },
    H1P2 { ncomponents: 1 },
    H1P2 { ncomponents: 2 },
    HDivRT0,
    HDivBDM1,
    HCurlN0,
];

const GEOMETRIES: [ReferenceGeometry; 6] = [Edge, Triangle, Quadrilateral, Tetrahedron, Parallelepiped, Hexahedron];

#[test]
fn basis_size_matches_dofmap_pattern() {
    for fe in ELEMENTS {
        for geometry in GEOMETRIES {
            match (get_basis(fe, geometry), dofmap_pattern(fe, DofKind::Cell, geometry)) {
                (Ok(basis), Ok(pattern)) => {
                    assert_eq!(basis.num_dofs(), pattern.num_dofs(geometry), "{fe} on {geometry}");
                    assert_eq!(basis.geometry(), geometry);
                }
                (Err(a), Err(b)) => {
                    assert_eq!(a, Error::UnsupportedElement { fe, geometry });
                    assert_eq!(a, b);
                }
                _ => panic!("Basis and dofmap pattern disagree on support of {fe} on {geometry}"),
            }
        }
    }
}

#[test]
fn known_dof_counts() {
    let count = |fe, geometry| get_basis(fe, geometry).unwrap().num_dofs();
    assert_eq!(count(H1P2 { ncomponents: 1 }, Triangle), 6);
    assert_eq!(count(H1P2 { ncomponents: 1 }, Tetrahedron), 10);
    assert_eq!(count(H1P2 { ncomponents: 2 }, Triangle), 12);
    assert_eq!(count(H1Q1 { ncomponents: 1 }, Hexahedron), 8);
    assert_eq!(count(HDivRT0, Tetrahedron), 4);
    assert_eq!(count(HDivBDM1, Triangle), 6);
    assert_eq!(count(HDivBDM1, Tetrahedron), 12);
    assert_eq!(count(HCurlN0, Tetrahedron), 6);
}

#[test]
fn unsupported_combinations() {
    assert!(get_basis(H1P1 { ncomponents: 1 }, Quadrilateral).is_err());
    assert!(get_basis(H1P2 { ncomponents: 1 }, Hexahedron).is_err());
    assert!(get_basis(HDivRT0, Quadrilateral).is_err());
    assert!(get_basis(HCurlN0, Edge).is_err());
}

#[test]
fn polynomial_orders() {
    assert_eq!(polynomial_order(L2P0 { ncomponents: 1 }, Triangle), 0);
    assert_eq!(polynomial_order(H1P2 { ncomponents: 1 }, Tetrahedron), 2);
    assert_eq!(polynomial_order(H1Q1 { ncomponents: 1 }, Quadrilateral), 2);
    assert_eq!(polynomial_order(H1Q1 { ncomponents: 1 }, Hexahedron), 3);
    assert_eq!(polynomial_order(H1Q1 { ncomponents: 1 }, Triangle), 1);
    assert_eq!(polynomial_order(HDivBDM1, Triangle), 1);
}

#[test]
fn local_face_dofs_of_lagrange_elements() {
    // Vertex dofs of the face, followed by the edge dof of the face
    assert_eq!(local_face_dofs(H1P2 { ncomponents: 1 }, Triangle, 0).unwrap(), vec![1, 2, 3]);
    assert_eq!(local_face_dofs(H1P2 { ncomponents: 1 }, Triangle, 1).unwrap(), vec![0, 2, 4]);
    assert_eq!(local_face_dofs(H1P1 { ncomponents: 1 }, Tetrahedron, 0).unwrap(), vec![1, 2, 3]);
    // Component blocks of three nodes each
    assert_eq!(
        local_face_dofs(H1P1 { ncomponents: 2 }, Triangle, 2).unwrap(),
        vec![0, 1, 3, 4]
    );
    assert_eq!(
        local_face_dofs(H1Q1 { ncomponents: 1 }, Hexahedron, 5).unwrap(),
        vec![4, 5, 6, 7]
    );
    assert!(local_face_dofs(L2P0 { ncomponents: 1 }, Triangle, 0)
        .unwrap()
        .is_empty());
}

#[test]
fn local_face_dofs_of_vector_elements() {
    assert_eq!(local_face_dofs(HDivRT0, Triangle, 1).unwrap(), vec![1]);
    assert_eq!(local_face_dofs(HDivBDM1, Tetrahedron, 2).unwrap(), vec![6, 7, 8]);
    // Edges of the face opposite to vertex 0
    assert_eq!(local_face_dofs(HCurlN0, Tetrahedron, 0).unwrap(), vec![3, 4, 5]);
}

fn reference_values(fe: FEType, geometry: ReferenceGeometry, xi: &[f64]) -> DMatrix<f64> {
    let basis = get_basis(fe, geometry).unwrap();
    let mut values = DMatrix::zeros(basis.num_dofs(), basis.ncomponents());
    basis.populate_values(DVectorView::from_slice(xi, xi.len()), DMatrixViewMut::from(&mut values));
    values
}

#[test]
fn lagrange_bases_are_nodal_partitions_of_unity() {
    for (fe, geometry) in [
        (H1P1 { ncomponents: 1 }, Triangle),
        (H1P1 { ncomponents: 1 }, Tetrahedron),
        (H1Q1 { ncomponents: 1 }, Quadrilateral),
        (H1Q1 { ncomponents: 1 }, Hexahedron),
        (H1P2 { ncomponents: 1 }, Triangle),
        (H1P2 { ncomponents: 1 }, Tetrahedron),
    ] {
        let dim = geometry.dim();
        for (k, node) in geometry.reference_nodes().iter().enumerate() {
            let values = reference_values(fe, geometry, &node[..dim]);
            let mut expected = DVector::zeros(values.nrows());
            expected[k] = 1.0;
            assert_matrix_eq!(values.column(0), expected, comp = abs, tol = 1e-14);
        }
        let values = reference_values(fe, geometry, &[0.2, 0.1, 0.3][..dim]);
        assert_scalar_eq!(values.sum(), 1.0, comp = abs, tol = 1e-14);
    }
}

/// Integrals of the flux operator of each global basis function over each face of a single
/// reference cell, one row per basis function and one column per face.
fn face_fluxes(fe: FEType, geometry: ReferenceGeometry, operator: DiffOperator) -> DMatrix<f64> {
    let mesh = create_reference_mesh::<f64>(geometry).unwrap();
    let space = FESpace::new(&mesh, fe).unwrap();
    let identity = ScalingAction::identity(1);
    let mut fluxes = DMatrix::zeros(space.ndofs(), mesh.num_faces());
    for i in 0..space.ndofs() {
        let mut u = FEVector::zeros(&space);
        u.coefficients_mut()[i] = 1.0;
        let integrals = ItemIntegrator::new(&u, operator, &identity)
            .with_regions(AssemblyRegions::faces())
            .integrate_items()
            .unwrap();
        fluxes.row_mut(i).copy_from(&integrals.row(0));
    }
    fluxes
}

#[test]
fn raviart_thomas_functions_have_unit_flux_through_their_face() {
    for geometry in [Triangle, Tetrahedron] {
        let fluxes = face_fluxes(HDivRT0, geometry, DiffOperator::NormalFlux);
        let n = geometry.num_faces();
        assert_matrix_eq!(fluxes, DMatrix::<f64>::identity(n, n), comp = abs, tol = 1e-13);
    }
}

#[test]
fn brezzi_douglas_marini_functions_split_the_flux_of_their_face() {
    for geometry in [Triangle, Tetrahedron] {
        let dim = geometry.dim();
        let fluxes = face_fluxes(HDivBDM1, geometry, DiffOperator::NormalFlux);
        let expected = DMatrix::from_fn(dim * geometry.num_faces(), geometry.num_faces(), |i, j| {
            if i / dim == j {
                1.0 / dim as f64
            } else {
                0.0
            }
        });
        assert_matrix_eq!(fluxes, expected, comp = abs, tol = 1e-13);
    }
}

#[test]
fn nedelec_functions_have_unit_tangential_moments() {
    // Global edges run from the lower to the higher node, so the edge from node 2 to node 0
    // is traversed against the counter-clockwise face orientation
    let fluxes = face_fluxes(HCurlN0, Triangle, DiffOperator::TangentialFlux);
    let expected = DMatrix::from_diagonal(&DVector::from_column_slice(&[1.0, -1.0, 1.0]));
    assert_matrix_eq!(fluxes, expected, comp = abs, tol = 1e-13);
}

fn assert_gradients_match_finite_differences(fe: FEType, geometry: ReferenceGeometry) {
    let basis = get_basis(fe, geometry).unwrap();
    let dim = geometry.dim();
    let nc = basis.ncomponents();
    let xi = [0.2, 0.15, 0.3];
    let mut gradients = DMatrix::zeros(basis.num_dofs() * nc, dim);
    basis.populate_gradients(DVectorView::from_slice(&xi[..dim], dim), DMatrixViewMut::from(&mut gradients));

    let h = 1e-5;
    for k in 0..dim {
        let (mut forward, mut backward) = (xi, xi);
        forward[k] += h;
        backward[k] -= h;
        let difference =
            (reference_values(fe, geometry, &forward[..dim]) - reference_values(fe, geometry, &backward[..dim])) / (2.0 * h);
        for i in 0..basis.num_dofs() {
            for c in 0..nc {
                let error = (gradients[(i * nc + c, k)] - difference[(i, c)]).abs();
                assert!(error < 1e-8, "{fe} on {geometry}: dof {i}, component {c}, direction {k}");
            }
        }
    }
}

macro_rules! test_reference_gradients {
    ($($name:ident: $fe:expr, $geometry:expr;)*) => {
        $(
            paste! {
                #[test]
                fn [<$name _gradients_match_finite_differences>]() {
                    assert_gradients_match_finite_differences($fe, $geometry);
                }
            }
        )*
    };
}

test_reference_gradients! {
    p0_triangle: L2P0 { ncomponents: 1 }, Triangle;
    p1_edge: H1P1 { ncomponents: 1 }, Edge;
    p1_vector_tetrahedron: H1P1 { ncomponents: 3 }, Tetrahedron;
    q1_quadrilateral: H1Q1 { ncomponents: 1 }, Quadrilateral;
    q1_hexahedron: H1Q1 { ncomponents: 2 }, Hexahedron;
    p2_edge: H1P2 { ncomponents: 1 }, Edge;
    p2_triangle: H1P2 { ncomponents: 1 }, Triangle;
    p2_tetrahedron: H1P2 { ncomponents: 1 }, Tetrahedron;
    rt0_triangle: HDivRT0, Triangle;
    rt0_tetrahedron: HDivRT0, Tetrahedron;
    bdm1_triangle: HDivBDM1, Triangle;
    bdm1_tetrahedron: HDivBDM1, Tetrahedron;
    n0_triangle: HCurlN0, Triangle;
    n0_tetrahedron: HCurlN0, Tetrahedron;
}
