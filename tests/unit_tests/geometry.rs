use matrixcompare::assert_scalar_eq;
use nalgebra::{DVector, Vector3};
use weakform::geometry::ReferenceGeometry;
use weakform::geometry::ReferenceGeometry::*;
use weakform::mesh::procedural::create_reference_mesh;
use weakform::transform::reference_center;

fn node(geometry: ReferenceGeometry, index: usize) -> Vector3<f64> {
    Vector3::from(geometry.reference_nodes()[index])
}

fn face_centroid(geometry: ReferenceGeometry, face: usize) -> Vector3<f64> {
    let nodes = geometry.face_nodes()[face];
    nodes.iter().map(|&k| node(geometry, k)).sum::<Vector3<f64>>() / nodes.len() as f64
}

fn center(geometry: ReferenceGeometry) -> Vector3<f64> {
    let center = reference_center::<f64>(geometry);
    Vector3::from_fn(|i, _| if i < center.len() { center[i] } else { 0.0 })
}

#[test]
fn entity_counts() {
    // (geometry, nodes, faces, edges)
    let expected = [
        (Vertex, 1, 0, 0),
        (Edge, 2, 2, 0),
        (Triangle, 3, 3, 3),
        (Quadrilateral, 4, 4, 4),
        (Tetrahedron, 4, 4, 6),
        (Parallelepiped, 8, 6, 12),
        (Hexahedron, 8, 6, 12),
    ];
    for (geometry, nodes, faces, edges) in expected {
        assert_eq!(geometry.num_nodes(), nodes, "{geometry}");
        assert_eq!(geometry.num_faces(), faces, "{geometry}");
        assert_eq!(geometry.num_edges(), edges, "{geometry}");
    }
}

#[test]
fn face_node_counts_match_face_geometry() {
    for geometry in ReferenceGeometry::ALL {
        match geometry.face_geometry() {
            Some(face_geometry) => {
                assert_eq!(face_geometry.dim() + 1, geometry.dim());
                for face in geometry.face_nodes() {
                    assert_eq!(face.len(), face_geometry.num_nodes());
                }
            }
            None => assert_eq!(geometry.num_faces(), 0),
        }
    }
}

#[test]
fn simplex_faces_are_opposite_to_vertices() {
    for geometry in [Edge, Triangle, Tetrahedron] {
        for (j, face) in geometry.face_nodes().iter().enumerate() {
            assert!(!face.contains(&j), "face {j} of {geometry} contains vertex {j}");
        }
    }
}

#[test]
fn edges_of_2d_geometries_coincide_with_faces() {
    for geometry in [Triangle, Quadrilateral] {
        for (face, edge) in geometry.face_nodes().iter().zip(geometry.edge_nodes()) {
            assert_eq!(*face, &edge[..]);
        }
    }
}

#[test]
fn face_node_order_induces_outward_normals() {
    for geometry in [Triangle, Quadrilateral] {
        for face in 0..geometry.num_faces() {
            let nodes = geometry.face_nodes()[face];
            let t = node(geometry, nodes[1]) - node(geometry, nodes[0]);
            // Traversed counter-clockwise, the outward normal points to the right
            let n = Vector3::new(t.y, -t.x, 0.0);
            assert!(n.dot(&(face_centroid(geometry, face) - center(geometry))) > 0.0);
        }
    }

    for geometry in [Tetrahedron, Parallelepiped, Hexahedron] {
        for face in 0..geometry.num_faces() {
            let nodes = geometry.face_nodes()[face];
            let origin = node(geometry, nodes[0]);
            let n = (node(geometry, nodes[1]) - origin).cross(&(node(geometry, nodes[2]) - origin));
            assert!(n.dot(&(face_centroid(geometry, face) - center(geometry))) > 0.0);
        }
    }
}

#[test]
fn reference_volumes_match_mesh_measures() {
    for geometry in [Edge, Triangle, Quadrilateral, Tetrahedron, Hexahedron] {
        let mesh = create_reference_mesh::<f64>(geometry).unwrap();
        assert_scalar_eq!(mesh.cell_volume(0), geometry.reference_volume(), comp = abs, tol = 1e-14);
    }
}

#[test]
fn reference_triangle_face_normals() {
    let mesh = create_reference_mesh::<f64>(Triangle).unwrap();
    let s = 0.5f64.sqrt();
    let expected = [DVector::from_column_slice(&[s, s]), DVector::from_column_slice(&[-1.0, 0.0]), DVector::from_column_slice(&[0.0, -1.0])];
    for (face, n) in expected.iter().enumerate() {
        let normal = mesh.face_normal(face).clone_owned();
        assert!((normal - n).amax() < 1e-14);
    }
    assert_scalar_eq!(mesh.face_volume(0), 2.0f64.sqrt(), comp = abs, tol = 1e-14);
    assert_scalar_eq!(mesh.face_volume(1), 1.0, comp = abs, tol = 1e-14);
}

#[test]
fn affine_classification() {
    assert!(Triangle.is_affine() && Tetrahedron.is_affine() && Parallelepiped.is_affine());
    assert!(!Quadrilateral.is_affine() && !Hexahedron.is_affine());
    assert!(Tetrahedron.is_simplex() && !Parallelepiped.is_simplex());
}
