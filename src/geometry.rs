//! The catalogue of reference geometries.
//!
//! Reference domains are the unit simplices and unit boxes:
//!
//! - `Edge`: the interval `[0, 1]`,
//! - `Triangle`: the triangle with vertices `(0, 0)`, `(1, 0)`, `(0, 1)`,
//! - `Tetrahedron`: the tetrahedron with vertices `0`, `e1`, `e2`, `e3`,
//! - `Quadrilateral`: the unit square with counter-clockwise nodes starting at the origin,
//! - `Parallelepiped` and `Hexahedron`: the unit cube with the bottom (`z = 0`) nodes
//!   numbered counter-clockwise, followed by the top nodes in the same order.
//!
//! Faces are enumerated so that their node order induces the outward normal of the
//! reference cell: in 3D by the right-hand rule, in 2D faces are traversed counter-clockwise
//! and the outward normal points to the right. For simplices, face `j` is the face opposite
//! to vertex `j`.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::{Display, Formatter};

/// A reference geometry.
///
/// `Parallelepiped` shares its reference domain and tables with `Hexahedron`, but is mapped
/// affinely to physical space (using nodes 0, 1, 3 and 4), whereas a `Hexahedron` is mapped
/// trilinearly.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ReferenceGeometry {
    Vertex,
    Edge,
    Triangle,
    Quadrilateral,
    Tetrahedron,
    Parallelepiped,
    Hexahedron,
}

const NO_FACES: &[&[usize]] = &[];
const EDGE_FACES: &[&[usize]] = &[&[0], &[1]];
const TRIANGLE_FACES: &[&[usize]] = &[&[1, 2], &[2, 0], &[0, 1]];
const QUADRILATERAL_FACES: &[&[usize]] = &[&[0, 1], &[1, 2], &[2, 3], &[3, 0]];
const TETRAHEDRON_FACES: &[&[usize]] = &[&[1, 2, 3], &[0, 3, 2], &[0, 1, 3], &[0, 2, 1]];
#[rustfmt::skip]
const HEXAHEDRON_FACES: &[&[usize]] = &[
    &[0, 3, 2, 1], &[0, 1, 5, 4], &[1, 2, 6, 5], &[2, 3, 7, 6], &[3, 0, 4, 7], &[4, 5, 6, 7]
];

const NO_EDGES: &[[usize; 2]] = &[];
const TRIANGLE_EDGES: &[[usize; 2]] = &[[1, 2], [2, 0], [0, 1]];
const QUADRILATERAL_EDGES: &[[usize; 2]] = &[[0, 1], [1, 2], [2, 3], [3, 0]];
const TETRAHEDRON_EDGES: &[[usize; 2]] = &[[0, 1], [0, 2], [0, 3], [1, 2], [1, 3], [2, 3]];
#[rustfmt::skip]
const HEXAHEDRON_EDGES: &[[usize; 2]] = &[
    [0, 1], [1, 2], [2, 3], [3, 0],
    [0, 4], [1, 5], [2, 6], [3, 7],
    [4, 5], [5, 6], [6, 7], [7, 4],
];

const VERTEX_NODES: &[[f64; 3]] = &[[0.0, 0.0, 0.0]];
const EDGE_NODES: &[[f64; 3]] = &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]];
const TRIANGLE_NODES: &[[f64; 3]] = &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
const QUADRILATERAL_NODES: &[[f64; 3]] = &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]];
#[rustfmt::skip]
const TETRAHEDRON_NODES: &[[f64; 3]] = &[
    [0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]
];
#[rustfmt::skip]
const HEXAHEDRON_NODES: &[[f64; 3]] = &[
    [0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0],
    [0.0, 0.0, 1.0], [1.0, 0.0, 1.0], [1.0, 1.0, 1.0], [0.0, 1.0, 1.0],
];

impl ReferenceGeometry {
    /// All reference geometries.
    pub const ALL: [ReferenceGeometry; 7] = [
        Self::Vertex,
        Self::Edge,
        Self::Triangle,
        Self::Quadrilateral,
        Self::Tetrahedron,
        Self::Parallelepiped,
        Self::Hexahedron,
    ];

    /// Topological dimension of the reference domain.
    pub fn dim(&self) -> usize {
        use ReferenceGeometry::*;
        match self {
            Vertex => 0,
            Edge => 1,
            Triangle | Quadrilateral => 2,
            Tetrahedron | Parallelepiped | Hexahedron => 3,
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.reference_nodes().len()
    }

    pub fn num_faces(&self) -> usize {
        self.face_nodes().len()
    }

    pub fn num_edges(&self) -> usize {
        self.edge_nodes().len()
    }

    /// Local node indices of each face, in the order that induces the outward normal.
    pub fn face_nodes(&self) -> &'static [&'static [usize]] {
        use ReferenceGeometry::*;
        match self {
            Vertex => NO_FACES,
            Edge => EDGE_FACES,
            Triangle => TRIANGLE_FACES,
            Quadrilateral => QUADRILATERAL_FACES,
            Tetrahedron => TETRAHEDRON_FACES,
            Parallelepiped | Hexahedron => HEXAHEDRON_FACES,
        }
    }

    /// Local node indices of each edge.
    ///
    /// Only two- and three-dimensional geometries have edges. In 2D, edge `k` coincides
    /// with face `k`.
    pub fn edge_nodes(&self) -> &'static [[usize; 2]] {
        use ReferenceGeometry::*;
        match self {
            Vertex | Edge => NO_EDGES,
            Triangle => TRIANGLE_EDGES,
            Quadrilateral => QUADRILATERAL_EDGES,
            Tetrahedron => TETRAHEDRON_EDGES,
            Parallelepiped | Hexahedron => HEXAHEDRON_EDGES,
        }
    }

    /// The geometry of the faces of this geometry, or `None` for a vertex.
    pub fn face_geometry(&self) -> Option<ReferenceGeometry> {
        use ReferenceGeometry::*;
        match self {
            Vertex => None,
            Edge => Some(Vertex),
            Triangle | Quadrilateral => Some(Edge),
            Tetrahedron => Some(Triangle),
            Parallelepiped | Hexahedron => Some(Quadrilateral),
        }
    }

    /// The geometry of the edges of this geometry, or `None` if it has no edges.
    pub fn edge_geometry(&self) -> Option<ReferenceGeometry> {
        if self.num_edges() > 0 {
            Some(ReferenceGeometry::Edge)
        } else {
            None
        }
    }

    /// Coordinates of the reference nodes, padded with zeros to three components.
    pub fn reference_nodes(&self) -> &'static [[f64; 3]] {
        use ReferenceGeometry::*;
        match self {
            Vertex => VERTEX_NODES,
            Edge => EDGE_NODES,
            Triangle => TRIANGLE_NODES,
            Quadrilateral => QUADRILATERAL_NODES,
            Tetrahedron => TETRAHEDRON_NODES,
            Parallelepiped | Hexahedron => HEXAHEDRON_NODES,
        }
    }

    /// The volume (length, area) of the reference domain.
    pub fn reference_volume(&self) -> f64 {
        use ReferenceGeometry::*;
        match self {
            Vertex | Edge | Quadrilateral | Parallelepiped | Hexahedron => 1.0,
            Triangle => 0.5,
            Tetrahedron => 1.0 / 6.0,
        }
    }

    pub fn is_simplex(&self) -> bool {
        use ReferenceGeometry::*;
        matches!(self, Vertex | Edge | Triangle | Tetrahedron)
    }

    /// Whether the map from the reference domain to a physical item is affine.
    pub fn is_affine(&self) -> bool {
        !matches!(self, ReferenceGeometry::Quadrilateral | ReferenceGeometry::Hexahedron)
    }

    /// Local node indices spanning the affine map of the geometry: the map is
    /// `x(xi) = x_{s_0} + sum_k (x_{s_{k+1}} - x_{s_0}) xi_k`.
    pub fn affine_spanning_nodes(&self) -> &'static [usize] {
        use ReferenceGeometry::*;
        match self {
            Vertex => &[0],
            Edge => &[0, 1],
            Triangle => &[0, 1, 2],
            Quadrilateral => &[0, 1, 3],
            Tetrahedron => &[0, 1, 2, 3],
            Parallelepiped | Hexahedron => &[0, 1, 3, 4],
        }
    }
}

impl Display for ReferenceGeometry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}
