//! The catalogue of finite element families.
//!
//! An element family is described by a closed [`FEType`]. Per reference geometry it
//! provides a dofmap pattern, the exactness degree of its basis, the reference basis itself
//! ([`get_basis`]) and, per mesh cell, the orientation corrections that make local bases
//! globally conforming ([`populate_coefficients`] and [`populate_basis_subset`]).
//!
//! Local dofs are ordered per component block: node dofs, edge dofs, face dofs and finally
//! interior dofs, each in the local entity order of the reference geometry.
use crate::error::Error;
use crate::geometry::ReferenceGeometry;
use crate::mesh::Mesh;
use crate::transform::MapType;
use crate::Real;
use nalgebra::{DMatrixViewMut, DVectorView};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::{Display, Formatter};

pub mod lagrange;

mod hcurl;
mod hdiv;

use lagrange::LagrangeShape;

/// A finite element family.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FEType {
    /// Piecewise constants (no continuity).
    L2P0 { ncomponents: usize },
    /// Continuous piecewise linears on simplices.
    H1P1 { ncomponents: usize },
    /// Continuous (multi)linears on simplices and boxes.
    H1Q1 { ncomponents: usize },
    /// Continuous piecewise quadratics on simplices.
    H1P2 { ncomponents: usize },
    /// Lowest-order Raviart–Thomas: one normal flux per face.
    HDivRT0,
    /// Lowest-order Brezzi–Douglas–Marini: one normal flux per face node.
    HDivBDM1,
    /// Lowest-order Nédélec of the first kind: one tangential moment per edge.
    HCurlN0,
}

/// The continuity requirement of an element family.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Continuity {
    L2,
    H1,
    HDiv,
    HCurl,
}

impl FEType {
    pub fn continuity(&self) -> Continuity {
        match self {
            Self::L2P0 { .. } => Continuity::L2,
            Self::H1P1 { .. } | Self::H1Q1 { .. } | Self::H1P2 { .. } => Continuity::H1,
            Self::HDivRT0 | Self::HDivBDM1 => Continuity::HDiv,
            Self::HCurlN0 => Continuity::HCurl,
        }
    }

    /// The number of scalar components of the field at a point, for a mesh of the given
    /// dimension.
    pub fn ncomponents(&self, dim: usize) -> usize {
        match *self {
            Self::L2P0 { ncomponents }
            | Self::H1P1 { ncomponents }
            | Self::H1Q1 { ncomponents }
            | Self::H1P2 { ncomponents } => ncomponents,
            Self::HDivRT0 | Self::HDivBDM1 | Self::HCurlN0 => dim,
        }
    }

    /// The map that transforms reference basis values to physical space.
    pub fn map_type(&self) -> MapType {
        match self.continuity() {
            Continuity::L2 | Continuity::H1 => MapType::Identity,
            Continuity::HDiv => MapType::ContravariantPiola,
            Continuity::HCurl => MapType::CovariantPiola,
        }
    }

    pub fn is_supported_on(&self, geometry: ReferenceGeometry) -> bool {
        use ReferenceGeometry::*;
        match self {
            Self::L2P0 { .. } | Self::H1Q1 { .. } => true,
            Self::H1P1 { .. } => geometry.is_simplex(),
            Self::H1P2 { .. } => matches!(geometry, Edge | Triangle | Tetrahedron),
            Self::HDivRT0 | Self::HDivBDM1 | Self::HCurlN0 => matches!(geometry, Triangle | Tetrahedron),
        }
    }

    fn check_supported(&self, geometry: ReferenceGeometry) -> Result<(), Error> {
        if self.is_supported_on(geometry) {
            Ok(())
        } else {
            Err(Error::UnsupportedElement { fe: *self, geometry })
        }
    }
}

impl Display for FEType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::L2P0 { ncomponents } => write!(f, "L2P0({ncomponents})"),
            Self::H1P1 { ncomponents } => write!(f, "H1P1({ncomponents})"),
            Self::H1Q1 { ncomponents } => write!(f, "H1Q1({ncomponents})"),
            Self::H1P2 { ncomponents } => write!(f, "H1P2({ncomponents})"),
            Self::HDivRT0 => write!(f, "HDivRT0"),
            Self::HDivBDM1 => write!(f, "HDivBDM1"),
            Self::HCurlN0 => write!(f, "HCurlN0"),
        }
    }
}

/// Whether a dofmap pattern describes the dofs of a cell or the trace dofs of a face.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DofKind {
    Cell,
    Face,
}

/// The number of dofs attached to each kind of sub-entity, per component block.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct DofPattern {
    pub node: usize,
    pub edge: usize,
    pub face: usize,
    pub interior: usize,
    pub blocks: usize,
}

impl DofPattern {
    /// The total number of dofs on an item of the given geometry.
    pub fn num_dofs(&self, geometry: ReferenceGeometry) -> usize {
        let per_block = self.node * geometry.num_nodes()
            + self.edge * geometry.num_edges()
            + self.face * geometry.num_faces()
            + self.interior;
        self.blocks * per_block
    }
}

/// Returns the dofmap pattern of the element family for cells or faces of the given geometry.
///
/// In 2D, face dofs of triangles are reported as `face` dofs (and attached to mesh faces),
/// while edge dofs are attached to mesh edges, even though the two coincide geometrically.
pub fn dofmap_pattern(fe: FEType, kind: DofKind, geometry: ReferenceGeometry) -> Result<DofPattern, Error> {
    use ReferenceGeometry::*;
    let pattern = |node, edge, face, interior, blocks| DofPattern {
        node,
        edge,
        face,
        interior,
        blocks,
    };
    match kind {
        DofKind::Cell => {
            fe.check_supported(geometry)?;
            Ok(match fe {
                FEType::L2P0 { ncomponents } => pattern(0, 0, 0, 1, ncomponents),
                FEType::H1P1 { ncomponents } | FEType::H1Q1 { ncomponents } => pattern(1, 0, 0, 0, ncomponents),
                FEType::H1P2 { ncomponents } => match geometry {
                    Edge => pattern(1, 0, 0, 1, ncomponents),
                    _ => pattern(1, 1, 0, 0, ncomponents),
                },
                FEType::HDivRT0 => pattern(0, 0, 1, 0, 1),
                FEType::HDivBDM1 => pattern(0, 0, geometry.dim(), 0, 1),
                FEType::HCurlN0 => pattern(0, 1, 0, 0, 1),
            })
        }
        // The trace of the element on a face of the given (face) geometry
        DofKind::Face => Ok(match fe {
            FEType::L2P0 { .. } => pattern(0, 0, 0, 0, 0),
            FEType::H1P1 { ncomponents } | FEType::H1Q1 { ncomponents } => pattern(1, 0, 0, 0, ncomponents),
            FEType::H1P2 { ncomponents } => match geometry {
                Vertex => pattern(1, 0, 0, 0, ncomponents),
                Edge => pattern(1, 0, 0, 1, ncomponents),
                _ => pattern(1, 1, 0, 0, ncomponents),
            },
            FEType::HDivRT0 => pattern(0, 0, 0, 1, 1),
            FEType::HDivBDM1 => pattern(0, 0, 0, geometry.num_nodes(), 1),
            FEType::HCurlN0 => match geometry {
                Edge => pattern(0, 0, 0, 1, 1),
                _ => pattern(0, 1, 0, 0, 1),
            },
        }),
    }
}

/// The degree of the polynomial space spanned by the basis, used to select quadrature orders.
///
/// Multilinear bases on boxes count with their total degree.
pub fn polynomial_order(fe: FEType, geometry: ReferenceGeometry) -> usize {
    match fe {
        FEType::L2P0 { .. } => 0,
        FEType::H1P1 { .. } => 1,
        FEType::H1Q1 { .. } => {
            if geometry.is_simplex() {
                1
            } else {
                geometry.dim()
            }
        }
        FEType::H1P2 { .. } => 2,
        FEType::HDivRT0 | FEType::HDivBDM1 | FEType::HCurlN0 => 1,
    }
}

/// A reference basis: a pure function of the reference point.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReferenceBasis {
    Lagrange { shape: LagrangeShape, ncomponents: usize },
    RaviartThomas0(ReferenceGeometry),
    BrezziDouglasMarini1(ReferenceGeometry),
    Nedelec0(ReferenceGeometry),
}

/// Returns the reference basis of the element family on the given geometry.
pub fn get_basis(fe: FEType, geometry: ReferenceGeometry) -> Result<ReferenceBasis, Error> {
    fe.check_supported(geometry)?;
    let lagrange = |shape, ncomponents| ReferenceBasis::Lagrange { shape, ncomponents };
    Ok(match fe {
        FEType::L2P0 { ncomponents } => lagrange(LagrangeShape::Constant(geometry), ncomponents),
        FEType::H1P1 { ncomponents } => lagrange(LagrangeShape::Linear(geometry), ncomponents),
        FEType::H1Q1 { ncomponents } => {
            if geometry.is_simplex() {
                lagrange(LagrangeShape::Linear(geometry), ncomponents)
            } else {
                lagrange(LagrangeShape::Multilinear(geometry), ncomponents)
            }
        }
        FEType::H1P2 { ncomponents } => lagrange(LagrangeShape::Quadratic(geometry), ncomponents),
        FEType::HDivRT0 => ReferenceBasis::RaviartThomas0(geometry),
        FEType::HDivBDM1 => ReferenceBasis::BrezziDouglasMarini1(geometry),
        FEType::HCurlN0 => ReferenceBasis::Nedelec0(geometry),
    })
}

impl ReferenceBasis {
    pub fn geometry(&self) -> ReferenceGeometry {
        match *self {
            Self::Lagrange { shape, .. } => shape.geometry(),
            Self::RaviartThomas0(g) | Self::BrezziDouglasMarini1(g) | Self::Nedelec0(g) => g,
        }
    }

    pub fn num_dofs(&self) -> usize {
        match *self {
            Self::Lagrange { shape, ncomponents } => shape.num_shapes() * ncomponents,
            Self::RaviartThomas0(g) => g.num_faces(),
            Self::BrezziDouglasMarini1(g) => g.num_faces() * g.dim(),
            Self::Nedelec0(g) => g.num_edges(),
        }
    }

    /// The number of components of each basis function.
    pub fn ncomponents(&self) -> usize {
        match *self {
            Self::Lagrange { ncomponents, .. } => ncomponents,
            Self::RaviartThomas0(g) | Self::BrezziDouglasMarini1(g) | Self::Nedelec0(g) => g.dim(),
        }
    }

    pub fn supports_hessians(&self) -> bool {
        matches!(self, Self::Lagrange { .. })
    }

    /// Populates the values of all basis functions, one row per dof and one column per component.
    pub fn populate_values<T: Real>(&self, xi: DVectorView<T>, mut values: DMatrixViewMut<T>) {
        assert_eq!(values.shape(), (self.num_dofs(), self.ncomponents()), "Values must be num_dofs x ncomponents");
        match *self {
            Self::Lagrange { shape, ncomponents } => {
                let n = shape.num_shapes();
                let mut scalar = vec![T::zero(); n];
                shape.populate_values(xi, &mut scalar);
                values.fill(T::zero());
                for c in 0..ncomponents {
                    for (s, value) in scalar.iter().enumerate() {
                        values[(c * n + s, c)] = *value;
                    }
                }
            }
            Self::RaviartThomas0(g) => hdiv::populate_rt0_values(g, xi, values),
            Self::BrezziDouglasMarini1(g) => hdiv::populate_bdm1_values(g, xi, values),
            Self::Nedelec0(g) => hcurl::populate_n0_values(g, xi, values),
        }
    }

    /// Populates reference gradients, with row `i * ncomponents + c` holding the gradient of
    /// component `c` of basis function `i`.
    pub fn populate_gradients<T: Real>(&self, xi: DVectorView<T>, mut gradients: DMatrixViewMut<T>) {
        let dim = self.geometry().dim();
        assert_eq!(
            gradients.shape(),
            (self.num_dofs() * self.ncomponents(), dim),
            "Gradients must be (num_dofs * ncomponents) x dim"
        );
        match *self {
            Self::Lagrange { shape, ncomponents } => {
                let n = shape.num_shapes();
                let mut scalar = nalgebra::DMatrix::zeros(n, dim);
                shape.populate_gradients(xi, DMatrixViewMut::from(&mut scalar));
                gradients.fill(T::zero());
                for c in 0..ncomponents {
                    for s in 0..n {
                        let row = (c * n + s) * ncomponents + c;
                        gradients.row_mut(row).copy_from(&scalar.row(s));
                    }
                }
            }
            Self::RaviartThomas0(g) => hdiv::populate_rt0_gradients(g, gradients),
            Self::BrezziDouglasMarini1(g) => hdiv::populate_bdm1_gradients(g, gradients),
            Self::Nedelec0(g) => hcurl::populate_n0_gradients(g, gradients),
        }
    }

    /// Populates reference Hessians, with row `i * ncomponents + c` holding the row-major
    /// Hessian of component `c` of basis function `i`.
    ///
    /// # Panics
    ///
    /// Panics if the basis does not support Hessians (see [`Self::supports_hessians`]).
    pub fn populate_hessians<T: Real>(&self, xi: DVectorView<T>, mut hessians: DMatrixViewMut<T>) {
        let dim = self.geometry().dim();
        assert_eq!(
            hessians.shape(),
            (self.num_dofs() * self.ncomponents(), dim * dim),
            "Hessians must be (num_dofs * ncomponents) x dim^2"
        );
        match *self {
            Self::Lagrange { shape, ncomponents } => {
                let n = shape.num_shapes();
                let mut scalar = nalgebra::DMatrix::zeros(n, dim * dim);
                shape.populate_hessians(xi, DMatrixViewMut::from(&mut scalar));
                hessians.fill(T::zero());
                for c in 0..ncomponents {
                    for s in 0..n {
                        let row = (c * n + s) * ncomponents + c;
                        hessians.row_mut(row).copy_from(&scalar.row(s));
                    }
                }
            }
            _ => panic!("Hessians are only available for Lagrange bases"),
        }
    }
}

/// The local dof indices (in the local dof order of the cell geometry) associated with the
/// closure of the given local face.
pub fn local_face_dofs(fe: FEType, geometry: ReferenceGeometry, local_face: usize) -> Result<Vec<usize>, Error> {
    let pattern = dofmap_pattern(fe, DofKind::Cell, geometry)?;
    let face_nodes = geometry.face_nodes()[local_face];
    let per_block = pattern.num_dofs(geometry) / pattern.blocks.max(1);
    let num_nodes = geometry.num_nodes();
    let num_edges = geometry.num_edges();

    let mut dofs = Vec::new();
    for block in 0..pattern.blocks {
        let base = block * per_block;
        for node in 0..num_nodes {
            if face_nodes.contains(&node) {
                dofs.extend((0..pattern.node).map(|i| base + node * pattern.node + i));
            }
        }
        let edge_base = base + num_nodes * pattern.node;
        for (k, [a, b]) in geometry.edge_nodes().iter().enumerate() {
            if face_nodes.contains(a) && face_nodes.contains(b) {
                dofs.extend((0..pattern.edge).map(|i| edge_base + k * pattern.edge + i));
            }
        }
        let face_base = edge_base + num_edges * pattern.edge;
        dofs.extend((0..pattern.face).map(|i| face_base + local_face * pattern.face + i));
    }
    Ok(dofs)
}

/// Populates the per-cell coefficients (orientation signs) of the local basis functions.
///
/// Normal-continuous dofs are positive if the cell is the first neighbour of the face,
/// tangential-continuous dofs are positive if the local edge runs from the lower to the
/// higher global node.
pub fn populate_coefficients<T: Real>(fe: FEType, mesh: &Mesh<T>, cell: usize, coefficients: &mut [T]) {
    coefficients.fill(T::one());
    let geometry = mesh.cell_geometry(cell);
    match fe {
        FEType::HDivRT0 | FEType::HDivBDM1 => {
            let dofs_per_face = if fe == FEType::HDivRT0 { 1 } else { geometry.dim() };
            for (j, &face) in mesh.cell_faces(cell).iter().enumerate() {
                if mesh.face_cells(face).0 != cell {
                    coefficients[j * dofs_per_face..(j + 1) * dofs_per_face].fill(-T::one());
                }
            }
        }
        FEType::HCurlN0 => {
            let nodes = mesh.cell_nodes(cell);
            for (k, &[a, b]) in geometry.edge_nodes().iter().enumerate() {
                if nodes[a] > nodes[b] {
                    coefficients[k] = -T::one();
                }
            }
        }
        _ => {}
    }
}

/// Permutations of the nodes of an edge face, indexed by orientation code.
pub const EDGE_ORIENTATIONS: [[usize; 2]; 2] = [[0, 1], [1, 0]];

/// Permutations of the nodes of a triangle face, indexed by orientation code: rotations
/// first, then reflections.
pub const TRIANGLE_ORIENTATIONS: [[usize; 3]; 6] = [[0, 1, 2], [1, 2, 0], [2, 0, 1], [0, 2, 1], [2, 1, 0], [1, 0, 2]];

/// Determines the orientation code of the local face `local_face` of `cell`, i.e. the index
/// `o` of the permutation `p` for which the `m`-th global face node is the `p[m]`-th local
/// face node.
pub fn face_orientation<T: Real>(mesh: &Mesh<T>, cell: usize, local_face: usize) -> Option<usize> {
    let geometry = mesh.cell_geometry(cell);
    let cell_nodes = mesh.cell_nodes(cell);
    let local: Vec<usize> = geometry.face_nodes()[local_face]
        .iter()
        .map(|&k| cell_nodes[k])
        .collect();
    let global = mesh.face_nodes(mesh.cell_faces(cell)[local_face]);
    let matches = |p: &[usize]| p.iter().enumerate().all(|(m, &k)| local[k] == global[m]);
    match local.len() {
        2 => EDGE_ORIENTATIONS.iter().position(|p| matches(p)),
        3 => TRIANGLE_ORIENTATIONS.iter().position(|p| matches(p)),
        _ => None,
    }
}

/// Populates the basis subset of the cell: entry `i` is the reference basis function used
/// for local dof `i`.
///
/// This is the identity except for elements with several dofs per face, where the face
/// dofs of every cell are aligned with the node order of the global face.
pub fn populate_basis_subset<T: Real>(fe: FEType, mesh: &Mesh<T>, cell: usize, subset: &mut [usize]) -> Result<(), Error> {
    for (i, s) in subset.iter_mut().enumerate() {
        *s = i;
    }
    if fe == FEType::HDivBDM1 {
        let geometry = mesh.cell_geometry(cell);
        let dim = geometry.dim();
        for j in 0..geometry.num_faces() {
            let orientation = face_orientation(mesh, cell, j).ok_or(Error::MissingOrientation { fe, cell, face: j })?;
            let permutation: &[usize] = match dim {
                2 => &EDGE_ORIENTATIONS[orientation],
                _ => &TRIANGLE_ORIENTATIONS[orientation],
            };
            for (m, &k) in permutation.iter().enumerate() {
                subset[j * dim + m] = j * dim + k;
            }
        }
    }
    Ok(())
}
