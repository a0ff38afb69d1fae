//! Finite element spaces: global dof numbering on a mesh, and coefficient vectors.
use crate::connectivity::NestedTable;
use crate::element::{dofmap_pattern, local_face_dofs, polynomial_order, DofKind, DofPattern, FEType};
use crate::error::Error;
use crate::mesh::Mesh;
use crate::Real;
use nalgebra::DVector;

/// A finite element space: an element family on a mesh with a global dof numbering.
///
/// Global dofs are numbered in component blocks. Within each block, node dofs come first,
/// followed by edge, face and interior (cell) dofs, each ordered by the mesh entity index.
#[derive(Debug, Clone)]
pub struct FESpace<'m, T: Real> {
    fe: FEType,
    mesh: &'m Mesh<T>,
    cell_dofs: NestedTable<usize>,
    face_dofs: NestedTable<usize>,
    ndofs: usize,
}

impl<'m, T: Real> FESpace<'m, T> {
    pub fn new(mesh: &'m Mesh<T>, fe: FEType) -> Result<Self, Error> {
        let geometries = mesh.cell_geometries();
        let patterns = geometries
            .iter()
            .map(|&g| dofmap_pattern(fe, DofKind::Cell, g))
            .collect::<Result<Vec<_>, _>>()?;
        // Mixed meshes use the largest count of each entity kind
        let max = patterns
            .iter()
            .fold(DofPattern::default(), |acc, p| DofPattern {
                node: acc.node.max(p.node),
                edge: acc.edge.max(p.edge),
                face: acc.face.max(p.face),
                interior: acc.interior.max(p.interior),
                blocks: acc.blocks.max(p.blocks),
            });

        let edge_offset = mesh.num_nodes() * max.node;
        let face_offset = edge_offset + mesh.num_edges() * max.edge;
        let interior_offset = face_offset + mesh.num_faces() * max.face;
        let block_size = interior_offset + mesh.num_cells() * max.interior;

        let mut cell_dofs = NestedTable::new();
        for cell in 0..mesh.num_cells() {
            let geometry = mesh.cell_geometry(cell);
            let pattern = dofmap_pattern(fe, DofKind::Cell, geometry)?;
            let mut dofs = Vec::with_capacity(pattern.num_dofs(geometry));
            for block in 0..pattern.blocks {
                let base = block * block_size;
                for &node in mesh.cell_nodes(cell) {
                    dofs.extend((0..pattern.node).map(|i| base + node * max.node + i));
                }
                for &edge in mesh.cell_edges(cell) {
                    dofs.extend((0..pattern.edge).map(|i| base + edge_offset + edge * max.edge + i));
                }
                for &face in mesh.cell_faces(cell) {
                    dofs.extend((0..pattern.face).map(|i| base + face_offset + face * max.face + i));
                }
                dofs.extend((0..pattern.interior).map(|i| base + interior_offset + cell * max.interior + i));
            }
            cell_dofs.push(&dofs);
        }

        let mut face_dofs = NestedTable::new();
        for face in 0..mesh.num_faces() {
            let (cell, _) = mesh.face_cells(face);
            let (local_face, _) = mesh.face_local_indices(face);
            let local = local_face_dofs(fe, mesh.cell_geometry(cell), local_face)?;
            let dofs = cell_dofs.row(cell);
            face_dofs.push_iter(local.into_iter().map(|i| dofs[i]));
        }

        Ok(Self {
            fe,
            mesh,
            cell_dofs,
            face_dofs,
            ndofs: max.blocks * block_size,
        })
    }

    pub fn fe(&self) -> FEType {
        self.fe
    }

    pub fn mesh(&self) -> &'m Mesh<T> {
        self.mesh
    }

    pub fn ndofs(&self) -> usize {
        self.ndofs
    }

    /// The number of components of the field at a point.
    pub fn ncomponents(&self) -> usize {
        self.fe.ncomponents(self.mesh.dim())
    }

    /// Global dofs of the cell, in local dof order.
    pub fn cell_dofs(&self, cell: usize) -> &[usize] {
        self.cell_dofs.row(cell)
    }

    /// Global dofs in the closure of the face.
    pub fn face_dofs(&self, face: usize) -> &[usize] {
        self.face_dofs.row(face)
    }

    pub fn max_cell_dofs(&self) -> usize {
        self.cell_dofs.iter().map(<[usize]>::len).max().unwrap_or(0)
    }

    /// The largest polynomial order of the basis over the cell geometries of the mesh.
    pub fn polynomial_order(&self) -> usize {
        self.mesh
            .cell_geometries()
            .into_iter()
            .map(|g| polynomial_order(self.fe, g))
            .max()
            .unwrap_or(0)
    }
}

/// A finite element function: a coefficient vector in a finite element space.
#[derive(Debug, Clone)]
pub struct FEVector<'a, 'm, T: Real> {
    space: &'a FESpace<'m, T>,
    coefficients: DVector<T>,
}

impl<'a, 'm, T: Real> FEVector<'a, 'm, T> {
    pub fn zeros(space: &'a FESpace<'m, T>) -> Self {
        Self {
            space,
            coefficients: DVector::zeros(space.ndofs()),
        }
    }

    pub fn from_coefficients(space: &'a FESpace<'m, T>, coefficients: DVector<T>) -> Result<Self, Error> {
        if coefficients.len() != space.ndofs() {
            return Err(Error::IncompatibleDimensions {
                expected: space.ndofs(),
                actual: coefficients.len(),
            });
        }
        Ok(Self { space, coefficients })
    }

    pub fn space(&self) -> &'a FESpace<'m, T> {
        self.space
    }

    pub fn coefficients(&self) -> &DVector<T> {
        &self.coefficients
    }

    pub fn coefficients_mut(&mut self) -> &mut DVector<T> {
        &mut self.coefficients
    }

    pub fn into_coefficients(self) -> DVector<T> {
        self.coefficients
    }

    /// Gathers the coefficients of the cell's dofs into `local`.
    pub fn gather_cell(&self, cell: usize, local: &mut Vec<T>) {
        local.clear();
        local.extend(self.space.cell_dofs(cell).iter().map(|&dof| self.coefficients[dof]));
    }
}
