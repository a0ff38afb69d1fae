//! Unstructured meshes with the adjacency data needed for assembly.
//!
//! A mesh stores node coordinates and cell connectivity and derives faces, edges, boundary
//! faces, measures and normals from them. The node order of a face is the local order of
//! the lowest-numbered adjacent cell, which in turn defines the orientation of the face:
//! its normal is the outward normal of that cell.
use crate::connectivity::NestedTable;
use crate::error::Error;
use crate::geometry::ReferenceGeometry;
use crate::quadrature::QuadratureRule;
use crate::transform::{map_reference_point, populate_jacobian, volume_scaling};
use crate::Real;
use itertools::Itertools;
use nalgebra::{DMatrix, DMatrixViewMut, DVector, DVectorView};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

pub mod procedural;

/// The kind of mesh item an assembly pass iterates over.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    Cells,
    Faces,
    BoundaryFaces,
}

/// Region tag of interior faces.
pub const INTERIOR_REGION: usize = 0;
/// Default region tag of boundary faces and cells.
pub const DEFAULT_REGION: usize = 1;

#[derive(Debug, Clone)]
pub struct Mesh<T: Real> {
    coordinates: DMatrix<T>,
    cell_nodes: NestedTable<usize>,
    cell_geometries: Vec<ReferenceGeometry>,
    cell_regions: Vec<usize>,
    cell_volumes: Vec<T>,
    cell_faces: NestedTable<usize>,
    cell_edges: NestedTable<usize>,
    face_nodes: NestedTable<usize>,
    face_geometries: Vec<ReferenceGeometry>,
    face_cells: Vec<(usize, Option<usize>)>,
    face_local_indices: Vec<(usize, Option<usize>)>,
    face_regions: Vec<usize>,
    face_volumes: Vec<T>,
    face_normals: DMatrix<T>,
    face_edges: NestedTable<usize>,
    boundary_faces: Vec<usize>,
    edge_nodes: Vec<[usize; 2]>,
}

fn sorted_key(nodes: &[usize]) -> Vec<usize> {
    let mut key = nodes.to_vec();
    key.sort_unstable();
    key
}

fn edge_key(a: usize, b: usize) -> (usize, usize) {
    (a.min(b), a.max(b))
}

/// Computes the measure of an item by integrating its volume scaling.
fn item_measure<T: Real>(geometry: ReferenceGeometry, nodes: &DMatrix<T>) -> Result<T, Error> {
    if geometry == ReferenceGeometry::Vertex {
        return Ok(T::one());
    }
    // A single point is exact for affine maps, a second order rule is exact for the
    // (multi)linear Jacobian determinants of quadrilaterals in 2D
    let order = if geometry.is_affine() { 0 } else { 2 * geometry.dim() };
    let rule = QuadratureRule::<T>::cached(geometry, order)?;
    let mut jacobian = DMatrix::zeros(nodes.nrows(), geometry.dim());
    let mut measure = T::zero();
    for (q, w) in rule.weights().iter().enumerate() {
        populate_jacobian(geometry, nodes, rule.point(q), DMatrixViewMut::from(&mut jacobian));
        measure += *w * volume_scaling(&jacobian);
    }
    Ok(measure)
}

/// Orthonormalizes the given tangent vectors with modified Gram–Schmidt.
fn orthonormal_tangents<T: Real>(tangents: Vec<DVector<T>>) -> Vec<DVector<T>> {
    let mut basis: Vec<DVector<T>> = Vec::with_capacity(tangents.len());
    for mut t in tangents {
        for b in &basis {
            let projection = t.dot(b);
            t.axpy(-projection, b, T::one());
        }
        let norm = t.norm();
        if norm > T::zero() {
            basis.push(t / norm);
        }
    }
    basis
}

impl<T: Real> Mesh<T> {
    /// Constructs a mesh from node coordinates (stored column-wise, `dim x num_nodes`), the
    /// geometry of each cell and the nodes of each cell.
    ///
    /// All cells are assigned region [`DEFAULT_REGION`], boundary faces are assigned
    /// [`DEFAULT_REGION`] and interior faces [`INTERIOR_REGION`].
    pub fn try_new(
        coordinates: DMatrix<T>,
        cell_geometries: Vec<ReferenceGeometry>,
        cell_nodes: NestedTable<usize>,
    ) -> Result<Self, Error> {
        let dim = coordinates.nrows();
        let num_nodes = coordinates.ncols();
        if cell_geometries.len() != cell_nodes.len() {
            return Err(Error::InvalidMesh {
                message: format!(
                    "{} cell geometries given for {} cells",
                    cell_geometries.len(),
                    cell_nodes.len()
                ),
            });
        }
        for (cell, (geometry, nodes)) in cell_geometries.iter().zip(cell_nodes.iter()).enumerate() {
            if geometry.dim() > dim {
                return Err(Error::InvalidMesh {
                    message: format!("cell {cell} of geometry {geometry} cannot be embedded in {dim}D"),
                });
            }
            if nodes.len() != geometry.num_nodes() {
                return Err(Error::InvalidMesh {
                    message: format!("cell {cell} of geometry {geometry} has {} nodes", nodes.len()),
                });
            }
            if let Some(node) = nodes.iter().find(|&&node| node >= num_nodes) {
                return Err(Error::InvalidMesh {
                    message: format!("cell {cell} refers to node {node}, but there are only {num_nodes} nodes"),
                });
            }
        }

        let num_cells = cell_nodes.len();
        let mut face_map: FxHashMap<Vec<usize>, usize> = FxHashMap::default();
        let mut edge_map: FxHashMap<(usize, usize), usize> = FxHashMap::default();
        let mut cell_faces = NestedTable::new();
        let mut cell_edges = NestedTable::new();
        let mut face_nodes = NestedTable::new();
        let mut face_geometries = Vec::new();
        let mut face_cells: Vec<(usize, Option<usize>)> = Vec::new();
        let mut face_local_indices: Vec<(usize, Option<usize>)> = Vec::new();
        let mut edge_nodes = Vec::new();

        for (cell, nodes) in cell_nodes.iter().enumerate() {
            let geometry = cell_geometries[cell];
            let mut faces_of_cell = Vec::with_capacity(geometry.num_faces());
            for (local_face, local_nodes) in geometry.face_nodes().iter().enumerate() {
                let global_nodes: Vec<usize> = local_nodes.iter().map(|&k| nodes[k]).collect();
                let key = sorted_key(&global_nodes);
                let face = match face_map.get(&key) {
                    Some(&face) => {
                        if face_cells[face].1.is_some() {
                            return Err(Error::InvalidMesh {
                                message: format!("face {face} is shared by more than two cells"),
                            });
                        }
                        face_cells[face].1 = Some(cell);
                        face_local_indices[face].1 = Some(local_face);
                        face
                    }
                    None => {
                        let face = face_geometries.len();
                        face_map.insert(key, face);
                        face_nodes.push(&global_nodes);
                        face_geometries.push(
                            geometry
                                .face_geometry()
                                .expect("Internal error: geometries with faces have a face geometry"),
                        );
                        face_cells.push((cell, None));
                        face_local_indices.push((local_face, None));
                        face
                    }
                };
                faces_of_cell.push(face);
            }
            cell_faces.push(&faces_of_cell);

            let mut edges_of_cell = Vec::with_capacity(geometry.num_edges());
            for &[a, b] in geometry.edge_nodes() {
                let key = edge_key(nodes[a], nodes[b]);
                let next_index = edge_nodes.len();
                let edge = *edge_map.entry(key).or_insert(next_index);
                if edge == next_index {
                    edge_nodes.push([key.0, key.1]);
                }
                edges_of_cell.push(edge);
            }
            cell_edges.push(&edges_of_cell);
        }

        let mut face_edges = NestedTable::new();
        for (face, nodes) in face_nodes.iter().enumerate() {
            let face_geometry = face_geometries[face];
            let edges: Vec<usize> = if face_geometry == ReferenceGeometry::Edge {
                edge_map
                    .get(&edge_key(nodes[0], nodes[1]))
                    .into_iter()
                    .copied()
                    .collect()
            } else {
                face_geometry
                    .edge_nodes()
                    .iter()
                    .filter_map(|&[a, b]| edge_map.get(&edge_key(nodes[a], nodes[b])).copied())
                    .collect()
            };
            face_edges.push(&edges);
        }

        let num_faces = face_geometries.len();
        let boundary_faces: Vec<usize> = (0..num_faces)
            .filter(|&face| face_cells[face].1.is_none())
            .collect();
        let face_regions = (0..num_faces)
            .map(|face| {
                if face_cells[face].1.is_none() {
                    DEFAULT_REGION
                } else {
                    INTERIOR_REGION
                }
            })
            .collect();

        let mut mesh = Self {
            coordinates,
            cell_nodes,
            cell_geometries,
            cell_regions: vec![DEFAULT_REGION; num_cells],
            cell_volumes: Vec::with_capacity(num_cells),
            cell_faces,
            cell_edges,
            face_nodes,
            face_geometries,
            face_cells,
            face_local_indices,
            face_regions,
            face_volumes: Vec::with_capacity(num_faces),
            face_normals: DMatrix::zeros(dim, num_faces),
            face_edges,
            boundary_faces,
            edge_nodes,
        };
        mesh.compute_measures()?;
        Ok(mesh)
    }

    fn item_coordinates(&self, nodes: &[usize]) -> DMatrix<T> {
        DMatrix::from_fn(self.dim(), nodes.len(), |i, k| self.coordinates[(i, nodes[k])])
    }

    fn centroid(&self, nodes: &[usize]) -> DVector<T> {
        let coords = self.item_coordinates(nodes);
        coords.column_mean()
    }

    fn compute_measures(&mut self) -> Result<(), Error> {
        for cell in 0..self.num_cells() {
            let geometry = self.cell_geometries[cell];
            let coords = self.item_coordinates(self.cell_nodes.row(cell));
            let volume = item_measure(geometry, &coords)?;
            if volume <= T::zero() {
                return Err(Error::DegenerateItem { item: cell });
            }
            self.cell_volumes.push(volume);
        }

        for face in 0..self.num_faces() {
            let geometry = self.face_geometries[face];
            let nodes = self.face_nodes.row(face);
            let coords = self.item_coordinates(nodes);
            self.face_volumes.push(item_measure(geometry, &coords)?);

            // The normal is the component of (face centroid - cell centroid) orthogonal to
            // the face, which lies in the plane of the cell also for embedded cells
            let (cell, _) = self.face_cells[face];
            let spanning = geometry.affine_spanning_nodes();
            let tangents = spanning
                .iter()
                .skip(1)
                .map(|&s| coords.column(s) - coords.column(spanning[0]))
                .collect();
            let mut normal = self.centroid(nodes) - self.centroid(self.cell_nodes.row(cell));
            for t in orthonormal_tangents(tangents) {
                let projection = normal.dot(&t);
                normal.axpy(-projection, &t, T::one());
            }
            let norm = normal.norm();
            if norm <= T::zero() {
                return Err(Error::DegenerateItem { item: cell });
            }
            self.face_normals.column_mut(face).copy_from(&(normal / norm));
        }
        Ok(())
    }

    /// Assigns region tags to cells using the given function of the cell centroid.
    pub fn with_cell_regions(mut self, region: impl Fn(DVectorView<T>) -> usize) -> Self {
        for cell in 0..self.num_cells() {
            let centroid = self.centroid(self.cell_nodes.row(cell));
            self.cell_regions[cell] = region(DVectorView::from(&centroid));
        }
        self
    }

    /// Assigns region tags to boundary faces using the given function of the face centroid.
    pub fn with_boundary_regions(mut self, region: impl Fn(DVectorView<T>) -> usize) -> Self {
        for i in 0..self.boundary_faces.len() {
            let face = self.boundary_faces[i];
            let centroid = self.centroid(self.face_nodes.row(face));
            self.face_regions[face] = region(DVectorView::from(&centroid));
        }
        self
    }

    /// Ambient dimension.
    pub fn dim(&self) -> usize {
        self.coordinates.nrows()
    }

    pub fn num_nodes(&self) -> usize {
        self.coordinates.ncols()
    }

    pub fn num_cells(&self) -> usize {
        self.cell_nodes.len()
    }

    pub fn num_faces(&self) -> usize {
        self.face_geometries.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edge_nodes.len()
    }

    /// Node coordinates, stored column-wise.
    pub fn coordinates(&self) -> &DMatrix<T> {
        &self.coordinates
    }

    pub fn cell_nodes(&self, cell: usize) -> &[usize] {
        self.cell_nodes.row(cell)
    }

    pub fn cell_geometry(&self, cell: usize) -> ReferenceGeometry {
        self.cell_geometries[cell]
    }

    /// The distinct cell geometries present in the mesh, in sorted order.
    pub fn cell_geometries(&self) -> Vec<ReferenceGeometry> {
        self.cell_geometries.iter().copied().sorted().dedup().collect()
    }

    pub fn cell_region(&self, cell: usize) -> usize {
        self.cell_regions[cell]
    }

    pub fn cell_volume(&self, cell: usize) -> T {
        self.cell_volumes[cell]
    }

    /// Global face indices of the cell, in the order of the local faces of its geometry.
    pub fn cell_faces(&self, cell: usize) -> &[usize] {
        self.cell_faces.row(cell)
    }

    /// Global edge indices of the cell, in the order of the local edges of its geometry.
    pub fn cell_edges(&self, cell: usize) -> &[usize] {
        self.cell_edges.row(cell)
    }

    /// Global face nodes, in the order that defines the face orientation.
    pub fn face_nodes(&self, face: usize) -> &[usize] {
        self.face_nodes.row(face)
    }

    pub fn face_geometry(&self, face: usize) -> ReferenceGeometry {
        self.face_geometries[face]
    }

    /// The cells adjacent to the face. The first cell has the lower index.
    pub fn face_cells(&self, face: usize) -> (usize, Option<usize>) {
        self.face_cells[face]
    }

    /// The local index of the face in each of its adjacent cells.
    pub fn face_local_indices(&self, face: usize) -> (usize, Option<usize>) {
        self.face_local_indices[face]
    }

    pub fn face_region(&self, face: usize) -> usize {
        self.face_regions[face]
    }

    pub fn face_volume(&self, face: usize) -> T {
        self.face_volumes[face]
    }

    /// Unit normal of the face, pointing out of the first adjacent cell.
    pub fn face_normal(&self, face: usize) -> DVectorView<T> {
        self.face_normals.column(face)
    }

    pub fn face_edges(&self, face: usize) -> &[usize] {
        self.face_edges.row(face)
    }

    pub fn boundary_faces(&self) -> &[usize] {
        &self.boundary_faces
    }

    pub fn is_boundary_face(&self, face: usize) -> bool {
        self.face_cells[face].1.is_none()
    }

    /// The nodes of the edge, in ascending order. This order defines the edge direction.
    pub fn edge_nodes(&self, edge: usize) -> [usize; 2] {
        self.edge_nodes[edge]
    }

    /// Maps a reference point of the given cell to physical space.
    pub fn map_cell_point(&self, cell: usize, xi: DVectorView<T>) -> DVector<T> {
        let coords = self.item_coordinates(self.cell_nodes(cell));
        map_reference_point(self.cell_geometry(cell), &coords, xi)
    }

    /// The items of the given kind whose region is in `regions` (all items if `regions` is `None`).
    pub fn items(&self, kind: ItemKind, regions: Option<&[usize]>) -> Vec<usize> {
        let in_regions = |region: usize| regions.map_or(true, |regions| regions.contains(&region));
        match kind {
            ItemKind::Cells => (0..self.num_cells())
                .filter(|&cell| in_regions(self.cell_regions[cell]))
                .collect(),
            ItemKind::Faces => (0..self.num_faces())
                .filter(|&face| in_regions(self.face_regions[face]))
                .collect(),
            ItemKind::BoundaryFaces => self
                .boundary_faces
                .iter()
                .copied()
                .filter(|&face| in_regions(self.face_regions[face]))
                .collect(),
        }
    }
}
