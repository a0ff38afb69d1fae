//! Maps from reference geometries to physical mesh items.
use crate::element::lagrange::LagrangeShape;
use crate::error::Error;
use crate::geometry::ReferenceGeometry;
use crate::mesh::{ItemKind, Mesh};
use crate::Real;
use nalgebra::{DMatrix, DMatrixViewMut, DVector, DVectorView, DVectorViewMut};
use numeric_literals::replace_float_literals;
use serde::{Deserialize, Serialize};

/// The kind of map used to transform reference quantities to physical space.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MapType {
    /// Point map from reference to physical coordinates.
    Identity,
    /// Covariant map `J^{-T}`, used for gradients and tangential-continuous fields.
    CovariantPiola,
    /// Contravariant Piola map `J / |det J|`, used for normal-continuous fields.
    ContravariantPiola,
}

/// Checks whether the given map is defined for items of the given geometry embedded in
/// `ambient_dim`-dimensional space.
pub fn check_map_supported(geometry: ReferenceGeometry, ambient_dim: usize, map: MapType) -> Result<(), Error> {
    use ReferenceGeometry::*;
    let supported = match map {
        MapType::Identity => geometry.dim() <= ambient_dim,
        MapType::CovariantPiola => matches!(
            (geometry, ambient_dim),
            (Edge, 1 | 2) | (Triangle | Quadrilateral, 2 | 3) | (Tetrahedron | Parallelepiped | Hexahedron, 3)
        ),
        MapType::ContravariantPiola => geometry.dim() == ambient_dim && geometry.dim() > 0,
    };
    if supported {
        Ok(())
    } else {
        Err(Error::UnsupportedTransformation {
            geometry,
            ambient_dim,
            map,
        })
    }
}

/// Computes the Jacobian `dx/dxi` of the map of an item with the given node coordinates
/// (stored column-wise) at the reference point `xi`.
pub fn populate_jacobian<T: Real>(
    geometry: ReferenceGeometry,
    nodes: &DMatrix<T>,
    xi: DVectorView<T>,
    mut jacobian: DMatrixViewMut<T>,
) {
    let dim = geometry.dim();
    assert_eq!(jacobian.shape(), (nodes.nrows(), dim), "Jacobian must be ambient_dim x reference_dim");
    if geometry.is_affine() {
        let spanning = geometry.affine_spanning_nodes();
        let origin = nodes.column(spanning[0]);
        for (k, &s) in spanning.iter().skip(1).enumerate() {
            jacobian.column_mut(k).copy_from(&(nodes.column(s) - origin));
        }
    } else {
        let shape = LagrangeShape::Multilinear(geometry);
        let mut gradients = DMatrix::zeros(shape.num_shapes(), dim);
        shape.populate_gradients(xi, DMatrixViewMut::from(&mut gradients));
        // J = X G, with X the node coordinates and G the shape gradients
        nodes.mul_to(&gradients, &mut jacobian);
    }
}

/// Maps the reference point `xi` of an item with the given node coordinates to physical space.
pub fn map_reference_point<T: Real>(geometry: ReferenceGeometry, nodes: &DMatrix<T>, xi: DVectorView<T>) -> DVector<T> {
    let mut x = DVector::zeros(nodes.nrows());
    populate_reference_point(geometry, nodes, xi, DVectorViewMut::from(&mut x));
    x
}

/// Writes the physical coordinates of the reference point `xi` into `x`.
pub fn populate_reference_point<T: Real>(
    geometry: ReferenceGeometry,
    nodes: &DMatrix<T>,
    xi: DVectorView<T>,
    mut x: DVectorViewMut<T>,
) {
    if geometry.is_affine() {
        let spanning = geometry.affine_spanning_nodes();
        let origin = spanning[0];
        x.copy_from(&nodes.column(origin));
        for (k, &s) in spanning.iter().skip(1).enumerate() {
            for d in 0..nodes.nrows() {
                x[d] += (nodes[(d, s)] - nodes[(d, origin)]) * xi[k];
            }
        }
    } else {
        let shape = LagrangeShape::Multilinear(geometry);
        let n = shape.num_shapes();
        let mut values = [T::zero(); 8];
        shape.populate_values(xi, &mut values[..n]);
        x.fill(T::zero());
        for (k, &value) in values[..n].iter().enumerate() {
            x.axpy(value, &nodes.column(k), T::one());
        }
    }
}

/// The measure scaling `sqrt(det(J^T J))` (which is `|det J|` for square Jacobians).
pub fn volume_scaling<T: Real>(jacobian: &DMatrix<T>) -> T {
    if jacobian.is_square() {
        jacobian.determinant().abs()
    } else if jacobian.ncols() <= 2 {
        surface_measure(jacobian)
    } else {
        (jacobian.transpose() * jacobian).determinant().abs().sqrt()
    }
}

/// The columns span the local face of the reference cell, in the parametrization used by
/// [`QuadratureRule::map_to_cell_face`](crate::quadrature::QuadratureRule::map_to_cell_face).
fn populate_face_tangents<T: Real>(geometry: ReferenceGeometry, local_face: usize, tangents: &mut DMatrix<T>) {
    let Some(face_geometry) = geometry.face_geometry() else {
        return;
    };
    let face_nodes = geometry.face_nodes()[local_face];
    let nodes = geometry.reference_nodes();
    let spanning = face_geometry.affine_spanning_nodes();
    let origin = nodes[face_nodes[spanning[0]]];
    tangents.resize_mut(geometry.dim(), spanning.len() - 1, T::zero());
    for (k, &s) in spanning.iter().skip(1).enumerate() {
        for i in 0..geometry.dim() {
            tangents[(i, k)] = T::from_tabulated(nodes[face_nodes[s]][i] - origin[i]);
        }
    }
}

/// The measure `sqrt(det(S^T S))` of the parallelotope spanned by at most two columns.
fn surface_measure<T: Real>(tangents: &DMatrix<T>) -> T {
    match tangents.ncols() {
        0 => T::one(),
        1 => tangents.column(0).norm(),
        _ => {
            let (a, b) = (tangents.column(0), tangents.column(1));
            let ab = a.dot(&b);
            (a.norm_squared() * b.norm_squared() - ab * ab)
                .max(T::zero())
                .sqrt()
        }
    }
}

#[replace_float_literals(T::from_f64(literal).unwrap())]
fn is_degenerate<T: Real>(jacobian: &DMatrix<T>, volume: T) -> bool {
    // Hadamard's inequality bounds the volume by the product of the column norms
    let bound = jacobian
        .column_iter()
        .fold(T::one(), |prod, column| prod * column.norm());
    volume <= 1e-12 * bound
}

/// Per-item geometric state mapping the reference domain to the current mesh item.
///
/// The state refers to the most recently updated item only. For face items, the map is the
/// map of the first cell adjacent to the face, and the face is identified by its local
/// index in that cell.
#[derive(Debug, Clone)]
pub struct GeometricTransformer<'a, T: Real> {
    mesh: &'a Mesh<T>,
    items: ItemKind,
    current_item: Option<usize>,
    cell: usize,
    local_face: Option<usize>,
    geometry: ReferenceGeometry,
    nodes: DMatrix<T>,
    jacobian: DMatrix<T>,
    inverse_transpose: DMatrix<T>,
    determinant: T,
    volume: T,
    reference_orientation: T,
    face_scaling: T,
    face_tangents: DMatrix<T>,
    face_jacobian: DMatrix<T>,
}

impl<'a, T: Real> GeometricTransformer<'a, T> {
    pub fn new(mesh: &'a Mesh<T>, items: ItemKind) -> Self {
        Self {
            mesh,
            items,
            current_item: None,
            cell: usize::MAX,
            local_face: None,
            geometry: ReferenceGeometry::Vertex,
            nodes: DMatrix::zeros(mesh.dim(), 0),
            jacobian: DMatrix::zeros(mesh.dim(), 0),
            inverse_transpose: DMatrix::zeros(mesh.dim(), 0),
            determinant: T::one(),
            volume: T::one(),
            reference_orientation: T::one(),
            face_scaling: T::one(),
            face_tangents: DMatrix::zeros(0, 0),
            face_jacobian: DMatrix::zeros(mesh.dim(), 0),
        }
    }

    pub fn mesh(&self) -> &'a Mesh<T> {
        self.mesh
    }

    pub fn items(&self) -> ItemKind {
        self.items
    }

    /// The most recently updated item, if any.
    pub fn current_item(&self) -> Option<usize> {
        self.current_item
    }

    /// The cell whose map is currently held.
    pub fn cell(&self) -> usize {
        self.cell
    }

    /// The local index of the current face in [`Self::cell`] for face items.
    pub fn local_face(&self) -> Option<usize> {
        self.local_face
    }

    /// The reference geometry of the current cell.
    pub fn geometry(&self) -> ReferenceGeometry {
        self.geometry
    }

    /// Updates the state to the given item (cell or face index, depending on the item kind).
    ///
    /// This is a no-op if the item is already current. For non-affine geometries, the
    /// point-dependent quantities are evaluated at the reference cell center until
    /// [`Self::update_point`] is called.
    ///
    /// Faces of affine cells are scaled by the constant `|F| / |F_ref|` taken from the mesh.
    /// Faces of multilinear cells may be warped, so their scaling is recomputed per point
    /// from the surface Jacobian.
    pub fn update(&mut self, item: usize) -> Result<(), Error> {
        if self.current_item == Some(item) {
            return Ok(());
        }
        self.current_item = None;

        let (cell, local_face) = match self.items {
            ItemKind::Cells => (item, None),
            ItemKind::Faces | ItemKind::BoundaryFaces => {
                let (cell, _) = self.mesh.face_cells(item);
                let (local_face, _) = self.mesh.face_local_indices(item);
                let face_geometry = self.mesh.face_geometry(item);
                self.face_scaling =
                    self.mesh.face_volume(item) / T::from_tabulated(face_geometry.reference_volume());
                (cell, Some(local_face))
            }
        };

        self.geometry = self.mesh.cell_geometry(cell);
        self.cell = cell;
        self.local_face = local_face;
        if let Some(local_face) = local_face {
            if !self.geometry.is_affine() {
                populate_face_tangents(self.geometry, local_face, &mut self.face_tangents);
            }
        }
        let cell_nodes = self.mesh.cell_nodes(cell);
        let ambient_dim = self.mesh.dim();
        self.nodes
            .resize_mut(ambient_dim, cell_nodes.len(), T::zero());
        for (k, &node) in cell_nodes.iter().enumerate() {
            self.nodes
                .column_mut(k)
                .copy_from(&self.mesh.coordinates().column(node));
        }

        let center = reference_center::<T>(self.geometry);
        self.compute_point_quantities(DVectorView::from(&center), cell, false)?;
        self.reference_orientation = self.determinant.signum();
        self.current_item = Some(item);
        Ok(())
    }

    /// Re-evaluates the point-dependent quantities at the given reference point.
    ///
    /// This is a no-op for affine geometries.
    pub fn update_point(&mut self, xi: DVectorView<T>) -> Result<(), Error> {
        if !self.geometry.is_affine() {
            self.compute_point_quantities(xi, self.cell, true)?;
        }
        Ok(())
    }

    fn compute_point_quantities(&mut self, xi: DVectorView<T>, cell: usize, check_orientation: bool) -> Result<(), Error> {
        let ref_dim = self.geometry.dim();
        self.jacobian
            .resize_mut(self.mesh.dim(), ref_dim, T::zero());
        populate_jacobian(self.geometry, &self.nodes, xi, DMatrixViewMut::from(&mut self.jacobian));

        if self.jacobian.is_square() {
            self.determinant = self.jacobian.determinant();
            self.volume = self.determinant.abs();
        } else {
            self.volume = volume_scaling(&self.jacobian);
            self.determinant = self.volume;
        }

        if self.local_face.is_some() && !self.geometry.is_affine() {
            self.face_jacobian
                .resize_mut(self.mesh.dim(), self.face_tangents.ncols(), T::zero());
            self.face_jacobian
                .gemm(T::one(), &self.jacobian, &self.face_tangents, T::zero());
            self.face_scaling = surface_measure(&self.face_jacobian);
        }

        // A sign change relative to the cell center indicates an inverted multilinear cell
        let inverted = check_orientation && self.determinant * self.reference_orientation <= T::zero();
        if ref_dim > 0 && (inverted || is_degenerate(&self.jacobian, self.volume)) {
            return Err(Error::DegenerateItem { item: cell });
        }

        self.inverse_transpose
            .resize_mut(self.mesh.dim(), ref_dim, T::zero());
        if ref_dim == 0 {
            return Ok(());
        }
        if self.jacobian.is_square() {
            self.inverse_transpose.copy_from(&self.jacobian);
            if !self.inverse_transpose.try_inverse_mut() {
                return Err(Error::DegenerateItem { item: cell });
            }
            self.inverse_transpose.transpose_mut();
        } else {
            // Pseudo-inverse transpose J (J^T J)^{-1} for items embedded in higher dimensions
            let gram = self.jacobian.transpose() * &self.jacobian;
            let gram_inv = gram
                .try_inverse()
                .ok_or(Error::DegenerateItem { item: cell })?;
            self.inverse_transpose = &self.jacobian * gram_inv;
        }
        Ok(())
    }

    /// Maps a reference point of the current cell to physical coordinates.
    pub fn map_to_physical(&self, xi: DVectorView<T>) -> DVector<T> {
        map_reference_point(self.geometry, &self.nodes, xi)
    }

    /// Writes the physical coordinates of a reference point of the current cell into `x`.
    pub fn populate_physical_point(&self, xi: DVectorView<T>, x: DVectorViewMut<T>) {
        populate_reference_point(self.geometry, &self.nodes, xi, x)
    }

    /// The transpose-inverse Jacobian together with the volume scaling `|det J|`.
    pub fn derivative_map(&self) -> Result<(&DMatrix<T>, T), Error> {
        check_map_supported(self.geometry, self.mesh.dim(), MapType::CovariantPiola)?;
        Ok((&self.inverse_transpose, self.volume))
    }

    /// The Jacobian together with `|det J|`, such that `J v / |det J|` is the contravariant
    /// Piola transform of a reference field `v`.
    ///
    /// Using the absolute value of the determinant preserves the outward normal flux through
    /// every face, also for orientation-reversing maps.
    pub fn piola_map(&self) -> Result<(&DMatrix<T>, T), Error> {
        check_map_supported(self.geometry, self.mesh.dim(), MapType::ContravariantPiola)?;
        Ok((&self.jacobian, self.volume))
    }

    /// The transpose-inverse Jacobian together with the signed determinant, for the covariant
    /// transform of tangential-continuous fields.
    pub fn covariant_map(&self) -> Result<(&DMatrix<T>, T), Error> {
        check_map_supported(self.geometry, self.mesh.dim(), MapType::CovariantPiola)?;
        Ok((&self.inverse_transpose, self.determinant))
    }

    pub fn jacobian(&self) -> &DMatrix<T> {
        &self.jacobian
    }

    /// The signed determinant of the Jacobian (or the volume scaling for embedded items).
    pub fn determinant(&self) -> T {
        self.determinant
    }

    /// The factor by which reference quadrature weights are scaled to integrate over the
    /// current item: `|det J|` for cells, `|F| / |F_ref|` for faces.
    pub fn integration_scaling(&self) -> T {
        match self.items {
            ItemKind::Cells => self.volume,
            ItemKind::Faces | ItemKind::BoundaryFaces => self.face_scaling,
        }
    }
}

/// The barycenter of the reference domain of the given geometry.
pub fn reference_center<T: Real>(geometry: ReferenceGeometry) -> DVector<T> {
    let nodes = geometry.reference_nodes();
    let dim = geometry.dim();
    let n = nodes.len() as f64;
    DVector::from_fn(dim, |i, _| {
        T::from_tabulated(nodes.iter().map(|node| node[i]).sum::<f64>() / n)
    })
}
