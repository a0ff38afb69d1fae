//! Evaluation of differential operators applied to basis functions in physical space.
use crate::element::{
    get_basis, populate_basis_subset, populate_coefficients, Continuity, FEType, ReferenceBasis,
};
use crate::error::Error;
use crate::geometry::ReferenceGeometry;
use crate::mesh::ItemKind;
use crate::quadrature::QuadratureRule;
use crate::space::FESpace;
use crate::transform::{check_map_supported, GeometricTransformer, MapType};
use crate::Real;
use nalgebra::{DMatrix, DMatrixView, DMatrixViewMut, DVector, DVectorView, DVectorViewMut};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// A differential operator applied to (vector-valued) finite element functions.
///
/// Multi-component outputs are flattened: gradients as `[c * dim + e] = d u_c / d x_e`,
/// Hessians as `[(c * dim + d) * dim + e]`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiffOperator {
    Identity,
    IdentityComponent(usize),
    Gradient,
    Divergence,
    /// The scalar curl `d u_1 / d x_0 - d u_0 / d x_1` of a 2D vector field.
    Curl,
    /// The rotated gradient `(d u / d x_1, -d u / d x_0)` of a 2D scalar field.
    CurlScalar,
    Hessian,
    /// The normal component `u . n` on faces, with `n` the outward normal of the face's
    /// first cell.
    NormalFlux,
    /// The tangential component on faces of 2D meshes.
    TangentialFlux,
}

impl DiffOperator {
    /// The number of values of the operator applied to a field with `ncomponents` components
    /// in `dim`-dimensional space.
    pub fn output_length(&self, ncomponents: usize, dim: usize) -> usize {
        match self {
            Self::Identity => ncomponents,
            Self::IdentityComponent(_) | Self::Divergence | Self::Curl => 1,
            Self::NormalFlux | Self::TangentialFlux => 1,
            Self::Gradient => ncomponents * dim,
            Self::CurlScalar => 2,
            Self::Hessian => ncomponents * dim * dim,
        }
    }

    /// The order of the derivatives involved.
    pub fn derivative_order(&self) -> usize {
        match self {
            Self::Identity | Self::IdentityComponent(_) | Self::NormalFlux | Self::TangentialFlux => 0,
            Self::Gradient | Self::Divergence | Self::Curl | Self::CurlScalar => 1,
            Self::Hessian => 2,
        }
    }

    /// Checks that the operator can be applied to the element family on the given geometry.
    pub fn check_supported(&self, fe: FEType, geometry: ReferenceGeometry, ambient_dim: usize, items: ItemKind) -> Result<(), Error> {
        let nc = fe.ncomponents(ambient_dim);
        let on_faces = items != ItemKind::Cells;
        let supported = match *self {
            Self::Identity => true,
            Self::IdentityComponent(c) => c < nc,
            Self::Gradient => geometry.dim() > 0,
            Self::Divergence => geometry.dim() > 0 && nc == ambient_dim,
            // The curl of 3D fields is not available
            Self::Curl => ambient_dim == 2 && nc == 2,
            Self::CurlScalar => ambient_dim == 2 && nc == 1,
            Self::Hessian => {
                matches!(fe.continuity(), Continuity::H1 | Continuity::L2) && geometry.is_affine() && geometry.dim() > 0
            }
            Self::NormalFlux => on_faces && nc == ambient_dim,
            Self::TangentialFlux => on_faces && ambient_dim == 2 && nc == 2,
        };
        if !supported {
            return Err(Error::UnsupportedOperator {
                operator: *self,
                fe,
                geometry,
                ambient_dim,
            });
        }
        if self.derivative_order() > 0 {
            check_map_supported(geometry, ambient_dim, MapType::CovariantPiola)?;
        }
        Ok(())
    }
}

/// Cell-independent reference data for one (cell geometry, local face) combination.
#[derive(Debug, Clone)]
struct ReferenceTables<T: Real> {
    rule: QuadratureRule<T>,
    basis: ReferenceBasis,
    values: Vec<DMatrix<T>>,
    gradients: Vec<DMatrix<T>>,
    hessians: Vec<DMatrix<T>>,
}

impl<T: Real> ReferenceTables<T> {
    fn new(basis: ReferenceBasis, rule: QuadratureRule<T>, derivative_order: usize) -> Self {
        let (nd, nc, dim) = (basis.num_dofs(), basis.ncomponents(), basis.geometry().dim());
        let mut values = Vec::with_capacity(rule.num_points());
        let mut gradients = Vec::new();
        let mut hessians = Vec::new();
        for q in 0..rule.num_points() {
            let xi = rule.point(q);
            let mut v = DMatrix::zeros(nd, nc);
            basis.populate_values(xi, DMatrixViewMut::from(&mut v));
            values.push(v);
            if derivative_order >= 1 {
                let mut g = DMatrix::zeros(nd * nc, dim);
                basis.populate_gradients(xi, DMatrixViewMut::from(&mut g));
                gradients.push(g);
            }
            if derivative_order >= 2 {
                let mut h = DMatrix::zeros(nd * nc, dim * dim);
                basis.populate_hessians(xi, DMatrixViewMut::from(&mut h));
                hessians.push(h);
            }
        }
        Self {
            rule,
            basis,
            values,
            gradients,
            hessians,
        }
    }
}

type TableKey = (ReferenceGeometry, Option<usize>);

/// Evaluates a differential operator applied to all local basis functions of the current
/// item at quadrature points.
///
/// Each evaluator owns its own [`GeometricTransformer`]; evaluators are not meant to be
/// shared between threads.
#[derive(Debug, Clone)]
pub struct BasisEvaluator<'a, 'm, T: Real> {
    space: &'a FESpace<'m, T>,
    operator: DiffOperator,
    order: usize,
    transformer: GeometricTransformer<'m, T>,
    tables: FxHashMap<TableKey, ReferenceTables<T>>,
    current_key: Option<TableKey>,
    coefficients: Vec<T>,
    subset: Vec<usize>,
    values: DMatrix<T>,
    physical_values: DMatrix<T>,
    reference_gradient: DMatrix<T>,
    physical_gradient: DMatrix<T>,
    normal: DVector<T>,
}

impl<'a, 'm, T: Real> BasisEvaluator<'a, 'm, T> {
    /// Creates an evaluator of the operator on items of the given kind, using quadrature of
    /// the given order.
    ///
    /// All configuration errors (unsupported element, operator or map for any cell geometry
    /// of the mesh) are reported here, before any item is visited.
    pub fn new(space: &'a FESpace<'m, T>, operator: DiffOperator, items: ItemKind, order: usize) -> Result<Self, Error> {
        let mesh = space.mesh();
        for geometry in mesh.cell_geometries() {
            get_basis(space.fe(), geometry)?;
            check_map_supported(geometry, mesh.dim(), space.fe().map_type())?;
            operator.check_supported(space.fe(), geometry, mesh.dim(), items)?;
        }
        Ok(Self {
            space,
            operator,
            order,
            transformer: GeometricTransformer::new(mesh, items),
            tables: FxHashMap::default(),
            current_key: None,
            coefficients: Vec::new(),
            subset: Vec::new(),
            values: DMatrix::zeros(0, 0),
            physical_values: DMatrix::zeros(0, 0),
            reference_gradient: DMatrix::zeros(0, 0),
            physical_gradient: DMatrix::zeros(0, 0),
            normal: DVector::zeros(mesh.dim()),
        })
    }

    pub fn space(&self) -> &'a FESpace<'m, T> {
        self.space
    }

    pub fn operator(&self) -> DiffOperator {
        self.operator
    }

    pub fn items(&self) -> ItemKind {
        self.transformer.items()
    }

    pub fn order(&self) -> usize {
        self.order
    }

    /// The number of values per basis function.
    pub fn output_length(&self) -> usize {
        self.operator
            .output_length(self.space.ncomponents(), self.space.mesh().dim())
    }

    pub fn transformer(&self) -> &GeometricTransformer<'m, T> {
        &self.transformer
    }

    /// Updates the evaluator to the given item, refreshing the geometric map and the
    /// per-cell coefficients and basis subset.
    pub fn update(&mut self, item: usize) -> Result<(), Error> {
        if self.transformer.current_item() == Some(item) && self.current_key.is_some() {
            return Ok(());
        }
        self.current_key = None;
        self.transformer.update(item)?;
        let geometry = self.transformer.geometry();
        let key = (geometry, self.transformer.local_face());
        if !self.tables.contains_key(&key) {
            let basis = get_basis(self.space.fe(), geometry)?;
            let rule = match key.1 {
                None => QuadratureRule::<T>::cached(geometry, self.order)?.as_ref().clone(),
                Some(local_face) => {
                    let face_geometry = geometry
                        .face_geometry()
                        .ok_or(Error::QuadratureUnavailable {
                            geometry,
                            order: self.order,
                        })?;
                    QuadratureRule::<T>::cached(face_geometry, self.order)?.map_to_cell_face(geometry, local_face)
                }
            };
            let tables = ReferenceTables::new(basis, rule, self.operator.derivative_order());
            self.tables.insert(key, tables);
        }

        let cell = self.transformer.cell();
        let num_dofs = self.space.cell_dofs(cell).len();
        self.coefficients.resize(num_dofs, T::one());
        populate_coefficients(self.space.fe(), self.space.mesh(), cell, &mut self.coefficients);
        self.subset.resize(num_dofs, 0);
        populate_basis_subset(self.space.fe(), self.space.mesh(), cell, &mut self.subset)?;

        let output_length = self.output_length();
        if self.values.shape() != (num_dofs, output_length) {
            self.values = DMatrix::zeros(num_dofs, output_length);
        }
        self.current_key = Some(key);
        Ok(())
    }

    fn tables(&self) -> &ReferenceTables<T> {
        let key = self
            .current_key
            .expect("Evaluator must be updated to an item before use");
        &self.tables[&key]
    }

    /// The cell whose basis functions are evaluated (the first cell of a face).
    pub fn cell(&self) -> usize {
        self.transformer.cell()
    }

    /// Global dofs of the basis functions of the current item.
    pub fn dofs(&self) -> &'a [usize] {
        self.space.cell_dofs(self.transformer.cell())
    }

    pub fn num_points(&self) -> usize {
        self.tables().rule.num_points()
    }

    pub fn weights(&self) -> &[T] {
        self.tables().rule.weights()
    }

    /// The quadrature rule of the current item, in the reference frame of its cell.
    pub fn rule(&self) -> &QuadratureRule<T> {
        &self.tables().rule
    }

    /// Scaling of the quadrature weights at the most recently evaluated point.
    pub fn integration_scaling(&self) -> T {
        self.transformer.integration_scaling()
    }

    /// The physical coordinates of quadrature point `q`.
    pub fn physical_point(&self, q: usize) -> DVector<T> {
        self.transformer.map_to_physical(self.tables().rule.point(q))
    }

    /// Writes the physical coordinates of quadrature point `q` into `x`, resizing it to the
    /// ambient dimension if necessary.
    pub fn populate_physical_point(&self, q: usize, x: &mut DVector<T>) {
        let dim = self.space.mesh().dim();
        if x.len() != dim {
            *x = DVector::zeros(dim);
        }
        self.transformer
            .populate_physical_point(self.tables().rule.point(q), DVectorViewMut::from(x));
    }

    /// Evaluates the operator for all basis functions at quadrature point `q`. The result is
    /// available through [`Self::values`].
    pub fn evaluate(&mut self, q: usize) -> Result<(), Error> {
        let key = self
            .current_key
            .expect("Evaluator must be updated to an item before use");
        let tables = &self.tables[&key];
        self.transformer.update_point(tables.rule.point(q))?;

        let basis = tables.basis;
        let mesh = self.space.mesh();
        let dim = mesh.dim();
        let ref_dim = basis.geometry().dim();
        let num_dofs = basis.num_dofs();
        let ref_nc = basis.ncomponents();
        let map = self.space.fe().map_type();
        let derivative_order = self.operator.derivative_order();
        let nc = self.space.ncomponents();

        // Values, mapped to physical space
        if self.physical_values.shape() != (num_dofs, nc) {
            self.physical_values = DMatrix::zeros(num_dofs, nc);
        }
        let reference_values = &tables.values[q];
        match map {
            MapType::Identity => {
                for i in 0..num_dofs {
                    let s = self.subset[i];
                    for c in 0..nc {
                        self.physical_values[(i, c)] = self.coefficients[i] * reference_values[(s, c)];
                    }
                }
            }
            MapType::ContravariantPiola | MapType::CovariantPiola => {
                // J v / |det J| and J^{-T} v respectively
                let (matrix, scaling) = if map == MapType::ContravariantPiola {
                    let (jacobian, volume) = self.transformer.piola_map()?;
                    (jacobian, T::one() / volume)
                } else {
                    let (inverse_transpose, _) = self.transformer.covariant_map()?;
                    (inverse_transpose, T::one())
                };
                for i in 0..num_dofs {
                    let s = self.subset[i];
                    for d in 0..nc {
                        let mut value = T::zero();
                        for a in 0..ref_nc {
                            value += matrix[(d, a)] * reference_values[(s, a)];
                        }
                        self.physical_values[(i, d)] = self.coefficients[i] * scaling * value;
                    }
                }
            }
        }

        let on_faces = match self.transformer.items() {
            ItemKind::Cells => false,
            ItemKind::Faces | ItemKind::BoundaryFaces => match self.transformer.current_item() {
                Some(face) => {
                    self.normal.copy_from(&mesh.face_normal(face));
                    true
                }
                None => false,
            },
        };

        let derivative_map = if derivative_order >= 1 {
            Some(self.transformer.derivative_map()?)
        } else {
            None
        };
        if derivative_map.is_some() {
            self.reference_gradient
                .resize_mut(ref_nc, dim, T::zero());
            self.physical_gradient.resize_mut(nc, dim, T::zero());
        }

        for i in 0..num_dofs {
            let s = self.subset[i];
            let coefficient = self.coefficients[i];
            if let Some((inverse_transpose, volume)) = derivative_map {
                // Gradient of the reference field w.r.t. physical coordinates (ref_nc x dim)
                let gradients = &tables.gradients[q];
                for c in 0..ref_nc {
                    for e in 0..dim {
                        let mut value = T::zero();
                        for a in 0..ref_dim {
                            value += gradients[(s * ref_nc + c, a)] * inverse_transpose[(e, a)];
                        }
                        self.reference_gradient[(c, e)] = value;
                    }
                }
                match map {
                    MapType::Identity => {
                        self.physical_gradient
                            .copy_from(&self.reference_gradient);
                        self.physical_gradient *= coefficient;
                    }
                    MapType::ContravariantPiola => self.physical_gradient.gemm(
                        coefficient / volume,
                        self.transformer.jacobian(),
                        &self.reference_gradient,
                        T::zero(),
                    ),
                    MapType::CovariantPiola => {
                        self.physical_gradient
                            .gemm(coefficient, inverse_transpose, &self.reference_gradient, T::zero())
                    }
                }
            }

            let physical_gradient = &self.physical_gradient;
            let mut output = self.values.row_mut(i);
            match self.operator {
                DiffOperator::Identity => output.copy_from(&self.physical_values.row(i)),
                DiffOperator::IdentityComponent(c) => output[0] = self.physical_values[(i, c)],
                DiffOperator::Gradient => {
                    for c in 0..nc {
                        for e in 0..dim {
                            output[c * dim + e] = physical_gradient[(c, e)];
                        }
                    }
                }
                DiffOperator::Divergence => output[0] = physical_gradient.trace(),
                DiffOperator::Curl => output[0] = physical_gradient[(1, 0)] - physical_gradient[(0, 1)],
                DiffOperator::CurlScalar => {
                    output[0] = physical_gradient[(0, 1)];
                    output[1] = -physical_gradient[(0, 0)];
                }
                DiffOperator::Hessian => {
                    // J^{-T} H J^{-1}, with H stored row-major per component
                    let (inverse_transpose, _) = self.transformer.derivative_map()?;
                    let hessians = &tables.hessians[q];
                    for c in 0..nc {
                        let row = s * ref_nc + c;
                        for d in 0..dim {
                            for e in 0..dim {
                                let mut value = T::zero();
                                for a in 0..ref_dim {
                                    for b in 0..ref_dim {
                                        value += inverse_transpose[(d, a)]
                                            * hessians[(row, a * ref_dim + b)]
                                            * inverse_transpose[(e, b)];
                                    }
                                }
                                output[(c * dim + d) * dim + e] = coefficient * value;
                            }
                        }
                    }
                }
                DiffOperator::NormalFlux => {
                    assert!(on_faces, "Internal error: normal flux is only evaluated on faces");
                    output[0] = self.physical_values.row(i).transpose().dot(&self.normal);
                }
                DiffOperator::TangentialFlux => {
                    assert!(on_faces, "Internal error: tangential flux is only evaluated on faces");
                    output[0] = -self.physical_values[(i, 0)] * self.normal[1] + self.physical_values[(i, 1)] * self.normal[0];
                }
            }
        }
        Ok(())
    }

    /// Operator values of the local basis functions at the most recently evaluated point, one
    /// row per local dof.
    pub fn values(&self) -> DMatrixView<T> {
        DMatrixView::from(&self.values)
    }

    /// Evaluates the operator applied to the finite element function with the given local
    /// coefficients at the most recently evaluated point.
    pub fn evaluate_function(&self, local_coefficients: &[T], mut result: DVectorViewMut<T>) {
        assert_eq!(local_coefficients.len(), self.values.nrows(), "One coefficient per local dof required");
        assert_eq!(result.len(), self.values.ncols(), "Result must have the output length of the operator");
        let coefficients = DVectorView::from_slice(local_coefficients, local_coefficients.len());
        self.values.tr_mul_to(&coefficients, &mut result);
    }
}
