//! Quadrature rules on reference geometries, converted to the working scalar type and cached.
use crate::error::Error;
use crate::geometry::ReferenceGeometry;
use crate::Real;
use log::trace;
use nalgebra::{DMatrix, DVectorView};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::any::{Any, TypeId};
use std::sync::{Arc, OnceLock};
use weakform_quadrature::{simplex, tensor, Rule};

/// A quadrature rule on a reference geometry, integrating polynomials up to `order` exactly.
///
/// Points are stored column-wise in a `dim x num_points` matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct QuadratureRule<T: Real> {
    geometry: ReferenceGeometry,
    order: usize,
    points: DMatrix<T>,
    weights: Vec<T>,
}

fn convert_rule<T: Real, const D: usize>(rule: Rule<D>) -> (DMatrix<T>, Vec<T>) {
    let (weights, points) = rule;
    let points = DMatrix::from_fn(D, points.len(), |i, q| T::from_tabulated(points[q][i]));
    let weights = weights.into_iter().map(T::from_tabulated).collect();
    (points, weights)
}

impl<T: Real> QuadratureRule<T> {
    /// Constructs a rule for the given geometry that is exact for polynomials of the given order.
    ///
    /// For quadrilaterals and hexahedra, the order is understood per coordinate direction.
    pub fn new(geometry: ReferenceGeometry, order: usize) -> Result<Self, Error> {
        use ReferenceGeometry::*;
        let unavailable = |_| Error::QuadratureUnavailable { geometry, order };
        let (points, weights) = match geometry {
            Vertex => (DMatrix::zeros(0, 1), vec![T::one()]),
            Edge => convert_rule(tensor::interval(order).map_err(unavailable)?),
            Triangle => convert_rule(simplex::triangle(order).map_err(unavailable)?),
            Quadrilateral => convert_rule(tensor::quadrilateral(order).map_err(unavailable)?),
            Tetrahedron => convert_rule(simplex::tetrahedron(order).map_err(unavailable)?),
            Parallelepiped | Hexahedron => convert_rule(tensor::hexahedron(order).map_err(unavailable)?),
        };
        Ok(Self {
            geometry,
            order,
            points,
            weights,
        })
    }

    /// Returns a shared rule from the process-wide cache, constructing it on first request.
    pub fn cached(geometry: ReferenceGeometry, order: usize) -> Result<Arc<Self>, Error> {
        global_cache().get_or_create(geometry, order)
    }

    /// Maps a rule on the face geometry of `cell_geometry` onto the local face `local_face`
    /// of the reference cell.
    ///
    /// The weights are kept, so they sum to the reference volume of the face geometry.
    pub fn map_to_cell_face(&self, cell_geometry: ReferenceGeometry, local_face: usize) -> Self {
        assert_eq!(
            cell_geometry.face_geometry(),
            Some(self.geometry),
            "Rule geometry must be the face geometry of the cell"
        );
        let face_nodes = cell_geometry.face_nodes()[local_face];
        let nodes = cell_geometry.reference_nodes();
        let cell_dim = cell_geometry.dim();

        // The face geometry is simplicial or a box; either way the map from the face reference
        // domain onto the (planar, axis-aligned) reference cell face is affine
        let spanning = self.geometry.affine_spanning_nodes();
        let origin = nodes[face_nodes[spanning[0]]];
        let mut points = DMatrix::zeros(cell_dim, self.num_points());
        for q in 0..self.num_points() {
            for i in 0..cell_dim {
                let mut x = T::from_tabulated(origin[i]);
                for (k, &s) in spanning.iter().skip(1).enumerate() {
                    let direction = nodes[face_nodes[s]][i] - origin[i];
                    x += T::from_tabulated(direction) * self.points[(k, q)];
                }
                points[(i, q)] = x;
            }
        }

        Self {
            geometry: cell_geometry,
            order: self.order,
            points,
            weights: self.weights.clone(),
        }
    }

    pub fn geometry(&self) -> ReferenceGeometry {
        self.geometry
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn num_points(&self) -> usize {
        self.weights.len()
    }

    pub fn weights(&self) -> &[T] {
        &self.weights
    }

    pub fn points(&self) -> &DMatrix<T> {
        &self.points
    }

    pub fn point(&self, index: usize) -> DVectorView<T> {
        self.points.column(index)
    }

    /// Approximates the integral of the given function over the reference domain.
    pub fn integrate(&self, mut f: impl FnMut(DVectorView<T>) -> T) -> T {
        self.weights
            .iter()
            .enumerate()
            .fold(T::zero(), |sum, (q, w)| sum + *w * f(self.point(q)))
    }
}

type CacheKey = (ReferenceGeometry, usize, TypeId);

/// A cache of quadrature rules keyed by geometry, order and scalar type.
///
/// Rules are immutable once built and handed out as shared pointers.
#[derive(Debug, Default)]
pub struct QuadratureCache {
    rules: Mutex<FxHashMap<CacheKey, Arc<dyn Any + Send + Sync>>>,
}

impl QuadratureCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create<T: Real>(&self, geometry: ReferenceGeometry, order: usize) -> Result<Arc<QuadratureRule<T>>, Error> {
        let key = (geometry, order, TypeId::of::<T>());
        let mut rules = self.rules.lock();
        if let Some(rule) = rules.get(&key) {
            if let Ok(rule) = Arc::clone(rule).downcast::<QuadratureRule<T>>() {
                return Ok(rule);
            }
        }
        trace!("Quadrature cache miss for {geometry} of order {order}");
        let rule = Arc::new(QuadratureRule::<T>::new(geometry, order)?);
        rules.insert(key, rule.clone());
        Ok(rule)
    }

    pub fn len(&self) -> usize {
        self.rules.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn global_cache() -> &'static QuadratureCache {
    static CACHE: OnceLock<QuadratureCache> = OnceLock::new();
    CACHE.get_or_init(QuadratureCache::new)
}
