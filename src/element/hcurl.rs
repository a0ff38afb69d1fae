//! Lowest-order Nédélec (first kind) basis on simplices.
//!
//! For the local edge `(a, b)` the basis function is `lambda_a grad(lambda_b) - lambda_b grad(lambda_a)`,
//! whose tangential integral along the edge from `a` to `b` is one.
use crate::element::lagrange::{barycentric_coordinate, barycentric_gradient};
use crate::geometry::ReferenceGeometry;
use crate::Real;
use nalgebra::{DMatrixViewMut, DVectorView};

pub(crate) fn populate_n0_values<T: Real>(geometry: ReferenceGeometry, xi: DVectorView<T>, mut values: DMatrixViewMut<T>) {
    let dim = geometry.dim();
    for (k, &[a, b]) in geometry.edge_nodes().iter().enumerate() {
        let (lambda_a, lambda_b) = (barycentric_coordinate(&xi, a), barycentric_coordinate(&xi, b));
        for c in 0..dim {
            values[(k, c)] =
                lambda_a * barycentric_gradient::<T>(b, c) - lambda_b * barycentric_gradient::<T>(a, c);
        }
    }
}

/// Gradients with row `k * dim + c` holding the gradient of component `c` of function `k`.
pub(crate) fn populate_n0_gradients<T: Real>(geometry: ReferenceGeometry, mut gradients: DMatrixViewMut<T>) {
    let dim = geometry.dim();
    for (k, &[a, b]) in geometry.edge_nodes().iter().enumerate() {
        for c in 0..dim {
            for e in 0..dim {
                gradients[(k * dim + c, e)] = barycentric_gradient::<T>(a, e) * barycentric_gradient::<T>(b, c)
                    - barycentric_gradient::<T>(b, e) * barycentric_gradient::<T>(a, c);
            }
        }
    }
}
