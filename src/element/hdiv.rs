//! Normal-continuous vector bases on simplices.
//!
//! Face `j` of a simplex is the face opposite to vertex `j`. With `x_j` the reference
//! vertex `j`, `d` the dimension and `|K|` the reference volume, the bases are
//!
//! - Raviart–Thomas: `psi_j(x) = (x - x_j) / (d |K|)`, with unit outward flux through face `j`,
//! - Brezzi–Douglas–Marini: `phi_{j,a}(x) = lambda_a(x) (x_a - x_j) / (d |K|)` for each vertex
//!   `a` of face `j`, whose normal component on face `j` is `lambda_a / |F_j|`.
//!
//! Both families have vanishing normal components on all other faces.
use crate::element::lagrange::{barycentric_coordinate, barycentric_gradient};
use crate::geometry::ReferenceGeometry;
use crate::Real;
use nalgebra::{DMatrixViewMut, DVectorView};

fn vertex<T: Real>(geometry: ReferenceGeometry, j: usize, c: usize) -> T {
    T::from_tabulated(geometry.reference_nodes()[j][c])
}

fn scale<T: Real>(geometry: ReferenceGeometry) -> T {
    T::from_tabulated(geometry.dim() as f64 * geometry.reference_volume())
}

pub(crate) fn populate_rt0_values<T: Real>(geometry: ReferenceGeometry, xi: DVectorView<T>, mut values: DMatrixViewMut<T>) {
    let dim = geometry.dim();
    let s = scale::<T>(geometry);
    for j in 0..geometry.num_faces() {
        for c in 0..dim {
            values[(j, c)] = (xi[c] - vertex::<T>(geometry, j, c)) / s;
        }
    }
}

/// Gradients with row `j * dim + c` holding the gradient of component `c` of function `j`.
pub(crate) fn populate_rt0_gradients<T: Real>(geometry: ReferenceGeometry, mut gradients: DMatrixViewMut<T>) {
    let dim = geometry.dim();
    let s = scale::<T>(geometry);
    gradients.fill(T::zero());
    for j in 0..geometry.num_faces() {
        for c in 0..dim {
            gradients[(j * dim + c, c)] = T::one() / s;
        }
    }
}

/// The vertex `a` and face `j` associated with local BDM1 function `j * dim + m`.
pub(crate) fn bdm1_vertex(geometry: ReferenceGeometry, index: usize) -> (usize, usize) {
    let dim = geometry.dim();
    let (j, m) = (index / dim, index % dim);
    (geometry.face_nodes()[j][m], j)
}

pub(crate) fn populate_bdm1_values<T: Real>(geometry: ReferenceGeometry, xi: DVectorView<T>, mut values: DMatrixViewMut<T>) {
    let dim = geometry.dim();
    let s = scale::<T>(geometry);
    for i in 0..dim * geometry.num_faces() {
        let (a, j) = bdm1_vertex(geometry, i);
        let lambda = barycentric_coordinate(&xi, a);
        for c in 0..dim {
            let edge = vertex::<T>(geometry, a, c) - vertex::<T>(geometry, j, c);
            values[(i, c)] = lambda * edge / s;
        }
    }
}

pub(crate) fn populate_bdm1_gradients<T: Real>(geometry: ReferenceGeometry, mut gradients: DMatrixViewMut<T>) {
    let dim = geometry.dim();
    let s = scale::<T>(geometry);
    for i in 0..dim * geometry.num_faces() {
        let (a, j) = bdm1_vertex(geometry, i);
        for c in 0..dim {
            let edge = vertex::<T>(geometry, a, c) - vertex::<T>(geometry, j, c);
            for e in 0..dim {
                gradients[(i * dim + c, e)] = edge * barycentric_gradient::<T>(a, e) / s;
            }
        }
    }
}
