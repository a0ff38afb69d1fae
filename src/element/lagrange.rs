//! Scalar Lagrange shape functions on reference geometries.
use crate::geometry::ReferenceGeometry;
use crate::Real;
use nalgebra::{DMatrixViewMut, DVectorView};
use numeric_literals::replace_float_literals;

/// Scalar Lagrange shape functions.
///
/// Shape functions are ordered by the entity they are associated with: vertices in
/// reference node order, then edges in the order of [`ReferenceGeometry::edge_nodes`]
/// (or the interior of an `Edge`).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LagrangeShape {
    /// The constant function 1.
    Constant(ReferenceGeometry),
    /// Barycentric coordinates of a simplex.
    Linear(ReferenceGeometry),
    /// Tensor products of linear functions on a box. Also used for the (multilinear) maps of
    /// quadrilaterals and hexahedra.
    Multilinear(ReferenceGeometry),
    /// Quadratic functions on a simplex.
    Quadratic(ReferenceGeometry),
}

/// Barycentric coordinates `(1 - sum(xi), xi_0, xi_1, ...)`.
fn barycentric<T: Real>(xi: &DVectorView<T>, lambda: &mut [T; 4]) {
    let dim = xi.len();
    lambda[0] = T::one() - xi.iter().fold(T::zero(), |sum, x| sum + *x);
    for d in 0..dim {
        lambda[d + 1] = xi[d];
    }
}

/// Barycentric coordinate `a` of a simplex.
pub(crate) fn barycentric_coordinate<T: Real>(xi: &DVectorView<T>, a: usize) -> T {
    if a == 0 {
        T::one() - xi.iter().fold(T::zero(), |sum, x| sum + *x)
    } else {
        xi[a - 1]
    }
}

/// Derivative of barycentric coordinate `a` in direction `d`.
pub(crate) fn barycentric_gradient<T: Real>(a: usize, d: usize) -> T {
    if a == 0 {
        -T::one()
    } else if a == d + 1 {
        T::one()
    } else {
        T::zero()
    }
}

/// The vertex pairs of the quadratic edge functions.
fn quadratic_edges(geometry: ReferenceGeometry) -> &'static [[usize; 2]] {
    match geometry {
        ReferenceGeometry::Edge => &[[0, 1]],
        _ => geometry.edge_nodes(),
    }
}

impl LagrangeShape {
    pub fn geometry(&self) -> ReferenceGeometry {
        match *self {
            Self::Constant(g) | Self::Linear(g) | Self::Multilinear(g) | Self::Quadratic(g) => g,
        }
    }

    pub fn num_shapes(&self) -> usize {
        match *self {
            Self::Constant(_) => 1,
            Self::Linear(g) | Self::Multilinear(g) => g.num_nodes(),
            Self::Quadratic(g) => g.num_nodes() + quadratic_edges(g).len(),
        }
    }

    /// Polynomial degree of the shape functions in the sense of exact quadrature: for
    /// multilinear shapes this is the total degree.
    pub fn degree(&self) -> usize {
        match *self {
            Self::Constant(_) => 0,
            Self::Linear(_) => 1,
            Self::Multilinear(g) => g.dim(),
            Self::Quadratic(_) => 2,
        }
    }

    /// The factor of shape function `node` in direction `d` of a multilinear shape,
    /// together with its derivative.
    fn multilinear_factor<T: Real>(geometry: ReferenceGeometry, node: usize, d: usize, x: T) -> (T, T) {
        if geometry.reference_nodes()[node][d] > 0.5 {
            (x, T::one())
        } else {
            (T::one() - x, -T::one())
        }
    }

    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn populate_values<T: Real>(&self, xi: DVectorView<T>, values: &mut [T]) {
        assert_eq!(values.len(), self.num_shapes(), "Value buffer must have one entry per shape");
        let geometry = self.geometry();
        let dim = geometry.dim();
        match *self {
            Self::Constant(_) => values[0] = 1.0,
            Self::Linear(_) => {
                let mut lambda = [0.0; 4];
                barycentric(&xi, &mut lambda);
                values.copy_from_slice(&lambda[..values.len()]);
            }
            Self::Multilinear(_) => {
                for (node, value) in values.iter_mut().enumerate() {
                    *value = (0..dim).fold(1.0, |prod, d| prod * Self::multilinear_factor(geometry, node, d, xi[d]).0);
                }
            }
            Self::Quadratic(_) => {
                let mut lambda = [0.0; 4];
                barycentric(&xi, &mut lambda);
                let num_vertices = geometry.num_nodes();
                for a in 0..num_vertices {
                    values[a] = lambda[a] * (2.0 * lambda[a] - 1.0);
                }
                for (e, &[a, b]) in quadratic_edges(geometry).iter().enumerate() {
                    values[num_vertices + e] = 4.0 * lambda[a] * lambda[b];
                }
            }
        }
    }

    /// Populates the reference gradients, one row per shape function.
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn populate_gradients<T: Real>(&self, xi: DVectorView<T>, mut gradients: DMatrixViewMut<T>) {
        let geometry = self.geometry();
        let dim = geometry.dim();
        assert_eq!(gradients.shape(), (self.num_shapes(), dim), "Gradient buffer must be num_shapes x dim");
        match *self {
            Self::Constant(_) => gradients.fill(0.0),
            Self::Linear(_) => {
                for a in 0..self.num_shapes() {
                    for d in 0..dim {
                        gradients[(a, d)] = barycentric_gradient::<T>(a, d);
                    }
                }
            }
            Self::Multilinear(_) => {
                for node in 0..self.num_shapes() {
                    for d in 0..dim {
                        gradients[(node, d)] = (0..dim).fold(1.0, |prod, e| {
                            let (value, derivative) = Self::multilinear_factor(geometry, node, e, xi[e]);
                            prod * if e == d { derivative } else { value }
                        });
                    }
                }
            }
            Self::Quadratic(_) => {
                let mut lambda = [0.0; 4];
                barycentric(&xi, &mut lambda);
                let num_vertices = geometry.num_nodes();
                for a in 0..num_vertices {
                    for d in 0..dim {
                        gradients[(a, d)] = (4.0 * lambda[a] - 1.0) * barycentric_gradient::<T>(a, d);
                    }
                }
                for (e, &[a, b]) in quadratic_edges(geometry).iter().enumerate() {
                    for d in 0..dim {
                        gradients[(num_vertices + e, d)] =
                            4.0 * (lambda[b] * barycentric_gradient::<T>(a, d) + lambda[a] * barycentric_gradient::<T>(b, d));
                    }
                }
            }
        }
    }

    /// Populates the reference Hessians, one row per shape function with the Hessian stored
    /// row-major in `dim * dim` columns.
    #[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
    pub fn populate_hessians<T: Real>(&self, xi: DVectorView<T>, mut hessians: DMatrixViewMut<T>) {
        let geometry = self.geometry();
        let dim = geometry.dim();
        assert_eq!(hessians.shape(), (self.num_shapes(), dim * dim), "Hessian buffer must be num_shapes x dim^2");
        hessians.fill(0.0);
        match *self {
            Self::Constant(_) | Self::Linear(_) => {}
            Self::Multilinear(_) => {
                for node in 0..self.num_shapes() {
                    for d in 0..dim {
                        for e in (0..dim).filter(|&e| e != d) {
                            hessians[(node, d * dim + e)] = (0..dim).fold(1.0, |prod, k| {
                                let (value, derivative) = Self::multilinear_factor(geometry, node, k, xi[k]);
                                prod * if k == d || k == e { derivative } else { value }
                            });
                        }
                    }
                }
            }
            Self::Quadratic(_) => {
                let num_vertices = geometry.num_nodes();
                for a in 0..num_vertices {
                    for d in 0..dim {
                        for e in 0..dim {
                            hessians[(a, d * dim + e)] =
                                4.0 * barycentric_gradient::<T>(a, d) * barycentric_gradient::<T>(a, e);
                        }
                    }
                }
                for (k, &[a, b]) in quadratic_edges(geometry).iter().enumerate() {
                    for d in 0..dim {
                        for e in 0..dim {
                            hessians[(num_vertices + k, d * dim + e)] = 4.0
                                * (barycentric_gradient::<T>(a, d) * barycentric_gradient::<T>(b, e)
                                    + barycentric_gradient::<T>(b, d) * barycentric_gradient::<T>(a, e));
                        }
                    }
                }
            }
        }
    }
}
