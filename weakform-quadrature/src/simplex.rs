//! Quadrature rules for the unit triangle and the unit tetrahedron.
//!
//! Low orders use classic symmetric rules. Higher orders use conical product rules: the
//! simplex is collapsed onto the unit square (cube) by a Duffy transformation, and the
//! Jacobian factors `(1 - v)` and `(1 - w)^2` of the collapse are absorbed into
//! Gauss–Jacobi weights.

use crate::univariate::{gauss, gauss_jacobi};
use crate::{check_order, gauss_points_for_order, Error, Rule};

/// A rule on the unit triangle integrating polynomials of total order `order` exactly.
pub fn triangle(order: usize) -> Result<Rule<2>, Error> {
    check_order(order)?;
    let rule = match order {
        0 | 1 => (vec![0.5], vec![[1.0 / 3.0, 1.0 / 3.0]]),
        2 => {
            let w = 1.0 / 6.0;
            (
                vec![w, w, w],
                vec![[1.0 / 6.0, 1.0 / 6.0], [2.0 / 3.0, 1.0 / 6.0], [1.0 / 6.0, 2.0 / 3.0]],
            )
        }
        _ => collapsed_triangle(gauss_points_for_order(order)),
    };
    Ok(rule)
}

/// A rule on the unit tetrahedron integrating polynomials of total order `order` exactly.
pub fn tetrahedron(order: usize) -> Result<Rule<3>, Error> {
    check_order(order)?;
    let rule = match order {
        0 | 1 => (vec![1.0 / 6.0], vec![[0.25, 0.25, 0.25]]),
        2 => {
            let a = 0.5854101966249685;
            let b = 0.1381966011250105;
            let w = 1.0 / 24.0;
            (vec![w, w, w, w], vec![[b, b, b], [a, b, b], [b, a, b], [b, b, a]])
        }
        _ => collapsed_tetrahedron(gauss_points_for_order(order)),
    };
    Ok(rule)
}

/// Conical product rule on the unit triangle with `n` points per direction.
///
/// Uses the collapse `x = u (1 - v)`, `y = v`. Integrates polynomials of total order up to
/// `2 n - 1` exactly.
pub fn collapsed_triangle(num_points_per_dim: usize) -> Rule<2> {
    let n = num_points_per_dim;
    let (wu, pu) = gauss(n);
    let (wv, pv) = gauss_jacobi(n, 1.0);

    let mut weights = Vec::with_capacity(n * n);
    let mut points = Vec::with_capacity(n * n);
    for (&w_u, &[u]) in wu.iter().zip(&pu) {
        for (&w_v, &[v]) in wv.iter().zip(&pv) {
            weights.push(w_u * w_v);
            points.push([u * (1.0 - v), v]);
        }
    }
    (weights, points)
}

/// Conical product rule on the unit tetrahedron with `n` points per direction.
///
/// Uses the collapse `x = u (1 - v) (1 - w)`, `y = v (1 - w)`, `z = w`. Integrates
/// polynomials of total order up to `2 n - 1` exactly.
pub fn collapsed_tetrahedron(num_points_per_dim: usize) -> Rule<3> {
    let n = num_points_per_dim;
    let (wu, pu) = gauss(n);
    let (wv, pv) = gauss_jacobi(n, 1.0);
    let (ww, pw) = gauss_jacobi(n, 2.0);

    let mut weights = Vec::with_capacity(n * n * n);
    let mut points = Vec::with_capacity(n * n * n);
    for (&w_u, &[u]) in wu.iter().zip(&pu) {
        for (&w_v, &[v]) in wv.iter().zip(&pv) {
            for (&w_w, &[w]) in ww.iter().zip(&pw) {
                weights.push(w_u * w_v * w_w);
                points.push([u * (1.0 - v) * (1.0 - w), v * (1.0 - w), w]);
            }
        }
    }
    (weights, points)
}
