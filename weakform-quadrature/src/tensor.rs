//! Quadrature rules for the unit square and the unit cube, formed as tensor products of
//! Gauss rules on `[0, 1]`.

use crate::univariate::gauss;
use crate::{check_order, gauss_points_for_order, Error, Rule};

/// A Gauss quadrature rule for the unit square.
///
/// The rule is constructed as a tensor product from 1D rules, with the provided number of
/// points per dimension.
pub fn quadrilateral_gauss(num_points_per_dim: usize) -> Rule<2> {
    let n = num_points_per_dim;
    let (weights1d, points1d) = gauss(n);
    let mut weights2d = Vec::with_capacity(n * n);
    let mut points2d = Vec::with_capacity(n * n);

    let rule1d_iter = || weights1d.iter().zip(&points1d);

    for (&wx, &[x]) in rule1d_iter() {
        for (&wy, &[y]) in rule1d_iter() {
            weights2d.push(wx * wy);
            points2d.push([x, y]);
        }
    }

    (weights2d, points2d)
}

/// A Gauss quadrature rule for the unit cube.
///
/// The rule is constructed as a tensor product from 1D rules, with the provided number of
/// points per dimension.
pub fn hexahedron_gauss(num_points_per_dim: usize) -> Rule<3> {
    let n = num_points_per_dim;
    let (weights1d, points1d) = gauss(n);
    let mut weights3d = Vec::with_capacity(n * n * n);
    let mut points3d = Vec::with_capacity(n * n * n);

    let rule1d_iter = || weights1d.iter().zip(&points1d);

    for (&wx, &[x]) in rule1d_iter() {
        for (&wy, &[y]) in rule1d_iter() {
            for (&wz, &[z]) in rule1d_iter() {
                weights3d.push(wx * wy * wz);
                points3d.push([x, y, z]);
            }
        }
    }

    (weights3d, points3d)
}

/// A Gauss rule on `[0, 1]` integrating polynomials of the given order exactly.
pub fn interval(order: usize) -> Result<Rule<1>, Error> {
    check_order(order)?;
    Ok(gauss(gauss_points_for_order(order)))
}

/// A rule on the unit square integrating polynomials of the given (per-dimension) order exactly.
pub fn quadrilateral(order: usize) -> Result<Rule<2>, Error> {
    check_order(order)?;
    Ok(quadrilateral_gauss(gauss_points_for_order(order)))
}

/// A rule on the unit cube integrating polynomials of the given (per-dimension) order exactly.
pub fn hexahedron(order: usize) -> Result<Rule<3>, Error> {
    check_order(order)?;
    Ok(hexahedron_gauss(gauss_points_for_order(order)))
}
