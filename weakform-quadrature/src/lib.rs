//! Quadrature rules for finite element reference domains.
//!
//! All rules are defined on *unit* reference domains:
//!
//! - the unit interval `[0, 1]`,
//! - the unit square `[0, 1]^2` and the unit cube `[0, 1]^3`,
//! - the unit triangle with vertices `(0, 0)`, `(1, 0)`, `(0, 1)`,
//! - the unit tetrahedron with vertices `0`, `e1`, `e2`, `e3`.
//!
//! The weights of every rule sum to the volume of its domain.
//! Rules are plain `f64` tables; conversion into other scalar types is left to the caller.

use std::fmt;
use std::fmt::{Display, Formatter};

pub mod simplex;
pub mod tensor;
pub mod univariate;

/// The highest polynomial order for which rules are provided.
pub const MAX_ORDER: usize = 64;

/// Library-wide error type.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// Indicates that a rule satisfying the given requirements is not available.
    NoRuleAvailable {
        /// The requested polynomial order.
        order: usize,
    },
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoRuleAvailable { order } => {
                write!(
                    f,
                    "There is no quadrature rule of order {order} available (max order is {MAX_ORDER})"
                )
            }
        }
    }
}

impl std::error::Error for Error {}

/// A D-dimensional point.
pub type Point<const D: usize> = [f64; D];

/// A D-dimensional rule, stored as `(weights, points)`.
pub type Rule<const D: usize> = (Vec<f64>, Vec<Point<D>>);

/// Number of Gauss points per dimension needed to integrate polynomials of the given
/// order exactly.
pub fn gauss_points_for_order(order: usize) -> usize {
    // n points integrate polynomials of order 2n - 1 exactly
    (order + 2) / 2
}

pub(crate) fn check_order(order: usize) -> Result<(), Error> {
    if order > MAX_ORDER {
        Err(Error::NoRuleAvailable { order })
    } else {
        Ok(())
    }
}

/// Integrates the given function with the given quadrature rule.
pub fn integrate<const D: usize>(rule: &Rule<D>, mut f: impl FnMut(&Point<D>) -> f64) -> f64 {
    let (weights, points) = rule;
    weights
        .iter()
        .zip(points)
        .map(|(w, x)| w * f(x))
        .sum()
}
