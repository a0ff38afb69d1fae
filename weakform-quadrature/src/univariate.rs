//! Gauss-type quadrature rules for the unit interval `[0, 1]`.

use crate::Rule;
use std::f64::consts::PI;

const NEWTON_TOLERANCE: f64 = 1e-15;
const MAX_NEWTON_ITERATIONS: usize = 100;

/// Three-term recurrence for the Jacobi polynomials `P_n^{(alpha, 0)}` on `[-1, 1]`.
///
/// Only Jacobi polynomials with `beta = 0` are needed, since these are the polynomials
/// associated with the weight `(1 - x)^alpha`, which arises from collapsing simplices onto
/// tensor product domains.
///
/// Note: the derivative formula is singular at |x| == 1, so it is only
/// suitable for evaluation in the open interval (-1, 1).
#[derive(Debug, Default)]
struct JacobiRecurrence {
    n: usize,
    alpha: f64,
    x: f64,
    // The current value, i.e. p_n(x)
    p1: f64,
    // The previous value in the recurrence, i.e. p_{n - 1}(x)
    p2: f64,
}

impl JacobiRecurrence {
    pub fn evaluate(n: usize, alpha: f64, x: f64) -> Self {
        let mut p1 = 1.0;
        let mut p2 = 0.0;
        if n >= 1 {
            p2 = p1;
            p1 = 0.5 * (alpha + (alpha + 2.0) * x);
        }
        for j in 2..=n {
            let j = j as f64;
            let p3 = p2;
            p2 = p1;
            let t = 2.0 * j + alpha;
            let a = 2.0 * j * (j + alpha) * (t - 2.0);
            let b = (t - 1.0) * (alpha * alpha + t * (t - 2.0) * x);
            let c = 2.0 * (j - 1.0 + alpha) * (j - 1.0) * t;
            p1 = (b * p2 - c * p3) / a;
        }

        Self { n, alpha, x, p1, p2 }
    }

    fn value(&self) -> f64 {
        self.p1
    }

    fn previous(&self) -> f64 {
        self.p2
    }

    fn derivative(&self) -> f64 {
        let Self { n, alpha, x, p1, p2 } = *self;
        if n == 0 {
            return 0.0;
        }
        let n = n as f64;
        let t = 2.0 * n + alpha;
        (n * (alpha - t * x) * p1 + 2.0 * (n + alpha) * n * p2) / (t * (1.0 - x * x))
    }
}

/// Gauss–Jacobi quadrature on `[0, 1]` for the weight function `(1 - x)^alpha`.
///
/// Given `n` points, the rule integrates `(1 - x)^alpha p(x)` exactly for all polynomials
/// `p` of order up to `2 n - 1`. The points are returned in ascending order.
///
/// # Panics
///
/// Panics if zero points are requested or if `alpha <= -1`.
pub fn gauss_jacobi(num_points: usize, alpha: f64) -> Rule<1> {
    let n = num_points;
    assert!(n > 0, "number of points must be positive");
    assert!(alpha > -1.0, "alpha must be greater than -1");

    let mut roots: Vec<f64> = Vec::with_capacity(n);
    let mut weights = Vec::with_capacity(n);

    // Newton's method with polynomial deflation, where the roots are found in ascending
    // order starting from Chebyshev-type initial guesses
    for k in 0..n {
        let mut x = -(PI * (2.0 * k as f64 + 1.0) / (2.0 * n as f64)).cos();
        if let Some(&previous) = roots.last() {
            x = 0.5 * (x + previous);
        }

        for _ in 0..MAX_NEWTON_ITERATIONS {
            let recurrence = JacobiRecurrence::evaluate(n, alpha, x);
            let p = recurrence.value();
            let dp = recurrence.derivative();
            let deflation: f64 = roots.iter().map(|r| 1.0 / (x - r)).sum();
            let dx = p / (dp - p * deflation);
            x -= dx;
            if dx.abs() <= NEWTON_TOLERANCE {
                break;
            }
        }

        let recurrence = JacobiRecurrence::evaluate(n, alpha, x);
        let t = 2.0 * n as f64 + alpha;
        let nf = n as f64;
        let w = t * 2f64.powf(alpha) / (nf * (nf + alpha) * recurrence.derivative() * recurrence.previous());

        roots.push(x);
        weights.push(w);
    }

    assert_eq!(roots.len(), n, "Internal error: incorrect number of points produced");

    // Map from [-1, 1] with weight (1 - x)^alpha to [0, 1] with weight (1 - x)^alpha
    let scale = 2f64.powf(-(alpha + 1.0));
    let points = roots.iter().map(|x| [0.5 * (x + 1.0)]).collect();
    let weights = weights.iter().map(|w| w * scale).collect();
    (weights, points)
}

/// Gauss(–Legendre) quadrature for the unit interval `[0, 1]`.
///
/// Given `n` points, the rule integrates polynomials of order up to `2 n - 1` exactly.
///
/// # Panics
///
/// Panics if zero points are requested.
pub fn gauss(num_points: usize) -> Rule<1> {
    gauss_jacobi(num_points, 0.0)
}
