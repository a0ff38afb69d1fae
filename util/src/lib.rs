use nalgebra::{DMatrix, Scalar};
use num::{Float, Zero};

/// Poor man's approx assertion for matrices
#[macro_export]
macro_rules! assert_approx_matrix_eq {
    ($x:expr, $y:expr, abstol = $tol:expr) => {{
        let diff = &$x - &$y;

        let max_absdiff = diff.abs().max();
        let approx_eq = max_absdiff <= $tol;

        if !approx_eq {
            println!("abstol: {:e}", $tol);
            println!("left: {}", $x);
            println!("right: {}", $y);
            println!("diff: {:e}", diff);
        }
        assert!(approx_eq);
    }};
}

#[macro_export]
macro_rules! assert_panics {
    ($e:expr) => {{
        use std::panic::catch_unwind;
        use std::stringify;
        let expr_string = stringify!($e);
        let result = catch_unwind(|| $e);
        if result.is_ok() {
            panic!("assert_panics!({}) failed.", expr_string);
        }
    }};
}

/// n! as a floating-point number.
pub fn factorial(n: usize) -> f64 {
    (1..=n).map(|k| k as f64).product()
}

/// Exact integral of the monomial `x_1^{a_1} ... x_d^{a_d}` over the unit simplex in `d` dimensions.
pub fn simplex_monomial_integral(exponents: &[usize]) -> f64 {
    let total: usize = exponents.iter().sum();
    let numerator: f64 = exponents.iter().map(|&a| factorial(a)).product();
    numerator / factorial(total + exponents.len())
}

/// Exact integral of the monomial `x_1^{a_1} ... x_d^{a_d}` over the unit box `[0, 1]^d`.
pub fn box_monomial_integral(exponents: &[usize]) -> f64 {
    exponents.iter().map(|&a| 1.0 / (a as f64 + 1.0)).product()
}

/// Largest absolute entry-wise difference between two matrices of equal shape.
pub fn max_abs_difference<T>(a: &DMatrix<T>, b: &DMatrix<T>) -> T
where
    T: Scalar + Float,
{
    assert_eq!(a.shape(), b.shape(), "Matrices must have the same shape");
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (*x - *y).abs())
        .fold(T::zero(), |max, d| if d > max { d } else { max })
}

pub fn prefix_sum(counts: impl IntoIterator<Item = usize>, x0: usize) -> impl Iterator<Item = usize> {
    counts.into_iter().scan(x0, |sum, x| {
        let current = *sum;
        *sum += x;
        Some(current)
    })
}

/// Returns `true` if all entries of the matrix are exactly zero.
pub fn is_exactly_zero<T: Scalar + Zero>(matrix: &DMatrix<T>) -> bool {
    matrix.iter().all(|x| x.is_zero())
}
