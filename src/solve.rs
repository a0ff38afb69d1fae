//! Solution of assembled linear systems.
use crate::assembly::BlockSystem;
use crate::error::Error;
use crate::Real;
use log::{debug, warn};
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::factorization::CscCholesky;
use nalgebra_sparse::{CscMatrix, CsrMatrix};
use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolverSettings {
    /// Retry with a dense LU factorization if the sparse factorization fails.
    pub fallback_to_dense: bool,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            fallback_to_dense: true,
        }
    }
}

impl SolverSettings {
    pub fn with_fallback_to_dense(mut self, fallback_to_dense: bool) -> Self {
        self.fallback_to_dense = fallback_to_dense;
        self
    }
}

/// Whether the matrix equals its transpose up to a relative tolerance.
pub fn is_symmetric<T: Real>(matrix: &CsrMatrix<T>, tolerance: T) -> bool {
    if matrix.nrows() != matrix.ncols() {
        return false;
    }
    matrix.triplet_iter().all(|(i, j, &v)| {
        let w = matrix
            .get_entry(j, i)
            .map(|entry| entry.into_value())
            .unwrap_or_else(T::zero);
        (v - w).abs() <= tolerance * (v.abs() + w.abs())
    })
}

/// Solves `A x = b`.
///
/// Symmetric matrices are factored with a sparse Cholesky factorization. If that is not
/// possible (the matrix is not symmetric or not positive definite), the solve is retried once
/// with a dense LU factorization when `settings.fallback_to_dense` is set.
pub fn solve_linear_system<T: Real>(
    matrix: &CsrMatrix<T>,
    rhs: &DVector<T>,
    settings: &SolverSettings,
) -> eyre::Result<DVector<T>> {
    if matrix.nrows() != rhs.len() {
        return Err(Error::IncompatibleDimensions {
            expected: matrix.nrows(),
            actual: rhs.len(),
        }
        .into());
    }

    let tolerance = T::from_tabulated(1e-12);
    let reason = if is_symmetric(matrix, tolerance) {
        match CscCholesky::factor(&CscMatrix::from(matrix)) {
            Ok(cholesky) => {
                debug!("Solved system of size {} with sparse Cholesky", rhs.len());
                return Ok(cholesky.solve(rhs).column(0).into_owned());
            }
            Err(err) => format!("sparse Cholesky factorization failed: {err}"),
        }
    } else {
        "matrix is not symmetric".to_string()
    };

    if !settings.fallback_to_dense {
        return Err(Error::SolveFailed { reason }.into());
    }
    warn!("Falling back to dense LU solve ({reason})");
    DMatrix::from(matrix)
        .lu()
        .solve(rhs)
        .ok_or_else(|| {
            Error::SolveFailed {
                reason: format!("{reason}; dense LU factorization is singular"),
            }
            .into()
        })
}

/// Solves the assembled block system and splits the solution into one vector per block.
pub fn solve_system<T: Real>(system: &BlockSystem<T>, settings: &SolverSettings) -> eyre::Result<Vec<DVector<T>>> {
    let solution = solve_linear_system(&system.to_csr(), system.rhs(), settings)?;
    (0..system.num_blocks())
        .map(|block| {
            let range = system.block_range(block)?;
            Ok(solution.rows(range.start, range.len()).into_owned())
        })
        .collect()
}
