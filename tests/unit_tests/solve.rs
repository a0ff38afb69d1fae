use crate::unit_tests::library_error;
use matrixcompare::assert_matrix_eq;
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use weakform::assembly::BlockSystem;
use weakform::error::Error;
use weakform::solve::{is_symmetric, solve_linear_system, solve_system, SolverSettings};

fn csr(nrows: usize, values: &[f64]) -> CsrMatrix<f64> {
    let dense = DMatrix::from_row_slice(nrows, values.len() / nrows, values);
    CsrMatrix::from(&CooMatrix::from(&dense))
}

#[test]
fn symmetry_detection() {
    assert!(is_symmetric(&csr(2, &[2.0, 1.0, 1.0, 3.0]), 1e-12));
    assert!(!is_symmetric(&csr(2, &[2.0, 1.0, 0.0, 3.0]), 1e-12));
    assert!(!is_symmetric(&csr(1, &[1.0, 1.0]), 1e-12));
    assert!(is_symmetric(&csr(2, &[2.0, 1.0, 1.0 + 1e-15, 3.0]), 1e-12));
}

#[test]
fn symmetric_positive_definite_system() {
    let matrix = csr(3, &[4.0, -1.0, 0.0, -1.0, 4.0, -1.0, 0.0, -1.0, 4.0]);
    let expected = DVector::from_column_slice(&[1.0, -2.0, 0.5]);
    let rhs = &matrix * &expected;
    let settings = SolverSettings::default().with_fallback_to_dense(false);
    let solution = solve_linear_system(&matrix, &rhs, &settings).unwrap();
    assert_matrix_eq!(solution, expected, comp = abs, tol = 1e-12);
}

#[test]
fn nonsymmetric_system_falls_back_to_dense_lu() {
    let matrix = csr(2, &[1.0, 2.0, 0.0, 3.0]);
    let rhs = DVector::from_column_slice(&[5.0, 6.0]);
    let solution = solve_linear_system(&matrix, &rhs, &SolverSettings::default()).unwrap();
    assert_matrix_eq!(solution, DVector::from_column_slice(&[1.0, 2.0]), comp = abs, tol = 1e-12);

    let report = solve_linear_system(&matrix, &rhs, &SolverSettings::default().with_fallback_to_dense(false)).unwrap_err();
    assert!(matches!(library_error(&report), Error::SolveFailed { .. }));
}

#[test]
fn indefinite_symmetric_system_falls_back_to_dense_lu() {
    let matrix = csr(2, &[0.0, 1.0, 1.0, 0.0]);
    let rhs = DVector::from_column_slice(&[3.0, 4.0]);
    let solution = solve_linear_system(&matrix, &rhs, &SolverSettings::default()).unwrap();
    assert_matrix_eq!(solution, DVector::from_column_slice(&[4.0, 3.0]), comp = abs, tol = 1e-12);
}

#[test]
fn singular_system_fails() {
    let matrix = csr(2, &[1.0, 2.0, 2.0, 4.0]);
    let rhs = DVector::from_column_slice(&[1.0, 1.0]);
    let report = solve_linear_system(&matrix, &rhs, &SolverSettings::default()).unwrap_err();
    assert!(matches!(library_error(&report), Error::SolveFailed { .. }));
}

#[test]
fn right_hand_side_must_match_the_matrix() {
    let matrix = csr(2, &[1.0, 0.0, 0.0, 1.0]);
    let rhs = DVector::from_column_slice(&[1.0, 1.0, 1.0]);
    let report = solve_linear_system(&matrix, &rhs, &SolverSettings::default()).unwrap_err();
    assert_eq!(
        library_error(&report),
        &Error::IncompatibleDimensions {
            expected: 2,
            actual: 3
        }
    );
}

#[test]
fn block_system_solution_is_split_by_block() {
    let mut system = BlockSystem::new(&[2, 1]);
    for (i, value) in [2.0, 4.0, 8.0].into_iter().enumerate() {
        system.matrix_mut().add(i, i, value);
        system.rhs_mut()[i] = value * (i + 1) as f64;
    }
    let blocks = solve_system(&system, &SolverSettings::default()).unwrap();
    assert_eq!(blocks.len(), 2);
    assert_matrix_eq!(blocks[0].clone(), DVector::from_column_slice(&[1.0, 2.0]), comp = abs, tol = 1e-14);
    assert_matrix_eq!(blocks[1].clone(), DVector::from_column_slice(&[3.0]), comp = abs, tol = 1e-14);
}
