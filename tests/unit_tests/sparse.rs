use nalgebra::{DMatrix, DVector};
use util::assert_panics;
use weakform::assembly::{BlockSystem, LocalMatrix, LocalVector, SparseBuilder};
use weakform::error::Error;

#[test]
fn sparse_builder_sums_repeated_entries() {
    let mut builder = SparseBuilder::new(2, 3);
    builder.add(0, 1, 1.0);
    builder.add(1, 2, 2.0);
    builder.add(0, 1, 0.5);
    assert_eq!(builder.nnz(), 2);
    assert_eq!(builder.get(0, 1), Some(1.5));
    assert_eq!(builder.get(1, 0), None);

    let expected = DMatrix::from_row_slice(2, 3, &[0.0, 1.5, 0.0, 0.0, 0.0, 2.0]);
    assert_eq!(DMatrix::from(&builder.to_csr()), expected);

    builder.fill_zero();
    assert_eq!(builder.nnz(), 2);
    assert_eq!(builder.get(1, 2), Some(0.0));
    builder.clear();
    assert_eq!(builder.nnz(), 0);
}

#[test]
fn sparse_builder_rejects_out_of_bounds_entries() {
    assert_panics!(SparseBuilder::<f64>::new(2, 2).add(2, 0, 1.0));
    assert_panics!(SparseBuilder::<f64>::new(2, 2).add(0, 2, 1.0));
}

#[test]
fn block_ranges() {
    let system = BlockSystem::<f64>::new(&[3, 0, 2]);
    assert_eq!(system.num_blocks(), 3);
    assert_eq!(system.size(), 5);
    assert_eq!(system.block_range(0), Ok(0..3));
    assert_eq!(system.block_range(1), Ok(3..3));
    assert_eq!(system.block_range(2), Ok(3..5));
    assert_eq!(
        system.block_range(3),
        Err(Error::InvalidBlock {
            block: 3,
            num_blocks: 3
        })
    );
    assert_eq!(system.check_block_size(2, 2), Ok(()));
    assert_eq!(
        system.check_block_size(0, 2),
        Err(Error::IncompatibleDimensions {
            expected: 3,
            actual: 2
        })
    );
}

#[test]
fn local_contributions_land_in_their_blocks() {
    let mut system = BlockSystem::new(&[2, 3]);
    let local = LocalMatrix {
        rows: vec![1],
        cols: vec![0, 2],
        matrix: DMatrix::from_row_slice(1, 2, &[1.0, 2.0]),
    };
    system.add_local_matrix(0, 1, &local).unwrap();
    system.add_local_matrix_transposed(0, 1, &local).unwrap();
    system.add_entry(1, 1, 2, 2, 5.0).unwrap();

    let vector = LocalVector {
        rows: vec![0, 2],
        vector: DVector::from_column_slice(&[1.0, -1.0]),
    };
    system.add_local_vector(1, &vector).unwrap();

    #[rustfmt::skip]
    let expected = DMatrix::from_row_slice(5, 5, &[
        0.0, 0.0, 0.0, 0.0, 0.0,
        0.0, 0.0, 1.0, 0.0, 2.0,
        0.0, 1.0, 0.0, 0.0, 0.0,
        0.0, 0.0, 0.0, 0.0, 0.0,
        0.0, 2.0, 0.0, 0.0, 5.0,
    ]);
    assert_eq!(DMatrix::from(&system.to_csr()), expected);
    assert_eq!(
        DMatrix::from(&system.matrix_block(1, 0).unwrap()),
        DMatrix::from_row_slice(3, 2, &[0.0, 1.0, 0.0, 0.0, 0.0, 2.0])
    );
    assert_eq!(
        system.rhs_block(1).unwrap().into_owned(),
        DVector::from_column_slice(&[1.0, 0.0, -1.0])
    );
    assert_eq!(system.rhs_block(0).unwrap().into_owned(), DVector::zeros(2));

    system.reset();
    assert_eq!(system.rhs(), &DVector::zeros(5));
    assert!(system.matrix().triplet_iter().all(|(_, _, v)| v == 0.0));
}
