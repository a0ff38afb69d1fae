//! Global sparse storage: an arena-indexed triplet builder and a block system on top of it.
use crate::assembly::{LocalMatrix, LocalVector};
use crate::error::Error;
use crate::Real;
use nalgebra::{DVector, DVectorView, DVectorViewMut};
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use rustc_hash::FxHashMap;
use std::ops::Range;

/// Accumulates sparse matrix entries.
///
/// Each distinct `(row, col)` position owns one slot in an arena; contributions to the same
/// position are summed into its slot in the order they are added. The builder is converted
/// to CSR once assembly is complete.
#[derive(Debug, Clone)]
pub struct SparseBuilder<T> {
    nrows: usize,
    ncols: usize,
    index: FxHashMap<(usize, usize), usize>,
    rows: Vec<usize>,
    cols: Vec<usize>,
    values: Vec<T>,
}

impl<T: Real> SparseBuilder<T> {
    pub fn new(nrows: usize, ncols: usize) -> Self {
        Self {
            nrows,
            ncols,
            index: FxHashMap::default(),
            rows: Vec::new(),
            cols: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// The number of structurally nonzero entries.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Adds `value` to the entry `(row, col)`.
    ///
    /// # Panics
    ///
    /// Panics if the position is out of bounds.
    pub fn add(&mut self, row: usize, col: usize, value: T) {
        assert!(row < self.nrows && col < self.ncols, "Entry ({row}, {col}) out of bounds");
        let next_slot = self.values.len();
        let slot = *self.index.entry((row, col)).or_insert(next_slot);
        if slot == next_slot {
            self.rows.push(row);
            self.cols.push(col);
            self.values.push(value);
        } else {
            self.values[slot] += value;
        }
    }

    pub fn get(&self, row: usize, col: usize) -> Option<T> {
        self.index.get(&(row, col)).map(|&slot| self.values[slot])
    }

    /// Sets all stored values to zero, keeping the structure.
    pub fn fill_zero(&mut self) {
        self.values.fill(T::zero());
    }

    /// Removes all entries.
    pub fn clear(&mut self) {
        self.index.clear();
        self.rows.clear();
        self.cols.clear();
        self.values.clear();
    }

    pub fn triplet_iter(&self) -> impl '_ + Iterator<Item = (usize, usize, T)> {
        self.rows
            .iter()
            .zip(&self.cols)
            .zip(&self.values)
            .map(|((&i, &j), &v)| (i, j, v))
    }

    pub fn to_csr(&self) -> CsrMatrix<T> {
        let coo = CooMatrix::try_from_triplets(
            self.nrows,
            self.ncols,
            self.rows.clone(),
            self.cols.clone(),
            self.values.clone(),
        )
        .expect("Internal error: triplets are in bounds by construction");
        CsrMatrix::from(&coo)
    }
}

/// A block-structured linear system `A x = b` with one block per unknown.
#[derive(Debug, Clone)]
pub struct BlockSystem<T> {
    offsets: Vec<usize>,
    matrix: SparseBuilder<T>,
    rhs: DVector<T>,
}

impl<T: Real> BlockSystem<T> {
    /// Creates an empty system with the given block sizes.
    pub fn new(block_sizes: &[usize]) -> Self {
        let mut offsets = Vec::with_capacity(block_sizes.len() + 1);
        offsets.push(0);
        for size in block_sizes {
            offsets.push(offsets.last().copied().unwrap_or(0) + size);
        }
        let n = offsets.last().copied().unwrap_or(0);
        Self {
            offsets,
            matrix: SparseBuilder::new(n, n),
            rhs: DVector::zeros(n),
        }
    }

    pub fn num_blocks(&self) -> usize {
        self.offsets.len() - 1
    }

    /// The total number of unknowns.
    pub fn size(&self) -> usize {
        self.rhs.len()
    }

    /// The global index range of the given block.
    pub fn block_range(&self, block: usize) -> Result<Range<usize>, Error> {
        if block < self.num_blocks() {
            Ok(self.offsets[block]..self.offsets[block + 1])
        } else {
            Err(Error::InvalidBlock {
                block,
                num_blocks: self.num_blocks(),
            })
        }
    }

    /// Checks that a space with `ndofs` dofs fits into the given block.
    pub fn check_block_size(&self, block: usize, ndofs: usize) -> Result<(), Error> {
        let range = self.block_range(block)?;
        if range.len() == ndofs {
            Ok(())
        } else {
            Err(Error::IncompatibleDimensions {
                expected: range.len(),
                actual: ndofs,
            })
        }
    }

    pub fn matrix(&self) -> &SparseBuilder<T> {
        &self.matrix
    }

    pub fn matrix_mut(&mut self) -> &mut SparseBuilder<T> {
        &mut self.matrix
    }

    pub fn rhs(&self) -> &DVector<T> {
        &self.rhs
    }

    pub fn rhs_mut(&mut self) -> &mut DVector<T> {
        &mut self.rhs
    }

    pub fn rhs_block(&self, block: usize) -> Result<DVectorView<T>, Error> {
        let range = self.block_range(block)?;
        Ok(self.rhs.rows(range.start, range.len()))
    }

    pub fn rhs_block_mut(&mut self, block: usize) -> Result<DVectorViewMut<T>, Error> {
        let range = self.block_range(block)?;
        Ok(self.rhs.rows_mut(range.start, range.len()))
    }

    /// Adds `value` to entry `(i, j)` of block `(p, q)`.
    pub fn add_entry(&mut self, p: usize, q: usize, i: usize, j: usize, value: T) -> Result<(), Error> {
        let (rows, cols) = (self.block_range(p)?, self.block_range(q)?);
        self.matrix.add(rows.start + i, cols.start + j, value);
        Ok(())
    }

    /// Scatters a local matrix into block `(p, q)`.
    pub fn add_local_matrix(&mut self, p: usize, q: usize, local: &LocalMatrix<T>) -> Result<(), Error> {
        let (row_offset, col_offset) = (self.block_range(p)?.start, self.block_range(q)?.start);
        for (a, &i) in local.rows.iter().enumerate() {
            for (b, &j) in local.cols.iter().enumerate() {
                self.matrix
                    .add(row_offset + i, col_offset + j, local.matrix[(a, b)]);
            }
        }
        Ok(())
    }

    /// Scatters the transpose of a local matrix into block `(q, p)`.
    pub fn add_local_matrix_transposed(&mut self, p: usize, q: usize, local: &LocalMatrix<T>) -> Result<(), Error> {
        let (row_offset, col_offset) = (self.block_range(q)?.start, self.block_range(p)?.start);
        for (a, &i) in local.rows.iter().enumerate() {
            for (b, &j) in local.cols.iter().enumerate() {
                self.matrix
                    .add(row_offset + j, col_offset + i, local.matrix[(a, b)]);
            }
        }
        Ok(())
    }

    /// Scatters a local vector into block `p` of the right-hand side.
    pub fn add_local_vector(&mut self, p: usize, local: &LocalVector<T>) -> Result<(), Error> {
        let offset = self.block_range(p)?.start;
        for (a, &i) in local.rows.iter().enumerate() {
            self.rhs[offset + i] += local.vector[a];
        }
        Ok(())
    }

    /// Extracts block `(p, q)` of the assembled matrix.
    pub fn matrix_block(&self, p: usize, q: usize) -> Result<CsrMatrix<T>, Error> {
        let (rows, cols) = (self.block_range(p)?, self.block_range(q)?);
        let mut coo = CooMatrix::new(rows.len(), cols.len());
        for (i, j, v) in self.matrix.triplet_iter() {
            if rows.contains(&i) && cols.contains(&j) {
                coo.push(i - rows.start, j - cols.start, v);
            }
        }
        Ok(CsrMatrix::from(&coo))
    }

    pub fn to_csr(&self) -> CsrMatrix<T> {
        self.matrix.to_csr()
    }

    /// Zeroes the matrix values (keeping the structure) and the right-hand side.
    pub fn reset(&mut self) {
        self.matrix.fill_zero();
        self.rhs.fill(T::zero());
    }
}
