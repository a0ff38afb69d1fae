//! Compact storage for variable-length index tables (cell nodes, cell dofs, ...).
use std::fmt;
use std::fmt::{Debug, Formatter};
use std::ops::Range;

/// A table of variable-length rows stored contiguously, with an offset array delimiting rows.
#[derive(Clone, PartialEq, Eq)]
pub struct NestedTable<T> {
    data: Vec<T>,
    offsets: Vec<usize>,
}

impl<T: Debug> Debug for NestedTable<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T> Default for NestedTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> NestedTable<T> {
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            offsets: vec![0],
        }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of entries across all rows.
    pub fn total_num_entries(&self) -> usize {
        self.data.len()
    }

    pub fn get(&self, index: usize) -> Option<&[T]> {
        let range = self.row_range(index)?;
        self.data.get(range)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut [T]> {
        let range = self.row_range(index)?;
        self.data.get_mut(range)
    }

    /// Returns the given row.
    ///
    /// # Panics
    ///
    /// Panics if the row index is out of bounds.
    pub fn row(&self, index: usize) -> &[T] {
        self.get(index).expect("Row index out of bounds")
    }

    pub fn iter(&self) -> impl '_ + ExactSizeIterator<Item = &[T]> {
        (0..self.len()).map(move |i| self.row(i))
    }

    /// Iterates over all entries of all rows.
    pub fn entries(&self) -> &[T] {
        &self.data
    }

    /// Appends a row built from the given iterator.
    pub fn push_iter(&mut self, row: impl IntoIterator<Item = T>) {
        self.data.extend(row);
        self.offsets.push(self.data.len());
    }

    fn row_range(&self, index: usize) -> Option<Range<usize>> {
        let begin = *self.offsets.get(index)?;
        let end = *self.offsets.get(index + 1)?;
        Some(begin..end)
    }
}

impl<T: Clone> NestedTable<T> {
    pub fn push(&mut self, row: &[T]) {
        self.data.extend_from_slice(row);
        self.offsets.push(self.data.len());
    }
}

impl<T: Clone> From<&[Vec<T>]> for NestedTable<T> {
    fn from(rows: &[Vec<T>]) -> Self {
        let mut table = Self::new();
        for row in rows {
            table.push(row);
        }
        table
    }
}

impl<T: Clone> From<Vec<Vec<T>>> for NestedTable<T> {
    fn from(rows: Vec<Vec<T>>) -> Self {
        Self::from(rows.as_slice())
    }
}
