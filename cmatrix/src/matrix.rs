/*
 * Copyright (c) 2025-present Dawid Pawlik
 *
 * For educational use only by employees and students of MIMUW.
 * See LICENSE file for details.
 */

//! # Uncompressed matrix blocks
//!
//! [`MatrixBlock`] is the input the engine compresses and the value handed
//! back when compression is aborted. Two storage layouts are supported:
//!
//! - **Dense**: row-major `Vec<f64>` of `rows * cols` cells
//! - **Sparse**: compressed sparse rows (CSR) holding only non-zero cells
//!
//! [`ColumnSource`] wraps a block together with the information whether it was
//! physically transposed before column-group extraction.

use crate::error::CompressionError;
use crate::error::Result;
use crate::is_zero;
use rayon::prelude::*;
use serde::Deserialize;
use serde::Serialize;

/// Fixed per-block bookkeeping cost used by the size estimates
pub const BLOCK_HEADER_SIZE: usize = 48;

/// Compressed sparse row storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparseRows {
    row_ptr: Vec<usize>,
    col_idx: Vec<u32>,
    values: Vec<f64>,
}

impl SparseRows {
    /// Column indexes and values of one row, sorted by column
    pub fn row(&self, row: usize) -> (&[u32], &[f64]) {
        let start = self.row_ptr[row];
        let end = self.row_ptr[row + 1];
        (&self.col_idx[start..end], &self.values[start..end])
    }

    pub fn non_zeros(&self) -> usize {
        self.values.len()
    }

    fn get(&self, row: usize, col: usize) -> f64 {
        let (cols, values) = self.row(row);
        match cols.binary_search(&(col as u32)) {
            Ok(pos) => values[pos],
            Err(_) => 0.0,
        }
    }

    fn in_memory_size(&self) -> usize {
        self.values.len() * 8 + self.col_idx.len() * 4 + self.row_ptr.len() * 8
    }

    fn validate(&self, num_rows: usize, num_cols: usize) -> Result<()> {
        let invalid = |what: &str| -> Result<()> {
            Err(CompressionError::InvalidMatrix(format!("sparse rows: {}", what)))
        };
        if self.row_ptr.len() != num_rows + 1 || self.row_ptr.first() != Some(&0) {
            return invalid("row pointers do not match the row count");
        }
        if self.row_ptr.windows(2).any(|w| w[0] > w[1]) {
            return invalid("row pointers decrease");
        }
        let nnz = self.row_ptr[num_rows];
        if nnz != self.col_idx.len() || nnz != self.values.len() {
            return invalid("row pointers disagree with the stored cells");
        }
        for row in 0..num_rows {
            let (cols, _) = self.row(row);
            if cols.windows(2).any(|w| w[0] >= w[1]) || cols.last().is_some_and(|&c| c as usize >= num_cols) {
                return invalid(&format!("columns of row {} are unsorted or out of range", row));
            }
        }
        Ok(())
    }
}

/// Storage layout of a [`MatrixBlock`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MatrixData {
    Dense(Vec<f64>),
    Sparse(SparseRows),
}

/// An uncompressed numeric matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixBlock {
    num_rows: usize,
    num_cols: usize,
    data: MatrixData,
}

impl MatrixBlock {
    /// Create a dense block from row-major values
    pub fn dense(num_rows: usize, num_cols: usize, values: Vec<f64>) -> Result<Self> {
        if values.len() != num_rows * num_cols {
            return Err(CompressionError::InvalidMatrix(format!(
                "expected {} values for a {}x{} matrix, got {}",
                num_rows * num_cols,
                num_rows,
                num_cols,
                values.len()
            )));
        }
        Ok(MatrixBlock {
            num_rows,
            num_cols,
            data: MatrixData::Dense(values),
        })
    }

    /// Create a dense block from a list of equally long rows
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let num_rows = rows.len();
        let num_cols = rows.first().map(|r| r.len()).unwrap_or(0);
        let mut values = Vec::with_capacity(num_rows * num_cols);

        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != num_cols {
                return Err(CompressionError::InvalidMatrix(format!(
                    "row {} has {} values, expected {}",
                    i,
                    row.len(),
                    num_cols
                )));
            }
            values.extend(row);
        }

        Self::dense(num_rows, num_cols, values)
    }

    /// Create a sparse block from `(row, col, value)` triplets.
    ///
    /// Zero values are dropped; a cell given twice is rejected.
    pub fn sparse_from_triplets(
        num_rows: usize,
        num_cols: usize,
        mut triplets: Vec<(usize, usize, f64)>,
    ) -> Result<Self> {
        for &(r, c, _) in &triplets {
            if r >= num_rows || c >= num_cols {
                return Err(CompressionError::InvalidMatrix(format!(
                    "cell ({}, {}) is outside a {}x{} matrix",
                    r, c, num_rows, num_cols
                )));
            }
        }
        if num_cols > u32::MAX as usize {
            return Err(CompressionError::InvalidMatrix(format!(
                "{} columns exceed the sparse column index range",
                num_cols
            )));
        }

        triplets.sort_by_key(|&(r, c, _)| (r, c));
        if let Some(w) = triplets
            .windows(2)
            .find(|w| w[0].0 == w[1].0 && w[0].1 == w[1].1)
        {
            return Err(CompressionError::InvalidMatrix(format!(
                "cell ({}, {}) given more than once",
                w[0].0, w[0].1
            )));
        }

        let mut row_ptr = vec![0usize; num_rows + 1];
        let mut col_idx = Vec::with_capacity(triplets.len());
        let mut values = Vec::with_capacity(triplets.len());
        for (r, c, v) in triplets {
            if is_zero(v) {
                continue;
            }
            row_ptr[r + 1] += 1;
            col_idx.push(c as u32);
            values.push(v);
        }
        for r in 0..num_rows {
            row_ptr[r + 1] += row_ptr[r];
        }

        Ok(MatrixBlock {
            num_rows,
            num_cols,
            data: MatrixData::Sparse(SparseRows {
                row_ptr,
                col_idx,
                values,
            }),
        })
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_cols(&self) -> usize {
        self.num_cols
    }

    pub fn is_sparse(&self) -> bool {
        matches!(self.data, MatrixData::Sparse(_))
    }

    pub fn data(&self) -> &MatrixData {
        &self.data
    }

    /// Row-major values if the block is dense
    pub fn dense_values(&self) -> Option<&[f64]> {
        match &self.data {
            MatrixData::Dense(values) => Some(values),
            MatrixData::Sparse(_) => None,
        }
    }

    pub fn sparse_rows(&self) -> Option<&SparseRows> {
        match &self.data {
            MatrixData::Dense(_) => None,
            MatrixData::Sparse(sparse) => Some(sparse),
        }
    }

    /// Check that the storage matches the shape, e.g. after deserialization
    pub fn validate(&self) -> Result<()> {
        match &self.data {
            MatrixData::Dense(values) => {
                if self.num_rows.checked_mul(self.num_cols) != Some(values.len()) {
                    return Err(CompressionError::InvalidMatrix(format!(
                        "{} dense values for a {}x{} matrix",
                        values.len(),
                        self.num_rows,
                        self.num_cols
                    )));
                }
                Ok(())
            }
            MatrixData::Sparse(sparse) => sparse.validate(self.num_rows, self.num_cols),
        }
    }

    /// Number of cells that are not `+0.0`
    pub fn non_zeros(&self) -> usize {
        match &self.data {
            MatrixData::Dense(values) => values.iter().filter(|v| !is_zero(**v)).count(),
            MatrixData::Sparse(sparse) => sparse.non_zeros(),
        }
    }

    /// Read a single cell, `None` when out of bounds
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.num_rows || col >= self.num_cols {
            return None;
        }
        Some(match &self.data {
            MatrixData::Dense(values) => values[row * self.num_cols + col],
            MatrixData::Sparse(sparse) => sparse.get(row, col),
        })
    }

    pub fn is_row_empty(&self, row: usize) -> bool {
        match &self.data {
            MatrixData::Dense(values) => values[row * self.num_cols..(row + 1) * self.num_cols]
                .iter()
                .all(|v| is_zero(*v)),
            MatrixData::Sparse(sparse) => sparse.row(row).0.is_empty(),
        }
    }

    pub fn to_dense(&self) -> MatrixBlock {
        match &self.data {
            MatrixData::Dense(_) => self.clone(),
            MatrixData::Sparse(sparse) => {
                let mut values = vec![0.0; self.num_rows * self.num_cols];
                for r in 0..self.num_rows {
                    let (cols, vals) = sparse.row(r);
                    for (c, v) in cols.iter().zip(vals) {
                        values[r * self.num_cols + *c as usize] = *v;
                    }
                }
                MatrixBlock {
                    num_rows: self.num_rows,
                    num_cols: self.num_cols,
                    data: MatrixData::Dense(values),
                }
            }
        }
    }

    pub fn to_sparse(&self) -> MatrixBlock {
        match &self.data {
            MatrixData::Sparse(_) => self.clone(),
            MatrixData::Dense(values) => {
                let mut row_ptr = Vec::with_capacity(self.num_rows + 1);
                let mut col_idx = Vec::new();
                let mut sparse_values = Vec::new();
                row_ptr.push(0);
                for row in values.chunks(self.num_cols.max(1)).take(self.num_rows) {
                    for (c, v) in row.iter().enumerate() {
                        if !is_zero(*v) {
                            col_idx.push(c as u32);
                            sparse_values.push(*v);
                        }
                    }
                    row_ptr.push(col_idx.len());
                }
                // A 0-column matrix still needs one pointer per row
                row_ptr.resize(self.num_rows + 1, 0);
                MatrixBlock {
                    num_rows: self.num_rows,
                    num_cols: self.num_cols,
                    data: MatrixData::Sparse(SparseRows {
                        row_ptr,
                        col_idx,
                        values: sparse_values,
                    }),
                }
            }
        }
    }

    /// Physically transpose the block, keeping its storage layout.
    ///
    /// With `parallel` set the dense path fills output rows on the current
    /// rayon pool.
    pub fn transpose(&self, parallel: bool) -> MatrixBlock {
        let (rows, cols) = (self.num_rows, self.num_cols);
        match &self.data {
            MatrixData::Dense(values) => {
                let mut out = vec![0.0; rows * cols];
                let fill = |(c, out_row): (usize, &mut [f64])| {
                    for (r, cell) in out_row.iter_mut().enumerate() {
                        *cell = values[r * cols + c];
                    }
                };
                if rows > 0 {
                    if parallel {
                        out.par_chunks_mut(rows).enumerate().for_each(fill);
                    } else {
                        out.chunks_mut(rows).enumerate().for_each(fill);
                    }
                }
                MatrixBlock {
                    num_rows: cols,
                    num_cols: rows,
                    data: MatrixData::Dense(out),
                }
            }
            MatrixData::Sparse(sparse) => {
                // Counting sort of the entries by column
                let mut row_ptr = vec![0usize; cols + 1];
                for c in &sparse.col_idx {
                    row_ptr[*c as usize + 1] += 1;
                }
                for c in 0..cols {
                    row_ptr[c + 1] += row_ptr[c];
                }
                let mut next = row_ptr.clone();
                let mut col_idx = vec![0u32; sparse.non_zeros()];
                let mut values = vec![0.0; sparse.non_zeros()];
                for r in 0..rows {
                    let (cs, vs) = sparse.row(r);
                    for (c, v) in cs.iter().zip(vs) {
                        let slot = next[*c as usize];
                        col_idx[slot] = r as u32;
                        values[slot] = *v;
                        next[*c as usize] += 1;
                    }
                }
                MatrixBlock {
                    num_rows: cols,
                    num_cols: rows,
                    data: MatrixData::Sparse(SparseRows {
                        row_ptr,
                        col_idx,
                        values,
                    }),
                }
            }
        }
    }

    /// Estimated heap footprint of the block in bytes
    pub fn estimate_size_in_memory(&self) -> usize {
        BLOCK_HEADER_SIZE
            + match &self.data {
                MatrixData::Dense(values) => values.len() * 8,
                MatrixData::Sparse(sparse) => sparse.in_memory_size(),
            }
    }

    /// Size of a `rows x cols` block with `nnz` non-zeros in its cheaper layout
    pub fn estimate_size(num_rows: usize, num_cols: usize, nnz: usize) -> usize {
        let dense = num_rows * num_cols * 8;
        let sparse = nnz * 12 + (num_rows + 1) * 8;
        BLOCK_HEADER_SIZE + dense.min(sparse)
    }

    /// Copy a slice of columns into a new block of `logical rows x cols.len()`.
    ///
    /// When `transposed` is set, `self` holds the transposed input and column
    /// `c` is read from its row `c`. The copy uses whichever layout is smaller.
    pub fn select_columns(&self, cols: &[usize], transposed: bool) -> Result<MatrixBlock> {
        let source = ColumnSource::new(self, transposed);
        for &c in cols {
            if c >= source.num_cols() {
                return Err(CompressionError::InvalidMatrix(format!(
                    "column {} out of range for {} columns",
                    c,
                    source.num_cols()
                )));
            }
        }

        let num_rows = source.num_rows();
        let mut values = vec![0.0; num_rows * cols.len()];
        for (j, &c) in cols.iter().enumerate() {
            source.for_each_in_column(c, |r, v| values[r * cols.len() + j] = v);
        }

        let block = MatrixBlock::dense(num_rows, cols.len(), values)?;
        let sparse_size = block.non_zeros() * 12 + (num_rows + 1) * 8;
        if sparse_size < num_rows * cols.len() * 8 {
            Ok(block.to_sparse())
        } else {
            Ok(block)
        }
    }
}

/// A block as seen by column-group extraction, possibly transposed
#[derive(Debug, Clone, Copy)]
pub struct ColumnSource<'a> {
    pub block: &'a MatrixBlock,
    pub transposed: bool,
}

impl<'a> ColumnSource<'a> {
    pub fn new(block: &'a MatrixBlock, transposed: bool) -> Self {
        ColumnSource { block, transposed }
    }

    /// Rows of the logical (untransposed) matrix
    pub fn num_rows(&self) -> usize {
        if self.transposed {
            self.block.num_cols()
        } else {
            self.block.num_rows()
        }
    }

    /// Columns of the logical (untransposed) matrix
    pub fn num_cols(&self) -> usize {
        if self.transposed {
            self.block.num_rows()
        } else {
            self.block.num_cols()
        }
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if self.transposed {
            self.block.get(col, row)
        } else {
            self.block.get(row, col)
        }
    }

    /// Whether a logical column holds only zeros
    pub fn is_column_empty(&self, col: usize) -> bool {
        if self.transposed {
            return self.block.is_row_empty(col);
        }
        let mut empty = true;
        self.for_each_in_column(col, |_, _| empty = false);
        empty
    }

    /// Visit every non-zero cell of a logical column in row order
    pub fn for_each_in_column(&self, col: usize, mut f: impl FnMut(usize, f64)) {
        let block = self.block;
        match (&block.data, self.transposed) {
            (MatrixData::Dense(values), false) => {
                for r in 0..block.num_rows {
                    let v = values[r * block.num_cols + col];
                    if !is_zero(v) {
                        f(r, v);
                    }
                }
            }
            (MatrixData::Dense(values), true) => {
                let row = &values[col * block.num_cols..(col + 1) * block.num_cols];
                for (r, v) in row.iter().enumerate() {
                    if !is_zero(*v) {
                        f(r, *v);
                    }
                }
            }
            (MatrixData::Sparse(sparse), false) => {
                for r in 0..block.num_rows {
                    let v = sparse.get(r, col);
                    if !is_zero(v) {
                        f(r, v);
                    }
                }
            }
            (MatrixData::Sparse(sparse), true) => {
                let (rows, values) = sparse.row(col);
                for (r, v) in rows.iter().zip(values) {
                    if !is_zero(*v) {
                        f(*r as usize, *v);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_checks_storage_against_shape() {
        sample().validate().unwrap();
        sample().to_sparse().validate().unwrap();

        let short = MatrixBlock {
            num_rows: 3,
            num_cols: 3,
            data: MatrixData::Dense(vec![1.0; 8]),
        };
        assert!(short.validate().is_err());

        let mut sparse = sample().to_sparse();
        sparse.num_rows = 4;
        assert!(sparse.validate().is_err());

        let mut wide = sample().to_sparse();
        wide.num_cols = 2;
        assert!(wide.validate().is_err());
    }

    fn sample() -> MatrixBlock {
        MatrixBlock::from_rows(vec![
            vec![1.0, 0.0, 3.0],
            vec![0.0, 0.0, 0.0],
            vec![-0.0, 5.0, 6.0],
        ])
        .unwrap()
    }

    #[test]
    fn test_shape_validation() {
        assert!(MatrixBlock::dense(2, 2, vec![1.0; 3]).is_err());
        assert!(MatrixBlock::from_rows(vec![vec![1.0], vec![1.0, 2.0]]).is_err());
        assert!(MatrixBlock::sparse_from_triplets(2, 2, vec![(2, 0, 1.0)]).is_err());
        assert!(MatrixBlock::sparse_from_triplets(2, 2, vec![(0, 0, 1.0), (0, 0, 2.0)]).is_err());
    }

    #[test]
    fn test_sparse_dense_agree() {
        let dense = sample();
        let sparse = dense.to_sparse();
        assert!(sparse.is_sparse());
        for r in 0..3 {
            for c in 0..3 {
                assert_eq!(
                    dense.get(r, c).unwrap().to_bits(),
                    sparse.get(r, c).unwrap().to_bits()
                );
            }
        }
        // -0.0 is stored explicitly
        assert_eq!(sparse.non_zeros(), 5);
        assert_eq!(sparse.to_dense(), dense);
    }

    #[test]
    fn test_transpose() {
        for block in [sample(), sample().to_sparse()] {
            for parallel in [false, true] {
                let t = block.transpose(parallel);
                assert_eq!(t.num_rows(), 3);
                for r in 0..3 {
                    for c in 0..3 {
                        assert_eq!(
                            block.get(r, c).unwrap().to_bits(),
                            t.get(c, r).unwrap().to_bits()
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_column_source_transposed() {
        let block = sample();
        let t = block.transpose(false);
        let source = ColumnSource::new(&t, true);
        assert_eq!(source.num_rows(), 3);
        assert_eq!(source.get(2, 1), Some(5.0));
        assert!(!source.is_column_empty(0));
        assert!(block.is_row_empty(1));

        let half_empty = MatrixBlock::from_rows(vec![vec![0.0, 1.0], vec![0.0, 2.0]]).unwrap();
        assert!(ColumnSource::new(&half_empty, false).is_column_empty(0));
        assert!(!ColumnSource::new(&half_empty, false).is_column_empty(1));
    }

    #[test]
    fn test_select_columns() {
        let block = sample();
        let t = block.transpose(false);
        let direct = block.select_columns(&[0, 2], false).unwrap();
        let via_t = t.select_columns(&[0, 2], true).unwrap();
        assert_eq!(direct.num_cols(), 2);
        for r in 0..3 {
            assert_eq!(direct.get(r, 1), block.get(r, 2));
            assert_eq!(
                via_t.get(r, 0).unwrap().to_bits(),
                block.get(r, 0).unwrap().to_bits()
            );
        }
        assert!(block.select_columns(&[7], false).is_err());
    }
}
