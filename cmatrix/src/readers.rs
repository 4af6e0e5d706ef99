/*
 * Copyright (c) 2025-present Dawid Pawlik
 *
 * For educational use only by employees and students of MIMUW.
 * See LICENSE file for details.
 */

//! Row-wise readers over a selection of columns.
//!
//! Every reader yields the rows of the logical matrix in increasing order,
//! skipping rows whose tuple over the selected columns is all zero. The
//! selected column indexes must be sorted and unique.

use crate::is_zero;
use crate::matrix::ColumnSource;
use crate::matrix::MatrixData;
use crate::matrix::SparseRows;

/// Cursor over the non-zero row tuples of a column selection
pub trait ColumnSelectionReader {
    /// Advance to the next row with a non-zero tuple
    fn next_row(&mut self) -> Option<(usize, &[f64])>;
}

/// Pick the reader matching the storage layout of the source
pub fn reader_for<'a>(
    source: ColumnSource<'a>,
    columns: &'a [usize],
) -> Box<dyn ColumnSelectionReader + 'a> {
    let block = source.block;
    match (block.data(), source.transposed) {
        (MatrixData::Dense(values), false) => Box::new(DenseReader {
            values,
            num_cols: block.num_cols(),
            num_rows: block.num_rows(),
            columns,
            row: 0,
            tuple: vec![0.0; columns.len()],
        }),
        (MatrixData::Dense(values), true) => Box::new(TransposedDenseReader {
            values,
            stride: block.num_cols(),
            num_rows: block.num_cols(),
            columns,
            row: 0,
            tuple: vec![0.0; columns.len()],
        }),
        (MatrixData::Sparse(sparse), false) => Box::new(SparseReader {
            sparse,
            num_rows: block.num_rows(),
            columns,
            row: 0,
            tuple: vec![0.0; columns.len()],
        }),
        (MatrixData::Sparse(sparse), true) => Box::new(TransposedSparseReader {
            sparse,
            columns,
            cursors: vec![0; columns.len()],
            tuple: vec![0.0; columns.len()],
        }),
    }
}

fn all_zero(tuple: &[f64]) -> bool {
    tuple.iter().all(|v| is_zero(*v))
}

struct DenseReader<'a> {
    values: &'a [f64],
    num_cols: usize,
    num_rows: usize,
    columns: &'a [usize],
    row: usize,
    tuple: Vec<f64>,
}

impl ColumnSelectionReader for DenseReader<'_> {
    fn next_row(&mut self) -> Option<(usize, &[f64])> {
        while self.row < self.num_rows {
            let r = self.row;
            self.row += 1;
            let base = r * self.num_cols;
            for (slot, &c) in self.tuple.iter_mut().zip(self.columns) {
                *slot = self.values[base + c];
            }
            if !all_zero(&self.tuple) {
                return Some((r, &self.tuple));
            }
        }
        None
    }
}

struct TransposedDenseReader<'a> {
    values: &'a [f64],
    stride: usize,
    num_rows: usize,
    columns: &'a [usize],
    row: usize,
    tuple: Vec<f64>,
}

impl ColumnSelectionReader for TransposedDenseReader<'_> {
    fn next_row(&mut self) -> Option<(usize, &[f64])> {
        while self.row < self.num_rows {
            let r = self.row;
            self.row += 1;
            for (slot, &c) in self.tuple.iter_mut().zip(self.columns) {
                *slot = self.values[c * self.stride + r];
            }
            if !all_zero(&self.tuple) {
                return Some((r, &self.tuple));
            }
        }
        None
    }
}

struct SparseReader<'a> {
    sparse: &'a SparseRows,
    num_rows: usize,
    columns: &'a [usize],
    row: usize,
    tuple: Vec<f64>,
}

impl ColumnSelectionReader for SparseReader<'_> {
    fn next_row(&mut self) -> Option<(usize, &[f64])> {
        while self.row < self.num_rows {
            let r = self.row;
            self.row += 1;
            let (cols, values) = self.sparse.row(r);
            if cols.is_empty() {
                continue;
            }
            self.tuple.fill(0.0);
            let mut found = false;
            for (c, v) in cols.iter().zip(values) {
                if let Ok(pos) = self.columns.binary_search(&(*c as usize)) {
                    self.tuple[pos] = *v;
                    found |= !is_zero(*v);
                }
            }
            if found {
                return Some((r, &self.tuple));
            }
        }
        None
    }
}

/// Merges the selected rows of a transposed CSR block, one cursor per column
struct TransposedSparseReader<'a> {
    sparse: &'a SparseRows,
    columns: &'a [usize],
    cursors: Vec<usize>,
    tuple: Vec<f64>,
}

impl ColumnSelectionReader for TransposedSparseReader<'_> {
    fn next_row(&mut self) -> Option<(usize, &[f64])> {
        loop {
            let mut next: Option<u32> = None;
            for (j, &c) in self.columns.iter().enumerate() {
                let (rows, _) = self.sparse.row(c);
                if let Some(&r) = rows.get(self.cursors[j]) {
                    next = Some(next.map_or(r, |n| n.min(r)));
                }
            }
            let row = next?;

            self.tuple.fill(0.0);
            for (j, &c) in self.columns.iter().enumerate() {
                let (rows, values) = self.sparse.row(c);
                if rows.get(self.cursors[j]) == Some(&row) {
                    self.tuple[j] = values[self.cursors[j]];
                    self.cursors[j] += 1;
                }
            }
            if !all_zero(&self.tuple) {
                return Some((row as usize, &self.tuple));
            }
        }
    }
}
