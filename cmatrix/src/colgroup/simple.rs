/*
 * Copyright (c) 2025-present Dawid Pawlik
 *
 * For educational use only by employees and students of MIMUW.
 * See LICENSE file for details.
 */

//! Groups with no per-row state: all-zero and constant columns

use super::base_size;
use super::write_tuple;
use crate::dictionary::Dictionary;
use crate::error::CompressionError;
use crate::error::Result;
use serde::Deserialize;
use serde::Serialize;

/// Columns holding only zeros
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmptyGroup {
    pub(crate) columns: Vec<usize>,
    pub(crate) num_rows: usize,
}

impl EmptyGroup {
    pub fn new(columns: Vec<usize>, num_rows: usize) -> Self {
        EmptyGroup { columns, num_rows }
    }

    pub fn estimate_size(num_columns: usize) -> usize {
        base_size(num_columns)
    }

    pub(crate) fn value_at(&self, _row: usize, _pos: usize) -> f64 {
        0.0
    }

    pub(crate) fn decompress_into(&self, _dense: &mut [f64], _num_cols: usize) {}

    pub(crate) fn in_memory_size(&self) -> usize {
        Self::estimate_size(self.columns.len())
    }

    pub(crate) fn validate(&self) -> Result<()> {
        Ok(())
    }
}

/// Columns where every row holds the same tuple
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstGroup {
    pub(crate) columns: Vec<usize>,
    pub(crate) num_rows: usize,
    pub(crate) dictionary: Dictionary,
}

impl ConstGroup {
    pub fn new(columns: Vec<usize>, num_rows: usize, dictionary: Dictionary) -> Result<Self> {
        if dictionary.num_tuples() != 1 {
            return Err(CompressionError::Invariant(format!(
                "constant group needs one tuple, got {}",
                dictionary.num_tuples()
            )));
        }
        Ok(ConstGroup {
            columns,
            num_rows,
            dictionary,
        })
    }

    pub fn estimate_size(num_columns: usize) -> usize {
        base_size(num_columns) + Dictionary::estimate_in_memory_size(1, num_columns)
    }

    pub fn tuple(&self) -> &[f64] {
        self.dictionary.tuple(0)
    }

    pub(crate) fn value_at(&self, _row: usize, pos: usize) -> f64 {
        self.dictionary.value(0, pos)
    }

    pub(crate) fn decompress_into(&self, dense: &mut [f64], num_cols: usize) {
        let tuple = self.tuple();
        for row in 0..self.num_rows {
            write_tuple(dense, num_cols, row, &self.columns, tuple);
        }
    }

    pub(crate) fn in_memory_size(&self) -> usize {
        Self::estimate_size(self.columns.len())
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.dictionary.num_tuples() != 1 {
            return Err(CompressionError::Invariant(format!(
                "constant group holds {} tuples",
                self.dictionary.num_tuples()
            )));
        }
        Ok(())
    }
}
