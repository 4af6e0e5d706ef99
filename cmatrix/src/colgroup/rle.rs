/*
 * Copyright (c) 2025-present Dawid Pawlik
 *
 * For educational use only by employees and students of MIMUW.
 * See LICENSE file for details.
 */

//! Run-length encoding.
//!
//! Each tuple's rows are written as `(gap, length)` pairs of 16-bit words,
//! where `gap` counts the rows since the end of the previous run. Gaps and
//! lengths beyond `u16::MAX` are split: a `(MAX, 0)` pair skips rows and a
//! `(0, n)` pair extends the previous run.

use super::base_size;
use super::write_tuple;
use crate::bitmap::Bitmap;
use crate::dictionary::Dictionary;
use crate::error::CompressionError;
use crate::error::Result;
use serde::Deserialize;
use serde::Serialize;

const MAX_WORD: u32 = u16::MAX as u32;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RleGroup {
    pub(crate) columns: Vec<usize>,
    pub(crate) num_rows: usize,
    pub(crate) dictionary: Dictionary,
    pub(crate) ptr: Vec<u32>,
    /// Interleaved `(gap, length)` pairs
    pub(crate) data: Vec<u16>,
}

fn emit_pairs(list: &[u32], mut emit: impl FnMut(u16, u16)) {
    let mut prev_end = 0u32;
    let mut i = 0;
    while i < list.len() {
        let start = list[i];
        let mut len = 1u32;
        while i + (len as usize) < list.len() && list[i + len as usize] == start + len {
            len += 1;
        }
        i += len as usize;

        let mut gap = start - prev_end;
        while gap > MAX_WORD {
            emit(u16::MAX, 0);
            gap -= MAX_WORD;
        }
        let mut rest = len;
        let first = rest.min(MAX_WORD);
        emit(gap as u16, first as u16);
        rest -= first;
        while rest > 0 {
            let chunk = rest.min(MAX_WORD);
            emit(0, chunk as u16);
            rest -= chunk;
        }
        prev_end = start + len;
    }
}

/// Number of `(gap, length)` pairs the runs of `list` take
pub(crate) fn rle_pair_count(list: &[u32]) -> usize {
    let mut count = 0;
    emit_pairs(list, |_, _| count += 1);
    count
}

impl RleGroup {
    pub(crate) fn create(columns: Vec<usize>, num_rows: usize, bitmap: &Bitmap) -> Result<Self> {
        let lists = bitmap.offset_lists().unwrap_or_default();
        let mut ptr = Vec::with_capacity(lists.len() + 1);
        let mut data = Vec::new();
        for list in lists {
            ptr.push(data.len() as u32);
            emit_pairs(list, |gap, len| {
                data.push(gap);
                data.push(len);
            });
        }
        if data.len() > u32::MAX as usize {
            return Err(CompressionError::Invariant(format!(
                "RLE stream of {} words exceeds the pointer range",
                data.len()
            )));
        }
        ptr.push(data.len() as u32);

        Ok(RleGroup {
            columns,
            num_rows,
            dictionary: Dictionary::from_bitmap(bitmap),
            ptr,
            data,
        })
    }

    pub fn estimate_size(num_columns: usize, num_values: usize, num_pairs: usize) -> usize {
        base_size(num_columns)
            + Dictionary::estimate_in_memory_size(num_values, num_columns)
            + (num_values + 1) * 4
            + num_pairs * 4
    }

    /// `(first_row, length)` of each run of a tuple
    fn runs(&self, tuple: usize) -> impl Iterator<Item = (usize, usize)> + '_ {
        let pairs = &self.data[self.ptr[tuple] as usize..self.ptr[tuple + 1] as usize];
        let mut pos = 0usize;
        pairs.chunks_exact(2).map(move |pair| {
            let start = pos + pair[0] as usize;
            let len = pair[1] as usize;
            pos = start + len;
            (start, len)
        })
    }

    pub(crate) fn value_at(&self, row: usize, pos: usize) -> f64 {
        for tuple in 0..self.dictionary.num_tuples() {
            for (start, len) in self.runs(tuple) {
                if start > row {
                    break;
                }
                if row < start + len {
                    return self.dictionary.value(tuple, pos);
                }
            }
        }
        0.0
    }

    pub(crate) fn decompress_into(&self, dense: &mut [f64], num_cols: usize) {
        for tuple in 0..self.dictionary.num_tuples() {
            let values = self.dictionary.tuple(tuple);
            for (start, len) in self.runs(tuple) {
                for row in start..start + len {
                    write_tuple(dense, num_cols, row, &self.columns, values);
                }
            }
        }
    }

    pub(crate) fn in_memory_size(&self) -> usize {
        base_size(self.columns.len())
            + self.dictionary.in_memory_size()
            + self.ptr.len() * 4
            + self.data.len() * 2
    }

    pub(crate) fn validate(&self) -> Result<()> {
        let tuples = self.dictionary.num_tuples();
        if self.ptr.len() != tuples + 1
            || self.ptr.windows(2).any(|w| w[0] > w[1] || (w[1] - w[0]) % 2 != 0)
            || self.ptr.last().is_some_and(|&end| end as usize != self.data.len())
        {
            return Err(CompressionError::Invariant(
                "RLE run pointers are inconsistent".to_string(),
            ));
        }
        for tuple in 0..tuples {
            if let Some((start, len)) = self.runs(tuple).last() {
                if start + len > self.num_rows {
                    return Err(CompressionError::Invariant(format!(
                        "RLE run of tuple {} ends past {} rows",
                        tuple, self.num_rows
                    )));
                }
            }
        }
        Ok(())
    }
}
