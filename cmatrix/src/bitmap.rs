/*
 * Copyright (c) 2025-present Dawid Pawlik
 *
 * For educational use only by employees and students of MIMUW.
 * See LICENSE file for details.
 */

//! # Bitmap extraction
//!
//! A [`Bitmap`] maps every distinct non-zero value tuple of a column set to the
//! sorted list of rows it occurs in. Rows holding the all-zero tuple are left
//! implicit: their count is `num_rows - num_offsets()`.
//!
//! Tuples are numbered in order of first appearance while rows are scanned in
//! increasing order, so the layout is deterministic for a given input.
//! Values are compared by bit pattern, which keeps `-0.0` and NaN payloads
//! distinct and reconstruction exact.

use crate::error::CompressionError;
use crate::error::Result;
use crate::matrix::ColumnSource;
use crate::readers::reader_for;
use std::collections::HashMap;

/// Sorted row indexes at which one tuple occurs
pub type OffsetList = Vec<u32>;

/// Distinct value tuples of a column set and the rows they occur in
#[derive(Debug, Clone, PartialEq)]
pub struct Bitmap {
    num_columns: usize,
    /// Tuples flattened row-major: `tuple * num_columns + column`
    values: Vec<f64>,
    /// `None` when no row holds a non-zero tuple
    offsets: Option<Vec<OffsetList>>,
}

impl Bitmap {
    /// Assemble a bitmap from parts. An empty offset array is normalised to
    /// `None`; consistency is checked separately by [`Bitmap::validate`].
    pub fn new(num_columns: usize, values: Vec<f64>, offsets: Vec<OffsetList>) -> Self {
        Bitmap {
            num_columns,
            values,
            offsets: if offsets.is_empty() {
                None
            } else {
                Some(offsets)
            },
        }
    }

    pub fn empty(num_columns: usize) -> Self {
        Bitmap {
            num_columns,
            values: Vec::new(),
            offsets: None,
        }
    }

    pub fn num_columns(&self) -> usize {
        self.num_columns
    }

    /// Number of distinct non-zero tuples
    pub fn num_values(&self) -> usize {
        self.offsets.as_ref().map_or(0, |o| o.len())
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn tuple(&self, index: usize) -> &[f64] {
        &self.values[index * self.num_columns..(index + 1) * self.num_columns]
    }

    pub fn offset_lists(&self) -> Option<&[OffsetList]> {
        self.offsets.as_deref()
    }

    pub fn offsets(&self, index: usize) -> &[u32] {
        self.offsets.as_ref().map_or(&[][..], |o| o[index].as_slice())
    }

    /// Total number of rows holding a non-zero tuple
    pub fn num_offsets(&self) -> usize {
        self.offsets
            .as_ref()
            .map_or(0, |o| o.iter().map(|l| l.len()).sum())
    }

    /// Rows holding the implicit all-zero tuple
    pub fn num_zeros(&self, num_rows: usize) -> usize {
        num_rows.saturating_sub(self.num_offsets())
    }

    /// Index and size of the first longest offset list
    pub fn largest(&self) -> Option<(usize, usize)> {
        let mut best: Option<(usize, usize)> = None;
        for (i, list) in self.offsets.as_ref()?.iter().enumerate() {
            if best.is_none_or(|(_, size)| list.len() > size) {
                best = Some((i, list.len()));
            }
        }
        best
    }

    /// Reorder tuples by descending frequency. The sort is stable, so ties keep
    /// their first-appearance order.
    pub fn sort_values_by_frequency(&mut self) {
        let Some(offsets) = self.offsets.take() else {
            return;
        };
        let mut order: Vec<usize> = (0..offsets.len()).collect();
        order.sort_by(|a, b| offsets[*b].len().cmp(&offsets[*a].len()));

        let mut values = Vec::with_capacity(self.values.len());
        for &i in &order {
            values.extend_from_slice(self.tuple(i));
        }
        let mut slots: Vec<Option<OffsetList>> = offsets.into_iter().map(Some).collect();
        let sorted = order
            .iter()
            .map(|&i| slots[i].take().unwrap_or_default())
            .collect();

        self.values = values;
        self.offsets = Some(sorted);
    }

    /// Check the structural invariants against the row count of the group:
    /// one tuple per list, non-empty strictly increasing lists, rows in range,
    /// and no row claimed by two tuples.
    pub fn validate(&self, columns: &[usize], num_rows: usize) -> Result<()> {
        let fail = |reason: String| CompressionError::InvalidBitmap {
            columns: columns.to_vec(),
            reason,
        };

        if self.num_columns != columns.len() {
            return Err(fail(format!(
                "bitmap covers {} columns, group has {}",
                self.num_columns,
                columns.len()
            )));
        }
        let Some(offsets) = &self.offsets else {
            return Ok(());
        };
        if self.values.len() != offsets.len() * self.num_columns {
            return Err(fail(format!(
                "{} values do not form {} tuples of width {}",
                self.values.len(),
                offsets.len(),
                self.num_columns
            )));
        }
        if self.num_offsets() > num_rows {
            return Err(fail(format!(
                "{} offsets exceed {} rows",
                self.num_offsets(),
                num_rows
            )));
        }

        let mut seen = vec![0u64; num_rows.div_ceil(64)];
        for (i, list) in offsets.iter().enumerate() {
            if list.is_empty() {
                return Err(fail(format!("offset list {} is empty", i)));
            }
            let mut prev: Option<u32> = None;
            for &row in list {
                if row as usize >= num_rows {
                    return Err(fail(format!("row {} out of range in list {}", row, i)));
                }
                if prev.is_some_and(|p| p >= row) {
                    return Err(fail(format!("offset list {} is not strictly increasing", i)));
                }
                prev = Some(row);
                let (word, bit) = (row as usize / 64, row % 64);
                if seen[word] & (1u64 << bit) != 0 {
                    return Err(fail(format!("row {} appears in more than one list", row)));
                }
                seen[word] |= 1u64 << bit;
            }
        }
        Ok(())
    }
}

/// Extract the bitmap of a sorted, duplicate-free column set
pub fn extract_bitmap(columns: &[usize], source: ColumnSource<'_>) -> Result<Bitmap> {
    if columns.windows(2).any(|w| w[0] >= w[1]) {
        return Err(CompressionError::InvalidPlan(format!(
            "column indexes {:?} are not sorted and unique",
            columns
        )));
    }
    if let Some(&c) = columns.iter().find(|&&c| c >= source.num_cols()) {
        return Err(CompressionError::InvalidPlan(format!(
            "column {} out of range for {} columns",
            c,
            source.num_cols()
        )));
    }
    if source.num_rows() > u32::MAX as usize {
        return Err(CompressionError::InvalidMatrix(format!(
            "{} rows exceed the row index range",
            source.num_rows()
        )));
    }

    if columns.len() == 1 {
        Ok(extract_single_column(columns[0], source))
    } else {
        Ok(extract_multi_column(columns, source))
    }
}

fn extract_single_column(column: usize, source: ColumnSource<'_>) -> Bitmap {
    let mut index: HashMap<u64, usize> = HashMap::new();
    let mut values = Vec::new();
    let mut offsets: Vec<OffsetList> = Vec::new();

    source.for_each_in_column(column, |row, value| {
        let slot = *index.entry(value.to_bits()).or_insert_with(|| {
            values.push(value);
            offsets.push(Vec::new());
            offsets.len() - 1
        });
        offsets[slot].push(row as u32);
    });

    Bitmap::new(1, values, offsets)
}

fn extract_multi_column(columns: &[usize], source: ColumnSource<'_>) -> Bitmap {
    let mut index: HashMap<Box<[u64]>, usize> = HashMap::new();
    let mut values = Vec::new();
    let mut offsets: Vec<OffsetList> = Vec::new();
    let mut key: Vec<u64> = vec![0; columns.len()];

    let mut reader = reader_for(source, columns);
    while let Some((row, tuple)) = reader.next_row() {
        for (k, v) in key.iter_mut().zip(tuple) {
            *k = v.to_bits();
        }
        let slot = match index.get(key.as_slice()) {
            Some(&slot) => slot,
            None => {
                values.extend_from_slice(tuple);
                offsets.push(Vec::new());
                index.insert(key.clone().into_boxed_slice(), offsets.len() - 1);
                offsets.len() - 1
            }
        };
        offsets[slot].push(row as u32);
    }

    Bitmap::new(columns.len(), values, offsets)
}
