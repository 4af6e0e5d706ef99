/*
 * Copyright (c) 2025-present Dawid Pawlik
 *
 * For educational use only by employees and students of MIMUW.
 * See LICENSE file for details.
 */

//! # Sparse dictionary coding
//!
//! SDC groups store only the rows that do not hold a default tuple. Which
//! tuple is the default, and whether a mapping is needed at all, depends on
//! the shape of the bitmap:
//!
//! | variant         | condition                          | default     |
//! |-----------------|------------------------------------|-------------|
//! | `SingleZeros`   | one value, zeros >= its rows       | zero        |
//! | `Single`        | one value, otherwise               | the value   |
//! | `Zeros`         | several values, zeros >= largest   | zero        |
//! | `General`       | several values, otherwise          | the largest |

use super::ColGroup;
use super::base_size;
use super::check_rows;
use super::write_tuple;
use crate::bitmap::Bitmap;
use crate::dictionary::Dictionary;
use crate::error::CompressionError;
use crate::error::Result;
use crate::mapping::MapToData;
use crate::offsets::OffsetIndex;
use crate::sorter::InsertionSorter;
use serde::Deserialize;
use serde::Serialize;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdcVariant {
    SingleZeros,
    Single,
    Zeros,
    General,
}

impl SdcVariant {
    pub fn choose(num_values: usize, num_zeros: usize, largest_size: usize) -> Self {
        match (num_values == 1, num_zeros >= largest_size) {
            (true, true) => SdcVariant::SingleZeros,
            (true, false) => SdcVariant::Single,
            (false, true) => SdcVariant::Zeros,
            (false, false) => SdcVariant::General,
        }
    }

    pub fn for_bitmap(bitmap: &Bitmap, num_rows: usize) -> Option<(Self, usize)> {
        let (largest, largest_size) = bitmap.largest()?;
        let variant = Self::choose(bitmap.num_values(), bitmap.num_zeros(num_rows), largest_size);
        Some((variant, largest))
    }

    /// Size of the finished group, given the exact size of its row index
    pub fn estimate_size(
        self,
        num_rows: usize,
        num_columns: usize,
        num_values: usize,
        num_zeros: usize,
        largest_size: usize,
        index_size: usize,
    ) -> usize {
        let base = base_size(num_columns) + index_size;
        let has_zeros = usize::from(num_zeros > 0);
        match self {
            SdcVariant::SingleZeros => base + Dictionary::estimate_in_memory_size(1, num_columns),
            SdcVariant::Single => {
                base + Dictionary::estimate_in_memory_size(1 + has_zeros, num_columns)
            }
            SdcVariant::Zeros => {
                base + Dictionary::estimate_in_memory_size(num_values, num_columns)
                    + MapToData::estimate_in_memory_size(num_rows - num_zeros, num_values)
            }
            SdcVariant::General => {
                base + Dictionary::estimate_in_memory_size(num_values + has_zeros, num_columns)
                    + MapToData::estimate_in_memory_size(num_rows - largest_size, num_values)
            }
        }
    }
}

/// Rows a variant stores explicitly, in increasing order
pub(crate) fn explicit_rows(bitmap: &Bitmap, num_rows: usize, variant: SdcVariant, largest: usize) -> Vec<u32> {
    let lists = bitmap.offset_lists().unwrap_or_default();
    let complement = |skip: &[u32]| {
        let mut rows = Vec::with_capacity(num_rows - skip.len());
        let mut next = skip.iter().peekable();
        for row in 0..num_rows as u32 {
            if next.peek() == Some(&&row) {
                next.next();
            } else {
                rows.push(row);
            }
        }
        rows
    };
    match variant {
        SdcVariant::SingleZeros => bitmap.offsets(0).to_vec(),
        SdcVariant::Single => complement(bitmap.offsets(0)),
        SdcVariant::General => complement(bitmap.offsets(largest)),
        SdcVariant::Zeros => {
            let mut present = vec![false; num_rows];
            for &row in lists.iter().flatten() {
                present[row as usize] = true;
            }
            (0..num_rows as u32).filter(|&r| present[r as usize]).collect()
        }
    }
}

pub(crate) fn create(columns: Vec<usize>, num_rows: usize, bitmap: &Bitmap) -> Result<ColGroup> {
    let (variant, largest) = SdcVariant::for_bitmap(bitmap, num_rows).ok_or_else(|| {
        CompressionError::Invariant("SDC needs at least one non-zero tuple".to_string())
    })?;
    trace!(?columns, ?variant, largest, "building SDC group");
    let lists = bitmap.offset_lists().unwrap_or_default();

    let group = match variant {
        SdcVariant::SingleZeros => ColGroup::SdcSingleZeros(SdcSingleZerosGroup {
            columns,
            num_rows,
            dictionary: Dictionary::from_bitmap(bitmap),
            indexes: OffsetIndex::from_sorted(bitmap.offsets(0)),
        }),
        SdcVariant::Single => {
            let moved = Dictionary::from_bitmap(bitmap).move_frequent_to_last(bitmap, num_rows, largest)?;
            let rows = explicit_rows(bitmap, num_rows, variant, largest);
            ColGroup::SdcSingle(SdcSingleGroup {
                columns,
                num_rows,
                dictionary: moved.dictionary,
                indexes: OffsetIndex::from_sorted(&rows),
            })
        }
        SdcVariant::Zeros => {
            let sorted = InsertionSorter::for_input(bitmap.num_offsets(), num_rows).insert(lists)?;
            ColGroup::SdcZeros(SdcZerosGroup {
                columns,
                num_rows,
                dictionary: Dictionary::from_bitmap(bitmap),
                indexes: OffsetIndex::from_sorted(&sorted.indexes),
                data: sorted.data,
            })
        }
        SdcVariant::General => {
            let moved = Dictionary::from_bitmap(bitmap).move_frequent_to_last(bitmap, num_rows, largest)?;
            let explicit = num_rows - lists[largest].len();
            let sorted = InsertionSorter::for_input(explicit, num_rows).insert_excluding(lists, largest)?;
            ColGroup::Sdc(SdcGroup {
                columns,
                num_rows,
                dictionary: moved.dictionary,
                indexes: OffsetIndex::from_sorted(&sorted.indexes),
                data: sorted.data,
            })
        }
    };
    Ok(group)
}

fn validate_indexes(indexes: &OffsetIndex, num_rows: usize, data: Option<&MapToData>) -> Result<()> {
    indexes.validate()?;
    let count = check_rows(indexes.iter(), num_rows)?;
    if count != indexes.len() {
        return Err(CompressionError::Invariant(format!(
            "SDC index decodes {} rows, expected {}",
            count,
            indexes.len()
        )));
    }
    if let Some(data) = data {
        if data.len() != count {
            return Err(CompressionError::Invariant(format!(
                "SDC mapping holds {} entries for {} rows",
                data.len(),
                count
            )));
        }
    }
    Ok(())
}

/// Several tuples; unlisted rows hold the last tuple
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SdcGroup {
    pub(crate) columns: Vec<usize>,
    pub(crate) num_rows: usize,
    pub(crate) dictionary: Dictionary,
    pub(crate) indexes: OffsetIndex,
    pub(crate) data: MapToData,
}

impl SdcGroup {
    fn default_tuple(&self) -> usize {
        self.dictionary.num_tuples() - 1
    }

    pub(crate) fn value_at(&self, row: usize, pos: usize) -> f64 {
        let tuple = match self.indexes.ordinal_of(row as u32) {
            Some(ordinal) => self.data.get(ordinal),
            None => self.default_tuple(),
        };
        self.dictionary.value(tuple, pos)
    }

    pub(crate) fn decompress_into(&self, dense: &mut [f64], num_cols: usize) {
        let default = self.dictionary.tuple(self.default_tuple());
        for row in 0..self.num_rows {
            write_tuple(dense, num_cols, row, &self.columns, default);
        }
        for (ordinal, row) in self.indexes.iter().enumerate() {
            let tuple = self.dictionary.tuple(self.data.get(ordinal));
            write_tuple(dense, num_cols, row as usize, &self.columns, tuple);
        }
    }

    pub(crate) fn in_memory_size(&self) -> usize {
        base_size(self.columns.len())
            + self.dictionary.in_memory_size()
            + self.indexes.in_memory_size()
            + self.data.in_memory_size()
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.dictionary.num_tuples() == 0 {
            return Err(CompressionError::Invariant(
                "SDC group has no default tuple".to_string(),
            ));
        }
        validate_indexes(&self.indexes, self.num_rows, Some(&self.data))
    }
}

/// Several tuples; unlisted rows are zero
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SdcZerosGroup {
    pub(crate) columns: Vec<usize>,
    pub(crate) num_rows: usize,
    pub(crate) dictionary: Dictionary,
    pub(crate) indexes: OffsetIndex,
    pub(crate) data: MapToData,
}

impl SdcZerosGroup {
    pub(crate) fn value_at(&self, row: usize, pos: usize) -> f64 {
        match self.indexes.ordinal_of(row as u32) {
            Some(ordinal) => self.dictionary.value(self.data.get(ordinal), pos),
            None => 0.0,
        }
    }

    pub(crate) fn decompress_into(&self, dense: &mut [f64], num_cols: usize) {
        for (ordinal, row) in self.indexes.iter().enumerate() {
            let tuple = self.dictionary.tuple(self.data.get(ordinal));
            write_tuple(dense, num_cols, row as usize, &self.columns, tuple);
        }
    }

    pub(crate) fn in_memory_size(&self) -> usize {
        base_size(self.columns.len())
            + self.dictionary.in_memory_size()
            + self.indexes.in_memory_size()
            + self.data.in_memory_size()
    }

    pub(crate) fn validate(&self) -> Result<()> {
        validate_indexes(&self.indexes, self.num_rows, Some(&self.data))
    }
}

/// Listed rows hold tuple 0, all others the last tuple
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SdcSingleGroup {
    pub(crate) columns: Vec<usize>,
    pub(crate) num_rows: usize,
    pub(crate) dictionary: Dictionary,
    pub(crate) indexes: OffsetIndex,
}

impl SdcSingleGroup {
    pub(crate) fn value_at(&self, row: usize, pos: usize) -> f64 {
        let tuple = if self.indexes.ordinal_of(row as u32).is_some() {
            0
        } else {
            self.dictionary.num_tuples() - 1
        };
        self.dictionary.value(tuple, pos)
    }

    pub(crate) fn decompress_into(&self, dense: &mut [f64], num_cols: usize) {
        let default = self.dictionary.tuple(self.dictionary.num_tuples() - 1);
        for row in 0..self.num_rows {
            write_tuple(dense, num_cols, row, &self.columns, default);
        }
        let listed = self.dictionary.tuple(0);
        for row in self.indexes.iter() {
            write_tuple(dense, num_cols, row as usize, &self.columns, listed);
        }
    }

    pub(crate) fn in_memory_size(&self) -> usize {
        base_size(self.columns.len()) + self.dictionary.in_memory_size() + self.indexes.in_memory_size()
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.dictionary.num_tuples() == 0 || self.dictionary.num_tuples() > 2 {
            return Err(CompressionError::Invariant(format!(
                "single-value SDC group holds {} tuples",
                self.dictionary.num_tuples()
            )));
        }
        validate_indexes(&self.indexes, self.num_rows, None)
    }
}

/// Listed rows hold the only tuple, all others are zero
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SdcSingleZerosGroup {
    pub(crate) columns: Vec<usize>,
    pub(crate) num_rows: usize,
    pub(crate) dictionary: Dictionary,
    pub(crate) indexes: OffsetIndex,
}

impl SdcSingleZerosGroup {
    pub(crate) fn value_at(&self, row: usize, pos: usize) -> f64 {
        if self.indexes.ordinal_of(row as u32).is_some() {
            self.dictionary.value(0, pos)
        } else {
            0.0
        }
    }

    pub(crate) fn decompress_into(&self, dense: &mut [f64], num_cols: usize) {
        let tuple = self.dictionary.tuple(0);
        for row in self.indexes.iter() {
            write_tuple(dense, num_cols, row as usize, &self.columns, tuple);
        }
    }

    pub(crate) fn in_memory_size(&self) -> usize {
        base_size(self.columns.len()) + self.dictionary.in_memory_size() + self.indexes.in_memory_size()
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.dictionary.num_tuples() != 1 {
            return Err(CompressionError::Invariant(format!(
                "single-value SDC group holds {} tuples",
                self.dictionary.num_tuples()
            )));
        }
        validate_indexes(&self.indexes, self.num_rows, None)
    }
}
