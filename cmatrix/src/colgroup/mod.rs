/*
 * Copyright (c) 2025-present Dawid Pawlik
 *
 * For educational use only by employees and students of MIMUW.
 * See LICENSE file for details.
 */

//! # Column groups
//!
//! A [`ColGroup`] stores a sorted, duplicate-free set of columns under one
//! encoding. Groups are created once by the [`factory`] and never mutated
//! afterwards. Every variant resolves a cell through its own dictionary and
//! index structures only.
//!
//! | variant            | stored                                               |
//! |--------------------|------------------------------------------------------|
//! | `Empty`            | nothing                                              |
//! | `Const`            | one tuple                                            |
//! | `Ddc`              | dictionary + one mapping entry per row               |
//! | `Ole`              | dictionary + per-value blocked offset lists          |
//! | `Rle`              | dictionary + per-value runs                          |
//! | `Sdc`              | dictionary + explicit rows/mapping, default tuple    |
//! | `SdcZeros`         | dictionary + explicit rows/mapping, default zero     |
//! | `SdcSingle`        | two tuples + explicit rows of the rarer one          |
//! | `SdcSingleZeros`   | one tuple + its rows                                 |
//! | `Uncompressed`     | raw column slice                                     |

mod ddc;
pub mod factory;
mod ole;
mod rle;
mod sdc;
mod simple;
mod uncompressed;

pub use ddc::DdcGroup;
pub use ole::OleGroup;
pub use rle::RleGroup;
pub use sdc::SdcGroup;
pub use sdc::SdcSingleGroup;
pub use sdc::SdcSingleZerosGroup;
pub use sdc::SdcVariant;
pub use sdc::SdcZerosGroup;
pub use simple::ConstGroup;
pub use simple::EmptyGroup;
pub use uncompressed::UncompressedGroup;

pub(crate) use ole::ole_stream_len;
pub(crate) use rle::rle_pair_count;
pub(crate) use sdc::explicit_rows;

use crate::CompressionType;
use crate::dictionary::Dictionary;
use crate::error::CompressionError;
use crate::error::Result;
use crate::mapping::MapToData;
use serde::Deserialize;
use serde::Serialize;

/// Bookkeeping cost of a group object itself
pub const GROUP_HEADER_SIZE: usize = 16;

/// Size of a group object holding `num_columns` column indexes, before payload
pub fn base_size(num_columns: usize) -> usize {
    GROUP_HEADER_SIZE + num_columns * 4
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColGroup {
    Empty(EmptyGroup),
    Const(ConstGroup),
    Ddc(DdcGroup),
    Ole(OleGroup),
    Rle(RleGroup),
    Sdc(SdcGroup),
    SdcZeros(SdcZerosGroup),
    SdcSingle(SdcSingleGroup),
    SdcSingleZeros(SdcSingleZerosGroup),
    Uncompressed(UncompressedGroup),
}

macro_rules! dispatch {
    ($group:expr, $g:ident => $body:expr) => {
        match $group {
            ColGroup::Empty($g) => $body,
            ColGroup::Const($g) => $body,
            ColGroup::Ddc($g) => $body,
            ColGroup::Ole($g) => $body,
            ColGroup::Rle($g) => $body,
            ColGroup::Sdc($g) => $body,
            ColGroup::SdcZeros($g) => $body,
            ColGroup::SdcSingle($g) => $body,
            ColGroup::SdcSingleZeros($g) => $body,
            ColGroup::Uncompressed($g) => $body,
        }
    };
}

impl ColGroup {
    /// Sorted column indexes covered by the group
    pub fn col_indices(&self) -> &[usize] {
        dispatch!(self, g => &g.columns)
    }

    pub fn num_rows(&self) -> usize {
        dispatch!(self, g => g.num_rows)
    }

    pub fn compression_type(&self) -> CompressionType {
        match self {
            ColGroup::Empty(_) => CompressionType::Empty,
            ColGroup::Const(_) => CompressionType::Const,
            ColGroup::Ddc(_) => CompressionType::Ddc,
            ColGroup::Ole(_) => CompressionType::Ole,
            ColGroup::Rle(_) => CompressionType::Rle,
            ColGroup::Sdc(_)
            | ColGroup::SdcZeros(_)
            | ColGroup::SdcSingle(_)
            | ColGroup::SdcSingleZeros(_) => CompressionType::Sdc,
            ColGroup::Uncompressed(_) => CompressionType::Uncompressed,
        }
    }

    /// Short name of the concrete variant, for display
    pub fn variant_name(&self) -> &'static str {
        match self {
            ColGroup::Empty(_) => "EMPTY",
            ColGroup::Const(_) => "CONST",
            ColGroup::Ddc(_) => "DDC",
            ColGroup::Ole(_) => "OLE",
            ColGroup::Rle(_) => "RLE",
            ColGroup::Sdc(_) => "SDC",
            ColGroup::SdcZeros(_) => "SDC_ZEROS",
            ColGroup::SdcSingle(_) => "SDC_SINGLE",
            ColGroup::SdcSingleZeros(_) => "SDC_SINGLE_ZEROS",
            ColGroup::Uncompressed(_) => "UNCOMPRESSED",
        }
    }

    /// Read one cell; `None` when `col` is not in the group or `row` is out of
    /// range
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.num_rows() {
            return None;
        }
        let pos = self.col_indices().binary_search(&col).ok()?;
        Some(dispatch!(self, g => g.value_at(row, pos)))
    }

    /// Write the group's cells into a row-major `num_rows x num_cols` buffer.
    /// Cells holding zero are left untouched.
    pub fn decompress_into(&self, dense: &mut [f64], num_cols: usize) {
        debug_assert!(dense.len() >= self.num_rows() * num_cols);
        dispatch!(self, g => g.decompress_into(dense, num_cols))
    }

    /// Number of distinct tuples; for uncompressed groups the stored non-zeros
    pub fn num_values(&self) -> usize {
        match self {
            ColGroup::Empty(_) => 0,
            ColGroup::Uncompressed(g) => g.data().non_zeros(),
            other => other.dictionary().map_or(0, |d| d.num_tuples()),
        }
    }

    pub fn dictionary(&self) -> Option<&Dictionary> {
        match self {
            ColGroup::Empty(_) | ColGroup::Uncompressed(_) => None,
            ColGroup::Const(g) => Some(&g.dictionary),
            ColGroup::Ddc(g) => Some(&g.dictionary),
            ColGroup::Ole(g) => Some(&g.dictionary),
            ColGroup::Rle(g) => Some(&g.dictionary),
            ColGroup::Sdc(g) => Some(&g.dictionary),
            ColGroup::SdcZeros(g) => Some(&g.dictionary),
            ColGroup::SdcSingle(g) => Some(&g.dictionary),
            ColGroup::SdcSingleZeros(g) => Some(&g.dictionary),
        }
    }

    /// Per-entry dictionary indexes, for the variants that keep them
    pub fn mapping(&self) -> Option<&MapToData> {
        match self {
            ColGroup::Ddc(g) => Some(&g.mapping),
            ColGroup::Sdc(g) => Some(&g.data),
            ColGroup::SdcZeros(g) => Some(&g.data),
            _ => None,
        }
    }

    /// Rows stored explicitly by the SDC variants
    pub fn explicit_rows(&self) -> Option<Vec<u32>> {
        match self {
            ColGroup::Sdc(g) => Some(g.indexes.iter().collect()),
            ColGroup::SdcZeros(g) => Some(g.indexes.iter().collect()),
            ColGroup::SdcSingle(g) => Some(g.indexes.iter().collect()),
            ColGroup::SdcSingleZeros(g) => Some(g.indexes.iter().collect()),
            _ => None,
        }
    }

    pub fn estimate_in_memory_size(&self) -> usize {
        dispatch!(self, g => g.in_memory_size())
    }

    /// Check the structural invariants of a group, e.g. after loading it from
    /// disk
    pub fn validate(&self) -> Result<()> {
        let columns = self.col_indices();
        if columns.is_empty() {
            return Err(CompressionError::Invariant(
                "column group covers no columns".to_string(),
            ));
        }
        if columns.windows(2).any(|w| w[0] >= w[1]) {
            return Err(CompressionError::Invariant(format!(
                "column indexes {:?} are not sorted and unique",
                columns
            )));
        }
        if let Some(dict) = self.dictionary() {
            dict.validate()?;
            if dict.num_columns() != columns.len() {
                return Err(CompressionError::Invariant(format!(
                    "dictionary width {} does not match {} columns",
                    dict.num_columns(),
                    columns.len()
                )));
            }
        }
        if let Some(mapping) = self.mapping() {
            mapping.validate()?;
        }
        dispatch!(self, g => g.validate())?;

        // Lengths are consistent now, so the mapping can be read
        if let (Some(dict), Some(mapping)) = (self.dictionary(), self.mapping()) {
            if let Some(max) = mapping.max_index() {
                if max >= dict.num_tuples() {
                    return Err(CompressionError::Invariant(format!(
                        "mapping index {} out of range for {} tuples",
                        max,
                        dict.num_tuples()
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Write `tuple` into row `row` of a row-major buffer at the group's columns
#[inline]
pub(crate) fn write_tuple(dense: &mut [f64], num_cols: usize, row: usize, columns: &[usize], tuple: &[f64]) {
    let base = row * num_cols;
    for (&c, &v) in columns.iter().zip(tuple) {
        dense[base + c] = v;
    }
}

pub(crate) fn check_rows(rows: impl Iterator<Item = u32>, num_rows: usize) -> Result<usize> {
    let mut count = 0;
    let mut prev: Option<u32> = None;
    for row in rows {
        if row as usize >= num_rows || prev.is_some_and(|p| p >= row) {
            return Err(CompressionError::Invariant(format!(
                "explicit row {} out of order or outside {} rows",
                row, num_rows
            )));
        }
        prev = Some(row);
        count += 1;
    }
    Ok(count)
}
