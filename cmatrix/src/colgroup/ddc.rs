/*
 * Copyright (c) 2025-present Dawid Pawlik
 *
 * For educational use only by employees and students of MIMUW.
 * See LICENSE file for details.
 */

//! Dense dictionary coding: one mapping entry per row

use super::base_size;
use super::write_tuple;
use crate::bitmap::Bitmap;
use crate::dictionary::Dictionary;
use crate::error::CompressionError;
use crate::error::Result;
use crate::mapping::MapToData;
use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DdcGroup {
    pub(crate) columns: Vec<usize>,
    pub(crate) num_rows: usize,
    pub(crate) dictionary: Dictionary,
    pub(crate) mapping: MapToData,
}

impl DdcGroup {
    /// Build from a bitmap. Rows holding the implicit zero tuple map to an
    /// appended zero tuple at index `num_values`.
    pub(crate) fn create(columns: Vec<usize>, num_rows: usize, bitmap: &Bitmap) -> Result<Self> {
        let num_values = bitmap.num_values();
        let zeros = bitmap.num_zeros(num_rows) > 0;
        let mut dictionary = Dictionary::from_bitmap(bitmap);
        if zeros {
            dictionary = dictionary.with_zero_tuple();
        }

        let mut mapping = MapToData::create(num_rows, dictionary.num_tuples());
        if zeros {
            mapping.fill(num_values);
        }
        for (tuple, list) in bitmap.offset_lists().unwrap_or_default().iter().enumerate() {
            for &row in list {
                mapping.set(row as usize, tuple);
            }
        }

        Ok(DdcGroup {
            columns,
            num_rows,
            dictionary,
            mapping,
        })
    }

    pub fn estimate_size(num_rows: usize, num_columns: usize, num_values: usize, has_zeros: bool) -> usize {
        let tuples = num_values + usize::from(has_zeros);
        base_size(num_columns)
            + Dictionary::estimate_in_memory_size(tuples, num_columns)
            + MapToData::estimate_in_memory_size(num_rows, tuples)
    }

    pub fn mapping(&self) -> &MapToData {
        &self.mapping
    }

    pub(crate) fn value_at(&self, row: usize, pos: usize) -> f64 {
        self.dictionary.value(self.mapping.get(row), pos)
    }

    pub(crate) fn decompress_into(&self, dense: &mut [f64], num_cols: usize) {
        for (row, tuple) in self.mapping.iter().enumerate() {
            write_tuple(dense, num_cols, row, &self.columns, self.dictionary.tuple(tuple));
        }
    }

    pub(crate) fn in_memory_size(&self) -> usize {
        base_size(self.columns.len()) + self.dictionary.in_memory_size() + self.mapping.in_memory_size()
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.mapping.len() != self.num_rows {
            return Err(CompressionError::Invariant(format!(
                "DDC mapping holds {} entries for {} rows",
                self.mapping.len(),
                self.num_rows
            )));
        }
        Ok(())
    }
}
