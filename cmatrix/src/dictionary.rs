/*
 * Copyright (c) 2025-present Dawid Pawlik
 *
 * For educational use only by employees and students of MIMUW.
 * See LICENSE file for details.
 */

//! # Value dictionaries
//!
//! A [`Dictionary`] holds the distinct value tuples of one column group,
//! flattened row-major (`tuple * num_columns + column`). Encoders may rebuild
//! a dictionary while they run; once attached to a finished column group it is
//! never changed again.

use crate::bitmap::Bitmap;
use crate::error::CompressionError;
use crate::error::Result;
use serde::Deserialize;
use serde::Serialize;

const DICTIONARY_HEADER_SIZE: usize = 24;

/// Distinct value tuples referenced by index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dictionary {
    values: Vec<f64>,
    num_columns: usize,
}

impl Dictionary {
    pub fn new(values: Vec<f64>, num_columns: usize) -> Result<Self> {
        let dictionary = Dictionary {
            values,
            num_columns,
        };
        dictionary.validate()?;
        Ok(dictionary)
    }

    /// Check that the values split into whole tuples of a non-zero width
    pub fn validate(&self) -> Result<()> {
        if self.num_columns == 0 || self.values.len() % self.num_columns != 0 {
            return Err(CompressionError::Invariant(format!(
                "{} dictionary values do not form tuples of width {}",
                self.values.len(),
                self.num_columns
            )));
        }
        Ok(())
    }

    /// Copy the tuples of a bitmap in bitmap order
    pub fn from_bitmap(bitmap: &Bitmap) -> Self {
        Dictionary {
            values: bitmap.values().to_vec(),
            num_columns: bitmap.num_columns(),
        }
    }

    pub fn num_tuples(&self) -> usize {
        self.values.len() / self.num_columns
    }

    pub fn num_columns(&self) -> usize {
        self.num_columns
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn tuple(&self, index: usize) -> &[f64] {
        &self.values[index * self.num_columns..(index + 1) * self.num_columns]
    }

    #[inline]
    pub fn value(&self, tuple: usize, column: usize) -> f64 {
        self.values[tuple * self.num_columns + column]
    }

    pub fn in_memory_size(&self) -> usize {
        Self::estimate_in_memory_size(self.num_tuples(), self.num_columns)
    }

    pub fn estimate_in_memory_size(num_tuples: usize, num_columns: usize) -> usize {
        DICTIONARY_HEADER_SIZE + num_tuples * num_columns * 8
    }

    /// Append an all-zero tuple; its index is the previous tuple count
    pub fn with_zero_tuple(mut self) -> Self {
        self.values.resize(self.values.len() + self.num_columns, 0.0);
        self
    }

    /// Relocate the tuple at `largest` to the final slot.
    ///
    /// Tuples after `largest` shift down by one. When the column group has
    /// implicit zero rows an explicit zero tuple is inserted just before the
    /// relocated tuple so those rows can be addressed. If the zero rows
    /// outnumber the rows of `largest`, zero is the most frequent tuple: it is
    /// appended last instead and nothing moves.
    pub fn move_frequent_to_last(
        self,
        bitmap: &Bitmap,
        num_rows: usize,
        largest: usize,
    ) -> Result<MovedDictionary> {
        let num_tuples = self.num_tuples();
        if largest >= num_tuples {
            return Err(CompressionError::Invariant(format!(
                "frequent tuple {} out of range for {} tuples",
                largest, num_tuples
            )));
        }
        let zeros = bitmap.num_zeros(num_rows);
        let largest_size = bitmap.offsets(largest).len();
        let n = self.num_columns;

        if zeros > largest_size {
            let dictionary = self.with_zero_tuple();
            return Ok(MovedDictionary {
                dictionary,
                moved: None,
                zero_index: Some(num_tuples),
            });
        }

        let mut values = Vec::with_capacity(self.values.len() + if zeros > 0 { n } else { 0 });
        values.extend_from_slice(&self.values[..largest * n]);
        values.extend_from_slice(&self.values[(largest + 1) * n..]);
        let zero_index = if zeros > 0 {
            values.resize(values.len() + n, 0.0);
            Some(num_tuples - 1)
        } else {
            None
        };
        values.extend_from_slice(self.tuple(largest));

        Ok(MovedDictionary {
            dictionary: Dictionary {
                values,
                num_columns: n,
            },
            moved: Some(largest),
            zero_index,
        })
    }
}

/// Result of [`Dictionary::move_frequent_to_last`]
#[derive(Debug, Clone, PartialEq)]
pub struct MovedDictionary {
    pub dictionary: Dictionary,
    /// Original index of the relocated tuple
    pub moved: Option<usize>,
    /// Slot of the explicit zero tuple, if one was added
    pub zero_index: Option<usize>,
}

impl MovedDictionary {
    /// New slot of the tuple that was at `old` before the move
    pub fn remap(&self, old: usize) -> usize {
        match self.moved {
            Some(m) if old == m => self.dictionary.num_tuples() - 1,
            Some(m) if old > m => old - 1,
            _ => old,
        }
    }

    /// Slot of the tuple rows default to when not stored explicitly
    pub fn default_index(&self) -> usize {
        self.dictionary.num_tuples() - 1
    }
}
