/*
 * Copyright (c) 2025-present Dawid Pawlik
 *
 * For educational use only by employees and students of MIMUW.
 * See LICENSE file for details.
 */

//! Offset-list encoding.
//!
//! The rows of every tuple are split into blocks of `block_size` rows. Each
//! block, up to the last one holding a row of the tuple, is written as its
//! row count followed by the in-block offsets, all as 16-bit words. The
//! streams of all tuples are concatenated and addressed through `ptr`.

use super::base_size;
use super::write_tuple;
use crate::bitmap::Bitmap;
use crate::dictionary::Dictionary;
use crate::error::CompressionError;
use crate::error::Result;
use crate::settings::MAX_OLE_BLOCK_SIZE;
use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OleGroup {
    pub(crate) columns: Vec<usize>,
    pub(crate) num_rows: usize,
    pub(crate) dictionary: Dictionary,
    pub(crate) block_size: usize,
    /// Start of each tuple's stream in `data`, plus the end sentinel
    pub(crate) ptr: Vec<u32>,
    pub(crate) data: Vec<u16>,
}

/// Words the stream of one offset list occupies
pub(crate) fn ole_stream_len(list: &[u32], block_size: usize) -> usize {
    match list.last() {
        Some(&last) => last as usize / block_size + 1 + list.len(),
        None => 0,
    }
}

impl OleGroup {
    pub(crate) fn create(
        columns: Vec<usize>,
        num_rows: usize,
        bitmap: &Bitmap,
        block_size: usize,
    ) -> Result<Self> {
        if block_size == 0 || block_size > MAX_OLE_BLOCK_SIZE {
            return Err(CompressionError::Invariant(format!(
                "OLE block size {} outside 1..={}",
                block_size, MAX_OLE_BLOCK_SIZE
            )));
        }
        let lists = bitmap.offset_lists().unwrap_or_default();
        let total: usize = lists.iter().map(|l| ole_stream_len(l, block_size)).sum();
        if total > u32::MAX as usize {
            return Err(CompressionError::Invariant(format!(
                "OLE stream of {} words exceeds the pointer range",
                total
            )));
        }

        let mut ptr = Vec::with_capacity(lists.len() + 1);
        let mut data = Vec::with_capacity(total);
        for list in lists {
            ptr.push(data.len() as u32);
            let mut rest = list.as_slice();
            let Some(&last) = list.last() else {
                continue;
            };
            for block in 0..=(last as usize / block_size) {
                let end = (block + 1) * block_size;
                let split = rest.partition_point(|&r| (r as usize) < end);
                let (inside, tail) = rest.split_at(split);
                data.push(inside.len() as u16);
                data.extend(inside.iter().map(|&r| (r as usize - block * block_size) as u16));
                rest = tail;
            }
        }
        ptr.push(data.len() as u32);

        Ok(OleGroup {
            columns,
            num_rows,
            dictionary: Dictionary::from_bitmap(bitmap),
            block_size,
            ptr,
            data,
        })
    }

    pub fn estimate_size(num_columns: usize, num_values: usize, stream_words: usize) -> usize {
        base_size(num_columns)
            + Dictionary::estimate_in_memory_size(num_values, num_columns)
            + (num_values + 1) * 4
            + stream_words * 2
    }

    fn stream(&self, tuple: usize) -> &[u16] {
        &self.data[self.ptr[tuple] as usize..self.ptr[tuple + 1] as usize]
    }

    /// Rows of one tuple in increasing order
    fn rows_of(&self, tuple: usize) -> impl Iterator<Item = usize> + '_ {
        let stream = self.stream(tuple);
        let mut pos = 0;
        let mut block = 0;
        std::iter::from_fn(move || {
            if pos >= stream.len() {
                return None;
            }
            let count = stream[pos] as usize;
            let base = block * self.block_size;
            let rows = stream[pos + 1..pos + 1 + count].iter().map(move |&o| base + o as usize);
            pos += 1 + count;
            block += 1;
            Some(rows)
        })
        .flatten()
    }

    fn tuple_of(&self, row: usize) -> Option<usize> {
        let target = row / self.block_size;
        let offset = (row % self.block_size) as u16;
        (0..self.dictionary.num_tuples()).find(|&tuple| {
            let stream = self.stream(tuple);
            let mut pos = 0;
            for _ in 0..target {
                match stream.get(pos) {
                    Some(&count) => pos += 1 + count as usize,
                    None => return false,
                }
            }
            match stream.get(pos) {
                Some(&count) => stream[pos + 1..pos + 1 + count as usize]
                    .binary_search(&offset)
                    .is_ok(),
                None => false,
            }
        })
    }

    pub(crate) fn value_at(&self, row: usize, pos: usize) -> f64 {
        match self.tuple_of(row) {
            Some(tuple) => self.dictionary.value(tuple, pos),
            None => 0.0,
        }
    }

    pub(crate) fn decompress_into(&self, dense: &mut [f64], num_cols: usize) {
        for tuple in 0..self.dictionary.num_tuples() {
            let values = self.dictionary.tuple(tuple);
            for row in self.rows_of(tuple) {
                write_tuple(dense, num_cols, row, &self.columns, values);
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
            || self.ptr.windows(2).any(|w| w[0] > w[1])
            || self.ptr.last().is_some_and(|&end| end as usize != self.data.len())
        {
            return Err(CompressionError::Invariant(
                "OLE stream pointers are inconsistent".to_string(),
            ));
        }
        for tuple in 0..tuples {
            let stream = self.stream(tuple);
            let mut pos = 0;
            while pos < stream.len() {
                pos += 1 + stream[pos] as usize;
            }
            if pos != stream.len() {
                return Err(CompressionError::Invariant(format!(
                    "OLE stream of tuple {} is truncated",
                    tuple
                )));
            }
            if let Some(row) = self.rows_of(tuple).find(|&r| r >= self.num_rows) {
                return Err(CompressionError::Invariant(format!(
                    "OLE row {} outside {} rows",
                    row, self.num_rows
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocks_include_empty_gaps() {
        let bitmap = Bitmap::new(1, vec![3.0], vec![vec![1, 2, 300]]);
        let group = OleGroup::create(vec![0], 400, &bitmap, 128).unwrap();
        // block 0: [2, 1, 2], block 1: [0], block 2: [1, 44]
        assert_eq!(group.data, vec![2, 1, 2, 0, 1, 44]);
        assert_eq!(group.data.len(), ole_stream_len(&[1, 2, 300], 128));
        assert_eq!(group.value_at(300, 0), 3.0);
        assert_eq!(group.value_at(299, 0), 0.0);
        assert_eq!(group.value_at(399, 0), 0.0);
        group.validate().unwrap();
    }

    #[test]
    fn test_multiple_tuples_round_trip() {
        let bitmap = Bitmap::new(
            1,
            vec![1.0, 2.0],
            vec![vec![0, 70, 140], vec![5, 64, 65, 199]],
        );
        let group = OleGroup::create(vec![0], 200, &bitmap, 64).unwrap();
        let mut dense = vec![0.0; 200];
        group.decompress_into(&mut dense, 1);
        for row in 0..200 {
            assert_eq!(dense[row], group.value_at(row, 0), "row {}", row);
        }
        assert_eq!(dense[140], 1.0);
        assert_eq!(dense[199], 2.0);
        assert_eq!(
            group.in_memory_size(),
            OleGroup::estimate_size(1, 2, group.data.len())
        );
    }

    #[test]
    fn test_rejects_bad_block_size() {
        let bitmap = Bitmap::new(1, vec![1.0], vec![vec![0]]);
        assert!(OleGroup::create(vec![0], 1, &bitmap, 0).is_err());
        assert!(OleGroup::create(vec![0], 1, &bitmap, 70_000).is_err());
    }
}
