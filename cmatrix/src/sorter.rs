/*
 * Copyright (c) 2025-present Dawid Pawlik
 *
 * For educational use only by employees and students of MIMUW.
 * See LICENSE file for details.
 */

//! # Insertion sorter
//!
//! Merges the per-value offset lists of a bitmap into one strictly increasing
//! row array plus an aligned [`MapToData`] naming the dictionary entry of each
//! row. Two strategies produce identical output:
//!
//! - **Heap**: K-way merge through a binary heap, cost `O(n log K)`
//! - **Materialize**: scatter into a row-sized slot array and scan it, cost
//!   `O(num_rows)`; preferred when the lists cover the rows densely

use crate::bitmap::OffsetList;
use crate::error::CompressionError;
use crate::error::Result;
use crate::mapping::MapToData;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Merged rows and the dictionary index of each
#[derive(Debug, Clone, PartialEq)]
pub struct SortedEntries {
    pub indexes: Vec<u32>,
    pub data: MapToData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SorterStrategy {
    Heap,
    Materialize,
}

impl SorterStrategy {
    /// Materialize once the output covers at least a quarter of the rows
    pub fn choose(num_entries: usize, num_rows: usize) -> Self {
        if num_entries.saturating_mul(4) >= num_rows {
            SorterStrategy::Materialize
        } else {
            SorterStrategy::Heap
        }
    }
}

const UNSET: u32 = u32::MAX;
const EXCLUDED: u32 = u32::MAX - 1;

#[derive(Debug, Clone, Copy)]
pub struct InsertionSorter {
    strategy: SorterStrategy,
    num_rows: usize,
}

impl InsertionSorter {
    pub fn new(strategy: SorterStrategy, num_rows: usize) -> Self {
        InsertionSorter { strategy, num_rows }
    }

    /// Sorter with the strategy suited to `num_entries` output rows
    pub fn for_input(num_entries: usize, num_rows: usize) -> Self {
        Self::new(SorterStrategy::choose(num_entries, num_rows), num_rows)
    }

    pub fn strategy(&self) -> SorterStrategy {
        self.strategy
    }

    /// Merge every list; entry `i` of the output maps to list index `data[i]`
    pub fn insert(&self, offsets: &[OffsetList]) -> Result<SortedEntries> {
        let total: usize = offsets.iter().map(|l| l.len()).sum();
        let mut indexes = Vec::with_capacity(total);
        let mut data = MapToData::create(total, offsets.len());

        match self.strategy {
            SorterStrategy::Heap => {
                let mut pos = 0;
                merge_heap(offsets, None, |row, list| {
                    indexes.push(row);
                    data.set(pos, list);
                    pos += 1;
                });
            }
            SorterStrategy::Materialize => {
                let slots = self.scatter(offsets, None)?;
                for (row, &slot) in slots.iter().enumerate() {
                    if slot != UNSET {
                        data.set(indexes.len(), slot as usize);
                        indexes.push(row as u32);
                    }
                }
            }
        }

        check_strictly_increasing(&indexes)?;
        Ok(SortedEntries { indexes, data })
    }

    /// Merge every row *not* in list `largest`.
    ///
    /// Lists after `largest` shift down by one index. Rows that appear in no
    /// list (implicit zeros) map to `offsets.len() - 1`, the slot
    /// [`crate::dictionary::Dictionary::move_frequent_to_last`] reserves for
    /// the zero tuple.
    pub fn insert_excluding(&self, offsets: &[OffsetList], largest: usize) -> Result<SortedEntries> {
        if largest >= offsets.len() {
            return Err(CompressionError::Invariant(format!(
                "excluded list {} out of range for {} lists",
                largest,
                offsets.len()
            )));
        }
        let covered: usize = offsets.iter().map(|l| l.len()).sum();
        let zeros = self.num_rows.checked_sub(covered).ok_or_else(|| {
            CompressionError::Invariant(format!(
                "{} offsets exceed {} rows",
                covered, self.num_rows
            ))
        })?;
        let total = self.num_rows - offsets[largest].len();
        let zero_index = offsets.len() - 1;
        let shift = |list: usize| if list > largest { list - 1 } else { list };

        let mut indexes = Vec::with_capacity(total);
        let mut data = MapToData::create(total, offsets.len());

        if zeros == 0 && self.strategy == SorterStrategy::Heap {
            let mut pos = 0;
            merge_heap(offsets, Some(largest), |row, list| {
                indexes.push(row);
                data.set(pos, shift(list));
                pos += 1;
            });
        } else {
            // Zero rows have to be emitted too, so every row is visited anyway
            let slots = self.scatter(offsets, Some(largest))?;
            for (row, &slot) in slots.iter().enumerate() {
                let value = match slot {
                    EXCLUDED => continue,
                    UNSET => zero_index,
                    list => shift(list as usize),
                };
                data.set(indexes.len(), value);
                indexes.push(row as u32);
            }
        }

        if indexes.len() != total {
            return Err(CompressionError::Invariant(format!(
                "merged {} rows, expected {}",
                indexes.len(),
                total
            )));
        }
        check_strictly_increasing(&indexes)?;
        Ok(SortedEntries { indexes, data })
    }

    fn scatter(&self, offsets: &[OffsetList], excluded: Option<usize>) -> Result<Vec<u32>> {
        let mut slots = vec![UNSET; self.num_rows];
        for (i, list) in offsets.iter().enumerate() {
            let mark = if Some(i) == excluded { EXCLUDED } else { i as u32 };
            for &row in list {
                let slot = slots.get_mut(row as usize).ok_or_else(|| {
                    CompressionError::Invariant(format!(
                        "row {} out of range for {} rows",
                        row, self.num_rows
                    ))
                })?;
                if *slot != UNSET {
                    return Err(CompressionError::Invariant(format!(
                        "row {} appears in more than one offset list",
                        row
                    )));
                }
                *slot = mark;
            }
        }
        Ok(slots)
    }
}

fn merge_heap(offsets: &[OffsetList], excluded: Option<usize>, mut emit: impl FnMut(u32, usize)) {
    let mut cursors = vec![0usize; offsets.len()];
    let mut heap: BinaryHeap<Reverse<(u32, usize)>> = offsets
        .iter()
        .enumerate()
        .filter(|(i, l)| Some(*i) != excluded && !l.is_empty())
        .map(|(i, l)| Reverse((l[0], i)))
        .collect();

    while let Some(Reverse((row, list))) = heap.pop() {
        emit(row, list);
        cursors[list] += 1;
        if let Some(&next) = offsets[list].get(cursors[list]) {
            heap.push(Reverse((next, list)));
        }
    }
}

fn check_strictly_increasing(indexes: &[u32]) -> Result<()> {
    match indexes.windows(2).find(|w| w[0] >= w[1]) {
        Some(w) => Err(CompressionError::Invariant(format!(
            "merged rows not strictly increasing at {} -> {}",
            w[0], w[1]
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lists() -> Vec<OffsetList> {
        vec![vec![1, 5, 9], vec![0, 2], vec![3, 4, 6, 7]]
    }

    #[test]
    fn test_strategies_agree_on_insert() {
        let heap = InsertionSorter::new(SorterStrategy::Heap, 12).insert(&lists()).unwrap();
        let mat = InsertionSorter::new(SorterStrategy::Materialize, 12)
            .insert(&lists())
            .unwrap();
        assert_eq!(heap, mat);
        assert_eq!(heap.indexes, vec![0, 1, 2, 3, 4, 5, 6, 7, 9]);
        let data: Vec<usize> = heap.data.iter().collect();
        assert_eq!(data, vec![1, 0, 1, 2, 2, 0, 2, 2, 0]);
    }

    #[test]
    fn test_exclude_largest_with_zeros() {
        // Rows 8, 10, 11 hold zeros
        for strategy in [SorterStrategy::Heap, SorterStrategy::Materialize] {
            let out = InsertionSorter::new(strategy, 12)
                .insert_excluding(&lists(), 2)
                .unwrap();
            assert_eq!(out.indexes, vec![0, 1, 2, 5, 8, 9, 10, 11]);
            let data: Vec<usize> = out.data.iter().collect();
            assert_eq!(data, vec![1, 0, 1, 0, 2, 0, 2, 2]);
        }
    }

    #[test]
    fn test_exclude_shifts_later_lists() {
        let lists = vec![vec![0, 1, 2, 3], vec![4], vec![5]];
        for strategy in [SorterStrategy::Heap, SorterStrategy::Materialize] {
            let out = InsertionSorter::new(strategy, 6)
                .insert_excluding(&lists, 0)
                .unwrap();
            assert_eq!(out.indexes, vec![4, 5]);
            let data: Vec<usize> = out.data.iter().collect();
            assert_eq!(data, vec![0, 1]);
        }
    }

    #[test]
    fn test_duplicates_rejected() {
        let bad = vec![vec![1, 2], vec![2]];
        assert!(InsertionSorter::new(SorterStrategy::Heap, 4).insert(&bad).is_err());
        assert!(InsertionSorter::new(SorterStrategy::Materialize, 4).insert(&bad).is_err());
        assert!(
            InsertionSorter::new(SorterStrategy::Heap, 4)
                .insert_excluding(&bad, 5)
                .is_err()
        );
    }

    #[test]
    fn test_strategy_choice() {
        assert_eq!(SorterStrategy::choose(10, 1000), SorterStrategy::Heap);
        assert_eq!(SorterStrategy::choose(500, 1000), SorterStrategy::Materialize);
    }
}
