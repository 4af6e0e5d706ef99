/*
 * Copyright (c) 2025-present Dawid Pawlik
 *
 * For educational use only by employees and students of MIMUW.
 * See LICENSE file for details.
 */

//! # Size estimation
//!
//! The classify phase extracts the exact bitmap of every column and derives
//! from it the size each encoding would produce. The formulas are the ones the
//! finished groups report through `estimate_in_memory_size`, so an estimate
//! and the size of the group the factory then builds agree.

use crate::CompressionType;
use crate::bitmap::Bitmap;
use crate::bitmap::extract_bitmap;
use crate::colgroup::ConstGroup;
use crate::colgroup::DdcGroup;
use crate::colgroup::EmptyGroup;
use crate::colgroup::OleGroup;
use crate::colgroup::RleGroup;
use crate::colgroup::SdcVariant;
use crate::colgroup::UncompressedGroup;
use crate::colgroup::explicit_rows;
use crate::colgroup::ole_stream_len;
use crate::colgroup::rle_pair_count;
use crate::error::Result;
use crate::is_zero;
use crate::matrix::ColumnSource;
use crate::offsets::OffsetIndex;
use crate::settings::CompressionSettings;
use rayon::ThreadPool;
use rayon::prelude::*;
use std::collections::BTreeMap;
use tracing::debug;

/// Shape of a bitmap, as far as the size formulas need it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodingStats {
    pub num_rows: usize,
    pub num_columns: usize,
    pub num_values: usize,
    pub num_offsets: usize,
    pub num_zeros: usize,
    /// Index and row count of the first most frequent tuple
    pub largest: Option<(usize, usize)>,
    pub ole_words: usize,
    pub rle_pairs: usize,
    /// Cells that are not `+0.0`
    pub non_zeros: usize,
    /// SDC variant the factory would pick and the exact size of its row index
    pub sdc: Option<(SdcVariant, usize)>,
}

impl EncodingStats {
    pub fn from_bitmap(bitmap: &Bitmap, num_rows: usize, ole_block_size: usize) -> Self {
        let lists = bitmap.offset_lists().unwrap_or_default();
        let non_zeros = lists
            .iter()
            .enumerate()
            .map(|(i, list)| bitmap.tuple(i).iter().filter(|v| !is_zero(**v)).count() * list.len())
            .sum();
        let sdc = SdcVariant::for_bitmap(bitmap, num_rows).map(|(variant, largest)| {
            let rows = explicit_rows(bitmap, num_rows, variant, largest);
            (variant, OffsetIndex::size_of_sorted(&rows))
        });

        EncodingStats {
            num_rows,
            num_columns: bitmap.num_columns(),
            num_values: bitmap.num_values(),
            num_offsets: bitmap.num_offsets(),
            num_zeros: bitmap.num_zeros(num_rows),
            largest: bitmap.largest(),
            ole_words: lists.iter().map(|l| ole_stream_len(l, ole_block_size)).sum(),
            rle_pairs: lists.iter().map(|l| rle_pair_count(l)).sum(),
            non_zeros,
            sdc,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.num_values == 0
    }

    pub fn is_const(&self) -> bool {
        self.num_values == 1 && self.num_zeros == 0
    }

    /// Size of the group the factory builds when asked for `compression`;
    /// `None` when the factory would reject the request
    pub fn size_of(&self, compression: CompressionType) -> Option<usize> {
        let cols = self.num_columns;
        if self.is_empty() {
            return Some(EmptyGroup::estimate_size(cols));
        }
        if self.is_const() {
            return Some(ConstGroup::estimate_size(cols));
        }
        match compression {
            CompressionType::Empty | CompressionType::Const => None,
            CompressionType::Ddc => Some(DdcGroup::estimate_size(
                self.num_rows,
                cols,
                self.num_values,
                self.num_zeros > 0,
            )),
            CompressionType::Ole => Some(OleGroup::estimate_size(cols, self.num_values, self.ole_words)),
            CompressionType::Rle => Some(RleGroup::estimate_size(cols, self.num_values, self.rle_pairs)),
            CompressionType::Sdc => {
                let (variant, index_size) = self.sdc?;
                let (_, largest_size) = self.largest?;
                Some(variant.estimate_size(
                    self.num_rows,
                    cols,
                    self.num_values,
                    self.num_zeros,
                    largest_size,
                    index_size,
                ))
            }
            CompressionType::Uncompressed => Some(self.uncompressed_size()),
        }
    }

    pub fn uncompressed_size(&self) -> usize {
        UncompressedGroup::estimate_size(self.num_rows, self.num_columns, self.non_zeros)
    }
}

/// Estimated sizes of one column set
#[derive(Debug, Clone, PartialEq)]
pub struct GroupSizeInfo {
    pub columns: Vec<usize>,
    pub stats: EncodingStats,
    /// Size per valid encoding
    pub sizes: BTreeMap<CompressionType, usize>,
    pub best: CompressionType,
    pub best_size: usize,
}

impl GroupSizeInfo {
    fn new(columns: Vec<usize>, stats: EncodingStats, settings: &CompressionSettings) -> Self {
        let sizes: BTreeMap<CompressionType, usize> = settings
            .valid_compressions
            .iter()
            .filter_map(|&c| stats.size_of(c).map(|size| (c, size)))
            .collect();
        let (best, best_size) = sizes
            .iter()
            .fold(None, |acc: Option<(CompressionType, usize)>, (&c, &size)| match acc {
                Some((_, best)) if best <= size => acc,
                _ => Some((c, size)),
            })
            .unwrap_or((CompressionType::Uncompressed, stats.uncompressed_size()));
        GroupSizeInfo {
            columns,
            stats,
            sizes,
            best,
            best_size,
        }
    }

    pub fn uncompressed_size(&self) -> usize {
        self.stats.uncompressed_size()
    }

    /// Whether some valid encoding beats storing the columns raw
    pub fn is_compressible(&self) -> bool {
        self.best_size < self.uncompressed_size()
    }
}

/// Result of the classify phase
#[derive(Debug, Clone, PartialEq)]
pub struct CompressedSizeInfo {
    /// One entry per column, in column order
    pub infos: Vec<GroupSizeInfo>,
}

impl CompressedSizeInfo {
    pub fn num_compressible(&self) -> usize {
        self.infos.iter().filter(|i| i.is_compressible()).count()
    }

    pub fn is_compressible(&self) -> bool {
        self.num_compressible() > 0
    }

    /// Size if every column were stored alone in its best form
    pub fn estimated_size(&self) -> usize {
        self.infos
            .iter()
            .map(|i| i.best_size.min(i.uncompressed_size()))
            .sum()
    }
}

pub struct SizeEstimator<'a> {
    source: ColumnSource<'a>,
    settings: &'a CompressionSettings,
}

impl<'a> SizeEstimator<'a> {
    pub fn new(source: ColumnSource<'a>, settings: &'a CompressionSettings) -> Self {
        SizeEstimator { source, settings }
    }

    /// Estimate one column set
    pub fn estimate_group(&self, columns: &[usize]) -> Result<GroupSizeInfo> {
        let bitmap = extract_bitmap(columns, self.source)?;
        let stats = EncodingStats::from_bitmap(&bitmap, self.source.num_rows(), self.settings.ole_block_size);
        Ok(GroupSizeInfo::new(columns.to_vec(), stats, self.settings))
    }

    /// Estimate every column on its own, in parallel when `pool` is given
    pub fn compute_size_infos(&self, pool: Option<&ThreadPool>) -> Result<CompressedSizeInfo> {
        let num_cols = self.source.num_cols();
        let infos = match pool {
            Some(pool) => pool.install(|| {
                (0..num_cols)
                    .into_par_iter()
                    .map(|c| self.estimate_group(&[c]))
                    .collect::<Result<Vec<_>>>()
            })?,
            None => (0..num_cols)
                .map(|c| self.estimate_group(&[c]))
                .collect::<Result<Vec<_>>>()?,
        };
        let info = CompressedSizeInfo { infos };
        debug!(
            columns = num_cols,
            compressible = info.num_compressible(),
            estimated_size = info.estimated_size(),
            "estimated column sizes"
        );
        Ok(info)
    }
}
