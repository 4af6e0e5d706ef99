/*
 * Copyright (c) 2025-present Dawid Pawlik
 *
 * For educational use only by employees and students of MIMUW.
 * See LICENSE file for details.
 */

//! # Column-group factory
//!
//! Turns a bitmap and a requested encoding into a finished [`ColGroup`].
//! All-zero bitmaps always become [`EmptyGroup`]s and bitmaps holding one
//! tuple in every row always become [`ConstGroup`]s, whatever was requested.
//!
//! [`compress_col_groups`] runs one independent task per planned group, on a
//! rayon pool when one is given. Results come back in plan order, so parallel
//! and sequential runs produce identical groups.

use super::ColGroup;
use super::ConstGroup;
use super::DdcGroup;
use super::EmptyGroup;
use super::OleGroup;
use super::RleGroup;
use super::UncompressedGroup;
use super::sdc;
use crate::CompressionType;
use crate::bitmap::Bitmap;
use crate::bitmap::extract_bitmap;
use crate::cocode::ColumnGroupPlan;
use crate::dictionary::Dictionary;
use crate::error::CompressionError;
use crate::error::Result;
use crate::matrix::ColumnSource;
use crate::settings::CompressionSettings;
use rayon::ThreadPool;
use rayon::prelude::*;
use tracing::trace;

/// Build one column group over `columns` from its bitmap.
///
/// Failures carry the columns and the requested encoding.
pub fn compress(
    columns: &[usize],
    num_rows: usize,
    bitmap: Bitmap,
    compression: CompressionType,
    settings: &CompressionSettings,
    raw: ColumnSource<'_>,
) -> Result<ColGroup> {
    build(columns, num_rows, bitmap, compression, settings, raw)
        .map_err(|e| e.in_construction(columns, compression))
}

fn build(
    columns: &[usize],
    num_rows: usize,
    mut bitmap: Bitmap,
    compression: CompressionType,
    settings: &CompressionSettings,
    raw: ColumnSource<'_>,
) -> Result<ColGroup> {
    bitmap.validate(columns, num_rows)?;
    let cols = columns.to_vec();

    match bitmap.offset_lists() {
        None => return Ok(ColGroup::Empty(EmptyGroup::new(cols, num_rows))),
        Some(lists) if lists.len() == 1 && lists[0].len() == num_rows => {
            let dictionary = Dictionary::from_bitmap(&bitmap);
            return Ok(ColGroup::Const(ConstGroup::new(cols, num_rows, dictionary)?));
        }
        Some(_) => {}
    }

    if settings.sort_values_by_length {
        bitmap.sort_values_by_frequency();
    }

    let group = match compression {
        CompressionType::Ddc => ColGroup::Ddc(DdcGroup::create(cols, num_rows, &bitmap)?),
        CompressionType::Ole => ColGroup::Ole(OleGroup::create(
            cols,
            num_rows,
            &bitmap,
            settings.ole_block_size,
        )?),
        CompressionType::Rle => ColGroup::Rle(RleGroup::create(cols, num_rows, &bitmap)?),
        CompressionType::Sdc => sdc::create(cols, num_rows, &bitmap)?,
        CompressionType::Uncompressed => {
            if raw.num_rows() != num_rows {
                return Err(CompressionError::Invariant(format!(
                    "raw block has {} rows, group has {}",
                    raw.num_rows(),
                    num_rows
                )));
            }
            ColGroup::Uncompressed(UncompressedGroup::create(cols, raw)?)
        }
        CompressionType::Empty | CompressionType::Const => {
            return Err(CompressionError::Unsupported {
                columns: cols,
                compression,
                reason: format!(
                    "bitmap holds {} distinct non-zero tuples over {} of {} rows",
                    bitmap.num_values(),
                    bitmap.num_offsets(),
                    num_rows
                ),
            });
        }
    };
    Ok(group)
}

/// Compress every planned group, in parallel when `pool` is given.
///
/// On a sparse transposed source, a multi-column group that contains
/// all-zero columns is split into an empty group for those columns and a
/// group for the rest.
pub fn compress_col_groups(
    source: ColumnSource<'_>,
    plans: &[ColumnGroupPlan],
    settings: &CompressionSettings,
    pool: Option<&ThreadPool>,
) -> Result<Vec<ColGroup>> {
    let work = |plan: &ColumnGroupPlan| compress_plan(source, plan, settings);
    let nested = match pool {
        Some(pool) => pool.install(|| plans.par_iter().map(work).collect::<Result<Vec<_>>>())?,
        None => plans.iter().map(work).collect::<Result<Vec<_>>>()?,
    };
    Ok(nested.into_iter().flatten().collect())
}

fn compress_plan(
    source: ColumnSource<'_>,
    plan: &ColumnGroupPlan,
    settings: &CompressionSettings,
) -> Result<Vec<ColGroup>> {
    let num_rows = source.num_rows();
    if source.transposed && source.block.is_sparse() && plan.columns.len() > 1 {
        let (empty, rest): (Vec<usize>, Vec<usize>) = plan
            .columns
            .iter()
            .partition(|&&c| source.is_column_empty(c));
        if !empty.is_empty() {
            trace!(empty = ?empty, rest = ?rest, "splitting group around empty columns");
            let mut groups = vec![ColGroup::Empty(EmptyGroup::new(empty, num_rows))];
            if !rest.is_empty() {
                groups.push(compress_columns(source, &rest, plan.compression, settings)?);
            }
            return Ok(groups);
        }
    }
    Ok(vec![compress_columns(source, &plan.columns, plan.compression, settings)?])
}

fn compress_columns(
    source: ColumnSource<'_>,
    columns: &[usize],
    compression: CompressionType,
    settings: &CompressionSettings,
) -> Result<ColGroup> {
    let bitmap = extract_bitmap(columns, source).map_err(|e| e.in_construction(columns, compression))?;
    let group = compress(columns, source.num_rows(), bitmap, compression, settings, source)?;
    trace!(
        columns = ?columns,
        requested = %compression,
        chosen = group.variant_name(),
        size = group.estimate_in_memory_size(),
        "compressed column group"
    );
    Ok(group)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::MatrixBlock;

    fn settings() -> CompressionSettings {
        CompressionSettings::builder().parallelism(2).build().unwrap()
    }

    fn single(block: &MatrixBlock, compression: CompressionType) -> ColGroup {
        let source = ColumnSource::new(block, false);
        let bitmap = extract_bitmap(&[0], source).unwrap();
        compress(&[0], block.num_rows(), bitmap, compression, &settings(), source).unwrap()
    }

    #[test]
    fn test_constant_column_becomes_const() {
        let block = MatrixBlock::dense(1000, 1, vec![5.0; 1000]).unwrap();
        for compression in CompressionType::REQUESTABLE {
            let group = single(&block, compression);
            assert_eq!(group.compression_type(), CompressionType::Const);
            assert!((0..1000).all(|r| group.get(r, 0) == Some(5.0)));
        }
    }

    #[test]
    fn test_zero_column_becomes_empty() {
        let block = MatrixBlock::dense(50, 1, vec![0.0; 50]).unwrap();
        let group = single(&block, CompressionType::Sdc);
        assert_eq!(group.compression_type(), CompressionType::Empty);
        assert!((0..50).all(|r| group.get(r, 0) == Some(0.0)));
    }

    #[test]
    fn test_sparse_single_value_uses_single_zeros() {
        let mut values = vec![0.0; 1000];
        values[..3].fill(7.0);
        let block = MatrixBlock::dense(1000, 1, values).unwrap();
        let group = single(&block, CompressionType::Sdc);
        assert!(matches!(group, ColGroup::SdcSingleZeros(_)));
        assert_eq!(group.explicit_rows(), Some(vec![0, 1, 2]));
        assert_eq!(group.get(2, 0), Some(7.0));
        assert_eq!(group.get(3, 0), Some(0.0));
    }

    #[test]
    fn test_const_and_empty_cannot_be_forced() {
        let block = MatrixBlock::dense(4, 1, vec![1.0, 2.0, 0.0, 1.0]).unwrap();
        let source = ColumnSource::new(&block, false);
        let bitmap = extract_bitmap(&[0], source).unwrap();
        let err = compress(&[0], 4, bitmap, CompressionType::Const, &settings(), source).unwrap_err();
        assert!(matches!(err, CompressionError::Unsupported { .. }));
    }

    #[test]
    fn test_malformed_bitmap_names_group() {
        let block = MatrixBlock::dense(4, 1, vec![1.0; 4]).unwrap();
        let source = ColumnSource::new(&block, false);
        let bitmap = Bitmap::new(1, vec![1.0, 2.0], vec![vec![0, 1], vec![1]]);
        let err = compress(&[0], 4, bitmap, CompressionType::Ddc, &settings(), source).unwrap_err();
        match err {
            CompressionError::Construction {
                columns,
                compression,
                ..
            } => {
                assert_eq!(columns, vec![0]);
                assert_eq!(compression, CompressionType::Ddc);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let rows: Vec<Vec<f64>> = (0..400)
            .map(|r| (0..6).map(|c| ((r * (c + 1)) % (c + 3)) as f64).collect())
            .collect();
        let block = MatrixBlock::from_rows(rows).unwrap();
        let plans: Vec<ColumnGroupPlan> = vec![
            ColumnGroupPlan::new(vec![0, 1], CompressionType::Ddc),
            ColumnGroupPlan::new(vec![2], CompressionType::Sdc),
            ColumnGroupPlan::new(vec![3], CompressionType::Ole),
            ColumnGroupPlan::new(vec![4, 5], CompressionType::Rle),
        ];
        let source = ColumnSource::new(&block, false);
        let pool = rayon::ThreadPoolBuilder::new().num_threads(3).build().unwrap();
        let parallel = compress_col_groups(source, &plans, &settings(), Some(&pool)).unwrap();
        let sequential = compress_col_groups(source, &plans, &settings(), None).unwrap();
        assert_eq!(parallel, sequential);
        assert_eq!(parallel.len(), 4);
    }

    #[test]
    fn test_transposed_sparse_splits_empty_columns() {
        let block = MatrixBlock::sparse_from_triplets(
            10,
            3,
            vec![(0, 0, 1.0), (4, 2, 2.0), (9, 2, 1.0)],
        )
        .unwrap();
        let t = block.transpose(false);
        let plans = vec![ColumnGroupPlan::new(vec![0, 1, 2], CompressionType::Ddc)];
        let groups =
            compress_col_groups(ColumnSource::new(&t, true), &plans, &settings(), None).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].compression_type(), CompressionType::Empty);
        assert_eq!(groups[0].col_indices(), &[1]);
        assert_eq!(groups[1].col_indices(), &[0, 2]);
        assert_eq!(groups[1].get(4, 2), Some(2.0));
    }
}
