/*
 * Copyright (c) 2025-present Dawid Pawlik
 *
 * For educational use only by employees and students of MIMUW.
 * See LICENSE file for details.
 */

//! End-to-end compression scenarios

use cmatrix::ColGroup;
use cmatrix::CompressionError;
use cmatrix::CompressionSettings;
use cmatrix::CompressionType;
use cmatrix::Matrix;
use cmatrix::MatrixBlock;
use cmatrix::bitmap::extract_bitmap;
use cmatrix::cocode::ColumnGroupPlan;
use cmatrix::cocode::FixedGrouping;
use cmatrix::colgroup::factory;
use cmatrix::compress::compress;
use cmatrix::compress::compress_with_grouper;
use cmatrix::mapping::MapToData;
use cmatrix::matrix::ColumnSource;
use cmatrix::statistics::AbortReason;
use cmatrix::statistics::Phase;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;

fn single_threaded() -> CompressionSettings {
    CompressionSettings::builder().parallelism(1).build().unwrap()
}

fn build_group(block: &MatrixBlock, columns: &[usize], compression: CompressionType) -> ColGroup {
    let source = ColumnSource::new(block, false);
    let bitmap = extract_bitmap(columns, source).unwrap();
    factory::compress(
        columns,
        block.num_rows(),
        bitmap,
        compression,
        &single_threaded(),
        source,
    )
    .unwrap()
}

fn assert_bit_exact(matrix: &Matrix, block: &MatrixBlock) {
    for r in 0..block.num_rows() {
        for c in 0..block.num_cols() {
            let expected = block.get(r, c).unwrap();
            let actual = matrix.get(r, c).unwrap();
            assert_eq!(
                actual.to_bits(),
                expected.to_bits(),
                "cell ({}, {}): {} != {}",
                r,
                c,
                actual,
                expected
            );
        }
    }
}

#[test]
fn test_constant_column_is_const_group() {
    let block = MatrixBlock::dense(1000, 1, vec![5.0; 1000]).unwrap();
    let group = build_group(&block, &[0], CompressionType::Ddc);
    assert_eq!(group.compression_type(), CompressionType::Const);
    assert_eq!(group.num_values(), 1);
    assert_eq!(group.dictionary().unwrap().values(), &[5.0]);

    let (matrix, stats) = compress(block.clone(), &single_threaded()).unwrap();
    assert!(matrix.is_compressed());
    assert_eq!(stats.group_types.get(&CompressionType::Const), Some(&1));
    assert_eq!(matrix.get(999, 0), Some(5.0));
}

#[test]
fn test_three_non_zero_rows_store_three_rows() {
    let mut values = vec![0.0; 1000];
    values[10] = 2.5;
    values[500] = 2.5;
    values[999] = 2.5;
    let block = MatrixBlock::dense(1000, 1, values).unwrap();

    let group = build_group(&block, &[0], CompressionType::Sdc);
    assert_eq!(group.variant_name(), "SDC_SINGLE_ZEROS");
    assert_eq!(group.explicit_rows(), Some(vec![10, 500, 999]));
    assert_eq!(group.get(500, 0), Some(2.5));
    assert_eq!(group.get(501, 0), Some(0.0));
}

#[test]
fn test_ddc_over_three_columns() {
    let rows: Vec<Vec<f64>> = (0..500)
        .map(|r| {
            let t = (r % 4) as f64;
            vec![t + 1.0, t * 2.0 + 1.0, t + 10.0]
        })
        .collect();
    let block = MatrixBlock::from_rows(rows).unwrap();

    let group = build_group(&block, &[0, 1, 2], CompressionType::Ddc);
    assert_eq!(group.compression_type(), CompressionType::Ddc);
    let dictionary = group.dictionary().unwrap();
    assert!(dictionary.num_tuples() == 4 || dictionary.num_tuples() == 5);
    assert_eq!(dictionary.num_columns(), 3);

    let mapping = group.mapping().unwrap();
    assert!(matches!(mapping, MapToData::Byte(_)));
    assert_eq!(mapping.len(), 500);
    for r in 0..500 {
        let tuple = dictionary.tuple(mapping.get(r));
        assert_eq!(tuple[0], block.get(r, 0).unwrap());
        assert_eq!(tuple[2], block.get(r, 2).unwrap());
    }
}

#[test]
fn test_ddc_with_zero_rows_appends_zero_tuple() {
    let rows: Vec<Vec<f64>> = (0..500)
        .map(|r| match r % 5 {
            4 => vec![0.0, 0.0, 0.0],
            t => vec![t as f64 + 1.0, t as f64 * 2.0 + 1.0, t as f64 + 10.0],
        })
        .collect();
    let block = MatrixBlock::from_rows(rows).unwrap();

    let group = build_group(&block, &[0, 1, 2], CompressionType::Ddc);
    assert_eq!(group.compression_type(), CompressionType::Ddc);
    let dictionary = group.dictionary().unwrap();
    assert_eq!(dictionary.num_tuples(), 5);
    assert_eq!(dictionary.tuple(4), &[0.0, 0.0, 0.0]);

    let mapping = group.mapping().unwrap();
    assert!(matches!(mapping, MapToData::Byte(_)));
    for r in 0..500 {
        if r % 5 == 4 {
            assert_eq!(mapping.get(r), 4);
        } else {
            assert_ne!(mapping.get(r), 4);
        }
        for c in 0..3 {
            assert_eq!(group.get(r, c), block.get(r, c));
        }
    }
}

#[test]
fn test_zero_matrix_is_empty_groups() {
    let block = MatrixBlock::sparse_from_triplets(300, 3, Vec::new()).unwrap();
    let group = build_group(&block, &[0, 1, 2], CompressionType::Ole);
    assert_eq!(group.compression_type(), CompressionType::Empty);
    assert_eq!(group.num_values(), 0);
    assert!(group.dictionary().is_none());
    for r in 0..300 {
        for c in 0..3 {
            assert_eq!(group.get(r, c), Some(0.0));
        }
    }

    let (matrix, stats) = compress(block.clone(), &single_threaded()).unwrap();
    assert!(matrix.is_compressed());
    assert_eq!(stats.group_types.get(&CompressionType::Empty), Some(&3));
    assert_bit_exact(&matrix, &block);
}

#[test]
fn test_forced_grouping_that_does_not_pay_off_returns_original() {
    let mut rng = StdRng::seed_from_u64(11);
    let values: Vec<f64> = (0..400).map(|_| rng.gen_range(-1e6..1e6)).collect();
    let block = MatrixBlock::dense(400, 1, values).unwrap();
    let grouper = FixedGrouping(vec![ColumnGroupPlan::new(vec![0], CompressionType::Ddc)]);

    let (matrix, stats) = compress_with_grouper(block.clone(), &single_threaded(), &grouper).unwrap();
    assert_eq!(matrix, Matrix::Uncompressed(block));
    assert_eq!(stats.abort, Some(AbortReason::NotBeneficial));
    assert!(!stats.is_compressed());
    assert!(stats.phase_seconds.contains_key(&Phase::Cleanup));
}

#[test]
fn test_failures_name_the_phase() {
    let block = MatrixBlock::dense(10, 2, vec![1.0; 20]).unwrap();
    let grouper = FixedGrouping(vec![ColumnGroupPlan::new(vec![0, 7], CompressionType::Ddc)]);

    match compress_with_grouper(block.clone(), &single_threaded(), &grouper) {
        Err(CompressionError::Phase { phase, .. }) => assert_eq!(phase, Phase::CoCode),
        other => panic!("expected a co-code failure, got {:?}", other),
    }

    let fallback = CompressionSettings::builder()
        .parallelism(1)
        .fallback_on_error(true)
        .build()
        .unwrap();
    let (matrix, stats) = compress_with_grouper(block.clone(), &fallback, &grouper).unwrap();
    assert!(!matrix.is_compressed());
    assert!(matches!(stats.abort, Some(AbortReason::Failed(_))));
}

#[test]
fn test_mixed_matrix_parallel_matches_sequential() {
    let mut rng = StdRng::seed_from_u64(3);
    let rows: Vec<Vec<f64>> = (0..5000)
        .map(|r| {
            vec![
                rng.gen_range(0..3) as f64,
                if rng.gen_bool(0.02) { -0.0 } else { 0.0 },
                if r < 4000 { 1.0 } else { 9.0 },
                rng.gen_range(0.0..1.0),
                if rng.gen_bool(0.5) { f64::NAN } else { 2.0 },
            ]
        })
        .collect();
    let block = MatrixBlock::from_rows(rows).unwrap();

    let parallel = CompressionSettings::builder().parallelism(4).build().unwrap();
    let (a, sa) = compress(block.clone(), &parallel).unwrap();
    let (b, sb) = compress(block.clone(), &single_threaded()).unwrap();
    assert_eq!(sa.compressed_size, sb.compressed_size);
    assert_eq!(sa.group_types, sb.group_types);
    assert_bit_exact(&a, &block);
    assert_bit_exact(&b, &block);

    let Matrix::Compressed(compressed) = a else {
        panic!("mixed matrix should compress");
    };
    let decompressed = compressed.decompress().unwrap();
    for r in 0..block.num_rows() {
        for c in 0..block.num_cols() {
            assert_eq!(
                decompressed.get(r, c).unwrap().to_bits(),
                block.get(r, c).unwrap().to_bits()
            );
        }
    }
}

#[test]
fn test_investigate_estimate_matches_compressed_size() {
    let rows: Vec<Vec<f64>> = (0..3000)
        .map(|r| vec![(r % 7) as f64, if r % 50 == 0 { 1.0 } else { 0.0 }])
        .collect();
    let block = MatrixBlock::from_rows(rows).unwrap();
    let settings = CompressionSettings::builder()
        .parallelism(1)
        .investigate_estimate(true)
        .build()
        .unwrap();
    let (matrix, stats) = compress(block, &settings).unwrap();
    assert!(matrix.is_compressed());
    let estimated = stats.estimated_size.unwrap();
    // Only the matrix header is outside the per-group estimates
    assert_eq!(estimated + cmatrix::matrix::BLOCK_HEADER_SIZE, stats.compressed_size);
}

#[test]
fn test_restricted_encodings_are_respected() {
    let rows: Vec<Vec<f64>> = (0..2000).map(|r| vec![(r / 100) as f64]).collect();
    let block = MatrixBlock::from_rows(rows).unwrap();
    let settings = CompressionSettings::builder()
        .parallelism(1)
        .valid_compressions([CompressionType::Rle, CompressionType::Uncompressed])
        .build()
        .unwrap();
    let (matrix, stats) = compress(block.clone(), &settings).unwrap();
    assert!(matrix.is_compressed());
    assert_eq!(stats.group_types.get(&CompressionType::Rle), Some(&1));
    assert_bit_exact(&matrix, &block);
}
