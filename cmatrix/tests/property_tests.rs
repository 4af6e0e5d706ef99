/*
 * Copyright (c) 2025-present Dawid Pawlik
 *
 * For educational use only by employees and students of MIMUW.
 * See LICENSE file for details.
 */

//! Property tests over random matrices and offset lists

use cmatrix::CompressionSettings;
use cmatrix::CompressionType;
use cmatrix::Matrix;
use cmatrix::MatrixBlock;
use cmatrix::bitmap::Bitmap;
use cmatrix::bitmap::extract_bitmap;
use cmatrix::colgroup::factory;
use cmatrix::compress::compress;
use cmatrix::dictionary::Dictionary;
use cmatrix::matrix::ColumnSource;
use cmatrix::sorter::InsertionSorter;
use proptest::prelude::*;

/// Values drawn from a small pool so tuples repeat; includes the signed zero
/// and NaN, which must survive bit for bit
fn cell() -> impl Strategy<Value = f64> {
    prop_oneof![
        4 => Just(0.0),
        1 => Just(-0.0),
        1 => Just(f64::NAN),
        3 => (1..5).prop_map(|v| v as f64 * 0.5),
        1 => -1e3..1e3f64,
    ]
}

fn block() -> impl Strategy<Value = MatrixBlock> {
    (1usize..80, 1usize..5).prop_flat_map(|(rows, cols)| {
        (
            proptest::collection::vec(cell(), rows * cols),
            any::<bool>(),
        )
            .prop_map(move |(values, sparse)| {
                let block = MatrixBlock::dense(rows, cols, values).unwrap();
                if sparse { block.to_sparse() } else { block }
            })
    })
}

/// Assign every row to one of `k` lists or to none (a zero row); empty lists
/// are dropped
fn offset_lists() -> impl Strategy<Value = (usize, Vec<Vec<u32>>)> {
    (1usize..300, 1usize..6).prop_flat_map(|(rows, k)| {
        proptest::collection::vec(proptest::option::of(0..k), rows).prop_map(move |assign| {
            let mut lists = vec![Vec::new(); k];
            for (row, slot) in assign.iter().enumerate() {
                if let Some(list) = slot {
                    lists[*list].push(row as u32);
                }
            }
            lists.retain(|l| !l.is_empty());
            (rows, lists)
        })
    })
}

fn bits(v: f64) -> u64 {
    v.to_bits()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn compressed_matrix_covers_every_column_once(block in block()) {
        let settings = CompressionSettings::builder().parallelism(1).build().unwrap();
        let (matrix, _) = compress(block.clone(), &settings).unwrap();
        if let Matrix::Compressed(compressed) = &matrix {
            let mut seen = vec![0usize; block.num_cols()];
            for group in compressed.col_groups() {
                for &c in group.col_indices() {
                    seen[c] += 1;
                }
            }
            prop_assert!(seen.iter().all(|&n| n == 1));
        }
        for r in 0..block.num_rows() {
            for c in 0..block.num_cols() {
                prop_assert_eq!(bits(matrix.get(r, c).unwrap()), bits(block.get(r, c).unwrap()));
            }
        }
    }

    #[test]
    fn every_encoding_reconstructs_its_columns(
        block in block(),
        kind in 0usize..CompressionType::REQUESTABLE.len(),
    ) {
        let compression = CompressionType::REQUESTABLE[kind];
        let columns: Vec<usize> = (0..block.num_cols()).collect();
        let settings = CompressionSettings::builder().parallelism(1).build().unwrap();
        let source = ColumnSource::new(&block, false);
        let bitmap = extract_bitmap(&columns, source).unwrap();
        let group = factory::compress(&columns, block.num_rows(), bitmap, compression, &settings, source)
            .unwrap();

        group.validate().unwrap();
        if let (Some(mapping), Some(dictionary)) = (group.mapping(), group.dictionary()) {
            prop_assert!(mapping.iter().all(|i| i < dictionary.num_tuples()));
        }

        let mut dense = vec![0.0; block.num_rows() * block.num_cols()];
        group.decompress_into(&mut dense, block.num_cols());
        for r in 0..block.num_rows() {
            for &c in &columns {
                let expected = bits(block.get(r, c).unwrap());
                prop_assert_eq!(bits(group.get(r, c).unwrap()), expected);
                prop_assert_eq!(bits(dense[r * block.num_cols() + c]), expected);
            }
        }
    }

    #[test]
    fn sorter_output_is_strictly_increasing((rows, lists) in offset_lists()) {
        let sorter = InsertionSorter::for_input(rows, rows);
        let sorted = sorter.insert(&lists).unwrap();
        prop_assert!(sorted.indexes.windows(2).all(|w| w[0] < w[1]));
        prop_assert_eq!(sorted.indexes.len(), lists.iter().map(|l| l.len()).sum::<usize>());
        for (pos, &row) in sorted.indexes.iter().enumerate() {
            prop_assert!(lists[sorted.data.get(pos)].contains(&row));
        }
    }

    #[test]
    fn sorter_excluding_skips_the_largest_list((rows, lists) in offset_lists()) {
        prop_assume!(!lists.is_empty());
        let bitmap = Bitmap::new(1, (1..=lists.len()).map(|v| v as f64).collect(), lists.clone());
        let (largest, largest_size) = bitmap.largest().unwrap();
        let sorted = InsertionSorter::for_input(rows - largest_size, rows)
            .insert_excluding(&lists, largest)
            .unwrap();
        prop_assert_eq!(sorted.indexes.len(), rows - largest_size);
        prop_assert!(sorted.indexes.windows(2).all(|w| w[0] < w[1]));
        prop_assert!(sorted.indexes.iter().all(|r| !lists[largest].contains(r)));
        // Lists after the excluded one shift down; zero rows take the last slot
        for (pos, &row) in sorted.indexes.iter().enumerate() {
            let slot = sorted.data.get(pos);
            match lists.iter().position(|l| l.contains(&row)) {
                Some(list) => prop_assert_eq!(slot, if list > largest { list - 1 } else { list }),
                None => prop_assert_eq!(slot, lists.len() - 1),
            }
        }
    }

    #[test]
    fn moving_the_frequent_tuple_keeps_every_tuple((rows, lists) in offset_lists()) {
        prop_assume!(!lists.is_empty());
        let values: Vec<f64> = (0..lists.len()).map(|v| v as f64 + 1.0).collect();
        let bitmap = Bitmap::new(1, values, lists);
        let (largest, _) = bitmap.largest().unwrap();
        let moved = Dictionary::from_bitmap(&bitmap)
            .move_frequent_to_last(&bitmap, rows, largest)
            .unwrap();

        for i in 0..bitmap.num_values() {
            prop_assert_eq!(moved.dictionary.tuple(moved.remap(i)), bitmap.tuple(i));
        }
        if let Some(zero) = moved.zero_index {
            prop_assert_eq!(moved.dictionary.tuple(zero), &[0.0][..]);
        }
        if moved.moved.is_some() {
            prop_assert_eq!(moved.dictionary.tuple(moved.default_index()), bitmap.tuple(largest));
        }
        let expected = bitmap.num_values() + usize::from(bitmap.num_zeros(rows) > 0);
        prop_assert_eq!(moved.dictionary.num_tuples(), expected);
    }
}
