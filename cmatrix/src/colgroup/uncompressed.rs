/*
 * Copyright (c) 2025-present Dawid Pawlik
 *
 * For educational use only by employees and students of MIMUW.
 * See LICENSE file for details.
 */

//! Raw column slices, kept in the cheaper of the dense and sparse layouts

use super::base_size;
use crate::error::CompressionError;
use crate::error::Result;
use crate::matrix::ColumnSource;
use crate::matrix::MatrixBlock;
use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UncompressedGroup {
    pub(crate) columns: Vec<usize>,
    pub(crate) num_rows: usize,
    /// `num_rows x columns.len()` copy of the columns
    pub(crate) data: MatrixBlock,
}

impl UncompressedGroup {
    pub fn create(columns: Vec<usize>, source: ColumnSource<'_>) -> Result<Self> {
        let data = source.block.select_columns(&columns, source.transposed)?;
        Ok(UncompressedGroup {
            num_rows: data.num_rows(),
            columns,
            data,
        })
    }

    pub fn estimate_size(num_rows: usize, num_columns: usize, non_zeros: usize) -> usize {
        base_size(num_columns) + MatrixBlock::estimate_size(num_rows, num_columns, non_zeros)
    }

    pub fn data(&self) -> &MatrixBlock {
        &self.data
    }

    pub(crate) fn value_at(&self, row: usize, pos: usize) -> f64 {
        self.data.get(row, pos).unwrap_or(0.0)
    }

    pub(crate) fn decompress_into(&self, dense: &mut [f64], num_cols: usize) {
        let source = ColumnSource::new(&self.data, false);
        for (pos, &col) in self.columns.iter().enumerate() {
            source.for_each_in_column(pos, |row, value| dense[row * num_cols + col] = value);
        }
    }

    pub(crate) fn in_memory_size(&self) -> usize {
        base_size(self.columns.len()) + self.data.estimate_size_in_memory()
    }

    pub(crate) fn validate(&self) -> Result<()> {
        self.data.validate()?;
        if self.data.num_rows() != self.num_rows || self.data.num_cols() != self.columns.len() {
            return Err(CompressionError::Invariant(format!(
                "uncompressed data is {}x{}, group is {}x{}",
                self.data.num_rows(),
                self.data.num_cols(),
                self.num_rows,
                self.columns.len()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_from_transposed_source() {
        let block = MatrixBlock::from_rows(vec![
            vec![1.0, 0.0, 2.0],
            vec![0.0, -0.0, 3.0],
        ])
        .unwrap();
        let t = block.transpose(false);
        let group = UncompressedGroup::create(vec![1, 2], ColumnSource::new(&t, true)).unwrap();
        assert_eq!(group.num_rows, 2);
        assert_eq!(group.value_at(1, 0).to_bits(), (-0.0f64).to_bits());
        assert_eq!(group.value_at(1, 1), 3.0);

        let mut dense = vec![0.0; 6];
        group.decompress_into(&mut dense, 3);
        assert_eq!(dense, vec![0.0, 0.0, 2.0, 0.0, -0.0, 3.0]);
        assert_eq!(
            group.in_memory_size(),
            UncompressedGroup::estimate_size(2, 2, group.data.non_zeros())
        );
    }
}
