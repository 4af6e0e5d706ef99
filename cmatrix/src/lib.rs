/*
 * Copyright (c) 2025-present Dawid Pawlik
 *
 * For educational use only by employees and students of MIMUW.
 * See LICENSE file for details.
 */

//! # cmatrix - A Column-Group Compressed Matrix Library
//!
//! This library stores dense or sparse numeric matrices as a set of
//! column groups, each encoded with the scheme that fits its value
//! distribution best, while keeping every cell exactly reconstructible.
//!
//! ## Pipeline
//!
//! 1. **Bitmap extraction**: distinct value tuples of a column set and the rows
//!    they occur in ([`bitmap`]).
//! 2. **Dictionary / mapping construction**: de-duplicated tuples and the
//!    narrowest per-row index arrays ([`dictionary`], [`mapping`], [`sorter`]).
//! 3. **Encoding**: one immutable [`colgroup::ColGroup`] per column set
//!    (DDC, OLE, RLE, the SDC family, uncompressed, empty, const).
//! 4. **Orchestration**: classify, co-code, transpose, compress, cleanup
//!    ([`compress`]).
//!
//! ```rust,no_run
//! use cmatrix::{CompressionSettings, MatrixBlock};
//! use cmatrix::compress::compress;
//!
//! let block = MatrixBlock::from_rows(vec![vec![1.0, 0.0]; 1000]).unwrap();
//! let (matrix, stats) = compress(block, &CompressionSettings::default()).unwrap();
//! assert_eq!(matrix.get(10, 0), Some(1.0));
//! println!("compression ratio: {:.2}", stats.ratio);
//! ```

use serde::Deserialize;
use serde::Serialize;
use std::fmt;

pub mod bitmap;
pub mod cocode;
pub mod colgroup;
pub mod compress;
pub mod dictionary;
pub mod error;
pub mod estimate;
pub mod mapping;
pub mod matrix;
pub mod offsets;
pub mod readers;
pub mod serialization;
pub mod settings;
pub mod sorter;
pub mod statistics;

pub use colgroup::ColGroup;
pub use compress::CompressedMatrix;
pub use compress::Matrix;
pub use error::CompressionError;
pub use matrix::MatrixBlock;
pub use settings::CompressionSettings;
pub use settings::CompressionSettingsBuilder;
pub use statistics::CompressionStatistics;

/// Encodings a column group can be stored with
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CompressionType {
    /// All cells are zero, nothing is stored
    Empty,
    /// Every row holds the same non-zero tuple
    Const,
    /// Dense dictionary coding
    Ddc,
    /// Offset-list encoding
    Ole,
    /// Run-length encoding
    Rle,
    /// Sparse dictionary coding (all four variants)
    Sdc,
    /// Raw column slice
    Uncompressed,
}

impl CompressionType {
    /// Types a caller can request for a column group. Empty and Const are only
    /// ever chosen by the factory itself.
    pub const REQUESTABLE: [CompressionType; 5] = [
        CompressionType::Ddc,
        CompressionType::Ole,
        CompressionType::Rle,
        CompressionType::Sdc,
        CompressionType::Uncompressed,
    ];

    pub fn is_requestable(self) -> bool {
        Self::REQUESTABLE.contains(&self)
    }
}

impl fmt::Display for CompressionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CompressionType::Empty => "EMPTY",
            CompressionType::Const => "CONST",
            CompressionType::Ddc => "DDC",
            CompressionType::Ole => "OLE",
            CompressionType::Rle => "RLE",
            CompressionType::Sdc => "SDC",
            CompressionType::Uncompressed => "UNCOMPRESSED",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for CompressionType {
    type Err = CompressionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "EMPTY" => Ok(CompressionType::Empty),
            "CONST" => Ok(CompressionType::Const),
            "DDC" => Ok(CompressionType::Ddc),
            "OLE" => Ok(CompressionType::Ole),
            "RLE" => Ok(CompressionType::Rle),
            "SDC" => Ok(CompressionType::Sdc),
            "UNCOMPRESSED" => Ok(CompressionType::Uncompressed),
            other => Err(CompressionError::InvalidSettings(format!(
                "unknown compression type '{}'",
                other
            ))),
        }
    }
}

/// A value counts as zero only when it is `+0.0`, so `-0.0` survives a round trip.
#[inline]
pub(crate) fn is_zero(value: f64) -> bool {
    value.to_bits() == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compression_type_parsing() {
        assert_eq!("ddc".parse::<CompressionType>().unwrap(), CompressionType::Ddc);
        assert_eq!(
            "Uncompressed".parse::<CompressionType>().unwrap(),
            CompressionType::Uncompressed
        );
        assert!("lz77".parse::<CompressionType>().is_err());
        assert_eq!(CompressionType::Sdc.to_string(), "SDC");
    }

    #[test]
    fn test_negative_zero_is_a_value() {
        assert!(is_zero(0.0));
        assert!(!is_zero(-0.0));
        assert!(!is_zero(f64::NAN));
    }
}
