/*
 * Copyright (c) 2025-present Dawid Pawlik
 *
 * For educational use only by employees and students of MIMUW.
 * See LICENSE file for details.
 */

//! Error types of the compression engine

use crate::CompressionType;
use crate::statistics::Phase;

/// Everything that can go wrong while building a compressed matrix.
///
/// A compression that is merely not beneficial is *not* an error; it is
/// reported through [`crate::statistics::AbortReason`] instead.
#[derive(Debug, thiserror::Error)]
pub enum CompressionError {
    #[error("invalid matrix: {0}")]
    InvalidMatrix(String),

    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error("invalid bitmap for columns {columns:?}: {reason}")]
    InvalidBitmap { columns: Vec<usize>, reason: String },

    #[error("{compression} is not supported for columns {columns:?}: {reason}")]
    Unsupported {
        columns: Vec<usize>,
        compression: CompressionType,
        reason: String,
    },

    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error("invalid column grouping: {0}")]
    InvalidPlan(String),

    #[error("failed to construct {compression} column group over columns {columns:?}")]
    Construction {
        columns: Vec<usize>,
        compression: CompressionType,
        #[source]
        source: Box<CompressionError>,
    },

    #[error("compression failed in the {phase} phase")]
    Phase {
        phase: Phase,
        #[source]
        source: Box<CompressionError>,
    },

    #[error("failed to build compression thread pool")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl CompressionError {
    /// Attach the column group and requested encoding to an encoder failure.
    /// Errors that already carry that information pass through unchanged.
    pub(crate) fn in_construction(self, columns: &[usize], compression: CompressionType) -> Self {
        match self {
            err @ (CompressionError::Construction { .. } | CompressionError::Unsupported { .. }) => err,
            other => CompressionError::Construction {
                columns: columns.to_vec(),
                compression,
                source: Box::new(other),
            },
        }
    }

    pub(crate) fn in_phase(self, phase: Phase) -> Self {
        match self {
            err @ CompressionError::Phase { .. } => err,
            other => CompressionError::Phase {
                phase,
                source: Box::new(other),
            },
        }
    }
}

pub type Result<T, E = CompressionError> = std::result::Result<T, E>;
