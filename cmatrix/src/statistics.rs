/*
 * Copyright (c) 2025-present Dawid Pawlik
 *
 * For educational use only by employees and students of MIMUW.
 * See LICENSE file for details.
 */

//! # Compression statistics
//!
//! Every call to [`crate::compress::compress`] returns a
//! [`CompressionStatistics`] next to the resulting matrix, whether the matrix
//! was compressed or handed back unchanged. The struct serializes to JSON so
//! command-line tools can emit it directly.

use crate::CompressionType;
use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Sequential phases of one compression attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Classify,
    CoCode,
    Transpose,
    Compress,
    Cleanup,
}

impl Phase {
    pub const ALL: [Phase; 5] = [
        Phase::Classify,
        Phase::CoCode,
        Phase::Transpose,
        Phase::Compress,
        Phase::Cleanup,
    ];
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Classify => "classify",
            Phase::CoCode => "co-code",
            Phase::Transpose => "transpose",
            Phase::Compress => "compress",
            Phase::Cleanup => "cleanup",
        };
        f.write_str(name)
    }
}

/// Why the original matrix was returned instead of a compressed one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum AbortReason {
    /// No column is worth compressing, or the grouper produced no groups
    NotCompressible,
    /// The compressed size is not smaller than the original size
    NotBeneficial,
    /// A phase failed and `fallback_on_error` was set
    Failed(String),
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::NotCompressible => f.write_str("matrix is not compressible"),
            AbortReason::NotBeneficial => f.write_str("compression is not beneficial"),
            AbortReason::Failed(msg) => write!(f, "compression failed: {}", msg),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompressionStatistics {
    pub original_size: usize,
    /// Size of the compressed matrix; equals `original_size` after an abort
    pub compressed_size: usize,
    /// Sum of the per-group estimates, recorded when `investigate_estimate` is set
    pub estimated_size: Option<usize>,
    pub ratio: f64,
    pub transposed: bool,
    pub num_groups: usize,
    pub group_types: BTreeMap<CompressionType, usize>,
    /// Phase durations in seconds
    pub phase_seconds: BTreeMap<Phase, f64>,
    pub abort: Option<AbortReason>,
}

impl CompressionStatistics {
    pub fn new(original_size: usize) -> Self {
        CompressionStatistics {
            original_size,
            compressed_size: original_size,
            ratio: 1.0,
            ..Default::default()
        }
    }

    pub fn record_phase(&mut self, phase: Phase, elapsed: Duration) {
        *self.phase_seconds.entry(phase).or_default() += elapsed.as_secs_f64();
    }

    pub fn record_group(&mut self, compression: CompressionType) {
        *self.group_types.entry(compression).or_default() += 1;
        self.num_groups += 1;
    }

    /// Set the compressed size and derive the ratio from it
    pub fn set_compressed_size(&mut self, size: usize) {
        self.compressed_size = size;
        self.ratio = if size == 0 {
            f64::INFINITY
        } else {
            self.original_size as f64 / size as f64
        };
    }

    pub fn is_compressed(&self) -> bool {
        self.abort.is_none()
    }

    /// Mark the attempt as aborted; sizes fall back to the original
    pub fn abort(&mut self, reason: AbortReason) {
        self.abort = Some(reason);
        self.compressed_size = self.original_size;
        self.ratio = 1.0;
        self.num_groups = 0;
        self.group_types.clear();
    }

    pub fn total_seconds(&self) -> f64 {
        self.phase_seconds.values().sum()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratio_and_abort() {
        let mut stats = CompressionStatistics::new(8000);
        stats.set_compressed_size(2000);
        stats.record_group(CompressionType::Ddc);
        stats.record_group(CompressionType::Ddc);
        assert_eq!(stats.ratio, 4.0);
        assert_eq!(stats.group_types[&CompressionType::Ddc], 2);
        assert!(stats.is_compressed());

        stats.abort(AbortReason::NotBeneficial);
        assert!(!stats.is_compressed());
        assert_eq!(stats.compressed_size, 8000);
        assert_eq!(stats.num_groups, 0);
    }

    #[test]
    fn test_phase_timing_accumulates() {
        let mut stats = CompressionStatistics::new(10);
        stats.record_phase(Phase::Compress, Duration::from_millis(250));
        stats.record_phase(Phase::Compress, Duration::from_millis(250));
        stats.record_phase(Phase::Classify, Duration::from_millis(500));
        assert!((stats.total_seconds() - 1.0).abs() < 1e-9);
        assert!((stats.phase_seconds[&Phase::Compress] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_json_shape() {
        let mut stats = CompressionStatistics::new(100);
        stats.abort(AbortReason::Failed("boom".to_string()));
        let json = stats.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["abort"]["reason"], "failed");
        assert_eq!(value["abort"]["detail"], "boom");
        let back: CompressionStatistics = serde_json::from_str(&json).unwrap();
        assert_eq!(back, stats);
    }
}
