/*
 * Copyright (c) 2025-present Dawid Pawlik
 *
 * For educational use only by employees and students of MIMUW.
 * See LICENSE file for details.
 */

//! # Compression settings
//!
//! [`CompressionSettings`] is fixed before a compression attempt starts and
//! read by every phase. It can be built in code through
//! [`CompressionSettingsBuilder`] or loaded from YAML:
//!
//! ```yaml
//! parallelism: 4
//! transpose_input: auto
//! valid_compressions: [DDC, SDC, OLE, RLE, UNCOMPRESSED]
//! ole_block_size: 65535
//! fallback_on_error: false
//! file_codec: zstd
//! ```

use crate::CompressionType;
use crate::error::CompressionError;
use crate::error::Result;
use anyhow::Context;
use serde::Deserialize;
use serde::Serialize;
use std::path::Path;
use tracing::warn;

/// Row count above which `TransposeMode::Auto` transposes the input
pub const DEFAULT_TRANSPOSE_ROW_THRESHOLD: usize = 1_000_000;

/// Default rows per OLE block
pub const DEFAULT_OLE_BLOCK_SIZE: usize = 65_535;

/// Smallest OLE block accepted
pub const MIN_OLE_BLOCK_SIZE: usize = 64;

/// Largest OLE block accepted; in-block offsets must fit in 16 bits
pub const MAX_OLE_BLOCK_SIZE: usize = u16::MAX as usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransposeMode {
    /// Transpose for tall matrices or fine-grained groupings
    #[default]
    Auto,
    Always,
    Never,
}

/// Block codec applied to each column-group payload in a `.cmx` file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileCodec {
    None,
    #[default]
    Zstd,
    Lz4,
}

impl std::str::FromStr for FileCodec {
    type Err = CompressionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(FileCodec::None),
            "zstd" => Ok(FileCodec::Zstd),
            "lz4" => Ok(FileCodec::Lz4),
            other => Err(CompressionError::InvalidSettings(format!(
                "unknown file codec '{}'",
                other
            ))),
        }
    }
}

fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionSettings {
    /// Worker threads used by the classify, transpose and compress phases
    pub parallelism: usize,
    pub transpose_input: TransposeMode,
    pub transpose_row_threshold: usize,
    /// Encodings the estimator may pick; the grouper never assigns others
    pub valid_compressions: Vec<CompressionType>,
    /// Reorder bitmap tuples by descending frequency before encoding
    pub sort_values_by_length: bool,
    pub ole_block_size: usize,
    /// Record the summed group estimates in the statistics
    pub investigate_estimate: bool,
    /// Return the original matrix instead of an error when a phase fails
    pub fallback_on_error: bool,
    pub file_codec: FileCodec,
}

impl Default for CompressionSettings {
    fn default() -> Self {
        CompressionSettings {
            parallelism: default_parallelism(),
            transpose_input: TransposeMode::Auto,
            transpose_row_threshold: DEFAULT_TRANSPOSE_ROW_THRESHOLD,
            valid_compressions: CompressionType::REQUESTABLE.to_vec(),
            sort_values_by_length: true,
            ole_block_size: DEFAULT_OLE_BLOCK_SIZE,
            investigate_estimate: false,
            fallback_on_error: false,
            file_codec: FileCodec::default(),
        }
    }
}

impl CompressionSettings {
    pub fn builder() -> CompressionSettingsBuilder {
        CompressionSettingsBuilder::default()
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let settings: CompressionSettings =
            serde_yaml::from_str(yaml).context("Failed to parse compression settings")?;
        Ok(settings.normalized()?)
    }

    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {:?}", path))?;
        Self::from_yaml_str(&yaml)
    }

    /// Clamp tunables into range and reject settings no phase can honor
    pub fn normalized(mut self) -> Result<Self> {
        let block = self
            .ole_block_size
            .clamp(MIN_OLE_BLOCK_SIZE, MAX_OLE_BLOCK_SIZE);
        if block != self.ole_block_size {
            warn!(
                requested = self.ole_block_size,
                using = block,
                "OLE block size out of bounds"
            );
            self.ole_block_size = block;
        }
        if self.parallelism == 0 {
            warn!("parallelism of 0 requested, using 1");
            self.parallelism = 1;
        }
        if self.valid_compressions.is_empty() {
            return Err(CompressionError::InvalidSettings(
                "at least one compression type must be valid".to_string(),
            ));
        }
        if let Some(bad) = self.valid_compressions.iter().find(|c| !c.is_requestable()) {
            return Err(CompressionError::InvalidSettings(format!(
                "{} cannot be requested for a column group",
                bad
            )));
        }
        self.valid_compressions.sort();
        self.valid_compressions.dedup();
        Ok(self)
    }

    pub fn is_valid(&self, compression: CompressionType) -> bool {
        self.valid_compressions.contains(&compression)
    }

    /// Whether the input should be transposed before column extraction
    pub fn should_transpose(&self, num_rows: usize, num_cols: usize, num_groups: usize) -> bool {
        match self.transpose_input {
            TransposeMode::Always => true,
            TransposeMode::Never => false,
            TransposeMode::Auto => {
                num_rows > self.transpose_row_threshold || num_groups > num_cols / 2
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CompressionSettingsBuilder {
    settings: CompressionSettings,
}

impl CompressionSettingsBuilder {
    pub fn parallelism(mut self, k: usize) -> Self {
        self.settings.parallelism = k;
        self
    }

    pub fn transpose_input(mut self, mode: TransposeMode) -> Self {
        self.settings.transpose_input = mode;
        self
    }

    pub fn transpose_row_threshold(mut self, rows: usize) -> Self {
        self.settings.transpose_row_threshold = rows;
        self
    }

    pub fn valid_compressions(mut self, types: impl IntoIterator<Item = CompressionType>) -> Self {
        self.settings.valid_compressions = types.into_iter().collect();
        self
    }

    pub fn sort_values_by_length(mut self, sort: bool) -> Self {
        self.settings.sort_values_by_length = sort;
        self
    }

    pub fn ole_block_size(mut self, rows: usize) -> Self {
        self.settings.ole_block_size = rows;
        self
    }

    pub fn investigate_estimate(mut self, investigate: bool) -> Self {
        self.settings.investigate_estimate = investigate;
        self
    }

    pub fn fallback_on_error(mut self, fallback: bool) -> Self {
        self.settings.fallback_on_error = fallback;
        self
    }

    pub fn file_codec(mut self, codec: FileCodec) -> Self {
        self.settings.file_codec = codec;
        self
    }

    pub fn build(self) -> Result<CompressionSettings> {
        self.settings.normalized()
    }
}
