/*
 * Copyright (c) 2025-present Dawid Pawlik
 *
 * For educational use only by employees and students of MIMUW.
 * See LICENSE file for details.
 */

//! # Compression driver
//!
//! [`compress`] runs the phases of one compression attempt strictly in order:
//!
//! 1. **Classify**: estimate every column; abort if none is worth compressing
//! 2. **Co-code**: ask the [`ColumnGrouper`] for a grouping and validate it
//! 3. **Transpose**: optionally transpose the input for column-wise scans
//! 4. **Compress**: build all groups, one task per group on a rayon pool
//! 5. **Cleanup**: gather unassigned columns into one uncompressed group and
//!    abort if the result is not smaller than the input
//!
//! An abort is not an error: the original block is handed back as
//! [`Matrix::Uncompressed`] and the statistics name the reason. Phase failures
//! are errors unless `fallback_on_error` is set.

use crate::cocode::ColumnGrouper;
use crate::cocode::SingleColumnGrouper;
use crate::cocode::validate_plan;
use crate::colgroup::ColGroup;
use crate::colgroup::UncompressedGroup;
use crate::colgroup::factory::compress_col_groups;
use crate::error::CompressionError;
use crate::error::Result;
use crate::estimate::CompressedSizeInfo;
use crate::estimate::SizeEstimator;
use crate::matrix::BLOCK_HEADER_SIZE;
use crate::matrix::ColumnSource;
use crate::matrix::MatrixBlock;
use crate::settings::CompressionSettings;
use crate::statistics::AbortReason;
use crate::statistics::CompressionStatistics;
use crate::statistics::Phase;
use rayon::ThreadPool;
use rayon::ThreadPoolBuilder;
use std::time::Instant;
use tracing::debug;
use tracing::info;
use tracing::warn;

/// A matrix stored as column groups that together cover every column once
#[derive(Debug, Clone, PartialEq)]
pub struct CompressedMatrix {
    pub(crate) num_rows: usize,
    pub(crate) num_cols: usize,
    pub(crate) groups: Vec<ColGroup>,
    /// Index into `groups` of the group owning each column
    pub(crate) owner: Vec<usize>,
}

impl CompressedMatrix {
    /// Assemble a matrix from finished groups, checking that every group is
    /// well formed and that the groups cover each column exactly once
    pub fn new(num_rows: usize, num_cols: usize, groups: Vec<ColGroup>) -> Result<Self> {
        let mut owner = vec![usize::MAX; num_cols];
        for (i, group) in groups.iter().enumerate() {
            group.validate()?;
            if group.num_rows() != num_rows {
                return Err(CompressionError::Invariant(format!(
                    "group {} has {} rows, matrix has {}",
                    i,
                    group.num_rows(),
                    num_rows
                )));
            }
            for &c in group.col_indices() {
                match owner.get_mut(c) {
                    Some(slot) if *slot == usize::MAX => *slot = i,
                    Some(slot) => {
                        return Err(CompressionError::Invariant(format!(
                            "column {} is covered by groups {} and {}",
                            c, *slot, i
                        )));
                    }
                    None => {
                        return Err(CompressionError::Invariant(format!(
                            "group {} covers column {} of a {}-column matrix",
                            i, c, num_cols
                        )));
                    }
                }
            }
        }
        if let Some(c) = owner.iter().position(|&o| o == usize::MAX) {
            return Err(CompressionError::Invariant(format!(
                "column {} is not covered by any group",
                c
            )));
        }
        Ok(CompressedMatrix {
            num_rows,
            num_cols,
            groups,
            owner,
        })
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_cols(&self) -> usize {
        self.num_cols
    }

    pub fn col_groups(&self) -> &[ColGroup] {
        &self.groups
    }

    pub fn group_of_column(&self, col: usize) -> Option<&ColGroup> {
        self.owner.get(col).map(|&i| &self.groups[i])
    }

    /// Read one cell through the group owning its column
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.group_of_column(col)?.get(row, col)
    }

    pub fn decompress(&self) -> Result<MatrixBlock> {
        let mut values = vec![0.0; self.num_rows * self.num_cols];
        for group in &self.groups {
            group.decompress_into(&mut values, self.num_cols);
        }
        MatrixBlock::dense(self.num_rows, self.num_cols, values)
    }

    pub fn estimate_size_in_memory(&self) -> usize {
        BLOCK_HEADER_SIZE
            + self
                .groups
                .iter()
                .map(|g| g.estimate_in_memory_size())
                .sum::<usize>()
    }
}

/// Outcome of a compression call
#[derive(Debug, Clone, PartialEq)]
pub enum Matrix {
    Uncompressed(MatrixBlock),
    Compressed(CompressedMatrix),
}

impl Matrix {
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        match self {
            Matrix::Uncompressed(block) => block.get(row, col),
            Matrix::Compressed(matrix) => matrix.get(row, col),
        }
    }

    pub fn num_rows(&self) -> usize {
        match self {
            Matrix::Uncompressed(block) => block.num_rows(),
            Matrix::Compressed(matrix) => matrix.num_rows(),
        }
    }

    pub fn num_cols(&self) -> usize {
        match self {
            Matrix::Uncompressed(block) => block.num_cols(),
            Matrix::Compressed(matrix) => matrix.num_cols(),
        }
    }

    pub fn is_compressed(&self) -> bool {
        matches!(self, Matrix::Compressed(_))
    }

    pub fn estimate_size_in_memory(&self) -> usize {
        match self {
            Matrix::Uncompressed(block) => block.estimate_size_in_memory(),
            Matrix::Compressed(matrix) => matrix.estimate_size_in_memory(),
        }
    }
}

enum Outcome {
    Compressed(CompressedMatrix),
    Aborted(AbortReason),
}

/// Compress with every compressible column in its own group
pub fn compress(
    block: MatrixBlock,
    settings: &CompressionSettings,
) -> Result<(Matrix, CompressionStatistics)> {
    compress_with_grouper(block, settings, &SingleColumnGrouper)
}

pub fn compress_with_grouper(
    block: MatrixBlock,
    settings: &CompressionSettings,
    grouper: &dyn ColumnGrouper,
) -> Result<(Matrix, CompressionStatistics)> {
    let settings = settings.clone().normalized()?;
    let mut stats = CompressionStatistics::new(block.estimate_size_in_memory());
    info!(
        rows = block.num_rows(),
        cols = block.num_cols(),
        sparse = block.is_sparse(),
        size = stats.original_size,
        "compressing matrix"
    );

    match run(&block, &settings, grouper, &mut stats) {
        Ok(Outcome::Compressed(matrix)) => {
            info!(
                groups = stats.num_groups,
                compressed_size = stats.compressed_size,
                ratio = stats.ratio,
                "compression finished"
            );
            Ok((Matrix::Compressed(matrix), stats))
        }
        Ok(Outcome::Aborted(reason)) => {
            info!(%reason, "returning the original matrix");
            stats.abort(reason);
            Ok((Matrix::Uncompressed(block), stats))
        }
        Err(err) if settings.fallback_on_error => {
            warn!(error = %err, "compression failed, returning the original matrix");
            stats.abort(AbortReason::Failed(error_chain(&err)));
            Ok((Matrix::Uncompressed(block), stats))
        }
        Err(err) => Err(err),
    }
}

fn error_chain(err: &CompressionError) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}

fn timed<T>(
    stats: &mut CompressionStatistics,
    phase: Phase,
    f: impl FnOnce() -> Result<T>,
) -> Result<T> {
    let start = Instant::now();
    let result = f().map_err(|e| e.in_phase(phase));
    let elapsed = start.elapsed();
    stats.record_phase(phase, elapsed);
    debug!(%phase, seconds = elapsed.as_secs_f64(), "phase done");
    result
}

fn build_pool(parallelism: usize) -> Result<Option<ThreadPool>> {
    if parallelism <= 1 {
        return Ok(None);
    }
    Ok(Some(ThreadPoolBuilder::new().num_threads(parallelism).build()?))
}

fn run(
    block: &MatrixBlock,
    settings: &CompressionSettings,
    grouper: &dyn ColumnGrouper,
    stats: &mut CompressionStatistics,
) -> Result<Outcome> {
    let (num_rows, num_cols) = (block.num_rows(), block.num_cols());
    let original = ColumnSource::new(block, false);

    let (pool, infos) = timed(stats, Phase::Classify, || {
        let pool = build_pool(settings.parallelism)?;
        let infos = if grouper.requires_estimates() {
            Some(SizeEstimator::new(original, settings).compute_size_infos(pool.as_ref())?)
        } else {
            None
        };
        Ok((pool, infos))
    })?;
    if infos.as_ref().is_some_and(|i| !i.is_compressible()) {
        return Ok(Outcome::Aborted(AbortReason::NotCompressible));
    }
    let infos = infos.unwrap_or(CompressedSizeInfo { infos: Vec::new() });

    let plans = timed(stats, Phase::CoCode, || {
        let plans = grouper.co_code(&infos, settings)?;
        validate_plan(plans, num_cols, settings)
    })?;
    if plans.is_empty() {
        return Ok(Outcome::Aborted(AbortReason::NotCompressible));
    }

    let transposed = settings.should_transpose(num_rows, num_cols, plans.len());
    let transposed_block = timed(stats, Phase::Transpose, || {
        Ok(transposed.then(|| match &pool {
            Some(pool) => pool.install(|| block.transpose(true)),
            None => block.transpose(false),
        }))
    })?;
    stats.transposed = transposed;
    let source = match &transposed_block {
        Some(t) => ColumnSource::new(t, true),
        None => original,
    };

    let mut groups = timed(stats, Phase::Compress, || {
        compress_col_groups(source, &plans, settings, pool.as_ref())
    })?;
    if settings.investigate_estimate {
        let estimator = SizeEstimator::new(source, settings);
        let mut estimated = 0;
        for plan in &plans {
            let info = estimator
                .estimate_group(&plan.columns)
                .map_err(|e| e.in_phase(Phase::Compress))?;
            estimated += info.sizes.get(&plan.compression).copied().unwrap_or(info.best_size);
        }
        stats.estimated_size = Some(estimated);
    }
    drop(transposed_block);

    let matrix = timed(stats, Phase::Cleanup, || {
        let mut assigned = vec![false; num_cols];
        for &c in groups.iter().flat_map(|g| g.col_indices()) {
            assigned[c] = true;
        }
        let leftover: Vec<usize> = (0..num_cols).filter(|&c| !assigned[c]).collect();
        if !leftover.is_empty() {
            warn!(columns = leftover.len(), "storing unassigned columns uncompressed");
            groups.push(ColGroup::Uncompressed(UncompressedGroup::create(leftover, original)?));
        }
        CompressedMatrix::new(num_rows, num_cols, std::mem::take(&mut groups))
    })?;

    let size = matrix.estimate_size_in_memory();
    if size >= stats.original_size {
        info!(
            compressed_size = size,
            original_size = stats.original_size,
            "compressed matrix is not smaller"
        );
        return Ok(Outcome::Aborted(AbortReason::NotBeneficial));
    }

    stats.set_compressed_size(size);
    for group in matrix.col_groups() {
        stats.record_group(group.compression_type());
    }
    debug!(group_types = ?stats.group_types, "group types");
    Ok(Outcome::Compressed(matrix))
}
