/*
 * Copyright (c) 2025-present Dawid Pawlik
 *
 * For educational use only by employees and students of MIMUW.
 * See LICENSE file for details.
 */

//! # cmx-survey
//!
//! Generates synthetic matrices with different value distributions and
//! reports, per dataset, the estimated size of every encoding next to the
//! outcome of a full compression.
//!
//! ```bash
//! cargo run -- --rows 100000 --seed 7
//! cargo run -- --json
//! ```

use anyhow::Context;
use anyhow::Result;
use cmatrix::CompressionSettings;
use cmatrix::CompressionType;
use cmatrix::MatrixBlock;
use cmatrix::estimate::SizeEstimator;
use cmatrix::matrix::ColumnSource;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use std::collections::BTreeMap;
use std::env;
use tracing::debug;
use tracing_subscriber::EnvFilter;

const DEFAULT_ROWS: usize = 20_000;
const DEFAULT_SEED: u64 = 42;
const COLUMNS: usize = 4;

#[derive(Debug, Clone, Copy)]
enum Distribution {
    Constant,
    LowCardinality,
    Skewed,
    Sparse,
    Runs,
    Distinct,
}

impl Distribution {
    const ALL: [Distribution; 6] = [
        Distribution::Constant,
        Distribution::LowCardinality,
        Distribution::Skewed,
        Distribution::Sparse,
        Distribution::Runs,
        Distribution::Distinct,
    ];

    fn name(self) -> &'static str {
        match self {
            Distribution::Constant => "constant",
            Distribution::LowCardinality => "low-cardinality",
            Distribution::Skewed => "skewed",
            Distribution::Sparse => "sparse",
            Distribution::Runs => "runs",
            Distribution::Distinct => "distinct",
        }
    }

    fn generate(self, rows: usize, rng: &mut StdRng) -> Result<MatrixBlock> {
        let mut values = Vec::with_capacity(rows * COLUMNS);
        let mut run_value = 0.0;
        for r in 0..rows {
            if r % 250 == 0 {
                run_value = rng.gen_range(0..8) as f64;
            }
            for c in 0..COLUMNS {
                let value = match self {
                    Distribution::Constant => (c + 1) as f64,
                    Distribution::LowCardinality => rng.gen_range(0..6) as f64 * 1.5,
                    Distribution::Skewed => {
                        if rng.gen_bool(0.9) {
                            3.0
                        } else {
                            rng.gen_range(0..20) as f64
                        }
                    }
                    Distribution::Sparse => {
                        if rng.gen_bool(0.01) {
                            rng.gen_range(1..4) as f64
                        } else {
                            0.0
                        }
                    }
                    Distribution::Runs => run_value + c as f64,
                    Distribution::Distinct => rng.gen_range(-1000.0..1000.0),
                };
                values.push(value);
            }
        }
        let block = MatrixBlock::dense(rows, COLUMNS, values)?;
        Ok(match self {
            Distribution::Sparse => block.to_sparse(),
            _ => block,
        })
    }
}

#[derive(Debug, Serialize)]
struct DatasetReport {
    dataset: String,
    rows: usize,
    columns: usize,
    original_size: usize,
    /// Summed per-column estimates for each encoding
    estimated_sizes: BTreeMap<CompressionType, usize>,
    compressed_size: usize,
    ratio: f64,
    outcome: String,
}

fn survey(distribution: Distribution, rows: usize, rng: &mut StdRng) -> Result<DatasetReport> {
    let block = distribution.generate(rows, rng)?;
    let settings = CompressionSettings::default();

    let estimated_sizes = {
        let estimator = SizeEstimator::new(ColumnSource::new(&block, false), &settings);
        let infos = estimator.compute_size_infos(None)?;
        let mut sizes = BTreeMap::new();
        for info in &infos.infos {
            for (&compression, &size) in &info.sizes {
                *sizes.entry(compression).or_insert(0) += size;
            }
        }
        sizes
    };

    let (_, stats) = cmatrix::compress::compress(block, &settings)?;
    debug!(dataset = distribution.name(), ?stats, "surveyed dataset");

    let outcome = match &stats.abort {
        Some(reason) => reason.to_string(),
        None => stats
            .group_types
            .iter()
            .map(|(compression, count)| format!("{}x{}", count, compression))
            .collect::<Vec<_>>()
            .join(" "),
    };

    Ok(DatasetReport {
        dataset: distribution.name().to_string(),
        rows,
        columns: COLUMNS,
        original_size: stats.original_size,
        estimated_sizes,
        compressed_size: stats.compressed_size,
        ratio: stats.ratio,
        outcome,
    })
}

fn print_table(reports: &[DatasetReport]) {
    println!("cmatrix encoding survey\n");
    for report in reports {
        println!(
            "=== {} ({} x {}) ===",
            report.dataset, report.rows, report.columns
        );
        println!("  original      {:>12} bytes", report.original_size);
        for (compression, size) in &report.estimated_sizes {
            println!("  {:<13} {:>12} bytes", compression.to_string(), size);
        }
        println!(
            "  compressed    {:>12} bytes (ratio {:.2}, {})",
            report.compressed_size, report.ratio, report.outcome
        );
        println!();
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let mut rows = DEFAULT_ROWS;
    let mut seed = DEFAULT_SEED;
    let mut json = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--rows" | "-r" => {
                let value = args.get(i + 1).context("--rows requires a value")?;
                rows = value
                    .parse()
                    .with_context(|| format!("invalid row count '{}'", value))?;
                i += 2;
            }
            "--seed" | "-s" => {
                let value = args.get(i + 1).context("--seed requires a value")?;
                seed = value
                    .parse()
                    .with_context(|| format!("invalid seed '{}'", value))?;
                i += 2;
            }
            "--json" => {
                json = true;
                i += 1;
            }
            "--help" | "-h" => {
                println!(
                    "cmx-survey - encoding sizes over synthetic matrices\n\n\
                     USAGE:\n\
                     \tcmx-survey [OPTIONS]\n\n\
                     OPTIONS:\n\
                     \t-r, --rows <N>    \tRows per dataset (default: {})\n\
                     \t-s, --seed <S>    \tRandom seed (default: {})\n\
                     \t    --json        \tPrint the reports as JSON\n\
                     \t-h, --help        \tShow this help message",
                    DEFAULT_ROWS, DEFAULT_SEED
                );
                return Ok(());
            }
            other => anyhow::bail!("Unknown argument: {}", other),
        }
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let reports = Distribution::ALL
        .iter()
        .map(|&d| survey(d, rows, &mut rng))
        .collect::<Result<Vec<_>>>()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        print_table(&reports);
    }
    Ok(())
}
