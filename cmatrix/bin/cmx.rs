/*
 * Copyright (c) 2025-present Dawid Pawlik
 *
 * For educational use only by employees and students of MIMUW.
 * See LICENSE file for details.
 */

//! # cmx
//!
//! Compresses a numeric CSV matrix and reports what the engine did.
//!
//! ## Usage
//!
//! ```bash
//! # Compress with default settings and print a summary
//! cargo run --bin cmx -- data.csv
//!
//! # Use settings from YAML, 8 threads, store the result with LZ4
//! cargo run --bin cmx -- data.csv --config settings.yaml --threads 8 \
//!     --codec lz4 --output data.cmx
//!
//! # Print the statistics as JSON
//! cargo run --bin cmx -- data.csv --json
//! ```

use anyhow::Context;
use anyhow::Result;
use cmatrix::CompressionSettings;
use cmatrix::Matrix;
use cmatrix::MatrixBlock;
use cmatrix::settings::FileCodec;
use std::env;
use std::path::Path;
use std::path::PathBuf;
use tracing::info;
use tracing::warn;
use tracing_subscriber::EnvFilter;

struct Args {
    input: PathBuf,
    config: Option<PathBuf>,
    threads: Option<usize>,
    codec: Option<FileCodec>,
    output: Option<PathBuf>,
    has_header: bool,
    json: bool,
}

fn print_help() {
    println!(
        "cmx - column-group matrix compression\n\n\
         USAGE:\n\
         \tcmx <input.csv> [OPTIONS]\n\n\
         OPTIONS:\n\
         \t-c, --config <FILE>     \tYAML compression settings\n\
         \t-t, --threads <N>       \tParallelism of the compression phases\n\
         \t    --codec <CODEC>     \tBlock codec of the output file: none, zstd, lz4\n\
         \t-o, --output <FILE>     \tWrite the compressed matrix to FILE\n\
         \t    --header            \tSkip the first CSV line\n\
         \t    --json              \tPrint statistics as JSON\n\
         \t-h, --help              \tShow this help message"
    );
}

fn value_of(args: &[String], i: usize, flag: &str) -> Result<String> {
    args.get(i + 1)
        .cloned()
        .with_context(|| format!("{} requires a value", flag))
}

fn parse_args() -> Result<Args> {
    let args: Vec<String> = env::args().collect();
    let mut input = None;
    let mut parsed = Args {
        input: PathBuf::new(),
        config: None,
        threads: None,
        codec: None,
        output: None,
        has_header: false,
        json: false,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                parsed.config = Some(PathBuf::from(value_of(&args, i, "--config")?));
                i += 2;
            }
            "--threads" | "-t" => {
                let value = value_of(&args, i, "--threads")?;
                parsed.threads = Some(
                    value
                        .parse()
                        .with_context(|| format!("invalid thread count '{}'", value))?,
                );
                i += 2;
            }
            "--codec" => {
                parsed.codec = Some(value_of(&args, i, "--codec")?.parse()?);
                i += 2;
            }
            "--output" | "-o" => {
                parsed.output = Some(PathBuf::from(value_of(&args, i, "--output")?));
                i += 2;
            }
            "--header" => {
                parsed.has_header = true;
                i += 1;
            }
            "--json" => {
                parsed.json = true;
                i += 1;
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            other if other.starts_with('-') => anyhow::bail!("Unknown argument: {}", other),
            other => {
                if input.replace(PathBuf::from(other)).is_some() {
                    anyhow::bail!("only one input file may be given");
                }
                i += 1;
            }
        }
    }

    parsed.input = input.context("missing input CSV file (see --help)")?;
    Ok(parsed)
}

/// Read a CSV of numbers into a block; sparse when fewer than half the cells
/// hold a value
fn read_csv(path: &Path, has_header: bool) -> Result<MatrixBlock> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(has_header)
        .from_path(path)
        .with_context(|| format!("Failed to open CSV file {}", path.display()))?;

    let mut rows: Vec<Vec<f64>> = Vec::new();
    for (row_idx, result) in reader.records().enumerate() {
        let record = result.context("Failed to read CSV record")?;
        let row_num = row_idx + 1 + usize::from(has_header);
        let row = record
            .iter()
            .enumerate()
            .map(|(col, field)| {
                let trimmed = field.trim();
                if trimmed.is_empty() {
                    return Ok(0.0);
                }
                trimmed.parse::<f64>().with_context(|| {
                    format!(
                        "Row {}, column {}: failed to parse '{}' as a number",
                        row_num, col, field
                    )
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        rows.push(row);
    }

    let block = MatrixBlock::from_rows(rows)?;
    let cells = block.num_rows() * block.num_cols();
    if cells > 0 && block.non_zeros() * 2 < cells {
        Ok(block.to_sparse())
    } else {
        Ok(block)
    }
}

fn run(args: Args) -> Result<()> {
    let mut settings = match &args.config {
        Some(path) => CompressionSettings::from_yaml_file(path)?,
        None => CompressionSettings::default(),
    };
    if let Some(threads) = args.threads {
        settings.parallelism = threads;
    }
    if let Some(codec) = args.codec {
        settings.file_codec = codec;
    }

    let block = read_csv(&args.input, args.has_header)?;
    info!(
        file = %args.input.display(),
        rows = block.num_rows(),
        cols = block.num_cols(),
        sparse = block.is_sparse(),
        "loaded matrix"
    );

    let (matrix, stats) = cmatrix::compress::compress(block, &settings)?;

    if args.json {
        println!("{}", stats.to_json()?);
    } else {
        println!("=== COMPRESSION ===");
        println!("Input: {}", args.input.display());
        println!("Shape: {} x {}", matrix.num_rows(), matrix.num_cols());
        println!("Original size: {} bytes", stats.original_size);
        match &stats.abort {
            Some(reason) => println!("Kept uncompressed: {}", reason),
            None => {
                println!("Compressed size: {} bytes", stats.compressed_size);
                println!("Ratio: {:.2}", stats.ratio);
                println!("Transposed: {}", stats.transposed);
                println!("Groups: {}", stats.num_groups);
                for (compression, count) in &stats.group_types {
                    println!("  {:<13} {}", compression.to_string(), count);
                }
            }
        }
        if let Some(estimated) = stats.estimated_size {
            println!("Estimated size: {} bytes", estimated);
        }
        for (phase, seconds) in &stats.phase_seconds {
            println!("  {:<10} {:.3}s", phase.to_string(), seconds);
        }
    }

    if let Some(output) = &args.output {
        match &matrix {
            Matrix::Compressed(compressed) => {
                compressed
                    .save_to_file_with_codec(output, settings.file_codec)
                    .with_context(|| format!("failed to write {}", output.display()))?;
                info!(file = %output.display(), codec = ?settings.file_codec, "wrote compressed matrix");
            }
            Matrix::Uncompressed(_) => {
                warn!(file = %output.display(), "matrix was not compressed, nothing written");
            }
        }
    }
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let result = parse_args().and_then(run);
    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
