/*
 * Copyright (c) 2025-present Dawid Pawlik
 *
 * For educational use only by employees and students of MIMUW.
 * See LICENSE file for details.
 */

//! # cmx file inspector
//!
//! Loads a `.cmx` file and prints its header and column groups.

use cmatrix::CompressedMatrix;
use cmatrix::serialization::FileHeader;
use std::env;
use std::process;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() != 2 {
        eprintln!("Usage: {} <file.cmx>", args[0]);
        process::exit(1);
    }

    let file_path = &args[1];

    let header = match FileHeader::read_from_file(file_path) {
        Ok(header) => header,
        Err(e) => {
            eprintln!("✗ Error reading header of '{}': {:#}", file_path, e);
            process::exit(1);
        }
    };

    println!("=== FILE INFORMATION ===");
    println!("File: {}", file_path);
    println!("Version: {}", header.version);
    println!("Codec: {:?}", header.codec);
    println!("Created: {}", header.created_at.to_rfc3339());
    println!("Shape: {} x {}", header.num_rows, header.num_cols);
    println!("Payload: {} bytes", header.payload_size());

    // Full load re-validates every group
    let matrix = match CompressedMatrix::load_from_file(file_path) {
        Ok(matrix) => matrix,
        Err(e) => {
            eprintln!("✗ Error loading file '{}': {:#}", file_path, e);
            process::exit(1);
        }
    };

    println!("\n=== COLUMN GROUPS ===");
    for (meta, group) in header.groups.iter().zip(matrix.col_groups()) {
        let values = group
            .dictionary()
            .map(|d| d.num_tuples().to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:<16} columns {:?}: {} tuples, {} bytes stored, {} bytes in memory",
            meta.variant, meta.columns, values, meta.stored_size, meta.in_memory_size
        );
    }
    println!(
        "\nIn-memory size: {} bytes",
        matrix.estimate_size_in_memory()
    );
    println!("✓ {} groups valid", matrix.col_groups().len());
}
