/*
 * Copyright (c) 2025-present Dawid Pawlik
 *
 * For educational use only by employees and students of MIMUW.
 * See LICENSE file for details.
 */

//! # `.cmx` files
//!
//! A compressed matrix is stored as:
//!
//! ```text
//! MAGIC (8 bytes) | header size (u32, LE) | header (bincode) | group payloads...
//! ```
//!
//! The header records the shape, the block codec and one [`GroupMeta`] per
//! column group. Each payload is the bincode encoding of one group passed
//! through the codec, so the header alone is enough to list the groups of a
//! file without decoding any of them.
//!
//! ```rust,no_run
//! use cmatrix::MatrixBlock;
//! use cmatrix::CompressedMatrix;
//! use cmatrix::settings::FileCodec;
//!
//! let block = MatrixBlock::dense(4, 1, vec![2.0; 4]).unwrap();
//! let (matrix, _) = cmatrix::compress::compress(block, &Default::default()).unwrap();
//! if let cmatrix::Matrix::Compressed(matrix) = matrix {
//!     matrix.save_to_file_with_codec("matrix.cmx", FileCodec::Lz4).unwrap();
//!     let loaded = CompressedMatrix::load_from_file("matrix.cmx").unwrap();
//!     assert_eq!(loaded.get(3, 0), Some(2.0));
//! }
//! ```

use crate::CompressionType;
use crate::colgroup::ColGroup;
use crate::compress::CompressedMatrix;
use crate::settings::FileCodec;
use anyhow::Context;
use anyhow::Result;
use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use std::fs::File;
use std::io::BufReader;
use std::io::BufWriter;
use std::io::Read;
use std::io::Write;
use std::path::Path;

const MAGIC_BYTES: &[u8; 8] = b"CMXBLK01";
const VERSION: u32 = 1;

/// Metadata of one stored column group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMeta {
    pub compression: CompressionType,
    pub variant: String,
    pub columns: Vec<usize>,
    /// Payload length on disk, after the codec
    pub stored_size: usize,
    pub in_memory_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileHeader {
    pub version: u32,
    pub codec: FileCodec,
    pub num_rows: u64,
    pub num_cols: u64,
    pub created_at: DateTime<Utc>,
    pub groups: Vec<GroupMeta>,
}

impl FileHeader {
    /// Read only the header of a `.cmx` file
    pub fn read_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = BufReader::new(
            File::open(path).with_context(|| format!("failed to open {}", path.display()))?,
        );
        Self::read_from(&mut reader)
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut magic = [0u8; 8];
        reader.read_exact(&mut magic).context("failed to read magic bytes")?;
        if &magic != MAGIC_BYTES {
            anyhow::bail!("Invalid file format: magic bytes mismatch");
        }

        let mut header_size_bytes = [0u8; 4];
        reader.read_exact(&mut header_size_bytes)?;
        let header_size = u32::from_le_bytes(header_size_bytes) as usize;

        let header_bytes = read_exactly(reader, header_size).context("truncated header")?;
        let header: FileHeader = bincode::deserialize(&header_bytes).context("corrupted header")?;

        if header.version != VERSION {
            anyhow::bail!("Unsupported file version: {}", header.version);
        }
        Ok(header)
    }

    /// Total payload bytes following the header
    pub fn payload_size(&self) -> usize {
        self.groups.iter().map(|g| g.stored_size).sum()
    }
}

/// Read `len` bytes without trusting `len` for the allocation
fn read_exactly<R: Read>(reader: &mut R, len: usize) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    reader.take(len as u64).read_to_end(&mut bytes)?;
    if bytes.len() != len {
        anyhow::bail!("expected {} bytes, found {}", len, bytes.len());
    }
    Ok(bytes)
}

fn encode_payload(codec: FileCodec, bytes: Vec<u8>) -> Result<Vec<u8>> {
    Ok(match codec {
        FileCodec::None => bytes,
        FileCodec::Zstd => zstd::encode_all(&bytes[..], 3)?,
        FileCodec::Lz4 => lz4_flex::compress_prepend_size(&bytes),
    })
}

fn decode_payload(codec: FileCodec, bytes: Vec<u8>) -> Result<Vec<u8>> {
    Ok(match codec {
        FileCodec::None => bytes,
        FileCodec::Zstd => zstd::decode_all(&bytes[..])?,
        FileCodec::Lz4 => lz4_flex::decompress_size_prepended(&bytes)
            .map_err(|e| anyhow::anyhow!("LZ4 decompression failed: {}", e))?,
    })
}

impl CompressedMatrix {
    /// Write the matrix to `path` with the default block codec
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.save_to_file_with_codec(path, FileCodec::default())
    }

    pub fn save_to_file_with_codec<P: AsRef<Path>>(&self, path: P, codec: FileCodec) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer, codec)?;
        writer.flush()?;
        Ok(())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = BufReader::new(
            File::open(path).with_context(|| format!("failed to open {}", path.display()))?,
        );
        Self::read_from(&mut reader).with_context(|| format!("failed to load {}", path.display()))
    }

    pub fn write_to<W: Write>(&self, writer: &mut W, codec: FileCodec) -> Result<()> {
        let mut groups = Vec::with_capacity(self.col_groups().len());
        let mut payloads = Vec::with_capacity(self.col_groups().len());
        for group in self.col_groups() {
            let payload = encode_payload(codec, bincode::serialize(group)?)?;
            groups.push(GroupMeta {
                compression: group.compression_type(),
                variant: group.variant_name().to_string(),
                columns: group.col_indices().to_vec(),
                stored_size: payload.len(),
                in_memory_size: group.estimate_in_memory_size(),
            });
            payloads.push(payload);
        }

        let header = FileHeader {
            version: VERSION,
            codec,
            num_rows: self.num_rows() as u64,
            num_cols: self.num_cols() as u64,
            created_at: Utc::now(),
            groups,
        };
        let header_bytes = bincode::serialize(&header)?;
        let header_size = u32::try_from(header_bytes.len()).context("header too large")?;

        writer.write_all(MAGIC_BYTES)?;
        writer.write_all(&header_size.to_le_bytes())?;
        writer.write_all(&header_bytes)?;
        for payload in payloads {
            writer.write_all(&payload)?;
        }
        Ok(())
    }

    /// Read a matrix written by [`CompressedMatrix::write_to`]. Every group is
    /// validated again, as is the column coverage.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let header = FileHeader::read_from(reader)?;
        let covered: usize = header.groups.iter().map(|g| g.columns.len()).sum();
        if covered as u64 != header.num_cols {
            anyhow::bail!(
                "header lists {} group columns for a {}-column matrix",
                covered,
                header.num_cols
            );
        }
        let mut groups = Vec::with_capacity(header.groups.len());
        for (i, meta) in header.groups.iter().enumerate() {
            let payload = read_exactly(reader, meta.stored_size)
                .with_context(|| format!("truncated payload of group {}", i))?;
            let bytes = decode_payload(header.codec, payload)
                .with_context(|| format!("failed to decode group {}", i))?;
            let group: ColGroup = bincode::deserialize(&bytes)
                .with_context(|| format!("corrupted payload of group {}", i))?;
            if group.col_indices() != meta.columns.as_slice() {
                anyhow::bail!("group {} does not match its header entry", i);
            }
            groups.push(group);
        }
        let matrix = CompressedMatrix::new(header.num_rows as usize, header.num_cols as usize, groups)?;
        Ok(matrix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MatrixBlock;
    use crate::Matrix;
    use crate::settings::CompressionSettings;
    use std::io::Cursor;

    fn compressed() -> CompressedMatrix {
        let rows = (0..1000)
            .map(|r| {
                vec![
                    (r % 3) as f64,
                    if r % 97 == 0 { -1.5 } else { 0.0 },
                    4.0,
                    r as f64,
                ]
            })
            .collect();
        let block = MatrixBlock::from_rows(rows).unwrap();
        match crate::compress::compress(block, &CompressionSettings::default()).unwrap().0 {
            Matrix::Compressed(matrix) => matrix,
            Matrix::Uncompressed(_) => panic!("expected the matrix to compress"),
        }
    }

    #[test]
    fn test_every_codec_round_trips() {
        let matrix = compressed();
        for codec in [FileCodec::None, FileCodec::Zstd, FileCodec::Lz4] {
            let mut bytes = Vec::new();
            matrix.write_to(&mut bytes, codec).unwrap();
            let loaded = CompressedMatrix::read_from(&mut Cursor::new(&bytes)).unwrap();
            assert_eq!(loaded, matrix, "{:?}", codec);

            let header = FileHeader::read_from(&mut Cursor::new(&bytes)).unwrap();
            assert_eq!(header.codec, codec);
            assert_eq!(header.groups.len(), matrix.col_groups().len());
            assert_eq!(header.num_rows, 1000);
        }
    }

    #[test]
    fn test_rejects_foreign_and_damaged_files() {
        let matrix = compressed();
        let mut bytes = Vec::new();
        matrix.write_to(&mut bytes, FileCodec::Zstd).unwrap();

        let mut wrong_magic = bytes.clone();
        wrong_magic[0] = b'X';
        let err = CompressedMatrix::read_from(&mut Cursor::new(&wrong_magic)).unwrap_err();
        assert!(err.to_string().contains("magic"));

        let truncated = &bytes[..bytes.len() - 5];
        assert!(CompressedMatrix::read_from(&mut Cursor::new(truncated)).is_err());
    }

    #[test]
    fn test_damaged_group_is_an_error() {
        let group = ColGroup::Ddc(crate::colgroup::DdcGroup {
            columns: vec![0],
            num_rows: 3,
            dictionary: crate::dictionary::Dictionary::new(vec![1.0, 2.0], 1).unwrap(),
            mapping: crate::mapping::MapToData::Bit {
                words: vec![],
                len: 3,
            },
        });
        let matrix = CompressedMatrix {
            num_rows: 3,
            num_cols: 1,
            groups: vec![group],
            owner: vec![0],
        };
        let mut bytes = Vec::new();
        matrix.write_to(&mut bytes, FileCodec::None).unwrap();
        let err = CompressedMatrix::read_from(&mut Cursor::new(&bytes)).unwrap_err();
        assert!(format!("{:#}", err).contains("bit mapping"));
    }

    #[test]
    fn test_oversized_lengths_are_rejected() {
        let matrix = compressed();
        let mut bytes = Vec::new();
        matrix.write_to(&mut bytes, FileCodec::None).unwrap();
        let mut huge = bytes[..12].to_vec();
        huge[8..12].copy_from_slice(&u32::MAX.to_le_bytes());
        let err = CompressedMatrix::read_from(&mut Cursor::new(&huge)).unwrap_err();
        assert!(format!("{:#}", err).contains("truncated header"));
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("matrix.cmx");
        let matrix = compressed();
        matrix.save_to_file(&path).unwrap();
        let loaded = CompressedMatrix::load_from_file(&path).unwrap();
        assert_eq!(loaded.decompress().unwrap(), matrix.decompress().unwrap());
        let header = FileHeader::read_from_file(&path).unwrap();
        assert_eq!(header.codec, FileCodec::Zstd);
    }
}
