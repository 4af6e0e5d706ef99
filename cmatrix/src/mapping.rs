/*
 * Copyright (c) 2025-present Dawid Pawlik
 *
 * For educational use only by employees and students of MIMUW.
 * See LICENSE file for details.
 */

//! # Row to dictionary mappings
//!
//! [`MapToData`] stores one dictionary index per entry in the narrowest
//! fixed-width integer array that can address the dictionary:
//!
//! | tuples       | width  |
//! |--------------|--------|
//! | `<= 1`       | 1 bit  |
//! | `<= 256`     | 8 bit  |
//! | `<= 65535`   | 16 bit |
//! | otherwise    | 32 bit |

use crate::error::CompressionError;
use crate::error::Result;
use serde::Deserialize;
use serde::Serialize;

const MAPPING_HEADER_SIZE: usize = 24;

/// Fixed-width array of dictionary indexes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MapToData {
    Bit { words: Vec<u64>, len: usize },
    Byte(Vec<u8>),
    Char(Vec<u16>),
    Int(Vec<u32>),
}

impl MapToData {
    /// Allocate a zero-filled mapping of `size` entries able to address
    /// `num_tuples` dictionary entries
    pub fn create(size: usize, num_tuples: usize) -> Self {
        if num_tuples <= 1 {
            MapToData::Bit {
                words: vec![0; size.div_ceil(64)],
                len: size,
            }
        } else if num_tuples <= 256 {
            MapToData::Byte(vec![0; size])
        } else if num_tuples <= u16::MAX as usize {
            MapToData::Char(vec![0; size])
        } else {
            MapToData::Int(vec![0; size])
        }
    }

    /// Size a mapping created by [`MapToData::create`] would occupy
    pub fn estimate_in_memory_size(size: usize, num_tuples: usize) -> usize {
        let data = if num_tuples <= 1 {
            size.div_ceil(64) * 8
        } else if num_tuples <= 256 {
            size
        } else if num_tuples <= u16::MAX as usize {
            size * 2
        } else {
            size * 4
        };
        MAPPING_HEADER_SIZE + data
    }

    pub fn in_memory_size(&self) -> usize {
        let data = match self {
            MapToData::Bit { words, .. } => words.len() * 8,
            MapToData::Byte(v) => v.len(),
            MapToData::Char(v) => v.len() * 2,
            MapToData::Int(v) => v.len() * 4,
        };
        MAPPING_HEADER_SIZE + data
    }

    pub fn len(&self) -> usize {
        match self {
            MapToData::Bit { len, .. } => *len,
            MapToData::Byte(v) => v.len(),
            MapToData::Char(v) => v.len(),
            MapToData::Int(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Largest index the chosen width can hold
    pub fn max_storable(&self) -> usize {
        match self {
            MapToData::Bit { .. } => 1,
            MapToData::Byte(_) => u8::MAX as usize,
            MapToData::Char(_) => u16::MAX as usize,
            MapToData::Int(_) => u32::MAX as usize,
        }
    }

    pub fn width_bits(&self) -> usize {
        match self {
            MapToData::Bit { .. } => 1,
            MapToData::Byte(_) => 8,
            MapToData::Char(_) => 16,
            MapToData::Int(_) => 32,
        }
    }

    #[inline]
    pub fn get(&self, i: usize) -> usize {
        match self {
            MapToData::Bit { words, .. } => ((words[i / 64] >> (i % 64)) & 1) as usize,
            MapToData::Byte(v) => v[i] as usize,
            MapToData::Char(v) => v[i] as usize,
            MapToData::Int(v) => v[i] as usize,
        }
    }

    #[inline]
    pub fn set(&mut self, i: usize, value: usize) {
        debug_assert!(value <= self.max_storable());
        match self {
            MapToData::Bit { words, .. } => {
                let mask = 1u64 << (i % 64);
                if value & 1 == 1 {
                    words[i / 64] |= mask;
                } else {
                    words[i / 64] &= !mask;
                }
            }
            MapToData::Byte(v) => v[i] = value as u8,
            MapToData::Char(v) => v[i] = value as u16,
            MapToData::Int(v) => v[i] = value as u32,
        }
    }

    pub fn fill(&mut self, value: usize) {
        debug_assert!(value <= self.max_storable());
        match self {
            MapToData::Bit { words, len } => {
                let word = if value & 1 == 1 { u64::MAX } else { 0 };
                words.fill(word);
                // Keep the bits past `len` clear
                if value & 1 == 1 && *len % 64 != 0 {
                    if let Some(last) = words.last_mut() {
                        *last = (1u64 << (*len % 64)) - 1;
                    }
                }
            }
            MapToData::Byte(v) => v.fill(value as u8),
            MapToData::Char(v) => v.fill(value as u16),
            MapToData::Int(v) => v.fill(value as u32),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len()).map(move |i| self.get(i))
    }

    /// Largest stored index, `None` for an empty mapping
    pub fn max_index(&self) -> Option<usize> {
        self.iter().max()
    }

    /// Check that the bit words cover exactly `len` entries
    pub fn validate(&self) -> Result<()> {
        if let MapToData::Bit { words, len } = self {
            if words.len() != len.div_ceil(64) {
                return Err(CompressionError::Invariant(format!(
                    "bit mapping of {} entries holds {} words",
                    len,
                    words.len()
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_width_selection() {
        assert_eq!(MapToData::create(10, 1).width_bits(), 1);
        assert_eq!(MapToData::create(10, 2).width_bits(), 8);
        assert_eq!(MapToData::create(10, 256).width_bits(), 8);
        assert_eq!(MapToData::create(10, 257).width_bits(), 16);
        assert_eq!(MapToData::create(10, 65535).width_bits(), 16);
        assert_eq!(MapToData::create(10, 65536).width_bits(), 32);
    }

    #[test]
    fn test_estimate_matches_actual() {
        for tuples in [1, 4, 300, 70_000] {
            let map = MapToData::create(1000, tuples);
            assert_eq!(
                map.in_memory_size(),
                MapToData::estimate_in_memory_size(1000, tuples)
            );
        }
    }

    #[test]
    fn test_set_get_fill() {
        for tuples in [1, 200, 1000, 100_000] {
            let mut map = MapToData::create(130, tuples);
            let top = map.max_storable().min(tuples);
            map.fill(top);
            assert!(map.iter().all(|v| v == top));
            map.set(129, 0);
            map.set(64, 0);
            assert_eq!(map.get(129), 0);
            assert_eq!(map.get(64), 0);
            assert_eq!(map.get(128), top);
            assert_eq!(map.len(), 130);
        }
    }

    #[test]
    fn test_bit_fill_leaves_tail_clear() {
        let mut map = MapToData::create(70, 1);
        map.fill(1);
        if let MapToData::Bit { words, .. } = &map {
            assert_eq!(words[1], (1u64 << 6) - 1);
        }
        assert_eq!(map.max_index(), Some(1));
    }

    #[test]
    fn test_validate_bit_word_count() {
        assert!(MapToData::create(130, 1).validate().is_ok());
        assert!(MapToData::create(130, 300).validate().is_ok());
        let short = MapToData::Bit {
            words: vec![0],
            len: 130,
        };
        assert!(short.validate().is_err());
        let missing = MapToData::Bit {
            words: vec![],
            len: 3,
        };
        assert!(missing.validate().is_err());
    }
}
