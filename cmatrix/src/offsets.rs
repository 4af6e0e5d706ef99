/*
 * Copyright (c) 2025-present Dawid Pawlik
 *
 * For educational use only by employees and students of MIMUW.
 * See LICENSE file for details.
 */

//! # Delta-encoded row lists
//!
//! SDC groups store their explicit rows as gaps between consecutive rows.
//! Gaps are written as bytes or 16-bit words, whichever stream is smaller. A
//! gap larger than the word maximum is written as a run of `0` markers, each
//! meaning "advance by the maximum without emitting a row", followed by the
//! remainder. Every [`ANCHOR_INTERVAL`]th entry is anchored with its row and
//! stream position so a lookup only decodes one interval.

use crate::error::CompressionError;
use crate::error::Result;
use serde::Deserialize;
use serde::Serialize;

pub const ANCHOR_INTERVAL: usize = 64;

const OFFSETS_HEADER_SIZE: usize = 32;
const ANCHOR_SIZE: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
enum GapStream {
    Byte(Vec<u8>),
    Char(Vec<u16>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct Anchor {
    row: u32,
    /// Stream position of the gap of the entry after the anchored one
    position: u32,
}

/// Immutable sorted list of row indexes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffsetIndex {
    gaps: GapStream,
    anchors: Vec<Anchor>,
    len: usize,
}

fn stream_len(rows: &[u32], max: u32) -> usize {
    rows.windows(2)
        .map(|w| 1 + ((w[1] - w[0] - 1) / max) as usize)
        .sum()
}

impl OffsetIndex {
    /// Encode a strictly increasing row list
    pub fn from_sorted(rows: &[u32]) -> Self {
        debug_assert!(rows.windows(2).all(|w| w[0] < w[1]));
        let byte_len = stream_len(rows, u8::MAX as u32);
        let char_len = stream_len(rows, u16::MAX as u32) * 2;

        if byte_len <= char_len {
            let mut out = Vec::with_capacity(byte_len);
            let anchors = encode(rows, u8::MAX as u32, &mut out, |v| v as u8);
            OffsetIndex {
                gaps: GapStream::Byte(out),
                anchors,
                len: rows.len(),
            }
        } else {
            let mut out = Vec::with_capacity(char_len / 2);
            let anchors = encode(rows, u16::MAX as u32, &mut out, |v| v as u16);
            OffsetIndex {
                gaps: GapStream::Char(out),
                anchors,
                len: rows.len(),
            }
        }
    }

    /// Size [`OffsetIndex::from_sorted`] would produce for `rows`, without
    /// encoding them
    pub fn size_of_sorted(rows: &[u32]) -> usize {
        let stream = stream_len(rows, u8::MAX as u32).min(stream_len(rows, u16::MAX as u32) * 2);
        OFFSETS_HEADER_SIZE + stream + rows.len().div_ceil(ANCHOR_INTERVAL) * ANCHOR_SIZE
    }

    pub fn in_memory_size(&self) -> usize {
        let stream = match &self.gaps {
            GapStream::Byte(v) => v.len(),
            GapStream::Char(v) => v.len() * 2,
        };
        OFFSETS_HEADER_SIZE + stream + self.anchors.len() * ANCHOR_SIZE
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Width of one gap word in bits
    pub fn gap_width(&self) -> usize {
        match &self.gaps {
            GapStream::Byte(_) => 8,
            GapStream::Char(_) => 16,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        let mut cursor = self.anchors.first().map(|a| Cursor {
            row: a.row,
            position: 0,
        });
        let mut remaining = self.len;
        std::iter::from_fn(move || {
            if remaining == 0 {
                return None;
            }
            let current = cursor.as_mut()?;
            let row = current.row;
            remaining -= 1;
            if remaining > 0 {
                self.advance(current);
            }
            Some(row)
        })
    }

    /// Position of `row` in the list, `None` if the row is not stored
    pub fn ordinal_of(&self, row: u32) -> Option<usize> {
        let anchor_idx = self.anchors.partition_point(|a| a.row <= row).checked_sub(1)?;
        let anchor = self.anchors[anchor_idx];
        let mut ordinal = anchor_idx * ANCHOR_INTERVAL;
        let mut cursor = Cursor {
            row: anchor.row,
            position: anchor.position as usize,
        };
        loop {
            if cursor.row == row {
                return Some(ordinal);
            }
            if cursor.row > row || ordinal + 1 >= self.len {
                return None;
            }
            cursor.position = self.seek_from(cursor.position, &mut cursor.row);
            ordinal += 1;
        }
    }

    /// Decode the whole stream and check it against the anchors and `len`.
    /// Lookups index the stream unchecked, so a deserialized index must pass
    /// this first.
    pub fn validate(&self) -> Result<()> {
        let corrupt = |what: String| CompressionError::Invariant(format!("offset index: {}", what));
        if self.anchors.len() != self.len.div_ceil(ANCHOR_INTERVAL) {
            return Err(corrupt(format!(
                "{} anchors for {} entries",
                self.anchors.len(),
                self.len
            )));
        }
        let Some(first) = self.anchors.first() else {
            if self.stream_len() != 0 {
                return Err(corrupt("gap stream without entries".to_string()));
            }
            return Ok(());
        };

        let mut row = first.row;
        let mut position = 0;
        for i in 0..self.len {
            if i > 0 {
                loop {
                    let (gap, max) = self
                        .word_at(position)
                        .ok_or_else(|| corrupt(format!("gap stream ends before entry {}", i)))?;
                    position += 1;
                    let step = if gap == 0 { max } else { gap };
                    row = row
                        .checked_add(step)
                        .ok_or_else(|| corrupt(format!("entry {} overflows the row range", i)))?;
                    if gap != 0 {
                        break;
                    }
                }
            }
            if i % ANCHOR_INTERVAL == 0 {
                let anchor = self.anchors[i / ANCHOR_INTERVAL];
                if anchor.row != row || anchor.position as usize != position {
                    return Err(corrupt(format!("anchor {} disagrees with the stream", i / ANCHOR_INTERVAL)));
                }
            }
        }
        if position != self.stream_len() {
            return Err(corrupt(format!(
                "{} trailing gap words",
                self.stream_len() - position
            )));
        }
        Ok(())
    }

    fn stream_len(&self) -> usize {
        match &self.gaps {
            GapStream::Byte(v) => v.len(),
            GapStream::Char(v) => v.len(),
        }
    }

    /// Gap word at `position` with the marker step of its stream
    fn word_at(&self, position: usize) -> Option<(u32, u32)> {
        match &self.gaps {
            GapStream::Byte(v) => v.get(position).map(|&g| (g as u32, u8::MAX as u32)),
            GapStream::Char(v) => v.get(position).map(|&g| (g as u32, u16::MAX as u32)),
        }
    }

    fn advance(&self, cursor: &mut Cursor) {
        cursor.position = self.seek_from(cursor.position, &mut cursor.row);
    }

    /// Decode the gap starting at `position`, adding it to `row`
    fn seek_from(&self, mut position: usize, row: &mut u32) -> usize {
        match &self.gaps {
            GapStream::Byte(v) => loop {
                let gap = v[position];
                position += 1;
                if gap == 0 {
                    *row += u8::MAX as u32;
                } else {
                    *row += gap as u32;
                    return position;
                }
            },
            GapStream::Char(v) => loop {
                let gap = v[position];
                position += 1;
                if gap == 0 {
                    *row += u16::MAX as u32;
                } else {
                    *row += gap as u32;
                    return position;
                }
            },
        }
    }
}

struct Cursor {
    row: u32,
    position: usize,
}

fn encode<T>(rows: &[u32], max: u32, out: &mut Vec<T>, word: impl Fn(u32) -> T) -> Vec<Anchor> {
    let mut anchors = Vec::with_capacity(rows.len().div_ceil(ANCHOR_INTERVAL));
    for (i, &row) in rows.iter().enumerate() {
        if i > 0 {
            let mut gap = row - rows[i - 1];
            while gap > max {
                out.push(word(0));
                gap -= max;
            }
            out.push(word(gap));
        }
        if i % ANCHOR_INTERVAL == 0 {
            anchors.push(Anchor {
                row,
                position: out.len() as u32,
            });
        }
    }
    anchors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iter_and_lookup() {
        let sorted: Vec<u32> = (0..500).map(|i| i * 3 + (i % 3)).collect();
        let index = OffsetIndex::from_sorted(&sorted);
        assert_eq!(index.gap_width(), 8);
        assert_eq!(index.iter().collect::<Vec<_>>(), sorted);
        for (ordinal, &row) in sorted.iter().enumerate() {
            assert_eq!(index.ordinal_of(row), Some(ordinal));
        }
        assert_eq!(index.ordinal_of(u32::MAX), None);
        assert_eq!(index.in_memory_size(), OffsetIndex::size_of_sorted(&sorted));
    }

    #[test]
    fn test_large_gaps_use_markers() {
        let rows = vec![3, 300, 301, 70_000, 200_000];
        let index = OffsetIndex::from_sorted(&rows);
        assert_eq!(index.iter().collect::<Vec<_>>(), rows);
        assert_eq!(index.ordinal_of(70_000), Some(3));
        assert_eq!(index.ordinal_of(302), None);
        assert_eq!(index.ordinal_of(0), None);
    }

    #[test]
    fn test_wide_gaps_prefer_char_stream() {
        let rows: Vec<u32> = (0..100).map(|i| i * 60_000).collect();
        let index = OffsetIndex::from_sorted(&rows);
        assert_eq!(index.gap_width(), 16);
        assert_eq!(index.iter().collect::<Vec<_>>(), rows);
        assert_eq!(index.ordinal_of(59 * 60_000), Some(59));
        assert_eq!(index.in_memory_size(), OffsetIndex::size_of_sorted(&rows));
    }

    #[test]
    fn test_validate_accepts_encoded_lists() {
        let lists: [Vec<u32>; 4] = [
            vec![],
            vec![7],
            (0..300).map(|i| i * 5).collect(),
            vec![3, 70_000, 200_000],
        ];
        for rows in lists {
            OffsetIndex::from_sorted(&rows).validate().unwrap();
        }
    }

    #[test]
    fn test_validate_rejects_damaged_streams() {
        let rows: Vec<u32> = (0..130).map(|i| i * 2).collect();
        let index = OffsetIndex::from_sorted(&rows);

        let mut short = index.clone();
        if let GapStream::Byte(v) = &mut short.gaps {
            v.truncate(10);
        }
        assert!(short.validate().is_err());

        let mut moved = index.clone();
        moved.anchors[1].position += 3;
        assert!(moved.validate().is_err());

        let mut missing = index.clone();
        missing.anchors.pop();
        assert!(missing.validate().is_err());

        let mut longer = index;
        longer.len += 1;
        assert!(longer.validate().is_err());

        let overflow = OffsetIndex {
            gaps: GapStream::Char(vec![0, 0, 1]),
            anchors: vec![Anchor {
                row: u32::MAX - 10,
                position: 0,
            }],
            len: 2,
        };
        assert!(overflow.validate().is_err());
    }

    #[test]
    fn test_empty_and_single() {
        let empty = OffsetIndex::from_sorted(&[]);
        assert!(empty.is_empty());
        assert_eq!(empty.iter().count(), 0);
        assert_eq!(empty.ordinal_of(0), None);

        let single = OffsetIndex::from_sorted(&[42]);
        assert_eq!(single.iter().collect::<Vec<_>>(), vec![42]);
        assert_eq!(single.ordinal_of(42), Some(0));
        assert_eq!(single.ordinal_of(43), None);
    }
}
