// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE-APACHE file or at:
//     https://www.apache.org/licenses/LICENSE-2.0

//! Character-map decoder
//!
//! Only the segmented (format 4) mapping is supported, hence only codepoints
//! within the Basic Multilingual Plane may be mapped.

use super::reader::Reader;
use super::{GlyphId, ParseError};

/// Rank of a (platform, encoding) pair; lower is better
fn encoding_rank(platform: u16, encoding: u16) -> Option<u8> {
    match (platform, encoding) {
        (3, 1) => Some(0), // Windows Unicode BMP
        (0, _) => Some(1), // Unicode
        (1, 0) => Some(2), // Mac Roman
        (3, 0) => Some(3), // Windows symbol
        _ => None,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Segment {
    start: u16,
    end: u16,
    delta: i16,
    range_offset: u16,
}

/// A decoded format-4 character map
#[derive(Clone, Debug, Default)]
pub struct CharMap {
    segments: Vec<Segment>,
    glyph_ids: Vec<u16>,
}

impl CharMap {
    /// Parse the `cmap` table
    ///
    /// Selects the best-ranked format-4 subtable. If no format-4 subtable
    /// exists but some other recognised subtable does, its format is
    /// reported as unsupported.
    pub fn parse(table: &Reader) -> Result<Self, ParseError> {
        let mut r = table.clone();
        let _version = r.u16()?;
        let num_tables = r.u16()?;

        let mut best: Option<(u8, u32)> = None;
        let mut other_format = None;
        for _ in 0..num_tables {
            let platform = r.u16()?;
            let encoding = r.u16()?;
            let offset = r.u32()?;
            let Some(rank) = encoding_rank(platform, encoding) else {
                continue;
            };

            let format = table.sub_reader(offset as usize).u16()?;
            if format != 4 {
                other_format.get_or_insert(format);
                continue;
            }
            // ties resolve to the first seen
            if best.map(|(best_rank, _)| rank < best_rank).unwrap_or(true) {
                best = Some((rank, offset));
            }
        }

        match (best, other_format) {
            (Some((_, offset)), _) => Self::parse_format4(table.sub_reader(offset as usize)),
            (None, Some(format)) => Err(ParseError::UnsupportedCmapFormat(format)),
            (None, None) => Err(ParseError::NoCmapSubtable),
        }
    }

    fn parse_format4(mut r: Reader) -> Result<Self, ParseError> {
        let format = r.u16()?;
        debug_assert_eq!(format, 4);
        let length = usize::from(r.u16()?);
        let _language = r.u16()?;
        let seg_count = usize::from(r.u16()? / 2);
        r.skip(6); // searchRange, entrySelector, rangeShift

        let mut ends = Vec::with_capacity(seg_count);
        for _ in 0..seg_count {
            ends.push(r.u16()?);
        }
        let _reserved_pad = r.u16()?;
        let mut starts = Vec::with_capacity(seg_count);
        for _ in 0..seg_count {
            starts.push(r.u16()?);
        }
        let mut deltas = Vec::with_capacity(seg_count);
        for _ in 0..seg_count {
            deltas.push(r.i16()?);
        }
        let mut range_offsets = Vec::with_capacity(seg_count);
        for _ in 0..seg_count {
            range_offsets.push(r.u16()?);
        }

        // Some fonts declare a length short of the actual glyph array
        let glyph_count = length.saturating_sub(r.position()) / 2;
        let mut glyph_ids = Vec::with_capacity(glyph_count);
        for _ in 0..glyph_count {
            match r.u16() {
                Ok(id) => glyph_ids.push(id),
                Err(_) => break,
            }
        }

        let segments = (0..seg_count)
            .map(|i| Segment {
                start: starts[i],
                end: ends[i],
                delta: deltas[i],
                range_offset: range_offsets[i],
            })
            .collect();
        Ok(CharMap {
            segments,
            glyph_ids,
        })
    }

    /// Number of segments
    #[inline]
    pub fn num_segments(&self) -> usize {
        self.segments.len()
    }

    /// Map a codepoint to a glyph
    ///
    /// Segments are scanned linearly. Unmapped codepoints yield `GlyphId(0)`,
    /// the missing glyph.
    pub fn map(&self, c: u16) -> GlyphId {
        let seg_count = self.segments.len();
        for (i, seg) in self.segments.iter().enumerate() {
            if c < seg.start || c > seg.end {
                continue;
            }

            if seg.range_offset == 0 {
                return GlyphId(c.wrapping_add_signed(seg.delta));
            }

            // range_offset is a byte offset from its own position in the
            // idRangeOffset array; rebase onto the glyph id array
            let index = usize::from(seg.range_offset / 2) + usize::from(c - seg.start);
            let Some(index) = index.checked_sub(seg_count - i) else {
                return GlyphId(0);
            };
            return match self.glyph_ids.get(index) {
                Some(&0) | None => GlyphId(0),
                Some(&id) => GlyphId(id.wrapping_add_signed(seg.delta)),
            };
        }
        GlyphId(0)
    }
}
