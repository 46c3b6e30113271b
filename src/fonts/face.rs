// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE-APACHE file or at:
//     https://www.apache.org/licenses/LICENSE-2.0

//! Parsed font tables

use super::reader::{Reader, TableDirectory, TableRecord, Tag};
use super::{CharMap, GlyphId, ParseError};
use crate::conv::{to_usize, DPU};
use std::collections::HashMap;

/// A parsed TrueType font
///
/// Owns the raw font data along with the decoded tables needed for layout and
/// rastering. Constructed once via [`ParsedFont::parse`] and never mutated;
/// share via `Arc`.
pub struct ParsedFont {
    data: Vec<u8>,
    units_per_em: u16,
    ascender: i16,
    descender: i16,
    line_gap: i16,
    advances: Vec<u16>,
    bearings: Vec<i16>,
    // num_glyphs + 1 entries, relative to `glyf`
    glyph_offsets: Vec<u32>,
    glyf: TableRecord,
    cmap: CharMap,
    kerning: HashMap<u32, i16>,
}

impl std::fmt::Debug for ParsedFont {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("ParsedFont")
            .field("len", &self.data.len())
            .field("units_per_em", &self.units_per_em)
            .field("num_glyphs", &self.num_glyphs())
            .field("kerning_pairs", &self.kerning.len())
            .finish_non_exhaustive()
    }
}

#[inline]
fn kern_key(left: GlyphId, right: GlyphId) -> u32 {
    (u32::from(left.0) << 16) | u32::from(right.0)
}

impl ParsedFont {
    /// Parse a font file
    ///
    /// Required tables: `head`, `hhea`, `maxp`, `hmtx`, `loca`, `glyf` and
    /// `cmap`. A missing `kern` table yields no kerning.
    pub fn parse(data: Vec<u8>) -> Result<Self, ParseError> {
        let dir = TableDirectory::parse(&data)?;

        // head
        let mut head = dir.slice_for_tag(&data, Tag::HEAD)?;
        head.seek(18);
        let units_per_em = head.u16()?;
        if units_per_em == 0 {
            return Err(ParseError::InvalidValue("unitsPerEm is zero"));
        }
        head.seek(50);
        let long_offsets = match head.i16()? {
            0 => false,
            1 => true,
            _ => return Err(ParseError::InvalidValue("indexToLocFormat")),
        };

        // hhea
        let mut hhea = dir.slice_for_tag(&data, Tag::HHEA)?;
        hhea.seek(4);
        let ascender = hhea.i16()?;
        let descender = hhea.i16()?;
        let line_gap = hhea.i16()?;
        hhea.seek(34);
        let num_h_metrics = hhea.u16()?;

        // maxp
        let mut maxp = dir.slice_for_tag(&data, Tag::MAXP)?;
        maxp.seek(4);
        let num_glyphs = maxp.u16()?;

        let (advances, bearings) = read_hmtx(
            dir.slice_for_tag(&data, Tag::HMTX)?,
            num_h_metrics,
            num_glyphs,
        )?;
        let glyph_offsets = read_loca(
            dir.slice_for_tag(&data, Tag::LOCA)?,
            num_glyphs,
            long_offsets,
        )?;

        // glyf is only located here; outlines are read on demand
        let glyf = dir
            .find(Tag::GLYF)
            .ok_or(ParseError::MissingTable(Tag::GLYF))?;
        if glyf.range().end > data.len() {
            return Err(ParseError::UnexpectedEof {
                offset: glyf.range().end,
            });
        }

        let cmap = CharMap::parse(&dir.slice_for_tag(&data, Tag::CMAP)?)?;

        let kerning = match dir.slice_for_tag(&data, Tag::KERN) {
            Ok(kern) => read_kern(kern)?,
            Err(ParseError::MissingTable(_)) => HashMap::new(),
            Err(err) => return Err(err),
        };

        log::debug!(
            "ParsedFont::parse: {num_glyphs} glyphs, {units_per_em} units/em, {} kerning pairs",
            kerning.len()
        );

        Ok(ParsedFont {
            data,
            units_per_em,
            ascender,
            descender,
            line_gap,
            advances,
            bearings,
            glyph_offsets,
            glyf,
            cmap,
            kerning,
        })
    }

    /// The raw font data
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Font units per Em
    #[inline]
    pub fn units_per_em(&self) -> u16 {
        self.units_per_em
    }

    /// Scale factor for a font size in pixels per Em
    #[inline]
    pub fn dpu(&self, dpem: f32) -> DPU {
        DPU::from_dpem(dpem, self.units_per_em)
    }

    /// Ascender, in font units
    #[inline]
    pub fn ascender(&self) -> i16 {
        self.ascender
    }

    /// Descender, in font units (usually negative)
    #[inline]
    pub fn descender(&self) -> i16 {
        self.descender
    }

    /// Line gap, in font units
    #[inline]
    pub fn line_gap(&self) -> i16 {
        self.line_gap
    }

    /// Number of glyphs
    #[inline]
    pub fn num_glyphs(&self) -> u16 {
        self.advances.len() as u16
    }

    /// The character map
    #[inline]
    pub fn cmap(&self) -> &CharMap {
        &self.cmap
    }

    /// Get glyph identifier for a BMP codepoint
    ///
    /// If the codepoint is not mapped, `GlyphId(0)` is returned (the 'missing
    /// glyph' representation).
    #[inline]
    pub fn glyph_index(&self, c: u16) -> GlyphId {
        self.cmap.map(c)
    }

    /// Advance width, in font units
    ///
    /// Out-of-range glyphs have zero advance.
    #[inline]
    pub fn advance(&self, id: GlyphId) -> u16 {
        self.advances.get(usize::from(id.0)).copied().unwrap_or(0)
    }

    /// Left side bearing, in font units
    #[inline]
    pub fn left_side_bearing(&self, id: GlyphId) -> i16 {
        self.bearings.get(usize::from(id.0)).copied().unwrap_or(0)
    }

    /// Legacy (`kern` table) kerning adjustment, in font units
    #[inline]
    pub fn kerning(&self, left: GlyphId, right: GlyphId) -> i16 {
        self.kerning
            .get(&kern_key(left, right))
            .copied()
            .unwrap_or(0)
    }

    /// Iterate over all kerning pairs as `(left, right, adjustment)`
    pub fn kerning_pairs(&self) -> impl Iterator<Item = (GlyphId, GlyphId, i16)> + '_ {
        self.kerning.iter().map(|(key, adj)| {
            let left = GlyphId((key >> 16) as u16);
            let right = GlyphId((key & 0xFFFF) as u16);
            (left, right, *adj)
        })
    }

    /// Byte range of a glyph's outline data within the file
    ///
    /// Empty for glyphs without an outline.
    pub(crate) fn glyph_range(&self, id: GlyphId) -> Result<std::ops::Range<usize>, ParseError> {
        let i = usize::from(id.0);
        if i + 1 >= self.glyph_offsets.len() {
            return Err(ParseError::GlyphOutOfRange(id.0));
        }
        let (start, end) = (self.glyph_offsets[i], self.glyph_offsets[i + 1]);
        if end <= start {
            return Ok(0..0);
        }
        let base = to_usize(self.glyf.offset);
        let (start, end) = (base + to_usize(start), base + to_usize(end));
        if end > self.glyf.range().end {
            return Err(ParseError::UnexpectedEof { offset: end });
        }
        Ok(start..end)
    }

    /// True if the glyph has no outline data (e.g. space)
    pub fn is_empty_glyph(&self, id: GlyphId) -> bool {
        id == GlyphId::NOTDEF || self.glyph_range(id).map(|r| r.is_empty()).unwrap_or(true)
    }
}

/// Read advance widths and left side bearings
///
/// Advances are stored for the first `num_h_metrics` glyphs only; the last
/// advance applies to all remaining glyphs, which store only a bearing.
fn read_hmtx(
    mut r: Reader,
    num_h_metrics: u16,
    num_glyphs: u16,
) -> Result<(Vec<u16>, Vec<i16>), ParseError> {
    if num_h_metrics == 0 && num_glyphs > 0 {
        return Err(ParseError::InvalidValue("numberOfHMetrics is zero"));
    }
    let n = usize::from(num_glyphs);
    let mut advances = Vec::with_capacity(n);
    let mut bearings = Vec::with_capacity(n);
    let mut advance = 0;
    for i in 0..num_glyphs {
        if i < num_h_metrics {
            advance = r.u16()?;
            bearings.push(r.i16()?);
        } else {
            // trailing bearing array is optional in some fonts
            bearings.push(r.i16().unwrap_or(0));
        }
        advances.push(advance);
    }
    Ok((advances, bearings))
}

/// Read glyph locations, normalised to byte offsets
fn read_loca(mut r: Reader, num_glyphs: u16, long: bool) -> Result<Vec<u32>, ParseError> {
    let n = usize::from(num_glyphs) + 1;
    let mut offsets = Vec::with_capacity(n);
    for _ in 0..n {
        let offset = if long {
            r.u32()?
        } else {
            u32::from(r.u16()?) * 2
        };
        offsets.push(offset);
    }
    Ok(offsets)
}

/// Read format-0 pairs from a version-0 `kern` table
///
/// Other subtable formats are skipped, as is the Apple (version 1) layout.
fn read_kern(mut r: Reader) -> Result<HashMap<u32, i16>, ParseError> {
    let mut pairs = HashMap::new();
    let version = r.u16()?;
    if version != 0 {
        log::debug!("read_kern: skipping kern table version {version}");
        return Ok(pairs);
    }
    let num_tables = r.u16()?;
    for _ in 0..num_tables {
        let start = r.position();
        let _sub_version = r.u16()?;
        let length = usize::from(r.u16()?);
        let coverage = r.u16()?;
        let format = coverage >> 8;
        if format != 0 {
            log::debug!("read_kern: skipping subtable format {format}");
        } else {
            let num_pairs = r.u16()?;
            r.skip(6); // searchRange, entrySelector, rangeShift
            pairs.reserve(usize::from(num_pairs));
            for _ in 0..num_pairs {
                let left = GlyphId(r.u16()?);
                let right = GlyphId(r.u16()?);
                let value = r.i16()?;
                pairs.insert(kern_key(left, right), value);
            }
        }
        if length < 6 {
            // The subtable length is unusable; nothing after it can be located
            break;
        }
        r.seek(start + length);
    }
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn be16(values: &[u16]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_be_bytes()).collect()
    }

    #[test]
    fn hmtx_carries_last_advance() {
        // two long metrics, then one bearing-only entry
        let data = be16(&[500, 10, 600, 20, 30]);
        let (adv, lsb) = read_hmtx(Reader::new(&data), 2, 3).unwrap();
        assert_eq!(adv, vec![500, 600, 600]);
        assert_eq!(lsb, vec![10, 20, 30]);
    }

    #[test]
    fn loca_short_and_long() {
        let data = be16(&[0, 50, 120]);
        let offsets = read_loca(Reader::new(&data), 2, false).unwrap();
        assert_eq!(offsets, vec![0, 100, 240]);

        let data = be16(&[0, 0, 0, 100, 0, 240]);
        let offsets = read_loca(Reader::new(&data), 2, true).unwrap();
        assert_eq!(offsets, vec![0, 100, 240]);
    }

    #[test]
    fn kern_format0_and_skipped_format2() {
        let mut data = be16(&[0, 2]);
        // format 2 subtable, skipped by length
        data.extend(be16(&[0, 10, 0x0200, 0xDEAD, 0xBEEF]));
        // format 0 subtable with two pairs
        data.extend(be16(&[0, 26, 0x0001, 2, 0, 0, 0]));
        data.extend(be16(&[3, 4, (-50i16) as u16, 5, 6, 20]));
        let pairs = read_kern(Reader::new(&data)).unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[&kern_key(GlyphId(3), GlyphId(4))], -50);
        assert_eq!(pairs[&kern_key(GlyphId(5), GlyphId(6))], 20);
    }

    #[test]
    fn kern_apple_version_skipped() {
        let data = be16(&[1, 0, 0, 0]);
        assert!(read_kern(Reader::new(&data)).unwrap().is_empty());
    }
}
