// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE-APACHE file or at:
//     https://www.apache.org/licenses/LICENSE-2.0

//! Synthetic TrueType fonts for tests

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};

/// Outline data of one glyph
#[derive(Clone, Debug)]
pub enum GlyphData {
    /// No outline
    Empty,
    /// Contours of `(x, y, on_curve)` points
    Simple(Vec<Vec<(i16, i16, bool)>>),
    /// Raw composite glyph data, including the glyph header
    Raw(Vec<u8>),
}

#[derive(Clone, Debug)]
struct Glyph {
    data: GlyphData,
    advance: u16,
    lsb: i16,
}

/// Assembles a minimal TrueType font
#[derive(Clone, Debug)]
pub struct FontBuilder {
    pub units_per_em: u16,
    pub ascender: i16,
    pub descender: i16,
    pub line_gap: i16,
    glyphs: Vec<Glyph>,
    mappings: Vec<(u16, u16)>,
    kerning: Vec<(u16, u16, i16)>,
}

impl Default for FontBuilder {
    fn default() -> Self {
        FontBuilder::new()
    }
}

fn put_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn put_i16(out: &mut Vec<u8>, v: i16) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}

impl FontBuilder {
    /// A font with only the missing glyph
    pub fn new() -> Self {
        FontBuilder {
            units_per_em: 1000,
            ascender: 800,
            descender: -200,
            line_gap: 100,
            glyphs: vec![Glyph {
                data: GlyphData::Empty,
                advance: 500,
                lsb: 0,
            }],
            mappings: vec![],
            kerning: vec![],
        }
    }

    /// Add a glyph, returning its index
    pub fn glyph(&mut self, data: GlyphData, advance: u16) -> u16 {
        self.glyphs.push(Glyph {
            data,
            advance,
            lsb: 0,
        });
        (self.glyphs.len() - 1) as u16
    }

    /// Map a codepoint to a glyph
    pub fn map(&mut self, c: char, glyph: u16) -> &mut Self {
        self.mappings.push((c as u32 as u16, glyph));
        self
    }

    /// Add a kerning pair between glyphs
    pub fn kern(&mut self, left: u16, right: u16, value: i16) -> &mut Self {
        self.kerning.push((left, right, value));
        self
    }

    /// Encode as a font file
    pub fn build(&self) -> Vec<u8> {
        let mut glyf = Vec::new();
        let mut loca = Vec::new();
        let mut hmtx = Vec::new();
        for glyph in &self.glyphs {
            put_u32(&mut loca, glyf.len() as u32);
            match &glyph.data {
                GlyphData::Empty => (),
                GlyphData::Simple(contours) => encode_simple(&mut glyf, contours),
                GlyphData::Raw(bytes) => glyf.extend_from_slice(bytes),
            }
            if glyf.len() % 2 == 1 {
                glyf.push(0);
            }
            put_u16(&mut hmtx, glyph.advance);
            put_i16(&mut hmtx, glyph.lsb);
        }
        put_u32(&mut loca, glyf.len() as u32);

        let num_glyphs = self.glyphs.len() as u16;
        let mut tables: Vec<(&[u8; 4], Vec<u8>)> = vec![
            (b"head", self.head()),
            (b"hhea", self.hhea(num_glyphs)),
            (b"maxp", maxp(num_glyphs)),
            (b"hmtx", hmtx),
            (b"loca", loca),
            (b"glyf", glyf),
            (b"cmap", self.cmap()),
        ];
        if !self.kerning.is_empty() {
            tables.push((b"kern", self.kern_table()));
        }
        directory(&tables)
    }

    fn head(&self) -> Vec<u8> {
        let mut out = Vec::new();
        put_u32(&mut out, 0x0001_0000); // version
        put_u32(&mut out, 0x0001_0000); // fontRevision
        put_u32(&mut out, 0); // checksumAdjustment
        put_u32(&mut out, 0x5F0F_3CF5); // magicNumber
        put_u16(&mut out, 0); // flags
        put_u16(&mut out, self.units_per_em);
        out.extend_from_slice(&[0; 16]); // created, modified
        out.extend_from_slice(&[0; 8]); // bounding box
        put_u16(&mut out, 0); // macStyle
        put_u16(&mut out, 8); // lowestRecPPEM
        put_i16(&mut out, 2); // fontDirectionHint
        put_i16(&mut out, 1); // indexToLocFormat: long
        put_i16(&mut out, 0); // glyphDataFormat
        out
    }

    fn hhea(&self, num_glyphs: u16) -> Vec<u8> {
        let mut out = Vec::new();
        put_u32(&mut out, 0x0001_0000);
        put_i16(&mut out, self.ascender);
        put_i16(&mut out, self.descender);
        put_i16(&mut out, self.line_gap);
        out.extend_from_slice(&[0; 24]);
        put_u16(&mut out, num_glyphs); // numberOfHMetrics
        out
    }

    fn cmap(&self) -> Vec<u8> {
        let mut segments = self.mappings.clone();
        segments.sort_unstable();
        segments.dedup_by_key(|(c, _)| *c);
        segments.push((0xFFFF, 0));
        let seg_count = segments.len() as u16;

        let mut out = Vec::new();
        put_u16(&mut out, 0); // version
        put_u16(&mut out, 1); // numTables
        put_u16(&mut out, 3); // Windows
        put_u16(&mut out, 1); // Unicode BMP
        put_u32(&mut out, 12);

        put_u16(&mut out, 4); // format
        put_u16(&mut out, 16 + 8 * seg_count); // length
        put_u16(&mut out, 0); // language
        put_u16(&mut out, 2 * seg_count);
        out.extend_from_slice(&[0; 6]); // searchRange, entrySelector, rangeShift
        for (c, _) in &segments {
            put_u16(&mut out, *c);
        }
        put_u16(&mut out, 0); // reservedPad
        for (c, _) in &segments {
            put_u16(&mut out, *c);
        }
        for (c, glyph) in &segments {
            let delta = if *c == 0xFFFF { 1 } else { glyph.wrapping_sub(*c) };
            put_u16(&mut out, delta);
        }
        for _ in &segments {
            put_u16(&mut out, 0); // idRangeOffset
        }
        out
    }

    fn kern_table(&self) -> Vec<u8> {
        let n = self.kerning.len() as u16;
        let mut out = Vec::new();
        put_u16(&mut out, 0); // version
        put_u16(&mut out, 1); // nTables
        put_u16(&mut out, 0); // subtable version
        put_u16(&mut out, 14 + 6 * n); // length
        put_u16(&mut out, 0x0001); // coverage: horizontal, format 0
        put_u16(&mut out, n);
        out.extend_from_slice(&[0; 6]);
        for (left, right, value) in &self.kerning {
            put_u16(&mut out, *left);
            put_u16(&mut out, *right);
            put_i16(&mut out, *value);
        }
        out
    }
}

fn maxp(num_glyphs: u16) -> Vec<u8> {
    let mut out = Vec::new();
    put_u32(&mut out, 0x0000_5000);
    put_u16(&mut out, num_glyphs);
    out
}

fn encode_simple(out: &mut Vec<u8>, contours: &[Vec<(i16, i16, bool)>]) {
    let points = contours.iter().flatten();
    let x_min = points.clone().map(|p| p.0).min().unwrap_or(0);
    let y_min = points.clone().map(|p| p.1).min().unwrap_or(0);
    let x_max = points.clone().map(|p| p.0).max().unwrap_or(0);
    let y_max = points.clone().map(|p| p.1).max().unwrap_or(0);

    put_i16(out, contours.len() as i16);
    for v in [x_min, y_min, x_max, y_max] {
        put_i16(out, v);
    }
    let mut end = 0;
    for contour in contours {
        end += contour.len() as u16;
        put_u16(out, end - 1);
    }
    put_u16(out, 0); // instructionLength

    // Every point: explicit flag, two-byte deltas
    for (_, _, on_curve) in points.clone() {
        out.push(u8::from(*on_curve));
    }
    let mut prev = 0;
    for (x, _, _) in points.clone() {
        put_i16(out, x - prev);
        prev = *x;
    }
    prev = 0;
    for (_, y, _) in points {
        put_i16(out, y - prev);
        prev = *y;
    }
}

/// Wrap tables with an sfnt header and table directory
fn directory(tables: &[(&[u8; 4], Vec<u8>)]) -> Vec<u8> {
    let header_len = 12 + 16 * tables.len();
    let mut out = Vec::new();
    put_u32(&mut out, 0x0001_0000);
    put_u16(&mut out, tables.len() as u16);
    out.extend_from_slice(&[0; 6]);

    let mut offset = header_len;
    for (tag, data) in tables {
        out.extend_from_slice(*tag);
        put_u32(&mut out, 0); // checksum
        put_u32(&mut out, offset as u32);
        put_u32(&mut out, data.len() as u32);
        offset += data.len().next_multiple_of(4);
    }
    for (_, data) in tables {
        out.extend_from_slice(data);
        out.resize(out.len().next_multiple_of(4), 0);
    }
    out
}

/// A closed rectangle with corners at `(x0, y0)` and `(x1, y1)`
pub fn rect(x0: i16, y0: i16, x1: i16, y1: i16) -> GlyphData {
    GlyphData::Simple(vec![vec![
        (x0, y0, true),
        (x0, y1, true),
        (x1, y1, true),
        (x1, y0, true),
    ]])
}

/// Component flag: arguments are 16-bit
pub const ARGS_ARE_WORDS: u16 = 0x0001;
/// Component flag: arguments are an offset, not point indices
pub const ARGS_ARE_XY_VALUES: u16 = 0x0002;
/// Component flag: one F2Dot14 scale follows the arguments
pub const HAVE_SCALE: u16 = 0x0008;
/// Component flag: separate x and y scales follow
pub const HAVE_XY_SCALE: u16 = 0x0040;
/// Component flag: a 2×2 matrix follows
pub const HAVE_TWO_BY_TWO: u16 = 0x0080;
/// Component flag: the offset is transformed along with the component
pub const SCALED_COMPONENT_OFFSET: u16 = 0x0800;
const MORE_COMPONENTS: u16 = 0x0020;

/// One component of a composite glyph
///
/// `args` are written as 16-bit values if `flags` has [`ARGS_ARE_WORDS`],
/// otherwise as bytes. `transform` holds the raw F2Dot14 words matching
/// the transform flag, if any.
#[derive(Clone, Debug)]
pub struct Component {
    pub flags: u16,
    pub glyph: u16,
    pub args: (i16, i16),
    pub transform: Vec<i16>,
}

impl Component {
    /// Component offset by `(dx, dy)`
    pub fn offset(glyph: u16, dx: i16, dy: i16) -> Self {
        Component {
            flags: ARGS_ARE_WORDS | ARGS_ARE_XY_VALUES,
            glyph,
            args: (dx, dy),
            transform: vec![],
        }
    }

    /// Component whose point `child` is placed on point `parent` of the
    /// components before it
    pub fn anchored(glyph: u16, parent: u8, child: u8) -> Self {
        Component {
            flags: 0,
            glyph,
            args: (parent.into(), child.into()),
            transform: vec![],
        }
    }

    /// Add flags and transform words
    pub fn with_transform(mut self, flags: u16, words: &[f32]) -> Self {
        self.flags |= flags;
        self.transform = words.iter().map(|v| f2dot14(*v)).collect();
        self
    }
}

/// Encode a value as F2Dot14
pub fn f2dot14(v: f32) -> i16 {
    (v * 16384.0).round() as i16
}

/// A composite glyph from components, in order
pub fn composite_of(components: &[Component]) -> GlyphData {
    let mut out = Vec::new();
    put_i16(&mut out, -1);
    out.extend_from_slice(&[0; 8]);
    for (i, component) in components.iter().enumerate() {
        let mut flags = component.flags;
        if i + 1 < components.len() {
            flags |= MORE_COMPONENTS;
        }
        put_u16(&mut out, flags);
        put_u16(&mut out, component.glyph);
        let (a, b) = component.args;
        if flags & ARGS_ARE_WORDS != 0 {
            put_i16(&mut out, a);
            put_i16(&mut out, b);
        } else {
            out.push(a as u8);
            out.push(b as u8);
        }
        for word in &component.transform {
            put_i16(&mut out, *word);
        }
    }
    GlyphData::Raw(out)
}

/// A composite glyph with one component offset by `(dx, dy)`
pub fn composite(child: u16, dx: i16, dy: i16) -> GlyphData {
    composite_of(&[Component::offset(child, dx, dy)])
}

/// Advance of glyphs in [`ascii_font`], in font units
pub const ASCII_ADVANCE: u16 = 600;
/// Advance of space in [`ascii_font`], in font units
pub const SPACE_ADVANCE: u16 = 250;
/// Kerning of `A` followed by `V` in [`ascii_font`], in font units
pub const KERN_AV: i16 = -80;

/// A font covering printable ASCII with rectangular glyphs
///
/// Glyph heights vary with the codepoint. `A` followed by `V` is kerned.
pub fn ascii_font() -> FontBuilder {
    let mut font = FontBuilder::new();
    let space = font.glyph(GlyphData::Empty, SPACE_ADVANCE);
    font.map(' ', space);
    let (mut a, mut v) = (0, 0);
    for c in '!'..='~' {
        let height = 300 + 5 * (c as i16 - 33);
        let glyph = font.glyph(rect(50, -50, 550, height), ASCII_ADVANCE);
        font.map(c, glyph);
        match c {
            'A' => a = glyph,
            'V' => v = glyph,
            _ => (),
        }
    }
    font.kern(a, v, KERN_AV);
    font
}

/// A fresh, empty directory unique to this test process
pub fn temp_dir(name: &str) -> PathBuf {
    static COUNTER: AtomicU32 = AtomicU32::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let dir = std::env::temp_dir().join(format!(
        "kas-font-atlas-test-{}-{name}-{n}",
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Write a font to `dir/name`
pub fn write_font(dir: &std::path::Path, name: &str, font: &FontBuilder) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, font.build()).unwrap();
    path
}
