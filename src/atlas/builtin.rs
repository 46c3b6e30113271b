// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE-APACHE file or at:
//     https://www.apache.org/licenses/LICENSE-2.0

//! Built-in 5×7 bitmap font
//!
//! Covers printable ASCII (U+0020 to U+007E) and needs no font file. Each
//! glyph cell is 5 pixels wide and 7 tall, drawn with one blank column of
//! spacing; all dimensions are multiplied by an integer `scale`.

use super::pack::{AtlasCanvas, ShelfPacker};
use super::{FontAtlas, GlyphPlacement, LineMetrics};
use crate::raster::CoverageBitmap;
use crate::Error;
use easy_cast::Conv;
use std::collections::HashMap;

/// First codepoint covered
pub const FIRST: u32 = 0x20;
/// Last codepoint covered
pub const LAST: u32 = 0x7E;

const COLUMNS: u32 = 5;
const ROWS: u32 = 7;
const ADVANCE: u32 = COLUMNS + 1;
const PADDING: u32 = 1;

/// Column-major glyph data; bit 0 of each column is the top row
#[rustfmt::skip]
const GLYPHS: [[u8; 5]; 95] = [
    [0x00, 0x00, 0x00, 0x00, 0x00], // ' '
    [0x00, 0x00, 0x5F, 0x00, 0x00], // '!'
    [0x00, 0x07, 0x00, 0x07, 0x00], // '"'
    [0x14, 0x7F, 0x14, 0x7F, 0x14], // '#'
    [0x24, 0x2A, 0x7F, 0x2A, 0x12], // '$'
    [0x23, 0x13, 0x08, 0x64, 0x62], // '%'
    [0x36, 0x49, 0x55, 0x22, 0x50], // '&'
    [0x00, 0x05, 0x03, 0x00, 0x00], // '''
    [0x00, 0x1C, 0x22, 0x41, 0x00], // '('
    [0x00, 0x41, 0x22, 0x1C, 0x00], // ')'
    [0x14, 0x08, 0x3E, 0x08, 0x14], // '*'
    [0x08, 0x08, 0x3E, 0x08, 0x08], // '+'
    [0x00, 0x50, 0x30, 0x00, 0x00], // ','
    [0x08, 0x08, 0x08, 0x08, 0x08], // '-'
    [0x00, 0x60, 0x60, 0x00, 0x00], // '.'
    [0x20, 0x10, 0x08, 0x04, 0x02], // '/'
    [0x3E, 0x51, 0x49, 0x45, 0x3E], // '0'
    [0x00, 0x42, 0x7F, 0x40, 0x00], // '1'
    [0x42, 0x61, 0x51, 0x49, 0x46], // '2'
    [0x21, 0x41, 0x45, 0x4B, 0x31], // '3'
    [0x18, 0x14, 0x12, 0x7F, 0x10], // '4'
    [0x27, 0x45, 0x45, 0x45, 0x39], // '5'
    [0x3C, 0x4A, 0x49, 0x49, 0x30], // '6'
    [0x01, 0x71, 0x09, 0x05, 0x03], // '7'
    [0x36, 0x49, 0x49, 0x49, 0x36], // '8'
    [0x06, 0x49, 0x49, 0x29, 0x1E], // '9'
    [0x00, 0x36, 0x36, 0x00, 0x00], // ':'
    [0x00, 0x56, 0x36, 0x00, 0x00], // ';'
    [0x08, 0x14, 0x22, 0x41, 0x00], // '<'
    [0x14, 0x14, 0x14, 0x14, 0x14], // '='
    [0x00, 0x41, 0x22, 0x14, 0x08], // '>'
    [0x02, 0x01, 0x51, 0x09, 0x06], // '?'
    [0x32, 0x49, 0x79, 0x41, 0x3E], // '@'
    [0x7E, 0x11, 0x11, 0x11, 0x7E], // 'A'
    [0x7F, 0x49, 0x49, 0x49, 0x36], // 'B'
    [0x3E, 0x41, 0x41, 0x41, 0x22], // 'C'
    [0x7F, 0x41, 0x41, 0x22, 0x1C], // 'D'
    [0x7F, 0x49, 0x49, 0x49, 0x41], // 'E'
    [0x7F, 0x09, 0x09, 0x09, 0x01], // 'F'
    [0x3E, 0x41, 0x49, 0x49, 0x7A], // 'G'
    [0x7F, 0x08, 0x08, 0x08, 0x7F], // 'H'
    [0x00, 0x41, 0x7F, 0x41, 0x00], // 'I'
    [0x20, 0x40, 0x41, 0x3F, 0x01], // 'J'
    [0x7F, 0x08, 0x14, 0x22, 0x41], // 'K'
    [0x7F, 0x40, 0x40, 0x40, 0x40], // 'L'
    [0x7F, 0x02, 0x0C, 0x02, 0x7F], // 'M'
    [0x7F, 0x04, 0x08, 0x10, 0x7F], // 'N'
    [0x3E, 0x41, 0x41, 0x41, 0x3E], // 'O'
    [0x7F, 0x09, 0x09, 0x09, 0x06], // 'P'
    [0x3E, 0x41, 0x51, 0x21, 0x5E], // 'Q'
    [0x7F, 0x09, 0x19, 0x29, 0x46], // 'R'
    [0x46, 0x49, 0x49, 0x49, 0x31], // 'S'
    [0x01, 0x01, 0x7F, 0x01, 0x01], // 'T'
    [0x3F, 0x40, 0x40, 0x40, 0x3F], // 'U'
    [0x1F, 0x20, 0x40, 0x20, 0x1F], // 'V'
    [0x3F, 0x40, 0x38, 0x40, 0x3F], // 'W'
    [0x63, 0x14, 0x08, 0x14, 0x63], // 'X'
    [0x07, 0x08, 0x70, 0x08, 0x07], // 'Y'
    [0x61, 0x51, 0x49, 0x45, 0x43], // 'Z'
    [0x00, 0x7F, 0x41, 0x41, 0x00], // '['
    [0x02, 0x04, 0x08, 0x10, 0x20], // '\'
    [0x00, 0x41, 0x41, 0x7F, 0x00], // ']'
    [0x04, 0x02, 0x01, 0x02, 0x04], // '^'
    [0x40, 0x40, 0x40, 0x40, 0x40], // '_'
    [0x00, 0x01, 0x02, 0x04, 0x00], // '`'
    [0x20, 0x54, 0x54, 0x54, 0x78], // 'a'
    [0x7F, 0x48, 0x44, 0x44, 0x38], // 'b'
    [0x38, 0x44, 0x44, 0x44, 0x20], // 'c'
    [0x38, 0x44, 0x44, 0x48, 0x7F], // 'd'
    [0x38, 0x54, 0x54, 0x54, 0x18], // 'e'
    [0x08, 0x7E, 0x09, 0x01, 0x02], // 'f'
    [0x0C, 0x52, 0x52, 0x52, 0x3E], // 'g'
    [0x7F, 0x08, 0x04, 0x04, 0x78], // 'h'
    [0x00, 0x44, 0x7D, 0x40, 0x00], // 'i'
    [0x20, 0x40, 0x44, 0x3D, 0x00], // 'j'
    [0x7F, 0x10, 0x28, 0x44, 0x00], // 'k'
    [0x00, 0x41, 0x7F, 0x40, 0x00], // 'l'
    [0x7C, 0x04, 0x18, 0x04, 0x78], // 'm'
    [0x7C, 0x08, 0x04, 0x04, 0x78], // 'n'
    [0x38, 0x44, 0x44, 0x44, 0x38], // 'o'
    [0x7C, 0x14, 0x14, 0x14, 0x08], // 'p'
    [0x08, 0x14, 0x14, 0x18, 0x7C], // 'q'
    [0x7C, 0x08, 0x04, 0x04, 0x08], // 'r'
    [0x48, 0x54, 0x54, 0x54, 0x20], // 's'
    [0x04, 0x3F, 0x44, 0x40, 0x20], // 't'
    [0x3C, 0x40, 0x40, 0x20, 0x7C], // 'u'
    [0x1C, 0x20, 0x40, 0x20, 0x1C], // 'v'
    [0x3C, 0x40, 0x30, 0x40, 0x3C], // 'w'
    [0x44, 0x28, 0x10, 0x28, 0x44], // 'x'
    [0x0C, 0x50, 0x50, 0x50, 0x3C], // 'y'
    [0x44, 0x64, 0x54, 0x4C, 0x44], // 'z'
    [0x00, 0x08, 0x36, 0x41, 0x00], // '{'
    [0x00, 0x00, 0x7F, 0x00, 0x00], // '|'
    [0x00, 0x41, 0x36, 0x08, 0x00], // '}'
    [0x08, 0x04, 0x08, 0x10, 0x08], // '~'
];

/// Get the column data of a codepoint, if covered
pub fn columns(c: u32) -> Option<&'static [u8; 5]> {
    if (FIRST..=LAST).contains(&c) {
        GLYPHS.get(usize::conv(c - FIRST))
    } else {
        None
    }
}

/// Render a glyph at the given scale
///
/// Glyphs without any set pixel (space) yield an empty bitmap.
pub fn glyph_bitmap(columns: &[u8; 5], scale: u32) -> CoverageBitmap {
    if columns.iter().all(|col| *col == 0) {
        return CoverageBitmap::default();
    }
    let (width, height) = (COLUMNS * scale, ROWS * scale);
    let mut data = Vec::with_capacity(usize::conv(width * height));
    for y in 0..height {
        let row = y / scale;
        for x in 0..width {
            let bits = columns[usize::conv(x / scale)];
            data.push(if bits & (1 << row) != 0 { 255 } else { 0 });
        }
    }
    CoverageBitmap {
        width,
        height,
        left: 0,
        top: i32::conv(height),
        data,
    }
}

/// Build the built-in atlas at an integer scale
///
/// Ascent is the glyph cell height, descent zero and the line gap one cell
/// pixel; the fallback glyph is `?`.
pub fn atlas(scale: u32) -> Result<FontAtlas, Error> {
    if scale == 0 || scale > 64 {
        return Err(Error::InvalidParams("builtin atlas scale must be in 1..=64"));
    }

    // 16 glyphs (plus the reserved texel) per row, 7 rows
    let cell_w = COLUMNS * scale + PADDING;
    let cell_h = ROWS * scale + PADDING;
    let width = (16 * cell_w + 2).next_power_of_two();
    let height = (7 * cell_h).next_power_of_two();

    let mut packer = ShelfPacker::new(width, height, PADDING);
    let mut canvas = AtlasCanvas::new(width, height);
    let (wx, wy) = packer.allocate(1, 1).ok_or(Error::AtlasTooSmall {
        width,
        height,
        codepoint: 0,
    })?;
    canvas.set_white(wx, wy);

    let s = f32::conv(scale);
    let mut glyphs = HashMap::with_capacity(GLYPHS.len());
    for (c, cols) in (FIRST..=LAST).zip(GLYPHS.iter()) {
        let bitmap = glyph_bitmap(cols, scale);
        let mut placement = GlyphPlacement {
            advance_x: f32::conv(ADVANCE) * s,
            ..Default::default()
        };
        if !bitmap.is_empty() {
            let (x, y) = packer
                .allocate(bitmap.width, bitmap.height)
                .ok_or(Error::AtlasTooSmall {
                    width,
                    height,
                    codepoint: c,
                })?;
            placement.uv = canvas.blit(x, y, &bitmap);
            placement.width = f32::conv(bitmap.width);
            placement.height = f32::conv(bitmap.height);
            placement.offset_y = -f32::conv(bitmap.top);
        }
        glyphs.insert(c, placement);
    }

    let metrics = LineMetrics {
        ascent: f32::conv(ROWS) * s,
        descent: 0.0,
        line_gap: s,
    };
    log::debug!("builtin::atlas: scale {scale}, {width}×{height}");
    Ok(FontAtlas::new(
        width,
        height,
        canvas.format(),
        canvas.into_pixels(),
        glyphs,
        HashMap::new(),
        metrics,
        Some(u32::from('?')),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn covers_printable_ascii() {
        assert!(columns(0x1F).is_none());
        assert!(columns(0x7F).is_none());
        assert_eq!(columns(u32::from('A')), Some(&[0x7E, 0x11, 0x11, 0x11, 0x7E]));
    }

    #[test]
    fn glyph_bitmap_scaled() {
        let bitmap = glyph_bitmap(columns(u32::from('!')).unwrap(), 2);
        assert_eq!((bitmap.width, bitmap.height), (10, 14));
        assert_eq!(bitmap.top, 14);
        // column 2 is set for rows 0..=4 and 6, clear at row 5
        assert_eq!(bitmap.get(4, 0), 255);
        assert_eq!(bitmap.get(5, 9), 255);
        assert_eq!(bitmap.get(4, 10), 0);
        assert_eq!(bitmap.get(4, 12), 255);
        assert_eq!(bitmap.get(0, 0), 0);
    }

    #[test]
    fn atlas_metrics() {
        let atlas = atlas(2).unwrap();
        assert_eq!(atlas.glyph_count(), 95);
        assert_eq!(atlas.fallback_codepoint(), Some(u32::from('?')));
        assert_eq!(atlas.line_height(), 16.0);
        assert_eq!(&atlas.pixels()[0..4], &[255, 255, 255, 255]);

        let a = atlas.glyph(u32::from('A')).unwrap();
        assert_eq!((a.width, a.height, a.advance_x, a.offset_y), (10.0, 14.0, 12.0, -14.0));
        let space = atlas.glyph(u32::from(' ')).unwrap();
        assert!(space.is_empty());
        assert_eq!(space.advance_x, 12.0);
    }

    #[test]
    fn zero_scale_rejected() {
        assert!(matches!(atlas(0), Err(Error::InvalidParams(_))));
    }
}
