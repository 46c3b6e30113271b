// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE-APACHE file or at:
//     https://www.apache.org/licenses/LICENSE-2.0

//! Font atlases
//!
//! A [`FontAtlas`] is the final product of an atlas build: one RGBA bitmap
//! containing every rastered glyph, per-codepoint placement records locating
//! glyphs within it, kerning adjustments and line metrics. Atlases are
//! immutable once built and are shared via `Arc`.
//!
//! All metrics are in pixels, with y increasing downward.

pub mod builtin;
pub mod pack;

use crate::{PixelFormat, UvRect};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Placement of a glyph within an atlas
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GlyphPlacement {
    /// Horizontal advance to the next pen position
    pub advance_x: f32,
    /// Offset from the pen position to the left edge of the bitmap
    pub offset_x: f32,
    /// Offset from the baseline to the top edge of the bitmap (negative
    /// above the baseline)
    pub offset_y: f32,
    /// Bitmap width (zero for glyphs with no outline)
    pub width: f32,
    /// Bitmap height (zero for glyphs with no outline)
    pub height: f32,
    /// Location within the atlas texture
    pub uv: UvRect,
}

impl GlyphPlacement {
    /// True if there is nothing to draw
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0.0 || self.height == 0.0
    }
}

/// A borrowed view of atlas pixel data, for upload as a texture
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextureUpload<'a> {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Row-major pixel data, `width * height * format.bytes_per_pixel()` bytes
    pub data: &'a [u8],
}

/// Pack a codepoint pair as used for kerning keys
///
/// Returns `None` for codepoints beyond the Basic Multilingual Plane.
#[inline]
pub fn kern_key(left: u32, right: u32) -> Option<u32> {
    if left > 0xFFFF || right > 0xFFFF {
        None
    } else {
        Some((left << 16) | right)
    }
}

/// Choose the fallback codepoint for a glyph set
///
/// Prefers `?`, then space, then the lowest codepoint present.
pub fn choose_fallback(glyphs: &HashMap<u32, GlyphPlacement>) -> Option<u32> {
    ['?', ' ']
        .into_iter()
        .map(u32::from)
        .find(|c| glyphs.contains_key(c))
        .or_else(|| glyphs.keys().min().copied())
}

/// A built font atlas
#[derive(Clone, Debug, PartialEq)]
pub struct FontAtlas {
    width: u32,
    height: u32,
    format: PixelFormat,
    pixels: Vec<u8>,
    glyphs: HashMap<u32, GlyphPlacement>,
    kerning: HashMap<u32, f32>,
    ascent: f32,
    descent: f32,
    line_gap: f32,
    fallback: Option<u32>,
}

/// Vertical metrics of an atlas, in pixels
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LineMetrics {
    /// Height of the ascender above the baseline (usually positive)
    pub ascent: f32,
    /// Position of the descender relative to the baseline (usually negative)
    pub descent: f32,
    /// Gap between one line's descender and the next line's ascender
    pub line_gap: f32,
}

impl FontAtlas {
    /// Assemble an atlas
    ///
    /// The fallback codepoint is chosen from `glyphs` when not given.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        width: u32,
        height: u32,
        format: PixelFormat,
        pixels: Vec<u8>,
        glyphs: HashMap<u32, GlyphPlacement>,
        kerning: HashMap<u32, f32>,
        metrics: LineMetrics,
        fallback: Option<u32>,
    ) -> Self {
        let fallback = fallback.or_else(|| choose_fallback(&glyphs));
        FontAtlas {
            width,
            height,
            format,
            pixels,
            glyphs,
            kerning,
            ascent: metrics.ascent,
            descent: metrics.descent,
            line_gap: metrics.line_gap,
            fallback,
        }
    }

    /// Atlas width in pixels
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Atlas height in pixels
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Raw pixel data
    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Pixel data and dimensions for texture upload
    pub fn texture(&self) -> TextureUpload<'_> {
        TextureUpload {
            width: self.width,
            height: self.height,
            format: self.format,
            data: &self.pixels,
        }
    }

    /// Number of glyphs
    #[inline]
    pub fn glyph_count(&self) -> usize {
        self.glyphs.len()
    }

    /// True if the atlas has a placement for `c`
    #[inline]
    pub fn contains(&self, c: u32) -> bool {
        self.glyphs.contains_key(&c)
    }

    /// Get the placement of a codepoint's glyph
    #[inline]
    pub fn glyph(&self, c: u32) -> Option<&GlyphPlacement> {
        self.glyphs.get(&c)
    }

    /// Get the placement of a codepoint's glyph or else the fallback glyph
    ///
    /// Returns `None` only if the atlas contains no glyphs.
    pub fn glyph_or_fallback(&self, c: u32) -> Option<&GlyphPlacement> {
        self.glyphs
            .get(&c)
            .or_else(|| self.fallback.and_then(|f| self.glyphs.get(&f)))
    }

    /// The fallback codepoint, if any
    #[inline]
    pub fn fallback_codepoint(&self) -> Option<u32> {
        self.fallback
    }

    /// Iterate over all placements, in arbitrary order
    pub fn glyphs(&self) -> impl Iterator<Item = (u32, &GlyphPlacement)> + '_ {
        self.glyphs.iter().map(|(c, g)| (*c, g))
    }

    /// Kerning adjustment between two codepoints, in pixels
    ///
    /// Pairs without an entry yield `0.0`.
    pub fn kerning(&self, left: u32, right: u32) -> f32 {
        kern_key(left, right)
            .and_then(|key| self.kerning.get(&key))
            .copied()
            .unwrap_or(0.0)
    }

    /// Iterate over kerning entries as `(packed key, adjustment)`
    ///
    /// The key packs the left codepoint in the high 16 bits.
    pub fn kerning_pairs(&self) -> impl Iterator<Item = (u32, f32)> + '_ {
        self.kerning.iter().map(|(k, v)| (*k, *v))
    }

    /// Number of kerning pairs
    #[inline]
    pub fn kerning_count(&self) -> usize {
        self.kerning.len()
    }

    #[inline]
    pub fn ascent(&self) -> f32 {
        self.ascent
    }

    #[inline]
    pub fn descent(&self) -> f32 {
        self.descent
    }

    #[inline]
    pub fn line_gap(&self) -> f32 {
        self.line_gap
    }

    /// Vertical metrics
    #[inline]
    pub fn line_metrics(&self) -> LineMetrics {
        LineMetrics {
            ascent: self.ascent,
            descent: self.descent,
            line_gap: self.line_gap,
        }
    }

    /// Distance between consecutive baselines
    #[inline]
    pub fn line_height(&self) -> f32 {
        self.ascent - self.descent + self.line_gap
    }
}
