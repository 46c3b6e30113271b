// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE-APACHE file or at:
//     https://www.apache.org/licenses/LICENSE-2.0

//! Shelf packing
//!
//! Rectangles are placed left to right along a row ("shelf"). When the next
//! rectangle would overflow the atlas width, a new row begins below the
//! tallest rectangle of the current row. Running out of rows is a failure:
//! the atlas never grows.

use crate::conv::to_usize;
use crate::raster::CoverageBitmap;
use crate::{PixelFormat, UvRect};

/// Allocator of rectangles within a fixed-size area
#[derive(Clone, Debug)]
pub struct ShelfPacker {
    width: u32,
    height: u32,
    padding: u32,
    x: u32,
    y: u32,
    row_height: u32,
}

impl ShelfPacker {
    /// Construct for an area of `width × height`
    ///
    /// Each allocation reserves `padding` extra pixels to its right and
    /// below.
    pub fn new(width: u32, height: u32, padding: u32) -> Self {
        ShelfPacker {
            width,
            height,
            padding,
            x: 0,
            y: 0,
            row_height: 0,
        }
    }

    /// Allocate a `w × h` rectangle, returning its top-left corner
    pub fn allocate(&mut self, w: u32, h: u32) -> Option<(u32, u32)> {
        let aw = w.checked_add(self.padding)?;
        let ah = h.checked_add(self.padding)?;

        if self.x + aw > self.width {
            self.y += self.row_height;
            self.x = 0;
            self.row_height = 0;
        }
        if aw > self.width || self.y + ah > self.height {
            return None;
        }

        let pos = (self.x, self.y);
        self.x += aw;
        self.row_height = self.row_height.max(ah);
        Some(pos)
    }

    /// Height used so far, including the current row
    #[inline]
    pub fn used_height(&self) -> u32 {
        self.y + self.row_height
    }
}

/// An RGBA atlas bitmap under construction
///
/// Texels are transparent black until written. Glyph coverage is stored in
/// the alpha channel of white texels so that the atlas may be tinted.
#[derive(Clone, Debug)]
pub struct AtlasCanvas {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl AtlasCanvas {
    const BPP: usize = 4;

    /// Construct a transparent canvas
    pub fn new(width: u32, height: u32) -> Self {
        let len = to_usize(width) * to_usize(height) * Self::BPP;
        AtlasCanvas {
            width,
            height,
            pixels: vec![0; len],
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn format(&self) -> PixelFormat {
        PixelFormat::Rgba8
    }

    /// Write a single fully-opaque white texel
    pub fn set_white(&mut self, x: u32, y: u32) {
        let i = self.index(x, y);
        self.pixels[i..i + Self::BPP].copy_from_slice(&[255; 4]);
    }

    /// Copy a coverage bitmap with its top-left corner at `(x, y)`
    ///
    /// Returns the UV rectangle covered.
    pub fn blit(&mut self, x: u32, y: u32, bitmap: &CoverageBitmap) -> UvRect {
        debug_assert!(x + bitmap.width <= self.width && y + bitmap.height <= self.height);
        let row_len = to_usize(bitmap.width);
        for (row, coverage) in bitmap.data.chunks_exact(row_len.max(1)).enumerate() {
            let start = self.index(x, y + row as u32);
            let texels = &mut self.pixels[start..start + row_len * Self::BPP];
            for (texel, a) in texels.chunks_exact_mut(Self::BPP).zip(coverage) {
                texel.copy_from_slice(&[255, 255, 255, *a]);
            }
        }
        self.uv(x, y, bitmap.width, bitmap.height)
    }

    /// UV rectangle of a pixel rectangle
    #[inline]
    pub fn uv(&self, x: u32, y: u32, w: u32, h: u32) -> UvRect {
        UvRect::from_pixels(x, y, w, h, self.width, self.height)
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        (to_usize(y) * to_usize(self.width) + to_usize(x)) * Self::BPP
    }

    /// Take the pixel data
    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }
}
