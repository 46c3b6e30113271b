// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE-APACHE file or at:
//     https://www.apache.org/licenses/LICENSE-2.0

//! Support for rastering glyphs
//!
//! Outlines are converted to a flat edge list in device space (quadratic
//! curves are flattened to line segments), then each pixel is supersampled on
//! a regular grid and tested against the edges using the non-zero winding
//! rule.
//!
//! # Example
//!
//! ```
//! use kas_font_atlas::fonts::{Contour, Outline, Point};
//! use kas_font_atlas::raster::{rasterize, Config, ScratchPool};
//!
//! let p = |x, y| Point { x, y, on_curve: true };
//! let square = Outline {
//!     contours: vec![Contour {
//!         points: vec![p(0.0, 0.0), p(0.0, 100.0), p(100.0, 100.0), p(100.0, 0.0)],
//!     }],
//!     ..Default::default()
//! };
//!
//! let bitmap = rasterize(&Config::default(), &ScratchPool::default(), &square, 0.04);
//! assert_eq!((bitmap.width, bitmap.height), (4, 4));
//! assert!(bitmap.data.iter().all(|a| *a == 255));
//! ```

use crate::conv::to_usize;
use crate::fonts::Outline;
use crate::Vec2;
use easy_cast::{Conv, ConvFloat};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Raster configuration
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    samples: u8,
    min_steps: u8,
    max_steps: u8,
    px_per_step: f32,
}

impl Config {
    /// Construct configuration
    ///
    /// Each pixel is sampled on a `samples × samples` grid (clamped to
    /// `1..=16`); coverage resolution is thus `samples²` levels.
    ///
    /// Quadratic curves are flattened into between `min_steps` and
    /// `max_steps` line segments; within that range, one segment is used per
    /// `px_per_step` device pixels of control-polygon length.
    pub fn new(samples: u8, min_steps: u8, max_steps: u8, px_per_step: f32) -> Self {
        let min_steps = min_steps.max(1);
        Config {
            samples: samples.clamp(1, 16),
            min_steps,
            max_steps: max_steps.max(min_steps),
            px_per_step: if px_per_step > 0.0 { px_per_step } else { 1.0 },
        }
    }

    /// Samples per pixel along each axis
    #[inline]
    pub fn samples(&self) -> u8 {
        self.samples
    }

    /// Number of line segments used to flatten a curve with the given
    /// control-polygon length (in device pixels)
    pub fn curve_steps(&self, length: f32) -> u32 {
        let steps = (length / self.px_per_step).ceil();
        let (min, max) = (u32::from(self.min_steps), u32::from(self.max_steps));
        if steps.is_finite() && steps > 0.0 {
            u32::conv_nearest(steps.min(f32::from(self.max_steps))).clamp(min, max)
        } else {
            min
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::new(8, 8, 64, 1.0)
    }
}

/// A rastered glyph coverage bitmap
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CoverageBitmap {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Distance from the glyph origin to the left edge, in pixels
    pub left: i32,
    /// Height of the top edge above the baseline, in pixels
    pub top: i32,
    /// Alpha coverage, row major order (top row first), length `width * height`
    pub data: Vec<u8>,
}

impl CoverageBitmap {
    /// True if the bitmap has no pixels
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Coverage of a pixel
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.data[to_usize(y * self.width + x)]
    }
}

/// A glyph bitmap descriptor
///
/// This descriptor includes all properties determining a rastered glyph in a
/// small, easily hashable value. It is thus ideal for caching glyph bitmaps
/// in a `HashMap`.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct BitmapKey {
    font: u64,
    codepoint: u32,
    size_bits: u32,
    oversample: u8,
    scale_bits: u32,
}

impl std::fmt::Debug for BitmapKey {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("BitmapKey")
            .field("font", &format_args!("{:#018x}", self.font))
            .field("codepoint", &format_args!("U+{:04X}", self.codepoint))
            .field("font_size", &self.font_size())
            .field("oversample", &self.oversample)
            .field("scale", &self.scale())
            .finish()
    }
}

impl BitmapKey {
    /// Construct
    ///
    /// `font` identifies the font file contents (see the cache module).
    pub fn new(font: u64, codepoint: u32, font_size: f32, oversample: u8, scale: f32) -> Self {
        BitmapKey {
            font,
            codepoint,
            size_bits: font_size.to_bits(),
            oversample,
            scale_bits: scale.to_bits(),
        }
    }

    /// Font identity
    #[inline]
    pub fn font(self) -> u64 {
        self.font
    }

    #[inline]
    pub fn codepoint(self) -> u32 {
        self.codepoint
    }

    /// Font size, in pixels per Em
    #[inline]
    pub fn font_size(self) -> f32 {
        f32::from_bits(self.size_bits)
    }

    #[inline]
    pub fn oversample(self) -> u8 {
        self.oversample
    }

    /// Per-source scale multiplier
    #[inline]
    pub fn scale(self) -> f32 {
        f32::from_bits(self.scale_bits)
    }
}

/// A pool of reusable coverage-count buffers
///
/// Buffers are binned by power-of-two size class. A buffer taken from the
/// pool is zero-filled to the requested length; return it with
/// [`ScratchPool::give`] when done. The pool is internally synchronised so
/// that one pool may be shared by concurrent rasterizations.
#[derive(Debug, Default)]
pub struct ScratchPool {
    classes: Mutex<HashMap<u32, Vec<Vec<u16>>>>,
}

/// Buffers retained per size class
const POOL_DEPTH: usize = 4;

impl ScratchPool {
    fn lock(&self) -> MutexGuard<'_, HashMap<u32, Vec<Vec<u16>>>> {
        self.classes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take a zeroed buffer of length `len`
    pub fn take(&self, len: usize) -> Vec<u16> {
        let class = len.next_power_of_two().trailing_zeros();
        let mut buf = self
            .lock()
            .get_mut(&class)
            .and_then(|list| list.pop())
            .unwrap_or_else(|| Vec::with_capacity(1 << class));
        buf.clear();
        buf.resize(len, 0);
        buf
    }

    /// Return a buffer to the pool
    pub fn give(&self, buf: Vec<u16>) {
        let cap = buf.capacity();
        if cap == 0 {
            return;
        }
        // The largest class whose requests this buffer can satisfy
        let class = usize::BITS - 1 - cap.leading_zeros();
        let mut classes = self.lock();
        let list = classes.entry(class).or_default();
        if list.len() < POOL_DEPTH {
            list.push(buf);
        }
    }

    /// Number of buffers held
    pub fn len(&self) -> usize {
        self.lock().values().map(|list| list.len()).sum()
    }

    /// True if no buffers are held
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone, Copy, Debug)]
struct Edge {
    a: Vec2,
    b: Vec2,
    /// +1 for edges heading down (increasing y), −1 for up
    dir: i32,
}

/// Accumulates device-space edges from outline segments
struct EdgeList<'a> {
    config: &'a Config,
    edges: Vec<Edge>,
}

impl<'a> EdgeList<'a> {
    fn line(&mut self, a: Vec2, b: Vec2) {
        if a.1 == b.1 {
            // horizontal edges never cross a scanline
            return;
        }
        let dir = if b.1 > a.1 { 1 } else { -1 };
        self.edges.push(Edge { a, b, dir });
    }

    fn quad(&mut self, a: Vec2, c: Vec2, b: Vec2) {
        let length = (c - a).length() + (b - c).length();
        let steps = self.config.curve_steps(length);
        let mut prev = a;
        for i in 1..=steps {
            let t = f32::conv(i) / f32::conv(steps);
            let p = if i == steps {
                b
            } else {
                a.lerp(c, t).lerp(c.lerp(b, t), t)
            };
            self.line(prev, p);
            prev = p;
        }
    }
}

/// Raster an outline
///
/// `scale` converts font units to device pixels. The bitmap covers the
/// pixel-aligned bounds of the outline's points; an outline without area
/// yields an empty bitmap.
pub fn rasterize(
    config: &Config,
    pool: &ScratchPool,
    outline: &Outline,
    scale: f32,
) -> CoverageBitmap {
    let mut points = outline.contours.iter().flat_map(|c| c.points.iter());
    let Some(first) = points.next() else {
        return CoverageBitmap::default();
    };
    if !(scale > 0.0) {
        return CoverageBitmap::default();
    }

    let (mut x_min, mut y_min, mut x_max, mut y_max) = (first.x, first.y, first.x, first.y);
    for p in points {
        x_min = x_min.min(p.x);
        y_min = y_min.min(p.y);
        x_max = x_max.max(p.x);
        y_max = y_max.max(p.y);
    }
    let x0 = (x_min * scale).floor();
    let x1 = (x_max * scale).ceil();
    let y0 = (y_min * scale).floor();
    let y1 = (y_max * scale).ceil();
    let left = i32::conv_nearest(x0);
    let top = i32::conv_nearest(y1);
    let width = u32::conv_nearest(x1 - x0);
    let height = u32::conv_nearest(y1 - y0);
    if width == 0 || height == 0 {
        return CoverageBitmap {
            left,
            top,
            ..Default::default()
        };
    }

    // Device space: origin at the bitmap's top-left, y down
    let device = |x: f32, y: f32| Vec2(x * scale - x0, y1 - y * scale);

    let mut list = EdgeList {
        config,
        edges: Vec::new(),
    };
    for contour in &outline.contours {
        let pts = &contour.points;
        let n = pts.len();
        if n < 2 {
            continue;
        }

        // Begin at an on-curve point; if there is none, at the implied
        // midpoint between the last and first points
        let (start, first) = match pts.iter().position(|p| p.on_curve) {
            Some(i) => (device(pts[i].x, pts[i].y), i + 1),
            None => {
                let a = device(pts[n - 1].x, pts[n - 1].y);
                (a.mid(device(pts[0].x, pts[0].y)), 0)
            }
        };
        let count = if first == 0 { n } else { n - 1 };

        let mut current = start;
        let mut control: Option<Vec2> = None;
        for k in 0..count {
            let p = &pts[(first + k) % n];
            let v = device(p.x, p.y);
            if p.on_curve {
                match control.take() {
                    Some(c) => list.quad(current, c, v),
                    None => list.line(current, v),
                }
                current = v;
            } else {
                if let Some(c) = control {
                    let mid = c.mid(v);
                    list.quad(current, c, mid);
                    current = mid;
                }
                control = Some(v);
            }
        }
        match control {
            Some(c) => list.quad(current, c, start),
            None => list.line(current, start),
        }
    }

    let data = fill(config, pool, &list.edges, width, height);
    CoverageBitmap {
        width,
        height,
        left,
        top,
        data,
    }
}

/// Compute coverage by supersampling with the non-zero winding rule
fn fill(config: &Config, pool: &ScratchPool, edges: &[Edge], width: u32, height: u32) -> Vec<u8> {
    let s = u32::from(config.samples);
    let sf = f32::conv(s);
    let row_len = to_usize(width);
    let sample_cols = i64::from(width * s);

    let mut counts = pool.take(row_len * to_usize(height));
    let mut crossings: Vec<(f32, i32)> = Vec::new();

    for sy in 0..height * s {
        let y = (f32::conv(sy) + 0.5) / sf;
        crossings.clear();
        for e in edges {
            let (lo, hi) = if e.a.1 < e.b.1 { (e.a, e.b) } else { (e.b, e.a) };
            if y < lo.1 || y >= hi.1 {
                continue;
            }
            let x = lo.0 + (y - lo.1) * (hi.0 - lo.0) / (hi.1 - lo.1);
            crossings.push((x, e.dir));
        }
        if crossings.is_empty() {
            continue;
        }
        crossings.sort_by(|a, b| a.0.total_cmp(&b.0));

        // A sample's winding number is the sum of directions of crossings
        // to its right; sweep left to right subtracting each crossing passed
        let mut winding: i32 = crossings.iter().map(|c| c.1).sum();
        let row = to_usize(sy / s) * row_len;
        for i in 0..crossings.len() {
            winding -= crossings[i].1;
            if winding == 0 {
                continue;
            }
            let xa = crossings[i].0;
            let xb = crossings.get(i + 1).map(|c| c.0).unwrap_or(f32::INFINITY);
            // samples with centre in [xa, xb)
            let k0 = sample_index(xa, sf).clamp(0, sample_cols);
            let k1 = sample_index(xb, sf).clamp(0, sample_cols);
            for k in k0..k1 {
                let col = usize::conv(k) / to_usize(s);
                counts[row + col] += 1;
            }
        }
    }

    let total = s * s;
    let data = counts
        .iter()
        .map(|&n| {
            let a = (u32::from(n) * 255 + total / 2) / total;
            u8::conv(a.min(255))
        })
        .collect();
    pool.give(counts);
    data
}

/// Index of the first sample with centre at or right of `x`
#[inline]
fn sample_index(x: f32, samples: f32) -> i64 {
    let k = (x * samples - 0.5).ceil();
    if k.is_finite() {
        i64::conv_nearest(k.clamp(-1.0, 1.0e9))
    } else if k > 0.0 {
        i64::MAX
    } else {
        0
    }
}

/// Reduce an oversampled bitmap by a box filter
///
/// Pixel boundaries of the result align with multiples of `factor` in the
/// source's glyph-relative coordinates, so `left` and `top` divide exactly
/// (rounding outward).
pub fn downsample(bitmap: &CoverageBitmap, factor: u8) -> CoverageBitmap {
    if factor <= 1 {
        return bitmap.clone();
    }
    let k = i32::from(factor);
    let left = bitmap.left.div_euclid(k);
    let shift_x = bitmap.left.rem_euclid(k);
    // rows run downward from the top edge at y = -top
    let top_down = (-bitmap.top).div_euclid(k);
    let shift_y = (-bitmap.top).rem_euclid(k);
    let top = -top_down;

    if bitmap.is_empty() {
        return CoverageBitmap {
            left,
            top,
            ..Default::default()
        };
    }

    let (w, h) = (i32::conv(bitmap.width), i32::conv(bitmap.height));
    let width = (w + shift_x + k - 1) / k;
    let height = (h + shift_y + k - 1) / k;
    let area = u32::conv(k * k);

    let mut data = Vec::with_capacity(usize::conv(width * height));
    for oy in 0..height {
        for ox in 0..width {
            let mut sum = 0u32;
            for dy in 0..k {
                let sy = oy * k + dy - shift_y;
                if sy < 0 || sy >= h {
                    continue;
                }
                for dx in 0..k {
                    let sx = ox * k + dx - shift_x;
                    if sx < 0 || sx >= w {
                        continue;
                    }
                    sum += u32::from(bitmap.data[usize::conv(sy * w + sx)]);
                }
            }
            data.push(u8::conv((sum + area / 2) / area));
        }
    }

    CoverageBitmap {
        width: u32::conv(width),
        height: u32::conv(height),
        left,
        top,
        data,
    }
}
