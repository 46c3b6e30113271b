// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE-APACHE file or at:
//     https://www.apache.org/licenses/LICENSE-2.0

//! Glyph outlines from the `glyf` table
//!
//! Simple glyphs are decoded directly. Composite glyphs are resolved by
//! recursively extracting each component, applying its 2×2 transform and
//! offset, and concatenating the contours.

use super::reader::Reader;
use super::{GlyphId, ParseError, ParsedFont};
use crate::Vec2;
use bitflags::bitflags;
use smallvec::SmallVec;

/// Maximum nesting of composite glyphs
///
/// A top-level glyph has depth 0; each component reference adds one. Deeper
/// nesting (including any self-referencing composite) is a parse failure.
pub const MAX_COMPOSITE_DEPTH: u8 = 8;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    struct PointFlags: u8 {
        const ON_CURVE = 0x01;
        const X_SHORT = 0x02;
        const Y_SHORT = 0x04;
        const REPEAT = 0x08;
        const X_SAME_OR_POSITIVE = 0x10;
        const Y_SAME_OR_POSITIVE = 0x20;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    struct ComponentFlags: u16 {
        const ARGS_ARE_WORDS = 0x0001;
        const ARGS_ARE_XY_VALUES = 0x0002;
        const ROUND_XY_TO_GRID = 0x0004;
        const HAVE_SCALE = 0x0008;
        const MORE_COMPONENTS = 0x0020;
        const HAVE_XY_SCALE = 0x0040;
        const HAVE_TWO_BY_TWO = 0x0080;
        const HAVE_INSTRUCTIONS = 0x0100;
        const USE_MY_METRICS = 0x0200;
        const OVERLAP_COMPOUND = 0x0400;
        const SCALED_COMPONENT_OFFSET = 0x0800;
        const UNSCALED_COMPONENT_OFFSET = 0x1000;
    }
}

/// A point of an outline, in font units
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
    /// Off-curve points are quadratic control points
    pub on_curve: bool,
}

impl Point {
    #[inline]
    pub fn pos(&self) -> Vec2 {
        Vec2(self.x, self.y)
    }
}

/// A closed contour
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Contour {
    pub points: Vec<Point>,
}

/// A glyph outline, in font units
///
/// An outline without contours is valid and has zero area (e.g. space).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Outline {
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
    pub contours: Vec<Contour>,
}

impl Outline {
    /// True if the outline has no contours
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.contours.iter().all(|c| c.points.is_empty())
    }

    /// Total number of points over all contours
    pub fn num_points(&self) -> usize {
        self.contours.iter().map(|c| c.points.len()).sum()
    }

    /// Get a point by its index over all contours
    pub fn point(&self, mut index: usize) -> Option<Point> {
        for contour in &self.contours {
            if index < contour.points.len() {
                return Some(contour.points[index]);
            }
            index -= contour.points.len();
        }
        None
    }

    /// Apply the linear transform `[xx, yx, xy, yy]`
    ///
    /// Maps `(x, y)` to `(xx·x + xy·y, yx·x + yy·y)`.
    pub fn transform(&mut self, m: [f32; 4]) {
        for p in self.contours.iter_mut().flat_map(|c| c.points.iter_mut()) {
            let v = apply(m, p.pos());
            p.x = v.0;
            p.y = v.1;
        }
        self.update_bounds();
    }

    /// Translate all points
    pub fn translate(&mut self, offset: Vec2) {
        for p in self.contours.iter_mut().flat_map(|c| c.points.iter_mut()) {
            p.x += offset.0;
            p.y += offset.1;
        }
        self.x_min += offset.0;
        self.x_max += offset.0;
        self.y_min += offset.1;
        self.y_max += offset.1;
    }

    /// Recompute the bounding box from the points
    pub fn update_bounds(&mut self) {
        let mut points = self.contours.iter().flat_map(|c| c.points.iter());
        let Some(first) = points.next() else {
            (self.x_min, self.y_min, self.x_max, self.y_max) = (0.0, 0.0, 0.0, 0.0);
            return;
        };
        let (mut x0, mut y0, mut x1, mut y1) = (first.x, first.y, first.x, first.y);
        for p in points {
            x0 = x0.min(p.x);
            y0 = y0.min(p.y);
            x1 = x1.max(p.x);
            y1 = y1.max(p.y);
        }
        (self.x_min, self.y_min, self.x_max, self.y_max) = (x0, y0, x1, y1);
    }
}

const IDENTITY: [f32; 4] = [1.0, 0.0, 0.0, 1.0];

#[inline]
fn apply(m: [f32; 4], v: Vec2) -> Vec2 {
    Vec2(m[0] * v.0 + m[2] * v.1, m[1] * v.0 + m[3] * v.1)
}

impl ParsedFont {
    /// Extract the outline of a glyph
    ///
    /// `GlyphId(0)` and glyphs without outline data yield an empty outline.
    pub fn outline(&self, id: GlyphId) -> Result<Outline, ParseError> {
        self.outline_at_depth(id, 0)
    }

    fn outline_at_depth(&self, id: GlyphId, depth: u8) -> Result<Outline, ParseError> {
        if depth > MAX_COMPOSITE_DEPTH {
            return Err(ParseError::CompositeDepth { glyph: id.0 });
        }
        if id == GlyphId::NOTDEF {
            return Ok(Outline::default());
        }
        let range = self.glyph_range(id)?;
        if range.is_empty() {
            return Ok(Outline::default());
        }

        let mut r = Reader::new(&self.data()[range]);
        let num_contours = r.i16()?;
        let x_min = r.i16()?;
        let y_min = r.i16()?;
        let x_max = r.i16()?;
        let y_max = r.i16()?;

        if num_contours >= 0 {
            let mut outline = read_simple(&mut r, num_contours as usize)?;
            outline.x_min = f32::from(x_min);
            outline.y_min = f32::from(y_min);
            outline.x_max = f32::from(x_max);
            outline.y_max = f32::from(y_max);
            Ok(outline)
        } else {
            self.read_composite(id, &mut r, depth)
        }
    }

    fn read_composite(
        &self,
        id: GlyphId,
        r: &mut Reader,
        depth: u8,
    ) -> Result<Outline, ParseError> {
        let mut outline = Outline::default();

        loop {
            let flags = ComponentFlags::from_bits_retain(r.u16()?);
            let child = GlyphId(r.u16()?);

            let words = flags.contains(ComponentFlags::ARGS_ARE_WORDS);
            let xy = flags.contains(ComponentFlags::ARGS_ARE_XY_VALUES);
            let (arg1, arg2): (i32, i32) = match (words, xy) {
                (true, true) => (r.i16()?.into(), r.i16()?.into()),
                (true, false) => (r.u16()?.into(), r.u16()?.into()),
                (false, true) => (r.i8()?.into(), r.i8()?.into()),
                (false, false) => (r.u8()?.into(), r.u8()?.into()),
            };

            let m = if flags.contains(ComponentFlags::HAVE_SCALE) {
                let s = r.f2dot14()?;
                [s, 0.0, 0.0, s]
            } else if flags.contains(ComponentFlags::HAVE_XY_SCALE) {
                let sx = r.f2dot14()?;
                let sy = r.f2dot14()?;
                [sx, 0.0, 0.0, sy]
            } else if flags.contains(ComponentFlags::HAVE_TWO_BY_TWO) {
                [r.f2dot14()?, r.f2dot14()?, r.f2dot14()?, r.f2dot14()?]
            } else {
                IDENTITY
            };

            let mut component = self.outline_at_depth(child, depth + 1)?;
            if m != IDENTITY {
                component.transform(m);
            }

            let offset = if xy {
                let offset = Vec2(arg1 as f32, arg2 as f32);
                if flags.contains(ComponentFlags::SCALED_COMPONENT_OFFSET)
                    && !flags.contains(ComponentFlags::UNSCALED_COMPONENT_OFFSET)
                {
                    apply(m, offset)
                } else {
                    offset
                }
            } else {
                // Align point arg2 of the component with point arg1 of the
                // outline assembled so far
                let anchor = |point: i32| ParseError::CompositeAnchor {
                    glyph: id.0,
                    point: point as u16,
                };
                let parent = outline.point(arg1 as usize).ok_or_else(|| anchor(arg1))?;
                let child = component.point(arg2 as usize).ok_or_else(|| anchor(arg2))?;
                parent.pos() - child.pos()
            };
            component.translate(offset);
            outline.contours.append(&mut component.contours);

            if !flags.contains(ComponentFlags::MORE_COMPONENTS) {
                break;
            }
        }

        outline.update_bounds();
        Ok(outline)
    }
}

/// Read a simple glyph's contours, following the 10-byte glyph header
fn read_simple(r: &mut Reader, num_contours: usize) -> Result<Outline, ParseError> {
    if num_contours == 0 {
        return Ok(Outline::default());
    }

    let mut end_points: SmallVec<[u16; 8]> = SmallVec::with_capacity(num_contours);
    for _ in 0..num_contours {
        let end = r.u16()?;
        if end_points.last().is_some_and(|last| end <= *last) {
            return Err(ParseError::InvalidValue("contour end points not increasing"));
        }
        end_points.push(end);
    }
    let num_points = usize::from(end_points[num_contours - 1]) + 1;

    let instruction_len = r.u16()?;
    r.skip(usize::from(instruction_len));

    let mut flags = Vec::with_capacity(num_points);
    while flags.len() < num_points {
        let flag = PointFlags::from_bits_retain(r.u8()?);
        flags.push(flag);
        if flag.contains(PointFlags::REPEAT) {
            let count = usize::from(r.u8()?);
            let count = count.min(num_points - flags.len());
            flags.extend(std::iter::repeat(flag).take(count));
        }
    }

    let xs = read_coords(r, &flags, PointFlags::X_SHORT, PointFlags::X_SAME_OR_POSITIVE)?;
    let ys = read_coords(r, &flags, PointFlags::Y_SHORT, PointFlags::Y_SAME_OR_POSITIVE)?;

    let mut contours = Vec::with_capacity(num_contours);
    let mut start = 0;
    for end in end_points {
        let end = usize::from(end);
        let points = (start..=end)
            .map(|i| Point {
                x: f32::from(xs[i]),
                y: f32::from(ys[i]),
                on_curve: flags[i].contains(PointFlags::ON_CURVE),
            })
            .collect();
        contours.push(Contour { points });
        start = end + 1;
    }

    Ok(Outline {
        contours,
        ..Outline::default()
    })
}

/// Read one axis of delta-encoded coordinates
fn read_coords(
    r: &mut Reader,
    flags: &[PointFlags],
    short: PointFlags,
    same_or_positive: PointFlags,
) -> Result<Vec<i16>, ParseError> {
    let mut coords = Vec::with_capacity(flags.len());
    let mut value: i16 = 0;
    for flag in flags {
        let delta = if flag.contains(short) {
            let d = i16::from(r.u8()?);
            if flag.contains(same_or_positive) {
                d
            } else {
                -d
            }
        } else if flag.contains(same_or_positive) {
            0
        } else {
            r.i16()?
        };
        value = value.wrapping_add(delta);
        coords.push(value);
    }
    Ok(coords)
}
