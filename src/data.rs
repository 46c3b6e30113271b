// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE-APACHE file or at:
//     https://www.apache.org/licenses/LICENSE-2.0

//! Simple data types

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

/// 2D vector (point or offset) in device or font space
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Vec2(pub f32, pub f32);

impl Vec2 {
    /// Zero
    pub const ZERO: Vec2 = Vec2(0.0, 0.0);

    /// Midpoint of `self` and `other`
    #[inline]
    pub fn mid(self, other: Vec2) -> Vec2 {
        Vec2(0.5 * (self.0 + other.0), 0.5 * (self.1 + other.1))
    }

    /// Euclidean length
    #[inline]
    pub fn length(self) -> f32 {
        (self.0 * self.0 + self.1 * self.1).sqrt()
    }

    /// Linear interpolation: `self + (other - self) × t`
    #[inline]
    pub fn lerp(self, other: Vec2, t: f32) -> Vec2 {
        self + (other - self) * t
    }
}

impl Add for Vec2 {
    type Output = Vec2;
    #[inline]
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2(self.0 + rhs.0, self.1 + rhs.1)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;
    #[inline]
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2(self.0 - rhs.0, self.1 - rhs.1)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;
    #[inline]
    fn mul(self, rhs: f32) -> Vec2 {
        Vec2(self.0 * rhs, self.1 * rhs)
    }
}

/// A texture-space rectangle
///
/// All fields are normalised to the range `0.0..=1.0` relative to the atlas
/// dimensions.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct UvRect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl UvRect {
    /// Construct from a pixel rectangle within a texture of the given size
    pub fn from_pixels(x: u32, y: u32, w: u32, h: u32, tex_width: u32, tex_height: u32) -> Self {
        let tw = tex_width as f32;
        let th = tex_height as f32;
        UvRect {
            x: x as f32 / tw,
            y: y as f32 / th,
            w: w as f32 / tw,
            h: h as f32 / th,
        }
    }

    /// Convert back to a pixel rectangle `(x, y, w, h)`
    pub fn to_pixels(&self, tex_width: u32, tex_height: u32) -> (u32, u32, u32, u32) {
        let tw = tex_width as f32;
        let th = tex_height as f32;
        (
            (self.x * tw).round() as u32,
            (self.y * th).round() as u32,
            (self.w * tw).round() as u32,
            (self.h * th).round() as u32,
        )
    }
}

/// Pixel format of an atlas bitmap
///
/// The discriminant is the ordinal stored in the disk cache.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PixelFormat {
    /// 8-bit red, green, blue, alpha
    #[default]
    Rgba8 = 0,
}

impl PixelFormat {
    /// Bytes per pixel
    #[inline]
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgba8 => 4,
        }
    }

    /// Look up a format from its ordinal
    pub fn from_ordinal(ordinal: i32) -> Option<Self> {
        match ordinal {
            0 => Some(PixelFormat::Rgba8),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uv_rect_pixel_conversion() {
        let uv = UvRect::from_pixels(10, 20, 30, 40, 512, 256);
        assert_eq!(uv.to_pixels(512, 256), (10, 20, 30, 40));
    }

    #[test]
    fn vec2_ops() {
        let a = Vec2(1.0, 2.0);
        let b = Vec2(3.0, 6.0);
        assert_eq!(a.mid(b), Vec2(2.0, 4.0));
        assert_eq!(a.lerp(b, 0.5), Vec2(2.0, 4.0));
        assert_eq!((b - a).length(), (4.0f32 + 16.0).sqrt());
    }
}
