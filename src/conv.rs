// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE-APACHE file or at:
//     https://www.apache.org/licenses/LICENSE-2.0

//! Numeric conversions
//!
//! Atlas dimensions, bitmap sizes and table offsets are `u32`; indexing needs
//! `usize`. We assume `usize` is at least 32 bits wide.

use easy_cast::Cast;

/// Widen a `u32` size or offset for indexing
#[inline]
pub fn to_usize(x: u32) -> usize {
    x.cast()
}

/// Scale factor: pixels per font unit
///
/// Computed from a font size in pixels per Em and the font's `unitsPerEm`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DPU(pub f32);

impl DPU {
    /// Construct from pixels-per-Em and font units-per-Em
    #[inline]
    pub fn from_dpem(dpem: f32, units_per_em: u16) -> Self {
        DPU(dpem / f32::from(units_per_em.max(1)))
    }

    pub(crate) fn i16_to_px(self, x: i16) -> f32 {
        f32::from(x) * self.0
    }
    pub(crate) fn u16_to_px(self, x: u16) -> f32 {
        f32::from(x) * self.0
    }
}
