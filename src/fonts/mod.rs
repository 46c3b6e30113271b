// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE-APACHE file or at:
//     https://www.apache.org/licenses/LICENSE-2.0

//! Font file parsing
//!
//! This module reads TrueType (`glyf`-flavoured sfnt) font files directly:
//!
//! -   [`reader`]: positioned big-endian cursor and the table directory
//! -   [`CharMap`]: codepoint to glyph mapping (`cmap` format 4)
//! -   [`ParsedFont`]: global metrics, horizontal metrics, glyph locations and
//!     legacy kerning
//! -   [`Outline`]: simple and composite glyph outlines from `glyf`
//! -   [`SystemFonts`]: locate installed font files by family
//!
//! ### Units
//!
//! Font files use an internally defined *font unit*; `unitsPerEm` font units
//! span one Em. Given a font size in pixels per Em (`dpem`), the scale factor
//! used throughout this library is [`crate::DPU`]: pixels per font unit.

use thiserror::Error;

mod cmap;
mod face;
mod outline;
pub mod reader;
mod resolver;

pub use cmap::CharMap;
pub use face::ParsedFont;
pub use outline::{Contour, Outline, Point, MAX_COMPOSITE_DEPTH};
pub use reader::Tag;
pub use resolver::{FamilyName, Style, SystemFonts, Weight};

/// Glyph identifier
///
/// An index into the font's glyph tables. `GlyphId(0)` is the special
/// "missing glyph".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GlyphId(pub u16);

impl GlyphId {
    /// The missing glyph
    pub const NOTDEF: GlyphId = GlyphId(0);
}

/// Font parsing errors
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("unexpected end of data at offset {offset}")]
    UnexpectedEof { offset: usize },
    #[error("not a TrueType font (sfnt version {0:#010x})")]
    BadMagic(u32),
    #[error("missing required table `{0}`")]
    MissingTable(Tag),
    #[error("unsupported cmap subtable format {0}")]
    UnsupportedCmapFormat(u16),
    #[error("no usable cmap subtable")]
    NoCmapSubtable,
    #[error("glyph {0} out of range")]
    GlyphOutOfRange(u16),
    #[error("composite glyph {glyph} nested deeper than {MAX_COMPOSITE_DEPTH} levels")]
    CompositeDepth { glyph: u16 },
    #[error("composite glyph {glyph}: anchor point {point} does not exist")]
    CompositeAnchor { glyph: u16, point: u16 },
    #[error("invalid value: {0}")]
    InvalidValue(&'static str),
}
