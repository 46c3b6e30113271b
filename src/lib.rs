// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE-APACHE file or at:
//     https://www.apache.org/licenses/LICENSE-2.0

//! KAS font atlas library
//!
//! Builds glyph atlases directly from TrueType font files: fonts are parsed
//! by [`fonts`], glyph outlines rastered by [`raster`] and packed into a
//! [`FontAtlas`] by an [`AtlasBuilder`]. Parsed fonts, glyph bitmaps and
//! finished atlases are cached in an [`AtlasCache`], with atlases optionally
//! persisted to disk.
//!
//! ```no_run
//! use kas_font_atlas::{AtlasBuilder, AtlasParams, CacheConfig};
//!
//! let builder = AtlasBuilder::new(&CacheConfig::default());
//! let atlas = builder.build_ascii_atlas("DejaVuSans.ttf", &AtlasParams::default())?;
//! let glyph = atlas.glyph_or_fallback('A'.into());
//! assert!(glyph.is_some());
//! # Ok::<(), kas_font_atlas::Error>(())
//! ```

pub mod conv;
pub use conv::DPU;

mod data;
pub use data::*;

mod error;
pub use error::Error;

pub mod atlas;
pub use atlas::{FontAtlas, GlyphPlacement, LineMetrics, TextureUpload};

mod builder;
pub use builder::{AtlasBuilder, AtlasKey, AtlasParams, CodepointSet, FontSource, MAX_CODEPOINT};

pub mod cache;
pub use cache::{AtlasCache, CacheConfig};

pub mod disk;
pub use disk::DiskCache;

pub mod fonts;
pub mod raster;
