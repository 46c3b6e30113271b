// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE-APACHE file or at:
//     https://www.apache.org/licenses/LICENSE-2.0

//! Atlas building
//!
//! [`AtlasBuilder`] drives the whole pipeline: it loads and parses font files,
//! rasters glyphs, packs them into an atlas and extracts kerning, reusing the
//! results of earlier work via an [`AtlasCache`] at every stage.
//!
//! An atlas may merge several [`FontSource`]s. Sources are ordered by
//! ascending priority value; each codepoint is taken from the first source
//! declaring it, and later sources declaring the same codepoint are skipped.

use crate::atlas::{builtin, kern_key, pack, FontAtlas, GlyphPlacement, LineMetrics};
use crate::cache::{AtlasCache, CacheConfig, FontKey};
use crate::disk::{self, VERSION};
use crate::fonts::{GlyphId, ParsedFont};
use crate::raster::{self, BitmapKey, CoverageBitmap, ScratchPool};
use crate::{Error, DPU};
use easy_cast::Conv;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Highest supported codepoint (end of the Basic Multilingual Plane)
pub const MAX_CODEPOINT: u32 = 0xFFFF;

/// A sorted set of codepoints without duplicates
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct CodepointSet(Vec<u32>);

impl CodepointSet {
    /// Printable ASCII: U+0020 to U+007E
    pub fn ascii() -> Self {
        CodepointSet((0x20..=0x7E).collect())
    }

    /// Construct from inclusive ranges
    pub fn from_ranges(ranges: impl IntoIterator<Item = RangeInclusive<u32>>) -> Self {
        ranges.into_iter().flatten().collect()
    }

    /// Construct from a list of chars
    pub fn from_chars(chars: impl IntoIterator<Item = char>) -> Self {
        chars.into_iter().map(u32::from).collect()
    }

    /// Construct from all chars occurring in `text`
    pub fn from_text(text: &str) -> Self {
        Self::from_chars(text.chars())
    }

    /// Iterate in ascending order
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.iter().copied()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, c: u32) -> bool {
        self.0.binary_search(&c).is_ok()
    }

    /// The highest codepoint, if any
    pub fn max(&self) -> Option<u32> {
        self.0.last().copied()
    }

    /// Hex SHA-256 of the set's contents
    pub fn content_hash(&self) -> String {
        let bytes: Vec<u8> = self.0.iter().flat_map(|c| c.to_le_bytes()).collect();
        disk::sha256_hex(&bytes)
    }
}

impl FromIterator<u32> for CodepointSet {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        let mut list: Vec<u32> = iter.into_iter().collect();
        list.sort_unstable();
        list.dedup();
        CodepointSet(list)
    }
}

/// A font file contributing glyphs to an atlas
#[derive(Clone, Debug, PartialEq)]
pub struct FontSource {
    /// Path to a TrueType font file
    pub path: PathBuf,
    /// Codepoints to take from this font
    pub codepoints: CodepointSet,
    /// Ordering among sources; lower values take precedence
    pub priority: i32,
    /// Size multiplier applied to this font, relative to the atlas font size
    pub scale: f32,
}

impl FontSource {
    /// Construct with priority 0 and scale 1
    pub fn new(path: impl Into<PathBuf>, codepoints: CodepointSet) -> Self {
        FontSource {
            path: path.into(),
            codepoints,
            priority: 0,
            scale: 1.0,
        }
    }

    /// Set the priority
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Set the scale multiplier
    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }
}

/// Atlas build parameters
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AtlasParams {
    /// Font size in pixels per Em
    pub font_size: f32,
    /// Atlas width in pixels
    pub width: u32,
    /// Atlas height in pixels
    pub height: u32,
    /// Empty pixels right of and below each glyph
    pub padding: u32,
    /// Glyphs are rastered at this multiple of the target size then reduced
    pub oversample: u8,
}

impl Default for AtlasParams {
    fn default() -> Self {
        AtlasParams {
            font_size: 18.0,
            width: 512,
            height: 512,
            padding: 1,
            oversample: 2,
        }
    }
}

impl AtlasParams {
    /// Check parameters are usable
    pub fn validate(&self) -> Result<(), Error> {
        if !(self.font_size > 0.0 && self.font_size.is_finite()) {
            return Err(Error::InvalidParams("font size must be positive"));
        }
        if self.width == 0 || self.height == 0 {
            return Err(Error::InvalidParams("atlas dimensions must be non-zero"));
        }
        if self.oversample == 0 {
            return Err(Error::InvalidParams("oversample must be at least 1"));
        }
        Ok(())
    }
}

/// Cache identity of an atlas
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AtlasKey {
    /// Full key, including file modification stamps
    pub key: String,
    /// As `key` but without file stamps; matches every version of the atlas
    pub selector: String,
}

impl AtlasKey {
    /// Derive the key of an atlas
    ///
    /// This reads the metadata of each source file.
    pub fn new(sources: &[FontSource], params: &AtlasParams) -> Result<Self, Error> {
        let sorted = sort_sources(sources);
        let stamps = font_keys(&sorted)?;
        Ok(AtlasKey::derive(&sorted, &stamps, params))
    }

    fn derive(sorted: &[&FontSource], stamps: &[FontKey], params: &AtlasParams) -> Self {
        let mut key = String::new();
        for (source, stamp) in sorted.iter().zip(stamps) {
            let _ = write!(
                key,
                "{}|{}|{}|",
                source.path.display(),
                stamp.modified_nanos(),
                stamp.len()
            );
            write_source(&mut key, source);
        }
        write_params(&mut key, params);
        AtlasKey {
            key,
            selector: selector(sorted, params),
        }
    }
}

fn write_source(out: &mut String, source: &FontSource) {
    let _ = write!(
        out,
        "{}|{:08x}|{};",
        source.priority,
        source.scale.to_bits(),
        source.codepoints.content_hash()
    );
}

fn write_params(out: &mut String, params: &AtlasParams) {
    let _ = write!(
        out,
        "{:08x}|{}x{}|{}|{}|v{VERSION}",
        params.font_size.to_bits(),
        params.width,
        params.height,
        params.padding,
        params.oversample
    );
}

fn selector(sorted: &[&FontSource], params: &AtlasParams) -> String {
    let mut out = String::new();
    for source in sorted {
        let _ = write!(out, "{}|", source.path.display());
        write_source(&mut out, source);
    }
    write_params(&mut out, params);
    out
}

/// Sort by ascending priority, keeping the given order among equals
fn sort_sources(sources: &[FontSource]) -> Vec<&FontSource> {
    let mut sorted: Vec<&FontSource> = sources.iter().collect();
    sorted.sort_by_key(|source| source.priority);
    sorted
}

fn font_keys(sorted: &[&FontSource]) -> Result<Vec<FontKey>, Error> {
    sorted
        .iter()
        .map(|source| FontKey::for_path(&source.path))
        .collect()
}

/// Builds and caches font atlases
///
/// A builder may be shared between threads. Builders constructed over the
/// same [`AtlasCache`] (see [`AtlasBuilder::with_cache`]) share all cached
/// work.
#[derive(Debug)]
pub struct AtlasBuilder {
    cache: Arc<AtlasCache>,
    raster: raster::Config,
    pool: ScratchPool,
}

impl Default for AtlasBuilder {
    fn default() -> Self {
        AtlasBuilder::new(&CacheConfig::default())
    }
}

impl AtlasBuilder {
    /// Construct with a new cache
    pub fn new(config: &CacheConfig) -> Self {
        AtlasBuilder::with_cache(Arc::new(AtlasCache::new(config)))
    }

    /// Construct over an existing cache
    pub fn with_cache(cache: Arc<AtlasCache>) -> Self {
        AtlasBuilder {
            cache,
            raster: raster::Config::default(),
            pool: ScratchPool::default(),
        }
    }

    /// Access the cache
    #[inline]
    pub fn cache(&self) -> &Arc<AtlasCache> {
        &self.cache
    }

    /// Raster configuration
    #[inline]
    pub fn raster_config(&self) -> &raster::Config {
        &self.raster
    }

    /// Adjust raster configuration
    ///
    /// Note: cached glyph bitmaps are not keyed by raster configuration. Call
    /// [`AtlasCache::clear_memory`] when changing configuration of a builder
    /// which has already rastered glyphs.
    pub fn set_raster_config(&mut self, config: raster::Config) {
        self.raster = config;
    }

    /// Build (or fetch) an atlas merging glyphs from several fonts
    ///
    /// Atlases are cached in memory and on disk (when enabled), keyed by the
    /// sources (including file modification time and length) and parameters.
    /// A cached atlas is returned as the same `Arc` instance.
    ///
    /// Codepoints not provided by any source are not an error; look them up
    /// via [`FontAtlas::glyph_or_fallback`]. A corrupt disk cache entry is an
    /// error.
    pub fn build_merged_atlas(
        &self,
        sources: &[FontSource],
        params: &AtlasParams,
    ) -> Result<Arc<FontAtlas>, Error> {
        params.validate()?;
        if sources.is_empty() {
            return Err(Error::NoSources);
        }
        for source in sources {
            if !(source.scale > 0.0 && source.scale.is_finite()) {
                return Err(Error::InvalidParams("source scale must be positive"));
            }
            if let Some(c) = source.codepoints.max().filter(|c| *c > MAX_CODEPOINT) {
                return Err(Error::UnsupportedCodepoint(c));
            }
        }

        let sorted = sort_sources(sources);
        let stamps = font_keys(&sorted)?;
        let key = AtlasKey::derive(&sorted, &stamps, params);

        if let Some(atlas) = self.cache.atlas(&key.key) {
            log::debug!("build_merged_atlas: memory cache hit");
            return Ok(atlas);
        }
        if let Some(disk) = self.cache.disk() {
            if let Some(atlas) = disk.load(&key.key)? {
                log::info!(
                    "build_merged_atlas: loaded {} glyphs from {}",
                    atlas.glyph_count(),
                    disk.path_for(&key.key).display()
                );
                let atlas = Arc::new(atlas);
                self.cache.insert_atlas(key.key, key.selector, atlas.clone());
                return Ok(atlas);
            }
        }

        let start = Instant::now();
        let atlas = Arc::new(self.build(&sorted, &stamps, params)?);
        log::info!(
            "build_merged_atlas: built {} glyphs from {} source(s) into {}×{} in {}μs",
            atlas.glyph_count(),
            sorted.len(),
            atlas.width(),
            atlas.height(),
            start.elapsed().as_micros()
        );

        if let Some(disk) = self.cache.disk() {
            if let Err(err) = disk.store(&key.key, &atlas) {
                log::warn!("build_merged_atlas: failed to persist atlas: {err}");
            }
        }
        self.cache.insert_atlas(key.key, key.selector, atlas.clone());
        Ok(atlas)
    }

    /// Build (or fetch) an atlas from a single font
    pub fn build_atlas(
        &self,
        path: impl Into<PathBuf>,
        codepoints: CodepointSet,
        params: &AtlasParams,
    ) -> Result<Arc<FontAtlas>, Error> {
        self.build_merged_atlas(&[FontSource::new(path, codepoints)], params)
    }

    /// Build (or fetch) an atlas of printable ASCII from a single font
    pub fn build_ascii_atlas(
        &self,
        path: impl Into<PathBuf>,
        params: &AtlasParams,
    ) -> Result<Arc<FontAtlas>, Error> {
        self.build_atlas(path, CodepointSet::ascii(), params)
    }

    /// Get the built-in 5×7 bitmap font atlas at an integer scale
    ///
    /// This requires no font file. The result is cached in memory only.
    pub fn builtin_atlas(&self, scale: u32) -> Result<Arc<FontAtlas>, Error> {
        let key = format!("builtin|{scale}|v{VERSION}");
        if let Some(atlas) = self.cache.atlas(&key) {
            return Ok(atlas);
        }
        let atlas = Arc::new(builtin::atlas(scale)?);
        self.cache.insert_atlas(key.clone(), key, atlas.clone());
        Ok(atlas)
    }

    /// Evict an atlas and the fonts it uses
    ///
    /// Every cached version of the atlas for `sources` and `params` is
    /// removed from memory and disk, as are parsed fonts and glyph bitmaps of
    /// every source path.
    pub fn invalidate(&self, sources: &[FontSource], params: &AtlasParams) -> Result<(), Error> {
        let sorted = sort_sources(sources);
        let removed = self.cache.remove_atlases(&selector(&sorted, params));

        if let Some(disk) = self.cache.disk() {
            for key in &removed {
                disk.remove(key)?;
            }
            // The current version may exist on disk only
            if let Ok(stamps) = font_keys(&sorted) {
                disk.remove(&AtlasKey::derive(&sorted, &stamps, params).key)?;
            }
        }

        for source in &sorted {
            self.cache.remove_font_path(&source.path);
        }
        log::debug!(
            "invalidate: removed {} atlas(es) from memory for {} source(s)",
            removed.len(),
            sorted.len()
        );
        Ok(())
    }

    /// Evict parsed data and glyph bitmaps of one font file
    ///
    /// Atlases are unaffected (but are keyed by file modification time).
    pub fn invalidate_font(&self, path: &Path) {
        self.cache.remove_font_path(path);
    }

    fn load_font(&self, key: &FontKey) -> Result<Arc<ParsedFont>, Error> {
        if let Some(font) = self.cache.font(key) {
            log::debug!("load_font: cache hit for {}", key.path().display());
            return Ok(font);
        }

        let path = key.path();
        let data = std::fs::read(path).map_err(|err| Error::io(path, err))?;
        let font = ParsedFont::parse(data).map_err(|source| Error::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!(
            "load_font: parsed {} ({} glyphs, {} units/Em)",
            path.display(),
            font.num_glyphs(),
            font.units_per_em()
        );

        let font = Arc::new(font);
        self.cache.insert_font(key.clone(), font.clone());
        Ok(font)
    }

    fn glyph_bitmap(
        &self,
        font: &ParsedFont,
        font_key: &FontKey,
        id: GlyphId,
        key: BitmapKey,
        render_scale: f32,
    ) -> Result<Arc<CoverageBitmap>, Error> {
        if let Some(bitmap) = self.cache.bitmap(&key) {
            return Ok(bitmap);
        }

        let outline = font.outline(id).map_err(|source| Error::Parse {
            path: font_key.path().to_path_buf(),
            source,
        })?;
        let bitmap = raster::rasterize(&self.raster, &self.pool, &outline, render_scale);
        let bitmap = Arc::new(raster::downsample(&bitmap, key.oversample()));
        self.cache.insert_bitmap(key, bitmap.clone());
        Ok(bitmap)
    }

    fn build(
        &self,
        sorted: &[&FontSource],
        stamps: &[FontKey],
        params: &AtlasParams,
    ) -> Result<FontAtlas, Error> {
        let (width, height) = (params.width, params.height);
        let too_small = |codepoint| Error::AtlasTooSmall {
            width,
            height,
            codepoint,
        };

        let mut packer = pack::ShelfPacker::new(width, height, params.padding);
        let mut canvas = pack::AtlasCanvas::new(width, height);
        let (x, y) = packer.allocate(1, 1).ok_or_else(|| too_small(0))?;
        canvas.set_white(x, y);

        let mut glyphs: HashMap<u32, GlyphPlacement> = HashMap::new();
        let mut kerning = HashMap::new();
        let mut metrics = LineMetrics::default();

        for (index, (source, font_key)) in sorted.iter().zip(stamps).enumerate() {
            let font = self.load_font(font_key)?;
            let dpu = font.dpu(params.font_size * source.scale);
            let render_scale = dpu.0 * f32::from(params.oversample);

            if index == 0 {
                metrics = LineMetrics {
                    ascent: dpu.i16_to_px(font.ascender()),
                    descent: dpu.i16_to_px(font.descender()),
                    line_gap: dpu.i16_to_px(font.line_gap()),
                };
            }

            for c in source.codepoints.iter() {
                if glyphs.contains_key(&c) {
                    log::debug!(
                        "build: U+{c:04X} already provided; skipping in {}",
                        source.path.display()
                    );
                    continue;
                }

                let id = font.glyph_index(u16::conv(c));
                if id == GlyphId::NOTDEF {
                    log::warn!(
                        "build: U+{c:04X} is not mapped by {}",
                        source.path.display()
                    );
                }

                let mut placement = GlyphPlacement {
                    advance_x: dpu.u16_to_px(font.advance(id)),
                    ..Default::default()
                };

                if c != u32::from(' ') && !font.is_empty_glyph(id) {
                    let key = BitmapKey::new(
                        font_key.id(),
                        c,
                        params.font_size,
                        params.oversample,
                        source.scale,
                    );
                    let bitmap = self.glyph_bitmap(&font, font_key, id, key, render_scale)?;
                    if !bitmap.is_empty() {
                        let (x, y) = packer
                            .allocate(bitmap.width, bitmap.height)
                            .ok_or_else(|| too_small(c))?;
                        placement.uv = canvas.blit(x, y, &bitmap);
                        placement.offset_x = f32::conv(bitmap.left);
                        placement.offset_y = -f32::conv(bitmap.top);
                        placement.width = f32::conv(bitmap.width);
                        placement.height = f32::conv(bitmap.height);
                    }
                }

                glyphs.insert(c, placement);
            }

            if index == 0 {
                extract_kerning(&font, source, dpu, &mut kerning);
            }
        }

        log::debug!(
            "build: packed {} glyphs using {} of {} rows",
            glyphs.len(),
            packer.used_height(),
            height
        );

        Ok(FontAtlas::new(
            width,
            height,
            canvas.format(),
            canvas.into_pixels(),
            glyphs,
            kerning,
            metrics,
            None,
        ))
    }
}

/// Collect kerning between codepoints of `source`, scaled to pixels
fn extract_kerning(
    font: &ParsedFont,
    source: &FontSource,
    dpu: DPU,
    kerning: &mut HashMap<u32, f32>,
) {
    let mut codepoints: HashMap<GlyphId, Vec<u32>> = HashMap::new();
    for c in source.codepoints.iter() {
        let id = font.glyph_index(u16::conv(c));
        if id != GlyphId::NOTDEF {
            codepoints.entry(id).or_default().push(c);
        }
    }

    for (left, right, adjustment) in font.kerning_pairs() {
        let (Some(lefts), Some(rights)) = (codepoints.get(&left), codepoints.get(&right)) else {
            continue;
        };
        let adjustment = dpu.i16_to_px(adjustment);
        for l in lefts {
            for r in rights {
                if let Some(key) = kern_key(*l, *r) {
                    kerning.insert(key, adjustment);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codepoint_set_sorts_and_dedups() {
        let set = CodepointSet::from_text("hello");
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![0x65, 0x68, 0x6C, 0x6F]);
        assert!(set.contains(u32::from('l')));
        assert!(!set.contains(u32::from('x')));

        let ranges = CodepointSet::from_ranges([0x41..=0x43, 0x42..=0x44]);
        assert_eq!(ranges.len(), 4);
        assert_eq!(ranges.max(), Some(0x44));
        assert_eq!(CodepointSet::ascii().len(), 95);
    }

    #[test]
    fn content_hash_depends_on_contents_only() {
        let a = CodepointSet::from_chars(['b', 'a']);
        let b = CodepointSet::from_text("aab");
        assert_eq!(a.content_hash(), b.content_hash());
        assert_ne!(a.content_hash(), CodepointSet::from_text("ac").content_hash());
    }

    #[test]
    fn params_validation() {
        assert!(AtlasParams::default().validate().is_ok());
        let bad = [
            AtlasParams {
                font_size: 0.0,
                ..Default::default()
            },
            AtlasParams {
                font_size: f32::NAN,
                ..Default::default()
            },
            AtlasParams {
                width: 0,
                ..Default::default()
            },
            AtlasParams {
                oversample: 0,
                ..Default::default()
            },
        ];
        for params in bad {
            assert!(matches!(params.validate(), Err(Error::InvalidParams(_))));
        }
    }

    #[test]
    fn sources_sort_stably_by_priority() {
        let set = CodepointSet::ascii;
        let sources = [
            FontSource::new("b", set()).with_priority(1),
            FontSource::new("a", set()).with_priority(0),
            FontSource::new("c", set()).with_priority(1),
        ];
        let sorted = sort_sources(&sources);
        let paths: Vec<_> = sorted.iter().map(|s| s.path.to_str().unwrap()).collect();
        assert_eq!(paths, ["a", "b", "c"]);
    }

    #[test]
    fn key_includes_stamps_but_selector_does_not() {
        let source = FontSource::new("/fonts/a.ttf", CodepointSet::ascii());
        let sorted = [&source];
        let params = AtlasParams::default();
        let k1 = AtlasKey::derive(&sorted, &[FontKey::new("/fonts/a.ttf", 1, 10)], &params);
        let k2 = AtlasKey::derive(&sorted, &[FontKey::new("/fonts/a.ttf", 2, 10)], &params);
        assert_ne!(k1.key, k2.key);
        assert_eq!(k1.selector, k2.selector);

        let other = AtlasParams {
            padding: 2,
            ..params
        };
        let k3 = AtlasKey::derive(&sorted, &[FontKey::new("/fonts/a.ttf", 1, 10)], &other);
        assert_ne!(k1.selector, k3.selector);
    }

    #[test]
    fn merged_atlas_rejects_bad_input() {
        let builder = AtlasBuilder::new(&CacheConfig::memory_only());
        let params = AtlasParams::default();
        assert!(matches!(
            builder.build_merged_atlas(&[], &params),
            Err(Error::NoSources)
        ));

        let wide = FontSource::new("/nonexistent.ttf", CodepointSet::from_chars(['a', '😀']));
        assert!(matches!(
            builder.build_merged_atlas(&[wide], &params),
            Err(Error::UnsupportedCodepoint(0x1F600))
        ));

        let scaled = FontSource::new("/nonexistent.ttf", CodepointSet::ascii()).with_scale(0.0);
        assert!(matches!(
            builder.build_merged_atlas(&[scaled], &params),
            Err(Error::InvalidParams(_))
        ));

        let missing = FontSource::new("/nonexistent.ttf", CodepointSet::ascii());
        assert!(matches!(
            builder.build_merged_atlas(&[missing], &params),
            Err(Error::Io { .. })
        ));
    }

    #[test]
    fn builtin_atlas_is_cached() {
        let builder = AtlasBuilder::new(&CacheConfig::memory_only());
        let a = builder.builtin_atlas(2).unwrap();
        let b = builder.builtin_atlas(2).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(builder.cache().atlas_count(), 1);
        assert!(builder.builtin_atlas(0).is_err());
    }
}
