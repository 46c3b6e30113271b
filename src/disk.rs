// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE-APACHE file or at:
//     https://www.apache.org/licenses/LICENSE-2.0

//! On-disk atlas cache
//!
//! Each atlas is stored in its own file, named by the SHA-256 hash of its
//! cache key. All values are little-endian:
//!
//! ```none
//! magic                   6 bytes, "KFATLS"
//! version                 i32
//! width, height           i32 ×2
//! format                  i32 (PixelFormat ordinal)
//! fallback codepoint      i32 (-1 if none)
//! ascent, descent, gap    f32 ×3
//! pixel data length       i32
//! pixel data              (bytes)
//! glyph count             i32
//!   codepoint             i32
//!   advance_x, offset_x, offset_y, width, height, uv.x, uv.y, uv.w, uv.h
//!                         f32 ×9
//! kerning count           i32
//!   key                   u32 (left << 16 | right)
//!   adjustment            f32
//! ```
//!
//! A file with the wrong magic or version, or which is truncated or
//! inconsistent, is an error rather than a cache miss.

use crate::atlas::{FontAtlas, GlyphPlacement, LineMetrics};
use crate::{Error, PixelFormat, UvRect};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// File magic
pub const MAGIC: &[u8; 6] = b"KFATLS";
/// Current format version
pub const VERSION: i32 = 1;

const EXTENSION: &str = "bin";

/// Hex-encoded SHA-256 digest
pub fn sha256_hex(data: &[u8]) -> String {
    Sha256::digest(data)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Directory of persisted atlases
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiskCache {
    dir: PathBuf,
}

impl DiskCache {
    /// Construct over a directory
    ///
    /// The directory is created on first store.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        DiskCache { dir: dir.into() }
    }

    #[inline]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file for a cache key
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{EXTENSION}", sha256_hex(key.as_bytes())))
    }

    /// Load the atlas stored for `key`
    ///
    /// A missing file is a miss (`Ok(None)`).
    pub fn load(&self, key: &str) -> Result<Option<FontAtlas>, Error> {
        let path = self.path_for(key);
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(Error::io(path, err)),
        };
        decode(&data)
            .map(Some)
            .map_err(|reason| Error::disk(path, reason))
    }

    /// Store an atlas under `key`
    ///
    /// The file is written in full to a temporary name and then renamed, so
    /// readers never observe a partial file.
    pub fn store(&self, key: &str, atlas: &FontAtlas) -> Result<(), Error> {
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        fs::create_dir_all(&self.dir).map_err(|err| Error::io(&self.dir, err))?;
        let path = self.path_for(key);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        let temp = path.with_extension(format!("{}-{n}.tmp", std::process::id()));

        let data = encode(atlas).map_err(|reason| Error::disk(&path, reason))?;
        fs::write(&temp, data).map_err(|err| Error::io(&temp, err))?;
        if let Err(err) = fs::rename(&temp, &path) {
            let _ = fs::remove_file(&temp);
            return Err(Error::io(path, err));
        }
        Ok(())
    }

    /// Remove the entry for `key`
    ///
    /// Returns true if a file was removed.
    pub fn remove(&self, key: &str) -> Result<bool, Error> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(Error::io(path, err)),
        }
    }

    /// Remove all entries
    ///
    /// Only files with the cache's extension are touched. Returns the number
    /// of files removed.
    pub fn clear(&self) -> Result<usize, Error> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(Error::io(&self.dir, err)),
        };
        let mut count = 0;
        for entry in entries {
            let path = entry.map_err(|err| Error::io(&self.dir, err))?.path();
            if path.extension().is_some_and(|ext| ext == EXTENSION) {
                fs::remove_file(&path).map_err(|err| Error::io(&path, err))?;
                count += 1;
            }
        }
        log::debug!("DiskCache::clear: removed {count} entries from {}", self.dir.display());
        Ok(count)
    }
}

fn put_i32(out: &mut Vec<u8>, v: i32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_f32(out: &mut Vec<u8>, v: f32) {
    out.extend_from_slice(&v.to_le_bytes());
}

/// Lengths and counts are stored as `i32`; larger values cannot be read back
fn put_len(out: &mut Vec<u8>, len: usize) -> Result<(), String> {
    let v = i32::try_from(len).map_err(|_| format!("length {len} exceeds i32 range"))?;
    put_i32(out, v);
    Ok(())
}

/// Serialize an atlas
///
/// Glyphs and kerning pairs are written in ascending key order, so equal
/// atlases encode identically.
///
/// Fails if a dimension or length does not fit the format's `i32` fields.
pub fn encode(atlas: &FontAtlas) -> Result<Vec<u8>, String> {
    let mut glyphs: Vec<_> = atlas.glyphs().collect();
    glyphs.sort_by_key(|(c, _)| *c);
    let mut kerning: Vec<_> = atlas.kerning_pairs().collect();
    kerning.sort_by_key(|(k, _)| *k);

    let capacity = 64 + atlas.pixels().len() + 40 * glyphs.len() + 8 * kerning.len();
    let mut out = Vec::with_capacity(capacity);
    out.extend_from_slice(MAGIC);
    put_i32(&mut out, VERSION);
    put_len(&mut out, atlas.width() as usize)?;
    put_len(&mut out, atlas.height() as usize)?;
    put_i32(&mut out, atlas.format() as i32);
    let fallback = atlas
        .fallback_codepoint()
        .and_then(|c| i32::try_from(c).ok())
        .unwrap_or(-1);
    put_i32(&mut out, fallback);
    put_f32(&mut out, atlas.ascent());
    put_f32(&mut out, atlas.descent());
    put_f32(&mut out, atlas.line_gap());

    put_len(&mut out, atlas.pixels().len())?;
    out.extend_from_slice(atlas.pixels());

    put_len(&mut out, glyphs.len())?;
    for (c, g) in glyphs {
        put_len(&mut out, c as usize)?;
        for v in [
            g.advance_x, g.offset_x, g.offset_y, g.width, g.height, g.uv.x, g.uv.y, g.uv.w, g.uv.h,
        ] {
            put_f32(&mut out, v);
        }
    }

    put_len(&mut out, kerning.len())?;
    for (key, adj) in kerning {
        out.extend_from_slice(&key.to_le_bytes());
        put_f32(&mut out, adj);
    }
    Ok(out)
}

/// Little-endian cursor; failures are reported as a reason string
struct LeReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> LeReader<'a> {
    fn bytes(&mut self, n: usize) -> Result<&'a [u8], String> {
        let end = self.pos.checked_add(n).filter(|end| *end <= self.data.len());
        let Some(end) = end else {
            return Err(format!("truncated at offset {}", self.pos));
        };
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], String> {
        let mut buf = [0; N];
        buf.copy_from_slice(self.bytes(N)?);
        Ok(buf)
    }

    fn i32(&mut self) -> Result<i32, String> {
        Ok(i32::from_le_bytes(self.array()?))
    }

    fn u32(&mut self) -> Result<u32, String> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn f32(&mut self) -> Result<f32, String> {
        Ok(f32::from_le_bytes(self.array()?))
    }

    /// A non-negative `i32`
    fn count(&mut self, what: &str) -> Result<usize, String> {
        let v = self.i32()?;
        usize::try_from(v).map_err(|_| format!("negative {what}: {v}"))
    }
}

/// Deserialize an atlas
pub fn decode(data: &[u8]) -> Result<FontAtlas, String> {
    let mut r = LeReader { data, pos: 0 };
    if r.bytes(MAGIC.len())? != MAGIC {
        return Err("bad magic".to_string());
    }
    let version = r.i32()?;
    if version != VERSION {
        return Err(format!("unsupported version {version} (expected {VERSION})"));
    }
    let width = r.count("width")?;
    let height = r.count("height")?;
    let format = r.i32()?;
    let format =
        PixelFormat::from_ordinal(format).ok_or_else(|| format!("unknown pixel format {format}"))?;
    let fallback = r.i32()?;
    let fallback = u32::try_from(fallback).ok();
    let metrics = LineMetrics {
        ascent: r.f32()?,
        descent: r.f32()?,
        line_gap: r.f32()?,
    };

    let pixel_len = r.count("pixel data length")?;
    let expected = width
        .checked_mul(height)
        .and_then(|n| n.checked_mul(format.bytes_per_pixel()));
    if expected != Some(pixel_len) {
        return Err(format!(
            "pixel data length {pixel_len} does not match {width}×{height}"
        ));
    }
    let pixels = r.bytes(pixel_len)?.to_vec();

    let glyph_count = r.count("glyph count")?;
    let mut glyphs = HashMap::with_capacity(glyph_count.min(0x1_0000));
    for _ in 0..glyph_count {
        let c = r.count("codepoint")?;
        let mut v = [0.0; 9];
        for x in v.iter_mut() {
            *x = r.f32()?;
        }
        let placement = GlyphPlacement {
            advance_x: v[0],
            offset_x: v[1],
            offset_y: v[2],
            width: v[3],
            height: v[4],
            uv: UvRect {
                x: v[5],
                y: v[6],
                w: v[7],
                h: v[8],
            },
        };
        glyphs.insert(c as u32, placement);
    }

    let kerning_count = r.count("kerning count")?;
    let mut kerning = HashMap::with_capacity(kerning_count.min(0x1_0000));
    for _ in 0..kerning_count {
        let key = r.u32()?;
        kerning.insert(key, r.f32()?);
    }

    if r.pos != data.len() {
        return Err(format!("{} trailing bytes", data.len() - r.pos));
    }

    Ok(FontAtlas::new(
        width as u32,
        height as u32,
        format,
        pixels,
        glyphs,
        kerning,
        metrics,
        fallback,
    ))
}
