// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE-APACHE file or at:
//     https://www.apache.org/licenses/LICENSE-2.0

//! Atlas caches
//!
//! Three bounded in-memory tiers (parsed fonts, glyph bitmaps and finished
//! atlases) plus an optional on-disk tier for finished atlases. Memory tiers
//! evict in insertion order (first in, first out); reading an entry does not
//! refresh it.
//!
//! All in-memory tiers share one lock, held only for the duration of each map
//! access. Parsing and rastering happen outside the lock, so two threads may
//! race to produce the same entry; the last store wins.

#![allow(clippy::len_without_is_empty)]

use crate::disk::DiskCache;
use crate::fonts::ParsedFont;
use crate::raster::{BitmapKey, CoverageBitmap};
use crate::{Error, FontAtlas};
use std::borrow::Borrow;
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::UNIX_EPOCH;

/// Environment variable overriding the default disk cache directory
pub const CACHE_DIR_ENV: &str = "KAS_FONT_ATLAS_CACHE";

/// A map with bounded size and first-in-first-out eviction
#[derive(Clone, Debug)]
pub struct FifoMap<K, V> {
    map: HashMap<K, V>,
    order: VecDeque<K>,
    capacity: usize,
}

impl<K: Clone + Eq + Hash, V> FifoMap<K, V> {
    /// Construct with the given capacity
    ///
    /// With capacity zero, nothing is ever stored.
    pub fn new(capacity: usize) -> Self {
        FifoMap {
            map: HashMap::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[inline]
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.map.get(key)
    }

    #[inline]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.map.contains_key(key)
    }

    /// Insert an entry, evicting the oldest entries if full
    ///
    /// Replacing the value of an existing key does not change its position in
    /// the eviction order.
    pub fn insert(&mut self, key: K, value: V) {
        if self.capacity == 0 {
            return;
        }
        if let Some(slot) = self.map.get_mut(&key) {
            *slot = value;
            return;
        }
        while self.map.len() >= self.capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            self.map.remove(&oldest);
        }
        self.order.push_back(key.clone());
        self.map.insert(key, value);
    }

    /// Remove an entry
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        let value = self.map.remove(key)?;
        self.order.retain(|k| <K as Borrow<Q>>::borrow(k) != key);
        Some(value)
    }

    /// Retain only entries for which `f` returns true
    pub fn retain(&mut self, mut f: impl FnMut(&K, &V) -> bool) {
        self.map.retain(|k, v| f(k, v));
        let map = &self.map;
        self.order.retain(|k| map.contains_key(k));
    }

    /// Remove all entries
    pub fn clear(&mut self) {
        self.map.clear();
        self.order.clear();
    }
}

fn hash_of<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Hash of a font path, as stored in the high half of [`FontKey::id`]
fn path_hash(path: &Path) -> u32 {
    (hash_of(path) >> 32) as u32
}

/// Identity of a font file's contents
///
/// A font is identified by its path together with its modification time and
/// length, so that replacing a file on disk yields a new identity.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FontKey {
    path: PathBuf,
    modified: u128,
    len: u64,
}

impl FontKey {
    /// Construct from explicit values
    pub fn new(path: impl Into<PathBuf>, modified_nanos: u128, len: u64) -> Self {
        FontKey {
            path: path.into(),
            modified: modified_nanos,
            len,
        }
    }

    /// Read the file's metadata
    pub fn for_path(path: &Path) -> Result<Self, Error> {
        let meta = std::fs::metadata(path).map_err(|err| Error::io(path, err))?;
        let modified = meta
            .modified()
            .ok()
            .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        Ok(FontKey::new(path, modified, meta.len()))
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Modification time, in nanoseconds since the Unix epoch
    #[inline]
    pub fn modified_nanos(&self) -> u128 {
        self.modified
    }

    /// File length in bytes
    #[inline]
    pub fn len(&self) -> u64 {
        self.len
    }

    /// A compact identifier, used in [`BitmapKey`]
    ///
    /// The high 32 bits depend only on the path, allowing all bitmaps of a
    /// path to be evicted regardless of file version.
    pub fn id(&self) -> u64 {
        let stamp = hash_of(&(self.modified, self.len)) as u32;
        (u64::from(path_hash(&self.path)) << 32) | u64::from(stamp)
    }
}

/// Cache configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of parsed fonts held in memory
    pub font_capacity: usize,
    /// Maximum number of glyph bitmaps held in memory
    pub bitmap_capacity: usize,
    /// Maximum number of atlases held in memory
    pub atlas_capacity: usize,
    /// Directory of the on-disk atlas cache; `None` disables it
    pub disk_dir: Option<PathBuf>,
}

impl Default for CacheConfig {
    /// Default capacities; the disk cache directory is read from
    /// `KAS_FONT_ATLAS_CACHE` when set, else is `kas-font-atlas` within the
    /// system temporary directory.
    fn default() -> Self {
        let disk_dir = match std::env::var_os(CACHE_DIR_ENV) {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => std::env::temp_dir().join("kas-font-atlas"),
        };
        CacheConfig {
            disk_dir: Some(disk_dir),
            ..CacheConfig::memory_only()
        }
    }
}

impl CacheConfig {
    /// Default capacities without a disk cache
    pub fn memory_only() -> Self {
        CacheConfig {
            font_capacity: 32,
            bitmap_capacity: 4096,
            atlas_capacity: 8,
            disk_dir: None,
        }
    }

    /// Set the parsed-font capacity
    pub fn with_font_capacity(mut self, capacity: usize) -> Self {
        self.font_capacity = capacity;
        self
    }

    /// Set the glyph-bitmap capacity
    pub fn with_bitmap_capacity(mut self, capacity: usize) -> Self {
        self.bitmap_capacity = capacity;
        self
    }

    /// Set the atlas capacity
    pub fn with_atlas_capacity(mut self, capacity: usize) -> Self {
        self.atlas_capacity = capacity;
        self
    }

    /// Set (or with `None`, disable) the disk cache directory
    pub fn with_disk_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.disk_dir = dir;
        self
    }
}

#[derive(Debug)]
struct CachedAtlas {
    /// Identifies the source set and parameters, ignoring file versions
    selector: String,
    atlas: Arc<FontAtlas>,
}

#[derive(Debug)]
struct Tiers {
    fonts: FifoMap<FontKey, Arc<ParsedFont>>,
    bitmaps: FifoMap<BitmapKey, Arc<CoverageBitmap>>,
    atlases: FifoMap<String, CachedAtlas>,
}

/// Storage for parsed fonts, glyph bitmaps and atlases
///
/// Construct one and share it (e.g. via `Arc`) between all
/// [`crate::AtlasBuilder`]s which should reuse each other's work. All methods
/// take `&self`; thread-safety is handled via an internal lock.
#[derive(Debug)]
pub struct AtlasCache {
    tiers: Mutex<Tiers>,
    disk: Option<DiskCache>,
}

impl Default for AtlasCache {
    fn default() -> Self {
        AtlasCache::new(&CacheConfig::default())
    }
}

impl AtlasCache {
    /// Construct
    pub fn new(config: &CacheConfig) -> Self {
        let tiers = Tiers {
            fonts: FifoMap::new(config.font_capacity),
            bitmaps: FifoMap::new(config.bitmap_capacity),
            atlases: FifoMap::new(config.atlas_capacity),
        };
        AtlasCache {
            tiers: Mutex::new(tiers),
            disk: config.disk_dir.clone().map(DiskCache::new),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Tiers> {
        self.tiers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The disk tier, if enabled
    #[inline]
    pub fn disk(&self) -> Option<&DiskCache> {
        self.disk.as_ref()
    }

    pub fn font(&self, key: &FontKey) -> Option<Arc<ParsedFont>> {
        self.lock().fonts.get(key).cloned()
    }

    pub fn insert_font(&self, key: FontKey, font: Arc<ParsedFont>) {
        self.lock().fonts.insert(key, font);
    }

    pub fn bitmap(&self, key: &BitmapKey) -> Option<Arc<CoverageBitmap>> {
        self.lock().bitmaps.get(key).cloned()
    }

    pub fn insert_bitmap(&self, key: BitmapKey, bitmap: Arc<CoverageBitmap>) {
        self.lock().bitmaps.insert(key, bitmap);
    }

    pub fn atlas(&self, key: &str) -> Option<Arc<FontAtlas>> {
        self.lock()
            .atlases
            .get(key)
            .map(|entry| entry.atlas.clone())
    }

    /// Store an atlas
    ///
    /// `selector` groups all versions of an atlas for [`Self::remove_atlases`].
    pub fn insert_atlas(&self, key: String, selector: String, atlas: Arc<FontAtlas>) {
        self.lock()
            .atlases
            .insert(key, CachedAtlas { selector, atlas });
    }

    /// Remove all in-memory atlases with the given selector
    ///
    /// Returns the keys removed.
    pub fn remove_atlases(&self, selector: &str) -> Vec<String> {
        let mut removed = Vec::new();
        self.lock().atlases.retain(|key, entry| {
            let keep = entry.selector != selector;
            if !keep {
                removed.push(key.clone());
            }
            keep
        });
        removed
    }

    /// Remove parsed fonts and glyph bitmaps of the font at `path`
    ///
    /// All versions of the file are affected.
    pub fn remove_font_path(&self, path: &Path) {
        let hash = path_hash(path);
        let mut tiers = self.lock();
        tiers.fonts.retain(|key, _| key.path() != path);
        tiers
            .bitmaps
            .retain(|key, _| (key.font() >> 32) as u32 != hash);
    }

    /// Number of parsed fonts held
    pub fn font_count(&self) -> usize {
        self.lock().fonts.len()
    }

    /// Number of glyph bitmaps held
    pub fn bitmap_count(&self) -> usize {
        self.lock().bitmaps.len()
    }

    /// Number of atlases held in memory
    pub fn atlas_count(&self) -> usize {
        self.lock().atlases.len()
    }

    /// Clear all in-memory tiers
    ///
    /// The disk tier is unaffected; see [`DiskCache::clear`].
    pub fn clear_memory(&self) {
        let mut tiers = self.lock();
        tiers.fonts.clear();
        tiers.bitmaps.clear();
        tiers.atlases.clear();
    }
}
