// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE-APACHE file or at:
//     https://www.apache.org/licenses/LICENSE-2.0

//! System font discovery
//!
//! Locates installed font files by family so that they may be used as atlas
//! sources without hard-coding paths.

use fontdb::{Database, Family, Query, Source};
pub use fontdb::{Style, Weight};
use log::{debug, info};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Family descriptor
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FamilyName {
    /// A family named with a `String`
    Named(String),
    /// The default serif family
    Serif,
    /// The default sans-serif family
    SansSerif,
    /// The default monospace family
    Monospace,
}

impl From<&str> for FamilyName {
    fn from(name: &str) -> Self {
        FamilyName::Named(name.to_string())
    }
}

impl<'a> From<&'a FamilyName> for Family<'a> {
    fn from(family: &'a FamilyName) -> Self {
        match family {
            FamilyName::Named(name) => Family::Name(name),
            FamilyName::Serif => Family::Serif,
            FamilyName::SansSerif => Family::SansSerif,
            FamilyName::Monospace => Family::Monospace,
        }
    }
}

/// The database of installed fonts
///
/// Loading scans system font directories, which may be slow; construct once.
pub struct SystemFonts {
    db: Database,
}

impl SystemFonts {
    /// Scan installed fonts
    pub fn load() -> Self {
        let mut db = Database::new();
        db.load_system_fonts();
        info!("Found {} fonts", db.len());
        SystemFonts { db }
    }

    /// Construct over an existing database
    pub fn from_database(db: Database) -> Self {
        SystemFonts { db }
    }

    /// Number of faces known
    #[inline]
    pub fn len(&self) -> usize {
        self.db.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.db.len() == 0
    }

    /// Access the underlying database
    #[inline]
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Resolve a family to a font file (normal weight and style)
    #[inline]
    pub fn find(&self, family: &FamilyName) -> Option<PathBuf> {
        self.find_styled(family, Weight::NORMAL, Style::Normal)
    }

    /// Resolve a family with the given weight and style to a font file
    ///
    /// Faces loaded from memory and faces within font collections are not
    /// usable as atlas sources and are not returned.
    pub fn find_styled(
        &self,
        family: &FamilyName,
        weight: Weight,
        style: Style,
    ) -> Option<PathBuf> {
        let families = [Family::from(family)];
        let query = Query {
            families: &families,
            weight,
            style,
            ..Default::default()
        };
        let id = self.db.query(&query)?;
        let face = self.db.face(id)?;
        let path = match &face.source {
            Source::File(path) if face.index == 0 => Some(path.clone()),
            _ => None,
        };
        debug!("SystemFonts::find_styled: {family:?} → {path:?}");
        path
    }
}

impl std::fmt::Debug for SystemFonts {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("SystemFonts")
            .field("len", &self.db.len())
            .finish()
    }
}
