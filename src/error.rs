// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE-APACHE file or at:
//     https://www.apache.org/licenses/LICENSE-2.0

//! Error types

use crate::fonts::ParseError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Atlas build errors
///
/// All of these are fatal to the build call which raised them. Codepoints
/// missing from every source and missing kerning pairs are not errors; see
/// [`crate::FontAtlas::glyph_or_fallback`] and [`crate::FontAtlas::kerning`].
#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to parse font `{}`", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },
    #[error("failed to read `{}`", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("codepoint {0:#x} is outside the Basic Multilingual Plane")]
    UnsupportedCodepoint(u32),
    #[error("atlas {width}×{height} too small: no room for U+{codepoint:04X}")]
    AtlasTooSmall {
        width: u32,
        height: u32,
        codepoint: u32,
    },
    #[error("bad disk cache entry `{}`: {reason}", .path.display())]
    DiskCache { path: PathBuf, reason: String },
    #[error("no font sources given")]
    NoSources,
    #[error("invalid parameter: {0}")]
    InvalidParams(&'static str),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn disk(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::DiskCache {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
