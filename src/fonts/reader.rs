// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE-APACHE file or at:
//     https://www.apache.org/licenses/LICENSE-2.0

//! Binary table reader
//!
//! A positioned big-endian cursor over font data, plus the sfnt table
//! directory used to locate tables by [`Tag`].

use super::ParseError;
use crate::conv::to_usize;
use std::fmt;

/// A 4-byte table tag, e.g. `b"head"`
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tag(pub [u8; 4]);

impl Tag {
    pub const HEAD: Self = Self(*b"head");
    pub const HHEA: Self = Self(*b"hhea");
    pub const MAXP: Self = Self(*b"maxp");
    pub const HMTX: Self = Self(*b"hmtx");
    pub const LOCA: Self = Self(*b"loca");
    pub const GLYF: Self = Self(*b"glyf");
    pub const CMAP: Self = Self(*b"cmap");
    pub const KERN: Self = Self(*b"kern");
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({self})")
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(s) => f.write_str(s),
            Err(_) => write!(f, "{:02x?}", self.0),
        }
    }
}

/// Location of a table within the font data
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TableRecord {
    /// Byte offset from the start of the file
    pub offset: u32,
    /// Length in bytes
    pub length: u32,
}

impl TableRecord {
    /// Byte range within the file
    #[inline]
    pub fn range(&self) -> std::ops::Range<usize> {
        let start = to_usize(self.offset);
        start..start + to_usize(self.length)
    }
}

/// A positioned cursor over a byte buffer
///
/// All reads are big-endian. Positions passed to [`Reader::seek`] and
/// returned by [`Reader::position`] are relative to the reader's base
/// offset.
#[derive(Clone, Debug)]
pub struct Reader<'a> {
    data: &'a [u8],
    base: usize,
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Construct over the whole of `data`
    #[inline]
    pub fn new(data: &'a [u8]) -> Self {
        Reader::at(data, 0)
    }

    /// Construct with the given base offset into `data`
    #[inline]
    pub fn at(data: &'a [u8], base: usize) -> Self {
        Reader { data, base, pos: 0 }
    }

    /// Base offset of this reader within the underlying data
    #[inline]
    pub fn base(&self) -> usize {
        self.base
    }

    /// Current position, relative to the base
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Move to `pos`, relative to the base
    #[inline]
    pub fn seek(&mut self, pos: usize) {
        self.pos = pos;
    }

    /// Advance by `n` bytes
    #[inline]
    pub fn skip(&mut self, n: usize) {
        self.pos += n;
    }

    /// A new reader based at `offset` relative to this reader's base
    #[inline]
    pub fn sub_reader(&self, offset: usize) -> Reader<'a> {
        Reader::at(self.data, self.base + offset)
    }

    /// Read `n` bytes
    pub fn bytes(&mut self, n: usize) -> Result<&'a [u8], ParseError> {
        let start = self.base + self.pos;
        let slice = self
            .data
            .get(start..start + n)
            .ok_or(ParseError::UnexpectedEof { offset: start })?;
        self.pos += n;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], ParseError> {
        let mut buf = [0; N];
        buf.copy_from_slice(self.bytes(N)?);
        Ok(buf)
    }

    #[inline]
    pub fn u8(&mut self) -> Result<u8, ParseError> {
        Ok(self.array::<1>()?[0])
    }

    #[inline]
    pub fn i8(&mut self) -> Result<i8, ParseError> {
        Ok(i8::from_be_bytes(self.array()?))
    }

    #[inline]
    pub fn u16(&mut self) -> Result<u16, ParseError> {
        Ok(u16::from_be_bytes(self.array()?))
    }

    #[inline]
    pub fn i16(&mut self) -> Result<i16, ParseError> {
        Ok(i16::from_be_bytes(self.array()?))
    }

    #[inline]
    pub fn u32(&mut self) -> Result<u32, ParseError> {
        Ok(u32::from_be_bytes(self.array()?))
    }

    #[inline]
    pub fn i32(&mut self) -> Result<i32, ParseError> {
        Ok(i32::from_be_bytes(self.array()?))
    }

    /// Read a 2.14 fixed-point value
    #[inline]
    pub fn f2dot14(&mut self) -> Result<f32, ParseError> {
        Ok(f32::from(self.i16()?) / 16384.0)
    }
}

/// The sfnt table directory
#[derive(Clone, Debug, Default)]
pub struct TableDirectory {
    records: Vec<(Tag, TableRecord)>,
}

impl TableDirectory {
    /// Read the directory from the start of a font file
    ///
    /// Accepts TrueType (`0x00010000`, `true`) outlines; collections and CFF
    /// outlines are rejected.
    pub fn parse(data: &[u8]) -> Result<Self, ParseError> {
        let mut r = Reader::new(data);
        let version = r.u32()?;
        if version != 0x0001_0000 && version != u32::from_be_bytes(*b"true") {
            return Err(ParseError::BadMagic(version));
        }
        let num_tables = r.u16()?;
        r.skip(6); // searchRange, entrySelector, rangeShift

        let mut records = Vec::with_capacity(usize::from(num_tables));
        for _ in 0..num_tables {
            let tag = Tag(r.array()?);
            let _checksum = r.u32()?;
            let offset = r.u32()?;
            let length = r.u32()?;
            records.push((tag, TableRecord { offset, length }));
        }
        Ok(TableDirectory { records })
    }

    /// Find a table record by tag (linear scan)
    pub fn find(&self, tag: Tag) -> Option<TableRecord> {
        self.records
            .iter()
            .find(|(t, _)| *t == tag)
            .map(|(_, record)| *record)
    }

    /// Get a reader based at the table named `tag`
    ///
    /// Fails if the table is missing or extends beyond the end of `data`.
    pub fn slice_for_tag<'a>(&self, data: &'a [u8], tag: Tag) -> Result<Reader<'a>, ParseError> {
        let record = self.find(tag).ok_or(ParseError::MissingTable(tag))?;
        if record.range().end > data.len() {
            return Err(ParseError::UnexpectedEof {
                offset: record.range().end,
            });
        }
        Ok(Reader::at(data, to_usize(record.offset)))
    }

    /// Number of tables
    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }
}
