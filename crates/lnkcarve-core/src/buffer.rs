//! Bounds-checked access to the bytes being carved.
//!
//! A [`ByteView`] is a window into a larger addressable stream (a disk image,
//! a memory dump). It carries the absolute position of its first byte so that
//! records can be keyed globally, and a `pagesize` that splits the slice into
//! the region that is scanned and a trailing margin that may only be read.
//!
//! ```text
//! pos0
//!  |<------------- pagesize ------------->|<--- margin --->|
//!  [ candidate offsets live here ........ | readable only  ]
//!  |<----------------------- len (bufsize) --------------->|
//! ```

use crate::error::{Error, Result};
use byteorder::{ByteOrder, LittleEndian};

/// Read-only, bounds-checked view over a byte buffer
#[derive(Debug, Clone, Copy)]
pub struct ByteView<'a> {
    data: &'a [u8],
    pos0: u64,
    pagesize: usize,
}

impl<'a> ByteView<'a> {
    /// Creates a view with no margin, positioned at the start of the stream
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos0: 0,
            pagesize: data.len(),
        }
    }

    /// Sets the absolute position of the first byte
    pub fn at(mut self, pos0: u64) -> Self {
        self.pos0 = pos0;
        self
    }

    /// Creates a view whose bytes past `pagesize` form a read-only margin
    pub fn with_margin(data: &'a [u8], pos0: u64, pagesize: usize) -> Result<Self> {
        if pagesize > data.len() {
            return Err(Error::invalid_config(format!(
                "pagesize {} exceeds buffer size {}",
                pagesize,
                data.len()
            )));
        }
        Ok(Self {
            data,
            pos0,
            pagesize,
        })
    }

    /// Total number of readable bytes (page plus margin)
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the view holds no bytes
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of bytes whose offsets are eligible as scan candidates
    pub fn pagesize(&self) -> usize {
        self.pagesize
    }

    /// Absolute position of the first byte in the enclosing stream
    pub fn pos0(&self) -> u64 {
        self.pos0
    }

    /// Translates a local offset into an absolute stream position
    pub fn absolute(&self, offset: usize) -> u64 {
        self.pos0.saturating_add(offset as u64)
    }

    /// Returns `len` bytes at `offset`, or an error if any of them is out of range
    pub fn slice(&self, offset: usize, len: usize) -> Result<&'a [u8]> {
        offset
            .checked_add(len)
            .and_then(|end| self.data.get(offset..end))
            .ok_or_else(|| Error::out_of_range(offset, len, self.data.len()))
    }

    /// Reads a little-endian u16
    pub fn read_u16(&self, offset: usize) -> Result<u16> {
        self.slice(offset, 2).map(LittleEndian::read_u16)
    }

    /// Reads a little-endian u32
    pub fn read_u32(&self, offset: usize) -> Result<u32> {
        self.slice(offset, 4).map(LittleEndian::read_u32)
    }

    /// Reads a little-endian u64
    pub fn read_u64(&self, offset: usize) -> Result<u64> {
        self.slice(offset, 8).map(LittleEndian::read_u64)
    }

    /// Returns the byte at `offset`, if any
    pub fn byte(&self, offset: usize) -> Option<u8> {
        self.data.get(offset).copied()
    }

    /// Returns the bytes from `offset` up to, not including, the first NUL.
    ///
    /// Stops at the end of the buffer when no terminator is found. An offset at
    /// or past the end yields an empty slice.
    pub fn cstr_at(&self, offset: usize) -> &'a [u8] {
        let tail = self.data.get(offset..).unwrap_or(&[]);
        let end = tail.iter().position(|&b| b == 0).unwrap_or(tail.len());
        &tail[..end]
    }
}
