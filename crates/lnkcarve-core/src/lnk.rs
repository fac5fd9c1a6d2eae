//! Shell Link (.lnk) record decoding.
//!
//! Decoding is speculative: it starts at an offset where the header signature
//! matched and walks the structure with a running cursor. Every read goes
//! through [`ByteView`], so a truncated or corrupt structure surfaces as an
//! [`Error::OutOfRange`](crate::Error::OutOfRange) rather than a bad read.
//!
//! ## Layout
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0x00 | 20 | header size + shell link CLSID (see [`SIGNATURE`]) |
//! | 0x14 | 4 | LinkFlags |
//! | 0x1c | 8 | CreationTime |
//! | 0x24 | 8 | AccessTime |
//! | 0x2c | 8 | WriteTime |
//! | 0x4c | - | LinkTargetIDList, LinkInfo (per flags) |

use crate::buffer::ByteView;
use crate::error::{Error, Result};
use crate::filetime::filetime_to_iso8601;
use std::collections::BTreeMap;
use std::fmt::Write as FmtWrite;

/// The first five little-endian words of every shell link: the header size
/// (0x4c) followed by CLSID 00021401-0000-0000-C000-000000000046.
pub const SIGNATURE: [u32; 5] = [0x0000_004c, 0x0002_1401, 0x0000_0000, 0x0000_00c0, 0x4600_0000];

/// Size of the fixed header; the variable sections start here
pub const HEADER_SIZE: usize = 0x4c;

/// Primary value of a record that has no LinkInfo section
pub const NO_LINK_INFO: &str = "NOLINKINFO";

/// Bytes added on top of `LinkInfoSize` when skipping the LinkInfo section.
///
/// `LinkInfoSize` already counts its own four bytes, so this over-advances by
/// two. Resume offsets of existing output depend on it.
pub const LINK_INFO_SKIP_PREFIX: usize = 2;

/// Size of the `IDListSize` prefix of the LinkTargetIDList section
const ID_LIST_SIZE_PREFIX: usize = 2;

const LINK_FLAGS_OFFSET: usize = 0x14;
const CREATION_TIME_OFFSET: usize = 0x1c;
const ACCESS_TIME_OFFSET: usize = 0x24;
const WRITE_TIME_OFFSET: usize = 0x2c;

/// Offset of `LocalBasePathOffset` within the LinkInfo section
const LOCAL_BASE_PATH_OFFSET_FIELD: usize = 16;

/// The LinkFlags bitfield. Only the two section-presence bits are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LinkFlags(pub u32);

impl LinkFlags {
    /// Bit 0
    pub const HAS_LINK_TARGET_ID_LIST: u32 = 1 << 0;
    /// Bit 1
    pub const HAS_LINK_INFO: u32 = 1 << 1;

    /// Returns true if a LinkTargetIDList section follows the header
    pub fn has_link_target_id_list(self) -> bool {
        self.0 & Self::HAS_LINK_TARGET_ID_LIST != 0
    }

    /// Returns true if a LinkInfo section is present
    pub fn has_link_info(self) -> bool {
        self.0 & Self::HAS_LINK_INFO != 0
    }
}

/// Raw fixed-header fields of a shell link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LnkHeader {
    /// LinkFlags
    pub flags: LinkFlags,
    /// CreationTime (FILETIME)
    pub creation_time: u64,
    /// AccessTime (FILETIME)
    pub access_time: u64,
    /// WriteTime (FILETIME)
    pub write_time: u64,
}

impl LnkHeader {
    /// Reads the fixed header fields relative to `base`
    pub fn read(view: &ByteView<'_>, base: usize) -> Result<Self> {
        Ok(Self {
            flags: LinkFlags(view.read_u32(offset(base, LINK_FLAGS_OFFSET, view)?)?),
            creation_time: view.read_u64(offset(base, CREATION_TIME_OFFSET, view)?)?,
            access_time: view.read_u64(offset(base, ACCESS_TIME_OFFSET, view)?)?,
            write_time: view.read_u64(offset(base, WRITE_TIME_OFFSET, view)?)?,
        })
    }
}

/// Returns true if the header signature is present at `base`.
///
/// A signature that would run past the end of the buffer does not match.
pub fn matches_signature(view: &ByteView<'_>, base: usize) -> bool {
    SIGNATURE.iter().enumerate().all(|(i, &expected)| {
        base.checked_add(i * 4)
            .and_then(|at| view.read_u32(at).ok())
            == Some(expected)
    })
}

/// A shell link carved out of a buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LnkRecord {
    /// Absolute position of the header in the scanned stream
    pub position: u64,
    /// Creation time, ISO-8601
    pub ctime: String,
    /// Access time, ISO-8601
    pub atime: String,
    /// Write time, ISO-8601
    pub wtime: String,
    /// Local base path from the LinkInfo section, if present
    pub path: Option<String>,
}

impl LnkRecord {
    /// Absolute position of the record
    pub fn position(&self) -> u64 {
        self.position
    }

    /// The value the record is known by: its path, or [`NO_LINK_INFO`]
    pub fn primary_value(&self) -> &str {
        self.path.as_deref().unwrap_or(NO_LINK_INFO)
    }

    /// Named fields of the record, ordered by key.
    ///
    /// `path` is only present when the link had a LinkInfo section.
    pub fn fields(&self) -> BTreeMap<&'static str, &str> {
        let mut fields = BTreeMap::new();
        fields.insert("ctime", self.ctime.as_str());
        fields.insert("atime", self.atime.as_str());
        fields.insert("wtime", self.wtime.as_str());
        if let Some(path) = &self.path {
            fields.insert("path", path.as_str());
        }
        fields
    }
}

/// Outcome of a successful decode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    /// The decoded record
    pub record: LnkRecord,
    /// Bytes the scanner should skip past the start of the record
    pub resume: usize,
}

/// Decodes the shell link whose header starts at `base`.
///
/// The signature is assumed to have been checked by the caller. Any read
/// outside the buffer aborts the decode.
pub fn decode_at(view: &ByteView<'_>, base: usize) -> Result<Decoded> {
    let header = LnkHeader::read(view, base)?;
    let mut loc = HEADER_SIZE;

    let ctime = filetime_to_iso8601(header.creation_time);
    let atime = filetime_to_iso8601(header.access_time);
    let wtime = filetime_to_iso8601(header.write_time);

    if header.flags.has_link_target_id_list() {
        let id_list_size = view.read_u16(offset(base, loc, view)?)?;
        loc = advance(loc, id_list_size as usize, ID_LIST_SIZE_PREFIX);
    }

    let mut path = None;
    if header.flags.has_link_info() {
        let section = offset(base, loc, view)?;
        let link_info_size = view.read_u32(section)?;
        let local_base_path_offset =
            view.read_u32(offset(section, LOCAL_BASE_PATH_OFFSET_FIELD, view)?)?;

        // An offset that lands past the buffer yields an empty path, not a failure
        let text = section
            .checked_add(local_base_path_offset as usize)
            .map(|start| view.cstr_at(start))
            .unwrap_or(&[]);
        path = Some(render_path(text));
        loc = advance(loc, link_info_size as usize, LINK_INFO_SKIP_PREFIX);
    }

    Ok(Decoded {
        record: LnkRecord {
            position: view.absolute(base),
            ctime,
            atime,
            wtime,
            path,
        },
        resume: loc,
    })
}

/// Renders raw path bytes as text.
///
/// Printable ASCII passes through; every other byte becomes `\xHH`.
pub fn render_path(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        if (0x20..=0x7e).contains(&b) {
            out.push(b as char);
        } else {
            let _ = write!(out, "\\x{:02X}", b);
        }
    }
    out
}

fn offset(base: usize, rel: usize, view: &ByteView<'_>) -> Result<usize> {
    base.checked_add(rel)
        .ok_or_else(|| Error::out_of_range(base, rel, view.len()))
}

fn advance(loc: usize, size: usize, prefix: usize) -> usize {
    loc.saturating_add(size).saturating_add(prefix)
}
