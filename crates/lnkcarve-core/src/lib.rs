//! # lnkcarve-core
//!
//! A library for carving Windows Shortcut (.lnk) structures out of raw bytes.
//!
//! Unlike a file parser, the input is a haystack: a disk image, a memory dump,
//! or any chunk of bulk data. Every offset is tested for the shell link
//! header signature, and each hit is decoded speculatively without ever
//! reading outside the buffer.
//!
//! ## Architecture
//!
//! - [`scanner`]: Signature scanning and resume policy
//! - [`lnk`]: Shell link record decoding
//! - [`filetime`]: FILETIME to ISO-8601 conversion
//! - [`buffer`]: Bounds-checked buffer access
//! - [`sink`]: Record sinks
//! - [`error`]: Error types and handling
//!
//! ## Example
//!
//! ```no_run
//! use lnkcarve_core::{ByteView, MemorySink, ScanStrategy, Scanner};
//! use std::fs;
//!
//! let data = fs::read("./disk.img")?;
//!
//! let sink = MemorySink::new();
//! Scanner::new().scan(&ByteView::new(&data), &sink)?;
//!
//! for record in sink.into_records() {
//!     println!("{}\t{}", record.position(), record.primary_value());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Extensibility
//!
//! - [`RecordSink`]: Customize where records go
//! - [`ScanStrategy`]: Customize the scanning algorithm

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod buffer;
pub mod error;
pub mod filetime;
pub mod lnk;
pub mod scanner;
pub mod sink;

// Re-export primary types for convenience
pub use buffer::ByteView;
pub use error::{Error, Result};
pub use filetime::{filetime_to_iso8601, INVALID_TIMESTAMP};
pub use lnk::{decode_at, LinkFlags, LnkHeader, LnkRecord, NO_LINK_INFO};
pub use scanner::{scan_file, ScanStrategy, ScanSummary, Scanner, ScannerConfig, SMALLEST_LNK_FILE};
pub use sink::{MemorySink, RecordSink, SinkFormat, WriterSink, FEATURE_NAME};

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
