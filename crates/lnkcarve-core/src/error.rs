//! Error types for the lnkcarve-core library.
//!
//! This module provides error handling using the `thiserror` crate. Most
//! decode-level errors never reach a caller: the scanner swallows them and
//! moves on to the next candidate offset.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for lnkcarve operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for all lnkcarve operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// A read would extend past the end of the buffer
    #[error("read of {len} bytes at offset {offset} exceeds buffer of {buf_len} bytes")]
    OutOfRange {
        /// Offset of the attempted read, relative to the buffer start
        offset: usize,
        /// Width of the attempted read in bytes
        len: usize,
        /// Size of the buffer
        buf_len: usize,
    },

    /// Failed to read input file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        /// Path to the file that failed to read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a record to a sink
    #[error("failed to write record: {0}")]
    SinkWrite(#[from] std::io::Error),

    /// Failed to serialize a record
    #[error("failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Inconsistent buffer or scanner configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Creates a new out-of-range error
    pub fn out_of_range(offset: usize, len: usize, buf_len: usize) -> Self {
        Self::OutOfRange {
            offset,
            len,
            buf_len,
        }
    }

    /// Creates a new file read error
    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Creates a new configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Returns true if this error only affects a single candidate and the scan can go on
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::OutOfRange { .. })
    }
}
