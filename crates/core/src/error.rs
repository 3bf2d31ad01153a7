//! Error types for Vectory
//!
//! This module defines the error type shared by every crate in the workspace.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.

use crate::config::ConfigError;
use crate::types::VectorId;
use std::io;
use thiserror::Error;

/// Result type alias for Vectory operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the vector index
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (WAL file operations)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Rejected index configuration
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Vector length differs from the index dimension
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Dimension the index was created with
        expected: usize,
        /// Length of the supplied vector
        got: usize,
    },

    /// The index is frozen and does not accept inserts
    #[error("Index is read-only")]
    ReadOnlyIndex,

    /// A vertex with this id is already in the graph
    #[error("Vertex {0} already exists")]
    VertexExists(VectorId),

    /// Data corruption detected in the WAL
    #[error("Data corruption: {0}")]
    Corruption(String),

    /// Stored CRC32 does not match the record bytes
    #[error("Checksum mismatch at offset {offset}: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// File offset of the record
        offset: u64,
        /// CRC stored in the record
        expected: u32,
        /// CRC computed over the record bytes
        actual: u32,
    },

    /// A checksummed WAL record carries an opcode this build does not know
    #[error("Unknown WAL opcode {opcode} at offset {offset}")]
    UnknownOpcode {
        /// Opcode byte read from the record
        opcode: u8,
        /// File offset of the record
        offset: u64,
    },

    /// Buffer ends before the record it starts is complete
    ///
    /// Not corruption: a crash in the middle of an append leaves exactly this.
    #[error("Incomplete entry at offset {offset}: have {have} bytes, need {needed}")]
    IncompleteEntry {
        /// File offset of the record
        offset: u64,
        /// Bytes available
        have: usize,
        /// Bytes required
        needed: usize,
    },
}

impl Error {
    /// True for errors that describe a torn write rather than bad data
    pub fn is_incomplete(&self) -> bool {
        matches!(self, Error::IncompleteEntry { .. })
    }
}
