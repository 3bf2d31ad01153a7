//! Durability layer for Vectory
//!
//! This crate handles everything that touches disk:
//!
//! - WAL records: one variant per graph mutation, explicit binary codec
//! - Entry framing: length prefix and CRC32 around each record
//! - WAL file: append, flush, sequential read-back, torn-tail repair
//! - Durability modes: Strict, Batched (default), Async

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod encoding; // Length + CRC framing
pub mod record; // WalRecord and opcode codec
pub mod wal; // WAL file handle, durability modes, reader

// === Re-exports ===
pub use encoding::{decode_entry, encode_entry};
pub use record::{opcodes, WalRecord};
pub use wal::{DurabilityMode, Wal, WalIter};
