//! HNSW engine for Vectory
//!
//! This crate owns the in-memory graph and coordinates it with the WAL:
//! - Distance functions and the heaps used to bound candidate lists
//! - Per-vertex locked adjacency lists
//! - Insertion, layered search, and soft delete
//! - Recovery: WAL replay plus vector backfill from a `VectorStore`
//!
//! The engine is the only component that writes graph records to the WAL.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod hnsw;

pub use hnsw::{GraphSnapshot, HnswIndex, RecoveryStats};
