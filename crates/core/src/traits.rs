//! Core traits for the index contract and its vector source
//!
//! `VectorIndex` is what the collection layer calls. `VectorStore` is what
//! the index calls back into at startup to recover vector payloads, which
//! the WAL deliberately does not carry.

use crate::error::Result;
use crate::types::{SearchResult, VectorId};

/// Approximate nearest-neighbor index consumed by the collection layer
///
/// Thread safety: every method takes `&self` and must be safe to call
/// concurrently from multiple threads (requires Send + Sync).
pub trait VectorIndex: Send + Sync {
    /// Insert a vector under an externally issued id
    ///
    /// # Errors
    ///
    /// - `ReadOnlyIndex` if the index is frozen
    /// - `DimensionMismatch` if `vector.len()` differs from the index dimension
    /// - `VertexExists` if `id` is already indexed
    /// - `Io` if the WAL append fails; the vector is then not indexed
    fn insert(&self, vector: &[f32], id: VectorId) -> Result<()>;

    /// Tombstone a vector
    ///
    /// Unknown ids are tombstoned too; there is no existence check. The only
    /// failure is a WAL append error.
    fn delete(&self, id: VectorId) -> Result<()>;

    /// Return up to `k` nearest live vectors, best first
    ///
    /// Tombstoned ids are never returned.
    ///
    /// # Errors
    ///
    /// `DimensionMismatch` if `query.len()` differs from the index dimension.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>>;

    /// Force pending WAL writes to disk
    fn flush(&self) -> Result<()>;
}

/// Source of vector payloads, keyed by id
///
/// Owned outside the index. Only used while an index is opening.
pub trait VectorStore: Send + Sync {
    /// Get the vector stored under `id`
    fn get_vector(&self, id: VectorId) -> Option<Vec<f32>>;

    /// Iterate every id that has a stored vector
    fn keys(&self) -> Box<dyn Iterator<Item = VectorId> + '_>;
}
