//! Core types for the vector index
//!
//! - VectorId: Identifier issued by the collection layer for each vector
//! - SearchResult: One ranked hit returned by `VectorIndex::search`

use serde::{Deserialize, Serialize};

/// Identifier of an indexed vector
///
/// Issued monotonically by the collection layer. The index never allocates ids.
pub type VectorId = u64;

/// A single search hit
///
/// `distance` follows the index's "lower is better" convention: Euclidean
/// distance as-is, dot product negated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Id of the matched vector
    pub id: VectorId,
    /// Distance from the query (lower = closer)
    pub distance: f32,
}

impl SearchResult {
    /// Create a new search result
    pub fn new(id: VectorId, distance: f32) -> Self {
        Self { id, distance }
    }
}

impl From<(VectorId, f32)> for SearchResult {
    fn from((id, distance): (VectorId, f32)) -> Self {
        Self { id, distance }
    }
}
