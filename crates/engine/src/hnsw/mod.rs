//! Hierarchical Navigable Small World graph
//!
//! Multi-layer proximity graph for approximate nearest-neighbor search
//! (Malkov & Yashunin). Layer 0 holds every vertex; each higher layer holds an
//! exponentially thinning subset. Search descends greedily from the entry
//! point on the top layer, then runs a beam search on layer 0.
//!
//! Every graph mutation is written to the WAL before it becomes visible, so
//! replaying the log reproduces the in-memory graph exactly.

mod distance;
mod heap;
mod index;
mod insert;
mod recovery;
mod search;
mod select;
mod vertex;

pub use distance::{distance_fn, dot_product, euclidean_distance, DistanceFn};
pub use heap::{Element, MaxHeap, MinHeap};
pub use index::{GraphSnapshot, HnswIndex, WAL_FILE_NAME};
pub use recovery::RecoveryStats;

#[cfg(test)]
pub(crate) mod test_util {
    use super::HnswIndex;
    use tempfile::TempDir;
    use vectory_core::{HnswConfig, InMemoryVectorStore, VectorId};
    use vectory_durability::DurabilityMode;

    /// Fresh index in a temp dir, backed by an empty store
    pub fn open_index(config: HnswConfig) -> (TempDir, InMemoryVectorStore, HnswIndex) {
        let dir = TempDir::new().unwrap();
        let store = InMemoryVectorStore::new();
        let index = HnswIndex::open(dir.path(), config, DurabilityMode::default(), &store).unwrap();
        (dir, store, index)
    }

    /// Points on a 10-wide grid: id i sits at (i % 10, i / 10)
    pub fn vectors_2d(n: u64) -> Vec<(VectorId, Vec<f32>)> {
        (0..n)
            .map(|i| (i, vec![(i % 10) as f32, (i / 10) as f32]))
            .collect()
    }
}
