//! Vectory - Embedded HNSW vector index with write-ahead log recovery
//!
//! Vectory indexes fixed-dimension `f32` vectors in a Hierarchical Navigable
//! Small World graph. Every graph mutation is logged before it is applied, so
//! reopening an index replays the log and rebuilds the same graph. Vector
//! payloads are not stored in the log; they are read back from a caller
//! supplied [`VectorStore`] on open.
//!
//! # Quick Start
//!
//! ```ignore
//! use vectory::{DurabilityMode, HnswConfig, HnswIndex, InMemoryVectorStore};
//!
//! let store = InMemoryVectorStore::new();
//! let index = HnswIndex::open("data/index", HnswConfig::new(3), DurabilityMode::default(), &store)?;
//!
//! store.put(1, vec![0.1, 0.2, 0.3]);
//! index.insert(&[0.1, 0.2, 0.3], 1)?;
//!
//! let hits = index.search(&[0.1, 0.2, 0.25], 5)?;
//! index.flush()?;
//! ```
//!
//! # Architecture
//!
//! - `vectory-core`: ids, configuration, errors, the `VectorIndex` / `VectorStore` traits
//! - `vectory-durability`: WAL records, framing, the WAL file
//! - `vectory-engine`: the HNSW graph, search, insertion and recovery

pub use vectory_core::{
    ConfigError, DistanceType, Error, HnswConfig, InMemoryVectorStore, Result, SearchResult,
    VectorId, VectorIndex, VectorStore,
};
pub use vectory_durability::DurabilityMode;
pub use vectory_engine::{GraphSnapshot, HnswIndex, RecoveryStats};
