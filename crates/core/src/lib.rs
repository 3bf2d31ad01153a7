//! Core types and traits for Vectory
//!
//! This crate defines the foundational types shared by the durability and
//! engine crates:
//! - VectorId: Identifier of an indexed vector
//! - SearchResult: One ranked hit returned by a search
//! - HnswConfig: Graph parameters and distance selection
//! - Error: Error type hierarchy
//! - Traits: `VectorIndex` (the index contract) and `VectorStore` (vector payload source)
//! - InMemoryVectorStore: Reference `VectorStore` implementation

#![warn(missing_docs)]
#![warn(clippy::all)]

// Module declarations
pub mod config;
pub mod error;
pub mod store;
pub mod traits;
pub mod types;

// Re-export commonly used types and traits
pub use config::{ConfigError, DistanceType, HnswConfig};
pub use error::{Error, Result};
pub use store::InMemoryVectorStore;
pub use traits::{VectorIndex, VectorStore};
pub use types::{SearchResult, VectorId};
