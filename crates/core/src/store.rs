//! In-memory vector store
//!
//! A `VectorStore` backed by a concurrent map. Used by embedders that keep
//! vectors in process and by tests that need a store to recover from.

use crate::traits::VectorStore;
use crate::types::VectorId;
use dashmap::DashMap;

/// Concurrent id -> vector map implementing [`VectorStore`]
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    vectors: DashMap<VectorId, Vec<f32>>,
}

impl InMemoryVectorStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `vector` under `id`, replacing any previous value
    pub fn put(&self, id: VectorId, vector: Vec<f32>) {
        self.vectors.insert(id, vector);
    }

    /// Remove the vector stored under `id`
    pub fn remove(&self, id: VectorId) -> Option<Vec<f32>> {
        self.vectors.remove(&id).map(|(_, v)| v)
    }

    /// Number of stored vectors
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}

impl VectorStore for InMemoryVectorStore {
    fn get_vector(&self, id: VectorId) -> Option<Vec<f32>> {
        self.vectors.get(&id).map(|v| v.value().clone())
    }

    fn keys(&self) -> Box<dyn Iterator<Item = VectorId> + '_> {
        Box::new(self.vectors.iter().map(|entry| *entry.key()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_remove() {
        let store = InMemoryVectorStore::new();
        assert!(store.is_empty());

        store.put(1, vec![1.0, 2.0]);
        store.put(2, vec![3.0, 4.0]);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get_vector(1), Some(vec![1.0, 2.0]));
        assert_eq!(store.get_vector(9), None);

        assert_eq!(store.remove(1), Some(vec![1.0, 2.0]));
        assert_eq!(store.get_vector(1), None);
    }

    #[test]
    fn test_keys() {
        let store = InMemoryVectorStore::new();
        for id in 0..5 {
            store.put(id, vec![id as f32]);
        }
        let mut keys: Vec<VectorId> = store.keys().collect();
        keys.sort_unstable();
        assert_eq!(keys, vec![0, 1, 2, 3, 4]);
    }
}
