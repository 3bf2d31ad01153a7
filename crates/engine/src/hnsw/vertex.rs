//! Graph vertices and their per-layer adjacency.
//!
//! A vertex's neighbor lists are mutated by inserts of *other* vertices
//! (back-edges, pruning), so each vertex carries its own lock around its
//! adjacency. Cross-references are plain ids resolved through the engine's
//! node table.

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use vectory_core::{HnswConfig, VectorId};

/// Adjacency lists of one vertex, one list per layer `0..=level`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connections {
    layers: Vec<Vec<VectorId>>,
}

impl Connections {
    /// Allocate empty lists for layers `0..=level`, each sized to its degree cap
    pub fn init(level: usize, m_max: usize, m_max0: usize) -> Self {
        let layers = (0..=level)
            .map(|l| Vec::with_capacity(if l == 0 { m_max0 } else { m_max }))
            .collect();
        Self { layers }
    }

    /// Number of layers
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Neighbors at `level`; empty if the vertex does not reach that layer
    pub fn get(&self, level: usize) -> &[VectorId] {
        self.layers.get(level).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Replace the list at `level`. Returns false if the layer does not exist.
    pub fn set(&mut self, level: usize, ids: Vec<VectorId>) -> bool {
        match self.layers.get_mut(level) {
            Some(layer) => {
                *layer = ids;
                true
            }
            None => false,
        }
    }

    /// Append one neighbor at `level`. Returns false if the layer does not exist.
    pub fn add(&mut self, level: usize, id: VectorId) -> bool {
        match self.layers.get_mut(level) {
            Some(layer) => {
                layer.push(id);
                true
            }
            None => false,
        }
    }

    /// Copy of all layers
    pub fn to_vec(&self) -> Vec<Vec<VectorId>> {
        self.layers.clone()
    }
}

/// A node in the HNSW graph
#[derive(Debug)]
pub struct Vertex {
    id: VectorId,
    /// None only after recovery, when the vector store had no payload for this id
    vector: Option<Vec<f32>>,
    level: usize,
    connections: RwLock<Connections>,
}

impl Vertex {
    /// Create a vertex that lives on layers `0..=level`
    pub fn new(id: VectorId, vector: Option<Vec<f32>>, level: usize, config: &HnswConfig) -> Self {
        Self {
            id,
            vector,
            level,
            connections: RwLock::new(Connections::init(level, config.m_max, config.m_max0())),
        }
    }

    /// Vertex id
    pub fn id(&self) -> VectorId {
        self.id
    }

    /// Highest layer
    pub fn level(&self) -> usize {
        self.level
    }

    /// Vector payload, if known
    pub fn vector(&self) -> Option<&[f32]> {
        self.vector.as_deref()
    }

    pub(crate) fn set_vector(&mut self, vector: Vec<f32>) {
        self.vector = Some(vector);
    }

    /// Copy of the neighbor list at `level`
    pub fn connections_at(&self, level: usize) -> Vec<VectorId> {
        self.connections.read().get(level).to_vec()
    }

    /// Shared access to the adjacency
    pub fn read(&self) -> RwLockReadGuard<'_, Connections> {
        self.connections.read()
    }

    /// Exclusive access to the adjacency
    pub fn write(&self) -> RwLockWriteGuard<'_, Connections> {
        self.connections.write()
    }

    /// Exclusive access without locking, for a vertex not yet shared
    pub(crate) fn connections_mut(&mut self) -> &mut Connections {
        self.connections.get_mut()
    }
}
