//! The HNSW index: engine state, lifecycle, and the `VectorIndex` contract.
//!
//! ## Locking
//!
//! - `graph` (RwLock): node table, entry point, max layer. Write-locked only
//!   to register a vertex or promote the entry point.
//! - `Vertex` adjacency (RwLock per vertex): never acquired while `graph` is
//!   held, and at most one at a time.
//! - `wal` (Mutex): leaf lock, taken while the lock of the item being
//!   mutated is held so that log order matches in-memory order.
//!
//! Every mutation is logged before it is applied. A failed append leaves
//! memory untouched, so memory always equals a replay of the log.

use dashmap::DashSet;
use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustc_hash::FxHashMap;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;
use vectory_core::{
    Error, HnswConfig, Result, SearchResult, VectorId, VectorIndex, VectorStore,
};
use vectory_durability::{DurabilityMode, Wal, WalRecord};

use super::distance::{distance_fn, DistanceFn};
use super::recovery::{recover, RecoveryStats};
use super::vertex::Vertex;

/// File name of the graph WAL inside the index directory
pub const WAL_FILE_NAME: &str = "index.wal";

/// Node table plus the descent starting point
pub(super) struct GraphState {
    pub(super) nodes: FxHashMap<VectorId, Arc<Vertex>>,
    /// None while the graph is empty
    pub(super) entry_point: Option<VectorId>,
    pub(super) max_layer: usize,
}

/// Observable graph state, for comparing an index before and after reopen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphSnapshot {
    /// Entry point id
    pub entry_point: Option<VectorId>,
    /// Highest layer
    pub max_layer: usize,
    /// Every vertex's adjacency, layer 0 first
    pub adjacency: BTreeMap<VectorId, Vec<Vec<VectorId>>>,
    /// Tombstoned ids
    pub tombstones: BTreeSet<VectorId>,
}

/// Concurrent HNSW index persisted through a write-ahead log
pub struct HnswIndex {
    pub(super) config: HnswConfig,
    pub(super) distance: DistanceFn,
    pub(super) graph: RwLock<GraphState>,
    pub(super) deleted: DashSet<VectorId>,
    wal: Mutex<Wal>,
    rng: Mutex<StdRng>,
    read_only: AtomicBool,
    recovery_stats: RecoveryStats,
}

impl HnswIndex {
    /// Open the index stored in `dir`, creating it if absent
    ///
    /// Validates `config`, replays `<dir>/index.wal`, then fills in vector
    /// payloads from `store`.
    ///
    /// # Errors
    ///
    /// - `Config` for an invalid configuration
    /// - `Io` if the WAL cannot be opened or read
    /// - `Corruption` / `ChecksumMismatch` / `UnknownOpcode` if the log is damaged
    pub fn open<P: AsRef<Path>>(
        dir: P,
        config: HnswConfig,
        durability: DurabilityMode,
        store: &dyn VectorStore,
    ) -> Result<Self> {
        config.validate()?;

        let mut wal = Wal::open(dir.as_ref().join(WAL_FILE_NAME), durability)?;
        let (recovered, recovery_stats) = recover(&mut wal, &config, store)?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let nodes = recovered
            .nodes
            .into_iter()
            .map(|(id, v)| (id, Arc::new(v)))
            .collect();
        let deleted = DashSet::new();
        for id in recovered.deleted {
            deleted.insert(id);
        }

        info!(
            path = %wal.path().display(),
            vertices = recovery_stats.vertices_restored,
            dimension = config.dimension,
            distance = %config.distance_type,
            "HNSW index opened"
        );

        Ok(Self {
            distance: distance_fn(config.distance_type),
            config,
            graph: RwLock::new(GraphState {
                nodes,
                entry_point: recovered.entry_point,
                max_layer: recovered.max_layer,
            }),
            deleted,
            wal: Mutex::new(wal),
            rng: Mutex::new(rng),
            read_only: AtomicBool::new(false),
            recovery_stats,
        })
    }

    // ========================================================================
    // Contract operations
    // ========================================================================

    /// Tombstone `id`
    ///
    /// Unknown ids are tombstoned as well. Allowed while frozen.
    pub fn delete(&self, id: VectorId) -> Result<()> {
        self.log(&WalRecord::DeleteVertex { id })?;
        self.deleted.insert(id);
        Ok(())
    }

    /// Write buffered WAL records and fsync
    pub fn flush(&self) -> Result<()> {
        self.wal.lock().fsync()
    }

    // ========================================================================
    // Freezing
    // ========================================================================

    /// Reject inserts until `unfreeze` (e.g. while a snapshot is taken)
    pub fn freeze(&self) {
        self.read_only.store(true, Ordering::SeqCst);
    }

    /// Accept inserts again
    pub fn unfreeze(&self) {
        self.read_only.store(false, Ordering::SeqCst);
    }

    /// True while frozen
    pub fn is_read_only(&self) -> bool {
        self.read_only.load(Ordering::SeqCst)
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    /// Number of vertices, tombstoned ones included
    pub fn len(&self) -> usize {
        self.graph.read().nodes.len()
    }

    /// True if no vertex was ever inserted
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if `id` has a vertex
    pub fn contains(&self, id: VectorId) -> bool {
        self.graph.read().nodes.contains_key(&id)
    }

    /// True if `id` is tombstoned
    pub fn is_deleted(&self, id: VectorId) -> bool {
        self.deleted.contains(&id)
    }

    /// Current entry point
    pub fn entry_point(&self) -> Option<VectorId> {
        self.graph.read().entry_point
    }

    /// Current highest layer
    pub fn max_layer(&self) -> usize {
        self.graph.read().max_layer
    }

    /// Highest layer of `id`
    pub fn level_of(&self, id: VectorId) -> Option<usize> {
        self.vertex(id).map(|v| v.level())
    }

    /// Copy of `id`'s neighbor list at `level`
    pub fn connections(&self, id: VectorId, level: usize) -> Option<Vec<VectorId>> {
        self.vertex(id).map(|v| v.connections_at(level))
    }

    /// Tombstoned ids in ascending order
    pub fn deleted_ids(&self) -> Vec<VectorId> {
        let mut ids: Vec<VectorId> = self.deleted.iter().map(|id| *id).collect();
        ids.sort_unstable();
        ids
    }

    /// Index configuration
    pub fn config(&self) -> &HnswConfig {
        &self.config
    }

    /// What the last open recovered
    pub fn recovery_stats(&self) -> &RecoveryStats {
        &self.recovery_stats
    }

    /// Capture entry point, max layer, adjacency and tombstones
    pub fn snapshot(&self) -> GraphSnapshot {
        let (entry_point, max_layer, vertices) = {
            let graph = self.graph.read();
            let vertices: Vec<Arc<Vertex>> = graph.nodes.values().cloned().collect();
            (graph.entry_point, graph.max_layer, vertices)
        };

        let adjacency = vertices
            .iter()
            .map(|v| (v.id(), v.read().to_vec()))
            .collect();

        GraphSnapshot {
            entry_point,
            max_layer,
            adjacency,
            tombstones: self.deleted_ids().into_iter().collect(),
        }
    }

    // ========================================================================
    // Internal helpers
    // ========================================================================

    /// Append one record to the WAL
    pub(super) fn log(&self, record: &WalRecord) -> Result<()> {
        self.wal.lock().append(record).map(|_| ())
    }

    /// Sample a layer: floor(-ln(U) * mL), U uniform in (0, 1]
    pub(super) fn sample_level(&self) -> usize {
        let u: f64 = 1.0 - self.rng.lock().gen::<f64>();
        (-u.ln() * self.config.ml()).floor() as usize
    }

    pub(super) fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.config.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.config.dimension,
                got: vector.len(),
            });
        }
        Ok(())
    }

    pub(super) fn vertex(&self, id: VectorId) -> Option<Arc<Vertex>> {
        self.graph.read().nodes.get(&id).cloned()
    }

    /// Resolve several ids under one read lock; unknown ids are skipped
    pub(super) fn vertices(&self, ids: &[VectorId]) -> Vec<Arc<Vertex>> {
        let graph = self.graph.read();
        ids.iter()
            .filter_map(|id| graph.nodes.get(id).cloned())
            .collect()
    }

    /// Distance from `query` to `vertex`, if the vertex has a vector
    pub(super) fn distance_to(&self, query: &[f32], vertex: &Vertex) -> Option<f32> {
        vertex.vector().map(|v| (self.distance)(query, v))
    }
}

impl VectorIndex for HnswIndex {
    fn insert(&self, vector: &[f32], id: VectorId) -> Result<()> {
        HnswIndex::insert(self, vector, id)
    }

    fn delete(&self, id: VectorId) -> Result<()> {
        HnswIndex::delete(self, id)
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        HnswIndex::search(self, query, k)
    }

    fn flush(&self) -> Result<()> {
        HnswIndex::flush(self)
    }
}
