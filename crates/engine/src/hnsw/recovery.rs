//! Graph recovery from the WAL.
//!
//! ## Recovery Sequence
//!
//! 1. `Wal::open` has already truncated a torn final record
//! 2. Replay every record in sequence order onto an empty graph
//! 3. Backfill vector payloads from the `VectorStore`
//!
//! Replay is deterministic: the same log always yields the same adjacency,
//! entry point and tombstone set. The graph never persists vectors, so a
//! vertex the store cannot resolve stays in the graph without a payload and
//! is routed through but never returned.

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{info, warn};
use vectory_core::{Error, HnswConfig, Result, VectorId, VectorStore};
use vectory_durability::{Wal, WalRecord};

use super::vertex::Vertex;

/// Counters describing what an open recovered
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryStats {
    /// WAL records applied
    pub records_replayed: u64,
    /// Vertices rebuilt
    pub vertices_restored: usize,
    /// Tombstoned ids
    pub tombstones_restored: usize,
    /// Vertices whose vector was found in the store
    pub vectors_backfilled: usize,
    /// Vertices the store had no usable vector for
    pub vectors_missing: usize,
    /// Store keys with no vertex in the graph
    pub store_only_keys: usize,
}

/// Graph state rebuilt by replay, not yet shared
pub(super) struct Recovered {
    pub(super) nodes: FxHashMap<VectorId, Vertex>,
    pub(super) entry_point: Option<VectorId>,
    pub(super) max_layer: usize,
    pub(super) deleted: FxHashSet<VectorId>,
}

impl Recovered {
    fn empty() -> Self {
        Recovered {
            nodes: FxHashMap::default(),
            entry_point: None,
            max_layer: 0,
            deleted: FxHashSet::default(),
        }
    }

    /// Apply one record. `seq` is only used in error messages.
    fn apply(&mut self, seq: u64, record: WalRecord, config: &HnswConfig) -> Result<()> {
        match record {
            WalRecord::AddVertex { id, level } => {
                if self.nodes.contains_key(&id) {
                    return Err(Error::Corruption(format!(
                        "record {}: vertex {} added twice",
                        seq, id
                    )));
                }
                self.nodes
                    .insert(id, Vertex::new(id, None, level as usize, config));
            }
            WalRecord::SetEntryPointWithMaxLayer { id, level } => {
                self.existing(seq, id)?;
                self.entry_point = Some(id);
                self.max_layer = level as usize;
            }
            WalRecord::SetConnectionsAtLevel {
                id,
                level,
                neighbors,
            } => {
                if !self
                    .existing(seq, id)?
                    .connections_mut()
                    .set(level as usize, neighbors)
                {
                    return Err(level_error(seq, id, level));
                }
            }
            WalRecord::AddConnectionAtLevel {
                id,
                level,
                neighbor,
            } => {
                if !self
                    .existing(seq, id)?
                    .connections_mut()
                    .add(level as usize, neighbor)
                {
                    return Err(level_error(seq, id, level));
                }
            }
            WalRecord::DeleteVertex { id } => {
                self.deleted.insert(id);
            }
        }
        Ok(())
    }

    fn existing(&mut self, seq: u64, id: VectorId) -> Result<&mut Vertex> {
        self.nodes.get_mut(&id).ok_or_else(|| {
            Error::Corruption(format!("record {}: unknown vertex {}", seq, id))
        })
    }
}

fn level_error(seq: u64, id: VectorId, level: u32) -> Error {
    Error::Corruption(format!(
        "record {}: vertex {} has no layer {}",
        seq, id, level
    ))
}

/// Rebuild the graph from `wal` and fill vectors from `store`
pub(super) fn recover(
    wal: &mut Wal,
    config: &HnswConfig,
    store: &dyn VectorStore,
) -> Result<(Recovered, RecoveryStats)> {
    let mut recovered = Recovered::empty();
    let mut stats = RecoveryStats::default();

    for entry in wal.read_from(1)? {
        let (seq, record) = entry?;
        recovered.apply(seq, record, config)?;
        stats.records_replayed += 1;
    }

    if recovered.entry_point.is_none() && !recovered.nodes.is_empty() {
        warn!(
            vertices = recovered.nodes.len(),
            "WAL has vertices but no entry point; they are unreachable"
        );
    }

    for (id, vertex) in recovered.nodes.iter_mut() {
        match store.get_vector(*id) {
            Some(vector) if vector.len() == config.dimension => {
                vertex.set_vector(vector);
                stats.vectors_backfilled += 1;
            }
            Some(vector) => {
                warn!(
                    id = *id,
                    expected = config.dimension,
                    got = vector.len(),
                    "Stored vector has wrong dimension; vertex kept without payload"
                );
                stats.vectors_missing += 1;
            }
            None => {
                warn!(id = *id, "No stored vector; vertex kept without payload");
                stats.vectors_missing += 1;
            }
        }
    }

    let keys: Vec<VectorId> = store.keys().collect();
    stats.store_only_keys = keys
        .iter()
        .filter(|id| !recovered.nodes.contains_key(id))
        .count();

    stats.vertices_restored = recovered.nodes.len();
    stats.tombstones_restored = recovered.deleted.len();

    info!(
        records = stats.records_replayed,
        vertices = stats.vertices_restored,
        tombstones = stats.tombstones_restored,
        missing = stats.vectors_missing,
        store_only = stats.store_only_keys,
        "Graph recovery complete"
    );

    Ok((recovered, stats))
}
