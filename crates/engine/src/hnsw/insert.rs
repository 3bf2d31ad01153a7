//! Insertion (HNSW paper, Algorithm 1).
//!
//! WAL records for one insert are appended in this order:
//! `AddVertex`, then per layer from the top down one `SetConnectionsAtLevel`
//! for the new vertex followed by one `AddConnectionAtLevel` or
//! `SetConnectionsAtLevel` per back-edge, then `SetEntryPointWithMaxLayer`
//! if the vertex is the new top.

use std::sync::Arc;
use tracing::trace;
use vectory_core::{Error, Result, VectorId};
use vectory_durability::WalRecord;

use super::heap::Element;
use super::index::HnswIndex;
use super::vertex::Vertex;

/// Outcome of registering a vertex in the node table
enum Registration {
    /// The graph was empty; the vertex is now the entry point
    First,
    /// Regular insert that still needs linking
    Linked {
        vertex: Arc<Vertex>,
        entry_point: VectorId,
        max_layer: usize,
    },
}

impl HnswIndex {
    /// Insert `vector` under `id`
    ///
    /// # Errors
    ///
    /// - `ReadOnlyIndex` if frozen
    /// - `DimensionMismatch` for a vector of the wrong length
    /// - `VertexExists` if `id` is already indexed
    /// - `Io` if a WAL append fails; the graph keeps every change logged before the failure
    pub fn insert(&self, vector: &[f32], id: VectorId) -> Result<()> {
        if self.is_read_only() {
            return Err(Error::ReadOnlyIndex);
        }
        self.check_dimension(vector)?;

        let level = self.sample_level();

        let (vertex, entry_point, max_layer) = match self.register(vector, id, level)? {
            Registration::First => {
                trace!(id, "Inserted first vertex");
                return Ok(());
            }
            Registration::Linked {
                vertex,
                entry_point,
                max_layer,
            } => (vertex, entry_point, max_layer),
        };

        let mut eps = match self.vertex(entry_point) {
            Some(ep) => vec![Element::new(
                entry_point,
                self.distance_to(vector, &ep).unwrap_or(f32::INFINITY),
            )],
            None => Vec::new(),
        };

        // Lookup phase: greedy descent through layers above the new vertex
        for layer in (level + 1..=max_layer).rev() {
            let nearest = self.search_layer(vector, &eps, 1, layer).into_sorted_vec();
            if !nearest.is_empty() {
                eps = nearest;
            }
        }

        // Construction phase
        for layer in (0..=level.min(max_layer)).rev() {
            let candidates = self
                .search_layer(vector, &eps, self.config.ef_construction, layer)
                .into_sorted_vec();

            let m = self.config.m.min(self.config.max_connections(layer));
            let selected = self.select_neighbors(vector, id, &candidates, m, layer);
            let neighbor_ids: Vec<VectorId> = selected.iter().map(|e| e.id).collect();

            {
                let mut conns = vertex.write();
                self.log(&WalRecord::SetConnectionsAtLevel {
                    id,
                    level: layer as u32,
                    neighbors: neighbor_ids.clone(),
                })?;
                conns.set(layer, neighbor_ids.clone());
            }

            for neighbor in self.vertices(&neighbor_ids) {
                self.link_back(&neighbor, &vertex, layer)?;
            }

            if !candidates.is_empty() {
                eps = candidates;
            }
        }

        if level > max_layer {
            self.promote(id, level)?;
        }

        trace!(id, level, "Inserted vertex");
        Ok(())
    }

    /// Add `id` to the node table under the graph write lock
    ///
    /// The empty -> non-empty transition happens here, exactly once: the
    /// first caller to find no entry point becomes it, at layer 0.
    fn register(&self, vector: &[f32], id: VectorId, level: usize) -> Result<Registration> {
        let mut graph = self.graph.write();

        if graph.nodes.contains_key(&id) {
            return Err(Error::VertexExists(id));
        }

        match graph.entry_point {
            None => {
                let vertex = Arc::new(Vertex::new(id, Some(vector.to_vec()), 0, &self.config));
                self.log(&WalRecord::AddVertex { id, level: 0 })?;
                graph.nodes.insert(id, vertex);

                self.log(&WalRecord::SetEntryPointWithMaxLayer { id, level: 0 })?;
                graph.entry_point = Some(id);
                graph.max_layer = 0;
                Ok(Registration::First)
            }
            Some(entry_point) => {
                let vertex = Arc::new(Vertex::new(id, Some(vector.to_vec()), level, &self.config));
                self.log(&WalRecord::AddVertex {
                    id,
                    level: level as u32,
                })?;
                graph.nodes.insert(id, Arc::clone(&vertex));
                Ok(Registration::Linked {
                    vertex,
                    entry_point,
                    max_layer: graph.max_layer,
                })
            }
        }
    }

    /// Add the back-edge `neighbor -> new` at `layer`, pruning if over capacity
    ///
    /// Pruning is optimistic: the replacement list is computed from a snapshot
    /// without holding the neighbor's lock, then applied only if the list is
    /// still unchanged. Otherwise the whole step is retried.
    fn link_back(&self, neighbor: &Vertex, new: &Vertex, layer: usize) -> Result<()> {
        let cap = self.config.max_connections(layer);

        loop {
            let snapshot = {
                let mut conns = neighbor.write();
                let current = conns.get(layer);
                if current.contains(&new.id()) {
                    return Ok(());
                }
                if current.len() < cap {
                    self.log(&WalRecord::AddConnectionAtLevel {
                        id: neighbor.id(),
                        level: layer as u32,
                        neighbor: new.id(),
                    })?;
                    conns.add(layer, new.id());
                    return Ok(());
                }
                current.to_vec()
            };

            let base = match neighbor.vector() {
                Some(v) => v,
                // A vertex without a vector is never selected as a neighbor
                None => return Ok(()),
            };

            let mut ids = snapshot.clone();
            ids.push(new.id());
            let candidates: Vec<Element> = self
                .vertices(&ids)
                .iter()
                .filter_map(|v| self.distance_to(base, v).map(|d| Element::new(v.id(), d)))
                .collect();
            let pruned: Vec<VectorId> = self
                .select_neighbors(base, neighbor.id(), &candidates, cap, layer)
                .iter()
                .map(|e| e.id)
                .collect();

            let mut conns = neighbor.write();
            if conns.get(layer) != snapshot.as_slice() {
                continue;
            }
            self.log(&WalRecord::SetConnectionsAtLevel {
                id: neighbor.id(),
                level: layer as u32,
                neighbors: pruned.clone(),
            })?;
            conns.set(layer, pruned);
            return Ok(());
        }
    }

    /// Make `id` the entry point if `level` is still above the current top
    fn promote(&self, id: VectorId, level: usize) -> Result<()> {
        let mut graph = self.graph.write();
        if level > graph.max_layer {
            self.log(&WalRecord::SetEntryPointWithMaxLayer {
                id,
                level: level as u32,
            })?;
            graph.entry_point = Some(id);
            graph.max_layer = level;
            trace!(id, level, "Promoted entry point");
        }
        Ok(())
    }
}
