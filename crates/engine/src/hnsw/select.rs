//! Neighbor selection (HNSW paper, Algorithms 3 and 4).
//!
//! Both strategies return at most `m` elements ranked closest first relative
//! to `base`, and never return `base_id` itself.

use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;
use vectory_core::VectorId;

use super::heap::{Element, MinHeap};
use super::index::HnswIndex;
use super::vertex::Vertex;

impl HnswIndex {
    /// Pick up to `m` neighbors for the vertex at `base` out of `candidates`
    ///
    /// `candidates` carry their distance to `base`. Layer `layer` is only
    /// consulted when candidate extension is enabled.
    pub(super) fn select_neighbors(
        &self,
        base: &[f32],
        base_id: VectorId,
        candidates: &[Element],
        m: usize,
        layer: usize,
    ) -> Vec<Element> {
        if self.config.heuristic {
            self.select_heuristic(base, base_id, candidates, m, layer)
        } else {
            select_simple(base_id, candidates, m)
        }
    }

    fn select_heuristic(
        &self,
        base: &[f32],
        base_id: VectorId,
        candidates: &[Element],
        m: usize,
        layer: usize,
    ) -> Vec<Element> {
        let mut pool: Vec<Element> = candidates
            .iter()
            .copied()
            .filter(|e| e.id != base_id)
            .collect();

        if self.config.extend_candidates {
            self.extend(base, base_id, &mut pool, layer);
        }

        let ids: Vec<VectorId> = pool.iter().map(|e| e.id).collect();
        let resolved: FxHashMap<VectorId, Arc<Vertex>> = self
            .vertices(&ids)
            .into_iter()
            .filter(|v| v.vector().is_some())
            .map(|v| (v.id(), v))
            .collect();

        let mut working = MinHeap::from_slice(&pool, 0);
        let mut discarded = MinHeap::new();
        let mut selected: Vec<(Element, Arc<Vertex>)> = Vec::with_capacity(m);

        while selected.len() < m {
            let e = match working.pop() {
                Some(e) => e,
                None => break,
            };
            let vertex = match resolved.get(&e.id) {
                Some(v) => Arc::clone(v),
                None => continue,
            };
            let vector = match vertex.vector() {
                Some(v) => v,
                None => continue,
            };

            // Keep e only if it is closer to base than to every vertex kept so far
            let dominated = selected.iter().any(|(_, r)| {
                self.distance_to(vector, r)
                    .map_or(false, |d| d < e.distance)
            });

            if dominated {
                discarded.push(e);
            } else {
                selected.push((e, vertex));
            }
        }

        let mut result: Vec<Element> = selected.into_iter().map(|(e, _)| e).collect();

        if self.config.keep_pruned_connections {
            while result.len() < m {
                match discarded.pop() {
                    Some(e) => result.push(e),
                    None => break,
                }
            }
        }

        result
    }

    /// Add the neighbors of every candidate at `layer` to `pool`
    fn extend(&self, base: &[f32], base_id: VectorId, pool: &mut Vec<Element>, layer: usize) {
        let mut seen: FxHashSet<VectorId> = pool.iter().map(|e| e.id).collect();
        seen.insert(base_id);

        let mut fresh = Vec::new();
        for candidate in self.vertices(&pool.iter().map(|e| e.id).collect::<Vec<_>>()) {
            for id in candidate.connections_at(layer) {
                if seen.insert(id) {
                    fresh.push(id);
                }
            }
        }

        for v in self.vertices(&fresh) {
            if let Some(d) = self.distance_to(base, &v) {
                pool.push(Element::new(v.id(), d));
            }
        }
    }
}

/// The `m` closest candidates
fn select_simple(base_id: VectorId, candidates: &[Element], m: usize) -> Vec<Element> {
    let mut sorted: Vec<Element> = candidates
        .iter()
        .copied()
        .filter(|e| e.id != base_id)
        .collect();
    sorted.sort_by(Element::cmp_closest_first);
    sorted.truncate(m);
    sorted
}
