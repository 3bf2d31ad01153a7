//! Layered search (HNSW paper, Algorithms 2 and 5).

use rustc_hash::FxHashSet;
use vectory_core::{Result, SearchResult, VectorId};

use super::heap::{Element, MaxHeap, MinHeap};
use super::index::HnswIndex;

impl HnswIndex {
    /// k-nearest-neighbor search
    ///
    /// Returns up to `k` live (non-tombstoned) vertices ranked closest first,
    /// ties broken by ascending id. Distances are lower-is-better for both
    /// distance types, so dot product scores come back negated.
    ///
    /// # Errors
    ///
    /// `DimensionMismatch` if `query` has the wrong length.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        self.check_dimension(query)?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let (entry_point, max_layer) = {
            let graph = self.graph.read();
            match graph.entry_point {
                Some(ep) => (ep, graph.max_layer),
                None => return Ok(Vec::new()),
            }
        };

        let mut eps = match self.vertex(entry_point) {
            Some(ep) => vec![Element::new(
                entry_point,
                self.distance_to(query, &ep).unwrap_or(f32::INFINITY),
            )],
            None => return Ok(Vec::new()),
        };

        for layer in (1..=max_layer).rev() {
            let nearest = self.search_layer(query, &eps, 1, layer).into_sorted_vec();
            if !nearest.is_empty() {
                eps = nearest;
            }
        }

        let ef = self.config.ef.max(k);
        let results = self
            .search_layer(query, &eps, ef, 0)
            .into_sorted_vec()
            .into_iter()
            .filter(|e| !self.deleted.contains(&e.id))
            .take(k)
            .map(|e| SearchResult::new(e.id, e.distance))
            .collect();

        Ok(results)
    }

    /// Beam search over one layer
    ///
    /// Returns at most `ef` elements nearest to `query`. An entry point with an
    /// infinite distance (no vector known) is explored but never returned.
    pub(super) fn search_layer(
        &self,
        query: &[f32],
        entry_points: &[Element],
        ef: usize,
        layer: usize,
    ) -> MaxHeap {
        let mut visited: FxHashSet<VectorId> = entry_points.iter().map(|e| e.id).collect();
        let mut candidates = MinHeap::from_slice(entry_points, ef);
        let mut results = MaxHeap::with_capacity(ef + 1);

        for ep in entry_points.iter().filter(|e| e.distance.is_finite()) {
            results.push(*ep);
            if results.len() > ef {
                results.pop();
            }
        }

        while let Some(current) = candidates.pop() {
            if let Some(worst) = results.peek() {
                if results.len() >= ef && current.distance > worst.distance {
                    break;
                }
            }

            let neighbors = match self.vertex(current.id) {
                Some(v) => v.connections_at(layer),
                None => continue,
            };
            let unvisited: Vec<VectorId> = neighbors
                .into_iter()
                .filter(|id| visited.insert(*id))
                .collect();

            for vertex in self.vertices(&unvisited) {
                let distance = match self.distance_to(query, &vertex) {
                    Some(d) => d,
                    None => continue,
                };
                let admit = results.len() < ef
                    || results.peek().map_or(true, |worst| distance < worst.distance);
                if admit {
                    let e = Element::new(vertex.id(), distance);
                    candidates.push(e);
                    results.push(e);
                    if results.len() > ef {
                        results.pop();
                    }
                }
            }
        }

        results
    }
}
