//! Distance functions for graph construction and search.
//!
//! Every function here returns a "distance": lower = closer. Dot product is a
//! similarity, so it is negated before it reaches any heap. Callers guarantee
//! equal, non-zero lengths (the index checks dimension on every call).
//! No implicit normalization of vectors.

use vectory_core::DistanceType;

/// Distance function signature, chosen once per index
pub type DistanceFn = fn(&[f32], &[f32]) -> f32;

/// Resolve the distance function for a configured distance type
pub fn distance_fn(distance_type: DistanceType) -> DistanceFn {
    match distance_type {
        DistanceType::DotProduct => negated_dot_product,
        DistanceType::Euclidean => euclidean_distance,
    }
}

/// Dot product (inner product)
///
/// Range: unbounded, higher = more similar
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "Dimension mismatch in dot product");
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Negated dot product, so that lower = more similar
pub fn negated_dot_product(a: &[f32], b: &[f32]) -> f32 {
    -dot_product(a, b)
}

/// Euclidean distance (L2 distance)
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "Dimension mismatch in euclidean distance");
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}
