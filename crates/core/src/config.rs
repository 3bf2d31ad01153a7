//! HNSW index configuration.
//!
//! Graph parameters are fixed when an index is opened. `validate()` runs
//! eagerly so that misconfiguration surfaces at construction, never mid-insert.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Distance function used to compare vectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DistanceType {
    /// Inner product; larger = more similar
    #[serde(rename = "dot_product")]
    DotProduct,
    /// L2 distance; smaller = more similar
    #[serde(rename = "euclidean_distance")]
    Euclidean,
}

impl DistanceType {
    /// Configuration name of this distance type
    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceType::DotProduct => "dot_product",
            DistanceType::Euclidean => "euclidean_distance",
        }
    }
}

impl fmt::Display for DistanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistanceType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dot_product" => Ok(DistanceType::DotProduct),
            "euclidean_distance" => Ok(DistanceType::Euclidean),
            other => Err(ConfigError::UnknownDistanceType(other.to_string())),
        }
    }
}

/// HNSW graph configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HnswConfig {
    /// Vector dimension, fixed for the lifetime of the index
    pub dimension: usize,
    /// Neighbors selected for a newly inserted vertex per layer (default: 64)
    pub m: usize,
    /// Degree cap for layers above 0 (default: 128). Layer 0 uses `2 * m_max`.
    pub m_max: usize,
    /// Build-time beam width (default: 100)
    pub ef_construction: usize,
    /// Search-time beam width (default: 100)
    pub ef: usize,
    /// Use diversity-aware neighbor selection instead of plain closest-m
    pub heuristic: bool,
    /// Distance function
    pub distance_type: DistanceType,
    /// Heuristic only: widen the candidate pool with the candidates' own neighbors
    #[serde(default)]
    pub extend_candidates: bool,
    /// Heuristic only: pad an under-filled selection from discarded candidates
    #[serde(default)]
    pub keep_pruned_connections: bool,
    /// Seed for level sampling; `None` seeds from OS entropy
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for HnswConfig {
    fn default() -> Self {
        HnswConfig {
            dimension: 0,
            m: 64,
            m_max: 128,
            ef_construction: 100,
            ef: 100,
            heuristic: true,
            distance_type: DistanceType::Euclidean,
            extend_candidates: false,
            keep_pruned_connections: false,
            seed: None,
        }
    }
}

impl HnswConfig {
    /// Create a configuration with default graph parameters for `dimension`
    pub fn new(dimension: usize) -> Self {
        HnswConfig {
            dimension,
            ..Self::default()
        }
    }

    /// Small graph with a fixed seed, for fast deterministic tests
    pub fn for_testing(dimension: usize) -> Self {
        HnswConfig {
            dimension,
            m: 8,
            m_max: 8,
            ef_construction: 64,
            ef: 64,
            seed: Some(42),
            ..Self::default()
        }
    }

    /// Set M (builder pattern).
    pub fn with_m(mut self, m: usize) -> Self {
        self.m = m;
        self
    }

    /// Set the per-layer degree cap (builder pattern).
    pub fn with_m_max(mut self, m_max: usize) -> Self {
        self.m_max = m_max;
        self
    }

    /// Set efConstruction (builder pattern).
    pub fn with_ef_construction(mut self, ef_construction: usize) -> Self {
        self.ef_construction = ef_construction;
        self
    }

    /// Set ef (builder pattern).
    pub fn with_ef(mut self, ef: usize) -> Self {
        self.ef = ef;
        self
    }

    /// Enable or disable heuristic neighbor selection (builder pattern).
    pub fn with_heuristic(mut self, heuristic: bool) -> Self {
        self.heuristic = heuristic;
        self
    }

    /// Set the distance function (builder pattern).
    pub fn with_distance_type(mut self, distance_type: DistanceType) -> Self {
        self.distance_type = distance_type;
        self
    }

    /// Enable candidate extension for the heuristic (builder pattern).
    pub fn with_extend_candidates(mut self, extend: bool) -> Self {
        self.extend_candidates = extend;
        self
    }

    /// Keep pruned connections when the heuristic under-fills (builder pattern).
    pub fn with_keep_pruned_connections(mut self, keep: bool) -> Self {
        self.keep_pruned_connections = keep;
        self
    }

    /// Fix the level sampling seed (builder pattern).
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Degree cap for layer 0
    pub fn m_max0(&self) -> usize {
        self.m_max * 2
    }

    /// Degree cap for `level`
    pub fn max_connections(&self, level: usize) -> usize {
        if level == 0 {
            self.m_max0()
        } else {
            self.m_max
        }
    }

    /// Level multiplier: 1/ln(m)
    pub fn ml(&self) -> f64 {
        1.0 / (self.m as f64).ln()
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dimension == 0 {
            return Err(ConfigError::InvalidDimension);
        }
        if self.m < 2 {
            return Err(ConfigError::InvalidM(self.m));
        }
        if self.m_max == 0 {
            return Err(ConfigError::InvalidMMax);
        }
        if self.ef == 0 {
            return Err(ConfigError::InvalidEf);
        }
        if self.ef_construction == 0 {
            return Err(ConfigError::InvalidEfConstruction);
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Dimension must be positive.
    #[error("dimension must be greater than 0")]
    InvalidDimension,

    /// M must be at least 2 so that the level multiplier 1/ln(M) is finite.
    #[error("m must be at least 2, got {0}")]
    InvalidM(usize),

    /// m_max must be positive.
    #[error("m_max must be greater than 0")]
    InvalidMMax,

    /// ef must be positive.
    #[error("ef must be greater than 0")]
    InvalidEf,

    /// ef_construction must be positive.
    #[error("ef_construction must be greater than 0")]
    InvalidEfConstruction,

    /// Distance type name is not recognised.
    #[error("unsupported distance type '{0}', expected 'dot_product' or 'euclidean_distance'")]
    UnknownDistanceType(String),
}
