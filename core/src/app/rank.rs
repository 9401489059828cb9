//! # Rank Boundary
//!
//! The rank algorithm is a black box to the lifecycle controller: it
//! receives an immutable [`GraphSnapshot`] and returns a score per node.
//! The one hard requirement is purity — the same snapshot must produce
//! the same scores on every replica, which is why the contract speaks in
//! ordered maps and fixed-point integers rather than floats.
//!
//! [`DegreeRank`] is the reference implementation: a normalized
//! in-degree measure. Real deployments substitute their own algorithm
//! through [`CortexApp::with_rank`](crate::app::CortexApp::with_rank).

use std::collections::BTreeMap;

use crate::config::RANK_PRECISION;
use crate::graph::{CidNumber, GraphSnapshot};

/// A pure function from graph snapshot to per-node scores.
pub trait RankAlgorithm: Send + Sync {
    fn compute(&self, graph: &GraphSnapshot) -> BTreeMap<CidNumber, u64>;
}

/// Reference rank: `score(v) = PRECISION * (1 + in_degree(v)) /
/// (node_count + link_count)`. Crude as a relevance measure, but pure,
/// total, and cheap — exactly what the boundary contract needs proven
/// against.
pub struct DegreeRank;

impl RankAlgorithm for DegreeRank {
    fn compute(&self, graph: &GraphSnapshot) -> BTreeMap<CidNumber, u64> {
        let mut scores = BTreeMap::new();
        let denominator = graph.node_count() + graph.link_count();
        if denominator == 0 {
            return scores;
        }
        for id in 0..graph.node_count() {
            let weight = 1 + graph.in_degree(id);
            scores.insert(id, RANK_PRECISION.saturating_mul(weight) / denominator);
        }
        scores
    }
}

/// `rank` store key for a node: id as big-endian bytes.
pub fn rank_key(id: CidNumber) -> Vec<u8> {
    id.to_be_bytes().to_vec()
}

/// `rank` store value for a score.
pub fn encode_score(score: u64) -> Vec<u8> {
    score.to_be_bytes().to_vec()
}

/// Decode a score read back from the `rank` store.
pub fn decode_score(bytes: &[u8]) -> Option<u64> {
    Some(u64::from_be_bytes(bytes.try_into().ok()?))
}
