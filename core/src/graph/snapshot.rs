//! Immutable graph snapshots handed to the rank boundary.

use std::collections::{BTreeMap, BTreeSet};

use super::cid::CidNumber;

/// A frozen copy of the content graph at a block boundary.
///
/// Ordered maps throughout: the rank algorithm must be pure, and handing
/// it a structure with unspecified iteration order would be an open
/// invitation to nondeterminism.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphSnapshot {
    node_count: u64,
    out_links: BTreeMap<CidNumber, BTreeSet<CidNumber>>,
    in_links: BTreeMap<CidNumber, BTreeSet<CidNumber>>,
}

impl GraphSnapshot {
    pub fn new(
        node_count: u64,
        out_links: BTreeMap<CidNumber, BTreeSet<CidNumber>>,
        in_links: BTreeMap<CidNumber, BTreeSet<CidNumber>>,
    ) -> Self {
        Self {
            node_count,
            out_links,
            in_links,
        }
    }

    /// Number of registered cids (including isolated ones).
    pub fn node_count(&self) -> u64 {
        self.node_count
    }

    /// Total number of directed edges.
    pub fn link_count(&self) -> u64 {
        self.out_links.values().map(|s| s.len() as u64).sum()
    }

    /// Outgoing neighbors of a node, in ascending id order.
    pub fn out_neighbors(&self, id: CidNumber) -> impl Iterator<Item = CidNumber> + '_ {
        self.out_links.get(&id).into_iter().flatten().copied()
    }

    /// Incoming neighbors of a node, in ascending id order.
    pub fn in_neighbors(&self, id: CidNumber) -> impl Iterator<Item = CidNumber> + '_ {
        self.in_links.get(&id).into_iter().flatten().copied()
    }

    /// In-degree of a node.
    pub fn in_degree(&self, id: CidNumber) -> u64 {
        self.in_links.get(&id).map(|s| s.len() as u64).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.node_count == 0
    }
}
