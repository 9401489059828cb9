//! # Link Graph Store
//!
//! Directed edges between dense cid ids, persisted in two adjacency
//! stores so neighbor enumeration never scans the whole graph:
//!
//! - `out_links`: key `from BE ‖ to BE`, empty value
//! - `in_links`:  key `to BE ‖ from BE`, empty value
//!
//! Edges are immutable once created and at most one edge exists per
//! ordered pair. Self-loops are allowed — nothing in the rank contract
//! forbids a cid linking to itself.

use crate::error::StateError;
use crate::mirror::StateMirror;
use crate::store::KvStore;

use super::cid::CidNumber;

/// `<a BE> ‖ <b BE>` — adjacency key for either direction.
pub fn link_key(a: CidNumber, b: CidNumber) -> Vec<u8> {
    let mut key = Vec::with_capacity(16);
    key.extend_from_slice(&a.to_be_bytes());
    key.extend_from_slice(&b.to_be_bytes());
    key
}

/// Split an adjacency key back into its two ids.
pub fn split_link_key(key: &[u8]) -> Option<(CidNumber, CidNumber)> {
    if key.len() != 16 {
        return None;
    }
    let a = u64::from_be_bytes(key[..8].try_into().ok()?);
    let b = u64::from_be_bytes(key[8..].try_into().ok()?);
    Some((a, b))
}

/// Write-through accessor for the link graph: every new edge lands in
/// the mirror's adjacency sets and both directional stores together.
pub struct LinkStore<'a> {
    out_links: &'a mut KvStore,
    in_links: &'a mut KvStore,
    mirror: &'a mut StateMirror,
}

impl<'a> LinkStore<'a> {
    pub fn new(
        out_links: &'a mut KvStore,
        in_links: &'a mut KvStore,
        mirror: &'a mut StateMirror,
    ) -> Self {
        Self {
            out_links,
            in_links,
            mirror,
        }
    }

    /// Insert the ordered edge `(from, to)`. Fails with
    /// `LinkAlreadyExists` if the pair is already present.
    pub fn create(&mut self, from: CidNumber, to: CidNumber) -> Result<(), StateError> {
        if !self.mirror.insert_link(from, to) {
            return Err(StateError::LinkAlreadyExists { from, to });
        }
        self.out_links.set(link_key(from, to), Vec::new());
        self.in_links.set(link_key(to, from), Vec::new());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreRegistry;

    fn setup() -> (StoreRegistry, StateMirror) {
        (StoreRegistry::open_temporary().unwrap(), StateMirror::new())
    }

    fn links<'a>(registry: &'a mut StoreRegistry, mirror: &'a mut StateMirror) -> LinkStore<'a> {
        // Split the registry borrow across the two adjacency stores.
        let (out_links, in_links) = registry.links_mut();
        LinkStore::new(out_links, in_links, mirror)
    }

    #[test]
    fn create_populates_both_directions() {
        let (mut registry, mut mirror) = setup();
        links(&mut registry, &mut mirror).create(1, 2).unwrap();

        assert!(registry.out_links().has(&link_key(1, 2)).unwrap());
        assert!(registry.in_links().has(&link_key(2, 1)).unwrap());
        assert!(mirror.has_link(1, 2));
        assert!(!mirror.has_link(2, 1));
    }

    #[test]
    fn duplicate_link_rejected() {
        let (mut registry, mut mirror) = setup();
        links(&mut registry, &mut mirror).create(1, 2).unwrap();
        let err = links(&mut registry, &mut mirror).create(1, 2).unwrap_err();
        assert_eq!(err, StateError::LinkAlreadyExists { from: 1, to: 2 });

        // The neighbor appears exactly once.
        let neighbors: Vec<_> = mirror.out_neighbors(1).collect();
        assert_eq!(neighbors, vec![2]);
    }

    #[test]
    fn reverse_edge_is_distinct() {
        let (mut registry, mut mirror) = setup();
        links(&mut registry, &mut mirror).create(1, 2).unwrap();
        links(&mut registry, &mut mirror).create(2, 1).unwrap();
        assert!(mirror.has_link(1, 2));
        assert!(mirror.has_link(2, 1));
    }

    #[test]
    fn self_loop_is_allowed_once() {
        let (mut registry, mut mirror) = setup();
        links(&mut registry, &mut mirror).create(3, 3).unwrap();
        let err = links(&mut registry, &mut mirror).create(3, 3).unwrap_err();
        assert_eq!(err.kind(), "LinkAlreadyExists");
    }

    #[test]
    fn link_key_roundtrip() {
        let key = link_key(7, 11);
        assert_eq!(split_link_key(&key), Some((7, 11)));
        assert_eq!(split_link_key(b"short"), None);
    }
}
