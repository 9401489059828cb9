//! # Content Index
//!
//! The append-only bijection between cids and dense integer ids,
//! persisted in both directions inside the `cid_index` store:
//!
//! - `c:<cid bytes>` → id (8 bytes BE) — forward lookup
//! - `n:<id BE>` → cid bytes — reverse lookup
//!
//! Ids are allocated densely in registration order (`next = count`), so
//! the reverse entries iterate back out in id order — which is exactly
//! how the mirror rebuilds its id table on load.

use crate::error::StateError;
use crate::mirror::StateMirror;
use crate::store::KvStore;

use super::cid::{Cid, CidNumber};

/// Key prefix for cid → id entries.
pub const CID_KEY_PREFIX: &[u8] = b"c:";
/// Key prefix for id → cid entries.
pub const NUMBER_KEY_PREFIX: &[u8] = b"n:";

/// `c:<cid>` — forward mapping key.
pub fn cid_key(cid: &Cid) -> Vec<u8> {
    let mut key = CID_KEY_PREFIX.to_vec();
    key.extend_from_slice(cid.as_bytes());
    key
}

/// `n:<id BE>` — reverse mapping key.
pub fn number_key(id: CidNumber) -> Vec<u8> {
    let mut key = NUMBER_KEY_PREFIX.to_vec();
    key.extend_from_slice(&id.to_be_bytes());
    key
}

/// Write-through accessor for the content index: registrations land in
/// the mirror and the `cid_index` store together.
pub struct CidIndex<'a> {
    store: &'a mut KvStore,
    mirror: &'a mut StateMirror,
}

impl<'a> CidIndex<'a> {
    pub fn new(store: &'a mut KvStore, mirror: &'a mut StateMirror) -> Self {
        Self { store, mirror }
    }

    /// Resolve a cid to its dense id, registering it if unseen.
    /// Idempotent: a known cid returns its existing id and performs no
    /// write.
    pub fn resolve(&mut self, cid: &Cid) -> CidNumber {
        if let Some(id) = self.mirror.cid_number(cid) {
            return id;
        }
        let id = self.mirror.register_cid(cid.clone());
        self.store
            .set(cid_key(cid), id.to_be_bytes().to_vec());
        self.store
            .set(number_key(id), cid.as_bytes().to_vec());
        id
    }

    /// Reverse lookup. `CidNotFound` is unreachable through the public
    /// API (ids are only handed out by `resolve`); seeing it means the
    /// index and its caller disagree about history.
    pub fn lookup(&self, id: CidNumber) -> Result<Cid, StateError> {
        self.mirror
            .cid(id)
            .cloned()
            .ok_or(StateError::CidNotFound(id))
    }
}
