//! # In-Memory Mirror
//!
//! [`StateMirror`] is the read-optimized, fully reconstructable cache
//! over the account, cid-index, and adjacency stores. It is built once
//! at process start by a full ordered scan ([`StateMirror::load`]),
//! mutated only inside the single-writer block-processing critical
//! section (via the write-through accessors in `ledger` and `graph`),
//! and discarded on shutdown. It is never the source of truth: at every
//! block boundary its contents are, by construction, exactly what a
//! fresh `load` would produce — `tests/e2e.rs` holds that invariant.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::graph::cid::{Cid, CidNumber};
use crate::graph::index::NUMBER_KEY_PREFIX;
use crate::graph::links::split_link_key;
use crate::graph::snapshot::GraphSnapshot;
use crate::ledger::{decode_account, Account, Address};
use crate::store::{StoreError, StoreRegistry, StoreResult};

/// Memory-resident copy of the account ledger, content index, and link
/// graph.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateMirror {
    accounts: HashMap<Address, Account>,
    cid_numbers: HashMap<Cid, CidNumber>,
    /// Reverse table: index position is the dense id.
    cids: Vec<Cid>,
    out_links: HashMap<CidNumber, BTreeSet<CidNumber>>,
    in_links: HashMap<CidNumber, BTreeSet<CidNumber>>,
    link_pairs: HashSet<(CidNumber, CidNumber)>,
}

impl StateMirror {
    /// An empty mirror, for a chain with no committed state yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the mirror from committed store contents with one full
    /// ordered scan per store.
    pub fn load(registry: &StoreRegistry) -> StoreResult<Self> {
        let mut mirror = Self::new();

        for entry in registry.accounts().iterate_prefix(&[]) {
            let (key, value) = entry?;
            let address = Address::from_bytes(&key).ok_or_else(|| {
                StoreError::Corrupted(format!("accounts key is not an address: {}", hex::encode(&key)))
            })?;
            mirror.accounts.insert(address, decode_account(&value)?);
        }

        // Reverse cid entries iterate in id order, so the dense table
        // rebuilds by appending.
        for entry in registry.cid_index().iterate_prefix(NUMBER_KEY_PREFIX) {
            let (key, value) = entry?;
            let id_bytes: [u8; 8] = key
                .get(NUMBER_KEY_PREFIX.len()..)
                .and_then(|suffix| suffix.try_into().ok())
                .ok_or_else(|| StoreError::Corrupted("cid_index reverse key malformed".into()))?;
            let id = u64::from_be_bytes(id_bytes);
            if id != mirror.cids.len() as u64 {
                return Err(StoreError::Corrupted(format!(
                    "cid ids are not dense: found {id}, expected {}",
                    mirror.cids.len()
                )));
            }
            let cid = Cid::from_store_bytes(&value)
                .map_err(|e| StoreError::Corrupted(format!("stored cid invalid: {e}")))?;
            mirror.cid_numbers.insert(cid.clone(), id);
            mirror.cids.push(cid);
        }

        for entry in registry.out_links().iterate_prefix(&[]) {
            let (key, _) = entry?;
            let (from, to) = split_link_key(&key)
                .ok_or_else(|| StoreError::Corrupted("out_links key malformed".into()))?;
            mirror.out_links.entry(from).or_default().insert(to);
            mirror.link_pairs.insert((from, to));
        }

        for entry in registry.in_links().iterate_prefix(&[]) {
            let (key, _) = entry?;
            let (to, from) = split_link_key(&key)
                .ok_or_else(|| StoreError::Corrupted("in_links key malformed".into()))?;
            mirror.in_links.entry(to).or_default().insert(from);
            if !mirror.link_pairs.contains(&(from, to)) {
                return Err(StoreError::Corrupted(format!(
                    "in_links holds {from} -> {to} but out_links does not"
                )));
            }
        }

        Ok(mirror)
    }

    // -- Account reads ------------------------------------------------------

    pub fn account(&self, address: &Address) -> Option<&Account> {
        self.accounts.get(address)
    }

    pub fn balance(&self, address: &Address) -> u64 {
        self.accounts.get(address).map(|a| a.balance).unwrap_or(0)
    }

    pub fn sequence(&self, address: &Address) -> u64 {
        self.accounts.get(address).map(|a| a.sequence).unwrap_or(0)
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    // -- Content index reads ------------------------------------------------

    pub fn cid_number(&self, cid: &Cid) -> Option<CidNumber> {
        self.cid_numbers.get(cid).copied()
    }

    pub fn cid(&self, id: CidNumber) -> Option<&Cid> {
        self.cids.get(id as usize)
    }

    /// Number of registered cids; also the next id to allocate.
    pub fn cid_count(&self) -> u64 {
        self.cids.len() as u64
    }

    // -- Graph reads --------------------------------------------------------

    pub fn has_link(&self, from: CidNumber, to: CidNumber) -> bool {
        self.link_pairs.contains(&(from, to))
    }

    pub fn link_count(&self) -> u64 {
        self.link_pairs.len() as u64
    }

    /// Outgoing neighbors in ascending id order. Restartable: each call
    /// yields a fresh iterator over the same sorted set.
    pub fn out_neighbors(&self, id: CidNumber) -> impl Iterator<Item = CidNumber> + '_ {
        self.out_links.get(&id).into_iter().flatten().copied()
    }

    /// Incoming neighbors in ascending id order.
    pub fn in_neighbors(&self, id: CidNumber) -> impl Iterator<Item = CidNumber> + '_ {
        self.in_links.get(&id).into_iter().flatten().copied()
    }

    /// Freeze the current graph into an ordered, owned snapshot for the
    /// rank boundary.
    pub fn snapshot_graph(&self) -> GraphSnapshot {
        let out: BTreeMap<_, _> = self
            .out_links
            .iter()
            .map(|(k, v)| (*k, v.clone()))
            .collect();
        let inl: BTreeMap<_, _> = self
            .in_links
            .iter()
            .map(|(k, v)| (*k, v.clone()))
            .collect();
        GraphSnapshot::new(self.cid_count(), out, inl)
    }

    // -- Writes (single-writer block processing only) -----------------------

    pub fn put_account(&mut self, address: Address, account: Account) {
        self.accounts.insert(address, account);
    }

    /// Register a new cid and return its dense id. The caller (the
    /// content index) guarantees the cid is unseen.
    pub fn register_cid(&mut self, cid: Cid) -> CidNumber {
        debug_assert!(!self.cid_numbers.contains_key(&cid));
        let id = self.cids.len() as CidNumber;
        self.cid_numbers.insert(cid.clone(), id);
        self.cids.push(cid);
        id
    }

    /// Insert an edge into both adjacency indices. Returns `false` if
    /// the ordered pair was already present.
    pub fn insert_link(&mut self, from: CidNumber, to: CidNumber) -> bool {
        if !self.link_pairs.insert((from, to)) {
            return false;
        }
        self.out_links.entry(from).or_default().insert(to);
        self.in_links.entry(to).or_default().insert(from);
        true
    }
}
