//! # Store Registry
//!
//! Owner of all durable state: the five named [`KvStore`]s plus a small
//! metadata tree, all inside one sled database.
//!
//! | Tree        | Contents                                   |
//! |-------------|--------------------------------------------|
//! | `accounts`  | address bytes → bincode(Account)           |
//! | `cid_index` | `c:<cid>` → id BE, `n:<id BE>` → cid bytes |
//! | `in_links`  | `to BE ‖ from BE` → ()                     |
//! | `out_links` | `from BE ‖ to BE` → ()                     |
//! | `rank`      | id BE → score BE                           |
//! | `meta`      | latest height, app hash per height         |
//!
//! [`commit`] commits every store in the fixed [`STORE_ORDER`] and folds
//! the five root hashes (in that order) into the app hash. Heights must
//! be committed in strict sequence; anything else is corruption and is
//! reported as a fatal [`StoreError`].
//!
//! [`commit`]: StoreRegistry::commit

use std::path::Path;

use crate::config::{
    STORE_ACCOUNTS, STORE_CID_INDEX, STORE_IN_LINKS, STORE_ORDER, STORE_OUT_LINKS, STORE_RANK,
};
use crate::crypto::hash::blake3_hash_multi;

use super::kv::{KvStore, StoreError, StoreResult};

/// Well-known key in the `meta` tree for the latest committed height.
const META_LATEST_HEIGHT: &[u8] = b"latest_height";
/// Key prefix in the `meta` tree for per-height app hashes.
const META_APP_HASH_PREFIX: &[u8] = b"app_hash/";

/// The registry of persistent stores. Exclusively owns durable state;
/// everything the in-memory mirror holds is derived from here.
pub struct StoreRegistry {
    db: sled::Db,
    meta: sled::Tree,
    accounts: KvStore,
    cid_index: KvStore,
    in_links: KvStore,
    out_links: KvStore,
    rank: KvStore,
}

impl StoreRegistry {
    /// Open or create a registry at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        Self::from_db(sled::open(path)?)
    }

    /// Create a registry that lives in memory and disappears on drop.
    /// No filesystem side effects — ideal for tests.
    pub fn open_temporary() -> StoreResult<Self> {
        Self::from_db(sled::Config::new().temporary(true).open()?)
    }

    fn from_db(db: sled::Db) -> StoreResult<Self> {
        let meta = db.open_tree("meta")?;
        let accounts = KvStore::open(&db, STORE_ACCOUNTS)?;
        let cid_index = KvStore::open(&db, STORE_CID_INDEX)?;
        let in_links = KvStore::open(&db, STORE_IN_LINKS)?;
        let out_links = KvStore::open(&db, STORE_OUT_LINKS)?;
        let rank = KvStore::open(&db, STORE_RANK)?;
        Ok(Self {
            db,
            meta,
            accounts,
            cid_index,
            in_links,
            out_links,
            rank,
        })
    }

    // -- Store accessors ----------------------------------------------------

    pub fn accounts(&self) -> &KvStore {
        &self.accounts
    }

    pub fn accounts_mut(&mut self) -> &mut KvStore {
        &mut self.accounts
    }

    pub fn cid_index(&self) -> &KvStore {
        &self.cid_index
    }

    pub fn cid_index_mut(&mut self) -> &mut KvStore {
        &mut self.cid_index
    }

    pub fn in_links(&self) -> &KvStore {
        &self.in_links
    }

    pub fn in_links_mut(&mut self) -> &mut KvStore {
        &mut self.in_links
    }

    pub fn out_links(&self) -> &KvStore {
        &self.out_links
    }

    pub fn out_links_mut(&mut self) -> &mut KvStore {
        &mut self.out_links
    }

    pub fn rank(&self) -> &KvStore {
        &self.rank
    }

    pub fn rank_mut(&mut self) -> &mut KvStore {
        &mut self.rank
    }

    /// Both adjacency stores at once, for callers that write an edge's
    /// two directions together.
    pub fn links_mut(&mut self) -> (&mut KvStore, &mut KvStore) {
        (&mut self.out_links, &mut self.in_links)
    }

    /// Look up a store by its registered name.
    pub fn store(&self, name: &str) -> Option<&KvStore> {
        match name {
            STORE_ACCOUNTS => Some(&self.accounts),
            STORE_CID_INDEX => Some(&self.cid_index),
            STORE_IN_LINKS => Some(&self.in_links),
            STORE_OUT_LINKS => Some(&self.out_links),
            STORE_RANK => Some(&self.rank),
            _ => None,
        }
    }

    // -- Commit -------------------------------------------------------------

    /// Commit all stores at `height` and return the combined app hash.
    ///
    /// Heights must arrive in strict sequence: 0 on a fresh database,
    /// `latest + 1` afterwards. The app hash is
    /// `BLAKE3(root_accounts ‖ root_cid_index ‖ root_in_links ‖
    /// root_out_links ‖ root_rank)` — the concatenation order is
    /// [`STORE_ORDER`] and is part of the consensus contract.
    pub fn commit(&mut self, height: u64) -> StoreResult<[u8; 32]> {
        let expected = match self.latest_height()? {
            None => 0,
            Some(latest) => latest + 1,
        };
        if height != expected {
            return Err(StoreError::Corrupted(format!(
                "non-sequential commit: height {height}, expected {expected}"
            )));
        }

        let mut roots: Vec<[u8; 32]> = Vec::with_capacity(STORE_ORDER.len());
        for name in STORE_ORDER {
            // `store_mut_by_name` keeps the iteration order tied to the
            // single source of truth in config.
            let store = match name {
                STORE_ACCOUNTS => &mut self.accounts,
                STORE_CID_INDEX => &mut self.cid_index,
                STORE_IN_LINKS => &mut self.in_links,
                STORE_OUT_LINKS => &mut self.out_links,
                STORE_RANK => &mut self.rank,
                _ => unreachable!("STORE_ORDER names a store the registry does not hold"),
            };
            roots.push(store.commit(height)?);
        }

        let parts: Vec<&[u8]> = roots.iter().map(|r| r.as_slice()).collect();
        let app_hash = blake3_hash_multi(&parts);

        let mut hash_key = META_APP_HASH_PREFIX.to_vec();
        hash_key.extend_from_slice(&height.to_be_bytes());
        self.meta.insert(hash_key, &app_hash)?;
        self.meta.insert(META_LATEST_HEIGHT, &height.to_be_bytes())?;
        self.db.flush()?;

        Ok(app_hash)
    }

    // -- Metadata -----------------------------------------------------------

    /// Latest committed height, or `None` for a fresh database.
    pub fn latest_height(&self) -> StoreResult<Option<u64>> {
        match self.meta.get(META_LATEST_HEIGHT)? {
            Some(bytes) => {
                let arr: [u8; 8] = bytes.as_ref().try_into().map_err(|_| {
                    StoreError::Corrupted("latest height is not 8 bytes".to_string())
                })?;
                Ok(Some(u64::from_be_bytes(arr)))
            }
            None => Ok(None),
        }
    }

    /// App hash recorded at a committed height.
    pub fn app_hash_at(&self, height: u64) -> StoreResult<Option<[u8; 32]>> {
        let mut key = META_APP_HASH_PREFIX.to_vec();
        key.extend_from_slice(&height.to_be_bytes());
        match self.meta.get(key)? {
            Some(bytes) => {
                let arr: [u8; 32] = bytes.as_ref().try_into().map_err(|_| {
                    StoreError::Corrupted(format!("app hash at {height} is not 32 bytes"))
                })?;
                Ok(Some(arr))
            }
            None => Ok(None),
        }
    }

    // -- Queries ------------------------------------------------------------

    /// Point query against committed state. With `at_height`, replays
    /// the key at that height; otherwise reads the latest committed
    /// value. Never observes a block in flight.
    pub fn query(
        &self,
        store_name: &str,
        key: &[u8],
        at_height: Option<u64>,
    ) -> StoreResult<Option<Vec<u8>>> {
        let Some(store) = self.store(store_name) else {
            return Ok(None);
        };
        match at_height {
            Some(height) => store.get_at_version(height, key),
            None => store.get_committed(key),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_registry_has_no_height() {
        let registry = StoreRegistry::open_temporary().unwrap();
        assert!(registry.latest_height().unwrap().is_none());
    }

    #[test]
    fn commit_tracks_height_and_app_hash() {
        let mut registry = StoreRegistry::open_temporary().unwrap();
        let h0 = registry.commit(0).unwrap();
        assert_eq!(registry.latest_height().unwrap(), Some(0));
        assert_eq!(registry.app_hash_at(0).unwrap(), Some(h0));

        registry.accounts_mut().set(b"a".to_vec(), b"1".to_vec());
        let h1 = registry.commit(1).unwrap();
        assert_eq!(registry.latest_height().unwrap(), Some(1));
        assert_ne!(h0, h1);
    }

    #[test]
    fn commit_rejects_non_sequential_heights() {
        let mut registry = StoreRegistry::open_temporary().unwrap();
        registry.commit(0).unwrap();
        let err = registry.commit(5).unwrap_err();
        assert!(matches!(err, StoreError::Corrupted(_)));
    }

    #[test]
    fn identical_content_identical_app_hash() {
        let mut r1 = StoreRegistry::open_temporary().unwrap();
        let mut r2 = StoreRegistry::open_temporary().unwrap();

        r1.accounts_mut().set(b"a".to_vec(), b"1".to_vec());
        r1.out_links_mut().set(b"x".to_vec(), vec![]);
        r2.out_links_mut().set(b"x".to_vec(), vec![]);
        r2.accounts_mut().set(b"a".to_vec(), b"1".to_vec());

        assert_eq!(r1.commit(0).unwrap(), r2.commit(0).unwrap());
    }

    #[test]
    fn same_content_in_different_stores_differs() {
        // The app hash must distinguish *which* store holds a pair.
        let mut r1 = StoreRegistry::open_temporary().unwrap();
        let mut r2 = StoreRegistry::open_temporary().unwrap();

        r1.in_links_mut().set(b"k".to_vec(), b"v".to_vec());
        r2.out_links_mut().set(b"k".to_vec(), b"v".to_vec());

        assert_ne!(r1.commit(0).unwrap(), r2.commit(0).unwrap());
    }

    #[test]
    fn query_reads_committed_and_historical_state() {
        let mut registry = StoreRegistry::open_temporary().unwrap();
        registry.rank_mut().set(b"id".to_vec(), b"10".to_vec());
        registry.commit(0).unwrap();
        registry.rank_mut().set(b"id".to_vec(), b"20".to_vec());

        // Pending writes are invisible to queries.
        assert_eq!(
            registry.query("rank", b"id", None).unwrap(),
            Some(b"10".to_vec())
        );
        registry.commit(1).unwrap();
        assert_eq!(
            registry.query("rank", b"id", None).unwrap(),
            Some(b"20".to_vec())
        );
        assert_eq!(
            registry.query("rank", b"id", Some(0)).unwrap(),
            Some(b"10".to_vec())
        );
        assert_eq!(registry.query("unknown", b"id", None).unwrap(), None);
    }
}
