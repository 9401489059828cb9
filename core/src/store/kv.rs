//! # Versioned Key-Value Store
//!
//! One [`KvStore`] per logical dataset, each backed by two sled trees:
//!
//! | Tree              | Key                                | Value   |
//! |-------------------|------------------------------------|---------|
//! | `<name>`          | raw key bytes                      | value   |
//! | `<name>/versions` | `len(key) BE ‖ key ‖ height BE`    | value   |
//!
//! Writes are buffered in an ordered in-memory map until [`commit`]
//! applies them in a single atomic batch and records a version entry for
//! every changed key, so historical reads (`get_at_version`) can replay
//! any key at any committed height. The length prefix in version keys
//! keeps keys that are prefixes of one another from colliding.
//!
//! The root hash is a BLAKE3 Merkle root over `BLAKE3(len(key) ‖ key ‖
//! value)` leaves taken in byte-lexicographic key order — a pure function
//! of store content, independent of insertion order.
//!
//! [`commit`]: KvStore::commit

use std::collections::BTreeMap;

use crate::crypto::hash::{blake3_hash_multi, merkle_root};

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Storage faults. Unlike [`StateError`](crate::error::StateError), these
/// are fatal: the durability of committed state is the foundation of
/// cross-replica agreement, so the host must halt rather than continue
/// past one.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("store corrupted: {0}")]
    Corrupted(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

// ---------------------------------------------------------------------------
// KvStore
// ---------------------------------------------------------------------------

/// A named, versioned, merkle-committing key-value store.
pub struct KvStore {
    name: &'static str,
    /// Committed contents.
    tree: sled::Tree,
    /// Historical values, keyed by `len(key) ‖ key ‖ height`.
    versions: sled::Tree,
    /// Writes buffered since the last commit, in key order.
    pending: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl KvStore {
    /// Open (or create) the store's trees within a sled database.
    pub fn open(db: &sled::Db, name: &'static str) -> StoreResult<Self> {
        let tree = db.open_tree(name)?;
        let versions = db.open_tree(format!("{name}/versions"))?;
        Ok(Self {
            name,
            tree,
            versions,
            pending: BTreeMap::new(),
        })
    }

    /// Store name, as registered in the registry.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Read a key, observing writes buffered since the last commit.
    pub fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        if let Some(value) = self.pending.get(key) {
            return Ok(Some(value.clone()));
        }
        Ok(self.tree.get(key)?.map(|v| v.to_vec()))
    }

    /// Read a key from committed state only, ignoring the pending
    /// buffer. This is the read path for external queries, which must
    /// never observe a half-applied block.
    pub fn get_committed(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.tree.get(key)?.map(|v| v.to_vec()))
    }

    /// Whether a key exists (pending or committed).
    pub fn has(&self, key: &[u8]) -> StoreResult<bool> {
        if self.pending.contains_key(key) {
            return Ok(true);
        }
        Ok(self.tree.contains_key(key)?)
    }

    /// Buffer a write. It becomes durable, versioned, and visible to
    /// `get_committed` only at the next [`commit`](Self::commit).
    pub fn set(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.pending.insert(key, value);
    }

    /// Number of writes buffered since the last commit.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Lazy iteration over all `(key, value)` pairs whose key starts
    /// with `prefix`, in byte-lexicographic key order, merging committed
    /// contents with the pending buffer (pending wins on key collision).
    pub fn iterate_prefix(&self, prefix: &[u8]) -> StoreIter {
        let staged: Vec<(Vec<u8>, Vec<u8>)> = self
            .pending
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        StoreIter {
            committed: self.tree.scan_prefix(prefix).peekable(),
            staged: staged.into_iter().peekable(),
        }
    }

    /// Historical read: the value of `key` as of `height`, i.e. the
    /// newest version entry with height ≤ the requested one. Returns
    /// `None` if the key did not exist at that height.
    pub fn get_at_version(&self, height: u64, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        let prefix = version_prefix(key);
        let mut low = prefix.clone();
        low.extend_from_slice(&0u64.to_be_bytes());
        let mut high = prefix;
        high.extend_from_slice(&height.to_be_bytes());

        match self.versions.range(low..=high).next_back() {
            Some(Ok((_, value))) => Ok(Some(value.to_vec())),
            Some(Err(e)) => Err(StoreError::Backend(e)),
            None => Ok(None),
        }
    }

    /// Apply all buffered writes atomically, record their version
    /// entries at `height`, and return the new root hash. With an empty
    /// buffer this is a pure root recomputation.
    pub fn commit(&mut self, height: u64) -> StoreResult<[u8; 32]> {
        if !self.pending.is_empty() {
            let mut batch = sled::Batch::default();
            let mut version_batch = sled::Batch::default();
            for (key, value) in &self.pending {
                batch.insert(key.as_slice(), value.as_slice());
                let mut vkey = version_prefix(key);
                vkey.extend_from_slice(&height.to_be_bytes());
                version_batch.insert(vkey, value.as_slice());
            }
            self.tree.apply_batch(batch)?;
            self.versions.apply_batch(version_batch)?;
            self.pending.clear();
        }
        self.root_hash()
    }

    /// Merkle root of the committed contents. Two stores with identical
    /// content produce identical roots regardless of write order.
    pub fn root_hash(&self) -> StoreResult<[u8; 32]> {
        let mut leaves = Vec::new();
        for entry in self.tree.iter() {
            let (key, value) = entry?;
            let key_len = (key.len() as u32).to_be_bytes();
            leaves.push(blake3_hash_multi(&[&key_len, &key[..], &value[..]]));
        }
        Ok(merkle_root(&leaves))
    }

    /// Whether the committed store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}

/// `len(key) BE ‖ key` — the unambiguous per-key prefix in the versions
/// tree.
fn version_prefix(key: &[u8]) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(4 + key.len() + 8);
    prefix.extend_from_slice(&(key.len() as u32).to_be_bytes());
    prefix.extend_from_slice(key);
    prefix
}

// ---------------------------------------------------------------------------
// StoreIter
// ---------------------------------------------------------------------------

/// Ordered merge of a committed sled range with staged pending writes.
pub struct StoreIter {
    committed: std::iter::Peekable<sled::Iter>,
    staged: std::iter::Peekable<std::vec::IntoIter<(Vec<u8>, Vec<u8>)>>,
}

/// Which side of the merge yields the next entry.
enum MergeStep {
    Done,
    Staged,
    Committed,
    /// Same key on both sides: staged shadows committed.
    Shadowed,
    BackendError,
}

impl StoreIter {
    /// Decide the next step without holding the peeked references past
    /// the comparison.
    fn classify(&mut self) -> MergeStep {
        match (self.committed.peek(), self.staged.peek()) {
            (None, None) => MergeStep::Done,
            (None, Some(_)) => MergeStep::Staged,
            (Some(Err(_)), _) => MergeStep::BackendError,
            (Some(Ok(_)), None) => MergeStep::Committed,
            (Some(Ok((committed_key, _))), Some((staged_key, _))) => {
                if committed_key[..] == staged_key[..] {
                    MergeStep::Shadowed
                } else if committed_key[..] > staged_key[..] {
                    MergeStep::Staged
                } else {
                    MergeStep::Committed
                }
            }
        }
    }
}

impl Iterator for StoreIter {
    type Item = StoreResult<(Vec<u8>, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.classify() {
            MergeStep::Done => None,
            MergeStep::Staged => self.staged.next().map(Ok),
            MergeStep::Shadowed => {
                let _ = self.committed.next();
                self.staged.next().map(Ok)
            }
            MergeStep::Committed => match self.committed.next() {
                Some(Ok((key, value))) => Some(Ok((key.to_vec(), value.to_vec()))),
                Some(Err(e)) => Some(Err(StoreError::Backend(e))),
                None => None,
            },
            MergeStep::BackendError => match self.committed.next() {
                Some(Err(e)) => Some(Err(StoreError::Backend(e))),
                // Unreachable: classify just peeked an error.
                _ => None,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
