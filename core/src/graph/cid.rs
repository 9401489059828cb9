//! Content identifiers.

use std::fmt;

use crate::config::MAX_CID_LENGTH;
use crate::error::StateError;

/// Dense integer id assigned to a cid on first registration. Ids start
/// at 0, are allocated in registration order, and are never reused.
pub type CidNumber = u64;

/// An opaque, validated content identifier.
///
/// Cortex does not interpret the string — IPFS hashes, URLs, and UUIDs
/// are all fine — it only bounds the length and rejects the empty
/// string.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cid(String);

impl Cid {
    /// Validate and wrap a raw identifier string.
    pub fn new(raw: impl Into<String>) -> Result<Self, StateError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(StateError::InvalidCid("empty".to_string()));
        }
        if raw.len() > MAX_CID_LENGTH {
            return Err(StateError::InvalidCid(format!(
                "length {} exceeds maximum {MAX_CID_LENGTH}",
                raw.len()
            )));
        }
        Ok(Self(raw))
    }

    /// Reconstruct a cid from bytes read back out of the `cid_index`
    /// store. Store contents were validated on the way in, so a failure
    /// here means corruption.
    pub fn from_store_bytes(bytes: &[u8]) -> Result<Self, StateError> {
        let raw = std::str::from_utf8(bytes)
            .map_err(|_| StateError::InvalidCid("not valid utf-8".to_string()))?;
        Self::new(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cid({})", self.0)
    }
}
