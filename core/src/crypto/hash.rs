//! # Hashing Utilities
//!
//! Two hash functions, two jobs:
//!
//! - **BLAKE3** — store root hashes, app hash combination, and address
//!   derivation. Fast everywhere and parallelizable, though for our leaf
//!   sizes single-threaded throughput is what matters.
//! - **SHA-256** — transaction ids use the double-SHA-256 construction,
//!   matching the convention of every chain ecosystem a transaction id
//!   might be quoted into.
//!
//! Both digests are 32 bytes. Nothing in the commit path is allowed to
//! hash floats, maps with unspecified order, or anything else that could
//! differ between replicas.

use sha2::{Digest, Sha256};

/// Compute the SHA-256 hash of the input data.
///
/// Returns the 32-byte digest as a `Vec<u8>` so callers can chain it
/// straight into [`double_sha256`].
pub fn sha256(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Compute the double-SHA-256 hash: `SHA-256(SHA-256(data))`.
///
/// Used for transaction ids. The outer hash closes the length-extension
/// door that plain SHA-256 leaves open.
pub fn double_sha256(data: &[u8]) -> Vec<u8> {
    sha256(&sha256(data))
}

/// Compute the BLAKE3 hash of the input data.
pub fn blake3_hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// Hash multiple byte slices together without concatenation overhead.
///
/// Feeding parts sequentially into the hasher produces the same digest
/// as hashing their concatenation, minus the temporary buffer.
pub fn blake3_hash_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(part);
    }
    *hasher.finalize().as_bytes()
}

/// Compute a binary Merkle root over a list of leaf hashes using BLAKE3.
///
/// Internal nodes are `BLAKE3(left || right)`; an odd element at any
/// level is paired with itself. An empty input returns all zeros (the
/// empty-tree sentinel), and a single leaf is paired with itself so the
/// root is always the output of a hash operation, never a raw leaf.
pub fn merkle_root(leaves: &[[u8; 32]]) -> [u8; 32] {
    if leaves.is_empty() {
        return [0u8; 32];
    }

    let mut level: Vec<[u8; 32]> = leaves.to_vec();

    if level.len() == 1 {
        return blake3_hash_multi(&[level[0].as_slice(), level[0].as_slice()]);
    }

    while level.len() > 1 {
        let mut next = Vec::with_capacity((level.len() + 1) / 2);
        for chunk in level.chunks(2) {
            let left = &chunk[0];
            let right = if chunk.len() == 2 { &chunk[1] } else { &chunk[0] };
            next.push(blake3_hash_multi(&[left.as_slice(), right.as_slice()]));
        }
        level = next;
    }

    level[0]
}
