//! Cryptographic primitives: hashing and Ed25519 signatures.

pub mod hash;
pub mod keys;

pub use hash::{blake3_hash, blake3_hash_multi, double_sha256, merkle_root, sha256};
pub use keys::{KeyError, Keypair, PublicKey, Signature};
