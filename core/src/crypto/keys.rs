//! # Key Management
//!
//! Ed25519 keypairs for transaction signers. Deterministic signatures,
//! 32+32 byte keys, fast verification — the right default for a chain
//! that verifies every transaction in every block.
//!
//! Private key bytes are never logged and `Keypair` deliberately does not
//! implement `Serialize`; exporting a secret key is an explicit
//! `secret_key_bytes()` call, not something serde does behind your back.

use ed25519_dalek::{
    Signature as DalekSignature, Signer, SigningKey, Verifier, VerifyingKey, SECRET_KEY_LENGTH,
};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors that can occur during key operations. Intentionally vague
/// about *why* something failed — error messages must not leak key
/// material.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("invalid secret key bytes")]
    InvalidSecretKey,

    #[error("invalid public key bytes: not a valid Ed25519 point")]
    InvalidPublicKey,

    #[error("invalid signature bytes: wrong length")]
    InvalidSignature,
}

/// An Ed25519 signing keypair.
pub struct Keypair {
    signing_key: SigningKey,
}

/// The public half of a signer identity; this is the `signer` field that
/// travels inside every transaction.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey {
    bytes: [u8; 32],
}

/// An Ed25519 signature over a transaction's signable bytes.
///
/// Always exactly 64 bytes; stored as `Vec<u8>` for serde compatibility.
/// A wrong-length signature simply fails verification.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    bytes: Vec<u8>,
}

impl Keypair {
    /// Generate a fresh keypair from the OS cryptographic RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Construct a keypair deterministically from a 32-byte seed. In
    /// Ed25519 the seed *is* the secret key. A weak seed yields a weak
    /// key; callers are expected to use a CSPRNG or KDF.
    pub fn from_seed(seed: &[u8; SECRET_KEY_LENGTH]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Reconstruct a keypair from a hex-encoded secret key.
    pub fn from_hex(hex_str: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_str).map_err(|_| KeyError::InvalidSecretKey)?;
        let arr: [u8; SECRET_KEY_LENGTH] =
            bytes.try_into().map_err(|_| KeyError::InvalidSecretKey)?;
        Ok(Self::from_seed(&arr))
    }

    /// The public key associated with this keypair.
    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            bytes: self.signing_key.verifying_key().to_bytes(),
        }
    }

    /// Raw secret key bytes. Handle with care.
    pub fn secret_key_bytes(&self) -> [u8; SECRET_KEY_LENGTH] {
        self.signing_key.to_bytes()
    }

    /// Sign a message. Ed25519 signatures are deterministic for a given
    /// (key, message) pair — no randomness needed at signing time.
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature {
            bytes: self.signing_key.sign(message).to_bytes().to_vec(),
        }
    }
}

impl PublicKey {
    /// Construct from raw 32-byte key material. The point is validated
    /// lazily at verification time.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    /// Parse a hex-encoded public key.
    pub fn from_hex(hex_str: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_str).map_err(|_| KeyError::InvalidPublicKey)?;
        let arr: [u8; 32] = bytes.try_into().map_err(|_| KeyError::InvalidPublicKey)?;
        Ok(Self { bytes: arr })
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// Hex encoding of the key bytes.
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// Verify a signature over a message. Returns `false` for malformed
    /// keys or signatures rather than erroring — verification is a
    /// boolean question.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        let Ok(verifying_key) = VerifyingKey::from_bytes(&self.bytes) else {
            return false;
        };
        let Ok(sig_arr) = <[u8; 64]>::try_from(signature.bytes.as_slice()) else {
            return false;
        };
        let sig = DalekSignature::from_bytes(&sig_arr);
        verifying_key.verify(message, &sig).is_ok()
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_hex())
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Signature {
    /// Construct from a 64-byte signature array.
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self {
            bytes: bytes.to_vec(),
        }
    }

    /// Parse a hex-encoded signature.
    pub fn from_hex(hex_str: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_str).map_err(|_| KeyError::InvalidSignature)?;
        if bytes.len() != 64 {
            return Err(KeyError::InvalidSignature);
        }
        Ok(Self { bytes })
    }

    /// Hex encoding of the signature bytes.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", self.to_hex())
    }
}
