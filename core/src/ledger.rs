//! # Account Ledger
//!
//! Addresses, account state, and the write path for balances and
//! sequence numbers.
//!
//! An [`Address`] is the first 20 bytes of the BLAKE3 hash of a signer's
//! Ed25519 public key. An [`Account`] is created implicitly on first
//! credit; its `sequence` strictly increases with each successfully
//! applied transaction from that address and never resets.
//!
//! [`AccountLedger`] is the only component that writes account state. It
//! writes through to both the in-memory mirror and the `accounts` store
//! so the two can never drift apart at a block boundary. Handlers do not
//! call it directly — their mutations are staged in a
//! [`TxOverlay`](crate::tx::TxOverlay) and flow through here when the
//! overlay is applied.

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::crypto::{blake3_hash, PublicKey};
use crate::error::StateError;
use crate::mirror::StateMirror;
use crate::store::{KvStore, StoreResult};

/// Length of an address in bytes.
pub const ADDRESS_LENGTH: usize = 20;

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// A fixed-length account identifier, derived from a public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; ADDRESS_LENGTH]);

impl Address {
    /// Derive the address of a public key: the first 20 bytes of
    /// `BLAKE3(key bytes)`.
    pub fn from_public_key(key: &PublicKey) -> Self {
        let digest = blake3_hash(key.as_bytes());
        let mut bytes = [0u8; ADDRESS_LENGTH];
        bytes.copy_from_slice(&digest[..ADDRESS_LENGTH]);
        Self(bytes)
    }

    /// Construct from raw bytes; `None` if the length is wrong.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; ADDRESS_LENGTH] = bytes.try_into().ok()?;
        Some(Self(arr))
    }

    /// Parse a hex-encoded address.
    pub fn from_hex(hex_str: &str) -> Option<Self> {
        Self::from_bytes(&hex::decode(hex_str).ok()?)
    }

    /// Raw address bytes — this is the `accounts` store key.
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }

    /// Hex encoding of the address.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

// Addresses serialize as hex strings so genesis files and API responses
// stay human-readable.
impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::from_hex(&s)
            .ok_or_else(|| D::Error::custom(format!("invalid address: {:?}", s)))
    }
}

// ---------------------------------------------------------------------------
// Account
// ---------------------------------------------------------------------------

/// The on-chain state of a single account. Every field is
/// consensus-critical.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Token balance. Never negative by construction.
    pub balance: u64,
    /// Sequence of the last successfully applied transaction from this
    /// address. The next acceptable transaction carries `sequence + 1`.
    pub sequence: u64,
}

impl Account {
    /// A fresh account holding the given balance.
    pub fn with_balance(balance: u64) -> Self {
        Self {
            balance,
            sequence: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// AccountLedger
// ---------------------------------------------------------------------------

/// Write-through accessor for account state: every mutation lands in the
/// mirror and the `accounts` store together.
pub struct AccountLedger<'a> {
    store: &'a mut KvStore,
    mirror: &'a mut StateMirror,
}

impl<'a> AccountLedger<'a> {
    pub fn new(store: &'a mut KvStore, mirror: &'a mut StateMirror) -> Self {
        Self { store, mirror }
    }

    /// Current account state, defaulting to an empty account for unseen
    /// addresses.
    pub fn account(&self, address: &Address) -> Account {
        self.mirror.account(address).cloned().unwrap_or_default()
    }

    /// Next acceptable transaction sequence for an address.
    pub fn next_sequence(&self, address: &Address) -> u64 {
        self.account(address).sequence + 1
    }

    /// Add `amount` to an address, creating the account on first credit.
    pub fn credit(&mut self, address: &Address, amount: u64) -> Result<(), StateError> {
        let mut account = self.account(address);
        account.balance = account
            .balance
            .checked_add(amount)
            .ok_or_else(|| StateError::Internal(format!("balance overflow for {address}")))?;
        self.put(address, account);
        Ok(())
    }

    /// Remove `amount` from an address; fails with `InsufficientFunds`
    /// if the balance cannot cover it.
    pub fn debit(&mut self, address: &Address, amount: u64) -> Result<(), StateError> {
        let mut account = self.account(address);
        if account.balance < amount {
            return Err(StateError::InsufficientFunds {
                address: address.to_hex(),
                available: account.balance,
                required: amount,
            });
        }
        account.balance -= amount;
        self.put(address, account);
        Ok(())
    }

    /// Overwrite an account's full state. Used when applying a staged
    /// overlay, where balance and sequence changed together.
    pub fn put(&mut self, address: &Address, account: Account) {
        self.store
            .set(address.as_bytes().to_vec(), encode_account(&account));
        self.mirror.put_account(*address, account);
    }
}

/// Bincode-encode an account for the `accounts` store.
pub fn encode_account(account: &Account) -> Vec<u8> {
    // A two-u64 struct cannot fail bincode serialization.
    bincode::serialize(account).unwrap_or_default()
}

/// Decode an account value read back from the `accounts` store.
pub fn decode_account(bytes: &[u8]) -> StoreResult<Account> {
    bincode::deserialize(bytes)
        .map_err(|e| crate::store::StoreError::Serialization(e.to_string()))
}
