//! Transaction-level error taxonomy.
//!
//! Every variant here is recoverable at transaction granularity: the
//! offending transaction is rejected and recorded, state is untouched,
//! and block processing continues with the next transaction. Storage
//! faults are a different animal entirely — see
//! [`StoreError`](crate::store::StoreError), which is fatal.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::graph::CidNumber;

/// Reasons a transaction can be rejected.
///
/// Rejection never mutates state: the sequence number is not consumed,
/// the fee is not collected, and correctly-ordered retries remain valid.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum StateError {
    /// The content identifier is empty or exceeds the length limit.
    #[error("invalid cid: {0}")]
    InvalidCid(String),

    /// A dense id has no cid mapping. The index is append-only, so this
    /// is unreachable through the public API; seeing it means the store
    /// and index disagree.
    #[error("cid number {0} has no mapping")]
    CidNotFound(CidNumber),

    /// The ordered (from, to) pair is already present in the graph.
    #[error("link {from} -> {to} already exists")]
    LinkAlreadyExists { from: CidNumber, to: CidNumber },

    /// The signer's balance cannot cover the requested debit.
    #[error("insufficient funds for {address}: have {available}, need {required}")]
    InsufficientFunds {
        address: String,
        available: u64,
        required: u64,
    },

    /// The transaction sequence does not match the account's next
    /// expected sequence.
    #[error("invalid sequence for {address}: expected {expected}, got {got}")]
    InvalidSequence {
        address: String,
        expected: u64,
        got: u64,
    },

    /// Missing or non-verifying signature.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// No handler is registered for the transaction's type tag.
    #[error("no route for transaction type {0:?}")]
    Unroutable(String),

    /// The raw transaction or its payload could not be decoded, or a
    /// decoded field is structurally invalid (e.g. zero amount).
    #[error("malformed transaction: {0}")]
    Malformed(String),

    /// An internal execution fault inside a handler (e.g. balance
    /// arithmetic overflow). The transaction is rejected with no partial
    /// writes.
    #[error("internal execution fault: {0}")]
    Internal(String),
}

impl StateError {
    /// Short stable name of the error kind, for logs and API responses.
    pub fn kind(&self) -> &'static str {
        match self {
            StateError::InvalidCid(_) => "InvalidCid",
            StateError::CidNotFound(_) => "CidNotFound",
            StateError::LinkAlreadyExists { .. } => "LinkAlreadyExists",
            StateError::InsufficientFunds { .. } => "InsufficientFunds",
            StateError::InvalidSequence { .. } => "InvalidSequence",
            StateError::Unauthorized(_) => "Unauthorized",
            StateError::Unroutable(_) => "Unroutable",
            StateError::Malformed(_) => "Malformed",
            StateError::Internal(_) => "Internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_are_stable() {
        assert_eq!(StateError::InvalidCid("".into()).kind(), "InvalidCid");
        assert_eq!(
            StateError::LinkAlreadyExists { from: 1, to: 2 }.kind(),
            "LinkAlreadyExists"
        );
        assert_eq!(StateError::Unroutable("x".into()).kind(), "Unroutable");
    }

    #[test]
    fn display_includes_context() {
        let err = StateError::InsufficientFunds {
            address: "ab".into(),
            available: 10,
            required: 25,
        };
        let msg = err.to_string();
        assert!(msg.contains("have 10"));
        assert!(msg.contains("need 25"));
    }

    #[test]
    fn serde_roundtrip() {
        let err = StateError::InvalidSequence {
            address: "cd".into(),
            expected: 3,
            got: 1,
        };
        let json = serde_json::to_string(&err).unwrap();
        let back: StateError = serde_json::from_str(&json).unwrap();
        assert_eq!(err, back);
    }
}
