//! Transaction wire types and per-transaction results.

use serde::{Deserialize, Serialize};

use crate::config::PROTOCOL_VERSION;
use crate::crypto::hash::double_sha256;
use crate::crypto::{PublicKey, Signature};
use crate::error::StateError;
use crate::ledger::Address;

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// A Cortex transaction.
///
/// The wire form is the bincode encoding of this struct. The payload is
/// itself bincode of a typed payload ([`TransferPayload`] or
/// [`LinkPayload`]), selected by `type_tag` — the router neither knows
/// nor cares what is inside; decoding is the handler's job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Route tag selecting the handler ("bank", "link", ...).
    pub type_tag: String,
    /// Opaque handler payload.
    pub payload: Vec<u8>,
    /// The signer's Ed25519 public key. The account address is derived
    /// from it, so no separate key lookup is needed at verification.
    pub signer: PublicKey,
    /// Must equal the signer's current sequence + 1.
    pub sequence: u64,
    /// Fee deducted from the signer before execution.
    pub fee: u64,
    /// Ed25519 signature over [`Transaction::signable_bytes`]. `None`
    /// for freshly built, unsigned transactions.
    pub signature: Option<Signature>,
}

impl Transaction {
    /// Canonical byte representation used for signing and id
    /// computation: a deterministic concatenation with null-byte
    /// separators and fixed-width little-endian integers. serde is
    /// deliberately avoided here — field ordering of a serialization
    /// format must never leak into signatures.
    ///
    /// Excluded: `signature`.
    pub fn signable_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(128 + self.payload.len());
        buf.extend_from_slice(&PROTOCOL_VERSION.to_le_bytes());
        buf.extend_from_slice(self.type_tag.as_bytes());
        buf.push(0x00);
        buf.extend_from_slice(&(self.payload.len() as u32).to_le_bytes());
        buf.extend_from_slice(&self.payload);
        buf.extend_from_slice(self.signer.as_bytes());
        buf.extend_from_slice(&self.sequence.to_le_bytes());
        buf.extend_from_slice(&self.fee.to_le_bytes());
        buf
    }

    /// Transaction id: `hex(double_sha256(signable_bytes))`. Stable
    /// across signing.
    pub fn id(&self) -> String {
        hex::encode(double_sha256(&self.signable_bytes()))
    }

    /// Address of the signing account.
    pub fn signer_address(&self) -> Address {
        Address::from_public_key(&self.signer)
    }

    /// Encode to the wire form.
    pub fn encode(&self) -> Vec<u8> {
        // A struct of owned scalars and byte vectors cannot fail
        // bincode serialization.
        bincode::serialize(self).unwrap_or_default()
    }

    /// Decode from the wire form.
    pub fn decode(raw: &[u8]) -> Result<Self, StateError> {
        bincode::deserialize(raw).map_err(|e| StateError::Malformed(format!("undecodable: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Payload of a `"bank"` transaction: move tokens from the signer to a
/// recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferPayload {
    pub to: Address,
    pub amount: u64,
}

impl TransferPayload {
    pub fn encode(&self) -> Vec<u8> {
        bincode::serialize(self).unwrap_or_default()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, StateError> {
        bincode::deserialize(bytes)
            .map_err(|e| StateError::Malformed(format!("transfer payload: {e}")))
    }
}

/// One directed edge in a `"link"` payload, as raw cid strings. The
/// handler validates and resolves them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkPair {
    pub from: String,
    pub to: String,
}

/// Payload of a `"link"` transaction: a non-empty batch of edges,
/// applied all-or-nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkPayload {
    pub links: Vec<LinkPair>,
}

impl LinkPayload {
    /// Convenience constructor for a single edge.
    pub fn single(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            links: vec![LinkPair {
                from: from.into(),
                to: to.into(),
            }],
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        bincode::serialize(self).unwrap_or_default()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, StateError> {
        bincode::deserialize(bytes).map_err(|e| StateError::Malformed(format!("link payload: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// What a successfully applied transaction did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxEffects {
    /// Fee collected by the ante stage.
    pub fee_paid: u64,
    /// Amount moved by a transfer.
    pub transferred: u64,
    /// Previously unseen cids registered by this transaction.
    pub cids_registered: u64,
    /// Edges added to the graph.
    pub links_created: u64,
}

/// Outcome of delivering a single transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxOutcome {
    /// Accepted; state effects were applied.
    Applied { effects: TxEffects },
    /// Rejected; no state effects, sequence not consumed.
    Rejected { reason: StateError },
}

/// Per-transaction record returned by `deliver_tx` and kept for the
/// block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxResult {
    pub tx_id: String,
    pub outcome: TxOutcome,
}

impl TxResult {
    pub fn applied(tx_id: String, effects: TxEffects) -> Self {
        Self {
            tx_id,
            outcome: TxOutcome::Applied { effects },
        }
    }

    pub fn rejected(tx_id: String, reason: StateError) -> Self {
        Self {
            tx_id,
            outcome: TxOutcome::Rejected { reason },
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self.outcome, TxOutcome::Applied { .. })
    }

    /// The rejection reason, if any.
    pub fn reason(&self) -> Option<&StateError> {
        match &self.outcome {
            TxOutcome::Rejected { reason } => Some(reason),
            TxOutcome::Applied { .. } => None,
        }
    }
}
