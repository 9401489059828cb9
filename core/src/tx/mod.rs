//! The transaction pipeline: wire types, ante validation, routing, and
//! the per-transaction staging overlay.
//!
//! A transaction's path through a block is `ante::check` (signature,
//! sequence, fee) followed by [`Router::route`] to its handler. Both run
//! against a [`TxOverlay`] that stages every mutation; the lifecycle
//! controller applies the overlay on success and drops it on failure, so
//! a rejected transaction leaves no trace.

pub mod ante;
pub mod bank;
pub mod build;
pub mod link;
pub mod overlay;
pub mod router;
pub mod types;

pub use build::{sign_transaction, TxBuilder};
pub use overlay::{StagedWrites, TxOverlay};
pub use router::{Router, TxHandler};
pub use types::{LinkPayload, LinkPair, Transaction, TransferPayload, TxEffects, TxOutcome, TxResult};
