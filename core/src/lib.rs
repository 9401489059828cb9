// Copyright (c) 2026 Cortex Labs. MIT License.
// See LICENSE for details.

//! # Cortex Core — Deterministic Content-Graph Ledger
//!
//! The block-processing state machine of the Cortex ledger: account
//! balances, a directed content graph (cids and links), and a derived
//! rank score per content item, all committed into merkle-hashed stores
//! whose combined root — the app hash — must come out bit-identical on
//! every replica that applies the same blocks to the same prior state.
//!
//! ## Architecture
//!
//! - **store** — named, versioned, merkle-committing KV stores over sled.
//! - **graph** — the content index (cid ⇄ dense id) and both adjacency
//!   directions of the link graph.
//! - **ledger** — addresses, balances, sequence numbers.
//! - **mirror** — the in-memory, fully reconstructable read cache.
//! - **tx** — wire types, ante validation, the route table, and the
//!   per-transaction staging overlay.
//! - **app** — the block lifecycle controller, genesis, and the pluggable
//!   rank boundary.
//! - **crypto** — BLAKE3/SHA-256 hashing and Ed25519 signatures.
//! - **config** — protocol constants; store names and their hash order.
//!
//! Consensus, networking, and key management live outside this crate.
//! The host drives [`app::CortexApp`] through the fixed lifecycle
//! `init_chain`, then `begin_block → deliver_tx* → end_block → commit`
//! per height, and halts on any [`store::StoreError`].

pub mod app;
pub mod config;
pub mod crypto;
pub mod error;
pub mod graph;
pub mod ledger;
pub mod mirror;
pub mod store;
pub mod tx;
