//! Declarative genesis state.
//!
//! A genesis document names the chain, funds an initial set of accounts,
//! and may seed the content graph. It is applied exactly once, as the
//! special block at height 0; the tooling that *produces* genesis files
//! lives outside this crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ledger::Address;

/// An initially funded account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisAccount {
    pub address: Address,
    pub balance: u64,
}

/// A seed edge in the content graph. Cids are registered implicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisLink {
    pub from: String,
    pub to: String,
}

/// The declarative initial state of a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisState {
    /// Human-readable chain identifier.
    pub chain_id: String,
    /// Nominal start time of the chain.
    pub genesis_time: DateTime<Utc>,
    /// Accounts funded at height 0.
    pub accounts: Vec<GenesisAccount>,
    /// Seed content links, if any.
    #[serde(default)]
    pub links: Vec<GenesisLink>,
}

impl GenesisState {
    /// An empty genesis for the given chain id, timestamped at the Unix
    /// epoch. Tests and dev tooling fill in the rest.
    pub fn named(chain_id: impl Into<String>) -> Self {
        Self {
            chain_id: chain_id.into(),
            genesis_time: DateTime::<Utc>::UNIX_EPOCH,
            accounts: Vec::new(),
            links: Vec::new(),
        }
    }

    /// Parse a genesis JSON document.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
