//! # Protocol Configuration & Constants
//!
//! Every magic number in Cortex lives here. Store names and their hash
//! order are consensus-critical: changing either changes the app hash of
//! every block, so treat this file as part of the wire format.

/// Protocol version embedded in transactions. Bump on incompatible
/// changes to the signable byte format or store layout.
pub const PROTOCOL_VERSION: u16 = 1;

/// Maximum accepted length of a content identifier, in bytes.
pub const MAX_CID_LENGTH: usize = 256;

/// Fixed-point scale for rank scores. A score of `RANK_PRECISION`
/// corresponds to 1.0. Integer scores keep the committed rank store
/// byte-identical across platforms; floating point would not.
pub const RANK_PRECISION: u64 = 1_000_000_000;

/// Name of the account balances/sequences store.
pub const STORE_ACCOUNTS: &str = "accounts";
/// Name of the cid <-> dense id bijection store.
pub const STORE_CID_INDEX: &str = "cid_index";
/// Name of the incoming-edge adjacency store.
pub const STORE_IN_LINKS: &str = "in_links";
/// Name of the outgoing-edge adjacency store.
pub const STORE_OUT_LINKS: &str = "out_links";
/// Name of the rank score store.
pub const STORE_RANK: &str = "rank";

/// All stores in app-hash order. The five per-store root hashes are
/// combined in exactly this order to produce the app hash, so the order
/// is load-bearing for cross-replica agreement.
pub const STORE_ORDER: [&str; 5] = [
    STORE_ACCOUNTS,
    STORE_CID_INDEX,
    STORE_IN_LINKS,
    STORE_OUT_LINKS,
    STORE_RANK,
];

/// Route tag for balance transfers.
pub const ROUTE_BANK: &str = "bank";
/// Route tag for link creation.
pub const ROUTE_LINK: &str = "link";

/// Block interval for the node binary's development block loop, in
/// milliseconds. Production block timing belongs to the consensus engine.
pub const DEV_BLOCK_TIME_MS: u64 = 2_000;
