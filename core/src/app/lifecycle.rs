//! # Block Lifecycle Controller
//!
//! [`CortexApp`] is the deterministic state machine the consensus engine
//! drives. The call order is fixed:
//!
//! ```text
//! init_chain                      (once, height 0)
//! begin_block(h) → deliver_tx* → end_block(h) → commit  (per block)
//! ```
//!
//! enforced by an explicit [`Phase`] — a call out of order is a host
//! bug, reported as [`AppError::Lifecycle`] rather than silently
//! tolerated. Everything inside a block is single-writer and
//! synchronous; given the same prior state and the same ordered
//! transaction list, two replicas produce the same app hash, byte for
//! byte.
//!
//! Storage faults ([`StoreError`]) propagate out of every method and are
//! fatal: continuing past one risks committing a divergent hash, so the
//! host must halt instead.

use thiserror::Error;

use crate::app::genesis::GenesisState;
use crate::app::rank::{encode_score, rank_key, DegreeRank, RankAlgorithm};
use crate::config::{ROUTE_BANK, ROUTE_LINK};
use crate::crypto::hash::double_sha256;
use crate::crypto::PublicKey;
use crate::graph::index::CidIndex;
use crate::graph::links::LinkStore;
use crate::graph::Cid;
use crate::ledger::AccountLedger;
use crate::mirror::StateMirror;
use crate::store::{StoreError, StoreRegistry};
use crate::tx::bank::BankHandler;
use crate::tx::link::LinkHandler;
use crate::tx::{ante, Router, StagedWrites, Transaction, TxOverlay, TxResult};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Per-block metadata handed down by the consensus engine. The begin
/// hook requires no state change in this core; the block time is kept
/// for logging and future handlers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockMetadata {
    /// Block time in milliseconds since the Unix epoch, as agreed by
    /// consensus. Never read from the local clock.
    pub time_ms: u64,
}

/// A change to the validator set. This core runs no staking logic, so
/// the list returned from `end_block` is always empty; the type exists
/// because the lifecycle contract has a slot for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorUpdate {
    pub public_key: PublicKey,
    pub power: u64,
}

/// Result of the end-of-block pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndBlockResult {
    /// Number of rank scores written to the rank store.
    pub rank_updates: u64,
    /// Always empty; see [`ValidatorUpdate`].
    pub validator_updates: Vec<ValidatorUpdate>,
}

/// Everything a fully applied block produced, from the convenience
/// driver [`CortexApp::apply_block`].
#[derive(Debug, Clone)]
pub struct BlockOutcome {
    pub results: Vec<TxResult>,
    pub rank_updates: u64,
    pub app_hash: [u8; 32],
}

/// Where the controller stands between lifecycle calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Between blocks; `begin_block` (or a first `init_chain`) is next.
    Idle,
    /// Inside a block; `deliver_tx` and `end_block` are legal.
    Executing { height: u64 },
    /// After `end_block`; only `commit` is legal.
    AwaitingCommit { height: u64 },
}

/// Errors surfaced by the lifecycle API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Lifecycle methods called out of order, or with the wrong height.
    /// A host bug, not a transaction failure.
    #[error("lifecycle violation: {0}")]
    Lifecycle(String),

    /// The genesis document is unusable.
    #[error("invalid genesis: {0}")]
    Genesis(String),

    /// Fatal storage fault. The host must halt.
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// CortexApp
// ---------------------------------------------------------------------------

/// The block-processing state machine.
pub struct CortexApp {
    registry: StoreRegistry,
    mirror: StateMirror,
    router: Router,
    rank: Box<dyn RankAlgorithm>,
    phase: Phase,
    block_results: Vec<TxResult>,
}

impl CortexApp {
    /// Build the app over a store registry with the reference rank
    /// algorithm.
    pub fn new(registry: StoreRegistry) -> Result<Self, AppError> {
        Self::with_rank(registry, Box::new(DegreeRank))
    }

    /// Build the app with a custom rank algorithm. Loads the mirror with
    /// a full scan and wires the routing table; both happen exactly once
    /// per process.
    pub fn with_rank(
        registry: StoreRegistry,
        rank: Box<dyn RankAlgorithm>,
    ) -> Result<Self, AppError> {
        let mirror = StateMirror::load(&registry)?;
        let router = Router::new()
            .add_route(ROUTE_BANK, Box::new(BankHandler))
            .add_route(ROUTE_LINK, Box::new(LinkHandler));
        for tag in [ROUTE_BANK, ROUTE_LINK] {
            if !router.has_route(tag) {
                return Err(AppError::Lifecycle(format!("route table missing {tag:?}")));
            }
        }

        tracing::info!(
            height = ?registry.latest_height()?,
            accounts = mirror.account_count(),
            cids = mirror.cid_count(),
            links = mirror.link_count(),
            "state loaded"
        );

        Ok(Self {
            registry,
            mirror,
            router,
            rank,
            phase: Phase::Idle,
            block_results: Vec::new(),
        })
    }

    // -- Genesis ------------------------------------------------------------

    /// Apply the declarative genesis state as the block at height 0 and
    /// return the initial app hash.
    ///
    /// Idempotent: on an already-initialized chain this is a no-op that
    /// returns the recorded initial app hash, so a restarted host can
    /// call it unconditionally without double-funding anyone.
    pub fn init_chain(&mut self, genesis: &GenesisState) -> Result<[u8; 32], AppError> {
        if self.phase != Phase::Idle {
            return Err(AppError::Lifecycle(format!(
                "init_chain while {:?}",
                self.phase
            )));
        }
        if self.registry.latest_height()?.is_some() {
            tracing::warn!(chain_id = %genesis.chain_id, "chain already initialized, ignoring genesis");
            return self
                .registry
                .app_hash_at(0)?
                .ok_or_else(|| StoreError::Corrupted("initialized chain has no genesis hash".into()))
                .map_err(AppError::Store);
        }

        for account in &genesis.accounts {
            AccountLedger::new(self.registry.accounts_mut(), &mut self.mirror)
                .credit(&account.address, account.balance)
                .map_err(|e| AppError::Genesis(e.to_string()))?;
        }

        for link in &genesis.links {
            let from_cid = Cid::new(link.from.clone()).map_err(|e| AppError::Genesis(e.to_string()))?;
            let to_cid = Cid::new(link.to.clone()).map_err(|e| AppError::Genesis(e.to_string()))?;
            let from = CidIndex::new(self.registry.cid_index_mut(), &mut self.mirror)
                .resolve(&from_cid);
            let to =
                CidIndex::new(self.registry.cid_index_mut(), &mut self.mirror).resolve(&to_cid);
            let (out_links, in_links) = self.registry.links_mut();
            LinkStore::new(out_links, in_links, &mut self.mirror)
                .create(from, to)
                .map_err(|e| AppError::Genesis(e.to_string()))?;
        }

        self.write_rank()?;
        let app_hash = self.registry.commit(0)?;
        tracing::info!(
            chain_id = %genesis.chain_id,
            accounts = genesis.accounts.len(),
            links = genesis.links.len(),
            app_hash = %hex::encode(app_hash),
            "chain initialized"
        );
        Ok(app_hash)
    }

    // -- Block lifecycle ----------------------------------------------------

    /// Open block `height`. Heights must follow the last committed
    /// height in strict sequence.
    pub fn begin_block(&mut self, height: u64, meta: &BlockMetadata) -> Result<(), AppError> {
        if self.phase != Phase::Idle {
            return Err(AppError::Lifecycle(format!(
                "begin_block while {:?}",
                self.phase
            )));
        }
        let expected = match self.registry.latest_height()? {
            None => {
                return Err(AppError::Lifecycle(
                    "begin_block before init_chain".to_string(),
                ))
            }
            Some(latest) => latest + 1,
        };
        if height != expected {
            return Err(AppError::Lifecycle(format!(
                "begin_block height {height}, expected {expected}"
            )));
        }

        self.block_results.clear();
        self.phase = Phase::Executing { height };
        tracing::debug!(height, time_ms = meta.time_ms, "begin block");
        Ok(())
    }

    /// Deliver the next transaction of the open block, in block order.
    ///
    /// Transaction-level failures come back as a rejected [`TxResult`];
    /// only storage faults are `Err`.
    pub fn deliver_tx(&mut self, raw: &[u8]) -> Result<TxResult, AppError> {
        if !matches!(self.phase, Phase::Executing { .. }) {
            return Err(AppError::Lifecycle(format!(
                "deliver_tx while {:?}",
                self.phase
            )));
        }

        let result = match Transaction::decode(raw) {
            // Undecodable bytes still get a recorded, addressable result.
            Err(reason) => TxResult::rejected(hex::encode(double_sha256(raw)), reason),
            Ok(tx) => self.execute_tx(&tx)?,
        };

        match result.reason() {
            Some(reason) => tracing::debug!(
                tx = %result.tx_id,
                kind = reason.kind(),
                %reason,
                "transaction rejected"
            ),
            None => tracing::debug!(tx = %result.tx_id, "transaction applied"),
        }

        self.block_results.push(result.clone());
        Ok(result)
    }

    /// Run a decoded transaction through ante and routing against a
    /// fresh overlay, applying the overlay only if both succeed.
    fn execute_tx(&mut self, tx: &Transaction) -> Result<TxResult, AppError> {
        let tx_id = tx.id();

        let mut overlay = TxOverlay::new(&self.mirror);
        if let Err(reason) = ante::check(&mut overlay, tx) {
            return Ok(TxResult::rejected(tx_id, reason));
        }
        let mut effects = match self.router.route(&mut overlay, tx) {
            Err(reason) => return Ok(TxResult::rejected(tx_id, reason)),
            Ok(effects) => effects,
        };
        effects.fee_paid = tx.fee;

        self.apply_writes(overlay.into_writes())?;
        Ok(TxResult::applied(tx_id, effects))
    }

    /// Land an accepted transaction's write set in the mirror and the
    /// store buffers, in deterministic order: cids, accounts, links.
    fn apply_writes(&mut self, writes: StagedWrites) -> Result<(), AppError> {
        let mut index = CidIndex::new(self.registry.cid_index_mut(), &mut self.mirror);
        for (offset, cid) in writes.cids.iter().enumerate() {
            let id = index.resolve(cid);
            let expected = writes.first_cid_number + offset as u64;
            if id != expected {
                // The overlay numbered against a mirror that has since
                // changed — a single-writer violation.
                return Err(AppError::Store(StoreError::Corrupted(format!(
                    "cid numbering drift: staged {expected}, resolved {id}"
                ))));
            }
        }

        let mut ledger = AccountLedger::new(self.registry.accounts_mut(), &mut self.mirror);
        for (address, account) in &writes.accounts {
            ledger.put(address, account.clone());
        }

        let (out_links, in_links) = self.registry.links_mut();
        let mut links = LinkStore::new(out_links, in_links, &mut self.mirror);
        for &(from, to) in &writes.links {
            links.create(from, to).map_err(|e| {
                AppError::Store(StoreError::Corrupted(format!(
                    "staged link no longer insertable: {e}"
                )))
            })?;
        }

        Ok(())
    }

    /// Close block `height`: snapshot the graph, run the rank boundary,
    /// write the scores. The returned update count is the number of
    /// scored nodes.
    pub fn end_block(&mut self, height: u64) -> Result<EndBlockResult, AppError> {
        match self.phase {
            Phase::Executing { height: open } if open == height => {}
            other => {
                return Err(AppError::Lifecycle(format!(
                    "end_block({height}) while {other:?}"
                )))
            }
        }

        let rank_updates = self.write_rank()?;
        self.phase = Phase::AwaitingCommit { height };
        Ok(EndBlockResult {
            rank_updates,
            validator_updates: Vec::new(),
        })
    }

    /// Run the rank boundary over the current graph and buffer the
    /// scores into the rank store.
    fn write_rank(&mut self) -> Result<u64, AppError> {
        let snapshot = self.mirror.snapshot_graph();
        let scores = self.rank.compute(&snapshot);
        let count = scores.len() as u64;
        let store = self.registry.rank_mut();
        for (id, score) in scores {
            store.set(rank_key(id), encode_score(score));
        }
        Ok(count)
    }

    /// Commit the open block and return the app hash. Atomic per store;
    /// after this the block is irrevocable and the controller is idle.
    pub fn commit(&mut self) -> Result<[u8; 32], AppError> {
        let height = match self.phase {
            Phase::AwaitingCommit { height } => height,
            other => return Err(AppError::Lifecycle(format!("commit while {other:?}"))),
        };

        let app_hash = self.registry.commit(height)?;
        self.phase = Phase::Idle;
        tracing::info!(
            height,
            app_hash = %hex::encode(app_hash),
            txs = self.block_results.len(),
            "block committed"
        );
        Ok(app_hash)
    }

    /// Drive one whole block through the lifecycle. Convenience for
    /// hosts and tests that do not interleave anything between stages.
    pub fn apply_block(
        &mut self,
        height: u64,
        meta: &BlockMetadata,
        raw_txs: &[Vec<u8>],
    ) -> Result<BlockOutcome, AppError> {
        self.begin_block(height, meta)?;
        let mut results = Vec::with_capacity(raw_txs.len());
        for raw in raw_txs {
            results.push(self.deliver_tx(raw)?);
        }
        let end = self.end_block(height)?;
        let app_hash = self.commit()?;
        Ok(BlockOutcome {
            results,
            rank_updates: end.rank_updates,
            app_hash,
        })
    }

    // -- Reads --------------------------------------------------------------

    /// Point query against committed state, optionally at a historical
    /// height. Safe to call from readers at any time; it never observes
    /// an open block.
    pub fn query(
        &self,
        store: &str,
        key: &[u8],
        at_height: Option<u64>,
    ) -> Result<Option<Vec<u8>>, AppError> {
        Ok(self.registry.query(store, key, at_height)?)
    }

    /// Latest committed height, `None` before genesis.
    pub fn latest_height(&self) -> Result<Option<u64>, AppError> {
        Ok(self.registry.latest_height()?)
    }

    /// App hash recorded at a committed height.
    pub fn app_hash_at(&self, height: u64) -> Result<Option<[u8; 32]>, AppError> {
        Ok(self.registry.app_hash_at(height)?)
    }

    /// Read-only view of the mirror. Outside an open block this is
    /// exactly the committed state; callers serialize against block
    /// processing the same way they serialize lifecycle calls.
    pub fn mirror(&self) -> &StateMirror {
        &self.mirror
    }

    /// Per-transaction results of the block being processed (or the
    /// last processed block, after commit).
    pub fn block_results(&self) -> &[TxResult] {
        &self.block_results
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
