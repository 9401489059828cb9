//! # Prometheus Metrics
//!
//! Counters and gauges for the node's block loop and API, exposed at
//! `GET /metrics` in the Prometheus text format.

use std::sync::Arc;

use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

/// Shared handle to the node's metrics.
pub type SharedMetrics = Arc<NodeMetrics>;

/// All metrics the node records.
pub struct NodeMetrics {
    registry: Registry,
    /// Latest committed block height.
    pub block_height: IntGauge,
    /// Total blocks committed since process start.
    pub blocks_committed: IntCounter,
    /// Transactions applied successfully.
    pub txs_applied: IntCounter,
    /// Transactions rejected (any recoverable reason).
    pub txs_rejected: IntCounter,
}

impl NodeMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let block_height = IntGauge::new("cortex_block_height", "Latest committed block height")
            .expect("metric creation");
        let blocks_committed = IntCounter::new(
            "cortex_blocks_committed_total",
            "Blocks committed since process start",
        )
        .expect("metric creation");
        let txs_applied = IntCounter::new("cortex_txs_applied_total", "Transactions applied")
            .expect("metric creation");
        let txs_rejected = IntCounter::new("cortex_txs_rejected_total", "Transactions rejected")
            .expect("metric creation");

        registry
            .register(Box::new(block_height.clone()))
            .expect("metric registration");
        registry
            .register(Box::new(blocks_committed.clone()))
            .expect("metric registration");
        registry
            .register(Box::new(txs_applied.clone()))
            .expect("metric registration");
        registry
            .register(Box::new(txs_rejected.clone()))
            .expect("metric registration");

        Self {
            registry,
            block_height,
            blocks_committed,
            txs_applied,
            txs_rejected,
        }
    }

    /// Render all metrics in the Prometheus text exposition format.
    pub fn render(&self) -> String {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        if encoder
            .encode(&self.registry.gather(), &mut buf)
            .is_err()
        {
            return String::new();
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}

impl Default for NodeMetrics {
    fn default() -> Self {
        Self::new()
    }
}
