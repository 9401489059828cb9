// Copyright (c) 2026 Cortex Labs. MIT License.
// See LICENSE for details.

//! # Cortex Node
//!
//! Entry point for the `cortex-node` binary. Opens the store, loads the
//! state machine, applies the genesis document (a no-op on restarts),
//! and serves the HTTP API.
//!
//! Block production here is a development stand-in: a local loop that
//! drains submitted transactions into a block on a fixed interval. In a
//! real deployment the consensus engine drives the same lifecycle calls
//! and this loop does not run.

mod api;
mod cli;
mod logging;
mod metrics;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use parking_lot::{Mutex, RwLock};
use tokio::signal;

use cortex_core::app::{BlockMetadata, CortexApp, GenesisState};
use cortex_core::config::DEV_BLOCK_TIME_MS;
use cortex_core::store::StoreRegistry;

use cli::{Commands, CortexNodeCli};
use logging::LogFormat;
use metrics::NodeMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = CortexNodeCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Starts the node: store, state machine, genesis, block loop, API.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    let format = if args.log_json {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    };
    logging::init("cortex_node=info,cortex_core=info,tower_http=warn", format);

    tracing::info!(
        rpc_port = args.rpc_port,
        data_dir = %args.data_dir.display(),
        genesis = %args.genesis.display(),
        "starting cortex-node"
    );

    // --- Persistent storage + state machine ---
    let db_path = args.data_dir.join("db");
    std::fs::create_dir_all(&db_path)
        .with_context(|| format!("failed to create database directory {}", db_path.display()))?;
    let registry = StoreRegistry::open(&db_path)
        .with_context(|| format!("failed to open store at {}", db_path.display()))?;
    let mut app = CortexApp::new(registry).context("failed to load state machine")?;

    // --- Genesis (idempotent) ---
    let genesis_json = std::fs::read_to_string(&args.genesis)
        .with_context(|| format!("failed to read genesis file {}", args.genesis.display()))?;
    let genesis = GenesisState::from_json(&genesis_json).context("failed to parse genesis")?;
    let app_hash = app.init_chain(&genesis).context("genesis failed")?;
    tracing::info!(
        chain_id = %genesis.chain_id,
        app_hash = %hex::encode(app_hash),
        "chain ready"
    );

    // --- Shared state ---
    let node_metrics = Arc::new(NodeMetrics::new());
    if let Some(height) = app.latest_height()? {
        node_metrics.block_height.set(height as i64);
    }
    let state = api::AppState {
        version: env!("CARGO_PKG_VERSION").to_string(),
        network: args.network.clone(),
        app: Arc::new(RwLock::new(app)),
        mempool: Arc::new(Mutex::new(Vec::new())),
        metrics: Arc::clone(&node_metrics),
    };

    // --- Development block loop ---
    // Stands in for the consensus engine: drains the mempool into a
    // block on a fixed interval. Blocks are only produced when there is
    // something to include.
    let loop_state = state.clone();
    let block_loop = tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_millis(DEV_BLOCK_TIME_MS));
        loop {
            interval.tick().await;
            let txs: Vec<Vec<u8>> = std::mem::take(&mut *loop_state.mempool.lock());
            if txs.is_empty() {
                continue;
            }

            let mut app = loop_state.app.write();
            let height = match app.latest_height() {
                Ok(Some(h)) => h + 1,
                Ok(None) => {
                    tracing::error!("block loop running on uninitialized chain");
                    continue;
                }
                Err(e) => {
                    tracing::error!(error = %e, "fatal storage fault, halting");
                    std::process::exit(1);
                }
            };
            let meta = BlockMetadata {
                time_ms: chrono::Utc::now().timestamp_millis() as u64,
            };

            match app.apply_block(height, &meta, &txs) {
                Ok(outcome) => {
                    let applied = outcome.results.iter().filter(|r| r.is_applied()).count();
                    let rejected = outcome.results.len() - applied;
                    loop_state.metrics.blocks_committed.inc();
                    loop_state.metrics.block_height.set(height as i64);
                    loop_state.metrics.txs_applied.inc_by(applied as u64);
                    loop_state.metrics.txs_rejected.inc_by(rejected as u64);
                    tracing::info!(height, applied, rejected, "block produced");
                }
                Err(e) => {
                    // Storage faults (and host bugs) are fatal: halting
                    // beats committing a divergent hash.
                    tracing::error!(height, error = %e, "block application failed, halting");
                    std::process::exit(1);
                }
            }
        }
    });

    // --- API server ---
    let router = api::create_router(state);
    let addr = format!("0.0.0.0:{}", args.rpc_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind API listener on {addr}"))?;
    tracing::info!("API listening on {addr}");

    tokio::select! {
        res = axum::serve(listener, router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {e}");
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received");
        }
    }

    block_loop.abort();
    tracing::info!("cortex-node stopped");
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("cortex-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol    {}", cortex_core::config::PROTOCOL_VERSION);
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
