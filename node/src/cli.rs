//! # CLI Interface
//!
//! Command-line argument structure for `cortex-node` using `clap`
//! derive. Two subcommands: `run` and `version`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Cortex ledger node.
///
/// Serves read-only queries over committed ledger state and, in
/// development mode, stands in for the consensus engine with a local
/// block loop over submitted transactions.
#[derive(Parser, Debug)]
#[command(
    name = "cortex-node",
    about = "Cortex content-graph ledger node",
    version,
    propagate_version = true
)]
pub struct CortexNodeCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the node.
    Run(RunArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to the node data directory where the store lives.
    /// Created on first run if it does not exist.
    #[arg(long, short = 'd', env = "CORTEX_DATA_DIR", default_value = "~/.cortex")]
    pub data_dir: PathBuf,

    /// Path to the genesis JSON document. Applied exactly once; a
    /// restarted node passes it again and the core ignores it.
    #[arg(long, short = 'g', env = "CORTEX_GENESIS")]
    pub genesis: PathBuf,

    /// Port for the HTTP API (queries, tx submission, metrics).
    #[arg(long, env = "CORTEX_RPC_PORT", default_value_t = 9611)]
    pub rpc_port: u16,

    /// Network identifier reported by `/status`.
    #[arg(long, default_value = "devnet")]
    pub network: String,

    /// Emit JSON logs instead of pretty-printed ones.
    #[arg(long, env = "CORTEX_LOG_JSON", default_value_t = false)]
    pub log_json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        // Ensures the derive macros produce a valid CLI definition.
        CortexNodeCli::command().debug_assert();
    }
}
