//! # EVM Node
//!
//! ## Startup Sequence
//!
//! 1. Load configuration from `EVM_*` variables
//! 2. Initialise tracing
//! 3. Create genesis and, if `EVM_STATE_FILE` exists, load it
//! 4. Start the interval miner when configured
//! 5. Wait for Ctrl-C, then write the state file back

use anyhow::{Context, Result};
use evm_node::{init_tracing, spawn_interval_miner, EvmNode, NodeConfig};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config = NodeConfig::from_env().context("Failed to read configuration")?;
    init_tracing(&config.logging);

    info!("===========================================");
    info!("  EVM Node v{}", env!("CARGO_PKG_VERSION"));
    info!("===========================================");
    info!(
        chain_id = config.chain.chain_id,
        gas_limit = config.chain.gas_limit,
        mining = ?config.mining.mode,
        "Configuration loaded"
    );

    let state_file = config.state_file.clone();
    let period = config.mining.mode.interval();
    let node = Arc::new(EvmNode::new(config));

    if let Some(path) = &state_file {
        if path.exists() {
            node.load_state_file(path)
                .with_context(|| format!("Failed to load state from {}", path.display()))?;
        } else {
            warn!(path = %path.display(), "State file not found, starting from genesis");
        }
    }

    let miner = period.map(|period| spawn_interval_miner(Arc::clone(&node), period));

    info!("Node ready, press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Shutdown signal received");

    if let Some(miner) = miner {
        miner.abort();
    }
    if let Some(path) = &state_file {
        node.save_state_file(path)
            .with_context(|| format!("Failed to save state to {}", path.display()))?;
    }

    info!(head = node.block_number(), "Node stopped");
    Ok(())
}
