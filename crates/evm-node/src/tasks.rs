//! Background tasks around a shared node.
//!
//! Execution is synchronous, so every node call made from async code goes
//! through `spawn_blocking`. Gas exhaustion is the only cancellation inside
//! the interpreter; timeouts here abandon the waiting task, not the work.

use crate::domain::{CallParams, CallResult};
use crate::errors::{NodeError, Result};
use crate::node::EvmNode;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

/// Mine one block every `period` until the handle is aborted.
pub fn spawn_interval_miner(node: Arc<EvmNode>, period: Duration) -> JoinHandle<()> {
    info!(?period, "Interval miner started");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let node = Arc::clone(&node);
            match tokio::task::spawn_blocking(move || node.mine(1)).await {
                Ok(Ok(hashes)) => debug!(blocks = hashes.len(), "Interval mining tick"),
                Ok(Err(err)) => error!(%err, "Interval mining failed"),
                Err(err) => error!(%err, "Interval mining task panicked"),
            }
        }
    })
}

/// `call` bounded by a host-level timeout.
///
/// # Errors
///
/// [`NodeError::Timeout`] when `timeout` elapses first.
pub async fn call_with_timeout(
    node: Arc<EvmNode>,
    params: CallParams,
    timeout: Duration,
) -> Result<CallResult> {
    let task = tokio::task::spawn_blocking(move || node.call(params));
    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(err)) => Err(NodeError::Execution(err.to_string())),
        Err(_) => Err(NodeError::Timeout(timeout)),
    }
}
