//! # evm-txpool
//!
//! Pending transaction pool for the local runtime.
//!
//! ```text
//!   add ──validate──→ queued ──gap filled──→ pending ──mined──→ removed
//!                        │                      │
//!                        └──evicted/replaced────┴──→ dropped
//! ```
//!
//! The pool never reads state directly. Account nonces, balances and the
//! canonical head come through [`StateProvider`], time through
//! [`TimeSource`].

pub mod adapters;
pub mod domain;
pub mod ports;

pub use adapters::{InMemoryStateProvider, ManualClock, SystemTimeSource};
pub use domain::{
    AddOptions, PoolEntry, Timestamp, TxPool, TxPoolConfig, TxPoolContent, TxPoolError,
    TxPoolEvent, TxPoolStats, TxStatus,
};
pub use ports::{HeadInfo, StateProvider, TimeSource};
