//! Pool domain: entries, configuration, errors and the pool itself.

pub mod config;
pub mod entities;
pub mod errors;
pub mod pool;

pub use config::TxPoolConfig;
pub use entities::{
    AddOptions, PoolEntry, Timestamp, TxPoolContent, TxPoolEvent, TxPoolStats, TxStatus,
};
pub use errors::{Result, TxPoolError};
pub use pool::TxPool;
