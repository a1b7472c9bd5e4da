//! Outbound ports: account state, the canonical head and time.

use crate::domain::{Result, Timestamp};
use shared_types::{Address, U256};

/// Fee market parameters of the canonical head.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadInfo {
    pub base_fee: U256,
    pub gas_limit: u64,
}

/// Account and chain reads used during validation.
///
/// Missing accounts report a zero nonce and balance. Backend failures
/// propagate as `TxPoolError::State`.
pub trait StateProvider {
    fn nonce(&self, address: &Address) -> Result<u64>;

    fn balance(&self, address: &Address) -> Result<U256>;

    fn head(&self) -> Result<HeadInfo>;
}

/// Clock abstraction so TTLs can be tested deterministically.
pub trait TimeSource: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now(&self) -> Timestamp;
}
