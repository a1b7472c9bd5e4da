use async_trait::async_trait;
use shared_types::{Account, Address, Bytes, U256};
use thiserror::Error;

/// Failure reported by a remote state source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct BackendError(pub String);

/// Remote state source for forked mode.
///
/// Implementations may be slow or flaky. Retries and caching live in
/// [`crate::adapters::ForkClient`], not here.
#[async_trait]
pub trait ForkBackend: Send + Sync + 'static {
    /// Account at `block` (`None` = latest), or `None` if it does not exist.
    async fn account(&self, address: Address, block: Option<u64>)
        -> Result<Option<Account>, BackendError>;

    /// Storage slot value at `block`.
    async fn storage(&self, address: Address, slot: U256, block: Option<u64>)
        -> Result<U256, BackendError>;

    /// Deployed code at `block`.
    async fn code(&self, address: Address, block: Option<u64>) -> Result<Bytes, BackendError>;
}
