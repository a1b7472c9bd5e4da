//! # Fork Client
//!
//! Synchronous front for an async [`ForkBackend`]. Requests cross into a
//! dedicated thread running a current-thread Tokio runtime; replies come
//! back over a std channel, so the interpreter's read path stays blocking
//! and never needs a runtime of its own.
//!
//! Reads are cached in an LRU. Transient failures are retried with linear
//! backoff; exhaustion surfaces as [`StateError::ForkUnavailable`].

use crate::errors::{Result, StateError};
use crate::ports::ForkBackend;
use lru::LruCache;
use parking_lot::Mutex;
use serde::Deserialize;
use shared_types::{Account, Address, Bytes, U256};
use std::num::NonZeroUsize;
use std::sync::{mpsc as std_mpsc, Arc};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Fork client settings.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ForkConfig {
    /// Pinned block number (`None` = latest)
    pub block_number: Option<u64>,
    /// Attempts per read before giving up
    pub max_attempts: u32,
    /// Base delay between attempts, multiplied by the attempt number
    pub retry_backoff_ms: u64,
    /// LRU capacity in entries
    pub cache_capacity: usize,
}

impl Default for ForkConfig {
    fn default() -> Self {
        Self {
            block_number: None,
            max_attempts: 3,
            retry_backoff_ms: 100,
            cache_capacity: 10_000,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum ForkKey {
    Account(Address),
    Storage(Address, U256),
    Code(Address),
}

#[derive(Clone, Debug)]
enum ForkValue {
    Account(Option<Account>),
    Storage(U256),
    Code(Bytes),
}

struct ForkRequest {
    key: ForkKey,
    reply: std_mpsc::Sender<Result<ForkValue>>,
}

/// Cached, retrying client over a [`ForkBackend`].
pub struct ForkClient {
    requests: mpsc::UnboundedSender<ForkRequest>,
    cache: Mutex<LruCache<ForkKey, ForkValue>>,
}

impl ForkClient {
    /// Start the worker thread.
    ///
    /// # Errors
    ///
    /// `Backend` if the runtime or thread cannot be created.
    pub fn spawn(backend: Arc<dyn ForkBackend>, config: ForkConfig) -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(|e| StateError::Backend(format!("fork runtime: {e}")))?;
        let worker_config = config.clone();
        std::thread::Builder::new()
            .name("fork-backend".into())
            .spawn(move || runtime.block_on(run_worker(backend, rx, worker_config)))
            .map_err(|e| StateError::Backend(format!("fork thread: {e}")))?;

        let capacity = NonZeroUsize::new(config.cache_capacity).unwrap_or(NonZeroUsize::MIN);
        Ok(Self {
            requests: tx,
            cache: Mutex::new(LruCache::new(capacity)),
        })
    }

    pub fn account(&self, address: Address) -> Result<Option<Account>> {
        match self.fetch(ForkKey::Account(address))? {
            ForkValue::Account(account) => Ok(account),
            other => Err(unexpected(&other)),
        }
    }

    pub fn storage(&self, address: Address, slot: U256) -> Result<U256> {
        match self.fetch(ForkKey::Storage(address, slot))? {
            ForkValue::Storage(value) => Ok(value),
            other => Err(unexpected(&other)),
        }
    }

    pub fn code(&self, address: Address) -> Result<Bytes> {
        match self.fetch(ForkKey::Code(address))? {
            ForkValue::Code(code) => Ok(code),
            other => Err(unexpected(&other)),
        }
    }

    /// Drop every cached remote read.
    pub fn clear_cache(&self) {
        self.cache.lock().clear();
    }

    fn fetch(&self, key: ForkKey) -> Result<ForkValue> {
        if let Some(hit) = self.cache.lock().get(&key).cloned() {
            return Ok(hit);
        }
        let (reply, response) = std_mpsc::channel();
        self.requests
            .send(ForkRequest {
                key: key.clone(),
                reply,
            })
            .map_err(|_| StateError::Backend("fork worker stopped".into()))?;
        let value = response
            .recv()
            .map_err(|_| StateError::Backend("fork worker dropped request".into()))??;
        self.cache.lock().put(key, value.clone());
        Ok(value)
    }
}

fn unexpected(value: &ForkValue) -> StateError {
    StateError::Backend(format!("mismatched fork reply: {value:?}"))
}

async fn run_worker(
    backend: Arc<dyn ForkBackend>,
    mut rx: mpsc::UnboundedReceiver<ForkRequest>,
    config: ForkConfig,
) {
    while let Some(request) = rx.recv().await {
        let backend = Arc::clone(&backend);
        let config = config.clone();
        tokio::spawn(async move {
            let result = fetch_with_retry(backend.as_ref(), &request.key, &config).await;
            // The caller may have given up; nothing to do then.
            let _ = request.reply.send(result);
        });
    }
    debug!("fork worker stopped");
}

async fn fetch_with_retry(
    backend: &dyn ForkBackend,
    key: &ForkKey,
    config: &ForkConfig,
) -> Result<ForkValue> {
    let attempts = config.max_attempts.max(1);
    let block = config.block_number;
    let mut last_error = String::new();
    for attempt in 1..=attempts {
        let result = match key {
            ForkKey::Account(a) => backend.account(*a, block).await.map(ForkValue::Account),
            ForkKey::Storage(a, s) => backend.storage(*a, *s, block).await.map(ForkValue::Storage),
            ForkKey::Code(a) => backend.code(*a, block).await.map(ForkValue::Code),
        };
        match result {
            Ok(value) => return Ok(value),
            Err(e) => {
                warn!(attempt, attempts, error = %e, "fork backend read failed");
                last_error = e.0;
                if attempt < attempts {
                    let delay = config.retry_backoff_ms * u64::from(attempt);
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
            }
        }
    }
    Err(StateError::ForkUnavailable {
        attempts,
        reason: last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryForkBackend;

    fn config() -> ForkConfig {
        ForkConfig {
            retry_backoff_ms: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_reads_remote_account() {
        let backend = Arc::new(InMemoryForkBackend::new());
        let addr = Address::new([1; 20]);
        backend.insert_account(addr, Account::new(3, U256::from(100u64)), vec![0x60], vec![]);

        let client = ForkClient::spawn(backend, config()).unwrap();
        assert_eq!(client.account(addr).unwrap().map(|a| a.nonce), Some(3));
        assert_eq!(client.code(addr).unwrap(), vec![0x60]);
        assert_eq!(client.account(Address::new([2; 20])).unwrap(), None);
    }

    #[test]
    fn test_retries_transient_failures() {
        let backend = Arc::new(InMemoryForkBackend::new());
        let addr = Address::new([1; 20]);
        backend.insert_account(addr, Account::new(1, U256::zero()), vec![], vec![]);
        backend.fail_next(2);

        let client = ForkClient::spawn(backend.clone(), config()).unwrap();
        assert!(client.account(addr).unwrap().is_some());
        assert_eq!(backend.calls(), 3);
    }

    #[test]
    fn test_exhaustion_is_an_error_not_empty() {
        let backend = Arc::new(InMemoryForkBackend::new());
        backend.fail_next(10);

        let client = ForkClient::spawn(backend, config()).unwrap();
        let err = client.storage(Address::new([1; 20]), U256::one()).unwrap_err();
        assert!(matches!(err, StateError::ForkUnavailable { attempts: 3, .. }));
    }

    #[test]
    fn test_cache_avoids_second_call() {
        let backend = Arc::new(InMemoryForkBackend::new());
        let addr = Address::new([1; 20]);
        let client = ForkClient::spawn(backend.clone(), config()).unwrap();

        client.storage(addr, U256::one()).unwrap();
        client.storage(addr, U256::one()).unwrap();
        assert_eq!(backend.calls(), 1);

        client.clear_cache();
        client.storage(addr, U256::one()).unwrap();
        assert_eq!(backend.calls(), 2);
    }
}
