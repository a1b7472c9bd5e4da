use crate::ports::{BackendError, ForkBackend};
use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::{Account, Address, Bytes, U256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

#[derive(Clone, Default)]
struct RemoteAccount {
    account: Account,
    code: Bytes,
    storage: HashMap<U256, U256>,
}

/// In-memory implementation of ForkBackend, with failure injection for testing.
#[derive(Default)]
pub struct InMemoryForkBackend {
    accounts: RwLock<HashMap<Address, RemoteAccount>>,
    failures_remaining: AtomicU32,
    calls: AtomicU32,
}

impl InMemoryForkBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a remote account.
    pub fn insert_account(
        &self,
        address: Address,
        mut account: Account,
        code: Bytes,
        storage: Vec<(U256, U256)>,
    ) {
        if !code.is_empty() {
            account.code_hash = shared_types::Hash::keccak(&code);
        }
        self.accounts.write().insert(
            address,
            RemoteAccount {
                account,
                code,
                storage: storage.into_iter().collect(),
            },
        );
    }

    /// Make the next `n` requests fail.
    pub fn fail_next(&self, n: u32) {
        self.failures_remaining.store(n, Ordering::SeqCst);
    }

    /// Total requests received, failed ones included.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn gate(&self) -> Result<(), BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failed = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            Err(BackendError("injected failure".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ForkBackend for InMemoryForkBackend {
    async fn account(
        &self,
        address: Address,
        _block: Option<u64>,
    ) -> Result<Option<Account>, BackendError> {
        self.gate()?;
        Ok(self.accounts.read().get(&address).map(|r| r.account))
    }

    async fn storage(
        &self,
        address: Address,
        slot: U256,
        _block: Option<u64>,
    ) -> Result<U256, BackendError> {
        self.gate()?;
        Ok(self
            .accounts
            .read()
            .get(&address)
            .and_then(|r| r.storage.get(&slot).copied())
            .unwrap_or_default())
    }

    async fn code(&self, address: Address, _block: Option<u64>) -> Result<Bytes, BackendError> {
        self.gate()?;
        Ok(self
            .accounts
            .read()
            .get(&address)
            .map(|r| r.code.clone())
            .unwrap_or_default())
    }
}
