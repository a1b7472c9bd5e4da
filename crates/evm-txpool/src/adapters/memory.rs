use crate::domain::Result;
use crate::ports::{HeadInfo, StateProvider};
use shared_types::{Address, U256};
use std::collections::HashMap;

/// Map-backed [`StateProvider`] for tests and tooling.
#[derive(Debug, Clone)]
pub struct InMemoryStateProvider {
    nonces: HashMap<Address, u64>,
    balances: HashMap<Address, U256>,
    head: HeadInfo,
}

impl Default for InMemoryStateProvider {
    fn default() -> Self {
        Self {
            nonces: HashMap::new(),
            balances: HashMap::new(),
            head: HeadInfo {
                base_fee: U256::from(shared_types::block::INITIAL_BASE_FEE),
                gas_limit: 30_000_000,
            },
        }
    }
}

impl InMemoryStateProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(mut self, address: Address, nonce: u64, balance: U256) -> Self {
        self.nonces.insert(address, nonce);
        self.balances.insert(address, balance);
        self
    }

    pub fn with_head(mut self, base_fee: U256, gas_limit: u64) -> Self {
        self.head = HeadInfo {
            base_fee,
            gas_limit,
        };
        self
    }

    pub fn set_nonce(&mut self, address: Address, nonce: u64) {
        self.nonces.insert(address, nonce);
    }

    pub fn set_balance(&mut self, address: Address, balance: U256) {
        self.balances.insert(address, balance);
    }
}

impl StateProvider for InMemoryStateProvider {
    fn nonce(&self, address: &Address) -> Result<u64> {
        Ok(self.nonces.get(address).copied().unwrap_or(0))
    }

    fn balance(&self, address: &Address) -> Result<U256> {
        Ok(self.balances.get(address).copied().unwrap_or_default())
    }

    fn head(&self) -> Result<HeadInfo> {
        Ok(self.head)
    }
}
