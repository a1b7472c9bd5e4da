//! # Precompiled Contracts
//!
//! Address-keyed registry of native handlers. Every handler has the same
//! `(input, gas_limit) -> PrecompileOutput` contract, so custom precompiles
//! register exactly like the standard ones.

pub mod ecrecover;
pub mod identity;
pub mod modexp;
pub mod ripemd160;
pub mod sha256;

use crate::errors::PrecompileError;
use shared_types::{Address, Bytes};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Successful precompile execution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrecompileOutput {
    pub gas_used: u64,
    pub output: Bytes,
}

impl PrecompileOutput {
    #[must_use]
    pub fn new(gas_used: u64, output: Bytes) -> Self {
        Self { gas_used, output }
    }
}

/// A natively implemented contract.
pub trait Precompile: Send + Sync {
    /// # Errors
    ///
    /// `OutOfGas` when `gas_limit` does not cover the cost; any other error
    /// also consumes all forwarded gas.
    fn run(&self, input: &[u8], gas_limit: u64) -> Result<PrecompileOutput, PrecompileError>;
}

impl<F> Precompile for F
where
    F: Fn(&[u8], u64) -> Result<PrecompileOutput, PrecompileError> + Send + Sync,
{
    fn run(&self, input: &[u8], gas_limit: u64) -> Result<PrecompileOutput, PrecompileError> {
        self(input, gas_limit)
    }
}

/// Charge `cost` against `gas_limit`.
pub(crate) fn charge(cost: u64, gas_limit: u64) -> Result<u64, PrecompileError> {
    if cost > gas_limit {
        Err(PrecompileError::OutOfGas)
    } else {
        Ok(cost)
    }
}

/// `base + per_word * ceil(len / 32)`.
pub(crate) fn linear_cost(len: usize, base: u64, per_word: u64) -> u64 {
    base.saturating_add(per_word.saturating_mul(len.div_ceil(32) as u64))
}

/// Handlers checked at dispatch time.
#[derive(Clone, Default)]
pub struct PrecompileRegistry {
    handlers: BTreeMap<Address, Arc<dyn Precompile>>,
}

impl PrecompileRegistry {
    /// Registry without any handler.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// 0x01 ecrecover, 0x02 sha256, 0x03 ripemd160, 0x04 identity,
    /// 0x05 modexp.
    #[must_use]
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register(Address::from_low_u64(1), Arc::new(ecrecover::EcRecover));
        registry.register(Address::from_low_u64(2), Arc::new(sha256::Sha256Hash));
        registry.register(Address::from_low_u64(3), Arc::new(ripemd160::Ripemd160Hash));
        registry.register(Address::from_low_u64(4), Arc::new(identity::Identity));
        registry.register(Address::from_low_u64(5), Arc::new(modexp::ModExp));
        registry
    }

    /// Add or replace the handler at `address`.
    pub fn register(&mut self, address: Address, handler: Arc<dyn Precompile>) {
        self.handlers.insert(address, handler);
    }

    pub fn unregister(&mut self, address: &Address) -> bool {
        self.handlers.remove(address).is_some()
    }

    #[must_use]
    pub fn get(&self, address: &Address) -> Option<&Arc<dyn Precompile>> {
        self.handlers.get(address)
    }

    #[must_use]
    pub fn contains(&self, address: &Address) -> bool {
        self.handlers.contains_key(address)
    }

    /// Precompile addresses, warm from the start of every transaction.
    pub fn addresses(&self) -> impl Iterator<Item = &Address> {
        self.handlers.keys()
    }
}

impl fmt::Debug for PrecompileRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.handlers.keys()).finish()
    }
}
