//! # Block Builder
//!
//! Assembles a child of `parent` one transaction at a time. The whole block
//! lives in a single state checkpoint: [`BlockBuilder::build`] commits it,
//! [`BlockBuilder::revert`] (or dropping the builder) discards it.
//!
//! The caller inserts the built block and its receipts into the chain.

use crate::domain::block_env;
use crate::errors::{BlockError, Result};
use crate::run_tx::{run_tx, RunTxOptions, RunTxResult};
use evm_chain::Blockchain;
use evm_interpreter::{BlockEnv, PrecompileRegistry};
use evm_state::{ordered_trie_root, StateManager};
use shared_types::block::{EMPTY_OMMERS_HASH, MAX_BLOB_GAS_PER_BLOCK};
use shared_types::{Address, Block, Bloom, Bytes, Hash, Header, Receipt, Transaction, Withdrawal, U256};
use tracing::{debug, info, warn};

/// Lifecycle of a [`BlockBuilder`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuildStatus {
    Pending,
    Built,
    Reverted,
}

/// Header fields chosen by the block producer.
#[derive(Clone, Debug)]
pub struct BuildBlockOptions {
    pub coinbase: Address,
    pub timestamp: u64,
    /// Defaults to the parent's gas limit.
    pub gas_limit: Option<u64>,
    pub extra_data: Bytes,
    pub prev_randao: Hash,
    pub parent_beacon_root: Option<Hash>,
    /// Amounts in gwei.
    pub withdrawals: Vec<Withdrawal>,
    pub chain_id: u64,
}

impl Default for BuildBlockOptions {
    fn default() -> Self {
        Self {
            coinbase: Address::ZERO,
            timestamp: 0,
            gas_limit: None,
            extra_data: Bytes::new(),
            prev_randao: Hash::ZERO,
            parent_beacon_root: Some(Hash::ZERO),
            withdrawals: Vec::new(),
            chain_id: 1,
        }
    }
}

/// A sealed block with everything the chain store and RPC need.
#[derive(Clone, Debug)]
pub struct BuiltBlock {
    pub block: Block,
    pub receipts: Vec<Receipt>,
    pub results: Vec<RunTxResult>,
}

/// Incremental block assembly over a borrowed state.
pub struct BlockBuilder<'a> {
    state: &'a mut StateManager,
    chain: &'a Blockchain,
    precompiles: &'a PrecompileRegistry,
    header: Header,
    env: BlockEnv,
    withdrawals: Vec<Withdrawal>,
    transactions: Vec<Transaction>,
    results: Vec<RunTxResult>,
    gas_used: u64,
    blob_gas_used: u64,
    checkpointed: bool,
    status: BuildStatus,
}

impl<'a> BlockBuilder<'a> {
    pub fn new(
        state: &'a mut StateManager,
        chain: &'a Blockchain,
        precompiles: &'a PrecompileRegistry,
        parent: &Header,
        options: BuildBlockOptions,
    ) -> Self {
        let header = Header {
            parent_hash: parent.hash(),
            ommers_hash: EMPTY_OMMERS_HASH,
            coinbase: options.coinbase,
            difficulty: U256::zero(),
            number: parent.number + 1,
            gas_limit: options.gas_limit.unwrap_or(parent.gas_limit),
            gas_used: 0,
            timestamp: options.timestamp,
            extra_data: options.extra_data,
            mix_hash: options.prev_randao,
            nonce: 0,
            base_fee_per_gas: Some(parent.calc_next_base_fee()),
            blob_gas_used: Some(0),
            excess_blob_gas: Some(parent.calc_next_excess_blob_gas()),
            parent_beacon_block_root: options.parent_beacon_root,
            ..Header::default()
        };
        let env = block_env(&header, options.chain_id);
        Self {
            state,
            chain,
            precompiles,
            header,
            env,
            withdrawals: options.withdrawals,
            transactions: Vec::new(),
            results: Vec::new(),
            gas_used: 0,
            blob_gas_used: 0,
            checkpointed: false,
            status: BuildStatus::Pending,
        }
    }

    pub fn status(&self) -> BuildStatus {
        self.status
    }

    pub fn gas_used(&self) -> u64 {
        self.gas_used
    }

    pub fn block_env(&self) -> &BlockEnv {
        &self.env
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn transaction_results(&self) -> &[RunTxResult] {
        &self.results
    }

    /// Wei paid to the coinbase so far.
    pub fn miner_value(&self) -> U256 {
        self.results
            .iter()
            .fold(U256::zero(), |acc, r| acc.saturating_add(r.miner_value))
    }

    pub fn transactions_root(&self) -> Hash {
        let encoded: Vec<Vec<u8>> = self.transactions.iter().map(Transaction::encode).collect();
        ordered_trie_root(&encoded)
    }

    pub fn receipts_root(&self) -> Hash {
        let encoded: Vec<Vec<u8>> = self.results.iter().map(|r| r.receipt.encode()).collect();
        ordered_trie_root(&encoded)
    }

    pub fn logs_bloom(&self) -> Bloom {
        let mut bloom = Bloom::default();
        for result in &self.results {
            bloom.or(result.bloom());
        }
        bloom
    }

    /// Execute `tx` and append it.
    ///
    /// A rejected transaction leaves the builder usable and the block
    /// unchanged.
    ///
    /// # Errors
    ///
    /// [`BlockError::BlockGasLimitExceeded`] when `tx.gas_limit` exceeds the
    /// gas left in the block, [`BlockError::BlobGasLimitExceeded`] for blob
    /// gas, and anything [`run_tx`] returns.
    pub fn add_transaction(&mut self, tx: Transaction) -> Result<&RunTxResult> {
        self.ensure_pending()?;

        let remaining = self.header.gas_limit.saturating_sub(self.gas_used);
        if tx.gas_limit > remaining {
            return Err(BlockError::BlockGasLimitExceeded {
                tx_gas: tx.gas_limit,
                used: self.gas_used,
                limit: self.header.gas_limit,
            });
        }
        let blob_gas = tx.blob_gas();
        if self.blob_gas_used + blob_gas > MAX_BLOB_GAS_PER_BLOCK {
            return Err(BlockError::BlobGasLimitExceeded {
                blob_gas,
                used: self.blob_gas_used,
                limit: MAX_BLOB_GAS_PER_BLOCK,
            });
        }

        self.ensure_checkpoint();
        let options = RunTxOptions {
            skip_block_gas_limit_validation: true,
            block_gas_used: self.gas_used,
            ..RunTxOptions::default()
        };
        let result = run_tx(self.state, self.chain, self.precompiles, &self.env, &tx, options)?;

        self.gas_used += result.total_gas_spent;
        self.blob_gas_used += result.blob_gas_used;
        self.transactions.push(tx);
        self.results.push(result);
        Ok(&self.results[self.results.len() - 1])
    }

    /// Discard every change made by this builder.
    pub fn revert(&mut self) -> Result<()> {
        self.ensure_pending()?;
        if self.checkpointed {
            self.checkpointed = false;
            self.state.revert()?;
        }
        self.status = BuildStatus::Reverted;
        debug!(number = self.header.number, "block reverted");
        Ok(())
    }

    /// Apply withdrawals, commit, and seal the header.
    ///
    /// # Errors
    ///
    /// [`BlockError::BuilderClosed`] after a previous build or revert, or
    /// [`BlockError::State`] if the state backend fails. The builder's
    /// changes are reverted on failure.
    pub fn build(&mut self) -> Result<BuiltBlock> {
        self.ensure_pending()?;
        self.ensure_checkpoint();

        if let Err(err) = self.apply_withdrawals() {
            self.revert()?;
            return Err(err);
        }
        self.checkpointed = false;
        self.state.commit()?;

        let withdrawals: Vec<Vec<u8>> = self.withdrawals.iter().map(Withdrawal::rlp_encode).collect();
        let mut header = self.header.clone();
        header.state_root = self.state.state_root();
        header.transactions_root = self.transactions_root();
        header.receipts_root = self.receipts_root();
        header.logs_bloom = self.logs_bloom();
        header.gas_used = self.gas_used;
        header.blob_gas_used = Some(self.blob_gas_used);
        header.withdrawals_root = Some(ordered_trie_root(&withdrawals));

        let receipts: Vec<Receipt> = self.results.iter().map(|r| r.receipt.clone()).collect();
        let block = Block {
            header,
            transactions: std::mem::take(&mut self.transactions),
            withdrawals: std::mem::take(&mut self.withdrawals),
        };
        self.status = BuildStatus::Built;
        info!(
            number = block.header.number,
            hash = ?block.hash(),
            txs = block.transactions.len(),
            gas_used = block.header.gas_used,
            "block built"
        );

        Ok(BuiltBlock {
            block,
            receipts,
            results: std::mem::take(&mut self.results),
        })
    }

    fn apply_withdrawals(&mut self) -> Result<()> {
        for withdrawal in &self.withdrawals {
            credit_withdrawal(self.state, withdrawal)?;
        }
        Ok(())
    }

    fn ensure_pending(&self) -> Result<()> {
        match self.status {
            BuildStatus::Pending => Ok(()),
            status => Err(BlockError::BuilderClosed(status)),
        }
    }

    fn ensure_checkpoint(&mut self) {
        if !self.checkpointed {
            self.state.checkpoint();
            self.checkpointed = true;
        }
    }
}

impl Drop for BlockBuilder<'_> {
    fn drop(&mut self) {
        if self.checkpointed {
            warn!(number = self.header.number, "block builder dropped while pending");
            if let Err(err) = self.state.revert() {
                warn!(error = %err, "failed to revert abandoned block");
            }
        }
    }
}

/// Credit a withdrawal. Zero amounts leave the account untouched.
pub(crate) fn credit_withdrawal(state: &mut StateManager, withdrawal: &Withdrawal) -> Result<()> {
    if withdrawal.amount == 0 {
        return Ok(());
    }
    let mut account = state.get_account(&withdrawal.address)?;
    account.balance = account.balance.saturating_add(withdrawal.amount_wei());
    state.put_account(withdrawal.address, account);
    Ok(())
}
