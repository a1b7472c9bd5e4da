//! # EVM Node
//!
//! The explicit context object. One node owns one state, one chain and one
//! pool; nothing is global.
//!
//! ## Lock Order
//!
//! Every operation that needs more than one lock takes them in the same
//! order: state, then chain, then pool. The state mutex is the single
//! mutator of the checkpoint stack.

use crate::adapters::PoolStateView;
use crate::config::{MiningMode, NodeConfig};
use crate::domain::{
    genesis_block, BlockTag, CallParams, CallResult, TransactionReceipt, TransactionRequest,
};
use crate::errors::{NodeError, Result};
use evm_block::{
    block_env, run_block, run_tx, BlockBuilder, BlockError, BuildBlockOptions,
    InvalidTransaction, RunBlockOptions, RunTxOptions, RunTxResult,
};
use evm_chain::Blockchain;
use evm_interpreter::{create_address, BlockEnv, Precompile, PrecompileRegistry};
use evm_state::{AccountFields, AccountProof, ForkBackend, StateDump, StateManager};
use evm_txpool::{AddOptions, SystemTimeSource, TxPool, TxPoolContent, TxPoolStats};
use parking_lot::{Mutex, RwLock};
use shared_types::block::{GAS_PER_BLOB, MAX_BLOB_GAS_PER_BLOCK};
use shared_types::{Address, Block, Bytes, Hash, Header, Transaction, TxType, U256};
use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, instrument, warn};

/// Tip used by `send_transaction` when the request names no fee.
const DEFAULT_PRIORITY_FEE: u64 = 1_000_000_000;

/// A local EVM node.
pub struct EvmNode {
    config: NodeConfig,
    state: Mutex<StateManager>,
    chain: RwLock<Blockchain>,
    pool: RwLock<TxPool>,
    precompiles: PrecompileRegistry,
}

impl EvmNode {
    // =========================================================================
    // CONSTRUCTION
    // =========================================================================

    /// Node over a fresh in-memory state with the standard precompiles.
    #[instrument(name = "node_init", skip(config), fields(chain_id = config.chain.chain_id))]
    pub fn new(config: NodeConfig) -> Self {
        Self::assemble(config, StateManager::new(), PrecompileRegistry::standard())
    }

    /// Node whose state misses fall through to `backend`.
    ///
    /// # Errors
    ///
    /// Propagates a fork backend that cannot be reached.
    pub fn forked(config: NodeConfig, backend: Arc<dyn ForkBackend>) -> Result<Self> {
        let fork = config.fork.clone().unwrap_or_default();
        let state = StateManager::forked(backend, fork)?;
        info!("Starting node on a forked state");
        Ok(Self::assemble(config, state, PrecompileRegistry::standard()))
    }

    /// Add or replace a precompile before the node is shared.
    #[must_use]
    pub fn with_precompile(mut self, address: Address, handler: Arc<dyn Precompile>) -> Self {
        self.precompiles.register(address, handler);
        self
    }

    fn assemble(config: NodeConfig, mut state: StateManager, precompiles: PrecompileRegistry) -> Self {
        let genesis = genesis_block(&config.chain, &mut state);
        info!(
            hash = %genesis.hash(),
            accounts = config.chain.prefunded.len(),
            "Genesis block created"
        );
        let chain = Blockchain::new(genesis);
        let pool = TxPool::new(config.txpool.clone(), Arc::new(SystemTimeSource));
        Self {
            config,
            state: Mutex::new(state),
            chain: RwLock::new(chain),
            pool: RwLock::new(pool),
            precompiles,
        }
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn chain_id(&self) -> u64 {
        self.config.chain.chain_id
    }

    // =========================================================================
    // SIMULATION
    // =========================================================================

    /// `eth_call`: execute against the next block without keeping anything.
    pub fn call(&self, params: CallParams) -> Result<CallResult> {
        let mut state = self.state.lock();
        let chain = self.chain.read();
        let env = self.call_env(chain.head_header(), &params);
        let gas = params.gas.unwrap_or(env.gas_limit);
        let result = self.simulate(&mut state, &chain, &env, &params, gas)?;
        Ok(call_result(result))
    }

    /// Smallest gas limit under which the call succeeds.
    ///
    /// # Errors
    ///
    /// [`NodeError::Execution`] when the call fails even at the cap.
    pub fn estimate_gas(&self, params: CallParams) -> Result<u64> {
        let mut state = self.state.lock();
        let chain = self.chain.read();
        let env = self.call_env(chain.head_header(), &params);
        let cap = params.gas.unwrap_or(env.gas_limit);

        let first = self.simulate(&mut state, &chain, &env, &params, cap)?;
        if !first.is_success() {
            return Err(NodeError::Execution(failure_reason(&first)));
        }

        // Refunds make the spent gas a strict lower bound on the limit.
        let mut lo = first.total_gas_spent.saturating_sub(1);
        let mut hi = cap;
        while lo + 1 < hi {
            let mid = lo + (hi - lo) / 2;
            match self.simulate(&mut state, &chain, &env, &params, mid) {
                Ok(result) if result.is_success() => hi = mid,
                Ok(_) | Err(NodeError::Block(BlockError::InvalidTransaction(_))) => lo = mid,
                Err(err) => return Err(err),
            }
        }
        debug!(gas = hi, "Gas estimated");
        Ok(hi)
    }

    /// Run `params` as an impersonated transaction and revert it.
    fn simulate(
        &self,
        state: &mut StateManager,
        chain: &Blockchain,
        env: &BlockEnv,
        params: &CallParams,
        gas: u64,
    ) -> Result<RunTxResult> {
        let tx = call_transaction(params, gas, self.chain_id());
        let options = RunTxOptions {
            skip_nonce: true,
            skip_balance: true,
            skip_block_gas_limit_validation: true,
            block_gas_used: 0,
        };
        state.checkpoint();
        let outcome = run_tx(state, chain, &self.precompiles, env, &tx, options);
        state.revert()?;
        Ok(outcome?)
    }

    /// Environment of the block after `head`. A call without any fee field
    /// runs at base fee zero.
    fn call_env(&self, head: &Header, params: &CallParams) -> BlockEnv {
        let mut env = self.pending_env(head);
        if params.gas_price.is_none()
            && params.max_fee_per_gas.is_none()
            && params.max_priority_fee_per_gas.is_none()
        {
            env.base_fee = U256::zero();
        }
        env
    }

    fn pending_env(&self, head: &Header) -> BlockEnv {
        let next = Header {
            number: head.number + 1,
            coinbase: self.config.chain.coinbase,
            timestamp: next_timestamp(head),
            gas_limit: head.gas_limit,
            base_fee_per_gas: Some(head.calc_next_base_fee()),
            excess_blob_gas: Some(head.calc_next_excess_blob_gas()),
            ..Header::default()
        };
        block_env(&next, self.chain_id())
    }

    // =========================================================================
    // SUBMISSION
    // =========================================================================

    /// Decode a signed transaction and add it to the pool.
    pub fn send_raw_transaction(&self, raw: &[u8]) -> Result<Hash> {
        let tx = Transaction::decode(raw)?;
        if let Some(chain_id) = tx.chain_id {
            if chain_id != self.chain_id() {
                return Err(NodeError::InvalidParams(format!(
                    "chain id {chain_id} does not match {}",
                    self.chain_id()
                )));
            }
        }
        self.submit(tx, AddOptions::local())
    }

    /// Fill in defaults and submit an unsigned transaction as `req.from`.
    pub fn send_transaction(&self, req: TransactionRequest) -> Result<Hash> {
        let nonce = match req.nonce {
            Some(nonce) => nonce,
            None => self.get_transaction_count(&req.from, BlockTag::Pending)?,
        };
        let gas_limit = match req.gas {
            Some(gas) => gas,
            None => self.estimate_gas(CallParams::from(&req))?,
        };

        let mut tx = Transaction {
            chain_id: Some(self.chain_id()),
            nonce,
            gas_limit,
            to: req.to,
            value: req.value.unwrap_or_default(),
            data: req.data,
            access_list: req.access_list,
            ..Transaction::default()
        };
        let legacy = req.gas_price.is_some()
            && req.max_fee_per_gas.is_none()
            && req.max_priority_fee_per_gas.is_none();
        if legacy {
            tx.tx_type = if tx.access_list.is_empty() {
                TxType::Legacy
            } else {
                TxType::AccessList
            };
            tx.gas_price = req.gas_price.unwrap_or_default();
        } else {
            let next_base_fee = self.chain.read().head_header().calc_next_base_fee();
            let tip = req
                .max_priority_fee_per_gas
                .unwrap_or_else(|| U256::from(DEFAULT_PRIORITY_FEE));
            tx.tx_type = TxType::DynamicFee;
            tx.max_priority_fee_per_gas = tip;
            tx.max_fee_per_gas = req
                .max_fee_per_gas
                .unwrap_or_else(|| next_base_fee.saturating_mul(U256::from(2)).saturating_add(tip));
        }

        self.submit(tx.impersonated(req.from), AddOptions::local())
    }

    fn submit(&self, tx: Transaction, options: AddOptions) -> Result<Hash> {
        let hash = {
            let state = self.state.lock();
            let chain = self.chain.read();
            let mut pool = self.pool.write();
            let view = PoolStateView {
                state: &state,
                head: chain.head_header(),
            };
            pool.add_with(tx, &view, options)?
        };
        debug!(hash = %hash, "Transaction accepted");
        if self.config.mining.mode == MiningMode::Auto {
            self.mine(1)?;
        }
        Ok(hash)
    }

    // =========================================================================
    // MINING
    // =========================================================================

    /// Mine `blocks` blocks from the pool, returning their hashes.
    pub fn mine(&self, blocks: u64) -> Result<Vec<Hash>> {
        (0..blocks).map(|_| self.mine_block()).collect()
    }

    fn mine_block(&self) -> Result<Hash> {
        let mut state = self.state.lock();
        let mut chain = self.chain.write();
        let mut pool = self.pool.write();

        let parent = chain.head_header().clone();
        let options = BuildBlockOptions {
            coinbase: self.config.chain.coinbase,
            timestamp: next_timestamp(&parent),
            chain_id: self.chain_id(),
            ..BuildBlockOptions::default()
        };

        let built = {
            let mut builder =
                BlockBuilder::new(&mut state, &chain, &self.precompiles, &parent, options);
            let max_blobs = (MAX_BLOB_GAS_PER_BLOCK / GAS_PER_BLOB) as usize;
            let candidates = pool.txs_by_price_and_nonce(builder.block_env().base_fee, Some(max_blobs));

            for tx in candidates {
                let hash = tx.hash();
                match builder.add_transaction(tx) {
                    Ok(_) => {}
                    Err(BlockError::BlockGasLimitExceeded { .. })
                    | Err(BlockError::BlobGasLimitExceeded { .. }) => {
                        debug!(hash = %hash, "Transaction does not fit, left in pool");
                    }
                    Err(BlockError::InvalidTransaction(InvalidTransaction::NonceTooHigh { .. })) => {
                        debug!(hash = %hash, "Transaction waits on an earlier nonce");
                    }
                    Err(BlockError::InvalidTransaction(reason)) => {
                        warn!(hash = %hash, %reason, "Dropping invalid transaction");
                        pool.remove_by_hash(&hash);
                    }
                    Err(err) => {
                        builder.revert()?;
                        return Err(err.into());
                    }
                }
            }
            builder.build()?
        };

        let block = built.block;
        let hash = block.hash();
        let number = block.number();
        let tx_count = block.transactions.len();
        let gas_used = block.header.gas_used;

        let update = chain.put_block(block.clone())?;
        chain.put_receipts(hash, built.receipts);
        if update.is_reorg() {
            pool.on_chain_reorganization(&update.removed, &update.added);
        } else {
            pool.on_block_added(&block);
        }
        pool.cleanup();

        info!(number, hash = %hash, txs = tx_count, gas_used, "Block mined");
        Ok(hash)
    }

    /// Execute and append a block produced elsewhere on top of the head.
    pub fn import_block(&self, block: Block) -> Result<Hash> {
        let mut state = self.state.lock();
        let mut chain = self.chain.write();
        let mut pool = self.pool.write();

        let head = chain.head_header().hash();
        if block.header.parent_hash != head {
            return Err(NodeError::InvalidParams(format!(
                "block {} does not extend head {head}",
                block.number()
            )));
        }

        let options = RunBlockOptions {
            chain_id: self.chain_id(),
            ..RunBlockOptions::default()
        };
        let result = run_block(&mut state, &chain, &self.precompiles, &block, options)?;
        let hash = block.hash();
        chain.put_block(block.clone())?;
        chain.put_receipts(hash, result.receipts);
        pool.on_block_added(&block);

        info!(number = block.number(), hash = %hash, "Block imported");
        Ok(hash)
    }

    // =========================================================================
    // ACCOUNT READS
    // =========================================================================

    pub fn get_balance(&self, address: &Address) -> Result<U256> {
        Ok(self.state.lock().get_account(address)?.balance)
    }

    /// Account nonce; with [`BlockTag::Pending`] the sender's contiguous
    /// pooled transactions are counted too.
    pub fn get_transaction_count(&self, address: &Address, tag: BlockTag) -> Result<u64> {
        let nonce = self.state.lock().get_account(address)?.nonce;
        match tag {
            BlockTag::Pending => {
                let pool = self.pool.read();
                let mut entries = pool.get_by_sender(address);
                entries.sort_by_key(|entry| entry.tx.nonce);
                Ok(entries.iter().fold(nonce, |next, entry| {
                    if entry.tx.nonce == next {
                        next + 1
                    } else {
                        next
                    }
                }))
            }
            tag => {
                self.require_latest(tag)?;
                Ok(nonce)
            }
        }
    }

    pub fn get_code(&self, address: &Address) -> Result<Bytes> {
        Ok(self.state.lock().get_code(address)?)
    }

    pub fn get_storage_at(&self, address: &Address, slot: U256) -> Result<U256> {
        Ok(self.state.lock().get_storage(address, &slot)?)
    }

    /// EIP-1186 proof against the latest committed state.
    pub fn get_proof(&self, address: &Address, slots: &[U256]) -> Result<AccountProof> {
        Ok(self.state.lock().get_proof(address, slots)?)
    }

    /// Only the head state is retained.
    fn require_latest(&self, tag: BlockTag) -> Result<()> {
        let head = self.block_number();
        match tag {
            BlockTag::Latest | BlockTag::Pending => Ok(()),
            BlockTag::Number(n) if n == head => Ok(()),
            BlockTag::Earliest if head == 0 => Ok(()),
            other => Err(NodeError::InvalidParams(format!(
                "state for {other:?} is not retained"
            ))),
        }
    }

    // =========================================================================
    // ACCOUNT WRITES
    // =========================================================================

    pub fn set_balance(&self, address: Address, balance: U256) -> Result<()> {
        let fields = AccountFields {
            balance: Some(balance),
            ..AccountFields::default()
        };
        Ok(self.state.lock().modify_account_fields(address, fields)?)
    }

    pub fn set_nonce(&self, address: Address, nonce: u64) -> Result<()> {
        let fields = AccountFields {
            nonce: Some(nonce),
            ..AccountFields::default()
        };
        Ok(self.state.lock().modify_account_fields(address, fields)?)
    }

    pub fn set_code(&self, address: Address, code: Bytes) -> Result<()> {
        Ok(self.state.lock().put_code(address, code)?)
    }

    pub fn set_storage_at(&self, address: Address, slot: U256, value: U256) -> Result<()> {
        let mut state = self.state.lock();
        if !state.account_exists(&address)? {
            state.modify_account_fields(address, AccountFields::default())?;
        }
        state.put_storage(address, slot, value);
        Ok(())
    }

    // =========================================================================
    // CHAIN READS
    // =========================================================================

    pub fn block_number(&self) -> u64 {
        self.chain.read().head_number()
    }

    pub fn get_block_by_number(&self, tag: BlockTag) -> Option<Block> {
        let chain = self.chain.read();
        match tag {
            BlockTag::Latest | BlockTag::Pending => Some(chain.canonical_head().clone()),
            BlockTag::Earliest => chain.get_block_by_number(0).cloned(),
            BlockTag::Number(n) => chain.get_block_by_number(n).cloned(),
        }
    }

    pub fn get_block_by_hash(&self, hash: &Hash) -> Option<Block> {
        self.chain.read().get_block(hash).cloned()
    }

    /// A mined transaction, or a pooled one.
    pub fn get_transaction_by_hash(&self, hash: &Hash) -> Option<Transaction> {
        if let Some((tx, _)) = self.chain.read().get_transaction(hash) {
            return Some(tx.clone());
        }
        self.pool.read().get_by_hash(hash).cloned()
    }

    pub fn get_transaction_receipt(&self, hash: &Hash) -> Option<TransactionReceipt> {
        let chain = self.chain.read();
        let (tx, location) = chain.get_transaction(hash)?;
        let receipts = chain.get_receipts(&location.block_hash)?;
        let receipt = receipts.get(location.index)?;
        let block = chain.get_block(&location.block_hash)?;

        let previous = match location.index {
            0 => 0,
            i => receipts[i - 1].cumulative_gas_used,
        };
        let from = tx.sender().ok()?;
        let contract_address = tx.is_create().then(|| create_address(&from, tx.nonce));

        Some(TransactionReceipt {
            transaction_hash: *hash,
            transaction_index: location.index as u64,
            block_hash: location.block_hash,
            block_number: location.block_number,
            from,
            to: tx.to,
            cumulative_gas_used: receipt.cumulative_gas_used,
            gas_used: receipt.cumulative_gas_used - previous,
            effective_gas_price: tx.effective_gas_price(block.header.base_fee()),
            contract_address,
            logs: receipt.logs.clone(),
            logs_bloom: receipt.logs_bloom.clone(),
            status: receipt.status,
            tx_type: tx.tx_type,
        })
    }

    // =========================================================================
    // POOL
    // =========================================================================

    pub fn txpool_content(&self) -> TxPoolContent {
        self.pool.read().content()
    }

    pub fn txpool_status(&self) -> TxPoolStats {
        self.pool.read().stats()
    }

    /// Drop a pooled transaction.
    pub fn drop_transaction(&self, hash: &Hash) -> bool {
        self.pool.write().remove_by_hash(hash).is_some()
    }

    // =========================================================================
    // STATE IMPORT / EXPORT
    // =========================================================================

    pub fn dump_state(&self) -> StateDump {
        self.state.lock().dump_state()
    }

    pub fn load_state(&self, dump: &StateDump) -> Result<()> {
        self.state.lock().load_state(dump)?;
        info!(accounts = dump.len(), "State loaded");
        Ok(())
    }

    /// Write the state dump as JSON.
    pub fn save_state_file(&self, path: &Path) -> Result<()> {
        let dump = self.dump_state();
        std::fs::write(path, serde_json::to_vec_pretty(&dump)?)?;
        info!(path = %path.display(), accounts = dump.len(), "State saved");
        Ok(())
    }

    pub fn load_state_file(&self, path: &Path) -> Result<()> {
        let dump: StateDump = serde_json::from_slice(&std::fs::read(path)?)?;
        self.load_state(&dump)
    }

    /// Independent deep copy. Pooled transactions are re-added to the copy
    /// where they still validate.
    pub fn snapshot(&self) -> EvmNode {
        let state = self.state.lock().deep_copy();
        let chain = self.chain.read().clone();
        let content = self.pool.read().content();

        let mut pool = TxPool::new(self.config.txpool.clone(), Arc::new(SystemTimeSource));
        {
            let view = PoolStateView {
                state: &state,
                head: chain.head_header(),
            };
            let pooled = content.pending.into_values().chain(content.queued.into_values());
            for tx in pooled.flatten() {
                if let Err(err) = pool.add_with(tx, &view, AddOptions::local()) {
                    debug!(%err, "Pooled transaction not carried into snapshot");
                }
            }
        }

        EvmNode {
            config: self.config.clone(),
            state: Mutex::new(state),
            chain: RwLock::new(chain),
            pool: RwLock::new(pool),
            precompiles: self.precompiles.clone(),
        }
    }
}

/// `max(parent + 1, now)`.
fn next_timestamp(parent: &Header) -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    now.max(parent.timestamp + 1)
}

fn call_transaction(params: &CallParams, gas: u64, chain_id: u64) -> Transaction {
    let mut tx = Transaction {
        chain_id: Some(chain_id),
        gas_limit: gas,
        to: params.to,
        value: params.value.unwrap_or_default(),
        data: params.data.clone(),
        access_list: params.access_list.clone(),
        ..Transaction::default()
    };
    if params.max_fee_per_gas.is_some() || params.max_priority_fee_per_gas.is_some() {
        tx.tx_type = TxType::DynamicFee;
        tx.max_priority_fee_per_gas = params.max_priority_fee_per_gas.unwrap_or_default();
        tx.max_fee_per_gas = params
            .max_fee_per_gas
            .unwrap_or(tx.max_priority_fee_per_gas);
    } else {
        tx.tx_type = if tx.access_list.is_empty() {
            TxType::Legacy
        } else {
            TxType::AccessList
        };
        tx.gas_price = params.gas_price.unwrap_or_default();
    }
    tx.impersonated(params.from.unwrap_or(Address::ZERO))
}

fn call_result(result: RunTxResult) -> CallResult {
    let revert_reason = result.exec.revert_reason();
    CallResult {
        return_data: result.exec.return_data,
        gas_used: result.total_gas_spent,
        logs: result.exec.logs,
        created_address: result.created_address,
        exception: result.exec.exception.map(|e| e.to_string()),
        revert_reason,
    }
}

fn failure_reason(result: &RunTxResult) -> String {
    match (&result.exec.exception, result.exec.revert_reason()) {
        (_, Some(reason)) => format!("execution reverted: {reason}"),
        (Some(exception), None) => exception.to_string(),
        (None, None) => "execution failed".to_string(),
    }
}
