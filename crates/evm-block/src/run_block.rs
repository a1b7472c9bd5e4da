//! # Block Replay
//!
//! Re-executes a complete block on top of its parent state and checks the
//! header commitments. Either every change lands or none does.

use crate::builder::credit_withdrawal;
use crate::domain::block_env;
use crate::errors::{BlockError, Result};
use crate::run_tx::{run_tx, RunTxOptions, RunTxResult};
use evm_chain::{validate_header, Blockchain, ChainError};
use evm_interpreter::PrecompileRegistry;
use evm_state::{ordered_trie_root, StateManager};
use shared_types::block::ELASTICITY_MULTIPLIER;
use shared_types::{Block, Bloom, Hash, Receipt, Transaction, Withdrawal};
use tracing::{debug, info};

/// Replay switches.
#[derive(Clone, Copy, Debug)]
pub struct RunBlockOptions {
    /// Fill in the computed roots instead of verifying them.
    pub generate: bool,
    pub skip_header_validation: bool,
    pub skip_nonce: bool,
    pub skip_balance: bool,
    pub chain_id: u64,
}

impl Default for RunBlockOptions {
    fn default() -> Self {
        Self {
            generate: false,
            skip_header_validation: false,
            skip_nonce: false,
            skip_balance: false,
            chain_id: 1,
        }
    }
}

#[derive(Clone, Debug)]
pub struct RunBlockResult {
    /// The input block, or with computed roots when generating.
    pub block: Block,
    pub receipts: Vec<Receipt>,
    pub results: Vec<RunTxResult>,
    pub gas_used: u64,
    pub logs_bloom: Bloom,
    pub receipts_root: Hash,
    pub state_root: Hash,
}

/// Execute `block` against `state`.
///
/// # Errors
///
/// Header validation failures as [`BlockError::Chain`], invalid
/// transactions, [`BlockError::BlockGasLimitExceeded`], and
/// [`BlockError::RootMismatch`] or [`BlockError::InvalidBlock`] when a
/// commitment does not match. `state` is unchanged on error.
pub fn run_block(
    state: &mut StateManager,
    chain: &Blockchain,
    precompiles: &PrecompileRegistry,
    block: &Block,
    options: RunBlockOptions,
) -> Result<RunBlockResult> {
    let header = &block.header;
    if !options.skip_header_validation {
        let parent = chain
            .get_block(&header.parent_hash)
            .ok_or(ChainError::UnknownParent {
                parent_hash: header.parent_hash,
            })?;
        validate_header(header, &parent.header)?;
    }
    if header.gas_limit >= 1 << 63 {
        return Err(BlockError::InvalidBlock(format!(
            "gas limit {} too large",
            header.gas_limit
        )));
    }

    debug!(number = header.number, txs = block.transactions.len(), "running block");
    state.checkpoint();
    let outcome = apply_block(state, chain, precompiles, block, options)
        .and_then(|applied| verify(state, block, applied, options));
    match outcome {
        Ok(mut result) => {
            state.commit()?;
            result.state_root = state.state_root();
            if options.generate {
                result.block.header.state_root = result.state_root;
            }
            info!(
                number = result.block.header.number,
                gas_used = result.gas_used,
                "block executed"
            );
            Ok(result)
        }
        Err(err) => {
            state.revert()?;
            debug!(number = header.number, error = %err, "block rejected");
            Err(err)
        }
    }
}

struct Applied {
    receipts: Vec<Receipt>,
    results: Vec<RunTxResult>,
    gas_used: u64,
    logs_bloom: Bloom,
}

fn apply_block(
    state: &mut StateManager,
    chain: &Blockchain,
    precompiles: &PrecompileRegistry,
    block: &Block,
    options: RunBlockOptions,
) -> Result<Applied> {
    let env = block_env(&block.header, options.chain_id);
    let limit = if block.header.base_fee_per_gas.is_some() {
        block.header.gas_limit.saturating_mul(ELASTICITY_MULTIPLIER)
    } else {
        block.header.gas_limit
    };

    let mut applied = Applied {
        receipts: Vec::with_capacity(block.transactions.len()),
        results: Vec::with_capacity(block.transactions.len()),
        gas_used: 0,
        logs_bloom: Bloom::default(),
    };
    for tx in &block.transactions {
        if applied.gas_used.saturating_add(tx.gas_limit) > limit {
            return Err(BlockError::BlockGasLimitExceeded {
                tx_gas: tx.gas_limit,
                used: applied.gas_used,
                limit,
            });
        }
        let tx_options = RunTxOptions {
            skip_nonce: options.skip_nonce,
            skip_balance: options.skip_balance,
            skip_block_gas_limit_validation: true,
            block_gas_used: applied.gas_used,
        };
        let result = run_tx(state, chain, precompiles, &env, tx, tx_options)?;
        applied.gas_used += result.total_gas_spent;
        applied.logs_bloom.or(result.bloom());
        applied.receipts.push(result.receipt.clone());
        applied.results.push(result);
    }

    for withdrawal in &block.withdrawals {
        credit_withdrawal(state, withdrawal)?;
    }
    Ok(applied)
}

fn verify(
    state: &StateManager,
    block: &Block,
    applied: Applied,
    options: RunBlockOptions,
) -> Result<RunBlockResult> {
    let encoded: Vec<Vec<u8>> = applied.receipts.iter().map(Receipt::encode).collect();
    let receipts_root = ordered_trie_root(&encoded);
    let mut block = block.clone();

    if options.generate {
        let txs: Vec<Vec<u8>> = block.transactions.iter().map(Transaction::encode).collect();
        let withdrawals: Vec<Vec<u8>> = block.withdrawals.iter().map(Withdrawal::rlp_encode).collect();
        let header = &mut block.header;
        header.transactions_root = ordered_trie_root(&txs);
        header.receipts_root = receipts_root;
        header.logs_bloom = applied.logs_bloom;
        header.gas_used = applied.gas_used;
        if header.withdrawals_root.is_some() {
            header.withdrawals_root = Some(ordered_trie_root(&withdrawals));
        }
    } else {
        let header = &block.header;
        if applied.gas_used != header.gas_used {
            return Err(BlockError::InvalidBlock(format!(
                "gas used {} does not match header {}",
                applied.gas_used, header.gas_used
            )));
        }
        check_root("receipts root", header.receipts_root, receipts_root)?;
        if applied.logs_bloom != header.logs_bloom {
            return Err(BlockError::InvalidBlock("logs bloom mismatch".to_string()));
        }
        let txs: Vec<Vec<u8>> = block.transactions.iter().map(Transaction::encode).collect();
        check_root("transactions root", header.transactions_root, ordered_trie_root(&txs))?;

        // The root covers committed state only, so commit the open layer on
        // a copy to check it before committing for real.
        let mut probe = state.deep_copy();
        probe.commit()?;
        check_root("state root", header.state_root, probe.state_root())?;
    }

    Ok(RunBlockResult {
        block,
        receipts: applied.receipts,
        results: applied.results,
        gas_used: applied.gas_used,
        logs_bloom: applied.logs_bloom,
        receipts_root,
        state_root: Hash::ZERO,
    })
}

fn check_root(field: &'static str, expected: Hash, computed: Hash) -> Result<()> {
    if expected == computed {
        Ok(())
    } else {
        Err(BlockError::RootMismatch {
            field,
            expected,
            computed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{BlockBuilder, BuildBlockOptions};
    use shared_types::{Account, Address, Header, TxType, U256};

    const ETHER: u64 = 1_000_000_000_000_000_000;

    fn sender() -> Address {
        Address::from_low_u64(0xa11ce)
    }

    fn genesis_state() -> StateManager {
        let mut state = StateManager::new();
        state.put_account(sender(), Account::new(0, U256::from(ETHER)));
        state
    }

    fn transfer(nonce: u64) -> Transaction {
        Transaction {
            tx_type: TxType::DynamicFee,
            nonce,
            max_fee_per_gas: U256::from(10_000_000_000u64),
            max_priority_fee_per_gas: U256::from(1_000_000_000u64),
            gas_limit: 21_000,
            to: Some(Address::from_low_u64(0xb0b)),
            value: U256::from(100),
            ..Default::default()
        }
        .impersonated(sender())
    }

    /// Build block 1 on a copy of the genesis state.
    fn built_block(chain: &Blockchain, txs: Vec<Transaction>) -> Block {
        let mut state = genesis_state();
        let precompiles = PrecompileRegistry::standard();
        let parent = chain.head_header().clone();
        let options = BuildBlockOptions {
            timestamp: 12,
            coinbase: Address::from_low_u64(0xc0ffee),
            ..BuildBlockOptions::default()
        };
        let mut builder = BlockBuilder::new(&mut state, chain, &precompiles, &parent, options);
        for tx in txs {
            builder.add_transaction(tx).unwrap();
        }
        builder.build().unwrap().block
    }

    // ===== REPLAY =====

    #[test]
    fn test_replay_matches_builder() {
        let chain = Blockchain::new(Block::default());
        let block = built_block(&chain, vec![transfer(0), transfer(1)]);

        let mut state = genesis_state();
        let result = run_block(
            &mut state,
            &chain,
            &PrecompileRegistry::standard(),
            &block,
            RunBlockOptions::default(),
        )
        .unwrap();

        assert_eq!(result.gas_used, 42_000);
        assert_eq!(result.state_root, block.header.state_root);
        assert_eq!(result.receipts_root, block.header.receipts_root);
        assert_eq!(result.block.hash(), block.hash());
        assert_eq!(state.get_account(&sender()).unwrap().nonce, 2);
    }

    #[test]
    fn test_bad_state_root_reverts_everything() {
        let chain = Blockchain::new(Block::default());
        let mut block = built_block(&chain, vec![transfer(0)]);
        block.header.state_root = Hash::keccak(b"wrong");

        let mut state = genesis_state();
        let root = state.state_root();
        let err = run_block(
            &mut state,
            &chain,
            &PrecompileRegistry::standard(),
            &block,
            RunBlockOptions::default(),
        )
        .unwrap_err();

        assert!(matches!(err, BlockError::RootMismatch { field: "state root", .. }));
        assert_eq!(state.state_root(), root);
        assert_eq!(state.get_account(&sender()).unwrap().nonce, 0);
        assert_eq!(state.checkpoint_depth(), 0);
    }

    #[test]
    fn test_gas_used_mismatch() {
        let chain = Blockchain::new(Block::default());
        let mut block = built_block(&chain, vec![transfer(0)]);
        block.header.gas_used = 1;

        let mut state = genesis_state();
        let err = run_block(
            &mut state,
            &chain,
            &PrecompileRegistry::standard(),
            &block,
            RunBlockOptions {
                skip_header_validation: true,
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, BlockError::InvalidBlock(_)));
    }

    #[test]
    fn test_invalid_transaction_rejects_block() {
        let chain = Blockchain::new(Block::default());
        let mut block = built_block(&chain, vec![transfer(0)]);
        block.transactions.push(transfer(7));

        let mut state = genesis_state();
        let err = run_block(
            &mut state,
            &chain,
            &PrecompileRegistry::standard(),
            &block,
            RunBlockOptions {
                skip_header_validation: true,
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, BlockError::InvalidTransaction(_)));
        assert_eq!(state.get_account(&sender()).unwrap().nonce, 0);
    }

    #[test]
    fn test_unknown_parent() {
        let chain = Blockchain::new(Block::default());
        let block = Block {
            header: Header {
                parent_hash: Hash::keccak(b"nowhere"),
                number: 1,
                ..Header::default()
            },
            ..Block::default()
        };
        let mut state = genesis_state();
        let err = run_block(
            &mut state,
            &chain,
            &PrecompileRegistry::standard(),
            &block,
            RunBlockOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, BlockError::Chain(ChainError::UnknownParent { .. })));
    }

    #[test]
    fn test_generate_fills_roots() {
        let chain = Blockchain::new(Block::default());
        let built = built_block(&chain, vec![transfer(0)]);
        let mut draft = built.clone();
        draft.header.state_root = Hash::ZERO;
        draft.header.receipts_root = Hash::ZERO;
        draft.header.gas_used = 0;

        let mut state = genesis_state();
        let result = run_block(
            &mut state,
            &chain,
            &PrecompileRegistry::standard(),
            &draft,
            RunBlockOptions {
                generate: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(result.block.header.state_root, built.header.state_root);
        assert_eq!(result.block.header.receipts_root, built.header.receipts_root);
        assert_eq!(result.block.header.gas_used, 21_000);
    }
}
