//! # Transaction Execution
//!
//! ```text
//! validate ──→ buy gas ──→ bump nonce ──→ authorizations ──→ prewarm
//!                                                              │
//!   receipt ←── cleanup ←── pay miner ←── refund sender ←── Evm::run_call
//! ```
//!
//! Everything runs inside one state checkpoint. A validation failure
//! reverts it, so a rejected transaction leaves no trace. A reverted
//! execution still pays for its gas and bumps the nonce.

use crate::adapters::ChainBlockHashes;
use crate::domain::intrinsic_gas;
use crate::errors::{BlockError, InvalidTransaction, Result};
use evm_chain::Blockchain;
use evm_interpreter::{
    delegation_code, delegation_target, gas, BlockEnv, Evm, ExecResult, Message,
    PrecompileRegistry, TxEnv,
};
use evm_interpreter::gas::MAX_INITCODE_SIZE;
use evm_state::StateManager;
use shared_types::{Address, Bloom, Hash, Receipt, Transaction, TxType, U256, EMPTY_CODE_HASH};
use tracing::{debug, trace};

/// Switches that relax validation, used by calls, gas estimation and
/// impersonated sends.
#[derive(Clone, Copy, Debug, Default)]
pub struct RunTxOptions {
    /// Accept any nonce.
    pub skip_nonce: bool,
    /// Top the sender up instead of rejecting for insufficient funds.
    pub skip_balance: bool,
    /// Do not check `gas_limit` against the block's remaining gas.
    pub skip_block_gas_limit_validation: bool,
    /// Gas used by earlier transactions of the block.
    pub block_gas_used: u64,
}

/// Outcome of one executed transaction.
#[derive(Clone, Debug)]
pub struct RunTxResult {
    pub tx_hash: Hash,
    pub sender: Address,
    pub exec: ExecResult,
    /// Intrinsic plus execution gas, after refunds.
    pub total_gas_spent: u64,
    /// Refund applied, after the EIP-3529 cap.
    pub gas_refund: u64,
    /// Wei paid by the sender for gas, blob gas excluded.
    pub amount_spent: U256,
    /// Wei credited to the coinbase.
    pub miner_value: U256,
    pub blob_gas_used: u64,
    pub created_address: Option<Address>,
    pub receipt: Receipt,
}

impl RunTxResult {
    pub fn bloom(&self) -> &Bloom {
        &self.receipt.logs_bloom
    }

    pub fn is_success(&self) -> bool {
        self.exec.is_success()
    }
}

/// Validate and execute `tx` on top of `state`.
///
/// # Errors
///
/// [`BlockError::InvalidTransaction`] and
/// [`BlockError::BlockGasLimitExceeded`] leave `state` untouched.
/// Backend failures surface as [`BlockError::State`] or [`BlockError::Evm`].
pub fn run_tx(
    state: &mut StateManager,
    chain: &Blockchain,
    precompiles: &PrecompileRegistry,
    block: &BlockEnv,
    tx: &Transaction,
    options: RunTxOptions,
) -> Result<RunTxResult> {
    state.checkpoint();
    match execute(state, chain, precompiles, block, tx, options) {
        Ok(result) => {
            state.commit()?;
            Ok(result)
        }
        Err(err) => {
            state.revert()?;
            debug!(tx = ?tx.hash(), error = %err, "transaction rejected");
            Err(err)
        }
    }
}

fn execute(
    state: &mut StateManager,
    chain: &Blockchain,
    precompiles: &PrecompileRegistry,
    block: &BlockEnv,
    tx: &Transaction,
    options: RunTxOptions,
) -> Result<RunTxResult> {
    let sender = tx.sender()?;
    let intrinsic = validate_static(tx, block, options)?;
    let gas_price = tx.effective_gas_price(block.base_fee);
    let blob_gas_used = tx.blob_gas();

    // ===== SENDER CHECKS =====

    let mut account = state.get_account(&sender)?;
    if account.code_hash != EMPTY_CODE_HASH {
        let code = state.get_code(&sender)?;
        if delegation_target(&code).is_none() {
            return Err(InvalidTransaction::SenderNotEoa(sender).into());
        }
    }

    if !options.skip_nonce {
        if tx.nonce < account.nonce {
            return Err(InvalidTransaction::NonceTooLow {
                account: account.nonce,
                tx: tx.nonce,
            }
            .into());
        }
        if tx.nonce > account.nonce {
            return Err(InvalidTransaction::NonceTooHigh {
                account: account.nonce,
                tx: tx.nonce,
            }
            .into());
        }
    }
    if account.nonce == u64::MAX {
        return Err(InvalidTransaction::NonceOverflow.into());
    }

    let gas_cost = U256::from(tx.gas_limit).saturating_mul(gas_price);
    let blob_cost = U256::from(blob_gas_used).saturating_mul(block.blob_base_fee);
    let upfront = gas_cost.saturating_add(tx.value);
    let required = upfront.max(tx.max_cost()).saturating_add(blob_cost);
    if account.balance < required {
        if options.skip_balance {
            trace!(%sender, %required, "topping up sender balance");
            account.balance = required;
        } else {
            return Err(InvalidTransaction::InsufficientFunds {
                required,
                available: account.balance,
            }
            .into());
        }
    }

    // ===== BUY GAS =====

    account.balance = account.balance.saturating_sub(gas_cost.saturating_add(blob_cost));
    account.nonce += 1;
    state.put_account(sender, account);

    let (authorities, auth_refund) = apply_authorizations(state, block, tx)?;

    // ===== EXECUTE =====

    let block_hashes = ChainBlockHashes(chain);
    let tx_env = TxEnv {
        origin: sender,
        gas_price,
        blob_hashes: tx.blob_versioned_hashes.clone(),
    };
    let mut evm = Evm::new(state, &block_hashes, precompiles, block, tx_env);
    evm.warm_precompiles();
    let journal = evm.journal_mut();
    journal.warm_account(sender);
    journal.warm_account(block.coinbase);
    if let Some(to) = tx.to {
        journal.warm_account(to);
    }
    for item in &tx.access_list {
        journal.warm_account(item.address);
        for key in &item.storage_keys {
            journal.warm_slot(item.address, key.to_u256());
        }
    }
    for authority in authorities {
        journal.warm_account(authority);
    }

    let message = Message {
        caller: sender,
        to: tx.to,
        value: tx.value,
        data: tx.data.clone(),
        gas_limit: tx.gas_limit - intrinsic,
        depth: 0,
        is_static: false,
        delegatecall: false,
        salt: None,
    };
    let exec = evm.run_call(message)?;

    // ===== SETTLE =====

    let gas_used = exec.gas_used.saturating_add(intrinsic);
    let gas_refund = gas::capped_refund(gas_used, exec.gas_refund.saturating_add(auth_refund));
    let total_gas_spent = gas_used - gas_refund;

    let mut account = state.get_account(&sender)?;
    let returned = U256::from(tx.gas_limit - total_gas_spent).saturating_mul(gas_price);
    account.balance = account.balance.saturating_add(returned);
    state.put_account(sender, account);

    let miner_value =
        U256::from(total_gas_spent).saturating_mul(tx.effective_priority_fee(block.base_fee));
    let mut miner = state.get_account(&block.coinbase)?;
    miner.balance = miner.balance.saturating_add(miner_value);
    state.put_account(block.coinbase, miner);
    state.touch(block.coinbase);

    for address in exec.selfdestructs.intersection(&exec.created_addresses) {
        state.delete_account(*address);
    }
    let pruned = state.cleanup_touched()?;
    if !pruned.is_empty() {
        trace!(count = pruned.len(), "pruned empty touched accounts");
    }

    let receipt = Receipt::new(
        tx.tx_type,
        exec.is_success(),
        options.block_gas_used.saturating_add(total_gas_spent),
        exec.logs.clone(),
    );
    let tx_hash = tx.hash();
    debug!(
        tx = ?tx_hash,
        %sender,
        gas = total_gas_spent,
        success = exec.is_success(),
        "transaction executed"
    );

    Ok(RunTxResult {
        tx_hash,
        sender,
        created_address: exec.created_address,
        exec,
        total_gas_spent,
        gas_refund,
        amount_spent: U256::from(total_gas_spent).saturating_mul(gas_price),
        miner_value,
        blob_gas_used,
        receipt,
    })
}

/// Checks that need no state. Returns the intrinsic gas.
fn validate_static(tx: &Transaction, block: &BlockEnv, options: RunTxOptions) -> Result<u64> {
    let intrinsic = intrinsic_gas(tx);
    if tx.gas_limit < intrinsic {
        return Err(InvalidTransaction::IntrinsicGasTooLow {
            gas_limit: tx.gas_limit,
            intrinsic,
        }
        .into());
    }

    if !options.skip_block_gas_limit_validation
        && options.block_gas_used.saturating_add(tx.gas_limit) > block.gas_limit
    {
        return Err(BlockError::BlockGasLimitExceeded {
            tx_gas: tx.gas_limit,
            used: options.block_gas_used,
            limit: block.gas_limit,
        });
    }

    if let Some(chain_id) = tx.chain_id {
        if chain_id != block.chain_id {
            return Err(InvalidTransaction::ChainIdMismatch {
                expected: block.chain_id,
                got: chain_id,
            }
            .into());
        }
    }

    if tx.max_fee() < block.base_fee {
        return Err(InvalidTransaction::FeeCapBelowBaseFee {
            max_fee: tx.max_fee(),
            base_fee: block.base_fee,
        }
        .into());
    }
    if tx.tx_type.is_dynamic_fee() && tx.max_priority_fee_per_gas > tx.max_fee_per_gas {
        return Err(InvalidTransaction::TipAboveFeeCap {
            tip: tx.max_priority_fee_per_gas,
            max_fee: tx.max_fee_per_gas,
        }
        .into());
    }

    if tx.is_create() {
        if tx.data.len() > MAX_INITCODE_SIZE {
            return Err(InvalidTransaction::InitCodeTooLarge {
                size: tx.data.len(),
                max: MAX_INITCODE_SIZE,
            }
            .into());
        }
        if matches!(tx.tx_type, TxType::Blob | TxType::SetCode) {
            return Err(InvalidTransaction::CreateNotAllowed.into());
        }
    }

    match tx.tx_type {
        TxType::Blob => {
            if tx.blob_versioned_hashes.is_empty() {
                return Err(InvalidTransaction::EmptyBlobs.into());
            }
            if tx.max_fee_per_blob_gas < block.blob_base_fee {
                return Err(InvalidTransaction::BlobFeeCapTooLow {
                    max_fee: tx.max_fee_per_blob_gas,
                    blob_gas_price: block.blob_base_fee,
                }
                .into());
            }
        }
        TxType::SetCode if tx.authorization_list.is_empty() => {
            return Err(InvalidTransaction::EmptyAuthorizationList.into());
        }
        _ => {}
    }

    Ok(intrinsic)
}

/// EIP-7702: install delegations. Invalid tuples are skipped, not fatal.
///
/// Runs after the sender nonce bump, so a self-sponsored authorization must
/// carry the bumped nonce. Returns the authorities to prewarm and the
/// refund owed for authorities that already existed.
fn apply_authorizations(
    state: &mut StateManager,
    block: &BlockEnv,
    tx: &Transaction,
) -> Result<(Vec<Address>, u64)> {
    let mut authorities = Vec::new();
    let mut refund = 0u64;

    for auth in &tx.authorization_list {
        if !auth.chain_id.is_zero() && auth.chain_id != U256::from(block.chain_id) {
            continue;
        }
        if auth.nonce == u64::MAX || auth.y_parity > 1 {
            continue;
        }
        let Ok(authority) = auth.authority() else {
            trace!("skipping authorization with bad signature");
            continue;
        };
        authorities.push(authority);

        let mut account = state.get_account(&authority)?;
        if account.code_hash != EMPTY_CODE_HASH {
            let code = state.get_code(&authority)?;
            if delegation_target(&code).is_none() {
                continue;
            }
        }
        if account.nonce != auth.nonce {
            continue;
        }

        if state.account_exists(&authority)? {
            refund += gas::costs::PER_EMPTY_ACCOUNT - gas::costs::PER_AUTH_BASE;
        }
        account.nonce += 1;
        state.put_account(authority, account);

        let code = if auth.address.is_zero() {
            Vec::new()
        } else {
            delegation_code(&auth.address)
        };
        state.put_code(authority, code)?;
        trace!(%authority, target = %auth.address, "delegation installed");
    }

    Ok((authorities, refund))
}
