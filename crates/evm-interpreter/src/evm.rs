//! # EVM Host
//!
//! [`Evm`] owns everything that outlives a single frame: the borrowed world
//! state, the substate journal and the block/transaction environment.
//!
//! Every call and create opens a state checkpoint and a journal checkpoint
//! together, and commits or reverts both together:
//!
//! ```text
//! run_call ──→ call / create ──→ checkpoint ──→ Interpreter::run
//!                   ↑                                │
//!                   └──── CALL* / CREATE* ←──────────┘
//!                                                    │
//!                      success → commit    exception → revert
//! ```
//!
//! Frames recurse on the native stack; the depth is bounded by the
//! 1024-frame call depth limit.

use crate::domain::address::{create2_address, create_address, delegation_target};
use crate::domain::gas::{costs, CALL_DEPTH_LIMIT, MAX_CODE_SIZE};
use crate::domain::{BlockEnv, CallKind, ExecResult, Journal, JournalCheckpoint, Message, TxEnv};
use crate::errors::{EvmError, ExceptionError};
use crate::interpreter::{FrameContext, Interpreter};
use crate::ports::BlockHashProvider;
use crate::precompiles::PrecompileRegistry;
use evm_state::StateManager;
use shared_types::{Account, Address, Bytes, Hash, U256, EMPTY_CODE_HASH};
use std::collections::HashMap;
use tracing::{debug, trace};

pub(crate) struct CallInputs {
    pub kind: CallKind,
    pub caller: Address,
    /// Account whose storage and balance the frame runs against.
    pub target: Address,
    /// Account whose code runs.
    pub code_address: Address,
    pub value: U256,
    pub input: Bytes,
    pub gas_limit: u64,
    pub depth: usize,
    pub is_static: bool,
}

pub(crate) enum CreateScheme {
    /// Derived from the caller's current nonce, which is then bumped.
    Create,
    Create2 { salt: U256 },
    /// Already derived by the caller (top-level creates).
    Fixed(Address),
}

pub(crate) struct CreateInputs {
    pub caller: Address,
    pub scheme: CreateScheme,
    pub value: U256,
    pub init_code: Bytes,
    pub gas_limit: u64,
    pub depth: usize,
}

/// What a finished frame hands back to its parent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct FrameOutcome {
    pub exception: Option<ExceptionError>,
    pub gas_left: u64,
    pub output: Bytes,
    pub created: Option<Address>,
}

impl FrameOutcome {
    pub fn success(gas_left: u64, output: Bytes) -> Self {
        Self {
            exception: None,
            gas_left,
            output,
            created: None,
        }
    }

    pub fn revert(gas_left: u64, output: Bytes) -> Self {
        Self {
            exception: Some(ExceptionError::Revert),
            gas_left,
            output,
            created: None,
        }
    }

    /// Exceptional halt; all gas is consumed.
    pub fn halted(error: ExceptionError) -> Self {
        Self {
            exception: Some(error),
            gas_left: 0,
            output: Bytes::new(),
            created: None,
        }
    }

    /// Refused before the frame started; the caller keeps all gas.
    fn rejected(error: ExceptionError, gas_limit: u64) -> Self {
        Self {
            exception: Some(error),
            gas_left: gas_limit,
            output: Bytes::new(),
            created: None,
        }
    }
}

/// Executes messages against a [`StateManager`] for one transaction.
pub struct Evm<'a> {
    pub(crate) state: &'a mut StateManager,
    pub(crate) block_hashes: &'a dyn BlockHashProvider,
    pub(crate) precompiles: &'a PrecompileRegistry,
    pub(crate) block: &'a BlockEnv,
    pub(crate) tx: TxEnv,
    pub(crate) journal: Journal,
    /// Slot values at the start of the transaction, recorded on first write.
    pub(crate) original_storage: HashMap<(Address, U256), U256>,
}

impl<'a> Evm<'a> {
    pub fn new(
        state: &'a mut StateManager,
        block_hashes: &'a dyn BlockHashProvider,
        precompiles: &'a PrecompileRegistry,
        block: &'a BlockEnv,
        tx: TxEnv,
    ) -> Self {
        Self {
            state,
            block_hashes,
            precompiles,
            block,
            tx,
            journal: Journal::new(),
            original_storage: HashMap::new(),
        }
    }

    #[must_use]
    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    /// Prewarm accounts and slots before [`Evm::run_call`].
    pub fn journal_mut(&mut self) -> &mut Journal {
        &mut self.journal
    }

    /// Precompiles are warm from the start of every transaction.
    pub fn warm_precompiles(&mut self) {
        let registry = self.precompiles;
        for address in registry.addresses() {
            self.journal.warm_account(*address);
        }
    }

    /// Execute a top-level message.
    ///
    /// Exceptions land in [`ExecResult::exception`]; only state backend
    /// failures are returned as `Err`. A create message expects the caller's
    /// nonce to be bumped already.
    ///
    /// # Errors
    ///
    /// [`EvmError::State`] when the state backend fails.
    pub fn run_call(&mut self, message: Message) -> Result<ExecResult, EvmError> {
        let gas_limit = message.gas_limit;
        debug!(
            caller = %message.caller,
            to = ?message.to,
            value = %message.value,
            gas_limit,
            "running message"
        );

        let outcome = match message.to {
            Some(target) => {
                let kind = if message.is_static {
                    CallKind::StaticCall
                } else if message.delegatecall {
                    CallKind::DelegateCall
                } else {
                    CallKind::Call
                };
                self.call(CallInputs {
                    kind,
                    caller: message.caller,
                    target,
                    code_address: target,
                    value: message.value,
                    input: message.data,
                    gas_limit,
                    depth: message.depth,
                    is_static: message.is_static,
                })?
            }
            None => {
                let address = match message.salt {
                    Some(salt) => {
                        create2_address(&message.caller, salt, &Hash::keccak(&message.data))
                    }
                    None => {
                        let nonce = self.state.get_account(&message.caller)?.nonce;
                        create_address(&message.caller, nonce.saturating_sub(1))
                    }
                };
                self.create(CreateInputs {
                    caller: message.caller,
                    scheme: CreateScheme::Fixed(address),
                    value: message.value,
                    init_code: message.data,
                    gas_limit,
                    depth: message.depth,
                })?
            }
        };

        let success = outcome.exception.is_none();
        let result = ExecResult {
            gas_used: gas_limit.saturating_sub(outcome.gas_left),
            gas_refund: if success { self.journal.refund() } else { 0 },
            return_data: outcome.output,
            logs: if success {
                self.journal.take_logs()
            } else {
                Vec::new()
            },
            created_address: outcome.created,
            created_addresses: if success {
                self.journal.created().clone()
            } else {
                Default::default()
            },
            selfdestructs: if success {
                self.journal.selfdestructs().clone()
            } else {
                Default::default()
            },
            exception: outcome.exception,
        };
        debug!(
            gas_used = result.gas_used,
            success,
            exception = ?result.exception,
            "message finished"
        );
        Ok(result)
    }

    // =========================================================================
    // FRAMES
    // =========================================================================

    fn checkpoint(&mut self) -> JournalCheckpoint {
        self.state.checkpoint();
        self.journal.checkpoint()
    }

    fn finish(
        &mut self,
        checkpoint: JournalCheckpoint,
        outcome: Result<FrameOutcome, EvmError>,
    ) -> Result<FrameOutcome, EvmError> {
        match outcome {
            Ok(outcome) if outcome.exception.is_none() => {
                self.state.commit()?;
                Ok(outcome)
            }
            Ok(outcome) => {
                self.state.revert()?;
                self.journal.revert(checkpoint);
                Ok(outcome)
            }
            Err(err) => {
                self.state.revert()?;
                self.journal.revert(checkpoint);
                Err(err)
            }
        }
    }

    pub(crate) fn call(&mut self, inputs: CallInputs) -> Result<FrameOutcome, EvmError> {
        if inputs.depth > CALL_DEPTH_LIMIT {
            return Ok(FrameOutcome::rejected(
                ExceptionError::CallDepthExceeded,
                inputs.gas_limit,
            ));
        }
        let transfers = matches!(inputs.kind, CallKind::Call | CallKind::CallCode);
        if transfers
            && !inputs.value.is_zero()
            && self.state.get_account(&inputs.caller)?.balance < inputs.value
        {
            return Ok(FrameOutcome::rejected(
                ExceptionError::InsufficientBalance,
                inputs.gas_limit,
            ));
        }

        let checkpoint = self.checkpoint();
        let outcome = self.execute_call(inputs, transfers);
        self.finish(checkpoint, outcome)
    }

    fn execute_call(
        &mut self,
        inputs: CallInputs,
        transfers: bool,
    ) -> Result<FrameOutcome, EvmError> {
        if transfers {
            self.transfer(inputs.caller, inputs.target, inputs.value)?;
        }
        self.state.touch(inputs.target);

        let registry = self.precompiles;
        if let Some(precompile) = registry.get(&inputs.code_address) {
            trace!(address = %inputs.code_address, "precompile");
            return Ok(match precompile.run(&inputs.input, inputs.gas_limit) {
                Ok(out) => {
                    FrameOutcome::success(inputs.gas_limit.saturating_sub(out.gas_used), out.output)
                }
                Err(err) => FrameOutcome::halted(err.into()),
            });
        }

        let code = self.load_code(&inputs.code_address)?;
        if code.is_empty() {
            return Ok(FrameOutcome::success(inputs.gas_limit, Bytes::new()));
        }

        let context = FrameContext {
            address: inputs.target,
            caller: inputs.caller,
            value: inputs.value,
            input: inputs.input,
            is_static: inputs.is_static,
            depth: inputs.depth,
        };
        Interpreter::new(context, code, inputs.gas_limit).run(self)
    }

    pub(crate) fn create(&mut self, inputs: CreateInputs) -> Result<FrameOutcome, EvmError> {
        if inputs.depth > CALL_DEPTH_LIMIT {
            return Ok(FrameOutcome::rejected(
                ExceptionError::CallDepthExceeded,
                inputs.gas_limit,
            ));
        }
        let caller = self.state.get_account(&inputs.caller)?;
        if caller.balance < inputs.value {
            return Ok(FrameOutcome::rejected(
                ExceptionError::InsufficientBalance,
                inputs.gas_limit,
            ));
        }

        let address = match inputs.scheme {
            CreateScheme::Fixed(address) => address,
            ref scheme => {
                let Some(next_nonce) = caller.nonce.checked_add(1) else {
                    return Ok(FrameOutcome::rejected(
                        ExceptionError::NonceOverflow,
                        inputs.gas_limit,
                    ));
                };
                self.state.put_account(
                    inputs.caller,
                    Account {
                        nonce: next_nonce,
                        ..caller
                    },
                );
                match scheme {
                    CreateScheme::Create2 { salt } => {
                        create2_address(&inputs.caller, *salt, &Hash::keccak(&inputs.init_code))
                    }
                    _ => create_address(&inputs.caller, caller.nonce),
                }
            }
        };
        self.journal.warm_account(address);

        let checkpoint = self.checkpoint();
        let outcome = self.execute_create(inputs, address);
        self.finish(checkpoint, outcome)
    }

    fn execute_create(
        &mut self,
        inputs: CreateInputs,
        address: Address,
    ) -> Result<FrameOutcome, EvmError> {
        let existing = self.state.get_account(&address)?;
        if existing.nonce != 0 || existing.code_hash != EMPTY_CODE_HASH {
            debug!(%address, "create collision");
            return Ok(FrameOutcome::halted(ExceptionError::CreateCollision));
        }
        self.state.put_account(
            address,
            Account {
                nonce: 1,
                ..existing
            },
        );
        self.journal.mark_created(address);
        self.transfer(inputs.caller, address, inputs.value)?;

        let context = FrameContext {
            address,
            caller: inputs.caller,
            value: inputs.value,
            input: Bytes::new(),
            is_static: false,
            depth: inputs.depth,
        };
        let outcome = Interpreter::new(context, inputs.init_code, inputs.gas_limit).run(self)?;
        if outcome.exception.is_some() {
            return Ok(outcome);
        }

        let code = outcome.output;
        if code.len() > MAX_CODE_SIZE {
            return Ok(FrameOutcome::halted(ExceptionError::CodeSizeExceeded));
        }
        if code.first() == Some(&0xEF) {
            return Ok(FrameOutcome::halted(ExceptionError::InvalidCodePrefix));
        }
        let deposit = costs::CODE_DEPOSIT * code.len() as u64;
        let Some(gas_left) = outcome.gas_left.checked_sub(deposit) else {
            return Ok(FrameOutcome::halted(ExceptionError::CodeStoreOutOfGas));
        };
        self.state.put_code(address, code.clone())?;
        trace!(%address, code_len = code.len(), "contract deployed");

        Ok(FrameOutcome {
            exception: None,
            gas_left,
            output: code,
            created: Some(address),
        })
    }

    // =========================================================================
    // ACCOUNT HELPERS
    // =========================================================================

    /// Code to execute for `address`, following an EIP-7702 delegation.
    pub(crate) fn load_code(&self, address: &Address) -> Result<Bytes, EvmError> {
        let code = self.state.get_code(address)?;
        match delegation_target(&code) {
            Some(delegate) => Ok(self.state.get_code(&delegate)?),
            None => Ok(code),
        }
    }

    /// Move `value` between accounts. The caller has checked the balance.
    pub(crate) fn transfer(
        &mut self,
        from: Address,
        to: Address,
        value: U256,
    ) -> Result<(), EvmError> {
        if value.is_zero() || from == to {
            return Ok(());
        }
        let mut sender = self.state.get_account(&from)?;
        sender.balance = sender.balance.saturating_sub(value);
        self.state.put_account(from, sender);

        let mut recipient = self.state.get_account(&to)?;
        recipient.balance = recipient.balance.saturating_add(value);
        self.state.put_account(to, recipient);
        Ok(())
    }

    /// SELFDESTRUCT under EIP-6780: the balance always moves to the
    /// beneficiary; only accounts created in this transaction are marked
    /// for deletion.
    pub(crate) fn selfdestruct(
        &mut self,
        address: Address,
        beneficiary: Address,
    ) -> Result<(), EvmError> {
        let account = self.state.get_account(&address)?;
        if beneficiary != address {
            self.transfer(address, beneficiary, account.balance)?;
            self.state.touch(beneficiary);
        } else if self.journal.is_created(&address) {
            self.state.put_account(
                address,
                Account {
                    balance: U256::zero(),
                    ..account
                },
            );
        }
        self.journal.mark_selfdestruct(address);
        Ok(())
    }

    /// Value a slot had when the transaction started.
    pub(crate) fn original_value(&mut self, address: Address, key: U256, current: U256) -> U256 {
        *self.original_storage.entry((address, key)).or_insert(current)
    }
}
