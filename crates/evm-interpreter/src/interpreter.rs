//! # Frame Interpreter
//!
//! Fetch-decode-execute loop for one call or create frame. The static cost
//! of every opcode is charged from [`OPCODE_GAS`] before it runs; dynamic
//! costs (memory expansion, cold access, copies) are charged by the opcode
//! itself.

use crate::domain::address::delegation_target;
use crate::domain::gas::{self, costs, Gas, MAX_INITCODE_SIZE, OPCODE_GAS};
use crate::domain::memory::memory_expansion_cost;
use crate::domain::opcodes::analyze_jump_dests;
use crate::domain::{CallKind, Memory, Opcode, Stack};
use crate::errors::{EvmError, ExceptionError, Interrupt};
use crate::evm::{CallInputs, CreateInputs, CreateScheme, Evm, FrameOutcome};
use primitive_types::U512;
use shared_types::primitives::u256_to_be;
use shared_types::{Address, Bytes, Hash, Log, U256};
use tracing::trace;

/// Memory offsets and sizes above this always run out of gas.
const MAX_MEMORY_ARG: u64 = u32::MAX as u64;

pub(crate) struct FrameContext {
    pub address: Address,
    pub caller: Address,
    /// Apparent value (CALLVALUE).
    pub value: U256,
    pub input: Bytes,
    pub is_static: bool,
    pub depth: usize,
}

enum Control {
    Continue,
    Return(Bytes),
    Revert(Bytes),
}

pub(crate) struct Interpreter {
    ctx: FrameContext,
    code: Bytes,
    jump_dests: Vec<bool>,
    pc: usize,
    stack: Stack,
    memory: Memory,
    gas: Gas,
    /// Output of the most recent sub-call.
    return_data: Bytes,
    steps: u64,
}

impl Interpreter {
    pub fn new(ctx: FrameContext, code: Bytes, gas_limit: u64) -> Self {
        let jump_dests = analyze_jump_dests(&code);
        Self {
            ctx,
            code,
            jump_dests,
            pc: 0,
            stack: Stack::new(),
            memory: Memory::new(),
            gas: Gas::new(gas_limit),
            return_data: Bytes::new(),
            steps: 0,
        }
    }

    /// Run to completion. Exceptions become part of the outcome; host
    /// errors abort every frame.
    pub fn run(mut self, evm: &mut Evm<'_>) -> Result<FrameOutcome, EvmError> {
        trace!(
            depth = self.ctx.depth,
            address = %self.ctx.address,
            gas_limit = self.gas.limit(),
            "frame entered"
        );
        let outcome = loop {
            match self.step(evm) {
                Ok(Control::Continue) => {}
                Ok(Control::Return(output)) => {
                    break FrameOutcome::success(self.gas.remaining(), output)
                }
                Ok(Control::Revert(output)) => {
                    break FrameOutcome::revert(self.gas.remaining(), output)
                }
                Err(Interrupt::Exception(err)) => break FrameOutcome::halted(err),
                Err(Interrupt::Host(err)) => return Err(err),
            }
        };
        trace!(
            depth = self.ctx.depth,
            steps = self.steps,
            gas_left = outcome.gas_left,
            exception = ?outcome.exception,
            "frame exited"
        );
        Ok(outcome)
    }

    fn step(&mut self, evm: &mut Evm<'_>) -> Result<Control, Interrupt> {
        let Some(&byte) = self.code.get(self.pc) else {
            return Ok(Control::Return(Bytes::new()));
        };
        let opcode = Opcode::from_byte(byte).ok_or(ExceptionError::InvalidOpcode(byte))?;
        self.charge(OPCODE_GAS[usize::from(byte)])?;
        self.steps += 1;
        self.pc += 1;
        self.execute(opcode, evm)
    }

    // =========================================================================
    // HELPERS
    // =========================================================================

    fn charge(&mut self, amount: u64) -> Result<(), Interrupt> {
        if self.gas.charge(amount) {
            Ok(())
        } else {
            Err(ExceptionError::OutOfGas.into())
        }
    }

    fn require_non_static(&self) -> Result<(), Interrupt> {
        if self.ctx.is_static {
            Err(ExceptionError::StaticStateChange.into())
        } else {
            Ok(())
        }
    }

    /// Charge expansion for `[offset, offset + len)` and grow memory.
    /// A zero length touches nothing, whatever the offset.
    fn memory_region(&mut self, offset: U256, len: U256) -> Result<(usize, usize), Interrupt> {
        if len.is_zero() {
            return Ok((0, 0));
        }
        let max = U256::from(MAX_MEMORY_ARG);
        if offset > max || len > max {
            return Err(ExceptionError::OutOfGas.into());
        }
        let (offset, len) = (offset.low_u64() as usize, len.low_u64() as usize);
        let end = offset + len;
        let new_words = end.div_ceil(32) as u64;
        let cost = memory_expansion_cost(self.memory.word_size() as u64, new_words);
        self.charge(cost)?;
        self.memory.resize(end);
        Ok((offset, len))
    }

    /// EIP-2929 account access surcharge.
    fn access_account(&mut self, evm: &mut Evm<'_>, address: Address) -> Result<(), Interrupt> {
        let cold = evm.journal.warm_account(address);
        self.charge(gas::account_access_cost(cold))
    }

    fn jump(&mut self, dest: U256) -> Result<(), Interrupt> {
        let target = to_usize(dest).unwrap_or(usize::MAX);
        if !self.jump_dests.get(target).copied().unwrap_or(false) {
            return Err(ExceptionError::InvalidJump.into());
        }
        self.pc = target;
        Ok(())
    }

    fn push_address(&mut self, address: &Address) -> Result<(), Interrupt> {
        Ok(self.stack.push(address.to_word())?)
    }

    // =========================================================================
    // DISPATCH
    // =========================================================================

    fn execute(&mut self, opcode: Opcode, evm: &mut Evm<'_>) -> Result<Control, Interrupt> {
        match opcode {
            // =================================================================
            // STOP & ARITHMETIC
            // =================================================================
            Opcode::Stop => return Ok(Control::Return(Bytes::new())),

            Opcode::Add => {
                let [a, b] = self.stack.pop_n()?;
                self.stack.push(a.overflowing_add(b).0)?;
            }

            Opcode::Mul => {
                let [a, b] = self.stack.pop_n()?;
                self.stack.push(a.overflowing_mul(b).0)?;
            }

            Opcode::Sub => {
                let [a, b] = self.stack.pop_n()?;
                self.stack.push(a.overflowing_sub(b).0)?;
            }

            Opcode::Div => {
                let [a, b] = self.stack.pop_n()?;
                self.stack
                    .push(if b.is_zero() { U256::zero() } else { a / b })?;
            }

            Opcode::SDiv => {
                let [a, b] = self.stack.pop_n()?;
                self.stack.push(signed_div(a, b))?;
            }

            Opcode::Mod => {
                let [a, b] = self.stack.pop_n()?;
                self.stack
                    .push(if b.is_zero() { U256::zero() } else { a % b })?;
            }

            Opcode::SMod => {
                let [a, b] = self.stack.pop_n()?;
                self.stack.push(signed_mod(a, b))?;
            }

            Opcode::AddMod => {
                let [a, b, n] = self.stack.pop_n()?;
                let result = if n.is_zero() {
                    U256::zero()
                } else {
                    narrow((U512::from(a) + U512::from(b)) % U512::from(n))
                };
                self.stack.push(result)?;
            }

            Opcode::MulMod => {
                let [a, b, n] = self.stack.pop_n()?;
                let result = if n.is_zero() {
                    U256::zero()
                } else {
                    narrow((U512::from(a) * U512::from(b)) % U512::from(n))
                };
                self.stack.push(result)?;
            }

            Opcode::Exp => {
                let [base, exponent] = self.stack.pop_n()?;
                self.charge(gas::exp_cost(exponent) - costs::EXP)?;
                self.stack.push(exp_by_squaring(base, exponent))?;
            }

            Opcode::SignExtend => {
                let [k, x] = self.stack.pop_n()?;
                self.stack.push(sign_extend(k, x))?;
            }

            // =================================================================
            // COMPARISON & BITWISE
            // =================================================================
            Opcode::Lt => {
                let [a, b] = self.stack.pop_n()?;
                self.stack.push_bool(a < b)?;
            }

            Opcode::Gt => {
                let [a, b] = self.stack.pop_n()?;
                self.stack.push_bool(a > b)?;
            }

            Opcode::SLt => {
                let [a, b] = self.stack.pop_n()?;
                self.stack.push_bool(signed_lt(a, b))?;
            }

            Opcode::SGt => {
                let [a, b] = self.stack.pop_n()?;
                self.stack.push_bool(signed_lt(b, a))?;
            }

            Opcode::Eq => {
                let [a, b] = self.stack.pop_n()?;
                self.stack.push_bool(a == b)?;
            }

            Opcode::IsZero => {
                let a = self.stack.pop()?;
                self.stack.push_bool(a.is_zero())?;
            }

            Opcode::And => {
                let [a, b] = self.stack.pop_n()?;
                self.stack.push(a & b)?;
            }

            Opcode::Or => {
                let [a, b] = self.stack.pop_n()?;
                self.stack.push(a | b)?;
            }

            Opcode::Xor => {
                let [a, b] = self.stack.pop_n()?;
                self.stack.push(a ^ b)?;
            }

            Opcode::Not => {
                let a = self.stack.pop()?;
                self.stack.push(!a)?;
            }

            Opcode::Byte => {
                let [i, x] = self.stack.pop_n()?;
                let result = if i < U256::from(32) {
                    U256::from(x.byte(31 - i.low_u64() as usize))
                } else {
                    U256::zero()
                };
                self.stack.push(result)?;
            }

            Opcode::Shl => {
                let [shift, value] = self.stack.pop_n()?;
                let result = if shift < U256::from(256) {
                    value << shift.low_u64() as usize
                } else {
                    U256::zero()
                };
                self.stack.push(result)?;
            }

            Opcode::Shr => {
                let [shift, value] = self.stack.pop_n()?;
                let result = if shift < U256::from(256) {
                    value >> shift.low_u64() as usize
                } else {
                    U256::zero()
                };
                self.stack.push(result)?;
            }

            Opcode::Sar => {
                let [shift, value] = self.stack.pop_n()?;
                self.stack.push(sar(value, shift))?;
            }

            Opcode::Keccak256 => {
                let [offset, len] = self.stack.pop_n()?;
                let (offset, len) = self.memory_region(offset, len)?;
                self.charge(gas::keccak256_word_cost(len))?;
                let hash = Hash::keccak(self.memory.slice(offset, len));
                self.stack.push(hash.to_u256())?;
            }

            // =================================================================
            // ENVIRONMENT
            // =================================================================
            Opcode::Address => {
                let address = self.ctx.address;
                self.push_address(&address)?;
            }

            Opcode::Balance => {
                let address = Address::from_word(self.stack.pop()?);
                self.access_account(evm, address)?;
                let balance = evm.state.get_account(&address)?.balance;
                self.stack.push(balance)?;
            }

            Opcode::Origin => {
                let origin = evm.tx.origin;
                self.push_address(&origin)?;
            }

            Opcode::Caller => {
                let caller = self.ctx.caller;
                self.push_address(&caller)?;
            }

            Opcode::CallValue => self.stack.push(self.ctx.value)?,

            Opcode::CallDataLoad => {
                let offset = self.stack.pop()?;
                self.stack.push(padded_word(&self.ctx.input, offset))?;
            }

            Opcode::CallDataSize => self.stack.push(U256::from(self.ctx.input.len()))?,

            Opcode::CallDataCopy => {
                let [dest, offset, len] = self.stack.pop_n()?;
                let (dest, len) = self.memory_region(dest, len)?;
                self.charge(gas::copy_cost(len))?;
                if len > 0 {
                    self.memory
                        .write_padded(dest, &self.ctx.input, saturate(offset), len);
                }
            }

            Opcode::CodeSize => self.stack.push(U256::from(self.code.len()))?,

            Opcode::CodeCopy => {
                let [dest, offset, len] = self.stack.pop_n()?;
                let (dest, len) = self.memory_region(dest, len)?;
                self.charge(gas::copy_cost(len))?;
                if len > 0 {
                    self.memory
                        .write_padded(dest, &self.code, saturate(offset), len);
                }
            }

            Opcode::GasPrice => self.stack.push(evm.tx.gas_price)?,

            Opcode::ExtCodeSize => {
                let address = Address::from_word(self.stack.pop()?);
                self.access_account(evm, address)?;
                let len = evm.state.get_code(&address)?.len();
                self.stack.push(U256::from(len))?;
            }

            Opcode::ExtCodeCopy => {
                let address = Address::from_word(self.stack.pop()?);
                let [dest, offset, len] = self.stack.pop_n()?;
                self.access_account(evm, address)?;
                let (dest, len) = self.memory_region(dest, len)?;
                self.charge(gas::copy_cost(len))?;
                if len > 0 {
                    let code = evm.state.get_code(&address)?;
                    self.memory.write_padded(dest, &code, saturate(offset), len);
                }
            }

            Opcode::ReturnDataSize => self.stack.push(U256::from(self.return_data.len()))?,

            Opcode::ReturnDataCopy => {
                let [dest, offset, len] = self.stack.pop_n()?;
                let end = offset.checked_add(len);
                if end.map_or(true, |end| end > U256::from(self.return_data.len())) {
                    return Err(ExceptionError::ReturnDataOutOfBounds.into());
                }
                let (dest, len) = self.memory_region(dest, len)?;
                self.charge(gas::copy_cost(len))?;
                if len > 0 {
                    let offset = offset.low_u64() as usize;
                    self.memory
                        .write(dest, &self.return_data[offset..offset + len]);
                }
            }

            Opcode::ExtCodeHash => {
                let address = Address::from_word(self.stack.pop()?);
                self.access_account(evm, address)?;
                let hash = if evm.state.is_empty(&address)? {
                    U256::zero()
                } else {
                    evm.state.get_account(&address)?.code_hash.to_u256()
                };
                self.stack.push(hash)?;
            }

            // =================================================================
            // BLOCK
            // =================================================================
            Opcode::BlockHash => {
                let number = self.stack.pop()?;
                let current = evm.block.number;
                let hash = if number < U256::from(current) && current - number.low_u64() <= 256
                {
                    evm.block_hashes
                        .block_hash(number.low_u64())
                        .map(|hash| hash.to_u256())
                        .unwrap_or_default()
                } else {
                    U256::zero()
                };
                self.stack.push(hash)?;
            }

            Opcode::Coinbase => {
                let coinbase = evm.block.coinbase;
                self.push_address(&coinbase)?;
            }

            Opcode::Timestamp => self.stack.push(U256::from(evm.block.timestamp))?,
            Opcode::Number => self.stack.push(U256::from(evm.block.number))?,
            Opcode::PrevRandao => self.stack.push(evm.block.prev_randao.to_u256())?,
            Opcode::GasLimit => self.stack.push(U256::from(evm.block.gas_limit))?,
            Opcode::ChainId => self.stack.push(U256::from(evm.block.chain_id))?,

            Opcode::SelfBalance => {
                let balance = evm.state.get_account(&self.ctx.address)?.balance;
                self.stack.push(balance)?;
            }

            Opcode::BaseFee => self.stack.push(evm.block.base_fee)?,

            Opcode::BlobHash => {
                let index = self.stack.pop()?;
                let hash = to_usize(index)
                    .and_then(|i| evm.tx.blob_hashes.get(i))
                    .map(Hash::to_u256)
                    .unwrap_or_default();
                self.stack.push(hash)?;
            }

            Opcode::BlobBaseFee => self.stack.push(evm.block.blob_base_fee)?,

            // =================================================================
            // STACK, MEMORY, STORAGE, FLOW
            // =================================================================
            Opcode::Pop => {
                self.stack.pop()?;
            }

            Opcode::MLoad => {
                let offset = self.stack.pop()?;
                let (offset, _) = self.memory_region(offset, U256::from(32))?;
                let word = self.memory.read_word(offset);
                self.stack.push(U256::from_big_endian(&word))?;
            }

            Opcode::MStore => {
                let [offset, value] = self.stack.pop_n()?;
                let (offset, _) = self.memory_region(offset, U256::from(32))?;
                self.memory.write(offset, &u256_to_be(value));
            }

            Opcode::MStore8 => {
                let [offset, value] = self.stack.pop_n()?;
                let (offset, _) = self.memory_region(offset, U256::one())?;
                self.memory.write_byte(offset, value.byte(0));
            }

            Opcode::SLoad => {
                let key = self.stack.pop()?;
                let cold = evm.journal.warm_slot(self.ctx.address, key);
                self.charge(if cold {
                    costs::COLD_SLOAD
                } else {
                    costs::WARM_STORAGE_READ
                })?;
                let value = evm.state.get_storage(&self.ctx.address, &key)?;
                self.stack.push(value)?;
            }

            Opcode::SStore => self.sstore(evm)?,

            Opcode::Jump => {
                let dest = self.stack.pop()?;
                self.jump(dest)?;
            }

            Opcode::JumpI => {
                let [dest, condition] = self.stack.pop_n()?;
                if !condition.is_zero() {
                    self.jump(dest)?;
                }
            }

            Opcode::Pc => self.stack.push(U256::from(self.pc - 1))?,
            Opcode::MSize => self.stack.push(U256::from(self.memory.len()))?,
            Opcode::Gas => self.stack.push(U256::from(self.gas.remaining()))?,
            Opcode::JumpDest => {}

            Opcode::TLoad => {
                let key = self.stack.pop()?;
                let value = evm.journal.tload(&self.ctx.address, &key);
                self.stack.push(value)?;
            }

            Opcode::TStore => {
                self.require_non_static()?;
                let [key, value] = self.stack.pop_n()?;
                evm.journal.tstore(self.ctx.address, key, value);
            }

            Opcode::MCopy => {
                let [dest, src, len] = self.stack.pop_n()?;
                if !len.is_zero() {
                    let (src, len) = self.memory_region(src, len)?;
                    let (dest, _) = self.memory_region(dest, U256::from(len))?;
                    self.charge(gas::copy_cost(len))?;
                    self.memory.copy_within(dest, src, len);
                }
            }

            Opcode::Push(0) => self.stack.push(U256::zero())?,

            Opcode::Push(n) => {
                let n = usize::from(n);
                let start = self.pc.min(self.code.len());
                let end = (self.pc + n).min(self.code.len());
                let mut word = [0u8; 32];
                let immediate = &self.code[start..end];
                word[32 - n..32 - n + immediate.len()].copy_from_slice(immediate);
                self.stack.push(U256::from_big_endian(&word))?;
                self.pc += n;
            }

            Opcode::Dup(n) => self.stack.dup(usize::from(n))?,
            Opcode::Swap(n) => self.stack.swap(usize::from(n))?,

            Opcode::Log(topic_count) => {
                self.require_non_static()?;
                let [offset, len] = self.stack.pop_n()?;
                let mut topics = Vec::with_capacity(usize::from(topic_count));
                for _ in 0..topic_count {
                    topics.push(Hash::from_u256(self.stack.pop()?));
                }
                let (offset, len) = self.memory_region(offset, len)?;
                self.charge(gas::log_cost(len, topics.len()))?;
                evm.journal.log(Log {
                    address: self.ctx.address,
                    topics,
                    data: self.memory.slice(offset, len).to_vec(),
                });
            }

            // =================================================================
            // SYSTEM
            // =================================================================
            Opcode::Create => self.create(evm, false)?,
            Opcode::Create2 => self.create(evm, true)?,

            Opcode::Call => self.call(evm, CallKind::Call)?,
            Opcode::CallCode => self.call(evm, CallKind::CallCode)?,
            Opcode::DelegateCall => self.call(evm, CallKind::DelegateCall)?,
            Opcode::StaticCall => self.call(evm, CallKind::StaticCall)?,

            Opcode::Return => {
                let [offset, len] = self.stack.pop_n()?;
                let (offset, len) = self.memory_region(offset, len)?;
                return Ok(Control::Return(self.memory.slice(offset, len).to_vec()));
            }

            Opcode::Revert => {
                let [offset, len] = self.stack.pop_n()?;
                let (offset, len) = self.memory_region(offset, len)?;
                return Ok(Control::Revert(self.memory.slice(offset, len).to_vec()));
            }

            Opcode::Invalid => return Err(ExceptionError::InvalidOpcode(0xFE).into()),

            Opcode::SelfDestruct => {
                self.require_non_static()?;
                let beneficiary = Address::from_word(self.stack.pop()?);
                if evm.journal.warm_account(beneficiary) {
                    self.charge(costs::COLD_ACCOUNT_ACCESS)?;
                }
                let balance = evm.state.get_account(&self.ctx.address)?.balance;
                if !balance.is_zero() && evm.state.is_empty(&beneficiary)? {
                    self.charge(costs::NEW_ACCOUNT)?;
                }
                evm.selfdestruct(self.ctx.address, beneficiary)?;
                return Ok(Control::Return(Bytes::new()));
            }
        }
        Ok(Control::Continue)
    }

    // =========================================================================
    // STATE-CHANGING OPCODES
    // =========================================================================

    fn sstore(&mut self, evm: &mut Evm<'_>) -> Result<(), Interrupt> {
        self.require_non_static()?;
        let [key, value] = self.stack.pop_n()?;
        if self.gas.remaining() <= costs::SSTORE_SENTRY {
            return Err(ExceptionError::OutOfGas.into());
        }
        let address = self.ctx.address;
        if evm.journal.warm_slot(address, key) {
            self.charge(costs::COLD_SLOAD)?;
        }
        let current = evm.state.get_storage(&address, &key)?;
        let original = evm.original_value(address, key, current);
        let (cost, refund) = gas::sstore_cost(original, current, value);
        self.charge(cost)?;
        evm.journal.add_refund(refund);
        evm.state.put_storage(address, key, value);
        Ok(())
    }

    fn create(&mut self, evm: &mut Evm<'_>, create2: bool) -> Result<(), Interrupt> {
        self.require_non_static()?;
        let [value, offset, len] = self.stack.pop_n()?;
        let scheme = if create2 {
            CreateScheme::Create2 {
                salt: self.stack.pop()?,
            }
        } else {
            CreateScheme::Create
        };
        let (offset, len) = self.memory_region(offset, len)?;
        if len > MAX_INITCODE_SIZE {
            return Err(ExceptionError::InitCodeSizeExceeded.into());
        }
        self.charge(gas::create_cost(len, create2))?;

        let init_code = self.memory.slice(offset, len).to_vec();
        let gas_limit = gas::max_call_gas(self.gas.remaining());
        self.charge(gas_limit)?;
        self.return_data.clear();

        let outcome = evm.create(CreateInputs {
            caller: self.ctx.address,
            scheme,
            value,
            init_code,
            gas_limit,
            depth: self.ctx.depth + 1,
        })?;
        self.gas.reimburse(outcome.gas_left);

        if outcome.exception == Some(ExceptionError::Revert) {
            self.return_data = outcome.output;
        }
        match outcome.created {
            Some(address) => self.push_address(&address),
            None => Ok(self.stack.push(U256::zero())?),
        }
    }

    fn call(&mut self, evm: &mut Evm<'_>, kind: CallKind) -> Result<(), Interrupt> {
        let requested = self.stack.pop()?;
        let target = Address::from_word(self.stack.pop()?);
        let value = match kind {
            CallKind::Call | CallKind::CallCode => self.stack.pop()?,
            CallKind::DelegateCall | CallKind::StaticCall => U256::zero(),
        };
        let [in_offset, in_len, out_offset, out_len] = self.stack.pop_n()?;
        if kind == CallKind::Call && self.ctx.is_static && !value.is_zero() {
            return Err(ExceptionError::StaticStateChange.into());
        }

        let (in_offset, in_len) = self.memory_region(in_offset, in_len)?;
        let (out_offset, out_len) = self.memory_region(out_offset, out_len)?;

        let transfers_value = !value.is_zero();
        let mut cost = gas::call_cost(&gas::CallCost {
            is_cold: evm.journal.warm_account(target),
            transfers_value,
            creates_account: kind == CallKind::Call
                && transfers_value
                && evm.state.is_empty(&target)?,
        });
        if let Some(delegate) = delegation_target(&evm.state.get_code(&target)?) {
            cost += gas::account_access_cost(evm.journal.warm_account(delegate));
        }
        self.charge(cost)?;

        let mut gas_limit = gas::call_gas(self.gas.remaining(), requested);
        self.charge(gas_limit)?;
        if transfers_value {
            gas_limit += costs::CALL_STIPEND;
        }

        let (caller, frame_target, frame_value) = match kind {
            CallKind::Call | CallKind::StaticCall => (self.ctx.address, target, value),
            CallKind::CallCode => (self.ctx.address, self.ctx.address, value),
            CallKind::DelegateCall => (self.ctx.caller, self.ctx.address, self.ctx.value),
        };
        let outcome = evm.call(CallInputs {
            kind,
            caller,
            target: frame_target,
            code_address: target,
            value: frame_value,
            input: self.memory.slice(in_offset, in_len).to_vec(),
            gas_limit,
            depth: self.ctx.depth + 1,
            is_static: self.ctx.is_static || kind == CallKind::StaticCall,
        })?;
        self.gas.reimburse(outcome.gas_left);

        let copy = out_len.min(outcome.output.len());
        if copy > 0 {
            self.memory.write(out_offset, &outcome.output[..copy]);
        }
        self.return_data = outcome.output;
        Ok(self.stack.push_bool(outcome.exception.is_none())?)
    }
}

// =============================================================================
// WORD ARITHMETIC
// =============================================================================

fn to_usize(value: U256) -> Option<usize> {
    if value.bits() > 64 {
        return None;
    }
    usize::try_from(value.low_u64()).ok()
}

fn saturate(value: U256) -> usize {
    to_usize(value).unwrap_or(usize::MAX)
}

/// 32 bytes of `data` from `offset`, zero-padded past the end.
fn padded_word(data: &[u8], offset: U256) -> U256 {
    let mut word = [0u8; 32];
    if let Some(start) = to_usize(offset).filter(|start| *start < data.len()) {
        let end = (start + 32).min(data.len());
        word[..end - start].copy_from_slice(&data[start..end]);
    }
    U256::from_big_endian(&word)
}

fn narrow(value: U512) -> U256 {
    let mut bytes = [0u8; 64];
    value.to_big_endian(&mut bytes);
    U256::from_big_endian(&bytes[32..])
}

fn negate(value: U256) -> U256 {
    (!value).overflowing_add(U256::one()).0
}

fn abs(value: U256) -> U256 {
    if value.bit(255) {
        negate(value)
    } else {
        value
    }
}

fn signed_lt(a: U256, b: U256) -> bool {
    match (a.bit(255), b.bit(255)) {
        (true, false) => true,
        (false, true) => false,
        _ => a < b,
    }
}

/// SDIV; `MIN / -1` wraps to `MIN`.
fn signed_div(a: U256, b: U256) -> U256 {
    if b.is_zero() {
        return U256::zero();
    }
    let quotient = abs(a) / abs(b);
    if a.bit(255) == b.bit(255) {
        quotient
    } else {
        negate(quotient)
    }
}

/// SMOD; the result takes the sign of the dividend.
fn signed_mod(a: U256, b: U256) -> U256 {
    if b.is_zero() {
        return U256::zero();
    }
    let remainder = abs(a) % abs(b);
    if a.bit(255) {
        negate(remainder)
    } else {
        remainder
    }
}

fn sar(value: U256, shift: U256) -> U256 {
    let negative = value.bit(255);
    if shift >= U256::from(256) {
        return if negative { U256::MAX } else { U256::zero() };
    }
    let shift = shift.low_u64() as usize;
    if shift == 0 {
        return value;
    }
    let shifted = value >> shift;
    if negative {
        shifted | (U256::MAX << (256 - shift))
    } else {
        shifted
    }
}

fn sign_extend(k: U256, x: U256) -> U256 {
    if k >= U256::from(31) {
        return x;
    }
    let bit_index = 8 * k.low_u64() as usize + 7;
    let mask = (U256::one() << (bit_index + 1)) - 1;
    if x.bit(bit_index) {
        x | !mask
    } else {
        x & mask
    }
}

fn exp_by_squaring(mut base: U256, mut exponent: U256) -> U256 {
    let mut result = U256::one();
    while !exponent.is_zero() {
        if exponent.bit(0) {
            result = result.overflowing_mul(base).0;
        }
        exponent >>= 1;
        base = base.overflowing_mul(base).0;
    }
    result
}
