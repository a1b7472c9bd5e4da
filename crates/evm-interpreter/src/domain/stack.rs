//! # Operand Stack
//!
//! LIFO of 256-bit words, at most 1024 deep.

use crate::errors::ExceptionError;
use shared_types::U256;

/// Maximum stack depth.
pub const STACK_LIMIT: usize = 1024;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Stack {
    data: Vec<U256>,
}

impl Stack {
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: Vec::with_capacity(64),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// # Errors
    ///
    /// `StackOverflow` when the stack already holds 1024 items.
    pub fn push(&mut self, value: U256) -> Result<(), ExceptionError> {
        if self.data.len() >= STACK_LIMIT {
            return Err(ExceptionError::StackOverflow);
        }
        self.data.push(value);
        Ok(())
    }

    pub fn push_bool(&mut self, value: bool) -> Result<(), ExceptionError> {
        self.push(if value { U256::one() } else { U256::zero() })
    }

    /// # Errors
    ///
    /// `StackUnderflow` when empty.
    pub fn pop(&mut self) -> Result<U256, ExceptionError> {
        self.data.pop().ok_or(ExceptionError::StackUnderflow)
    }

    /// Pop `N` items, top first.
    pub fn pop_n<const N: usize>(&mut self) -> Result<[U256; N], ExceptionError> {
        if self.data.len() < N {
            return Err(ExceptionError::StackUnderflow);
        }
        let mut out = [U256::zero(); N];
        for slot in &mut out {
            *slot = self.data.pop().ok_or(ExceptionError::StackUnderflow)?;
        }
        Ok(out)
    }

    /// Value at `depth` (0 = top).
    pub fn peek(&self, depth: usize) -> Result<U256, ExceptionError> {
        if depth >= self.data.len() {
            return Err(ExceptionError::StackUnderflow);
        }
        Ok(self.data[self.data.len() - 1 - depth])
    }

    /// SWAPn: exchange the top with the item `n` below it.
    pub fn swap(&mut self, n: usize) -> Result<(), ExceptionError> {
        if n == 0 || n >= self.data.len() {
            return Err(ExceptionError::StackUnderflow);
        }
        let len = self.data.len();
        self.data.swap(len - 1, len - 1 - n);
        Ok(())
    }

    /// DUPn: push a copy of the item at depth `n - 1`.
    pub fn dup(&mut self, n: usize) -> Result<(), ExceptionError> {
        if n == 0 {
            return Err(ExceptionError::StackUnderflow);
        }
        let value = self.peek(n - 1)?;
        self.push(value)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[U256] {
        &self.data
    }
}
