//! The 1024-word operand stack of a single call frame.

use crate::{constants::STACK_LIMIT, errors::{ExceptionalHalt, VMError}};
use ethereum_types::U256;

/// A fixed-capacity LIFO stack of 256-bit words.
///
/// Kept as a flat `Vec` rather than a fixed array so indexing stays in
/// terms of ordinary slice operations; capacity is reserved up front so
/// pushes within `STACK_LIMIT` never reallocate.
#[derive(Debug, Clone, Default)]
pub struct Stack {
    values: Vec<U256>,
}

impl Stack {
    pub fn new() -> Self {
        Self {
            values: Vec::with_capacity(STACK_LIMIT),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn push(&mut self, value: U256) -> Result<(), VMError> {
        if self.values.len() >= STACK_LIMIT {
            return Err(ExceptionalHalt::StackOverflow.into());
        }
        self.values.push(value);
        Ok(())
    }

    #[inline]
    pub fn push_zero(&mut self) -> Result<(), VMError> {
        self.push(U256::zero())
    }

    /// Pops exactly `N` words, returning them in the order they were
    /// pushed popped, i.e. `[top, second_from_top, ...]`.
    #[inline]
    pub fn pop<const N: usize>(&mut self) -> Result<[U256; N], VMError> {
        if self.values.len() < N {
            return Err(ExceptionalHalt::StackUnderflow.into());
        }
        let mut out = [U256::zero(); N];
        for slot in out.iter_mut() {
            // length checked above: `pop()` cannot miss here.
            *slot = self.values.pop().ok_or(ExceptionalHalt::StackUnderflow)?;
        }
        Ok(out)
    }

    /// Sugar for `pop::<1>()` that hands back a scalar instead of a
    /// single-element array, for the many opcodes that consume exactly one
    /// operand.
    #[inline]
    pub fn pop1(&mut self) -> Result<U256, VMError> {
        let [value] = self.pop::<1>()?;
        Ok(value)
    }

    /// Reads the word `index` slots below the top without removing it
    /// (`index == 0` is the top of stack). Used by DUPn.
    #[inline]
    pub fn peek(&self, index_from_top: usize) -> Result<U256, VMError> {
        let len = self.values.len();
        if index_from_top >= len {
            return Err(ExceptionalHalt::StackUnderflow.into());
        }
        Ok(self.values[len - 1 - index_from_top])
    }

    /// Swaps the top of stack with the word `index_from_top` slots below
    /// it (`index_from_top >= 1`). Used by SWAPn.
    #[inline]
    pub fn swap(&mut self, index_from_top: usize) -> Result<(), VMError> {
        let len = self.values.len();
        if index_from_top >= len {
            return Err(ExceptionalHalt::StackUnderflow.into());
        }
        self.values.swap(len - 1, len - 1 - index_from_top);
        Ok(())
    }

    /// Pushes a copy of the word `index_from_top` slots below the current
    /// top. Used by DUPn.
    #[inline]
    pub fn dup(&mut self, index_from_top: usize) -> Result<(), VMError> {
        let value = self.peek(index_from_top)?;
        self.push(value)
    }

    /// Exposed for trace capture, which wants an owned copy of the current
    /// stack contents (top-last, push order) without perturbing execution.
    pub fn into_vec(self) -> Vec<U256> {
        self.values
    }
}
