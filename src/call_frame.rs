//! `CallFrame`: the private execution context of one call or create — the
//! "Execution Frame" entity of §3.2.

use std::rc::Rc;

use bitvec::vec::BitVec;
use bytes::Bytes;
use ethereum_types::{Address, U256};

use crate::{
    account::Code,
    errors::{ExceptionalHalt, InternalError, VMError},
    memory::Memory,
    stack::Stack,
    utils::valid_jump_destinations,
};

/// One call/create's private execution context: stack, memory, program
/// counter, and the bookkeeping needed to bubble a result back to its
/// parent frame.
#[derive(Debug, Clone)]
pub struct CallFrame {
    /// `msg.sender` for this frame.
    pub msg_sender: Address,
    /// `address(this)` — the account whose storage this frame reads/writes.
    pub to: Address,
    /// The account whose *code* is executing. Differs from `to` under
    /// CALLCODE/DELEGATECALL and EIP-7702 delegation.
    pub code_address: Address,
    pub bytecode: Code,
    pub value: U256,
    pub calldata: Bytes,
    pub is_static: bool,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub depth: usize,
    /// Whether entering this frame should move `value` from `msg_sender`
    /// to `to` (false for DELEGATECALL, which inherits the parent's
    /// balance effects).
    pub should_transfer_value: bool,
    pub is_create: bool,
    /// Offset/size in the *parent's* memory where this frame's return data
    /// should be written back to, for CALL-family opcodes.
    pub ret_offset: usize,
    pub ret_size: usize,

    pub stack: Stack,
    pub memory: Memory,

    pub pc: usize,
    /// Output bytes of this frame's own most recent inner call/create, per
    /// invariant 7 (§3.3). Exposed to the guest via RETURNDATASIZE/COPY.
    pub return_data: Bytes,
    /// Non-`None` only when `bytecode` was resolved through an EIP-7702
    /// delegation designator; records the delegator account (§3.3 invariant 9).
    pub authorized: Option<Address>,

    valid_jump_destinations: Rc<BitVec>,
}

impl CallFrame {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        msg_sender: Address,
        to: Address,
        code_address: Address,
        bytecode: Code,
        value: U256,
        calldata: Bytes,
        is_static: bool,
        gas_limit: u64,
        depth: usize,
        should_transfer_value: bool,
        is_create: bool,
        ret_offset: usize,
        ret_size: usize,
        stack: Stack,
        memory: Memory,
    ) -> Self {
        let valid_jump_destinations = Rc::new(valid_jump_destinations(&bytecode));
        Self {
            msg_sender,
            to,
            code_address,
            bytecode,
            value,
            calldata,
            is_static,
            gas_limit,
            gas_used: 0,
            depth,
            should_transfer_value,
            is_create,
            ret_offset,
            ret_size,
            stack,
            memory,
            pc: 0,
            return_data: Bytes::new(),
            authorized: None,
            valid_jump_destinations,
        }
    }

    #[inline]
    pub fn gas_remaining(&self) -> u64 {
        self.gas_limit.saturating_sub(self.gas_used)
    }

    /// Subtracts `cost` from the frame's remaining gas, failing with
    /// `OutOfGas` rather than letting gas go negative, per invariant 10.
    #[inline]
    pub fn increase_consumed_gas(&mut self, cost: u64) -> Result<(), VMError> {
        let new_used = self
            .gas_used
            .checked_add(cost)
            .ok_or(InternalError::Overflow)?;
        if new_used > self.gas_limit {
            self.gas_used = self.gas_limit;
            return Err(ExceptionalHalt::OutOfGas.into());
        }
        self.gas_used = new_used;
        Ok(())
    }

    #[inline]
    pub fn is_valid_jump(&self, pc: usize) -> bool {
        self.valid_jump_destinations
            .get(pc)
            .map(|bit| *bit)
            .unwrap_or(false)
    }

    #[inline]
    pub fn code_len(&self) -> usize {
        self.bytecode.len()
    }

    #[inline]
    pub fn current_opcode(&self) -> Option<u8> {
        self.bytecode.get(self.pc).copied()
    }
}
