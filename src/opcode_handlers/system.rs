//! System Operations (10): CREATE, CALL, CALLCODE, RETURN, DELEGATECALL,
//! CREATE2, STATICCALL, REVERT, INVALID, SELFDESTRUCT.
//!
//! Thin compared to a from-scratch EVM's system handlers: `orchestrator`
//! already owns gas forwarding (EIP-150), value transfer, warm/cold
//! pre-charging, precompile dispatch, and frame construction behind
//! `enter_call`/`enter_create`. Each handler here only pops operands,
//! charges the memory-expansion and CREATE-opcode-static costs that belong
//! to the *caller's own* instruction (not the child), and hands off.

use ethereum_types::U256;

use crate::{
    environment::Hardfork,
    errors::{ExceptionalHalt, InternalError, OpcodeResult, VMError},
    gas_cost,
    orchestrator::CallParams,
    utils::word_to_address,
    vm::VM,
};

impl VM {
    pub fn op_call(&mut self) -> Result<OpcodeResult, VMError> {
        let [gas, address, value, args_offset, args_size, ret_offset, ret_size] =
            *self.current_frame_mut()?.stack.pop::<7>()?;
        let callee = word_to_address(address);
        let (args_size, args_offset) = super::size_offset_to_usize(args_size, args_offset)?;
        let (ret_size, ret_offset) = super::size_offset_to_usize(ret_size, ret_offset)?;

        self.charge_memory_expansion(args_offset, args_size)?;
        self.charge_memory_expansion(ret_offset, ret_size)?;

        let input = self
            .current_frame_mut()?
            .memory
            .load_range(args_offset, args_size)?;
        // Advance past the CALL opcode in *this* frame before dispatching:
        // `enter_call` may push a child frame, after which
        // `current_frame_mut` refers to the child, not the caller.
        self.advance_pc(1)?;
        self.enter_call(CallParams::Call {
            callee,
            value,
            input,
            gas,
            ret_offset,
            ret_size,
        })?;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_callcode(&mut self) -> Result<OpcodeResult, VMError> {
        let [gas, address, value, args_offset, args_size, ret_offset, ret_size] =
            *self.current_frame_mut()?.stack.pop::<7>()?;
        let code_source = word_to_address(address);
        let (args_size, args_offset) = super::size_offset_to_usize(args_size, args_offset)?;
        let (ret_size, ret_offset) = super::size_offset_to_usize(ret_size, ret_offset)?;

        self.charge_memory_expansion(args_offset, args_size)?;
        self.charge_memory_expansion(ret_offset, ret_size)?;

        let input = self
            .current_frame_mut()?
            .memory
            .load_range(args_offset, args_size)?;
        // See `op_call`: advance before dispatch, since a pushed child frame
        // would otherwise receive the caller's pc bump.
        self.advance_pc(1)?;
        self.enter_call(CallParams::CallCode {
            code_source,
            value,
            input,
            gas,
            ret_offset,
            ret_size,
        })?;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_delegatecall(&mut self) -> Result<OpcodeResult, VMError> {
        let [gas, address, args_offset, args_size, ret_offset, ret_size] =
            *self.current_frame_mut()?.stack.pop::<6>()?;
        let code_source = word_to_address(address);
        let (args_size, args_offset) = super::size_offset_to_usize(args_size, args_offset)?;
        let (ret_size, ret_offset) = super::size_offset_to_usize(ret_size, ret_offset)?;

        self.charge_memory_expansion(args_offset, args_size)?;
        self.charge_memory_expansion(ret_offset, ret_size)?;

        let input = self
            .current_frame_mut()?
            .memory
            .load_range(args_offset, args_size)?;
        // See `op_call`: advance before dispatch, since a pushed child frame
        // would otherwise receive the caller's pc bump.
        self.advance_pc(1)?;
        self.enter_call(CallParams::DelegateCall {
            code_source,
            input,
            gas,
            ret_offset,
            ret_size,
        })?;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_staticcall(&mut self) -> Result<OpcodeResult, VMError> {
        let [gas, address, args_offset, args_size, ret_offset, ret_size] =
            *self.current_frame_mut()?.stack.pop::<6>()?;
        let callee = word_to_address(address);
        let (args_size, args_offset) = super::size_offset_to_usize(args_size, args_offset)?;
        let (ret_size, ret_offset) = super::size_offset_to_usize(ret_size, ret_offset)?;

        self.charge_memory_expansion(args_offset, args_size)?;
        self.charge_memory_expansion(ret_offset, ret_size)?;

        let input = self
            .current_frame_mut()?
            .memory
            .load_range(args_offset, args_size)?;
        // See `op_call`: advance before dispatch, since a pushed child frame
        // would otherwise receive the caller's pc bump.
        self.advance_pc(1)?;
        self.enter_call(CallParams::StaticCall {
            callee,
            input,
            gas,
            ret_offset,
            ret_size,
        })?;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_create(&mut self) -> Result<OpcodeResult, VMError> {
        let [value, offset, size] = *self.current_frame_mut()?.stack.pop::<3>()?;
        let (size, offset) = super::size_offset_to_usize(size, offset)?;

        self.charge_memory_expansion(offset, size)?;
        let static_cost = gas_cost::create_static_cost(size, false, self.fork())?;
        self.charge_gas(static_cost)?;

        let gas_requested = U256::from(self.current_frame()?.gas_remaining());
        let init_code = self.current_frame_mut()?.memory.load_range(offset, size)?;
        // See `op_call`: advance before dispatch, since a pushed child frame
        // would otherwise receive the caller's pc bump.
        self.advance_pc(1)?;
        self.enter_create(false, value, init_code, None, gas_requested)?;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_create2(&mut self) -> Result<OpcodeResult, VMError> {
        let [value, offset, size, salt] = *self.current_frame_mut()?.stack.pop::<4>()?;
        let (size, offset) = super::size_offset_to_usize(size, offset)?;

        self.charge_memory_expansion(offset, size)?;
        let static_cost = gas_cost::create_static_cost(size, true, self.fork())?;
        self.charge_gas(static_cost)?;

        let gas_requested = U256::from(self.current_frame()?.gas_remaining());
        let init_code = self.current_frame_mut()?.memory.load_range(offset, size)?;
        // See `op_call`: advance before dispatch, since a pushed child frame
        // would otherwise receive the caller's pc bump.
        self.advance_pc(1)?;
        self.enter_create(true, value, init_code, Some(salt), gas_requested)?;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_return(&mut self) -> Result<OpcodeResult, VMError> {
        let [offset, size] = *self.current_frame_mut()?.stack.pop::<2>()?;
        let (size, offset) = super::size_offset_to_usize(size, offset)?;
        self.charge_memory_expansion(offset, size)?;
        let output = self.current_frame_mut()?.memory.load_range(offset, size)?;
        self.set_halt_output(Some(output));
        Ok(OpcodeResult::Halt)
    }

    pub fn op_revert(&mut self) -> Result<OpcodeResult, VMError> {
        let [offset, size] = *self.current_frame_mut()?.stack.pop::<2>()?;
        let (size, offset) = super::size_offset_to_usize(size, offset)?;
        self.charge_memory_expansion(offset, size)?;
        let output = self.current_frame_mut()?.memory.load_range(offset, size)?;
        Err(VMError::RevertOpcode(output))
    }

    pub fn op_invalid(&mut self) -> Result<OpcodeResult, VMError> {
        Err(ExceptionalHalt::InvalidOpcode.into())
    }

    /// SELFDESTRUCT. Pre-Cancun, always schedules `address` for removal at
    /// the end of the transaction. From Cancun (EIP-6780), only an account
    /// created earlier in the *same* transaction is actually destroyed;
    /// otherwise this degrades to a plain balance transfer.
    pub fn op_selfdestruct(&mut self) -> Result<OpcodeResult, VMError> {
        if self.current_frame()?.is_static {
            return Err(ExceptionalHalt::OpcodeNotAllowedInStaticContext.into());
        }
        // Peek rather than pop, and gather every DB read that can yield,
        // before touching the stack, the warm set, or gas/balance state:
        // a `Yield` must leave the frame exactly as it found it so `resume`
        // can safely re-run this handler from the top.
        let beneficiary = word_to_address(self.current_frame()?.stack.peek(0)?);
        let address = self.current_frame()?.to;

        let beneficiary_is_empty = self.account_is_empty(beneficiary)?;
        let balance = self.get_balance(address)?;
        let beneficiary_balance = self.get_balance(beneficiary)?;
        let transfers_value = !balance.is_zero();

        self.current_frame_mut()?.stack.pop1()?;
        let is_cold = self.access_address(beneficiary);

        let cost =
            gas_cost::selfdestruct_cost(is_cold, beneficiary_is_empty, transfers_value, self.fork());
        self.charge_gas(cost)?;

        if transfers_value {
            self.set_balance(address, U256::zero());
            if address != beneficiary {
                let new_balance = beneficiary_balance
                    .checked_add(balance)
                    .ok_or(InternalError::Overflow)?;
                self.set_balance(beneficiary, new_balance);
            }
            // `address == beneficiary`: the value is burned, matching every
            // other implementation's handling of a self-targeted SELFDESTRUCT.
        }

        if self.fork() < Hardfork::Cancun || self.state.was_created_this_tx(address) {
            self.state.selfdestruct(address, beneficiary);
        }

        self.set_halt_output(None);
        Ok(OpcodeResult::Halt)
    }
}
