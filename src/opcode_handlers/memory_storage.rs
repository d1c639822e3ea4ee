//! Stack, Memory, Storage and Flow Operations, the memory/storage subset:
//! POP, MLOAD, MSTORE, MSTORE8, MSIZE, MCOPY, SLOAD, SSTORE, TLOAD, TSTORE.

use ethereum_types::U256;

use crate::{
    errors::{ExceptionalHalt, OpcodeResult, VMError},
    gas_cost,
    utils::{word_to_hash, word_to_usize},
    vm::VM,
};

impl VM {
    pub fn op_pop(&mut self) -> Result<OpcodeResult, VMError> {
        self.charge_gas(gas_cost::POP)?;
        self.current_frame_mut()?.stack.pop1()?;
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_mload(&mut self) -> Result<OpcodeResult, VMError> {
        let offset = word_to_usize(self.current_frame_mut()?.stack.pop1()?)?;
        self.charge_gas(gas_cost::MLOAD)?;
        self.charge_memory_expansion(offset, 32)?;
        let value = self.current_frame_mut()?.memory.load_word(offset)?;
        self.current_frame_mut()?.stack.push(value)?;
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_mstore(&mut self) -> Result<OpcodeResult, VMError> {
        let [offset, value] = *self.current_frame_mut()?.stack.pop::<2>()?;
        let offset = word_to_usize(offset)?;
        self.charge_gas(gas_cost::MSTORE)?;
        self.charge_memory_expansion(offset, 32)?;
        self.current_frame_mut()?.memory.store_word(offset, value)?;
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_mstore8(&mut self) -> Result<OpcodeResult, VMError> {
        let [offset, value] = *self.current_frame_mut()?.stack.pop::<2>()?;
        let offset = word_to_usize(offset)?;
        self.charge_gas(gas_cost::MSTORE8)?;
        self.charge_memory_expansion(offset, 1)?;
        let mut bytes = [0u8; 32];
        value.to_big_endian(&mut bytes);
        let low_byte = bytes[31];
        self.current_frame_mut()?
            .memory
            .store_data(offset, &[low_byte])?;
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_msize(&mut self) -> Result<OpcodeResult, VMError> {
        self.charge_gas(gas_cost::MSIZE)?;
        let len = self.current_frame()?.memory.len();
        self.current_frame_mut()?.stack.push(U256::from(len))?;
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_mcopy(&mut self) -> Result<OpcodeResult, VMError> {
        let [dest_offset, src_offset, size] = *self.current_frame_mut()?.stack.pop::<3>()?;
        let (size, dest_offset) = super::size_offset_to_usize(size, dest_offset)?;
        let src_offset = word_to_usize(src_offset)?;

        self.charge_gas(gas_cost::MCOPY)?;
        self.charge_gas(gas_cost::copy_dynamic_cost(size)?)?;
        self.charge_memory_expansion(dest_offset, size)?;
        self.charge_memory_expansion(src_offset, size)?;

        if size > 0 {
            self.current_frame_mut()?
                .memory
                .copy_within(src_offset, dest_offset, size)?;
        }
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_sload(&mut self) -> Result<OpcodeResult, VMError> {
        let address = self.current_frame()?.to;
        let slot = word_to_hash(self.current_frame()?.stack.peek(0)?);
        // Read before popping/warming/charging: a yield must not lose the
        // operand or leave the retry to re-charge a slot already warmed.
        let value = self.get_storage(address, slot)?;
        self.current_frame_mut()?.stack.pop1()?;
        let is_cold = self.access_storage_slot(address, slot);
        self.charge_gas(gas_cost::sload_cost(is_cold, self.fork()))?;
        self.current_frame_mut()?.stack.push(value)?;
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_sstore(&mut self) -> Result<OpcodeResult, VMError> {
        let frame = self.current_frame()?;
        if frame.is_static {
            return Err(ExceptionalHalt::OpcodeNotAllowedInStaticContext.into());
        }
        gas_cost::sstore_guard(frame.gas_remaining())?;
        let address = frame.to;
        let slot = word_to_hash(frame.stack.peek(0)?);
        let new_value = frame.stack.peek(1)?;

        // Both reads happen before the operands are popped or the slot is
        // warmed, so a yield here leaves the frame untouched for `resume`.
        let original = self.get_original_storage(address, slot)?;
        let current = self.get_storage(address, slot)?;

        self.current_frame_mut()?.stack.pop::<2>()?;
        let is_cold = self.access_storage_slot(address, slot);

        let outcome = gas_cost::sstore_cost(original, current, new_value, is_cold, self.fork())?;
        self.charge_gas(outcome.gas_cost)?;
        self.set_storage(address, slot, new_value)?;
        self.state.add_refund(outcome.refund_delta);

        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_tload(&mut self) -> Result<OpcodeResult, VMError> {
        self.charge_gas(gas_cost::TLOAD)?;
        let address = self.current_frame()?.to;
        let slot = word_to_hash(self.current_frame_mut()?.stack.pop1()?);
        let value = self.state.get_transient(address, slot);
        self.current_frame_mut()?.stack.push(value)?;
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_tstore(&mut self) -> Result<OpcodeResult, VMError> {
        if self.current_frame()?.is_static {
            return Err(ExceptionalHalt::OpcodeNotAllowedInStaticContext.into());
        }
        self.charge_gas(gas_cost::TSTORE)?;
        let address = self.current_frame()?.to;
        let [slot_word, value] = *self.current_frame_mut()?.stack.pop::<2>()?;
        let slot = word_to_hash(slot_word);
        self.state.set_transient(address, slot, value);
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }
}
