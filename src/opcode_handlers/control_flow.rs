//! Stack, Memory, Storage and Flow Operations, the control-flow subset:
//! STOP, JUMP, JUMPI, PC, JUMPDEST, GAS. (POP/MLOAD/MSTORE/MSTORE8/MSIZE/
//! MCOPY/SLOAD/SSTORE/TLOAD/TSTORE live in `memory_storage`.)

use ethereum_types::U256;

use crate::{
    errors::{ExceptionalHalt, OpcodeResult, VMError},
    gas_cost,
    utils::word_to_usize,
    vm::VM,
};

impl VM {
    pub fn op_stop(&mut self) -> Result<OpcodeResult, VMError> {
        self.set_halt_output(None);
        Ok(OpcodeResult::Halt)
    }

    pub fn op_jump(&mut self) -> Result<OpcodeResult, VMError> {
        self.charge_gas(gas_cost::JUMP)?;
        let dest = word_to_usize(self.current_frame_mut()?.stack.pop1()?)?;
        let frame = self.current_frame_mut()?;
        if !frame.is_valid_jump(dest) {
            return Err(ExceptionalHalt::InvalidJump.into());
        }
        frame.pc = dest;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_jumpi(&mut self) -> Result<OpcodeResult, VMError> {
        self.charge_gas(gas_cost::JUMPI)?;
        let [dest, cond] = *self.current_frame_mut()?.stack.pop::<2>()?;
        if cond.is_zero() {
            self.advance_pc(1)?;
            return Ok(OpcodeResult::Continue);
        }
        let dest = word_to_usize(dest)?;
        let frame = self.current_frame_mut()?;
        if !frame.is_valid_jump(dest) {
            return Err(ExceptionalHalt::InvalidJump.into());
        }
        frame.pc = dest;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_jumpdest(&mut self) -> Result<OpcodeResult, VMError> {
        self.charge_gas(gas_cost::JUMPDEST)?;
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_pc(&mut self) -> Result<OpcodeResult, VMError> {
        self.charge_gas(gas_cost::PC)?;
        let pc = self.current_frame()?.pc;
        self.current_frame_mut()?.stack.push(U256::from(pc))?;
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_gas(&mut self) -> Result<OpcodeResult, VMError> {
        self.charge_gas(gas_cost::GAS)?;
        let remaining = self.current_frame()?.gas_remaining();
        self.current_frame_mut()?.stack.push(U256::from(remaining))?;
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }
}
