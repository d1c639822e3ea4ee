//! Duplication & Exchange Operations (32): DUP1-DUP16, SWAP1-SWAP16.

use crate::{
    errors::{OpcodeResult, VMError},
    gas_cost,
    vm::VM,
};

impl VM {
    /// DUPn duplicates the word `N - 1` slots below the top (DUP1
    /// duplicates the top itself).
    pub fn op_dup<const N: usize>(&mut self) -> Result<OpcodeResult, VMError> {
        self.charge_gas(gas_cost::DUPN)?;
        self.current_frame_mut()?.stack.dup(N - 1)?;
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }

    /// SWAPn swaps the top of stack with the word `N` slots below it.
    pub fn op_swap<const N: usize>(&mut self) -> Result<OpcodeResult, VMError> {
        self.charge_gas(gas_cost::SWAPN)?;
        self.current_frame_mut()?.stack.swap(N)?;
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }
}
