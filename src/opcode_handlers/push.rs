//! Push Operations (33): PUSH0, PUSH1-PUSH32.
//!
//! Unlike a raw-pointer read of the code buffer, `op_push` goes through safe
//! slicing throughout: a PUSHn whose immediate bytes run past the end of the
//! code (legal — code is allowed to end mid-PUSH) is zero-padded rather than
//! read out of bounds.

use ethereum_types::U256;

use crate::{
    errors::{OpcodeResult, VMError},
    gas_cost,
    vm::VM,
};

impl VM {
    pub fn op_push0(&mut self) -> Result<OpcodeResult, VMError> {
        self.charge_gas(gas_cost::PUSH0)?;
        self.current_frame_mut()?.stack.push_zero()?;
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_push<const N: usize>(&mut self) -> Result<OpcodeResult, VMError> {
        self.charge_gas(gas_cost::PUSHN)?;
        let frame = self.current_frame()?;
        let code = &frame.bytecode;
        let start = frame.pc.saturating_add(1);
        let end = start.saturating_add(N);

        let mut bytes = [0u8; 32];
        if let Some(slice) = code.get(start..end) {
            bytes[32 - N..].copy_from_slice(slice);
        } else if let Some(slice) = code.get(start..) {
            let len = slice.len();
            bytes[32 - N..32 - N + len].copy_from_slice(slice);
        }
        let value = U256::from_big_endian(&bytes);

        self.current_frame_mut()?.stack.push(value)?;
        self.advance_pc(1 + N)?;
        Ok(OpcodeResult::Continue)
    }
}
