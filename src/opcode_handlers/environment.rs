//! Environmental Information (16): ADDRESS, BALANCE, ORIGIN, CALLER,
//! CALLVALUE, CALLDATALOAD, CALLDATASIZE, CALLDATACOPY, CODESIZE, CODECOPY,
//! GASPRICE, EXTCODESIZE, EXTCODECOPY, RETURNDATASIZE, RETURNDATACOPY,
//! EXTCODEHASH.

use ethereum_types::U256;

use crate::{
    errors::{ExceptionalHalt, OpcodeResult, VMError},
    gas_cost,
    utils::{address_to_word, hash_to_word, keccak256, word_to_address, word_to_usize},
    vm::VM,
};

impl VM {
    /// KECCAK256 ("SHA3"). Grouped here rather than in its own file since it
    /// shares CALLDATACOPY/CODECOPY's memory-range-then-charge shape.
    pub fn op_keccak256(&mut self) -> Result<OpcodeResult, VMError> {
        let [offset, size] = *self.current_frame_mut()?.stack.pop::<2>()?;
        let (size, offset) = super::size_offset_to_usize(size, offset)?;
        self.charge_memory_expansion(offset, size)?;
        self.charge_gas(gas_cost::KECCAK256_STATIC)?;
        self.charge_gas(gas_cost::keccak256_dynamic_cost(size)?)?;

        let data = self.current_frame_mut()?.memory.load_range(offset, size)?;
        let hash = keccak256(&data);
        self.current_frame_mut()?.stack.push(hash_to_word(hash))?;
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_address(&mut self) -> Result<OpcodeResult, VMError> {
        self.charge_gas(gas_cost::ADDRESS)?;
        let address = self.current_frame()?.to;
        self.current_frame_mut()?
            .stack
            .push(address_to_word(address))?;
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_balance(&mut self) -> Result<OpcodeResult, VMError> {
        let address = word_to_address(self.current_frame_mut()?.stack.pop1()?);
        let is_cold = self.access_address(address);
        self.charge_gas(gas_cost::account_access_cost(is_cold, self.fork()))?;
        let balance = self.get_balance(address)?;
        self.current_frame_mut()?.stack.push(balance)?;
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_origin(&mut self) -> Result<OpcodeResult, VMError> {
        self.charge_gas(gas_cost::ORIGIN)?;
        let origin = self.environment.origin;
        self.current_frame_mut()?
            .stack
            .push(address_to_word(origin))?;
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_caller(&mut self) -> Result<OpcodeResult, VMError> {
        self.charge_gas(gas_cost::CALLER)?;
        let caller = self.current_frame()?.msg_sender;
        self.current_frame_mut()?
            .stack
            .push(address_to_word(caller))?;
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_callvalue(&mut self) -> Result<OpcodeResult, VMError> {
        self.charge_gas(gas_cost::CALLVALUE)?;
        let value = self.current_frame()?.value;
        self.current_frame_mut()?.stack.push(value)?;
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_calldataload(&mut self) -> Result<OpcodeResult, VMError> {
        self.charge_gas(gas_cost::CALLDATALOAD)?;
        let offset = self.current_frame_mut()?.stack.pop1()?;
        let frame = self.current_frame()?;
        let word = load_word_zero_padded(&frame.calldata, offset);
        self.current_frame_mut()?.stack.push(word)?;
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_calldatasize(&mut self) -> Result<OpcodeResult, VMError> {
        self.charge_gas(gas_cost::CALLDATASIZE)?;
        let len = self.current_frame()?.calldata.len();
        self.current_frame_mut()?.stack.push(U256::from(len))?;
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_calldatacopy(&mut self) -> Result<OpcodeResult, VMError> {
        let [dest_offset, src_offset, size] = *self.current_frame_mut()?.stack.pop::<3>()?;
        let (size, dest_offset) = super::size_offset_to_usize(size, dest_offset)?;
        let src_offset = saturating_word_to_usize(src_offset);
        self.charge_gas(gas_cost::VERYLOW)?;
        self.charge_gas(gas_cost::copy_dynamic_cost(size)?)?;
        self.charge_memory_expansion(dest_offset, size)?;

        let frame = self.current_frame()?;
        let data = copy_range_zero_padded(&frame.calldata, src_offset, size);
        self.current_frame_mut()?
            .memory
            .store_data_zero_padded(dest_offset, &data, size)?;
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_codesize(&mut self) -> Result<OpcodeResult, VMError> {
        self.charge_gas(gas_cost::CODESIZE)?;
        let len = self.current_frame()?.code_len();
        self.current_frame_mut()?.stack.push(U256::from(len))?;
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_codecopy(&mut self) -> Result<OpcodeResult, VMError> {
        let [dest_offset, src_offset, size] = *self.current_frame_mut()?.stack.pop::<3>()?;
        let (size, dest_offset) = super::size_offset_to_usize(size, dest_offset)?;
        let src_offset = saturating_word_to_usize(src_offset);
        self.charge_gas(gas_cost::VERYLOW)?;
        self.charge_gas(gas_cost::copy_dynamic_cost(size)?)?;
        self.charge_memory_expansion(dest_offset, size)?;

        let frame = self.current_frame()?;
        let code: &[u8] = &frame.bytecode;
        let data = copy_range_zero_padded(code, src_offset, size);
        self.current_frame_mut()?
            .memory
            .store_data_zero_padded(dest_offset, &data, size)?;
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_gasprice(&mut self) -> Result<OpcodeResult, VMError> {
        self.charge_gas(gas_cost::GASPRICE)?;
        let gas_price = self.environment.gas_price;
        self.current_frame_mut()?.stack.push(gas_price)?;
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_extcodesize(&mut self) -> Result<OpcodeResult, VMError> {
        let address = word_to_address(self.current_frame_mut()?.stack.pop1()?);
        let is_cold = self.access_address(address);
        self.charge_gas(gas_cost::account_access_cost(is_cold, self.fork()))?;
        let size = self.get_code(address)?.len();
        self.current_frame_mut()?.stack.push(U256::from(size))?;
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_extcodecopy(&mut self) -> Result<OpcodeResult, VMError> {
        let [address_word, dest_offset, src_offset, size] =
            *self.current_frame_mut()?.stack.pop::<4>()?;
        let address = word_to_address(address_word);
        let (size, dest_offset) = super::size_offset_to_usize(size, dest_offset)?;
        let src_offset = saturating_word_to_usize(src_offset);

        let is_cold = self.access_address(address);
        self.charge_gas(gas_cost::account_access_cost(is_cold, self.fork()))?;
        self.charge_gas(gas_cost::copy_dynamic_cost(size)?)?;
        self.charge_memory_expansion(dest_offset, size)?;

        let code = self.get_code(address)?;
        let data = copy_range_zero_padded(&code, src_offset, size);
        self.current_frame_mut()?
            .memory
            .store_data_zero_padded(dest_offset, &data, size)?;
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_returndatasize(&mut self) -> Result<OpcodeResult, VMError> {
        self.charge_gas(gas_cost::RETURNDATASIZE)?;
        let len = self.current_frame()?.return_data.len();
        self.current_frame_mut()?.stack.push(U256::from(len))?;
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_returndatacopy(&mut self) -> Result<OpcodeResult, VMError> {
        let [dest_offset, src_offset, size] = *self.current_frame_mut()?.stack.pop::<3>()?;
        let (size, dest_offset) = super::size_offset_to_usize(size, dest_offset)?;
        let src_offset = word_to_usize(src_offset)?;

        let frame = self.current_frame()?;
        let return_data_len = frame.return_data.len();
        // Reading past the end of return data (even without overflowing) is
        // an exceptional halt, unlike CALLDATACOPY/CODECOPY's zero-padding.
        let end = src_offset
            .checked_add(size)
            .ok_or(ExceptionalHalt::OutOfBounds)?;
        if end > return_data_len {
            return Err(ExceptionalHalt::OutOfBounds.into());
        }

        self.charge_gas(gas_cost::VERYLOW)?;
        self.charge_gas(gas_cost::copy_dynamic_cost(size)?)?;
        self.charge_memory_expansion(dest_offset, size)?;

        let frame = self.current_frame()?;
        let data = frame.return_data.slice(src_offset..end);
        self.current_frame_mut()?
            .memory
            .store_data(dest_offset, &data)?;
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_extcodehash(&mut self) -> Result<OpcodeResult, VMError> {
        let address = word_to_address(self.current_frame_mut()?.stack.pop1()?);
        let is_cold = self.access_address(address);
        self.charge_gas(gas_cost::account_access_cost(is_cold, self.fork()))?;

        let is_empty = self.account_is_empty(address)?;
        let hash = if is_empty {
            U256::zero()
        } else {
            hash_to_word(self.get_code(address)?.hash())
        };
        self.current_frame_mut()?.stack.push(hash)?;
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }
}

/// CALLDATALOAD: reads a full word starting at `offset`, zero-padding past
/// the end of `data` (an offset past the end of `data` reads as all zero).
fn load_word_zero_padded(data: &[u8], offset: U256) -> U256 {
    let Ok(offset) = word_to_usize(offset) else {
        return U256::zero();
    };
    let mut bytes = [0u8; 32];
    if offset < data.len() {
        let available = &data[offset..];
        let len = available.len().min(32);
        bytes[..len].copy_from_slice(&available[..len]);
    }
    U256::from_big_endian(&bytes)
}

/// Same offset guard as `super::size_offset_to_usize`, but for the *source*
/// side of a copy opcode, where an out-of-range offset is never an error:
/// it just means the whole read falls past the end of the source buffer.
fn saturating_word_to_usize(value: U256) -> usize {
    word_to_usize(value).unwrap_or(usize::MAX)
}

/// Shared by CALLDATACOPY/CODECOPY/EXTCODECOPY: a source range that runs
/// past the end of `data` is zero-padded rather than rejected.
fn copy_range_zero_padded(data: &[u8], offset: usize, size: usize) -> bytes::Bytes {
    if size == 0 {
        return bytes::Bytes::new();
    }
    if offset >= data.len() {
        return bytes::Bytes::new();
    }
    let end = (offset.saturating_add(size)).min(data.len());
    bytes::Bytes::copy_from_slice(&data[offset..end])
}
