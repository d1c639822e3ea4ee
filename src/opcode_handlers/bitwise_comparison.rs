//! Comparison & Bitwise Logic (14): LT, GT, SLT, SGT, EQ, ISZERO, AND, OR,
//! XOR, NOT, BYTE, SHL, SHR, SAR.

use ethereum_types::U256;

use crate::{
    errors::{OpcodeResult, VMError},
    gas_cost,
    vm::VM,
};

impl VM {
    pub fn op_lt(&mut self) -> Result<OpcodeResult, VMError> {
        self.charge_gas(gas_cost::LT)?;
        let frame = self.current_frame_mut()?;
        let [a, b] = *frame.stack.pop::<2>()?;
        frame.stack.push(bool_word(a < b))?;
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_gt(&mut self) -> Result<OpcodeResult, VMError> {
        self.charge_gas(gas_cost::GT)?;
        let frame = self.current_frame_mut()?;
        let [a, b] = *frame.stack.pop::<2>()?;
        frame.stack.push(bool_word(a > b))?;
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_slt(&mut self) -> Result<OpcodeResult, VMError> {
        self.charge_gas(gas_cost::SLT)?;
        let frame = self.current_frame_mut()?;
        let [a, b] = *frame.stack.pop::<2>()?;
        frame.stack.push(bool_word(signed_lt(a, b)))?;
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_sgt(&mut self) -> Result<OpcodeResult, VMError> {
        self.charge_gas(gas_cost::SGT)?;
        let frame = self.current_frame_mut()?;
        let [a, b] = *frame.stack.pop::<2>()?;
        frame.stack.push(bool_word(signed_lt(b, a)))?;
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_eq(&mut self) -> Result<OpcodeResult, VMError> {
        self.charge_gas(gas_cost::EQ)?;
        let frame = self.current_frame_mut()?;
        let [a, b] = *frame.stack.pop::<2>()?;
        frame.stack.push(bool_word(a == b))?;
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_iszero(&mut self) -> Result<OpcodeResult, VMError> {
        self.charge_gas(gas_cost::ISZERO)?;
        let frame = self.current_frame_mut()?;
        let a = frame.stack.pop1()?;
        frame.stack.push(bool_word(a.is_zero()))?;
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_and(&mut self) -> Result<OpcodeResult, VMError> {
        self.charge_gas(gas_cost::AND)?;
        let frame = self.current_frame_mut()?;
        let [a, b] = *frame.stack.pop::<2>()?;
        frame.stack.push(a & b)?;
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_or(&mut self) -> Result<OpcodeResult, VMError> {
        self.charge_gas(gas_cost::OR)?;
        let frame = self.current_frame_mut()?;
        let [a, b] = *frame.stack.pop::<2>()?;
        frame.stack.push(a | b)?;
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_xor(&mut self) -> Result<OpcodeResult, VMError> {
        self.charge_gas(gas_cost::XOR)?;
        let frame = self.current_frame_mut()?;
        let [a, b] = *frame.stack.pop::<2>()?;
        frame.stack.push(a ^ b)?;
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_not(&mut self) -> Result<OpcodeResult, VMError> {
        self.charge_gas(gas_cost::NOT)?;
        let frame = self.current_frame_mut()?;
        let a = frame.stack.pop1()?;
        frame.stack.push(!a)?;
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_byte(&mut self) -> Result<OpcodeResult, VMError> {
        self.charge_gas(gas_cost::BYTE)?;
        let frame = self.current_frame_mut()?;
        let [index, value] = *frame.stack.pop::<2>()?;
        frame.stack.push(byte_at(index, value))?;
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_shl(&mut self) -> Result<OpcodeResult, VMError> {
        self.charge_gas(gas_cost::SHL)?;
        let frame = self.current_frame_mut()?;
        let [shift, value] = *frame.stack.pop::<2>()?;
        let result = if shift >= U256::from(256) {
            U256::zero()
        } else {
            value << shift.as_usize()
        };
        frame.stack.push(result)?;
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_shr(&mut self) -> Result<OpcodeResult, VMError> {
        self.charge_gas(gas_cost::SHR)?;
        let frame = self.current_frame_mut()?;
        let [shift, value] = *frame.stack.pop::<2>()?;
        let result = if shift >= U256::from(256) {
            U256::zero()
        } else {
            value >> shift.as_usize()
        };
        frame.stack.push(result)?;
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_sar(&mut self) -> Result<OpcodeResult, VMError> {
        self.charge_gas(gas_cost::SAR)?;
        let frame = self.current_frame_mut()?;
        let [shift, value] = *frame.stack.pop::<2>()?;
        frame.stack.push(arithmetic_shift_right(shift, value))?;
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }
}

fn bool_word(value: bool) -> U256 {
    if value {
        U256::one()
    } else {
        U256::zero()
    }
}

/// Two's-complement ordering is monotonic with plain unsigned ordering
/// *within* a sign, and the negative half always sorts below the positive
/// half — so a same-sign pair compares unsigned, a mixed-sign pair is
/// decided purely by which operand is negative.
fn signed_lt(a: U256, b: U256) -> bool {
    let a_neg = a.bit(255);
    let b_neg = b.bit(255);
    if a_neg != b_neg {
        a_neg
    } else {
        a < b
    }
}

fn byte_at(index: U256, value: U256) -> U256 {
    if index >= U256::from(32) {
        return U256::zero();
    }
    let index = index.as_usize();
    let mut bytes = [0u8; 32];
    value.to_big_endian(&mut bytes);
    U256::from(bytes[index])
}

fn arithmetic_shift_right(shift: U256, value: U256) -> U256 {
    let negative = value.bit(255);
    if shift >= U256::from(256) {
        return if negative { U256::MAX } else { U256::zero() };
    }
    let shift = shift.as_usize();
    if shift == 0 {
        return value;
    }
    let shifted = value >> shift;
    if !negative {
        return shifted;
    }
    let fill = U256::MAX << (256 - shift);
    shifted | fill
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_lt_mixed_signs() {
        assert!(signed_lt(U256::MAX, U256::one()));
        assert!(!signed_lt(U256::one(), U256::MAX));
    }

    #[test]
    fn signed_lt_same_sign_negative() {
        // -2 < -1
        let minus_two = U256::MAX - U256::one();
        assert!(signed_lt(minus_two, U256::MAX));
    }

    #[test]
    fn byte_extracts_most_significant_first() {
        let value = U256::from(0x1122u64);
        assert_eq!(byte_at(U256::from(30), value), U256::from(0x11));
        assert_eq!(byte_at(U256::from(31), value), U256::from(0x22));
        assert_eq!(byte_at(U256::from(32), value), U256::zero());
    }

    #[test]
    fn sar_preserves_sign() {
        assert_eq!(arithmetic_shift_right(U256::one(), U256::MAX), U256::MAX);
        assert_eq!(arithmetic_shift_right(U256::from(256), U256::MAX), U256::MAX);
        assert_eq!(arithmetic_shift_right(U256::from(256), U256::one()), U256::zero());
    }
}
