//! Arithmetic (11): ADD, MUL, SUB, DIV, SDIV, MOD, SMOD, ADDMOD, MULMOD, EXP,
//! SIGNEXTEND.
//!
//! `U256`'s `+`/`-`/`*` operators panic on overflow, so every wrapping
//! (mod 2^256) result here goes through `overflowing_*` and keeps only the
//! wrapped value — that's the correct EVM semantics, not a workaround.

use ethereum_types::U256;

use crate::{
    errors::{OpcodeResult, VMError},
    gas_cost,
    vm::VM,
};

impl VM {
    pub fn op_add(&mut self) -> Result<OpcodeResult, VMError> {
        self.charge_gas(gas_cost::ADD)?;
        let frame = self.current_frame_mut()?;
        let [a, b] = *frame.stack.pop::<2>()?;
        frame.stack.push(a.overflowing_add(b).0)?;
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_mul(&mut self) -> Result<OpcodeResult, VMError> {
        self.charge_gas(gas_cost::MUL)?;
        let frame = self.current_frame_mut()?;
        let [a, b] = *frame.stack.pop::<2>()?;
        frame.stack.push(a.overflowing_mul(b).0)?;
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_sub(&mut self) -> Result<OpcodeResult, VMError> {
        self.charge_gas(gas_cost::SUB)?;
        let frame = self.current_frame_mut()?;
        let [a, b] = *frame.stack.pop::<2>()?;
        frame.stack.push(a.overflowing_sub(b).0)?;
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_div(&mut self) -> Result<OpcodeResult, VMError> {
        self.charge_gas(gas_cost::DIV)?;
        let frame = self.current_frame_mut()?;
        let [a, b] = *frame.stack.pop::<2>()?;
        let result = if b.is_zero() { U256::zero() } else { a / b };
        frame.stack.push(result)?;
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_sdiv(&mut self) -> Result<OpcodeResult, VMError> {
        self.charge_gas(gas_cost::SDIV)?;
        let frame = self.current_frame_mut()?;
        let [a, b] = *frame.stack.pop::<2>()?;
        frame.stack.push(signed_div(a, b))?;
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_mod(&mut self) -> Result<OpcodeResult, VMError> {
        self.charge_gas(gas_cost::MOD)?;
        let frame = self.current_frame_mut()?;
        let [a, b] = *frame.stack.pop::<2>()?;
        let result = if b.is_zero() { U256::zero() } else { a % b };
        frame.stack.push(result)?;
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_smod(&mut self) -> Result<OpcodeResult, VMError> {
        self.charge_gas(gas_cost::SMOD)?;
        let frame = self.current_frame_mut()?;
        let [a, b] = *frame.stack.pop::<2>()?;
        frame.stack.push(signed_mod(a, b))?;
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_addmod(&mut self) -> Result<OpcodeResult, VMError> {
        self.charge_gas(gas_cost::ADDMOD)?;
        let frame = self.current_frame_mut()?;
        let [a, b, n] = *frame.stack.pop::<3>()?;
        frame.stack.push(addmod(a, b, n))?;
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_mulmod(&mut self) -> Result<OpcodeResult, VMError> {
        self.charge_gas(gas_cost::MULMOD)?;
        let frame = self.current_frame_mut()?;
        let [a, b, n] = *frame.stack.pop::<3>()?;
        frame.stack.push(mulmod(a, b, n))?;
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_exp(&mut self) -> Result<OpcodeResult, VMError> {
        let fork = self.fork();
        let frame = self.current_frame_mut()?;
        let [base, exponent] = *frame.stack.pop::<2>()?;
        self.charge_gas(gas_cost::EXP_STATIC)?;
        self.charge_gas(gas_cost::exp_dynamic_cost(exponent, fork)?)?;
        self.current_frame_mut()?
            .stack
            .push(wrapping_pow(base, exponent))?;
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }

    pub fn op_signextend(&mut self) -> Result<OpcodeResult, VMError> {
        self.charge_gas(gas_cost::SIGNEXTEND)?;
        let frame = self.current_frame_mut()?;
        let [byte_num, value] = *frame.stack.pop::<2>()?;
        frame.stack.push(sign_extend(byte_num, value))?;
        self.advance_pc(1)?;
        Ok(OpcodeResult::Continue)
    }
}

fn is_negative(value: U256) -> bool {
    value.bit(255)
}

/// Two's-complement negation over 256 bits.
fn negate(value: U256) -> U256 {
    (!value).overflowing_add(U256::one()).0
}

const MIN_NEGATIVE: U256 = U256([0, 0, 0, 0x8000_0000_0000_0000]);

fn signed_div(a: U256, b: U256) -> U256 {
    if b.is_zero() {
        return U256::zero();
    }
    if a == MIN_NEGATIVE && b == U256::MAX {
        // -1 divisor on the most negative value: the true quotient
        // (2^255) doesn't fit back into a signed 256-bit word, so it wraps
        // to itself, matching every other EVM implementation.
        return MIN_NEGATIVE;
    }
    let a_neg = is_negative(a);
    let b_neg = is_negative(b);
    let a_mag = if a_neg { negate(a) } else { a };
    let b_mag = if b_neg { negate(b) } else { b };
    let quotient = a_mag / b_mag;
    if a_neg != b_neg {
        negate(quotient)
    } else {
        quotient
    }
}

fn signed_mod(a: U256, b: U256) -> U256 {
    if b.is_zero() {
        return U256::zero();
    }
    let a_neg = is_negative(a);
    let b_mag = if is_negative(b) { negate(b) } else { b };
    let a_mag = if a_neg { negate(a) } else { a };
    let remainder = a_mag % b_mag;
    if a_neg {
        negate(remainder)
    } else {
        remainder
    }
}

/// `(a + b) mod n`, correct even when `a + b` overflows 256 bits.
fn addmod(a: U256, b: U256, n: U256) -> U256 {
    if n.is_zero() {
        return U256::zero();
    }
    addmod_reduced(a % n, b % n, n)
}

/// Adds two values already known to be `< n` and reduces mod `n`, handling
/// the case where their sum overflows the 256-bit word.
fn addmod_reduced(a: U256, b: U256, n: U256) -> U256 {
    let (sum, overflowed) = a.overflowing_add(b);
    if !overflowed {
        return sum % n;
    }
    // True sum is `sum + 2^256`; reduce `2^256 mod n` separately and add it
    // back in, since `sum` alone (which is `< n` whenever the addends were)
    // already represents the overflowed remainder mod 2^256.
    let two_pow_256_mod_n = (U256::MAX % n).overflowing_add(U256::one()).0 % n;
    (sum + two_pow_256_mod_n) % n
}

/// `(a * b) mod n` via double-and-add, since `U256` has no wider
/// accumulator to hold a full 512-bit product.
fn mulmod(a: U256, b: U256, n: U256) -> U256 {
    if n.is_zero() {
        return U256::zero();
    }
    let mut a = a % n;
    let mut b = b % n;
    let mut result = U256::zero();
    while !b.is_zero() {
        if b.bit(0) {
            result = addmod_reduced(result, a, n);
        }
        a = addmod_reduced(a, a, n);
        b >>= 1;
    }
    result
}

/// `base.pow(exponent) mod 2^256`, i.e. ordinary wrapping exponentiation —
/// EXP's modulus is implicitly 2^256, not an arbitrary third stack operand.
fn wrapping_pow(mut base: U256, mut exponent: U256) -> U256 {
    let mut result = U256::one();
    while !exponent.is_zero() {
        if exponent.bit(0) {
            result = result.overflowing_mul(base).0;
        }
        base = base.overflowing_mul(base).0;
        exponent >>= 1;
    }
    result
}

fn sign_extend(byte_num: U256, value: U256) -> U256 {
    if byte_num >= U256::from(31) {
        return value;
    }
    // `byte_num < 31` here, so this always fits.
    let byte_num = byte_num.as_usize();
    let sign_bit_index = byte_num * 8 + 7;
    let sign_bit = value.bit(sign_bit_index);
    let mask = (U256::one() << (sign_bit_index + 1)) - U256::one();
    if sign_bit {
        value | !mask
    } else {
        value & mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sdiv_min_by_minus_one_saturates() {
        assert_eq!(signed_div(MIN_NEGATIVE, U256::MAX), MIN_NEGATIVE);
    }

    #[test]
    fn sdiv_matches_unsigned_for_positive_operands() {
        assert_eq!(signed_div(U256::from(10), U256::from(3)), U256::from(3));
    }

    #[test]
    fn sdiv_negative_dividend() {
        // -10 / 3 == -3
        assert_eq!(signed_div(negate(U256::from(10)), U256::from(3)), negate(U256::from(3)));
    }

    #[test]
    fn addmod_handles_overflowing_sum() {
        let n = U256::from(7);
        let a = U256::MAX;
        let b = U256::MAX;
        let expected = U256::from((U256::MAX % n).as_u64() * 2 % 7);
        assert_eq!(addmod(a, b, n), expected);
    }

    #[test]
    fn mulmod_small_values() {
        assert_eq!(mulmod(U256::from(10), U256::from(10), U256::from(8)), U256::from(4));
    }

    #[test]
    fn wrapping_pow_basic() {
        assert_eq!(wrapping_pow(U256::from(2), U256::from(10)), U256::from(1024));
    }

    #[test]
    fn sign_extend_negative_byte() {
        // byte 0 of 0xff is negative: sign-extends to all-ones.
        assert_eq!(sign_extend(U256::zero(), U256::from(0xffu64)), U256::MAX);
    }

    #[test]
    fn sign_extend_positive_byte() {
        assert_eq!(sign_extend(U256::zero(), U256::from(0x7fu64)), U256::from(0x7fu64));
    }

    #[test]
    fn sign_extend_no_op_above_30() {
        let value = U256::from(0x1234u64);
        assert_eq!(sign_extend(U256::from(31), value), value);
    }
}
