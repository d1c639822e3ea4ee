//! EVM memory: a byte-addressable, word-aligned, quadratically-priced
//! buffer shared (via `Rc<RefCell<..>>`) across a call frame's children.

use std::{cell::RefCell, rc::Rc};

use crate::{
    constants::{MEMORY_EXPANSION_QUOTIENT, WORD_SIZE_IN_BYTES_U64, WORD_SIZE_IN_BYTES_USIZE},
    errors::{ExceptionalHalt::OutOfBounds, InternalError, VMError},
};
use bytes::Bytes;
use ethereum_types::U256;

/// A cheaply-clonable, callframe-shared memory buffer.
///
/// When a new call frame is created, a clone of the parent's `Memory` is
/// made with `current_base` set to the buffer's current length: the child
/// sees a fresh, zero-length memory region starting right after the
/// parent's, without copying any bytes on call entry.
#[derive(Debug, Clone)]
pub struct Memory {
    buffer: Rc<RefCell<Vec<u8>>>,
    len: usize,
    current_base: usize,
}

impl Memory {
    #[inline]
    pub fn new() -> Self {
        Self {
            buffer: Rc::new(RefCell::new(Vec::new())),
            len: 0,
            current_base: 0,
        }
    }

    /// Produces the memory view for the next child call frame.
    #[inline]
    pub fn next_memory(&self) -> Memory {
        let mut mem = self.clone();
        mem.current_base = mem.buffer.borrow().len();
        mem.len = 0;
        mem
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resizes this frame's memory region to fit `new_memory_size`,
    /// rounded up to the next 32-byte word per invariant 6 (§3.3).
    #[inline(always)]
    pub fn resize(&mut self, new_memory_size: usize) -> Result<(), VMError> {
        if new_memory_size == 0 {
            return Ok(());
        }

        let new_memory_size = new_memory_size
            .checked_next_multiple_of(WORD_SIZE_IN_BYTES_USIZE)
            .ok_or(OutOfBounds)?;

        if new_memory_size <= self.len() {
            return Ok(());
        }

        self.len = new_memory_size;

        let mut buffer = self.buffer.borrow_mut();
        let real_new_memory_size = new_memory_size
            .checked_add(self.current_base)
            .ok_or(OutOfBounds)?;

        if real_new_memory_size > buffer.len() {
            // Avoid many tiny reallocations by rounding the backing
            // allocation up to a 64-byte multiple.
            let new_size = real_new_memory_size.next_multiple_of(64);
            buffer.resize(new_size, 0);
        }

        Ok(())
    }

    /// Loads `size` bytes starting at `offset`, resizing (zero-filling) if
    /// the range extends past the current length.
    #[inline]
    pub fn load_range(&mut self, offset: usize, size: usize) -> Result<Bytes, VMError> {
        if size == 0 {
            return Ok(Bytes::new());
        }

        let new_size = offset.checked_add(size).ok_or(OutOfBounds)?;
        self.resize(new_size)?;

        let true_offset = offset.wrapping_add(self.current_base);
        let buf = self.buffer.borrow();
        let slice = buf
            .get(true_offset..true_offset.wrapping_add(size))
            .ok_or(OutOfBounds)?;
        Ok(Bytes::copy_from_slice(slice))
    }

    /// Loads exactly `N` bytes at `offset`.
    #[inline(always)]
    pub fn load_range_const<const N: usize>(&mut self, offset: usize) -> Result<[u8; N], VMError> {
        let new_size = offset.checked_add(N).ok_or(OutOfBounds)?;
        self.resize(new_size)?;

        let true_offset = offset.checked_add(self.current_base).ok_or(OutOfBounds)?;
        let buf = self.buffer.borrow();
        let slice = buf
            .get(true_offset..true_offset.wrapping_add(N))
            .ok_or(OutOfBounds)?;

        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    /// Loads a single 32-byte word at `offset`.
    #[inline(always)]
    pub fn load_word(&mut self, offset: usize) -> Result<U256, VMError> {
        let value: [u8; 32] = self.load_range_const(offset)?;
        Ok(U256::from_big_endian(&value))
    }

    #[inline(always)]
    fn store(&self, data: &[u8], at_offset: usize, data_size: usize) -> Result<(), VMError> {
        if data_size == 0 {
            return Ok(());
        }

        let real_offset = self.current_base.wrapping_add(at_offset);
        let mut buffer = self.buffer.borrow_mut();
        let real_data_size = data_size.min(data.len());

        let dest = buffer
            .get_mut(real_offset..real_offset.wrapping_add(real_data_size))
            .ok_or(OutOfBounds)?;
        dest.copy_from_slice(
            data.get(..real_data_size)
                .ok_or(InternalError::Custom("memory store source out of bounds".into()))?,
        );

        Ok(())
    }

    /// Stores `data` at `offset`, resizing as needed.
    #[inline(always)]
    pub fn store_data(&mut self, offset: usize, data: &[u8]) -> Result<(), VMError> {
        if data.is_empty() {
            return Ok(());
        }
        let new_size = offset.checked_add(data.len()).ok_or(OutOfBounds)?;
        self.resize(new_size)?;
        self.store(data, offset, data.len())
    }

    /// Stores `data` at `offset`, zero-padding up to `total_size` if `data`
    /// is shorter. Used by CALLDATACOPY/CODECOPY/EXTCODECOPY/RETURNDATACOPY
    /// when the source range runs past the end of the source buffer.
    #[inline(always)]
    pub fn store_data_zero_padded(
        &mut self,
        offset: usize,
        data: &[u8],
        total_size: usize,
    ) -> Result<(), VMError> {
        if total_size == 0 {
            return Ok(());
        }

        let new_size = offset.checked_add(total_size).ok_or(OutOfBounds)?;
        self.resize(new_size)?;

        let copy_size = data.len().min(total_size);
        if copy_size > 0 {
            self.store(data, offset, copy_size)?;
        }

        if copy_size < total_size {
            let zero_offset = offset.wrapping_add(copy_size);
            let zero_size = total_size - copy_size;
            self.store_zeros(zero_offset, zero_size)?;
        }

        Ok(())
    }

    /// Stores a single 32-byte word at `offset`, resizing as needed.
    #[inline(always)]
    pub fn store_word(&mut self, offset: usize, word: U256) -> Result<(), VMError> {
        let new_size = offset
            .checked_add(WORD_SIZE_IN_BYTES_USIZE)
            .ok_or(OutOfBounds)?;
        self.resize(new_size)?;

        let mut bytes = [0u8; 32];
        word.to_big_endian(&mut bytes);
        self.store(&bytes, offset, WORD_SIZE_IN_BYTES_USIZE)
    }

    /// Copies `size` bytes from `from_offset` to `to_offset` within this
    /// frame's memory (MCOPY, Cancun+). Like `memmove`: ranges may overlap.
    pub fn copy_within(
        &mut self,
        from_offset: usize,
        to_offset: usize,
        size: usize,
    ) -> Result<(), VMError> {
        if size == 0 {
            return Ok(());
        }

        self.resize(
            to_offset
                .max(from_offset)
                .checked_add(size)
                .ok_or(InternalError::Overflow)?,
        )?;

        let true_from_offset = from_offset.checked_add(self.current_base).ok_or(OutOfBounds)?;
        let true_to_offset = to_offset.checked_add(self.current_base).ok_or(OutOfBounds)?;
        let mut buffer = self.buffer.borrow_mut();

        let from_end = true_from_offset
            .checked_add(size)
            .ok_or(InternalError::Overflow)?;
        if from_end > buffer.len() || true_to_offset.checked_add(size).ok_or(InternalError::Overflow)? > buffer.len() {
            return Err(OutOfBounds.into());
        }

        buffer.copy_within(true_from_offset..from_end, true_to_offset);
        Ok(())
    }

    #[inline(always)]
    pub fn store_zeros(&mut self, offset: usize, size: usize) -> Result<(), VMError> {
        if size == 0 {
            return Ok(());
        }

        let new_size = offset.checked_add(size).ok_or(OutOfBounds)?;
        self.resize(new_size)?;

        let real_offset = self.current_base.wrapping_add(offset);
        let mut buffer = self.buffer.borrow_mut();
        let region = buffer
            .get_mut(real_offset..real_offset.wrapping_add(size))
            .ok_or(OutOfBounds)?;
        region.fill(0);

        Ok(())
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

/// When a memory expansion is triggered, only the *additional* bytes of
/// memory must be paid for.
#[inline]
pub fn expansion_cost(new_memory_size: usize, current_memory_size: usize) -> Result<u64, VMError> {
    let cost = if new_memory_size <= current_memory_size {
        0
    } else {
        // cost(x) > cost(y) for x > y, so this cannot underflow.
        cost(new_memory_size)?.wrapping_sub(cost(current_memory_size)?)
    };
    Ok(cost)
}

/// `cost(words) = floor(words^2 / 512) + 3 * words`, per §4.1.
#[inline]
fn cost(memory_size: usize) -> Result<u64, VMError> {
    let memory_size = u64::try_from(memory_size).map_err(|_| InternalError::TypeConversion)?;
    let words = memory_size.div_ceil(WORD_SIZE_IN_BYTES_U64);

    // For this to overflow, `words` would need to be on the order of 2^32,
    // which would already have failed in `resize` via `OutOfBounds`.
    let gas_cost = words
        .checked_mul(words)
        .and_then(|sq| sq.checked_div(MEMORY_EXPANSION_QUOTIENT))
        .and_then(|base| base.checked_add(words.checked_mul(3)?))
        .ok_or(InternalError::Overflow)?;

    Ok(gas_cost)
}

#[inline]
pub fn calculate_memory_size(offset: usize, size: usize) -> Result<usize, VMError> {
    if size == 0 {
        return Ok(0);
    }

    offset
        .checked_add(size)
        .and_then(|sum| sum.checked_next_multiple_of(WORD_SIZE_IN_BYTES_USIZE))
        .ok_or(OutOfBounds.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_rounds_up_to_word_multiple() {
        let mut mem = Memory::new();
        mem.resize(1).unwrap();
        assert_eq!(mem.len(), 32);
        mem.resize(33).unwrap();
        assert_eq!(mem.len(), 64);
    }

    #[test]
    fn store_and_load_word_roundtrip() {
        let mut mem = Memory::new();
        mem.store_word(0, U256::from(0x42)).unwrap();
        assert_eq!(mem.load_word(0).unwrap(), U256::from(0x42));
    }

    #[test]
    fn child_memory_starts_empty_after_parent_writes() {
        let mut parent = Memory::new();
        parent.store_word(0, U256::from(7)).unwrap();
        let mut child = parent.next_memory();
        assert_eq!(child.len(), 0);
        child.store_word(0, U256::from(9)).unwrap();
        // Parent's view is unaffected by the child writing at its own offset 0.
        assert_eq!(parent.load_word(0).unwrap(), U256::from(7));
    }

    #[test]
    fn expansion_cost_is_quadratic() {
        assert_eq!(expansion_cost(0, 0).unwrap(), 0);
        let c32 = expansion_cost(32, 0).unwrap();
        assert_eq!(c32, 3);
        let c_large = expansion_cost(1_000_000, 0).unwrap();
        assert!(c_large > 3);
    }
}
