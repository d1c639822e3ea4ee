//! `VM::op_*` handlers, grouped the way the Yellow Paper's own opcode table
//! groups them. Every handler follows the same shape: pop operands, charge
//! gas (static, then any dynamic component), do the op, push results,
//! `advance_pc`. The heavier CALL/CREATE-family handlers are thin wrappers
//! around `orchestrator::enter_call`/`enter_create`, which already own the
//! gas/value/warmth machinery — see `system`.

pub mod arithmetic;
pub mod bitwise_comparison;
pub mod block;
pub mod control_flow;
pub mod dup_swap;
pub mod environment;
pub mod logging;
pub mod memory_storage;
pub mod push;
pub mod system;

use crate::{errors::VMError, utils::word_to_usize};
use ethereum_types::U256;

/// A (size, offset) stack pair read the way every memory-ranged opcode reads
/// it: a zero size makes the offset irrelevant, so a huge offset paired with
/// size zero must not fail with `VeryLargeNumber` the way it would if it were
/// about to be used for a real access.
pub(crate) fn size_offset_to_usize(size: U256, offset: U256) -> Result<(usize, usize), VMError> {
    if size.is_zero() {
        return Ok((0, 0));
    }
    Ok((word_to_usize(size)?, word_to_usize(offset)?))
}
