//! Numeric constants shared across the interpreter and gas tables.

/// Width of an EVM word, in bytes.
pub const WORD_SIZE_IN_BYTES_USIZE: usize = 32;
pub const WORD_SIZE_IN_BYTES_U64: u64 = 32;

/// Denominator of the quadratic term in the memory expansion gas formula:
/// `cost(words) = words^2 / MEMORY_EXPANSION_QUOTIENT + 3 * words`.
pub const MEMORY_EXPANSION_QUOTIENT: u64 = 512;

/// Maximum stack depth (EIP-150-era limit, unchanged since).
pub const STACK_LIMIT: usize = 1024;

/// Maximum call/create nesting depth.
pub const CALL_STACK_LIMIT: usize = 1024;

/// Maximum size, in bytes, of deployed contract code (EIP-170, Spurious Dragon+).
pub const MAX_CODE_SIZE: usize = 0x6000;

/// Maximum size, in bytes, of CREATE/CREATE2 init code (EIP-3860, Shanghai+).
pub const MAX_INITCODE_SIZE: usize = 2 * MAX_CODE_SIZE;

/// Gas charged per byte of deployed contract code.
pub const CODE_DEPOSIT_COST_PER_BYTE: u64 = 200;

/// Gas charged per 32-byte word of init code (EIP-3860).
pub const INIT_CODE_WORD_COST: u64 = 2;

/// Delegation designator prefix introduced by EIP-7702: `0xef 0x01 0x00 || address`.
pub const EIP7702_DELEGATION_PREFIX: [u8; 3] = [0xef, 0x01, 0x00];
pub const EIP7702_DELEGATED_CODE_LEN: usize = 23;

/// Leading byte EVM bytecode must not start with post-London (EIP-3541).
pub const INVALID_CONTRACT_PREFIX: u8 = 0xef;

/// Denominator of the gas-forwarding rule for CALL-family opcodes (EIP-150).
pub const GAS_FORWARDING_NUMERATOR: u64 = 63;
pub const GAS_FORWARDING_DENOMINATOR: u64 = 64;

/// Stipend handed unconditionally to a callee receiving value (pre-EIP-2929 and beyond).
pub const CALL_STIPEND: u64 = 2300;
/// Extra gas charged on CALL when value transferred is nonzero.
pub const CALL_VALUE_COST: u64 = 9000;
/// Extra gas charged when CALL targets a previously-empty account and transfers value.
pub const CALL_NEW_ACCOUNT_COST: u64 = 25000;

/// Refund divisor for the end-of-transaction refund cap.
pub const REFUND_QUOTIENT_LONDON: u64 = 5;
pub const REFUND_QUOTIENT_PRE_LONDON: u64 = 2;

/// Hard cap on opcodes executed by a single top-level transaction; guards
/// against runaway loops when the embedder supplies an implausibly large
/// gas limit. Not part of consensus gas accounting.
pub const MAX_OPCODE_ITERATIONS: u64 = 10_000_000;

/// SSTORE gas/refund constants (EIP-2200 / EIP-2929 / EIP-3529).
pub mod sstore {
    pub const COLD_SLOAD_COST: u64 = 2100;
    pub const WARM_ACCESS_COST: u64 = 100;
    pub const SSTORE_SET_COST: u64 = 20000;
    pub const SSTORE_RESET_COST: u64 = 5000;
    pub const SSTORE_CLEARS_SCHEDULE_LONDON: u64 = 4800;
    pub const SSTORE_CLEARS_SCHEDULE_PRE_LONDON: u64 = 15000;
    pub const SSTORE_STIPEND: u64 = 2300;
    pub const SLOAD_COST_PRE_TANGERINE: u64 = 50;
    pub const SLOAD_COST_PRE_BERLIN: u64 = 200;
}

/// Cold/warm access costs introduced by EIP-2929 (Berlin).
pub mod access_list {
    pub const COLD_ACCOUNT_ACCESS_COST: u64 = 2600;
    pub const WARM_ACCESS_COST: u64 = 100;
    pub const COLD_ACCOUNT_ACCESS_COST_SURCHARGE: u64 =
        COLD_ACCOUNT_ACCESS_COST - WARM_ACCESS_COST;
}
