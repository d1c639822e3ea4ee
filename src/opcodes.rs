//! The `Opcode` enum and the fork-gated dispatch table.

use crate::{errors::VMError, vm::VM};
use strum::EnumString;

/// One byte of EVM bytecode, named per the Yellow Paper / execution-specs.
/// Only the 14-hardfork range Frontier..=Prague this engine supports is
/// represented — no Osaka/Amsterdam-era opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString)]
#[repr(u8)]
pub enum Opcode {
    STOP = 0x00,
    ADD = 0x01,
    MUL = 0x02,
    SUB = 0x03,
    DIV = 0x04,
    SDIV = 0x05,
    MOD = 0x06,
    SMOD = 0x07,
    ADDMOD = 0x08,
    MULMOD = 0x09,
    EXP = 0x0a,
    SIGNEXTEND = 0x0b,

    LT = 0x10,
    GT = 0x11,
    SLT = 0x12,
    SGT = 0x13,
    EQ = 0x14,
    ISZERO = 0x15,
    AND = 0x16,
    OR = 0x17,
    XOR = 0x18,
    NOT = 0x19,
    BYTE = 0x1a,
    SHL = 0x1b,
    SHR = 0x1c,
    SAR = 0x1d,

    KECCAK256 = 0x20,

    ADDRESS = 0x30,
    BALANCE = 0x31,
    ORIGIN = 0x32,
    CALLER = 0x33,
    CALLVALUE = 0x34,
    CALLDATALOAD = 0x35,
    CALLDATASIZE = 0x36,
    CALLDATACOPY = 0x37,
    CODESIZE = 0x38,
    CODECOPY = 0x39,
    GASPRICE = 0x3a,
    EXTCODESIZE = 0x3b,
    EXTCODECOPY = 0x3c,
    RETURNDATASIZE = 0x3d,
    RETURNDATACOPY = 0x3e,
    EXTCODEHASH = 0x3f,

    BLOCKHASH = 0x40,
    COINBASE = 0x41,
    TIMESTAMP = 0x42,
    NUMBER = 0x43,
    DIFFICULTY = 0x44,
    GASLIMIT = 0x45,
    CHAINID = 0x46,
    SELFBALANCE = 0x47,
    BASEFEE = 0x48,
    BLOBHASH = 0x49,
    BLOBBASEFEE = 0x4a,

    POP = 0x50,
    MLOAD = 0x51,
    MSTORE = 0x52,
    MSTORE8 = 0x53,
    SLOAD = 0x54,
    SSTORE = 0x55,
    JUMP = 0x56,
    JUMPI = 0x57,
    PC = 0x58,
    MSIZE = 0x59,
    GAS = 0x5a,
    JUMPDEST = 0x5b,
    TLOAD = 0x5c,
    TSTORE = 0x5d,
    MCOPY = 0x5e,
    PUSH0 = 0x5f,

    PUSH1 = 0x60,
    PUSH2 = 0x61,
    PUSH3 = 0x62,
    PUSH4 = 0x63,
    PUSH5 = 0x64,
    PUSH6 = 0x65,
    PUSH7 = 0x66,
    PUSH8 = 0x67,
    PUSH9 = 0x68,
    PUSH10 = 0x69,
    PUSH11 = 0x6a,
    PUSH12 = 0x6b,
    PUSH13 = 0x6c,
    PUSH14 = 0x6d,
    PUSH15 = 0x6e,
    PUSH16 = 0x6f,
    PUSH17 = 0x70,
    PUSH18 = 0x71,
    PUSH19 = 0x72,
    PUSH20 = 0x73,
    PUSH21 = 0x74,
    PUSH22 = 0x75,
    PUSH23 = 0x76,
    PUSH24 = 0x77,
    PUSH25 = 0x78,
    PUSH26 = 0x79,
    PUSH27 = 0x7a,
    PUSH28 = 0x7b,
    PUSH29 = 0x7c,
    PUSH30 = 0x7d,
    PUSH31 = 0x7e,
    PUSH32 = 0x7f,

    DUP1 = 0x80,
    DUP2 = 0x81,
    DUP3 = 0x82,
    DUP4 = 0x83,
    DUP5 = 0x84,
    DUP6 = 0x85,
    DUP7 = 0x86,
    DUP8 = 0x87,
    DUP9 = 0x88,
    DUP10 = 0x89,
    DUP11 = 0x8a,
    DUP12 = 0x8b,
    DUP13 = 0x8c,
    DUP14 = 0x8d,
    DUP15 = 0x8e,
    DUP16 = 0x8f,

    SWAP1 = 0x90,
    SWAP2 = 0x91,
    SWAP3 = 0x92,
    SWAP4 = 0x93,
    SWAP5 = 0x94,
    SWAP6 = 0x95,
    SWAP7 = 0x96,
    SWAP8 = 0x97,
    SWAP9 = 0x98,
    SWAP10 = 0x99,
    SWAP11 = 0x9a,
    SWAP12 = 0x9b,
    SWAP13 = 0x9c,
    SWAP14 = 0x9d,
    SWAP15 = 0x9e,
    SWAP16 = 0x9f,

    LOG0 = 0xa0,
    LOG1 = 0xa1,
    LOG2 = 0xa2,
    LOG3 = 0xa3,
    LOG4 = 0xa4,

    CREATE = 0xf0,
    CALL = 0xf1,
    CALLCODE = 0xf2,
    RETURN = 0xf3,
    DELEGATECALL = 0xf4,
    CREATE2 = 0xf5,
    STATICCALL = 0xfa,
    REVERT = 0xfd,
    INVALID = 0xfe,
    SELFDESTRUCT = 0xff,
}

impl From<u8> for Opcode {
    fn from(byte: u8) -> Self {
        OPCODE_TABLE_BY_BYTE[byte as usize].unwrap_or(Opcode::INVALID)
    }
}

/// A function pointer to one of `VM`'s `op_*` methods. Wrapped in a newtype
/// so `[OpCodeFn; 256]` implements `Copy`/`Default`-free construction the
/// same way a plain array of fn pointers would.
///
/// Unlike the teacher's frame, which holds an opaque back-pointer to its
/// owning EVM instance, `VM` owns its database and tracer as trait objects
/// rather than borrowing them, so this table needs no lifetime parameter —
/// see the Design Notes' "Frame back-pointer to EVM" entry.
#[derive(Clone, Copy)]
pub struct OpCodeFn(pub fn(&mut VM) -> Result<crate::errors::OpcodeResult, VMError>);

impl OpCodeFn {
    #[inline]
    pub fn call(&self, vm: &mut VM) -> Result<crate::errors::OpcodeResult, VMError> {
        (self.0)(vm)
    }
}

fn op_invalid(vm: &mut VM) -> Result<crate::errors::OpcodeResult, VMError> {
    vm.op_invalid()
}

/// Builds the 256-entry dispatch table for a given opcode. Unlike the
/// teacher's cascading per-fork-era builders (which exist because that
/// engine supports Paris..Osaka and patches entries forward one era at a
/// time), this engine's whole supported range (Frontier..=Prague) is small
/// enough to express as straight-line gating inside a single builder.
impl VM {
    pub(crate) fn build_opcode_table(fork: crate::environment::Hardfork) -> [OpCodeFn; 256] {
        use crate::environment::Hardfork as F;

        let mut table = [OpCodeFn(op_invalid); 256];
        macro_rules! set {
            ($op:expr, $handler:expr) => {
                table[$op as usize] = OpCodeFn($handler);
            };
        }

        set!(Opcode::STOP, VM::op_stop);
        set!(Opcode::ADD, VM::op_add);
        set!(Opcode::MUL, VM::op_mul);
        set!(Opcode::SUB, VM::op_sub);
        set!(Opcode::DIV, VM::op_div);
        set!(Opcode::SDIV, VM::op_sdiv);
        set!(Opcode::MOD, VM::op_mod);
        set!(Opcode::SMOD, VM::op_smod);
        set!(Opcode::ADDMOD, VM::op_addmod);
        set!(Opcode::MULMOD, VM::op_mulmod);
        set!(Opcode::EXP, VM::op_exp);
        set!(Opcode::SIGNEXTEND, VM::op_signextend);

        set!(Opcode::LT, VM::op_lt);
        set!(Opcode::GT, VM::op_gt);
        set!(Opcode::SLT, VM::op_slt);
        set!(Opcode::SGT, VM::op_sgt);
        set!(Opcode::EQ, VM::op_eq);
        set!(Opcode::ISZERO, VM::op_iszero);
        set!(Opcode::AND, VM::op_and);
        set!(Opcode::OR, VM::op_or);
        set!(Opcode::XOR, VM::op_xor);
        set!(Opcode::NOT, VM::op_not);
        set!(Opcode::BYTE, VM::op_byte);
        // SHL/SHR/SAR: Constantinople+.
        if fork >= F::Constantinople {
            set!(Opcode::SHL, VM::op_shl);
            set!(Opcode::SHR, VM::op_shr);
            set!(Opcode::SAR, VM::op_sar);
        }

        set!(Opcode::KECCAK256, VM::op_keccak256);

        set!(Opcode::ADDRESS, VM::op_address);
        set!(Opcode::BALANCE, VM::op_balance);
        set!(Opcode::ORIGIN, VM::op_origin);
        set!(Opcode::CALLER, VM::op_caller);
        set!(Opcode::CALLVALUE, VM::op_callvalue);
        set!(Opcode::CALLDATALOAD, VM::op_calldataload);
        set!(Opcode::CALLDATASIZE, VM::op_calldatasize);
        set!(Opcode::CALLDATACOPY, VM::op_calldatacopy);
        set!(Opcode::CODESIZE, VM::op_codesize);
        set!(Opcode::CODECOPY, VM::op_codecopy);
        set!(Opcode::GASPRICE, VM::op_gasprice);
        set!(Opcode::EXTCODESIZE, VM::op_extcodesize);
        set!(Opcode::EXTCODECOPY, VM::op_extcodecopy);
        set!(Opcode::RETURNDATASIZE, VM::op_returndatasize);
        set!(Opcode::RETURNDATACOPY, VM::op_returndatacopy);
        // EXTCODEHASH: Constantinople+.
        if fork >= F::Constantinople {
            set!(Opcode::EXTCODEHASH, VM::op_extcodehash);
        }

        set!(Opcode::BLOCKHASH, VM::op_blockhash);
        set!(Opcode::COINBASE, VM::op_coinbase);
        set!(Opcode::TIMESTAMP, VM::op_timestamp);
        set!(Opcode::NUMBER, VM::op_number);
        set!(Opcode::DIFFICULTY, VM::op_difficulty);
        set!(Opcode::GASLIMIT, VM::op_gaslimit);
        // CHAINID: Istanbul+.
        if fork >= F::Istanbul {
            set!(Opcode::CHAINID, VM::op_chainid);
        }
        // SELFBALANCE: Istanbul+.
        if fork >= F::Istanbul {
            set!(Opcode::SELFBALANCE, VM::op_selfbalance);
        }
        // BASEFEE: London+.
        if fork >= F::London {
            set!(Opcode::BASEFEE, VM::op_basefee);
        }
        // BLOBHASH/BLOBBASEFEE: Cancun+.
        if fork >= F::Cancun {
            set!(Opcode::BLOBHASH, VM::op_blobhash);
            set!(Opcode::BLOBBASEFEE, VM::op_blobbasefee);
        }

        set!(Opcode::POP, VM::op_pop);
        set!(Opcode::MLOAD, VM::op_mload);
        set!(Opcode::MSTORE, VM::op_mstore);
        set!(Opcode::MSTORE8, VM::op_mstore8);
        set!(Opcode::SLOAD, VM::op_sload);
        set!(Opcode::SSTORE, VM::op_sstore);
        set!(Opcode::JUMP, VM::op_jump);
        set!(Opcode::JUMPI, VM::op_jumpi);
        set!(Opcode::PC, VM::op_pc);
        set!(Opcode::MSIZE, VM::op_msize);
        set!(Opcode::GAS, VM::op_gas);
        set!(Opcode::JUMPDEST, VM::op_jumpdest);
        // TLOAD/TSTORE: Cancun+.
        if fork >= F::Cancun {
            set!(Opcode::TLOAD, VM::op_tload);
            set!(Opcode::TSTORE, VM::op_tstore);
            set!(Opcode::MCOPY, VM::op_mcopy);
        }
        // PUSH0: Shanghai+.
        if fork >= F::Shanghai {
            set!(Opcode::PUSH0, VM::op_push0);
        }

        macro_rules! set_push {
            ($op:expr, $n:expr) => {
                table[$op as usize] = OpCodeFn(VM::op_push::<$n>);
            };
        }
        set_push!(Opcode::PUSH1, 1);
        set_push!(Opcode::PUSH2, 2);
        set_push!(Opcode::PUSH3, 3);
        set_push!(Opcode::PUSH4, 4);
        set_push!(Opcode::PUSH5, 5);
        set_push!(Opcode::PUSH6, 6);
        set_push!(Opcode::PUSH7, 7);
        set_push!(Opcode::PUSH8, 8);
        set_push!(Opcode::PUSH9, 9);
        set_push!(Opcode::PUSH10, 10);
        set_push!(Opcode::PUSH11, 11);
        set_push!(Opcode::PUSH12, 12);
        set_push!(Opcode::PUSH13, 13);
        set_push!(Opcode::PUSH14, 14);
        set_push!(Opcode::PUSH15, 15);
        set_push!(Opcode::PUSH16, 16);
        set_push!(Opcode::PUSH17, 17);
        set_push!(Opcode::PUSH18, 18);
        set_push!(Opcode::PUSH19, 19);
        set_push!(Opcode::PUSH20, 20);
        set_push!(Opcode::PUSH21, 21);
        set_push!(Opcode::PUSH22, 22);
        set_push!(Opcode::PUSH23, 23);
        set_push!(Opcode::PUSH24, 24);
        set_push!(Opcode::PUSH25, 25);
        set_push!(Opcode::PUSH26, 26);
        set_push!(Opcode::PUSH27, 27);
        set_push!(Opcode::PUSH28, 28);
        set_push!(Opcode::PUSH29, 29);
        set_push!(Opcode::PUSH30, 30);
        set_push!(Opcode::PUSH31, 31);
        set_push!(Opcode::PUSH32, 32);

        macro_rules! set_dup {
            ($op:expr, $n:expr) => {
                table[$op as usize] = OpCodeFn(VM::op_dup::<$n>);
            };
        }
        set_dup!(Opcode::DUP1, 1);
        set_dup!(Opcode::DUP2, 2);
        set_dup!(Opcode::DUP3, 3);
        set_dup!(Opcode::DUP4, 4);
        set_dup!(Opcode::DUP5, 5);
        set_dup!(Opcode::DUP6, 6);
        set_dup!(Opcode::DUP7, 7);
        set_dup!(Opcode::DUP8, 8);
        set_dup!(Opcode::DUP9, 9);
        set_dup!(Opcode::DUP10, 10);
        set_dup!(Opcode::DUP11, 11);
        set_dup!(Opcode::DUP12, 12);
        set_dup!(Opcode::DUP13, 13);
        set_dup!(Opcode::DUP14, 14);
        set_dup!(Opcode::DUP15, 15);
        set_dup!(Opcode::DUP16, 16);

        macro_rules! set_swap {
            ($op:expr, $n:expr) => {
                table[$op as usize] = OpCodeFn(VM::op_swap::<$n>);
            };
        }
        set_swap!(Opcode::SWAP1, 1);
        set_swap!(Opcode::SWAP2, 2);
        set_swap!(Opcode::SWAP3, 3);
        set_swap!(Opcode::SWAP4, 4);
        set_swap!(Opcode::SWAP5, 5);
        set_swap!(Opcode::SWAP6, 6);
        set_swap!(Opcode::SWAP7, 7);
        set_swap!(Opcode::SWAP8, 8);
        set_swap!(Opcode::SWAP9, 9);
        set_swap!(Opcode::SWAP10, 10);
        set_swap!(Opcode::SWAP11, 11);
        set_swap!(Opcode::SWAP12, 12);
        set_swap!(Opcode::SWAP13, 13);
        set_swap!(Opcode::SWAP14, 14);
        set_swap!(Opcode::SWAP15, 15);
        set_swap!(Opcode::SWAP16, 16);

        set!(Opcode::LOG0, VM::op_log::<0>);
        set!(Opcode::LOG1, VM::op_log::<1>);
        set!(Opcode::LOG2, VM::op_log::<2>);
        set!(Opcode::LOG3, VM::op_log::<3>);
        set!(Opcode::LOG4, VM::op_log::<4>);

        set!(Opcode::CREATE, VM::op_create);
        set!(Opcode::CALL, VM::op_call);
        set!(Opcode::CALLCODE, VM::op_callcode);
        set!(Opcode::RETURN, VM::op_return);
        set!(Opcode::DELEGATECALL, VM::op_delegatecall);
        set!(Opcode::CREATE2, VM::op_create2);
        set!(Opcode::STATICCALL, VM::op_staticcall);
        set!(Opcode::REVERT, VM::op_revert);
        set!(Opcode::INVALID, VM::op_invalid);
        set!(Opcode::SELFDESTRUCT, VM::op_selfdestruct);

        table
    }
}

/// Byte -> `Opcode` lookup used by `Opcode::from`, built once.
static OPCODE_TABLE_BY_BYTE: [Option<Opcode>; 256] = build_byte_table();

const fn build_byte_table() -> [Option<Opcode>; 256] {
    let mut table = [None; 256];
    // Listing every defined variant explicitly (rather than deriving this
    // from the enum) keeps the table a `const fn`, since `Opcode as u8`
    // casts are not currently usable in a loop over enum variants at
    // compile time.
    macro_rules! put {
        ($op:expr) => {
            table[$op as usize] = Some($op);
        };
    }
    put!(Opcode::STOP);
    put!(Opcode::ADD);
    put!(Opcode::MUL);
    put!(Opcode::SUB);
    put!(Opcode::DIV);
    put!(Opcode::SDIV);
    put!(Opcode::MOD);
    put!(Opcode::SMOD);
    put!(Opcode::ADDMOD);
    put!(Opcode::MULMOD);
    put!(Opcode::EXP);
    put!(Opcode::SIGNEXTEND);
    put!(Opcode::LT);
    put!(Opcode::GT);
    put!(Opcode::SLT);
    put!(Opcode::SGT);
    put!(Opcode::EQ);
    put!(Opcode::ISZERO);
    put!(Opcode::AND);
    put!(Opcode::OR);
    put!(Opcode::XOR);
    put!(Opcode::NOT);
    put!(Opcode::BYTE);
    put!(Opcode::SHL);
    put!(Opcode::SHR);
    put!(Opcode::SAR);
    put!(Opcode::KECCAK256);
    put!(Opcode::ADDRESS);
    put!(Opcode::BALANCE);
    put!(Opcode::ORIGIN);
    put!(Opcode::CALLER);
    put!(Opcode::CALLVALUE);
    put!(Opcode::CALLDATALOAD);
    put!(Opcode::CALLDATASIZE);
    put!(Opcode::CALLDATACOPY);
    put!(Opcode::CODESIZE);
    put!(Opcode::CODECOPY);
    put!(Opcode::GASPRICE);
    put!(Opcode::EXTCODESIZE);
    put!(Opcode::EXTCODECOPY);
    put!(Opcode::RETURNDATASIZE);
    put!(Opcode::RETURNDATACOPY);
    put!(Opcode::EXTCODEHASH);
    put!(Opcode::BLOCKHASH);
    put!(Opcode::COINBASE);
    put!(Opcode::TIMESTAMP);
    put!(Opcode::NUMBER);
    put!(Opcode::DIFFICULTY);
    put!(Opcode::GASLIMIT);
    put!(Opcode::CHAINID);
    put!(Opcode::SELFBALANCE);
    put!(Opcode::BASEFEE);
    put!(Opcode::BLOBHASH);
    put!(Opcode::BLOBBASEFEE);
    put!(Opcode::POP);
    put!(Opcode::MLOAD);
    put!(Opcode::MSTORE);
    put!(Opcode::MSTORE8);
    put!(Opcode::SLOAD);
    put!(Opcode::SSTORE);
    put!(Opcode::JUMP);
    put!(Opcode::JUMPI);
    put!(Opcode::PC);
    put!(Opcode::MSIZE);
    put!(Opcode::GAS);
    put!(Opcode::JUMPDEST);
    put!(Opcode::TLOAD);
    put!(Opcode::TSTORE);
    put!(Opcode::MCOPY);
    put!(Opcode::PUSH0);
    put!(Opcode::PUSH1);
    put!(Opcode::PUSH2);
    put!(Opcode::PUSH3);
    put!(Opcode::PUSH4);
    put!(Opcode::PUSH5);
    put!(Opcode::PUSH6);
    put!(Opcode::PUSH7);
    put!(Opcode::PUSH8);
    put!(Opcode::PUSH9);
    put!(Opcode::PUSH10);
    put!(Opcode::PUSH11);
    put!(Opcode::PUSH12);
    put!(Opcode::PUSH13);
    put!(Opcode::PUSH14);
    put!(Opcode::PUSH15);
    put!(Opcode::PUSH16);
    put!(Opcode::PUSH17);
    put!(Opcode::PUSH18);
    put!(Opcode::PUSH19);
    put!(Opcode::PUSH20);
    put!(Opcode::PUSH21);
    put!(Opcode::PUSH22);
    put!(Opcode::PUSH23);
    put!(Opcode::PUSH24);
    put!(Opcode::PUSH25);
    put!(Opcode::PUSH26);
    put!(Opcode::PUSH27);
    put!(Opcode::PUSH28);
    put!(Opcode::PUSH29);
    put!(Opcode::PUSH30);
    put!(Opcode::PUSH31);
    put!(Opcode::PUSH32);
    put!(Opcode::DUP1);
    put!(Opcode::DUP2);
    put!(Opcode::DUP3);
    put!(Opcode::DUP4);
    put!(Opcode::DUP5);
    put!(Opcode::DUP6);
    put!(Opcode::DUP7);
    put!(Opcode::DUP8);
    put!(Opcode::DUP9);
    put!(Opcode::DUP10);
    put!(Opcode::DUP11);
    put!(Opcode::DUP12);
    put!(Opcode::DUP13);
    put!(Opcode::DUP14);
    put!(Opcode::DUP15);
    put!(Opcode::DUP16);
    put!(Opcode::SWAP1);
    put!(Opcode::SWAP2);
    put!(Opcode::SWAP3);
    put!(Opcode::SWAP4);
    put!(Opcode::SWAP5);
    put!(Opcode::SWAP6);
    put!(Opcode::SWAP7);
    put!(Opcode::SWAP8);
    put!(Opcode::SWAP9);
    put!(Opcode::SWAP10);
    put!(Opcode::SWAP11);
    put!(Opcode::SWAP12);
    put!(Opcode::SWAP13);
    put!(Opcode::SWAP14);
    put!(Opcode::SWAP15);
    put!(Opcode::SWAP16);
    put!(Opcode::LOG0);
    put!(Opcode::LOG1);
    put!(Opcode::LOG2);
    put!(Opcode::LOG3);
    put!(Opcode::LOG4);
    put!(Opcode::CREATE);
    put!(Opcode::CALL);
    put!(Opcode::CALLCODE);
    put!(Opcode::RETURN);
    put!(Opcode::DELEGATECALL);
    put!(Opcode::CREATE2);
    put!(Opcode::STATICCALL);
    put!(Opcode::REVERT);
    put!(Opcode::INVALID);
    put!(Opcode::SELFDESTRUCT);
    table
}
