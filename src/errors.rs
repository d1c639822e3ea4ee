//! Error taxonomy for the interpreter and orchestrator.
//!
//! `VMError` is the error type threaded through every fallible operation via
//! `?`. Its three top-level variants separate guest-program faults
//! (`ExceptionalHalt`), host/embedder-visible control flow (`Revert`), and
//! engine-internal defects that should be unreachable given the invariants
//! in the state model (`Internal`).

use bytes::Bytes;
use ethereum_types::Address;
use thiserror::Error;

/// Errors a database/host implementation may report back to the engine.
#[derive(Debug, Clone, Error)]
pub enum DatabaseError {
    #[error("database error: {0}")]
    Custom(String),
}

/// Resource/Stack/Control/Context/Value/Create faults a *guest program* can
/// trigger. Every variant here halts the current frame, per §7's
/// propagation policy, consuming all remaining gas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ExceptionalHalt {
    // Resource
    #[error("out of gas")]
    OutOfGas,
    #[error("call depth exceeded")]
    CallDepthExceeded,
    #[error("execution timed out")]
    ExecutionTimeout,

    // Stack
    #[error("stack underflow")]
    StackUnderflow,
    #[error("stack overflow")]
    StackOverflow,

    // Control
    #[error("invalid jump destination")]
    InvalidJump,
    #[error("invalid opcode")]
    InvalidOpcode,

    // Context
    #[error("state-mutating opcode used in a static context")]
    OpcodeNotAllowedInStaticContext,
    #[error("contract creation attempted in a static context")]
    WriteProtection,

    // Value
    #[error("insufficient balance for value transfer")]
    InsufficientBalance,

    // Create
    #[error("init code exceeds the EIP-3860 size limit")]
    InitCodeTooLarge,
    #[error("deployed code exceeds the EIP-170 size limit")]
    CreatedCodeTooLarge,
    #[error("deployed code begins with the EIP-3541 reserved prefix")]
    InvalidCreatedCodePrefix,
    #[error("creator nonce would overflow")]
    NonceOverflow,
    #[error("address collision on contract creation")]
    AddressCollision,

    /// Value supplied where memory/offset arithmetic cannot represent it,
    /// e.g. an offset so large it cannot be resized to.
    #[error("value too large to represent")]
    VeryLargeNumber,
    /// A memory access or resize would exceed representable bounds.
    #[error("out of bounds memory access")]
    OutOfBounds,
}

/// Engine-internal defects: conditions the state-model invariants (§3.3)
/// should make unreachable. Distinct from `ExceptionalHalt` because these
/// indicate a bug in the engine, not a fault in the executing bytecode.
#[derive(Debug, Clone, Error)]
pub enum InternalError {
    #[error("arithmetic overflow in an internal computation")]
    Overflow,
    #[error("arithmetic underflow in an internal computation")]
    Underflow,
    #[error("type conversion failed unexpectedly")]
    TypeConversion,
    #[error("unsupported or unknown hardfork configuration")]
    InvalidFork,
    #[error("internal invariant violated: {0}")]
    Custom(String),
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// The top-level error type threaded through the interpreter and
/// orchestrator via `?`.
#[derive(Debug, Clone, Error)]
pub enum VMError {
    #[error(transparent)]
    ExceptionalHalt(#[from] ExceptionalHalt),
    #[error(transparent)]
    Internal(#[from] InternalError),
    /// Not a fault: REVERT carries output data back to the caller. Modeled
    /// as an error variant purely because `?`-propagation up through the
    /// interpreter loop is the idiomatic way to unwind a frame in Rust; see
    /// `ContextResult`, which is what call sites actually inspect to tell
    /// `Revert` apart from a true failure.
    #[error("execution reverted")]
    RevertOpcode(Bytes),
    /// Not a fault: a read missed the in-process cache and must be answered
    /// out of band (§4.4). Bypasses the frame-error path entirely — the
    /// interpreter loop intercepts this before any gas is charged or state
    /// touched, and the top-level `Vm::execute` turns it into
    /// `Resumable::Yield` rather than a failed call.
    #[error("suspended pending asynchronous state fetch")]
    Yield(ReadKind),
}

impl From<DatabaseError> for VMError {
    fn from(err: DatabaseError) -> Self {
        VMError::Internal(InternalError::Database(err))
    }
}

/// Result of executing a single opcode: either the interpreter loop should
/// keep stepping, or the frame has reached a terminal state.
#[derive(Debug, Clone)]
pub enum OpcodeResult {
    Continue,
    Halt,
}

/// Why a frame halted, and with what output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextResult {
    Stop,
    Return { output: Bytes },
    Revert { output: Bytes },
    Error { kind: ExceptionalHalt },
}

impl ContextResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ContextResult::Stop | ContextResult::Return { .. })
    }

    pub fn output(&self) -> Bytes {
        match self {
            ContextResult::Return { output } | ContextResult::Revert { output } => output.clone(),
            ContextResult::Stop | ContextResult::Error { .. } => Bytes::new(),
        }
    }
}

/// A request the engine cannot satisfy synchronously; see §4.4.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReadKind {
    Balance(Address),
    Code(Address),
    Nonce(Address),
    Storage(Address, ethereum_types::H256),
}

/// Either the engine ran to completion (`Done`), or it suspended pending an
/// out-of-band answer to `ReadKind` (`Yield`). Replaces the source's
/// exceptions-as-control-flow pattern with a first-class sum type, per §9.
#[derive(Debug, Clone)]
pub enum Resumable<T> {
    Done(T),
    Yield(ReadKind),
}
