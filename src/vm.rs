//! `VM`: the combined Interpreter (§4.1) and Call/Create Orchestrator
//! (§4.2). The frame stack is an explicit `Vec`, not host-stack recursion,
//! per the Design Notes — this is what lets call depth be bounded at 1024
//! regardless of the embedder's own stack, and what lets an async yield
//! unwind cleanly without disturbing any frame's state.
//!
//! `VM` owns its `Database` and `Tracer` as trait objects rather than
//! borrowing them, so opcode handlers need no lifetime parameter (see
//! `opcodes::OpCodeFn`) — a direct fix for the source's opaque
//! frame-back-pointer-to-EVM pattern the Design Notes call out.

use bytes::Bytes;
use ethereum_types::{Address, U256};
use tracing::{debug, trace};

use crate::{
    account::{Code, CodeMetadata},
    call_frame::CallFrame,
    constants::MAX_OPCODE_ITERATIONS,
    db::Database,
    environment::{Environment, Hardfork},
    errors::{ContextResult, ExceptionalHalt, InternalError, OpcodeResult, ReadKind, VMError},
    gas_cost, memory,
    opcodes::{OpCodeFn, Opcode},
    precompile::PrecompileRegistry,
    state::StateModel,
    trace::{TraceConfig, Tracer},
};

/// Where a just-completed child frame's result should be merged back into
/// its parent once the frame stack pops it.
#[derive(Debug, Clone)]
pub struct ChildResult {
    pub context_result: ContextResult,
    pub gas_left: u64,
    pub created_address: Option<Address>,
}

/// The combined interpreter/orchestrator. One `VM` runs exactly one
/// transaction: `frame_stack` starts with the top-level call/create frame
/// and grows/shrinks as CALL-family opcodes push and pop nested frames.
pub struct VM {
    pub frame_stack: Vec<CallFrame>,
    /// One entry per *nested* frame (`frame_stack.len() - 1` once a
    /// top-level frame exists), pushed at call entry and popped on that
    /// frame's exit — restored on revert/error, discarded on success.
    snapshots: Vec<crate::state::Snapshot>,
    pub state: StateModel,
    pub db: Box<dyn Database>,
    pub environment: Environment,
    pub precompiles: PrecompileRegistry,
    pub tracer: Option<Box<dyn Tracer>>,
    pub trace_config: TraceConfig,
    opcode_table: [OpCodeFn; 256],
    fork: Hardfork,
    iterations: u64,
    /// Addresses created by a CREATE/CREATE2 currently on the frame stack,
    /// keyed by depth, so a later revert can tell a sub-call's `Create`
    /// apart from an ordinary `Call` when deciding whether to deploy code.
    pub(crate) pending_child: Vec<ChildResult>,
    /// Set by `op_return` (and implicitly cleared by `op_stop`) just before
    /// a successful `Halt`, carrying the output bytes `finalize_halt` needs
    /// to distinguish `ContextResult::Stop` from `ContextResult::Return`.
    halt_output: Option<Bytes>,
    /// The gas remaining in the outermost frame at the moment it halted,
    /// recorded by `finalize_halt` just before that frame is popped off an
    /// otherwise-empty stack. `executor::Executor` has no frame left to
    /// read this from once `run()` returns, since the top-level frame has
    /// no parent to merge its result into.
    pub(crate) last_gas_left: u64,
}

impl VM {
    pub fn new(environment: Environment, db: Box<dyn Database>) -> Self {
        let fork = environment.fork();
        Self {
            frame_stack: Vec::new(),
            snapshots: Vec::new(),
            state: StateModel::new(),
            db,
            environment,
            precompiles: PrecompileRegistry::new(),
            tracer: None,
            trace_config: TraceConfig::default(),
            opcode_table: Self::build_opcode_table(fork),
            fork,
            iterations: 0,
            pending_child: Vec::new(),
            halt_output: None,
            last_gas_left: 0,
        }
    }

    pub fn fork(&self) -> Hardfork {
        self.fork
    }

    /// Reclaims ownership of the backing `Database`, once this `VM` has
    /// finished a transaction. Lets a host chain multiple transactions
    /// against the same store without round-tripping through a trait-object
    /// clone: `Executor::into_db` is the usual way a caller reaches this.
    pub fn into_db(self) -> Box<dyn Database> {
        self.db
    }

    #[inline]
    pub fn current_frame(&self) -> Result<&CallFrame, VMError> {
        self.frame_stack
            .last()
            .ok_or_else(|| InternalError::Custom("frame stack is empty".into()).into())
    }

    #[inline]
    pub fn current_frame_mut(&mut self) -> Result<&mut CallFrame, VMError> {
        self.frame_stack
            .last_mut()
            .ok_or_else(|| InternalError::Custom("frame stack is empty".into()).into())
    }

    pub fn depth(&self) -> usize {
        self.frame_stack.len()
    }

    /// Pushes a new frame, taking a state snapshot first so a failed call
    /// can be rolled back without touching its ancestors (§3.4).
    pub fn push_frame(&mut self, frame: CallFrame) {
        self.snapshots.push(self.state.snapshot());
        if let Some(tracer) = self.tracer.as_mut() {
            tracer.on_call_enter(frame.to, frame.depth);
        }
        self.frame_stack.push(frame);
    }

    /// Pops the current frame, restoring its snapshot on failure and
    /// discarding it on success, per §3.4's "on revert they are restored,
    /// on success they are simply discarded" rule.
    pub fn pop_frame(&mut self, success: bool) -> Result<CallFrame, VMError> {
        let frame = self
            .frame_stack
            .pop()
            .ok_or_else(|| InternalError::Custom("pop_frame on empty frame stack".into()))?;
        if let Some(snapshot) = self.snapshots.pop() {
            if success {
                // Discard: the child's deltas already live in `self.state`.
            } else {
                self.state.restore(snapshot);
            }
        }
        if let Some(tracer) = self.tracer.as_mut() {
            tracer.on_call_exit(frame.depth, success);
        }
        Ok(frame)
    }

    // --- Gas / PC helpers used throughout opcode_handlers -----------------

    #[inline]
    pub fn charge_gas(&mut self, cost: u64) -> Result<(), VMError> {
        self.current_frame_mut()?.increase_consumed_gas(cost)
    }

    /// Charges the quadratic memory-expansion cost for growing the current
    /// frame's memory to cover `[offset, offset + size)`, per §4.1. Callers
    /// still need to perform the actual read/write afterwards — `Memory`'s
    /// own methods resize themselves, but never charge gas for doing so.
    pub(crate) fn charge_memory_expansion(&mut self, offset: usize, size: usize) -> Result<(), VMError> {
        let new_size = memory::calculate_memory_size(offset, size)?;
        let current_size = self.current_frame()?.memory.len();
        let cost = gas_cost::memory_expansion_cost(new_size, current_size)?;
        self.charge_gas(cost)
    }

    #[inline]
    pub fn advance_pc(&mut self, by: usize) -> Result<(), VMError> {
        self.current_frame_mut()?.pc = self
            .current_frame()?
            .pc
            .checked_add(by)
            .ok_or(InternalError::Overflow)?;
        Ok(())
    }

    // --- Warm/cold helpers (EIP-2929) --------------------------------------

    /// Marks `address` warm if it is not already, returning whether the
    /// access was cold (i.e. this is the first touch this transaction).
    pub fn access_address(&mut self, address: Address) -> bool {
        let was_warm = self.state.warm_address(address);
        !was_warm
    }

    pub fn access_storage_slot(&mut self, address: Address, slot: ethereum_types::H256) -> bool {
        let was_warm = self.state.warm_slot(address, slot);
        !was_warm
    }

    // --- Reads that may yield (§4.4) ---------------------------------------

    pub fn get_balance(&mut self, address: Address) -> Result<U256, VMError> {
        if let Some(value) = self.try_overlay_balance(address) {
            return Ok(value);
        }
        match self.db.get_balance(address) {
            Some(value) => Ok(value),
            None => Err(VMError::Yield(ReadKind::Balance(address))),
        }
    }

    fn try_overlay_balance(&self, address: Address) -> Option<U256> {
        self.state.balances_overlay().find_map(|(addr, value)| {
            if *addr == address {
                Some(*value)
            } else {
                None
            }
        })
    }

    pub fn get_nonce(&mut self, address: Address) -> Result<u64, VMError> {
        if let Some(value) = self
            .state
            .nonces_overlay()
            .find_map(|(addr, value)| if *addr == address { Some(*value) } else { None })
        {
            return Ok(value);
        }
        match self.db.get_nonce(address) {
            Some(value) => Ok(value),
            None => Err(VMError::Yield(ReadKind::Nonce(address))),
        }
    }

    pub fn get_code(&mut self, address: Address) -> Result<Code, VMError> {
        if let Some(code) = self
            .state
            .codes_overlay()
            .find_map(|(addr, code)| if *addr == address { Some(code.clone()) } else { None })
        {
            return Ok(code);
        }
        match self.db.get_code(address) {
            Some(code) => Ok(code),
            None => Err(VMError::Yield(ReadKind::Code(address))),
        }
    }

    pub fn get_code_metadata(&mut self, address: Address) -> Result<CodeMetadata, VMError> {
        let code = self.get_code(address)?;
        Ok(CodeMetadata::compute(&code))
    }

    pub fn get_storage(&mut self, address: Address, slot: ethereum_types::H256) -> Result<U256, VMError> {
        let db_value = match self.db.get_storage(address, slot) {
            Some(value) => value,
            None => return Err(VMError::Yield(ReadKind::Storage(address, slot))),
        };
        Ok(self.state.get_storage(address, slot, db_value))
    }

    /// Reads the value SSTORE should treat as "original": the transaction's
    /// first observed value for the slot, falling back to the database.
    pub fn get_original_storage(&mut self, address: Address, slot: ethereum_types::H256) -> Result<U256, VMError> {
        let db_value = match self.db.get_storage(address, slot) {
            Some(value) => value,
            None => return Err(VMError::Yield(ReadKind::Storage(address, slot))),
        };
        Ok(self.state.original_storage(address, slot, db_value))
    }

    pub fn set_balance(&mut self, address: Address, value: U256) {
        self.state.set_balance(address, value);
    }

    pub fn set_nonce(&mut self, address: Address, value: u64) {
        self.state.set_nonce(address, value);
    }

    pub fn set_code(&mut self, address: Address, code: Code) {
        self.state.set_code(address, code);
    }

    pub fn set_storage(&mut self, address: Address, slot: ethereum_types::H256, value: U256) -> Result<(), VMError> {
        let original = self.get_original_storage(address, slot)?;
        self.state.set_storage(address, slot, original, value);
        Ok(())
    }

    pub fn account_is_empty(&mut self, address: Address) -> Result<bool, VMError> {
        let balance = self.get_balance(address)?;
        let nonce = self.get_nonce(address)?;
        let code = self.get_code(address)?;
        Ok(balance.is_zero() && nonce == 0 && code.is_empty())
    }

    /// Resolves `address`'s executable code, following one EIP-7702
    /// delegation if present (Prague+). Per the Open Question resolution
    /// in SPEC_FULL.md, delegation is resolved exactly once — a delegation
    /// designator that itself points at another delegation designator is
    /// executed literally as raw (invalid) bytecode, not followed again.
    pub fn resolve_code(&mut self, address: Address) -> Result<(Code, Option<Address>), VMError> {
        let code = self.get_code(address)?;
        if self.fork < Hardfork::Prague {
            return Ok((code, None));
        }
        let metadata = CodeMetadata::compute(&code);
        if !metadata.is_delegation {
            return Ok((code, None));
        }
        let delegate_bytes = code.0.as_ref();
        let delegate_addr = Address::from_slice(
            delegate_bytes
                .get(3..23)
                .ok_or_else(|| InternalError::Custom("malformed delegation designator".into()))?,
        );
        self.access_address(delegate_addr);
        let delegated_code = self.get_code(delegate_addr)?;
        Ok((delegated_code, Some(delegate_addr)))
    }

    // --- Execution loop ------------------------------------------------------

    /// Set by `op_return`/`op_revert` before signalling `Halt`, since a
    /// successful halt's `ContextResult` (`Stop` vs `Return{output}`)
    /// can't be derived from `OpcodeResult` alone.
    pub(crate) fn set_halt_output(&mut self, output: Option<Bytes>) {
        self.halt_output = output;
    }

    /// Runs exactly one opcode of the current (topmost) frame.
    fn step(&mut self) -> Result<OpcodeResult, VMError> {
        self.iterations = self
            .iterations
            .checked_add(1)
            .ok_or(InternalError::Overflow)?;
        if self.iterations > MAX_OPCODE_ITERATIONS {
            return Err(ExceptionalHalt::ExecutionTimeout.into());
        }

        let opcode_byte = match self.current_frame()?.current_opcode() {
            Some(byte) => byte,
            None => return Ok(OpcodeResult::Halt), // ran past end of code: implicit STOP
        };
        let gas_before = self.current_frame()?.gas_remaining();
        let depth = self.current_frame()?.depth;
        let pc = self.current_frame()?.pc;

        let handler = self.opcode_table[opcode_byte as usize];
        let result = handler.call(self);

        if self.trace_config.enabled {
            self.emit_trace(pc, opcode_byte, gas_before, depth, &result);
        }

        result
    }

    fn emit_trace(
        &mut self,
        pc: usize,
        opcode_byte: u8,
        gas_before: u64,
        depth: usize,
        result: &Result<OpcodeResult, VMError>,
    ) {
        let Some(mut tracer) = self.tracer.take() else {
            return;
        };
        let gas_after = self
            .frame_stack
            .last()
            .map(|f| f.gas_remaining())
            .unwrap_or(gas_before);
        let event = crate::trace::TraceEvent {
            pc,
            op_byte: opcode_byte,
            op_name: opcode_name(opcode_byte),
            gas_before,
            gas_cost: gas_before.saturating_sub(gas_after),
            depth,
            refund: self.state.refund_counter,
            stack: if self.trace_config.capture_stack {
                self.frame_stack.last().map(|f| f.stack.clone().into_vec())
            } else {
                None
            },
            memory: None,
            return_data: if self.trace_config.capture_return_data {
                self.frame_stack.last().map(|f| f.return_data.clone())
            } else {
                None
            },
            error: match result {
                Err(VMError::ExceptionalHalt(kind)) => Some(*kind),
                _ => None,
            },
        };
        tracer.on_step(event);
        self.tracer = Some(tracer);
    }

    /// Drives the frame stack to completion: steps the topmost frame until
    /// it halts, applies the result to its parent (or returns it as the
    /// final outcome if there is no parent), and repeats. Returns as soon
    /// as a read yields (§4.4), leaving all frame/state intact for resume.
    pub fn run(&mut self) -> crate::errors::Resumable<ContextResult> {
        loop {
            if self.frame_stack.is_empty() {
                return crate::errors::Resumable::Done(ContextResult::Stop);
            }

            let outcome = loop {
                match self.step() {
                    Ok(OpcodeResult::Continue) => continue,
                    Ok(OpcodeResult::Halt) => {
                        let result = match self.halt_output.take() {
                            Some(output) => ContextResult::Return { output },
                            None => ContextResult::Stop,
                        };
                        break self.finalize_halt(result);
                    }
                    Err(VMError::Yield(kind)) => {
                        debug!(?kind, "vm: suspending pending async data");
                        return crate::errors::Resumable::Yield(kind);
                    }
                    Err(VMError::RevertOpcode(data)) => {
                        break self.finalize_halt(ContextResult::Revert { output: data })
                    }
                    Err(VMError::ExceptionalHalt(kind)) => {
                        trace!(?kind, "vm: frame halted with an exceptional condition");
                        break self.finalize_halt(ContextResult::Error { kind });
                    }
                    Err(other) => return crate::errors::Resumable::Done(ContextResult::from(other)),
                }
            };

            if self.frame_stack.is_empty() {
                return crate::errors::Resumable::Done(outcome);
            }
            // else: `finalize_halt` already merged the child result into
            // the new top frame; loop continues stepping it.
            let _ = &outcome;
        }
    }

    /// Applies a just-halted top frame's result to its parent (if any),
    /// popping it from the stack, rolling back state on failure, and
    /// returning the `ContextResult` for callers that care only about the
    /// outermost outcome.
    fn finalize_halt(&mut self, mut result: ContextResult) -> ContextResult {
        let gas_left = self
            .frame_stack
            .last()
            .map(|f| f.gas_remaining())
            .unwrap_or(0);
        let is_create = self.frame_stack.last().map(|f| f.is_create).unwrap_or(false);

        // A CREATE whose init code returned normally can still fail
        // deployment (EIP-170/3541 size and prefix checks, insufficient gas
        // for the deposit); that failure must roll back the init code's own
        // storage writes too, so it has to be decided before `pop_frame`.
        if is_create {
            if let ContextResult::Return { output } = &result {
                if let Err(kind) = crate::orchestrator::validate_create_deployment(output, gas_left, self.fork) {
                    result = ContextResult::Error { kind };
                }
            }
        }

        let success = result.is_success();
        let finished = match self.pop_frame(success) {
            Ok(frame) => frame,
            Err(_) => return result,
        };

        if self.frame_stack.is_empty() {
            self.last_gas_left = gas_left;
            return result;
        }

        self.apply_child_result(&finished, is_create, gas_left, result.clone());
        result
    }
}

impl From<VMError> for ContextResult {
    fn from(error: VMError) -> Self {
        match error {
            VMError::RevertOpcode(data) => ContextResult::Revert { output: data },
            VMError::ExceptionalHalt(kind) => ContextResult::Error { kind },
            VMError::Internal(_) => ContextResult::Error {
                kind: ExceptionalHalt::OutOfGas,
            },
            VMError::Yield(_) => ContextResult::Stop, // unreachable: caught earlier
        }
    }
}

/// Resolves the static mnemonic of an opcode byte, for trace events.
fn opcode_name(byte: u8) -> &'static str {
    match Opcode::from(byte) {
        Opcode::STOP => "STOP",
        Opcode::ADD => "ADD",
        Opcode::MUL => "MUL",
        Opcode::SUB => "SUB",
        Opcode::DIV => "DIV",
        Opcode::SDIV => "SDIV",
        Opcode::MOD => "MOD",
        Opcode::SMOD => "SMOD",
        Opcode::ADDMOD => "ADDMOD",
        Opcode::MULMOD => "MULMOD",
        Opcode::EXP => "EXP",
        Opcode::SIGNEXTEND => "SIGNEXTEND",
        Opcode::KECCAK256 => "KECCAK256",
        Opcode::SLOAD => "SLOAD",
        Opcode::SSTORE => "SSTORE",
        Opcode::JUMP => "JUMP",
        Opcode::JUMPI => "JUMPI",
        Opcode::CALL => "CALL",
        Opcode::CREATE => "CREATE",
        Opcode::CREATE2 => "CREATE2",
        Opcode::RETURN => "RETURN",
        Opcode::REVERT => "REVERT",
        Opcode::SELFDESTRUCT => "SELFDESTRUCT",
        Opcode::INVALID => "INVALID",
        _ => "OPCODE",
    }
}

