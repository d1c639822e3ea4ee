//! The outermost Executor (§2): transaction lifecycle, the top-level
//! call/create entry point, async yield/resume, and final commit. This is
//! the one entry point a host actually calls — `Vm`/`VM` and the
//! orchestrator are driven from here, never constructed standalone by an
//! embedder.
//!
//! Per the Design Notes' instruction to unify the source's two disjoint
//! `evm_execute`/`evm_call_ffi` paths, there is exactly one way in
//! (`Executor::execute`) and one way to continue a suspended run
//! (`Executor::resume`); both return `Resumable<ExecutionOutcome>`, so a
//! caller never has to guess which mode it is in.

use bytes::Bytes;
use ethereum_types::{Address, U256};
use tracing::{info, info_span};

use crate::{
    account::Code,
    call_frame::CallFrame,
    constants,
    db::{Database, ResumeValue},
    environment::{Environment, Hardfork},
    errors::{ContextResult, ExceptionalHalt, InternalError, ReadKind, Resumable, VMError},
    gas_cost,
    memory::Memory,
    orchestrator::{deploy_create_output, CallParams},
    precompile,
    stack::Stack,
    state::LogEntry,
    trace::{TraceConfig, Tracer},
    utils,
    vm::VM,
};

/// §6.1's inbound `ExecutionRequest`: everything needed to drive one
/// transaction, bundled for `Executor::new`. `Hardfork`, `BlockContext`,
/// `AccessList`, and `BlobVersionedHashes` all live on `Environment`
/// already (§6.1 lists them as siblings of `CallParams`, not as fields of
/// it), so this struct only adds the call itself and the optional trace
/// flags.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub environment: Environment,
    pub call: CallParams,
    pub trace_config: TraceConfig,
}

/// §6.5's `Result`, after the engine has run a transaction to completion
/// (or failure) and, on success, flushed its deltas to the `Database`.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub success: bool,
    pub gas_left: u64,
    pub gas_used: u64,
    pub output: Bytes,
    pub logs: Vec<LogEntry>,
    pub refund: u64,
    pub created_address: Option<Address>,
    pub selfdestructs: Vec<Address>,
    pub error_kind: Option<ExceptionalHalt>,
}

/// Distinguishes "a frame was pushed, go run it" from "the transaction was
/// already decided before any frame existed" (precompile target, or a
/// pre-execution failure like insufficient balance or address collision —
/// §4.2 steps 1/4/5, all of which fail before any state mutation and so
/// refund the entire forwarded gas).
enum StartOutcome {
    FramePushed,
    Finished(ContextResult, u64),
}

/// The transaction lifecycle owner: pre-transaction warm-ups, top-level
/// call/create entry, the async yield/resume loop, and final commit to the
/// `Database`. Holds the one `VM` that runs the whole transaction plus the
/// bookkeeping needed to resume a suspended run exactly where it left off.
pub struct Executor {
    vm: VM,
    call: CallParams,
    frame_started: bool,
    top_level_is_create: bool,
    new_address: Option<Address>,
}

impl Executor {
    pub fn new(request: ExecutionRequest, db: Box<dyn Database>) -> Self {
        let top_level_is_create = matches!(
            request.call,
            CallParams::Create { .. } | CallParams::Create2 { .. }
        );
        let mut vm = VM::new(request.environment, db);
        vm.trace_config = request.trace_config;
        Self {
            vm,
            call: request.call,
            frame_started: false,
            top_level_is_create,
            new_address: None,
        }
    }

    pub fn set_tracer(&mut self, tracer: Box<dyn Tracer>) {
        self.vm.tracer = Some(tracer);
    }

    pub fn vm(&self) -> &VM {
        &self.vm
    }

    /// Reclaims the backing `Database` after a transaction has finished, so
    /// a host can feed the same store into the next `Executor` without
    /// re-fetching state that a successful `commit` already flushed down.
    pub fn into_db(self) -> Box<dyn Database> {
        self.vm.into_db()
    }

    /// Runs the transaction to completion or suspension. Calling this more
    /// than once on the same `Executor` is only meaningful after a prior
    /// call returned `Resumable::Yield` and `resume` has not yet been
    /// called — it simply retries whatever step last suspended.
    pub fn execute(&mut self) -> Resumable<ExecutionOutcome> {
        let span = info_span!("execute_transaction", fork = ?self.vm.fork());
        let _entered = span.enter();
        if !self.frame_started {
            self.warm_up_transaction();
        }
        self.drive()
    }

    /// Supplies the out-of-band answer to a prior `ReadKind` yield and
    /// continues execution. Per §4.4, no rollback is needed: a yield never
    /// mutates state, so resuming simply retries the read that missed.
    pub fn resume(&mut self, kind: ReadKind, value: ResumeValue) -> Resumable<ExecutionOutcome> {
        tracing::debug!(?kind, "executor: resuming after async data arrived");
        self.vm.db.satisfy(&kind, value);
        self.drive()
    }

    fn drive(&mut self) -> Resumable<ExecutionOutcome> {
        if !self.frame_started {
            match self.start_top_level() {
                Ok(StartOutcome::FramePushed) => self.frame_started = true,
                Ok(StartOutcome::Finished(result, gas_left)) => {
                    return Resumable::Done(self.finalize(result, gas_left));
                }
                Err(VMError::Yield(kind)) => return Resumable::Yield(kind),
                Err(other) => {
                    return Resumable::Done(self.finalize(ContextResult::from(other), 0));
                }
            }
        }

        match self.vm.run() {
            crate::errors::Resumable::Yield(kind) => Resumable::Yield(kind),
            crate::errors::Resumable::Done(result) => {
                let gas_left = self.vm.last_gas_left;
                Resumable::Done(self.finalize(result, gas_left))
            }
        }
    }

    // --- Pre-transaction warm-ups (§4.2) ------------------------------------

    /// Marks warm, in order: tx origin, the coinbase (Shanghai+, EIP-3651),
    /// every precompile address active at this fork, every (address, slot)
    /// in the EIP-2930 access list, and every EIP-7702 authorizer address.
    /// The top-level call/create target is warmed separately in
    /// `start_call`/`start_create`, once it is known (a CREATE's target
    /// isn't computed until the creator's nonce has been read).
    fn warm_up_transaction(&mut self) {
        let env = &self.vm.environment;
        let origin = env.origin;
        let fork = env.fork();
        let coinbase = env.block.coinbase;
        let access_list = env.access_list.clone();
        let authorization_list_addresses = env.authorization_list_addresses.clone();

        self.vm.access_address(origin);
        if fork >= Hardfork::Shanghai {
            self.vm.access_address(coinbase);
        }
        for address in precompile::all_precompile_addresses(fork) {
            self.vm.access_address(address);
        }
        for entry in access_list {
            self.vm.access_address(entry.address);
            for slot in entry.storage_keys {
                self.vm.access_storage_slot(entry.address, slot);
            }
        }
        for address in authorization_list_addresses {
            self.vm.access_address(address);
        }
    }

    // --- Top-level entry (§4.2, steps 1/3-5 before any frame exists) -------

    fn start_top_level(&mut self) -> Result<StartOutcome, VMError> {
        match self.call.clone() {
            CallParams::Create { value, init_code, gas } => {
                self.start_create(value, init_code, None, gas)
            }
            CallParams::Create2 { value, init_code, gas, salt } => {
                self.start_create(value, init_code, Some(salt), gas)
            }
            other => self.start_call(other),
        }
    }

    /// Resolves a top-level CALL/CALLCODE/DELEGATECALL/STATICCALL. Unlike
    /// `VM::enter_call`, there is no parent frame to inherit `msg.sender`
    /// or `value` from: `msg.sender` is always the transaction origin, and
    /// a variant with no explicit `value` field (DELEGATECALL, STATICCALL)
    /// transfers none.
    fn start_call(&mut self, call: CallParams) -> Result<StartOutcome, VMError> {
        let origin = self.vm.environment.origin;
        let gas_limit = self.vm.environment.gas_limit;

        let (to, code_address, value, input, is_static, transfers_value) = match call {
            CallParams::Call { callee, value, input, .. } => (callee, callee, value, input, false, true),
            CallParams::CallCode { code_source, value, input, .. } => {
                (code_source, code_source, value, input, false, true)
            }
            CallParams::DelegateCall { code_source, input, .. } => {
                (code_source, code_source, U256::zero(), input, false, false)
            }
            CallParams::StaticCall { callee, input, .. } => (callee, callee, U256::zero(), input, true, false),
            CallParams::Create { .. } | CallParams::Create2 { .. } => {
                return Err(InternalError::Custom("start_call given a Create variant".into()).into());
            }
        };

        self.vm.access_address(to);

        let has_value = transfers_value && !value.is_zero();
        if has_value {
            let origin_balance = self.vm.get_balance(origin)?;
            if origin_balance < value {
                return Ok(StartOutcome::Finished(
                    ContextResult::Error { kind: ExceptionalHalt::InsufficientBalance },
                    gas_limit,
                ));
            }
            let to_balance = self.vm.get_balance(to)?;
            let new_origin_balance = origin_balance
                .checked_sub(value)
                .ok_or_else(|| InternalError::Custom("balance underflow after affordability check".into()))?;
            let new_to_balance = to_balance.checked_add(value).ok_or(InternalError::Overflow)?;
            self.vm.set_balance(origin, new_origin_balance);
            self.vm.set_balance(to, new_to_balance);
        }

        if precompile::is_precompile_address(code_address, self.vm.fork()) {
            return Ok(self.dispatch_top_level_precompile(code_address, &input, gas_limit));
        }

        let (code, authorized) = self.vm.resolve_code(code_address)?;
        let mut frame = CallFrame::new(
            origin,
            to,
            code_address,
            code,
            value,
            input,
            is_static,
            gas_limit,
            0,
            transfers_value,
            false,
            0,
            0,
            Stack::new(),
            Memory::new(),
        );
        frame.authorized = authorized;
        self.vm.push_frame(frame);
        Ok(StartOutcome::FramePushed)
    }

    /// Resolves a top-level CREATE/CREATE2 (§4.2 steps 1, 3-5). Mirrors
    /// `VM::enter_create`'s protocol but against the transaction origin
    /// directly rather than a caller frame, since none exists yet.
    fn start_create(
        &mut self,
        value: U256,
        init_code: Bytes,
        salt: Option<U256>,
        _gas_requested: U256,
    ) -> Result<StartOutcome, VMError> {
        let origin = self.vm.environment.origin;
        let gas_limit = self.vm.environment.gas_limit;
        let fork = self.vm.fork();

        if fork >= Hardfork::Shanghai && init_code.len() > constants::MAX_INITCODE_SIZE {
            return Ok(StartOutcome::Finished(
                ContextResult::Error { kind: ExceptionalHalt::InitCodeTooLarge },
                gas_limit,
            ));
        }

        let nonce = self.vm.get_nonce(origin)?;
        let new_address = match salt {
            Some(salt) => utils::create2_address(origin, salt, &init_code),
            None => utils::create_address(origin, nonce),
        };
        let existing_nonce = self.vm.get_nonce(new_address)?;
        let existing_code = self.vm.get_code(new_address)?;
        let origin_balance = self.vm.get_balance(origin)?;
        let target_balance = self.vm.get_balance(new_address)?;

        let new_nonce = match nonce.checked_add(1) {
            Some(n) => n,
            None => {
                return Ok(StartOutcome::Finished(
                    ContextResult::Error { kind: ExceptionalHalt::NonceOverflow },
                    gas_limit,
                ))
            }
        };
        if existing_nonce != 0 || !existing_code.is_empty() {
            return Ok(StartOutcome::Finished(
                ContextResult::Error { kind: ExceptionalHalt::AddressCollision },
                gas_limit,
            ));
        }
        if origin_balance < value {
            return Ok(StartOutcome::Finished(
                ContextResult::Error { kind: ExceptionalHalt::InsufficientBalance },
                gas_limit,
            ));
        }

        self.vm.set_nonce(origin, new_nonce);
        let new_origin_balance = origin_balance
            .checked_sub(value)
            .ok_or_else(|| InternalError::Custom("balance underflow after affordability check".into()))?;
        let new_target_balance = target_balance.checked_add(value).ok_or(InternalError::Overflow)?;
        self.vm.set_balance(origin, new_origin_balance);
        self.vm.set_balance(new_address, new_target_balance);
        // EIP-161: the created account's own nonce starts at 1 (see the
        // matching note in `orchestrator::enter_create`).
        self.vm.set_nonce(new_address, 1);
        self.vm.state.mark_created_this_tx(new_address);
        self.vm.access_address(new_address);
        self.new_address = Some(new_address);

        let frame = CallFrame::new(
            origin,
            new_address,
            new_address,
            Code::new(init_code),
            value,
            Bytes::new(),
            false,
            gas_limit,
            0,
            false,
            true,
            0,
            0,
            Stack::new(),
            Memory::new(),
        );
        self.vm.push_frame(frame);
        Ok(StartOutcome::FramePushed)
    }

    /// Runs a precompile in place of pushing a frame, for the (unusual but
    /// spec-legal) case of a transaction whose target is itself a
    /// precompile address. Mirrors `VM::dispatch_precompile`'s conservative
    /// gas-overspend resolution: a missing implementation or `gas_used >
    /// supplied` consumes everything and fails outright.
    fn dispatch_top_level_precompile(&mut self, address: Address, input: &[u8], gas_limit: u64) -> StartOutcome {
        let outcome = self.vm.precompiles.dispatch(address, self.vm.fork(), input, gas_limit);
        match outcome {
            Some(output) if output.success && output.gas_used <= gas_limit => {
                StartOutcome::Finished(ContextResult::Return { output: output.output }, gas_limit - output.gas_used)
            }
            _ => StartOutcome::Finished(ContextResult::Error { kind: ExceptionalHalt::OutOfGas }, 0),
        }
    }

    // --- Finalization / commit ----------------------------------------------

    /// Folds a just-completed (or just-decided) `ContextResult` into the
    /// public `ExecutionOutcome`: deploys a top-level CREATE's code (no
    /// parent frame ever applied it, since none exists), applies the
    /// EIP-3529 refund cap, collects logs/self-destructs, and — on success
    /// only — flushes every overlay delta to the `Database`.
    fn finalize(&mut self, result: ContextResult, mut gas_left: u64) -> ExecutionOutcome {
        let gas_limit = self.vm.environment.gas_limit;
        let fork = self.vm.fork();

        if self.top_level_is_create {
            if let Some(new_address) = self.new_address {
                // `VM::finalize_halt` already ran `validate_create_deployment`
                // before this top-level frame was popped (it applies to every
                // CREATE frame, top-level or nested, since a failed deployment
                // must roll back the init code's own storage writes too) — by
                // the time `result` reaches here, an oversized/EIP-3541-bad
                // deployment has already become `ContextResult::Error`.
                gas_left = deploy_create_output(&mut self.vm, new_address, &result, gas_left);
            }
        }

        let success = result.is_success();
        let output = result.output();
        let error_kind = match &result {
            ContextResult::Error { kind } => Some(*kind),
            _ => None,
        };
        let created_address = if success { self.new_address } else { None };

        let gas_used = gas_limit.saturating_sub(gas_left);
        let refund = if success {
            self.vm.state.refund().min(gas_cost::refund_cap(gas_used, fork))
        } else {
            0
        };
        let logs = if success { self.vm.state.take_logs() } else { Vec::new() };
        let selfdestructs: Vec<Address> = self.vm.state.all_selfdestructed().collect();

        if success {
            self.commit();
        }

        info!(success, gas_used, refund, "executor: transaction finished");

        ExecutionOutcome {
            success,
            gas_left,
            gas_used,
            output,
            logs,
            refund,
            created_address,
            selfdestructs,
            error_kind,
        }
    }

    /// Flushes every touched balance/nonce/code/storage entry to the
    /// `Database`, then deletes the accounts EIP-6780 actually allows
    /// deletion of (self-destructed *and* created within this same
    /// transaction). Only called after a successful transaction: on
    /// failure the state overlay was already rolled back to empty by
    /// `VM::pop_frame`'s snapshot restore, so there is nothing to flush.
    fn commit(&mut self) {
        let balances: Vec<(Address, U256)> = self.vm.state.balances_overlay().map(|(a, v)| (*a, *v)).collect();
        for (address, value) in balances {
            self.vm.db.set_balance(address, value);
        }

        let nonces: Vec<(Address, u64)> = self.vm.state.nonces_overlay().map(|(a, v)| (*a, *v)).collect();
        for (address, value) in nonces {
            self.vm.db.set_nonce(address, value);
        }

        let codes: Vec<(Address, Code)> = self.vm.state.codes_overlay().map(|(a, c)| (*a, c.clone())).collect();
        for (address, code) in codes {
            self.vm.db.set_code(address, code);
        }

        let storage: Vec<(crate::state::SlotKey, U256)> = self.vm.state.dirty_storage().collect();
        for ((address, slot), value) in storage {
            self.vm.db.set_storage(address, slot, value);
        }

        let deletions: Vec<Address> = self.vm.state.addresses_to_delete().collect();
        for address in deletions {
            self.vm.db.set_code(address, Code::default());
            self.vm.db.set_nonce(address, 0);
            self.vm.db.set_balance(address, U256::zero());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryDatabase;

    fn environment(origin: Address, gas_limit: u64) -> Environment {
        Environment {
            origin,
            gas_price: U256::zero(),
            gas_limit,
            block: crate::environment::BlockContext::default(),
            config: crate::environment::ChainConfig::default(),
            access_list: Vec::new(),
            blob_versioned_hashes: Vec::new(),
            authorization_list_addresses: Vec::new(),
        }
    }

    /// Scenario S1 — simple addition: PUSH1 5, PUSH1 3, ADD, PUSH1 0,
    /// MSTORE, PUSH1 32, PUSH1 0, RETURN. Output should be the 32-byte
    /// big-endian encoding of 8.
    #[test]
    fn s1_simple_addition() {
        let origin = Address::repeat_byte(1);
        let callee = Address::repeat_byte(2);
        let code = Bytes::from_static(&[
            0x60, 0x05, 0x60, 0x03, 0x01, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xf3,
        ]);

        let mut db = InMemoryDatabase::new();
        db.set_code(callee, Code::new(code));

        let request = ExecutionRequest {
            environment: environment(origin, 30_000),
            call: CallParams::Call {
                callee,
                value: U256::zero(),
                input: Bytes::new(),
                gas: U256::from(30_000),
                ret_offset: 0,
                ret_size: 0,
            },
            trace_config: TraceConfig::default(),
        };
        let mut executor = Executor::new(request, Box::new(db));

        let Resumable::Done(outcome) = executor.execute() else {
            panic!("expected synchronous completion against an in-memory database");
        };
        assert!(outcome.success);
        let mut expected = [0u8; 32];
        expected[31] = 8;
        assert_eq!(outcome.output.as_ref(), &expected[..]);
    }

    /// Scenario S2 — revert propagation: an outer CALL into a contract
    /// that stores 0x42 and REVERTs 32 bytes. The outer's CALL returns 0,
    /// and RETURNDATACOPY observes the revert payload.
    #[test]
    fn s2_revert_propagation() {
        let origin = Address::repeat_byte(1);
        let inner = Address::repeat_byte(3);
        let outer = Address::repeat_byte(4);

        let inner_code = Bytes::from_static(&[0x60, 0x42, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xfd]);
        // PUSH1 0 (args_size) PUSH1 0 (args_offset) PUSH1 0 (value) PUSH20 <inner>
        // PUSH2 gas CALL ; PUSH1 0 PUSH1 0 RETURNDATACOPY ; PUSH1 32 PUSH1 0 RETURN
        let mut outer_code = vec![0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x73];
        outer_code.extend_from_slice(inner.as_bytes());
        outer_code.extend_from_slice(&[0x61, 0x75, 0x30, 0xf1]);
        outer_code.extend_from_slice(&[0x60, 0x20, 0x60, 0x00, 0x60, 0x00, 0x3e]);
        outer_code.extend_from_slice(&[0x60, 0x20, 0x60, 0x00, 0xf3]);

        let mut db = InMemoryDatabase::new();
        db.set_code(inner, Code::new(inner_code));
        db.set_code(outer, Code::new(Bytes::from(outer_code)));

        let request = ExecutionRequest {
            environment: environment(origin, 1_000_000),
            call: CallParams::Call {
                callee: outer,
                value: U256::zero(),
                input: Bytes::new(),
                gas: U256::from(1_000_000),
                ret_offset: 0,
                ret_size: 0,
            },
            trace_config: TraceConfig::default(),
        };
        let mut executor = Executor::new(request, Box::new(db));

        let Resumable::Done(outcome) = executor.execute() else {
            panic!("expected synchronous completion against an in-memory database");
        };
        assert!(outcome.success);
        let mut expected = [0u8; 32];
        expected[0] = 0x42;
        assert_eq!(outcome.output.as_ref(), &expected[..]);
    }

    /// Scenario S5 — async yield + resume: PUSH1 0, SLOAD against a
    /// backend that misses once. `execute()` yields `Storage`; `resume`
    /// with the answer lets execution continue to completion.
    #[test]
    fn s5_async_yield_and_resume() {
        let origin = Address::repeat_byte(1);
        let callee = Address::repeat_byte(5);
        let code = Bytes::from_static(&[0x60, 0x00, 0x54, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xf3]);

        let mut inner = InMemoryDatabase::new();
        inner.set_code(callee, Code::new(code.clone()));
        inner.set_storage(callee, ethereum_types::H256::zero(), U256::from(0xbeef));
        let db = crate::db::OnceMissingDatabase::new(inner);

        let request = ExecutionRequest {
            environment: environment(origin, 30_000),
            call: CallParams::Call {
                callee,
                value: U256::zero(),
                input: Bytes::new(),
                gas: U256::from(30_000),
                ret_offset: 0,
                ret_size: 0,
            },
            trace_config: TraceConfig::default(),
        };
        let mut executor = Executor::new(request, Box::new(db));

        let pending = match executor.execute() {
            Resumable::Yield(kind) => kind,
            Resumable::Done(_) => panic!("expected a yield on first SLOAD against a missing backend"),
        };
        assert_eq!(pending, ReadKind::Code(callee));

        // The database also misses on the code read before it ever reaches
        // the storage read; answer each miss as it's raised.
        let mut pending = pending;
        loop {
            let value = match pending {
                ReadKind::Code(_) => ResumeValue::Code(Code::new(code.clone())),
                ReadKind::Storage(addr, slot) => {
                    assert_eq!(addr, callee);
                    assert_eq!(slot, ethereum_types::H256::zero());
                    ResumeValue::Storage(U256::from(0xbeef))
                }
                other => panic!("unexpected pending read: {other:?}"),
            };
            match executor.resume(pending, value) {
                Resumable::Yield(next) => pending = next,
                Resumable::Done(outcome) => {
                    assert!(outcome.success);
                    let mut expected = [0u8; 32];
                    U256::from(0xbeef).to_big_endian(&mut expected);
                    assert_eq!(outcome.output.as_ref(), &expected[..]);
                    break;
                }
            }
        }
    }
}
