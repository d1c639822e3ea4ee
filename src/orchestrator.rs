//! The Call/Create Orchestrator (§4.2): the six ways execution can enter a
//! nested frame, and the merge step that folds a finished child frame's
//! result back into its parent. Implemented as a second `impl VM` block
//! rather than its own owning type — both halves need the same mutable
//! `StateModel` on every step, and splitting them apart would just
//! reintroduce the source's frame-back-pointer-to-EVM pattern.
//!
//! Every operation here performs all of its fallible reads before its first
//! write. A read that misses yields (`VMError::Yield`) and, per the async
//! protocol, is simply retried from the top once resumed — which is only
//! safe if no mutation happened on the attempt that yielded.

use bytes::Bytes;
use ethereum_types::{Address, U256};
use tracing::trace;

use crate::{
    account::Code,
    call_frame::CallFrame,
    constants::{self, CALL_STACK_LIMIT},
    environment::Hardfork,
    errors::{ContextResult, ExceptionalHalt, InternalError, VMError},
    gas_cost,
    stack::Stack,
    utils,
    vm::VM,
};

/// One of the six ways a new frame can be entered, matching the Call
/// Orchestrator's public operation. `Create`/`Create2` have no
/// `ret_offset`/`ret_size`: a successful create reports its new address on
/// the stack rather than writing bytes into the caller's memory.
#[derive(Debug, Clone)]
pub enum CallParams {
    Call {
        callee: Address,
        value: U256,
        input: Bytes,
        gas: U256,
        ret_offset: usize,
        ret_size: usize,
    },
    CallCode {
        code_source: Address,
        value: U256,
        input: Bytes,
        gas: U256,
        ret_offset: usize,
        ret_size: usize,
    },
    DelegateCall {
        code_source: Address,
        input: Bytes,
        gas: U256,
        ret_offset: usize,
        ret_size: usize,
    },
    StaticCall {
        callee: Address,
        input: Bytes,
        gas: U256,
        ret_offset: usize,
        ret_size: usize,
    },
    Create {
        value: U256,
        init_code: Bytes,
        gas: U256,
    },
    Create2 {
        value: U256,
        init_code: Bytes,
        gas: U256,
        salt: U256,
    },
}

/// The four CALL-family variants, normalized to the fields `enter_call`
/// actually needs once `msg_sender`/`to`/value-transfer semantics have been
/// resolved per-variant.
struct ResolvedCall {
    msg_sender: Address,
    code_address: Address,
    to: Address,
    value: U256,
    input: Bytes,
    gas_requested: U256,
    ret_offset: usize,
    ret_size: usize,
    is_static: bool,
    transfers_value: bool,
}

impl VM {
    /// Entry point for CALL/CALLCODE/DELEGATECALL/STATICCALL (§4.2 steps
    /// 1-4, 6-8). Pushes a new frame on success. On an early failure that
    /// the protocol models as "the sub-call failed" (depth exceeded,
    /// insufficient balance) pushes `0` onto the *current* frame's stack
    /// directly, without ever creating a child frame. A static-context
    /// violation is not one of these — it halts the current frame outright,
    /// so it propagates as an `Err` instead.
    pub fn enter_call(&mut self, params: CallParams) -> Result<(), VMError> {
        let caller = self.current_frame()?;
        let caller_to = caller.to;
        let caller_msg_sender = caller.msg_sender;
        let caller_value = caller.value;
        let caller_is_static = caller.is_static;
        let depth = caller.depth;

        let resolved = match params {
            CallParams::Call { callee, value, input, gas, ret_offset, ret_size } => {
                if caller_is_static && !value.is_zero() {
                    return Err(ExceptionalHalt::OpcodeNotAllowedInStaticContext.into());
                }
                ResolvedCall {
                    msg_sender: caller_to,
                    code_address: callee,
                    to: callee,
                    value,
                    input,
                    gas_requested: gas,
                    ret_offset,
                    ret_size,
                    is_static: caller_is_static,
                    transfers_value: true,
                }
            }
            CallParams::CallCode { code_source, value, input, gas, ret_offset, ret_size } => {
                if caller_is_static && !value.is_zero() {
                    return Err(ExceptionalHalt::OpcodeNotAllowedInStaticContext.into());
                }
                ResolvedCall {
                    msg_sender: caller_to,
                    code_address: code_source,
                    to: caller_to,
                    value,
                    input,
                    gas_requested: gas,
                    ret_offset,
                    ret_size,
                    is_static: caller_is_static,
                    transfers_value: true,
                }
            }
            CallParams::DelegateCall { code_source, input, gas, ret_offset, ret_size } => ResolvedCall {
                msg_sender: caller_msg_sender,
                code_address: code_source,
                to: caller_to,
                value: caller_value,
                input,
                gas_requested: gas,
                ret_offset,
                ret_size,
                is_static: caller_is_static,
                transfers_value: false,
            },
            CallParams::StaticCall { callee, input, gas, ret_offset, ret_size } => ResolvedCall {
                msg_sender: caller_to,
                code_address: callee,
                to: callee,
                value: U256::zero(),
                input,
                gas_requested: gas,
                ret_offset,
                ret_size,
                is_static: true,
                transfers_value: false,
            },
            CallParams::Create { .. } | CallParams::Create2 { .. } => {
                return Err(InternalError::Custom("enter_call given a Create variant".into()).into());
            }
        };

        // Step 1: depth check. Nothing has been charged or mutated yet, so
        // the forwarded gas is simply never deducted from the caller.
        if depth >= CALL_STACK_LIMIT {
            trace!(depth, "vm: call depth exceeded, failing sub-call");
            return self.fail_without_frame();
        }

        // Step 2: pre-warm target (EIP-2929).
        let is_cold = self.access_address(resolved.code_address);

        // Reads needed to size the call and check affordability, gathered
        // before any write.
        let has_value = resolved.transfers_value && !resolved.value.is_zero();
        let target_is_empty = if has_value {
            self.account_is_empty(resolved.to)?
        } else {
            false
        };
        let call_gas = gas_cost::call_gas(
            self.current_frame()?.gas_remaining(),
            resolved.gas_requested,
            is_cold,
            resolved.value,
            target_is_empty,
            self.fork(),
            resolved.transfers_value,
        )?;
        let caller_balance = if has_value { self.get_balance(caller_to)? } else { U256::zero() };
        let target_balance = if has_value { self.get_balance(resolved.to)? } else { U256::zero() };

        self.charge_gas(call_gas.caller_cost)?;

        // Step 4: value transfer (step 3's snapshot is simply "no writes
        // have happened yet", since every read above preceded this point).
        if has_value {
            if caller_balance < resolved.value {
                return self.fail_without_frame();
            }
            let new_caller_balance = caller_balance
                .checked_sub(resolved.value)
                .ok_or_else(|| InternalError::Custom("balance underflow after affordability check".into()))?;
            let new_target_balance = target_balance
                .checked_add(resolved.value)
                .ok_or(InternalError::Overflow)?;
            self.set_balance(caller_to, new_caller_balance);
            self.set_balance(resolved.to, new_target_balance);
        }

        // Step 6: precompile dispatch is a pure function call, not a frame.
        if crate::precompile::is_precompile_address(resolved.code_address, self.fork()) {
            return self.dispatch_precompile(resolved, call_gas.gas_forwarded);
        }

        // Step 7: EIP-7702 delegation resolution.
        let (code, authorized) = self.resolve_code(resolved.code_address)?;

        let memory = self.current_frame()?.memory.next_memory();
        let mut frame = CallFrame::new(
            resolved.msg_sender,
            resolved.to,
            resolved.code_address,
            code,
            resolved.value,
            resolved.input,
            resolved.is_static,
            call_gas.gas_forwarded,
            depth + 1,
            resolved.transfers_value,
            false,
            resolved.ret_offset,
            resolved.ret_size,
            Stack::new(),
            memory,
        );
        frame.authorized = authorized;

        // Step 8: create frame with gas forwarded per the 63/64 rule.
        self.push_frame(frame);
        Ok(())
    }

    /// Entry point for CREATE/CREATE2 (§4.2 steps 1, 3-5, 8). The caller's
    /// own static/dynamic CREATE opcode cost (the EIP-3860 per-word charge
    /// and, for CREATE2, the init-code hash cost) is charged by the opcode
    /// handler before calling this; this method only handles the
    /// nonce/collision/value-transfer machinery and gas forwarded to the
    /// init code itself.
    pub fn enter_create(
        &mut self,
        is_create2: bool,
        value: U256,
        init_code: Bytes,
        salt: Option<U256>,
        gas_requested: U256,
    ) -> Result<(), VMError> {
        let creator = self.current_frame()?.to;
        let depth = self.current_frame()?.depth;
        let is_static = self.current_frame()?.is_static;
        if is_static {
            return Err(ExceptionalHalt::WriteProtection.into());
        }
        if depth >= CALL_STACK_LIMIT {
            return self.fail_without_frame();
        }
        if self.fork() >= Hardfork::Shanghai && init_code.len() > constants::MAX_INITCODE_SIZE {
            return self.fail_without_frame();
        }

        // All reads, gathered before any write.
        let nonce = self.get_nonce(creator)?;
        let new_address = if is_create2 {
            utils::create2_address(creator, salt.unwrap_or_default(), &init_code)
        } else {
            utils::create_address(creator, nonce)
        };
        let existing_nonce = self.get_nonce(new_address)?;
        let existing_code = self.get_code(new_address)?;
        let caller_balance = self.get_balance(creator)?;
        let target_balance = self.get_balance(new_address)?;

        let new_nonce = match nonce.checked_add(1) {
            Some(n) => n,
            None => return self.fail_without_frame(),
        };
        if existing_nonce != 0 || !existing_code.is_empty() {
            trace!(?new_address, "vm: CREATE address collision");
            return self.fail_without_frame();
        }
        if caller_balance < value {
            return self.fail_without_frame();
        }

        // Commit: every validation above passed, so these writes cannot be
        // interrupted by a later yield in this same call.
        self.set_nonce(creator, new_nonce);
        let new_creator_balance = caller_balance
            .checked_sub(value)
            .ok_or_else(|| InternalError::Custom("balance underflow after affordability check".into()))?;
        let new_target_balance = target_balance
            .checked_add(value)
            .ok_or(InternalError::Overflow)?;
        self.set_balance(creator, new_creator_balance);
        self.set_balance(new_address, new_target_balance);
        // EIP-161: a freshly created account's own nonce starts at 1, not
        // 0 — this is what makes a second CREATE/CREATE2 to the same
        // address collide even when the first deployment's init code
        // itself never wrote any state (e.g. a bare STOP).
        self.set_nonce(new_address, 1);
        self.state.mark_created_this_tx(new_address);
        self.access_address(new_address);

        let call_gas = gas_cost::call_gas(
            self.current_frame()?.gas_remaining(),
            gas_requested,
            false,
            U256::zero(),
            false,
            self.fork(),
            false,
        )?;
        self.charge_gas(call_gas.caller_cost)?;

        let memory = self.current_frame()?.memory.next_memory();
        let frame = CallFrame::new(
            creator,
            new_address,
            new_address,
            Code::new(init_code),
            value,
            Bytes::new(),
            false,
            call_gas.gas_forwarded,
            depth + 1,
            false,
            true,
            0,
            0,
            Stack::new(),
            memory,
        );
        self.push_frame(frame);
        Ok(())
    }

    /// Runs a precompile synchronously in place of pushing a frame. Per the
    /// conservative resolution adopted for gas overspend: `gas_used >
    /// supplied` (or no registered implementation) consumes everything
    /// forwarded and fails the call outright, with no partial refund.
    fn dispatch_precompile(&mut self, resolved: ResolvedCall, gas_forwarded: u64) -> Result<(), VMError> {
        let outcome = self.precompiles.dispatch(resolved.code_address, self.fork(), &resolved.input, gas_forwarded);
        match outcome {
            Some(output) if output.success && output.gas_used <= gas_forwarded => {
                self.charge_gas(output.gas_used)?;
                let ret_offset = resolved.ret_offset;
                let ret_size = resolved.ret_size;
                let data = output.output;
                let frame = self.current_frame_mut()?;
                frame.return_data = data.clone();
                if ret_size > 0 {
                    frame.memory.store_data_zero_padded(ret_offset, &data, ret_size)?;
                }
                frame.stack.push(U256::one())
            }
            _ => {
                self.charge_gas(gas_forwarded)?;
                self.fail_without_frame()
            }
        }
    }

    /// Pushes `0` onto the current frame's stack and clears its return
    /// data, for a sub-call that failed before any frame was created.
    fn fail_without_frame(&mut self) -> Result<(), VMError> {
        let frame = self.current_frame_mut()?;
        frame.return_data = Bytes::new();
        frame.stack.push_zero()
    }

    /// Folds a just-popped child frame's outcome into the new top (parent)
    /// frame: result flag / created address on the stack, return data,
    /// unspent gas, and — for CREATE — code deposit.
    pub(crate) fn apply_child_result(&mut self, finished: &CallFrame, is_create: bool, gas_left: u64, result: ContextResult) {
        if is_create {
            self.apply_create_result(finished, gas_left, result);
        } else {
            self.apply_call_result(finished, gas_left, result);
        }
    }

    fn apply_call_result(&mut self, finished: &CallFrame, gas_left: u64, result: ContextResult) {
        let output = result.output();
        let success = result.is_success();
        // §4.2 step 9: Revert returns unspent gas; Error consumes it all.
        let refund_gas = !matches!(result, ContextResult::Error { .. });

        let ret_offset = finished.ret_offset;
        let ret_size = finished.ret_size;
        let Ok(parent) = self.current_frame_mut() else {
            return;
        };
        if refund_gas {
            parent.gas_used = parent.gas_used.saturating_sub(gas_left);
        }
        parent.return_data = output.clone();
        if ret_size > 0 {
            let _ = parent.memory.store_data_zero_padded(ret_offset, &output, ret_size);
        }
        let pushed = if success {
            parent.stack.push(U256::one())
        } else {
            parent.stack.push_zero()
        };
        if let Err(err) = pushed {
            trace!(?err, "vm: failed to push call result (stack already at capacity)");
        }
    }

    fn apply_create_result(&mut self, finished: &CallFrame, gas_left: u64, result: ContextResult) {
        match &result {
            ContextResult::Return { .. } | ContextResult::Stop => {
                let remaining = deploy_create_output(self, finished.to, &result, gas_left);
                if let Ok(parent) = self.current_frame_mut() {
                    parent.gas_used = parent.gas_used.saturating_sub(remaining);
                    parent.return_data = Bytes::new();
                    let _ = parent.stack.push(utils::address_to_word(finished.to));
                }
            }
            ContextResult::Revert { output } => {
                let output = output.clone();
                if let Ok(parent) = self.current_frame_mut() {
                    parent.gas_used = parent.gas_used.saturating_sub(gas_left);
                    parent.return_data = output;
                    let _ = parent.stack.push_zero();
                }
            }
            ContextResult::Error { kind } => {
                trace!(?kind, "vm: contract creation failed");
                if let Ok(parent) = self.current_frame_mut() {
                    parent.return_data = Bytes::new();
                    let _ = parent.stack.push_zero();
                }
            }
        }
    }
}

/// Deploys a just-finished CREATE's output as `to`'s code, returning the
/// gas left after the EIP-170/deposit-cost bookkeeping. Shared by the
/// child-merge path above (a CREATE nested inside another frame) and by
/// `executor::Executor`, which has no parent frame to merge a result into
/// when the *top-level* transaction itself is a CREATE.
pub(crate) fn deploy_create_output(vm: &mut VM, to: Address, result: &ContextResult, gas_left: u64) -> u64 {
    match result {
        ContextResult::Return { output } => {
            // Validity already checked by `validate_create_deployment`
            // before this frame was popped; only the deposit cost
            // bookkeeping remains.
            let deposit_cost = gas_cost::code_deposit_cost(output.len()).unwrap_or(gas_left);
            let remaining = gas_left.saturating_sub(deposit_cost);
            vm.set_code(to, Code::new(output.clone()));
            remaining
        }
        ContextResult::Stop => {
            // Init code halted via plain STOP: deploys empty code.
            vm.set_code(to, Code::default());
            gas_left
        }
        ContextResult::Revert { .. } | ContextResult::Error { .. } => gas_left,
    }
}

/// Checked before a CREATE's child frame is popped (while the deployed
/// bytes still live in the child's own `ContextResult::Return`), so that a
/// validation failure here can be converted into an `Error` *before*
/// `pop_frame` decides whether to roll back — a failed deployment must
/// discard the init code's own storage writes too, even though the init
/// code itself returned normally.
pub(crate) fn validate_create_deployment(output: &Bytes, gas_left: u64, fork: Hardfork) -> Result<(), ExceptionalHalt> {
    if fork >= Hardfork::SpuriousDragon && output.len() > constants::MAX_CODE_SIZE {
        return Err(ExceptionalHalt::CreatedCodeTooLarge);
    }
    if fork >= Hardfork::London && output.first() == Some(&constants::INVALID_CONTRACT_PREFIX) {
        return Err(ExceptionalHalt::InvalidCreatedCodePrefix);
    }
    let deposit_cost = gas_cost::code_deposit_cost(output.len()).map_err(|_| ExceptionalHalt::OutOfGas)?;
    if deposit_cost > gas_left {
        return Err(ExceptionalHalt::OutOfGas);
    }
    Ok(())
}
