//! The optional per-step trace sink (§6.4). Kept behind a trait object so
//! tracing is zero-cost when disabled, per the Design Notes' instruction.

use bytes::Bytes;
use ethereum_types::{Address, U256};

use crate::errors::ExceptionalHalt;

/// One executed opcode's trace record, per §6.4. Memory/stack inclusion is
/// configurable via `TraceConfig` rather than always populated, since a
/// full memory snapshot per step is the expensive part.
#[derive(Debug, Clone)]
pub struct TraceEvent {
    pub pc: usize,
    pub op_byte: u8,
    pub op_name: &'static str,
    pub gas_before: u64,
    pub gas_cost: u64,
    pub depth: usize,
    pub refund: i64,
    pub stack: Option<Vec<U256>>,
    pub memory: Option<Bytes>,
    pub return_data: Option<Bytes>,
    pub error: Option<ExceptionalHalt>,
}

/// What a `Tracer` should actually capture, since stack/memory copies are
/// the costly part of step tracing.
#[derive(Debug, Clone, Copy, Default)]
pub struct TraceConfig {
    pub enabled: bool,
    pub capture_stack: bool,
    pub capture_memory: bool,
    pub capture_return_data: bool,
}

/// Caller-facing step sink, distinct from the crate-maintainer-facing
/// `tracing` spans/events emitted throughout the interpreter: this is a
/// data product the embedder consumes, not a diagnostics channel.
pub trait Tracer {
    fn on_step(&mut self, event: TraceEvent);

    /// Called once a call/create frame begins, before its first opcode.
    fn on_call_enter(&mut self, _to: Address, _depth: usize) {}

    /// Called once a call/create frame halts.
    fn on_call_exit(&mut self, _depth: usize, _success: bool) {}
}

/// The zero-cost default: every method is a no-op, and the crate's hot
/// path checks `TraceConfig::enabled` before ever constructing a
/// `TraceEvent`, so disabled tracing does not even pay for the struct
/// literal.
#[derive(Debug, Default)]
pub struct NoopTracer;

impl Tracer for NoopTracer {
    fn on_step(&mut self, _event: TraceEvent) {}
}

/// An in-memory tracer useful for tests and simple embedders: collects
/// every step into a `Vec` in order.
#[derive(Debug, Default)]
pub struct VecTracer {
    pub steps: Vec<TraceEvent>,
}

impl Tracer for VecTracer {
    fn on_step(&mut self, event: TraceEvent) {
        self.steps.push(event);
    }
}
