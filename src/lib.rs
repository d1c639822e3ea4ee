//! mevm: a minimal, embeddable Ethereum Virtual Machine execution engine.
//!
//! The crate is organized the way the interpreter actually runs: `vm`
//! (`VM`, the combined Interpreter + Call/Create Orchestrator) drives a
//! `frame_stack` of `call_frame::CallFrame`s, dispatching each step through
//! the fork-gated table built in `opcodes` to one of the handler functions
//! in `opcode_handlers`. `state` holds the per-transaction overlay
//! (storage, warm sets, refunds, logs) that a `db::Database` backs and a
//! `push_frame`/`pop_frame` snapshot can roll back. `executor` is the
//! top-level entry point a host actually calls.
//!
//! No RLP/JSON transaction decoding, no state trie, no consensus block
//! validation, no precompile *implementations* beyond stubs that report
//! failure honestly — see `SPEC_FULL.md`'s Non-goals. What's here is the
//! execution semantics: given a resolved call and a database, run it.

pub mod account;
pub mod call_frame;
pub mod constants;
pub mod db;
pub mod environment;
pub mod errors;
pub mod executor;
pub mod gas_cost;
pub mod memory;
pub mod opcode_handlers;
pub mod opcodes;
pub mod orchestrator;
pub mod precompile;
pub mod stack;
pub mod state;
pub mod trace;
pub mod utils;
pub mod vm;

pub use account::{AccountState, Code, CodeMetadata};
pub use db::{Database, InMemoryDatabase, ResumeValue};
pub use environment::{BlockContext, ChainConfig, Environment, Hardfork};
pub use errors::{ContextResult, ExceptionalHalt, ReadKind, Resumable, VMError};
pub use executor::{ExecutionOutcome, ExecutionRequest, Executor};
pub use orchestrator::CallParams;
pub use vm::VM;
