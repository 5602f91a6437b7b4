//! # keel-vm
//!
//! EVM interpreter parameterized by a [`ForkConfig`].
//!
//! A [`VM`] runs one message at a time against a borrowed
//! [`WorldState`](keel_storage::WorldState). Nested calls and creates are kept on an
//! explicit frame stack, each one running inside its own world-state transaction.

pub mod call_frame;
pub mod constants;
pub mod environment;
pub mod errors;
mod execution_handlers;
pub mod fork_config;
pub mod gas_cost;
pub mod gas_schedule;
pub mod memory;
pub mod opcode_handlers;
pub mod opcodes;
pub mod precompiles;
pub mod tracer;
pub mod utils;
pub mod vm;

pub use environment::Environment;
pub use errors::{ExceptionalHalt, ExecutionReport, InternalError, TxResult, VMError};
pub use fork_config::{EipToggles, ForkConfig, PrecompileSet};
pub use gas_schedule::GasSchedule;
pub use tracer::{JsonTracer, NoopTracer, Step, Tracer};
pub use vm::{Message, Substate, VM};
