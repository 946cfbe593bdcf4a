//! Execution core of an extended state-machine runtime.
//!
//! Each machine instance owns a mailbox, a stack of nested states and a stack
//! of suspended handler frames. An external scheduler drives instances one
//! step at a time through the continuation protocol.
//!
//! # Architecture
//!
//! - **Program** ([`program::Program`]): validated events, states and handler
//!   functions, shared read-only by all instances
//! - **Buffer** ([`buffer::EventBuffer`]): mailbox with per-event admission
//!   control and deferral/selective-receive aware dequeue
//! - **State stack** ([`state_stack::StateStack`]): nested state
//!   configuration with derived deferred and action sets
//! - **Function stack** ([`fun_stack::FunStack`]): reified handler frames
//! - **Continuation** ([`continuation::Continuation`]): why the running
//!   handler stopped and what the scheduler must do next
//! - **Machine** ([`machine::MachineState`]): ties the above together
//!
//! # Concurrency
//!
//! A machine is mutated by one logical actor at a time. Everything here is
//! `Send`; a multi-threaded scheduler wraps each instance in its own lock and
//! holds it for the whole step, including enqueues from other machines.
//!
//! # Usage
//!
//! ```ignore
//! use esm_runtime::{MachineConfig, MachineState, ContinuationReason};
//!
//! let mut machine = MachineState::new(id, "Main", &MachineConfig::default());
//! machine.push_state(program.state(init).unwrap());
//! let mut reason = machine.invoke(&program, entry, &[])?;
//! while reason != ContinuationReason::Return {
//!     // perform the side effect named by `machine.continuation()`, then:
//!     reason = machine.resume(&program)?;
//! }
//! ```

pub mod buffer;
pub mod config;
pub mod continuation;
pub mod faults;
pub mod fun_stack;
pub mod handler;
pub mod machine;
pub mod program;
pub mod serialization;
pub mod state_stack;

pub use buffer::{AdmissionError, DequeueFilter, EventBuffer, EventNode};
pub use config::MachineConfig;
pub use continuation::{Continuation, ContinuationReason, Suspension};
pub use faults::{
    classify_fault, fault_code, fault_code_of, is_reportable, ContractViolation, FaultClass,
};
pub use fun_stack::{FunStack, FunStackFrame};
pub use handler::{Fun, IgnoreFun, ReceiveCase, SkipFun};
pub use machine::{MachineError, MachineState};
pub use program::{Program, ProgramBuilder, ProgramError};
pub use serialization::{
    canonical_snapshot_v1, decode_snapshot, encode_snapshot, MachineSnapshotV1, SnapshotError,
};
pub use state_stack::{StateStack, StateStackFrame};
