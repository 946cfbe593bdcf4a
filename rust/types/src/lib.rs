//! Declarations shared by the extended state-machine runtime.
//!
//! This crate holds the static, immutable side of a loaded model:
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`EventId`], [`StateId`], [`FunId`], [`MachineId`] | identity of declarations and instances |
//! | [`Event`] | event descriptor with admission control |
//! | [`State`], [`Transition`] | hierarchical state declarations |
//! | [`ValType`], [`Value`] | payload types and owned runtime values |
//!
//! Declarations are referenced by id from runtime structures, so cloning a
//! machine never clones a declaration.
//!
//! # Example
//!
//! ```
//! use esm_types::{Event, EventId, MaxInstances, AdmissionPolicy, ValType};
//!
//! let ping = Event::new(
//!     EventId::new(2),
//!     "Ping",
//!     ValType::Int,
//!     MaxInstances::Bounded(1),
//!     AdmissionPolicy::HardError,
//! );
//! assert_eq!(ping.max_instances.limit(), Some(1));
//! assert_eq!(Event::halt().id, EventId::HALT);
//! ```

mod event;
mod identifiers;
mod state;
mod val_type;
mod value;

pub use event::{AdmissionPolicy, Event, EventSet, MaxInstances};
pub use identifiers::{EventId, FunId, MachineId, StateId};
pub use state::{State, Temperature, Transition, TransitionKind};
pub use val_type::ValType;
pub use value::Value;
