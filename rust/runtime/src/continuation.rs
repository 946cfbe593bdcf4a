//! Why a handler left the "keep running" path, and what it needs to resume.
//!
//! Handler code records exactly one [`Suspension`] before handing control
//! back. The scheduler inspects [`Continuation::reason`], performs the side
//! effect, injects any result and resumes the function stack. These eight
//! reasons are the only suspension points; everything between two of them
//! is one uninterrupted logical step.

use esm_types::{EventId, MachineId, StateId, Value};
use serde::{Deserialize, Serialize};

use crate::faults::ContractViolation;

/// Discriminant of a [`Suspension`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContinuationReason {
    /// Idle, or the handler returned.
    Return,
    /// Waiting for a boolean choice.
    Nondet,
    /// Pop the current state.
    Pop,
    /// Deliver an event ahead of the mailbox.
    Raise,
    /// Parked on a selective receive.
    Receive,
    /// Post an event to another machine.
    Send,
    /// Create a machine and bind its id.
    NewMachine,
    /// Replace the current state.
    Goto,
}

/// A suspension with the data needed to act on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Suspension {
    /// Handler completed; results flow back to the caller frame.
    Return {
        /// Return value, if any.
        value: Option<Value>,
        /// Caller locals written back by the callee.
        locals: Vec<Value>,
    },
    /// A nondeterministic choice must be injected.
    Nondet,
    /// Pop the active state.
    Pop,
    /// Deliver an event to this machine's current step ahead of the mailbox.
    Raise {
        /// Raised event.
        event: EventId,
        /// Its payload.
        payload: Value,
    },
    /// Park until an event of receive clause `index` is enabled.
    Receive {
        /// Receive clause of the suspended function.
        index: usize,
    },
    /// Enqueue into another machine's mailbox.
    Send {
        /// Receiving machine.
        target: MachineId,
        /// Sent event.
        event: EventId,
        /// Its payload.
        payload: Value,
    },
    /// Create a machine; its id is bound back once construction completes.
    NewMachine {
        /// Machine kind to instantiate.
        kind: String,
        /// Constructor payload.
        payload: Value,
        /// Bound by the scheduler after creation.
        created: Option<MachineId>,
    },
    /// Replace the active state with `target`.
    Goto {
        /// Target state.
        target: StateId,
        /// Payload for the target's entry handler.
        payload: Value,
    },
}

impl Suspension {
    #[must_use]
    pub fn reason(&self) -> ContinuationReason {
        match self {
            Self::Return { .. } => ContinuationReason::Return,
            Self::Nondet => ContinuationReason::Nondet,
            Self::Pop => ContinuationReason::Pop,
            Self::Raise { .. } => ContinuationReason::Raise,
            Self::Receive { .. } => ContinuationReason::Receive,
            Self::Send { .. } => ContinuationReason::Send,
            Self::NewMachine { .. } => ContinuationReason::NewMachine,
            Self::Goto { .. } => ContinuationReason::Goto,
        }
    }

    fn returned() -> Self {
        Self::Return {
            value: None,
            locals: Vec::new(),
        }
    }
}

/// The suspension record of one machine.
///
/// `nondet` lives outside the suspension: it carries an
/// injected choice across [`Continuation::reset`] and snapshots so a replay
/// can re-inject a recorded choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Continuation {
    suspension: Suspension,
    nondet: bool,
}

impl Default for Continuation {
    fn default() -> Self {
        Self {
            suspension: Suspension::returned(),
            nondet: false,
        }
    }
}

impl Continuation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh continuation carrying only the recorded nondeterministic choice.
    #[must_use]
    pub fn for_snapshot(&self) -> Self {
        Self {
            suspension: Suspension::returned(),
            nondet: self.nondet,
        }
    }

    /// Back to `Return` with no value. Keeps `nondet`.
    pub fn reset(&mut self) {
        self.suspension = Suspension::returned();
    }

    #[must_use]
    pub fn reason(&self) -> ContinuationReason {
        self.suspension.reason()
    }

    #[must_use]
    pub fn suspension(&self) -> &Suspension {
        &self.suspension
    }

    /// Record a suspension directly.
    pub fn suspend(&mut self, suspension: Suspension) {
        tracing::debug!(reason = ?suspension.reason(), "suspend");
        self.suspension = suspension;
    }

    pub fn return_value(&mut self, value: Option<Value>, locals: Vec<Value>) {
        self.suspend(Suspension::Return { value, locals });
    }

    pub fn nondet_point(&mut self) {
        self.suspend(Suspension::Nondet);
    }

    pub fn pop(&mut self) {
        self.suspend(Suspension::Pop);
    }

    pub fn raise(&mut self, event: EventId, payload: Value) {
        self.suspend(Suspension::Raise { event, payload });
    }

    pub fn receive(&mut self, index: usize) {
        self.suspend(Suspension::Receive { index });
    }

    pub fn send(&mut self, target: MachineId, event: EventId, payload: Value) {
        self.suspend(Suspension::Send {
            target,
            event,
            payload,
        });
    }

    pub fn new_machine(&mut self, kind: impl Into<String>, payload: Value) {
        self.suspend(Suspension::NewMachine {
            kind: kind.into(),
            payload,
            created: None,
        });
    }

    pub fn goto(&mut self, target: StateId, payload: Value) {
        self.suspend(Suspension::Goto { target, payload });
    }

    /// The injected nondeterministic choice.
    #[must_use]
    pub fn nondet(&self) -> bool {
        self.nondet
    }

    /// Inject a nondeterministic choice ahead of resumption.
    pub fn inject_nondet(&mut self, choice: bool) {
        self.nondet = choice;
    }

    /// Bind the id of a machine created for a `NewMachine` suspension.
    ///
    /// # Errors
    ///
    /// Fails if the continuation is not suspended on `NewMachine` or an id was
    /// already bound.
    pub fn bind_created_machine(&mut self, id: MachineId) -> Result<(), ContractViolation> {
        match &mut self.suspension {
            Suspension::NewMachine { created: Some(prev), .. } => {
                Err(ContractViolation::MachineAlreadyBound(*prev))
            }
            Suspension::NewMachine { created, .. } => {
                *created = Some(id);
                Ok(())
            }
            other => Err(ContractViolation::NotSuspendedOn {
                expected: ContinuationReason::NewMachine,
                actual: other.reason(),
            }),
        }
    }

    /// The machine created for a `NewMachine` suspension, once bound.
    #[must_use]
    pub fn created_machine(&self) -> Option<MachineId> {
        match &self.suspension {
            Suspension::NewMachine { created, .. } => *created,
            _ => None,
        }
    }

    /// Receive clause index while suspended on `Receive`.
    #[must_use]
    pub fn receive_index(&self) -> Option<usize> {
        match &self.suspension {
            Suspension::Receive { index } => Some(*index),
            _ => None,
        }
    }

    /// Take the return value and locals, leaving an empty `Return`.
    ///
    /// # Errors
    ///
    /// Fails if the continuation is not a `Return`.
    pub fn take_return(&mut self) -> Result<(Option<Value>, Vec<Value>), ContractViolation> {
        match std::mem::replace(&mut self.suspension, Suspension::returned()) {
            Suspension::Return { value, locals } => Ok((value, locals)),
            other => {
                let actual = other.reason();
                self.suspension = other;
                Err(ContractViolation::NotSuspendedOn {
                    expected: ContinuationReason::Return,
                    actual,
                })
            }
        }
    }
}
