//! Scheduler contract violations and the stable fault taxonomy.
//!
//! Only two failure kinds are visible to a model: assumption failures and
//! max-instance violations (both [`AdmissionError`]). Everything else here
//! means the driving scheduler broke an invariant of the core and must not be
//! recovered from.

use esm_types::{EventId, FunId, MachineId};
use serde::{Deserialize, Serialize};

use crate::buffer::AdmissionError;
use crate::continuation::ContinuationReason;
use crate::machine::MachineError;

/// A scheduler broke an invariant of the core.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum ContractViolation {
    /// Pop or inspect on an empty state stack.
    #[error("{op} on empty state stack")]
    EmptyStateStack {
        /// Operation that was attempted.
        op: String,
    },
    /// Pop or resume on an empty function stack.
    #[error("{op} on empty function stack")]
    EmptyFunStack {
        /// Operation that was attempted.
        op: String,
    },
    /// Dequeue while no buffered event is admissible.
    #[error("dequeue with no admissible event; check is_enabled first")]
    NoAdmissibleEvent,
    /// Operation needs an active state.
    #[error("{op} requires an active state")]
    NoActiveState {
        /// Operation that was attempted.
        op: String,
    },
    /// Continuation was not suspended for the expected reason.
    #[error("continuation suspended on {actual:?}, expected {expected:?}")]
    NotSuspendedOn {
        /// Reason the operation needs.
        expected: ContinuationReason,
        /// Reason actually recorded.
        actual: ContinuationReason,
    },
    /// Function id not declared in the program.
    #[error("unknown function {0}")]
    UnknownFun(FunId),
    /// Receive clause index out of range.
    #[error("function {fun} has no receive case {index}")]
    MissingReceiveCase {
        /// Function that suspended.
        fun: FunId,
        /// Requested clause.
        index: usize,
    },
    /// Trigger delivered to a receive that does not await it.
    #[error("trigger {0} is not awaited by the active receive")]
    UnexpectedTrigger(EventId),
    /// Snapshot requested while a side effect is still pending.
    #[error("snapshot while suspended on {0:?}")]
    SnapshotWhileSuspended(ContinuationReason),
    /// Created machine bound twice.
    #[error("created machine already bound to {0}")]
    MachineAlreadyBound(MachineId),
}

impl ContractViolation {
    pub(crate) fn empty_state_stack(op: &str) -> Self {
        Self::EmptyStateStack { op: op.to_string() }
    }

    pub(crate) fn empty_fun_stack(op: &str) -> Self {
        Self::EmptyFunStack { op: op.to_string() }
    }

    pub(crate) fn no_active_state(op: &str) -> Self {
        Self::NoActiveState { op: op.to_string() }
    }
}

/// Stable fault taxonomy used by explorers and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FaultClass {
    /// Admission violation on an `AssumeFail` event: discard the branch.
    Assumption,
    /// Admission violation on a `HardError` event: a modeling defect.
    MaxInstances,
    /// Scheduler broke a core invariant.
    Contract,
    /// Handler code reported a failure.
    Handler,
}

/// Classify a machine error into the stable taxonomy.
#[must_use]
pub fn classify_fault(err: &MachineError) -> FaultClass {
    match err {
        MachineError::Admission(AdmissionError::AssumeFailure { .. }) => FaultClass::Assumption,
        MachineError::Admission(AdmissionError::MaxInstancesExceeded { .. }) => {
            FaultClass::MaxInstances
        }
        MachineError::Contract(_) => FaultClass::Contract,
        MachineError::Handler { .. } => FaultClass::Handler,
    }
}

/// Stable machine-readable code for each fault class.
#[must_use]
pub fn fault_code(class: FaultClass) -> &'static str {
    match class {
        FaultClass::Assumption => "runtime.fault.assume",
        FaultClass::MaxInstances => "runtime.fault.max_instances",
        FaultClass::Contract => "runtime.fault.contract",
        FaultClass::Handler => "runtime.fault.handler",
    }
}

/// Stable machine-readable code for a concrete error.
#[must_use]
pub fn fault_code_of(err: &MachineError) -> &'static str {
    fault_code(classify_fault(err))
}

/// Whether an error should be surfaced to the user as a bug.
///
/// Assumption failures are not defects: the explorer drops the branch.
#[must_use]
pub fn is_reportable(err: &MachineError) -> bool {
    classify_fault(err) != FaultClass::Assumption
}
