//! Event declarations.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::identifiers::EventId;
use crate::val_type::ValType;

/// Set of events, ordered by id so iteration is deterministic.
pub type EventSet = BTreeSet<EventId>;

/// Upper bound on buffered instances of one event in a single mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MaxInstances {
    /// No admission control.
    Unbounded,
    /// At most this many instances may be buffered at once.
    Bounded(u32),
}

impl MaxInstances {
    /// The limit, or `None` when unbounded.
    #[must_use]
    pub fn limit(self) -> Option<u32> {
        match self {
            Self::Unbounded => None,
            Self::Bounded(k) => Some(k),
        }
    }
}

/// What an over-limit enqueue means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdmissionPolicy {
    /// The run left the modeled input space; discard it silently.
    AssumeFail,
    /// Unbounded queue growth is a modeling defect; report it.
    HardError,
}

/// An immutable event descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Identity of this event.
    pub id: EventId,
    /// Declared name.
    pub name: String,
    /// Payload type.
    pub payload_type: ValType,
    /// Admission limit.
    pub max_instances: MaxInstances,
    /// Over-limit policy.
    pub policy: AdmissionPolicy,
}

impl Event {
    /// Create an event descriptor.
    #[must_use]
    pub fn new(
        id: EventId,
        name: impl Into<String>,
        payload_type: ValType,
        max_instances: MaxInstances,
        policy: AdmissionPolicy,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            payload_type,
            max_instances,
            policy,
        }
    }

    /// The process-wide null event.
    pub fn null() -> &'static Event {
        static NULL: OnceLock<Event> = OnceLock::new();
        NULL.get_or_init(|| {
            Event::new(
                EventId::NULL,
                "null",
                ValType::Null,
                MaxInstances::Unbounded,
                AdmissionPolicy::HardError,
            )
        })
    }

    /// The process-wide halt event.
    pub fn halt() -> &'static Event {
        static HALT: OnceLock<Event> = OnceLock::new();
        HALT.get_or_init(|| {
            Event::new(
                EventId::HALT,
                "halt",
                ValType::Null,
                MaxInstances::Unbounded,
                AdmissionPolicy::HardError,
            )
        })
    }

    /// Whether an over-limit enqueue is an assumption failure.
    #[must_use]
    pub fn is_assume(&self) -> bool {
        self.policy == AdmissionPolicy::AssumeFail
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}
