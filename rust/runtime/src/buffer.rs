//! Machine mailbox with admission control and deferral-aware dequeue.
//!
//! The buffer is an ordered multiset of [`EventNode`]s. Enqueue enforces each
//! event's `max_instances`; dequeue removes the first node admissible under
//! the owner's current [`DequeueFilter`].

use std::collections::VecDeque;

use esm_types::{Event, EventId, EventSet, MaxInstances, Value};
use serde::{Deserialize, Serialize};

use crate::faults::ContractViolation;

/// One buffered event with its payload.
///
/// The node owns its payload; nothing else can hold a reference into it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventNode {
    /// Buffered event.
    pub event: EventId,
    /// Payload delivered with the event.
    pub payload: Value,
}

impl EventNode {
    #[must_use]
    pub fn new(event: EventId, payload: Value) -> Self {
        Self { event, payload }
    }
}

/// Enqueue rejected by admission control.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum AdmissionError {
    /// Over-limit enqueue of an `AssumeFail` event. Discard the run.
    #[error("assumption failed: event {event} already has {limit} buffered instance(s)")]
    AssumeFailure {
        /// Event name.
        event: String,
        /// Configured limit.
        limit: u32,
    },
    /// Over-limit enqueue of a `HardError` event. A modeling defect.
    #[error("attempting to enqueue event {event} more than max instance of {limit}")]
    MaxInstancesExceeded {
        /// Event name.
        event: String,
        /// Configured limit.
        limit: u32,
    },
}

impl AdmissionError {
    /// Whether the branch should be discarded rather than reported.
    #[must_use]
    pub fn is_assumption_failure(&self) -> bool {
        matches!(self, Self::AssumeFailure { .. })
    }
}

/// The owner's view used to decide which buffered events may be delivered.
#[derive(Debug, Clone, Copy)]
pub struct DequeueFilter<'a> {
    /// Events deferred in the active state configuration.
    pub deferred: &'a EventSet,
    /// Events awaited by an active selective receive; empty when none.
    pub receive: &'a EventSet,
}

impl<'a> DequeueFilter<'a> {
    #[must_use]
    pub fn new(deferred: &'a EventSet, receive: &'a EventSet) -> Self {
        Self { deferred, receive }
    }

    /// Whether `event` may be delivered.
    ///
    /// Inside a selective receive only awaited events are admissible and
    /// deferral is ignored. Otherwise everything not deferred is admissible.
    #[must_use]
    pub fn admits(&self, event: EventId) -> bool {
        if self.receive.is_empty() {
            !self.deferred.contains(&event)
        } else {
            self.receive.contains(&event)
        }
    }
}

/// A machine's mailbox.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventBuffer {
    events: VecDeque<EventNode>,
}

impl EventBuffer {
    /// Create an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty buffer with preallocated space.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity),
        }
    }

    /// Number of buffered nodes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of buffered nodes referencing `event`.
    #[must_use]
    pub fn calculate_instances(&self, event: EventId) -> usize {
        self.events.iter().filter(|n| n.event == event).count()
    }

    /// Buffered nodes in delivery order.
    pub fn iter(&self) -> impl Iterator<Item = &EventNode> {
        self.events.iter()
    }

    /// Append an event, subject to its admission limit.
    ///
    /// # Errors
    ///
    /// Returns an [`AdmissionError`] when the event already has
    /// `max_instances` buffered nodes. The buffer is left unchanged.
    pub fn enqueue(&mut self, event: &Event, payload: Value) -> Result<(), AdmissionError> {
        if let MaxInstances::Bounded(limit) = event.max_instances {
            let count = self.calculate_instances(event.id);
            if u32::try_from(count).map_or(true, |count| count >= limit) {
                return Err(if event.is_assume() {
                    tracing::debug!(event = %event.name, limit, "enqueue violates assumption");
                    AdmissionError::AssumeFailure {
                        event: event.name.clone(),
                        limit,
                    }
                } else {
                    tracing::warn!(event = %event.name, limit, "max instances exceeded");
                    AdmissionError::MaxInstancesExceeded {
                        event: event.name.clone(),
                        limit,
                    }
                });
            }
        }
        tracing::trace!(event = %event.name, size = self.events.len() + 1, "enqueue");
        self.events.push_back(EventNode::new(event.id, payload));
        Ok(())
    }

    /// Position of the first admissible node, if any.
    fn first_admissible(&self, filter: &DequeueFilter<'_>) -> Option<usize> {
        self.events.iter().position(|n| filter.admits(n.event))
    }

    /// Whether some buffered node is admissible under `filter`.
    #[must_use]
    pub fn is_enabled(&self, filter: &DequeueFilter<'_>) -> bool {
        self.first_admissible(filter).is_some()
    }

    /// Remove and return the first admissible node.
    ///
    /// # Errors
    ///
    /// Returns [`ContractViolation::NoAdmissibleEvent`] if nothing is
    /// admissible; callers must check [`Self::is_enabled`] first.
    pub fn dequeue(&mut self, filter: &DequeueFilter<'_>) -> Result<EventNode, ContractViolation> {
        let node = self
            .first_admissible(filter)
            .and_then(|idx| self.events.remove(idx))
            .ok_or(ContractViolation::NoAdmissibleEvent)?;
        tracing::trace!(event = %node.event, remaining = self.events.len(), "dequeue");
        Ok(node)
    }
}
