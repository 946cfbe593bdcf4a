//! Nested state configuration.
//!
//! Each frame carries deferred and action sets derived at push time from the
//! parent frame and the pushed state's own declarations. Precedence, highest
//! first: local deferral, local transitions, local `do`s, inherited actions,
//! inherited deferral.

use esm_types::{EventId, EventSet, State, StateId};
use serde::{Deserialize, Serialize};

use crate::faults::ContractViolation;

/// One active state with its derived event sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateStackFrame {
    /// Active state.
    pub state: StateId,
    /// Copied from the declaration; immutable once pushed.
    pub has_null_transition: bool,
    /// Events left in the mailbox while this frame is on top.
    pub deferred: EventSet,
    /// Events handled in place by this or an enclosing state.
    pub actions: EventSet,
}

impl StateStackFrame {
    /// Derive the frame for `state` nested under `parent`.
    #[must_use]
    pub fn derive(parent: Option<&StateStackFrame>, state: &State) -> Self {
        let mut deferred = parent.map(|p| p.deferred.clone()).unwrap_or_default();
        deferred.extend(state.deferred.iter().copied());
        deferred.retain(|e| !state.dos.contains_key(e) && !state.transitions.contains_key(e));

        let mut actions = parent.map(|p| p.actions.clone()).unwrap_or_default();
        actions.retain(|e| !state.deferred.contains(e));
        actions.extend(state.dos.keys().copied());
        actions.retain(|e| !state.transitions.contains_key(e));

        Self {
            state: state.id,
            has_null_transition: state.has_null_transition,
            deferred,
            actions,
        }
    }
}

/// The machine's state configuration; the last frame is the active state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateStack {
    frames: Vec<StateStackFrame>,
}

impl StateStack {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            frames: Vec::with_capacity(capacity),
        }
    }

    /// Active frame, or `None` before the initial state is entered.
    #[must_use]
    pub fn top(&self) -> Option<&StateStackFrame> {
        self.frames.last()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frames from outermost to innermost.
    pub fn frames(&self) -> impl Iterator<Item = &StateStackFrame> {
        self.frames.iter()
    }

    /// Push `state`, deriving its deferred and action sets from the top frame.
    pub fn push(&mut self, state: &State) {
        let frame = StateStackFrame::derive(self.top(), state);
        tracing::trace!(
            state = %state.name,
            depth = self.frames.len() + 1,
            deferred = frame.deferred.len(),
            actions = frame.actions.len(),
            "push state"
        );
        self.frames.push(frame);
    }

    /// Pop the active frame.
    ///
    /// # Errors
    ///
    /// Returns a contract violation if the stack is empty.
    pub fn pop(&mut self) -> Result<StateStackFrame, ContractViolation> {
        let frame = self
            .frames
            .pop()
            .ok_or_else(|| ContractViolation::empty_state_stack("pop state"))?;
        tracing::trace!(state = %frame.state, depth = self.frames.len(), "pop state");
        Ok(frame)
    }

    /// Whether the active state has a wildcard transition, or an enclosing
    /// `do` handles the null event.
    ///
    /// # Errors
    ///
    /// Returns a contract violation if the stack is empty.
    pub fn has_null_transition_or_action(&self) -> Result<bool, ContractViolation> {
        let top = self
            .top()
            .ok_or_else(|| ContractViolation::empty_state_stack("null transition check"))?;
        Ok(top.has_null_transition || top.actions.contains(&EventId::NULL))
    }
}
