//! State and transition declarations.
//!
//! A [`State`] is static once a program is loaded and is shared by every
//! machine instance of its kind. The runtime derives per-frame deferred and
//! action sets from these declarations when it pushes a state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::event::EventSet;
use crate::identifiers::{EventId, FunId, StateId};

/// Liveness classification of a state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Temperature {
    /// The machine may stay here forever.
    Cold,
    /// No liveness obligation either way.
    #[default]
    Warm,
    /// The machine must eventually leave this state.
    Hot,
}

/// How a transition changes the active configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransitionKind {
    /// Nest the target on top of the current state. Never runs a function.
    Push,
    /// Replace the current state, running `fun` on the way.
    Goto {
        /// Transition function.
        fun: FunId,
    },
}

/// A transition out of a state on some event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transition {
    /// Target state.
    pub target: StateId,
    /// Push or goto.
    pub kind: TransitionKind,
}

impl Transition {
    /// A push transition.
    #[must_use]
    pub fn push(target: StateId) -> Self {
        Self {
            target,
            kind: TransitionKind::Push,
        }
    }

    /// An ordinary transition running `fun`.
    #[must_use]
    pub fn goto(target: StateId, fun: FunId) -> Self {
        Self {
            target,
            kind: TransitionKind::Goto { fun },
        }
    }

    #[must_use]
    pub fn is_push(&self) -> bool {
        matches!(self.kind, TransitionKind::Push)
    }

    /// The transition function; `None` exactly for push transitions.
    #[must_use]
    pub fn transition_fun(&self) -> Option<FunId> {
        match self.kind {
            TransitionKind::Push => None,
            TransitionKind::Goto { fun } => Some(fun),
        }
    }
}

/// Declarative description of one hierarchical state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    /// Identity of this state.
    pub id: StateId,
    /// Declared name.
    pub name: String,
    /// Entry handler.
    pub entry: FunId,
    /// Exit handler.
    pub exit: FunId,
    /// Transitions keyed by trigger.
    pub transitions: BTreeMap<EventId, Transition>,
    /// In-place `do` handlers keyed by trigger.
    pub dos: BTreeMap<EventId, FunId>,
    /// Whether a wildcard (null-event) transition exists.
    pub has_null_transition: bool,
    /// Liveness classification.
    pub temperature: Temperature,
    /// Statically deferred events.
    pub deferred: EventSet,
}

impl State {
    /// Create a state with no transitions, dos or deferrals.
    #[must_use]
    pub fn new(id: StateId, name: impl Into<String>, entry: FunId, exit: FunId) -> Self {
        Self {
            id,
            name: name.into(),
            entry,
            exit,
            transitions: BTreeMap::new(),
            dos: BTreeMap::new(),
            has_null_transition: false,
            temperature: Temperature::default(),
            deferred: EventSet::new(),
        }
    }

    /// Add a transition. A transition on the null event also marks the state
    /// as having a wildcard transition.
    pub fn add_transition(&mut self, event: EventId, transition: Transition) -> &mut Self {
        if event == EventId::NULL {
            self.has_null_transition = true;
        }
        self.transitions.insert(event, transition);
        self
    }

    /// Add an in-place `do` handler.
    pub fn add_do(&mut self, event: EventId, fun: FunId) -> &mut Self {
        self.dos.insert(event, fun);
        self
    }

    /// Defer an event while this state is active.
    pub fn defer(&mut self, event: EventId) -> &mut Self {
        self.deferred.insert(event);
        self
    }

    /// Set the liveness classification.
    pub fn set_temperature(&mut self, temperature: Temperature) -> &mut Self {
        self.temperature = temperature;
        self
    }

    /// Declare a wildcard transition without a null-event entry.
    pub fn set_null_transition(&mut self, has_null_transition: bool) -> &mut Self {
        self.has_null_transition = has_null_transition;
        self
    }

    /// Whether this state explicitly handles `event` via a transition or a `do`.
    #[must_use]
    pub fn handles(&self, event: EventId) -> bool {
        self.transitions.contains_key(&event) || self.dos.contains_key(&event)
    }

    #[must_use]
    pub fn is_hot(&self) -> bool {
        self.temperature == Temperature::Hot
    }

    #[must_use]
    pub fn is_cold(&self) -> bool {
        self.temperature == Temperature::Cold
    }
}
