//! The loaded model: declared events, states and handler functions.
//!
//! A [`Program`] is built once, validated, and then shared read-only by all
//! machine instances (typically behind an `Arc`). Runtime structures refer to
//! its declarations by id.

use std::sync::Arc;

use esm_types::{AdmissionPolicy, Event, EventId, FunId, MaxInstances, State, StateId, ValType};

use crate::handler::{Fun, IgnoreFun, SkipFun};

static IGNORE: IgnoreFun = IgnoreFun;
static SKIP: SkipFun = SkipFun;

/// A dangling reference found while building a program.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProgramError {
    /// Reference to an undeclared event.
    #[error("{context}: unknown event {event}")]
    UnknownEvent {
        /// Where the reference was found.
        context: String,
        /// The dangling id.
        event: EventId,
    },
    /// Reference to an undeclared state.
    #[error("{context}: unknown state {state}")]
    UnknownState {
        /// Where the reference was found.
        context: String,
        /// The dangling id.
        state: StateId,
    },
    /// Reference to an undeclared function.
    #[error("{context}: unknown function {fun}")]
    UnknownFun {
        /// Where the reference was found.
        context: String,
        /// The dangling id.
        fun: FunId,
    },
}

/// A validated model.
#[derive(Debug, Clone)]
pub struct Program {
    events: Vec<Event>,
    states: Vec<State>,
    funs: Vec<Arc<dyn Fun>>,
}

fn user_index(raw: usize, first_user: usize) -> Option<usize> {
    raw.checked_sub(first_user)
}

impl Program {
    /// Look up an event. The null and halt events are always present.
    #[must_use]
    pub fn event(&self, id: EventId) -> Option<&Event> {
        match id {
            EventId::NULL => Some(Event::null()),
            EventId::HALT => Some(Event::halt()),
            _ => user_index(id.index(), EventId::FIRST_USER.index())
                .and_then(|idx| self.events.get(idx)),
        }
    }

    #[must_use]
    pub fn state(&self, id: StateId) -> Option<&State> {
        self.states.get(id.index())
    }

    /// Look up a function. `Ignore` and `Skip` are always present.
    #[must_use]
    pub fn fun(&self, id: FunId) -> Option<&dyn Fun> {
        match id {
            FunId::IGNORE => Some(&IGNORE as &dyn Fun),
            FunId::SKIP => Some(&SKIP as &dyn Fun),
            _ => user_index(id.index(), FunId::FIRST_USER.index())
                .and_then(|idx| self.funs.get(idx))
                .map(|f| &**f),
        }
    }

    /// First event declared under `name`.
    #[must_use]
    pub fn event_by_name(&self, name: &str) -> Option<&Event> {
        [Event::null(), Event::halt()]
            .into_iter()
            .chain(self.events.iter())
            .find(|e| e.name == name)
    }

    /// First state declared under `name`.
    #[must_use]
    pub fn state_by_name(&self, name: &str) -> Option<&State> {
        self.states.iter().find(|s| s.name == name)
    }

    /// User-declared events, in declaration order.
    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    /// Declared states, in declaration order.
    pub fn states(&self) -> impl Iterator<Item = &State> {
        self.states.iter()
    }
}

/// Incremental program construction.
#[derive(Debug, Default)]
pub struct ProgramBuilder {
    events: Vec<Event>,
    states: Vec<State>,
    funs: Vec<Arc<dyn Fun>>,
}

fn next_id(len: usize, first: u32) -> u32 {
    // Declaration tables never approach u32::MAX entries.
    u32::try_from(len).map_or(u32::MAX, |n| n.saturating_add(first))
}

impl ProgramBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an event.
    pub fn declare_event(
        &mut self,
        name: impl Into<String>,
        payload_type: ValType,
        max_instances: MaxInstances,
        policy: AdmissionPolicy,
    ) -> EventId {
        let id = EventId::new(next_id(self.events.len(), EventId::FIRST_USER.raw()));
        self.events
            .push(Event::new(id, name, payload_type, max_instances, policy));
        id
    }

    /// Declare a handler function.
    pub fn declare_fun(&mut self, fun: impl Fun + 'static) -> FunId {
        let id = FunId::new(next_id(self.funs.len(), FunId::FIRST_USER.raw()));
        self.funs.push(Arc::new(fun));
        id
    }

    /// Declare a state with no transitions; fill it in via [`Self::state_mut`].
    pub fn declare_state(&mut self, name: impl Into<String>, entry: FunId, exit: FunId) -> StateId {
        let id = StateId::new(next_id(self.states.len(), 0));
        self.states.push(State::new(id, name, entry, exit));
        id
    }

    /// Mutable access to a declared state.
    pub fn state_mut(&mut self, id: StateId) -> Option<&mut State> {
        self.states.get_mut(id.index())
    }

    /// Validate every reference and freeze the program.
    ///
    /// # Errors
    ///
    /// Returns the first dangling reference found.
    pub fn build(self) -> Result<Program, ProgramError> {
        let program = Program {
            events: self.events,
            states: self.states,
            funs: self.funs,
        };
        for state in &program.states {
            validate_state(&program, state)?;
        }
        for (idx, fun) in program.funs.iter().enumerate() {
            for (case_idx, case) in fun.receive_cases().iter().enumerate() {
                let context = format!("fun {} receive case {case_idx}", fun.name());
                for event in case.events() {
                    check_event(&program, &context, event)?;
                }
                for handler in case.handlers() {
                    check_fun(&program, &context, handler)?;
                }
            }
            tracing::trace!(fun = fun.name(), idx, "validated");
        }
        tracing::debug!(
            events = program.events.len(),
            states = program.states.len(),
            funs = program.funs.len(),
            "program built"
        );
        Ok(program)
    }
}

fn check_event(program: &Program, context: &str, event: EventId) -> Result<(), ProgramError> {
    program
        .event(event)
        .map(|_| ())
        .ok_or_else(|| ProgramError::UnknownEvent {
            context: context.to_string(),
            event,
        })
}

fn check_fun(program: &Program, context: &str, fun: FunId) -> Result<(), ProgramError> {
    program
        .fun(fun)
        .map(|_| ())
        .ok_or_else(|| ProgramError::UnknownFun {
            context: context.to_string(),
            fun,
        })
}

fn validate_state(program: &Program, state: &State) -> Result<(), ProgramError> {
    let context = format!("state {}", state.name);
    check_fun(program, &context, state.entry)?;
    check_fun(program, &context, state.exit)?;
    for (event, transition) in &state.transitions {
        check_event(program, &context, *event)?;
        if program.state(transition.target).is_none() {
            return Err(ProgramError::UnknownState {
                context,
                state: transition.target,
            });
        }
        if let Some(fun) = transition.transition_fun() {
            check_fun(program, &context, fun)?;
        }
    }
    for (event, fun) in &state.dos {
        check_event(program, &context, *event)?;
        check_fun(program, &context, *fun)?;
    }
    for event in &state.deferred {
        check_event(program, &context, *event)?;
    }
    Ok(())
}
