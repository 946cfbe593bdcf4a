//! Handler function trait and the built-in no-op handlers.
//!
//! Generated handler code implements [`Fun`]. A handler reads its own frame
//! from the top of the machine's function stack, records why it stopped in
//! the machine's continuation, and pops its own frame when it returns.

use std::collections::BTreeMap;
use std::fmt;

use esm_types::{EventId, EventSet, FunId, Value};
use serde::{Deserialize, Serialize};

use crate::machine::{MachineError, MachineState};
use crate::program::Program;

/// One clause of a selective receive: awaited events and their handlers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveCase {
    handlers: BTreeMap<EventId, FunId>,
}

impl ReceiveCase {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a case arm.
    #[must_use]
    pub fn on(mut self, event: EventId, handler: FunId) -> Self {
        self.handlers.insert(event, handler);
        self
    }

    /// Events this clause waits for.
    #[must_use]
    pub fn events(&self) -> EventSet {
        self.handlers.keys().copied().collect()
    }

    /// Handler for `event`, if the clause covers it.
    #[must_use]
    pub fn handler(&self, event: EventId) -> Option<FunId> {
        self.handlers.get(&event).copied()
    }

    /// Handler functions referenced by this clause.
    pub fn handlers(&self) -> impl Iterator<Item = FunId> + '_ {
        self.handlers.values().copied()
    }
}

/// A handler function of the model.
pub trait Fun: Send + Sync + fmt::Debug {
    /// Declared name.
    fn name(&self) -> &str;

    /// Whether this is an anonymous function.
    fn is_anon(&self) -> bool {
        false
    }

    /// Selective-receive clauses, indexed by `Suspension::Receive::index`.
    fn receive_cases(&self) -> &[ReceiveCase] {
        &[]
    }

    /// Build the initial locals for an invocation with `args`.
    fn create_locals(&self, args: &[Value]) -> Vec<Value>;

    /// Run from the top frame's `return_to` until the next suspension point.
    ///
    /// # Errors
    ///
    /// Returns a [`MachineError`] on admission failures raised while running,
    /// contract violations, or handler-reported failures.
    fn execute(&self, program: &Program, machine: &mut MachineState) -> Result<(), MachineError>;
}

/// Pop the built-in's own frame and return nothing.
fn return_nothing(machine: &mut MachineState) -> Result<(), MachineError> {
    machine.fun_stack_mut().pop()?;
    machine.continuation_mut().return_value(None, Vec::new());
    Ok(())
}

/// Built-in handler for ignored events.
///
/// Exists to be referenced; running it is a no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct IgnoreFun;

impl Fun for IgnoreFun {
    fn name(&self) -> &str {
        "Ignore"
    }

    fn is_anon(&self) -> bool {
        true
    }

    fn create_locals(&self, _args: &[Value]) -> Vec<Value> {
        Vec::new()
    }

    fn execute(&self, _program: &Program, machine: &mut MachineState) -> Result<(), MachineError> {
        return_nothing(machine)
    }
}

/// Built-in handler for states with no entry or exit behavior.
#[derive(Debug, Clone, Copy, Default)]
pub struct SkipFun;

impl Fun for SkipFun {
    fn name(&self) -> &str {
        "Skip"
    }

    fn is_anon(&self) -> bool {
        true
    }

    fn create_locals(&self, _args: &[Value]) -> Vec<Value> {
        Vec::new()
    }

    fn execute(&self, _program: &Program, machine: &mut MachineState) -> Result<(), MachineError> {
        return_nothing(machine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receive_case_events_and_handlers() {
        let case = ReceiveCase::new()
            .on(EventId::new(3), FunId::new(7))
            .on(EventId::new(2), FunId::new(8));
        assert_eq!(
            case.events().into_iter().collect::<Vec<_>>(),
            vec![EventId::new(2), EventId::new(3)]
        );
        assert_eq!(case.handler(EventId::new(3)), Some(FunId::new(7)));
        assert_eq!(case.handler(EventId::new(4)), None);
    }

    #[test]
    fn builtins_are_anonymous_and_localless() {
        assert_eq!(IgnoreFun.name(), "Ignore");
        assert_eq!(SkipFun.name(), "Skip");
        assert!(IgnoreFun.is_anon() && SkipFun.is_anon());
        assert!(IgnoreFun.create_locals(&[Value::Int(1)]).is_empty());
    }
}
