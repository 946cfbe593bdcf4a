//! Per-instance machine state: mailbox, state stack, function stack and
//! the slots the scheduler reads and writes between steps.
//!
//! Execution follows a small protocol:
//! - [`MachineState::invoke`] starts a handler; [`MachineState::resume`]
//!   continues the suspended top frame
//! - both return the [`ContinuationReason`] the handler stopped on
//! - the scheduler performs the matching side effect (enqueue, spawn,
//!   push/pop/goto, or park on a receive) and resumes
//!
//! All fields are owned values. [`MachineState::snapshot`] therefore yields a
//! copy that shares nothing with the live instance. A machine parked on a
//! selective receive keeps the awaited clause outside its continuation, so a
//! restored snapshot can still complete the receive.

use esm_types::{Event, EventId, EventSet, FunId, MachineId, State, StateId, Value};
use serde::{Deserialize, Serialize};

use crate::buffer::{AdmissionError, DequeueFilter, EventBuffer};
use crate::config::MachineConfig;
use crate::continuation::{Continuation, ContinuationReason, Suspension};
use crate::faults::ContractViolation;
use crate::fun_stack::FunStack;
use crate::handler::Fun;
use crate::program::Program;
use crate::state_stack::StateStack;

static NO_EVENTS: EventSet = EventSet::new();

/// Errors surfaced while driving a machine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MachineError {
    /// Enqueue rejected by admission control.
    #[error(transparent)]
    Admission(#[from] AdmissionError),
    /// The scheduler broke an invariant of the core.
    #[error("scheduler contract violated: {0}")]
    Contract(#[from] ContractViolation),
    /// Handler code reported a failure.
    #[error("handler {fun} failed: {message}")]
    Handler {
        /// Failing function.
        fun: FunId,
        /// Handler-supplied description.
        message: String,
    },
}

/// State of one machine instance.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineState {
    id: MachineId,
    kind: String,
    buffer: EventBuffer,
    state_stack: StateStack,
    fun_stack: FunStack,
    current_trigger: EventId,
    current_payload: Value,
    receive_set: EventSet,
    /// Receive clause of the top frame while parked; travels with
    /// `receive_set`.
    #[serde(default)]
    receive_index: Option<usize>,
    continuation: Continuation,
}

impl MachineState {
    /// Create an idle machine with no active state.
    #[must_use]
    pub fn new(id: MachineId, kind: impl Into<String>, config: &MachineConfig) -> Self {
        Self {
            id,
            kind: kind.into(),
            buffer: EventBuffer::with_capacity(config.mailbox_capacity),
            state_stack: StateStack::with_capacity(config.state_depth_hint),
            fun_stack: FunStack::with_capacity(config.call_depth_hint),
            current_trigger: EventId::NULL,
            current_payload: Value::Null,
            receive_set: EventSet::new(),
            receive_index: None,
            continuation: Continuation::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> MachineId {
        self.id
    }

    /// Machine kind this instance was created from.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    #[must_use]
    pub fn buffer(&self) -> &EventBuffer {
        &self.buffer
    }

    #[must_use]
    pub fn state_stack(&self) -> &StateStack {
        &self.state_stack
    }

    #[must_use]
    pub fn fun_stack(&self) -> &FunStack {
        &self.fun_stack
    }

    pub fn fun_stack_mut(&mut self) -> &mut FunStack {
        &mut self.fun_stack
    }

    #[must_use]
    pub fn continuation(&self) -> &Continuation {
        &self.continuation
    }

    pub fn continuation_mut(&mut self) -> &mut Continuation {
        &mut self.continuation
    }

    /// Event chosen for the current step.
    #[must_use]
    pub fn current_trigger(&self) -> EventId {
        self.current_trigger
    }

    /// Payload of the current trigger.
    #[must_use]
    pub fn current_payload(&self) -> &Value {
        &self.current_payload
    }

    /// Receive clause the machine is parked on, if any.
    #[must_use]
    pub fn parked_receive(&self) -> Option<usize> {
        self.receive_index
    }

    /// Events awaited by an active selective receive; empty when none.
    #[must_use]
    pub fn receive_set(&self) -> &EventSet {
        &self.receive_set
    }

    /// Active state, if one has been entered.
    #[must_use]
    pub fn current_state(&self) -> Option<StateId> {
        self.state_stack.top().map(|f| f.state)
    }

    /// Deferred set of the active configuration.
    #[must_use]
    pub fn deferred_set(&self) -> &EventSet {
        self.state_stack.top().map_or(&NO_EVENTS, |f| &f.deferred)
    }

    /// Admissibility filter for the current step.
    #[must_use]
    pub fn filter(&self) -> DequeueFilter<'_> {
        DequeueFilter::new(self.deferred_set(), &self.receive_set)
    }

    /// Deliver an event into this machine's mailbox.
    ///
    /// # Errors
    ///
    /// Returns an [`AdmissionError`] when the event's limit is reached.
    pub fn enqueue(&mut self, event: &Event, payload: Value) -> Result<(), AdmissionError> {
        self.buffer.enqueue(event, payload)
    }

    /// Whether some buffered event may be delivered now.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.buffer.is_enabled(&self.filter())
    }

    /// Move the first admissible buffered event into the trigger slots.
    ///
    /// # Errors
    ///
    /// Returns [`ContractViolation::NoAdmissibleEvent`] when
    /// [`Self::is_enabled`] is false.
    pub fn dequeue(&mut self) -> Result<EventId, ContractViolation> {
        let deferred = self.state_stack.top().map_or(&NO_EVENTS, |f| &f.deferred);
        let node = self
            .buffer
            .dequeue(&DequeueFilter::new(deferred, &self.receive_set))?;
        self.current_trigger = node.event;
        self.current_payload = node.payload;
        Ok(node.event)
    }

    /// Enter `state` nested inside the active one.
    pub fn push_state(&mut self, state: &State) {
        self.state_stack.push(state);
    }

    /// Leave the active state.
    ///
    /// # Errors
    ///
    /// Returns a contract violation if no state is active.
    pub fn pop_state(&mut self) -> Result<StateId, ContractViolation> {
        self.state_stack.pop().map(|f| f.state)
    }

    /// Replace the active state with `state`.
    ///
    /// # Errors
    ///
    /// Returns a contract violation if no state is active.
    pub fn goto_state(&mut self, state: &State) -> Result<(), ContractViolation> {
        if self.state_stack.is_empty() {
            return Err(ContractViolation::no_active_state("goto"));
        }
        self.state_stack.pop()?;
        self.state_stack.push(state);
        Ok(())
    }

    /// Whether the active state falls through on the null event.
    ///
    /// # Errors
    ///
    /// Returns a contract violation if no state is active.
    pub fn has_null_transition_or_action(&self) -> Result<bool, ContractViolation> {
        self.state_stack.has_null_transition_or_action()
    }

    /// Start `fun` with `args` on top of the function stack and run it to its
    /// first suspension point.
    ///
    /// The continuation is reset first; an injected nondeterministic choice
    /// survives the reset. If the handler fails, the invoked frame and any
    /// frames it pushed are discarded.
    ///
    /// # Errors
    ///
    /// Returns a [`MachineError`] if `fun` is unknown or the handler fails.
    pub fn invoke(
        &mut self,
        program: &Program,
        fun: FunId,
        args: &[Value],
    ) -> Result<ContinuationReason, MachineError> {
        let f = program.fun(fun).ok_or(ContractViolation::UnknownFun(fun))?;
        let locals = f.create_locals(args);
        let depth = self.fun_stack.len();
        self.fun_stack.push(fun, locals);
        self.continuation.reset();
        tracing::debug!(machine = %self.id, fun = f.name(), "invoke");
        match self.run(program, f) {
            Ok(reason) => Ok(reason),
            Err(err) => {
                self.fun_stack.truncate(depth);
                tracing::debug!(machine = %self.id, %fun, %err, "invoke failed");
                Err(err)
            }
        }
    }

    /// Continue the suspended top frame.
    ///
    /// The continuation is left as recorded so the handler can read injected
    /// results (nondeterministic choice, created machine).
    ///
    /// # Errors
    ///
    /// Returns a [`MachineError`] if the function stack is empty or the
    /// handler fails.
    pub fn resume(&mut self, program: &Program) -> Result<ContinuationReason, MachineError> {
        let top = self
            .fun_stack
            .top()
            .ok_or_else(|| ContractViolation::empty_fun_stack("resume"))?;
        let f = program
            .fun(top.fun)
            .ok_or(ContractViolation::UnknownFun(top.fun))?;
        tracing::debug!(
            machine = %self.id,
            fun = f.name(),
            at = top.return_to,
            "resume"
        );
        self.run(program, f)
    }

    fn run(&mut self, program: &Program, f: &dyn Fun) -> Result<ContinuationReason, MachineError> {
        f.execute(program, self)?;
        let reason = self.continuation.reason();
        if let Suspension::Receive { index } = *self.continuation.suspension() {
            self.receive_set = self.receive_case_events(program, index)?;
            self.receive_index = Some(index);
            tracing::debug!(
                machine = %self.id,
                index,
                awaiting = self.receive_set.len(),
                "parked on receive"
            );
        }
        Ok(reason)
    }

    fn receive_case_events(
        &self,
        program: &Program,
        index: usize,
    ) -> Result<EventSet, ContractViolation> {
        let fun = self
            .fun_stack
            .top()
            .ok_or_else(|| ContractViolation::empty_fun_stack("receive"))?
            .fun;
        program
            .fun(fun)
            .ok_or(ContractViolation::UnknownFun(fun))?
            .receive_cases()
            .get(index)
            .map(|case| case.events())
            .ok_or(ContractViolation::MissingReceiveCase { fun, index })
    }

    /// Finish a selective receive after [`Self::dequeue`] delivered an awaited
    /// event: clear the filter and return the case handler for the trigger.
    ///
    /// # Errors
    ///
    /// Fails if the machine is not parked on a receive or the trigger is not
    /// covered by the receive clause.
    pub fn complete_receive(&mut self, program: &Program) -> Result<FunId, ContractViolation> {
        let Some(index) = self.receive_index else {
            return Err(ContractViolation::NotSuspendedOn {
                expected: ContinuationReason::Receive,
                actual: self.continuation.reason(),
            });
        };
        let fun = self
            .fun_stack
            .top()
            .ok_or_else(|| ContractViolation::empty_fun_stack("complete receive"))?
            .fun;
        let handler = program
            .fun(fun)
            .ok_or(ContractViolation::UnknownFun(fun))?
            .receive_cases()
            .get(index)
            .ok_or(ContractViolation::MissingReceiveCase { fun, index })?
            .handler(self.current_trigger)
            .ok_or(ContractViolation::UnexpectedTrigger(self.current_trigger))?;
        self.receive_set.clear();
        self.receive_index = None;
        self.continuation.reset();
        Ok(handler)
    }

    /// Move a raised event into the trigger slots ahead of the mailbox.
    ///
    /// # Errors
    ///
    /// Fails if the continuation is not a `Raise`.
    pub fn deliver_raised(&mut self) -> Result<EventId, ContractViolation> {
        let Suspension::Raise { event, payload } = self.continuation.suspension() else {
            return Err(ContractViolation::NotSuspendedOn {
                expected: ContinuationReason::Raise,
                actual: self.continuation.reason(),
            });
        };
        let event = *event;
        self.current_payload = payload.clone();
        self.current_trigger = event;
        self.continuation.reset();
        tracing::trace!(machine = %self.id, %event, "raised");
        Ok(event)
    }

    /// Independent copy for exploration.
    ///
    /// Mailbox, stacks, slots and a parked receive are copied in full. The
    /// continuation keeps only the recorded nondeterministic choice, so the
    /// machine must be quiesced: idle, waiting for a choice, or parked on a
    /// receive.
    ///
    /// # Errors
    ///
    /// Returns [`ContractViolation::SnapshotWhileSuspended`] while a side
    /// effect (send, raise, spawn, goto, pop) is still pending.
    pub fn snapshot(&self) -> Result<Self, ContractViolation> {
        let reason = self.continuation.reason();
        if !matches!(
            reason,
            ContinuationReason::Return | ContinuationReason::Nondet | ContinuationReason::Receive
        ) {
            return Err(ContractViolation::SnapshotWhileSuspended(reason));
        }
        Ok(Self {
            id: self.id,
            kind: self.kind.clone(),
            buffer: self.buffer.clone(),
            state_stack: self.state_stack.clone(),
            fun_stack: self.fun_stack.clone(),
            current_trigger: self.current_trigger,
            current_payload: self.current_payload.clone(),
            receive_set: self.receive_set.clone(),
            receive_index: self.receive_index,
            continuation: self.continuation.for_snapshot(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use esm_types::{AdmissionPolicy, MaxInstances, ValType};

    fn machine() -> MachineState {
        MachineState::new(MachineId::new(1), "Main", &MachineConfig::default())
    }

    #[test]
    fn fresh_machine_is_idle() {
        let m = machine();
        assert_eq!(m.current_state(), None);
        assert_eq!(m.current_trigger(), EventId::NULL);
        assert!(m.deferred_set().is_empty());
        assert!(!m.is_enabled());
        assert!(m.has_null_transition_or_action().is_err());
    }

    #[test]
    fn dequeue_fills_trigger_slots() {
        let e = Event::new(
            EventId::new(2),
            "E",
            ValType::Int,
            MaxInstances::Unbounded,
            AdmissionPolicy::HardError,
        );
        let mut m = machine();
        m.enqueue(&e, Value::Int(5)).unwrap();
        assert_eq!(m.dequeue().unwrap(), e.id);
        assert_eq!(m.current_trigger(), e.id);
        assert_eq!(m.current_payload(), &Value::Int(5));
        assert_eq!(m.dequeue(), Err(ContractViolation::NoAdmissibleEvent));
    }

    #[test]
    fn goto_without_state_is_contract_violation() {
        let mut m = machine();
        let s = State::new(StateId::new(0), "S", FunId::SKIP, FunId::SKIP);
        assert!(matches!(
            m.goto_state(&s),
            Err(ContractViolation::NoActiveState { .. })
        ));
        m.push_state(&s);
        let t = State::new(StateId::new(1), "T", FunId::SKIP, FunId::SKIP);
        m.goto_state(&t).unwrap();
        assert_eq!(m.current_state(), Some(StateId::new(1)));
        assert_eq!(m.state_stack().len(), 1);
    }

    #[test]
    fn deliver_raised_requires_raise() {
        let mut m = machine();
        assert!(m.deliver_raised().is_err());
        m.continuation_mut().raise(EventId::HALT, Value::Int(3));
        assert_eq!(m.deliver_raised().unwrap(), EventId::HALT);
        assert_eq!(m.current_payload(), &Value::Int(3));
        assert_eq!(m.continuation().reason(), ContinuationReason::Return);
    }

    #[test]
    fn snapshot_refuses_pending_side_effects() {
        let mut m = machine();
        m.continuation_mut()
            .send(MachineId::new(2), EventId::HALT, Value::Null);
        assert_eq!(
            m.snapshot(),
            Err(ContractViolation::SnapshotWhileSuspended(
                ContinuationReason::Send
            ))
        );
        m.continuation_mut().reset();
        assert!(m.snapshot().is_ok());
    }
}
