//! Shared fixtures for runtime integration tests.
//!
//! Handlers below are written the way generated code drives the runtime: the
//! top frame's `return_to` selects the resume point, and every exit records
//! exactly one suspension.

use esm_runtime::{
    ContinuationReason, Fun, MachineConfig, MachineError, MachineState, Program, ProgramBuilder,
    ReceiveCase,
};
use esm_types::{
    AdmissionPolicy, Event, EventId, FunId, MachineId, MaxInstances, StateId, Temperature,
    Transition, ValType, Value,
};
use proptest::prelude::*;

/// Fixed seed so property runs are reproducible.
pub const SEED: [u8; 32] = [
    0x45, 0x53, 0x4d, 0x2d, 0x72, 0x75, 0x6e, 0x74, 0x69, 0x6d, 0x65, 0x2d, 0x73, 0x65, 0x65, 0x64,
    0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f, 0x10,
];

pub fn event(id: u32, name: &str, max: MaxInstances, policy: AdmissionPolicy) -> Event {
    Event::new(EventId::new(id), name, ValType::Int, max, policy)
}

pub fn machine(id: u32) -> MachineState {
    MachineState::new(MachineId::new(id), "Node", &MachineConfig::default())
}

fn pc(machine: &MachineState) -> Result<usize, MachineError> {
    machine
        .fun_stack()
        .top()
        .map(|f| f.return_to)
        .ok_or_else(|| MachineError::Handler {
            fun: FunId::SKIP,
            message: "no frame".to_string(),
        })
}

fn advance(machine: &mut MachineState, to: usize) {
    if let Some(frame) = machine.fun_stack_mut().top_mut() {
        frame.return_to = to;
    }
}

fn finish(machine: &mut MachineState, value: Option<Value>) -> Result<(), MachineError> {
    let frame = machine.fun_stack_mut().pop()?;
    machine.continuation_mut().return_value(value, frame.locals);
    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

/// Sends `event` with its first argument to `target`, then returns it.
#[derive(Debug)]
pub struct SendAndReturn {
    pub target: MachineId,
    pub event: EventId,
}

impl Fun for SendAndReturn {
    fn name(&self) -> &str {
        "SendAndReturn"
    }

    fn create_locals(&self, args: &[Value]) -> Vec<Value> {
        vec![args.first().cloned().unwrap_or_default()]
    }

    fn execute(&self, _program: &Program, machine: &mut MachineState) -> Result<(), MachineError> {
        match pc(machine)? {
            0 => {
                let payload = machine
                    .fun_stack()
                    .top()
                    .and_then(|f| f.local(0))
                    .cloned()
                    .unwrap_or_default();
                advance(machine, 1);
                machine
                    .continuation_mut()
                    .send(self.target, self.event, payload);
                Ok(())
            }
            _ => {
                let value = machine.fun_stack().top().and_then(|f| f.local(0)).cloned();
                finish(machine, value)
            }
        }
    }
}

/// Asks for a nondeterministic choice; raises `raise` on `true`, otherwise
/// moves to `fallback`.
#[derive(Debug)]
pub struct ChooseThenRaise {
    pub raise: EventId,
    pub fallback: StateId,
}

impl Fun for ChooseThenRaise {
    fn name(&self) -> &str {
        "ChooseThenRaise"
    }

    fn create_locals(&self, _args: &[Value]) -> Vec<Value> {
        Vec::new()
    }

    fn execute(&self, _program: &Program, machine: &mut MachineState) -> Result<(), MachineError> {
        match pc(machine)? {
            0 => {
                advance(machine, 1);
                machine.continuation_mut().nondet_point();
                Ok(())
            }
            _ => {
                let choice = machine.continuation().nondet();
                machine.fun_stack_mut().pop()?;
                if choice {
                    machine.continuation_mut().raise(self.raise, Value::Bool(true));
                } else {
                    machine.continuation_mut().goto(self.fallback, Value::Null);
                }
                Ok(())
            }
        }
    }
}

/// Parks on receive clause 0 and returns the delivered payload.
#[derive(Debug)]
pub struct AwaitEvent {
    pub cases: Vec<ReceiveCase>,
}

impl Fun for AwaitEvent {
    fn name(&self) -> &str {
        "AwaitEvent"
    }

    fn receive_cases(&self) -> &[ReceiveCase] {
        &self.cases
    }

    fn create_locals(&self, _args: &[Value]) -> Vec<Value> {
        Vec::new()
    }

    fn execute(&self, _program: &Program, machine: &mut MachineState) -> Result<(), MachineError> {
        match pc(machine)? {
            0 => {
                advance(machine, 1);
                machine.continuation_mut().receive(0);
                Ok(())
            }
            _ => {
                let payload = machine.current_payload().clone();
                finish(machine, Some(payload))
            }
        }
    }
}

/// Returns a constant.
#[derive(Debug)]
pub struct Constant(pub i64);

impl Fun for Constant {
    fn name(&self) -> &str {
        "Constant"
    }

    fn create_locals(&self, _args: &[Value]) -> Vec<Value> {
        Vec::new()
    }

    fn execute(&self, _program: &Program, machine: &mut MachineState) -> Result<(), MachineError> {
        finish(machine, Some(Value::Int(self.0)))
    }
}

/// Creates a `Worker` machine and returns its id.
#[derive(Debug)]
pub struct SpawnWorker;

impl Fun for SpawnWorker {
    fn name(&self) -> &str {
        "SpawnWorker"
    }

    fn create_locals(&self, _args: &[Value]) -> Vec<Value> {
        Vec::new()
    }

    fn execute(&self, _program: &Program, machine: &mut MachineState) -> Result<(), MachineError> {
        match pc(machine)? {
            0 => {
                advance(machine, 1);
                machine.continuation_mut().new_machine("Worker", Value::Int(7));
                Ok(())
            }
            _ => {
                let created = machine.continuation().created_machine().ok_or_else(|| {
                    MachineError::Handler {
                        fun: FunId::FIRST_USER,
                        message: "resumed before the worker was bound".to_string(),
                    }
                })?;
                finish(machine, Some(Value::Machine(created)))
            }
        }
    }
}

/// Always fails.
#[derive(Debug)]
pub struct Failing;

impl Fun for Failing {
    fn name(&self) -> &str {
        "Failing"
    }

    fn create_locals(&self, _args: &[Value]) -> Vec<Value> {
        Vec::new()
    }

    fn execute(&self, _program: &Program, _machine: &mut MachineState) -> Result<(), MachineError> {
        Err(MachineError::Handler {
            fun: FunId::FIRST_USER,
            message: "boom".to_string(),
        })
    }
}

// ============================================================================
// Sample program
// ============================================================================

/// Ids of everything declared by [`sample_program`].
#[derive(Debug)]
pub struct Sample {
    pub program: Program,
    pub ping: EventId,
    pub pong: EventId,
    pub ack: EventId,
    pub req: EventId,
    pub tick: EventId,
    pub init: StateId,
    pub busy: StateId,
    pub done: StateId,
    pub send_ping: FunId,
    pub choose: FunId,
    pub on_ack: FunId,
    pub await_ack: FunId,
    pub spawn: FunId,
    pub failing: FunId,
}

/// A small client model.
///
/// - `Init` defers `Pong`, pushes `Busy` on `Ping` and ignores `Tick`
/// - `Busy` defers `Ack` and returns to `Init` on `Pong`
/// - `Done` is hot and falls through on the null event
pub fn sample_program() -> Sample {
    let mut b = ProgramBuilder::new();
    let ping = b.declare_event(
        "Ping",
        ValType::Int,
        MaxInstances::Bounded(1),
        AdmissionPolicy::HardError,
    );
    let pong = b.declare_event(
        "Pong",
        ValType::Int,
        MaxInstances::Unbounded,
        AdmissionPolicy::HardError,
    );
    let ack = b.declare_event(
        "Ack",
        ValType::Bool,
        MaxInstances::Unbounded,
        AdmissionPolicy::HardError,
    );
    let req = b.declare_event(
        "Req",
        ValType::Null,
        MaxInstances::Bounded(2),
        AdmissionPolicy::AssumeFail,
    );
    let tick = b.declare_event(
        "Tick",
        ValType::Null,
        MaxInstances::Unbounded,
        AdmissionPolicy::HardError,
    );

    let send_ping = b.declare_fun(SendAndReturn {
        target: MachineId::new(2),
        event: ping,
    });
    let on_ack = b.declare_fun(Constant(1));
    let await_ack = b.declare_fun(AwaitEvent {
        cases: vec![ReceiveCase::new().on(ack, on_ack)],
    });
    let spawn = b.declare_fun(SpawnWorker);
    let failing = b.declare_fun(Failing);

    let init = b.declare_state("Init", FunId::SKIP, FunId::SKIP);
    let busy = b.declare_state("Busy", FunId::SKIP, FunId::SKIP);
    let done = b.declare_state("Done", FunId::SKIP, FunId::SKIP);
    let choose = b.declare_fun(ChooseThenRaise {
        raise: ack,
        fallback: done,
    });

    if let Some(s) = b.state_mut(init) {
        s.defer(pong)
            .add_transition(ping, Transition::push(busy))
            .add_do(tick, FunId::IGNORE);
    }
    if let Some(s) = b.state_mut(busy) {
        s.defer(ack)
            .add_transition(pong, Transition::goto(init, FunId::SKIP));
    }
    if let Some(s) = b.state_mut(done) {
        s.add_transition(EventId::NULL, Transition::goto(init, FunId::SKIP))
            .set_temperature(Temperature::Hot);
    }

    Sample {
        program: b.build().expect("sample program is well formed"),
        ping,
        pong,
        ack,
        req,
        tick,
        init,
        busy,
        done,
        send_ping,
        choose,
        on_ack,
        await_ack,
        spawn,
        failing,
    }
}

impl Sample {
    pub fn event(&self, id: EventId) -> &Event {
        self.program.event(id).expect("declared event")
    }

    /// Machine sitting in `Init`.
    pub fn started(&self, id: u32) -> MachineState {
        let mut m = machine(id);
        m.push_state(self.program.state(self.init).expect("declared state"));
        m
    }

    /// Run `fun` until it returns, parks on a receive or empties the function
    /// stack, returning each suspension reason seen.
    pub fn run_to_return(
        &self,
        m: &mut MachineState,
        fun: FunId,
        args: &[Value],
    ) -> Result<Vec<ContinuationReason>, MachineError> {
        let mut seen = vec![m.invoke(&self.program, fun, args)?];
        while !matches!(
            seen.last(),
            Some(ContinuationReason::Return | ContinuationReason::Receive)
        ) && !m.fun_stack().is_empty()
        {
            seen.push(m.resume(&self.program)?);
        }
        Ok(seen)
    }
}

// ============================================================================
// Strategies
// ============================================================================

/// Small event alphabet over user ids.
pub fn event_id_strategy() -> impl Strategy<Value = EventId> {
    (2u32..7).prop_map(EventId::new)
}

pub fn payload_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Int),
    ];
    leaf.prop_recursive(2, 8, 3, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..3).prop_map(Value::Tuple),
            prop::collection::vec(inner, 0..3).prop_map(Value::Seq),
        ]
    })
}
