//! Reified handler call stack.
//!
//! Handler code keeps its locals and resume point here instead of on the
//! host stack, so a handler can suspend, let the scheduler run other
//! machines, and pick up where it left off.

use esm_types::{FunId, Value};
use serde::{Deserialize, Serialize};

use crate::faults::ContractViolation;

/// One active (possibly suspended) handler invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunStackFrame {
    /// Function being executed.
    pub fun: FunId,
    /// Locals, owned by this frame.
    pub locals: Vec<Value>,
    /// Program location to resume at.
    pub return_to: usize,
}

impl FunStackFrame {
    #[must_use]
    pub fn new(fun: FunId, locals: Vec<Value>, return_to: usize) -> Self {
        Self {
            fun,
            locals,
            return_to,
        }
    }

    /// Read a local.
    #[must_use]
    pub fn local(&self, idx: usize) -> Option<&Value> {
        self.locals.get(idx)
    }

    /// Overwrite a local. Returns `false` when `idx` is out of range.
    pub fn set_local(&mut self, idx: usize, value: Value) -> bool {
        match self.locals.get_mut(idx) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }
}

/// The machine's handler call stack.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunStack {
    frames: Vec<FunStackFrame>,
}

impl FunStack {
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

    /// Push a frame resuming at location 0.
    pub fn push(&mut self, fun: FunId, locals: Vec<Value>) {
        self.push_with_return(fun, locals, 0);
    }

    /// Push a frame with an explicit resume location.
    pub fn push_with_return(&mut self, fun: FunId, locals: Vec<Value>, return_to: usize) {
        tracing::trace!(%fun, return_to, depth = self.frames.len() + 1, "push fun");
        self.frames.push(FunStackFrame::new(fun, locals, return_to));
    }

    /// Pop the top frame.
    ///
    /// # Errors
    ///
    /// Returns a contract violation if the stack is empty.
    pub fn pop(&mut self) -> Result<FunStackFrame, ContractViolation> {
        let frame = self
            .frames
            .pop()
            .ok_or_else(|| ContractViolation::empty_fun_stack("pop fun"))?;
        tracing::trace!(fun = %frame.fun, depth = self.frames.len(), "pop fun");
        Ok(frame)
    }

    /// Drop frames above `depth`.
    pub fn truncate(&mut self, depth: usize) {
        if depth < self.frames.len() {
            tracing::trace!(from = self.frames.len(), to = depth, "unwind funs");
            self.frames.truncate(depth);
        }
    }

    #[must_use]
    pub fn top(&self) -> Option<&FunStackFrame> {
        self.frames.last()
    }

    pub fn top_mut(&mut self) -> Option<&mut FunStackFrame> {
        self.frames.last_mut()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frames from outermost caller to innermost callee.
    pub fn frames(&self) -> impl Iterator<Item = &FunStackFrame> {
        self.frames.iter()
    }
}
