//! Execution hooks.
//!
//! The interpreter reports three things to the installed [`Instrumentation`]:
//! entering a script frame, reaching a statement boundary inside one, and
//! leaving it. Native functions and top-level code are not frames.
//!
//! Every hook may return a [`Suspension`]. The interpreter awaits it before
//! running further script code, so a hook can hold execution at the point it
//! was called while the event loop keeps running other tasks.
//!
//! Suspended calls from different tasks interleave, so frames do not form a
//! single stack. Each [`CallSite`] names the frame that made the call instead.

use std::cell::Cell;
use std::fmt;

use futures::future::LocalBoxFuture;
use lamtrace_script::SourceLocation;
use lamtrace_value::{FunctionId, Value};

use crate::ScopeId;

/// Future returned by a hook to hold execution.
pub type Suspension = LocalBoxFuture<'static, ()>;

/// Identifier of one frame activation. Never reused within an interpreter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(pub u64);

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame#{}", self.0)
    }
}

/// A script function being entered.
#[derive(Clone, Copy, Debug)]
pub struct CallSite<'a> {
    pub frame: FrameId,
    /// Script frame the call was made from; `None` for calls from top-level
    /// code or from the embedder.
    pub parent: Option<FrameId>,
    /// Scope the function was defined in.
    pub scope: ScopeId,
    pub function: FunctionId,
    /// `None` for anonymous functions.
    pub name: Option<&'a str>,
    /// First statement boundary of the body, or its closing brace.
    pub entry: &'a SourceLocation,
    pub arguments: &'a [Value],
}

/// Execution hooks called by the interpreter.
///
/// All methods have default no-op implementations, so implementors only
/// override the hooks they care about.
pub trait Instrumentation {
    /// Called when a script frame is entered, before its parameters are bound.
    fn enter_frame(&self, _call: &CallSite<'_>) -> Option<Suspension> {
        None
    }

    /// Called at each statement boundary inside a script frame.
    fn step(&self, _frame: FrameId, _location: &SourceLocation) -> Option<Suspension> {
        None
    }

    /// Called when a script frame returns, with its return value.
    fn exit_frame(&self, _frame: FrameId, _value: &Value) -> Option<Suspension> {
        None
    }

    /// Called when an entered frame is dropped before it could exit, such as
    /// a call that suspended outside of an event loop.
    fn abandon_frame(&self, _frame: FrameId) {}
}

/// Instrumentation that does nothing.
#[derive(Debug, Default)]
pub struct NoopInstrumentation;

impl Instrumentation for NoopInstrumentation {}

/// Instrumentation that counts hook invocations.
#[derive(Debug, Default)]
pub struct CountingInstrumentation {
    enters: Cell<u64>,
    steps: Cell<u64>,
    exits: Cell<u64>,
}

impl CountingInstrumentation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enters(&self) -> u64 {
        self.enters.get()
    }

    pub fn steps(&self) -> u64 {
        self.steps.get()
    }

    pub fn exits(&self) -> u64 {
        self.exits.get()
    }
}

impl Instrumentation for CountingInstrumentation {
    fn enter_frame(&self, _call: &CallSite<'_>) -> Option<Suspension> {
        self.enters.set(self.enters.get() + 1);
        None
    }

    fn step(&self, _frame: FrameId, _location: &SourceLocation) -> Option<Suspension> {
        self.steps.set(self.steps.get() + 1);
        None
    }

    fn exit_frame(&self, _frame: FrameId, _value: &Value) -> Option<Suspension> {
        self.exits.set(self.exits.get() + 1);
        None
    }
}
