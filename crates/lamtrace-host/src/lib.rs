//! Script host for lamtrace.
//!
//! The host runs parsed scripts and exposes the collaborators a tracer needs:
//!
//! - [`Realm`]: the registry of scopes and the functions defined in them
//! - [`Interpreter`]: evaluates scripts and reports frame entry, statement
//!   boundaries and frame exit through [`Instrumentation`]
//! - [`EventLoop`] and [`TimerQueue`]: a single-threaded task queue with
//!   deadline timers, used to resume suspended script execution
//!
//! Every hook may return a [`Suspension`]; the interpreter awaits it before
//! continuing, which is how traced code is slowed down without blocking the
//! thread.

mod error;
mod event_loop;
mod instrument;
mod interp;
mod natives;
mod ops;
mod realm;

pub use error::{HostError, Result};
pub use event_loop::{EventLoop, Scheduler, TaskId, TimerQueue, poll_once};
pub use instrument::{
    CallSite, CountingInstrumentation, FrameId, Instrumentation, NoopInstrumentation, Suspension,
};
pub use interp::{Console, Interpreter, MAX_CALL_DEPTH};
pub use natives::Native;
pub use realm::{FunctionBody, FunctionDef, Realm, Scope, ScopeId};
