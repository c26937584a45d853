//! lamtrace - execution tracer for lamtrace scripts.
//!
//! A [`Tracer`] is installed as the interpreter's instrumentation. While a
//! session is active it reports function calls, returns and statement steps
//! to registered [`TracingListener`]s and, when a [`LogSink`] is configured,
//! renders them as text lines.
//!
//! # Example
//!
//! ```ignore
//! use lamtrace::{LineBuffer, TraceConfig, Tracer};
//! use lamtrace_host::{EventLoop, Interpreter};
//!
//! let event_loop = EventLoop::new();
//! let interp = Interpreter::new();
//! let scope = interp.create_scope("main");
//! interp.eval(scope, "main.js", "function foo() { return 1; }")?;
//!
//! let tracer = Tracer::new(event_loop.scheduler());
//! interp.set_instrumentation(tracer.clone());
//!
//! let logs = LineBuffer::new();
//! tracer.start_tracing(TraceConfig::new().with_logging_method(logs.clone()))?;
//! interp.call_sync(scope, "foo", vec![])?;
//! tracer.stop_tracing();
//!
//! assert_eq!(logs.lines(), vec!["Start tracing JavaScript\n", "λ foo"]);
//! ```

mod config;
mod controller;
mod error;
mod frame;
mod listener;
mod logger;
pub mod metrics;
mod pause;
mod runner;
mod session;
mod step;

pub use config::{TraceConfig, TraceTarget};
pub use controller::{ErrorHandler, Tracer};
pub use error::{ConfigError, ListenerError, Result, TraceError};
pub use frame::{FrameInfo, FrameKind};
pub use listener::{DispatchGuard, ListenerRegistry, ListenerResult, TracingListener};
pub use logger::{HEADER, LineBuffer, LogSink, Logger, StdoutSink};
pub use pause::{Pause, PauseScheduler};
pub use runner::{EVAL_URL, RunError, RunOptions, RunSummary, run_script, script_url};

// Re-export the host types callers need to drive a traced program.
pub use lamtrace_host::{
    EventLoop, FrameId, HostError, Interpreter, MAX_CALL_DEPTH, Scheduler, ScopeId,
};
pub use lamtrace_value::{Value, format_value};
