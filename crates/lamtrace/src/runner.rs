//! Run a script file under the tracer.

use std::cell::Cell;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{Duration, Instant};

use lamtrace_host::{EventLoop, HostError, Interpreter};
use lamtrace_value::format_value;
use thiserror::Error;
use tracing::info;

use crate::config::{TraceConfig, TraceTarget};
use crate::controller::Tracer;
use crate::error::TraceError;
use crate::frame::{FrameInfo, FrameKind};
use crate::listener::{ListenerResult, TracingListener};
use crate::metrics;

/// Source URL given to `--eval` code.
pub const EVAL_URL: &str = "eval";

/// Errors from [`run_script`].
#[derive(Error, Debug)]
pub enum RunError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Host(#[from] HostError),
    #[error(transparent)]
    Trace(#[from] TraceError),
    #[error("script suspended and never resumed")]
    Stalled,
}

/// What to run and how to trace it.
#[derive(Clone, Debug)]
pub struct RunOptions {
    pub script: PathBuf,
    /// Run the script untraced, then trace only this code in its scope.
    pub eval: Option<String>,
    pub config: TraceConfig,
}

impl RunOptions {
    pub fn new(script: impl Into<PathBuf>, config: TraceConfig) -> Self {
        Self {
            script: script.into(),
            eval: None,
            config,
        }
    }

    #[must_use]
    pub fn with_eval(mut self, code: impl Into<String>) -> Self {
        self.eval = Some(code.into());
        self
    }
}

/// Outcome of a traced run.
#[derive(Clone, Debug)]
pub struct RunSummary {
    pub calls: u64,
    pub steps: u64,
    pub returns: u64,
    /// Formatted completion value of the traced code.
    pub result: String,
    pub elapsed: Duration,
}

impl RunSummary {
    pub const fn events(&self) -> u64 {
        self.calls + self.steps + self.returns
    }
}

#[derive(Default)]
struct EventCounter {
    calls: Cell<u64>,
    steps: Cell<u64>,
    returns: Cell<u64>,
}

impl TracingListener for EventCounter {
    fn on_tracing_frame(&self, frame: &FrameInfo) -> ListenerResult {
        let counter = match frame.kind {
            FrameKind::Call => &self.calls,
            FrameKind::Step => &self.steps,
            FrameKind::Return => &self.returns,
        };
        counter.set(counter.get() + 1);
        Ok(())
    }
}

/// Source URL of a script: its file name.
pub fn script_url(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |name| name.to_string_lossy().into_owned(),
    )
}

/// Load `options.script` into a fresh scope and run it on an event loop
/// until idle, tracing it with `options.config`.
pub fn run_script(options: &RunOptions) -> Result<RunSummary, RunError> {
    let source = fs::read_to_string(&options.script).map_err(|source| RunError::Io {
        path: options.script.display().to_string(),
        source,
    })?;
    let url = script_url(&options.script);

    let event_loop = EventLoop::new();
    let interp = Interpreter::new();
    let scope = interp.create_scope(&url);
    let tracer = Tracer::new(event_loop.scheduler());
    interp.set_instrumentation(tracer.clone());
    let counter = Rc::new(EventCounter::default());
    tracer.add_tracing_listener(&counter);

    let started = Instant::now();
    let program = match &options.eval {
        None => {
            tracer.start_tracing(options.config.clone())?;
            interp.eval_async(scope, &url, &source)
        }
        Some(code) => {
            event_loop
                .block_on(interp.eval_async(scope, &url, &source))
                .ok_or(RunError::Stalled)??;
            let config = options.config.clone().with_target(TraceTarget::Scope(scope));
            tracer.start_tracing(config)?;
            interp.eval_async(scope, EVAL_URL, code)
        }
    };

    let result = event_loop.block_on(program);
    event_loop.run_until_idle();
    tracer.stop_tracing();
    let value = result.ok_or(RunError::Stalled)??;

    let elapsed = started.elapsed();
    metrics::record_run(&url, elapsed);
    let summary = RunSummary {
        calls: counter.calls.get(),
        steps: counter.steps.get(),
        returns: counter.returns.get(),
        result: format_value(&value),
        elapsed,
    };
    info!(
        script = %url,
        events = summary.events(),
        elapsed_ms = elapsed.as_millis(),
        "run finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;
    use crate::logger::{HEADER, LineBuffer};

    fn script(source: &str) -> NamedTempFile {
        let mut file = NamedTempFile::with_suffix(".js").unwrap();
        file.write_all(source.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_run_traces_whole_script() {
        let file = script("function bar() { return 1; }\nfunction foo() { return bar() + 1; }\nfoo();\n");
        let logs = LineBuffer::new();
        let config = TraceConfig::new()
            .with_trace_function_return(true)
            .with_logging_method(logs.clone());
        let summary = run_script(&RunOptions::new(file.path(), config)).unwrap();

        assert_eq!(summary.calls, 2);
        assert_eq!(summary.returns, 2);
        assert_eq!(summary.steps, 0);
        assert_eq!(summary.result, "2");
        assert_eq!(
            logs.lines(),
            vec![
                HEADER.to_string(),
                "λ foo".to_string(),
                "λ bar".to_string(),
                "λ bar return 1".to_string(),
                "λ foo return 2".to_string(),
            ]
        );
    }

    #[test]
    fn test_eval_traces_only_eval_code() {
        let file = script("function double(x) { return x * 2; }\ndouble(1);\n");
        let logs = LineBuffer::new();
        let config = TraceConfig::new()
            .with_trace_values(true)
            .with_logging_method(logs.clone());
        let options = RunOptions::new(file.path(), config).with_eval("double(21)");
        let summary = run_script(&options).unwrap();

        assert_eq!(summary.calls, 1);
        assert_eq!(summary.result, "42");
        assert_eq!(logs.lines(), vec![HEADER.to_string(), "λ double(21)".to_string()]);
    }

    #[test]
    fn test_missing_script() {
        let options = RunOptions::new("/nonexistent/missing.js", TraceConfig::new());
        assert!(matches!(run_script(&options), Err(RunError::Io { .. })));
    }

    #[test]
    fn test_script_errors_propagate() {
        let file = script("undefinedFunction();\n");
        let err = run_script(&RunOptions::new(file.path(), TraceConfig::new())).unwrap_err();
        assert!(matches!(err, RunError::Host(HostError::NotDefined(_))));
    }

    #[test]
    fn test_script_url_is_file_name() {
        assert_eq!(script_url(Path::new("/tmp/dir/file.js")), "file.js");
    }
}
