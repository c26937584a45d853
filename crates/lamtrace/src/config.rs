//! Tracing configuration.

use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use lamtrace_host::ScopeId;

use crate::error::ConfigError;
use crate::logger::LogSink;

/// Which scopes a session instruments.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TraceTarget {
    #[default]
    AllScopes,
    Scope(ScopeId),
}

impl TraceTarget {
    pub fn includes(self, scope: ScopeId) -> bool {
        match self {
            Self::AllScopes => true,
            Self::Scope(target) => target == scope,
        }
    }
}

/// Options for [`Tracer::start_tracing`](crate::Tracer::start_tracing).
#[derive(Clone, Default)]
pub struct TraceConfig {
    pub target: TraceTarget,
    /// Label prepended to every line and frame as `"<prefix>: "`.
    pub prefix: String,
    /// Format call arguments.
    pub trace_values: bool,
    /// Report function returns with their formatted value.
    pub trace_function_return: bool,
    /// Report statement boundaries.
    pub trace_steps: bool,
    /// Hold traced code for this many milliseconds after each emitted event.
    pub pause_on_step_ms: Option<i64>,
    /// Only emit frames whose source URL contains this substring.
    pub filter_frame_source_url: Option<String>,
    /// Text sink. Without one no lines are written; listeners still run.
    pub logging_method: Option<Rc<dyn LogSink>>,
}

impl TraceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn with_target(mut self, target: TraceTarget) -> Self {
        self.target = target;
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub const fn with_trace_values(mut self, enabled: bool) -> Self {
        self.trace_values = enabled;
        self
    }

    pub const fn with_trace_function_return(mut self, enabled: bool) -> Self {
        self.trace_function_return = enabled;
        self
    }

    pub const fn with_trace_steps(mut self, enabled: bool) -> Self {
        self.trace_steps = enabled;
        self
    }

    pub const fn with_pause_on_step_ms(mut self, ms: i64) -> Self {
        self.pause_on_step_ms = Some(ms);
        self
    }

    pub fn with_filter_frame_source_url(mut self, filter: impl Into<String>) -> Self {
        self.filter_frame_source_url = Some(filter.into());
        self
    }

    pub fn with_logging_method(mut self, sink: impl LogSink + 'static) -> Self {
        self.logging_method = Some(Rc::new(sink));
        self
    }

    /// Check the configuration before a session is created.
    pub const fn validate(&self) -> Result<(), ConfigError> {
        match self.pause_on_step_ms {
            Some(ms) if ms < 0 => Err(ConfigError::NegativePause(ms)),
            _ => Ok(()),
        }
    }

    /// The label prepended to lines: `"<prefix>: "`, or empty.
    pub fn label(&self) -> String {
        if self.prefix.is_empty() {
            String::new()
        } else {
            format!("{}: ", self.prefix)
        }
    }

    /// Pause applied after each emitted event.
    pub fn pause_delay(&self) -> Option<Duration> {
        self.pause_on_step_ms
            .and_then(|ms| u64::try_from(ms).ok())
            .map(Duration::from_millis)
    }
}

impl fmt::Debug for TraceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceConfig")
            .field("target", &self.target)
            .field("prefix", &self.prefix)
            .field("trace_values", &self.trace_values)
            .field("trace_function_return", &self.trace_function_return)
            .field("trace_steps", &self.trace_steps)
            .field("pause_on_step_ms", &self.pause_on_step_ms)
            .field("filter_frame_source_url", &self.filter_frame_source_url)
            .field("logging_method", &self.logging_method.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TraceConfig::new();
        assert_eq!(config.target, TraceTarget::AllScopes);
        assert_eq!(config.label(), "");
        assert!(!config.trace_values && !config.trace_function_return && !config.trace_steps);
        assert!(config.logging_method.is_none());
        assert_eq!(config.pause_delay(), None);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_builders() {
        let config = TraceConfig::new()
            .with_target(TraceTarget::Scope(ScopeId(3)))
            .with_prefix("testContentPrefix")
            .with_trace_values(true)
            .with_pause_on_step_ms(250)
            .with_filter_frame_source_url("second");
        assert_eq!(config.label(), "testContentPrefix: ");
        assert_eq!(config.pause_delay(), Some(Duration::from_millis(250)));
        assert!(config.target.includes(ScopeId(3)));
        assert!(!config.target.includes(ScopeId(4)));
        assert!(TraceTarget::AllScopes.includes(ScopeId(4)));
        assert_eq!(config.filter_frame_source_url.as_deref(), Some("second"));
    }

    #[test]
    fn test_negative_pause_rejected() {
        let config = TraceConfig::new().with_pause_on_step_ms(-1);
        assert_eq!(config.validate(), Err(ConfigError::NegativePause(-1)));
        assert_eq!(
            TraceConfig::new().with_pause_on_step_ms(0).pause_delay(),
            Some(Duration::ZERO)
        );
    }
}
