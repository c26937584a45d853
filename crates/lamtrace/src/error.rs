use thiserror::Error;

/// Invalid tracing configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("pause on step must be at least 0 ms, got {0}")]
    NegativePause(i64),
}

/// A listener callback failed. Reported through the error channel; dispatch
/// continues with the remaining listeners.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ListenerError {
    #[error("listener {callback} failed: {message}")]
    Failed {
        callback: &'static str,
        message: String,
    },
    #[error("listener {callback} panicked: {message}")]
    Panicked {
        callback: &'static str,
        message: String,
    },
}

/// Tracer errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TraceError {
    #[error("tracing is already active")]
    AlreadyActive,
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Listener(#[from] ListenerError),
}

pub type Result<T> = std::result::Result<T, TraceError>;
