//! Host error types.

use lamtrace_script::ParseError;
use thiserror::Error;

use crate::ScopeId;

/// Errors raised while loading or running scripts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("{0} is not defined")]
    NotDefined(String),

    #[error("{0} is not a function")]
    NotCallable(String),

    #[error("unknown scope {0}")]
    UnknownScope(ScopeId),

    #[error("execution suspended outside of an event loop")]
    WouldSuspend,

    #[error("maximum call depth of {0} exceeded")]
    TooMuchRecursion(usize),

    #[error("type error: {0}")]
    Type(String),
}

pub type Result<T> = std::result::Result<T, HostError>;
