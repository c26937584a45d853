//! Script front end for lamtrace.
//!
//! Parses a small JavaScript-flavoured language into an AST in which every
//! expression and statement carries its `line:column` position. Positions are
//! 1-based, matching what trace output reports.
//!
//! # Example
//!
//! ```ignore
//! use lamtrace_script::parse;
//!
//! let program = parse("file.js", "function foo() { bar(); }")?;
//! assert_eq!(program.functions().count(), 1);
//! ```

mod ast;
mod lexer;
mod location;
mod parser;

pub use ast::{
    AssignOp, BinaryOp, Expr, ExprKind, FunctionLiteral, LogicalOp, Program, Stmt, UnaryOp,
};
pub use lexer::{Lexer, Token, TokenKind};
pub use location::{Pos, SourceLocation};
pub use parser::{MAX_NESTING, parse};

use thiserror::Error;

/// Script parsing errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{url}:{line}:{column}: {message}")]
pub struct ParseError {
    pub url: String,
    pub line: u32,
    pub column: u32,
    pub message: String,
}

pub type Result<T> = std::result::Result<T, ParseError>;
