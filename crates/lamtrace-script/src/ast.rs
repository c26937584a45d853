//! Abstract syntax tree.
//!
//! Statement boundaries (the points a step tracer reports) are derived from
//! the AST by [`Stmt::boundary`]; see that method for which position each
//! statement reports.

use std::rc::Rc;

use crate::Pos;

/// A parsed source file.
#[derive(Clone, Debug)]
pub struct Program {
    pub url: Rc<str>,
    pub body: Vec<Stmt>,
}

impl Program {
    /// Top-level function declarations, in source order.
    pub fn functions(&self) -> impl Iterator<Item = &Rc<FunctionLiteral>> {
        self.body.iter().filter_map(|stmt| match stmt {
            Stmt::Function(func) => Some(func),
            _ => None,
        })
    }
}

/// A function declaration or expression.
#[derive(Clone, Debug)]
pub struct FunctionLiteral {
    pub name: Option<Rc<str>>,
    pub params: Vec<Rc<str>>,
    pub body: Vec<Stmt>,
    /// Position of the `function` keyword.
    pub pos: Pos,
    /// Position of the closing brace of the body.
    pub body_end: Pos,
}

impl FunctionLiteral {
    /// Where a call into this function is first reported: the first statement
    /// boundary of the body, or the closing brace of a body without one.
    pub fn entry_pos(&self) -> Pos {
        self.body
            .iter()
            .find_map(Stmt::boundary)
            .unwrap_or(self.body_end)
    }
}

#[derive(Clone, Debug)]
pub enum Stmt {
    Function(Rc<FunctionLiteral>),
    Let {
        name: Rc<str>,
        init: Option<Expr>,
        pos: Pos,
    },
    Expr(Expr),
    If {
        test: Expr,
        consequent: Box<Stmt>,
        alternate: Option<Box<Stmt>>,
    },
    For {
        init: Option<Box<Stmt>>,
        test: Option<Expr>,
        update: Option<Expr>,
        body: Box<Stmt>,
        pos: Pos,
    },
    While {
        test: Expr,
        body: Box<Stmt>,
    },
    Block(Vec<Stmt>),
    Return {
        argument: Option<Expr>,
        pos: Pos,
    },
    Empty,
}

impl Stmt {
    /// Position of the first statement boundary this statement reports when
    /// executed, if any.
    ///
    /// - `let x = e` reports `e`; `let x;` reports nothing
    /// - expression statements report the expression start
    /// - `if`/`while` report their condition
    /// - `for` reports its initializer, or its condition when there is none
    /// - `return` reports the keyword
    /// - blocks report their first inner boundary
    pub fn boundary(&self) -> Option<Pos> {
        match self {
            Self::Let { init, .. } => init.as_ref().map(|e| e.pos),
            Self::Expr(expr) => Some(expr.pos),
            Self::If { test, .. } | Self::While { test, .. } => Some(test.pos),
            Self::For { init, test, .. } => init
                .as_deref()
                .and_then(Self::boundary)
                .or_else(|| test.as_ref().map(|t| t.pos)),
            Self::Return { pos, .. } => Some(*pos),
            Self::Block(body) => body.iter().find_map(Self::boundary),
            Self::Function(_) | Self::Empty => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Expr {
    pub kind: ExprKind,
    pub pos: Pos,
}

#[derive(Clone, Debug)]
pub enum ExprKind {
    Number(f64),
    String(Rc<str>),
    Bool(bool),
    Null,
    Undefined,
    Ident(Rc<str>),
    Array(Vec<Expr>),
    Object(Vec<(Rc<str>, Expr)>),
    Function(Rc<FunctionLiteral>),
    Class(Option<Rc<str>>),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Assign {
        target: Rc<str>,
        op: AssignOp,
        value: Box<Expr>,
    },
    Update {
        target: Rc<str>,
        increment: bool,
        prefix: bool,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
    Typeof,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Gt,
    Le,
    Ge,
    StrictEq,
    StrictNe,
    LooseEq,
    LooseNe,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
}

impl AssignOp {
    /// The binary operator a compound assignment applies.
    pub const fn binary(self) -> Option<BinaryOp> {
        match self {
            Self::Assign => None,
            Self::Add => Some(BinaryOp::Add),
            Self::Sub => Some(BinaryOp::Sub),
            Self::Mul => Some(BinaryOp::Mul),
            Self::Div => Some(BinaryOp::Div),
        }
    }
}
