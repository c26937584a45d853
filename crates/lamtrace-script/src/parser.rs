//! Recursive-descent parser.
//!
//! Semicolons are optional. Class bodies are not modelled: `class Name { .. }`
//! is accepted and its body skipped, which is enough for classes used as
//! values.
//!
//! Statements, expressions and each operator in a chain nest one level
//! deeper. Input nested beyond [`MAX_NESTING`] levels is rejected.

use std::rc::Rc;

use crate::ast::{
    AssignOp, BinaryOp, Expr, ExprKind, FunctionLiteral, LogicalOp, Program, Stmt, UnaryOp,
};
use crate::lexer::{Lexer, Token, TokenKind};
use crate::{ParseError, Pos, Result};

/// Deepest nesting of statements and expressions accepted.
pub const MAX_NESTING: usize = 64;

/// Parse `source`, reporting positions against `url`.
pub fn parse(url: &str, source: &str) -> Result<Program> {
    let tokens = Lexer::new(url, source).tokenize()?;
    let mut parser = Parser {
        url,
        tokens,
        idx: 0,
        depth: 0,
    };
    let mut body = Vec::new();
    while !parser.at_eof() {
        body.push(parser.statement()?);
    }
    Ok(Program {
        url: Rc::from(url),
        body,
    })
}

struct Parser<'a> {
    url: &'a str,
    tokens: Vec<Token>,
    idx: usize,
    depth: usize,
}

impl Parser<'_> {
    // ========================================================================
    // Token cursor
    // ========================================================================

    fn peek(&self) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[self.idx.min(last)]
    }

    fn peek_at(&self, ahead: usize) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.idx + ahead).min(last)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.idx < self.tokens.len() {
            self.idx += 1;
        }
        token
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn eat_punct(&mut self, p: &str) -> bool {
        if self.peek().is_punct(p) {
            self.idx += 1;
            true
        } else {
            false
        }
    }

    fn eat_ident(&mut self, name: &str) -> bool {
        if self.peek().is_ident(name) {
            self.idx += 1;
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, p: &str) -> Result<Pos> {
        let token = self.peek();
        if token.is_punct(p) {
            let pos = token.pos;
            self.idx += 1;
            Ok(pos)
        } else {
            Err(self.unexpected(&format!("expected '{p}'")))
        }
    }

    fn identifier(&mut self) -> Result<Rc<str>> {
        match &self.peek().kind {
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.idx += 1;
                Ok(name)
            }
            _ => Err(self.unexpected("expected identifier")),
        }
    }

    /// Go one nesting level deeper.
    fn descend(&mut self) -> Result<()> {
        if self.depth >= MAX_NESTING {
            return Err(self.unexpected("nesting too deep"));
        }
        self.depth += 1;
        Ok(())
    }

    /// Run `parse` one level deeper, restoring the level afterwards.
    fn nested<T>(&mut self, parse: fn(&mut Self) -> Result<T>) -> Result<T> {
        let depth = self.depth;
        let result = self.descend().and_then(|()| parse(self));
        self.depth = depth;
        result
    }

    fn unexpected(&self, message: &str) -> ParseError {
        let token = self.peek();
        let found = match &token.kind {
            TokenKind::Number(n) => format!("number {n}"),
            TokenKind::String(s) => format!("string \"{s}\""),
            TokenKind::Ident(id) => format!("'{id}'"),
            TokenKind::Punct(p) => format!("'{p}'"),
            TokenKind::Eof => "end of input".to_string(),
        };
        ParseError {
            url: self.url.to_string(),
            line: token.pos.line,
            column: token.pos.column,
            message: format!("{message}, found {found}"),
        }
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn statement(&mut self) -> Result<Stmt> {
        self.nested(Self::statement_at)
    }

    fn statement_at(&mut self) -> Result<Stmt> {
        let token = self.peek();
        let pos = token.pos;

        if token.is_punct(";") {
            self.idx += 1;
            return Ok(Stmt::Empty);
        }
        if token.is_punct("{") {
            self.idx += 1;
            return Ok(Stmt::Block(self.block_body()?));
        }
        if token.is_ident("function") && matches!(self.peek_at(1).kind, TokenKind::Ident(_)) {
            let func = self.function()?;
            return Ok(Stmt::Function(func));
        }
        if token.is_ident("let") || token.is_ident("var") || token.is_ident("const") {
            let stmt = self.declaration()?;
            self.eat_punct(";");
            return Ok(stmt);
        }
        if token.is_ident("if") {
            return self.if_statement();
        }
        if token.is_ident("for") {
            return self.for_statement(pos);
        }
        if token.is_ident("while") {
            self.idx += 1;
            self.expect_punct("(")?;
            let test = self.expression()?;
            self.expect_punct(")")?;
            let body = Box::new(self.statement()?);
            return Ok(Stmt::While { test, body });
        }
        if token.is_ident("return") {
            self.idx += 1;
            let next = self.peek();
            let argument = if next.is_punct(";") || next.is_punct("}") || self.at_eof() {
                None
            } else {
                Some(self.expression()?)
            };
            self.eat_punct(";");
            return Ok(Stmt::Return { argument, pos });
        }

        let expr = self.expression()?;
        self.eat_punct(";");
        Ok(Stmt::Expr(expr))
    }

    /// Statements up to and including the closing brace.
    fn block_body(&mut self) -> Result<Vec<Stmt>> {
        let mut body = Vec::new();
        while !self.peek().is_punct("}") {
            if self.at_eof() {
                return Err(self.unexpected("expected '}'"));
            }
            body.push(self.statement()?);
        }
        self.idx += 1;
        Ok(body)
    }

    fn declaration(&mut self) -> Result<Stmt> {
        let pos = self.advance().pos;
        let name = self.identifier()?;
        let init = if self.eat_punct("=") {
            Some(self.expression()?)
        } else {
            None
        };
        Ok(Stmt::Let { name, init, pos })
    }

    fn if_statement(&mut self) -> Result<Stmt> {
        self.idx += 1;
        self.expect_punct("(")?;
        let test = self.expression()?;
        self.expect_punct(")")?;
        let consequent = Box::new(self.statement()?);
        let alternate = if self.eat_ident("else") {
            Some(Box::new(self.statement()?))
        } else {
            None
        };
        Ok(Stmt::If {
            test,
            consequent,
            alternate,
        })
    }

    fn for_statement(&mut self, pos: Pos) -> Result<Stmt> {
        self.idx += 1;
        self.expect_punct("(")?;

        let init = if self.peek().is_punct(";") {
            None
        } else if ["let", "var", "const"].iter().any(|k| self.peek().is_ident(k)) {
            Some(Box::new(self.declaration()?))
        } else {
            Some(Box::new(Stmt::Expr(self.expression()?)))
        };
        self.expect_punct(";")?;

        let test = if self.peek().is_punct(";") {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect_punct(";")?;

        let update = if self.peek().is_punct(")") {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect_punct(")")?;

        let body = Box::new(self.statement()?);
        Ok(Stmt::For {
            init,
            test,
            update,
            body,
            pos,
        })
    }

    /// `function [name](params) { body }`, starting at the keyword.
    fn function(&mut self) -> Result<Rc<FunctionLiteral>> {
        let pos = self.advance().pos;
        let name = match &self.peek().kind {
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.idx += 1;
                Some(name)
            }
            _ => None,
        };

        self.expect_punct("(")?;
        let mut params = Vec::new();
        if !self.eat_punct(")") {
            loop {
                params.push(self.identifier()?);
                if self.eat_punct(")") {
                    break;
                }
                self.expect_punct(",")?;
            }
        }

        self.expect_punct("{")?;
        let mut body = Vec::new();
        while !self.peek().is_punct("}") {
            if self.at_eof() {
                return Err(self.unexpected("expected '}'"));
            }
            body.push(self.statement()?);
        }
        let body_end = self.advance().pos;

        Ok(Rc::new(FunctionLiteral {
            name,
            params,
            body,
            pos,
            body_end,
        }))
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn expression(&mut self) -> Result<Expr> {
        self.nested(Self::assignment)
    }

    fn assignment(&mut self) -> Result<Expr> {
        let target = self.logical_or()?;
        let op = match &self.peek().kind {
            TokenKind::Punct("=") => AssignOp::Assign,
            TokenKind::Punct("+=") => AssignOp::Add,
            TokenKind::Punct("-=") => AssignOp::Sub,
            TokenKind::Punct("*=") => AssignOp::Mul,
            TokenKind::Punct("/=") => AssignOp::Div,
            _ => return Ok(target),
        };
        let ExprKind::Ident(name) = target.kind else {
            return Err(self.unexpected("invalid assignment target"));
        };
        self.idx += 1;
        let value = self.expression()?;
        Ok(Expr {
            kind: ExprKind::Assign {
                target: name,
                op,
                value: Box::new(value),
            },
            pos: target.pos,
        })
    }

    fn logical_or(&mut self) -> Result<Expr> {
        self.logical_chain(LogicalOp::Or, "||", Self::logical_and)
    }

    fn logical_and(&mut self) -> Result<Expr> {
        self.logical_chain(LogicalOp::And, "&&", Self::equality)
    }

    fn equality(&mut self) -> Result<Expr> {
        self.binary_chain(Self::relational, |kind| match kind {
            TokenKind::Punct("===") => Some(BinaryOp::StrictEq),
            TokenKind::Punct("!==") => Some(BinaryOp::StrictNe),
            TokenKind::Punct("==") => Some(BinaryOp::LooseEq),
            TokenKind::Punct("!=") => Some(BinaryOp::LooseNe),
            _ => None,
        })
    }

    fn relational(&mut self) -> Result<Expr> {
        self.binary_chain(Self::additive, |kind| match kind {
            TokenKind::Punct("<") => Some(BinaryOp::Lt),
            TokenKind::Punct(">") => Some(BinaryOp::Gt),
            TokenKind::Punct("<=") => Some(BinaryOp::Le),
            TokenKind::Punct(">=") => Some(BinaryOp::Ge),
            _ => None,
        })
    }

    fn additive(&mut self) -> Result<Expr> {
        self.binary_chain(Self::multiplicative, |kind| match kind {
            TokenKind::Punct("+") => Some(BinaryOp::Add),
            TokenKind::Punct("-") => Some(BinaryOp::Sub),
            _ => None,
        })
    }

    fn multiplicative(&mut self) -> Result<Expr> {
        self.binary_chain(Self::unary, |kind| match kind {
            TokenKind::Punct("*") => Some(BinaryOp::Mul),
            TokenKind::Punct("/") => Some(BinaryOp::Div),
            TokenKind::Punct("%") => Some(BinaryOp::Rem),
            _ => None,
        })
    }

    /// Left-associative chain of `operand`s joined by the operators
    /// `operator` recognises.
    fn binary_chain(
        &mut self,
        operand: fn(&mut Self) -> Result<Expr>,
        operator: fn(&TokenKind) -> Option<BinaryOp>,
    ) -> Result<Expr> {
        let depth = self.depth;
        let result = self.binary_operands(operand, operator);
        self.depth = depth;
        result
    }

    fn binary_operands(
        &mut self,
        operand: fn(&mut Self) -> Result<Expr>,
        operator: fn(&TokenKind) -> Option<BinaryOp>,
    ) -> Result<Expr> {
        let mut left = operand(self)?;
        while let Some(op) = operator(&self.peek().kind) {
            self.idx += 1;
            self.descend()?;
            let right = operand(self)?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn logical_chain(
        &mut self,
        op: LogicalOp,
        token: &str,
        operand: fn(&mut Self) -> Result<Expr>,
    ) -> Result<Expr> {
        let depth = self.depth;
        let result = self.logical_operands(op, token, operand);
        self.depth = depth;
        result
    }

    fn logical_operands(
        &mut self,
        op: LogicalOp,
        token: &str,
        operand: fn(&mut Self) -> Result<Expr>,
    ) -> Result<Expr> {
        let mut left = operand(self)?;
        while self.eat_punct(token) {
            self.descend()?;
            let right = operand(self)?;
            left = logical(op, left, right);
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr> {
        let token = self.peek();
        let pos = token.pos;
        let op = match &token.kind {
            TokenKind::Punct("-") => Some(UnaryOp::Neg),
            TokenKind::Punct("+") => Some(UnaryOp::Plus),
            TokenKind::Punct("!") => Some(UnaryOp::Not),
            TokenKind::Ident(id) if id.as_ref() == "typeof" => Some(UnaryOp::Typeof),
            _ => None,
        };
        if let Some(op) = op {
            self.idx += 1;
            let operand = self.nested(Self::unary)?;
            return Ok(Expr {
                kind: ExprKind::Unary {
                    op,
                    operand: Box::new(operand),
                },
                pos,
            });
        }

        let increment = token.is_punct("++");
        if increment || token.is_punct("--") {
            self.idx += 1;
            let target = self.identifier()?;
            return Ok(Expr {
                kind: ExprKind::Update {
                    target,
                    increment,
                    prefix: true,
                },
                pos,
            });
        }

        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr> {
        let depth = self.depth;
        let result = self.calls();
        self.depth = depth;
        result
    }

    fn calls(&mut self) -> Result<Expr> {
        let mut expr = self.primary()?;
        while self.eat_punct("(") {
            self.descend()?;
            let mut args = Vec::new();
            if !self.eat_punct(")") {
                loop {
                    args.push(self.expression()?);
                    if self.eat_punct(")") {
                        break;
                    }
                    self.expect_punct(",")?;
                }
            }
            let pos = expr.pos;
            expr = Expr {
                kind: ExprKind::Call {
                    callee: Box::new(expr),
                    args,
                },
                pos,
            };
        }

        let increment = self.peek().is_punct("++");
        if increment || self.peek().is_punct("--") {
            let ExprKind::Ident(target) = &expr.kind else {
                return Err(self.unexpected("invalid update target"));
            };
            let target = target.clone();
            self.idx += 1;
            return Ok(Expr {
                kind: ExprKind::Update {
                    target,
                    increment,
                    prefix: false,
                },
                pos: expr.pos,
            });
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr> {
        let token = self.peek().clone();
        let pos = token.pos;
        let kind = match token.kind {
            TokenKind::Number(n) => {
                self.idx += 1;
                ExprKind::Number(n)
            }
            TokenKind::String(s) => {
                self.idx += 1;
                ExprKind::String(s)
            }
            TokenKind::Punct("(") => {
                self.idx += 1;
                let inner = self.expression()?;
                self.expect_punct(")")?;
                return Ok(Expr {
                    kind: inner.kind,
                    pos,
                });
            }
            TokenKind::Punct("[") => {
                self.idx += 1;
                ExprKind::Array(self.array_elements()?)
            }
            TokenKind::Punct("{") => {
                self.idx += 1;
                ExprKind::Object(self.object_properties()?)
            }
            TokenKind::Ident(id) => match id.as_ref() {
                "function" => ExprKind::Function(self.function()?),
                "class" => self.class()?,
                "true" | "false" => {
                    self.idx += 1;
                    ExprKind::Bool(id.as_ref() == "true")
                }
                "null" => {
                    self.idx += 1;
                    ExprKind::Null
                }
                "undefined" => {
                    self.idx += 1;
                    ExprKind::Undefined
                }
                "NaN" => {
                    self.idx += 1;
                    ExprKind::Number(f64::NAN)
                }
                "Infinity" => {
                    self.idx += 1;
                    ExprKind::Number(f64::INFINITY)
                }
                _ => {
                    self.idx += 1;
                    ExprKind::Ident(id)
                }
            },
            TokenKind::Punct(_) | TokenKind::Eof => {
                return Err(self.unexpected("expected expression"));
            }
        };
        Ok(Expr { kind, pos })
    }

    fn array_elements(&mut self) -> Result<Vec<Expr>> {
        let mut elements = Vec::new();
        while !self.eat_punct("]") {
            elements.push(self.expression()?);
            if !self.peek().is_punct("]") {
                self.expect_punct(",")?;
            }
        }
        Ok(elements)
    }

    fn object_properties(&mut self) -> Result<Vec<(Rc<str>, Expr)>> {
        let mut properties = Vec::new();
        while !self.eat_punct("}") {
            let key = match &self.peek().kind {
                TokenKind::Ident(name) | TokenKind::String(name) => name.clone(),
                _ => return Err(self.unexpected("expected property name")),
            };
            self.idx += 1;
            self.expect_punct(":")?;
            properties.push((key, self.expression()?));
            if !self.peek().is_punct("}") {
                self.expect_punct(",")?;
            }
        }
        Ok(properties)
    }

    /// `class [Name] { .. }` with the body skipped.
    fn class(&mut self) -> Result<ExprKind> {
        self.idx += 1;
        let name = match &self.peek().kind {
            TokenKind::Ident(name) if !self.peek().is_ident("extends") => {
                let name = name.clone();
                self.idx += 1;
                Some(name)
            }
            _ => None,
        };
        if self.eat_ident("extends") {
            self.identifier()?;
        }
        self.expect_punct("{")?;
        let mut depth = 1usize;
        while depth > 0 {
            let token = self.advance();
            match token.kind {
                TokenKind::Punct("{") => depth += 1,
                TokenKind::Punct("}") => depth -= 1,
                TokenKind::Eof => return Err(self.unexpected("unterminated class body")),
                _ => {}
            }
        }
        Ok(ExprKind::Class(name))
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    let pos = left.pos;
    Expr {
        kind: ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
        pos,
    }
}

fn logical(op: LogicalOp, left: Expr, right: Expr) -> Expr {
    let pos = left.pos;
    Expr {
        kind: ExprKind::Logical {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
        pos,
    }
}
