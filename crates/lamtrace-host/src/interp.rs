//! Tree-walking interpreter.
//!
//! Evaluation is written as futures so that any instrumentation hook can hold
//! execution by returning a [`Suspension`]. Without suspensions every future
//! completes on its first poll, which is what [`Interpreter::eval`] and
//! [`Interpreter::call_sync`] rely on.
//!
//! Top-level code is not a frame: it reports no statement boundaries and its
//! declarations become scope globals. Function bodies see their own locals
//! and the globals of the scope they were defined in.
//!
//! Each call chain is limited to [`MAX_CALL_DEPTH`] script frames. Polling
//! nested calls recurses on the native stack, so runaway recursion fails
//! with [`HostError::TooMuchRecursion`] instead of overflowing it.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::task::Poll;

use futures::FutureExt;
use futures::future::LocalBoxFuture;
use lamtrace_script::{
    Expr, ExprKind, FunctionLiteral, LogicalOp, Pos, Program, SourceLocation, Stmt, UnaryOp, parse,
};
use lamtrace_value::{ObjectMap, Value, format_value};
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::event_loop::poll_once;
use crate::instrument::{CallSite, FrameId, Instrumentation, NoopInstrumentation, Suspension};
use crate::realm::{FunctionBody, FunctionDef, Realm, ScopeId};
use crate::{HostError, Result, ops};

/// Deepest chain of nested script calls a single task may build.
pub const MAX_CALL_DEPTH: usize = 128;

/// Console output callback used by `print`.
pub type Console = Rc<dyn Fn(&str)>;

/// Completion of a statement.
enum Flow {
    Normal,
    Return(Value),
}

/// Execution context of one frame, or of top-level code.
struct Activation {
    frame: Option<FrameId>,
    /// Script frames in the call chain up to this one; 0 for top-level code.
    depth: usize,
    scope: ScopeId,
    url: Rc<str>,
    /// `None` for top-level code, whose bindings are globals.
    locals: Option<FxHashMap<Rc<str>, Value>>,
}

/// Where a call is made from.
#[derive(Clone, Copy)]
struct Caller {
    frame: Option<FrameId>,
    depth: usize,
}

impl Caller {
    const ROOT: Self = Self {
        frame: None,
        depth: 0,
    };

    const fn of(act: &Activation) -> Self {
        Self {
            frame: act.frame,
            depth: act.depth,
        }
    }
}

/// Reports an entered frame as abandoned if it is dropped before its exit
/// hook runs.
struct FrameGuard {
    instrumentation: Rc<dyn Instrumentation>,
    frame: FrameId,
    armed: bool,
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        if self.armed {
            debug!(frame = %self.frame, "frame abandoned");
            self.instrumentation.abandon_frame(self.frame);
        }
    }
}

/// Script interpreter bound to one realm.
pub struct Interpreter {
    realm: RefCell<Realm>,
    instrumentation: RefCell<Rc<dyn Instrumentation>>,
    console: RefCell<Option<Console>>,
    next_frame: Cell<u64>,
}

impl Interpreter {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            realm: RefCell::new(Realm::new()),
            instrumentation: RefCell::new(Rc::new(NoopInstrumentation)),
            console: RefCell::new(None),
            next_frame: Cell::new(0),
        })
    }

    /// Install the hooks called for every script frame.
    pub fn set_instrumentation(&self, instrumentation: Rc<dyn Instrumentation>) {
        *self.instrumentation.borrow_mut() = instrumentation;
    }

    /// Route `print` output. Without a console, output goes to stdout.
    pub fn set_console(&self, console: Console) {
        *self.console.borrow_mut() = Some(console);
    }

    pub fn create_scope(&self, name: &str) -> ScopeId {
        self.realm.borrow_mut().create_scope(name)
    }

    pub fn global(&self, scope: ScopeId, name: &str) -> Result<Value> {
        self.realm
            .borrow()
            .global(scope, name)?
            .ok_or_else(|| HostError::NotDefined(name.to_string()))
    }

    pub fn set_global(&self, scope: ScopeId, name: &str, value: Value) -> Result<()> {
        self.realm.borrow_mut().set_global(scope, name, value)
    }

    // ========================================================================
    // Entry points
    // ========================================================================

    /// Parse and run `source` as top-level code of `scope`.
    ///
    /// The returned value is that of the last expression statement.
    pub fn eval_async(
        self: &Rc<Self>,
        scope: ScopeId,
        url: &str,
        source: &str,
    ) -> LocalBoxFuture<'static, Result<Value>> {
        let this = Rc::clone(self);
        let parsed = parse(url, source);
        async move {
            let program = parsed?;
            this.run_program(scope, &program).await
        }
        .boxed_local()
    }

    /// Run `source` to completion without an event loop.
    ///
    /// Fails with [`HostError::WouldSuspend`] if a hook suspends execution.
    pub fn eval(self: &Rc<Self>, scope: ScopeId, url: &str, source: &str) -> Result<Value> {
        match poll_once(self.eval_async(scope, url, source)) {
            Poll::Ready(result) => result,
            Poll::Pending => Err(HostError::WouldSuspend),
        }
    }

    /// Call the global function `name` of `scope`.
    pub fn call(
        self: &Rc<Self>,
        scope: ScopeId,
        name: &str,
        args: Vec<Value>,
    ) -> LocalBoxFuture<'static, Result<Value>> {
        let this = Rc::clone(self);
        let callee = self.global(scope, name);
        async move { this.call_value(callee?, args, Caller::ROOT).await }.boxed_local()
    }

    /// Call the global function `name` of `scope` to completion without an
    /// event loop.
    ///
    /// Fails with [`HostError::WouldSuspend`] if a hook suspends execution.
    pub fn call_sync(self: &Rc<Self>, scope: ScopeId, name: &str, args: Vec<Value>) -> Result<Value> {
        match poll_once(self.call(scope, name, args)) {
            Poll::Ready(result) => result,
            Poll::Pending => Err(HostError::WouldSuspend),
        }
    }

    async fn run_program(&self, scope: ScopeId, program: &Program) -> Result<Value> {
        self.realm.borrow().scope(scope)?;
        let mut act = Activation {
            frame: None,
            depth: 0,
            scope,
            url: Rc::clone(&program.url),
            locals: None,
        };
        self.hoist(&mut act, &program.body)?;
        let mut completion = Value::Undefined;
        for stmt in &program.body {
            if let Stmt::Expr(expr) = stmt {
                completion = self.eval_expr(&mut act, expr).await?;
            } else if let Flow::Return(value) = self.exec_stmt(&mut act, stmt).await? {
                return Ok(value);
            }
        }
        Ok(completion)
    }

    // ========================================================================
    // Calls
    // ========================================================================

    fn call_value(
        &self,
        callee: Value,
        args: Vec<Value>,
        caller: Caller,
    ) -> LocalBoxFuture<'_, Result<Value>> {
        async move {
            let Value::Function(func) = &callee else {
                return Err(HostError::NotCallable(format_value(&callee)));
            };
            let def = self
                .realm
                .borrow()
                .function(func.id)
                .ok_or_else(|| HostError::NotCallable(format_value(&callee)))?;
            match &def.body {
                FunctionBody::Native(native) => {
                    let console = self.console.borrow().clone();
                    match console {
                        Some(console) => native.call(&args, console.as_ref()),
                        None => native.call(&args, &|line: &str| println!("{line}")),
                    }
                }
                FunctionBody::Script { literal, entry } => {
                    self.invoke(&def, literal, entry, args, caller).await
                }
            }
        }
        .boxed_local()
    }

    async fn invoke(
        &self,
        def: &FunctionDef,
        literal: &FunctionLiteral,
        entry: &SourceLocation,
        args: Vec<Value>,
        caller: Caller,
    ) -> Result<Value> {
        let depth = caller.depth + 1;
        if depth > MAX_CALL_DEPTH {
            return Err(HostError::TooMuchRecursion(MAX_CALL_DEPTH));
        }
        let frame = FrameId(self.next_frame.get());
        self.next_frame.set(frame.0 + 1);

        let instrumentation = self.instrumentation();
        let mut guard = FrameGuard {
            instrumentation: Rc::clone(&instrumentation),
            frame,
            armed: true,
        };
        let site = CallSite {
            frame,
            parent: caller.frame,
            scope: def.scope,
            function: def.id,
            name: def.name.as_deref(),
            entry,
            arguments: &args,
        };
        let suspension = instrumentation.enter_frame(&site);
        resume(suspension).await;

        let mut locals = FxHashMap::default();
        let mut args = args.into_iter();
        for param in &literal.params {
            locals.insert(Rc::clone(param), args.next().unwrap_or(Value::Undefined));
        }
        let mut act = Activation {
            frame: Some(frame),
            depth,
            scope: def.scope,
            url: Rc::clone(&def.url),
            locals: Some(locals),
        };

        let result = self.exec_block(&mut act, &literal.body).await;
        let value = match &result {
            Ok(Flow::Return(value)) => value.clone(),
            Ok(Flow::Normal) | Err(_) => Value::Undefined,
        };
        if let Err(err) = &result {
            debug!(%frame, error = %err, "frame exited with error");
        }

        guard.armed = false;
        let suspension = self.instrumentation().exit_frame(frame, &value);
        resume(suspension).await;
        result.map(|_| value)
    }

    fn instrumentation(&self) -> Rc<dyn Instrumentation> {
        Rc::clone(&self.instrumentation.borrow())
    }

    // ========================================================================
    // Statements
    // ========================================================================

    /// Define the function declarations of a statement list up front.
    fn hoist(&self, act: &mut Activation, body: &[Stmt]) -> Result<()> {
        for stmt in body {
            if let Stmt::Function(literal) = stmt {
                let value =
                    self.realm
                        .borrow_mut()
                        .define_function(act.scope, &act.url, literal)?;
                if let Some(name) = &literal.name {
                    self.declare(act, name, value)?;
                }
            }
        }
        Ok(())
    }

    fn exec_block<'a>(
        &'a self,
        act: &'a mut Activation,
        body: &'a [Stmt],
    ) -> LocalBoxFuture<'a, Result<Flow>> {
        async move {
            self.hoist(act, body)?;
            for stmt in body {
                if let Flow::Return(value) = self.exec_stmt(act, stmt).await? {
                    return Ok(Flow::Return(value));
                }
            }
            Ok(Flow::Normal)
        }
        .boxed_local()
    }

    fn exec_stmt<'a>(
        &'a self,
        act: &'a mut Activation,
        stmt: &'a Stmt,
    ) -> LocalBoxFuture<'a, Result<Flow>> {
        async move {
            match stmt {
                Stmt::Function(_) | Stmt::Empty => {}
                Stmt::Let { name, init, .. } => {
                    let value = match init {
                        Some(init) => {
                            self.step(act, init.pos).await;
                            self.eval_expr(act, init).await?
                        }
                        None => Value::Undefined,
                    };
                    self.declare(act, name, value)?;
                }
                Stmt::Expr(expr) => {
                    self.step(act, expr.pos).await;
                    self.eval_expr(act, expr).await?;
                }
                Stmt::If {
                    test,
                    consequent,
                    alternate,
                } => {
                    self.step(act, test.pos).await;
                    if self.eval_expr(act, test).await?.is_truthy() {
                        return self.exec_stmt(act, consequent).await;
                    }
                    if let Some(alternate) = alternate {
                        return self.exec_stmt(act, alternate).await;
                    }
                }
                Stmt::For {
                    init,
                    test,
                    update,
                    body,
                    ..
                } => {
                    if let Some(init) = init {
                        self.exec_stmt(act, init).await?;
                    }
                    loop {
                        if let Some(test) = test {
                            self.step(act, test.pos).await;
                            if !self.eval_expr(act, test).await?.is_truthy() {
                                break;
                            }
                        }
                        if let Flow::Return(value) = self.exec_stmt(act, body).await? {
                            return Ok(Flow::Return(value));
                        }
                        if let Some(update) = update {
                            self.step(act, update.pos).await;
                            self.eval_expr(act, update).await?;
                        }
                    }
                }
                Stmt::While { test, body } => loop {
                    self.step(act, test.pos).await;
                    if !self.eval_expr(act, test).await?.is_truthy() {
                        break;
                    }
                    if let Flow::Return(value) = self.exec_stmt(act, body).await? {
                        return Ok(Flow::Return(value));
                    }
                },
                Stmt::Block(body) => return self.exec_block(act, body).await,
                Stmt::Return { argument, pos } => {
                    self.step(act, *pos).await;
                    let value = match argument {
                        Some(argument) => self.eval_expr(act, argument).await?,
                        None => Value::Undefined,
                    };
                    return Ok(Flow::Return(value));
                }
            }
            Ok(Flow::Normal)
        }
        .boxed_local()
    }

    /// Report a statement boundary of the current frame.
    async fn step(&self, act: &Activation, pos: Pos) {
        let Some(frame) = act.frame else {
            return;
        };
        let location = SourceLocation::new(Rc::clone(&act.url), pos);
        let suspension = self.instrumentation().step(frame, &location);
        resume(suspension).await;
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn eval_expr<'a>(
        &'a self,
        act: &'a mut Activation,
        expr: &'a Expr,
    ) -> LocalBoxFuture<'a, Result<Value>> {
        async move {
            Ok(match &expr.kind {
                ExprKind::Number(n) => Value::Number(*n),
                ExprKind::String(s) => Value::String(Rc::clone(s)),
                ExprKind::Bool(b) => Value::Bool(*b),
                ExprKind::Null => Value::Null,
                ExprKind::Undefined => Value::Undefined,
                ExprKind::Ident(name) => self.lookup(act, name)?,
                ExprKind::Array(items) => {
                    let mut values = Vec::with_capacity(items.len());
                    for item in items {
                        values.push(self.eval_expr(act, item).await?);
                    }
                    Value::array(values)
                }
                ExprKind::Object(props) => {
                    let mut map = ObjectMap::default();
                    for (key, value) in props {
                        let value = self.eval_expr(act, value).await?;
                        map.insert(Rc::clone(key), value);
                    }
                    Value::object(map)
                }
                ExprKind::Function(literal) => {
                    self.realm
                        .borrow_mut()
                        .define_function(act.scope, &act.url, literal)?
                }
                ExprKind::Class(name) => Value::class(name.as_deref()),
                ExprKind::Unary { op, operand } => {
                    let value = match (&operand.kind, op) {
                        // `typeof undeclared` is "undefined" rather than an error.
                        (ExprKind::Ident(name), UnaryOp::Typeof) => {
                            self.lookup(act, name).unwrap_or(Value::Undefined)
                        }
                        _ => self.eval_expr(act, operand).await?,
                    };
                    ops::unary(*op, &value)?
                }
                ExprKind::Binary { op, left, right } => {
                    let left = self.eval_expr(act, left).await?;
                    let right = self.eval_expr(act, right).await?;
                    ops::binary(*op, &left, &right)?
                }
                ExprKind::Logical { op, left, right } => {
                    let left = self.eval_expr(act, left).await?;
                    let short_circuit = match op {
                        LogicalOp::And => !left.is_truthy(),
                        LogicalOp::Or => left.is_truthy(),
                    };
                    if short_circuit {
                        left
                    } else {
                        self.eval_expr(act, right).await?
                    }
                }
                ExprKind::Assign { target, op, value } => {
                    let rhs = self.eval_expr(act, value).await?;
                    let value = match op.binary() {
                        Some(binary) => ops::binary(binary, &self.lookup(act, target)?, &rhs)?,
                        None => rhs,
                    };
                    self.assign(act, target, value.clone())?;
                    value
                }
                ExprKind::Update {
                    target,
                    increment,
                    prefix,
                } => {
                    let old = self.lookup(act, target)?.to_number();
                    let new = if *increment { old + 1.0 } else { old - 1.0 };
                    self.assign(act, target, Value::Number(new))?;
                    Value::Number(if *prefix { new } else { old })
                }
                ExprKind::Call { callee, args } => {
                    let callee = self.eval_expr(act, callee).await?;
                    let mut values = Vec::with_capacity(args.len());
                    for arg in args {
                        values.push(self.eval_expr(act, arg).await?);
                    }
                    self.call_value(callee, values, Caller::of(act)).await?
                }
            })
        }
        .boxed_local()
    }

    // ========================================================================
    // Bindings
    // ========================================================================

    fn lookup(&self, act: &Activation, name: &str) -> Result<Value> {
        if let Some(value) = act.locals.as_ref().and_then(|locals| locals.get(name)) {
            return Ok(value.clone());
        }
        self.global(act.scope, name)
    }

    fn declare(&self, act: &mut Activation, name: &Rc<str>, value: Value) -> Result<()> {
        match &mut act.locals {
            Some(locals) => {
                locals.insert(Rc::clone(name), value);
                Ok(())
            }
            None => self.set_global(act.scope, name, value),
        }
    }

    /// Assign to a local if one exists, else to a global.
    fn assign(&self, act: &mut Activation, name: &Rc<str>, value: Value) -> Result<()> {
        if let Some(slot) = act.locals.as_mut().and_then(|locals| locals.get_mut(name)) {
            *slot = value;
            return Ok(());
        }
        self.set_global(act.scope, name, value)
    }
}

async fn resume(suspension: Option<Suspension>) {
    if let Some(suspension) = suspension {
        suspension.await;
    }
}
