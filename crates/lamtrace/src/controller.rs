//! Tracer controller.
//!
//! [`Tracer`] owns at most one [`TraceSession`] and implements the host's
//! [`Instrumentation`] hooks on top of it. Hooks book-keep under a short
//! `try_borrow_mut` of the session and release it before any user code runs:
//! listeners, the log sink, the error handler and value formatting all run
//! with the session unborrowed and inside the listener guard.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use futures::FutureExt;
use lamtrace_host::{CallSite, FrameId, Instrumentation, Scheduler, Suspension};
use lamtrace_script::SourceLocation;
use lamtrace_value::{Value, format_arguments, format_value};
use tracing::{debug, info, warn};

use crate::config::TraceConfig;
use crate::error::{ListenerError, Result, TraceError};
use crate::listener::{ListenerRegistry, TracingListener};
use crate::logger::HEADER;
use crate::metrics::{self, SuppressReason};
use crate::session::{Emission, Settings, TraceSession};

/// Receives listener failures.
pub type ErrorHandler = Rc<dyn Fn(&TraceError)>;

/// Execution tracer. Install it on an interpreter with
/// `Interpreter::set_instrumentation`, then start and stop sessions.
pub struct Tracer {
    session: RefCell<Option<TraceSession>>,
    listeners: ListenerRegistry,
    scheduler: Rc<dyn Scheduler>,
    error_handler: RefCell<Option<ErrorHandler>>,
    next_session: Cell<u64>,
}

impl Tracer {
    /// Create an inactive tracer whose pauses are scheduled on `scheduler`.
    pub fn new(scheduler: Rc<dyn Scheduler>) -> Rc<Self> {
        Rc::new(Self {
            session: RefCell::new(None),
            listeners: ListenerRegistry::new(),
            scheduler,
            error_handler: RefCell::new(None),
            next_session: Cell::new(0),
        })
    }

    // ========================================================================
    // Sessions
    // ========================================================================

    /// Start a session.
    ///
    /// Listeners are notified with `on_tracing_toggled(true)`, then the header
    /// is written if `config` has a logging method.
    pub fn start_tracing(&self, config: TraceConfig) -> Result<()> {
        let Ok(mut slot) = self.session.try_borrow_mut() else {
            return Err(TraceError::AlreadyActive);
        };
        if slot.is_some() {
            return Err(TraceError::AlreadyActive);
        }
        config.validate()?;

        let id = self.next_session.get();
        self.next_session.set(id + 1);
        let session = TraceSession::new(id, &config, &self.scheduler);
        let logger = session.logger.clone();
        *slot = Some(session);
        drop(slot);

        info!(
            session = id,
            target = ?config.target,
            values = config.trace_values,
            returns = config.trace_function_return,
            steps = config.trace_steps,
            "tracing started"
        );
        metrics::record_session(true);

        let errors = self.listeners.dispatch_toggled(true);
        self.report(errors);
        if logger.is_enabled() {
            let _guard = self.listeners.enter();
            logger.write(HEADER);
        }
        Ok(())
    }

    /// Stop the active session, if any.
    ///
    /// Pauses already handed to the interpreter are not cancelled; the code
    /// they hold resumes untraced.
    pub fn stop_tracing(&self) {
        let session = match self.session.try_borrow_mut() {
            Ok(mut slot) => slot.take(),
            Err(_) => {
                warn!("tracing session busy, stop ignored");
                return;
            }
        };
        let Some(session) = session else {
            return;
        };

        info!(session = session.id, open_frames = session.depth(), "tracing stopped");
        metrics::record_session(false);
        drop(session);

        let errors = self.listeners.dispatch_toggled(false);
        self.report(errors);
    }

    pub fn is_active(&self) -> bool {
        self.session
            .try_borrow()
            .map_or(true, |session| session.is_some())
    }

    /// Number of traced frames active in the current session, across all
    /// tasks.
    pub fn depth(&self) -> usize {
        self.session
            .try_borrow()
            .ok()
            .and_then(|session| session.as_ref().map(TraceSession::depth))
            .unwrap_or(0)
    }

    // ========================================================================
    // Listeners
    // ========================================================================

    /// Register a listener. The tracer holds it weakly. Returns `false` if it
    /// was already registered.
    pub fn add_tracing_listener<L: TracingListener + 'static>(&self, listener: &Rc<L>) -> bool {
        self.listeners.add(listener)
    }

    /// Unregister a listener. Returns `false` if it was not registered.
    pub fn remove_tracing_listener<L: TracingListener + 'static>(&self, listener: &Rc<L>) -> bool {
        self.listeners.remove(listener)
    }

    /// Install the handler for listener failures.
    pub fn set_error_handler(&self, handler: impl Fn(&TraceError) + 'static) {
        *self.error_handler.borrow_mut() = Some(Rc::new(handler));
    }

    fn report(&self, errors: Vec<ListenerError>) {
        if errors.is_empty() {
            return;
        }
        metrics::record_listener_errors(errors.len());
        let handler = self.error_handler.borrow().clone();
        for error in errors {
            let error = TraceError::from(error);
            match &handler {
                Some(handler) => {
                    let _guard = self.listeners.enter();
                    handler(&error);
                }
                None => warn!(%error, "tracing listener error"),
            }
        }
    }

    // ========================================================================
    // Session access
    // ========================================================================

    /// Id and settings of the active session.
    fn current(&self) -> Option<(u64, Rc<Settings>)> {
        let Ok(session) = self.session.try_borrow() else {
            debug!("tracing session busy, event dropped");
            metrics::record_suppressed(SuppressReason::Busy);
            return None;
        };
        session
            .as_ref()
            .map(|session| (session.id, Rc::clone(&session.settings)))
    }

    /// Run `f` on session `id` if it is still the active one.
    fn with_session<T>(
        &self,
        id: u64,
        f: impl FnOnce(&mut TraceSession) -> Option<T>,
    ) -> Option<T> {
        let Ok(mut slot) = self.session.try_borrow_mut() else {
            debug!("tracing session busy, event dropped");
            metrics::record_suppressed(SuppressReason::Busy);
            return None;
        };
        let session = slot.as_mut().filter(|session| session.id == id)?;
        f(session)
    }

    /// Dispatch and log an event, then hand out its pause.
    fn emit(&self, emission: Emission) -> Option<Suspension> {
        let Emission {
            info,
            line,
            logger,
            pause,
        } = emission;
        {
            let _guard = self.listeners.enter();
            let errors = self.listeners.dispatch_frame(&info);
            self.report(errors);
            if let Some(line) = &line {
                logger.write(line);
            }
        }
        metrics::record_emitted(info.kind);
        pause.map(|pause| pause.suspend().boxed_local())
    }
}

impl Instrumentation for Tracer {
    fn enter_frame(&self, call: &CallSite<'_>) -> Option<Suspension> {
        let (id, settings) = self.current()?;
        if !settings.target.includes(call.scope) {
            return self.with_session(id, |session| {
                session.enter_untraced(call);
                None
            });
        }
        let reentrant = self.listeners.is_dispatching();
        let arguments = (settings.trace_values && !reentrant).then(|| {
            let _guard = self.listeners.enter();
            format_arguments(call.arguments)
        });
        let emission = self.with_session(id, |session| {
            session.enter_frame(call, arguments, reentrant)
        })?;
        self.emit(emission)
    }

    fn step(&self, frame: FrameId, location: &SourceLocation) -> Option<Suspension> {
        let (id, settings) = self.current()?;
        if !settings.trace_steps {
            return None;
        }
        let reentrant = self.listeners.is_dispatching();
        let emission = self.with_session(id, |session| session.step(frame, location, reentrant))?;
        self.emit(emission)
    }

    fn exit_frame(&self, frame: FrameId, value: &Value) -> Option<Suspension> {
        let (id, settings) = self.current()?;
        let reentrant = self.listeners.is_dispatching();
        let wanted = settings.trace_function_return
            && !reentrant
            && self
                .with_session(id, |session| Some(session.is_emitted(frame)))
                .unwrap_or(false);
        let formatted = wanted.then(|| {
            let _guard = self.listeners.enter();
            format_value(value)
        });
        let emission = self.with_session(id, |session| session.exit_frame(frame, formatted))?;
        self.emit(emission)
    }

    fn abandon_frame(&self, frame: FrameId) {
        let Some((id, _)) = self.current() else {
            return;
        };
        self.with_session(id, |session| {
            session.abandon_frame(frame);
            Some(())
        });
    }
}
