//! Listener registry and dispatch.
//!
//! Listeners are held weakly: the caller owns them and a dropped listener is
//! pruned on the next dispatch. Dispatch is synchronous, in registration
//! order, and runs inside a guarded region; the tracer drops every frame and
//! step event produced while the guard is held, so code run by a listener is
//! never traced.

use std::cell::{Cell, RefCell};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::{Rc, Weak};

use tracing::debug;

use crate::error::ListenerError;
use crate::frame::FrameInfo;

/// Outcome of a listener callback.
pub type ListenerResult = std::result::Result<(), Box<dyn std::error::Error>>;

/// Receives tracing events.
///
/// Both callbacks default to doing nothing.
pub trait TracingListener {
    /// Called with `true` when a session starts and `false` when it stops.
    fn on_tracing_toggled(&self, _active: bool) -> ListenerResult {
        Ok(())
    }

    /// Called for every emitted call, step and return event.
    fn on_tracing_frame(&self, _frame: &FrameInfo) -> ListenerResult {
        Ok(())
    }
}

/// Ordered set of weakly held listeners.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: RefCell<Vec<Weak<dyn TracingListener>>>,
    guard: Cell<u32>,
}

/// Keeps the registry's guarded region open until dropped.
pub struct DispatchGuard<'a> {
    registry: &'a ListenerRegistry,
}

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        self.registry.guard.set(self.registry.guard.get() - 1);
    }
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener`. Returns `false` if it was already registered.
    pub fn add<L: TracingListener + 'static>(&self, listener: &Rc<L>) -> bool {
        if self.position(listener).is_some() {
            return false;
        }
        let listener: Rc<dyn TracingListener> = listener.clone();
        self.listeners.borrow_mut().push(Rc::downgrade(&listener));
        true
    }

    /// Unregister `listener`. Returns `false` if it was not registered.
    pub fn remove<L: TracingListener + 'static>(&self, listener: &Rc<L>) -> bool {
        let Some(index) = self.position(listener) else {
            return false;
        };
        self.listeners.borrow_mut().remove(index);
        true
    }

    fn position<L: TracingListener + 'static>(&self, listener: &Rc<L>) -> Option<usize> {
        let target = Rc::as_ptr(listener);
        self.listeners
            .borrow()
            .iter()
            .position(|weak| std::ptr::addr_eq(weak.as_ptr(), target))
    }

    /// Number of live listeners.
    pub fn len(&self) -> usize {
        self.listeners
            .borrow()
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a guarded region is open.
    pub fn is_dispatching(&self) -> bool {
        self.guard.get() > 0
    }

    /// Open a guarded region. Regions nest.
    pub fn enter(&self) -> DispatchGuard<'_> {
        self.guard.set(self.guard.get() + 1);
        DispatchGuard { registry: self }
    }

    /// Notify every listener that tracing was switched on or off.
    pub fn dispatch_toggled(&self, active: bool) -> Vec<ListenerError> {
        self.dispatch("on_tracing_toggled", |listener| {
            listener.on_tracing_toggled(active)
        })
    }

    /// Deliver a frame event to every listener.
    pub fn dispatch_frame(&self, frame: &FrameInfo) -> Vec<ListenerError> {
        self.dispatch("on_tracing_frame", |listener| listener.on_tracing_frame(frame))
    }

    fn dispatch(
        &self,
        callback: &'static str,
        call: impl Fn(&dyn TracingListener) -> ListenerResult,
    ) -> Vec<ListenerError> {
        let _guard = self.enter();
        let mut errors = Vec::new();
        for listener in self.snapshot() {
            match catch_unwind(AssertUnwindSafe(|| call(listener.as_ref()))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => errors.push(ListenerError::Failed {
                    callback,
                    message: err.to_string(),
                }),
                Err(payload) => errors.push(ListenerError::Panicked {
                    callback,
                    message: panic_message(payload.as_ref()),
                }),
            }
        }
        errors
    }

    /// Live listeners in registration order. Dead entries are pruned.
    fn snapshot(&self) -> Vec<Rc<dyn TracingListener>> {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|weak| weak.strong_count() > 0);
        if listeners.len() < before {
            debug!(pruned = before - listeners.len(), "dropped dead tracing listeners");
        }
        listeners.iter().filter_map(Weak::upgrade).collect()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
