//! Per-event pauses.
//!
//! A pause holds traced code without blocking the thread: the hook hands a
//! [`Pause`] future back to the interpreter, which awaits it before running
//! further script code. The event loop keeps polling other tasks meanwhile.

use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use lamtrace_host::Scheduler;

use crate::metrics;

/// Creates pauses of a fixed delay on a host scheduler.
#[derive(Clone)]
pub struct PauseScheduler {
    scheduler: Rc<dyn Scheduler>,
    delay: Duration,
}

impl PauseScheduler {
    pub fn new(scheduler: Rc<dyn Scheduler>, delay: Duration) -> Self {
        Self { scheduler, delay }
    }

    /// A pause ending `delay` from now.
    pub fn suspend(&self) -> Pause {
        metrics::record_pause(self.delay);
        Pause {
            scheduler: Rc::clone(&self.scheduler),
            deadline: self.scheduler.now() + self.delay,
            registered: false,
        }
    }
}

/// Future that completes once its deadline has passed.
///
/// The first poll always registers a wakeup and yields, even for a zero
/// delay, so a pause always gives the event loop a turn.
pub struct Pause {
    scheduler: Rc<dyn Scheduler>,
    deadline: Instant,
    registered: bool,
}

impl Future for Pause {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.registered && self.scheduler.now() >= self.deadline {
            return Poll::Ready(());
        }
        self.scheduler.wake_at(self.deadline, cx.waker().clone());
        self.registered = true;
        Poll::Pending
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use futures::FutureExt;
    use lamtrace_host::{EventLoop, poll_once};

    use super::*;

    #[test]
    fn test_zero_pause_yields_once() {
        let event_loop = EventLoop::new();
        let pauses = PauseScheduler::new(event_loop.scheduler(), Duration::ZERO);
        let done = Rc::new(Cell::new(false));
        let flag = Rc::clone(&done);
        let pause = pauses.suspend();
        event_loop.spawn(async move {
            pause.await;
            flag.set(true);
        });

        assert!(event_loop.run_once());
        assert!(!done.get());
        event_loop.run_until_idle();
        assert!(done.get());
    }

    #[test]
    fn test_pause_waits_for_deadline() {
        let event_loop = EventLoop::new();
        let pauses = PauseScheduler::new(event_loop.scheduler(), Duration::from_millis(20));
        let started = Instant::now();
        let result = event_loop.block_on(pauses.suspend());
        assert_eq!(result, Some(()));
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_first_poll_registers_timer() {
        let event_loop = EventLoop::new();
        let pauses = PauseScheduler::new(event_loop.scheduler(), Duration::ZERO);
        assert!(poll_once(pauses.suspend().boxed_local()).is_pending());
        assert_eq!(event_loop.timers().len(), 1);
    }
}
