//! Single-threaded event loop with deadline timers.
//!
//! Tasks are `!Send` futures. Wakers push task ids onto a ready queue; the
//! queue sits behind a `parking_lot::Mutex` because [`Waker`] must be
//! `Send + Sync` even though every task runs on the loop's thread.
//!
//! Timers live in a [`TimerQueue`], a min-heap ordered by deadline with an
//! insertion counter as tiebreak so equal deadlines fire in FIFO order.

use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};
use std::future::Future;
use std::rc::Rc;
use std::sync::Arc;
use std::task::{Context, Poll, Wake, Waker};
use std::time::Instant;

use futures::FutureExt;
use futures::future::LocalBoxFuture;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::trace;

/// Deadline-based wakeups.
pub trait Scheduler {
    /// Current time as seen by the scheduler.
    fn now(&self) -> Instant {
        Instant::now()
    }

    /// Wake `waker` once `deadline` has passed.
    fn wake_at(&self, deadline: Instant, waker: Waker);
}

// ============================================================================
// Timers
// ============================================================================

struct TimerEntry {
    deadline: Instant,
    generation: u64,
    waker: Waker,
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.generation == other.generation
    }
}

impl Eq for TimerEntry {}

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for a min-heap: earliest deadline first.
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.generation.cmp(&self.generation))
    }
}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Min-heap of pending timers.
#[derive(Default)]
pub struct TimerQueue {
    heap: RefCell<BinaryHeap<TimerEntry>>,
    next_generation: Cell<u64>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.heap.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.borrow().is_empty()
    }

    /// Earliest pending deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.heap.borrow().peek().map(|e| e.deadline)
    }

    /// Wake every timer whose deadline is `<= now`. Returns how many fired.
    pub fn fire_expired(&self, now: Instant) -> usize {
        let mut expired = Vec::new();
        {
            let mut heap = self.heap.borrow_mut();
            while heap.peek().is_some_and(|e| e.deadline <= now) {
                if let Some(entry) = heap.pop() {
                    expired.push(entry.waker);
                }
            }
        }
        let fired = expired.len();
        for waker in expired {
            waker.wake();
        }
        if fired > 0 {
            trace!(fired, "timers fired");
        }
        fired
    }
}

impl Scheduler for TimerQueue {
    fn wake_at(&self, deadline: Instant, waker: Waker) {
        let generation = self.next_generation.get();
        self.next_generation.set(generation + 1);
        self.heap.borrow_mut().push(TimerEntry {
            deadline,
            generation,
            waker,
        });
    }
}

// ============================================================================
// Tasks
// ============================================================================

/// Identifier of a spawned task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TaskId(pub u64);

/// Ready queue shared with wakers.
#[derive(Debug, Default)]
struct WakerState {
    ready: Mutex<VecDeque<TaskId>>,
}

impl WakerState {
    fn waker_for(self: &Arc<Self>, task: TaskId) -> Waker {
        Waker::from(Arc::new(TaskWaker {
            state: Arc::clone(self),
            task,
        }))
    }

    fn wake(&self, task: TaskId) {
        let mut ready = self.ready.lock();
        if !ready.contains(&task) {
            ready.push_back(task);
            trace!(task = task.0, "task woken");
        }
    }

    fn pop(&self) -> Option<TaskId> {
        self.ready.lock().pop_front()
    }
}

struct TaskWaker {
    state: Arc<WakerState>,
    task: TaskId,
}

impl Wake for TaskWaker {
    fn wake(self: Arc<Self>) {
        self.state.wake(self.task);
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.state.wake(self.task);
    }
}

/// Cooperative single-threaded executor.
pub struct EventLoop {
    tasks: RefCell<FxHashMap<TaskId, LocalBoxFuture<'static, ()>>>,
    ready: Arc<WakerState>,
    timers: Rc<TimerQueue>,
    next_task: Cell<u64>,
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLoop {
    pub fn new() -> Self {
        Self {
            tasks: RefCell::new(FxHashMap::default()),
            ready: Arc::new(WakerState::default()),
            timers: Rc::new(TimerQueue::new()),
            next_task: Cell::new(0),
        }
    }

    /// The loop's timer queue, usable as a [`Scheduler`].
    pub fn timers(&self) -> Rc<TimerQueue> {
        Rc::clone(&self.timers)
    }

    /// The loop's scheduler.
    pub fn scheduler(&self) -> Rc<dyn Scheduler> {
        self.timers()
    }

    /// Queue a future to run on the loop.
    pub fn spawn(&self, future: impl Future<Output = ()> + 'static) -> TaskId {
        let id = TaskId(self.next_task.get());
        self.next_task.set(id.0 + 1);
        self.tasks.borrow_mut().insert(id, future.boxed_local());
        self.ready.wake(id);
        id
    }

    /// Number of tasks that have not completed.
    pub fn pending_tasks(&self) -> usize {
        self.tasks.borrow().len()
    }

    /// Fire expired timers, then poll one ready task.
    ///
    /// When no task is ready the loop sleeps until the next timer deadline.
    /// Returns `false` once there is nothing left to poll or wait for.
    pub fn run_once(&self) -> bool {
        loop {
            self.timers.fire_expired(Instant::now());
            if let Some(id) = self.ready.pop() {
                if self.poll_task(id) {
                    return true;
                }
                continue;
            }
            let Some(deadline) = self.timers.next_deadline() else {
                return false;
            };
            let now = Instant::now();
            if deadline > now {
                trace!(wait = ?(deadline - now), "idle until next timer");
                std::thread::sleep(deadline - now);
            }
        }
    }

    /// Run until no task is ready and no timer is pending.
    pub fn run_until_idle(&self) {
        while self.run_once() {}
    }

    /// Run `future` to completion on the loop, along with any other tasks.
    ///
    /// Returns `None` if the loop goes idle before the future completes.
    pub fn block_on<T: 'static>(&self, future: impl Future<Output = T> + 'static) -> Option<T> {
        let slot = Rc::new(RefCell::new(None));
        let out = Rc::clone(&slot);
        self.spawn(async move {
            let value = future.await;
            *out.borrow_mut() = Some(value);
        });
        loop {
            if slot.borrow().is_some() {
                break;
            }
            if !self.run_once() {
                break;
            }
        }
        slot.borrow_mut().take()
    }

    /// Poll one task. Returns `false` if the id no longer names a task.
    fn poll_task(&self, id: TaskId) -> bool {
        // Removed while polling so the task can spawn without a borrow conflict.
        let Some(mut task) = self.tasks.borrow_mut().remove(&id) else {
            return false;
        };
        let waker = self.ready.waker_for(id);
        let mut cx = Context::from_waker(&waker);
        trace!(task = id.0, "poll");
        if task.as_mut().poll(&mut cx).is_pending() {
            self.tasks.borrow_mut().insert(id, task);
        }
        true
    }
}

/// Poll `future` once with a no-op waker.
pub fn poll_once<T>(mut future: LocalBoxFuture<'_, T>) -> Poll<T> {
    let mut cx = Context::from_waker(futures::task::noop_waker_ref());
    future.as_mut().poll(&mut cx)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    /// Future that registers a timer on first poll and completes after it.
    struct Sleep {
        deadline: Instant,
        timers: Rc<TimerQueue>,
        registered: bool,
    }

    impl Future for Sleep {
        type Output = ();

        fn poll(mut self: std::pin::Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
            if self.registered && Instant::now() >= self.deadline {
                return Poll::Ready(());
            }
            self.registered = true;
            self.timers.wake_at(self.deadline, cx.waker().clone());
            Poll::Pending
        }
    }

    fn sleep(event_loop: &EventLoop, ms: u64) -> Sleep {
        Sleep {
            deadline: Instant::now() + Duration::from_millis(ms),
            timers: event_loop.timers(),
            registered: false,
        }
    }

    #[test]
    fn test_tasks_run_in_spawn_order() {
        let event_loop = EventLoop::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        for i in 0..3 {
            let log = Rc::clone(&log);
            event_loop.spawn(async move { log.borrow_mut().push(i) });
        }
        event_loop.run_until_idle();
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
        assert_eq!(event_loop.pending_tasks(), 0);
    }

    #[test]
    fn test_timers_fire_in_deadline_order() {
        let event_loop = EventLoop::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        for (name, ms) in [("late", 20), ("early", 5), ("early-2", 5)] {
            let log = Rc::clone(&log);
            let wait = sleep(&event_loop, ms);
            event_loop.spawn(async move {
                wait.await;
                log.borrow_mut().push(name);
            });
        }
        event_loop.run_until_idle();
        assert_eq!(*log.borrow(), vec!["early", "early-2", "late"]);
        assert!(event_loop.timers().is_empty());
    }

    #[test]
    fn test_run_once_waits_for_timer() {
        let event_loop = EventLoop::new();
        let done = Rc::new(Cell::new(false));
        let flag = Rc::clone(&done);
        let wait = sleep(&event_loop, 30);
        let start = Instant::now();
        event_loop.spawn(async move {
            wait.await;
            flag.set(true);
        });

        assert!(event_loop.run_once());
        assert!(!done.get());
        assert_eq!(event_loop.timers().len(), 1);

        assert!(event_loop.run_once());
        assert!(done.get());
        assert!(start.elapsed() >= Duration::from_millis(30));
        assert!(!event_loop.run_once());
    }

    #[test]
    fn test_block_on() {
        let event_loop = EventLoop::new();
        let wait = sleep(&event_loop, 1);
        let value = event_loop.block_on(async move {
            wait.await;
            42
        });
        assert_eq!(value, Some(42));
        assert_eq!(event_loop.block_on(futures::future::pending::<()>()), None);
    }

    #[test]
    fn test_poll_once() {
        assert_eq!(poll_once(async { 1 }.boxed_local()), Poll::Ready(1));
        assert!(poll_once(futures::future::pending::<()>().boxed_local()).is_pending());
    }
}
