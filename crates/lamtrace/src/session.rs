//! Per-session tracing state.

use std::rc::Rc;

use lamtrace_host::{FrameId, Scheduler};
use lamtrace_script::SourceLocation;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::config::{TraceConfig, TraceTarget};
use crate::frame::FrameInfo;
use crate::logger::Logger;
use crate::pause::PauseScheduler;

/// Resolved, immutable session options.
#[derive(Debug)]
pub struct Settings {
    pub target: TraceTarget,
    /// `"<prefix>: "` or empty.
    pub label: String,
    pub trace_values: bool,
    pub trace_function_return: bool,
    pub trace_steps: bool,
    pub filter: Option<String>,
}

/// A frame the session has seen enter and not yet exit.
#[derive(Debug)]
pub struct ActiveFrame {
    /// Number of counted frames in its call chain outside this one.
    pub depth: usize,
    /// Frames outside the target scope are tracked only to carry depth
    /// through to the frames they call.
    pub counted: bool,
    /// `"λ <name>"`.
    pub display_name: String,
    /// Entry location.
    pub location: SourceLocation,
    /// Whether the entry was emitted; suppressed frames emit nothing.
    pub emitted: bool,
    /// No step has been reported in this frame yet.
    pub fresh: bool,
}

/// An event ready to be dispatched and logged, built while the session is
/// borrowed and emitted after the borrow is released.
pub struct Emission {
    pub info: FrameInfo,
    pub line: Option<String>,
    pub logger: Logger,
    pub pause: Option<PauseScheduler>,
}

/// State of one `start_tracing`..`stop_tracing` interval.
pub struct TraceSession {
    pub id: u64,
    pub settings: Rc<Settings>,
    pub logger: Logger,
    pub pause: Option<PauseScheduler>,
    /// Active frames of every task, keyed by activation.
    pub frames: FxHashMap<FrameId, ActiveFrame>,
}

impl TraceSession {
    pub fn new(id: u64, config: &TraceConfig, scheduler: &Rc<dyn Scheduler>) -> Self {
        let settings = Settings {
            target: config.target,
            label: config.label(),
            trace_values: config.trace_values,
            trace_function_return: config.trace_function_return,
            trace_steps: config.trace_steps,
            filter: config.filter_frame_source_url.clone(),
        };
        Self {
            id,
            settings: Rc::new(settings),
            logger: Logger::new(config.logging_method.clone()),
            pause: config
                .pause_delay()
                .map(|delay| PauseScheduler::new(Rc::clone(scheduler), delay)),
            frames: FxHashMap::default(),
        }
    }

    /// Number of active counted frames across all tasks.
    pub fn depth(&self) -> usize {
        self.frames.values().filter(|frame| frame.counted).count()
    }

    /// Depth of a frame called from `parent`. Calls from frames this session
    /// never saw enter start at 0.
    pub fn depth_below(&self, parent: Option<FrameId>) -> usize {
        parent
            .and_then(|parent| self.frames.get(&parent))
            .map_or(0, |parent| parent.depth + usize::from(parent.counted))
    }

    /// Whether `frame` is active and was emitted on entry.
    pub fn is_emitted(&self, frame: FrameId) -> bool {
        self.frames.get(&frame).is_some_and(|active| active.emitted)
    }

    /// Forget a frame that will never exit.
    pub fn abandon_frame(&mut self, frame: FrameId) {
        if self.frames.remove(&frame).is_some() {
            debug!(%frame, "abandoned frame dropped");
        }
    }

    pub fn emission(&self, info: FrameInfo, line: Option<String>) -> Emission {
        Emission {
            info,
            line,
            logger: self.logger.clone(),
            pause: self.pause.clone(),
        }
    }
}
