//! Frame entry and exit instrumentation.
//!
//! Entry records the frame whether or not it is emitted, so suppressed frames
//! still count towards the depth of the frames they call. A frame's depth is
//! fixed at entry from its parent, and exit reports that same depth. Frames of
//! interleaved tasks are independent: exiting one never touches another.

use std::fmt::Write;

use lamtrace_host::{CallSite, FrameId};
use lamtrace_script::SourceLocation;
use tracing::debug;

use crate::metrics::{self, SuppressReason};
use crate::session::{ActiveFrame, Emission, TraceSession};

/// Kind of a traced event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FrameKind {
    Call,
    Step,
    Return,
}

impl FrameKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Call => "call",
            Self::Step => "step",
            Self::Return => "return",
        }
    }
}

/// A traced event as delivered to listeners. Built per event, never retained.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameInfo {
    pub kind: FrameKind,
    /// Number of active frames in this frame's call chain outside it.
    pub depth: usize,
    /// `"λ <name>"`; absent for steps.
    pub display_name: Option<String>,
    /// Entry location for calls and returns, the boundary for steps.
    pub location: SourceLocation,
    /// Formatted arguments, with value tracing enabled.
    pub arguments: Option<String>,
    /// Formatted return value, for returns.
    pub return_value: Option<String>,
    /// Resolved label, `"<prefix>: "` or empty.
    pub prefix: String,
    pub frame: FrameId,
}

impl FrameInfo {
    pub fn is_return(&self) -> bool {
        self.kind == FrameKind::Return
    }
}

impl TraceSession {
    /// Book-keep a frame entry and build its call event.
    ///
    /// `arguments` is the formatted argument list when values are traced.
    /// Returns `None` when the frame is suppressed.
    pub fn enter_frame(
        &mut self,
        call: &CallSite<'_>,
        arguments: Option<String>,
        reentrant: bool,
    ) -> Option<Emission> {
        let settings = std::rc::Rc::clone(&self.settings);
        let depth = self.depth_below(call.parent);
        let display_name = format!("λ {}", call.name.unwrap_or("anonymous"));

        let filtered = settings
            .filter
            .as_deref()
            .is_some_and(|filter| !call.entry.url.contains(filter));
        let emitted = !filtered && !reentrant;

        self.frames.insert(
            call.frame,
            ActiveFrame {
                depth,
                counted: true,
                display_name: display_name.clone(),
                location: call.entry.clone(),
                emitted,
                fresh: true,
            },
        );

        if !emitted {
            let reason = if reentrant {
                SuppressReason::Reentrant
            } else {
                SuppressReason::Filtered
            };
            debug!(frame = %call.frame, depth, reason = reason.as_str(), "frame suppressed");
            metrics::record_suppressed(reason);
            return None;
        }

        let mut line = format!("{}{display_name}", settings.label);
        if let Some(arguments) = &arguments {
            let _ = write!(line, "({arguments})");
        }
        if settings.trace_steps {
            let _ = write!(line, " {}", call.entry);
        }

        let info = FrameInfo {
            kind: FrameKind::Call,
            depth,
            display_name: Some(display_name),
            location: call.entry.clone(),
            arguments,
            return_value: None,
            prefix: settings.label.clone(),
            frame: call.frame,
        };
        Some(self.emission(info, Some(line)))
    }

    /// Book-keep a frame outside the target scope. It emits nothing and
    /// passes its own depth on to the frames it calls.
    pub fn enter_untraced(&mut self, call: &CallSite<'_>) {
        let depth = self.depth_below(call.parent);
        self.frames.insert(
            call.frame,
            ActiveFrame {
                depth,
                counted: false,
                display_name: String::new(),
                location: call.entry.clone(),
                emitted: false,
                fresh: true,
            },
        );
    }

    /// Book-keep a frame exit and build its return event.
    ///
    /// `value` is the formatted return value when returns are traced.
    /// Exits of frames this session never saw enter are ignored.
    pub fn exit_frame(&mut self, frame: FrameId, value: Option<String>) -> Option<Emission> {
        let Some(active) = self.frames.remove(&frame) else {
            debug!(%frame, "exit of unknown frame ignored");
            return None;
        };
        let depth = active.depth;

        let value = value.filter(|_| active.emitted)?;
        let line = format!(
            "{}{} return {value}",
            self.settings.label, active.display_name
        );
        let info = FrameInfo {
            kind: FrameKind::Return,
            depth,
            display_name: Some(active.display_name),
            location: active.location,
            arguments: None,
            return_value: Some(value),
            prefix: self.settings.label.clone(),
            frame,
        };
        Some(self.emission(info, Some(line)))
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use lamtrace_host::{EventLoop, ScopeId, Scheduler};
    use lamtrace_script::Pos;
    use lamtrace_value::{FunctionId, Value};

    use super::*;
    use crate::config::TraceConfig;

    fn session(config: &TraceConfig) -> TraceSession {
        let scheduler: Rc<dyn Scheduler> = EventLoop::new().scheduler();
        TraceSession::new(1, config, &scheduler)
    }

    fn site<'a>(
        frame: u64,
        parent: Option<u64>,
        name: Option<&'a str>,
        entry: &'a SourceLocation,
        args: &'a [Value],
    ) -> CallSite<'a> {
        CallSite {
            frame: FrameId(frame),
            parent: parent.map(FrameId),
            scope: ScopeId(0),
            function: FunctionId(0),
            name,
            entry,
            arguments: args,
        }
    }

    #[test]
    fn test_call_line_formats() {
        let entry = SourceLocation::new("file.js", Pos::new(3, 3));
        let config = TraceConfig::new().with_prefix("p").with_trace_steps(true);
        let mut session = session(&config);

        let emission = session
            .enter_frame(&site(0, None, Some("foo"), &entry, &[]), Some("1, \"a\"".into()), false)
            .unwrap();
        assert_eq!(emission.line.as_deref(), Some("p: λ foo(1, \"a\") file.js:3:3"));
        assert_eq!(emission.info.depth, 0);
        assert_eq!(emission.info.prefix, "p: ");

        let emission = session
            .enter_frame(&site(1, Some(0), None, &entry, &[]), None, false)
            .unwrap();
        assert_eq!(emission.line.as_deref(), Some("p: λ anonymous file.js:3:3"));
        assert_eq!(emission.info.depth, 1);
    }

    #[test]
    fn test_suppressed_frames_keep_depth() {
        let first = SourceLocation::new("first.js", Pos::new(1, 1));
        let second = SourceLocation::new("second.js", Pos::new(1, 18));
        let config = TraceConfig::new().with_filter_frame_source_url("second");
        let mut session = session(&config);

        assert!(
            session
                .enter_frame(&site(0, None, Some("foo"), &first, &[]), None, false)
                .is_none()
        );
        let emission = session
            .enter_frame(&site(1, Some(0), Some("bar"), &second, &[]), None, false)
            .unwrap();
        assert_eq!(emission.info.depth, 1);
        assert!(
            session
                .enter_frame(&site(2, Some(1), Some("bar"), &second, &[]), None, true)
                .is_none()
        );
        assert_eq!(session.depth(), 3);
    }

    #[test]
    fn test_return_depth_matches_entry() {
        let entry = SourceLocation::new("file.js", Pos::new(1, 1));
        let mut session = session(&TraceConfig::new());
        session.enter_frame(&site(0, None, Some("foo"), &entry, &[]), None, false);
        session.enter_frame(&site(1, Some(0), Some("bar"), &entry, &[]), None, false);

        let emission = session.exit_frame(FrameId(1), Some("\"string\"".into())).unwrap();
        assert!(emission.info.is_return());
        assert_eq!(emission.info.depth, 1);
        assert_eq!(emission.line.as_deref(), Some("λ bar return \"string\""));

        assert!(session.exit_frame(FrameId(0), None).is_none());
        assert_eq!(session.depth(), 0);
        assert!(session.exit_frame(FrameId(9), Some("1".into())).is_none());
    }

    #[test]
    fn test_interleaved_frames_exit_independently() {
        let entry = SourceLocation::new("file.js", Pos::new(1, 1));
        let mut session = session(&TraceConfig::new());
        // Two tasks, each entering a top-level frame before the other exits.
        session.enter_frame(&site(0, None, Some("foo"), &entry, &[]), None, false);
        let bar = session
            .enter_frame(&site(1, None, Some("bar"), &entry, &[]), None, false)
            .unwrap();
        assert_eq!(bar.info.depth, 0);

        let foo = session.exit_frame(FrameId(0), Some("1".into())).unwrap();
        assert_eq!(foo.line.as_deref(), Some("λ foo return 1"));
        let bar = session.exit_frame(FrameId(1), Some("2".into())).unwrap();
        assert_eq!(bar.line.as_deref(), Some("λ bar return 2"));
        assert_eq!(bar.info.depth, 0);
        assert_eq!(session.depth(), 0);
    }

    #[test]
    fn test_untraced_frames_carry_depth() {
        let entry = SourceLocation::new("file.js", Pos::new(1, 1));
        let mut session = session(&TraceConfig::new());
        session.enter_frame(&site(0, None, Some("foo"), &entry, &[]), None, false);
        session.enter_untraced(&site(1, Some(0), Some("other"), &entry, &[]));
        let bar = session
            .enter_frame(&site(2, Some(1), Some("bar"), &entry, &[]), None, false)
            .unwrap();
        assert_eq!(bar.info.depth, 1);
        assert_eq!(session.depth(), 2);
        assert!(session.exit_frame(FrameId(1), Some("3".into())).is_none());
    }

    #[test]
    fn test_abandoned_frame_is_forgotten() {
        let entry = SourceLocation::new("file.js", Pos::new(1, 1));
        let mut session = session(&TraceConfig::new());
        session.enter_frame(&site(0, None, Some("outer"), &entry, &[]), None, false);
        session.abandon_frame(FrameId(0));
        assert_eq!(session.depth(), 0);
        assert!(session.exit_frame(FrameId(0), Some("1".into())).is_none());
        let next = session
            .enter_frame(&site(1, None, Some("next"), &entry, &[]), None, false)
            .unwrap();
        assert_eq!(next.info.depth, 0);
    }
}
