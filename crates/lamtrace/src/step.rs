//! Statement boundary instrumentation.

use lamtrace_host::FrameId;
use lamtrace_script::SourceLocation;
use tracing::debug;

use crate::frame::{FrameInfo, FrameKind};
use crate::metrics::{self, SuppressReason};
use crate::session::{Emission, TraceSession};

impl TraceSession {
    /// Build the step event for a boundary reached in `frame`.
    ///
    /// The first boundary of a fresh frame that sits at its entry location is
    /// dispatched without a line, since the call line already carries it.
    pub fn step(
        &mut self,
        frame: FrameId,
        location: &SourceLocation,
        reentrant: bool,
    ) -> Option<Emission> {
        if !self.settings.trace_steps {
            return None;
        }
        let Some(active) = self.frames.get_mut(&frame) else {
            debug!(%frame, %location, "step in unknown frame ignored");
            metrics::record_suppressed(SuppressReason::UnknownFrame);
            return None;
        };
        if !active.emitted {
            return None;
        }
        if reentrant {
            metrics::record_suppressed(SuppressReason::Reentrant);
            return None;
        }

        let at_entry = active.fresh && active.location == *location;
        active.fresh = false;
        let depth = active.depth;

        let line = (!at_entry).then(|| format!("{}{location}", self.settings.label));
        let info = FrameInfo {
            kind: FrameKind::Step,
            depth,
            display_name: None,
            location: location.clone(),
            arguments: None,
            return_value: None,
            prefix: self.settings.label.clone(),
            frame,
        };
        Some(self.emission(info, line))
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use lamtrace_host::{CallSite, EventLoop, Scheduler, ScopeId};
    use lamtrace_script::Pos;
    use lamtrace_value::FunctionId;

    use super::*;
    use crate::config::TraceConfig;

    fn enter(session: &mut TraceSession, frame: u64, parent: Option<u64>, entry: &SourceLocation) {
        let site = CallSite {
            frame: FrameId(frame),
            parent: parent.map(FrameId),
            scope: ScopeId(0),
            function: FunctionId(0),
            name: Some("foo"),
            entry,
            arguments: &[],
        };
        session.enter_frame(&site, None, false);
    }

    fn session(config: &TraceConfig) -> TraceSession {
        let scheduler: Rc<dyn Scheduler> = EventLoop::new().scheduler();
        TraceSession::new(1, config, &scheduler)
    }

    #[test]
    fn test_steps_disabled() {
        let entry = SourceLocation::new("file.js", Pos::new(3, 3));
        let mut session = session(&TraceConfig::new());
        enter(&mut session, 0, None, &entry);
        assert!(session.step(FrameId(0), &entry, false).is_none());
    }

    #[test]
    fn test_entry_step_has_no_line() {
        let entry = SourceLocation::new("file.js", Pos::new(3, 3));
        let next = SourceLocation::new("file.js", Pos::new(4, 3));
        let mut session = session(&TraceConfig::new().with_prefix("p").with_trace_steps(true));
        enter(&mut session, 0, None, &entry);

        let first = session.step(FrameId(0), &entry, false).unwrap();
        assert_eq!(first.line, None);
        assert_eq!(first.info.kind, FrameKind::Step);
        assert_eq!(first.info.depth, 0);

        let second = session.step(FrameId(0), &next, false).unwrap();
        assert_eq!(second.line.as_deref(), Some("p: file.js:4:3"));

        // Revisiting the entry location later is an ordinary step.
        let again = session.step(FrameId(0), &entry, false).unwrap();
        assert_eq!(again.line.as_deref(), Some("p: file.js:3:3"));
    }

    #[test]
    fn test_step_depth_is_frame_depth() {
        let entry = SourceLocation::new("file.js", Pos::new(3, 3));
        let inner = SourceLocation::new("file.js", Pos::new(9, 5));
        let mut session = session(&TraceConfig::new().with_trace_steps(true));
        enter(&mut session, 0, None, &entry);
        enter(&mut session, 1, Some(0), &entry);
        let step = session.step(FrameId(1), &inner, false).unwrap();
        assert_eq!(step.info.depth, 1);
        assert_eq!(step.line.as_deref(), Some("file.js:9:5"));
    }

    #[test]
    fn test_suppressed_steps() {
        let entry = SourceLocation::new("file.js", Pos::new(3, 3));
        let mut session = session(
            &TraceConfig::new()
                .with_trace_steps(true)
                .with_filter_frame_source_url("other"),
        );
        enter(&mut session, 0, None, &entry);
        assert!(session.step(FrameId(0), &entry, false).is_none());
        assert!(session.step(FrameId(7), &entry, false).is_none());
    }
}
