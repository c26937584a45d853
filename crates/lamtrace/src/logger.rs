//! Text output for trace lines.

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

/// First line written by a session with a sink.
pub const HEADER: &str = "Start tracing JavaScript\n";

/// Destination for trace lines.
///
/// Lines are passed without a trailing newline, except [`HEADER`]. Any
/// `Fn(&str)` closure is a sink.
pub trait LogSink {
    fn write(&self, line: &str);
}

impl<F: Fn(&str)> LogSink for F {
    fn write(&self, line: &str) {
        self(line);
    }
}

/// Writes each line to stdout, terminated by a newline.
#[derive(Clone, Copy, Debug, Default)]
pub struct StdoutSink;

impl LogSink for StdoutSink {
    fn write(&self, line: &str) {
        let mut out = std::io::stdout().lock();
        let _ = if line.ends_with('\n') {
            out.write_all(line.as_bytes())
        } else {
            writeln!(out, "{line}")
        };
    }
}

/// Collects lines in memory. Clones share the same buffer.
#[derive(Clone, Debug, Default)]
pub struct LineBuffer {
    lines: Rc<RefCell<Vec<String>>>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the collected lines.
    pub fn lines(&self) -> Vec<String> {
        self.lines.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.lines.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.lines.borrow_mut().clear();
    }
}

impl LogSink for LineBuffer {
    fn write(&self, line: &str) {
        self.lines.borrow_mut().push(line.to_string());
    }
}

/// A session's handle on its sink. Writes are dropped when no sink is set.
#[derive(Clone, Default)]
pub struct Logger {
    sink: Option<Rc<dyn LogSink>>,
}

impl Logger {
    pub fn new(sink: Option<Rc<dyn LogSink>>) -> Self {
        Self { sink }
    }

    pub const fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    pub fn write(&self, line: &str) {
        if let Some(sink) = &self.sink {
            sink.write(line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_buffer_shares_storage() {
        let buffer = LineBuffer::new();
        let logger = Logger::new(Some(Rc::new(buffer.clone())));
        logger.write(HEADER);
        logger.write("λ foo");
        assert_eq!(buffer.lines(), vec![HEADER.to_string(), "λ foo".to_string()]);
        buffer.clear();
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_disabled_logger() {
        let logger = Logger::default();
        assert!(!logger.is_enabled());
        logger.write("dropped");
    }

    #[test]
    fn test_closure_sink() {
        let seen = Rc::new(RefCell::new(String::new()));
        let out = Rc::clone(&seen);
        let logger = Logger::new(Some(Rc::new(move |line: &str| {
            out.borrow_mut().push_str(line);
        })));
        logger.write("a");
        logger.write("b");
        assert_eq!(*seen.borrow(), "ab");
    }
}
