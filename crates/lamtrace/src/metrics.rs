//! Tracer metrics using metrics-rs.
//!
//! The tracer records through the `metrics` facade; nothing is collected
//! unless a recorder is installed. The binary installs [`CliRecorder`] for
//! `--metrics` and prints its summary on exit.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use metrics::{
    Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit, counter,
    describe_counter, describe_gauge, describe_histogram, gauge, histogram,
};
use parking_lot::RwLock;

use crate::frame::FrameKind;

/// Why an event was not emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressReason {
    /// Frame source URL did not match the filter.
    Filtered,
    /// Produced while listeners were being dispatched.
    Reentrant,
    /// Session state was already borrowed.
    Busy,
    /// Frame entered outside the current session.
    UnknownFrame,
}

impl SuppressReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Filtered => "filtered",
            Self::Reentrant => "reentrant",
            Self::Busy => "busy",
            Self::UnknownFrame => "unknown_frame",
        }
    }
}

// ============================================================================
// Metric descriptions
// ============================================================================

/// Initialize metric descriptions.
///
/// Call this once at startup to register metric descriptions.
pub fn init() {
    describe_counter!(
        "lamtrace_events_emitted_total",
        Unit::Count,
        "Trace events dispatched to listeners"
    );
    describe_counter!(
        "lamtrace_events_suppressed_total",
        Unit::Count,
        "Trace events dropped before dispatch"
    );
    describe_counter!(
        "lamtrace_listener_errors_total",
        Unit::Count,
        "Listener callbacks that failed or panicked"
    );
    describe_counter!(
        "lamtrace_pauses_total",
        Unit::Count,
        "Pauses handed to the interpreter"
    );

    describe_gauge!(
        "lamtrace_session_active",
        Unit::Count,
        "1 while a tracing session is active"
    );

    describe_histogram!(
        "lamtrace_pause_delay_seconds",
        Unit::Seconds,
        "Requested pause delay"
    );
    describe_histogram!(
        "lamtrace_run_duration_seconds",
        Unit::Seconds,
        "Wall-clock time of a traced run"
    );
}

// ============================================================================
// Metric recording functions
// ============================================================================

pub fn record_emitted(kind: FrameKind) {
    counter!("lamtrace_events_emitted_total", "kind" => kind.as_str()).increment(1);
}

pub fn record_suppressed(reason: SuppressReason) {
    counter!("lamtrace_events_suppressed_total", "reason" => reason.as_str()).increment(1);
}

pub fn record_listener_errors(count: usize) {
    counter!("lamtrace_listener_errors_total").increment(count as u64);
}

pub fn record_pause(delay: Duration) {
    counter!("lamtrace_pauses_total").increment(1);
    histogram!("lamtrace_pause_delay_seconds").record(delay.as_secs_f64());
}

pub fn record_session(active: bool) {
    gauge!("lamtrace_session_active").set(if active { 1.0 } else { 0.0 });
}

/// Record the duration of a traced run of `script`.
pub fn record_run(script: &str, elapsed: Duration) {
    let labels = [("script", script.to_string())];
    histogram!("lamtrace_run_duration_seconds", &labels).record(elapsed.as_secs_f64());
}

// ============================================================================
// CLI Recorder for terminal output
// ============================================================================

#[derive(Default)]
struct CounterStorage {
    values: RwLock<HashMap<String, u64>>,
}

#[derive(Default)]
struct GaugeStorage {
    values: RwLock<HashMap<String, f64>>,
}

#[derive(Default)]
struct HistogramStorage {
    values: RwLock<HashMap<String, Vec<f64>>>,
}

struct CliCounter {
    key: String,
    storage: Arc<CounterStorage>,
}

impl metrics::CounterFn for CliCounter {
    fn increment(&self, value: u64) {
        let mut values = self.storage.values.write();
        *values.entry(self.key.clone()).or_insert(0) += value;
    }

    fn absolute(&self, value: u64) {
        let mut values = self.storage.values.write();
        values.insert(self.key.clone(), value);
    }
}

struct CliGauge {
    key: String,
    storage: Arc<GaugeStorage>,
}

impl metrics::GaugeFn for CliGauge {
    fn increment(&self, value: f64) {
        let mut values = self.storage.values.write();
        *values.entry(self.key.clone()).or_insert(0.0) += value;
    }

    fn decrement(&self, value: f64) {
        let mut values = self.storage.values.write();
        *values.entry(self.key.clone()).or_insert(0.0) -= value;
    }

    fn set(&self, value: f64) {
        let mut values = self.storage.values.write();
        values.insert(self.key.clone(), value);
    }
}

struct CliHistogram {
    key: String,
    storage: Arc<HistogramStorage>,
}

impl metrics::HistogramFn for CliHistogram {
    fn record(&self, value: f64) {
        let mut values = self.storage.values.write();
        values.entry(self.key.clone()).or_default().push(value);
    }
}

/// In-memory recorder for terminal output.
pub struct CliRecorder {
    counters: Arc<CounterStorage>,
    gauges: Arc<GaugeStorage>,
    histograms: Arc<HistogramStorage>,
}

impl CliRecorder {
    pub fn new() -> Self {
        Self {
            counters: Arc::new(CounterStorage::default()),
            gauges: Arc::new(GaugeStorage::default()),
            histograms: Arc::new(HistogramStorage::default()),
        }
    }

    /// Handle reading this recorder's storage.
    pub fn handle(&self) -> CliRecorderHandle {
        CliRecorderHandle {
            counters: Arc::clone(&self.counters),
            gauges: Arc::clone(&self.gauges),
            histograms: Arc::clone(&self.histograms),
        }
    }

    /// Install this recorder as the global metrics recorder.
    ///
    /// Returns `None` if a global recorder is already installed.
    pub fn install(self) -> Option<CliRecorderHandle> {
        let handle = self.handle();
        metrics::set_global_recorder(self).ok()?;
        Some(handle)
    }
}

impl Default for CliRecorder {
    fn default() -> Self {
        Self::new()
    }
}

fn key_to_string(key: &Key) -> String {
    let name = key.name();
    let labels = key.labels();
    if labels.len() == 0 {
        name.to_string()
    } else {
        let label_str: Vec<String> = labels
            .map(|l| format!("{}={}", l.key(), l.value()))
            .collect();
        format!("{}{{{}}}", name, label_str.join(","))
    }
}

impl Recorder for CliRecorder {
    fn describe_counter(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}
    fn describe_gauge(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}
    fn describe_histogram(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn register_counter(&self, key: &Key, _metadata: &Metadata<'_>) -> Counter {
        Counter::from_arc(Arc::new(CliCounter {
            key: key_to_string(key),
            storage: Arc::clone(&self.counters),
        }))
    }

    fn register_gauge(&self, key: &Key, _metadata: &Metadata<'_>) -> Gauge {
        Gauge::from_arc(Arc::new(CliGauge {
            key: key_to_string(key),
            storage: Arc::clone(&self.gauges),
        }))
    }

    fn register_histogram(&self, key: &Key, _metadata: &Metadata<'_>) -> Histogram {
        Histogram::from_arc(Arc::new(CliHistogram {
            key: key_to_string(key),
            storage: Arc::clone(&self.histograms),
        }))
    }
}

/// Handle for reading metrics back after installing the CLI recorder.
pub struct CliRecorderHandle {
    counters: Arc<CounterStorage>,
    gauges: Arc<GaugeStorage>,
    histograms: Arc<HistogramStorage>,
}

impl CliRecorderHandle {
    pub fn get_counter(&self, key: &str) -> Option<u64> {
        self.counters.values.read().get(key).copied()
    }

    pub fn get_gauge(&self, key: &str) -> Option<f64> {
        self.gauges.values.read().get(key).copied()
    }

    pub fn get_histogram(&self, key: &str) -> Option<Vec<f64>> {
        self.histograms.values.read().get(key).cloned()
    }

    /// Print all collected metrics to stderr.
    ///
    /// Stdout carries the trace itself, so the summary goes to stderr.
    pub fn print_summary(&self) {
        let counters = self.counters.values.read();
        let gauges = self.gauges.values.read();
        let histograms = self.histograms.values.read();

        if counters.is_empty() && gauges.is_empty() && histograms.is_empty() {
            eprintln!("No metrics collected.");
            return;
        }

        eprintln!();
        eprintln!("## Metrics Summary");
        eprintln!();

        if !counters.is_empty() {
            eprintln!("### Counters");
            let mut keys: Vec<_> = counters.keys().collect();
            keys.sort();
            for key in keys {
                if let Some(value) = counters.get(key) {
                    eprintln!("  {key}: {value}");
                }
            }
            eprintln!();
        }

        if !gauges.is_empty() {
            eprintln!("### Gauges");
            let mut keys: Vec<_> = gauges.keys().collect();
            keys.sort();
            for key in keys {
                if let Some(value) = gauges.get(key) {
                    eprintln!("  {key}: {value:.6}");
                }
            }
            eprintln!();
        }

        if !histograms.is_empty() {
            eprintln!("### Histograms");
            let mut keys: Vec<_> = histograms.keys().collect();
            keys.sort();
            for key in keys {
                let Some(values) = histograms.get(key).filter(|v| !v.is_empty()) else {
                    continue;
                };
                let min = values.iter().copied().fold(f64::INFINITY, f64::min);
                let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let sum: f64 = values.iter().sum();
                #[allow(clippy::cast_precision_loss)]
                let avg = sum / values.len() as f64;
                eprintln!(
                    "  {key}: count={}, min={min:.6}, max={max:.6}, avg={avg:.6}",
                    values.len()
                );
            }
            eprintln!();
        }
    }
}
