//! Deferred diagnostic trace for one authentication attempt.
//!
//! Lines are buffered in memory and only reported if the attempt is marked as
//! failed. The report is emitted when the last handle to the log is dropped,
//! so every exit path from an attempt gets the same teardown.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Local;

use crate::config::StaticConfig;

/// How much of a failed attempt's trace is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// The line captured at failure time plus a count of elided lines.
    #[default]
    Summary,
    /// Every buffered line, in order.
    FullTrace,
}

/// Report handed to a [`LogSink`] when a failed attempt is flushed.
#[derive(Debug, Clone, Copy)]
pub struct FailureReport<'a> {
    /// All buffered lines, oldest first.
    pub lines: &'a [String],
    /// Line captured when the failure was marked.
    pub summary: Option<&'a str>,
    /// Requested verbosity.
    pub verbosity: Verbosity,
}

impl FailureReport<'_> {
    /// Renders the report according to its verbosity.
    #[must_use]
    pub fn rendered(&self) -> Vec<String> {
        match self.verbosity {
            Verbosity::FullTrace => self.lines.to_vec(),
            Verbosity::Summary => {
                let Some(summary) = self.summary else {
                    return self.lines.to_vec();
                };
                let elided = self.lines.len().saturating_sub(1);
                vec![
                    summary.to_string(),
                    format!(
                        "({elided} additional lines elided; set log_full_trace_on_failure for the full trace)"
                    ),
                ]
            }
        }
    }
}

/// Destination for failure reports.
pub trait LogSink: Send {
    /// Called for every appended line. Most sinks ignore it.
    fn append(&self, _line: &str) {}

    /// Emits the report of a failed attempt.
    fn flush(&self, report: &FailureReport<'_>);
}

/// Reports failures on the host's `tracing` subscriber at WARN level.
#[derive(Debug, Default, Clone, Copy)]
pub struct FaultChannelSink;

impl LogSink for FaultChannelSink {
    fn flush(&self, report: &FailureReport<'_>) {
        for line in report.rendered() {
            tracing::warn!(target: "xoauth2", "{line}");
        }
    }
}

/// Writes failure reports to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

impl LogSink for ConsoleSink {
    fn flush(&self, report: &FailureReport<'_>) {
        for line in report.rendered() {
            eprintln!("{line}");
        }
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl LogSink for NullSink {
    fn flush(&self, _report: &FailureReport<'_>) {}
}

/// Keeps flushed lines in memory where tests can inspect them.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    flushed: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns everything flushed so far.
    #[must_use]
    pub fn flushed(&self) -> Vec<String> {
        self.flushed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl LogSink for MemorySink {
    fn flush(&self, report: &FailureReport<'_>) {
        self.flushed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(report.rendered());
    }
}

struct Trace {
    lines: Vec<String>,
    summary: Option<String>,
    marked: bool,
    flush_marked: bool,
    verbosity: Verbosity,
    sink: Box<dyn LogSink>,
}

impl Trace {
    fn emit(&mut self) {
        let report = FailureReport {
            lines: &self.lines,
            summary: self.summary.as_deref(),
            verbosity: self.verbosity,
        };
        self.sink.flush(&report);
        self.flush_marked = false;
    }
}

impl Drop for Trace {
    fn drop(&mut self) {
        if self.flush_marked {
            self.emit();
        }
    }
}

/// Shared handle to the diagnostic trace of one attempt.
///
/// Cloning the handle shares the buffer; the report (if marked) is emitted
/// when the last clone is dropped.
#[derive(Clone)]
pub struct DiagnosticLog {
    inner: Arc<Mutex<Trace>>,
}

impl std::fmt::Debug for DiagnosticLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let trace = self.lock();
        f.debug_struct("DiagnosticLog")
            .field("lines", &trace.lines.len())
            .field("flush_marked", &trace.flush_marked)
            .field("verbosity", &trace.verbosity)
            .finish_non_exhaustive()
    }
}

impl DiagnosticLog {
    /// Creates an empty log reporting to `sink`.
    #[must_use]
    pub fn new(sink: impl LogSink + 'static, verbosity: Verbosity) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Trace {
                lines: Vec::new(),
                summary: None,
                marked: false,
                flush_marked: false,
                verbosity,
                sink: Box::new(sink),
            })),
        }
    }

    /// Creates a log that reports nowhere.
    #[must_use]
    pub fn null() -> Self {
        Self::new(NullSink, Verbosity::Summary)
    }

    /// Creates the log a session uses under `config`.
    #[must_use]
    pub fn from_config(config: &StaticConfig) -> Self {
        if config.log_to_syslog_on_failure {
            Self::new(FaultChannelSink, config.verbosity())
        } else {
            Self::new(NullSink, config.verbosity())
        }
    }

    fn lock(&self) -> MutexGuard<'_, Trace> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Buffers a timestamped line.
    pub fn append(&self, line: impl AsRef<str>) {
        let line = line.as_ref();
        tracing::trace!(target: "xoauth2::diag", "{line}");

        let stamped = format!("{}: {line}", Local::now().format("%Y-%m-%d %H:%M:%S"));
        let mut trace = self.lock();
        trace.sink.append(&stamped);
        trace.lines.push(stamped);
    }

    /// Marks the attempt as failed, capturing the latest line as summary.
    ///
    /// Only the first call has any effect.
    pub fn mark_failure_flush(&self) {
        let mut trace = self.lock();
        if trace.marked {
            return;
        }
        trace.marked = true;
        trace.summary = trace.lines.last().cloned();
        trace.flush_marked = true;
    }

    /// Returns true if the trace will be reported on teardown.
    #[must_use]
    pub fn is_flush_marked(&self) -> bool {
        self.lock().flush_marked
    }

    /// Returns the summary captured when the failure was marked.
    #[must_use]
    pub fn summary(&self) -> Option<String> {
        self.lock().summary.clone()
    }

    /// Returns a copy of all buffered lines.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lock().lines.clone()
    }

    /// Reports the trace immediately, regardless of marking.
    ///
    /// A marked trace is not reported a second time on teardown.
    pub fn flush(&self) {
        self.lock().emit();
    }
}
