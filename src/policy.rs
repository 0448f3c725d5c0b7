//! Formatting policy: process-wide switches and report sinks.
//!
//! Formatting a [`Chain`](crate::Chain) with `Display` does two things by
//! default: it appends the resolved stack to the message, and it emits a
//! multi-line report to the log. Both are controlled by process-wide switches
//! (default on). [`Policy`] makes the same choices explicit for a single
//! render, with an injectable [`ReportSink`].
//!
//! ```rust
//! use errchain::{errorf, Policy};
//!
//! let err = errorf!("disk full");
//! let quiet = Policy::new().include_stack(false);
//! assert_eq!(err.display_with(quiet).to_string(), "disk full");
//! ```

use core::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

static INCLUDE_STACK: AtomicBool = AtomicBool::new(true);
static LOG_ON_FORMAT: AtomicBool = AtomicBool::new(true);
static SKIP_PAST_RUNTIME: AtomicBool = AtomicBool::new(true);

/// Set whether `Display` for a chain appends the resolved stack.
pub fn set_include_stack(enabled: bool) {
    INCLUDE_STACK.store(enabled, Ordering::Relaxed);
}

/// Whether `Display` for a chain appends the resolved stack. Default `true`.
pub fn include_stack() -> bool {
    INCLUDE_STACK.load(Ordering::Relaxed)
}

/// Set whether `Display` for a chain also emits its report to the log.
pub fn set_log_on_format(enabled: bool) {
    LOG_ON_FORMAT.store(enabled, Ordering::Relaxed);
}

/// Whether `Display` for a chain also emits its report to the log. Default `true`.
pub fn log_on_format() -> bool {
    LOG_ON_FORMAT.load(Ordering::Relaxed)
}

/// Set whether resolution stops at the runtime entry boundary.
///
/// Only affects chains resolved after the call; resolved frames are cached.
pub fn set_skip_past_runtime(enabled: bool) {
    SKIP_PAST_RUNTIME.store(enabled, Ordering::Relaxed);
}

/// Whether resolution stops at the runtime entry boundary. Default `true`.
pub fn skip_past_runtime() -> bool {
    SKIP_PAST_RUNTIME.load(Ordering::Relaxed)
}

// ============================================================================
// ReportSink
// ============================================================================

/// Destination for chain reports emitted while formatting.
///
/// Implemented for closures, so tests and callers can capture reports:
///
/// ```rust
/// use std::sync::Mutex;
/// use errchain::{errorf, Policy};
///
/// let seen = Mutex::new(Vec::new());
/// let sink = |report: &str| seen.lock().unwrap().push(report.to_owned());
///
/// let err = errorf!("timeout");
/// let _ = err.display_with(Policy::new().sink(&sink)).to_string();
/// assert!(seen.lock().unwrap()[0].starts_with("timeout\n"));
/// ```
pub trait ReportSink: Send + Sync {
    /// Receive one complete report.
    fn emit(&self, report: &str);
}

impl<F: Fn(&str) + Send + Sync> ReportSink for F {
    fn emit(&self, report: &str) {
        self(report)
    }
}

/// Sends reports to the `log` facade at `error` level, target `errchain`.
///
/// Without the `log` feature, reports are dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ReportSink for LogSink {
    #[cfg(feature = "log")]
    fn emit(&self, report: &str) {
        log::error!(target: "errchain", "{report}");
    }

    #[cfg(not(feature = "log"))]
    fn emit(&self, _report: &str) {}
}

// ============================================================================
// Policy
// ============================================================================

/// Rendering choices for one `display_with` call.
#[derive(Clone, Copy)]
pub struct Policy<'a> {
    include_stack: bool,
    sink: Option<&'a dyn ReportSink>,
}

impl<'a> Policy<'a> {
    /// Stack included, no report emitted.
    pub const fn new() -> Self {
        Self {
            include_stack: true,
            sink: None,
        }
    }

    /// Whether to append the resolved stack to the message.
    pub const fn include_stack(mut self, enabled: bool) -> Self {
        self.include_stack = enabled;
        self
    }

    /// Emit a report to `sink` each time the chain is rendered.
    pub fn sink(mut self, sink: &'a dyn ReportSink) -> Self {
        self.sink = Some(sink);
        self
    }

    pub(crate) fn stack_included(&self) -> bool {
        self.include_stack
    }

    pub(crate) fn report_sink(&self) -> Option<&'a dyn ReportSink> {
        self.sink
    }
}

impl Policy<'static> {
    /// The policy `Display` uses: current process-wide switches, with
    /// [`LogSink`] as the sink when log-on-format is enabled.
    pub fn global() -> Self {
        static LOG_SINK: LogSink = LogSink;
        let policy = Policy::new().include_stack(include_stack());
        if log_on_format() {
            policy.sink(&LOG_SINK)
        } else {
            policy
        }
    }
}

impl Default for Policy<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Policy<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Policy")
            .field("include_stack", &self.include_stack)
            .field("sink", &self.sink.is_some())
            .finish()
    }
}
