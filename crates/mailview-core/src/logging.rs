//! Logging facilities for Mailview.
//!
//! Mailview uses the `tracing` crate for instrumentation and never installs a
//! subscriber itself. To see logs, install one in your application:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("mailview=debug")
//!     .init();
//! ```

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Signal/slot system target.
    pub const SIGNAL: &str = "mailview_core::signal";
    /// Collection mutation target.
    pub const COLLECTION: &str = "mailview::collection";
    /// Reconciliation target.
    pub const RECONCILE: &str = "mailview::reconcile";
    /// Performance spans target.
    pub const PERF: &str = "mailview::perf";
}

/// A guard for performance tracing spans.
///
/// The span stays entered until the guard is dropped.
///
/// ```
/// use mailview_core::PerfSpan;
///
/// {
///     let _span = PerfSpan::new("rebuild_view");
///     // timed work
/// }
/// ```
pub struct PerfSpan {
    #[allow(dead_code)]
    span: tracing::span::EnteredSpan,
}

impl PerfSpan {
    /// Create and enter a new performance span.
    pub fn new(name: &'static str) -> Self {
        let span = tracing::info_span!(target: targets::PERF, "perf", operation = name);
        Self {
            span: span.entered(),
        }
    }
}
