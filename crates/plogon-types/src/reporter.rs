//! User-facing progress reporting, threaded through the pipeline as a
//! trait object rather than a global logger (spec §9 design note:
//! "mutable singletons → scoped context").
//!
//! Distinct from diagnostic logging (`tracing`, installed once at
//! `plogon-cli` startup): a [`Reporter`] carries build progress a human
//! is meant to read, such as streamed container log lines.

/// Sink for human-facing progress messages emitted while a task runs.
pub trait Reporter {
    /// Routine progress.
    fn info(&mut self, msg: &str);
    /// Non-fatal but noteworthy.
    fn warn(&mut self, msg: &str);
    /// Failure detail.
    fn error(&mut self, msg: &str);
}

/// A [`Reporter`] that discards everything, for callers (tests, library
/// consumers without a CLI) that don't want progress output.
#[derive(Debug, Default)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn info(&mut self, _msg: &str) {}
    fn warn(&mut self, _msg: &str) {}
    fn error(&mut self, _msg: &str) {}
}
