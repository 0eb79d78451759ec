//! Core logging types: task entries, status, and the [`Log`] trait.
/// Task execution result for summary reporting.
#[derive(Debug, Clone)]
pub struct TaskEntry {
    /// Human-readable task name.
    pub name: String,
    /// Final status of the task.
    pub status: TaskStatus,
    /// Optional detail message (e.g., skip reason or error description).
    pub message: Option<String>,
}

/// Status of a completed task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Task completed successfully.
    Ok,
    /// Task does not apply to the current platform.
    NotApplicable,
    /// Task was explicitly skipped (e.g., tool not found).
    Skipped,
    /// Task ran in dry-run mode; no changes were applied.
    DryRun,
    /// Task encountered an error and could not complete.
    Failed,
}

impl TaskStatus {
    /// Summary glyph and ANSI colour.
    pub(super) const fn marker(self) -> (&'static str, &'static str) {
        match self {
            Self::Ok => ("✓", "\x1b[32m"),
            Self::NotApplicable => ("·", "\x1b[2m"),
            Self::Skipped => ("○", "\x1b[33m"),
            Self::DryRun => ("~", "\x1b[36m"),
            Self::Failed => ("✗", "\x1b[31m"),
        }
    }

    /// Word used for this status in the run summary.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Ok => "applied",
            Self::NotApplicable => "not applicable",
            Self::Skipped => "skipped",
            Self::DryRun => "previewed",
            Self::Failed => "failed",
        }
    }
}

/// Abstraction over logging backends.
///
/// Tasks and the reconciler log through `&dyn Log` taken from the task
/// context; [`Logger`](super::logger::Logger) is the production backend and
/// tests substitute a recording implementation.
pub trait Log: Send + Sync {
    /// Log a stage header (major section).
    fn stage(&self, msg: &str);
    /// Log an informational message.
    fn info(&self, msg: &str);
    /// Log a debug message (may be suppressed on console).
    fn debug(&self, msg: &str);
    /// Log a warning message.
    fn warn(&self, msg: &str);
    /// Log an error message.
    fn error(&self, msg: &str);
    /// Log a dry-run action message.
    fn dry_run(&self, msg: &str);
    /// Record a task result for the summary.
    fn record_task(&self, name: &str, status: TaskStatus, message: Option<&str>);
}
