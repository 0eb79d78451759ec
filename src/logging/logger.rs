//! Run logger: forwards messages to `tracing` and keeps the task ledger.
use std::path::PathBuf;
use std::sync::Mutex;

use super::subscriber::{DRY_RUN_TARGET, STAGE_TARGET};
use super::types::{Log, TaskEntry, TaskStatus};
use super::utils::log_file_path;

/// Order of statuses in the summary tally.
const TALLY_ORDER: [TaskStatus; 5] = [
    TaskStatus::Ok,
    TaskStatus::DryRun,
    TaskStatus::Skipped,
    TaskStatus::NotApplicable,
    TaskStatus::Failed,
];

/// Logger for one `dotlink` command.
///
/// Messages are emitted as `tracing` events, so both the console formatter
/// and the log file under `$XDG_CACHE_HOME/dotlink/` see them. Each task's
/// outcome goes into a ledger that [`print_summary`](Self::print_summary)
/// reports once every task has run.
#[derive(Debug)]
pub struct Logger {
    ledger: Mutex<Vec<TaskEntry>>,
    log_file: Option<PathBuf>,
}

impl Logger {
    /// Create the logger for `command`.
    ///
    /// The log file itself is opened by
    /// [`init_subscriber`](super::subscriber::init_subscriber); the logger
    /// only remembers its path for the summary.
    #[must_use]
    pub fn new(command: &str) -> Self {
        Self::with_log_file(log_file_path(command))
    }

    pub(crate) const fn with_log_file(log_file: Option<PathBuf>) -> Self {
        Self {
            ledger: Mutex::new(Vec::new()),
            log_file,
        }
    }

    fn entries(&self) -> Vec<TaskEntry> {
        self.ledger.lock().map_or_else(|_| Vec::new(), |g| g.clone())
    }

    /// Number of tasks recorded as failed.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.entries()
            .iter()
            .filter(|e| e.status == TaskStatus::Failed)
            .count()
    }

    /// Report each task outcome, a tally, and where the full log lives.
    ///
    /// Does nothing when no task was recorded.
    pub fn print_summary(&self) {
        let entries = self.entries();
        if entries.is_empty() {
            return;
        }

        self.stage("Summary");
        for entry in &entries {
            self.info(&entry_line(entry));
        }
        self.info(&tally_line(&entries));
        if let Some(path) = &self.log_file {
            self.info(&format!("\x1b[2mfull log: {}\x1b[0m", path.display()));
        }
    }
}

/// `✓ update links`, followed by the detail in parentheses when there is one.
fn entry_line(entry: &TaskEntry) -> String {
    let (glyph, color) = entry.status.marker();
    match &entry.message {
        Some(detail) => format!("{color}{glyph} {} ({detail})\x1b[0m", entry.name),
        None => format!("{color}{glyph} {}\x1b[0m", entry.name),
    }
}

/// `3 tasks: 1 applied, 1 skipped, 1 failed`. Statuses that did not occur
/// are left out.
fn tally_line(entries: &[TaskEntry]) -> String {
    let parts: Vec<String> = TALLY_ORDER
        .iter()
        .filter_map(|&status| {
            let count = entries.iter().filter(|e| e.status == status).count();
            (count > 0).then(|| {
                let (_, color) = status.marker();
                format!("{color}{count} {}\x1b[0m", status.label())
            })
        })
        .collect();
    let noun = if entries.len() == 1 { "task" } else { "tasks" };
    format!("{} {noun}: {}", entries.len(), parts.join(", "))
}

impl Log for Logger {
    fn stage(&self, msg: &str) {
        tracing::info!(target: STAGE_TARGET, "{msg}");
    }

    fn info(&self, msg: &str) {
        tracing::info!("{msg}");
    }

    fn debug(&self, msg: &str) {
        tracing::debug!("{msg}");
    }

    fn warn(&self, msg: &str) {
        tracing::warn!("{msg}");
    }

    fn error(&self, msg: &str) {
        tracing::error!("{msg}");
    }

    fn dry_run(&self, msg: &str) {
        tracing::info!(target: DRY_RUN_TARGET, "{msg}");
    }

    fn record_task(&self, name: &str, status: TaskStatus, message: Option<&str>) {
        if let Ok(mut guard) = self.ledger.lock() {
            guard.push(TaskEntry {
                name: name.to_string(),
                status,
                message: message.map(String::from),
            });
        }
    }
}
