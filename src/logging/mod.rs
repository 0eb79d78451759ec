//! Console and log-file output for dotlink runs.
//!
//! Every message is a `tracing` event. [`init_subscriber`] routes events to
//! the terminal and to `$XDG_CACHE_HOME/dotlink/<command>.log`, and
//! [`Logger`] adds the per-task ledger behind the end-of-run summary.

mod logger;
mod subscriber;
mod types;
mod utils;

pub use logger::Logger;
pub use subscriber::init_subscriber;
pub use types::{Log, TaskEntry, TaskStatus};

/// A [`Logger`] whose events are written to a temporary log file through a
/// thread-local subscriber. The subscriber stays installed until the value
/// is dropped.
#[cfg(test)]
#[derive(Debug)]
pub(crate) struct CapturedLog {
    pub(crate) logger: Logger,
    path: std::path::PathBuf,
    _guard: tracing::dispatcher::DefaultGuard,
    _dir: tempfile::TempDir,
}

#[cfg(test)]
#[allow(clippy::expect_used)]
impl CapturedLog {
    pub(crate) fn new() -> Self {
        use tracing_subscriber::{Layer as _, filter::LevelFilter, layer::SubscriberExt as _};

        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("test.log");
        let layer = subscriber::FileLayer::create(&path, "test").expect("open log file");
        let dispatch = tracing::Dispatch::new(
            tracing_subscriber::registry().with(layer.with_filter(LevelFilter::DEBUG)),
        );
        let guard = tracing::dispatcher::set_default(&dispatch);
        Self {
            logger: Logger::with_log_file(Some(path.clone())),
            path,
            _guard: guard,
            _dir: dir,
        }
    }

    pub(crate) fn path(&self) -> &std::path::Path {
        &self.path
    }

    pub(crate) fn contents(&self) -> String {
        std::fs::read_to_string(&self.path).expect("read log file")
    }
}
