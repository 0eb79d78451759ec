use std::sync::Arc;

use crate::config::expand::{Environment, ProcessEnvironment};
use crate::exec::{Executor, SystemExecutor};
use crate::logging::Log;
use crate::operations::{FileSystemOps, SystemFileSystemOps};
use crate::platform::Platform;
use crate::resources::backup;

/// Shared context for task execution.
///
/// Everything a task touches outside its own inputs goes through this
/// struct, so tests swap in recording or mock implementations with the
/// `with_*` builders.
pub struct Context {
    /// Logger for output and task recording.
    pub log: Arc<dyn Log>,
    /// Whether to perform a dry run (preview changes without applying).
    pub dry_run: bool,
    /// Command executor (for testing or real system calls).
    pub executor: Arc<dyn Executor>,
    /// Filesystem operation abstraction.
    pub fs_ops: Arc<dyn FileSystemOps>,
    /// Environment variables, home and current directory for path expansion.
    pub env: Arc<dyn Environment>,
    /// Detected platform information.
    pub platform: Platform,
    /// Suffix stamp shared by every backup taken in this run.
    pub backup_stamp: String,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("log", &"<dyn Log>")
            .field("dry_run", &self.dry_run)
            .field("executor", &"<dyn Executor>")
            .field("fs_ops", &self.fs_ops)
            .field("env", &"<dyn Environment>")
            .field("platform", &self.platform)
            .field("backup_stamp", &self.backup_stamp)
            .finish()
    }
}

impl Context {
    /// Creates a context wired to the real system.
    #[must_use]
    pub fn new(log: Arc<dyn Log>, dry_run: bool) -> Self {
        Self {
            log,
            dry_run,
            executor: Arc::new(SystemExecutor),
            fs_ops: Arc::new(SystemFileSystemOps),
            env: Arc::new(ProcessEnvironment),
            platform: Platform::detect(),
            backup_stamp: backup::run_stamp(),
        }
    }

    /// Replace the command executor.
    #[must_use]
    pub fn with_executor(self, executor: Arc<dyn Executor>) -> Self {
        Self { executor, ..self }
    }

    /// Replace the filesystem operations.
    #[must_use]
    pub fn with_fs_ops(self, fs_ops: Arc<dyn FileSystemOps>) -> Self {
        Self { fs_ops, ..self }
    }

    /// Replace the expansion environment.
    #[must_use]
    pub fn with_env(self, env: Arc<dyn Environment>) -> Self {
        Self { env, ..self }
    }

    /// Replace the detected platform.
    #[must_use]
    pub fn with_platform(self, platform: Platform) -> Self {
        Self { platform, ..self }
    }

    /// Pin the backup stamp (tests use a fixed value).
    #[must_use]
    pub fn with_backup_stamp(self, stamp: impl Into<String>) -> Self {
        Self {
            backup_stamp: stamp.into(),
            ..self
        }
    }
}
