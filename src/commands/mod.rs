//! Subcommand orchestration.
pub mod config;
pub mod mac;
pub mod version;

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};

use crate::cli::GlobalOpts;
use crate::config::manifest::LinkManifest;
use crate::config::{DEFAULT_MANIFESTS, find_default};
use crate::logging::{Log, Logger};
use crate::tasks::{self, Context, Task};

/// Environment variable naming the dotfiles root.
pub const ROOT_ENV: &str = "DOTLINK_ROOT";

/// Resolve the dotfiles root: `--root`, then `$DOTLINK_ROOT`, then the
/// current directory.
///
/// # Errors
///
/// Returns an error if the current directory cannot be determined.
pub fn resolve_root(global: &GlobalOpts) -> Result<PathBuf> {
    root_from(global.root.as_deref(), std::env::var_os(ROOT_ENV))
}

fn root_from(explicit: Option<&Path>, env_root: Option<OsString>) -> Result<PathBuf> {
    if let Some(root) = explicit {
        return Ok(root.to_path_buf());
    }
    if let Some(root) = env_root.filter(|r| !r.is_empty()) {
        return Ok(PathBuf::from(root));
    }
    std::env::current_dir().context("cannot determine current directory")
}

/// Resolve the manifest path: `--manifest`, else the first default name
/// present under `root`.
///
/// # Errors
///
/// Returns an error if no manifest is given and none of the default names
/// exist.
pub fn resolve_manifest(global: &GlobalOpts, root: &Path) -> Result<PathBuf> {
    match &global.manifest {
        Some(path) if path.is_absolute() => Ok(path.clone()),
        Some(path) => Ok(root.join(path)),
        None => Ok(find_default(root, DEFAULT_MANIFESTS)?),
    }
}

/// Resolve and load the link manifest.
///
/// # Errors
///
/// Returns an error if the root or manifest cannot be resolved or the
/// manifest fails to load.
pub fn load_manifest(global: &GlobalOpts, log: &Logger) -> Result<LinkManifest> {
    let root = resolve_root(global)?;
    let path = resolve_manifest(global, &root)?;

    log.stage("Loading manifest");
    log.debug(&format!("manifest: {}", path.display()));
    let manifest = LinkManifest::load(&path)?;
    log.info(&format!(
        "loaded {} links, {} files",
        manifest.links.len(),
        manifest.files.len()
    ));
    Ok(manifest)
}

/// Build the task context for a command run.
#[must_use]
pub fn command_context(global: &GlobalOpts, log: &Arc<Logger>) -> Context {
    Context::new(Arc::clone(log) as Arc<dyn Log>, global.dry_run)
}

/// Execute every task in order, print the summary, and bail if any task failed.
///
/// # Errors
///
/// Returns an error if one or more tasks recorded a failure.
pub fn run_tasks_to_completion<'a>(
    tasks: impl IntoIterator<Item = &'a dyn Task>,
    ctx: &Context,
    log: &Logger,
) -> Result<()> {
    for task in tasks {
        tasks::execute(task, ctx);
    }

    log.print_summary();

    let count = log.failure_count();
    if count > 0 {
        anyhow::bail!("{count} task(s) failed");
    }
    Ok(())
}
