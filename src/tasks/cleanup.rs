//! Remove dangling symlinks at manifest link targets.
use anyhow::{Result, bail};

use super::report::{EntryId, Outcome, ReconciliationResult};
use super::{Context, Task, TaskResult};
use crate::config::expand::expand;
use crate::config::manifest::{LinkEntry, LinkManifest};
use crate::error::{EntryError, FsError};

/// Remove every link-entry target that is a symlink to nothing.
///
/// Live links, regular files, directories and missing targets are left
/// untouched and reported as skipped.
#[must_use]
pub fn sweep(manifest: &LinkManifest, ctx: &Context) -> ReconciliationResult {
    let mut result = ReconciliationResult::new(ctx.dry_run);
    for (index, entry) in manifest.links.iter().enumerate() {
        let id = EntryId::Link {
            index,
            local: entry.local.clone(),
        };
        let outcome = sweep_one(manifest, entry, ctx).unwrap_or_else(Outcome::Failed);
        if let Outcome::Failed(err) = &outcome {
            ctx.log.error(&format!("{id}: {err}"));
        }
        result.push(id, outcome);
    }
    result
}

fn sweep_one(
    manifest: &LinkManifest,
    entry: &LinkEntry,
    ctx: &Context,
) -> Result<Outcome, EntryError> {
    let target = expand(&entry.link, &manifest.variables, ctx.env.as_ref())?;
    let ops = ctx.fs_ops.as_ref();

    if !ops.is_symlink(&target) {
        let reason = if ops.exists(&target) {
            "not a symlink"
        } else {
            "missing"
        };
        return Ok(Outcome::Skipped(reason.to_string()));
    }
    if ops.exists(&target) {
        return Ok(Outcome::Skipped("link is live".to_string()));
    }

    if ctx.dry_run {
        ctx.log
            .dry_run(&format!("would remove dangling link {}", target.display()));
        return Ok(Outcome::Removed);
    }

    ops.remove(&target).map_err(|source| FsError::Remove {
        path: target.clone(),
        source,
    })?;
    ctx.log
        .info(&format!("removed dangling link {}", target.display()));
    Ok(Outcome::Removed)
}

/// Sweep dangling symlinks left by earlier manifests.
#[derive(Debug)]
pub struct RemoveBrokenLinks {
    manifest: LinkManifest,
}

impl RemoveBrokenLinks {
    /// Create the task for a loaded manifest.
    #[must_use]
    pub const fn new(manifest: LinkManifest) -> Self {
        Self { manifest }
    }
}

impl Task for RemoveBrokenLinks {
    fn name(&self) -> &'static str {
        "Remove broken links"
    }

    fn should_run(&self, _ctx: &Context) -> bool {
        true
    }

    fn run(&self, ctx: &Context) -> Result<TaskResult> {
        let result = sweep(&self.manifest, ctx);
        ctx.log.info(&result.summary());
        if !result.success() {
            bail!(
                "{} of {} entries failed",
                result.failed(),
                result.entries.len()
            );
        }
        Ok(if ctx.dry_run {
            TaskResult::DryRun
        } else {
            TaskResult::Ok
        })
    }
}

#[cfg(all(test, unix))]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::tasks::test_helpers::{make_context, parse_manifest};
    use std::fs;
    use std::os::unix::fs::symlink;

    fn manifest(repo: &std::path::Path, home: &std::path::Path) -> LinkManifest {
        parse_manifest(
            repo,
            &format!(
                r#"
variables = {{ H = "{}" }}
files = []
[[links]]
local = "old"
link = ["$H", "dangling"]
[[links]]
local = "vimrc"
link = ["$H", "live"]
[[links]]
local = "plain"
link = ["$H", "plain"]
[[links]]
local = "absent"
link = ["$H", "absent"]
"#,
                home.display()
            ),
        )
    }

    fn setup() -> (tempfile::TempDir, std::path::PathBuf, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let repo = dir.path().join("repo");
        let home = dir.path().join("home");
        fs::create_dir_all(&repo).unwrap();
        fs::create_dir_all(&home).unwrap();
        fs::write(repo.join("vimrc"), "").unwrap();
        symlink(repo.join("gone"), home.join("dangling")).unwrap();
        symlink(repo.join("vimrc"), home.join("live")).unwrap();
        fs::write(home.join("plain"), "keep").unwrap();
        (dir, repo, home)
    }

    #[test]
    fn removes_only_dangling_links() {
        let (_dir, repo, home) = setup();
        let (ctx, _log) = make_context(false);

        let result = sweep(&manifest(&repo, &home), &ctx);

        assert!(result.success());
        assert!(matches!(result.entries[0].outcome, Outcome::Removed));
        assert!(matches!(&result.entries[1].outcome, Outcome::Skipped(r) if r == "link is live"));
        assert!(matches!(&result.entries[2].outcome, Outcome::Skipped(r) if r == "not a symlink"));
        assert!(matches!(&result.entries[3].outcome, Outcome::Skipped(r) if r == "missing"));
        assert!(fs::symlink_metadata(home.join("dangling")).is_err());
        assert!(fs::symlink_metadata(home.join("live")).is_ok());
        assert_eq!(fs::read_to_string(home.join("plain")).unwrap(), "keep");
    }

    #[test]
    fn dry_run_keeps_dangling_link() {
        let (_dir, repo, home) = setup();
        let (ctx, log) = make_context(true);

        let result = sweep(&manifest(&repo, &home), &ctx);

        assert!(matches!(result.entries[0].outcome, Outcome::Removed));
        assert!(fs::symlink_metadata(home.join("dangling")).is_ok());
        assert_eq!(log.dry_runs().len(), 1);
    }
}
