//! Reconcile link and file entries against the filesystem.
use std::path::Path;

use anyhow::{Result, bail};

use super::processing::{Processed, process_single};
use super::report::{EntryId, Outcome, ReconciliationResult};
use super::{Context, Task, TaskResult};
use crate::config::expand::expand;
use crate::config::manifest::{CommandTemplate, FileEntry, FileMode, LinkEntry, LinkManifest};
use crate::error::EntryError;
use crate::resources::Resource as _;
use crate::resources::chmod::ChmodResource;
use crate::resources::file::FileResource;
use crate::resources::symlink::SymlinkResource;

/// Bring every link entry, then every file entry, into the desired state.
///
/// Entries are independent: a failure is recorded as [`Outcome::Failed`]
/// and processing continues with the next entry.
#[must_use]
pub fn reconcile(manifest: &LinkManifest, ctx: &Context) -> ReconciliationResult {
    let mut result = ReconciliationResult::new(ctx.dry_run);

    for (index, entry) in manifest.links.iter().enumerate() {
        let id = EntryId::Link {
            index,
            local: entry.local.clone(),
        };
        let outcome = reconcile_link(manifest, entry, ctx).unwrap_or_else(Outcome::Failed);
        log_outcome(ctx, &id, &outcome);
        result.push(id, outcome);
    }

    for (index, entry) in manifest.files.iter().enumerate() {
        let id = EntryId::File {
            index,
            target: entry.target.join("/"),
        };
        let outcome = reconcile_file(manifest, entry, ctx).unwrap_or_else(Outcome::Failed);
        log_outcome(ctx, &id, &outcome);
        result.push(id, outcome);
    }

    result
}

fn log_outcome(ctx: &Context, id: &EntryId, outcome: &Outcome) {
    match outcome {
        Outcome::Failed(err) => ctx.log.error(&format!("{id}: {err}")),
        Outcome::Skipped(reason) => ctx.log.debug(&format!("{id}: skipped ({reason})")),
        Outcome::Linked | Outcome::Written | Outcome::Removed => {}
    }
}

fn reconcile_link(
    manifest: &LinkManifest,
    entry: &LinkEntry,
    ctx: &Context,
) -> Result<Outcome, EntryError> {
    let source = manifest.source_path(entry);
    let target = expand(&entry.link, &manifest.variables, ctx.env.as_ref())?;

    if let Some(pattern) = entry
        .exclude
        .iter()
        .find(|p| p.is_match(&source) || p.is_match(&target))
    {
        return Ok(Outcome::Skipped(format!("excluded by '{}'", pattern.as_str())));
    }

    let ops = ctx.fs_ops.as_ref();
    let link = SymlinkResource::new(source, target.clone(), ops, &ctx.backup_stamp);
    match process_single(ctx, &link, "link")? {
        Processed::AlreadyCorrect => return Ok(Outcome::Skipped("already linked".to_string())),
        Processed::WouldChange => {
            if let Some(mode) = entry.chmod {
                ctx.log
                    .dry_run(&format!("would chmod {mode} {}", target.display()));
            }
            if let Some(command) = &entry.post_link {
                ctx.log
                    .dry_run(&format!("would run: {}", command.render(&target).join(" ")));
            }
            return Ok(Outcome::Linked);
        }
        Processed::Changed(_) => {}
    }

    if let Some(mode) = entry.chmod {
        ChmodResource::new(target.clone(), mode.bits(), ops).apply()?;
    }
    if let Some(command) = &entry.post_link {
        run_post_link(ctx, command, &target);
    }
    Ok(Outcome::Linked)
}

/// Run a post-link command. Failures only warn: the link itself is correct.
fn run_post_link(ctx: &Context, command: &CommandTemplate, target: &Path) {
    let argv = command.render(target);
    let Some((program, args)) = argv.split_first() else {
        return;
    };
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    ctx.log.debug(&format!("running: {}", argv.join(" ")));

    match ctx.executor.run_unchecked(program, &args) {
        Ok(result) if result.success => {}
        Ok(result) => ctx.log.warn(&format!(
            "post_link for {} exited with {}: {}",
            target.display(),
            result
                .code
                .map_or_else(|| "signal".to_string(), |c| c.to_string()),
            result.stderr.trim()
        )),
        Err(e) => ctx
            .log
            .warn(&format!("post_link for {}: {e:#}", target.display())),
    }
}

fn reconcile_file(
    manifest: &LinkManifest,
    entry: &FileEntry,
    ctx: &Context,
) -> Result<Outcome, EntryError> {
    let target = expand(&entry.target, &manifest.variables, ctx.env.as_ref())?;
    let file = FileResource::new(
        entry.content.clone(),
        target,
        entry.chmod.map(FileMode::bits),
        ctx.fs_ops.as_ref(),
        &ctx.backup_stamp,
    );
    Ok(match process_single(ctx, &file, "write")? {
        Processed::AlreadyCorrect => Outcome::Skipped("already up to date".to_string()),
        Processed::WouldChange | Processed::Changed(_) => Outcome::Written,
    })
}

/// Create configuration symlinks and files from the manifest.
#[derive(Debug)]
pub struct UpdateLinks {
    manifest: LinkManifest,
}

impl UpdateLinks {
    /// Create the task for a loaded manifest.
    #[must_use]
    pub const fn new(manifest: LinkManifest) -> Self {
        Self { manifest }
    }
}

impl Task for UpdateLinks {
    fn name(&self) -> &'static str {
        "Update links"
    }

    fn should_run(&self, _ctx: &Context) -> bool {
        true
    }

    fn run(&self, ctx: &Context) -> Result<TaskResult> {
        let result = reconcile(&self.manifest, ctx);
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
#[allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use crate::error::{LinkError, PathResolutionError};
    use crate::operations::RecordingFileSystemOps;
    use crate::resources::test_helpers::MockExecutor;
    use crate::tasks::test_helpers::{make_context, parse_manifest};
    use std::fs;
    use std::sync::Arc;

    struct Fixture {
        dir: tempfile::TempDir,
        ops: Arc<RecordingFileSystemOps>,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            fs::create_dir_all(dir.path().join("repo")).unwrap();
            fs::create_dir_all(dir.path().join("home")).unwrap();
            Self {
                dir,
                ops: Arc::new(RecordingFileSystemOps::new()),
            }
        }

        fn repo(&self) -> std::path::PathBuf {
            self.dir.path().join("repo")
        }

        fn home(&self) -> std::path::PathBuf {
            self.dir.path().join("home")
        }

        fn manifest(&self, body: &str) -> LinkManifest {
            let body = body.replace("@HOME@", &self.home().display().to_string());
            parse_manifest(&self.repo(), &body)
        }

        fn context(&self, dry_run: bool) -> (Context, Arc<crate::tasks::test_helpers::RecordingLog>) {
            let (ctx, log) = make_context(dry_run);
            (ctx.with_fs_ops(Arc::clone(&self.ops) as _), log)
        }
    }

    const ONE_LINK: &str = r#"
variables = {}
files = []
[[links]]
local = "vimrc"
link = ["@HOME@", ".vimrc"]
"#;

    #[test]
    fn links_into_empty_target() {
        let fx = Fixture::new();
        fs::write(fx.repo().join("vimrc"), "set nu").unwrap();
        let (ctx, _log) = fx.context(false);

        let result = reconcile(&fx.manifest(ONE_LINK), &ctx);

        assert!(result.success());
        assert!(matches!(result.entries[0].outcome, Outcome::Linked));
        assert_eq!(
            fs::read_link(fx.home().join(".vimrc")).unwrap(),
            fx.repo().join("vimrc")
        );
        assert!(
            !fx.ops.mutations().iter().any(|m| m.starts_with("copy")),
            "no backups expected"
        );
    }

    #[test]
    fn second_run_performs_no_mutations() {
        let fx = Fixture::new();
        fs::write(fx.repo().join("vimrc"), "set nu").unwrap();
        let manifest = fx.manifest(ONE_LINK);
        let (ctx, _log) = fx.context(false);
        reconcile(&manifest, &ctx);
        let before = fx.ops.mutations().len();

        let result = reconcile(&manifest, &ctx);

        assert!(matches!(&result.entries[0].outcome, Outcome::Skipped(r) if r == "already linked"));
        assert_eq!(fx.ops.mutations().len(), before);
    }

    #[test]
    fn dry_run_mutates_nothing() {
        let fx = Fixture::new();
        fs::write(fx.repo().join("vimrc"), "set nu").unwrap();
        let (ctx, log) = fx.context(true);

        let result = reconcile(&fx.manifest(ONE_LINK), &ctx);

        assert!(result.dry_run);
        assert!(matches!(result.entries[0].outcome, Outcome::Linked));
        assert!(fx.ops.mutations().is_empty());
        assert_eq!(log.dry_runs().len(), 1);
    }

    #[test]
    fn missing_source_fails_only_that_entry() {
        let fx = Fixture::new();
        fs::write(fx.repo().join("zshrc"), "").unwrap();
        let manifest = fx.manifest(
            r#"
variables = {}
files = []
[[links]]
local = "vimrc"
link = ["@HOME@", ".vimrc"]
[[links]]
local = "zshrc"
link = ["@HOME@", ".zshrc"]
"#,
        );
        let (ctx, _log) = fx.context(false);

        let result = reconcile(&manifest, &ctx);

        assert!(!result.success());
        assert!(matches!(
            result.entries[0].outcome,
            Outcome::Failed(EntryError::Link(LinkError::SourceMissing { .. }))
        ));
        assert!(matches!(result.entries[1].outcome, Outcome::Linked));
    }

    #[test]
    fn unresolved_variable_fails_entry() {
        let fx = Fixture::new();
        fs::write(fx.repo().join("vimrc"), "").unwrap();
        let manifest = fx.manifest(
            r#"
variables = {}
files = []
[[links]]
local = "vimrc"
link = ["$DOTLINK_SURELY_UNSET_VAR", ".vimrc"]
"#,
        );
        let (ctx, _log) = fx.context(false);

        let result = reconcile(&manifest, &ctx);

        assert!(matches!(
            result.entries[0].outcome,
            Outcome::Failed(EntryError::PathResolution(
                PathResolutionError::UnresolvedVariable { .. }
            ))
        ));
    }

    #[test]
    fn excluded_entry_is_skipped_without_writes() {
        let fx = Fixture::new();
        fs::write(fx.repo().join("vimrc.bak"), "").unwrap();
        let manifest = fx.manifest(
            r#"
variables = {}
files = []
[[links]]
local = "vimrc.bak"
link = ["@HOME@", ".vimrc"]
exclude = ['.*\.bak$']
"#,
        );
        let (ctx, _log) = fx.context(false);

        let result = reconcile(&manifest, &ctx);

        assert!(
            matches!(&result.entries[0].outcome, Outcome::Skipped(r) if r.contains(r"\.bak$"))
        );
        assert!(fx.ops.mutations().is_empty());
    }

    #[test]
    fn chmod_applies_to_source_after_linking() {
        use std::os::unix::fs::PermissionsExt;
        let fx = Fixture::new();
        let script = fx.repo().join("hook.sh");
        fs::write(&script, "#!/bin/sh").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o644)).unwrap();
        let manifest = fx.manifest(
            r#"
variables = {}
files = []
[[links]]
local = "hook.sh"
link = ["@HOME@", "bin", "hook"]
chmod = "755"
"#,
        );
        let (ctx, _log) = fx.context(false);

        assert!(reconcile(&manifest, &ctx).success());
        assert_eq!(
            fs::metadata(&script).unwrap().permissions().mode() & 0o7777,
            0o755
        );
    }

    #[test]
    fn post_link_runs_with_target_and_failure_only_warns() {
        let fx = Fixture::new();
        fs::write(fx.repo().join("vimrc"), "").unwrap();
        let manifest = fx.manifest(
            r#"
variables = {}
files = []
[[links]]
local = "vimrc"
link = ["@HOME@", ".vimrc"]
post_link = ["touch", "-h", "$TARGET"]
"#,
        );
        let executor = Arc::new(MockExecutor::fail());
        let (ctx, log) = fx.context(false);
        let ctx = ctx.with_executor(Arc::clone(&executor) as _);

        let result = reconcile(&manifest, &ctx);

        assert!(matches!(result.entries[0].outcome, Outcome::Linked));
        assert_eq!(
            executor.calls(),
            vec![format!("touch -h {}", fx.home().join(".vimrc").display())]
        );
        assert_eq!(log.warns().len(), 1);
    }

    #[test]
    fn file_entry_is_written_then_skipped() {
        let fx = Fixture::new();
        let manifest = fx.manifest(
            r#"
variables = {}
links = []
[[files]]
content = "EDITOR=vim\n"
target = ["@HOME@", ".config", "env"]
"#,
        );
        let (ctx, _log) = fx.context(false);

        let first = reconcile(&manifest, &ctx);
        let second = reconcile(&manifest, &ctx);

        assert!(matches!(first.entries[0].outcome, Outcome::Written));
        assert!(matches!(second.entries[0].outcome, Outcome::Skipped(_)));
        assert_eq!(
            fs::read_to_string(fx.home().join(".config/env")).unwrap(),
            "EDITOR=vim\n"
        );
    }

    #[test]
    fn task_fails_when_any_entry_fails() {
        let fx = Fixture::new();
        let (ctx, _log) = fx.context(false);
        let task = UpdateLinks::new(fx.manifest(ONE_LINK));

        let err = task.run(&ctx).unwrap_err();

        assert_eq!(err.to_string(), "1 of 1 entries failed");
    }
}
