// Shared helpers for integration tests.
//
// Provides a temporary-directory-backed dotfiles repository with a fake home
// directory, a fluent builder for manifests and source files, and
// substitutes for the environment and filesystem seams so each test runs in
// isolation from the real `$HOME`.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(dead_code, clippy::expect_used, clippy::unwrap_used)]

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use dotlink::config::expand::Environment;
use dotlink::config::manifest::LinkManifest;
use dotlink::logging::{Log, TaskStatus};
use dotlink::operations::{FileSystemOps, SystemFileSystemOps};
use dotlink::tasks::Context;

/// Backup stamp used by every test context.
pub const STAMP: &str = "20240301_120000";

/// [`Environment`] with a fixed home directory and variable table.
#[derive(Debug, Clone)]
pub struct FakeEnv {
    pub home: PathBuf,
    pub vars: HashMap<String, String>,
    pub cwd: PathBuf,
}

impl FakeEnv {
    /// An environment where `$HOME` and `~` both resolve to `home`.
    pub fn with_home(home: &Path) -> Self {
        let mut vars = HashMap::new();
        vars.insert("HOME".to_string(), home.display().to_string());
        Self {
            home: home.to_path_buf(),
            vars,
            cwd: home.to_path_buf(),
        }
    }
}

impl Environment for FakeEnv {
    fn var(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }

    fn home_dir(&self) -> Option<PathBuf> {
        Some(self.home.clone())
    }

    fn current_dir(&self) -> io::Result<PathBuf> {
        Ok(self.cwd.clone())
    }
}

/// A [`Log`] that collects every line as `"<kind>: <message>"`.
#[derive(Debug, Default)]
pub struct CollectLog {
    lines: Mutex<Vec<String>>,
}

impl CollectLog {
    fn push(&self, kind: &str, msg: &str) {
        self.lines.lock().unwrap().push(format!("{kind}: {msg}"));
    }

    /// All collected lines in order.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    /// Lines of one kind, without the prefix.
    pub fn of(&self, kind: &str) -> Vec<String> {
        let prefix = format!("{kind}: ");
        self.lines()
            .iter()
            .filter_map(|l| l.strip_prefix(&prefix).map(String::from))
            .collect()
    }
}

impl Log for CollectLog {
    fn stage(&self, msg: &str) {
        self.push("stage", msg);
    }
    fn info(&self, msg: &str) {
        self.push("info", msg);
    }
    fn debug(&self, msg: &str) {
        self.push("debug", msg);
    }
    fn warn(&self, msg: &str) {
        self.push("warn", msg);
    }
    fn error(&self, msg: &str) {
        self.push("error", msg);
    }
    fn dry_run(&self, msg: &str) {
        self.push("dry_run", msg);
    }
    fn record_task(&self, name: &str, status: TaskStatus, _message: Option<&str>) {
        self.push("task", &format!("{name} {status:?}"));
    }
}

/// Real filesystem operations that record every mutating call and can be
/// told to refuse symlink creation.
#[derive(Debug, Default)]
pub struct TrackingOps {
    inner: SystemFileSystemOps,
    deny_symlinks: bool,
    mutations: Mutex<Vec<String>>,
}

impl TrackingOps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `symlink` call fails with `PermissionDenied`.
    pub fn denying_symlinks() -> Self {
        Self {
            deny_symlinks: true,
            ..Self::default()
        }
    }

    /// Mutating calls so far, as `"<op> <path>"`.
    pub fn mutations(&self) -> Vec<String> {
        self.mutations.lock().unwrap().clone()
    }

    fn record(&self, op: &str, path: &Path) {
        self.mutations
            .lock()
            .unwrap()
            .push(format!("{op} {}", path.display()));
    }
}

impl FileSystemOps for TrackingOps {
    fn exists(&self, path: &Path) -> bool {
        self.inner.exists(path)
    }

    fn is_symlink(&self, path: &Path) -> bool {
        self.inner.is_symlink(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.inner.is_dir(path)
    }

    fn read_link(&self, path: &Path) -> io::Result<PathBuf> {
        self.inner.read_link(path)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.inner.read(path)
    }

    fn mode(&self, path: &Path) -> io::Result<u32> {
        self.inner.mode(path)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        self.record("mkdir", path);
        self.inner.create_dir_all(path)
    }

    fn symlink(&self, points_to: &Path, link: &Path) -> io::Result<()> {
        self.record("symlink", link);
        if self.deny_symlinks {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "permission denied",
            ));
        }
        self.inner.symlink(points_to, link)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        self.record("remove", path);
        self.inner.remove(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        self.record("rename", from);
        self.inner.rename(from, to)
    }

    fn copy_tree(&self, from: &Path, to: &Path) -> io::Result<()> {
        self.record("copy", from);
        self.inner.copy_tree(from, to)
    }

    fn set_mode(&self, path: &Path, mode: u32) -> io::Result<()> {
        self.record("chmod", path);
        self.inner.set_mode(path, mode)
    }

    fn write(&self, path: &Path, content: &[u8]) -> io::Result<()> {
        self.record("write", path);
        self.inner.write(path, content)
    }
}

/// An isolated repository (`<tmp>/repo`) and home directory (`<tmp>/home`).
pub struct TestRepo {
    dir: tempfile::TempDir,
    pub ops: Arc<TrackingOps>,
}

impl TestRepo {
    pub fn repo(&self) -> PathBuf {
        self.dir.path().join("repo")
    }

    pub fn home(&self) -> PathBuf {
        self.dir.path().join("home")
    }

    /// Load `repo/links.toml`.
    pub fn manifest(&self) -> LinkManifest {
        LinkManifest::load(&self.repo().join("links.toml")).expect("load manifest")
    }

    /// A context wired to the fake home, the tracking filesystem and a
    /// collecting log.
    pub fn context(&self, dry_run: bool) -> (Context, Arc<CollectLog>) {
        let log = Arc::new(CollectLog::default());
        let ctx = Context::new(Arc::clone(&log) as Arc<dyn Log>, dry_run)
            .with_env(Arc::new(FakeEnv::with_home(&self.home())))
            .with_fs_ops(Arc::clone(&self.ops) as Arc<dyn FileSystemOps>)
            .with_backup_stamp(STAMP);
        (ctx, log)
    }

    /// Names of every entry directly under `dir`, sorted.
    pub fn list(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .expect("read dir")
            .map(|e| e.expect("dir entry").file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

/// Fluent builder for [`TestRepo`].
pub struct TestRepoBuilder {
    repo: TestRepo,
}

impl TestRepoBuilder {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        std::fs::create_dir_all(dir.path().join("repo")).expect("create repo dir");
        std::fs::create_dir_all(dir.path().join("home")).expect("create home dir");
        Self {
            repo: TestRepo {
                dir,
                ops: Arc::new(TrackingOps::new()),
            },
        }
    }

    /// Write a source file under the repository.
    pub fn source(self, rel: &str, content: &str) -> Self {
        let path = self.repo.repo().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create source parent");
        }
        std::fs::write(path, content).expect("write source");
        self
    }

    /// Write a pre-existing file under the home directory.
    pub fn home_file(self, rel: &str, content: &str) -> Self {
        let path = self.repo.home().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create home parent");
        }
        std::fs::write(path, content).expect("write home file");
        self
    }

    /// Write `repo/links.toml`. `@HOME@` is replaced with the home path.
    pub fn manifest(self, body: &str) -> Self {
        let body = body.replace("@HOME@", &self.repo.home().display().to_string());
        std::fs::write(self.repo.repo().join("links.toml"), body).expect("write manifest");
        self
    }

    /// Use filesystem operations that refuse to create symlinks.
    pub fn denying_symlinks(mut self) -> Self {
        self.repo.ops = Arc::new(TrackingOps::denying_symlinks());
        self
    }

    pub fn build(self) -> TestRepo {
        self.repo
    }
}
