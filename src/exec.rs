//! External command execution.
//!
//! Tasks never spawn processes directly: they go through the [`Executor`]
//! stored on the task context so that unit tests can substitute a mock and
//! assert on the exact argument vectors that would be run.
use anyhow::{Context, Result, bail};
use std::fmt::Debug;
use std::process::{Command, Output};

/// Result of a command execution.
#[derive(Debug, Clone)]
pub struct ExecResult {
    /// Captured standard output, lossily decoded.
    pub stdout: String,
    /// Captured standard error, lossily decoded.
    pub stderr: String,
    /// Whether the process exited with status zero.
    pub success: bool,
    /// Exit code, if the process was not killed by a signal.
    pub code: Option<i32>,
}

impl From<Output> for ExecResult {
    fn from(output: Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
            code: output.status.code(),
        }
    }
}

/// Abstraction over process spawning.
///
/// Commands are always given as a program plus an argument vector and run
/// without a shell.
pub trait Executor: Send + Sync + Debug {
    /// Run a command and return its output. Fails if the command exits non-zero.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or exits non-zero.
    fn run(&self, program: &str, args: &[&str]) -> Result<ExecResult>;

    /// Run a command, allowing failure (returns the result without bailing).
    ///
    /// # Errors
    ///
    /// Returns an error only if the process cannot be spawned.
    fn run_unchecked(&self, program: &str, args: &[&str]) -> Result<ExecResult>;

    /// Check if a program is available on `PATH`.
    fn which(&self, program: &str) -> bool;
}

/// Production [`Executor`] backed by [`std::process::Command`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemExecutor;

impl Executor for SystemExecutor {
    fn run(&self, program: &str, args: &[&str]) -> Result<ExecResult> {
        let result = self.run_unchecked(program, args)?;
        if !result.success {
            bail!(
                "{program} failed (exit {}): {}",
                result.code.unwrap_or(-1),
                result.stderr.trim()
            );
        }
        Ok(result)
    }

    fn run_unchecked(&self, program: &str, args: &[&str]) -> Result<ExecResult> {
        let output = Command::new(program)
            .args(args)
            .output()
            .with_context(|| format!("failed to execute: {program}"))?;
        Ok(ExecResult::from(output))
    }

    fn which(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn run_echo() {
        let result = SystemExecutor.run("echo", &["hello"]).unwrap();
        assert!(result.success, "echo command should succeed");
        assert_eq!(result.stdout.trim(), "hello");
    }

    #[cfg(unix)]
    #[test]
    fn run_failure() {
        let result = SystemExecutor.run("false", &[]);
        assert!(result.is_err(), "non-zero exit should produce an error");
    }

    #[cfg(unix)]
    #[test]
    fn run_unchecked_failure() {
        let result = SystemExecutor.run_unchecked("false", &[]).unwrap();
        assert!(!result.success, "non-zero exit should set success=false");
        assert_eq!(result.code, Some(1));
    }

    #[test]
    fn run_unchecked_missing_program_is_error() {
        let result = SystemExecutor.run_unchecked("this-program-does-not-exist-12345", &[]);
        assert!(result.is_err(), "spawn failure should be an error");
    }

    #[cfg(unix)]
    #[test]
    fn which_finds_known_program() {
        assert!(SystemExecutor.which("sh"), "sh should be found on Unix");
    }

    #[test]
    fn which_missing_program() {
        assert!(
            !SystemExecutor.which("this-program-does-not-exist-12345"),
            "non-existent program should not be found"
        );
    }

    #[cfg(unix)]
    #[test]
    fn arguments_are_not_shell_interpreted() {
        let result = SystemExecutor.run("echo", &["$HOME;", "a b"]).unwrap();
        assert_eq!(result.stdout.trim(), "$HOME; a b");
    }
}
