//! Command-line interface definition.
use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Top-level CLI entry point for dotlink.
#[derive(Parser, Debug)]
#[command(
    name = "dotlink",
    about = "Declarative dotfiles symlink manager and macOS bootstrap tool",
    version
)]
pub struct Cli {
    /// The action to run.
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Options shared by every subcommand.
    #[command(flatten)]
    pub global: GlobalOpts,
}

impl Cli {
    /// Name used for the per-command log file.
    #[must_use]
    pub const fn log_name(&self) -> &'static str {
        match &self.command {
            Command::Config(ConfigCommand::Update) => "config-update",
            Command::Config(ConfigCommand::Cleanup) => "config-cleanup",
            Command::Mac(MacCommand::Update) => "mac-update",
            Command::Version => "version",
        }
    }
}

/// Options shared across all subcommands.
#[derive(Parser, Debug, Clone, Default)]
pub struct GlobalOpts {
    /// Preview changes without applying
    #[arg(short = 'd', long, global = true)]
    pub dry_run: bool,

    /// Override dotfiles root directory (default: $DOTLINK_ROOT, then the current directory)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Manifest file (default: links.toml or links.json under the root)
    #[arg(short, long, global = true)]
    pub manifest: Option<PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Manage linked configuration files
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Manage macOS preferences
    #[command(subcommand)]
    Mac(MacCommand),
    /// Print version information
    Version,
}

/// `dotlink config ...`
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Link every manifest entry into place
    Update,
    /// Remove dangling symlinks at manifest targets
    Cleanup,
}

/// `dotlink mac ...`
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacCommand {
    /// Apply macOS defaults and default applications
    Update,
}
