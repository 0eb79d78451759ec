//! Declarative dotfiles linker.
//!
//! Reads a manifest of link and file entries, resolves each target path
//! from its template, and brings the filesystem into the described state:
//! existing targets are backed up and replaced with symlinks into the
//! repository, permissions and post-link commands are applied, and broken
//! links can be swept. On macOS it also applies `defaults` preferences and
//! default application handlers.
//!
//! The public API is organised into four layers:
//!
//! - **[`config`]**: load and validate the manifest and macOS settings
//! - **[`resources`]**: idempotent `check + apply` primitives (symlinks, files, modes, defaults)
//! - **[`tasks`]**: named units of work wired to resources, reporting per-entry outcomes
//! - **[`commands`]**: top-level subcommand orchestration (`config update`, `config cleanup`, `mac update`)
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod exec;
pub mod logging;
pub mod operations;
pub mod platform;
pub mod resources;
pub mod tasks;
