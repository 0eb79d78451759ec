//! `dotlink mac update`.
use std::sync::Arc;

use anyhow::Result;

use crate::cli::GlobalOpts;
use crate::config::macos::MacosSettings;
use crate::config::{DEFAULT_MACOS_SETTINGS, find_default};
use crate::logging::{Log, Logger};
use crate::tasks::Task;
use crate::tasks::macos::{ApplyDefaults, SetDefaultApps};

/// Tasks run by `mac update`, in order.
#[must_use]
pub fn tasks_for(settings: MacosSettings) -> Vec<Box<dyn Task>> {
    vec![
        Box::new(ApplyDefaults::new(settings.clone())),
        Box::new(SetDefaultApps::new(settings)),
    ]
}

/// Run `mac update`.
///
/// # Errors
///
/// Returns an error if the settings document cannot be loaded or any
/// preference could not be applied.
pub fn run(global: &GlobalOpts, log: &Arc<Logger>) -> Result<()> {
    let root = super::resolve_root(global)?;
    let path = find_default(&root, DEFAULT_MACOS_SETTINGS)?;

    log.stage("Loading macOS settings");
    log.debug(&format!("settings: {}", path.display()));
    let settings = MacosSettings::load(&path)?;

    let ctx = super::command_context(global, log);
    let tasks = tasks_for(settings);
    super::run_tasks_to_completion(tasks.iter().map(Box::as_ref), &ctx, log)
}
