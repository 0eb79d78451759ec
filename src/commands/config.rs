//! `dotlink config update` and `dotlink config cleanup`.
use std::sync::Arc;

use anyhow::Result;

use crate::cli::{ConfigCommand, GlobalOpts};
use crate::config::manifest::LinkManifest;
use crate::logging::Logger;
use crate::tasks::Task;
use crate::tasks::cleanup::RemoveBrokenLinks;
use crate::tasks::links::UpdateLinks;

/// Tasks run by a `config` action, in order.
#[must_use]
pub fn tasks_for(action: ConfigCommand, manifest: LinkManifest) -> Vec<Box<dyn Task>> {
    match action {
        ConfigCommand::Update => vec![Box::new(UpdateLinks::new(manifest))],
        ConfigCommand::Cleanup => vec![Box::new(RemoveBrokenLinks::new(manifest))],
    }
}

/// Run a `config` action.
///
/// # Errors
///
/// Returns an error if the manifest cannot be loaded or any entry failed.
pub fn run(global: &GlobalOpts, action: ConfigCommand, log: &Arc<Logger>) -> Result<()> {
    let manifest = super::load_manifest(global, log)?;
    let ctx = super::command_context(global, log);
    let tasks = tasks_for(action, manifest);
    super::run_tasks_to_completion(tasks.iter().map(Box::as_ref), &ctx, log)
}
