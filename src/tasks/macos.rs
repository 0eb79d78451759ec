//! macOS preference tasks.
use std::collections::BTreeSet;

use anyhow::{Result, bail};

use super::processing::{Processed, TaskStats, process_single};
use super::{Context, Task, TaskResult};
use crate::config::macos::{MacosSettings, restart_target};
use crate::resources::Resource as _;
use crate::resources::defaults::{DefaultAppResource, DefaultsResource};

/// Write `defaults` keys and restart the services that read them.
#[derive(Debug)]
pub struct ApplyDefaults {
    settings: MacosSettings,
}

impl ApplyDefaults {
    /// Create the task for a loaded settings document.
    #[must_use]
    pub const fn new(settings: MacosSettings) -> Self {
        Self { settings }
    }
}

impl Task for ApplyDefaults {
    fn name(&self) -> &'static str {
        "Apply macOS defaults"
    }

    fn should_run(&self, ctx: &Context) -> bool {
        ctx.platform.is_macos()
    }

    fn run(&self, ctx: &Context) -> Result<TaskResult> {
        let mut stats = TaskStats::new();
        let mut restarts = BTreeSet::new();

        for (section, domains) in &self.settings.settings {
            for domain in domains {
                for (key, value) in &domain.settings {
                    let resource = DefaultsResource::new(
                        domain.domain.clone(),
                        key.clone(),
                        value.clone(),
                        domain.needs_sudo(),
                        ctx.executor.as_ref(),
                    );
                    match process_single(ctx, &resource, "set") {
                        Ok(processed) => {
                            if processed != Processed::AlreadyCorrect
                                && let Some(service) = restart_target(section)
                            {
                                restarts.insert(service);
                            }
                            stats.record(&processed);
                        }
                        Err(e) => {
                            ctx.log
                                .warn(&format!("failed to set {}: {e:#}", resource.description()));
                            stats.skipped += 1;
                        }
                    }
                }
            }
        }

        restart_services(ctx, &restarts);

        if stats.skipped > 0 {
            bail!("{} preference(s) could not be set", stats.skipped);
        }
        Ok(stats.finish(ctx))
    }
}

/// `killall` each service. Failures only warn.
fn restart_services(ctx: &Context, services: &BTreeSet<&str>) {
    for service in services {
        if ctx.dry_run {
            ctx.log.dry_run(&format!("would restart {service}"));
            continue;
        }
        ctx.log.debug(&format!("restarting {service}"));
        match ctx.executor.run_unchecked("killall", &[service]) {
            Ok(result) if result.success => {}
            Ok(result) => ctx.log.warn(&format!(
                "could not restart {service}: {}",
                result.stderr.trim()
            )),
            Err(e) => ctx.log.warn(&format!("could not restart {service}: {e:#}")),
        }
    }
}

/// Register default handler applications with `duti`.
#[derive(Debug)]
pub struct SetDefaultApps {
    settings: MacosSettings,
}

impl SetDefaultApps {
    /// Create the task for a loaded settings document.
    #[must_use]
    pub const fn new(settings: MacosSettings) -> Self {
        Self { settings }
    }
}

impl Task for SetDefaultApps {
    fn name(&self) -> &'static str {
        "Set default applications"
    }

    fn should_run(&self, ctx: &Context) -> bool {
        ctx.platform.is_macos() && !self.settings.default_apps.is_empty()
    }

    fn run(&self, ctx: &Context) -> Result<TaskResult> {
        if !ctx.executor.which("duti") {
            return Ok(TaskResult::Skipped("duti not installed".to_string()));
        }

        let mut stats = TaskStats::new();
        for (app, types) in &self.settings.default_apps {
            for file_type in types {
                let resource =
                    DefaultAppResource::new(app.clone(), file_type.clone(), ctx.executor.as_ref());
                match process_single(ctx, &resource, "set handler") {
                    Ok(processed) => stats.record(&processed),
                    Err(e) => {
                        ctx.log.warn(&format!(
                            "failed to set handler {}: {e:#}",
                            resource.description()
                        ));
                        stats.skipped += 1;
                    }
                }
            }
        }

        if stats.skipped > 0 {
            bail!("{} handler(s) could not be set", stats.skipped);
        }
        Ok(stats.finish(ctx))
    }
}
