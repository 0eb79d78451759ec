use super::context::Context;
use crate::resources::{Resource, ResourceChange, ResourceState};

/// Result of a single task execution.
///
/// # Examples
///
/// ```
/// use dotlink::tasks::TaskResult;
///
/// let ok = TaskResult::Ok;
/// let skipped = TaskResult::Skipped("duti not installed".into());
///
/// assert!(matches!(ok, TaskResult::Ok));
/// assert!(matches!(skipped, TaskResult::Skipped(_)));
/// ```
#[derive(Debug, Clone)]
pub enum TaskResult {
    /// Task completed successfully.
    Ok,
    /// Task was skipped (a required tool or document is missing).
    Skipped(String),
    /// Task ran in dry-run mode.
    DryRun,
}

/// Counters for batch tasks that process many items.
///
/// # Examples
///
/// ```
/// use dotlink::tasks::TaskStats;
///
/// let stats = TaskStats { changed: 1, already_ok: 2, skipped: 3 };
/// assert_eq!(stats.summary(false), "1 changed, 2 already ok, 3 skipped");
/// assert_eq!(stats.summary(true), "1 would change, 2 already ok, 3 skipped");
/// ```
#[derive(Debug, Default)]
pub struct TaskStats {
    /// Number of items changed or applied.
    pub changed: u32,
    /// Number of items already in the correct state.
    pub already_ok: u32,
    /// Number of items that failed and were skipped.
    pub skipped: u32,
}

impl TaskStats {
    /// Create a new empty stats counter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Format the summary string (e.g. "3 changed, 10 already ok, 1 skipped").
    #[must_use]
    pub fn summary(&self, dry_run: bool) -> String {
        let verb = if dry_run { "would change" } else { "changed" };
        if self.skipped > 0 {
            format!(
                "{} {verb}, {} already ok, {} skipped",
                self.changed, self.already_ok, self.skipped
            )
        } else {
            format!("{} {verb}, {} already ok", self.changed, self.already_ok)
        }
    }

    /// Count one processed resource.
    pub const fn record(&mut self, processed: &Processed) {
        match processed {
            Processed::AlreadyCorrect => self.already_ok += 1,
            Processed::WouldChange | Processed::Changed(_) => self.changed += 1,
        }
    }

    /// Log the summary and return the appropriate `TaskResult`.
    #[must_use]
    pub fn finish(self, ctx: &Context) -> TaskResult {
        ctx.log.info(&self.summary(ctx.dry_run));
        if ctx.dry_run {
            TaskResult::DryRun
        } else {
            TaskResult::Ok
        }
    }
}

/// What [`process_single`] did with one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Processed {
    /// Nothing to do.
    AlreadyCorrect,
    /// Dry run: the change was logged, not applied.
    WouldChange,
    /// The change was applied.
    Changed(ResourceChange),
}

/// Check one resource and apply it if needed, honouring dry-run.
///
/// # Errors
///
/// Propagates errors from [`Resource::current_state`] and
/// [`Resource::apply`].
pub fn process_single<R: Resource>(
    ctx: &Context,
    resource: &R,
    verb: &str,
) -> Result<Processed, R::Error> {
    let desc = resource.description();
    let state = resource.current_state()?;

    if state == ResourceState::Correct {
        ctx.log.debug(&format!("ok: {desc}"));
        return Ok(Processed::AlreadyCorrect);
    }

    if ctx.dry_run {
        let msg = match &state {
            ResourceState::Incorrect { current } => {
                format!("would {verb} {desc} (currently {current})")
            }
            _ => format!("would {verb}: {desc}"),
        };
        ctx.log.dry_run(&msg);
        return Ok(Processed::WouldChange);
    }

    let change = resource.apply()?;
    match &change {
        ResourceChange::Applied => ctx.log.debug(&format!("{verb}: {desc}")),
        ResourceChange::Replaced { backup } => ctx.log.info(&format!(
            "{verb}: {desc} (backup at {})",
            backup.display()
        )),
    }
    Ok(Processed::Changed(change))
}
