//! Per-entry outcomes of a reconciliation or cleanup run.
use std::fmt;
use std::path::PathBuf;

use crate::error::EntryError;

/// Identifies a manifest entry in reports and log lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryId {
    /// The `index`-th (zero-based) link entry.
    Link {
        /// Position in the manifest's `links` list.
        index: usize,
        /// The entry's `local` path.
        local: PathBuf,
    },
    /// The `index`-th (zero-based) file entry.
    File {
        /// Position in the manifest's `files` list.
        index: usize,
        /// The entry's target template, joined with `/`.
        target: String,
    },
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Link { index, local } => write!(f, "links[{index}] {}", local.display()),
            Self::File { index, target } => write!(f, "files[{index}] {target}"),
        }
    }
}

/// Final state of one entry.
#[derive(Debug)]
pub enum Outcome {
    /// The symlink was created (or would be, in a dry run).
    Linked,
    /// The file was written (or would be).
    Written,
    /// A dangling symlink was removed (or would be).
    Removed,
    /// Nothing was done.
    Skipped(String),
    /// The entry could not be brought into the desired state.
    Failed(EntryError),
}

impl Outcome {
    /// Whether this outcome counts against the run.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// One `(EntryId, Outcome)` pair.
#[derive(Debug)]
pub struct EntryReport {
    /// Which entry.
    pub id: EntryId,
    /// What happened.
    pub outcome: Outcome,
}

/// Ordered outcomes for every entry processed in one run.
#[derive(Debug, Default)]
pub struct ReconciliationResult {
    /// Outcomes in processing order.
    pub entries: Vec<EntryReport>,
    /// Whether the run only described its changes.
    pub dry_run: bool,
}

impl ReconciliationResult {
    /// Start an empty result.
    #[must_use]
    pub const fn new(dry_run: bool) -> Self {
        Self {
            entries: Vec::new(),
            dry_run,
        }
    }

    /// Append an outcome.
    pub fn push(&mut self, id: EntryId, outcome: Outcome) {
        self.entries.push(EntryReport { id, outcome });
    }

    /// Whether every entry succeeded.
    #[must_use]
    pub fn success(&self) -> bool {
        self.failed() == 0
    }

    /// Number of failed entries.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(Outcome::is_failure)
    }

    /// The failed entries and their errors.
    pub fn failures(&self) -> impl Iterator<Item = (&EntryId, &EntryError)> {
        self.entries.iter().filter_map(|e| match &e.outcome {
            Outcome::Failed(err) => Some((&e.id, err)),
            _ => None,
        })
    }

    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.entries.iter().filter(|e| pred(&e.outcome)).count()
    }

    /// One-line tally, e.g. `"2 linked, 1 written, 0 removed, 3 skipped, 0 failed"`.
    #[must_use]
    pub fn summary(&self) -> String {
        let linked = self.count(|o| matches!(o, Outcome::Linked));
        let written = self.count(|o| matches!(o, Outcome::Written));
        let removed = self.count(|o| matches!(o, Outcome::Removed));
        let skipped = self.count(|o| matches!(o, Outcome::Skipped(_)));
        let failed = self.failed();
        let tally = format!(
            "{linked} linked, {written} written, {removed} removed, {skipped} skipped, {failed} failed"
        );
        if self.dry_run {
            format!("{tally} (dry run)")
        } else {
            tally
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::error::LinkError;

    fn link(index: usize) -> EntryId {
        EntryId::Link {
            index,
            local: PathBuf::from("vimrc"),
        }
    }

    #[test]
    fn entry_id_display() {
        assert_eq!(link(0).to_string(), "links[0] vimrc");
        let file = EntryId::File {
            index: 2,
            target: "~/.config/app/env".to_string(),
        };
        assert_eq!(file.to_string(), "files[2] ~/.config/app/env");
    }

    #[test]
    fn empty_result_succeeds() {
        let result = ReconciliationResult::new(false);
        assert!(result.success());
        insta::assert_snapshot!(result.summary(), @"0 linked, 0 written, 0 removed, 0 skipped, 0 failed");
    }

    #[test]
    fn failure_makes_result_unsuccessful() {
        let mut result = ReconciliationResult::new(false);
        result.push(link(0), Outcome::Linked);
        result.push(
            link(1),
            Outcome::Failed(
                LinkError::SourceMissing {
                    path: PathBuf::from("/repo/nope"),
                }
                .into(),
            ),
        );
        result.push(link(2), Outcome::Skipped("already linked".to_string()));

        assert!(!result.success());
        assert_eq!(result.failed(), 1);
        let failures: Vec<_> = result.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, &link(1));
        insta::assert_snapshot!(result.summary(), @"1 linked, 0 written, 0 removed, 1 skipped, 1 failed");
    }

    #[test]
    fn dry_run_summary_is_marked() {
        let mut result = ReconciliationResult::new(true);
        result.push(link(0), Outcome::Linked);
        insta::assert_snapshot!(result.summary(), @"1 linked, 0 written, 0 removed, 0 skipped, 0 failed (dry run)");
    }
}
