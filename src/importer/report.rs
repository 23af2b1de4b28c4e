use serde::Serialize;

use crate::model::RecordFailure;
use crate::store::UpsertOutcome;

/// The four import operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum_macros::Display)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum ImportKind {
    Events,
    Teams,
    EventTeams,
    Rankings,
}

/// What one import run did to the local store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub kind: ImportKind,
    /// Records the remote source returned, malformed ones included.
    pub fetched: usize,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Event-team links that did not exist before.
    pub linked: usize,
    /// Stale event-team links removed.
    pub unlinked: usize,
    /// Local records removed because the remote no longer lists them.
    pub deleted: usize,
    /// Records that were skipped.
    pub failures: Vec<RecordFailure>,
}

impl ImportReport {
    pub(crate) fn new(kind: ImportKind, fetched: usize) -> Self {
        Self {
            kind,
            fetched,
            created: 0,
            updated: 0,
            unchanged: 0,
            linked: 0,
            unlinked: 0,
            deleted: 0,
            failures: Vec::new(),
        }
    }

    pub(crate) fn record(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Created => self.created += 1,
            UpsertOutcome::Updated => self.updated += 1,
            UpsertOutcome::Unchanged => self.unchanged += 1,
        }
    }

    /// Records written or confirmed unchanged.
    pub fn upserted(&self) -> usize {
        self.created + self.updated + self.unchanged
    }

    /// Whether any record was skipped.
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Whether the run changed anything in the store.
    pub fn changed_store(&self) -> bool {
        self.created + self.updated + self.linked + self.unlinked + self.deleted > 0
    }
}

/// The latest known outcome of an import, for callers that need to tell
/// "no data yet" apart from "failed" and "succeeded".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ImportStatus {
    #[default]
    NotStarted,
    Failed(String),
    Succeeded(ImportReport),
}

impl ImportStatus {
    pub fn is_succeeded(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_tallies() {
        let mut report = ImportReport::new(ImportKind::Teams, 4);
        report.record(UpsertOutcome::Created);
        report.record(UpsertOutcome::Unchanged);
        report.record(UpsertOutcome::Updated);
        assert_eq!(report.upserted(), 3);
        assert!(report.changed_store());
        assert!(!report.is_partial());

        report.failures.push(RecordFailure::new(3, None, "missing field `key`"));
        assert!(report.is_partial());
        assert_eq!(report.kind.to_string(), "teams");
        assert_eq!(ImportKind::EventTeams.to_string(), "event-teams");
    }

    #[test]
    fn test_unchanged_run() {
        let mut report = ImportReport::new(ImportKind::Events, 1);
        report.record(UpsertOutcome::Unchanged);
        assert!(!report.changed_store());
        assert_eq!(ImportStatus::default(), ImportStatus::NotStarted);
    }
}
