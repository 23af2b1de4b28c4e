//! Synchronous reconciliation passes, one store transaction each.
//!
//! Every pass either commits all of its writes or none of them. Nothing here
//! awaits, so a transaction is never held across a suspension point.

use std::collections::HashSet;

use itertools::{Either, Itertools};
use tracing::{debug, warn};

use crate::config::{DeletionPolicy, StaleLinkPolicy};
use crate::error::{ImportError, Result};
use crate::model::{
    EntityKind, EventRecord, RankingsText, RecordBatch, RecordFailure, TeamRecord,
};
use crate::store::ObjectStore;

use super::report::{ImportKind, ImportReport};

/// A remote record that can be validated before it is written.
pub(crate) trait Normalize: Sized {
    fn key(&self) -> &str;

    fn normalized(self) -> std::result::Result<Self, String>;
}

impl Normalize for EventRecord {
    fn key(&self) -> &str {
        &self.key
    }

    fn normalized(self) -> std::result::Result<Self, String> {
        self.normalize()
    }
}

impl Normalize for TeamRecord {
    fn key(&self) -> &str {
        &self.key
    }

    fn normalized(self) -> std::result::Result<Self, String> {
        self.normalize()
    }
}

/// Drop malformed records from a batch, tallying them on the report.
fn valid_records<T: Normalize>(batch: RecordBatch<T>, report: &mut ImportReport) -> Vec<T> {
    let (records, failures): (Vec<T>, Vec<RecordFailure>) =
        batch
            .into_iter()
            .enumerate()
            .partition_map(|(index, entry)| {
                let normalized = entry.and_then(|record| {
                    let key = record.key().trim().to_string();
                    record
                        .normalized()
                        .map_err(|reason| RecordFailure::new(index, Some(key), reason))
                });
                match normalized {
                    Ok(record) => Either::Left(record),
                    Err(failure) => Either::Right(failure),
                }
            });

    for failure in &failures {
        warn!(
            kind = %report.kind,
            index = failure.index,
            key = failure.key.as_deref().unwrap_or("?"),
            reason = %failure.reason,
            "skipping malformed record"
        );
    }
    report.failures.extend(failures);
    records
}

pub(crate) fn events(
    store: &dyn ObjectStore,
    batch: RecordBatch<EventRecord>,
    deletions: DeletionPolicy,
) -> Result<ImportReport> {
    let mut report = ImportReport::new(ImportKind::Events, batch.len());
    let records = valid_records(batch, &mut report);

    let mut tx = store.begin()?;
    let mut seen = HashSet::new();
    let mut seasons = HashSet::new();
    for record in &records {
        report.record(tx.upsert_event(record)?);
        seen.insert(record.key.as_str());
        seasons.extend(record.year);
    }

    if deletions == DeletionPolicy::MirrorRemote {
        if report.is_partial() {
            warn!(failures = report.failures.len(), "batch incomplete, not deleting events");
        } else {
            // The listing covers only the seasons it contains.
            for key in tx.event_keys()? {
                if seen.contains(key.as_str()) {
                    continue;
                }
                let listed_season = tx
                    .find_event(&key)?
                    .is_some_and(|event| seasons.contains(&event.year));
                if listed_season && tx.delete_event(&key)? {
                    debug!(key = %key, "deleted event no longer listed");
                    report.deleted += 1;
                }
            }
        }
    }

    tx.commit()?;
    Ok(report)
}

pub(crate) fn teams(
    store: &dyn ObjectStore,
    batch: RecordBatch<TeamRecord>,
    deletions: DeletionPolicy,
) -> Result<ImportReport> {
    let mut report = ImportReport::new(ImportKind::Teams, batch.len());
    let records = valid_records(batch, &mut report);

    let mut tx = store.begin()?;
    let mut seen = HashSet::new();
    for record in &records {
        report.record(tx.upsert_team(record)?);
        seen.insert(record.key.as_str());
    }

    if deletions == DeletionPolicy::MirrorRemote {
        if report.is_partial() {
            warn!(failures = report.failures.len(), "batch incomplete, not deleting teams");
        } else {
            for key in tx.team_keys()? {
                if !seen.contains(key.as_str()) && tx.delete_team(&key)? {
                    debug!(key = %key, "deleted team no longer listed");
                    report.deleted += 1;
                }
            }
        }
    }

    tx.commit()?;
    Ok(report)
}

pub(crate) fn event_teams(
    store: &dyn ObjectStore,
    event_key: &str,
    batch: RecordBatch<TeamRecord>,
    stale_links: StaleLinkPolicy,
) -> Result<ImportReport> {
    let mut report = ImportReport::new(ImportKind::EventTeams, batch.len());
    let records = valid_records(batch, &mut report);

    let mut tx = store.begin()?;
    if tx.find_event(event_key)?.is_none() {
        return Err(ImportError::NotFound {
            kind: EntityKind::Event,
            key: event_key.to_string(),
        });
    }

    let previous: HashSet<String> = tx.linked_team_keys(event_key)?.into_iter().collect();
    let mut current = HashSet::new();
    for record in &records {
        report.record(tx.upsert_team(record)?);
        if tx.link(event_key, &record.key)? {
            report.linked += 1;
        }
        current.insert(record.key.clone());
    }

    match stale_links {
        StaleLinkPolicy::Keep => {}
        StaleLinkPolicy::Remove if report.is_partial() => {
            warn!(
                failures = report.failures.len(),
                "batch incomplete, keeping stale links"
            );
        }
        StaleLinkPolicy::Remove => {
            for key in previous.difference(&current).sorted() {
                if tx.unlink(event_key, key)? {
                    debug!(team = %key, "removed stale link");
                    report.unlinked += 1;
                }
            }
        }
    }

    tx.commit()?;
    Ok(report)
}

pub(crate) fn rankings(
    store: &dyn ObjectStore,
    event_key: &str,
    rankings: &RankingsText,
) -> Result<ImportReport> {
    let mut report = ImportReport::new(ImportKind::Rankings, 1);
    let mut tx = store.begin()?;
    let event = tx.find_event(event_key)?.ok_or_else(|| ImportError::NotFound {
        kind: EntityKind::Event,
        key: event_key.to_string(),
    })?;

    if event.rankings.as_ref() == Some(rankings) {
        report.unchanged = 1;
        return Ok(report);
    }

    tx.set_rankings(event_key, rankings)?;
    tx.commit()?;
    report.updated = 1;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_valid_records_reports_each_failure() {
        let mut bad_key = TeamRecord::new(254, "The Cheesy Poofs");
        bad_key.key = "254".to_string();
        let batch: RecordBatch<TeamRecord> = vec![
            Ok(TeamRecord::new(971, "Spartan Robotics")),
            Err(RecordFailure::new(1, None, "missing field `key`")),
            Ok(bad_key),
        ];

        let mut report = ImportReport::new(ImportKind::Teams, batch.len());
        let records = valid_records(batch, &mut report);

        assert_eq!(records.len(), 1);
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.failures[1].index, 2);
        assert_eq!(report.failures[1].key.as_deref(), Some("254"));
    }

    #[test]
    fn test_event_teams_requires_event() {
        let store = MemoryStore::new();
        let batch = vec![Ok(TeamRecord::new(254, "The Cheesy Poofs"))];

        let err = event_teams(&store, "2016casj", batch, StaleLinkPolicy::Keep).unwrap_err();
        assert!(err.is_not_found());
        assert!(store.teams().unwrap().is_empty());
    }

    #[test]
    fn test_rankings_requires_event() {
        let store = MemoryStore::new();
        let err = rankings(&store, "2016casj", &RankingsText::new("null")).unwrap_err();
        assert!(matches!(
            err,
            ImportError::NotFound {
                kind: EntityKind::Event,
                ..
            }
        ));
    }

    #[test]
    fn test_mirror_remote_keeps_other_seasons() {
        let store = MemoryStore::new();
        let batch = vec![Ok(EventRecord::new("2016casj", "Silicon Valley"))];
        events(&store, batch, DeletionPolicy::MirrorRemote).unwrap();
        rankings(&store, "2016casj", &RankingsText::new("null")).unwrap();

        let batch = vec![Ok(EventRecord::new("2017casj", "Silicon Valley"))];
        let report = events(&store, batch, DeletionPolicy::MirrorRemote).unwrap();

        assert_eq!(report.deleted, 0);
        let kept = store.event("2016casj").unwrap().unwrap();
        assert_eq!(kept.rankings, Some(RankingsText::new("null")));
        assert_eq!(store.events().unwrap().len(), 2);

        let batch = vec![Ok(EventRecord::new("2017cada", "Sacramento"))];
        let report = events(&store, batch, DeletionPolicy::MirrorRemote).unwrap();
        assert_eq!(report.deleted, 1);
        assert!(store.event("2017casj").unwrap().is_none());
        assert!(store.event("2016casj").unwrap().is_some());
    }

    #[test]
    fn test_identical_rankings_are_unchanged() {
        let store = MemoryStore::new();
        events(
            &store,
            vec![Ok(EventRecord::new("2016casj", "Silicon Valley"))],
            DeletionPolicy::KeepLocal,
        )
        .unwrap();

        let first = rankings(&store, "2016casj", &RankingsText::new("standings")).unwrap();
        assert_eq!(first.updated, 1);
        assert!(first.changed_store());

        let again = rankings(&store, "2016casj", &RankingsText::new("standings")).unwrap();
        assert_eq!(again.updated, 0);
        assert_eq!(again.unchanged, 1);
        assert!(!again.changed_store());

        let newer = rankings(&store, "2016casj", &RankingsText::new("newer")).unwrap();
        assert_eq!(newer.updated, 1);
        let stored = store.event("2016casj").unwrap().unwrap();
        assert_eq!(stored.rankings, Some(RankingsText::new("newer")));
    }
}
