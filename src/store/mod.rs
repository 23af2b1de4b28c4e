//! The local object store the importer writes into.
//!
//! A store hands out one [`StoreTransaction`] at a time. Writers are
//! serialized for the lifetime of the transaction, and a transaction that is
//! dropped without [`commit`](StoreTransaction::commit) leaves the store as it
//! found it.

mod memory;
mod sqlite;

use itertools::Itertools;

use crate::model::{EntityKind, Event, EventRecord, RankingsText, Team, TeamRecord};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Failures raised by a store backend.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// A SQLite statement failed.
    #[error("sqlite failed to {operation}: {source}")]
    Sqlite {
        operation: &'static str,
        source: rusqlite::Error,
    },

    /// The database was created by an incompatible version of this crate.
    #[error("unsupported schema version {found}, expected {expected}")]
    SchemaVersion { found: i64, expected: i64 },

    /// A writer panicked while holding the store lock.
    #[error("store lock poisoned")]
    Poisoned,

    /// The operation requires an entity that is not in the store.
    #[error("{kind} {key} does not exist")]
    Missing { kind: EntityKind, key: String },
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// What an upsert did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum UpsertOutcome {
    Created,
    Updated,
    Unchanged,
}

/// A unit of work against the store, rolled back on drop unless committed.
///
/// Records passed to the upsert methods are expected to be normalized.
pub trait StoreTransaction {
    fn find_event(&self, key: &str) -> StoreResult<Option<Event>>;

    fn find_team(&self, key: &str) -> StoreResult<Option<Team>>;

    /// Insert the event, or update its mutable fields if the key exists.
    /// The rankings payload of an existing event is preserved.
    fn upsert_event(&mut self, record: &EventRecord) -> StoreResult<UpsertOutcome>;

    fn upsert_team(&mut self, record: &TeamRecord) -> StoreResult<UpsertOutcome>;

    /// Attach a team to an event. Returns `false` if the link already existed.
    ///
    /// Both ends must exist, otherwise [`StoreError::Missing`].
    fn link(&mut self, event_key: &str, team_key: &str) -> StoreResult<bool>;

    /// Returns `false` if there was no such link.
    fn unlink(&mut self, event_key: &str, team_key: &str) -> StoreResult<bool>;

    /// Keys of teams linked to the event, sorted.
    fn linked_team_keys(&self, event_key: &str) -> StoreResult<Vec<String>>;

    /// Keys of events the team is linked to, sorted.
    fn linked_event_keys(&self, team_key: &str) -> StoreResult<Vec<String>>;

    fn link_count(&self) -> StoreResult<usize>;

    /// All event keys, sorted.
    fn event_keys(&self) -> StoreResult<Vec<String>>;

    /// All team keys, sorted.
    fn team_keys(&self) -> StoreResult<Vec<String>>;

    /// Replace the rankings payload of an existing event.
    fn set_rankings(&mut self, event_key: &str, rankings: &RankingsText) -> StoreResult<()>;

    /// Delete an event and its links. Returns `false` if it did not exist.
    fn delete_event(&mut self, key: &str) -> StoreResult<bool>;

    /// Delete a team and its links. Returns `false` if it did not exist.
    fn delete_team(&mut self, key: &str) -> StoreResult<bool>;

    fn commit(self: Box<Self>) -> StoreResult<()>;
}

/// A transactional store of events, teams and the links between them.
///
/// The read helpers open a transaction, read, and drop it again; they see
/// only committed state.
pub trait ObjectStore: Send + Sync {
    /// Open a transaction, waiting for any other writer to finish.
    fn begin(&self) -> StoreResult<Box<dyn StoreTransaction + '_>>;

    fn event(&self, key: &str) -> StoreResult<Option<Event>> {
        self.begin()?.find_event(key)
    }

    fn team(&self, key: &str) -> StoreResult<Option<Team>> {
        self.begin()?.find_team(key)
    }

    fn events(&self) -> StoreResult<Vec<Event>> {
        let tx = self.begin()?;
        let keys = tx.event_keys()?;
        keys.iter()
            .map(|key| tx.find_event(key))
            .flatten_ok()
            .collect()
    }

    fn teams(&self) -> StoreResult<Vec<Team>> {
        let tx = self.begin()?;
        let keys = tx.team_keys()?;
        keys.iter()
            .map(|key| tx.find_team(key))
            .flatten_ok()
            .collect()
    }

    fn teams_for_event(&self, event_key: &str) -> StoreResult<Vec<Team>> {
        let tx = self.begin()?;
        let keys = tx.linked_team_keys(event_key)?;
        keys.iter()
            .map(|key| tx.find_team(key))
            .flatten_ok()
            .collect()
    }

    fn events_for_team(&self, team_key: &str) -> StoreResult<Vec<Event>> {
        let tx = self.begin()?;
        let keys = tx.linked_event_keys(team_key)?;
        keys.iter()
            .map(|key| tx.find_event(key))
            .flatten_ok()
            .collect()
    }
}

/// Behaviour every backend must share. Run by each backend's own tests.
#[cfg(test)]
pub(crate) mod conformance {
    use super::*;

    pub(crate) fn event(key: &str, name: &str) -> EventRecord {
        EventRecord::new(key, name).normalize().unwrap()
    }

    pub(crate) fn team(number: u32, nickname: &str) -> TeamRecord {
        TeamRecord::new(number, nickname).normalize().unwrap()
    }

    pub(crate) fn upsert_converges(store: &dyn ObjectStore) {
        let mut tx = store.begin().unwrap();
        assert_eq!(
            tx.upsert_event(&event("2016casj", "Silicon Valley")).unwrap(),
            UpsertOutcome::Created
        );
        assert_eq!(
            tx.upsert_event(&event("2016casj", "Silicon Valley")).unwrap(),
            UpsertOutcome::Unchanged
        );
        assert_eq!(
            tx.upsert_event(&event("2016casj", "Silicon Valley Regional")).unwrap(),
            UpsertOutcome::Updated
        );
        tx.commit().unwrap();

        let events = store.events().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, "Silicon Valley Regional");
        assert_eq!(events[0].year, 2016);
    }

    pub(crate) fn drop_rolls_back(store: &dyn ObjectStore) {
        {
            let mut tx = store.begin().unwrap();
            tx.upsert_team(&team(254, "The Cheesy Poofs")).unwrap();
            assert!(tx.find_team("frc254").unwrap().is_some());
        }
        assert!(store.team("frc254").unwrap().is_none());

        let mut tx = store.begin().unwrap();
        tx.upsert_team(&team(254, "The Cheesy Poofs")).unwrap();
        tx.commit().unwrap();
        assert!(store.team("frc254").unwrap().is_some());
    }

    pub(crate) fn links_are_unique(store: &dyn ObjectStore) {
        let mut tx = store.begin().unwrap();
        tx.upsert_event(&event("2016casj", "Silicon Valley")).unwrap();
        tx.upsert_team(&team(254, "The Cheesy Poofs")).unwrap();
        tx.upsert_team(&team(971, "Spartan Robotics")).unwrap();
        assert!(tx.link("2016casj", "frc254").unwrap());
        assert!(!tx.link("2016casj", "frc254").unwrap());
        assert!(tx.link("2016casj", "frc971").unwrap());
        assert_eq!(tx.link_count().unwrap(), 2);

        let missing = tx.link("2016casj", "frc1678").unwrap_err();
        assert!(matches!(missing, StoreError::Missing { kind: EntityKind::Team, .. }));
        let missing = tx.link("2016sfo", "frc254").unwrap_err();
        assert!(matches!(missing, StoreError::Missing { kind: EntityKind::Event, .. }));
        tx.commit().unwrap();

        let teams = store.teams_for_event("2016casj").unwrap();
        let keys: Vec<&str> = teams.iter().map(|t| t.key.as_str()).collect();
        assert_eq!(keys, ["frc254", "frc971"]);
        let events = store.events_for_team("frc254").unwrap();
        assert_eq!(events.len(), 1);

        let mut tx = store.begin().unwrap();
        assert!(tx.unlink("2016casj", "frc971").unwrap());
        assert!(!tx.unlink("2016casj", "frc971").unwrap());
        tx.commit().unwrap();
        assert_eq!(store.teams_for_event("2016casj").unwrap().len(), 1);
    }

    pub(crate) fn rankings_survive_upsert(store: &dyn ObjectStore) {
        let mut tx = store.begin().unwrap();
        tx.upsert_event(&event("2016casj", "Silicon Valley")).unwrap();
        tx.set_rankings("2016casj", &RankingsText::new("first")).unwrap();
        tx.set_rankings("2016casj", &RankingsText::new("second")).unwrap();
        tx.upsert_event(&event("2016casj", "Silicon Valley Regional")).unwrap();

        let missing = tx.set_rankings("2016sfo", &RankingsText::new("x")).unwrap_err();
        assert!(matches!(missing, StoreError::Missing { .. }));
        tx.commit().unwrap();

        let stored = store.event("2016casj").unwrap().unwrap();
        assert_eq!(stored.rankings, Some(RankingsText::new("second")));
        assert_eq!(stored.name, "Silicon Valley Regional");
    }

    pub(crate) fn delete_cascades_links(store: &dyn ObjectStore) {
        let mut tx = store.begin().unwrap();
        tx.upsert_event(&event("2016casj", "Silicon Valley")).unwrap();
        tx.upsert_event(&event("2016sfo", "San Francisco")).unwrap();
        tx.upsert_team(&team(254, "The Cheesy Poofs")).unwrap();
        tx.link("2016casj", "frc254").unwrap();
        tx.link("2016sfo", "frc254").unwrap();

        assert!(tx.delete_event("2016casj").unwrap());
        assert!(!tx.delete_event("2016casj").unwrap());
        assert_eq!(tx.link_count().unwrap(), 1);

        assert!(tx.delete_team("frc254").unwrap());
        assert_eq!(tx.link_count().unwrap(), 0);
        assert_eq!(tx.event_keys().unwrap(), ["2016sfo"]);
        assert!(tx.team_keys().unwrap().is_empty());
        tx.commit().unwrap();
    }

    pub(crate) fn run_all(make: impl Fn() -> Box<dyn ObjectStore>) {
        upsert_converges(make().as_ref());
        drop_rolls_back(make().as_ref());
        links_are_unique(make().as_ref());
        rankings_survive_upsert(make().as_ref());
        delete_cascades_links(make().as_ref());
    }
}
