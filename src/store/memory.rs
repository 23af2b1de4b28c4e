use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use crate::model::{EntityKind, Event, EventRecord, RankingsText, Team, TeamRecord};

use super::{ObjectStore, StoreError, StoreResult, StoreTransaction, UpsertOutcome};

#[derive(Debug, Default, Clone)]
struct MemoryState {
    events: BTreeMap<String, Event>,
    teams: BTreeMap<String, Team>,
    /// (event key, team key)
    links: BTreeSet<(String, String)>,
}

/// Process-local store, useful for tests and short-lived tools.
///
/// A transaction works on a copy of the state and swaps it in on commit.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ObjectStore for MemoryStore {
    fn begin(&self) -> StoreResult<Box<dyn StoreTransaction + '_>> {
        let guard = self.state.lock().map_err(|_| StoreError::Poisoned)?;
        let working = guard.clone();
        Ok(Box::new(MemoryTransaction { guard, working }))
    }
}

struct MemoryTransaction<'a> {
    guard: MutexGuard<'a, MemoryState>,
    working: MemoryState,
}

impl MemoryTransaction<'_> {
    fn require_event(&self, key: &str) -> StoreResult<()> {
        if self.working.events.contains_key(key) {
            Ok(())
        } else {
            Err(StoreError::Missing {
                kind: EntityKind::Event,
                key: key.to_string(),
            })
        }
    }

    fn require_team(&self, key: &str) -> StoreResult<()> {
        if self.working.teams.contains_key(key) {
            Ok(())
        } else {
            Err(StoreError::Missing {
                kind: EntityKind::Team,
                key: key.to_string(),
            })
        }
    }
}

impl StoreTransaction for MemoryTransaction<'_> {
    fn find_event(&self, key: &str) -> StoreResult<Option<Event>> {
        Ok(self.working.events.get(key).cloned())
    }

    fn find_team(&self, key: &str) -> StoreResult<Option<Team>> {
        Ok(self.working.teams.get(key).cloned())
    }

    fn upsert_event(&mut self, record: &EventRecord) -> StoreResult<UpsertOutcome> {
        let outcome = match self.working.events.get_mut(&record.key) {
            Some(event) => {
                if event.apply(record) {
                    UpsertOutcome::Updated
                } else {
                    UpsertOutcome::Unchanged
                }
            }
            None => {
                self.working
                    .events
                    .insert(record.key.clone(), Event::from_record(record));
                UpsertOutcome::Created
            }
        };
        Ok(outcome)
    }

    fn upsert_team(&mut self, record: &TeamRecord) -> StoreResult<UpsertOutcome> {
        let outcome = match self.working.teams.get_mut(&record.key) {
            Some(team) => {
                if team.apply(record) {
                    UpsertOutcome::Updated
                } else {
                    UpsertOutcome::Unchanged
                }
            }
            None => {
                self.working
                    .teams
                    .insert(record.key.clone(), Team::from_record(record));
                UpsertOutcome::Created
            }
        };
        Ok(outcome)
    }

    fn link(&mut self, event_key: &str, team_key: &str) -> StoreResult<bool> {
        self.require_event(event_key)?;
        self.require_team(team_key)?;
        Ok(self
            .working
            .links
            .insert((event_key.to_string(), team_key.to_string())))
    }

    fn unlink(&mut self, event_key: &str, team_key: &str) -> StoreResult<bool> {
        Ok(self
            .working
            .links
            .remove(&(event_key.to_string(), team_key.to_string())))
    }

    fn linked_team_keys(&self, event_key: &str) -> StoreResult<Vec<String>> {
        Ok(self
            .working
            .links
            .iter()
            .filter(|(event, _)| event == event_key)
            .map(|(_, team)| team.clone())
            .collect())
    }

    fn linked_event_keys(&self, team_key: &str) -> StoreResult<Vec<String>> {
        // Links are ordered by event key first, so this is already sorted.
        Ok(self
            .working
            .links
            .iter()
            .filter(|(_, team)| team == team_key)
            .map(|(event, _)| event.clone())
            .collect())
    }

    fn link_count(&self) -> StoreResult<usize> {
        Ok(self.working.links.len())
    }

    fn event_keys(&self) -> StoreResult<Vec<String>> {
        Ok(self.working.events.keys().cloned().collect())
    }

    fn team_keys(&self) -> StoreResult<Vec<String>> {
        Ok(self.working.teams.keys().cloned().collect())
    }

    fn set_rankings(&mut self, event_key: &str, rankings: &RankingsText) -> StoreResult<()> {
        let event = self
            .working
            .events
            .get_mut(event_key)
            .ok_or_else(|| StoreError::Missing {
                kind: EntityKind::Event,
                key: event_key.to_string(),
            })?;
        event.rankings = Some(rankings.clone());
        Ok(())
    }

    fn delete_event(&mut self, key: &str) -> StoreResult<bool> {
        if self.working.events.remove(key).is_none() {
            return Ok(false);
        }
        self.working.links.retain(|(event, _)| event != key);
        Ok(true)
    }

    fn delete_team(&mut self, key: &str) -> StoreResult<bool> {
        if self.working.teams.remove(key).is_none() {
            return Ok(false);
        }
        self.working.links.retain(|(_, team)| team != key);
        Ok(true)
    }

    fn commit(mut self: Box<Self>) -> StoreResult<()> {
        *self.guard = std::mem::take(&mut self.working);
        Ok(())
    }
}
