use crate::error::{ImportError, Result};
use crate::model::{EntityKind, Event, Team};
use crate::store::ObjectStore;

/// A team viewed in the context of one event it attends, read from the
/// local store in a single consistent snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventTeamContext {
    event: Event,
    team: Team,
    linked: bool,
}

impl EventTeamContext {
    /// Load `event_key` and `team_key` from `store`.
    ///
    /// Fails with [`ImportError::NotFound`] when either one is missing. A team
    /// that exists but is not linked to the event still resolves; check
    /// [`is_linked`](Self::is_linked).
    pub fn resolve<S>(store: &S, event_key: &str, team_key: &str) -> Result<Self>
    where
        S: ObjectStore + ?Sized,
    {
        let tx = store.begin()?;
        let event = tx.find_event(event_key)?.ok_or_else(|| ImportError::NotFound {
            kind: EntityKind::Event,
            key: event_key.to_string(),
        })?;
        let team = tx.find_team(team_key)?.ok_or_else(|| ImportError::NotFound {
            kind: EntityKind::Team,
            key: team_key.to_string(),
        })?;
        let linked = tx
            .linked_team_keys(event_key)?
            .iter()
            .any(|key| key == team_key);

        Ok(Self {
            event,
            team,
            linked,
        })
    }

    pub fn event(&self) -> &Event {
        &self.event
    }

    pub fn team(&self) -> &Team {
        &self.team
    }

    /// Whether the store records the team as attending the event.
    pub fn is_linked(&self) -> bool {
        self.linked
    }

    pub fn into_parts(self) -> (Event, Team) {
        (self.event, self.team)
    }
}
