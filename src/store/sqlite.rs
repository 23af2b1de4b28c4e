use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use tracing::{debug, warn};

use crate::model::{EntityKind, Event, EventRecord, RankingsText, Team, TeamRecord};

use super::{ObjectStore, StoreError, StoreResult, StoreTransaction, UpsertOutcome};

pub const SCHEMA_VERSION: i64 = 1;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS events (
    key TEXT PRIMARY KEY CHECK (length(trim(key)) > 0),
    name TEXT NOT NULL,
    event_code TEXT,
    event_type INTEGER,
    year INTEGER NOT NULL,
    start_date TEXT,
    end_date TEXT,
    city TEXT,
    state_prov TEXT,
    country TEXT,
    rankings TEXT
) WITHOUT ROWID;

CREATE TABLE IF NOT EXISTS teams (
    key TEXT PRIMARY KEY CHECK (length(trim(key)) > 0),
    team_number INTEGER NOT NULL,
    nickname TEXT,
    name TEXT,
    city TEXT,
    state_prov TEXT,
    country TEXT,
    rookie_year INTEGER
) WITHOUT ROWID;

CREATE TABLE IF NOT EXISTS event_teams (
    event_key TEXT NOT NULL,
    team_key TEXT NOT NULL,
    PRIMARY KEY (event_key, team_key),
    FOREIGN KEY (event_key) REFERENCES events(key) ON DELETE CASCADE,
    FOREIGN KEY (team_key) REFERENCES teams(key) ON DELETE CASCADE
) WITHOUT ROWID;

CREATE INDEX IF NOT EXISTS idx_event_teams_team ON event_teams(team_key);
";

const EVENT_COLUMNS: &str = "key, name, event_code, event_type, year, start_date, end_date, \
                             city, state_prov, country, rankings";

const TEAM_COLUMNS: &str =
    "key, team_number, nickname, name, city, state_prov, country, rookie_year";

fn sqlite_error(operation: &'static str) -> impl FnOnce(rusqlite::Error) -> StoreError {
    move |source| StoreError::Sqlite { operation, source }
}

/// SQLite-backed store.
///
/// One connection is shared behind a mutex; every transaction is opened with
/// `BEGIN IMMEDIATE` so writers never interleave.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a database file and make sure the schema exists.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "opening sqlite store");
        let conn = Connection::open(path).map_err(sqlite_error("open database"))?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory().map_err(sqlite_error("open database"))?;
        Self::from_connection(conn)
    }

    pub fn from_connection(mut conn: Connection) -> StoreResult<Self> {
        initialise_schema(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

/// Create the tables if needed and check the recorded schema version.
///
/// A fresh database is stamped with [`SCHEMA_VERSION`]; a database stamped
/// with any other version is rejected.
fn initialise_schema(conn: &mut Connection) -> StoreResult<()> {
    conn.pragma_update(None, "foreign_keys", true)
        .map_err(sqlite_error("enable foreign keys"))?;

    let found: i64 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .map_err(sqlite_error("read schema version"))?;
    if found != 0 && found != SCHEMA_VERSION {
        return Err(StoreError::SchemaVersion {
            found,
            expected: SCHEMA_VERSION,
        });
    }

    let tx = conn
        .transaction()
        .map_err(sqlite_error("begin schema transaction"))?;
    tx.execute_batch(SCHEMA)
        .map_err(sqlite_error("create schema"))?;
    tx.pragma_update(None, "user_version", SCHEMA_VERSION)
        .map_err(sqlite_error("record schema version"))?;
    tx.commit()
        .map_err(sqlite_error("commit schema transaction"))?;
    Ok(())
}

impl ObjectStore for SqliteStore {
    fn begin(&self) -> StoreResult<Box<dyn StoreTransaction + '_>> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        conn.execute_batch("BEGIN IMMEDIATE")
            .map_err(sqlite_error("begin transaction"))?;
        Ok(Box::new(SqliteTransaction {
            conn,
            finished: false,
        }))
    }
}

struct SqliteTransaction<'a> {
    conn: MutexGuard<'a, Connection>,
    finished: bool,
}

impl Drop for SqliteTransaction<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if let Err(e) = self.conn.execute_batch("ROLLBACK") {
            warn!(error = %e, "failed to roll back sqlite transaction");
        }
    }
}

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<Event> {
    Ok(Event {
        key: row.get(0)?,
        name: row.get(1)?,
        event_code: row.get(2)?,
        event_type: row.get(3)?,
        year: row.get(4)?,
        start_date: row.get(5)?,
        end_date: row.get(6)?,
        city: row.get(7)?,
        state_prov: row.get(8)?,
        country: row.get(9)?,
        rankings: row.get::<_, Option<String>>(10)?.map(RankingsText::from),
    })
}

fn team_from_row(row: &Row<'_>) -> rusqlite::Result<Team> {
    Ok(Team {
        key: row.get(0)?,
        team_number: row.get(1)?,
        nickname: row.get(2)?,
        name: row.get(3)?,
        city: row.get(4)?,
        state_prov: row.get(5)?,
        country: row.get(6)?,
        rookie_year: row.get(7)?,
    })
}

impl SqliteTransaction<'_> {
    fn exists(&self, sql: &str, key: &str, operation: &'static str) -> StoreResult<bool> {
        let found = self
            .conn
            .prepare_cached(sql)
            .map_err(sqlite_error(operation))?
            .query_row([key], |_| Ok(()))
            .optional()
            .map_err(sqlite_error(operation))?;
        Ok(found.is_some())
    }

    fn keys(
        &self,
        sql: &str,
        param: Option<&str>,
        operation: &'static str,
    ) -> StoreResult<Vec<String>> {
        let mut statement = self
            .conn
            .prepare_cached(sql)
            .map_err(sqlite_error(operation))?;
        let rows = statement
            .query_map(params_from_iter(param), |row| row.get::<_, String>(0))
            .map_err(sqlite_error(operation))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(sqlite_error(operation))
    }

    fn write_event(&self, event: &Event, sql: &str, operation: &'static str) -> StoreResult<()> {
        self.conn
            .prepare_cached(sql)
            .map_err(sqlite_error(operation))?
            .execute(params![
                event.key,
                event.name,
                event.event_code,
                event.event_type,
                event.year,
                event.start_date,
                event.end_date,
                event.city,
                event.state_prov,
                event.country,
            ])
            .map_err(sqlite_error(operation))?;
        Ok(())
    }

    fn write_team(&self, team: &Team, sql: &str, operation: &'static str) -> StoreResult<()> {
        self.conn
            .prepare_cached(sql)
            .map_err(sqlite_error(operation))?
            .execute(params![
                team.key,
                team.team_number,
                team.nickname,
                team.name,
                team.city,
                team.state_prov,
                team.country,
                team.rookie_year,
            ])
            .map_err(sqlite_error(operation))?;
        Ok(())
    }
}

impl StoreTransaction for SqliteTransaction<'_> {
    fn find_event(&self, key: &str) -> StoreResult<Option<Event>> {
        let sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE key = ?1");
        self.conn
            .prepare_cached(&sql)
            .map_err(sqlite_error("prepare event lookup"))?
            .query_row([key], event_from_row)
            .optional()
            .map_err(sqlite_error("look up event"))
    }

    fn find_team(&self, key: &str) -> StoreResult<Option<Team>> {
        let sql = format!("SELECT {TEAM_COLUMNS} FROM teams WHERE key = ?1");
        self.conn
            .prepare_cached(&sql)
            .map_err(sqlite_error("prepare team lookup"))?
            .query_row([key], team_from_row)
            .optional()
            .map_err(sqlite_error("look up team"))
    }

    fn upsert_event(&mut self, record: &EventRecord) -> StoreResult<UpsertOutcome> {
        match self.find_event(&record.key)? {
            None => {
                self.write_event(
                    &Event::from_record(record),
                    "INSERT INTO events (key, name, event_code, event_type, year, start_date, \
                     end_date, city, state_prov, country) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                    "insert event",
                )?;
                Ok(UpsertOutcome::Created)
            }
            Some(mut event) => {
                if !event.apply(record) {
                    return Ok(UpsertOutcome::Unchanged);
                }
                self.write_event(
                    &event,
                    "UPDATE events SET name = ?2, event_code = ?3, event_type = ?4, year = ?5, \
                     start_date = ?6, end_date = ?7, city = ?8, state_prov = ?9, country = ?10 \
                     WHERE key = ?1",
                    "update event",
                )?;
                Ok(UpsertOutcome::Updated)
            }
        }
    }

    fn upsert_team(&mut self, record: &TeamRecord) -> StoreResult<UpsertOutcome> {
        match self.find_team(&record.key)? {
            None => {
                self.write_team(
                    &Team::from_record(record),
                    "INSERT INTO teams (key, team_number, nickname, name, city, state_prov, \
                     country, rookie_year) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    "insert team",
                )?;
                Ok(UpsertOutcome::Created)
            }
            Some(mut team) => {
                if !team.apply(record) {
                    return Ok(UpsertOutcome::Unchanged);
                }
                self.write_team(
                    &team,
                    "UPDATE teams SET team_number = ?2, nickname = ?3, name = ?4, city = ?5, \
                     state_prov = ?6, country = ?7, rookie_year = ?8 WHERE key = ?1",
                    "update team",
                )?;
                Ok(UpsertOutcome::Updated)
            }
        }
    }

    fn link(&mut self, event_key: &str, team_key: &str) -> StoreResult<bool> {
        if !self.exists("SELECT 1 FROM events WHERE key = ?1", event_key, "check event")? {
            return Err(StoreError::Missing {
                kind: EntityKind::Event,
                key: event_key.to_string(),
            });
        }
        if !self.exists("SELECT 1 FROM teams WHERE key = ?1", team_key, "check team")? {
            return Err(StoreError::Missing {
                kind: EntityKind::Team,
                key: team_key.to_string(),
            });
        }
        let inserted = self
            .conn
            .prepare_cached("INSERT OR IGNORE INTO event_teams (event_key, team_key) VALUES (?1, ?2)")
            .map_err(sqlite_error("prepare link"))?
            .execute([event_key, team_key])
            .map_err(sqlite_error("link team to event"))?;
        Ok(inserted > 0)
    }

    fn unlink(&mut self, event_key: &str, team_key: &str) -> StoreResult<bool> {
        let removed = self
            .conn
            .prepare_cached("DELETE FROM event_teams WHERE event_key = ?1 AND team_key = ?2")
            .map_err(sqlite_error("prepare unlink"))?
            .execute([event_key, team_key])
            .map_err(sqlite_error("unlink team from event"))?;
        Ok(removed > 0)
    }

    fn linked_team_keys(&self, event_key: &str) -> StoreResult<Vec<String>> {
        self.keys(
            "SELECT team_key FROM event_teams WHERE event_key = ?1 ORDER BY team_key",
            Some(event_key),
            "list teams for event",
        )
    }

    fn linked_event_keys(&self, team_key: &str) -> StoreResult<Vec<String>> {
        self.keys(
            "SELECT event_key FROM event_teams WHERE team_key = ?1 ORDER BY event_key",
            Some(team_key),
            "list events for team",
        )
    }

    fn link_count(&self) -> StoreResult<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM event_teams", [], |row| row.get(0))
            .map_err(sqlite_error("count links"))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    fn event_keys(&self) -> StoreResult<Vec<String>> {
        self.keys("SELECT key FROM events ORDER BY key", None, "list events")
    }

    fn team_keys(&self) -> StoreResult<Vec<String>> {
        self.keys("SELECT key FROM teams ORDER BY key", None, "list teams")
    }

    fn set_rankings(&mut self, event_key: &str, rankings: &RankingsText) -> StoreResult<()> {
        let updated = self
            .conn
            .prepare_cached("UPDATE events SET rankings = ?2 WHERE key = ?1")
            .map_err(sqlite_error("prepare rankings update"))?
            .execute([event_key, rankings.as_str()])
            .map_err(sqlite_error("store rankings"))?;
        if updated == 0 {
            return Err(StoreError::Missing {
                kind: EntityKind::Event,
                key: event_key.to_string(),
            });
        }
        Ok(())
    }

    fn delete_event(&mut self, key: &str) -> StoreResult<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM events WHERE key = ?1", [key])
            .map_err(sqlite_error("delete event"))?;
        Ok(deleted > 0)
    }

    fn delete_team(&mut self, key: &str) -> StoreResult<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM teams WHERE key = ?1", [key])
            .map_err(sqlite_error("delete team"))?;
        Ok(deleted > 0)
    }

    fn commit(mut self: Box<Self>) -> StoreResult<()> {
        self.conn
            .execute_batch("COMMIT")
            .map_err(sqlite_error("commit transaction"))?;
        self.finished = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::conformance;

    #[test]
    fn test_conformance() {
        conformance::run_all(|| Box::new(SqliteStore::open_in_memory().unwrap()));
    }

    #[test]
    fn test_reopen_file_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tba.sqlite");

        {
            let store = SqliteStore::open(&path).unwrap();
            let mut tx = store.begin().unwrap();
            tx.upsert_event(&conformance::event("2016casj", "Silicon Valley"))
                .unwrap();
            tx.set_rankings("2016casj", &RankingsText::new("{\"rankings\": []}"))
                .unwrap();
            tx.commit().unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        let event = store.event("2016casj").unwrap().unwrap();
        assert_eq!(event.name, "Silicon Valley");
        assert_eq!(event.rankings.unwrap().as_str(), "{\"rankings\": []}");
    }

    #[test]
    fn test_dates_round_trip() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut record = conformance::event("2016casj", "Silicon Valley");
        record.start_date = chrono::NaiveDate::from_ymd_opt(2016, 3, 24);
        record.end_date = chrono::NaiveDate::from_ymd_opt(2016, 3, 26);

        let mut tx = store.begin().unwrap();
        tx.upsert_event(&record).unwrap();
        assert_eq!(tx.upsert_event(&record).unwrap(), UpsertOutcome::Unchanged);
        tx.commit().unwrap();

        let event = store.event("2016casj").unwrap().unwrap();
        assert_eq!(event.start_date, record.start_date);
        assert_eq!(event.end_date, record.end_date);
    }

    #[test]
    fn test_writers_serialize() {
        let dir = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(SqliteStore::open(dir.path().join("tba.sqlite")).unwrap());

        let handles: Vec<_> = (1..=8u32)
            .map(|n| {
                let store = store.clone();
                std::thread::spawn(move || {
                    let mut tx = store.begin().unwrap();
                    tx.upsert_team(&conformance::team(n, "Team")).unwrap();
                    if n % 2 == 0 {
                        tx.commit().unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let keys: Vec<String> = store.teams().unwrap().into_iter().map(|t| t.key).collect();
        assert_eq!(keys, ["frc2", "frc4", "frc6", "frc8"]);
    }

    #[test]
    fn test_rejects_newer_schema() {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "user_version", 7).unwrap();

        let err = SqliteStore::from_connection(conn).unwrap_err();
        assert!(matches!(
            err,
            StoreError::SchemaVersion {
                found: 7,
                expected: SCHEMA_VERSION
            }
        ));
    }
}
