mod reconcile;
mod report;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::config::ImporterConfig;
use crate::error::{ImportError, Result};
use crate::model::{EntityKind, Event, RankingsText};
use crate::remote::RemoteSource;
use crate::store::ObjectStore;

pub use report::{ImportKind, ImportReport, ImportStatus};

type StatusKey = (ImportKind, Option<String>);

/// Synchronizes a local [`ObjectStore`] with a [`RemoteSource`].
///
/// Every operation fetches first, then reconciles the result inside a single
/// store transaction. Repeated imports of the same remote data converge on the
/// same local records; nothing is ever duplicated.
///
/// The importer is cheap to clone and can be moved into spawned tasks.
///
/// # Examples
///
/// ```no_run
/// # async fn example() -> tba_importer::Result<()> {
/// use tba_importer::{ClientConfig, Importer, ObjectStore, SqliteStore, TbaClient};
///
/// let client = TbaClient::new(ClientConfig::from_env().with_season(2016));
/// let store = SqliteStore::open("tba.sqlite")?;
/// let importer = Importer::new(client, store);
///
/// importer.import_events().await?;
/// if let Some(event) = importer.store().event("2016casj")? {
///     let report = importer.link_teams_to_event(&event).await?;
///     println!("{} teams at {}", report.upserted(), event.name);
/// }
/// # Ok(())
/// # }
/// ```
pub struct Importer<R, S> {
    remote: Arc<R>,
    store: Arc<S>,
    config: ImporterConfig,
    statuses: Arc<Mutex<HashMap<StatusKey, ImportStatus>>>,
}

impl<R, S> Clone for Importer<R, S> {
    fn clone(&self) -> Self {
        Self {
            remote: Arc::clone(&self.remote),
            store: Arc::clone(&self.store),
            config: self.config,
            statuses: Arc::clone(&self.statuses),
        }
    }
}

impl<R, S> Importer<R, S>
where
    R: RemoteSource + 'static,
    S: ObjectStore + 'static,
{
    pub fn new(remote: R, store: S) -> Self {
        Self::from_shared(Arc::new(remote), Arc::new(store))
    }

    /// Build an importer around a source and store that are shared elsewhere.
    pub fn from_shared(remote: Arc<R>, store: Arc<S>) -> Self {
        Self {
            remote,
            store,
            config: ImporterConfig::default(),
            statuses: Arc::default(),
        }
    }

    pub fn with_config(mut self, config: ImporterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ImporterConfig {
        &self.config
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// The store being written, for callers that want to read back results.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Download all events and upsert them into the store.
    #[instrument(skip(self))]
    pub async fn import_events(&self) -> Result<ImportReport> {
        let result = async {
            let batch = self.remote.list_events().await?;
            reconcile::events(self.store.as_ref(), batch, self.config.deletions)
        }
        .await;
        self.record(ImportKind::Events, None, result.as_ref());
        result
    }

    /// Download all teams and upsert them into the store.
    #[instrument(skip(self))]
    pub async fn import_teams(&self) -> Result<ImportReport> {
        let result = async {
            let batch = self.remote.list_teams().await?;
            reconcile::teams(self.store.as_ref(), batch, self.config.deletions)
        }
        .await;
        self.record(ImportKind::Teams, None, result.as_ref());
        result
    }

    /// Download the teams attending `event`, upsert them, and link each one
    /// to the event.
    ///
    /// The event must already be in the store; otherwise this fails with
    /// [`ImportError::NotFound`] without contacting the remote source.
    #[instrument(skip(self, event), fields(event = %event.key))]
    pub async fn link_teams_to_event(&self, event: &Event) -> Result<ImportReport> {
        let result = async {
            self.require_event(&event.key)?;
            let batch = self.remote.list_teams_for_event(&event.key).await?;
            reconcile::event_teams(
                self.store.as_ref(),
                &event.key,
                batch,
                self.config.stale_links,
            )
        }
        .await;
        self.record(ImportKind::EventTeams, Some(&event.key), result.as_ref());
        result
    }

    /// Download the rankings of `event` and store them verbatim on it,
    /// replacing any earlier snapshot. Returns the stored text.
    #[instrument(skip(self, event), fields(event = %event.key))]
    pub async fn import_rankings_for_event(&self, event: &Event) -> Result<RankingsText> {
        let result = async {
            self.require_event(&event.key)?;
            let rankings = self.remote.get_rankings(&event.key).await?;
            let report = reconcile::rankings(self.store.as_ref(), &event.key, &rankings)?;
            Ok::<_, ImportError>((rankings, report))
        }
        .await;

        self.record(
            ImportKind::Rankings,
            Some(&event.key),
            result.as_ref().map(|(_, report)| report),
        );
        result.map(|(rankings, _)| rankings)
    }

    /// Import rankings in the background and hand the outcome to
    /// `on_complete`.
    ///
    /// `on_complete` runs exactly once. If `cancel` fires before the import
    /// finishes, the fetch is abandoned, nothing is written, and
    /// `on_complete` receives [`ImportError::Cancelled`].
    pub fn import_rankings_with<F>(
        &self,
        event: &Event,
        cancel: CancellationToken,
        on_complete: F,
    ) -> JoinHandle<()>
    where
        F: FnOnce(Result<RankingsText>) + Send + 'static,
    {
        let importer = self.clone();
        let event = event.clone();
        tokio::spawn(async move {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!(event = %event.key, "rankings import cancelled");
                    importer.set_status(
                        ImportKind::Rankings,
                        Some(&event.key),
                        ImportStatus::Failed(ImportError::Cancelled.to_string()),
                    );
                    Err(ImportError::Cancelled)
                }
                result = importer.import_rankings_for_event(&event) => result,
            };
            on_complete(result);
        })
    }

    /// Latest outcome of a store-wide import ([`ImportKind::Events`] or
    /// [`ImportKind::Teams`]).
    pub fn status(&self, kind: ImportKind) -> ImportStatus {
        self.lookup_status(&(kind, None))
    }

    /// Latest outcome of a per-event import ([`ImportKind::EventTeams`] or
    /// [`ImportKind::Rankings`]).
    pub fn event_status(&self, kind: ImportKind, event_key: &str) -> ImportStatus {
        self.lookup_status(&(kind, Some(event_key.to_string())))
    }

    fn require_event(&self, key: &str) -> Result<()> {
        match self.store.event(key)? {
            Some(_) => Ok(()),
            None => Err(ImportError::NotFound {
                kind: EntityKind::Event,
                key: key.to_string(),
            }),
        }
    }

    fn record(
        &self,
        kind: ImportKind,
        event_key: Option<&str>,
        outcome: std::result::Result<&ImportReport, &ImportError>,
    ) {
        let status = match outcome {
            Ok(report) => {
                info!(
                    %kind,
                    fetched = report.fetched,
                    created = report.created,
                    updated = report.updated,
                    unchanged = report.unchanged,
                    linked = report.linked,
                    unlinked = report.unlinked,
                    deleted = report.deleted,
                    failed = report.failures.len(),
                    "import finished"
                );
                ImportStatus::Succeeded(report.clone())
            }
            Err(err) => {
                warn!(%kind, error = %err, "import failed");
                ImportStatus::Failed(err.to_string())
            }
        };
        self.set_status(kind, event_key, status);
    }

    fn set_status(&self, kind: ImportKind, event_key: Option<&str>, status: ImportStatus) {
        let mut statuses = self.statuses.lock().unwrap_or_else(PoisonError::into_inner);
        statuses.insert((kind, event_key.map(str::to_string)), status);
    }

    fn lookup_status(&self, key: &StatusKey) -> ImportStatus {
        let statuses = self.statuses.lock().unwrap_or_else(PoisonError::into_inner);
        statuses.get(key).cloned().unwrap_or_default()
    }
}
