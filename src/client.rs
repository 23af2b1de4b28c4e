use async_trait::async_trait;
use tracing::instrument;

use crate::config::ClientConfig;
use crate::error::Result;
use crate::model::*;
use crate::remote::{self, RemoteSource};

/// HTTP client for The Blue Alliance API v3.
///
/// `TbaClient` wraps a [`reqwest::Client`] and implements [`RemoteSource`]
/// so it can feed an [`Importer`](crate::Importer).
///
/// # Examples
///
/// ```no_run
/// # async fn example() -> tba_importer::Result<()> {
/// use tba_importer::{ClientConfig, RemoteSource, TbaClient};
///
/// let client = TbaClient::new(ClientConfig::from_env().with_season(2016));
/// let events = client.list_events().await?;
/// println!("Found {} events", events.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct TbaClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl TbaClient {
    /// Create a new client with a default [`reqwest::Client`].
    pub fn new(config: ClientConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Create a new client using the provided [`reqwest::Client`].
    ///
    /// Use this when you need to configure proxies, TLS, connection pools, etc.
    pub fn with_client(client: reqwest::Client, config: ClientConfig) -> Self {
        Self {
            http: client,
            config,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

impl Default for TbaClient {
    fn default() -> Self {
        Self::new(ClientConfig::from_env())
    }
}

#[async_trait]
impl RemoteSource for TbaClient {
    /// Fetch every event of the configured season.
    #[instrument(skip(self))]
    async fn list_events(&self) -> Result<RecordBatch<EventRecord>> {
        remote::events::list_events(&self.http, &self.config).await
    }

    /// Fetch every team, walking all pages of the listing.
    #[instrument(skip(self))]
    async fn list_teams(&self) -> Result<RecordBatch<TeamRecord>> {
        remote::teams::list_teams(&self.http, &self.config).await
    }

    /// Fetch the teams attending an event.
    #[instrument(skip(self))]
    async fn list_teams_for_event(&self, event_key: &str) -> Result<RecordBatch<TeamRecord>> {
        remote::teams::list_teams_for_event(&self.http, &self.config, event_key).await
    }

    /// Fetch the rankings document of an event as raw text.
    #[instrument(skip(self))]
    async fn get_rankings(&self, event_key: &str) -> Result<RankingsText> {
        remote::rankings::get_rankings(&self.http, &self.config, event_key).await
    }
}
