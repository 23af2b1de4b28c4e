//! The remote data source and its HTTP plumbing.

pub(crate) mod events;
pub(crate) mod rankings;
pub(crate) mod teams;

use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{ImportError, Result};
use crate::model::{EventRecord, RankingsText, RecordBatch, RecordFailure, TeamRecord};

const AUTH_HEADER: &str = "X-TBA-Auth-Key";

/// Where the importer gets its data from.
///
/// List operations decode each element on its own, so one malformed element
/// shows up as an `Err` entry instead of failing the whole call. Failing to
/// reach the source, or a body that is not a list at all, fails the call.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    async fn list_events(&self) -> Result<RecordBatch<EventRecord>>;

    async fn list_teams(&self) -> Result<RecordBatch<TeamRecord>>;

    async fn list_teams_for_event(&self, event_key: &str) -> Result<RecordBatch<TeamRecord>>;

    /// Rankings for an event, exactly as the source delivered them.
    async fn get_rankings(&self, event_key: &str) -> Result<RankingsText>;
}

/// Fetch a URL from the API and return the response body.
pub(crate) async fn get_text(
    client: &reqwest::Client,
    config: &ClientConfig,
    url: &str,
) -> Result<String> {
    debug!(url, "fetching");

    let mut request = client
        .get(url)
        .timeout(config.timeout())
        .header(USER_AGENT, &config.user_agent);
    if let Some(key) = &config.api_key {
        request = request.header(AUTH_HEADER, key);
    }

    let response = request.send().await.map_err(|e| ImportError::Http {
        url: url.to_owned(),
        source: e,
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(ImportError::UnexpectedStatus {
            url: url.to_owned(),
            status,
        });
    }

    response.text().await.map_err(|e| ImportError::ResponseBody {
        url: url.to_owned(),
        source: e,
    })
}

/// Split a JSON array body into per-record results.
///
/// `offset` is added to each element's position so that pages of one
/// listing report positions in the listing as a whole.
pub(crate) fn decode_batch<T: DeserializeOwned>(
    body: &str,
    context: &str,
    offset: usize,
) -> Result<RecordBatch<T>> {
    let values: Vec<Value> = serde_json::from_str(body).map_err(|source| ImportError::Parse {
        context: context.to_owned(),
        source,
    })?;

    let batch = values
        .into_iter()
        .enumerate()
        .map(|(i, value)| {
            let key = value.get("key").and_then(Value::as_str).map(str::to_owned);
            serde_json::from_value(value)
                .map_err(|e| RecordFailure::new(offset + i, key, e.to_string()))
        })
        .collect();
    Ok(batch)
}
