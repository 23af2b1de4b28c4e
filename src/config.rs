use std::time::Duration;

use chrono::Datelike;
use serde::{Deserialize, Serialize};
use strum_macros::EnumString;

pub const DEFAULT_BASE_URL: &str = "https://www.thebluealliance.com/api/v3";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_USER_AGENT: &str = concat!("tba-importer/", env!("CARGO_PKG_VERSION"));

/// Settings for talking to The Blue Alliance API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    /// Read API key, sent as `X-TBA-Auth-Key`.
    pub api_key: Option<String>,
    /// Season whose events are listed by `list_events`.
    pub season: u16,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            season: current_season(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by `TBA_API_KEY`, `TBA_BASE_URL` and `TBA_SEASON`.
    ///
    /// Unparseable values are ignored with a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(key) = lookup("TBA_API_KEY").filter(|k| !k.trim().is_empty()) {
            config.api_key = Some(key.trim().to_string());
        }
        if let Some(url) = lookup("TBA_BASE_URL").filter(|u| !u.trim().is_empty()) {
            config = config.with_base_url(url.trim());
        }
        if let Some(season) = lookup("TBA_SEASON") {
            match season.trim().parse() {
                Ok(season) => config.season = season,
                Err(_) => tracing::warn!(%season, "ignoring invalid TBA_SEASON"),
            }
        }
        config
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_season(mut self, season: u16) -> Self {
        self.season = season;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn current_season() -> u16 {
    u16::try_from(chrono::Utc::now().year()).unwrap_or_default()
}

/// What to do with event-team links that a fresh fetch no longer reports.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, strum_macros::Display,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum StaleLinkPolicy {
    /// Leave them in place.
    #[default]
    Keep,
    /// Remove them, unless the fetch contained malformed records.
    Remove,
}

/// What to do with local events or teams that a full fetch no longer lists.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, strum_macros::Display,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum DeletionPolicy {
    /// Keep local records forever.
    #[default]
    KeepLocal,
    /// Delete them (with their links), unless the fetch contained malformed
    /// records.
    MirrorRemote,
}

/// Reconciliation behaviour of the [`Importer`](crate::Importer).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImporterConfig {
    pub stale_links: StaleLinkPolicy,
    pub deletions: DeletionPolicy,
}

impl ImporterConfig {
    pub fn with_stale_links(mut self, policy: StaleLinkPolicy) -> Self {
        self.stale_links = policy;
        self
    }

    pub fn with_deletions(mut self, policy: DeletionPolicy) -> Self {
        self.deletions = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_client_config_from_lookup() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("TBA_API_KEY", " secret "),
            ("TBA_BASE_URL", "http://localhost:8080/api/v3/"),
            ("TBA_SEASON", "2016"),
        ]);
        let config = ClientConfig::from_lookup(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.api_key.as_deref(), Some("secret"));
        assert_eq!(config.base_url, "http://localhost:8080/api/v3");
        assert_eq!(config.season, 2016);
        assert_eq!(config.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_client_config_ignores_bad_season() {
        let config = ClientConfig::from_lookup(|name| {
            (name == "TBA_SEASON").then(|| "twenty".to_string())
        });
        assert_eq!(config.season, current_season());
        assert_eq!(config.api_key, None);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_importer_config_deserialize() {
        let config: ImporterConfig =
            serde_json::from_str(r#"{"stale_links": "remove"}"#).unwrap();
        assert_eq!(config.stale_links, StaleLinkPolicy::Remove);
        assert_eq!(config.deletions, DeletionPolicy::KeepLocal);

        assert_eq!(
            DeletionPolicy::from_str("mirror-remote").unwrap(),
            DeletionPolicy::MirrorRemote
        );
        assert_eq!(StaleLinkPolicy::Keep.to_string(), "keep");
    }
}
