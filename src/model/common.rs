use serde::{Deserialize, Serialize};
use strum_macros::EnumString;

pub(crate) const WEB_BASE_URL: &str = "https://www.thebluealliance.com";

/// The kinds of entity held in the local store.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, strum_macros::Display,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Event,
    Team,
}

/// A single remote record that was skipped during an import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordFailure {
    /// Position of the record in the remote list.
    pub index: usize,
    /// Remote key, when the record got far enough to have one.
    pub key: Option<String>,
    pub reason: String,
}

impl RecordFailure {
    pub fn new(index: usize, key: Option<String>, reason: impl Into<String>) -> Self {
        Self {
            index,
            key,
            reason: reason.into(),
        }
    }
}

/// Records as delivered by a remote source, decoded one element at a time so
/// that a single malformed element does not discard the rest of the list.
pub type RecordBatch<T> = Vec<Result<T, RecordFailure>>;

/// Identifies an entity for search indexing and deep links.
pub trait Searchable {
    /// Identifier to index the entity under. Always its remote key.
    fn search_key(&self) -> &str;

    /// Public page for the entity on thebluealliance.com.
    fn web_url(&self) -> String;
}

/// Trim a text field, mapping blank values to `None`.
pub(crate) fn clean_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
