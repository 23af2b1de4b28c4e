use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::common::{clean_optional, Searchable, WEB_BASE_URL};
use super::rankings::RankingsText;

/// An event as delivered by the remote source.
///
/// Only `key` and `name` are required; everything else defaults when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub event_code: Option<String>,
    #[serde(default)]
    pub event_type: Option<i32>,
    #[serde(default)]
    pub year: Option<u16>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state_prov: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

impl EventRecord {
    /// Minimal record with just an identity and a name.
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            event_code: None,
            event_type: None,
            year: None,
            start_date: None,
            end_date: None,
            city: None,
            state_prov: None,
            country: None,
        }
    }

    /// Validate and tidy a record before it is written.
    ///
    /// Keys and names are trimmed, blank optional fields become `None`, and
    /// the year is derived from the key when the remote omitted it.
    pub fn normalize(self) -> Result<Self, String> {
        let key = self.key.trim().to_string();
        let year = year_from_event_key(&key).ok_or_else(|| format!("invalid event key {key:?}"))?;
        if let Some(declared) = self.year {
            if declared != year {
                return Err(format!("year {declared} does not match key {key}"));
            }
        }

        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err("event name is empty".to_string());
        }

        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if end < start {
                return Err(format!("end date {end} precedes start date {start}"));
            }
        }

        Ok(Self {
            key,
            name,
            event_code: clean_optional(self.event_code),
            event_type: self.event_type,
            year: Some(year),
            start_date: self.start_date,
            end_date: self.end_date,
            city: clean_optional(self.city),
            state_prov: clean_optional(self.state_prov),
            country: clean_optional(self.country),
        })
    }
}

/// Event keys are a four digit season followed by a lowercase event code,
/// e.g. `2016casj`.
pub(crate) fn year_from_event_key(key: &str) -> Option<u16> {
    let (year, code) = key.split_at_checked(4)?;
    if !year.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if code.is_empty()
        || !code
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
    {
        return None;
    }
    year.parse().ok()
}

/// A competition as held in the local store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub key: String,
    pub name: String,
    pub event_code: Option<String>,
    pub event_type: Option<i32>,
    pub year: u16,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub city: Option<String>,
    pub state_prov: Option<String>,
    pub country: Option<String>,
    /// Latest rankings snapshot, absent until the first rankings import.
    pub rankings: Option<RankingsText>,
}

impl Event {
    /// Build a new local event from a normalized record.
    pub fn from_record(record: &EventRecord) -> Self {
        Self {
            key: record.key.clone(),
            name: record.name.clone(),
            event_code: record.event_code.clone(),
            event_type: record.event_type,
            year: record.year.or_else(|| year_from_event_key(&record.key)).unwrap_or_default(),
            start_date: record.start_date,
            end_date: record.end_date,
            city: record.city.clone(),
            state_prov: record.state_prov.clone(),
            country: record.country.clone(),
            rankings: None,
        }
    }

    /// Overwrite the mutable fields from `record`, keeping identity and the
    /// rankings payload. Returns whether anything changed.
    pub fn apply(&mut self, record: &EventRecord) -> bool {
        let mut updated = Self::from_record(record);
        updated.rankings.clone_from(&self.rankings);
        if updated == *self {
            return false;
        }
        *self = updated;
        true
    }

    /// Human readable location, e.g. "San Jose, CA, USA".
    pub fn location(&self) -> Option<String> {
        let parts: Vec<&str> = [&self.city, &self.state_prov, &self.country]
            .into_iter()
            .filter_map(|p| p.as_deref())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }
}

impl Searchable for Event {
    fn search_key(&self) -> &str {
        &self.key
    }

    fn web_url(&self) -> String {
        format!("{WEB_BASE_URL}/event/{}", self.key)
    }
}
