use serde::{Deserialize, Serialize};

use super::common::{clean_optional, Searchable, WEB_BASE_URL};

/// A team as delivered by the remote source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamRecord {
    pub key: String,
    pub team_number: u32,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state_prov: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub rookie_year: Option<u16>,
}

impl TeamRecord {
    pub fn new(team_number: u32, nickname: impl Into<String>) -> Self {
        Self {
            key: format!("frc{team_number}"),
            team_number,
            nickname: Some(nickname.into()),
            name: None,
            city: None,
            state_prov: None,
            country: None,
            rookie_year: None,
        }
    }

    /// Validate and tidy a record before it is written.
    pub fn normalize(self) -> Result<Self, String> {
        let key = self.key.trim().to_string();
        let number =
            team_number_from_key(&key).ok_or_else(|| format!("invalid team key {key:?}"))?;
        if number != self.team_number {
            return Err(format!(
                "team number {} does not match key {key}",
                self.team_number
            ));
        }

        Ok(Self {
            key,
            team_number: number,
            nickname: clean_optional(self.nickname),
            name: clean_optional(self.name),
            city: clean_optional(self.city),
            state_prov: clean_optional(self.state_prov),
            country: clean_optional(self.country),
            rookie_year: self.rookie_year,
        })
    }
}

/// Team keys are `frc` followed by the team number without leading zeros.
pub(crate) fn team_number_from_key(key: &str) -> Option<u32> {
    let digits = key.strip_prefix("frc")?;
    if digits.is_empty() || digits.starts_with('0') || !digits.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    digits.parse().ok()
}

/// A team as held in the local store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Team {
    pub key: String,
    pub team_number: u32,
    pub nickname: Option<String>,
    pub name: Option<String>,
    pub city: Option<String>,
    pub state_prov: Option<String>,
    pub country: Option<String>,
    pub rookie_year: Option<u16>,
}

impl Team {
    pub fn from_record(record: &TeamRecord) -> Self {
        Self {
            key: record.key.clone(),
            team_number: record.team_number,
            nickname: record.nickname.clone(),
            name: record.name.clone(),
            city: record.city.clone(),
            state_prov: record.state_prov.clone(),
            country: record.country.clone(),
            rookie_year: record.rookie_year,
        }
    }

    /// Overwrite the mutable fields from `record`. Returns whether anything
    /// changed.
    pub fn apply(&mut self, record: &TeamRecord) -> bool {
        let updated = Self::from_record(record);
        if updated == *self {
            return false;
        }
        *self = updated;
        true
    }

    /// Nickname when known, otherwise "Team 254".
    pub fn display_name(&self) -> String {
        self.nickname
            .clone()
            .unwrap_or_else(|| format!("Team {}", self.team_number))
    }
}

impl Searchable for Team {
    fn search_key(&self) -> &str {
        &self.key
    }

    fn web_url(&self) -> String {
        format!("{WEB_BASE_URL}/team/{}", self.team_number)
    }
}
