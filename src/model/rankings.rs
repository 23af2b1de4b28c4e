use std::fmt;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// A rankings snapshot exactly as delivered by the remote source.
///
/// The text is stored verbatim and replaced wholesale on every import.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RankingsText(String);

impl RankingsText {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Decode the snapshot as a TBA v3 rankings document.
    ///
    /// Returns an empty table when the remote has no rankings yet (`null`).
    pub fn table(&self) -> Result<Vec<RankingRow>, serde_json::Error> {
        let document: Option<RankingsDocument> = serde_json::from_str(&self.0)?;
        let Some(document) = document else {
            return Ok(Vec::new());
        };

        let rows = document
            .rankings
            .into_iter()
            .map(|entry| {
                let stats = document
                    .sort_order_info
                    .iter()
                    .zip(entry.sort_orders.iter())
                    .chain(document.extra_stats_info.iter().zip(entry.extra_stats.iter()))
                    .map(|(info, value)| RankingStat {
                        name: info.name.clone(),
                        value: *value,
                        precision: info.precision,
                    })
                    .collect();
                RankingRow {
                    rank: entry.rank,
                    team_key: entry.team_key,
                    record: entry.record,
                    matches_played: entry.matches_played,
                    stats,
                }
            })
            .sorted_by_key(|row| row.rank)
            .collect();
        Ok(rows)
    }
}

impl fmt::Display for RankingsText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RankingsText {
    fn from(text: String) -> Self {
        Self(text)
    }
}

/// One team's standing at an event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingRow {
    pub rank: u32,
    pub team_key: String,
    pub record: Option<WinLossTie>,
    pub matches_played: Option<u32>,
    /// Sort-order values followed by extra stats, labelled with their names.
    pub stats: Vec<RankingStat>,
}

/// A named ranking value, e.g. "Ranking Score" = 2.5.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingStat {
    pub name: String,
    pub value: f64,
    pub precision: u8,
}

impl RankingStat {
    /// The value rounded to the precision the remote asked for.
    pub fn formatted(&self) -> String {
        format!("{:.*}", usize::from(self.precision), self.value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinLossTie {
    pub wins: u32,
    pub losses: u32,
    pub ties: u32,
}

impl fmt::Display for WinLossTie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.wins, self.losses, self.ties)
    }
}

#[derive(Debug, Deserialize)]
struct RankingsDocument {
    #[serde(default)]
    rankings: Vec<RankingEntry>,
    #[serde(default)]
    sort_order_info: Vec<StatInfo>,
    #[serde(default)]
    extra_stats_info: Vec<StatInfo>,
}

#[derive(Debug, Deserialize)]
struct RankingEntry {
    rank: u32,
    team_key: String,
    #[serde(default)]
    record: Option<WinLossTie>,
    #[serde(default)]
    matches_played: Option<u32>,
    #[serde(default)]
    sort_orders: Vec<f64>,
    #[serde(default)]
    extra_stats: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct StatInfo {
    name: String,
    #[serde(default)]
    precision: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    const RANKINGS: &str = r#"{
        "rankings": [
            {"rank": 2, "team_key": "frc971", "record": {"wins": 8, "losses": 2, "ties": 0},
             "matches_played": 10, "sort_orders": [2.1, 180.0], "extra_stats": [21]},
            {"rank": 1, "team_key": "frc254", "record": {"wins": 10, "losses": 0, "ties": 0},
             "matches_played": 10, "sort_orders": [2.5, 200.0], "extra_stats": [25]}
        ],
        "sort_order_info": [
            {"name": "Ranking Score", "precision": 2},
            {"name": "Auto", "precision": 0}
        ],
        "extra_stats_info": [{"name": "Total Ranking Points", "precision": 0}]
    }"#;

    #[test]
    fn test_table() {
        let rows = RankingsText::new(RANKINGS).table().unwrap();
        assert_eq!(rows.len(), 2);

        let first = &rows[0];
        assert_eq!(first.rank, 1);
        assert_eq!(first.team_key, "frc254");
        assert_eq!(first.record.unwrap().to_string(), "10-0-0");
        assert_eq!(first.stats.len(), 3);
        assert_eq!(first.stats[0].name, "Ranking Score");
        assert_eq!(first.stats[0].formatted(), "2.50");
        assert_eq!(first.stats[2].name, "Total Ranking Points");
        assert_eq!(first.stats[2].formatted(), "25");
    }

    #[test]
    fn test_table_without_rankings() {
        assert!(RankingsText::new("null").table().unwrap().is_empty());
        assert!(RankingsText::new("not json").table().is_err());
    }

    #[test]
    fn test_verbatim() {
        let text = RankingsText::new(" {\"rankings\": []} ");
        assert_eq!(text.as_str(), " {\"rankings\": []} ");
        assert_eq!(text.to_string(), text.clone().into_string());
    }
}
