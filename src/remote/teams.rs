use std::future::Future;

use tracing::{debug, instrument, warn};

use crate::config::ClientConfig;
use crate::error::{ImportError, Result};
use crate::model::{RecordBatch, RecordFailure, TeamRecord};
use crate::remote::{self, decode_batch};

/// The team listing is paged; stop here even if pages keep coming.
const MAX_TEAM_PAGES: usize = 64;

/// Walk the paged team listing until the first empty page.
#[instrument(skip(client, config))]
pub(crate) async fn list_teams(
    client: &reqwest::Client,
    config: &ClientConfig,
) -> Result<RecordBatch<TeamRecord>> {
    collect_pages(MAX_TEAM_PAGES, |page| async move {
        let url = format!("{}/teams/{page}", config.base_url);
        let body = remote::get_text(client, config, &url).await?;
        Ok::<_, ImportError>((url, body))
    })
    .await
}

/// Concatenate pages from `fetch_page` until one comes back empty.
///
/// If `max_pages` is reached first, a trailing [`RecordFailure`] marks the
/// batch as incomplete.
async fn collect_pages<F, Fut>(
    max_pages: usize,
    mut fetch_page: F,
) -> Result<RecordBatch<TeamRecord>>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<(String, String)>>,
{
    let mut teams = Vec::new();
    for page in 0..max_pages {
        let (url, body) = fetch_page(page).await?;
        let batch = decode_batch(&body, &url, teams.len())?;
        if batch.is_empty() {
            debug!(count = teams.len(), pages = page, "fetched teams");
            return Ok(teams);
        }
        teams.extend(batch);
    }

    warn!(
        count = teams.len(),
        pages = max_pages,
        "team listing did not end, stopping"
    );
    teams.push(Err(RecordFailure::new(
        teams.len(),
        None,
        format!("team listing truncated after {max_pages} pages"),
    )));
    Ok(teams)
}

#[instrument(skip(client, config))]
pub(crate) async fn list_teams_for_event(
    client: &reqwest::Client,
    config: &ClientConfig,
    event_key: &str,
) -> Result<RecordBatch<TeamRecord>> {
    let url = format!("{}/event/{event_key}/teams", config.base_url);
    let body = remote::get_text(client, config, &url).await?;
    let teams = decode_batch(&body, &url, 0)?;
    debug!(count = teams.len(), "fetched teams for event");
    Ok(teams)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_teams() {
        let body = r#"[
            {"key": "frc254", "team_number": 254, "nickname": "The Cheesy Poofs",
             "name": "NASA Ames Research Center/Bellarmine College Preparatory",
             "city": "San Jose", "state_prov": "California", "country": "USA",
             "rookie_year": 1999},
            {"team_number": 604}
        ]"#;
        let teams: RecordBatch<TeamRecord> = decode_batch(body, "teams", 0).unwrap();

        let first = teams[0].as_ref().unwrap();
        assert_eq!(first.key, "frc254");
        assert_eq!(first.rookie_year, Some(1999));

        let failure = teams[1].as_ref().unwrap_err();
        assert_eq!(failure.index, 1);
        assert_eq!(failure.key, None);
        assert!(failure.reason.contains("key"), "reason: {}", failure.reason);
    }

    #[tokio::test]
    async fn test_collect_pages_stops_at_empty_page() {
        let teams = collect_pages(8, |page| async move {
            let body = match page {
                0 => r#"[{"key": "frc254", "team_number": 254}]"#,
                1 => r#"[{"key": "frc604", "team_number": 604}]"#,
                _ => "[]",
            };
            Ok::<_, ImportError>((format!("teams/{page}"), body.to_string()))
        })
        .await
        .unwrap();

        assert_eq!(teams.len(), 2);
        assert!(teams.iter().all(|entry| entry.is_ok()));
    }

    #[tokio::test]
    async fn test_collect_pages_marks_truncated_listing() {
        let teams = collect_pages(3, |page| async move {
            let body = format!(r#"[{{"key": "frc{n}", "team_number": {n}}}]"#, n = page + 1);
            Ok::<_, ImportError>((format!("teams/{page}"), body))
        })
        .await
        .unwrap();

        assert_eq!(teams.len(), 4);
        let failure = teams[3].as_ref().unwrap_err();
        assert_eq!(failure.index, 3);
        assert!(failure.reason.contains("truncated"), "reason: {}", failure.reason);
    }
}
