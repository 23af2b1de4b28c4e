use tracing::{debug, instrument};

use crate::config::ClientConfig;
use crate::error::Result;
use crate::model::{EventRecord, RecordBatch};
use crate::remote::{self, decode_batch};

#[instrument(skip(client, config), fields(season = config.season))]
pub(crate) async fn list_events(
    client: &reqwest::Client,
    config: &ClientConfig,
) -> Result<RecordBatch<EventRecord>> {
    let url = format!("{}/events/{}", config.base_url, config.season);
    let body = remote::get_text(client, config, &url).await?;
    let events = decode_batch(&body, &url, 0)?;
    debug!(count = events.len(), "fetched events");
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_events() {
        let body = r#"[
            {"key": "2016casj", "name": "Silicon Valley Regional", "event_code": "casj",
             "event_type": 0, "year": 2016, "start_date": "2016-03-24", "end_date": "2016-03-26",
             "city": "San Jose", "state_prov": "CA", "country": "USA"},
            {"key": "2016cmp", "name": "Championship", "start_date": "March 2016"}
        ]"#;
        let events: RecordBatch<EventRecord> = decode_batch(body, "events", 0).unwrap();

        let first = events[0].as_ref().unwrap();
        assert_eq!(first.key, "2016casj");
        assert_eq!(first.year, Some(2016));
        assert_eq!(
            first.start_date,
            chrono::NaiveDate::from_ymd_opt(2016, 3, 24)
        );
        assert_eq!(first.city.as_deref(), Some("San Jose"));

        let failure = events[1].as_ref().unwrap_err();
        assert_eq!(failure.index, 1);
        assert_eq!(failure.key.as_deref(), Some("2016cmp"));
    }
}
