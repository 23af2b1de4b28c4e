use tracing::{debug, instrument};

use crate::config::ClientConfig;
use crate::error::Result;
use crate::model::RankingsText;
use crate::remote;

#[instrument(skip(client, config))]
pub(crate) async fn get_rankings(
    client: &reqwest::Client,
    config: &ClientConfig,
    event_key: &str,
) -> Result<RankingsText> {
    let url = format!("{}/event/{event_key}/rankings", config.base_url);
    let body = remote::get_text(client, config, &url).await?;
    debug!(bytes = body.len(), "fetched rankings");
    Ok(RankingsText::new(body))
}
