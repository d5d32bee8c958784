//! Feature pipeline: fetch recent observations and upsert them into the
//! observation feature group.

use tracing::info;

use crate::config::Config;
use crate::error::PipelineError;
use crate::ingest::OpenMeteoClient;
use crate::store::{FeatureStore, GroupRef};

pub async fn run(
    cfg: &Config,
    store: &dyn FeatureStore,
    weather: &OpenMeteoClient,
) -> Result<usize, PipelineError> {
    let rows = weather
        .fetch_recent_observations(&cfg.location, cfg.ingest.past_days)
        .await?;

    let group = GroupRef::new(
        &cfg.groups.observations_name,
        cfg.groups.observations_version,
    );
    store
        .insert_observations(&group, &cfg.location.city, &rows)
        .await?;

    info!(
        city = %cfg.location.city,
        %group,
        rows = rows.len(),
        "feature pipeline complete"
    );
    Ok(rows.len())
}
