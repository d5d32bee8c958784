//! Batch inference: load the pinned model/scaler pair, read the history
//! window, fetch the weather forecast for the horizon and roll the
//! recursive forecaster forward, then upsert the batch.

use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::domain::{ExogenousPoint, ObservationWindow};
use crate::error::PipelineError;
use crate::forecast::RecursiveForecaster;
use crate::ingest::OpenMeteoClient;
use crate::store::{FeatureStore, GroupRef, ModelRegistry};

pub async fn run(
    cfg: &Config,
    store: &dyn FeatureStore,
    registry: &dyn ModelRegistry,
    weather: &OpenMeteoClient,
) -> Result<usize, PipelineError> {
    let horizon = cfg.forecast.horizon_hours as usize;
    if horizon == 0 {
        return Err(PipelineError::input(
            "forecast.horizon_hours is 0, a non-empty forecast was expected",
        ));
    }

    let model_dir = registry
        .download(
            &cfg.model.name,
            cfg.model.version,
            Path::new(&cfg.model.artifact_dir),
        )
        .await?;
    let (model, scaler) = model_dir.load()?;

    let obs_group = GroupRef::new(
        &cfg.groups.observations_name,
        cfg.groups.observations_version,
    );
    let rows = store.read_observations(&obs_group).await?;
    let window = ObservationWindow::from_rows(rows)?;
    let last_time = window
        .last()
        .map(|r| r.time)
        .ok_or_else(|| PipelineError::data("observation history is empty"))?;

    let points = weather
        .fetch_weather_forecast(&cfg.location, cfg.ingest.forecast_days)
        .await?;
    let future: Vec<ExogenousPoint> = points
        .into_iter()
        .filter(|p| p.time > last_time)
        .take(horizon)
        .collect();
    if future.len() < horizon {
        return Err(PipelineError::data(format!(
            "weather forecast covers only {} of {horizon} requested hours past {last_time}",
            future.len()
        )));
    }

    let forecaster = RecursiveForecaster::new(Arc::new(model), scaler, &cfg.location.city)?;
    let forecast = forecaster.forecast(&window, &future)?;

    let pred_group = GroupRef::new(
        &cfg.groups.predictions_name,
        cfg.groups.predictions_version,
    );
    store
        .insert_predictions(&pred_group, &forecast.records)
        .await?;

    info!(
        city = %cfg.location.city,
        %pred_group,
        steps = forecast.records.len(),
        "batch inference complete"
    );
    Ok(forecast.records.len())
}
