use anyhow::Result;
use aqi_forecaster::{
    config::Config,
    ingest::OpenMeteoClient,
    pipeline,
    store::{HttpFeatureStore, HttpModelRegistry},
    telemetry,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init_tracing();

    let cfg = Config::load()?;
    let store = HttpFeatureStore::new(&cfg.store, &cfg.http)?;
    let registry = HttpModelRegistry::new(&cfg.store, &cfg.http)?;
    let weather = OpenMeteoClient::new(&cfg.ingest, &cfg.http)?;

    let steps = pipeline::inference::run(&cfg, &store, &registry, &weather).await?;
    info!(steps, "batch inference finished");
    Ok(())
}
