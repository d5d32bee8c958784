use anyhow::Result;
use aqi_forecaster::{config::Config, ingest::OpenMeteoClient, pipeline, store::HttpFeatureStore, telemetry};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init_tracing();

    let cfg = Config::load()?;
    let store = HttpFeatureStore::new(&cfg.store, &cfg.http)?;
    let weather = OpenMeteoClient::new(&cfg.ingest, &cfg.http)?;

    let rows = pipeline::features::run(&cfg, &store, &weather).await?;
    info!(rows, "feature pipeline finished");
    Ok(())
}
