use anyhow::Result;
use aqi_forecaster::{
    config::Config,
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

    let summary = pipeline::training::run(&cfg, &store, &registry).await?;
    info!(
        version = summary.version,
        selected = %summary.report.selected,
        "training pipeline finished"
    );
    Ok(())
}
