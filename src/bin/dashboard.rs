use anyhow::Result;
use aqi_forecaster::{
    config::Config,
    dashboard::{self, DashboardState},
    store::HttpFeatureStore,
    telemetry,
};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init_tracing();

    let cfg = Config::load()?;

    if cfg.store.api_key.is_empty() || cfg.store.api_key.starts_with("__SET_VIA_ENV") {
        anyhow::bail!(
            "AQI__STORE__API_KEY environment variable must be set to the feature store API key"
        );
    }

    let store = Arc::new(HttpFeatureStore::new(&cfg.store, &cfg.http)?);
    let state = DashboardState::new(cfg.clone(), store);

    dashboard::spawn_refresh_task(state.clone());

    let app = dashboard::router(state);
    let addr = cfg.dashboard.socket_addr()?;

    if cfg.dashboard.host == "0.0.0.0" {
        warn!("dashboard binding to 0.0.0.0 - service will be accessible from the network");
    }

    info!(%addr, "starting AQI dashboard");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(telemetry::shutdown_signal())
        .await?;

    warn!("shutdown complete");
    Ok(())
}
