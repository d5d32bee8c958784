use anyhow::Result;
use figment::{providers::{Env, Format, Toml}, Figment};
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub location: LocationConfig,
    pub store: StoreConfig,
    pub groups: GroupsConfig,
    pub model: ModelConfig,
    pub forecast: ForecastConfig,
    pub ingest: IngestConfig,
    pub http: HttpConfig,
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocationConfig {
    pub city: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub base_url: String,
    pub api_key: String,
    pub project: String,
    /// Do not wait for online materialization when upserting predictions.
    pub async_insert: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GroupsConfig {
    pub observations_name: String,
    pub observations_version: u32,
    pub predictions_name: String,
    pub predictions_version: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    pub name: String,
    pub version: u32,
    pub artifact_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForecastConfig {
    pub horizon_hours: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    pub air_quality_base_url: String,
    pub weather_base_url: String,
    pub past_days: u32,
    pub forecast_days: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub timeout_seconds: u64,
    pub max_retries: u32,
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    pub host: String,
    pub port: u16,
    pub refresh_minutes: u64,
}

impl DashboardConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_minutes * 60)
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let figment = Figment::new()
            .merge(Toml::file("config/default.toml"))
            .merge(Env::prefixed("AQI__").split("__"));
        Ok(figment.extract()?)
    }
}
