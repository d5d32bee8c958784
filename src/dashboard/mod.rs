//! Dashboard JSON API.
//!
//! Serves the latest successfully loaded forecast batch plus historical
//! aggregates. A background task refreshes the batch from the feature
//! store; when a refresh fails the previous batch stays served, marked
//! stale with the error attached, instead of taking the dashboard down.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Timelike, Utc};
use itertools::Itertools;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::config::Config;
use crate::domain::{AqiBand, ForecastRecord};
use crate::error::PipelineError;
use crate::store::{FeatureStore, GroupRef};

#[derive(Debug, Clone)]
struct CachedBatch {
    records: Vec<ForecastRecord>,
    refreshed_at: DateTime<Utc>,
    stale: bool,
    last_error: Option<String>,
}

#[derive(Clone)]
pub struct DashboardState {
    inner: Arc<Inner>,
}

struct Inner {
    cfg: Config,
    store: Arc<dyn FeatureStore>,
    cache: RwLock<Option<CachedBatch>>,
}

impl DashboardState {
    pub fn new(cfg: Config, store: Arc<dyn FeatureStore>) -> Self {
        Self {
            inner: Arc::new(Inner {
                cfg,
                store,
                cache: RwLock::new(None),
            }),
        }
    }

    fn predictions_group(&self) -> GroupRef {
        GroupRef::new(
            &self.inner.cfg.groups.predictions_name,
            self.inner.cfg.groups.predictions_version,
        )
    }

    fn observations_group(&self) -> GroupRef {
        GroupRef::new(
            &self.inner.cfg.groups.observations_name,
            self.inner.cfg.groups.observations_version,
        )
    }

    /// Reload the forecast batch from the store. On failure the existing
    /// cache is kept and marked stale.
    pub async fn refresh(&self) {
        let group = self.predictions_group();
        match self.inner.store.read_predictions(&group).await {
            Ok(rows) => {
                let records = latest_batch(rows);
                info!(%group, rows = records.len(), "forecast cache refreshed");
                let mut cache = self.inner.cache.write().await;
                *cache = Some(CachedBatch {
                    records,
                    refreshed_at: Utc::now(),
                    stale: false,
                    last_error: None,
                });
            }
            Err(e) => {
                warn!(%group, error = %e, "forecast refresh failed, serving cached batch");
                let mut cache = self.inner.cache.write().await;
                if let Some(cached) = cache.as_mut() {
                    cached.stale = true;
                    cached.last_error = Some(e.to_string());
                }
            }
        }
    }
}

/// Spawn the periodic cache refresh. The first tick fires immediately so
/// the dashboard warms up without waiting a full interval.
pub fn spawn_refresh_task(state: DashboardState) -> tokio::task::JoinHandle<()> {
    let interval = state.inner.cfg.dashboard.refresh_interval();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            state.refresh().await;
        }
    })
}

pub fn router(state: DashboardState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/v1/forecast", get(get_forecast))
        .route("/api/v1/history/hourly-profile", get(get_hourly_profile))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Collapse everything ever upserted into the predictions group down to the
/// freshest value per timestamp. For the same `prediction_time`, a smaller
/// `forecast_hour_out` means the batch that produced it started later.
fn latest_batch(rows: Vec<ForecastRecord>) -> Vec<ForecastRecord> {
    let mut rows = rows
        .into_iter()
        .sorted_by(|a, b| {
            a.prediction_time
                .cmp(&b.prediction_time)
                .then(a.forecast_hour_out.cmp(&b.forecast_hour_out))
        })
        .collect::<Vec<_>>();
    rows.dedup_by(|b, a| a.prediction_time == b.prediction_time);
    rows
}

#[derive(Debug, Serialize)]
struct ForecastResponse {
    city: String,
    refreshed_at: DateTime<Utc>,
    stale: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    current_pm2_5: f64,
    peak_pm2_5: f64,
    status: AqiBand,
    records: Vec<ForecastRecord>,
}

async fn get_forecast(State(state): State<DashboardState>) -> Result<Response, ApiError> {
    let cache = state.inner.cache.read().await;
    let Some(cached) = cache.as_ref() else {
        return Err(ApiError::NotReady);
    };
    let Some(first) = cached.records.first() else {
        return Err(ApiError::NotReady);
    };

    let current = first.predicted_pm2_5;
    let peak = cached
        .records
        .iter()
        .map(|r| r.predicted_pm2_5)
        .fold(f64::NEG_INFINITY, f64::max);

    let body = ForecastResponse {
        city: state.inner.cfg.location.city.clone(),
        refreshed_at: cached.refreshed_at,
        stale: cached.stale,
        error: cached.last_error.clone(),
        current_pm2_5: current,
        peak_pm2_5: peak,
        status: AqiBand::from_pm2_5(current),
        records: cached.records.clone(),
    };
    Ok(Json(body).into_response())
}

#[derive(Debug, Serialize, PartialEq)]
struct HourlyProfilePoint {
    hour: u32,
    mean_pm2_5: f64,
    samples: usize,
}

async fn get_hourly_profile(State(state): State<DashboardState>) -> Result<Response, ApiError> {
    let group = state.observations_group();
    let rows = state
        .inner
        .store
        .read_observations(&group)
        .await
        .map_err(|e| ApiError::Upstream(e.to_string()))?;

    let grouped = rows
        .iter()
        .map(|r| (r.time.hour(), r.pm2_5))
        .into_group_map();

    let profile: Vec<HourlyProfilePoint> = grouped
        .into_iter()
        .sorted_by_key(|(hour, _)| *hour)
        .map(|(hour, values)| HourlyProfilePoint {
            hour,
            mean_pm2_5: round2(values.iter().sum::<f64>() / values.len() as f64),
            samples: values.len(),
        })
        .collect();

    Ok(Json(profile).into_response())
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("forecast cache not ready")]
    NotReady,

    #[error("upstream error: {0}")]
    Upstream(String),
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match &self {
            ApiError::NotReady => (StatusCode::SERVICE_UNAVAILABLE, "NotReady"),
            ApiError::Upstream(_) => (StatusCode::BAD_GATEWAY, "Upstream"),
        };
        let body = ErrorResponse {
            error,
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<PipelineError> for ApiError {
    fn from(error: PipelineError) -> Self {
        ApiError::Upstream(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::*;
    use crate::domain::Observation;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn record(time: &str, value: f64, hour_out: u32) -> ForecastRecord {
        ForecastRecord {
            city: "Karachi".to_string(),
            prediction_time: time.to_string(),
            predicted_pm2_5: value,
            forecast_hour_out: hour_out,
        }
    }

    struct FakeStore {
        predictions: Mutex<Result<Vec<ForecastRecord>, String>>,
    }

    #[async_trait]
    impl FeatureStore for FakeStore {
        async fn read_observations(
            &self,
            _group: &GroupRef,
        ) -> Result<Vec<Observation>, PipelineError> {
            Err(PipelineError::data("not used"))
        }

        async fn insert_observations(
            &self,
            _group: &GroupRef,
            _city: &str,
            _rows: &[Observation],
        ) -> Result<(), PipelineError> {
            Ok(())
        }

        async fn insert_predictions(
            &self,
            _group: &GroupRef,
            _rows: &[ForecastRecord],
        ) -> Result<(), PipelineError> {
            Ok(())
        }

        async fn read_predictions(
            &self,
            _group: &GroupRef,
        ) -> Result<Vec<ForecastRecord>, PipelineError> {
            self.predictions
                .lock()
                .unwrap()
                .clone()
                .map_err(PipelineError::connection)
        }
    }

    fn test_config() -> Config {
        Config {
            location: LocationConfig {
                city: "Karachi".to_string(),
                latitude: 24.8607,
                longitude: 67.0011,
            },
            store: StoreConfig {
                base_url: "http://localhost".to_string(),
                api_key: "test".to_string(),
                project: "aqi".to_string(),
                async_insert: false,
            },
            groups: GroupsConfig {
                observations_name: "karachi_aqi_weather".to_string(),
                observations_version: 1,
                predictions_name: "aqi_predictions".to_string(),
                predictions_version: 1,
            },
            model: ModelConfig {
                name: "karachi_aqi_model".to_string(),
                version: 2,
                artifact_dir: "artifacts".to_string(),
            },
            forecast: ForecastConfig { horizon_hours: 72 },
            ingest: IngestConfig {
                air_quality_base_url: "http://localhost".to_string(),
                weather_base_url: "http://localhost".to_string(),
                past_days: 2,
                forecast_days: 3,
            },
            http: HttpConfig {
                timeout_seconds: 5,
                max_retries: 1,
            },
            dashboard: DashboardConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                refresh_minutes: 60,
            },
        }
    }

    fn state_with(predictions: Result<Vec<ForecastRecord>, String>) -> DashboardState {
        DashboardState::new(
            test_config(),
            Arc::new(FakeStore {
                predictions: Mutex::new(predictions),
            }),
        )
    }

    #[tokio::test]
    async fn refresh_populates_cache() {
        let state = state_with(Ok(vec![
            record("2025-06-02 07:00:00", 14.0, 2),
            record("2025-06-02 06:00:00", 13.0, 1),
        ]));
        state.refresh().await;

        let cache = state.inner.cache.read().await;
        let cached = cache.as_ref().unwrap();
        assert!(!cached.stale);
        assert_eq!(cached.records[0].predicted_pm2_5, 13.0);
        assert_eq!(cached.records[1].predicted_pm2_5, 14.0);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_cached_batch_marked_stale() {
        let fake = Arc::new(FakeStore {
            predictions: Mutex::new(Ok(vec![record("2025-06-02 06:00:00", 13.0, 1)])),
        });
        let state = DashboardState::new(test_config(), fake.clone());
        state.refresh().await;

        *fake.predictions.lock().unwrap() = Err("store unreachable".to_string());
        state.refresh().await;

        let cache = state.inner.cache.read().await;
        let cached = cache.as_ref().unwrap();
        assert!(cached.stale);
        assert_eq!(cached.records.len(), 1);
        assert!(cached.last_error.as_ref().unwrap().contains("store unreachable"));
    }

    #[tokio::test]
    async fn failed_refresh_with_no_cache_stays_empty() {
        let state = state_with(Err("boom".to_string()));
        state.refresh().await;
        assert!(state.inner.cache.read().await.is_none());
    }

    #[test]
    fn latest_batch_keeps_freshest_row_per_timestamp() {
        // An older batch predicted 06:00 at hour-out 3; a newer one at 1.
        let rows = vec![
            record("2025-06-02 06:00:00", 20.0, 3),
            record("2025-06-02 06:00:00", 13.0, 1),
            record("2025-06-02 07:00:00", 14.0, 2),
        ];
        let batch = latest_batch(rows);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].predicted_pm2_5, 13.0);
        assert_eq!(batch[1].predicted_pm2_5, 14.0);
    }
}
