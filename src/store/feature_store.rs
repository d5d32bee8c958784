//! HTTP feature store client.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::AUTHORIZATION;
use reqwest_middleware::ClientWithMiddleware;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{FeatureStore, GroupRef};
use crate::config::{HttpConfig, StoreConfig};
use crate::domain::{ForecastRecord, Observation, RowSource};
use crate::error::PipelineError;
use crate::http::retrying_client;

pub struct HttpFeatureStore {
    client: ClientWithMiddleware,
    base_url: String,
    api_key: String,
    project: String,
    async_insert: bool,
}

impl HttpFeatureStore {
    pub fn new(store: &StoreConfig, http: &HttpConfig) -> Result<Self, PipelineError> {
        Ok(Self {
            client: retrying_client(http.timeout(), http.max_retries)?,
            base_url: store.base_url.trim_end_matches('/').to_string(),
            api_key: store.api_key.clone(),
            project: store.project.clone(),
            async_insert: store.async_insert,
        })
    }

    /// Override the backing client, for tests against a local mock server.
    pub fn with_client(
        client: ClientWithMiddleware,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        project: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            project: project.into(),
            async_insert: false,
        }
    }

    fn group_url(&self, group: &GroupRef) -> String {
        format!(
            "{}/api/projects/{}/featuregroups/{}/versions/{}/rows",
            self.base_url, self.project, group.name, group.version
        )
    }

    fn auth(&self) -> String {
        format!("ApiKey {}", self.api_key)
    }

    async fn read_rows<T: for<'de> Deserialize<'de>>(
        &self,
        group: &GroupRef,
    ) -> Result<Vec<T>, PipelineError> {
        let url = self.group_url(group);
        debug!(%url, "reading feature group");

        let response = self
            .client
            .get(&url)
            .header(AUTHORIZATION, self.auth())
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(PipelineError::connection(format!(
                "feature store rejected API key for {group}: HTTP {status}"
            )));
        }
        if !status.is_success() {
            return Err(PipelineError::connection(format!(
                "feature store read of {group} failed: HTTP {status}"
            )));
        }

        let body: RowsEnvelope<T> = response.json().await.map_err(|e| {
            PipelineError::data(format!("failed to parse feature store response: {e}"))
        })?;
        Ok(body.rows)
    }

    async fn write_rows<T: Serialize>(
        &self,
        group: &GroupRef,
        rows: &[T],
    ) -> Result<(), PipelineError> {
        let url = format!(
            "{}?await_materialization={}",
            self.group_url(group),
            !self.async_insert
        );
        debug!(%url, rows = rows.len(), "upserting into feature group");

        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, self.auth())
            .json(&RowsRefEnvelope { rows })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::connection(format!(
                "feature store upsert into {group} failed: HTTP {status}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl FeatureStore for HttpFeatureStore {
    async fn read_observations(&self, group: &GroupRef) -> Result<Vec<Observation>, PipelineError> {
        let rows: Vec<ObservationRow> = self.read_rows(group).await?;
        if rows.is_empty() {
            return Err(PipelineError::data(format!(
                "feature group {group} is empty"
            )));
        }
        info!(%group, rows = rows.len(), "read observation history");
        rows.into_iter().map(ObservationRow::into_observation).collect()
    }

    async fn insert_observations(
        &self,
        group: &GroupRef,
        city: &str,
        rows: &[Observation],
    ) -> Result<(), PipelineError> {
        let wire: Vec<ObservationRow> = rows
            .iter()
            .map(|o| ObservationRow::from_observation(city, o))
            .collect();
        self.write_rows(group, &wire).await?;
        info!(%group, rows = wire.len(), "upserted observations");
        Ok(())
    }

    async fn insert_predictions(
        &self,
        group: &GroupRef,
        rows: &[ForecastRecord],
    ) -> Result<(), PipelineError> {
        self.write_rows(group, rows).await?;
        info!(%group, rows = rows.len(), "upserted forecast batch");
        Ok(())
    }

    async fn read_predictions(
        &self,
        group: &GroupRef,
    ) -> Result<Vec<ForecastRecord>, PipelineError> {
        let rows: Vec<ForecastRecord> = self.read_rows(group).await?;
        if rows.is_empty() {
            return Err(PipelineError::data(format!(
                "feature group {group} is empty"
            )));
        }
        Ok(rows)
    }
}

#[derive(Debug, Deserialize)]
struct RowsEnvelope<T> {
    rows: Vec<T>,
}

#[derive(Debug, Serialize)]
struct RowsRefEnvelope<'a, T> {
    rows: &'a [T],
}

/// Wire shape of one observation row. Timestamps travel as epoch
/// milliseconds, matching the feature group's primary-key column.
#[derive(Debug, Serialize, Deserialize)]
struct ObservationRow {
    city: String,
    time: i64,
    pm2_5: f64,
    pm10: Option<f64>,
    temperature_2m: f64,
    relative_humidity_2m: f64,
    wind_speed_10m: f64,
    #[serde(default)]
    source: Option<RowSource>,
}

impl ObservationRow {
    fn from_observation(city: &str, o: &Observation) -> Self {
        Self {
            city: city.to_string(),
            time: o.time.timestamp_millis(),
            pm2_5: o.pm2_5,
            pm10: o.pm10,
            temperature_2m: o.temperature_2m,
            relative_humidity_2m: o.relative_humidity_2m,
            wind_speed_10m: o.wind_speed_10m,
            source: Some(o.source),
        }
    }

    fn into_observation(self) -> Result<Observation, PipelineError> {
        let time: DateTime<Utc> = DateTime::from_timestamp_millis(self.time)
            .ok_or_else(|| {
                PipelineError::data(format!("row carries invalid epoch millis {}", self.time))
            })?;
        Ok(Observation {
            time,
            pm2_5: self.pm2_5,
            pm10: self.pm10,
            temperature_2m: self.temperature_2m,
            relative_humidity_2m: self.relative_humidity_2m,
            wind_speed_10m: self.wind_speed_10m,
            source: self.source.unwrap_or(RowSource::Observed),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn observation_row_round_trip() {
        let obs = Observation {
            time: Utc.with_ymd_and_hms(2025, 6, 1, 13, 0, 0).unwrap(),
            pm2_5: 42.5,
            pm10: Some(80.0),
            temperature_2m: 33.0,
            relative_humidity_2m: 58.0,
            wind_speed_10m: 6.5,
            source: RowSource::Observed,
        };

        let row = ObservationRow::from_observation("Karachi", &obs);
        assert_eq!(row.city, "Karachi");
        assert_eq!(row.time, obs.time.timestamp_millis());

        let back = row.into_observation().unwrap();
        assert_eq!(back.time, obs.time);
        assert_eq!(back.pm2_5, 42.5);
    }

    #[test]
    fn rows_missing_source_default_to_observed() {
        let json = r#"{"city":"Karachi","time":1748782800000,"pm2_5":10.0,
            "pm10":null,"temperature_2m":30.0,"relative_humidity_2m":60.0,
            "wind_speed_10m":4.0}"#;
        let row: ObservationRow = serde_json::from_str(json).unwrap();
        let obs = row.into_observation().unwrap();
        assert_eq!(obs.source, RowSource::Observed);
    }

    #[test]
    fn group_ref_display() {
        let group = GroupRef::new("karachi_aqi_weather", 1);
        assert_eq!(group.to_string(), "karachi_aqi_weather/v1");
    }
}
