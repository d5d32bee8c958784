//! Open-Meteo integration: hourly air-quality observations and weather
//! forecasts for a fixed geographic point.
//!
//! Both endpoints answer with an "hourly" object of parallel arrays keyed
//! by variable name. Rows are reassembled by zipping those arrays; ragged
//! arrays are malformed data, not a transport failure.

use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::config::{HttpConfig, IngestConfig, LocationConfig};
use crate::domain::{ExogenousPoint, Observation, RowSource};
use crate::error::PipelineError;
use crate::http::retrying_client;

const HOURLY_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M";

pub struct OpenMeteoClient {
    client: ClientWithMiddleware,
    air_quality_base_url: String,
    weather_base_url: String,
}

impl OpenMeteoClient {
    pub fn new(ingest: &IngestConfig, http: &HttpConfig) -> Result<Self, PipelineError> {
        Ok(Self {
            client: retrying_client(http.timeout(), http.max_retries)?,
            air_quality_base_url: ingest.air_quality_base_url.clone(),
            weather_base_url: ingest.weather_base_url.clone(),
        })
    }

    /// Override endpoints, for tests against a local mock server.
    pub fn with_base_urls(
        client: ClientWithMiddleware,
        air_quality_base_url: impl Into<String>,
        weather_base_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            air_quality_base_url: air_quality_base_url.into(),
            weather_base_url: weather_base_url.into(),
        }
    }

    /// Fetch the last `past_days` of hourly PM observations merged with the
    /// matching weather covariates, joined on timestamp.
    pub async fn fetch_recent_observations(
        &self,
        location: &LocationConfig,
        past_days: u32,
    ) -> Result<Vec<Observation>, PipelineError> {
        let aq_url = format!(
            "{}/v1/air-quality?latitude={:.4}&longitude={:.4}&hourly=pm2_5,pm10&past_days={}&forecast_days=0&timezone=UTC",
            self.air_quality_base_url.trim_end_matches('/'),
            location.latitude,
            location.longitude,
            past_days
        );
        let weather_url = format!(
            "{}/v1/forecast?latitude={:.4}&longitude={:.4}&hourly=temperature_2m,relative_humidity_2m,wind_speed_10m&past_days={}&forecast_days=0&timezone=UTC",
            self.weather_base_url.trim_end_matches('/'),
            location.latitude,
            location.longitude,
            past_days
        );

        debug!(%aq_url, %weather_url, "fetching recent observations");

        let aq: AirQualityResponse = self.get_json(&aq_url).await?;
        let weather: WeatherResponse = self.get_json(&weather_url).await?;

        let rows = merge_hourly(&aq.hourly, &weather.hourly)?;
        info!(
            city = %location.city,
            rows = rows.len(),
            "fetched recent air quality and weather observations"
        );
        Ok(rows)
    }

    /// Fetch the next `forecast_days` of hourly weather covariates.
    pub async fn fetch_weather_forecast(
        &self,
        location: &LocationConfig,
        forecast_days: u32,
    ) -> Result<Vec<ExogenousPoint>, PipelineError> {
        let url = format!(
            "{}/v1/forecast?latitude={:.4}&longitude={:.4}&hourly=temperature_2m,relative_humidity_2m,wind_speed_10m&past_days=0&forecast_days={}&timezone=UTC",
            self.weather_base_url.trim_end_matches('/'),
            location.latitude,
            location.longitude,
            forecast_days
        );

        debug!(%url, "fetching weather forecast");

        let weather: WeatherResponse = self.get_json(&url).await?;
        let points = weather_points(&weather.hourly)?;
        info!(
            city = %location.city,
            points = points.len(),
            "fetched weather forecast"
        );
        Ok(points)
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<T, PipelineError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::connection(format!(
                "open-meteo API error: HTTP {status}"
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| PipelineError::data(format!("failed to parse open-meteo response: {e}")))
    }
}

fn parse_hour(raw: &str) -> Result<DateTime<Utc>, PipelineError> {
    NaiveDateTime::parse_from_str(raw, HOURLY_TIME_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| PipelineError::data(format!("bad hourly timestamp '{raw}': {e}")))
}

fn merge_hourly(
    aq: &AirQualityHourly,
    weather: &WeatherHourly,
) -> Result<Vec<Observation>, PipelineError> {
    if aq.pm2_5.len() != aq.time.len() || aq.pm10.len() != aq.time.len() {
        return Err(PipelineError::data(
            "air-quality hourly arrays have mismatched lengths",
        ));
    }
    check_weather_shape(weather)?;

    let mut covariates: HashMap<DateTime<Utc>, (f64, f64, f64)> = HashMap::new();
    for (i, raw) in weather.time.iter().enumerate() {
        if let (Some(t), Some(rh), Some(ws)) = (
            weather.temperature_2m[i],
            weather.relative_humidity_2m[i],
            weather.wind_speed_10m[i],
        ) {
            covariates.insert(parse_hour(raw)?, (t, rh, ws));
        }
    }

    let mut rows = Vec::with_capacity(aq.time.len());
    for (i, raw) in aq.time.iter().enumerate() {
        let time = parse_hour(raw)?;
        let (Some(pm2_5), Some((t, rh, ws))) = (aq.pm2_5[i], covariates.get(&time)) else {
            // Hours missing either side of the join are skipped, not fatal:
            // the two endpoints publish on slightly different delays.
            continue;
        };
        rows.push(Observation {
            time,
            pm2_5,
            pm10: aq.pm10[i],
            temperature_2m: *t,
            relative_humidity_2m: *rh,
            wind_speed_10m: *ws,
            source: RowSource::Observed,
        });
    }

    if rows.is_empty() {
        return Err(PipelineError::data(
            "no overlapping hours between air-quality and weather responses",
        ));
    }
    Ok(rows)
}

fn weather_points(hourly: &WeatherHourly) -> Result<Vec<ExogenousPoint>, PipelineError> {
    check_weather_shape(hourly)?;

    let mut points = Vec::with_capacity(hourly.time.len());
    for (i, raw) in hourly.time.iter().enumerate() {
        let (Some(t), Some(rh), Some(ws)) = (
            hourly.temperature_2m[i],
            hourly.relative_humidity_2m[i],
            hourly.wind_speed_10m[i],
        ) else {
            continue;
        };
        points.push(ExogenousPoint {
            time: parse_hour(raw)?,
            temperature_2m: t,
            relative_humidity_2m: rh,
            wind_speed_10m: ws,
        });
    }

    if points.is_empty() {
        return Err(PipelineError::data("weather forecast contains no usable hours"));
    }
    Ok(points)
}

fn check_weather_shape(hourly: &WeatherHourly) -> Result<(), PipelineError> {
    let n = hourly.time.len();
    if hourly.temperature_2m.len() != n
        || hourly.relative_humidity_2m.len() != n
        || hourly.wind_speed_10m.len() != n
    {
        return Err(PipelineError::data(
            "weather hourly arrays have mismatched lengths",
        ));
    }
    Ok(())
}

// Open-Meteo response structures

#[derive(Debug, Deserialize)]
struct AirQualityResponse {
    hourly: AirQualityHourly,
}

#[derive(Debug, Deserialize)]
struct AirQualityHourly {
    time: Vec<String>,
    pm2_5: Vec<Option<f64>>,
    pm10: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct WeatherResponse {
    hourly: WeatherHourly,
}

#[derive(Debug, Deserialize)]
struct WeatherHourly {
    time: Vec<String>,
    temperature_2m: Vec<Option<f64>>,
    relative_humidity_2m: Vec<Option<f64>>,
    wind_speed_10m: Vec<Option<f64>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aq_hourly(times: &[&str], pm: &[Option<f64>]) -> AirQualityHourly {
        AirQualityHourly {
            time: times.iter().map(|t| t.to_string()).collect(),
            pm2_5: pm.to_vec(),
            pm10: vec![None; pm.len()],
        }
    }

    fn weather_hourly(times: &[&str]) -> WeatherHourly {
        WeatherHourly {
            time: times.iter().map(|t| t.to_string()).collect(),
            temperature_2m: vec![Some(30.0); times.len()],
            relative_humidity_2m: vec![Some(60.0); times.len()],
            wind_speed_10m: vec![Some(4.0); times.len()],
        }
    }

    #[test]
    fn parse_hour_accepts_openmeteo_format() {
        let t = parse_hour("2025-06-01T13:00").unwrap();
        assert_eq!(t.to_rfc3339(), "2025-06-01T13:00:00+00:00");
    }

    #[test]
    fn merge_joins_on_timestamp() {
        let aq = aq_hourly(
            &["2025-06-01T00:00", "2025-06-01T01:00", "2025-06-01T02:00"],
            &[Some(10.0), Some(11.0), Some(12.0)],
        );
        let weather = weather_hourly(&["2025-06-01T01:00", "2025-06-01T02:00"]);

        let rows = merge_hourly(&aq, &weather).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].pm2_5, 11.0);
        assert_eq!(rows[0].source, RowSource::Observed);
    }

    #[test]
    fn merge_skips_null_pm_rows() {
        let aq = aq_hourly(
            &["2025-06-01T00:00", "2025-06-01T01:00"],
            &[None, Some(11.0)],
        );
        let weather = weather_hourly(&["2025-06-01T00:00", "2025-06-01T01:00"]);

        let rows = merge_hourly(&aq, &weather).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].pm2_5, 11.0);
    }

    #[test]
    fn ragged_arrays_are_a_data_error() {
        let mut aq = aq_hourly(&["2025-06-01T00:00"], &[Some(10.0)]);
        aq.pm2_5.push(Some(11.0));
        let weather = weather_hourly(&["2025-06-01T00:00"]);
        assert!(matches!(
            merge_hourly(&aq, &weather),
            Err(PipelineError::Data(_))
        ));
    }

    #[test]
    fn disjoint_hours_are_a_data_error() {
        let aq = aq_hourly(&["2025-06-01T00:00"], &[Some(10.0)]);
        let weather = weather_hourly(&["2025-06-02T00:00"]);
        assert!(matches!(
            merge_hourly(&aq, &weather),
            Err(PipelineError::Data(_))
        ));
    }
}
