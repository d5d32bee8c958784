//! Core domain types for the air quality pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// How a window row came to exist. The forecaster appends `Predicted` rows
/// so that downstream consumers can tell how much of a lag feature derives
/// from compounded model output versus ground truth.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RowSource {
    Observed,
    Predicted,
}

/// One hourly observation row: PM2.5 target plus weather covariates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub time: DateTime<Utc>,
    pub pm2_5: f64,
    pub pm10: Option<f64>,
    pub temperature_2m: f64,
    pub relative_humidity_2m: f64,
    pub wind_speed_10m: f64,
    pub source: RowSource,
}

/// Ordered hourly observation window. Strictly ascending by timestamp, no
/// duplicates, append-only.
#[derive(Debug, Clone, Default)]
pub struct ObservationWindow {
    rows: Vec<Observation>,
}

impl ObservationWindow {
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }

    /// Build a window from unordered rows. Rows are sorted by timestamp;
    /// duplicate timestamps are rejected.
    pub fn from_rows(mut rows: Vec<Observation>) -> Result<Self, PipelineError> {
        rows.sort_by_key(|r| r.time);
        for pair in rows.windows(2) {
            if pair[0].time == pair[1].time {
                return Err(PipelineError::data(format!(
                    "duplicate observation timestamp {}",
                    pair[0].time
                )));
            }
        }
        Ok(Self { rows })
    }

    /// Append one row. The timestamp must advance past the current tail.
    pub fn push(&mut self, row: Observation) -> Result<(), PipelineError> {
        if let Some(last) = self.rows.last() {
            if row.time <= last.time {
                return Err(PipelineError::data(format!(
                    "appended row at {} does not advance past window tail {}",
                    row.time, last.time
                )));
            }
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn rows(&self) -> &[Observation] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn last(&self) -> Option<&Observation> {
        self.rows.last()
    }

    /// Target value one step back (the window tail).
    pub fn lag_1h(&self) -> Option<f64> {
        self.rows.last().map(|r| r.pm2_5)
    }

    /// Target value 24 rows back, falling back to the tail value when the
    /// window holds fewer than 24 rows.
    pub fn lag_24h_or_last(&self) -> Option<f64> {
        if self.rows.len() >= 24 {
            Some(self.rows[self.rows.len() - 24].pm2_5)
        } else {
            self.lag_1h()
        }
    }
}

/// A future timestamp with the weather covariates effective at it, known in
/// advance for the whole forecast horizon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExogenousPoint {
    pub time: DateTime<Utc>,
    pub temperature_2m: f64,
    pub relative_humidity_2m: f64,
    pub wind_speed_10m: f64,
}

/// One forecast step, as upserted into the predictions feature group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ForecastRecord {
    pub city: String,
    pub prediction_time: String,
    pub predicted_pm2_5: f64,
    pub forecast_hour_out: u32,
}

/// US EPA PM2.5 concentration bands, used for the dashboard status readout.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AqiBand {
    Good,
    Moderate,
    UnhealthyForSensitiveGroups,
    Unhealthy,
    VeryUnhealthy,
    Hazardous,
}

impl AqiBand {
    pub fn from_pm2_5(value: f64) -> Self {
        match value {
            v if v <= 12.0 => Self::Good,
            v if v <= 35.4 => Self::Moderate,
            v if v <= 55.4 => Self::UnhealthyForSensitiveGroups,
            v if v <= 150.4 => Self::Unhealthy,
            v if v <= 250.4 => Self::VeryUnhealthy,
            _ => Self::Hazardous,
        }
    }
}
