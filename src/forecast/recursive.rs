//! Recursive multi-step PM2.5 forecasting.
//!
//! One trained one-step-ahead regressor is rolled forward hour by hour:
//! each prediction is appended to a private copy of the observation window
//! and feeds the next step's 1h/24h lag features. Prediction error
//! therefore compounds over the horizon; that is the accepted trade-off of
//! the single-model recursive strategy and must not be "corrected" here.

use chrono::Timelike;
use std::sync::Arc;
use tracing::{debug, info};

use crate::domain::{
    ExogenousPoint, ForecastRecord, Observation, ObservationWindow, RowSource,
};
use crate::error::PipelineError;
use crate::features::{FeatureVector, StandardScaler};
use crate::ml::Regressor;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A completed forecast batch plus the extended window that produced it.
///
/// The window is the forecaster's private working copy: historical rows
/// tagged `observed`, appended rows tagged `predicted`. It is returned for
/// audit so consumers can tell how much of each lag derived from compounded
/// model output.
#[derive(Debug)]
pub struct RecursiveForecast {
    pub records: Vec<ForecastRecord>,
    pub window: ObservationWindow,
}

pub struct RecursiveForecaster {
    model: Arc<dyn Regressor>,
    scaler: StandardScaler,
    city: String,
}

impl RecursiveForecaster {
    /// Pair a regressor with its fitted scaler. The two must have been fit
    /// against the same feature schema; a mismatch here would otherwise
    /// corrupt every prediction without failing.
    pub fn new(
        model: Arc<dyn Regressor>,
        scaler: StandardScaler,
        city: impl Into<String>,
    ) -> Result<Self, PipelineError> {
        scaler
            .schema()
            .ensure_matches(&model.metadata().schema)?;
        Ok(Self {
            model,
            scaler,
            city: city.into(),
        })
    }

    /// Roll the model forward one hour per exogenous point.
    ///
    /// `history` is never mutated; the forecaster works on its own copy.
    /// An empty `future` yields an empty batch (callers that expected a
    /// non-empty horizon decide whether that is an error).
    pub fn forecast(
        &self,
        history: &ObservationWindow,
        future: &[ExogenousPoint],
    ) -> Result<RecursiveForecast, PipelineError> {
        let mut last_time = history
            .last()
            .map(|r| r.time)
            .ok_or_else(|| {
                PipelineError::data("observation history is empty, 1h lag is undefined")
            })?;

        let mut window = history.clone();
        let mut records = Vec::with_capacity(future.len());

        if window.len() < 24 {
            debug!(
                rows = window.len(),
                "window shorter than 24 rows, 24h lag falls back to the latest value"
            );
        }

        for (i, exo) in future.iter().enumerate() {
            let step = i as u32 + 1;

            if exo.time <= last_time {
                return Err(PipelineError::input(format!(
                    "exogenous timestamp {} at step {step} does not advance past {last_time}",
                    exo.time
                )));
            }

            let (lag_1h, lag_24h) = match (window.lag_1h(), window.lag_24h_or_last()) {
                (Some(l1), Some(l24)) => (l1, l24),
                _ => return Err(PipelineError::data("window drained mid-forecast")),
            };

            let features = FeatureVector::new(
                self.scaler.schema().clone(),
                vec![
                    exo.temperature_2m,
                    exo.relative_humidity_2m,
                    exo.wind_speed_10m,
                    exo.time.hour() as f64,
                    lag_1h,
                    lag_24h,
                ],
            )?;

            let scaled = self.scaler.transform(&features)?;
            let prediction = self.model.predict(&scaled)?;

            records.push(ForecastRecord {
                city: self.city.clone(),
                prediction_time: exo.time.format(TIME_FORMAT).to_string(),
                predicted_pm2_5: round2(prediction),
                forecast_hour_out: step,
            });

            // The unrounded prediction becomes the next step's lag basis.
            window.push(Observation {
                time: exo.time,
                pm2_5: prediction,
                pm10: None,
                temperature_2m: exo.temperature_2m,
                relative_humidity_2m: exo.relative_humidity_2m,
                wind_speed_10m: exo.wind_speed_10m,
                source: RowSource::Predicted,
            })?;
            last_time = exo.time;
        }

        info!(
            city = %self.city,
            steps = records.len(),
            "recursive forecast complete"
        );

        Ok(RecursiveForecast { records, window })
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
