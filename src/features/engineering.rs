//! Training feature engineering: hour-of-day plus 1h/24h target lags.

use chrono::{DateTime, Timelike, Utc};

use super::schema::FeatureSchema;
use crate::domain::ObservationWindow;
use crate::error::PipelineError;

/// Design matrix and targets for the supervised problem, in schema order.
#[derive(Debug, Clone)]
pub struct TrainingData {
    pub schema: FeatureSchema,
    pub x: Vec<Vec<f64>>,
    pub y: Vec<f64>,
    pub times: Vec<DateTime<Utc>>,
}

impl TrainingData {
    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }
}

/// Derive (X, y) from an observation window. Rows whose 24h lag would reach
/// before the start of the window are dropped, so the first sample sits at
/// index 24.
pub fn prepare_training_data(window: &ObservationWindow) -> Result<TrainingData, PipelineError> {
    let rows = window.rows();
    if rows.len() < 25 {
        return Err(PipelineError::data(format!(
            "need at least 25 observations to build lagged training rows, got {}",
            rows.len()
        )));
    }

    let schema = FeatureSchema::pm2_5_default();
    let n = rows.len() - 24;
    let mut x = Vec::with_capacity(n);
    let mut y = Vec::with_capacity(n);
    let mut times = Vec::with_capacity(n);

    for i in 24..rows.len() {
        let row = &rows[i];
        x.push(vec![
            row.temperature_2m,
            row.relative_humidity_2m,
            row.wind_speed_10m,
            row.time.hour() as f64,
            rows[i - 1].pm2_5,
            rows[i - 24].pm2_5,
        ]);
        y.push(row.pm2_5);
        times.push(row.time);
    }

    Ok(TrainingData { schema, x, y, times })
}
