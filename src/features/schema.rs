//! Typed feature schema shared by the training and inference stages.
//!
//! The regressor and scaler consume plain `f64` slices, so field order is a
//! hard contract: a reordered column produces wrong values, not an error, at
//! the numeric layer. The schema makes that contract an explicit value that
//! is validated wherever two halves of the pipeline meet.

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Field order used by the PM2.5 model pair.
pub const PM2_5_FIELDS: [&str; 6] = [
    "temperature_2m",
    "relative_humidity_2m",
    "wind_speed_10m",
    "hour",
    "pm2_5_lag_1h",
    "pm2_5_lag_24h",
];

/// Ordered list of named scalar fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeatureSchema {
    fields: Vec<String>,
}

impl FeatureSchema {
    pub fn new(fields: Vec<String>) -> Self {
        Self { fields }
    }

    /// The schema the PM2.5 model pair is trained against.
    pub fn pm2_5_default() -> Self {
        Self {
            fields: PM2_5_FIELDS.iter().map(|f| f.to_string()).collect(),
        }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Check that `other` carries the same fields in the same order,
    /// reporting the first position that differs.
    pub fn ensure_matches(&self, other: &FeatureSchema) -> Result<(), PipelineError> {
        if self.fields.len() != other.fields.len() {
            return Err(PipelineError::input(format!(
                "feature schema length mismatch: expected {} fields, got {}",
                self.fields.len(),
                other.fields.len()
            )));
        }
        for (i, (a, b)) in self.fields.iter().zip(other.fields.iter()).enumerate() {
            if a != b {
                return Err(PipelineError::input(format!(
                    "feature schema mismatch at position {i}: expected '{a}', got '{b}'"
                )));
            }
        }
        Ok(())
    }
}

/// Feature values paired with the schema they were built against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureVector {
    schema: FeatureSchema,
    values: Vec<f64>,
}

impl FeatureVector {
    pub fn new(schema: FeatureSchema, values: Vec<f64>) -> Result<Self, PipelineError> {
        if values.len() != schema.len() {
            return Err(PipelineError::input(format!(
                "feature count mismatch: schema has {} fields, got {} values",
                schema.len(),
                values.len()
            )));
        }
        Ok(Self { schema, values })
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
