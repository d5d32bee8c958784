//! Machine learning layer: regressor trait, metadata, validation metrics
//! and the serializable model artifact stored in the registry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::features::{FeatureSchema, FeatureVector};

pub mod forest;
pub mod ridge;
pub mod training;

pub use forest::ForestModel;
pub use ridge::RidgeModel;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ModelKind {
    Ridge,
    RandomForest,
}

/// Held-out validation metrics for a trained regressor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ValidationMetrics {
    pub rmse: f64,
    pub mae: f64,
    pub r2: f64,
}

impl ValidationMetrics {
    pub fn compute(predictions: &[f64], targets: &[f64]) -> Result<Self, PipelineError> {
        if predictions.len() != targets.len() {
            return Err(PipelineError::input(format!(
                "prediction and target count mismatch: {} vs {}",
                predictions.len(),
                targets.len()
            )));
        }
        if predictions.is_empty() {
            return Err(PipelineError::data("no predictions to evaluate"));
        }

        let n = predictions.len() as f64;

        let mae: f64 = predictions
            .iter()
            .zip(targets.iter())
            .map(|(p, t)| (p - t).abs())
            .sum::<f64>()
            / n;

        let mse: f64 = predictions
            .iter()
            .zip(targets.iter())
            .map(|(p, t)| (p - t).powi(2))
            .sum::<f64>()
            / n;
        let rmse = mse.sqrt();

        let mean_target: f64 = targets.iter().sum::<f64>() / n;
        let ss_tot: f64 = targets.iter().map(|t| (t - mean_target).powi(2)).sum();
        let ss_res: f64 = predictions
            .iter()
            .zip(targets.iter())
            .map(|(p, t)| (t - p).powi(2))
            .sum();

        let r2 = if ss_tot.abs() < 1e-10 {
            0.0
        } else {
            1.0 - (ss_res / ss_tot)
        };

        Ok(Self { rmse, mae, r2 })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub model_id: String,
    pub kind: ModelKind,
    pub trained_at: DateTime<Utc>,
    pub training_samples: usize,
    pub metrics: ValidationMetrics,
    pub schema: FeatureSchema,
}

/// A trained point regressor: one feature vector in, one scalar out.
pub trait Regressor: Send + Sync {
    fn predict(&self, features: &FeatureVector) -> Result<f64, PipelineError>;

    fn metadata(&self) -> &ModelMetadata;

    fn kind(&self) -> ModelKind {
        self.metadata().kind
    }
}

/// The serializable model artifact uploaded to / downloaded from the model
/// registry (bincode on disk, next to its scaler).
#[derive(Debug, Serialize, Deserialize)]
pub enum ModelArtifact {
    Ridge(RidgeModel),
    Forest(ForestModel),
}

impl ModelArtifact {
    pub fn to_bytes(&self) -> Result<Vec<u8>, PipelineError> {
        bincode::serialize(self)
            .map_err(|e| PipelineError::model(format!("failed to serialize model: {e}")))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PipelineError> {
        bincode::deserialize(bytes)
            .map_err(|e| PipelineError::model(format!("failed to deserialize model: {e}")))
    }
}

impl Regressor for ModelArtifact {
    fn predict(&self, features: &FeatureVector) -> Result<f64, PipelineError> {
        match self {
            Self::Ridge(m) => m.predict(features),
            Self::Forest(m) => m.predict(features),
        }
    }

    fn metadata(&self) -> &ModelMetadata {
        match self {
            Self::Ridge(m) => m.metadata(),
            Self::Forest(m) => m.metadata(),
        }
    }
}
