//! Random forest wrapper around SmartCore.

use serde::{Deserialize, Serialize};
use smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;

use super::ridge::to_dense_matrix;
use super::{ModelKind, ModelMetadata, Regressor, ValidationMetrics};
use crate::error::PipelineError;
use crate::features::{FeatureSchema, FeatureVector};

#[derive(Debug, Serialize, Deserialize)]
pub struct ForestModel {
    pub metadata: ModelMetadata,
    pub n_trees: usize,
    pub max_depth: Option<u16>,
    model: RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>,
}

impl ForestModel {
    /// Parameters matching the training pipeline defaults: 100 trees,
    /// bounded depth, fixed seed for reproducible registry artifacts.
    pub fn default_parameters() -> RandomForestRegressorParameters {
        RandomForestRegressorParameters {
            max_depth: Some(12),
            min_samples_leaf: 2,
            min_samples_split: 5,
            n_trees: 100,
            m: None,
            keep_samples: false,
            seed: 42,
        }
    }

    pub fn train(
        x: &[Vec<f64>],
        y: &[f64],
        params: RandomForestRegressorParameters,
        schema: FeatureSchema,
    ) -> Result<Self, PipelineError> {
        let x_matrix = to_dense_matrix(x, schema.len())?;
        if x.len() != y.len() {
            return Err(PipelineError::input(format!(
                "feature and target count mismatch: {} rows, {} targets",
                x.len(),
                y.len()
            )));
        }

        let n_trees = params.n_trees as usize;
        let max_depth = params.max_depth;

        let model = RandomForestRegressor::fit(&x_matrix, &y.to_vec(), params)
            .map_err(|e| PipelineError::model(format!("random forest training failed: {e:?}")))?;

        let predictions = model.predict(&x_matrix).map_err(|e| {
            PipelineError::model(format!("random forest self-prediction failed: {e:?}"))
        })?;
        let metrics = ValidationMetrics::compute(&predictions, y)?;

        let metadata = ModelMetadata {
            model_id: format!("random_forest_{}", uuid::Uuid::new_v4()),
            kind: ModelKind::RandomForest,
            trained_at: chrono::Utc::now(),
            training_samples: x.len(),
            metrics,
            schema,
        };

        Ok(Self {
            metadata,
            n_trees,
            max_depth,
            model,
        })
    }
}

impl Regressor for ForestModel {
    fn predict(&self, features: &FeatureVector) -> Result<f64, PipelineError> {
        self.metadata.schema.ensure_matches(features.schema())?;

        let x = DenseMatrix::new(1, features.len(), features.values().to_vec(), false);
        let predictions = self
            .model
            .predict(&x)
            .map_err(|e| PipelineError::model(format!("random forest prediction failed: {e:?}")))?;

        predictions
            .first()
            .copied()
            .ok_or_else(|| PipelineError::model("random forest returned empty predictions"))
    }

    fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }
}
