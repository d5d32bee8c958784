//! Ridge regression wrapper around SmartCore.

use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::linear::ridge_regression::{RidgeRegression, RidgeRegressionParameters};

use super::{ModelKind, ModelMetadata, Regressor, ValidationMetrics};
use crate::error::PipelineError;
use crate::features::{FeatureSchema, FeatureVector};

#[derive(Debug, Serialize, Deserialize)]
pub struct RidgeModel {
    pub metadata: ModelMetadata,
    pub alpha: f64,
    model: RidgeRegression<f64, f64, DenseMatrix<f64>, Vec<f64>>,
}

impl RidgeModel {
    pub fn train(
        x: &[Vec<f64>],
        y: &[f64],
        alpha: f64,
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

        let params = RidgeRegressionParameters::default().with_alpha(alpha);
        let model = RidgeRegression::fit(&x_matrix, &y.to_vec(), params)
            .map_err(|e| PipelineError::model(format!("ridge training failed: {e:?}")))?;

        let predictions = model
            .predict(&x_matrix)
            .map_err(|e| PipelineError::model(format!("ridge self-prediction failed: {e:?}")))?;
        let metrics = ValidationMetrics::compute(&predictions, y)?;

        let metadata = ModelMetadata {
            model_id: format!("ridge_{}", uuid::Uuid::new_v4()),
            kind: ModelKind::Ridge,
            trained_at: chrono::Utc::now(),
            training_samples: x.len(),
            metrics,
            schema,
        };

        Ok(Self {
            metadata,
            alpha,
            model,
        })
    }
}

impl Regressor for RidgeModel {
    fn predict(&self, features: &FeatureVector) -> Result<f64, PipelineError> {
        self.metadata.schema.ensure_matches(features.schema())?;

        let x = DenseMatrix::new(1, features.len(), features.values().to_vec(), false);
        let predictions = self
            .model
            .predict(&x)
            .map_err(|e| PipelineError::model(format!("ridge prediction failed: {e:?}")))?;

        predictions
            .first()
            .copied()
            .ok_or_else(|| PipelineError::model("ridge returned empty predictions"))
    }

    fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }
}

/// Flatten row-major training rows into a SmartCore matrix, checking that
/// every row carries the full feature count.
pub(crate) fn to_dense_matrix(
    x: &[Vec<f64>],
    n_features: usize,
) -> Result<DenseMatrix<f64>, PipelineError> {
    if x.is_empty() {
        return Err(PipelineError::data("cannot train on empty dataset"));
    }

    let mut flat = Vec::with_capacity(x.len() * n_features);
    for row in x {
        if row.len() != n_features {
            return Err(PipelineError::input(format!(
                "training row has {} values, expected {}",
                row.len(),
                n_features
            )));
        }
        flat.extend_from_slice(row);
    }
    Ok(DenseMatrix::new(x.len(), n_features, flat, false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::ModelArtifact;

    fn xy_schema() -> FeatureSchema {
        FeatureSchema::new(vec!["x1".to_string(), "x2".to_string()])
    }

    #[test]
    fn ridge_recovers_linear_relation() {
        // y = 2*x1 + 3*x2
        let x: Vec<Vec<f64>> = vec![
            vec![1.0, 1.0],
            vec![2.0, 1.0],
            vec![1.0, 2.0],
            vec![2.0, 2.0],
            vec![3.0, 3.0],
            vec![4.0, 2.0],
            vec![2.0, 4.0],
            vec![3.0, 1.0],
        ];
        let y: Vec<f64> = x.iter().map(|r| 2.0 * r[0] + 3.0 * r[1]).collect();

        let model = RidgeModel::train(&x, &y, 0.01, xy_schema()).unwrap();
        assert!(model.metadata.metrics.r2 > 0.95);

        let fv = FeatureVector::new(xy_schema(), vec![2.0, 3.0]).unwrap();
        let pred = model.predict(&fv).unwrap();
        assert!((pred - 13.0).abs() < 1.0);
    }

    #[test]
    fn ridge_rejects_schema_mismatch_at_predict() {
        let x = vec![vec![1.0, 1.0], vec![2.0, 2.0], vec![3.0, 1.0]];
        let y = vec![2.0, 4.0, 4.0];
        let model = RidgeModel::train(&x, &y, 1.0, xy_schema()).unwrap();

        let swapped = FeatureSchema::new(vec!["x2".to_string(), "x1".to_string()]);
        let fv = FeatureVector::new(swapped, vec![1.0, 1.0]).unwrap();
        assert!(matches!(model.predict(&fv), Err(PipelineError::Input(_))));
    }

    #[test]
    fn artifact_round_trips_through_bincode() {
        let x = vec![vec![1.0, 1.0], vec![2.0, 2.0], vec![3.0, 1.0], vec![1.0, 3.0]];
        let y = vec![5.0, 10.0, 9.0, 11.0];
        let model = RidgeModel::train(&x, &y, 1.0, xy_schema()).unwrap();

        let fv = FeatureVector::new(xy_schema(), vec![2.0, 2.0]).unwrap();
        let before = model.predict(&fv).unwrap();

        let artifact = ModelArtifact::Ridge(model);
        let bytes = artifact.to_bytes().unwrap();
        let restored = ModelArtifact::from_bytes(&bytes).unwrap();

        assert_eq!(restored.predict(&fv).unwrap(), before);
    }

    #[test]
    fn empty_dataset_is_a_data_error() {
        let result = RidgeModel::train(&[], &[], 1.0, xy_schema());
        assert!(matches!(result, Err(PipelineError::Data(_))));
    }
}
