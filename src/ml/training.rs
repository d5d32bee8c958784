//! Model training and selection: chronological split, ridge vs random
//! forest on the held-out tail, lower RMSE wins.

use serde::{Deserialize, Serialize};
use tracing::info;

use super::{ForestModel, ModelArtifact, ModelKind, Regressor, RidgeModel, ValidationMetrics};
use crate::error::PipelineError;
use crate::features::{FeatureVector, StandardScaler, TrainingData};

const TRAIN_RATIO: f64 = 0.8;
const RIDGE_ALPHA: f64 = 1.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateReport {
    pub kind: ModelKind,
    pub metrics: ValidationMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainReport {
    pub selected: ModelKind,
    pub candidates: Vec<CandidateReport>,
    pub train_samples: usize,
    pub test_samples: usize,
}

/// Everything the training stage hands to the model registry.
pub struct TrainedBundle {
    pub model: ModelArtifact,
    pub scaler: StandardScaler,
    pub report: TrainReport,
}

/// Split rows chronologically: the past trains, the most recent tail tests.
/// Time series must never be split at random.
pub fn chronological_split(data: &TrainingData) -> Result<(TrainingData, TrainingData), PipelineError> {
    let split_idx = (data.len() as f64 * TRAIN_RATIO).floor() as usize;
    if split_idx == 0 || split_idx == data.len() {
        return Err(PipelineError::data(format!(
            "dataset of {} rows cannot be split {TRAIN_RATIO}/{}",
            data.len(),
            1.0 - TRAIN_RATIO
        )));
    }

    let train = TrainingData {
        schema: data.schema.clone(),
        x: data.x[..split_idx].to_vec(),
        y: data.y[..split_idx].to_vec(),
        times: data.times[..split_idx].to_vec(),
    };
    let test = TrainingData {
        schema: data.schema.clone(),
        x: data.x[split_idx..].to_vec(),
        y: data.y[split_idx..].to_vec(),
        times: data.times[split_idx..].to_vec(),
    };
    Ok((train, test))
}

/// Train both candidate regressors on the scaled training split, evaluate
/// on the held-out tail and keep the one with the lower RMSE.
pub fn train_and_select(data: &TrainingData) -> Result<TrainedBundle, PipelineError> {
    let (train, test) = chronological_split(data)?;

    let scaler = StandardScaler::fit(train.schema.clone(), &train.x)?;
    let x_train = scaler.transform_rows(&train.x)?;
    let x_test = scaler.transform_rows(&test.x)?;

    let ridge = RidgeModel::train(&x_train, &train.y, RIDGE_ALPHA, train.schema.clone())?;
    let forest = ForestModel::train(
        &x_train,
        &train.y,
        ForestModel::default_parameters(),
        train.schema.clone(),
    )?;

    let ridge_metrics = holdout_metrics(&ridge, &x_test, &test)?;
    let forest_metrics = holdout_metrics(&forest, &x_test, &test)?;

    info!(
        ridge_rmse = ridge_metrics.rmse,
        forest_rmse = forest_metrics.rmse,
        "candidate evaluation complete"
    );

    let candidates = vec![
        CandidateReport { kind: ModelKind::Ridge, metrics: ridge_metrics },
        CandidateReport { kind: ModelKind::RandomForest, metrics: forest_metrics },
    ];

    let (selected, model) = if forest_metrics.rmse <= ridge_metrics.rmse {
        (ModelKind::RandomForest, ModelArtifact::Forest(forest))
    } else {
        (ModelKind::Ridge, ModelArtifact::Ridge(ridge))
    };

    let report = TrainReport {
        selected,
        candidates,
        train_samples: train.len(),
        test_samples: test.len(),
    };

    Ok(TrainedBundle { model, scaler, report })
}

fn holdout_metrics<M: Regressor>(
    model: &M,
    x_test: &[Vec<f64>],
    test: &TrainingData,
) -> Result<ValidationMetrics, PipelineError> {
    let mut predictions = Vec::with_capacity(x_test.len());
    for row in x_test {
        let fv = FeatureVector::new(test.schema.clone(), row.clone())?;
        predictions.push(model.predict(&fv)?);
    }
    ValidationMetrics::compute(&predictions, &test.y)
}
