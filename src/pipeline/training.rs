//! Training pipeline: read the full observation history, engineer lagged
//! features, train and select a regressor, register model plus scaler.

use tracing::info;

use crate::config::Config;
use crate::domain::ObservationWindow;
use crate::error::PipelineError;
use crate::features::prepare_training_data;
use crate::ml::training::{train_and_select, TrainReport};
use crate::store::{FeatureStore, GroupRef, ModelRegistry};

pub struct TrainSummary {
    pub version: u32,
    pub report: TrainReport,
}

pub async fn run(
    cfg: &Config,
    store: &dyn FeatureStore,
    registry: &dyn ModelRegistry,
) -> Result<TrainSummary, PipelineError> {
    let group = GroupRef::new(
        &cfg.groups.observations_name,
        cfg.groups.observations_version,
    );
    let rows = store.read_observations(&group).await?;
    let window = ObservationWindow::from_rows(rows)?;

    let data = prepare_training_data(&window)?;
    let bundle = train_and_select(&data)?;
    let version = registry.upload(&cfg.model.name, &bundle).await?;

    info!(
        model = %cfg.model.name,
        version,
        selected = %bundle.report.selected,
        train_samples = bundle.report.train_samples,
        test_samples = bundle.report.test_samples,
        "training pipeline complete"
    );

    Ok(TrainSummary {
        version,
        report: bundle.report,
    })
}
