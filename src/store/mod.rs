//! Managed feature store and model registry clients.
//!
//! Both services live behind one project-scoped REST base URL with bearer
//! API-key auth. The traits are the seam the pipeline stages depend on;
//! tests substitute in-memory implementations.

use async_trait::async_trait;

use crate::domain::{ForecastRecord, Observation};
use crate::error::PipelineError;
use crate::ml::training::TrainedBundle;

pub mod feature_store;
pub mod registry;

pub use feature_store::HttpFeatureStore;
pub use registry::{HttpModelRegistry, ModelDir};

/// A named, versioned feature group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRef {
    pub name: String,
    pub version: u32,
}

impl GroupRef {
    pub fn new(name: impl Into<String>, version: u32) -> Self {
        Self { name: name.into(), version }
    }
}

impl std::fmt::Display for GroupRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/v{}", self.name, self.version)
    }
}

#[async_trait]
pub trait FeatureStore: Send + Sync {
    /// Read every row of an observation feature group.
    async fn read_observations(&self, group: &GroupRef) -> Result<Vec<Observation>, PipelineError>;

    /// Upsert observation rows, keyed by (city, timestamp).
    async fn insert_observations(
        &self,
        group: &GroupRef,
        city: &str,
        rows: &[Observation],
    ) -> Result<(), PipelineError>;

    /// Upsert a forecast batch, keyed by (city, prediction_time). The whole
    /// batch lands or none of it does.
    async fn insert_predictions(
        &self,
        group: &GroupRef,
        rows: &[ForecastRecord],
    ) -> Result<(), PipelineError>;

    /// Read every row of a predictions feature group.
    async fn read_predictions(&self, group: &GroupRef)
        -> Result<Vec<ForecastRecord>, PipelineError>;
}

#[async_trait]
pub trait ModelRegistry: Send + Sync {
    /// Register a trained bundle under `name`; the registry assigns and
    /// returns the new version.
    async fn upload(&self, name: &str, bundle: &TrainedBundle) -> Result<u32, PipelineError>;

    /// Download the artifacts of `name`/`version` into `dest_dir`.
    async fn download(
        &self,
        name: &str,
        version: u32,
        dest_dir: &std::path::Path,
    ) -> Result<ModelDir, PipelineError>;
}
