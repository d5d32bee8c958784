//! HTTP model registry client.
//!
//! A registered model is a name plus a registry-assigned version; its
//! artifacts are two bincode files, `model.bin` and `scaler.bin`, which a
//! download materializes into a local directory.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest_middleware::ClientWithMiddleware;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::ModelRegistry;
use crate::config::{HttpConfig, StoreConfig};
use crate::error::PipelineError;
use crate::features::StandardScaler;
use crate::ml::training::{TrainedBundle, TrainReport};
use crate::ml::{ModelArtifact, Regressor};

const MODEL_FILE: &str = "model.bin";
const SCALER_FILE: &str = "scaler.bin";

/// A local directory holding a downloaded model/scaler pair.
#[derive(Debug, Clone)]
pub struct ModelDir {
    dir: PathBuf,
}

impl ModelDir {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Deserialize the model and its paired scaler.
    pub fn load(&self) -> Result<(ModelArtifact, StandardScaler), PipelineError> {
        let model_bytes = std::fs::read(self.dir.join(MODEL_FILE)).map_err(|e| {
            PipelineError::model(format!("failed to read {MODEL_FILE}: {e}"))
        })?;
        let scaler_bytes = std::fs::read(self.dir.join(SCALER_FILE)).map_err(|e| {
            PipelineError::model(format!("failed to read {SCALER_FILE}: {e}"))
        })?;

        let model = ModelArtifact::from_bytes(&model_bytes)?;
        let scaler: StandardScaler = bincode::deserialize(&scaler_bytes)
            .map_err(|e| PipelineError::model(format!("failed to deserialize scaler: {e}")))?;
        Ok((model, scaler))
    }
}

pub struct HttpModelRegistry {
    client: ClientWithMiddleware,
    base_url: String,
    api_key: String,
    project: String,
}

impl HttpModelRegistry {
    pub fn new(store: &StoreConfig, http: &HttpConfig) -> Result<Self, PipelineError> {
        Ok(Self {
            client: crate::http::retrying_client(http.timeout(), http.max_retries)?,
            base_url: store.base_url.trim_end_matches('/').to_string(),
            api_key: store.api_key.clone(),
            project: store.project.clone(),
        })
    }

    /// Override the backing client, for tests against a local mock server.
    pub fn with_client(
        client: ClientWithMiddleware,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        project: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            project: project.into(),
        }
    }

    fn model_url(&self, name: &str) -> String {
        format!(
            "{}/api/projects/{}/models/{}",
            self.base_url, self.project, name
        )
    }

    fn artifact_url(&self, name: &str, version: u32, file: &str) -> String {
        format!(
            "{}/versions/{}/artifacts/{}",
            self.model_url(name),
            version,
            file
        )
    }

    fn auth(&self) -> String {
        format!("ApiKey {}", self.api_key)
    }

    async fn put_artifact(
        &self,
        name: &str,
        version: u32,
        file: &str,
        bytes: Vec<u8>,
    ) -> Result<(), PipelineError> {
        let url = self.artifact_url(name, version, file);
        debug!(%url, size = bytes.len(), "uploading artifact");

        let response = self
            .client
            .put(&url)
            .header(AUTHORIZATION, self.auth())
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::connection(format!(
                "artifact upload of {name}/v{version}/{file} failed: HTTP {status}"
            )));
        }
        Ok(())
    }

    async fn get_artifact(
        &self,
        name: &str,
        version: u32,
        file: &str,
    ) -> Result<Vec<u8>, PipelineError> {
        let url = self.artifact_url(name, version, file);
        debug!(%url, "downloading artifact");

        let response = self
            .client
            .get(&url)
            .header(AUTHORIZATION, self.auth())
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(PipelineError::connection(format!(
                "model {name}/v{version} has no artifact {file}"
            )));
        }
        if !status.is_success() {
            return Err(PipelineError::connection(format!(
                "artifact download of {name}/v{version}/{file} failed: HTTP {status}"
            )));
        }

        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl ModelRegistry for HttpModelRegistry {
    async fn upload(&self, name: &str, bundle: &TrainedBundle) -> Result<u32, PipelineError> {
        let url = self.model_url(name);
        let request = RegisterRequest {
            metadata: bundle.model.metadata().clone(),
            report: bundle.report.clone(),
        };

        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, self.auth())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::connection(format!(
                "model registration of {name} failed: HTTP {status}"
            )));
        }

        let registered: RegisterResponse = response.json().await.map_err(|e| {
            PipelineError::data(format!("failed to parse registry response: {e}"))
        })?;
        let version = registered.version;

        self.put_artifact(name, version, MODEL_FILE, bundle.model.to_bytes()?)
            .await?;
        let scaler_bytes = bincode::serialize(&bundle.scaler)
            .map_err(|e| PipelineError::model(format!("failed to serialize scaler: {e}")))?;
        self.put_artifact(name, version, SCALER_FILE, scaler_bytes)
            .await?;

        info!(model = name, version, "registered model and scaler");
        Ok(version)
    }

    async fn download(
        &self,
        name: &str,
        version: u32,
        dest_dir: &Path,
    ) -> Result<ModelDir, PipelineError> {
        let dir = dest_dir.join(format!("{name}_v{version}"));
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            PipelineError::model(format!("failed to create artifact dir: {e}"))
        })?;

        for file in [MODEL_FILE, SCALER_FILE] {
            let bytes = self.get_artifact(name, version, file).await?;
            tokio::fs::write(dir.join(file), bytes).await.map_err(|e| {
                PipelineError::model(format!("failed to write {file}: {e}"))
            })?;
        }

        info!(model = name, version, dir = %dir.display(), "downloaded model artifacts");
        Ok(ModelDir::new(dir))
    }
}

#[derive(Debug, Serialize)]
struct RegisterRequest {
    metadata: crate::ml::ModelMetadata,
    report: TrainReport,
}

#[derive(Debug, Deserialize)]
struct RegisterResponse {
    version: u32,
}
