//! Ollama registry client: manifests and content-addressed blobs.
//!
//! The registry speaks a small subset of the OCI distribution API:
//! `GET /v2/<path>/manifests/<tag>` and `GET /v2/<path>/blobs/<digest>`.
//! No authentication is used.

mod manifest;

pub use manifest::{Layer, Manifest};

use crate::config::{NetworkConfig, RegistryConfig};
use crate::error::{Result, WranglerError};
use crate::network::{BlobDownloader, DownloadTask, HttpClients};
use crate::progress::ProgressSink;
use crate::reference::ModelReference;
use crate::types::ArtifactCandidate;
use reqwest::StatusCode;
use std::path::Path;
use tracing::{debug, info};

/// Registry base URL. Defaults to the public Ollama registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEndpoints {
    pub base: String,
}

impl Default for RegistryEndpoints {
    fn default() -> Self {
        Self {
            base: RegistryConfig::REGISTRY_BASE.to_string(),
        }
    }
}

impl RegistryEndpoints {
    pub fn with_base(base: &str) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    pub fn manifest_url(&self, path: &str, tag: &str) -> String {
        format!("{}/v2/{}/manifests/{}", self.base, path, tag)
    }

    pub fn blob_url(&self, path: &str, digest: &str) -> String {
        format!("{}/v2/{}/blobs/{}", self.base, path, digest)
    }
}

/// Client for registry operations.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    endpoints: RegistryEndpoints,
    downloader: BlobDownloader,
}

impl RegistryClient {
    pub fn new(endpoints: RegistryEndpoints, clients: HttpClients) -> Self {
        Self {
            endpoints,
            downloader: BlobDownloader::new(clients),
        }
    }

    /// Client for the public registry.
    pub fn public() -> Result<Self> {
        Ok(Self::new(RegistryEndpoints::default(), HttpClients::new(None)?))
    }

    pub fn endpoints(&self) -> &RegistryEndpoints {
        &self.endpoints
    }

    /// Fetch the manifest for a resolved reference.
    pub async fn get_manifest(
        &self,
        reference: &ModelReference,
        progress: &dyn ProgressSink,
    ) -> Result<Manifest> {
        let url = self
            .endpoints
            .manifest_url(&reference.source_path, &reference.revision);
        progress.status(&format!("Fetching manifest for {}", reference));
        debug!("GET {}", url);

        let response = self
            .downloader
            .clients()
            .api
            .get(&url)
            .send()
            .await
            .map_err(|e| {
                WranglerError::request("Failed to fetch manifest", e, NetworkConfig::REQUEST_TIMEOUT)
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(WranglerError::NotFound {
                message: format!("Model '{}' not found in Ollama registry", reference),
            });
        }
        if !status.is_success() {
            return Err(WranglerError::Network {
                message: format!("Failed to fetch manifest: HTTP {}", status),
                cause: None,
            });
        }

        let body = response.text().await.map_err(|e| {
            WranglerError::request("Failed to read manifest", e, NetworkConfig::REQUEST_TIMEOUT)
        })?;
        let manifest = Manifest::from_json(&body)?;
        info!(
            "Manifest for {} lists {} layers",
            reference,
            manifest.layers.len()
        );
        Ok(manifest)
    }

    /// Download a layer blob to `destination`, verifying its digest.
    ///
    /// On a digest mismatch nothing is left at `destination`.
    pub async fn download_blob(
        &self,
        reference: &ModelReference,
        layer: &ArtifactCandidate,
        destination: &Path,
        progress: &dyn ProgressSink,
    ) -> Result<u64> {
        let digest = layer
            .digest
            .clone()
            .ok_or_else(|| WranglerError::InvalidManifest {
                message: "model layer has no digest".to_string(),
            })?;

        match layer.size_bytes {
            Some(size) => progress.status(&format!(
                "Downloading model ({:.2} GB)",
                size as f64 / 1e9
            )),
            None => progress.status("Downloading model"),
        }

        let task = DownloadTask::new(
            self.endpoints.blob_url(&reference.source_path, &digest),
            destination,
        )
        .with_expected_size(layer.size_bytes)
        .with_expected_digest(Some(digest));

        let bytes = self.downloader.download(&task, progress).await?;
        progress.status("Download verified");
        Ok(bytes)
    }
}
