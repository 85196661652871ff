//! Hugging Face hub client: repo listing, artifact lookup, and downloads.
//!
//! # Module Organization
//!
//! - [`types`] - API response structs and endpoint URLs
//! - [`locator`] - Ranking of pre-converted GGUF files
//! - [`snapshot`] - Resumable whole-repository downloads
//! - [`auth`] - Token resolution from the environment

pub mod auth;
pub mod locator;
mod snapshot;
mod types;

pub use types::{HubEndpoints, LfsInfo, RepoEntry};

use crate::config::NetworkConfig;
use crate::error::{Result, WranglerError};
use crate::network::{BlobDownloader, DownloadTask, HttpClients, RetryConfig};
use crate::progress::ProgressSink;
use crate::reference::ModelReference;
use crate::types::ArtifactCandidate;
use reqwest::StatusCode;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// Client for hub API operations.
#[derive(Debug, Clone)]
pub struct HubClient {
    endpoints: HubEndpoints,
    downloader: BlobDownloader,
    snapshot_retry: RetryConfig,
}

impl HubClient {
    pub fn new(endpoints: HubEndpoints, clients: HttpClients) -> Self {
        Self {
            endpoints,
            downloader: BlobDownloader::new(clients),
            snapshot_retry: RetryConfig::new()
                .with_max_attempts(NetworkConfig::SNAPSHOT_MAX_RETRIES)
                .with_base_delay(NetworkConfig::SNAPSHOT_RETRY_BASE_DELAY),
        }
    }

    /// Override the per-file retry policy used by snapshots.
    pub fn with_snapshot_retry(mut self, retry: RetryConfig) -> Self {
        self.snapshot_retry = retry;
        self
    }

    /// Client for the public hub, authenticated from the environment if a
    /// token is set.
    pub fn from_env() -> Result<Self> {
        let clients = HttpClients::new(auth::resolve_token_from_env())?;
        Ok(Self::new(HubEndpoints::default(), clients))
    }

    pub fn endpoints(&self) -> &HubEndpoints {
        &self.endpoints
    }

    fn clients(&self) -> &HttpClients {
        self.downloader.clients()
    }

    /// List the files of a repository at a revision.
    pub async fn list_files(
        &self,
        repo_id: &str,
        revision: &str,
        recursive: bool,
    ) -> Result<Vec<RepoEntry>> {
        let url = self.endpoints.tree_url(repo_id, revision, recursive);
        debug!("Listing {}", url);

        let clients = self.clients();
        let response = clients
            .authorize(clients.api.get(&url))
            .send()
            .await
            .map_err(|e| {
                WranglerError::request(format!("GET {}", url), e, NetworkConfig::REQUEST_TIMEOUT)
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(WranglerError::NotFound {
                message: format!("Repository '{}' (revision {}) not found", repo_id, revision),
            });
        }
        if !status.is_success() {
            return Err(WranglerError::Network {
                message: format!("Listing {} failed with HTTP {}", repo_id, status),
                cause: None,
            });
        }

        let body = response.bytes().await.map_err(|e| {
            WranglerError::request(
                format!("Reading listing for {}", repo_id),
                e,
                NetworkConfig::REQUEST_TIMEOUT,
            )
        })?;
        let entries: Vec<RepoEntry> =
            serde_json::from_slice(&body).map_err(|e| WranglerError::Json {
                message: format!("Invalid listing for {}: {}", repo_id, e),
                source: Some(e),
            })?;
        Ok(entries)
    }

    /// Find pre-converted GGUF files in a repository, best first.
    ///
    /// Failures are reported and logged but never propagated: an empty list
    /// sends the caller down the convert path.
    pub async fn find_gguf_files(
        &self,
        reference: &ModelReference,
        progress: &dyn ProgressSink,
    ) -> Vec<ArtifactCandidate> {
        match self
            .list_files(&reference.source_path, &reference.revision, true)
            .await
        {
            Ok(entries) => locator::rank_candidates(&entries),
            Err(e) => {
                error!("Checking {} for GGUF files failed: {}", reference.source_path, e);
                progress.status(&format!("Error checking for GGUF files: {}", e));
                Vec::new()
            }
        }
    }

    /// Download one repository file straight into `output_dir`.
    ///
    /// The local file is named after the last component of the candidate's
    /// path. Size and digest, when the listing provided them, are checked
    /// before the file appears under its final name.
    pub async fn download_file(
        &self,
        reference: &ModelReference,
        candidate: &ArtifactCandidate,
        output_dir: &Path,
        progress: &dyn ProgressSink,
    ) -> Result<PathBuf> {
        let filename = candidate.file_name();
        let destination = output_dir.join(filename);
        let url = self.endpoints.resolve_url(
            &reference.source_path,
            &reference.revision,
            &candidate.relative_path,
        );

        progress.status(&format!("Downloading {}...", filename));
        if self.clients().has_auth() {
            progress.status("Using HuggingFace token for authentication");
        }

        let task = DownloadTask::new(url, &destination)
            .with_expected_size(candidate.size_bytes)
            .with_expected_digest(candidate.digest.clone());
        self.downloader.download(&task, progress).await?;

        info!(
            "Downloaded {} to {}",
            candidate.relative_path,
            destination.display()
        );
        progress.status(&format!("Downloaded to {}", destination.display()));
        Ok(destination)
    }
}
