//! Streaming downloads with progress reporting.
//!
//! Provides:
//! - Blob downloads with percentage events and optional digest verification
//! - Resumable downloads (HTTP `Range`) for snapshot files
//! - Atomic file operations (`.part` file → final name)

use crate::config::NetworkConfig;
use crate::error::{Result, WranglerError};
use crate::hashing;
use crate::network::client::HttpClients;
use crate::progress::ProgressSink;
use futures::StreamExt;
use reqwest::StatusCode;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, warn};

/// One remote payload to fetch into a local file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    pub url: String,
    pub destination: PathBuf,
    /// Size advertised by a listing or manifest.
    pub expected_size: Option<u64>,
    /// `sha256:<hex>` digest the payload must match.
    pub expected_digest: Option<String>,
}

impl DownloadTask {
    pub fn new(url: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            destination: destination.into(),
            expected_size: None,
            expected_digest: None,
        }
    }

    pub fn with_expected_size(mut self, size: Option<u64>) -> Self {
        self.expected_size = size;
        self
    }

    pub fn with_expected_digest(mut self, digest: Option<String>) -> Self {
        self.expected_digest = digest;
        self
    }

    /// Temporary path the payload is streamed into before the final rename.
    pub fn temp_path(&self) -> PathBuf {
        PathBuf::from(format!(
            "{}{}",
            self.destination.display(),
            NetworkConfig::DOWNLOAD_TEMP_SUFFIX
        ))
    }
}

/// Converts byte counts into integer percentages, reporting only changes.
#[derive(Debug)]
struct PercentTracker {
    total: Option<u64>,
    last: Option<u8>,
}

impl PercentTracker {
    fn new(total: Option<u64>) -> Self {
        Self {
            total: total.filter(|t| *t > 0),
            last: None,
        }
    }

    fn is_known(&self) -> bool {
        self.total.is_some()
    }

    /// New percentage if it differs from the last one reported.
    fn update(&mut self, bytes: u64) -> Option<u8> {
        let total = self.total?;
        let pct = ((bytes.min(total) as u128 * 100) / total as u128) as u8;
        if self.last == Some(pct) {
            return None;
        }
        self.last = Some(pct);
        Some(pct)
    }
}

/// Chunked HTTP downloader.
#[derive(Debug, Clone)]
pub struct BlobDownloader {
    clients: HttpClients,
    chunk_size: usize,
}

impl BlobDownloader {
    pub fn new(clients: HttpClients) -> Self {
        Self {
            clients,
            chunk_size: NetworkConfig::DOWNLOAD_CHUNK_SIZE,
        }
    }

    pub fn clients(&self) -> &HttpClients {
        &self.clients
    }

    /// Download a single blob with percentage progress.
    ///
    /// Always starts from zero. When the task carries a digest, the payload is
    /// verified before the rename, so the final name only ever holds a
    /// complete, verified file. Any failure removes the partial file.
    pub async fn download(&self, task: &DownloadTask, progress: &dyn ProgressSink) -> Result<u64> {
        ensure_parent_dir(&task.destination).await?;

        let temp_path = task.temp_path();
        if temp_path.exists() {
            debug!("Removing stale partial download {}", temp_path.display());
            let _ = tokio::fs::remove_file(&temp_path).await;
        }

        let result = self
            .fetch(&task.url, &temp_path, 0, task.expected_size, Some(progress))
            .await;

        let bytes = match result {
            Ok(bytes) => bytes,
            Err(e) => {
                let _ = tokio::fs::remove_file(&temp_path).await;
                return Err(e);
            }
        };

        if let Some(ref expected) = task.expected_digest {
            progress.status("Verifying download...");
            if let Err(e) = hashing::verify_digest_async(&temp_path, expected).await {
                let _ = tokio::fs::remove_file(&temp_path).await;
                return Err(e);
            }
        }

        finalize(&temp_path, &task.destination).await?;
        info!("Downloaded {} bytes to {}", bytes, task.destination.display());
        Ok(bytes)
    }

    /// Download a file, resuming from an existing `.part` file if present.
    ///
    /// A destination that already exists with the expected size (or any size
    /// when none is known) is treated as complete. On failure the `.part` file
    /// is kept so the next attempt can resume.
    pub async fn download_resumable(&self, task: &DownloadTask) -> Result<u64> {
        if let Ok(meta) = tokio::fs::metadata(&task.destination).await {
            if task.expected_size.map_or(true, |size| size == meta.len()) {
                debug!("Already complete: {}", task.destination.display());
                return Ok(meta.len());
            }
            warn!(
                "Existing {} has size {} (expected {:?}), downloading again",
                task.destination.display(),
                meta.len(),
                task.expected_size
            );
            let _ = tokio::fs::remove_file(&task.destination).await;
        }

        ensure_parent_dir(&task.destination).await?;
        let temp_path = task.temp_path();
        let resume_from = tokio::fs::metadata(&temp_path)
            .await
            .map(|m| m.len())
            .unwrap_or(0);

        let bytes = self
            .fetch(&task.url, &temp_path, resume_from, task.expected_size, None)
            .await?;

        finalize(&temp_path, &task.destination).await?;
        Ok(bytes)
    }

    /// Stream `url` into `part_path`, returning the total file length.
    async fn fetch(
        &self,
        url: &str,
        part_path: &Path,
        resume_from_byte: u64,
        expected_size: Option<u64>,
        progress: Option<&dyn ProgressSink>,
    ) -> Result<u64> {
        let mut request = self.clients.authorize(self.clients.download.get(url));
        if resume_from_byte > 0 {
            request = request.header(reqwest::header::RANGE, format!("bytes={}-", resume_from_byte));
            info!("Resuming download from byte {}", resume_from_byte);
        }

        let response = request.send().await.map_err(|e| {
            WranglerError::request("Download request failed", e, NetworkConfig::CONNECT_TIMEOUT)
        })?;

        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(WranglerError::NotFound {
                message: format!("Not found: {}", url),
            });
        }

        if status == StatusCode::RANGE_NOT_SATISFIABLE && resume_from_byte > 0 {
            // Partial file is unusable, start over on the next attempt
            let _ = tokio::fs::remove_file(part_path).await;
            return Err(WranglerError::Network {
                message: format!("Server rejected resume range for {}", url),
                cause: None,
            });
        }

        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(WranglerError::Network {
                message: format!("Download of {} failed with HTTP {}", url, status),
                cause: None,
            });
        }

        // 206 Partial Content is expected for resume
        if !status.is_success() && status != StatusCode::PARTIAL_CONTENT {
            return Err(WranglerError::DownloadFailed {
                url: url.to_string(),
                message: format!("HTTP {}", status),
            });
        }

        let is_resuming = resume_from_byte > 0 && status == StatusCode::PARTIAL_CONTENT;
        if resume_from_byte > 0 && !is_resuming {
            warn!("Server does not support Range requests, restarting from zero");
        }

        let total = if is_resuming {
            expected_size.or_else(|| response.content_length().map(|l| l + resume_from_byte))
        } else {
            response.content_length().filter(|l| *l > 0).or(expected_size)
        };

        let file = if is_resuming {
            tokio::fs::OpenOptions::new()
                .append(true)
                .open(part_path)
                .await
                .map_err(|e| WranglerError::io("opening partial file", part_path, e))?
        } else {
            tokio::fs::File::create(part_path)
                .await
                .map_err(|e| WranglerError::io("creating temp file", part_path, e))?
        };
        let mut writer = BufWriter::with_capacity(self.chunk_size, file);

        let mut tracker = PercentTracker::new(total);
        if let Some(sink) = progress {
            if !tracker.is_known() {
                sink.status("Warning: Unknown file size, progress may not be accurate");
            }
        }

        let mut downloaded: u64 = if is_resuming { resume_from_byte } else { 0 };
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| WranglerError::Network {
                message: format!("Error reading download stream: {}", e),
                cause: Some(e.to_string()),
            })?;

            writer
                .write_all(&chunk)
                .await
                .map_err(|e| WranglerError::io("writing download", part_path, e))?;
            downloaded += chunk.len() as u64;

            if let Some(sink) = progress {
                if let Some(pct) = tracker.update(downloaded) {
                    sink.percent(pct);
                }
            }
        }

        writer
            .flush()
            .await
            .map_err(|e| WranglerError::io("flushing download", part_path, e))?;

        if let Some(expected) = expected_size {
            if downloaded != expected {
                return Err(WranglerError::Network {
                    message: format!(
                        "Incomplete download of {}: received {} of {} bytes",
                        url, downloaded, expected
                    ),
                    cause: None,
                });
            }
        }

        Ok(downloaded)
    }
}

async fn ensure_parent_dir(destination: &Path) -> Result<()> {
    if let Some(parent) = destination.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| WranglerError::io("creating download directory", parent, e))?;
        }
    }
    Ok(())
}

/// Atomic move from temp to final destination.
async fn finalize(temp_path: &Path, destination: &Path) -> Result<()> {
    if let Err(e) = tokio::fs::rename(temp_path, destination).await {
        let _ = tokio::fs::remove_file(temp_path).await;
        return Err(WranglerError::io(
            "moving download to final destination",
            destination,
            e,
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_path_suffix() {
        let task = DownloadTask::new("http://x/blob", "/out/model.gguf");
        assert_eq!(task.temp_path(), PathBuf::from("/out/model.gguf.part"));
    }

    #[test]
    fn test_percent_tracker_reports_changes_only() {
        let mut tracker = PercentTracker::new(Some(200));
        assert_eq!(tracker.update(0), Some(0));
        assert_eq!(tracker.update(1), None);
        assert_eq!(tracker.update(2), Some(1));
        assert_eq!(tracker.update(200), Some(100));
        assert_eq!(tracker.update(200), None);
    }

    #[test]
    fn test_percent_tracker_unknown_total() {
        let mut tracker = PercentTracker::new(None);
        assert!(!tracker.is_known());
        assert_eq!(tracker.update(1_000_000), None);

        // Zero-length totals are treated as unknown
        assert!(!PercentTracker::new(Some(0)).is_known());
    }

    #[test]
    fn test_percent_tracker_clamps_overflow() {
        let mut tracker = PercentTracker::new(Some(10));
        assert_eq!(tracker.update(50), Some(100));
    }
}
