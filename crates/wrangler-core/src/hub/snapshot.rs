//! Whole-repository downloads for local conversion.
//!
//! Files land under `<output>/temp_<safe_name>/` with their repository
//! paths preserved. Each file resumes from its `.part` file and is retried
//! on transport errors, so an interrupted snapshot can simply be rerun.

use super::locator::is_snapshot_ignored;
use super::types::RepoEntry;
use super::HubClient;
use crate::config::HubConfig;
use crate::error::{Result, WranglerError};
use crate::network::{retry_async, DownloadTask};
use crate::progress::ProgressSink;
use crate::reference::ModelReference;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

impl HubClient {
    /// Download every convertible file of a repository.
    ///
    /// Emits percentages in the 10-40 band, advancing as files complete.
    /// Returns the snapshot directory.
    pub async fn snapshot(
        &self,
        reference: &ModelReference,
        output_dir: &Path,
        progress: &dyn ProgressSink,
    ) -> Result<PathBuf> {
        let snapshot_dir = snapshot_dir(output_dir, reference);

        progress.status(&format!(
            "Downloading {} (revision: {})",
            reference.source_path, reference.revision
        ));
        progress.percent(HubConfig::SNAPSHOT_PROGRESS_START);

        tokio::fs::create_dir_all(&snapshot_dir)
            .await
            .map_err(|e| WranglerError::io("creating snapshot directory", &snapshot_dir, e))?;

        let entries = self
            .list_files(&reference.source_path, &reference.revision, true)
            .await?;
        let files = snapshot_files(&entries);
        let total = files.len();
        info!(
            "Snapshot of {}@{}: {} files ({} listed)",
            reference.source_path,
            reference.revision,
            total,
            entries.len()
        );

        let downloader = &self.downloader;
        for (index, entry) in files.iter().enumerate() {
            let task = DownloadTask::new(
                self.endpoints.resolve_url(
                    &reference.source_path,
                    &reference.revision,
                    &entry.path,
                ),
                snapshot_dir.join(&entry.path),
            )
            .with_expected_size(entry.content_size());
            debug!("Fetching {}", entry.path);

            let task = &task;
            let (result, stats) = retry_async(
                &self.snapshot_retry,
                move || async move { downloader.download_resumable(task).await },
                WranglerError::is_retryable,
            )
            .await;

            if let Err(e) = result {
                warn!(
                    "Giving up on {} after {} attempts ({:?} waiting): {}",
                    entry.path, stats.attempts, stats.total_delay, e
                );
                return Err(e);
            }
            if stats.attempts > 1 {
                info!(
                    "Fetched {} after {} attempts ({:?} waiting)",
                    entry.path, stats.attempts, stats.total_delay
                );
            }

            progress.percent(snapshot_percent(index + 1, total));
        }

        progress.percent(HubConfig::SNAPSHOT_PROGRESS_END);
        Ok(snapshot_dir)
    }
}

/// `<output>/temp_<safe_name>`
pub(crate) fn snapshot_dir(output_dir: &Path, reference: &ModelReference) -> PathBuf {
    output_dir.join(format!(
        "{}{}",
        HubConfig::SNAPSHOT_DIR_PREFIX,
        reference.safe_name()
    ))
}

/// Listing entries worth downloading: files, not ignored, with a relative
/// path that stays inside the snapshot directory.
fn snapshot_files(entries: &[RepoEntry]) -> Vec<&RepoEntry> {
    entries
        .iter()
        .filter(|e| e.is_file() && !is_snapshot_ignored(&e.path))
        .filter(|e| {
            let contained = Path::new(&e.path)
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
            if !contained {
                warn!("Skipping listing entry with unsafe path: {}", e.path);
            }
            contained
        })
        .collect()
}

/// Percentage after `done` of `total` files, within the snapshot band.
fn snapshot_percent(done: usize, total: usize) -> u8 {
    let start = HubConfig::SNAPSHOT_PROGRESS_START as usize;
    let band = (HubConfig::SNAPSHOT_PROGRESS_END - HubConfig::SNAPSHOT_PROGRESS_START) as usize;
    if total == 0 {
        return HubConfig::SNAPSHOT_PROGRESS_END;
    }
    (start + band * done.min(total) / total) as u8
}
