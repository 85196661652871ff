//! Ranking of pre-converted GGUF files in a hub repository.

use super::types::RepoEntry;
use crate::config::HubConfig;
use crate::types::ArtifactCandidate;

/// Rank of a filename in the quantization preference list.
///
/// Earlier tags rank higher; files matching no tag rank last. Matching is a
/// case-insensitive substring test.
pub fn quant_priority(filename: &str) -> usize {
    let lower = filename.to_lowercase();
    HubConfig::PREFERRED_QUANTS
        .iter()
        .position(|quant| lower.contains(&quant.to_lowercase()))
        .unwrap_or(HubConfig::PREFERRED_QUANTS.len())
}

/// Whether a listing entry is a usable GGUF artifact.
pub fn is_gguf_artifact(path: &str) -> bool {
    path.ends_with(HubConfig::ARTIFACT_EXTENSION) && !path.contains(HubConfig::VOCAB_ONLY_MARKER)
}

/// Filter a repo listing to GGUF artifacts and rank them by preference.
///
/// The sort is stable, so files of equal rank keep listing order. At most
/// [`HubConfig::MAX_CANDIDATES`] are returned.
pub fn rank_candidates(entries: &[RepoEntry]) -> Vec<ArtifactCandidate> {
    let mut candidates: Vec<ArtifactCandidate> = entries
        .iter()
        .filter(|e| e.is_file() && is_gguf_artifact(&e.path))
        .map(|e| ArtifactCandidate {
            relative_path: e.path.clone(),
            size_bytes: e.content_size(),
            digest: e.sha256().map(|sha| format!("sha256:{sha}")),
            media_type: None,
        })
        .collect();

    candidates.sort_by_key(|c| quant_priority(&c.relative_path));
    candidates.truncate(HubConfig::MAX_CANDIDATES);
    candidates
}

/// Pick the candidate matching the requested quantization, else the best ranked.
pub fn select_candidate<'a>(
    candidates: &'a [ArtifactCandidate],
    quantization: &str,
) -> Option<&'a ArtifactCandidate> {
    let wanted = quantization.to_lowercase();
    candidates
        .iter()
        .find(|c| !wanted.is_empty() && c.relative_path.to_lowercase().contains(&wanted))
        .or_else(|| candidates.first())
}

/// Whether a snapshot should skip this file (formats not needed for conversion).
pub fn is_snapshot_ignored(path: &str) -> bool {
    HubConfig::SNAPSHOT_IGNORE_PATTERNS.iter().any(|pattern| {
        match pattern.strip_prefix('*') {
            Some(suffix) => path.ends_with(suffix),
            None => path == *pattern,
        }
    })
}
