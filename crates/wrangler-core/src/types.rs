//! Shared data types produced by the remote sources.

use serde::{Deserialize, Serialize};

/// A remote file that could be downloaded as-is.
///
/// Produced by the hub locator (from a repo listing) and by registry
/// manifest parsing (from a layer). Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactCandidate {
    /// Path relative to the repository root, or the layer digest.
    pub relative_path: String,
    pub size_bytes: Option<u64>,
    pub digest: Option<String>,
    pub media_type: Option<String>,
}

impl ArtifactCandidate {
    /// Candidate known only by path, e.g. a file named in a URL.
    pub fn from_path(relative_path: impl Into<String>) -> Self {
        Self {
            relative_path: relative_path.into(),
            size_bytes: None,
            digest: None,
            media_type: None,
        }
    }

    /// Last path component of `relative_path`.
    pub fn file_name(&self) -> &str {
        self.relative_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.relative_path)
    }
}
