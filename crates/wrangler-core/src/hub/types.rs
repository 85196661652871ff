//! Hub API response types and endpoint configuration.

use crate::config::HubConfig;
use serde::Deserialize;

/// Base URLs for the hub. Defaults to the public Hugging Face endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubEndpoints {
    /// Base for file downloads (`{hub_base}/{repo}/resolve/{rev}/{path}`).
    pub hub_base: String,
    /// Base for API calls (`{api_base}/models/{repo}/tree/{rev}`).
    pub api_base: String,
}

impl Default for HubEndpoints {
    fn default() -> Self {
        Self {
            hub_base: HubConfig::HUB_BASE.to_string(),
            api_base: HubConfig::API_BASE.to_string(),
        }
    }
}

impl HubEndpoints {
    /// Endpoints rooted at a single base (API under `{base}/api`).
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            hub_base: base.to_string(),
            api_base: format!("{base}/api"),
        }
    }

    pub fn tree_url(&self, repo_id: &str, revision: &str, recursive: bool) -> String {
        let mut url = format!(
            "{}/models/{}/tree/{}",
            self.api_base,
            repo_id,
            urlencoding::encode(revision)
        );
        if recursive {
            url.push_str("?recursive=true");
        }
        url
    }

    pub fn resolve_url(&self, repo_id: &str, revision: &str, file_path: &str) -> String {
        let encoded_path = file_path
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        format!(
            "{}/{}/resolve/{}/{}",
            self.hub_base,
            repo_id,
            urlencoding::encode(revision),
            encoded_path
        )
    }
}

/// LFS metadata attached to large files in a tree listing.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LfsInfo {
    #[serde(default)]
    pub oid: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

/// One entry of a repository tree listing.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RepoEntry {
    pub path: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(rename = "type", default)]
    pub entry_type: Option<String>,
    #[serde(default)]
    pub lfs: Option<LfsInfo>,
}

impl RepoEntry {
    /// Listing entries without a type are treated as files.
    pub fn is_file(&self) -> bool {
        self.entry_type.as_deref().map_or(true, |t| t == "file")
    }

    /// Content size, preferring the LFS size for pointer files.
    pub fn content_size(&self) -> Option<u64> {
        self.lfs.as_ref().and_then(|l| l.size).or(self.size)
    }

    /// SHA256 of LFS content, if the listing carried it.
    pub fn sha256(&self) -> Option<&str> {
        self.lfs.as_ref().and_then(|l| l.oid.as_deref())
    }
}
