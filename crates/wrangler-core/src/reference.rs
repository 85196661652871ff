//! Model identifier resolution.
//!
//! Turns user input (a hub URL, a `namespace/name` repo id, or a registry
//! name such as `mistral:7b`) into a [`ModelReference`]. No network access.

use crate::config::{HubConfig, RegistryConfig};
use tracing::warn;

/// A resolved model identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelReference {
    /// `namespace/name` path on the remote source.
    pub source_path: String,
    /// Revision (hub) or tag (registry).
    pub revision: String,
    /// Specific artifact file the input pointed at, if any.
    pub direct_file: Option<String>,
}

impl ModelReference {
    /// Resolve a hub identifier.
    ///
    /// Recognizes URLs containing `huggingface.co/`; anything else is taken
    /// as a repo id at the default revision.
    pub fn parse_hub(input: &str) -> Self {
        let url = input.trim().trim_end_matches('/');

        if url.is_empty() {
            warn!("Empty hub identifier, using it verbatim");
        }

        if let Some(idx) = url.find(HubConfig::HOST_MARKER) {
            let rest = &url[idx + HubConfig::HOST_MARKER.len()..];
            let mut parts = rest.split('/');
            if let (Some(namespace), Some(name)) = (parts.next(), parts.next()) {
                if !namespace.is_empty() && !name.is_empty() {
                    let marker = ["tree/", "blob/"]
                        .into_iter()
                        .find(|m| token_after(url, m).is_some());
                    let revision = marker
                        .and_then(|m| token_after(url, m))
                        .unwrap_or(HubConfig::DEFAULT_REVISION)
                        .to_string();

                    // Repo-relative path after the revision, subdirectories included
                    let direct_file = marker
                        .filter(|_| url.ends_with(HubConfig::ARTIFACT_EXTENSION))
                        .and_then(|m| path_after_revision(url, m))
                        .map(str::to_string);

                    return Self {
                        source_path: format!("{namespace}/{name}"),
                        revision,
                        direct_file,
                    };
                }
            }
            warn!("Could not split hub URL into namespace/name: {}", url);
        }

        Self {
            source_path: url.to_string(),
            revision: HubConfig::DEFAULT_REVISION.to_string(),
            direct_file: None,
        }
    }

    /// Resolve a registry name into `(namespace/name, tag)`.
    pub fn parse_registry(input: &str) -> Self {
        let mut name = input.trim().to_string();

        if name.is_empty() {
            warn!("Empty registry model name, using it verbatim");
            return Self {
                source_path: name,
                revision: RegistryConfig::DEFAULT_TAG.to_string(),
                direct_file: None,
            };
        }

        if !name.contains('/') {
            name = format!("{}/{}", RegistryConfig::DEFAULT_NAMESPACE, name);
        }
        if !name.contains(':') {
            name = format!("{}:{}", name, RegistryConfig::DEFAULT_TAG);
        }

        let (path, tag) = name
            .split_once(':')
            .unwrap_or((name.as_str(), RegistryConfig::DEFAULT_TAG));
        let tag = if tag.is_empty() {
            RegistryConfig::DEFAULT_TAG
        } else {
            tag
        };

        Self {
            source_path: path.to_string(),
            revision: tag.to_string(),
            direct_file: None,
        }
    }

    /// File-name stem derived from the source path, e.g. `org_model`.
    pub fn safe_name(&self) -> String {
        sanitize(&self.source_path)
    }
}

impl std::fmt::Display for ModelReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.source_path, self.revision)
    }
}

/// Replace path and tag separators so a name can be used as a file stem.
pub fn sanitize(name: &str) -> String {
    name.replace(['/', ':'], "_")
}

/// First path token after `marker`, if the marker occurs.
fn token_after<'a>(url: &'a str, marker: &str) -> Option<&'a str> {
    let idx = url.find(marker)?;
    url[idx + marker.len()..]
        .split('/')
        .next()
        .filter(|t| !t.is_empty())
}

/// Everything after `<marker><revision>/`, if non-empty.
fn path_after_revision<'a>(url: &'a str, marker: &str) -> Option<&'a str> {
    let idx = url.find(marker)?;
    url[idx + marker.len()..]
        .split_once('/')
        .map(|(_, path)| path)
        .filter(|p| !p.is_empty())
}
