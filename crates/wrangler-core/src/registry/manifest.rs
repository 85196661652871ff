//! Registry manifest parsing and model layer selection.

use crate::config::RegistryConfig;
use crate::error::{Result, WranglerError};
use crate::types::ArtifactCandidate;
use serde::{Deserialize, Serialize};

/// One content-addressed layer of a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layer {
    #[serde(default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub size: u64,
    pub digest: String,
}

impl Layer {
    pub fn is_model(&self) -> bool {
        self.media_type.as_deref() == Some(RegistryConfig::MODEL_MEDIA_TYPE)
    }
}

/// Registry manifest. Only the layer list is used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub layers: Vec<Layer>,
}

impl Manifest {
    /// Parse a manifest body.
    pub fn from_json(body: &str) -> Result<Self> {
        serde_json::from_str(body).map_err(|e| WranglerError::InvalidManifest {
            message: e.to_string(),
        })
    }

    /// Pick the layer holding the model weights.
    ///
    /// The largest layer with the model media type wins even if another
    /// layer is bigger; without any such layer the largest layer overall is
    /// used. Ties keep manifest order.
    pub fn select_model_layer(&self) -> Result<&Layer> {
        if self.layers.is_empty() {
            return Err(WranglerError::InvalidManifest {
                message: "no layers found".to_string(),
            });
        }

        largest(self.layers.iter().filter(|l| l.is_model()))
            .or_else(|| largest(self.layers.iter()))
            .ok_or_else(|| WranglerError::InvalidManifest {
                message: "no model layer found".to_string(),
            })
    }
}

fn largest<'a>(layers: impl Iterator<Item = &'a Layer>) -> Option<&'a Layer> {
    let mut best: Option<&'a Layer> = None;
    for layer in layers {
        if best.map_or(true, |b| layer.size > b.size) {
            best = Some(layer);
        }
    }
    best
}

impl From<&Layer> for ArtifactCandidate {
    fn from(layer: &Layer) -> Self {
        Self {
            relative_path: layer.digest.clone(),
            size_bytes: Some(layer.size).filter(|s| *s > 0),
            digest: Some(layer.digest.clone()),
            media_type: layer.media_type.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"{
        "schemaVersion": 2,
        "mediaType": "application/vnd.docker.distribution.manifest.v2+json",
        "config": {"mediaType": "application/vnd.docker.container.image.v1+json",
                   "digest": "sha256:cfg", "size": 483},
        "layers": [
            {"mediaType": "application/vnd.ollama.image.license", "digest": "sha256:lic", "size": 9000000000},
            {"mediaType": "application/vnd.ollama.image.model", "digest": "sha256:model", "size": 4000},
            {"mediaType": "application/vnd.ollama.image.params", "digest": "sha256:params", "size": 30}
        ]
    }"#;

    #[test]
    fn test_model_media_type_beats_larger_layer() {
        let manifest = Manifest::from_json(MANIFEST).unwrap();
        assert_eq!(manifest.layers.len(), 3);
        let layer = manifest.select_model_layer().unwrap();
        assert_eq!(layer.digest, "sha256:model");
    }

    #[test]
    fn test_largest_model_layer_wins() {
        let manifest = Manifest {
            schema_version: None,
            layers: vec![
                Layer {
                    media_type: Some(RegistryConfig::MODEL_MEDIA_TYPE.into()),
                    size: 10,
                    digest: "sha256:small".into(),
                },
                Layer {
                    media_type: Some(RegistryConfig::MODEL_MEDIA_TYPE.into()),
                    size: 20,
                    digest: "sha256:big".into(),
                },
            ],
        };
        assert_eq!(manifest.select_model_layer().unwrap().digest, "sha256:big");
    }

    #[test]
    fn test_fallback_to_largest_layer() {
        let body = r#"{"layers": [
            {"mediaType": "application/octet-stream", "digest": "sha256:a", "size": 5},
            {"digest": "sha256:b", "size": 50}
        ]}"#;
        let manifest = Manifest::from_json(body).unwrap();
        assert_eq!(manifest.select_model_layer().unwrap().digest, "sha256:b");
    }

    #[test]
    fn test_no_layers_is_invalid() {
        let manifest = Manifest::from_json(r#"{"schemaVersion": 2}"#).unwrap();
        assert!(matches!(
            manifest.select_model_layer(),
            Err(WranglerError::InvalidManifest { .. })
        ));
    }

    #[test]
    fn test_malformed_body_is_invalid() {
        assert!(matches!(
            Manifest::from_json("not json"),
            Err(WranglerError::InvalidManifest { .. })
        ));
    }

    #[test]
    fn test_layer_to_candidate() {
        let manifest = Manifest::from_json(MANIFEST).unwrap();
        let candidate = ArtifactCandidate::from(manifest.select_model_layer().unwrap());
        assert_eq!(candidate.digest.as_deref(), Some("sha256:model"));
        assert_eq!(candidate.size_bytes, Some(4000));
        assert_eq!(
            candidate.media_type.as_deref(),
            Some(RegistryConfig::MODEL_MEDIA_TYPE)
        );
    }
}
