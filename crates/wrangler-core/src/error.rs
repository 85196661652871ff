//! Error types for the acquisition pipeline.
//!
//! Variants follow the failure classes a host needs to tell apart: remote
//! lookups that came back empty, transport failures, corrupt payloads,
//! missing external tooling, and failed subprocesses.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for Llama Wrangler.
#[derive(Debug, Error)]
pub enum WranglerError {
    // Network errors
    #[error("Network error: {message}")]
    Network {
        message: String,
        /// Optional cause description
        cause: Option<String>,
    },

    #[error("{what} timed out after {after:?}")]
    Timeout {
        what: String,
        after: Duration,
    },

    #[error("{message}")]
    NotFound { message: String },

    #[error("Download failed for {url}: {message}")]
    DownloadFailed { url: String, message: String },

    // Integrity errors
    #[error("Downloaded file is corrupt: expected {expected}, got {actual}")]
    IntegrityMismatch { expected: String, actual: String },

    #[error("Invalid manifest: {message}")]
    InvalidManifest { message: String },

    // Toolchain errors
    #[error("{message}")]
    ToolchainMissing { message: String },

    #[error("Conversion failed: {message}")]
    ConversionFailed {
        message: String,
        /// Captured stderr of the converter, if any
        stderr: Option<String>,
    },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias for Llama Wrangler operations.
pub type Result<T> = std::result::Result<T, WranglerError>;

impl WranglerError {
    /// Create an IO error with a short description of the failed action.
    pub fn io(action: &str, path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        WranglerError::Io {
            message: format!("{action}: {err}"),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Classify a failed request. Timeouts keep the limit that fired, anything
    /// else becomes a [`WranglerError::Network`] prefixed with `context`.
    pub fn request(context: impl Into<String>, err: reqwest::Error, limit: Duration) -> Self {
        let context = context.into();
        if err.is_timeout() {
            WranglerError::Timeout {
                what: context,
                after: limit,
            }
        } else {
            WranglerError::Network {
                message: format!("{}: {}", context, err),
                cause: Some(err.to_string()),
            }
        }
    }

    /// Check if this error should trigger a retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WranglerError::Network { .. } | WranglerError::Timeout { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_displays_verbatim() {
        let err = WranglerError::NotFound {
            message: "Model 'library/nope:latest' not found in Ollama registry".into(),
        };
        assert_eq!(
            err.to_string(),
            "Model 'library/nope:latest' not found in Ollama registry"
        );
    }

    #[test]
    fn test_retryable_errors() {
        assert!(WranglerError::Timeout {
            what: "Listing org/model".into(),
            after: Duration::from_secs(10),
        }
        .is_retryable());
        assert!(WranglerError::Network {
            message: "connection reset".into(),
            cause: None,
        }
        .is_retryable());
        assert!(!WranglerError::IntegrityMismatch {
            expected: "sha256:aa".into(),
            actual: "sha256:bb".into(),
        }
        .is_retryable());
    }

    #[test]
    fn test_io_helper_keeps_path() {
        let err = WranglerError::io(
            "creating output dir",
            "/tmp/x",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        match err {
            WranglerError::Io { path, message, .. } => {
                assert_eq!(path, Some(PathBuf::from("/tmp/x")));
                assert!(message.starts_with("creating output dir"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_request_timeout_keeps_limit() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept and never answer
        let _stall = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let limit = Duration::from_millis(50);
        let client = reqwest::Client::builder().timeout(limit).build().unwrap();
        let source = client.get(format!("http://{addr}/")).send().await.unwrap_err();

        let err = WranglerError::request("Listing org/model", source, limit);
        assert!(matches!(err, WranglerError::Timeout { .. }));
        assert_eq!(err.to_string(), "Listing org/model timed out after 50ms");
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_refused_request_is_network_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let source = reqwest::get(format!("http://{addr}/")).await.unwrap_err();
        let err = WranglerError::request("Failed to fetch manifest", source, Duration::from_secs(10));
        assert!(matches!(err, WranglerError::Network { .. }));
        assert!(err.to_string().contains("Failed to fetch manifest"));
    }
}
