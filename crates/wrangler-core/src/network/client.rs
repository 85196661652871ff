//! HTTP client construction.
//!
//! Two clients are built per source: one for small API requests with a total
//! timeout, and one for payload downloads with only a connect timeout, since a
//! total timeout would kill multi-gigabyte transfers.

use crate::config::NetworkConfig;
use crate::error::{Result, WranglerError};
use reqwest::{Client, RequestBuilder};

/// Pair of HTTP clients plus an optional bearer token.
#[derive(Clone)]
pub struct HttpClients {
    /// API requests (listing, manifests)
    pub api: Client,
    /// Large payload downloads
    pub download: Client,
    auth_token: Option<String>,
}

impl std::fmt::Debug for HttpClients {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClients")
            .field("has_auth_token", &self.auth_token.is_some())
            .finish()
    }
}

impl HttpClients {
    /// Build both clients with the default user agent and timeouts.
    pub fn new(auth_token: Option<String>) -> Result<Self> {
        let api = Client::builder()
            .timeout(NetworkConfig::REQUEST_TIMEOUT)
            .user_agent(NetworkConfig::USER_AGENT)
            .build()
            .map_err(|e| WranglerError::Config {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        let download = Client::builder()
            .connect_timeout(NetworkConfig::CONNECT_TIMEOUT)
            .user_agent(NetworkConfig::USER_AGENT)
            .build()
            .map_err(|e| WranglerError::Config {
                message: format!("Failed to create download HTTP client: {}", e),
            })?;

        Ok(Self {
            api,
            download,
            auth_token: auth_token.filter(|t| !t.trim().is_empty()),
        })
    }

    /// Whether requests carry an `Authorization` header.
    pub fn has_auth(&self) -> bool {
        self.auth_token.is_some()
    }

    /// `Authorization` header value, if a token is configured.
    pub fn auth_header_value(&self) -> Option<String> {
        self.auth_token
            .as_ref()
            .map(|t| format!("Bearer {}", t.trim()))
    }

    /// Attach the bearer token to a request, if configured.
    pub fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.auth_header_value() {
            Some(value) => request.header(reqwest::header::AUTHORIZATION, value),
            None => request,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_header_format() {
        let clients = HttpClients::new(Some(" hf_abc ".to_string())).unwrap();
        assert!(clients.has_auth());
        assert_eq!(clients.auth_header_value().as_deref(), Some("Bearer hf_abc"));
    }

    #[test]
    fn test_blank_token_is_ignored() {
        let clients = HttpClients::new(Some("   ".to_string())).unwrap();
        assert!(!clients.has_auth());
        assert!(clients.auth_header_value().is_none());
    }

    #[test]
    fn test_debug_redacts_token() {
        let clients = HttpClients::new(Some("secret".to_string())).unwrap();
        let rendered = format!("{:?}", clients);
        assert!(!rendered.contains("secret"));
    }
}
