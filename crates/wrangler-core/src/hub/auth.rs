//! Hugging Face authentication token resolution.
//!
//! Tokens come from the environment only: `HF_TOKEN`, then
//! `HUGGING_FACE_HUB_TOKEN`.

use crate::config::HubConfig;
use tracing::info;

/// Resolve a token from the process environment.
pub fn resolve_token_from_env() -> Option<String> {
    resolve_token_with(|name| std::env::var(name).ok())
}

/// Resolve a token using `lookup` for each candidate variable, in order.
///
/// Blank values are skipped so an exported-but-empty variable does not
/// shadow the alternative name.
pub fn resolve_token_with(lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
    HubConfig::TOKEN_ENV_VARS.iter().find_map(|name| {
        let token = lookup(name)?.trim().to_string();
        if token.is_empty() {
            return None;
        }
        info!("HuggingFace auth token found in {}", name);
        Some(token)
    })
}
