//! Architecture detection and converter script dispatch.
//!
//! Architectures map to converter scripts through an explicit table; names
//! not in the table go through keyword rules, then the generic script.

use crate::config::ToolchainConfig;
use crate::progress::ProgressSink;
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, warn};

/// Architecture assumed when `config.json` names none.
pub const DEFAULT_ARCHITECTURE: &str = "LlamaForCausalLM";

/// Exact architecture names and their converter scripts.
const SCRIPT_TABLE: &[(&str, &str)] = &[
    ("LlamaForCausalLM", ToolchainConfig::GENERIC_SCRIPT),
    ("MistralForCausalLM", ToolchainConfig::GENERIC_SCRIPT),
    ("MixtralForCausalLM", ToolchainConfig::GENERIC_SCRIPT),
    ("Qwen2ForCausalLM", ToolchainConfig::GENERIC_SCRIPT),
    ("GemmaForCausalLM", ToolchainConfig::GENERIC_SCRIPT),
    ("Phi3ForCausalLM", ToolchainConfig::GENERIC_SCRIPT),
    ("StableLMForCausalLM", ToolchainConfig::GENERIC_SCRIPT),
    ("GPT2LMHeadModel", ToolchainConfig::GENERIC_SCRIPT),
    ("GPTNeoXForCausalLM", ToolchainConfig::GENERIC_SCRIPT),
    ("MptForCausalLM", ToolchainConfig::GENERIC_SCRIPT),
    ("FalconForCausalLM", "convert-falcon-hf-to-gguf.py"),
    ("BaichuanForCausalLM", "convert-baichuan-hf-to-gguf.py"),
    ("PersimmonForCausalLM", "convert-persimmon-hf-to-gguf.py"),
    ("StableLmForCausalLM", "convert-stablelm-hf-to-gguf.py"),
    ("QWenLMHeadModel", "convert-qwen-hf-to-gguf.py"),
    ("BloomForCausalLM", "convert-bloom-hf-to-gguf.py"),
];

/// Keyword rules for names missing from the table, checked in order.
const KEYWORD_RULES: &[(&[&str], &str)] = &[
    (
        &["llama", "mistral", "qwen", "gemma"],
        ToolchainConfig::GENERIC_SCRIPT,
    ),
    (&["falcon"], "convert-falcon-hf-to-gguf.py"),
    (&["baichuan"], "convert-baichuan-hf-to-gguf.py"),
    (&["bloom"], "convert-bloom-hf-to-gguf.py"),
];

/// Converter script name for an architecture.
pub fn script_for_architecture(architecture: &str) -> &'static str {
    if let Some((_, script)) = SCRIPT_TABLE.iter().find(|(arch, _)| *arch == architecture) {
        return script;
    }

    let lower = architecture.to_lowercase();
    KEYWORD_RULES
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(_, script)| *script)
        .unwrap_or(ToolchainConfig::GENERIC_SCRIPT)
}

#[derive(Debug, Deserialize)]
struct ModelConfig {
    #[serde(default)]
    architectures: Vec<String>,
    #[serde(default)]
    model_type: Option<String>,
}

/// Read the architecture from `<model_dir>/config.json`.
///
/// Prefers `architectures[0]`, then `model_type`. Reports which one was used
/// on `progress`. Returns `None` if the file is missing, unreadable, or
/// names neither.
pub async fn detect_architecture(
    model_dir: &Path,
    progress: &dyn ProgressSink,
) -> Option<String> {
    let config_path = model_dir.join("config.json");
    if !config_path.is_file() {
        debug!("No config.json in {}", model_dir.display());
        return None;
    }

    let parsed = tokio::fs::read_to_string(&config_path)
        .await
        .map_err(|e| e.to_string())
        .and_then(|body| serde_json::from_str::<ModelConfig>(&body).map_err(|e| e.to_string()));

    let config = match parsed {
        Ok(config) => config,
        Err(e) => {
            warn!("Could not read {}: {}", config_path.display(), e);
            progress.status(&format!("Error reading config.json: {}", e));
            return None;
        }
    };

    if let Some(arch) = config.architectures.into_iter().find(|a| !a.is_empty()) {
        progress.status(&format!("Detected architecture: {}", arch));
        return Some(arch);
    }
    match config.model_type.filter(|t| !t.is_empty()) {
        Some(model_type) => {
            progress.status(&format!("Using model_type: {}", model_type));
            Some(model_type)
        }
        None => None,
    }
}
