//! Centralized configuration for Llama Wrangler.
//!
//! Constants for network operations, the two remote sources, and the
//! external llama.cpp toolchain layout.

use std::time::Duration;

/// Network-related configuration.
pub struct NetworkConfig;

impl NetworkConfig {
    pub const USER_AGENT: &'static str = "Llama-Wrangler/1.0";
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
    pub const DOWNLOAD_CHUNK_SIZE: usize = 1024 * 1024;
    pub const DOWNLOAD_TEMP_SUFFIX: &'static str = ".part";
    pub const SNAPSHOT_MAX_RETRIES: u32 = 3;
    pub const SNAPSHOT_RETRY_BASE_DELAY: Duration = Duration::from_secs(2);
}

/// Hugging Face hub configuration.
pub struct HubConfig;

impl HubConfig {
    pub const HUB_BASE: &'static str = "https://huggingface.co";
    pub const API_BASE: &'static str = "https://huggingface.co/api";
    /// Marker used to recognize hub URLs in user input.
    pub const HOST_MARKER: &'static str = "huggingface.co/";
    pub const DEFAULT_REVISION: &'static str = "main";
    /// Token variables, checked in order.
    pub const TOKEN_ENV_VARS: [&'static str; 2] = ["HF_TOKEN", "HUGGING_FACE_HUB_TOKEN"];
    pub const ARTIFACT_EXTENSION: &'static str = ".gguf";
    /// Vocabulary-only GGUF files published alongside real models.
    pub const VOCAB_ONLY_MARKER: &'static str = "ggml-vocab";
    pub const MAX_CANDIDATES: usize = 5;
    pub const PREFERRED_QUANTS: [&'static str; 7] =
        ["Q4_K_M", "Q4_K", "Q5_K_M", "Q5_K", "Q3_K_M", "Q6_K", "Q8_0"];
    /// Weight formats not needed for GGUF conversion.
    pub const SNAPSHOT_IGNORE_PATTERNS: [&'static str; 7] = [
        "*.bin",
        "*.safetensors.index.json",
        "*.h5",
        "*.msgpack",
        "*.ot",
        "*.pt",
        "*.pth",
    ];
    pub const SNAPSHOT_DIR_PREFIX: &'static str = "temp_";
    pub const SNAPSHOT_PROGRESS_START: u8 = 10;
    pub const SNAPSHOT_PROGRESS_END: u8 = 40;
}

/// Ollama registry configuration.
pub struct RegistryConfig;

impl RegistryConfig {
    pub const REGISTRY_BASE: &'static str = "https://registry.ollama.ai";
    pub const DEFAULT_NAMESPACE: &'static str = "library";
    pub const DEFAULT_TAG: &'static str = "latest";
    pub const MODEL_MEDIA_TYPE: &'static str = "application/vnd.ollama.image.model";
    /// Re-downloads allowed after a digest mismatch.
    pub const CORRUPTION_RETRIES: u32 = 1;
}

/// External llama.cpp toolchain layout.
pub struct ToolchainConfig;

impl ToolchainConfig {
    /// Converter scripts whose presence marks a toolchain root.
    pub const CONVERTER_SCRIPTS: [&'static str; 3] =
        ["convert-hf-to-gguf.py", "convert_hf_to_gguf.py", "convert.py"];
    pub const GENERIC_SCRIPT: &'static str = "convert-hf-to-gguf.py";
    /// Quantizer locations relative to the toolchain root, in probe order.
    pub const QUANTIZE_PATHS: [&'static str; 3] =
        ["build/bin/llama-quantize", "llama-quantize", "quantize"];
    pub const LIBRARY_DIR: &'static str = "build";
    pub const DEFAULT_PYTHON: &'static str = "python3";
    pub const ROOT_ENV_VAR: &'static str = "LLAMA_CPP_PATH";

    /// Dynamic linker search path variable for the current platform.
    pub fn library_path_var() -> &'static str {
        if cfg!(target_os = "macos") {
            "DYLD_LIBRARY_PATH"
        } else if cfg!(windows) {
            "PATH"
        } else {
            "LD_LIBRARY_PATH"
        }
    }
}
