//! Discovery of the external llama.cpp toolchain.
//!
//! The toolchain is located once at startup and passed to the converter and
//! quantizer as an immutable [`ToolchainLocation`].

pub mod tool;

pub use tool::{ExternalTool, ProcessRunner, ToolOutput, ToolRunner};

use crate::config::ToolchainConfig;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Root directory of a llama.cpp checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolchainLocation {
    pub root: PathBuf,
}

impl ToolchainLocation {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// First existing quantizer binary, in probe order.
    pub fn quantize_binary(&self) -> Option<PathBuf> {
        ToolchainConfig::QUANTIZE_PATHS
            .iter()
            .map(|rel| self.root.join(rel))
            .find(|p| p.is_file())
    }

    /// Shared-library directory, if the toolchain was built in place.
    pub fn library_dir(&self) -> Option<PathBuf> {
        let dir = self.root.join(ToolchainConfig::LIBRARY_DIR);
        dir.is_dir().then_some(dir)
    }
}

/// Whether `dir` holds any of the known converter scripts.
pub fn has_converter_scripts(dir: &Path) -> bool {
    ToolchainConfig::CONVERTER_SCRIPTS
        .iter()
        .any(|script| dir.join(script).is_file())
}

/// Probes candidate directories for a toolchain.
#[derive(Debug, Clone)]
pub struct ToolchainLocator {
    override_path: Option<PathBuf>,
    candidates: Vec<PathBuf>,
}

impl ToolchainLocator {
    /// Locator with the default candidate list after an optional override.
    pub fn new(override_path: Option<PathBuf>) -> Self {
        Self {
            override_path,
            candidates: default_candidates(),
        }
    }

    /// Replace the candidate list probed after the override.
    pub fn with_candidates(mut self, candidates: Vec<PathBuf>) -> Self {
        self.candidates = candidates;
        self
    }

    /// Directories probed, in order.
    pub fn probe_order(&self) -> Vec<PathBuf> {
        self.override_path
            .iter()
            .cloned()
            .chain(self.candidates.iter().cloned())
            .collect()
    }

    /// First probed directory containing a converter script.
    pub fn locate(&self) -> Option<ToolchainLocation> {
        if let Some(ref path) = self.override_path {
            if !has_converter_scripts(path) {
                warn!(
                    "llama.cpp override {} has no converter scripts, probing defaults",
                    path.display()
                );
            }
        }

        let found = self.probe_order().into_iter().find(|dir| {
            let ok = has_converter_scripts(dir);
            debug!("Probing {} for llama.cpp: {}", dir.display(), ok);
            ok
        });

        match found {
            Some(root) => {
                info!("Using llama.cpp at {}", root.display());
                Some(ToolchainLocation { root })
            }
            None => {
                warn!("llama.cpp not found in any known location");
                None
            }
        }
    }
}

/// Well-known install locations.
fn default_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    let home = dirs::home_dir();

    if let Some(ref home) = home {
        candidates.push(home.join(".llama-wrangler").join("llama.cpp"));
        candidates.push(home.join(".METALlama.cpp"));
    }
    if let Ok(cwd) = std::env::current_dir() {
        candidates.push(cwd.join("llama.cpp"));
    }
    if let Some(ref home) = home {
        candidates.push(home.join("llama.cpp"));
    }
    candidates.push(PathBuf::from("/usr/local/llama.cpp"));
    candidates
}
