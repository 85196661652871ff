//! Best-effort GGUF quantization with `llama-quantize`.
//!
//! Quantization never fails the pipeline: a missing toolchain, a missing
//! binary, or a failed run all leave the unquantized artifact in place and
//! return its path.

use crate::config::ToolchainConfig;
use crate::progress::ProgressSink;
use crate::toolchain::{ExternalTool, ToolRunner, ToolchainLocation};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Quantization type names understood by `llama-quantize`.
pub const KNOWN_QUANTS: &[&str] = &[
    "Q2_K", "Q3_K_S", "Q3_K_M", "Q3_K_L", "Q4_0", "Q4_1", "Q4_K_S", "Q4_K_M", "Q4_K", "Q5_0",
    "Q5_1", "Q5_K_S", "Q5_K_M", "Q5_K", "Q6_K", "Q8_0", "IQ1_S", "IQ1_M", "IQ2_XXS", "IQ2_XS",
    "IQ2_S", "IQ2_M", "IQ3_XXS", "IQ3_XS", "IQ3_S", "IQ3_M", "IQ4_NL", "IQ4_XS", "BF16", "F16",
    "F32",
];

/// Whether `name` is a quantization type from [`KNOWN_QUANTS`] (any case).
pub fn is_known_quant(name: &str) -> bool {
    KNOWN_QUANTS.iter().any(|q| q.eq_ignore_ascii_case(name))
}

/// `<dir>/<stem>-<QUANT>.gguf` next to `input`.
pub fn quantized_output_path(input: &Path, quant_level: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    input.with_file_name(format!("{}-{}.gguf", stem, quant_level))
}

/// A resolved quantization run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantizationJob {
    pub input: PathBuf,
    pub quant_level: String,
    pub quantize_binary: PathBuf,
    pub output: PathBuf,
}

impl QuantizationJob {
    fn args(&self) -> Vec<OsString> {
        vec![
            self.input.clone().into_os_string(),
            self.output.clone().into_os_string(),
            self.quant_level.clone().into(),
        ]
    }
}

pub struct Quantizer<'a> {
    toolchain: Option<&'a ToolchainLocation>,
    runner: &'a dyn ToolRunner,
}

impl<'a> Quantizer<'a> {
    pub fn new(toolchain: Option<&'a ToolchainLocation>, runner: &'a dyn ToolRunner) -> Self {
        Self { toolchain, runner }
    }

    /// Resolve the quantizer binary, reporting why quantization is skipped
    /// when it cannot run.
    pub fn plan(
        &self,
        input: &Path,
        quant_level: &str,
        progress: &dyn ProgressSink,
    ) -> Option<QuantizationJob> {
        let Some(toolchain) = self.toolchain else {
            warn!("No llama.cpp toolchain, skipping quantization");
            progress.status(&format!(
                "Warning: llama.cpp not found, skipping quantization to {}",
                quant_level
            ));
            return None;
        };

        let Some(binary) = toolchain.quantize_binary() else {
            warn!(
                "No quantize binary under {}, skipping quantization",
                toolchain.root.display()
            );
            progress.status("Warning: quantize tool not found, skipping quantization");
            return None;
        };

        if !is_known_quant(quant_level) {
            warn!("Unknown quantization type {}", quant_level);
            progress.status(&format!(
                "Warning: {} is not a known llama.cpp quantization type, trying anyway",
                quant_level
            ));
        }

        Some(QuantizationJob {
            input: input.to_path_buf(),
            quant_level: quant_level.to_string(),
            quantize_binary: binary,
            output: quantized_output_path(input, quant_level),
        })
    }

    /// Tool descriptor with the toolchain's library directory injected.
    pub fn tool_for(&self, job: &QuantizationJob) -> ExternalTool {
        let tool = ExternalTool::new(&job.quantize_binary);
        match self.toolchain.and_then(ToolchainLocation::library_dir) {
            Some(lib_dir) => {
                let var = ToolchainConfig::library_path_var();
                let inherited = std::env::var_os(var);
                tool.with_env(var, prepend_search_path(&lib_dir, inherited.as_deref()))
            }
            None => tool,
        }
    }

    /// Quantize `input`, returning the path of the artifact to keep.
    ///
    /// On success the input is deleted and the quantized path returned;
    /// otherwise `input` is returned untouched.
    pub async fn quantize(
        &self,
        input: &Path,
        quant_level: &str,
        progress: &dyn ProgressSink,
    ) -> PathBuf {
        let Some(job) = self.plan(input, quant_level, progress) else {
            return input.to_path_buf();
        };

        let tool = self.tool_for(&job);
        let args = job.args();
        progress.status(&format!("Quantizing model to {}", job.quant_level));
        progress.percent(85);
        info!("Running {}", tool.command_line(&args));

        let output = match self.runner.run(&tool, &args).await {
            Ok(output) => output,
            Err(e) => {
                error!("Quantizer could not be started: {}", e);
                progress.status(&format!("Quantization failed: {}", e));
                remove_partial_output(&job.output).await;
                return job.input;
            }
        };

        if !output.success {
            error!(
                "Quantization failed ({}): {}",
                output.exit_description(),
                output.stderr.trim()
            );
            progress.status(&format!(
                "Quantization failed: {} returned {}",
                tool.command_line(&args),
                output.exit_description()
            ));
            if !output.stderr.trim().is_empty() {
                progress.status(&format!("Stderr: {}", output.stderr.trim()));
            }
            remove_partial_output(&job.output).await;
            return job.input;
        }

        if !job.output.is_file() {
            warn!(
                "Quantizer succeeded but {} is missing",
                job.output.display()
            );
            progress.status(&format!(
                "WARNING: Quantized file does not exist at {}",
                job.output.display()
            ));
            return job.input;
        }

        if let Err(e) = tokio::fs::remove_file(&job.input).await {
            warn!("Could not remove {}: {}", job.input.display(), e);
        }
        progress.percent(95);
        job.output
    }
}

/// `dir` followed by the entries of an inherited search path variable.
fn prepend_search_path(dir: &Path, inherited: Option<&OsStr>) -> OsString {
    let mut paths = vec![dir.to_path_buf()];
    if let Some(inherited) = inherited {
        paths.extend(std::env::split_paths(inherited).filter(|p| !p.as_os_str().is_empty()));
    }
    std::env::join_paths(paths).unwrap_or_else(|e| {
        warn!("Could not extend library search path: {}", e);
        dir.as_os_str().to_os_string()
    })
}

/// Delete whatever a failed quantizer left at `output`, so a later run
/// cannot mistake it for a finished artifact.
async fn remove_partial_output(output: &Path) {
    if !output.exists() {
        return;
    }
    match tokio::fs::remove_file(output).await {
        Ok(()) => info!("Removed partial quantizer output {}", output.display()),
        Err(e) => warn!("Could not remove partial output {}: {}", output.display(), e),
    }
}
