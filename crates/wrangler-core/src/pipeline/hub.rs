//! Hugging Face acquisition: direct GGUF download or snapshot + convert.

use crate::conversion::{FormatConverter, Quantizer};
use crate::error::{Result, WranglerError};
use crate::hub::{locator, HubClient};
use crate::progress::ProgressSink;
use crate::reference::ModelReference;
use crate::toolchain::{ProcessRunner, ToolRunner, ToolchainLocation};
use crate::types::ArtifactCandidate;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

pub struct HubPipeline {
    client: HubClient,
    toolchain: Option<ToolchainLocation>,
    runner: Arc<dyn ToolRunner>,
    python: Option<PathBuf>,
}

impl HubPipeline {
    pub fn new(client: HubClient, toolchain: Option<ToolchainLocation>) -> Self {
        Self {
            client,
            toolchain,
            runner: Arc::new(ProcessRunner),
            python: None,
        }
    }

    /// Run external tools through `runner` instead of child processes.
    pub fn with_runner(mut self, runner: Arc<dyn ToolRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// Python interpreter for the converter scripts.
    pub fn with_python(mut self, python: impl Into<PathBuf>) -> Self {
        self.python = Some(python.into());
        self
    }

    /// Acquire `model_id` into `output_dir`, returning the final artifact.
    ///
    /// An empty `quantization` skips the quantization step on the convert
    /// path; on the direct path it only influences which file is picked.
    pub async fn run(
        &self,
        model_id: &str,
        output_dir: &Path,
        quantization: &str,
        progress: &dyn ProgressSink,
    ) -> Result<PathBuf> {
        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(|e| WranglerError::io("creating output directory", output_dir, e))?;

        let reference = ModelReference::parse_hub(model_id);
        progress.status(&format!("Debug: model_id = {}", model_id));
        progress.status(&format!("Debug: repo_id = {}", reference.source_path));
        progress.status(&format!("Debug: revision = {}", reference.revision));
        progress.status(&format!(
            "Debug: specific_file = {}",
            reference.direct_file.as_deref().unwrap_or("None")
        ));

        if let Some(ref file) = reference.direct_file {
            progress.status(&format!("Downloading specific file: {}", file));
            let path = self
                .client
                .download_file(
                    &reference,
                    &ArtifactCandidate::from_path(file.as_str()),
                    output_dir,
                    progress,
                )
                .await?;
            progress.percent(100);
            progress.status("Download complete!");
            return Ok(path);
        }

        progress.status(&format!(
            "Checking {} for GGUF files...",
            reference.source_path
        ));
        let candidates = self.client.find_gguf_files(&reference, progress).await;

        if let Some(selected) = locator::select_candidate(&candidates, quantization) {
            progress.status(&format!(
                "Found {} compatible GGUF files",
                candidates.len()
            ));
            progress.status(&format!("Downloading {}", selected.relative_path));
            let path = self
                .client
                .download_file(&reference, selected, output_dir, progress)
                .await?;
            progress.percent(100);
            progress.status("Download complete!");
            return Ok(path);
        }

        progress.status("No pre-quantized GGUF files found");
        self.convert_from_source(&reference, output_dir, quantization, progress)
            .await
    }

    async fn convert_from_source(
        &self,
        reference: &ModelReference,
        output_dir: &Path,
        quantization: &str,
        progress: &dyn ProgressSink,
    ) -> Result<PathBuf> {
        let toolchain = self
            .toolchain
            .as_ref()
            .ok_or_else(|| WranglerError::ToolchainMissing {
                message: "llama.cpp not found. Please ensure llama.cpp is installed.".to_string(),
            })?;

        progress.status("Downloading base model for local conversion...");
        let snapshot_dir = match self.client.snapshot(reference, output_dir, progress).await {
            Ok(dir) => dir,
            Err(e) => {
                progress.status(&format!("Error downloading base model: {}", e));
                progress.status("The model may be too large or require authentication");
                return Err(e);
            }
        };
        progress.status("Base model downloaded, converting to GGUF...");

        let mut converter = FormatConverter::new(toolchain, self.runner.as_ref());
        if let Some(ref python) = self.python {
            converter = converter.with_python(python);
        }
        let gguf_path = output_dir.join(format!("{}.gguf", reference.safe_name()));
        let converted = converter
            .convert(&snapshot_dir, &gguf_path, progress)
            .await?;

        let final_path = if quantization.is_empty() {
            converted.clone()
        } else {
            Quantizer::new(Some(toolchain), self.runner.as_ref())
                .quantize(&converted, quantization, progress)
                .await
        };

        progress.percent(100);
        if final_path == converted {
            progress.status("Model converted successfully! (Quantization optional)");
        } else {
            progress.status("Model converted and quantized successfully!");
        }

        match tokio::fs::remove_dir_all(&snapshot_dir).await {
            Ok(()) => progress.status("Cleaned up temporary files"),
            Err(e) => warn!(
                "Could not remove snapshot {}: {}",
                snapshot_dir.display(),
                e
            ),
        }

        info!("Hub acquisition finished: {}", final_path.display());
        Ok(final_path)
    }
}
