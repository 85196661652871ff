//! Ollama registry acquisition: manifest, verified blob, optional quantize.

use crate::config::RegistryConfig;
use crate::conversion::{quantized_output_path, Quantizer};
use crate::error::{Result, WranglerError};
use crate::hashing;
use crate::progress::ProgressSink;
use crate::reference::{sanitize, ModelReference};
use crate::registry::RegistryClient;
use crate::toolchain::{ProcessRunner, ToolRunner, ToolchainLocation};
use crate::types::ArtifactCandidate;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

pub struct RegistryPipeline {
    client: RegistryClient,
    toolchain: Option<ToolchainLocation>,
    runner: Arc<dyn ToolRunner>,
}

impl RegistryPipeline {
    pub fn new(client: RegistryClient, toolchain: Option<ToolchainLocation>) -> Self {
        Self {
            client,
            toolchain,
            runner: Arc::new(ProcessRunner),
        }
    }

    pub fn with_runner(mut self, runner: Arc<dyn ToolRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// Acquire `model_name` into `output_dir`, returning the final artifact.
    ///
    /// Files are named after the name as given (`mistral:7b` becomes
    /// `mistral_7b.gguf`). Existing outputs are reused: a quantized file is
    /// returned as is, a base file is quantized or re-verified.
    pub async fn run(
        &self,
        model_name: &str,
        output_dir: &Path,
        quantization: Option<&str>,
        progress: &dyn ProgressSink,
    ) -> Result<PathBuf> {
        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(|e| WranglerError::io("creating output directory", output_dir, e))?;

        let quantization = quantization.map(str::trim).filter(|q| !q.is_empty());
        let reference = ModelReference::parse_registry(model_name);
        let manifest = self.client.get_manifest(&reference, progress).await?;
        let layer = ArtifactCandidate::from(manifest.select_model_layer()?);
        info!(
            "Selected layer {} ({:?} bytes) for {}",
            layer.relative_path, layer.size_bytes, reference
        );

        let base_path = output_dir.join(format!("{}.gguf", sanitize(model_name.trim())));
        let final_path = self
            .acquire(&reference, &layer, &base_path, quantization, progress)
            .await?;

        progress.percent(100);
        progress.status(&format!("Model saved to: {}", final_path.display()));
        if let Some(quant) = quantization {
            if final_path == quantized_output_path(&base_path, quant) {
                progress.status(&format!("Model quantized to {}", quant));
            }
        }
        progress.status("Download complete!");
        Ok(final_path)
    }

    async fn acquire(
        &self,
        reference: &ModelReference,
        layer: &ArtifactCandidate,
        base_path: &Path,
        quantization: Option<&str>,
        progress: &dyn ProgressSink,
    ) -> Result<PathBuf> {
        let quantizer = Quantizer::new(self.toolchain.as_ref(), self.runner.as_ref());

        if let Some(quant) = quantization {
            let quantized_path = quantized_output_path(base_path, quant);
            if quantized_path.is_file() {
                progress.status(&format!(
                    "Quantized model already exists at {}",
                    quantized_path.display()
                ));
                return Ok(quantized_path);
            }
            if base_path.is_file() {
                progress.status(&format!(
                    "Found existing model at {}, will quantize to {}",
                    base_path.display(),
                    quant
                ));
                return Ok(quantizer.quantize(base_path, quant, progress).await);
            }
        } else if base_path.is_file() {
            progress.status(&format!(
                "Model already exists at {}",
                base_path.display()
            ));
            if self.verify_existing(base_path, layer, progress).await? {
                return Ok(base_path.to_path_buf());
            }
        }

        self.download_verified(reference, layer, base_path, progress)
            .await?;

        match quantization {
            Some(quant) => Ok(quantizer.quantize(base_path, quant, progress).await),
            None => Ok(base_path.to_path_buf()),
        }
    }

    /// Whether an existing base file matches the layer digest. A corrupt
    /// file is deleted.
    async fn verify_existing(
        &self,
        path: &Path,
        layer: &ArtifactCandidate,
        progress: &dyn ProgressSink,
    ) -> Result<bool> {
        let Some(ref digest) = layer.digest else {
            return Ok(false);
        };

        progress.status("Verifying download...");
        match hashing::verify_digest_async(path, digest).await {
            Ok(()) => {
                progress.status("Existing model verified");
                Ok(true)
            }
            Err(WranglerError::IntegrityMismatch { .. }) => {
                progress.status("Existing model corrupt, re-downloading");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Download the layer, re-downloading on a digest mismatch up to
    /// [`RegistryConfig::CORRUPTION_RETRIES`] times.
    async fn download_verified(
        &self,
        reference: &ModelReference,
        layer: &ArtifactCandidate,
        destination: &Path,
        progress: &dyn ProgressSink,
    ) -> Result<()> {
        let mut retries = 0;
        loop {
            match self
                .client
                .download_blob(reference, layer, destination, progress)
                .await
            {
                Ok(_) => return Ok(()),
                Err(e @ WranglerError::IntegrityMismatch { .. })
                    if retries < RegistryConfig::CORRUPTION_RETRIES =>
                {
                    retries += 1;
                    warn!("{}; downloading again", e);
                    progress.status("Downloaded file is corrupt, downloading again");
                }
                Err(e) => return Err(e),
            }
        }
    }
}
