//! Source-model to GGUF conversion through the toolchain's Python scripts.

use super::architecture::{detect_architecture, script_for_architecture, DEFAULT_ARCHITECTURE};
use crate::config::ToolchainConfig;
use crate::error::{Result, WranglerError};
use crate::progress::ProgressSink;
use crate::toolchain::{ExternalTool, ToolRunner, ToolchainLocation};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// A fully resolved conversion, ready to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionJob {
    pub architecture: String,
    pub script: PathBuf,
    pub input_dir: PathBuf,
    pub output: PathBuf,
}

impl ConversionJob {
    fn args(&self) -> Vec<OsString> {
        vec![
            self.script.clone().into_os_string(),
            self.input_dir.clone().into_os_string(),
            "--outfile".into(),
            self.output.clone().into_os_string(),
        ]
    }
}

/// Runs the converter script for a downloaded source model.
pub struct FormatConverter<'a> {
    toolchain: &'a ToolchainLocation,
    runner: &'a dyn ToolRunner,
    python: PathBuf,
}

impl<'a> FormatConverter<'a> {
    pub fn new(toolchain: &'a ToolchainLocation, runner: &'a dyn ToolRunner) -> Self {
        Self {
            toolchain,
            runner,
            python: PathBuf::from(ToolchainConfig::DEFAULT_PYTHON),
        }
    }

    /// Use a specific Python interpreter instead of `python3` from `PATH`.
    pub fn with_python(mut self, python: impl Into<PathBuf>) -> Self {
        self.python = python.into();
        self
    }

    /// Locate a script in the toolchain root, tolerating `-`/`_` spelling
    /// differences and falling back to the generic converters.
    pub fn find_conversion_script(&self, script_name: &str) -> Option<PathBuf> {
        let variants = [
            script_name.to_string(),
            script_name.replace('-', "_"),
            script_name.replace('_', "-"),
        ];
        let found = variants
            .iter()
            .map(String::as_str)
            .chain(ToolchainConfig::CONVERTER_SCRIPTS)
            .map(|name| self.toolchain.root.join(name))
            .find(|path| path.is_file());
        found
    }

    /// Resolve architecture and script for `model_dir`.
    pub async fn plan(
        &self,
        model_dir: &Path,
        output: &Path,
        progress: &dyn ProgressSink,
    ) -> Result<ConversionJob> {
        let architecture = detect_architecture(model_dir, progress).await.unwrap_or_else(|| {
            warn!(
                "No architecture in {}, assuming {}",
                model_dir.display(),
                DEFAULT_ARCHITECTURE
            );
            progress.status("Warning: Could not identify architecture, using default converter");
            DEFAULT_ARCHITECTURE.to_string()
        });

        let script_name = script_for_architecture(&architecture);
        let script = self.find_conversion_script(script_name).ok_or_else(|| {
            WranglerError::ToolchainMissing {
                message: format!(
                    "No conversion script found in {}",
                    self.toolchain.root.display()
                ),
            }
        })?;

        Ok(ConversionJob {
            architecture,
            script,
            input_dir: model_dir.to_path_buf(),
            output: output.to_path_buf(),
        })
    }

    /// Convert `model_dir` into a single GGUF file at `output`.
    pub async fn convert(
        &self,
        model_dir: &Path,
        output: &Path,
        progress: &dyn ProgressSink,
    ) -> Result<PathBuf> {
        let job = self.plan(model_dir, output, progress).await?;
        let script_name = job
            .script
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        info!(
            "Converting {} ({}) with {}",
            job.input_dir.display(),
            job.architecture,
            job.script.display()
        );
        progress.status(&format!("Converting model using {}", script_name));
        progress.percent(50);

        let tool = ExternalTool::new(&self.python);
        let run = self.runner.run(&tool, &job.args()).await;

        let output = match run {
            Ok(output) => output,
            Err(e) => {
                progress.status(&format!("Conversion failed: {}", e));
                return Err(WranglerError::ConversionFailed {
                    message: e.to_string(),
                    stderr: None,
                });
            }
        };

        if !output.success {
            let message = format!(
                "{} returned {}",
                tool.command_line(&job.args()),
                output.exit_description()
            );
            error!("Conversion failed: {}", message);
            progress.status(&format!("Conversion failed: {}", message));
            let stderr = output.stderr.trim();
            if !stderr.is_empty() {
                progress.status(&format!("Error details: {}", stderr));
            }
            return Err(WranglerError::ConversionFailed {
                message,
                stderr: Some(output.stderr).filter(|s| !s.trim().is_empty()),
            });
        }

        if !job.output.is_file() {
            return Err(WranglerError::ConversionFailed {
                message: format!(
                    "converter exited successfully but {} was not written",
                    job.output.display()
                ),
                stderr: None,
            });
        }

        progress.percent(75);
        Ok(job.output)
    }
}
