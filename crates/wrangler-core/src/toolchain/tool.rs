//! External tool invocation.
//!
//! The converter and quantizer are described as [`ExternalTool`] values
//! (program plus environment overrides) and executed through a
//! [`ToolRunner`]. Only [`ProcessRunner`] touches `tokio::process`.

use crate::error::{Result, WranglerError};
use async_trait::async_trait;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// A program to run together with the environment it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalTool {
    pub program: PathBuf,
    /// Variables set on top of the inherited environment.
    pub env: Vec<(String, OsString)>,
}

impl ExternalTool {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            env: Vec::new(),
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl AsRef<OsStr>) -> Self {
        self.env.push((key.into(), value.as_ref().to_os_string()));
        self
    }

    /// Value of an environment override, if set.
    pub fn env_value(&self, key: &str) -> Option<&OsStr> {
        self.env
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_os_str())
    }

    /// Display form of a full command line, for log and status output.
    pub fn command_line(&self, args: &[OsString]) -> String {
        std::iter::once(self.program.as_os_str())
            .chain(args.iter().map(OsString::as_os_str))
            .map(|a| a.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured result of a finished tool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub success: bool,
    /// Exit code, if the process exited normally.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    /// Short description of how the tool exited.
    pub fn exit_description(&self) -> String {
        match self.code {
            Some(code) => format!("exit status {}", code),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Capability to run an external tool to completion.
///
/// `Err` means the tool could not be started at all; a tool that ran and
/// failed is reported through [`ToolOutput::success`].
#[async_trait]
pub trait ToolRunner: Send + Sync {
    async fn run(&self, tool: &ExternalTool, args: &[OsString]) -> Result<ToolOutput>;
}

/// Runs tools as child processes with captured output.
///
/// Children are killed if the future is dropped.
#[derive(Debug, Default, Clone)]
pub struct ProcessRunner;

#[async_trait]
impl ToolRunner for ProcessRunner {
    async fn run(&self, tool: &ExternalTool, args: &[OsString]) -> Result<ToolOutput> {
        debug!("Running {}", tool.command_line(args));

        let output = Command::new(&tool.program)
            .args(args)
            .envs(tool.env.iter().map(|(k, v)| (k.as_str(), v.as_os_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| spawn_error(&tool.program, e))?;

        Ok(ToolOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

fn spawn_error(program: &Path, err: std::io::Error) -> WranglerError {
    WranglerError::io(
        &format!("Failed to run {}", program.display()),
        program,
        err,
    )
}
