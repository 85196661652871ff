//! Shared plumbing for the `wrangler-hf` and `wrangler-registry` binaries.
//!
//! stdout carries the progress protocol only; logs go to stderr.

use clap::{Args, Parser};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use wrangler_core::{ProgressSink, StdoutProgress, ToolchainLocation, ToolchainLocator};

/// Options shared by both binaries.
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// llama.cpp checkout to use before probing the default locations
    #[arg(long = "llama-cpp", env = "LLAMA_CPP_PATH")]
    pub llama_cpp: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,
}

impl CommonArgs {
    /// Probe for the toolchain once, honoring the override.
    pub fn locate_toolchain(&self) -> Option<ToolchainLocation> {
        ToolchainLocator::new(self.llama_cpp.clone()).locate()
    }
}

/// Install the stderr log subscriber. `RUST_LOG` takes precedence over
/// `--debug` when set.
pub fn init_logging(debug: bool) {
    let level = if debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();
}

/// Turn a pipeline result into the process exit status, printing the
/// protocol `Error:` line on failure.
pub fn finish(result: anyhow::Result<PathBuf>) -> ExitCode {
    match result {
        Ok(path) => {
            tracing::debug!("Finished with {}", path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("{:#}", e);
            StdoutProgress.status(&error_line(&e));
            ExitCode::FAILURE
        }
    }
}

/// Parse command-line arguments, keeping the exit-code contract for usage
/// errors: `--help`/`--version` exit 0, anything else prints an `Error:`
/// line on stdout and exits 1.
pub fn parse_args<T: Parser>() -> Result<T, ExitCode> {
    parse_args_from(std::env::args_os())
}

/// [`parse_args`] over an explicit argument list.
pub fn parse_args_from<T, I, A>(args: I) -> Result<T, ExitCode>
where
    T: Parser,
    I: IntoIterator<Item = A>,
    A: Into<std::ffi::OsString> + Clone,
{
    T::try_parse_from(args).map_err(|e| {
        let _ = e.print();
        match usage_error_line(&e) {
            Some(line) => {
                StdoutProgress.status(&line);
                ExitCode::FAILURE
            }
            None => ExitCode::SUCCESS,
        }
    })
}

/// `Error:` line for a parse failure, or `None` for help and version output.
pub fn usage_error_line(err: &clap::Error) -> Option<String> {
    if !err.use_stderr() {
        return None;
    }
    // First paragraph of clap's message, without usage and tips
    let rendered = err.render().to_string();
    let message = rendered
        .lines()
        .take_while(|line| !line.trim().is_empty())
        .map(str::trim)
        .collect::<Vec<_>>()
        .join(" ");
    let message = message.strip_prefix("error: ").unwrap_or(&message);
    Some(format!("Error: {}", message))
}

/// `Error: <message>` for the outermost error.
pub fn error_line(err: &anyhow::Error) -> String {
    format!("Error: {}", err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Parser, Debug)]
    #[command(name = "test", version = "0.1.0")]
    struct TestCli {
        model_id: Option<String>,

        #[command(flatten)]
        common: CommonArgs,
    }

    #[derive(Parser, Debug)]
    #[command(name = "test")]
    struct RequiredCli {
        model_id: String,
        output_dir: PathBuf,
    }

    #[test]
    fn test_error_line() {
        let err = anyhow::anyhow!("Model 'library/nope:latest' not found in Ollama registry");
        assert_eq!(
            error_line(&err),
            "Error: Model 'library/nope:latest' not found in Ollama registry"
        );
    }

    #[test]
    fn test_llama_cpp_env_matches_toolchain_config() {
        use clap::CommandFactory;
        use wrangler_core::config::ToolchainConfig;

        let command = TestCli::command();
        let arg = command
            .get_arguments()
            .find(|a| a.get_long() == Some("llama-cpp"))
            .unwrap();
        assert_eq!(
            arg.get_env(),
            Some(std::ffi::OsStr::new(ToolchainConfig::ROOT_ENV_VAR))
        );
    }

    #[test]
    fn test_common_args_parse() {
        let cli = TestCli::parse_from(["test", "--llama-cpp", "/opt/llama.cpp", "--debug"]);
        assert_eq!(cli.common.llama_cpp, Some(PathBuf::from("/opt/llama.cpp")));
        assert!(cli.common.debug);
    }

    #[test]
    fn test_missing_arguments_are_an_error_line() {
        let err = RequiredCli::try_parse_from(["test"]).unwrap_err();
        let line = usage_error_line(&err).unwrap();
        assert!(line.starts_with("Error: "), "{line}");
        assert!(line.contains("<MODEL_ID>"), "{line}");
        assert!(!line.contains("Usage"), "{line}");
    }

    #[test]
    fn test_unknown_flag_is_an_error_line() {
        let err = TestCli::try_parse_from(["test", "--bogus"]).unwrap_err();
        let line = usage_error_line(&err).unwrap();
        assert!(line.starts_with("Error: "));
        assert!(line.contains("--bogus"), "{line}");
    }

    #[test]
    fn test_help_and_version_are_not_errors() {
        let help = TestCli::try_parse_from(["test", "--help"]).unwrap_err();
        assert_eq!(usage_error_line(&help), None);
        let version = TestCli::try_parse_from(["test", "--version"]).unwrap_err();
        assert_eq!(usage_error_line(&version), None);
    }

    fn same_code(a: ExitCode, b: ExitCode) -> bool {
        format!("{a:?}") == format!("{b:?}")
    }

    #[test]
    fn test_parse_args_from_exit_codes() {
        let missing = parse_args_from::<RequiredCli, _, _>(["test"]).unwrap_err();
        assert!(same_code(missing, ExitCode::FAILURE));
        let help = parse_args_from::<TestCli, _, _>(["test", "--help"]).unwrap_err();
        assert!(same_code(help, ExitCode::SUCCESS));
        let cli = parse_args_from::<RequiredCli, _, _>(["test", "org/model", "/tmp/out"]).unwrap();
        assert_eq!(cli.model_id, "org/model");
    }

    #[test]
    fn test_finish_exit_codes() {
        let ok = finish(Ok(PathBuf::from("/out/model.gguf")));
        assert!(same_code(ok, ExitCode::SUCCESS));
        let failed = finish(Err(anyhow::anyhow!("Downloaded file is corrupt")));
        assert!(same_code(failed, ExitCode::FAILURE));
    }
}
