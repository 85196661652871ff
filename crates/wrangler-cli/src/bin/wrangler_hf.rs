//! Hugging Face downloader.
//!
//! Prints progress lines (`N%` or status text) on stdout for the host
//! application and exits non-zero with an `Error:` line on failure.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use wrangler_cli::{finish, init_logging, parse_args, CommonArgs};
use wrangler_core::{HubClient, HubPipeline, StdoutProgress};

#[derive(Parser, Debug)]
#[command(name = "wrangler-hf")]
#[command(about = "Download a Hugging Face model as GGUF, converting it if needed")]
struct Args {
    /// Repo id (`org/model`) or huggingface.co URL
    model_id: String,

    /// Directory receiving the artifact
    output_dir: PathBuf,

    /// Quantization type, e.g. Q4_K_M
    quantization: String,

    #[command(flatten)]
    common: CommonArgs,
}

async fn run(args: Args) -> Result<PathBuf> {
    let toolchain = args.common.locate_toolchain();
    let pipeline = HubPipeline::new(HubClient::from_env()?, toolchain);
    let path = pipeline
        .run(
            &args.model_id,
            &args.output_dir,
            &args.quantization,
            &StdoutProgress,
        )
        .await?;
    info!("Saved {}", path.display());
    Ok(path)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args: Args = match parse_args() {
        Ok(args) => args,
        Err(code) => return code,
    };
    init_logging(args.common.debug);
    finish(run(args).await)
}
