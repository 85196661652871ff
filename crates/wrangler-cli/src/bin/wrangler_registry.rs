//! Ollama registry downloader.
//!
//! Fetches the model layer of a registry manifest, verifies its digest and
//! optionally quantizes it. Progress protocol as for `wrangler-hf`.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use wrangler_cli::{finish, init_logging, parse_args, CommonArgs};
use wrangler_core::{RegistryClient, RegistryPipeline, StdoutProgress};

#[derive(Parser, Debug)]
#[command(name = "wrangler-registry")]
#[command(about = "Download a model from the Ollama registry as GGUF")]
struct Args {
    /// Model name, e.g. `mistral`, `mistral:7b` or `namespace/model:tag`
    model_name: String,

    /// Directory receiving the artifact
    output_dir: PathBuf,

    /// Optional quantization type, e.g. Q4_K_M
    quantization: Option<String>,

    #[command(flatten)]
    common: CommonArgs,
}

async fn run(args: Args) -> Result<PathBuf> {
    let toolchain = args.common.locate_toolchain();
    let pipeline = RegistryPipeline::new(RegistryClient::public()?, toolchain);
    let path = pipeline
        .run(
            &args.model_name,
            &args.output_dir,
            args.quantization.as_deref(),
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
