//! Wrangler Core - Headless model acquisition for llama.cpp.
//!
//! Fetches a model from the Hugging Face hub or the Ollama registry and
//! produces a single GGUF file, converting and quantizing it with a local
//! llama.cpp checkout when no ready-made artifact exists. Progress is
//! reported as discrete lines through a [`ProgressSink`].
//!
//! # Example
//!
//! ```rust,ignore
//! use std::path::Path;
//! use wrangler_core::{HubClient, HubPipeline, StdoutProgress, ToolchainLocator};
//!
//! #[tokio::main]
//! async fn main() -> wrangler_core::Result<()> {
//!     let toolchain = ToolchainLocator::new(None).locate();
//!     let pipeline = HubPipeline::new(HubClient::from_env()?, toolchain);
//!
//!     let path = pipeline
//!         .run("TheBloke/Mistral-7B-v0.1-GGUF", Path::new("models"), "Q4_K_M", &StdoutProgress)
//!         .await?;
//!     println!("Saved {}", path.display());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod conversion;
pub mod error;
pub mod hashing;
pub mod hub;
pub mod network;
pub mod pipeline;
pub mod progress;
pub mod reference;
pub mod registry;
pub mod toolchain;
pub mod types;

pub use error::{Result, WranglerError};
pub use hub::{HubClient, HubEndpoints};
pub use pipeline::{HubPipeline, RegistryPipeline};
pub use progress::{ProgressEvent, ProgressSink, RecordingProgress, StdoutProgress};
pub use reference::ModelReference;
pub use registry::{Manifest, RegistryClient, RegistryEndpoints};
pub use toolchain::{ExternalTool, ProcessRunner, ToolOutput, ToolRunner, ToolchainLocation, ToolchainLocator};
pub use types::ArtifactCandidate;
