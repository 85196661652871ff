//! Network utilities for HTTP downloads and retries.
//!
//! This module provides:
//! - HTTP client construction with optional bearer authentication
//! - Streaming blob and resumable downloads
//! - Retry logic with exponential backoff and jitter

mod client;
mod download;
mod retry;

pub use client::HttpClients;
pub use download::{BlobDownloader, DownloadTask};
pub use retry::{retry_async, RetryConfig, RetryStats};
