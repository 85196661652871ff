//! Streaming digest computation and verification for downloaded blobs.
//!
//! Digests use the registry's `<algorithm>:<hex>` form, e.g. `sha256:ab12...`.

use crate::error::{Result, WranglerError};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

/// Chunk size for reading files (8MB, optimal for SSDs).
const CHUNK_SIZE: usize = 8 * 1024 * 1024;

/// Scheme prefix used by registry manifests.
pub const DIGEST_PREFIX: &str = "sha256:";

/// Compute the `sha256:<hex>` digest of a file in a single streaming pass.
pub fn compute_digest(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let mut file =
        std::fs::File::open(path).map_err(|e| WranglerError::io("opening file for hashing", path, e))?;

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];
    loop {
        let bytes_read = file
            .read(&mut buffer)
            .map_err(|e| WranglerError::io("reading file for hashing", path, e))?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{}{}", DIGEST_PREFIX, hex::encode(hasher.finalize())))
}

/// Verify a file against an expected digest.
///
/// On mismatch the file is deleted and `IntegrityMismatch` is returned, so a
/// corrupt blob never survives under its final name. The comparison ignores
/// ASCII case in the hex part.
pub fn verify_digest(path: impl AsRef<Path>, expected: &str) -> Result<()> {
    let path = path.as_ref();
    let actual = compute_digest(path)?;

    if actual.eq_ignore_ascii_case(expected.trim()) {
        debug!("Digest verified for {}", path.display());
        return Ok(());
    }

    warn!(
        "Digest mismatch for {}: expected {}, got {}",
        path.display(),
        expected,
        actual
    );
    std::fs::remove_file(path).map_err(|e| WranglerError::io("removing corrupt file", path, e))?;

    Err(WranglerError::IntegrityMismatch {
        expected: expected.to_string(),
        actual,
    })
}

/// Async wrapper that runs verification on the blocking pool.
pub async fn verify_digest_async(path: impl AsRef<Path>, expected: &str) -> Result<()> {
    let path = path.as_ref().to_path_buf();
    let expected = expected.to_string();
    tokio::task::spawn_blocking(move || verify_digest(&path, &expected))
        .await
        .map_err(|e| WranglerError::Io {
            message: format!("Hash computation task failed: {e}"),
            path: None,
            source: None,
        })?
}
