//! SHA-256 hex digests used for proposal content deduplication.

use sha2::{Digest, Sha256};

/// Compute a SHA-256 hex digest of the given bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    format!("{hash:x}")
}

/// Digest of proposal content after line-ending and edge-whitespace
/// normalization, so a redelivered message hashes identically.
pub fn content_hash(content: &str) -> String {
    let normalized = content.replace("\r\n", "\n");
    sha256_hex(normalized.trim().as_bytes())
}
