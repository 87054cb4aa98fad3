//! Content hashing for cache keys.

use std::path::Path;

use sha2::{Digest, Sha256};

/// SHA-256 of a byte slice as a 64-character lowercase hex string.
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// SHA-256 of a file's raw bytes.
///
/// The skip decision keys on content, never on modification time, so a
/// touched-but-unchanged file still skips.
pub fn hash_file(path: &Path) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(hash_bytes(&bytes))
}
