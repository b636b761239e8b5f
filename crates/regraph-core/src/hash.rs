use serde::Serialize;
use std::path::Path;

use crate::identity::{ContentHash, Fingerprint};

/// Compute the Blake3 hash of a byte slice.
pub fn hash_bytes(bytes: &[u8]) -> ContentHash {
    ContentHash::new(*blake3::hash(bytes).as_bytes())
}

/// Compute the Blake3 hash of a file's content.
pub fn hash_file(path: &Path) -> std::io::Result<ContentHash> {
    let content = std::fs::read(path)?;
    Ok(hash_bytes(&content))
}

/// Fingerprint an opaque byte representation of a project's compile-time
/// shape (reference list, target framework, defines, ...).
pub fn fingerprint_bytes(bytes: &[u8]) -> Fingerprint {
    Fingerprint::new(*blake3::hash(bytes).as_bytes())
}

/// Fingerprint a serializable configuration value.
/// Any change in the configuration should invalidate dependent results.
pub fn fingerprint_config<T: Serialize>(config: &T) -> Fingerprint {
    // Serialize to JSON for stable hashing
    let json = serde_json::to_string(config).expect("Failed to serialize config");
    fingerprint_bytes(json.as_bytes())
}
