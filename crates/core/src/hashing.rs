//! SHA-256 hex digest used for response cache keys.

use sha2::{Digest, Sha256};

/// Compute a SHA-256 hex digest over a sequence of byte segments.
///
/// Each segment is length-prefixed so `["ab", "c"]` and `["a", "bc"]`
/// never collide.
pub fn sha256_hex_parts(parts: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update((part.len() as u64).to_be_bytes());
        hasher.update(part);
    }
    format!("{:x}", hasher.finalize())
}
