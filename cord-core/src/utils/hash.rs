// src/utils/hash.rs
use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of a string. Used for passphrase hashes and the
/// audit chain.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}
