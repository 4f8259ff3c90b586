//! SHA-256 helpers.
//!
//! Raw tokens and hardware ids never leave the process in logs or requests;
//! their SHA-256 digests do.

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Short, log-safe fingerprint of a token (first 12 hex chars of its digest).
pub fn token_fingerprint(token: &str) -> String {
    let mut digest = sha256_hex(token.as_bytes());
    digest.truncate(12);
    digest
}
