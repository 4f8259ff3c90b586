//! Ed25519 signature verification.
//!
//! The verifying key is decoded once when the verifier is built and never
//! fetched remotely, which is what lets tokens be checked offline.

use crate::errors::{PaycheckError, Result};
use crate::protocol::claims::DecodedToken;
use base64::{engine::general_purpose::STANDARD, Engine};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};

/// JOSE algorithm name for Ed25519 signatures.
pub const TOKEN_ALGORITHM: &str = "EdDSA";

/// Decode a standard-base64 Ed25519 public key.
pub fn decode_public_key(public_key_b64: &str) -> Result<VerifyingKey> {
    let bytes = STANDARD
        .decode(public_key_b64.trim())
        .map_err(|e| PaycheckError::config(format!("Invalid public key base64: {}", e)))?;

    let key_array: [u8; 32] = bytes
        .try_into()
        .map_err(|_| PaycheckError::config("Public key must be 32 bytes"))?;

    VerifyingKey::from_bytes(&key_array)
        .map_err(|e| PaycheckError::config(format!("Invalid Ed25519 public key: {}", e)))
}

/// Verifies token signatures against one project public key.
#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    key: VerifyingKey,
}

impl SignatureVerifier {
    /// Build a verifier from a standard-base64 public key.
    pub fn new(public_key_b64: &str) -> Result<Self> {
        Ok(Self {
            key: decode_public_key(public_key_b64)?,
        })
    }

    /// Build a verifier from an already-decoded key.
    pub fn from_key(key: VerifyingKey) -> Self {
        Self { key }
    }

    /// Verify `signature` over `signed_payload`.
    ///
    /// Every failure (wrong length, wrong key, tampered bytes) is `false`;
    /// callers cannot tell which one happened.
    pub fn verify(&self, signed_payload: &[u8], signature: &[u8]) -> bool {
        let Ok(signature) = Signature::from_slice(signature) else {
            return false;
        };
        self.key.verify(signed_payload, &signature).is_ok()
    }

    /// Verify a decoded token, including its declared algorithm.
    pub fn verify_token(&self, decoded: &DecodedToken) -> bool {
        if decoded.header.alg != TOKEN_ALGORITHM {
            return false;
        }
        self.verify(decoded.signed_payload.as_bytes(), &decoded.signature)
    }
}
