//! License token decoding.
//!
//! A token is three base64url (unpadded) segments, `header.payload.signature`.
//! The signature covers the ASCII bytes of `header.payload`. Decoding never
//! checks the signature; that is the verifier's job.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// Expected issuer for Paycheck tokens.
pub const EXPECTED_ISSUER: &str = "paycheck";

/// How a device id was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    /// Random UUID (web apps, sandboxed environments).
    Uuid,
    /// Hardware-derived identifier (desktop apps).
    Machine,
    /// Anything this SDK does not recognise. Not used for any decision.
    #[default]
    #[serde(other)]
    Unknown,
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uuid => write!(f, "uuid"),
            Self::Machine => write!(f, "machine"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Token header (JOSE).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenHeader {
    /// Signature algorithm; only `EdDSA` verifies.
    pub alg: String,
    /// Token type, normally `JWT`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
    /// Critical extensions the reader must understand.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crit: Option<Vec<String>>,
}

/// Decoded license claims.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LicenseClaims {
    /// Issuer (`paycheck`).
    pub iss: String,
    /// Subject: the license id.
    pub sub: String,
    /// Audience (project name, informational).
    #[serde(default)]
    pub aud: String,
    /// Token id, unique per device activation.
    pub jti: String,
    /// Issued at (Unix seconds).
    #[serde(default)]
    pub iat: i64,
    /// Token expiry (Unix seconds). Governs renewal, not license validity.
    #[serde(default)]
    pub exp: i64,
    /// When license access ends; `None` is perpetual.
    #[serde(default)]
    pub license_exp: Option<i64>,
    /// When version access ends; `None` covers all versions.
    #[serde(default)]
    pub updates_exp: Option<i64>,
    /// Product tier.
    #[serde(default)]
    pub tier: String,
    /// Enabled features.
    #[serde(default)]
    pub features: Vec<String>,
    /// Device this token is bound to.
    pub device_id: String,
    /// How `device_id` was derived.
    #[serde(default)]
    pub device_type: DeviceType,
    /// Product id.
    #[serde(default)]
    pub product_id: String,
    /// Fields this SDK does not know; kept for callers, never consulted.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A token split into its verified-later parts.
#[derive(Debug, Clone)]
pub struct DecodedToken {
    /// The signed message: `header.payload` exactly as it appeared.
    pub signed_payload: String,
    /// Raw signature bytes.
    pub signature: Vec<u8>,
    /// Decoded header.
    pub header: TokenHeader,
    /// Decoded claims.
    pub claims: LicenseClaims,
}

/// Why a token failed to decode. Every variant is a malformed token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Not exactly three segments.
    #[error("expected 3 token segments, found {0}")]
    SegmentCount(usize),

    /// A segment is not base64url.
    #[error("{0} segment is not valid base64url")]
    Encoding(&'static str),

    /// A segment is not the expected JSON.
    #[error("{0} segment is not valid JSON: {1}")]
    Json(&'static str, String),

    /// Header lists critical extensions.
    #[error("unsupported critical header extensions")]
    UnsupportedCritical,

    /// A required claim is empty.
    #[error("required claim `{0}` is empty")]
    MissingClaim(&'static str),
}

/// Decode a token into its signed payload, signature and claims.
pub fn decode_token(token: &str) -> Result<DecodedToken, DecodeError> {
    let parts: Vec<&str> = token.trim().split('.').collect();
    let [header_b64, payload_b64, signature_b64] = parts[..] else {
        return Err(DecodeError::SegmentCount(parts.len()));
    };

    let header_bytes = URL_SAFE_NO_PAD
        .decode(header_b64)
        .map_err(|_| DecodeError::Encoding("header"))?;
    let payload_bytes = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| DecodeError::Encoding("payload"))?;
    let signature = URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| DecodeError::Encoding("signature"))?;

    let header: TokenHeader = serde_json::from_slice(&header_bytes)
        .map_err(|e| DecodeError::Json("header", e.to_string()))?;
    if header.crit.as_ref().is_some_and(|c| !c.is_empty()) {
        return Err(DecodeError::UnsupportedCritical);
    }

    let claims: LicenseClaims = serde_json::from_slice(&payload_bytes)
        .map_err(|e| DecodeError::Json("payload", e.to_string()))?;
    check_required(&claims)?;

    Ok(DecodedToken {
        signed_payload: format!("{}.{}", header_b64, payload_b64),
        signature,
        header,
        claims,
    })
}

fn check_required(claims: &LicenseClaims) -> Result<(), DecodeError> {
    let required = [
        ("iss", &claims.iss),
        ("sub", &claims.sub),
        ("jti", &claims.jti),
        ("device_id", &claims.device_id),
    ];
    for (name, value) in required {
        if value.trim().is_empty() {
            return Err(DecodeError::MissingClaim(name));
        }
    }
    Ok(())
}
