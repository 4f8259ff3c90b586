//! Offline license evaluation.
//!
//! [`ValidationEngine::evaluate`] maps `(token, now, device id)` to a
//! [`ValidationResult`]. It reads nothing but its arguments and the public
//! key it was built with, so it is safe to call from any thread without
//! locking and always returns the same verdict for the same inputs.
//!
//! Checks run in a fixed order and stop at the first failure:
//! 1. a token is present
//! 2. it decodes
//! 3. its signature verifies
//! 4. it is bound to this device
//! 5. `license_exp`, if set, has not passed
//!
//! Token expiry (`exp`) is deliberately not one of them: a stale token only
//! means it should be refreshed.

use crate::crypto::verify::SignatureVerifier;
use crate::errors::InvalidReason;
use crate::protocol::claims::{decode_token, LicenseClaims, EXPECTED_ISSUER};
use serde::Serialize;

/// Verdict for one evaluation. Built fresh per call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    /// Whether the caller should treat the installation as licensed.
    pub valid: bool,
    /// Decoded claims, present whenever the signature verified.
    pub claims: Option<LicenseClaims>,
    /// Why `valid` is false. Diagnostic only.
    pub reason: Option<InvalidReason>,
    /// The licensing service confirmed this verdict.
    pub synced: bool,
    /// The verdict came from local state because the service was not used.
    pub offline: bool,
}

impl ValidationResult {
    /// A valid local verdict.
    pub fn valid(claims: LicenseClaims) -> Self {
        Self {
            valid: true,
            claims: Some(claims),
            reason: None,
            synced: false,
            offline: true,
        }
    }

    /// An invalid local verdict.
    pub fn invalid(reason: InvalidReason, claims: Option<LicenseClaims>) -> Self {
        Self {
            valid: false,
            claims,
            reason: Some(reason),
            synced: false,
            offline: true,
        }
    }

    /// Relabel as confirmed by the service.
    pub fn into_synced(mut self) -> Self {
        self.synced = true;
        self.offline = false;
        self
    }

    /// Relabel as local, without claiming the service was unreachable.
    pub fn into_local_online(mut self) -> Self {
        self.synced = false;
        self.offline = false;
        self
    }
}

/// Offline verifier for license tokens.
#[derive(Debug, Clone)]
pub struct ValidationEngine {
    verifier: SignatureVerifier,
    require_issuer: bool,
}

impl ValidationEngine {
    /// Build an engine around a signature verifier.
    pub fn new(verifier: SignatureVerifier) -> Self {
        Self {
            verifier,
            require_issuer: false,
        }
    }

    /// Also reject tokens not issued by `paycheck`.
    pub fn with_required_issuer(mut self, require: bool) -> Self {
        self.require_issuer = require;
        self
    }

    /// Evaluate a token for the current device at `now` (Unix seconds).
    pub fn evaluate(&self, token: Option<&str>, now: i64, device_id: &str) -> ValidationResult {
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            return ValidationResult::invalid(InvalidReason::NoToken, None);
        };

        let decoded = match decode_token(token) {
            Ok(decoded) => decoded,
            Err(e) => {
                tracing::debug!(error = %e, "token failed to decode");
                return ValidationResult::invalid(InvalidReason::MalformedToken, None);
            }
        };

        if !self.verifier.verify_token(&decoded) {
            return ValidationResult::invalid(InvalidReason::InvalidSignature, None);
        }

        let claims = decoded.claims;

        if self.require_issuer && !validate_issuer(&claims) {
            tracing::debug!(issuer = %claims.iss, "unexpected token issuer");
            return ValidationResult::invalid(InvalidReason::InvalidSignature, None);
        }

        if claims.device_id != device_id {
            return ValidationResult::invalid(InvalidReason::DeviceMismatch, Some(claims));
        }

        if is_license_expired(&claims, now) {
            return ValidationResult::invalid(InvalidReason::LicenseExpired, Some(claims));
        }

        ValidationResult::valid(claims)
    }
}

/// Whether `license_exp` has passed. `license_exp == now` is still valid.
pub fn is_license_expired(claims: &LicenseClaims, now: i64) -> bool {
    match claims.license_exp {
        None => false,
        Some(exp) => now > exp,
    }
}

/// Whether the token itself is past `exp` and due for refresh.
pub fn is_token_stale(claims: &LicenseClaims, now: i64) -> bool {
    now > claims.exp
}

/// Whether the license covers a release published at `version_timestamp`.
pub fn covers_version(claims: &LicenseClaims, version_timestamp: i64) -> bool {
    match claims.updates_exp {
        None => true,
        Some(exp) => version_timestamp <= exp,
    }
}

/// Whether the license grants `feature`.
pub fn has_feature(claims: &LicenseClaims, feature: &str) -> bool {
    claims.features.iter().any(|f| f == feature)
}

/// Whether the token was issued by Paycheck.
pub fn validate_issuer(claims: &LicenseClaims) -> bool {
    claims.iss == EXPECTED_ISSUER
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_claims, sign_token, test_verifier, NOW};
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

    fn engine() -> ValidationEngine {
        ValidationEngine::new(test_verifier())
    }

    #[test]
    fn test_no_token() {
        let result = engine().evaluate(None, NOW, "device-a");
        assert!(!result.valid);
        assert_eq!(result.reason, Some(InvalidReason::NoToken));
        assert!(result.claims.is_none());

        let result = engine().evaluate(Some(""), NOW, "device-a");
        assert_eq!(result.reason, Some(InvalidReason::NoToken));
    }

    #[test]
    fn test_malformed_token() {
        let result = engine().evaluate(Some("not-a-token"), NOW, "device-a");
        assert_eq!(result.reason, Some(InvalidReason::MalformedToken));
    }

    #[test]
    fn test_valid_token() {
        let claims = sample_claims("device-a");
        let token = sign_token(&claims);
        let result = engine().evaluate(Some(&token), NOW, "device-a");
        assert!(result.valid);
        assert_eq!(result.claims, Some(claims));
        assert_eq!(result.reason, None);
        assert!(!result.synced);
        assert!(result.offline);
    }

    #[test]
    fn test_payload_tamper_fails_signature() {
        let token = sign_token(&sample_claims("device-a"));
        let parts: Vec<&str> = token.split('.').collect();
        let mut payload = URL_SAFE_NO_PAD.decode(parts[1]).unwrap();
        let tier_pos = payload
            .windows(3)
            .position(|w| w == b"pro")
            .expect("tier in payload");
        payload[tier_pos] ^= 0x01;
        let tampered = format!(
            "{}.{}.{}",
            parts[0],
            URL_SAFE_NO_PAD.encode(&payload),
            parts[2]
        );

        let result = engine().evaluate(Some(&tampered), NOW, "device-a");
        assert_eq!(result.reason, Some(InvalidReason::InvalidSignature));
        assert!(result.claims.is_none());
    }

    #[test]
    fn test_every_payload_bit_flip_is_rejected() {
        let token = sign_token(&sample_claims("device-a"));
        let parts: Vec<&str> = token.split('.').collect();
        let payload = URL_SAFE_NO_PAD.decode(parts[1]).unwrap();
        let engine = engine();

        for byte in 0..payload.len() {
            for bit in 0..8 {
                let mut flipped = payload.clone();
                flipped[byte] ^= 1 << bit;
                let tampered = format!(
                    "{}.{}.{}",
                    parts[0],
                    URL_SAFE_NO_PAD.encode(&flipped),
                    parts[2]
                );

                let result = engine.evaluate(Some(&tampered), NOW, "device-a");
                assert!(
                    !result.valid,
                    "flip of payload byte {} bit {} still valid",
                    byte,
                    bit
                );
                // Flips that break the JSON fail decoding before the signature check.
                assert!(
                    matches!(
                        result.reason,
                        Some(InvalidReason::InvalidSignature | InvalidReason::MalformedToken)
                    ),
                    "flip of payload byte {} bit {} gave {:?}",
                    byte,
                    bit,
                    result.reason
                );
                assert!(result.claims.is_none());
            }
        }
    }

    #[test]
    fn test_wrong_algorithm_is_invalid_signature() {
        let claims = sample_claims("device-a");
        let token = crate::testing::sign_token_with_header(&claims, r#"{"alg":"HS256","typ":"JWT"}"#);
        let result = engine().evaluate(Some(&token), NOW, "device-a");
        assert_eq!(result.reason, Some(InvalidReason::InvalidSignature));
    }

    #[test]
    fn test_device_mismatch_regardless_of_expiry() {
        let mut claims = sample_claims("device-a");
        let token = sign_token(&claims);
        let result = engine().evaluate(Some(&token), NOW, "device-b");
        assert_eq!(result.reason, Some(InvalidReason::DeviceMismatch));
        assert_eq!(result.claims.as_ref().map(|c| c.device_id.as_str()), Some("device-a"));

        claims.license_exp = Some(NOW - 10);
        let expired = sign_token(&claims);
        let result = engine().evaluate(Some(&expired), NOW, "device-b");
        assert_eq!(result.reason, Some(InvalidReason::DeviceMismatch));
    }

    #[test]
    fn test_license_expiry_boundary() {
        let mut claims = sample_claims("device-a");

        claims.license_exp = Some(NOW);
        assert!(engine().evaluate(Some(&sign_token(&claims)), NOW, "device-a").valid);

        claims.license_exp = Some(NOW + 1);
        assert!(engine().evaluate(Some(&sign_token(&claims)), NOW, "device-a").valid);

        claims.license_exp = Some(NOW - 1);
        let result = engine().evaluate(Some(&sign_token(&claims)), NOW, "device-a");
        assert!(!result.valid);
        assert_eq!(result.reason, Some(InvalidReason::LicenseExpired));
        assert!(result.claims.is_some());
    }

    #[test]
    fn test_stale_token_still_valid() {
        let mut claims = sample_claims("device-a");
        claims.exp = NOW - 86_400;
        let result = engine().evaluate(Some(&sign_token(&claims)), NOW, "device-a");
        assert!(result.valid);
        assert!(is_token_stale(result.claims.as_ref().unwrap(), NOW));
    }

    #[test]
    fn test_evaluate_is_deterministic() {
        let token = sign_token(&sample_claims("device-a"));
        let engine = engine();
        let first = engine.evaluate(Some(&token), NOW, "device-a");
        let second = engine.evaluate(Some(&token), NOW, "device-a");
        assert_eq!(first, second);
    }

    #[test]
    fn test_required_issuer() {
        let mut claims = sample_claims("device-a");
        claims.iss = "someone-else".into();
        let token = sign_token(&claims);

        assert!(engine().evaluate(Some(&token), NOW, "device-a").valid);
        let strict = engine().with_required_issuer(true);
        let result = strict.evaluate(Some(&token), NOW, "device-a");
        assert_eq!(result.reason, Some(InvalidReason::InvalidSignature));
    }

    #[test]
    fn test_covers_version_boundaries() {
        let mut claims = sample_claims("device-a");
        claims.updates_exp = None;
        assert!(covers_version(&claims, i64::MAX));

        claims.updates_exp = Some(1000);
        assert!(covers_version(&claims, 1000));
        assert!(covers_version(&claims, 999));
        assert!(!covers_version(&claims, 1001));
    }

    #[test]
    fn test_has_feature() {
        let claims = sample_claims("device-a");
        assert!(has_feature(&claims, "export"));
        assert!(!has_feature(&claims, "unknown"));
    }

    #[test]
    fn test_validate_issuer() {
        let mut claims = sample_claims("device-a");
        assert!(validate_issuer(&claims));
        claims.iss = "wrong-issuer".into();
        assert!(!validate_issuer(&claims));
    }
}
