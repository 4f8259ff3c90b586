//! Paycheck error types.
//!
//! Remote operations fail with a [`PaycheckError`] carrying a machine-readable
//! [`ErrorCode`]. Offline checks never fail; they report an
//! [`InvalidReason`] inside a `ValidationResult` instead.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Machine-readable error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// No token stored.
    NoToken,
    /// Token could not be decoded.
    MalformedToken,
    /// Token signature did not verify.
    InvalidSignature,
    /// Token is bound to another device.
    DeviceMismatch,
    /// `license_exp` has passed.
    LicenseExpired,
    /// License was revoked server-side.
    LicenseRevoked,
    /// No more device slots on this license.
    DeviceLimitReached,
    /// License cannot be activated again.
    ActivationLimitReached,
    /// License key not recognised.
    InvalidLicenseKey,
    /// Redemption code invalid or expired.
    InvalidCode,
    /// Request failed to reach the service or returned garbage.
    NetworkError,
    /// Request exceeded its deadline.
    Timeout,
    /// Operation was cancelled by the caller.
    Cancelled,
    /// Configuration is invalid.
    ConfigError,
    /// Storage backend failed.
    StorageError,
    /// Stored token changed while a refresh was in flight; retry.
    TokenChanged,
    /// Request parameters rejected.
    ValidationError,
    /// Anything else.
    Unknown,
}

impl ErrorCode {
    /// Stable string form, e.g. `DEVICE_LIMIT_REACHED`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoToken => "NO_TOKEN",
            Self::MalformedToken => "MALFORMED_TOKEN",
            Self::InvalidSignature => "INVALID_SIGNATURE",
            Self::DeviceMismatch => "DEVICE_MISMATCH",
            Self::LicenseExpired => "LICENSE_EXPIRED",
            Self::LicenseRevoked => "LICENSE_REVOKED",
            Self::DeviceLimitReached => "DEVICE_LIMIT_REACHED",
            Self::ActivationLimitReached => "ACTIVATION_LIMIT_REACHED",
            Self::InvalidLicenseKey => "INVALID_LICENSE_KEY",
            Self::InvalidCode => "INVALID_CODE",
            Self::NetworkError => "NETWORK_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::Cancelled => "CANCELLED",
            Self::ConfigError => "CONFIG_ERROR",
            Self::StorageError => "STORAGE_ERROR",
            Self::TokenChanged => "TOKEN_CHANGED",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Whether this code means the service could not be reached.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::NetworkError | Self::Timeout)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an offline (or synced) verdict is not valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvalidReason {
    /// Nothing stored.
    NoToken,
    /// Token failed to decode.
    MalformedToken,
    /// Signature, algorithm or issuer check failed.
    InvalidSignature,
    /// Token issued for another device.
    DeviceMismatch,
    /// License end date has passed.
    LicenseExpired,
    /// Service reported the license revoked or invalid.
    LicenseRevoked,
}

impl InvalidReason {
    /// The error code a lifecycle operation reports for this reason.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NoToken => ErrorCode::NoToken,
            Self::MalformedToken => ErrorCode::MalformedToken,
            Self::InvalidSignature => ErrorCode::InvalidSignature,
            Self::DeviceMismatch => ErrorCode::DeviceMismatch,
            Self::LicenseExpired => ErrorCode::LicenseExpired,
            Self::LicenseRevoked => ErrorCode::LicenseRevoked,
        }
    }
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code().as_str())
    }
}

/// Error returned by Paycheck operations.
#[derive(Debug, Clone, Error)]
#[error("{message} (code: {code})")]
pub struct PaycheckError {
    /// Machine-readable code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
    /// HTTP status, when the error came from the service.
    pub status: Option<u16>,
}

impl PaycheckError {
    /// Create an error with the given code.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            status: None,
        }
    }

    /// Create an error that carries the HTTP status it came from.
    pub fn with_status(code: ErrorCode, message: impl Into<String>, status: u16) -> Self {
        Self {
            code,
            message: message.into(),
            status: Some(status),
        }
    }

    /// Configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigError, message)
    }

    /// Network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NetworkError, message)
    }

    /// Storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::StorageError, message)
    }

    /// Request validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }

    /// Nothing stored to operate on.
    pub fn no_token() -> Self {
        Self::new(ErrorCode::NoToken, "No token stored")
    }

    /// Request deadline exceeded.
    pub fn timeout() -> Self {
        Self::new(ErrorCode::Timeout, "Request timed out")
    }

    /// Operation cancelled.
    pub fn cancelled() -> Self {
        Self::new(ErrorCode::Cancelled, "Operation cancelled")
    }

    /// Error for a token that failed local verification.
    pub fn rejected(reason: InvalidReason) -> Self {
        Self::new(reason.code(), format!("Token rejected: {}", reason))
    }
}

/// Result type for Paycheck operations.
pub type Result<T> = std::result::Result<T, PaycheckError>;

/// Map an HTTP status and error message to an error code.
///
/// The service reports most license failures as 401/403 with a message;
/// the message is what tells them apart.
pub fn map_status_to_error_code(status: u16, message: &str) -> ErrorCode {
    let lower = message.to_lowercase();

    match status {
        401 | 403 => {
            if lower.contains("revoked") {
                ErrorCode::LicenseRevoked
            } else if lower.contains("expired") {
                ErrorCode::LicenseExpired
            } else if lower.contains("device limit") {
                ErrorCode::DeviceLimitReached
            } else if lower.contains("activation limit") {
                ErrorCode::ActivationLimitReached
            } else {
                ErrorCode::InvalidLicenseKey
            }
        }
        404 if lower.contains("code") => ErrorCode::InvalidCode,
        404 => ErrorCode::InvalidLicenseKey,
        400 | 422 => ErrorCode::ValidationError,
        408 | 504 => ErrorCode::Timeout,
        500..=599 => ErrorCode::NetworkError,
        _ => ErrorCode::Unknown,
    }
}
