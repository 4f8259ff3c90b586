//! Licensing service request/response structs.

use crate::errors::{PaycheckError, Result};
use crate::protocol::claims::DeviceType;
use serde::{Deserialize, Serialize};

/// Optional device details sent on activation.
#[derive(Debug, Clone, Default)]
pub struct DeviceInfo {
    /// Human-readable device name.
    pub device_name: Option<String>,
}

/// Body of `POST /redeem/key`.
///
/// The service resolves the project from `project_id` when given, else from
/// `public_key`.
#[derive(Debug, Clone, Serialize)]
pub struct ActivateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    pub public_key: String,
    pub key: String,
    pub device_id: String,
    pub device_type: DeviceType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
}

/// Body of `POST /redeem`.
#[derive(Debug, Clone, Serialize)]
pub struct RedeemRequest {
    pub public_key: String,
    pub code: String,
    pub device_id: String,
    pub device_type: DeviceType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
}

/// Body of `POST /validate`.
#[derive(Debug, Clone, Serialize)]
pub struct ValidateRequest {
    pub public_key: String,
    pub jti: String,
}

/// Body of `POST /activation/request-code`.
#[derive(Debug, Clone, Serialize)]
pub struct RequestCodeRequest {
    pub public_key: String,
    pub email: String,
}

/// Token issued by activate or redeem.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ActivationResult {
    /// Signed license token for this device.
    pub token: String,
    /// When license access ends (`None` = perpetual).
    #[serde(default)]
    pub license_exp: Option<i64>,
    /// When version access ends (`None` = all versions).
    #[serde(default)]
    pub updates_exp: Option<i64>,
    /// Product tier.
    #[serde(default)]
    pub tier: String,
    /// Enabled features.
    #[serde(default)]
    pub features: Vec<String>,
    /// Short-lived code for activating further devices.
    #[serde(default, alias = "redemption_code")]
    pub activation_code: Option<String>,
    /// When `activation_code` expires.
    #[serde(default, alias = "redemption_code_expires_at")]
    pub activation_code_expires_at: Option<i64>,
}

/// Response of `POST /refresh`.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshResponse {
    pub token: String,
}

/// Server verdict for a token id.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OnlineValidation {
    /// Whether the license behind the token is still good.
    pub valid: bool,
    /// Why not, when `valid` is false.
    #[serde(default)]
    pub reason: Option<String>,
    /// Authoritative license end.
    #[serde(default)]
    pub license_exp: Option<i64>,
    /// Authoritative update-access end.
    #[serde(default)]
    pub updates_exp: Option<i64>,
}

/// Result of device deactivation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeactivateResult {
    /// Whether this device slot was released.
    pub deactivated: bool,
    /// Active devices left on the license.
    #[serde(default)]
    pub remaining_devices: i32,
}

/// Response of the activation-code request.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestCodeResult {
    /// Generic confirmation; identical whether or not the email matched.
    pub message: String,
}

/// License status reported by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseStatus {
    Active,
    Expired,
    Revoked,
    #[serde(other)]
    Unknown,
}

/// A device registered on a license.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LicenseDeviceInfo {
    pub device_id: String,
    #[serde(default)]
    pub device_type: DeviceType,
    #[serde(default)]
    pub name: Option<String>,
    pub activated_at: i64,
    pub last_seen_at: i64,
}

/// Full license information.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LicenseInfo {
    pub status: LicenseStatus,
    pub created_at: i64,
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub updates_expires_at: Option<i64>,
    #[serde(default)]
    pub activation_count: i32,
    #[serde(default)]
    pub activation_limit: i32,
    #[serde(default)]
    pub device_count: i32,
    #[serde(default)]
    pub device_limit: i32,
    #[serde(default)]
    pub devices: Vec<LicenseDeviceInfo>,
}

/// Error body returned with non-2xx statuses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
}

impl ErrorBody {
    /// Collapse `error`/`details` into one message.
    pub fn message(&self, status: u16) -> String {
        match (&self.error, &self.details) {
            (Some(err), Some(details)) => format!("{}: {}", err, details),
            (Some(err), None) => err.clone(),
            (None, Some(details)) => details.clone(),
            (None, None) => format!("Request failed: {}", status),
        }
    }
}

/// Parse a JSON response body.
pub fn parse_body<T: for<'de> Deserialize<'de>>(body: &[u8]) -> Result<T> {
    serde_json::from_slice(body)
        .map_err(|e| PaycheckError::network(format!("Failed to parse response: {}", e)))
}
