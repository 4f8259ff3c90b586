//! Paycheck configuration.

use crate::errors::{PaycheckError, Result};
use crate::protocol::claims::DeviceType;
use std::time::Duration;

/// Default Paycheck API URL.
pub const DEFAULT_BASE_URL: &str = "https://api.paycheck.dev";

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Whether a refresh may revive a license whose `license_exp` has passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshPolicy {
    /// Refresh only rotates the bearer token. A lapsed license is refused
    /// locally, before any request is made.
    #[default]
    RotateOnly,
    /// Always ask the service; it may reissue with a renewed `license_exp`.
    AllowLapsed,
}

/// Configuration for a Paycheck `LicenseManager`.
///
/// Build one with [`PaycheckConfig::new`] and adjust fields as needed.
#[derive(Debug, Clone)]
pub struct PaycheckConfig {
    /// Project Ed25519 public key (standard base64, 32 bytes).
    /// SECURITY: This should be hard-coded in your application, not fetched.
    pub public_key: String,

    /// Project id sent with license key activation.
    pub project_id: Option<String>,

    /// Paycheck server URL, without trailing slash.
    pub base_url: String,

    /// Device identity policy used when no device id is stored yet.
    pub device_type: DeviceType,

    /// Fixed device id, bypassing generation and storage.
    pub device_id: Option<String>,

    /// Refresh stale tokens before authenticated calls.
    pub auto_refresh: bool,

    /// Refresh behaviour once `license_exp` has passed.
    pub refresh_policy: RefreshPolicy,

    /// Reject tokens whose issuer is not `paycheck`.
    pub require_issuer: bool,

    /// Deadline for each network request.
    pub request_timeout: Duration,

    /// Namespace for file storage (`dirs::data_dir()/<namespace>/`).
    pub storage_namespace: String,

    /// User-Agent product identifier.
    pub user_agent_product: String,
}

impl PaycheckConfig {
    /// Create a configuration with defaults for everything but the key.
    pub fn new(public_key: impl Into<String>) -> Self {
        Self {
            public_key: public_key.into(),
            project_id: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            device_type: DeviceType::Machine,
            device_id: None,
            auto_refresh: true,
            refresh_policy: RefreshPolicy::default(),
            require_issuer: false,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            storage_namespace: "paycheck".to_string(),
            user_agent_product: "paycheck-app".to_string(),
        }
    }

    /// Set the server URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Validate configuration for obvious errors.
    pub fn validate(&self) -> Result<()> {
        if self.public_key.is_empty() {
            return Err(PaycheckError::config("public_key cannot be empty"));
        }
        crate::crypto::verify::decode_public_key(&self.public_key)?;

        let parsed = url::Url::parse(&self.base_url)
            .map_err(|e| PaycheckError::config(format!("Invalid base_url: {}", e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(PaycheckError::config(format!(
                "base_url must be http(s), got {}",
                parsed.scheme()
            )));
        }

        if self.storage_namespace.is_empty() {
            return Err(PaycheckError::config("storage_namespace cannot be empty"));
        }
        if self.request_timeout.is_zero() {
            return Err(PaycheckError::config("request_timeout must be non-zero"));
        }
        if matches!(self.device_id.as_deref(), Some("")) {
            return Err(PaycheckError::config("device_id override cannot be empty"));
        }
        Ok(())
    }
}
