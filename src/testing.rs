//! Shared fixtures for unit tests.

use crate::client::transport::Transport;
use crate::crypto::verify::SignatureVerifier;
use crate::errors::{ErrorCode, PaycheckError, Result};
use crate::protocol::claims::{decode_token, DeviceType, LicenseClaims};
use crate::protocol::models::{
    ActivateRequest, ActivationResult, DeactivateResult, LicenseInfo, LicenseStatus,
    OnlineValidation, RedeemRequest, RequestCodeRequest, RequestCodeResult, ValidateRequest,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use ed25519_dalek::{Signer, SigningKey};
use std::sync::Mutex;
use std::time::Duration;

/// Fixed "now" for deterministic tests (2024-01-01T00:00:00Z).
pub const NOW: i64 = 1_704_067_200;

/// Test keypair (DO NOT USE IN PRODUCTION)
pub const TEST_PRIVATE_KEY_HEX: &str =
    "9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60";
pub const TEST_PUBLIC_KEY: &str = "11qYAYKxCrfVS/7TyWQHOg7hcvPapiMlrwIaaPcHURo=";

pub fn signing_key() -> SigningKey {
    let bytes = hex::decode(TEST_PRIVATE_KEY_HEX).unwrap();
    SigningKey::from_bytes(&bytes.try_into().unwrap())
}

pub fn test_verifier() -> SignatureVerifier {
    SignatureVerifier::new(TEST_PUBLIC_KEY).unwrap()
}

pub fn sample_claims(device_id: &str) -> LicenseClaims {
    LicenseClaims {
        iss: "paycheck".into(),
        sub: "license-123".into(),
        aud: "test-app".into(),
        jti: "jti-123".into(),
        iat: NOW,
        exp: NOW + 3600,
        license_exp: Some(NOW + 30 * 86_400),
        updates_exp: None,
        tier: "pro".into(),
        features: vec!["export".into()],
        device_id: device_id.into(),
        device_type: DeviceType::Uuid,
        product_id: "product-123".into(),
        extra: Default::default(),
    }
}

pub fn sign_token_with_header(claims: &LicenseClaims, header: &str) -> String {
    let payload = serde_json::to_string(claims).unwrap();
    let message = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(header),
        URL_SAFE_NO_PAD.encode(payload)
    );
    let signature = signing_key().sign(message.as_bytes());
    format!("{}.{}", message, URL_SAFE_NO_PAD.encode(signature.to_bytes()))
}

pub fn sign_token(claims: &LicenseClaims) -> String {
    sign_token_with_header(claims, r#"{"alg":"EdDSA","typ":"JWT"}"#)
}

/// In-memory licensing service that signs tokens with the test key.
pub struct MockTransport {
    template: Mutex<LicenseClaims>,
    forced_device: Mutex<Option<String>>,
    online: Mutex<Option<OnlineValidation>>,
    failure: Mutex<Option<PaycheckError>>,
    refresh_failure: Mutex<Option<PaycheckError>>,
    delay: Mutex<Option<Duration>>,
    calls: Mutex<Vec<&'static str>>,
}

impl MockTransport {
    pub fn new(template: LicenseClaims) -> Self {
        Self {
            template: Mutex::new(template),
            forced_device: Mutex::new(None),
            online: Mutex::new(None),
            failure: Mutex::new(None),
            refresh_failure: Mutex::new(None),
            delay: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Issue tokens bound to `device_id` regardless of the request.
    pub fn force_device(&self, device_id: &str) {
        *self.forced_device.lock().unwrap() = Some(device_id.to_string());
    }

    pub fn set_online(&self, online: OnlineValidation) {
        *self.online.lock().unwrap() = Some(online);
    }

    pub fn fail_with(&self, error: PaycheckError) {
        *self.failure.lock().unwrap() = Some(error);
    }

    /// Fail only `refresh` calls.
    pub fn fail_refresh(&self, error: PaycheckError) {
        *self.refresh_failure.lock().unwrap() = Some(error);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    async fn enter(&self, call: &'static str) -> Result<()> {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.calls.lock().unwrap().push(call);
        match self.failure.lock().unwrap().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn issue(&self, device_id: &str) -> LicenseClaims {
        let mut claims = self.template.lock().unwrap().clone();
        claims.device_id = self
            .forced_device
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| device_id.to_string());
        claims
    }

    fn activation(&self, device_id: &str) -> ActivationResult {
        let claims = self.issue(device_id);
        ActivationResult {
            token: sign_token(&claims),
            license_exp: claims.license_exp,
            updates_exp: claims.updates_exp,
            tier: claims.tier,
            features: claims.features,
            activation_code: None,
            activation_code_expires_at: None,
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn activate(&self, request: &ActivateRequest) -> Result<ActivationResult> {
        self.enter("activate").await?;
        if !request.key.starts_with("PC-VALID") {
            return Err(PaycheckError::with_status(
                ErrorCode::InvalidLicenseKey,
                "License not found",
                404,
            ));
        }
        Ok(self.activation(&request.device_id))
    }

    async fn redeem_code(&self, request: &RedeemRequest) -> Result<ActivationResult> {
        self.enter("redeem_code").await?;
        Ok(self.activation(&request.device_id))
    }

    async fn refresh(&self, token: &str) -> Result<String> {
        self.enter("refresh").await?;
        if let Some(error) = self.refresh_failure.lock().unwrap().clone() {
            return Err(error);
        }
        let current = decode_token(token).map_err(|e| PaycheckError::validation(e.to_string()))?;
        let rotation = self.calls().len() as i64;
        let mut claims = self.issue(&current.claims.device_id);
        claims.iat += rotation;
        claims.exp += rotation * 86_400;
        Ok(sign_token(&claims))
    }

    async fn deactivate(&self, _token: &str) -> Result<DeactivateResult> {
        self.enter("deactivate").await?;
        Ok(DeactivateResult {
            deactivated: true,
            remaining_devices: 0,
        })
    }

    async fn validate(&self, _request: &ValidateRequest) -> Result<OnlineValidation> {
        self.enter("validate").await?;
        if let Some(online) = self.online.lock().unwrap().clone() {
            return Ok(online);
        }
        let template = self.template.lock().unwrap();
        Ok(OnlineValidation {
            valid: true,
            reason: None,
            license_exp: template.license_exp,
            updates_exp: template.updates_exp,
        })
    }

    async fn license_info(&self, _public_key: &str, _token: &str) -> Result<LicenseInfo> {
        self.enter("license_info").await?;
        let template = self.template.lock().unwrap();
        Ok(LicenseInfo {
            status: LicenseStatus::Active,
            created_at: template.iat,
            expires_at: template.license_exp,
            updates_expires_at: template.updates_exp,
            activation_count: 1,
            activation_limit: 5,
            device_count: 1,
            device_limit: 3,
            devices: Vec::new(),
        })
    }

    async fn request_activation_code(
        &self,
        _request: &RequestCodeRequest,
    ) -> Result<RequestCodeResult> {
        self.enter("request_activation_code").await?;
        Ok(RequestCodeResult {
            message: "If a license exists for this email, a code has been sent.".into(),
        })
    }
}
