//! Shared helpers for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use ed25519_dalek::{Signer, SigningKey};
use paycheck_sdk::client::transport::Transport;
use paycheck_sdk::protocol::models::{
    ActivateRequest, RedeemRequest, RequestCodeRequest, ValidateRequest,
};
use paycheck_sdk::{
    ActivationResult, DeactivateResult, DeviceType, ErrorCode, LicenseClaims, LicenseInfo,
    OnlineValidation, PaycheckConfig, PaycheckError, RequestCodeResult,
};
use std::sync::Mutex;

/// RFC 8032 test vector 1 (DO NOT USE IN PRODUCTION)
pub const PRIVATE_KEY_HEX: &str =
    "9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60";
pub const PUBLIC_KEY: &str = "11qYAYKxCrfVS/7TyWQHOg7hcvPapiMlrwIaaPcHURo=";

pub const DEVICE_ID: &str = "device-integration";
pub const DAY: i64 = 86_400;

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

pub fn config() -> PaycheckConfig {
    let mut config = PaycheckConfig::new(PUBLIC_KEY);
    config.device_id = Some(DEVICE_ID.into());
    config.device_type = DeviceType::Uuid;
    config
}

pub fn claims(device_id: &str) -> LicenseClaims {
    claims_at(now(), device_id)
}

pub fn claims_at(now: i64, device_id: &str) -> LicenseClaims {
    serde_json::from_value(serde_json::json!({
        "iss": "paycheck",
        "sub": "license-1",
        "aud": "integration-app",
        "jti": "jti-1",
        "iat": now,
        "exp": now + 3600,
        "license_exp": now + 30 * DAY,
        "updates_exp": null,
        "tier": "pro",
        "features": ["export", "sync"],
        "device_id": device_id,
        "device_type": "uuid",
        "product_id": "product-1"
    }))
    .unwrap()
}

pub fn sign(claims: &LicenseClaims) -> String {
    let key = SigningKey::from_bytes(&hex::decode(PRIVATE_KEY_HEX).unwrap().try_into().unwrap());
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"EdDSA","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims).unwrap());
    let message = format!("{}.{}", header, payload);
    let signature = key.sign(message.as_bytes());
    format!("{}.{}", message, URL_SAFE_NO_PAD.encode(signature.to_bytes()))
}

/// Licensing service double that mints tokens for the requesting device.
pub struct FakeService {
    pub issued_at: i64,
    pub revoked: Mutex<bool>,
    pub unreachable: Mutex<bool>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeService {
    pub fn new() -> Self {
        Self {
            issued_at: now(),
            revoked: Mutex::new(false),
            unreachable: Mutex::new(false),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: &str) -> paycheck_sdk::Result<()> {
        self.calls.lock().unwrap().push(call.to_string());
        if *self.unreachable.lock().unwrap() {
            return Err(PaycheckError::network("connection refused"));
        }
        Ok(())
    }

    fn issue(&self, device_id: &str) -> ActivationResult {
        let claims = claims_at(self.issued_at, device_id);
        ActivationResult {
            token: sign(&claims),
            license_exp: claims.license_exp,
            updates_exp: claims.updates_exp,
            tier: claims.tier,
            features: claims.features,
            activation_code: Some("PC-NEXT-CODE".into()),
            activation_code_expires_at: Some(now() + 1800),
        }
    }
}

#[async_trait]
impl Transport for FakeService {
    async fn activate(&self, request: &ActivateRequest) -> paycheck_sdk::Result<ActivationResult> {
        self.record("activate")?;
        if request.key != "PC-GOOD-KEY" {
            return Err(PaycheckError::with_status(
                ErrorCode::InvalidLicenseKey,
                "License not found",
                404,
            ));
        }
        Ok(self.issue(&request.device_id))
    }

    async fn redeem_code(&self, request: &RedeemRequest) -> paycheck_sdk::Result<ActivationResult> {
        self.record("redeem_code")?;
        Ok(self.issue(&request.device_id))
    }

    async fn refresh(&self, _token: &str) -> paycheck_sdk::Result<String> {
        self.record("refresh")?;
        Ok(self.issue(DEVICE_ID).token)
    }

    async fn deactivate(&self, _token: &str) -> paycheck_sdk::Result<DeactivateResult> {
        self.record("deactivate")?;
        Ok(DeactivateResult {
            deactivated: true,
            remaining_devices: 1,
        })
    }

    async fn validate(&self, _request: &ValidateRequest) -> paycheck_sdk::Result<OnlineValidation> {
        self.record("validate")?;
        let claims = claims_at(self.issued_at, DEVICE_ID);
        if *self.revoked.lock().unwrap() {
            return Ok(OnlineValidation {
                valid: false,
                reason: Some("License revoked".into()),
                license_exp: None,
                updates_exp: None,
            });
        }
        Ok(OnlineValidation {
            valid: true,
            reason: None,
            license_exp: claims.license_exp,
            updates_exp: claims.updates_exp,
        })
    }

    async fn license_info(&self, _public_key: &str, _token: &str) -> paycheck_sdk::Result<LicenseInfo> {
        self.record("license_info")?;
        Ok(serde_json::from_value(serde_json::json!({
            "status": "active",
            "created_at": now() - DAY,
            "expires_at": now() + 30 * DAY,
            "activation_count": 1,
            "activation_limit": 5,
            "device_count": 1,
            "device_limit": 3,
            "devices": []
        }))
        .unwrap())
    }

    async fn request_activation_code(
        &self,
        _request: &RequestCodeRequest,
    ) -> paycheck_sdk::Result<RequestCodeResult> {
        self.record("request_activation_code")?;
        Ok(RequestCodeResult {
            message: "Check your email".into(),
        })
    }
}
