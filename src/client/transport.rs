//! Transport seam between the lifecycle controller and the licensing service.

use crate::errors::Result;
use crate::protocol::models::{
    ActivateRequest, ActivationResult, DeactivateResult, LicenseInfo, OnlineValidation,
    RedeemRequest, RequestCodeRequest, RequestCodeResult, ValidateRequest,
};
use async_trait::async_trait;

/// Authenticated calls to the licensing service.
///
/// Errors carry an `ErrorCode`; connectivity failures use `NetworkError` or
/// `Timeout` so callers can tell "unreachable" from "refused". Retries are
/// the implementation's business, not the caller's.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Exchange a permanent license key for a device token.
    async fn activate(&self, request: &ActivateRequest) -> Result<ActivationResult>;

    /// Exchange a redemption code for a device token.
    async fn redeem_code(&self, request: &RedeemRequest) -> Result<ActivationResult>;

    /// Reissue `token`; returns the new token.
    async fn refresh(&self, token: &str) -> Result<String>;

    /// Release the device slot `token` is bound to.
    async fn deactivate(&self, token: &str) -> Result<DeactivateResult>;

    /// Ask the service whether a token id is still good.
    async fn validate(&self, request: &ValidateRequest) -> Result<OnlineValidation>;

    /// Fetch license details using `token` for authentication.
    async fn license_info(&self, public_key: &str, token: &str) -> Result<LicenseInfo>;

    /// Have an activation code mailed to the purchase email.
    async fn request_activation_code(
        &self,
        request: &RequestCodeRequest,
    ) -> Result<RequestCodeResult>;
}
