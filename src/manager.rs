//! License Manager - the main public API for Paycheck.
//!
//! The `LicenseManager` owns the token slot and is its only writer:
//! - Offline checks (`validate`, `is_licensed`, ...) are synchronous
//! - Lifecycle operations (`activate`, `refresh_token`, ...) are async,
//!   bounded by the request timeout and cancellable through
//!   [`LicenseManager::cancel_pending`] or the shutdown token
//! - A token is persisted only after it has been received in full and
//!   verified, so a failed or cancelled operation leaves the slot untouched

use crate::client::http::HttpTransport;
use crate::client::transport::Transport;
use crate::clock::{Clock, SystemClock};
use crate::config::{PaycheckConfig, RefreshPolicy};
use crate::crypto::digest::token_fingerprint;
use crate::crypto::verify::SignatureVerifier;
use crate::device::{DefaultDeviceIdentity, DeviceIdentityProvider};
use crate::errors::{ErrorCode, InvalidReason, PaycheckError, Result};
use crate::policy::validation::{
    covers_version, has_feature, is_license_expired, is_token_stale, ValidationEngine,
    ValidationResult,
};
use crate::protocol::claims::{decode_token, DeviceType, LicenseClaims};
use crate::protocol::models::{
    ActivateRequest, ActivationResult, DeactivateResult, DeviceInfo, LicenseInfo,
    OnlineValidation, RedeemRequest, RequestCodeRequest, RequestCodeResult, ValidateRequest,
};
use crate::store::adapter::StorageAdapter;
use crate::store::file::FileStorage;
use crate::store::token::TokenStore;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;

/// Main license manager for Paycheck.
///
/// Create one instance per application and share it (e.g. in an `Arc`).
pub struct LicenseManager {
    config: PaycheckConfig,
    clock: Arc<dyn Clock>,
    engine: ValidationEngine,
    store: TokenStore,
    device: Arc<dyn DeviceIdentityProvider>,
    transport: Arc<dyn Transport>,
    shutdown: CancellationToken,
    pending: Mutex<CancellationToken>,
}

impl LicenseManager {
    /// Create a license manager with file storage and the HTTP transport.
    ///
    /// # Errors
    /// Returns an error if:
    /// - Configuration validation fails
    /// - HTTP client creation fails
    /// - The storage directory cannot be created
    pub fn new(config: PaycheckConfig) -> Result<Self> {
        config.validate()?;
        let storage = Arc::new(FileStorage::new(&config.storage_namespace)?);
        let transport = Arc::new(HttpTransport::new(&config)?);
        Self::with_parts(config, storage, transport)
    }

    /// Create a license manager from explicit collaborators.
    pub fn with_parts(
        config: PaycheckConfig,
        storage: Arc<dyn StorageAdapter>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        config.validate()?;

        let verifier = SignatureVerifier::new(&config.public_key)?;
        let engine = ValidationEngine::new(verifier).with_required_issuer(config.require_issuer);
        let device = Arc::new(DefaultDeviceIdentity::resolve(storage.as_ref(), &config)?);
        let store = TokenStore::load(storage);
        let shutdown = CancellationToken::new();

        Ok(Self {
            config,
            clock: Arc::new(SystemClock),
            engine,
            store,
            device,
            transport,
            pending: Mutex::new(shutdown.child_token()),
            shutdown,
        })
    }

    /// Replace the device identity provider.
    pub fn with_device(mut self, device: Arc<dyn DeviceIdentityProvider>) -> Self {
        self.device = device;
        self
    }

    /// Tie this manager to an application-wide shutdown token.
    ///
    /// Once `shutdown` is cancelled every network operation fails with
    /// `Cancelled` for the rest of the manager's life.
    pub fn with_cancellation(mut self, shutdown: CancellationToken) -> Self {
        self.pending = Mutex::new(shutdown.child_token());
        self.shutdown = shutdown;
        self
    }

    /// Use a custom clock (for testing).
    #[cfg(any(test, feature = "test-seams"))]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    // ==================== Offline ====================

    /// Evaluate the stored token offline.
    pub fn validate(&self) -> ValidationResult {
        self.evaluate(self.store.get().as_deref())
    }

    /// Quick check that a valid license is stored.
    pub fn is_licensed(&self) -> bool {
        self.validate().valid
    }

    /// Claims of the stored token, if its signature verifies.
    ///
    /// Also returned for expired or other-device tokens, for display.
    pub fn get_license(&self) -> Option<LicenseClaims> {
        self.validate().claims
    }

    /// Whether a valid license grants `feature`.
    pub fn has_feature(&self, feature: &str) -> bool {
        let result = self.validate();
        result.valid && result.claims.is_some_and(|c| has_feature(&c, feature))
    }

    /// Tier of the stored license.
    pub fn get_tier(&self) -> Option<String> {
        self.get_license().map(|c| c.tier)
    }

    /// Whether the stored license has lapsed. No license counts as expired.
    pub fn is_expired(&self) -> bool {
        let now = self.clock.now_unix();
        self.get_license()
            .map(|c| is_license_expired(&c, now))
            .unwrap_or(true)
    }

    /// Whether the stored license covers a release published at `timestamp`.
    pub fn covers_version(&self, timestamp: i64) -> bool {
        self.get_license()
            .map(|c| covers_version(&c, timestamp))
            .unwrap_or(false)
    }

    /// The stored token.
    pub fn get_token(&self) -> Option<String> {
        self.store.get()
    }

    /// Verify a token offline and store it if valid.
    ///
    /// Invalid tokens are reported in the verdict and never stored. The only
    /// error is a storage failure while persisting a valid token.
    pub fn import_token(&self, token: &str) -> Result<ValidationResult> {
        let token = token.trim();
        let verdict = self.evaluate(Some(token));
        if !verdict.valid {
            tracing::debug!(reason = ?verdict.reason, "import rejected");
            return Ok(verdict);
        }

        self.store.replace(token)?;
        tracing::info!(token = %token_fingerprint(token), "license token imported");
        Ok(verdict)
    }

    /// Remove the stored token.
    pub fn clear(&self) -> Result<()> {
        self.store.clear()?;
        tracing::info!("license token cleared");
        Ok(())
    }

    // ==================== Lifecycle ====================

    /// Activate this device with a license key.
    pub async fn activate(
        &self,
        license_key: &str,
        info: Option<DeviceInfo>,
    ) -> Result<ActivationResult> {
        if license_key.trim().is_empty() {
            return Err(PaycheckError::new(
                ErrorCode::InvalidLicenseKey,
                "License key is empty",
            ));
        }

        let request = ActivateRequest {
            project_id: self.config.project_id.clone(),
            public_key: self.config.public_key.clone(),
            key: license_key.trim().to_string(),
            device_id: self.device.device_id().to_string(),
            device_type: self.device.device_type(),
            device_name: info.and_then(|i| i.device_name),
        };

        let result = self.network(self.transport.activate(&request)).await?;
        self.commit_issued(&result.token, "activate")?;
        Ok(result)
    }

    /// Activate this device with a short-lived redemption code.
    pub async fn activate_with_code(
        &self,
        code: &str,
        info: Option<DeviceInfo>,
    ) -> Result<ActivationResult> {
        if code.trim().is_empty() {
            return Err(PaycheckError::new(ErrorCode::InvalidCode, "Code is empty"));
        }

        let request = RedeemRequest {
            public_key: self.config.public_key.clone(),
            code: code.trim().to_string(),
            device_id: self.device.device_id().to_string(),
            device_type: self.device.device_type(),
            device_name: info.and_then(|i| i.device_name),
        };

        let result = self.network(self.transport.redeem_code(&request)).await?;
        self.commit_issued(&result.token, "activate_with_code")?;
        Ok(result)
    }

    /// Have the service reissue the stored token.
    ///
    /// The new token must verify, stay bound to this device, and belong to
    /// the same license. It replaces the stored token only if no other
    /// operation changed the slot while the request was in flight.
    pub async fn refresh_token(&self) -> Result<String> {
        self.rotate(false).await
    }

    /// Refresh, skipping the `RotateOnly` check when the service has just
    /// confirmed the license is active.
    async fn rotate(&self, confirmed_active: bool) -> Result<String> {
        let current = self.store.get().ok_or_else(PaycheckError::no_token)?;
        let claims = decode_token(&current)
            .map_err(|_| PaycheckError::rejected(InvalidReason::MalformedToken))?
            .claims;

        if !confirmed_active
            && self.config.refresh_policy == RefreshPolicy::RotateOnly
            && is_license_expired(&claims, self.clock.now_unix())
        {
            return Err(PaycheckError::new(
                ErrorCode::LicenseExpired,
                "License has expired; refresh only rotates active licenses",
            ));
        }

        let issued = self.network(self.transport.refresh(&current)).await?;

        let verdict = self.evaluate(Some(&issued));
        let new_claims = match (verdict.valid, verdict.claims) {
            (true, Some(c)) => c,
            _ => {
                let reason = verdict.reason.unwrap_or(InvalidReason::MalformedToken);
                tracing::warn!(%reason, "refreshed token rejected");
                return Err(PaycheckError::rejected(reason));
            }
        };
        if new_claims.sub != claims.sub {
            return Err(PaycheckError::validation(
                "Refreshed token belongs to a different license",
            ));
        }

        if !self.store.replace_if_current(&current, &issued)? {
            return Err(PaycheckError::new(
                ErrorCode::TokenChanged,
                "Stored token changed during refresh",
            ));
        }

        tracing::info!(token = %token_fingerprint(&issued), "license token refreshed");
        Ok(issued)
    }

    /// Release this device's slot on the license.
    ///
    /// The stored token is cleared whether or not the service call succeeds.
    pub async fn deactivate(&self) -> Result<DeactivateResult> {
        let stored = self.store.get().ok_or_else(PaycheckError::no_token)?;
        let token = match self.fresh_token(&stored).await {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(error = %e, "refresh before deactivate failed, using stored token");
                stored
            }
        };

        let outcome = self.network(self.transport.deactivate(&token)).await;
        let cleared = self.store.clear();

        match outcome {
            Ok(result) => {
                cleared?;
                tracing::info!(
                    remaining_devices = result.remaining_devices,
                    "device deactivated"
                );
                Ok(result)
            }
            Err(e) => {
                if let Err(clear_error) = cleared {
                    tracing::warn!(error = %clear_error, "failed to clear token after deactivate error");
                }
                tracing::warn!(error = %e, "deactivate failed; local token cleared");
                Err(e)
            }
        }
    }

    /// Ask the service whether the stored token is still good.
    pub async fn validate_online(&self) -> Result<OnlineValidation> {
        let token = self.store.get().ok_or_else(PaycheckError::no_token)?;
        let claims = decode_token(&token)
            .map_err(|_| PaycheckError::rejected(InvalidReason::MalformedToken))?
            .claims;

        let request = ValidateRequest {
            public_key: self.config.public_key.clone(),
            jti: claims.jti,
        };
        self.network(self.transport.validate(&request)).await
    }

    /// Reconcile the stored token with the service.
    ///
    /// When the service answers, its verdict wins (it knows about
    /// revocation and renewals) and the result is `synced`. A renewal the
    /// service confirms is fetched with a refresh even under
    /// `RefreshPolicy::RotateOnly`. If that refresh fails the result carries
    /// the service's dates, but the stored token keeps its old ones, so
    /// offline checks such as `is_licensed` only pick up the renewal once a
    /// refresh succeeds.
    ///
    /// When the service cannot be reached the offline verdict is returned,
    /// marked `offline`. A cancelled sync returns the local verdict with
    /// neither flag set. This never fails.
    pub async fn sync(&self) -> ValidationResult {
        let now = self.clock.now_unix();
        let token = self.store.get();
        let local = self.evaluate(token.as_deref());

        // Nothing the service could say would make these valid.
        let claims = match (&local.reason, &local.claims) {
            (None | Some(InvalidReason::LicenseExpired), Some(claims)) => claims.clone(),
            _ => return local,
        };

        let request = ValidateRequest {
            public_key: self.config.public_key.clone(),
            jti: claims.jti.clone(),
        };

        match self.network(self.transport.validate(&request)).await {
            Ok(online) => self.reconcile(claims, online, now).await,
            Err(e) if e.code.is_connectivity() => {
                tracing::warn!(error = %e, "licensing service unreachable, using cached license");
                local
            }
            Err(e) if e.code == ErrorCode::Cancelled => {
                tracing::debug!("sync cancelled, using cached license");
                local.into_local_online()
            }
            Err(e) if e.code == ErrorCode::LicenseRevoked => {
                ValidationResult::invalid(InvalidReason::LicenseRevoked, Some(claims))
                    .into_synced()
            }
            Err(e) => {
                tracing::warn!(error = %e, "sync failed, using cached license");
                local.into_local_online()
            }
        }
    }

    /// Fetch license details, refreshing a stale token first.
    pub async fn get_license_info(&self) -> Result<LicenseInfo> {
        let stored = self.store.get().ok_or_else(PaycheckError::no_token)?;
        let token = self.fresh_token(&stored).await?;
        self.network(self.transport.license_info(&self.config.public_key, &token))
            .await
    }

    /// Have an activation code mailed to the purchase email.
    pub async fn request_activation_code(&self, email: &str) -> Result<RequestCodeResult> {
        let email = email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(PaycheckError::validation("Invalid email address"));
        }

        let request = RequestCodeRequest {
            public_key: self.config.public_key.clone(),
            email: email.to_string(),
        };
        self.network(self.transport.request_activation_code(&request))
            .await
    }

    // ==================== Accessors ====================

    /// This installation's device id.
    pub fn device_id(&self) -> &str {
        self.device.device_id()
    }

    /// How the device id was derived.
    pub fn device_type(&self) -> DeviceType {
        self.device.device_type()
    }

    /// The shutdown token. Cancelling it stops this manager's network
    /// operations for good; use [`cancel_pending`](Self::cancel_pending)
    /// to abort only the ones in flight.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Cancel the network operations currently in flight.
    ///
    /// Operations started afterwards run normally. Dropping an operation's
    /// future also cancels it; either way the store is left untouched.
    pub fn cancel_pending(&self) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        pending.cancel();
        *pending = self.shutdown.child_token();
        tracing::debug!("pending network operations cancelled");
    }

    /// Get the current configuration.
    pub fn config(&self) -> &PaycheckConfig {
        &self.config
    }

    // ==================== Internal ====================

    fn evaluate(&self, token: Option<&str>) -> ValidationResult {
        self.engine
            .evaluate(token, self.clock.now_unix(), self.device.device_id())
    }

    /// Verify a freshly issued token, then persist it.
    fn commit_issued(&self, token: &str, operation: &'static str) -> Result<ValidationResult> {
        let verdict = self.evaluate(Some(token));
        if let Some(reason) = verdict.reason {
            tracing::warn!(operation, %reason, "issued token rejected, store untouched");
            return Err(PaycheckError::rejected(reason));
        }

        self.store.replace(token)?;
        tracing::info!(operation, token = %token_fingerprint(token), "license token stored");
        Ok(verdict)
    }

    /// `stored`, or a refreshed token if auto-refresh is on and it is stale.
    async fn fresh_token(&self, stored: &str) -> Result<String> {
        if !self.config.auto_refresh {
            return Ok(stored.to_string());
        }
        match decode_token(stored) {
            Ok(decoded) if is_token_stale(&decoded.claims, self.clock.now_unix()) => {
                self.refresh_token().await
            }
            _ => Ok(stored.to_string()),
        }
    }

    /// Apply a service verdict to the cached claims.
    async fn reconcile(
        &self,
        claims: LicenseClaims,
        online: OnlineValidation,
        now: i64,
    ) -> ValidationResult {
        if !online.valid {
            let reason = match online.reason.as_deref() {
                Some(r) if r.to_lowercase().contains("expired") => InvalidReason::LicenseExpired,
                _ => InvalidReason::LicenseRevoked,
            };
            tracing::info!(%reason, "licensing service rejected license");
            return ValidationResult::invalid(reason, Some(claims)).into_synced();
        }

        let active = !online.license_exp.is_some_and(|exp| now > exp);
        let dates_changed =
            online.license_exp != claims.license_exp || online.updates_exp != claims.updates_exp;
        let mut claims = claims;
        if dates_changed || is_token_stale(&claims, now) {
            match self.rotate(active).await {
                Ok(token) => {
                    if let Ok(decoded) = decode_token(&token) {
                        claims = decoded.claims;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "refresh during sync failed");
                    claims.license_exp = online.license_exp;
                    claims.updates_exp = online.updates_exp;
                }
            }
        }

        if !active {
            return ValidationResult::invalid(InvalidReason::LicenseExpired, Some(claims))
                .into_synced();
        }
        ValidationResult::valid(claims).into_synced()
    }

    /// Run a network future under the request timeout and the pending
    /// cancellation token.
    async fn network<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        let cancel = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(PaycheckError::cancelled()),
            outcome = tokio::time::timeout(self.config.request_timeout, call) => {
                outcome.unwrap_or_else(|_| Err(PaycheckError::timeout()))
            }
        }
    }
}

impl std::fmt::Debug for LicenseManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LicenseManager")
            .field("base_url", &self.config.base_url)
            .field("device_id", &self.device.device_id())
            .field("device_type", &self.device.device_type())
            .field("store", &self.store)
            .finish()
    }
}
