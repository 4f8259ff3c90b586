//! # Paycheck SDK
//!
//! **Offline-first license verification and device lifecycle for Rust apps.**
//!
//! A device holds one signed license token. Every check (`validate`,
//! `is_licensed`, `has_feature`, ...) verifies that token locally with the
//! product's Ed25519 public key, so a licensed app keeps working with no
//! network at all. The network is only used to move the token through its
//! lifecycle: activate, refresh, sync and deactivate.
//!
//! ## Features
//!
//! - **Ed25519 token verification** against an embedded public key
//! - **Device binding** via a stable per-install device id
//! - **Atomic token storage** - a token is written only after it verifies
//! - **Online sync** with fallback to the cached verdict when unreachable
//! - **Cancellable, time-bounded** network operations
//!
//! ## Quickstart
//!
//! ```no_run
//! use paycheck_sdk::{LicenseManager, PaycheckConfig};
//!
//! # async fn run() -> Result<(), paycheck_sdk::PaycheckError> {
//! let config = PaycheckConfig::new("base64-ed25519-public-key")
//!     .with_base_url("https://pay.example.com");
//! let manager = LicenseManager::new(config)?;
//!
//! if !manager.is_licensed() {
//!     manager.activate("PC-XXXX-XXXX", None).await?;
//! }
//!
//! let result = manager.sync().await;
//! if result.valid && manager.has_feature("export") {
//!     println!("tier: {:?} (offline: {})", manager.get_tier(), result.offline);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Threat Model
//!
//! Forged or edited tokens are rejected (signature mismatch), and a token
//! copied from another machine fails the device check. The SDK does
//! **not** prevent binary patching; client-side licensing can always be
//! bypassed by a determined attacker with access to the binary.

#![warn(missing_docs)]
#![doc(html_root_url = "https://docs.rs/paycheck-sdk/0.3.0")]

// Core modules
pub mod clock;
pub mod config;
pub mod errors;

// Crypto layer
pub mod crypto;

// Protocol layer
pub mod protocol;

// Storage layer
pub mod store;

// Device identity
pub mod device;

// Policy layer
pub mod policy;

// Client layer
pub mod client;

// Manager (main public API)
pub mod manager;

#[cfg(test)]
mod testing;

// Re-exports for public API
pub use client::http::HttpTransport;
pub use client::transport::Transport;
pub use clock::{Clock, SystemClock};
pub use config::{PaycheckConfig, RefreshPolicy};
pub use device::{DefaultDeviceIdentity, DeviceIdentityProvider};
pub use errors::{ErrorCode, InvalidReason, PaycheckError, Result};
pub use manager::LicenseManager;
pub use policy::validation::{ValidationEngine, ValidationResult};
pub use protocol::claims::{DeviceType, LicenseClaims};
pub use protocol::models::{
    ActivationResult, DeactivateResult, DeviceInfo, LicenseInfo, LicenseStatus,
    OnlineValidation, RequestCodeResult,
};
pub use store::adapter::{MemoryStorage, StorageAdapter};
pub use store::file::FileStorage;

#[cfg(any(test, feature = "test-seams"))]
pub use clock::MockClock;
