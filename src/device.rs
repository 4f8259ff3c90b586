//! Device identity.
//!
//! A device id is generated once, persisted under `paycheck:device_id`, and
//! reused for every activation and offline check afterwards.

use crate::config::PaycheckConfig;
use crate::crypto::digest::sha256_hex;
use crate::errors::{PaycheckError, Result};
use crate::protocol::claims::DeviceType;
use crate::store::adapter::{keys, StorageAdapter};

/// Supplies the identity tokens are bound to.
pub trait DeviceIdentityProvider: Send + Sync {
    /// Stable device id.
    fn device_id(&self) -> &str;

    /// How the id was derived.
    fn device_type(&self) -> DeviceType;
}

/// Identity resolved from config, storage, or the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultDeviceIdentity {
    id: String,
    device_type: DeviceType,
}

impl DefaultDeviceIdentity {
    /// Use a fixed identity.
    pub fn fixed(id: impl Into<String>, device_type: DeviceType) -> Self {
        Self {
            id: id.into(),
            device_type,
        }
    }

    /// Resolve the identity for this installation.
    ///
    /// Order: configured override, then the persisted id, then a freshly
    /// generated one (which is persisted before returning).
    pub fn resolve(storage: &dyn StorageAdapter, config: &PaycheckConfig) -> Result<Self> {
        if let Some(id) = &config.device_id {
            return Ok(Self::fixed(id.clone(), config.device_type));
        }

        if let Some(id) = storage.get(keys::DEVICE_ID).filter(|id| !id.is_empty()) {
            return Ok(Self::fixed(id, config.device_type));
        }

        let id = match config.device_type {
            DeviceType::Machine => get_machine_id().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "machine id unavailable, using random device id");
                generate_uuid()
            }),
            DeviceType::Uuid | DeviceType::Unknown => generate_uuid(),
        };

        storage.set(keys::DEVICE_ID, &id)?;
        tracing::info!(device_type = %config.device_type, "generated device id");
        Ok(Self::fixed(id, config.device_type))
    }
}

impl DeviceIdentityProvider for DefaultDeviceIdentity {
    fn device_id(&self) -> &str {
        &self.id
    }

    fn device_type(&self) -> DeviceType {
        self.device_type
    }
}

/// Generate a random UUID v4.
pub fn generate_uuid() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Stable, hashed machine id. The raw hardware id never leaves this function.
pub fn get_machine_id() -> Result<String> {
    let raw = raw_machine_id()?;
    let digest = sha256_hex(raw.as_bytes());
    Ok(format!("machine-{}", &digest[..32]))
}

#[cfg(target_os = "linux")]
fn raw_machine_id() -> Result<String> {
    for path in ["/etc/machine-id", "/var/lib/dbus/machine-id"] {
        if let Ok(id) = std::fs::read_to_string(path) {
            let id = id.trim();
            if !id.is_empty() {
                return Ok(id.to_string());
            }
        }
    }
    Err(PaycheckError::validation(
        "Could not determine machine ID. Try DeviceType::Uuid instead.",
    ))
}

#[cfg(target_os = "macos")]
fn raw_machine_id() -> Result<String> {
    let output = std::process::Command::new("ioreg")
        .args(["-rd1", "-c", "IOPlatformExpertDevice"])
        .output()
        .map_err(|e| PaycheckError::validation(format!("Failed to run ioreg: {}", e)))?;
    let stdout = String::from_utf8_lossy(&output.stdout);

    stdout
        .lines()
        .find(|line| line.contains("IOPlatformUUID"))
        .and_then(|line| line.rsplit('"').nth(1))
        .filter(|id| !id.is_empty())
        .map(String::from)
        .ok_or_else(|| PaycheckError::validation("IOPlatformUUID not found"))
}

#[cfg(target_os = "windows")]
fn raw_machine_id() -> Result<String> {
    let output = std::process::Command::new("reg")
        .args([
            "query",
            r"HKLM\SOFTWARE\Microsoft\Cryptography",
            "/v",
            "MachineGuid",
        ])
        .output()
        .map_err(|e| PaycheckError::validation(format!("Failed to query registry: {}", e)))?;
    let stdout = String::from_utf8_lossy(&output.stdout);

    stdout
        .lines()
        .find(|line| line.contains("MachineGuid"))
        .and_then(|line| line.split_whitespace().last())
        .map(String::from)
        .ok_or_else(|| PaycheckError::validation("MachineGuid not found"))
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
fn raw_machine_id() -> Result<String> {
    Err(PaycheckError::validation(
        "Machine ID not supported on this platform. Use DeviceType::Uuid instead.",
    ))
}
