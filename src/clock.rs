//! Deterministic clock abstraction for testable expiry logic.

use chrono::{DateTime, Utc};

/// Clock trait for deterministic time in tests.
pub trait Clock: Send + Sync {
    /// Get the current UTC time.
    fn now_utc(&self) -> DateTime<Utc>;

    /// Current time as a Unix timestamp (seconds), the unit token claims use.
    fn now_unix(&self) -> i64 {
        self.now_utc().timestamp()
    }
}

/// System clock using actual wall time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Mock clock for deterministic testing.
///
/// Interior mutability lets a test advance a clock that is already shared
/// with a `LicenseManager` behind an `Arc`.
#[cfg(any(test, feature = "test-seams"))]
#[derive(Debug)]
pub struct MockClock {
    now: std::sync::atomic::AtomicI64,
}

#[cfg(any(test, feature = "test-seams"))]
impl MockClock {
    /// Create a mock clock frozen at the given time.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self::from_unix(now.timestamp())
    }

    /// Create a mock clock frozen at a Unix timestamp.
    pub fn from_unix(secs: i64) -> Self {
        Self {
            now: std::sync::atomic::AtomicI64::new(secs),
        }
    }

    /// Create a mock clock from an RFC 3339 string.
    pub fn from_rfc3339(s: &str) -> Self {
        let now = DateTime::parse_from_rfc3339(s)
            .expect("valid RFC 3339")
            .with_timezone(&Utc);
        Self::new(now)
    }

    /// Advance the clock by a duration.
    pub fn advance(&self, duration: chrono::Duration) {
        self.now.fetch_add(
            duration.num_seconds(),
            std::sync::atomic::Ordering::SeqCst,
        );
    }

    /// Jump to an absolute Unix timestamp.
    pub fn set_unix(&self, secs: i64) {
        self.now.store(secs, std::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(any(test, feature = "test-seams"))]
impl Clock for MockClock {
    fn now_utc(&self) -> DateTime<Utc> {
        let secs = self.now.load(std::sync::atomic::Ordering::SeqCst);
        DateTime::from_timestamp(secs, 0).unwrap_or_default()
    }

    fn now_unix(&self) -> i64 {
        self.now.load(std::sync::atomic::Ordering::SeqCst)
    }
}
