//! Cryptographic primitives for offline token verification.

pub mod digest;
pub mod verify;
