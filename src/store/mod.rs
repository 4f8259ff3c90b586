//! Persistence: the storage seam, its backends, and the token slot.

pub mod adapter;
pub mod file;
pub mod token;
