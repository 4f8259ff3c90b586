//! Network access to the licensing service.

pub mod http;
pub mod transport;
