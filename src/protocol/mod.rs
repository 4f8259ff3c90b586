//! Token format and licensing service wire types.

pub mod claims;
pub mod models;
