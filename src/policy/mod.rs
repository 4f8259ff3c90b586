//! License policy: offline evaluation of tokens.

pub mod validation;
