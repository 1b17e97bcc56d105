//! Inbound HTTP Basic authorization and redacted secret handling.

pub mod basic;
pub mod secret;

pub use basic::*;
pub use secret::*;
