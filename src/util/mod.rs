//! Utility types and functions for the facilitator.
//!
//! - [`b64`] - Base64 encoding/decoding utilities
//! - [`money_amount`] - Human-readable currency amount parsing

pub mod b64;
pub mod money_amount;
