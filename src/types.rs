//! Wire data model for the x402 protocol: the canonical payment requirements,
//! the signed EIP-3009 authorization, the envelope that carries it over HTTP,
//! and the facilitator's verify/settle request and response bodies.
//!
//! Every struct here is `camelCase` on the wire, matching spec.md §3 exactly
//! (`validAfter`, not `valid_after`) even though Rust field names stay
//! `snake_case`. This matters beyond readability: `ExactPaymentPayload` is
//! also the EIP-712 struct signed by the client, so its wire shape is load-
//! bearing protocol surface, not just an API nicety.

use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fmt::Display;
use std::str::FromStr;

pub const X402_VERSION: u32 = 1;

/// A u256 value serialized on the wire as a decimal ASCII string, per spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AmountU256(pub U256);

impl From<U256> for AmountU256 {
    fn from(value: U256) -> Self {
        AmountU256(value)
    }
}

impl From<AmountU256> for U256 {
    fn from(value: AmountU256) -> Self {
        value.0
    }
}

impl Display for AmountU256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for AmountU256 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for AmountU256 {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let value = U256::from_str(&s)
            .map_err(|e| serde::de::Error::custom(format!("invalid u256 '{s}': {e}")))?;
        Ok(AmountU256(value))
    }
}

/// The only payment scheme this facilitator understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Exact,
}

impl Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scheme::Exact => write!(f, "exact"),
        }
    }
}

/// Extra, scheme-specific data a `PaymentRequirements` carries. For `exact`
/// this is mandatory: the token contract's EIP-712 domain name and version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequirementsExtra {
    pub name: String,
    pub version: String,
}

/// The server's payment challenge: what is being asked for, and how to pay it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    pub scheme: Scheme,
    /// CAIP-2 chain identifier, e.g. `eip155:84532`.
    pub network: String,
    pub max_amount_required: AmountU256,
    pub resource: String,
    pub description: String,
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<serde_json::Value>,
    pub pay_to: Address,
    pub max_timeout_seconds: u64,
    pub asset: Address,
    pub extra: PaymentRequirementsExtra,
}

/// A server-minted 402 body: "here is how you may pay for this resource".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequiredResponse {
    pub x402_version: u32,
    pub accepts: Vec<PaymentRequirements>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The signed EIP-3009 `transferWithAuthorization` authorization: exactly the
/// fields that are EIP-712 hashed, plus the recoverable `(v, r, s)` signature.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactPaymentPayload {
    pub from: Address,
    pub to: Address,
    pub value: AmountU256,
    pub valid_after: crate::timestamp::UnixTimestamp,
    pub valid_before: crate::timestamp::UnixTimestamp,
    pub nonce: B256,
    pub v: u8,
    pub r: B256,
    pub s: B256,
}

/// The scheme-dependent inner payload of a [`PaymentPayload`]. `exact` is the
/// only arm today; future schemes extend by adding arms, not by loosening
/// the type of `payload` back to an untyped JSON value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SchemePayload {
    Exact(ExactPaymentPayload),
}

impl SchemePayload {
    pub fn as_exact(&self) -> Option<&ExactPaymentPayload> {
        match self {
            SchemePayload::Exact(p) => Some(p),
        }
    }
}

/// The outer envelope carried, base64-of-JSON, in the `X-PAYMENT` header.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    pub x402_version: u32,
    pub scheme: Scheme,
    pub network: String,
    pub payload: SchemePayload,
}

/// Facilitator input for `/verify` and the verify-then-settle step of `/settle`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationRequest {
    pub x402_version: u32,
    pub payment_header: String,
    pub payment_requirements: PaymentRequirements,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResponse {
    pub is_valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalid_reason: Option<String>,
}

impl VerificationResponse {
    pub fn valid() -> Self {
        VerificationResponse {
            is_valid: true,
            invalid_reason: None,
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        VerificationResponse {
            is_valid: false,
            invalid_reason: Some(reason.into()),
        }
    }
}

/// Facilitator input for `/settle`: identical shape to [`VerificationRequest`].
pub type SettlementRequest = VerificationRequest;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_id: Option<String>,
}

impl SettlementResponse {
    pub fn failed(error: impl Into<String>) -> Self {
        SettlementResponse {
            success: false,
            error: Some(error.into()),
            tx_hash: None,
            network_id: None,
        }
    }

    pub fn settled(tx_hash: B256, network_id: impl Into<String>) -> Self {
        SettlementResponse {
            success: true,
            error: None,
            tx_hash: Some(tx_hash.to_string()),
            network_id: Some(network_id.into()),
        }
    }
}

/// One `(scheme, network)` pair the facilitator is willing to settle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupportedKind {
    pub scheme: Scheme,
    pub network: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupportedResponse {
    pub kinds: Vec<SupportedKind>,
}

/// Receipt attached to the resource-server response as `X-PAYMENT-RESPONSE`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentExecutedReceipt {
    pub tx_hash: String,
    pub network_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_u256_round_trips_through_json() {
        let amount = AmountU256(U256::from(10_000u64));
        let json = serde_json::to_string(&amount).unwrap();
        assert_eq!(json, "\"10000\"");
        let back: AmountU256 = serde_json::from_str(&json).unwrap();
        assert_eq!(back, amount);
    }

    #[test]
    fn payment_payload_uses_from_field_name() {
        let payload = ExactPaymentPayload {
            from: Address::ZERO,
            to: Address::ZERO,
            value: AmountU256(U256::from(1u64)),
            valid_after: crate::timestamp::UnixTimestamp(0),
            valid_before: crate::timestamp::UnixTimestamp(1),
            nonce: B256::ZERO,
            v: 27,
            r: B256::ZERO,
            s: B256::ZERO,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert!(json.get("from").is_some());
    }
}
