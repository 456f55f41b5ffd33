//! The client-side payment constructor (§4.1): given server-supplied payment
//! requirements and a signing key, builds and signs an EIP-712 authorization
//! and encodes it into the `X-PAYMENT` transport header. Also drives the
//! optional request/retry loop against a resource URL.

use crate::chain_id::Eip155Network;
use crate::eip712::{self, DomainParams};
use crate::error::ClientError;
use crate::timestamp::UnixTimestamp;
use crate::types::{
    AmountU256, ExactPaymentPayload, PaymentPayload, PaymentRequiredResponse, PaymentRequirements,
    SchemePayload, X402_VERSION,
};
use crate::util::b64::Base64Bytes;
use alloy_primitives::{B256, U256};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use rand::RngCore;
use std::borrow::Cow;
use reqwest::StatusCode;
use reqwest::header::{HeaderValue, HeaderName};

/// Absorbs clock drift between client and verifier; matches the source
/// implementation's `valid_after = now - 10`.
const VALID_AFTER_SKEW_SECS: u64 = 10;

pub const X_PAYMENT: &str = "X-PAYMENT";
pub const X_PAYMENT_RESPONSE: &str = "X-PAYMENT-RESPONSE";

/// Builds and signs the EIP-712 authorization described by `requirements`,
/// returning the base64-encoded `X-PAYMENT` header value (§4.1).
pub fn create_payment(
    signer: &PrivateKeySigner,
    requirements: &PaymentRequirements,
    valid_duration_seconds: u64,
) -> Result<String, ClientError> {
    if !matches!(requirements.scheme, crate::types::Scheme::Exact) {
        return Err(ClientError::PaymentConstructionFailed(
            "only the exact scheme is supported".to_string(),
        ));
    }
    let network: Eip155Network = requirements.network.parse().map_err(|e| {
        ClientError::PaymentConstructionFailed(format!("invalid network: {e}"))
    })?;

    let now = UnixTimestamp::try_now()
        .map_err(|e| ClientError::PaymentConstructionFailed(e.to_string()))?;
    let valid_after = now - VALID_AFTER_SKEW_SECS;
    let valid_before = now + valid_duration_seconds;

    let mut nonce_bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut nonce_bytes);
    let nonce = B256::from(nonce_bytes);

    let from = signer.address();
    let to = requirements.pay_to;
    let value: U256 = requirements.max_amount_required.into();

    let domain = DomainParams {
        name: requirements.extra.name.clone(),
        version: requirements.extra.version.clone(),
        chain_id: network.chain_id,
        verifying_contract: requirements.asset,
    };
    let digest = eip712::signing_hash(
        &domain,
        from,
        to,
        value,
        valid_after.into(),
        valid_before.into(),
        nonce,
    );
    let signature = signer
        .sign_hash_sync(&digest)
        .map_err(|e| ClientError::PaymentConstructionFailed(e.to_string()))?;

    let exact = ExactPaymentPayload {
        from,
        to,
        value: AmountU256(value),
        valid_after,
        valid_before,
        nonce,
        v: if signature.v() { 28 } else { 27 },
        r: B256::from(signature.r().to_be_bytes()),
        s: B256::from(signature.s().to_be_bytes()),
    };

    let envelope = PaymentPayload {
        x402_version: X402_VERSION,
        scheme: requirements.scheme,
        network: requirements.network.clone(),
        payload: SchemePayload::Exact(exact),
    };
    let json = serde_json::to_vec(&envelope)
        .map_err(|e| ClientError::PaymentConstructionFailed(e.to_string()))?;
    Ok(Base64Bytes::encode(json).to_string())
}

/// Extracts and decodes the `X-PAYMENT-RESPONSE` header from a response, if
/// present (§4.1 `decodePaymentResponse`).
pub fn decode_payment_response(headers: &reqwest::header::HeaderMap) -> Option<serde_json::Value> {
    let header_name = HeaderName::from_static("x-payment-response");
    let value = headers.get(header_name)?;
    let raw = Base64Bytes(Cow::Borrowed(value.as_bytes())).decode().ok()?;
    serde_json::from_slice(&raw).ok()
}

/// Performs an initial request; on HTTP 402 with a parseable
/// `PaymentRequiredResponse`, signs `accepts[0]` and retries once with the
/// `X-PAYMENT` header attached (§4.1 `requestResource`).
pub async fn request_resource(
    client: &reqwest::Client,
    signer: &PrivateKeySigner,
    url: &str,
    valid_duration_seconds: u64,
) -> Result<reqwest::Response, ClientError> {
    let response = client.get(url).send().await?;
    if response.status() != StatusCode::PAYMENT_REQUIRED {
        return Ok(response);
    }

    let challenge: PaymentRequiredResponse = response
        .json()
        .await
        .map_err(|e| ClientError::PaymentConstructionFailed(format!("bad 402 body: {e}")))?;
    let requirements = challenge
        .accepts
        .first()
        .ok_or(ClientError::NoAcceptedMethods)?;

    let header_value = create_payment(signer, requirements, valid_duration_seconds)?;
    let response = client
        .get(url)
        .header(
            HeaderName::from_static("x-payment"),
            HeaderValue::from_str(&header_value)
                .map_err(|e| ClientError::PaymentConstructionFailed(e.to_string()))?,
        )
        .send()
        .await?;
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PaymentRequirementsExtra, Scheme};
    use alloy_primitives::Address;

    fn requirements() -> PaymentRequirements {
        PaymentRequirements {
            scheme: Scheme::Exact,
            network: "eip155:84532".to_string(),
            max_amount_required: AmountU256(U256::from(10_000u64)),
            resource: "/weather".to_string(),
            description: "weather data".to_string(),
            mime_type: "application/json".to_string(),
            output_schema: None,
            pay_to: Address::from([0xAAu8; 20]),
            max_timeout_seconds: 60,
            asset: Address::from([0xBBu8; 20]),
            extra: PaymentRequirementsExtra {
                name: "USDC".to_string(),
                version: "2".to_string(),
            },
        }
    }

    #[test]
    fn created_payment_round_trips_through_verifier() {
        let signer = PrivateKeySigner::random();
        let reqs = requirements();
        let header = create_payment(&signer, &reqs, 60).unwrap();
        let now = UnixTimestamp::try_now().unwrap();
        crate::verifier::verify_payment(&header, &reqs, now).unwrap();
    }

    #[test]
    fn created_payment_uses_ten_second_backdate() {
        let signer = PrivateKeySigner::random();
        let reqs = requirements();
        let header = create_payment(&signer, &reqs, 60).unwrap();
        let raw = Base64Bytes(Cow::Borrowed(header.as_bytes())).decode().unwrap();
        let envelope: PaymentPayload = serde_json::from_slice(&raw).unwrap();
        let exact = envelope.payload.as_exact().unwrap();
        let now = UnixTimestamp::try_now().unwrap();
        assert!(exact.valid_after.0 <= now.0 - 9);
        assert!(exact.valid_after.0 >= now.0 - 12);
    }
}
