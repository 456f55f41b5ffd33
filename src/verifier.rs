//! The facilitator verifier (§4.3): a pure function of `(header, requirements,
//! now)`. Holds no state of its own; the caller supplies `now` so the same
//! logic is unit-testable without a live chain.

use crate::chain_id::Eip155Network;
use crate::eip712::{self, DomainParams};
use crate::error::VerificationError;
use crate::timestamp::UnixTimestamp;
use crate::types::{PaymentPayload, PaymentRequirements, X402_VERSION};
use crate::util::b64::Base64Bytes;
use alloy_primitives::{Address, Signature};
use std::borrow::Cow;
use tracing::instrument;

/// Runs every check in §4.3, in order, first failure wins.
#[instrument(skip_all, fields(resource = %requirements.resource, network = %requirements.network))]
pub fn verify_payment(
    header_base64: &str,
    requirements: &PaymentRequirements,
    now: UnixTimestamp,
) -> Result<(), VerificationError> {
    // 1. base64 decode, JSON parse.
    let raw = Base64Bytes(Cow::Borrowed(header_base64.as_bytes()))
        .decode()
        .map_err(|e| VerificationError::Malformed(format!("invalid base64: {e}")))?;
    let envelope: PaymentPayload = serde_json::from_slice(&raw)
        .map_err(|e| VerificationError::Malformed(format!("invalid json: {e}")))?;

    // 2. x402Version.
    if envelope.x402_version != X402_VERSION {
        return Err(VerificationError::Malformed(format!(
            "unsupported x402Version: {}",
            envelope.x402_version
        )));
    }

    // 3. scheme/network match.
    if envelope.scheme != requirements.scheme {
        return Err(VerificationError::SchemeMismatch {
            expected: requirements.scheme.to_string(),
            actual: envelope.scheme.to_string(),
        });
    }
    if envelope.network != requirements.network {
        return Err(VerificationError::NetworkMismatch {
            expected: requirements.network.clone(),
            actual: envelope.network.clone(),
        });
    }

    // 4. decode inner exact payload.
    let exact = envelope
        .payload
        .as_exact()
        .ok_or_else(|| VerificationError::Malformed("missing exact payload".to_string()))?;

    // 5. recipient binding.
    if exact.to != requirements.pay_to {
        return Err(VerificationError::RecipientMismatch {
            expected: requirements.pay_to.to_string(),
            actual: exact.to.to_string(),
        });
    }

    // 6. exact amount.
    let required_value: alloy_primitives::U256 = requirements.max_amount_required.into();
    let actual_value: alloy_primitives::U256 = exact.value.into();
    if actual_value != required_value {
        return Err(VerificationError::AmountMismatch {
            expected: required_value.to_string(),
            actual: actual_value.to_string(),
        });
    }

    // 7. time window.
    if now < exact.valid_after || now > exact.valid_before {
        return Err(VerificationError::TimeWindow(format!(
            "now={now} not in [{}, {}]",
            exact.valid_after, exact.valid_before
        )));
    }

    // 8. domain parameters present; chain id parses from network.
    if requirements.extra.name.is_empty() || requirements.extra.version.is_empty() {
        return Err(VerificationError::MissingDomainParams(
            "extra.name/version required for the exact scheme".to_string(),
        ));
    }
    let network: Eip155Network = requirements
        .network
        .parse()
        .map_err(|e| VerificationError::MissingDomainParams(format!("{e}")))?;

    // 9. reconstruct digest, recover signer, compare to `from`.
    if !(27..=28).contains(&exact.v) {
        return Err(VerificationError::SignatureInvalid(format!(
            "v must be 27 or 28, got {}",
            exact.v
        )));
    }
    let domain = DomainParams {
        name: requirements.extra.name.clone(),
        version: requirements.extra.version.clone(),
        chain_id: network.chain_id,
        verifying_contract: requirements.asset,
    };
    let digest = eip712::signing_hash(
        &domain,
        exact.from,
        exact.to,
        actual_value,
        exact.valid_after.into(),
        exact.valid_before.into(),
        exact.nonce,
    );
    let signature = Signature::new(
        alloy_primitives::U256::from_be_bytes(exact.r.0),
        alloy_primitives::U256::from_be_bytes(exact.s.0),
        exact.v == 28,
    );
    let recovered: Address = signature
        .recover_address_from_prehash(&digest)
        .map_err(|e| VerificationError::SignatureInvalid(format!("recovery failed: {e}")))?;
    if recovered != exact.from {
        return Err(VerificationError::SignatureInvalid(format!(
            "recovered {recovered} does not match from {}",
            exact.from
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AmountU256, ExactPaymentPayload, PaymentRequirementsExtra, Scheme, SchemePayload};
    use alloy_primitives::{Address, B256, U256};
    use alloy_signer::SignerSync;
    use alloy_signer_local::PrivateKeySigner;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD as b64;

    fn signed_header(
        signer: &PrivateKeySigner,
        requirements: &PaymentRequirements,
        from: Address,
        value: U256,
        valid_after: u64,
        valid_before: u64,
        nonce: B256,
    ) -> String {
        let network: Eip155Network = requirements.network.parse().unwrap();
        let domain = DomainParams {
            name: requirements.extra.name.clone(),
            version: requirements.extra.version.clone(),
            chain_id: network.chain_id,
            verifying_contract: requirements.asset,
        };
        let digest = eip712::signing_hash(
            &domain,
            from,
            requirements.pay_to,
            value,
            U256::from(valid_after),
            U256::from(valid_before),
            nonce,
        );
        let sig = signer.sign_hash_sync(&digest).unwrap();
        let exact = ExactPaymentPayload {
            from,
            to: requirements.pay_to,
            value: AmountU256(value),
            valid_after: UnixTimestamp(valid_after),
            valid_before: UnixTimestamp(valid_before),
            nonce,
            v: if sig.v() { 28 } else { 27 },
            r: B256::from(sig.r().to_be_bytes()),
            s: B256::from(sig.s().to_be_bytes()),
        };
        let envelope = PaymentPayload {
            x402_version: X402_VERSION,
            scheme: requirements.scheme,
            network: requirements.network.clone(),
            payload: SchemePayload::Exact(exact),
        };
        let json = serde_json::to_vec(&envelope).unwrap();
        b64.encode(json)
    }

    fn base_requirements(pay_to: Address, asset: Address) -> PaymentRequirements {
        PaymentRequirements {
            scheme: Scheme::Exact,
            network: "eip155:84532".to_string(),
            max_amount_required: AmountU256(U256::from(10_000u64)),
            resource: "/weather".to_string(),
            description: "weather data".to_string(),
            mime_type: "application/json".to_string(),
            output_schema: None,
            pay_to,
            max_timeout_seconds: 60,
            asset,
            extra: PaymentRequirementsExtra {
                name: "USDC".to_string(),
                version: "2".to_string(),
            },
        }
    }

    #[test]
    fn happy_path_is_valid_within_window() {
        let signer = PrivateKeySigner::random();
        let requirements = base_requirements(Address::from([0xAAu8; 20]), Address::from([0xBBu8; 20]));
        let now = UnixTimestamp(1_700_000_100);
        let header = signed_header(
            &signer,
            &requirements,
            signer.address(),
            U256::from(10_000u64),
            now.0 - 50,
            now.0 + 50,
            B256::from([0x01u8; 32]),
        );
        verify_payment(&header, &requirements, now).unwrap();
    }

    #[test]
    fn amount_tamper_is_rejected() {
        let signer = PrivateKeySigner::random();
        let requirements = base_requirements(Address::from([0xAAu8; 20]), Address::from([0xBBu8; 20]));
        let now = UnixTimestamp(1_700_000_100);
        let header = signed_header(
            &signer,
            &requirements,
            signer.address(),
            U256::from(5_000u64),
            now.0 - 50,
            now.0 + 50,
            B256::from([0x02u8; 32]),
        );
        let err = verify_payment(&header, &requirements, now).unwrap_err();
        assert!(matches!(err, VerificationError::AmountMismatch { .. }));
    }

    #[test]
    fn expired_window_is_rejected() {
        let signer = PrivateKeySigner::random();
        let requirements = base_requirements(Address::from([0xAAu8; 20]), Address::from([0xBBu8; 20]));
        let now = UnixTimestamp(1_700_000_100);
        let header = signed_header(
            &signer,
            &requirements,
            signer.address(),
            U256::from(10_000u64),
            now.0 - 500,
            now.0 - 10,
            B256::from([0x03u8; 32]),
        );
        let err = verify_payment(&header, &requirements, now).unwrap_err();
        assert!(matches!(err, VerificationError::TimeWindow(_)));
    }

    #[test]
    fn recipient_tamper_is_rejected() {
        let signer = PrivateKeySigner::random();
        let mut requirements = base_requirements(Address::from([0xAAu8; 20]), Address::from([0xBBu8; 20]));
        let now = UnixTimestamp(1_700_000_100);
        let header = signed_header(
            &signer,
            &requirements,
            signer.address(),
            U256::from(10_000u64),
            now.0 - 50,
            now.0 + 50,
            B256::from([0x04u8; 32]),
        );
        requirements.pay_to = Address::from([0xCCu8; 20]);
        let err = verify_payment(&header, &requirements, now).unwrap_err();
        assert!(matches!(err, VerificationError::RecipientMismatch { .. }));
    }

    #[test]
    fn tampering_with_base64_bytes_invalidates_signature() {
        let signer = PrivateKeySigner::random();
        let requirements = base_requirements(Address::from([0xAAu8; 20]), Address::from([0xBBu8; 20]));
        let now = UnixTimestamp(1_700_000_100);
        let header = signed_header(
            &signer,
            &requirements,
            signer.address(),
            U256::from(10_000u64),
            now.0 - 50,
            now.0 + 50,
            B256::from([0x05u8; 32]),
        );
        let raw = b64.decode(&header).unwrap();
        let mut envelope: PaymentPayload = serde_json::from_slice(&raw).unwrap();
        let SchemePayload::Exact(ref mut exact) = envelope.payload;
        exact.value = AmountU256(U256::from(10_001u64));
        let tampered = b64.encode(serde_json::to_vec(&envelope).unwrap());
        let err = verify_payment(&tampered, &requirements, now).unwrap_err();
        assert!(matches!(
            err,
            VerificationError::AmountMismatch { .. } | VerificationError::SignatureInvalid(_)
        ));
    }
}
