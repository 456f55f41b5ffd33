//! The `Facilitator` trait and its local (in-process) implementation,
//! wiring the pure [`crate::verifier`] together with the stateful
//! [`crate::settler::Settler`].

use crate::settler::Settler;
use crate::timestamp::UnixTimestamp;
use crate::types::{
    PaymentRequirements, Scheme, SettlementResponse, SupportedKind, SupportedResponse,
    VerificationResponse,
};
use crate::verifier;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

#[async_trait]
pub trait Facilitator: Send + Sync {
    async fn verify(
        &self,
        header_base64: &str,
        requirements: &PaymentRequirements,
    ) -> VerificationResponse;

    async fn settle(
        &self,
        header_base64: &str,
        requirements: &PaymentRequirements,
    ) -> SettlementResponse;

    fn supported(&self) -> SupportedResponse;
}

pub struct LocalFacilitator {
    settler: Arc<Settler>,
    network: String,
    /// Facilitator-side settlement confirmation timeout; §4.4 default 120s.
    settlement_timeout: Duration,
}

impl LocalFacilitator {
    pub fn new(settler: Arc<Settler>, network: String, settlement_timeout: Duration) -> Self {
        LocalFacilitator {
            settler,
            network,
            settlement_timeout,
        }
    }

    /// §4.3 step 7: `now` is the chain tip's block timestamp, not local wall
    /// clock. Falls back to wall clock only if the RPC call itself fails,
    /// so a transient provider hiccup rejects payments rather than wedging.
    async fn now(&self) -> UnixTimestamp {
        match self.settler.chain_timestamp().await {
            Ok(now) => now,
            Err(e) => {
                tracing::warn!(error = %e, "chain timestamp unavailable; falling back to wall clock");
                UnixTimestamp::try_now().expect("system clock before unix epoch")
            }
        }
    }
}

#[async_trait]
impl Facilitator for LocalFacilitator {
    #[instrument(skip_all, fields(resource = %requirements.resource))]
    async fn verify(
        &self,
        header_base64: &str,
        requirements: &PaymentRequirements,
    ) -> VerificationResponse {
        match verifier::verify_payment(header_base64, requirements, self.now().await) {
            Ok(()) => VerificationResponse::valid(),
            Err(e) => VerificationResponse::invalid(e.reason()),
        }
    }

    #[instrument(skip_all, fields(resource = %requirements.resource))]
    async fn settle(
        &self,
        header_base64: &str,
        requirements: &PaymentRequirements,
    ) -> SettlementResponse {
        if let Err(e) = verifier::verify_payment(header_base64, requirements, self.now().await) {
            return SettlementResponse::failed(format!("Verification failed: {}", e.reason()));
        }

        let raw = match crate::util::b64::Base64Bytes(std::borrow::Cow::Borrowed(
            header_base64.as_bytes(),
        ))
        .decode()
        {
            Ok(raw) => raw,
            Err(e) => return SettlementResponse::failed(format!("invalid base64: {e}")),
        };
        let envelope: crate::types::PaymentPayload = match serde_json::from_slice(&raw) {
            Ok(envelope) => envelope,
            Err(e) => return SettlementResponse::failed(format!("invalid json: {e}")),
        };
        let exact = match envelope.payload.as_exact() {
            Some(exact) => exact,
            None => return SettlementResponse::failed("missing exact payload"),
        };

        match self
            .settler
            .settle_payment(exact, requirements, true, self.settlement_timeout)
            .await
        {
            Ok(outcome) => {
                SettlementResponse::settled(outcome.tx_hash, requirements.network.clone())
            }
            Err(e) => {
                if e.is_transport() {
                    tracing::error!(error = %e, "settlement failed due to RPC transport error");
                }
                match e.tx_hash() {
                    Some(tx_hash) => SettlementResponse {
                        success: false,
                        error: Some(e.reason()),
                        tx_hash: Some(tx_hash.to_string()),
                        network_id: Some(requirements.network.clone()),
                    },
                    None => SettlementResponse::failed(e.reason()),
                }
            }
        }
    }

    fn supported(&self) -> SupportedResponse {
        SupportedResponse {
            kinds: vec![SupportedKind {
                scheme: Scheme::Exact,
                network: self.network.clone(),
            }],
        }
    }
}
