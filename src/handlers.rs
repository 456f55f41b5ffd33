//! HTTP endpoints implemented by the x402 facilitator: `/verify`, `/settle`,
//! `/supported`, `/health`.
//!
//! Per §4.6/§7, `/verify` and `/settle` always answer HTTP 200 with a
//! structured body for expected payment-rejection outcomes — only transport
//! or internal faults produce a non-200 status.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router, response::IntoResponse};
use serde_json::json;
use std::sync::Arc;
use tracing::instrument;

use crate::facilitator::Facilitator;
use crate::types::VerificationRequest;

pub fn routes(facilitator: Arc<dyn Facilitator>) -> Router {
    Router::new()
        .route("/", get(get_root))
        .route("/verify", get(get_verify_info))
        .route("/verify", post(post_verify))
        .route("/settle", get(get_settle_info))
        .route("/settle", post(post_settle))
        .route("/health", get(get_health))
        .route("/supported", get(get_supported))
        .with_state(facilitator)
}

#[instrument(skip_all)]
pub async fn get_root() -> impl IntoResponse {
    (StatusCode::OK, format!("Hello from {}!", env!("CARGO_PKG_NAME")))
}

/// `GET /verify`: machine-readable description of the `/verify` endpoint.
#[instrument(skip_all)]
pub async fn get_verify_info() -> impl IntoResponse {
    Json(json!({
        "endpoint": "/verify",
        "description": "POST to verify an x402 payment",
        "body": { "x402Version": "integer", "paymentHeader": "string", "paymentRequirements": "PaymentRequirements" }
    }))
}

/// `GET /settle`: machine-readable description of the `/settle` endpoint.
#[instrument(skip_all)]
pub async fn get_settle_info() -> impl IntoResponse {
    Json(json!({
        "endpoint": "/settle",
        "description": "POST to verify-then-settle an x402 payment",
        "body": { "x402Version": "integer", "paymentHeader": "string", "paymentRequirements": "PaymentRequirements" }
    }))
}

#[instrument(skip_all, fields(resource = %body.payment_requirements.resource))]
pub async fn post_verify(
    State(facilitator): State<Arc<dyn Facilitator>>,
    Json(body): Json<VerificationRequest>,
) -> impl IntoResponse {
    let response = facilitator
        .verify(&body.payment_header, &body.payment_requirements)
        .await;
    if !response.is_valid {
        tracing::warn!(reason = ?response.invalid_reason, "verification rejected");
    }
    (StatusCode::OK, Json(response))
}

#[instrument(skip_all, fields(resource = %body.payment_requirements.resource))]
pub async fn post_settle(
    State(facilitator): State<Arc<dyn Facilitator>>,
    Json(body): Json<VerificationRequest>,
) -> impl IntoResponse {
    let response = facilitator
        .settle(&body.payment_header, &body.payment_requirements)
        .await;
    if !response.success {
        tracing::warn!(error = ?response.error, "settlement failed");
    }
    (StatusCode::OK, Json(response))
}

#[instrument(skip_all)]
pub async fn get_supported(State(facilitator): State<Arc<dyn Facilitator>>) -> impl IntoResponse {
    (StatusCode::OK, Json(facilitator.supported()))
}

/// The verifier (`crate::verifier::verify_payment`) is a pure function with
/// no initialization state of its own, so only the settler's readiness is a
/// real signal worth reporting here.
#[instrument(skip_all)]
pub async fn get_health(State(facilitator): State<Arc<dyn Facilitator>>) -> impl IntoResponse {
    let supported = facilitator.supported();
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "settlerInitialized": !supported.kinds.is_empty(),
        })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SettlementResponse, SupportedKind, SupportedResponse, VerificationResponse};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    struct AlwaysRejects;

    #[async_trait]
    impl Facilitator for AlwaysRejects {
        async fn verify(
            &self,
            _header_base64: &str,
            _requirements: &crate::types::PaymentRequirements,
        ) -> VerificationResponse {
            VerificationResponse::invalid("Amount mismatch: expected 20000, got 10000")
        }

        async fn settle(
            &self,
            _header_base64: &str,
            _requirements: &crate::types::PaymentRequirements,
        ) -> SettlementResponse {
            SettlementResponse::failed("Verification failed: Amount mismatch")
        }

        fn supported(&self) -> SupportedResponse {
            SupportedResponse {
                kinds: vec![SupportedKind {
                    scheme: crate::types::Scheme::Exact,
                    network: "eip155:84532".to_string(),
                }],
            }
        }
    }

    fn sample_requirements() -> crate::types::PaymentRequirements {
        crate::types::PaymentRequirements {
            scheme: crate::types::Scheme::Exact,
            network: "eip155:84532".to_string(),
            max_amount_required: crate::types::AmountU256(alloy_primitives::U256::from(20_000u64)),
            resource: "/weather".to_string(),
            description: "weather data".to_string(),
            mime_type: "application/json".to_string(),
            output_schema: None,
            pay_to: alloy_primitives::Address::ZERO,
            max_timeout_seconds: 60,
            asset: alloy_primitives::Address::ZERO,
            extra: crate::types::PaymentRequirementsExtra {
                name: "USDC".to_string(),
                version: "2".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn verify_failure_still_returns_http_200() {
        let app = routes(Arc::new(AlwaysRejects));
        let body = VerificationRequest {
            x402_version: 1,
            payment_header: "irrelevant".to_string(),
            payment_requirements: sample_requirements(),
        };
        let request = Request::builder()
            .method("POST")
            .uri("/verify")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn settle_failure_still_returns_http_200() {
        let app = routes(Arc::new(AlwaysRejects));
        let body = VerificationRequest {
            x402_version: 1,
            payment_header: "irrelevant".to_string(),
            payment_requirements: sample_requirements(),
        };
        let request = Request::builder()
            .method("POST")
            .uri("/settle")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
