//! The resource-server middleware (§4.5): wraps an inner `tower::Service`
//! with a single `(amountUSD, description)` payment requirement and
//! implements the 402 challenge/retry handshake around it.

use crate::chain_id::Eip155Network;
use crate::error::MiddlewareError;
use crate::types::{
    PaymentExecutedReceipt, PaymentRequiredResponse, PaymentRequirements, PaymentRequirementsExtra,
    Scheme, SettlementRequest, SettlementResponse, X402_VERSION,
};
use crate::util::b64::Base64Bytes;
use crate::util::money_amount::MoneyAmount;
use alloy_primitives::{Address, U256};
use axum::body::Body;
use axum::http::{HeaderValue, Request, Response, StatusCode};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tower::{Layer, Service};

const FACILITATOR_TIMEOUT: Duration = Duration::from_secs(120);

/// Static description of the token domain this resource server charges in,
/// resolved once at startup from [`crate::config::Eip155ChainConfig`].
#[derive(Debug, Clone)]
pub struct PriceTag {
    pub amount_usd: MoneyAmount,
    pub description: String,
    pub network: Eip155Network,
    pub pay_to: Address,
    pub asset: Address,
    pub token_decimals: u8,
    pub token_name: String,
    pub token_version: String,
    pub facilitator_url: url::Url,
}

impl PriceTag {
    /// `amountUSD * 10^tokenDecimals`, computed from the amount's own
    /// mantissa/scale rather than floating point, per §4.5.
    fn atomic_amount(&self) -> u128 {
        let mantissa = self.amount_usd.mantissa();
        let scale = self.amount_usd.scale();
        let decimals = self.token_decimals as u32;
        if scale <= decimals {
            mantissa.saturating_mul(10u128.pow(decimals - scale))
        } else {
            mantissa / 10u128.pow(scale - decimals)
        }
    }

    fn requirements(&self, resource_path: &str) -> PaymentRequirements {
        let atomic = self.atomic_amount();
        PaymentRequirements {
            scheme: Scheme::Exact,
            network: self.network.to_string(),
            max_amount_required: U256::from(atomic).into(),
            resource: resource_path.to_string(),
            description: self.description.clone(),
            mime_type: "application/json".to_string(),
            output_schema: None,
            pay_to: self.pay_to,
            max_timeout_seconds: 60,
            asset: self.asset,
            extra: PaymentRequirementsExtra {
                name: self.token_name.clone(),
                version: self.token_version.clone(),
            },
        }
    }
}

#[derive(Clone)]
pub struct X402Layer {
    price_tag: PriceTag,
    http: reqwest::Client,
}

impl X402Layer {
    pub fn new(price_tag: PriceTag) -> Self {
        X402Layer {
            price_tag,
            http: reqwest::Client::new(),
        }
    }
}

impl<S> Layer<S> for X402Layer {
    type Service = X402Middleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        X402Middleware {
            inner,
            price_tag: self.price_tag.clone(),
            http: self.http.clone(),
        }
    }
}

#[derive(Clone)]
pub struct X402Middleware<S> {
    inner: S,
    price_tag: PriceTag,
    http: reqwest::Client,
}

impl<S> Service<Request<Body>> for X402Middleware<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let mut inner = self.inner.clone();
        let price_tag = self.price_tag.clone();
        let http = self.http.clone();
        Box::pin(async move {
            let resource_path = request.uri().path().to_string();
            let requirements = price_tag.requirements(&resource_path);

            let payment_header = request
                .headers()
                .get("x-payment")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string());

            let Some(payment_header) = payment_header else {
                return Ok(payment_required_response(&requirements, None));
            };

            let settlement_request = SettlementRequest {
                x402_version: X402_VERSION,
                payment_header,
                payment_requirements: requirements.clone(),
            };

            let settle_result = http
                .post(price_tag.facilitator_url.join("/settle").unwrap())
                .json(&settlement_request)
                .timeout(FACILITATOR_TIMEOUT)
                .send()
                .await;

            let settle_response = match settle_result {
                Ok(resp) if resp.status().is_success() => {
                    match resp.json::<SettlementResponse>().await {
                        Ok(body) => body,
                        Err(e) => {
                            return Ok(payment_required_response(
                                &requirements,
                                Some(format!("malformed facilitator response: {e}")),
                            ));
                        }
                    }
                }
                Ok(resp) => {
                    return Ok(payment_required_response(
                        &requirements,
                        Some(format!("facilitator returned {}", resp.status())),
                    ));
                }
                Err(e) if e.is_timeout() => {
                    return Ok(middleware_error_response(MiddlewareError::FacilitatorTimeout));
                }
                Err(e) => {
                    return Ok(middleware_error_response(
                        MiddlewareError::FacilitatorUnreachable(e.to_string()),
                    ));
                }
            };

            if !settle_response.success {
                return Ok(payment_required_response(&requirements, settle_response.error));
            }

            let mut response = inner.call(request).await?;
            if let (Some(tx_hash), Some(network_id)) =
                (settle_response.tx_hash, settle_response.network_id)
            {
                let receipt = PaymentExecutedReceipt { tx_hash, network_id };
                if let Ok(json) = serde_json::to_vec(&receipt) {
                    let encoded = Base64Bytes::encode(json).to_string();
                    if let Ok(value) = HeaderValue::from_str(&encoded) {
                        response.headers_mut().insert("x-payment-response", value);
                    }
                }
            }
            Ok(response)
        })
    }
}

/// §4.5 step 3: facilitator timeout → 408, other transport errors → 500.
fn middleware_error_response(err: MiddlewareError) -> Response<Body> {
    let status = match err {
        MiddlewareError::FacilitatorTimeout => StatusCode::REQUEST_TIMEOUT,
        MiddlewareError::FacilitatorUnreachable(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    Response::builder()
        .status(status)
        .body(Body::from(err.to_string()))
        .unwrap()
}

fn payment_required_response(
    requirements: &PaymentRequirements,
    error: Option<String>,
) -> Response<Body> {
    let body = PaymentRequiredResponse {
        x402_version: X402_VERSION,
        accepts: vec![requirements.clone()],
        error,
    };
    let json = serde_json::to_vec(&body).unwrap_or_default();
    Response::builder()
        .status(StatusCode::PAYMENT_REQUIRED)
        .header("content-type", "application/json")
        .body(Body::from(json))
        .unwrap()
}
