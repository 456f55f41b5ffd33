//! A minimal CLI client performing the full 402 handshake against the demo
//! resource server: request, get challenged, sign, retry, print the receipt.

use alloy_signer_local::PrivateKeySigner;
use std::str::FromStr;
use x402_facilitator::client::{decode_payment_response, request_resource};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "http://127.0.0.1:8080/weather".to_string());
    let private_key = std::env::var("CLIENT_PRIVATE_KEY")
        .expect("CLIENT_PRIVATE_KEY env var is required for the demo client");
    let signer = PrivateKeySigner::from_str(&private_key)?;

    let http = reqwest::Client::new();
    let response = request_resource(&http, &signer, &url, 60).await?;

    println!("status: {}", response.status());
    if let Some(receipt) = decode_payment_response(response.headers()) {
        println!("receipt: {receipt}");
    }
    println!("body: {}", response.text().await?);

    Ok(())
}
