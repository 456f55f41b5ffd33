//! x402 facilitator HTTP entrypoint.
//!
//! This binary launches an Axum-based HTTP server exposing the x402
//! facilitator surface: `POST /verify`, `POST /settle`, `GET /supported`,
//! `GET /health`.
//!
//! Environment:
//! - `.env` values loaded at startup
//! - `HOST`, `PORT` control the bind address
//! - `CONFIG` points at the JSON config file (default `config.json`)

use axum::http::Method;
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors;
use tower_http::trace::TraceLayer;

use x402_facilitator::config::Config;
use x402_facilitator::facilitator::{Facilitator, LocalFacilitator};
use x402_facilitator::handlers;
use x402_facilitator::settler::{self, Settler};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::load()?;

    let provider = settler::provider_from_url(config.chain.rpc_url.clone());
    let signer = alloy_signer_local::PrivateKeySigner::from_bytes(
        &config.chain.facilitator_private_key.0.0,
    )?;
    let settler = Arc::new(Settler::new(
        provider,
        signer,
        config.chain.max_gas_price_gwei,
    ));

    let facilitator: Arc<dyn Facilitator> = Arc::new(LocalFacilitator::new(
        settler,
        config.chain.network_id(),
        Duration::from_secs(config.settlement_timeout_secs),
    ));

    let app = handlers::routes(facilitator)
        .layer(TraceLayer::new_for_http())
        .layer(
            cors::CorsLayer::new()
                .allow_origin(cors::Any)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers(cors::Any),
        );

    let addr = SocketAddr::new(config.host, config.port);
    tracing::info!("starting facilitator at http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap_or_else(|e| {
        tracing::error!("failed to bind to {addr}: {e}");
        std::process::exit(1);
    });

    axum::serve(listener, app).await?;

    Ok(())
}
