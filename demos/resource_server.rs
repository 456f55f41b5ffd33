//! A minimal resource server demonstrating the middleware from §4.5: one
//! paid JSON endpoint, gated behind the x402 handshake. Grounded on the
//! `/weather` route of the implementation this protocol was distilled from —
//! the third-party-proxying routes and the custom TLS adapter from that
//! source are intentionally not reproduced here (see DESIGN.md).

use axum::{Json, Router, routing::get};
use serde_json::json;
use x402_facilitator::config::Config;
use x402_facilitator::middleware::{PriceTag, X402Layer};
use x402_facilitator::util::money_amount::MoneyAmount;

async fn weather() -> Json<serde_json::Value> {
    Json(json!({
        "location": "San Francisco, CA",
        "temperatureCelsius": 18,
        "conditions": "foggy",
    }))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::load()?;
    let resource_server = config
        .resource_server
        .expect("config.resourceServer is required to run the demo resource server");
    let network: x402_facilitator::chain_id::Eip155Network =
        config.chain.network_id().parse()?;

    let price_tag = PriceTag {
        amount_usd: MoneyAmount::parse("$0.01").expect("valid amount literal"),
        description: "weather data".to_string(),
        network,
        pay_to: resource_server.resource_server_address,
        asset: config.chain.token_contract_address,
        token_decimals: config.chain.token_decimals,
        token_name: config.chain.token_name.clone(),
        token_version: config.chain.token_version.clone(),
        facilitator_url: resource_server.facilitator_url,
    };

    let app = Router::new()
        .route("/weather", get(weather))
        .layer(X402Layer::new(price_tag));

    let addr = std::net::SocketAddr::new(config.host, config.port);
    tracing::info!("demo resource server listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
