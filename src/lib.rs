//! Rust implementation of the [x402 protocol](https://www.x402.org) `exact`
//! scheme on EIP-155 chains: an HTTP `402 Payment Required` challenge backed
//! by a signed EIP-3009 `transferWithAuthorization`.
//!
//! # Roles
//!
//! - **Facilitator**: verifies and settles payments on-chain. See
//!   [`facilitator`] for the trait and [`settler`]/[`verifier`] for the two
//!   halves of its implementation.
//! - **Resource server**: gates a handler behind payment. See [`middleware`].
//! - **Client**: constructs and signs payments. See [`client`].
//!
//! # Modules
//!
//! - [`types`] — the wire data model (§3).
//! - [`eip712`] — the shared EIP-712 digest (§4.2).
//! - [`client`] — the client payment constructor (§4.1).
//! - [`verifier`] — the pure verification function (§4.3).
//! - [`settler`] — the stateful on-chain settlement state machine (§4.4).
//! - [`facilitator`] — the `Facilitator` trait and local implementation.
//! - [`middleware`] — the resource-server 402 handshake (§4.5).
//! - [`handlers`] — the facilitator's HTTP surface (§4.6).
//! - [`config`] — configuration loading.
//! - [`chain_id`] — CAIP-2 `eip155:<chainId>` identifiers.
//! - [`error`] — the error taxonomy (§7).
//! - [`timestamp`] — the Unix timestamp wire type.
//! - [`util`] — base64 and money-amount helpers.

pub mod chain_id;
pub mod client;
pub mod config;
pub mod eip712;
pub mod error;
pub mod facilitator;
pub mod handlers;
pub mod middleware;
pub mod settler;
pub mod timestamp;
pub mod types;
pub mod util;
pub mod verifier;
