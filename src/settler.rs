//! The facilitator settler (§4.4): submits the authorized transfer on-chain
//! and interprets the receipt. Holds the facilitator's own signing identity
//! and RPC handle, both initialized once at startup and read-only afterwards.
//! The only request-time mutable state is the local tx-nonce counter for the
//! submitter address, serialized behind a mutex per §5.

use crate::chain_id::Eip155Network;
use crate::error::SettlementError;
use crate::types::{ExactPaymentPayload, PaymentRequirements};
use alloy_consensus::BlockHeader;
use alloy_network::{BlockResponse, Ethereum, EthereumWallet, TransactionBuilder};
use alloy_primitives::{Address, B256, U256};
use alloy_provider::{DynProvider, Provider, ProviderBuilder};
use alloy_rpc_types_eth::{BlockNumberOrTag, TransactionRequest};
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::sol;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{instrument, warn};

sol! {
    #[sol(rpc)]
    interface IEIP3009 {
        function transferWithAuthorization(
            address from, address to, uint256 value,
            uint256 validAfter, uint256 validBefore, bytes32 nonce,
            uint8 v, bytes32 r, bytes32 s) external;
        function authorizationState(address authorizer, bytes32 nonce) external view returns (bool);
    }
}

/// 20% headroom over the gas estimate, matching observed behavior of the
/// implementation this protocol was distilled from.
const GAS_ESTIMATE_BUFFER_NUM: u64 = 12;
const GAS_ESTIMATE_BUFFER_DEN: u64 = 10;

pub struct Settler {
    provider: DynProvider<Ethereum>,
    signer: PrivateKeySigner,
    max_gas_price_gwei: Option<u64>,
    /// Serializes tx construction for this facilitator's own submitter
    /// address; `eth_getTransactionCount` is not safe to race against itself.
    submit_lock: Mutex<()>,
}

pub struct SettlementOutcome {
    pub tx_hash: B256,
}

impl Settler {
    pub fn new(
        provider: DynProvider<Ethereum>,
        signer: PrivateKeySigner,
        max_gas_price_gwei: Option<u64>,
    ) -> Self {
        Settler {
            provider,
            signer,
            max_gas_price_gwei,
            submit_lock: Mutex::new(()),
        }
    }

    pub fn submitter_address(&self) -> Address {
        self.signer.address()
    }

    /// Reads the chain tip's block timestamp, per §4.3 step 7: the verifier's
    /// `now` comes from `eth_getBlockByNumber("latest")`, not local wall clock.
    pub async fn chain_timestamp(&self) -> Result<crate::timestamp::UnixTimestamp, SettlementError> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Latest)
            .await
            .map_err(|e| SettlementError::Transport(e.to_string()))?
            .ok_or_else(|| SettlementError::Transport("no latest block returned".to_string()))?;
        Ok(crate::timestamp::UnixTimestamp(block.header().timestamp()))
    }

    #[instrument(skip_all, fields(resource = %requirements.resource, network = %requirements.network))]
    pub async fn settle_payment(
        &self,
        exact: &ExactPaymentPayload,
        requirements: &PaymentRequirements,
        wait_for_confirmation: bool,
        timeout: Duration,
    ) -> Result<SettlementOutcome, SettlementError> {
        let network: Eip155Network = requirements
            .network
            .parse()
            .map_err(|e| SettlementError::Transport(format!("{e}")))?;
        let _ = network;

        let contract = IEIP3009::new(requirements.asset, self.provider.clone());

        // [nonce-check] — advisory only. A token may not expose this call,
        // or a concurrent submission may flip it between here and send; the
        // authoritative rejection is always the on-chain revert.
        match contract
            .authorizationState(exact.from, exact.nonce)
            .call()
            .await
        {
            Ok(used) if used => return Err(SettlementError::NonceUsed),
            Ok(_) => {}
            Err(e) => warn!(error = %e, "authorizationState call failed; proceeding to submission"),
        }

        let value: U256 = exact.value.into();
        let valid_after: U256 = exact.valid_after.into();
        let valid_before: U256 = exact.valid_before.into();

        // [build-tx] / [estimate-gas]
        let call = contract.transferWithAuthorization(
            exact.from,
            exact.to,
            value,
            valid_after,
            valid_before,
            exact.nonce,
            exact.v,
            exact.r,
            exact.s,
        );
        let estimated_gas = call
            .estimate_gas()
            .await
            .map_err(|e| SettlementError::EstimationFailed(e.to_string()))?;
        let gas_limit = estimated_gas
            .saturating_mul(GAS_ESTIMATE_BUFFER_NUM)
            / GAS_ESTIMATE_BUFFER_DEN;

        // [gas-price-guard]
        let current_gas_price = self
            .provider
            .get_gas_price()
            .await
            .map_err(|e| SettlementError::Transport(e.to_string()))?;
        if let Some(cap_gwei) = self.max_gas_price_gwei {
            let cap_wei = (cap_gwei as u128) * 1_000_000_000u128;
            if current_gas_price > cap_wei {
                return Err(SettlementError::GasTooHigh {
                    current_gwei: (current_gas_price / 1_000_000_000u128) as u64,
                    cap_gwei,
                });
            }
        }

        // [sign-and-send] — tx nonce is serialized on the submitter address.
        let _guard = self.submit_lock.lock().await;
        let wallet = EthereumWallet::from(self.signer.clone());
        let tx_nonce = self
            .provider
            .get_transaction_count(self.signer.address())
            .await
            .map_err(|e| SettlementError::Transport(e.to_string()))?;

        let tx_request: TransactionRequest = call
            .into_transaction_request()
            .with_from(self.signer.address())
            .with_nonce(tx_nonce)
            .with_gas_limit(gas_limit)
            .with_gas_price(current_gas_price);

        let envelope = tx_request
            .build(&wallet)
            .await
            .map_err(|e| SettlementError::Transport(e.to_string()))?;
        let pending = self
            .provider
            .send_tx_envelope(envelope)
            .await
            .map_err(|e| SettlementError::Transport(e.to_string()))?;
        let tx_hash = *pending.tx_hash();
        drop(_guard);

        // [await-receipt]
        if !wait_for_confirmation {
            return Ok(SettlementOutcome { tx_hash });
        }
        let receipt = tokio::time::timeout(timeout, pending.get_receipt()).await;
        match receipt {
            Err(_) => Err(SettlementError::ConfirmationTimeout {
                tx_hash: tx_hash.to_string(),
            }),
            Ok(Err(e)) => Err(SettlementError::Transport(e.to_string())),
            Ok(Ok(receipt)) => {
                if receipt.status() {
                    Ok(SettlementOutcome { tx_hash })
                } else {
                    Err(SettlementError::Reverted {
                        tx_hash: tx_hash.to_string(),
                    })
                }
            }
        }
    }
}

pub fn provider_from_url(url: url::Url) -> DynProvider<Ethereum> {
    ProviderBuilder::new().connect_http(url).erased()
}
