//! Error taxonomy for the facilitator. Every variant carries a human-readable
//! message that becomes the wire-level `invalidReason`/`error` field; the
//! facilitator never lets an error type escape to the wire unstructured (see
//! [`crate::handlers`]).

use thiserror::Error;

/// Why `verifyPayment` rejected a payment. Each arm owns a distinct,
/// prefixed reason string so the HTTP layer need not re-derive one.
#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("Malformed payment header: {0}")]
    Malformed(String),
    #[error("Scheme mismatch: expected {expected}, got {actual}")]
    SchemeMismatch { expected: String, actual: String },
    #[error("Network mismatch: expected {expected}, got {actual}")]
    NetworkMismatch { expected: String, actual: String },
    #[error("Recipient mismatch: expected {expected}, got {actual}")]
    RecipientMismatch { expected: String, actual: String },
    #[error("Amount mismatch: expected {expected}, got {actual}")]
    AmountMismatch { expected: String, actual: String },
    #[error("Payment expired or not yet valid: {0}")]
    TimeWindow(String),
    #[error("Domain parameters missing: {0}")]
    MissingDomainParams(String),
    #[error("Signature verification failed: {0}")]
    SignatureInvalid(String),
}

impl VerificationError {
    /// The reason string surfaced in `VerificationResponse.invalidReason`.
    pub fn reason(&self) -> String {
        self.to_string()
    }
}

/// Why `settlePayment` did not produce a confirmed on-chain transfer.
#[derive(Debug, Error)]
pub enum SettlementError {
    #[error(transparent)]
    Verification(#[from] VerificationError),
    #[error("Authorization nonce already used")]
    NonceUsed,
    #[error("Gas estimation failed: {0}")]
    EstimationFailed(String),
    #[error("Gas price {current_gwei} gwei exceeds cap {cap_gwei} gwei")]
    GasTooHigh { current_gwei: u64, cap_gwei: u64 },
    #[error("RPC transport failure: {0}")]
    Transport(String),
    #[error("Transaction reverted on-chain (tx {tx_hash})")]
    Reverted { tx_hash: String },
    #[error("Confirmation timed out (tx {tx_hash})")]
    ConfirmationTimeout { tx_hash: String },
}

impl SettlementError {
    /// The reason string surfaced in `SettlementResponse.error`. Transport
    /// failures are not meant to be surfaced this way (they become HTTP
    /// 5xx instead); callers route those separately.
    pub fn reason(&self) -> String {
        self.to_string()
    }

    pub fn tx_hash(&self) -> Option<&str> {
        match self {
            SettlementError::Reverted { tx_hash } | SettlementError::ConfirmationTimeout { tx_hash } => {
                Some(tx_hash)
            }
            _ => None,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, SettlementError::Transport(_))
    }
}

/// Failures of the client-side payment constructor (§4.1).
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("server offered no accepted payment methods")]
    NoAcceptedMethods,
    #[error("failed to construct payment: {0}")]
    PaymentConstructionFailed(String),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Failures of the resource-server middleware (§4.5).
#[derive(Debug, Error)]
pub enum MiddlewareError {
    #[error("facilitator request timed out")]
    FacilitatorTimeout,
    #[error("facilitator request failed: {0}")]
    FacilitatorUnreachable(String),
}
