//! Error taxonomy for the launch/buy core.
//!
//! Every failure inside the core is a [`LaunchpadError`]. The orchestrator is the
//! only place that turns one into an [`OperationResult`](crate::launchpad::OperationResult);
//! lower layers return these values and never panic across that boundary.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Machine-readable reason code carried by every failure result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    ValidationError,
    MalformedAddress,
    InvalidKeypair,
    InvalidPoolState,
    SlippageExceeded,
    Expired,
    NetworkTransient,
    TransactionFailed,
    Unconfirmed,
    Internal,
}

impl ReasonCode {
    /// Returns the wire representation of the code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::ValidationError => "VALIDATION_ERROR",
            ReasonCode::MalformedAddress => "MALFORMED_ADDRESS",
            ReasonCode::InvalidKeypair => "INVALID_KEYPAIR",
            ReasonCode::InvalidPoolState => "INVALID_POOL_STATE",
            ReasonCode::SlippageExceeded => "SLIPPAGE_EXCEEDED",
            ReasonCode::Expired => "EXPIRED",
            ReasonCode::NetworkTransient => "NETWORK_TRANSIENT",
            ReasonCode::TransactionFailed => "TRANSACTION_FAILED",
            ReasonCode::Unconfirmed => "UNCONFIRMED",
            ReasonCode::Internal => "INTERNAL",
        }
    }

    /// Classified failures are caller-actionable and surface as 400.
    /// Everything else is a generic 500.
    pub fn http_status(&self) -> u16 {
        match self {
            ReasonCode::ValidationError
            | ReasonCode::MalformedAddress
            | ReasonCode::InvalidKeypair
            | ReasonCode::SlippageExceeded
            | ReasonCode::Expired => 400,
            ReasonCode::InvalidPoolState
            | ReasonCode::NetworkTransient
            | ReasonCode::TransactionFailed
            | ReasonCode::Unconfirmed
            | ReasonCode::Internal => 500,
        }
    }
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors produced by the launch/buy pipeline.
///
/// Messages never contain secret material: the signer only reports that a
/// secret failed to decode, not what it was.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LaunchpadError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("malformed address for {field}: {reason}")]
    MalformedAddress { field: String, reason: String },
    #[error("invalid keypair: {0}")]
    InvalidKeypair(String),
    #[error("invalid pool state: {0}")]
    InvalidPoolState(String),
    #[error("slippage exceeded: {0}")]
    SlippageExceeded(String),
    #[error("blockhash expired before confirmation of {signature}")]
    Expired { signature: String },
    #[error("network error after {attempts} attempt(s): {message}")]
    NetworkTransient { attempts: usize, message: String },
    #[error("transaction {signature} failed on-chain: {message}")]
    TransactionFailed { signature: String, message: String },
    #[error("transaction {signature} not confirmed within {waited_secs}s")]
    Unconfirmed { signature: String, waited_secs: u64 },
    #[error("internal error: {0}")]
    Internal(String),
}

impl LaunchpadError {
    pub fn validation(msg: impl Into<String>) -> Self {
        LaunchpadError::Validation(msg.into())
    }

    pub fn malformed_address(field: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        LaunchpadError::MalformedAddress {
            field: field.into(),
            reason: reason.to_string(),
        }
    }

    pub fn internal(reason: impl std::fmt::Display) -> Self {
        LaunchpadError::Internal(reason.to_string())
    }

    /// Maps the error to its external reason code.
    pub fn reason_code(&self) -> ReasonCode {
        match self {
            LaunchpadError::Validation(_) => ReasonCode::ValidationError,
            LaunchpadError::MalformedAddress { .. } => ReasonCode::MalformedAddress,
            LaunchpadError::InvalidKeypair(_) => ReasonCode::InvalidKeypair,
            LaunchpadError::InvalidPoolState(_) => ReasonCode::InvalidPoolState,
            LaunchpadError::SlippageExceeded(_) => ReasonCode::SlippageExceeded,
            LaunchpadError::Expired { .. } => ReasonCode::Expired,
            LaunchpadError::NetworkTransient { .. } => ReasonCode::NetworkTransient,
            LaunchpadError::TransactionFailed { .. } => ReasonCode::TransactionFailed,
            LaunchpadError::Unconfirmed { .. } => ReasonCode::Unconfirmed,
            LaunchpadError::Internal(_) => ReasonCode::Internal,
        }
    }

    /// Unexpected failures get logged at error level by the orchestrator.
    pub fn is_unexpected(&self) -> bool {
        matches!(
            self,
            LaunchpadError::InvalidPoolState(_) | LaunchpadError::Internal(_)
        )
    }
}

pub type LaunchpadResult<T> = std::result::Result<T, LaunchpadError>;
