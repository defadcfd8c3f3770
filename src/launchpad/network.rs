//! Chain access behind the [`ChainClient`] seam.
//!
//! [`RpcChainClient`] rotates over the configured endpoints and shares one
//! rate limiter across every call. Errors are classified once, here, into
//! transient (worth retrying), rejected (the node refused the transaction) and
//! fatal.

use crate::launchpad::error::LaunchpadError;
use crate::launchpad::types::{EngineConfig, RecentBlockhash};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nonempty::NonEmpty;
use solana_client::{
    client_error::{ClientError, ClientErrorKind},
    nonblocking::rpc_client::RpcClient,
    rpc_config::{RpcSendTransactionConfig, RpcTransactionConfig},
    rpc_request::{RpcError, RpcResponseErrorData},
};
use solana_sdk::{
    commitment_config::{CommitmentConfig, CommitmentLevel},
    pubkey::Pubkey,
    signature::Signature,
    transaction::{Transaction, TransactionError},
};
use solana_transaction_status::{UiTransactionEncoding, UiTransactionTokenBalance};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// JSON-RPC code for a transaction whose signatures fail verification.
const SIGNATURE_VERIFICATION_FAILURE: i64 = -32003;

/// Server-side conditions that clear up on their own: internal error, block
/// not available, node unhealthy, slot skipped, long-term storage slot
/// skipped, min context slot not reached.
const RETRYABLE_RPC_CODES: [i64; 6] = [-32603, -32004, -32005, -32007, -32009, -32016];

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ChainError {
    /// Timeouts, connection resets, unhealthy nodes. Safe to retry.
    #[error("transient network error: {0}")]
    Transient(String),
    /// The node evaluated the transaction and refused it.
    #[error("transaction rejected: {}", .error.as_ref().map(|e| e.to_string()).unwrap_or_else(|| "unknown".to_string()))]
    Rejected {
        error: Option<TransactionError>,
        logs: Vec<String>,
    },
    /// Anything a retry cannot fix.
    #[error("rpc error: {0}")]
    Fatal(String),
}

impl ChainError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ChainError::Transient(_))
    }
}

/// Chain reads outside the submitter are not retried; they surface as-is.
impl From<ChainError> for LaunchpadError {
    fn from(err: ChainError) -> Self {
        match err {
            ChainError::Transient(message) => LaunchpadError::NetworkTransient { attempts: 1, message },
            other => LaunchpadError::internal(other),
        }
    }
}

/// Classifies a client error by what a caller can do about it.
pub fn classify_client_error(err: ClientError) -> ChainError {
    match err.kind() {
        ClientErrorKind::Io(e) => ChainError::Transient(e.to_string()),
        ClientErrorKind::Reqwest(e) => ChainError::Transient(e.to_string()),
        ClientErrorKind::RpcError(RpcError::RpcResponseError { code, message, data }) => match data {
            RpcResponseErrorData::SendTransactionPreflightFailure(simulation) => ChainError::Rejected {
                error: simulation.err.clone(),
                logs: simulation.logs.clone().unwrap_or_default(),
            },
            RpcResponseErrorData::NodeUnhealthy { .. } => ChainError::Transient(message.clone()),
            _ if *code == SIGNATURE_VERIFICATION_FAILURE => ChainError::Fatal(message.clone()),
            _ if RETRYABLE_RPC_CODES.contains(code) => ChainError::Transient(format!("{} ({})", message, code)),
            // invalid params/request, parse errors, malformed transactions: resending cannot help
            _ => ChainError::Fatal(format!("{} ({})", message, code)),
        },
        ClientErrorKind::RpcError(e) => ChainError::Transient(e.to_string()),
        ClientErrorKind::TransactionError(e) => ChainError::Rejected {
            error: Some(e.clone()),
            logs: Vec::new(),
        },
        ClientErrorKind::SerdeJson(e) => ChainError::Fatal(e.to_string()),
        ClientErrorKind::SigningError(e) => ChainError::Fatal(e.to_string()),
        _ => ChainError::Transient(err.to_string()),
    }
}

/// Where a signature stands at the confirmed commitment level.
#[derive(Debug, Clone, PartialEq)]
pub enum SignatureState {
    /// Unknown to the cluster or not yet confirmed
    Pending,
    Landed { slot: u64 },
    Failed { slot: u64, error: TransactionError },
}

/// Token balance of one account before and after a transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenBalanceChange {
    pub account_index: u8,
    pub owner: Option<String>,
    pub mint: String,
    pub pre: u64,
    pub post: u64,
}

/// What a confirmed transaction did, as reported by the node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionReceipt {
    pub slot: u64,
    pub fee: u64,
    pub logs: Vec<String>,
    /// Lamports per account key; index 0 is the fee payer
    pub pre_balances: Vec<u64>,
    pub post_balances: Vec<u64>,
    pub token_balances: Vec<TokenBalanceChange>,
}

impl TransactionReceipt {
    /// Token units of `mint` gained by accounts owned by `owner`.
    pub fn token_delta(&self, owner: &Pubkey, mint: &Pubkey) -> Option<u64> {
        let owner = owner.to_string();
        let mint = mint.to_string();
        let matching: Vec<&TokenBalanceChange> = self
            .token_balances
            .iter()
            .filter(|b| b.mint == mint && b.owner.as_deref() == Some(owner.as_str()))
            .collect();
        if matching.is_empty() {
            return None;
        }
        Some(matching.iter().map(|b| b.post.saturating_sub(b.pre)).sum())
    }

    /// Lamports the fee payer lost, network fee included.
    pub fn fee_payer_spent(&self) -> Option<u64> {
        let pre = self.pre_balances.first()?;
        let post = self.post_balances.first()?;
        Some(pre.saturating_sub(*post))
    }
}

/// Read/write access to the chain as the pipeline needs it.
#[async_trait]
pub trait ChainClient: Send + Sync + 'static {
    async fn latest_blockhash(&self) -> Result<RecentBlockhash, ChainError>;

    async fn block_height(&self) -> Result<u64, ChainError>;

    /// Raw account data, `None` if the account does not exist.
    async fn account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, ChainError>;

    async fn send_transaction(&self, transaction: &Transaction) -> Result<Signature, ChainError>;

    async fn signature_status(&self, signature: &Signature) -> Result<SignatureState, ChainError>;

    /// Meta of a confirmed transaction, `None` if the node does not have it yet.
    async fn transaction_receipt(&self, signature: &Signature) -> Result<Option<TransactionReceipt>, ChainError>;
}

/// [`ChainClient`] over one or more JSON-RPC endpoints.
pub struct RpcChainClient {
    clients: NonEmpty<Arc<RpcClient>>,
    next: AtomicUsize,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
    commitment: CommitmentConfig,
}

impl RpcChainClient {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let endpoints = NonEmpty::from_vec(config.rpc_endpoints.clone())
            .ok_or_else(|| anyhow!("rpc_endpoints cannot be empty"))?;
        let commitment = CommitmentConfig::confirmed();

        let clients = endpoints.map(|endpoint| {
            Arc::new(RpcClient::new_with_timeout_and_commitment(
                endpoint,
                Duration::from_secs(config.rpc_timeout_seconds),
                commitment,
            ))
        });

        let per_second = NonZeroU32::new(config.rpc_rate_limit_per_second).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_second(per_second)));

        Ok(Self {
            clients,
            next: AtomicUsize::new(0),
            rate_limiter,
            commitment,
        })
    }

    pub fn endpoint_count(&self) -> usize {
        self.clients.len()
    }

    /// Waits for a rate-limit permit, then hands out the next endpoint.
    async fn rpc(&self) -> &RpcClient {
        self.rate_limiter.until_ready().await;
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.clients.len();
        self.clients.get(index).unwrap_or(&self.clients.head)
    }
}

fn token_amount(balance: &UiTransactionTokenBalance) -> u64 {
    balance.ui_token_amount.amount.parse().unwrap_or(0)
}

fn token_balance_changes(
    pre: Vec<UiTransactionTokenBalance>,
    post: Vec<UiTransactionTokenBalance>,
) -> Vec<TokenBalanceChange> {
    let mut changes: Vec<TokenBalanceChange> = post
        .iter()
        .map(|after| {
            let before = pre
                .iter()
                .find(|b| b.account_index == after.account_index)
                .map(token_amount)
                .unwrap_or(0);
            TokenBalanceChange {
                account_index: after.account_index,
                owner: Option::from(after.owner.clone()),
                mint: after.mint.clone(),
                pre: before,
                post: token_amount(after),
            }
        })
        .collect();

    // accounts closed by the transaction only appear in the pre balances
    for before in &pre {
        if !post.iter().any(|a| a.account_index == before.account_index) {
            changes.push(TokenBalanceChange {
                account_index: before.account_index,
                owner: Option::from(before.owner.clone()),
                mint: before.mint.clone(),
                pre: token_amount(before),
                post: 0,
            });
        }
    }
    changes
}

#[async_trait]
impl ChainClient for RpcChainClient {
    #[instrument(skip(self))]
    async fn latest_blockhash(&self) -> Result<RecentBlockhash, ChainError> {
        let (hash, last_valid_block_height) = self
            .rpc()
            .await
            .get_latest_blockhash_with_commitment(self.commitment)
            .await
            .map_err(classify_client_error)?;
        debug!(%hash, last_valid_block_height, "Fetched blockhash");
        Ok(RecentBlockhash {
            hash,
            last_valid_block_height,
        })
    }

    async fn block_height(&self) -> Result<u64, ChainError> {
        self.rpc()
            .await
            .get_block_height()
            .await
            .map_err(classify_client_error)
    }

    #[instrument(skip(self), fields(address = %address))]
    async fn account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, ChainError> {
        let response = self
            .rpc()
            .await
            .get_account_with_commitment(address, self.commitment)
            .await
            .map_err(classify_client_error)?;
        Ok(response.value.map(|account| account.data))
    }

    #[instrument(skip(self, transaction), fields(signature = %transaction.signatures.first().copied().unwrap_or_default()))]
    async fn send_transaction(&self, transaction: &Transaction) -> Result<Signature, ChainError> {
        let config = RpcSendTransactionConfig {
            skip_preflight: false,
            preflight_commitment: Some(CommitmentLevel::Confirmed),
            encoding: None,
            // resends are driven by the submitter, not the node
            max_retries: Some(0),
            min_context_slot: None,
        };
        self.rpc()
            .await
            .send_transaction_with_config(transaction, config)
            .await
            .map_err(|e| {
                let classified = classify_client_error(e);
                warn!(error = %classified, "Send failed");
                classified
            })
    }

    async fn signature_status(&self, signature: &Signature) -> Result<SignatureState, ChainError> {
        let response = self
            .rpc()
            .await
            .get_signature_statuses(&[*signature])
            .await
            .map_err(classify_client_error)?;

        let state = match response.value.into_iter().next().flatten() {
            None => SignatureState::Pending,
            Some(status) => match status.err {
                Some(error) => SignatureState::Failed {
                    slot: status.slot,
                    error,
                },
                None if status.satisfies_commitment(self.commitment) => {
                    SignatureState::Landed { slot: status.slot }
                }
                None => SignatureState::Pending,
            },
        };
        Ok(state)
    }

    #[instrument(skip(self), fields(signature = %signature))]
    async fn transaction_receipt(&self, signature: &Signature) -> Result<Option<TransactionReceipt>, ChainError> {
        let config = RpcTransactionConfig {
            encoding: Some(UiTransactionEncoding::Json),
            commitment: Some(self.commitment),
            max_supported_transaction_version: Some(0),
        };
        let confirmed = self
            .rpc()
            .await
            .get_transaction_with_config(signature, config)
            .await
            .map_err(classify_client_error)?;

        let Some(meta) = confirmed.transaction.meta else {
            return Ok(None);
        };
        let pre_tokens: Option<Vec<UiTransactionTokenBalance>> = Option::from(meta.pre_token_balances);
        let post_tokens: Option<Vec<UiTransactionTokenBalance>> = Option::from(meta.post_token_balances);
        let logs: Option<Vec<String>> = Option::from(meta.log_messages);

        Ok(Some(TransactionReceipt {
            slot: confirmed.slot,
            fee: meta.fee,
            logs: logs.unwrap_or_default(),
            pre_balances: meta.pre_balances,
            post_balances: meta.post_balances,
            token_balances: token_balance_changes(pre_tokens.unwrap_or_default(), post_tokens.unwrap_or_default()),
        }))
    }
}
