//! Submitter: sends a signed transaction, polls for confirmation and
//! classifies the terminal state.
//!
//! The same signed bytes may be sent more than once; each send is preceded by
//! a status check so a signature the cluster already knows is never re-sent.

use crate::launchpad::error::{LaunchpadError, LaunchpadResult};
use crate::launchpad::network::{ChainClient, ChainError, SignatureState, TransactionReceipt};
use crate::launchpad::types::{EngineConfig, SignedTransaction};
use solana_sdk::{
    instruction::InstructionError,
    signature::Signature,
    transaction::TransactionError,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tokio_retry::{strategy::ExponentialBackoff, RetryIf};
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone)]
pub struct SubmitterSettings {
    pub send_retry_attempts: usize,
    pub retry_base_delay: Duration,
    pub poll_interval: Duration,
    pub confirmation_timeout: Duration,
    /// Custom program errors meaning the minimum output was not met
    pub slippage_error_codes: Vec<u32>,
}

impl From<&EngineConfig> for SubmitterSettings {
    fn from(config: &EngineConfig) -> Self {
        Self {
            send_retry_attempts: config.send_retry_attempts.max(1),
            retry_base_delay: Duration::from_millis(config.retry_base_delay_ms),
            poll_interval: Duration::from_millis(config.confirmation_poll_interval_ms.max(1)),
            confirmation_timeout: Duration::from_secs(config.confirmation_timeout_secs),
            slippage_error_codes: config.slippage_error_codes.clone(),
        }
    }
}

/// A transaction that landed at the confirmed commitment level.
#[derive(Debug, Clone)]
pub struct Confirmation {
    pub signature: Signature,
    pub slot: u64,
    /// `None` when the node could not return the transaction record
    pub receipt: Option<TransactionReceipt>,
}

pub struct Submitter<C: ChainClient> {
    chain: Arc<C>,
    settings: Arc<SubmitterSettings>,
}

impl<C: ChainClient> Clone for Submitter<C> {
    fn clone(&self) -> Self {
        Self {
            chain: self.chain.clone(),
            settings: self.settings.clone(),
        }
    }
}

impl<C: ChainClient> Submitter<C> {
    pub fn new(chain: Arc<C>, settings: SubmitterSettings) -> Self {
        Self {
            chain,
            settings: Arc::new(settings),
        }
    }

    /// Sends `signed` and waits for a terminal state.
    ///
    /// The work runs on its own task: once this is called the transaction is
    /// driven to a terminal state even if the returned future is dropped.
    #[instrument(skip(self, signed), fields(signature = %signed.signature))]
    pub async fn submit(&self, signed: SignedTransaction) -> LaunchpadResult<Confirmation> {
        let chain = self.chain.clone();
        let settings = self.settings.clone();
        let task = tokio::spawn(async move {
            send_with_retry(chain.as_ref(), &settings, &signed).await?;
            await_confirmation(chain.as_ref(), &settings, &signed).await
        });
        task.await
            .map_err(|e| LaunchpadError::internal(format!("submission task failed: {}", e)))?
    }
}

async fn send_once<C: ChainClient>(chain: &C, signed: &SignedTransaction) -> Result<(), ChainError> {
    match chain.signature_status(&signed.signature).await? {
        SignatureState::Pending => {}
        known => {
            debug!(signature = %signed.signature, state = ?known, "Signature already known, not re-sending");
            return Ok(());
        }
    }
    match chain.send_transaction(&signed.transaction).await {
        Ok(_) => Ok(()),
        // an earlier attempt landed between the status check and this send
        Err(ChainError::Rejected {
            error: Some(TransactionError::AlreadyProcessed),
            ..
        }) => Ok(()),
        Err(e) => Err(e),
    }
}

async fn send_with_retry<C: ChainClient>(
    chain: &C,
    settings: &SubmitterSettings,
    signed: &SignedTransaction,
) -> LaunchpadResult<()> {
    let attempts = AtomicUsize::new(0);
    let strategy = ExponentialBackoff::from_millis(settings.retry_base_delay.as_millis().max(1) as u64)
        .max_delay(Duration::from_secs(2))
        .take(settings.send_retry_attempts.saturating_sub(1));

    let result = RetryIf::spawn(
        strategy,
        || {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            debug!(attempt, signature = %signed.signature, "Sending transaction");
            send_once(chain, signed)
        },
        |failure: &ChainError| {
            let retry = failure.is_transient();
            if retry {
                warn!(signature = %signed.signature, "Transient send failure, retrying");
            }
            retry
        },
    )
    .await;

    let signature = signed.signature.to_string();
    match result {
        Ok(()) => {
            info!(%signature, attempts = attempts.load(Ordering::SeqCst), "Transaction sent");
            Ok(())
        }
        Err(ChainError::Transient(message)) => Err(LaunchpadError::NetworkTransient {
            attempts: attempts.load(Ordering::SeqCst),
            message,
        }),
        Err(ChainError::Rejected { error, logs }) => Err(classify_rejection(
            error.as_ref(),
            &logs,
            &signature,
            &settings.slippage_error_codes,
        )),
        Err(ChainError::Fatal(message)) => {
            Err(LaunchpadError::internal(format!("transaction {} refused: {}", signature, message)))
        }
    }
}

async fn await_confirmation<C: ChainClient>(
    chain: &C,
    settings: &SubmitterSettings,
    signed: &SignedTransaction,
) -> LaunchpadResult<Confirmation> {
    let started = Instant::now();
    let signature = signed.signature;

    loop {
        // height first: a blockhash past its last valid height can no longer land,
        // so a pending status read afterwards is final
        let expired = match chain.block_height().await {
            Ok(height) => height > signed.last_valid_block_height,
            Err(e) => {
                warn!(%signature, error = %e, "Block height poll failed");
                false
            }
        };

        match chain.signature_status(&signature).await {
            Ok(SignatureState::Landed { slot }) => {
                let receipt = match chain.transaction_receipt(&signature).await {
                    Ok(receipt) => receipt,
                    Err(e) => {
                        warn!(%signature, error = %e, "Could not fetch confirmed transaction");
                        None
                    }
                };
                info!(%signature, slot, "Transaction confirmed");
                return Ok(Confirmation { signature, slot, receipt });
            }
            Ok(SignatureState::Failed { slot, error }) => {
                let logs = match chain.transaction_receipt(&signature).await {
                    Ok(Some(receipt)) => receipt.logs,
                    _ => Vec::new(),
                };
                warn!(%signature, slot, %error, "Transaction failed on-chain");
                return Err(classify_rejection(
                    Some(&error),
                    &logs,
                    &signature.to_string(),
                    &settings.slippage_error_codes,
                ));
            }
            Ok(SignatureState::Pending) if expired => {
                warn!(%signature, last_valid_block_height = signed.last_valid_block_height, "Blockhash expired");
                return Err(LaunchpadError::Expired {
                    signature: signature.to_string(),
                });
            }
            Ok(SignatureState::Pending) => {}
            Err(e) => warn!(%signature, error = %e, "Status poll failed"),
        }

        if started.elapsed() >= settings.confirmation_timeout {
            return Err(LaunchpadError::Unconfirmed {
                signature: signature.to_string(),
                waited_secs: started.elapsed().as_secs(),
            });
        }
        sleep(settings.poll_interval).await;
    }
}

fn mentions_slippage(logs: &[String]) -> bool {
    logs.iter().any(|line| line.to_lowercase().contains("slippage"))
}

/// Maps a refused or failed transaction to the caller-facing error.
pub fn classify_rejection(
    error: Option<&TransactionError>,
    logs: &[String],
    signature: &str,
    slippage_error_codes: &[u32],
) -> LaunchpadError {
    if let Some(TransactionError::InstructionError(index, InstructionError::Custom(code))) = error {
        if slippage_error_codes.contains(code) {
            return LaunchpadError::SlippageExceeded(format!(
                "transaction {} instruction {} failed with custom error {}",
                signature, index, code
            ));
        }
    }
    if mentions_slippage(logs) {
        return LaunchpadError::SlippageExceeded(format!(
            "transaction {} rejected: minimum output not met",
            signature
        ));
    }
    match error {
        Some(TransactionError::BlockhashNotFound) => LaunchpadError::Expired {
            signature: signature.to_string(),
        },
        Some(TransactionError::SignatureFailure) => {
            LaunchpadError::internal(format!("transaction {} has an invalid signature", signature))
        }
        Some(e) => LaunchpadError::TransactionFailed {
            signature: signature.to_string(),
            message: e.to_string(),
        },
        None => LaunchpadError::TransactionFailed {
            signature: signature.to_string(),
            message: "rejected without an error code".to_string(),
        },
    }
}
