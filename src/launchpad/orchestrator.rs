//! Launch/buy orchestrator for live network mode.
//!
//! Sequences validation, pricing, building, signing and submission for one
//! intent and is the only place where a [`LaunchpadError`] becomes an
//! [`OperationResult`].

use crate::launchpad::addresses::{parse_pubkey, ProgramAddresses};
use crate::launchpad::calculator::{self, lamports_to_sol};
use crate::launchpad::error::{LaunchpadError, LaunchpadResult};
use crate::launchpad::instructions::{self, BuyPlanInput, LaunchPlanInput};
use crate::launchpad::metadata::{MetadataExtensions, MetadataStore, TokenMetadataDocument};
use crate::launchpad::network::ChainClient;
use crate::launchpad::pool::pool_state_from_accounts;
use crate::launchpad::signer::{self, SecretMaterial};
use crate::launchpad::submitter::{Confirmation, Submitter, SubmitterSettings};
use crate::launchpad::types::{
    BuyReceipt, EngineConfig, ExecutionMode, LaunchReceipt, OperationResult, PoolState, Quote, Receipt,
    SignedTransaction, TransactionPlan,
};
use crate::launchpad::LaunchpadService;
use crate::types::{BuyIntent, Intent, LaunchIntent, MAX_URI_LEN};
use async_trait::async_trait;
use moka::future::Cache;
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

const IDEMPOTENCY_CAPACITY: u64 = 10_000;

/// Pipeline position of an operation, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validating,
    Pricing,
    Building,
    Signing,
    Submitting,
}

pub struct Orchestrator<C: ChainClient> {
    chain: Arc<C>,
    submitter: Submitter<C>,
    metadata: Option<Arc<dyn MetadataStore>>,
    config: Arc<EngineConfig>,
    completed: Cache<String, OperationResult>,
}

impl<C: ChainClient> Orchestrator<C> {
    pub fn new(chain: Arc<C>, config: EngineConfig) -> Self {
        let submitter = Submitter::new(chain.clone(), SubmitterSettings::from(&config));
        let completed = Cache::builder()
            .max_capacity(IDEMPOTENCY_CAPACITY)
            .time_to_live(Duration::from_secs(config.idempotency_ttl_secs.max(1)))
            .build();
        Self {
            chain,
            submitter,
            metadata: None,
            config: Arc::new(config),
            completed,
        }
    }

    /// Store used for the off-chain metadata document of launches.
    pub fn with_metadata_store(mut self, store: Arc<dyn MetadataStore>) -> Self {
        self.metadata = Some(store);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Reads the pool for `mint` and the global config, fresh, and builds the pricing snapshot.
    #[instrument(skip(self), fields(mint = %mint))]
    pub async fn fetch_pool_state(&self, mint: &Pubkey) -> LaunchpadResult<PoolState> {
        let addresses = ProgramAddresses::resolve(&self.config.programs)?;
        let pool_address = addresses.pool_state(mint);

        let pool_data = self.chain.account_data(&pool_address).await?.ok_or_else(|| {
            LaunchpadError::InvalidPoolState(format!("no launchpad pool {} for mint {}", pool_address, mint))
        })?;
        let global_data = self
            .chain
            .account_data(&addresses.global_config)
            .await?
            .ok_or_else(|| {
                LaunchpadError::InvalidPoolState(format!("global config {} not found", addresses.global_config))
            })?;

        let pool = pool_state_from_accounts(&addresses, mint, &pool_data, &global_data, self.config.platform_fee_bps)?;
        debug!(
            pool = %pool.address,
            base_reserve = pool.base_reserve,
            quote_reserve = pool.quote_reserve,
            fee_bps = pool.fee_bps,
            "Pool state loaded"
        );
        Ok(pool)
    }

    /// Buys `intent.token_address` with `intent.amount_sol`.
    #[instrument(skip(self, intent), fields(token = %intent.token_address, amount_sol = intent.amount_sol, slippage_bps = intent.slippage_bps))]
    pub async fn buy(&self, intent: BuyIntent) -> LaunchpadResult<BuyReceipt> {
        debug!(stage = ?Stage::Validating, "Buy started");
        intent.validate()?;
        let BuyIntent {
            token_address,
            amount_sol,
            slippage_bps,
            secret,
            ..
        } = intent;
        let mint = parse_pubkey("token_address", &token_address)?;
        let buyer = signer::resolve_pubkey(&secret)?;

        debug!(stage = ?Stage::Pricing, "Reading pool");
        let pool = self.fetch_pool_state(&mint).await?;
        let quote = calculator::compute(&pool, amount_sol, slippage_bps)?;
        info!(
            expected_tokens = quote.expected_tokens,
            minimum_tokens = quote.minimum_tokens,
            fee_bps = quote.fee_bps,
            "Quote computed"
        );

        debug!(stage = ?Stage::Building, "Building buy plan");
        let blockhash = self.chain.latest_blockhash().await?;
        let plan = instructions::build_buy(
            &BuyPlanInput {
                buyer,
                token_address,
                amount_in_lamports: quote.amount_in_lamports,
                minimum_tokens: quote.minimum_tokens,
            },
            &pool,
            &self.config,
            blockhash,
        )?;

        debug!(stage = ?Stage::Signing, "Signing buy plan");
        let signed = sign_and_discard(plan, secret, self.config.plan_ttl_secs)?;

        debug!(stage = ?Stage::Submitting, signature = %signed.signature, "Submitting buy");
        let confirmation = self.submitter.submit(signed).await?;
        Ok(buy_receipt(&mint, &buyer, &quote, &confirmation))
    }

    /// Creates a new token and its pool, paid for by the configured launcher wallet.
    #[instrument(skip(self, intent), fields(name = %intent.name, symbol = %intent.symbol))]
    pub async fn launch(&self, intent: LaunchIntent) -> LaunchpadResult<LaunchReceipt> {
        debug!(stage = ?Stage::Validating, "Launch started");
        intent.validate()?;
        let launcher = self
            .config
            .launcher_keypair
            .as_ref()
            .filter(|secret| !secret.is_empty())
            .ok_or_else(|| LaunchpadError::internal("launcher keypair is not configured"))?;
        let creator = signer::resolve_pubkey(launcher)?;
        let store = self
            .metadata
            .as_ref()
            .ok_or_else(|| LaunchpadError::internal("metadata upload endpoint is not configured"))?;

        let image_url = intent
            .image_url
            .clone()
            .unwrap_or_else(|| self.config.default_image_uri.clone());
        let document = TokenMetadataDocument {
            name: intent.name.clone(),
            symbol: intent.symbol.clone(),
            description: intent.description.clone().unwrap_or_default(),
            image: image_url.clone(),
            extensions: MetadataExtensions {
                twitter: intent.twitter.clone(),
                telegram: intent.telegram.clone(),
                website: intent.website.clone(),
            },
        };
        let uri = store.store(&document).await?;
        if uri.len() > MAX_URI_LEN {
            return Err(LaunchpadError::internal(format!(
                "metadata uri is {} bytes, the on-chain limit is {}",
                uri.len(),
                MAX_URI_LEN
            )));
        }

        debug!(stage = ?Stage::Building, %uri, "Building launch plan");
        let blockhash = self.chain.latest_blockhash().await?;
        let launch = instructions::build_launch(
            &LaunchPlanInput {
                name: intent.name,
                symbol: intent.symbol,
                uri: uri.clone(),
                creator,
            },
            &self.config,
            blockhash,
        )?;
        let mint = launch.mint;
        let pool_state = launch.pool_state;

        debug!(stage = ?Stage::Signing, %mint, "Signing launch plan");
        let signed = signer::sign(launch.plan, launcher, self.config.plan_ttl_secs)?;

        debug!(stage = ?Stage::Submitting, signature = %signed.signature, "Submitting launch");
        let confirmation = self.submitter.submit(signed).await?;
        info!(%mint, %pool_state, signature = %confirmation.signature, "Token launched");

        Ok(LaunchReceipt {
            mint_address: mint.to_string(),
            pool_state: pool_state.to_string(),
            uri,
            image_url,
            transaction_hash: confirmation.signature.to_string(),
        })
    }
}

/// Signs with a per-request secret and drops the secret on every path.
fn sign_and_discard(
    plan: TransactionPlan,
    secret: SecretMaterial,
    plan_ttl_secs: u64,
) -> LaunchpadResult<SignedTransaction> {
    let signed = signer::sign(plan, &secret, plan_ttl_secs);
    drop(secret);
    signed
}

/// Reports realized amounts from the confirmed record, or the quote when the
/// record is unavailable.
fn buy_receipt(mint: &Pubkey, buyer: &Pubkey, quote: &Quote, confirmation: &Confirmation) -> BuyReceipt {
    let realized = confirmation.receipt.as_ref().and_then(|receipt| {
        let tokens = receipt.token_delta(buyer, mint)?;
        let spent = receipt.fee_payer_spent()?.saturating_sub(receipt.fee);
        Some((tokens, spent))
    });

    let (tokens_received, lamports_spent, amounts_verified) = match realized {
        Some((tokens, spent)) => (tokens, spent, true),
        None => {
            warn!(signature = %confirmation.signature, "Realized amounts unavailable, reporting quote");
            (quote.expected_tokens, quote.amount_in_lamports, false)
        }
    };

    BuyReceipt {
        mint_address: mint.to_string(),
        sol_spent: lamports_to_sol(lamports_spent),
        tokens_received,
        expected_tokens: quote.expected_tokens,
        minimum_tokens: quote.minimum_tokens,
        transaction_hash: confirmation.signature.to_string(),
        amounts_verified,
    }
}

fn idempotency_entry(intent: &Intent) -> Option<String> {
    intent
        .idempotency_key()
        .map(|key| format!("{}:{}", intent.kind(), key))
}

impl<C: ChainClient> Orchestrator<C> {
    async fn run(&self, intent: Intent) -> OperationResult {
        let outcome = match intent {
            Intent::Launch(launch) => self.launch(launch).await.map(Receipt::Launch),
            Intent::Buy(buy) => self.buy(buy).await.map(Receipt::Buy),
        };
        match outcome {
            Ok(receipt) => OperationResult::Success(receipt),
            Err(err) => {
                if err.is_unexpected() {
                    error!(code = %err.reason_code(), error = %err, "Operation failed unexpectedly");
                } else {
                    warn!(code = %err.reason_code(), error = %err, "Operation failed");
                }
                OperationResult::from_error(&err)
            }
        }
    }
}

#[async_trait]
impl<C: ChainClient> LaunchpadService for Orchestrator<C> {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Live
    }

    #[instrument(skip(self, intent), fields(kind = intent.kind()))]
    async fn execute(&self, intent: Intent) -> OperationResult {
        let key = match idempotency_entry(&intent) {
            Some(key) => key,
            None => return self.run(intent).await,
        };
        if let Some(previous) = self.completed.get(&key).await {
            info!(%key, "Returning result of completed operation");
            return previous;
        }

        // Concurrent callers with the same key share one run. Only successes
        // are inserted; a failure goes to the callers that waited on it.
        let shared = self
            .completed
            .try_get_with(key, async {
                match self.run(intent).await {
                    success @ OperationResult::Success(_) => Ok(success),
                    failure => Err(failure),
                }
            })
            .await;
        match shared {
            Ok(result) => result,
            Err(failure) => failure.as_ref().clone(),
        }
    }
}
