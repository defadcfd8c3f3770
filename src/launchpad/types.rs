//! Core types for the launch/buy pipeline: configuration, pool snapshots,
//! transaction plans and the normalized operation result.

use crate::launchpad::addresses;
use crate::launchpad::error::{LaunchpadError, LaunchpadResult, ReasonCode};
use crate::launchpad::signer::SecretMaterial;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use solana_sdk::{
    hash::Hash,
    instruction::Instruction,
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
    transaction::Transaction,
};

/// Execution strategy selected once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Build, sign and submit real transactions.
    Live,
    /// Validate and price locally, return fixed illustrative values, never touch the network.
    Simulation,
}

impl ExecutionMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "live" | "mainnet" | "production" => Some(ExecutionMode::Live),
            "simulation" | "simulate" | "test" | "dev" => Some(ExecutionMode::Simulation),
            _ => None,
        }
    }
}

/// On-chain program and account addresses, kept as base58 strings until the
/// instruction builder resolves them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramConfig {
    pub launchpad_program: String,
    pub global_config: String,
    pub platform_config: String,
    pub quote_mint: String,
    pub metadata_program: String,
}

impl Default for ProgramConfig {
    fn default() -> Self {
        Self {
            launchpad_program: addresses::LAUNCHPAD_PROGRAM.to_string(),
            global_config: addresses::DEFAULT_GLOBAL_CONFIG.to_string(),
            platform_config: addresses::DEFAULT_PLATFORM_CONFIG.to_string(),
            quote_mint: addresses::WSOL_MINT.to_string(),
            metadata_program: addresses::METADATA_PROGRAM.to_string(),
        }
    }
}

/// Curve parameters used when seeding a new launch pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveConfig {
    /// Decimals of newly created mints
    pub decimals: u8,
    /// Total supply in base units
    pub supply: u64,
    /// Base units sold along the curve before migration
    pub total_base_sell: u64,
    /// Quote lamports raised before migration
    pub total_quote_fund_raising: u64,
    /// 0 = AMM, 1 = CPMM
    pub migrate_type: u8,
}

impl Default for CurveConfig {
    fn default() -> Self {
        Self {
            decimals: 6,
            supply: 1_000_000_000_000_000,
            total_base_sell: 793_100_000_000_000,
            total_quote_fund_raising: 85_000_000_000,
            migrate_type: 1,
        }
    }
}

/// Read-only configuration shared by every operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Live network or simulation
    pub mode: ExecutionMode,
    /// RPC endpoints, used round-robin
    pub rpc_endpoints: Vec<String>,
    /// RPC timeout in seconds
    pub rpc_timeout_seconds: u64,
    /// RPC calls allowed per second across all operations
    pub rpc_rate_limit_per_second: u32,
    /// Image used when a launch request carries none
    pub default_image_uri: String,
    /// Endpoint receiving the off-chain metadata document
    pub metadata_upload_url: Option<String>,
    /// Wallet paying for and creating launches
    #[serde(skip_serializing)]
    pub launcher_keypair: Option<SecretMaterial>,
    /// Program and account addresses
    pub programs: ProgramConfig,
    /// Launch curve parameters
    pub curve: CurveConfig,
    /// Platform fee added to the on-chain trade fee, in bps
    pub platform_fee_bps: u64,
    /// Compute unit limit attached to every transaction
    pub compute_unit_limit: u32,
    /// Static compute unit price in micro-lamports
    pub compute_unit_price_micro_lamports: u64,
    /// Send attempts on transient network errors
    pub send_retry_attempts: usize,
    /// Base delay for send retry backoff
    pub retry_base_delay_ms: u64,
    /// Confirmation polling interval
    pub confirmation_poll_interval_ms: u64,
    /// Hard cap on confirmation polling
    pub confirmation_timeout_secs: u64,
    /// Maximum age of a plan before it must be rebuilt
    pub plan_ttl_secs: u64,
    /// Custom program error codes meaning "minimum output not met"
    pub slippage_error_codes: Vec<u32>,
    /// Lifetime of idempotency entries
    pub idempotency_ttl_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Simulation,
            rpc_endpoints: vec!["https://api.mainnet-beta.solana.com".to_string()],
            rpc_timeout_seconds: 30,
            rpc_rate_limit_per_second: 20,
            default_image_uri: "https://arweave.net/bonk-default-token.png".to_string(),
            metadata_upload_url: None,
            launcher_keypair: None,
            programs: ProgramConfig::default(),
            curve: CurveConfig::default(),
            platform_fee_bps: 100,
            compute_unit_limit: 300_000,
            compute_unit_price_micro_lamports: 100_000,
            send_retry_attempts: 3,
            retry_base_delay_ms: 200,
            confirmation_poll_interval_ms: 500,
            confirmation_timeout_secs: 90,
            plan_ttl_secs: 60,
            slippage_error_codes: vec![6004],
            idempotency_ttl_secs: 600,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> anyhow::Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("{} is invalid: {}", name, e)),
        _ => Ok(None),
    }
}

impl EngineConfig {
    /// Defaults overridden by `BONK_*` / `SOLANA_RPC_URLS` environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = EngineConfig::default();

        if let Ok(mode) = std::env::var("BONK_MODE") {
            config.mode = ExecutionMode::parse(&mode)
                .ok_or_else(|| anyhow::anyhow!("BONK_MODE must be 'live' or 'simulation', got '{}'", mode))?;
        }
        if let Ok(urls) = std::env::var("SOLANA_RPC_URLS") {
            let endpoints: Vec<String> = urls
                .split(',')
                .map(|url| url.trim().to_string())
                .filter(|url| !url.is_empty())
                .collect();
            if !endpoints.is_empty() {
                config.rpc_endpoints = endpoints;
            }
        }
        if let Ok(image) = std::env::var("BONK_DEFAULT_IMAGE_URI") {
            config.default_image_uri = image;
        }
        config.metadata_upload_url = std::env::var("BONK_METADATA_UPLOAD_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());
        config.launcher_keypair = std::env::var("BONK_LAUNCHER_KEYPAIR")
            .ok()
            .map(SecretMaterial::new)
            .filter(|secret| !secret.is_empty());
        if let Ok(codes) = std::env::var("BONK_SLIPPAGE_ERROR_CODES") {
            config.slippage_error_codes = codes
                .split(',')
                .filter(|code| !code.trim().is_empty())
                .map(|code| code.trim().parse::<u32>())
                .collect::<Result<_, _>>()
                .map_err(|e| anyhow::anyhow!("BONK_SLIPPAGE_ERROR_CODES is invalid: {}", e))?;
        }
        if let Some(value) = env_parse("BONK_PLATFORM_FEE_BPS")? {
            config.platform_fee_bps = value;
        }
        if let Some(value) = env_parse("BONK_COMPUTE_UNIT_LIMIT")? {
            config.compute_unit_limit = value;
        }
        if let Some(value) = env_parse("BONK_COMPUTE_UNIT_PRICE")? {
            config.compute_unit_price_micro_lamports = value;
        }
        if let Some(value) = env_parse("BONK_SEND_RETRY_ATTEMPTS")? {
            config.send_retry_attempts = value;
        }
        if let Some(value) = env_parse("BONK_CONFIRMATION_TIMEOUT_SECS")? {
            config.confirmation_timeout_secs = value;
        }
        if let Some(value) = env_parse("BONK_RPC_RATE_LIMIT")? {
            config.rpc_rate_limit_per_second = value;
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks ranges that would otherwise fail deep inside an operation.
    pub fn validate(&self) -> LaunchpadResult<()> {
        if self.mode == ExecutionMode::Live && self.rpc_endpoints.is_empty() {
            return Err(LaunchpadError::validation(
                "rpc_endpoints must contain at least one endpoint in live mode",
            ));
        }
        if self.default_image_uri.trim().is_empty() {
            return Err(LaunchpadError::validation("default_image_uri must not be empty"));
        }
        if self.platform_fee_bps > 10_000 {
            return Err(LaunchpadError::validation("platform_fee_bps must be <= 10000"));
        }
        if self.send_retry_attempts == 0 {
            return Err(LaunchpadError::validation("send_retry_attempts must be > 0"));
        }
        if self.confirmation_poll_interval_ms == 0 {
            return Err(LaunchpadError::validation(
                "confirmation_poll_interval_ms must be > 0",
            ));
        }
        if self.curve.total_base_sell > self.curve.supply {
            return Err(LaunchpadError::validation(
                "curve.total_base_sell must not exceed curve.supply",
            ));
        }
        Ok(())
    }
}

/// Pricing function of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoolKind {
    /// Plain x*y=k pool over real reserves.
    ConstantProduct,
    /// Launchpad curve over effective (virtual + real) reserves; output is
    /// capped by what is left for sale on the curve.
    BondingCurve { remaining_base: u64 },
}

/// Snapshot of a pool read for a single operation. Never cached.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolState {
    /// Pool account address
    pub address: Pubkey,
    /// Token being bought
    pub base_mint: Pubkey,
    /// Token being spent (wrapped SOL)
    pub quote_mint: Pubkey,
    /// Base reserve used for pricing
    pub base_reserve: u64,
    /// Quote reserve used for pricing, in lamports
    pub quote_reserve: u64,
    /// Total fee taken from the input, in bps
    pub fee_bps: u64,
    pub kind: PoolKind,
    pub creator: Pubkey,
    pub global_config: Pubkey,
    pub platform_config: Pubkey,
}

/// Output of the amount calculator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub amount_in_lamports: u64,
    pub expected_tokens: u64,
    pub minimum_tokens: u64,
    pub fee_bps: u64,
    pub slippage_bps: u64,
}

/// Blockhash attached to a plan together with the height after which it expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecentBlockhash {
    pub hash: Hash,
    pub last_valid_block_height: u64,
}

/// Ordered instructions plus fee payer and blockhash. Consumed by signing.
pub struct TransactionPlan {
    pub instructions: Vec<Instruction>,
    pub fee_payer: Pubkey,
    pub blockhash: RecentBlockhash,
    /// Keypairs generated for this plan (e.g. a new mint) that must co-sign.
    pub co_signers: Vec<Keypair>,
    pub built_at: DateTime<Utc>,
}

impl TransactionPlan {
    pub fn new(
        instructions: Vec<Instruction>,
        fee_payer: Pubkey,
        blockhash: RecentBlockhash,
        co_signers: Vec<Keypair>,
    ) -> Self {
        Self {
            instructions,
            fee_payer,
            blockhash,
            co_signers,
            built_at: Utc::now(),
        }
    }

    /// A plan older than `ttl_secs` carries a blockhash that may already be dead.
    pub fn is_stale(&self, now: DateTime<Utc>, ttl_secs: u64) -> bool {
        now - self.built_at > ChronoDuration::seconds(ttl_secs as i64)
    }

    pub fn program_ids(&self) -> Vec<Pubkey> {
        self.instructions.iter().map(|ix| ix.program_id).collect()
    }
}

// Keypair's Debug prints secret bytes, so only public keys are shown here.
impl std::fmt::Debug for TransactionPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let co_signers: Vec<Pubkey> = self.co_signers.iter().map(|k| k.pubkey()).collect();
        f.debug_struct("TransactionPlan")
            .field("instructions", &self.instructions.len())
            .field("fee_payer", &self.fee_payer)
            .field("blockhash", &self.blockhash)
            .field("co_signers", &co_signers)
            .field("built_at", &self.built_at)
            .finish()
    }
}

/// A fully signed transaction. Re-sending it is byte-identical and therefore safe.
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    pub transaction: Transaction,
    pub signature: Signature,
    pub fee_payer: Pubkey,
    pub last_valid_block_height: u64,
}

/// Successful launch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchReceipt {
    pub mint_address: String,
    pub pool_state: String,
    pub uri: String,
    pub image_url: String,
    pub transaction_hash: String,
}

/// Successful buy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuyReceipt {
    pub mint_address: String,
    pub sol_spent: f64,
    pub tokens_received: u64,
    pub expected_tokens: u64,
    pub minimum_tokens: u64,
    pub transaction_hash: String,
    /// False when realized amounts could not be read back and the quote was reported instead
    pub amounts_verified: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Receipt {
    Launch(LaunchReceipt),
    Buy(BuyReceipt),
}

/// The only value that crosses back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationResult {
    Success(Receipt),
    Failure { code: ReasonCode, message: String },
}

impl OperationResult {
    pub fn from_error(err: &LaunchpadError) -> Self {
        OperationResult::Failure {
            code: err.reason_code(),
            message: err.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, OperationResult::Success(_))
    }

    pub fn reason_code(&self) -> Option<ReasonCode> {
        match self {
            OperationResult::Success(_) => None,
            OperationResult::Failure { code, .. } => Some(*code),
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            OperationResult::Success(_) => 200,
            OperationResult::Failure { code, .. } => code.http_status(),
        }
    }

    /// Flat response body for the HTTP layer: the receipt fields on success,
    /// `{code, message}` on failure.
    pub fn response_body(&self) -> serde_json::Value {
        match self {
            OperationResult::Success(Receipt::Launch(receipt)) => {
                serde_json::to_value(receipt).unwrap_or(serde_json::Value::Null)
            }
            OperationResult::Success(Receipt::Buy(receipt)) => {
                serde_json::to_value(receipt).unwrap_or(serde_json::Value::Null)
            }
            OperationResult::Failure { code, message } => serde_json::json!({
                "code": code,
                "message": message,
            }),
        }
    }
}
