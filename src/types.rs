//! Boundary types: the request bodies accepted from the outside and the
//! validated intents handed to the launch/buy core.

use crate::launchpad::addresses::parse_pubkey;
use crate::launchpad::calculator::{validate_inputs, BPS_DENOMINATOR};
use crate::launchpad::error::{LaunchpadError, LaunchpadResult};
use crate::launchpad::signer::SecretMaterial;
use reqwest::Url;
use serde::{Deserialize, Serialize};

/// Metaplex limit on the on-chain name.
pub const MAX_NAME_LEN: usize = 32;
/// Metaplex limit on the on-chain symbol, in bytes.
pub const MAX_SYMBOL_LEN: usize = 10;
/// Metaplex limit on the on-chain uri.
pub const MAX_URI_LEN: usize = 200;
/// Slippage percentage used when a buy request omits it.
pub const DEFAULT_SLIPPAGE_PERCENT: f64 = 5.0;

fn default_slippage_percent() -> f64 {
    DEFAULT_SLIPPAGE_PERCENT
}

/// Body of a launch request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchTokenRequest {
    pub name: String,
    pub symbol: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub twitter: Option<String>,
    #[serde(default)]
    pub telegram: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    /// Falls back to the configured default image when absent or blank
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

/// Body of a buy request. `keypair` is the buyer's base58 secret.
#[derive(Debug, Clone, Deserialize)]
pub struct BuyTokenRequest {
    pub token_address: String,
    pub amount_sol: f64,
    /// Percent, e.g. `5.0` for 5%
    #[serde(default = "default_slippage_percent")]
    pub slippage: f64,
    pub keypair: SecretMaterial,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

/// Either request, as read by the runner: `{"launch": {...}}` or `{"buy": {...}}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Request {
    Launch(LaunchTokenRequest),
    Buy(BuyTokenRequest),
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Converts a slippage percentage to basis points.
pub fn slippage_percent_to_bps(percent: f64) -> LaunchpadResult<u64> {
    if !percent.is_finite() || !(0.0..=100.0).contains(&percent) {
        return Err(LaunchpadError::validation(format!(
            "slippage must be a percentage within 0..=100, got {}",
            percent
        )));
    }
    Ok(((percent * 100.0).round() as u64).min(BPS_DENOMINATOR))
}

/// A request to create a mint, attach metadata and seed a pool.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchIntent {
    pub name: String,
    pub symbol: String,
    pub description: Option<String>,
    pub twitter: Option<String>,
    pub telegram: Option<String>,
    pub website: Option<String>,
    pub image_url: Option<String>,
    pub idempotency_key: Option<String>,
}

impl LaunchIntent {
    pub fn validate(&self) -> LaunchpadResult<()> {
        if self.name.is_empty() {
            return Err(LaunchpadError::validation("name must not be empty"));
        }
        if self.name.len() > MAX_NAME_LEN {
            return Err(LaunchpadError::validation(format!(
                "name must be at most {} bytes",
                MAX_NAME_LEN
            )));
        }
        if self.symbol.is_empty() {
            return Err(LaunchpadError::validation("symbol must not be empty"));
        }
        if self.symbol.len() > MAX_SYMBOL_LEN {
            return Err(LaunchpadError::validation(format!(
                "symbol must be at most {} bytes",
                MAX_SYMBOL_LEN
            )));
        }
        if let Some(image_url) = &self.image_url {
            Url::parse(image_url)
                .map_err(|e| LaunchpadError::validation(format!("image_url is not a valid URI: {}", e)))?;
        }
        Ok(())
    }
}

impl From<LaunchTokenRequest> for LaunchIntent {
    fn from(request: LaunchTokenRequest) -> Self {
        Self {
            name: request.name.trim().to_string(),
            symbol: request.symbol.trim().to_string(),
            description: non_blank(request.description),
            twitter: non_blank(request.twitter),
            telegram: non_blank(request.telegram),
            website: non_blank(request.website),
            image_url: non_blank(request.image_url),
            idempotency_key: non_blank(request.idempotency_key),
        }
    }
}

/// A request to spend SOL on an existing token.
///
/// Holds the buyer's secret until the signing step consumes it.
#[derive(Debug, Clone)]
pub struct BuyIntent {
    pub token_address: String,
    pub amount_sol: f64,
    pub slippage_bps: u64,
    pub secret: SecretMaterial,
    pub idempotency_key: Option<String>,
}

impl BuyIntent {
    /// Shape and range checks. No network access, no pool read.
    pub fn validate(&self) -> LaunchpadResult<()> {
        parse_pubkey("token_address", &self.token_address)?;
        validate_inputs(self.amount_sol, self.slippage_bps)?;
        if self.secret.is_empty() {
            return Err(LaunchpadError::InvalidKeypair("keypair is required".to_string()));
        }
        Ok(())
    }
}

impl TryFrom<BuyTokenRequest> for BuyIntent {
    type Error = LaunchpadError;

    fn try_from(request: BuyTokenRequest) -> LaunchpadResult<Self> {
        Ok(Self {
            token_address: request.token_address.trim().to_string(),
            amount_sol: request.amount_sol,
            slippage_bps: slippage_percent_to_bps(request.slippage)?,
            secret: request.keypair,
            idempotency_key: non_blank(request.idempotency_key),
        })
    }
}

#[derive(Debug, Clone)]
pub enum Intent {
    Launch(LaunchIntent),
    Buy(BuyIntent),
}

impl Intent {
    pub fn kind(&self) -> &'static str {
        match self {
            Intent::Launch(_) => "launch",
            Intent::Buy(_) => "buy",
        }
    }

    pub fn idempotency_key(&self) -> Option<&str> {
        match self {
            Intent::Launch(intent) => intent.idempotency_key.as_deref(),
            Intent::Buy(intent) => intent.idempotency_key.as_deref(),
        }
    }
}

impl TryFrom<Request> for Intent {
    type Error = LaunchpadError;

    fn try_from(request: Request) -> LaunchpadResult<Self> {
        Ok(match request {
            Request::Launch(launch) => Intent::Launch(launch.into()),
            Request::Buy(buy) => Intent::Buy(buy.try_into()?),
        })
    }
}
