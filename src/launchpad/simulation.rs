//! Simulation strategy: validates and prices locally and answers with
//! deterministic illustrative values. Never builds a network client.

use crate::launchpad::addresses::{parse_pubkey, ProgramAddresses};
use crate::launchpad::calculator::{self, lamports_to_sol};
use crate::launchpad::error::LaunchpadResult;
use crate::launchpad::signer;
use crate::launchpad::types::{
    BuyReceipt, EngineConfig, ExecutionMode, LaunchReceipt, OperationResult, PoolKind, PoolState, Receipt,
};
use crate::launchpad::LaunchpadService;
use crate::types::{BuyIntent, Intent, LaunchIntent};
use async_trait::async_trait;
use solana_sdk::{
    hash::hashv,
    native_token::LAMPORTS_PER_SOL,
    pubkey::Pubkey,
    signature::Signature,
};
use tracing::{info, instrument, warn};

/// Base units on the illustrative pool (1.073B tokens at 6 decimals).
const SIMULATED_BASE_RESERVE: u64 = 1_073_000_000_000_000;
/// Quote lamports on the illustrative pool.
const SIMULATED_QUOTE_RESERVE: u64 = 30 * LAMPORTS_PER_SOL;
const SIMULATED_FEE_BPS: u64 = 125;
const SIMULATED_METADATA_HOST: &str = "https://simulation.invalid/metadata";

pub struct SimulatedLaunchpad {
    config: EngineConfig,
}

impl SimulatedLaunchpad {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// The fixed constant-product pool every simulated buy is priced against.
    pub fn illustrative_pool(&self, mint: &Pubkey) -> LaunchpadResult<PoolState> {
        let addresses = ProgramAddresses::resolve(&self.config.programs)?;
        Ok(PoolState {
            address: addresses.pool_state(mint),
            base_mint: *mint,
            quote_mint: addresses.quote_mint,
            base_reserve: SIMULATED_BASE_RESERVE,
            quote_reserve: SIMULATED_QUOTE_RESERVE,
            fee_bps: SIMULATED_FEE_BPS,
            kind: PoolKind::ConstantProduct,
            creator: Pubkey::default(),
            global_config: addresses.global_config,
            platform_config: addresses.platform_config,
        })
    }

    #[instrument(skip(self, intent), fields(symbol = %intent.symbol))]
    fn launch(&self, intent: &LaunchIntent) -> LaunchpadResult<LaunchReceipt> {
        intent.validate()?;
        let addresses = ProgramAddresses::resolve(&self.config.programs)?;
        let image_url = intent
            .image_url
            .clone()
            .unwrap_or_else(|| self.config.default_image_uri.clone());

        let mint = Pubkey::new_from_array(
            hashv(&[b"simulated-mint", intent.name.as_bytes(), intent.symbol.as_bytes()]).to_bytes(),
        );
        let transaction_hash = simulated_signature(&[
            b"launch",
            intent.name.as_bytes(),
            intent.symbol.as_bytes(),
            intent.description.as_deref().unwrap_or_default().as_bytes(),
            image_url.as_bytes(),
        ]);

        Ok(LaunchReceipt {
            mint_address: mint.to_string(),
            pool_state: addresses.pool_state(&mint).to_string(),
            uri: format!("{}/{}.json", SIMULATED_METADATA_HOST, mint),
            image_url,
            transaction_hash: transaction_hash.to_string(),
        })
    }

    #[instrument(skip(self, intent), fields(token = %intent.token_address))]
    fn buy(&self, intent: &BuyIntent) -> LaunchpadResult<BuyReceipt> {
        intent.validate()?;
        let mint = parse_pubkey("token_address", &intent.token_address)?;
        let buyer = signer::resolve_pubkey(&intent.secret)?;

        let pool = self.illustrative_pool(&mint)?;
        let quote = calculator::compute(&pool, intent.amount_sol, intent.slippage_bps)?;
        let transaction_hash = simulated_signature(&[
            b"buy",
            mint.as_ref(),
            buyer.as_ref(),
            &quote.amount_in_lamports.to_le_bytes(),
            &quote.slippage_bps.to_le_bytes(),
        ]);

        Ok(BuyReceipt {
            mint_address: mint.to_string(),
            sol_spent: lamports_to_sol(quote.amount_in_lamports),
            tokens_received: quote.expected_tokens,
            expected_tokens: quote.expected_tokens,
            minimum_tokens: quote.minimum_tokens,
            transaction_hash: transaction_hash.to_string(),
            amounts_verified: false,
        })
    }
}

/// 64 bytes derived from the request so the same input always yields the same hash.
fn simulated_signature(parts: &[&[u8]]) -> Signature {
    let first = hashv(parts);
    let second = hashv(&[&first.to_bytes()]);
    let mut bytes = [0u8; 64];
    bytes[..32].copy_from_slice(&first.to_bytes());
    bytes[32..].copy_from_slice(&second.to_bytes());
    Signature::from(bytes)
}

#[async_trait]
impl LaunchpadService for SimulatedLaunchpad {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Simulation
    }

    async fn execute(&self, intent: Intent) -> OperationResult {
        let outcome = match &intent {
            Intent::Launch(launch) => self.launch(launch).map(Receipt::Launch),
            Intent::Buy(buy) => self.buy(buy).map(Receipt::Buy),
        };
        match outcome {
            Ok(receipt) => {
                info!(kind = intent.kind(), "Simulated operation completed");
                OperationResult::Success(receipt)
            }
            Err(err) => {
                warn!(kind = intent.kind(), code = %err.reason_code(), error = %err, "Simulated operation failed");
                OperationResult::from_error(&err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launchpad::signer::SecretMaterial;
    use solana_sdk::signature::Keypair;

    #[tokio::test]
    async fn test_same_launch_gives_same_values() {
        let sim = SimulatedLaunchpad::new(EngineConfig::default());
        let intent = LaunchIntent {
            name: "Bonk Dog".to_string(),
            symbol: "BDOG".to_string(),
            description: None,
            twitter: None,
            telegram: None,
            website: None,
            image_url: None,
            idempotency_key: None,
        };
        let first = sim.execute(Intent::Launch(intent.clone())).await;
        let second = sim.execute(Intent::Launch(intent)).await;
        assert!(first.is_success());
        assert_eq!(first, second);
        match first {
            OperationResult::Success(Receipt::Launch(receipt)) => {
                assert_eq!(receipt.image_url, EngineConfig::default().default_image_uri);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_simulated_buy_prices_against_fixed_pool() {
        let sim = SimulatedLaunchpad::new(EngineConfig::default());
        let buyer = Keypair::new();
        let mint = Pubkey::new_unique();
        let intent = BuyIntent {
            token_address: mint.to_string(),
            amount_sol: 1.0,
            slippage_bps: 500,
            secret: SecretMaterial::new(bs58::encode(buyer.to_bytes()).into_string()),
            idempotency_key: None,
        };
        let expected = calculator::compute(&sim.illustrative_pool(&mint).unwrap(), 1.0, 500).unwrap();
        match sim.execute(Intent::Buy(intent)).await {
            OperationResult::Success(Receipt::Buy(receipt)) => {
                assert_eq!(receipt.expected_tokens, expected.expected_tokens);
                assert_eq!(receipt.minimum_tokens, expected.minimum_tokens);
                assert_eq!(receipt.sol_spent, 1.0);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }
}
