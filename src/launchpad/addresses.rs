//! Program ids and derived addresses for the launchpad, Metaplex metadata and
//! SPL token accounts.

use crate::launchpad::error::{LaunchpadError, LaunchpadResult};
use crate::launchpad::types::ProgramConfig;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;

/// Raydium LaunchLab program (backs letsbonk.fun launches).
pub const LAUNCHPAD_PROGRAM: &str = "LanMV9sAd7wArD4vJFi2qDdfnVhFxYSUg6eADduJ3uj";
/// LaunchLab global config for SOL-quoted pools.
pub const DEFAULT_GLOBAL_CONFIG: &str = "6s1xP3hpbAfFoNtUNF8mfHsjr2Bd97JxFJRWLbL6aHuX";
/// letsbonk.fun platform config.
pub const DEFAULT_PLATFORM_CONFIG: &str = "FfYek5vEz23cMkWsdJwG2oa6EphsvXSHrGpdALN4g6W1";
pub const WSOL_MINT: &str = "So11111111111111111111111111111111111111112";
pub const METADATA_PROGRAM: &str = "metaqbxxUerdq28cj1RbAWkYQm3ybzjb6a8bt518x1s";

pub mod seeds {
    pub const POOL: &[u8] = b"pool";
    pub const VAULT_AUTH: &[u8] = b"vault_auth_seed";
    pub const POOL_VAULT: &[u8] = b"pool_vault";
    pub const EVENT_AUTHORITY: &[u8] = b"__event_authority";
    pub const METADATA: &[u8] = b"metadata";
}

/// Parses a base58 public key, naming the offending field on failure.
pub fn parse_pubkey(field: &str, value: &str) -> LaunchpadResult<Pubkey> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LaunchpadError::malformed_address(field, "address is empty"));
    }
    Pubkey::from_str(trimmed).map_err(|e| LaunchpadError::malformed_address(field, e))
}

/// Configured addresses after validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramAddresses {
    pub launchpad_program: Pubkey,
    pub global_config: Pubkey,
    pub platform_config: Pubkey,
    pub quote_mint: Pubkey,
    pub metadata_program: Pubkey,
}

impl ProgramAddresses {
    pub fn resolve(config: &ProgramConfig) -> LaunchpadResult<Self> {
        Ok(Self {
            launchpad_program: parse_pubkey("launchpad_program", &config.launchpad_program)?,
            global_config: parse_pubkey("global_config", &config.global_config)?,
            platform_config: parse_pubkey("platform_config", &config.platform_config)?,
            quote_mint: parse_pubkey("quote_mint", &config.quote_mint)?,
            metadata_program: parse_pubkey("metadata_program", &config.metadata_program)?,
        })
    }

    /// Pool account for a base/quote pair: `["pool", base_mint, quote_mint]`.
    pub fn pool_state(&self, base_mint: &Pubkey) -> Pubkey {
        Pubkey::find_program_address(
            &[seeds::POOL, base_mint.as_ref(), self.quote_mint.as_ref()],
            &self.launchpad_program,
        )
        .0
    }

    pub fn vault_authority(&self) -> Pubkey {
        Pubkey::find_program_address(&[seeds::VAULT_AUTH], &self.launchpad_program).0
    }

    pub fn pool_vault(&self, pool_state: &Pubkey, mint: &Pubkey) -> Pubkey {
        Pubkey::find_program_address(
            &[seeds::POOL_VAULT, pool_state.as_ref(), mint.as_ref()],
            &self.launchpad_program,
        )
        .0
    }

    pub fn event_authority(&self) -> Pubkey {
        Pubkey::find_program_address(&[seeds::EVENT_AUTHORITY], &self.launchpad_program).0
    }

    /// Fee vault owned by the platform: `[platform_config, quote_mint]`.
    pub fn platform_fee_vault(&self, platform_config: &Pubkey) -> Pubkey {
        Pubkey::find_program_address(
            &[platform_config.as_ref(), self.quote_mint.as_ref()],
            &self.launchpad_program,
        )
        .0
    }

    /// Fee vault owned by the token creator: `[creator, quote_mint]`.
    pub fn creator_fee_vault(&self, creator: &Pubkey) -> Pubkey {
        Pubkey::find_program_address(
            &[creator.as_ref(), self.quote_mint.as_ref()],
            &self.launchpad_program,
        )
        .0
    }

    /// Metaplex metadata account: `["metadata", metadata_program, mint]`.
    pub fn metadata_account(&self, mint: &Pubkey) -> Pubkey {
        Pubkey::find_program_address(
            &[seeds::METADATA, self.metadata_program.as_ref(), mint.as_ref()],
            &self.metadata_program,
        )
        .0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pubkey_accepts_valid_base58() {
        let key = parse_pubkey("token_address", WSOL_MINT).unwrap();
        assert_eq!(key.to_string(), WSOL_MINT);
    }

    #[test]
    fn test_parse_pubkey_rejects_garbage() {
        let err = parse_pubkey("token_address", "not-a-key!").unwrap_err();
        assert!(matches!(err, LaunchpadError::MalformedAddress { ref field, .. } if field == "token_address"));

        let err = parse_pubkey("token_address", "   ").unwrap_err();
        assert!(matches!(err, LaunchpadError::MalformedAddress { .. }));

        // valid base58, wrong length
        let err = parse_pubkey("token_address", "3yZe7d").unwrap_err();
        assert!(matches!(err, LaunchpadError::MalformedAddress { .. }));
    }

    #[test]
    fn test_resolve_default_program_config() {
        let addresses = ProgramAddresses::resolve(&ProgramConfig::default()).unwrap();
        assert_eq!(addresses.launchpad_program.to_string(), LAUNCHPAD_PROGRAM);
        assert_eq!(addresses.quote_mint.to_string(), WSOL_MINT);
    }

    #[test]
    fn test_resolve_rejects_bad_config_address() {
        let mut config = ProgramConfig::default();
        config.platform_config = "bogus".to_string();
        let err = ProgramAddresses::resolve(&config).unwrap_err();
        assert!(matches!(err, LaunchpadError::MalformedAddress { ref field, .. } if field == "platform_config"));
    }

    #[test]
    fn test_pool_pda_is_deterministic_per_mint() {
        let addresses = ProgramAddresses::resolve(&ProgramConfig::default()).unwrap();
        let mint_a = Pubkey::new_unique();
        let mint_b = Pubkey::new_unique();
        assert_eq!(addresses.pool_state(&mint_a), addresses.pool_state(&mint_a));
        assert_ne!(addresses.pool_state(&mint_a), addresses.pool_state(&mint_b));
        let pool = addresses.pool_state(&mint_a);
        assert_ne!(addresses.pool_vault(&pool, &mint_a), addresses.pool_vault(&pool, &addresses.quote_mint));
    }
}
