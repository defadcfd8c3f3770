//! Decoding of launchpad pool and global-config accounts into [`PoolState`].

use crate::launchpad::addresses::ProgramAddresses;
use crate::launchpad::calculator::BPS_DENOMINATOR;
use crate::launchpad::error::{LaunchpadError, LaunchpadResult};
use crate::launchpad::types::{PoolKind, PoolState};
use borsh::{BorshDeserialize, BorshSerialize};
use solana_sdk::pubkey::Pubkey;

const DISCRIMINATOR_LEN: usize = 8;
/// Pool status while the curve is still trading.
pub const STATUS_TRADING: u8 = 0;
/// Trade fee rates are stored as parts per million.
const FEE_RATE_DENOMINATOR: u64 = 1_000_000;

#[derive(Debug, Clone, Default, PartialEq, BorshSerialize, BorshDeserialize)]
pub struct VestingSchedule {
    pub total_locked_amount: u64,
    pub cliff_period: u64,
    pub unlock_period: u64,
    pub start_time: u64,
    pub allocated_share_amount: u64,
}

/// On-chain pool account body (after the 8-byte discriminator).
#[derive(Debug, Clone, Default, PartialEq, BorshSerialize, BorshDeserialize)]
pub struct LaunchpadPoolAccount {
    pub epoch: u64,
    pub auth_bump: u8,
    pub status: u8,
    pub base_decimals: u8,
    pub quote_decimals: u8,
    pub migrate_type: u8,
    pub supply: u64,
    pub total_base_sell: u64,
    pub virtual_base: u64,
    pub virtual_quote: u64,
    pub real_base: u64,
    pub real_quote: u64,
    pub total_quote_fund_raising: u64,
    pub quote_protocol_fee: u64,
    pub platform_fee: u64,
    pub migrate_fee: u64,
    pub vesting_schedule: VestingSchedule,
    pub global_config: [u8; 32],
    pub platform_config: [u8; 32],
    pub base_mint: [u8; 32],
    pub quote_mint: [u8; 32],
    pub base_vault: [u8; 32],
    pub quote_vault: [u8; 32],
    pub creator: [u8; 32],
    pub padding: [u64; 8],
}

/// On-chain global config body (after the discriminator).
#[derive(Debug, Clone, Default, PartialEq, BorshSerialize, BorshDeserialize)]
pub struct LaunchpadGlobalConfig {
    pub epoch: u64,
    pub curve_type: u8,
    pub index: u16,
    pub migrate_fee: u64,
    pub trade_fee_rate: u64,
    pub max_share_fee_rate: u64,
    pub min_base_supply: u64,
    pub max_lock_rate: u64,
    pub min_base_sell_rate: u64,
    pub min_base_migrate_rate: u64,
    pub min_quote_fund_raising: u64,
    pub quote_mint: [u8; 32],
    pub protocol_fee_owner: [u8; 32],
    pub migrate_fee_owner: [u8; 32],
    pub migrate_to_amm_wallet: [u8; 32],
    pub migrate_to_cpswap_wallet: [u8; 32],
    pub padding: [u64; 16],
}

fn body<'a>(data: &'a [u8], what: &str) -> LaunchpadResult<&'a [u8]> {
    if data.len() <= DISCRIMINATOR_LEN {
        return Err(LaunchpadError::InvalidPoolState(format!(
            "{} account too short: {} bytes",
            what,
            data.len()
        )));
    }
    Ok(&data[DISCRIMINATOR_LEN..])
}

pub fn decode_pool_account(data: &[u8]) -> LaunchpadResult<LaunchpadPoolAccount> {
    let mut slice = body(data, "pool")?;
    LaunchpadPoolAccount::deserialize(&mut slice)
        .map_err(|e| LaunchpadError::InvalidPoolState(format!("failed to decode pool account: {}", e)))
}

pub fn decode_global_config(data: &[u8]) -> LaunchpadResult<LaunchpadGlobalConfig> {
    let mut slice = body(data, "global config")?;
    LaunchpadGlobalConfig::deserialize(&mut slice).map_err(|e| {
        LaunchpadError::InvalidPoolState(format!("failed to decode global config: {}", e))
    })
}

/// Converts a ppm fee rate to bps, rounding up so the estimate never undercharges.
pub fn fee_rate_to_bps(fee_rate_ppm: u64) -> u64 {
    let per_bps = FEE_RATE_DENOMINATOR / BPS_DENOMINATOR;
    fee_rate_ppm.div_ceil(per_bps)
}

/// Builds the pricing snapshot for `base_mint` from raw account data.
pub fn pool_state_from_accounts(
    addresses: &ProgramAddresses,
    base_mint: &Pubkey,
    pool_data: &[u8],
    global_data: &[u8],
    platform_fee_bps: u64,
) -> LaunchpadResult<PoolState> {
    let pool_address = addresses.pool_state(base_mint);
    let pool = decode_pool_account(pool_data)?;
    let global = decode_global_config(global_data)?;

    if Pubkey::new_from_array(pool.base_mint) != *base_mint {
        return Err(LaunchpadError::InvalidPoolState(format!(
            "pool {} does not trade mint {}",
            pool_address, base_mint
        )));
    }
    if pool.status != STATUS_TRADING {
        return Err(LaunchpadError::InvalidPoolState(format!(
            "pool {} is no longer trading on the curve (status {})",
            pool_address, pool.status
        )));
    }

    let base_reserve = pool.virtual_base.checked_sub(pool.real_base).ok_or_else(|| {
        LaunchpadError::InvalidPoolState(format!(
            "pool {} real base {} exceeds virtual base {}",
            pool_address, pool.real_base, pool.virtual_base
        ))
    })?;
    let quote_reserve = pool.virtual_quote.checked_add(pool.real_quote).ok_or_else(|| {
        LaunchpadError::InvalidPoolState(format!("pool {} quote reserve overflows", pool_address))
    })?;
    let remaining_base = pool.total_base_sell.saturating_sub(pool.real_base);

    Ok(PoolState {
        address: pool_address,
        base_mint: *base_mint,
        quote_mint: Pubkey::new_from_array(pool.quote_mint),
        base_reserve,
        quote_reserve,
        fee_bps: fee_rate_to_bps(global.trade_fee_rate) + platform_fee_bps,
        kind: PoolKind::BondingCurve { remaining_base },
        creator: Pubkey::new_from_array(pool.creator),
        global_config: Pubkey::new_from_array(pool.global_config),
        platform_config: Pubkey::new_from_array(pool.platform_config),
    })
}
