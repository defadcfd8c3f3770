//! Amount calculator: expected and minimum token output for a SOL spend.
//!
//! Pure integer math over a [`PoolState`] snapshot. The result is an estimate;
//! the minimum is encoded into the swap instruction so the program enforces
//! the slippage bound at execution time.

use crate::launchpad::error::{LaunchpadError, LaunchpadResult};
use crate::launchpad::types::{PoolKind, PoolState, Quote};
use solana_sdk::native_token::LAMPORTS_PER_SOL;

pub const BPS_DENOMINATOR: u64 = 10_000;
pub const DEFAULT_SLIPPAGE_BPS: u64 = 500;

/// Validates a SOL amount and converts it to lamports, rounding down.
pub fn sol_amount_to_lamports(amount_sol: f64) -> LaunchpadResult<u64> {
    if !amount_sol.is_finite() || amount_sol <= 0.0 {
        return Err(LaunchpadError::validation(format!(
            "amount_sol must be a positive finite number, got {}",
            amount_sol
        )));
    }
    let lamports = (amount_sol * LAMPORTS_PER_SOL as f64).floor();
    if lamports >= u64::MAX as f64 {
        return Err(LaunchpadError::validation(format!(
            "amount_sol {} exceeds the largest representable lamport amount",
            amount_sol
        )));
    }
    let lamports = lamports as u64;
    if lamports == 0 {
        return Err(LaunchpadError::validation(format!(
            "amount_sol {} is below one lamport",
            amount_sol
        )));
    }
    Ok(lamports)
}

pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL as f64
}

pub fn validate_slippage_bps(slippage_bps: u64) -> LaunchpadResult<()> {
    if slippage_bps > BPS_DENOMINATOR {
        return Err(LaunchpadError::validation(format!(
            "slippage_bps must be within 0..=10000, got {}",
            slippage_bps
        )));
    }
    Ok(())
}

/// `floor(expected * (10000 - slippage_bps) / 10000)`.
pub fn apply_slippage(expected_tokens: u64, slippage_bps: u64) -> u64 {
    let kept = BPS_DENOMINATOR.saturating_sub(slippage_bps) as u128;
    ((expected_tokens as u128 * kept) / BPS_DENOMINATOR as u128) as u64
}

/// Validates inputs before any pool read happens.
pub fn validate_inputs(amount_sol: f64, slippage_bps: u64) -> LaunchpadResult<u64> {
    let lamports = sol_amount_to_lamports(amount_sol)?;
    validate_slippage_bps(slippage_bps)?;
    Ok(lamports)
}

/// Computes the quote for spending `amount_sol` on `pool`.
pub fn compute(pool: &PoolState, amount_sol: f64, slippage_bps: u64) -> LaunchpadResult<Quote> {
    let amount_in = validate_inputs(amount_sol, slippage_bps)?;
    quote_exact_in(pool, amount_in, slippage_bps)
}

/// Integer core of [`compute`], for an input already in lamports.
pub fn quote_exact_in(pool: &PoolState, amount_in: u64, slippage_bps: u64) -> LaunchpadResult<Quote> {
    if amount_in == 0 {
        return Err(LaunchpadError::validation("amount_in must be > 0"));
    }
    validate_slippage_bps(slippage_bps)?;
    if pool.base_reserve == 0 || pool.quote_reserve == 0 {
        return Err(LaunchpadError::InvalidPoolState(format!(
            "pool {} has empty reserves (base={}, quote={})",
            pool.address, pool.base_reserve, pool.quote_reserve
        )));
    }
    if pool.fee_bps >= BPS_DENOMINATOR {
        return Err(LaunchpadError::InvalidPoolState(format!(
            "pool {} fee of {} bps consumes the whole input",
            pool.address, pool.fee_bps
        )));
    }

    // out = base * in * (1 - fee) / (quote + in * (1 - fee)), all scaled by 10_000
    let fee_kept = (BPS_DENOMINATOR - pool.fee_bps) as u128;
    let in_after_fee = amount_in as u128 * fee_kept;
    let too_large = || {
        LaunchpadError::validation(format!(
            "amount_in {} lamports is too large to price against pool {}",
            amount_in, pool.address
        ))
    };
    let numerator = (pool.base_reserve as u128)
        .checked_mul(in_after_fee)
        .ok_or_else(too_large)?;
    let denominator = (pool.quote_reserve as u128 * BPS_DENOMINATOR as u128)
        .checked_add(in_after_fee)
        .ok_or_else(too_large)?;
    // out < base_reserve, so it always fits back into u64
    let mut expected = (numerator / denominator) as u64;

    if let PoolKind::BondingCurve { remaining_base } = pool.kind {
        if remaining_base == 0 {
            return Err(LaunchpadError::InvalidPoolState(format!(
                "bonding curve {} has nothing left for sale",
                pool.address
            )));
        }
        expected = expected.min(remaining_base);
    }

    Ok(Quote {
        amount_in_lamports: amount_in,
        expected_tokens: expected,
        minimum_tokens: apply_slippage(expected, slippage_bps),
        fee_bps: pool.fee_bps,
        slippage_bps,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::pubkey::Pubkey;

    fn pool(base: u64, quote: u64, fee_bps: u64, kind: PoolKind) -> PoolState {
        PoolState {
            address: Pubkey::new_unique(),
            base_mint: Pubkey::new_unique(),
            quote_mint: Pubkey::new_unique(),
            base_reserve: base,
            quote_reserve: quote,
            fee_bps,
            kind,
            creator: Pubkey::new_unique(),
            global_config: Pubkey::new_unique(),
            platform_config: Pubkey::new_unique(),
        }
    }

    #[test]
    fn test_constant_product_fixture() {
        // base=1_000_000, quote=1_000 SOL, spend 10 SOL, 0.25% fee, 5% slippage
        let p = pool(1_000_000, 1_000 * LAMPORTS_PER_SOL, 25, PoolKind::ConstantProduct);
        let quote = compute(&p, 10.0, 500).unwrap();
        assert_eq!(quote.amount_in_lamports, 10 * LAMPORTS_PER_SOL);
        assert_eq!(quote.expected_tokens, 9_876);
        assert_eq!(quote.minimum_tokens, 9_382);
    }

    #[test]
    fn test_same_fixture_in_raw_units() {
        let p = pool(1_000_000, 1_000, 25, PoolKind::ConstantProduct);
        let quote = quote_exact_in(&p, 10, 500).unwrap();
        assert_eq!(quote.expected_tokens, 9_876);
        assert_eq!(quote.minimum_tokens, 9_382);
    }

    #[test]
    fn test_zero_fee_matches_plain_constant_product() {
        let p = pool(1_000_000, 1_000, 0, PoolKind::ConstantProduct);
        let quote = quote_exact_in(&p, 10, 0).unwrap();
        // 1_000_000 * 10 / 1_010 = 9900.99
        assert_eq!(quote.expected_tokens, 9_900);
        assert_eq!(quote.minimum_tokens, 9_900);
    }

    #[test]
    fn test_minimum_never_exceeds_expected_and_is_monotonic() {
        let p = pool(1_073_000_000_000_000, 30 * LAMPORTS_PER_SOL, 125, PoolKind::ConstantProduct);
        let mut previous = u64::MAX;
        for slippage in (0..=10_000).step_by(250) {
            let quote = compute(&p, 0.5, slippage).unwrap();
            assert!(quote.minimum_tokens <= quote.expected_tokens);
            assert!(quote.minimum_tokens <= previous);
            previous = quote.minimum_tokens;
        }
        assert_eq!(previous, 0);
    }

    #[test]
    fn test_non_positive_amount_is_validation_error() {
        let p = pool(1_000_000, 1_000, 25, PoolKind::ConstantProduct);
        for amount in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let err = compute(&p, amount, 500).unwrap_err();
            assert!(matches!(err, LaunchpadError::Validation(_)), "amount {}", amount);
        }
        assert!(matches!(validate_inputs(-0.1, 500), Err(LaunchpadError::Validation(_))));
    }

    #[test]
    fn test_slippage_out_of_range() {
        let p = pool(1_000_000, 1_000, 25, PoolKind::ConstantProduct);
        assert!(matches!(compute(&p, 1.0, 10_001), Err(LaunchpadError::Validation(_))));
        assert!(compute(&p, 1.0, 10_000).is_ok());
    }

    #[test]
    fn test_empty_reserves_is_invalid_pool_state() {
        let p = pool(0, 1_000, 25, PoolKind::ConstantProduct);
        assert!(matches!(compute(&p, 1.0, 500), Err(LaunchpadError::InvalidPoolState(_))));
        let p = pool(1_000, 0, 25, PoolKind::ConstantProduct);
        assert!(matches!(compute(&p, 1.0, 500), Err(LaunchpadError::InvalidPoolState(_))));
    }

    #[test]
    fn test_bonding_curve_caps_at_remaining_supply() {
        let p = pool(1_000_000, 1_000, 0, PoolKind::BondingCurve { remaining_base: 5_000 });
        let quote = quote_exact_in(&p, 10, 500).unwrap();
        assert_eq!(quote.expected_tokens, 5_000);
        assert_eq!(quote.minimum_tokens, 4_750);

        let exhausted = pool(1_000_000, 1_000, 0, PoolKind::BondingCurve { remaining_base: 0 });
        assert!(matches!(
            quote_exact_in(&exhausted, 10, 500),
            Err(LaunchpadError::InvalidPoolState(_))
        ));
    }

    #[test]
    fn test_oversized_amounts_are_validation_errors() {
        let p = pool(1_000_000_000_000_000_000, 30 * LAMPORTS_PER_SOL, 125, PoolKind::ConstantProduct);

        // fits in u64 lamports, but base * in * fee overflows u128
        let err = compute(&p, 18_000_000_000.0, 500).unwrap_err();
        assert!(matches!(err, LaunchpadError::Validation(_)), "{:?}", err);
        let err = quote_exact_in(&p, u64::MAX, 500).unwrap_err();
        assert!(matches!(err, LaunchpadError::Validation(_)));

        // more lamports than u64 can hold
        let err = compute(&p, 20_000_000_000.0, 500).unwrap_err();
        assert!(matches!(err, LaunchpadError::Validation(_)));
        assert!(sol_amount_to_lamports(1e300).is_err());
    }

    #[test]
    fn test_lamport_conversion_rounds_down() {
        assert_eq!(sol_amount_to_lamports(0.5).unwrap(), 500_000_000);
        assert_eq!(sol_amount_to_lamports(1.000_000_000_9).unwrap(), 1_000_000_000);
        assert!(sol_amount_to_lamports(0.000_000_000_5).is_err());
    }

    #[test]
    fn test_apply_slippage_floors() {
        assert_eq!(apply_slippage(9_876, 500), 9_382);
        assert_eq!(apply_slippage(1, 1), 0);
        assert_eq!(apply_slippage(u64::MAX, 0), u64::MAX);
    }
}
