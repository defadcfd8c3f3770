//! Instruction builder for launch and buy plans.
//!
//! Every account referenced here is either derived from configured program ids
//! or read from the pool snapshot; nothing is taken verbatim from the caller
//! except the token mint, which is validated before use.

use crate::launchpad::addresses::{parse_pubkey, ProgramAddresses};
use crate::launchpad::error::{LaunchpadError, LaunchpadResult};
use crate::launchpad::types::{EngineConfig, PoolState, RecentBlockhash, TransactionPlan};
use borsh::BorshSerialize;
use solana_sdk::{
    compute_budget::ComputeBudgetInstruction,
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    signature::{Keypair, Signer},
    sysvar,
};
use solana_system_interface::{instruction as system_instruction, program as system_program};
use spl_associated_token_account::{
    get_associated_token_address, instruction::create_associated_token_account_idempotent,
};
use tracing::{debug, instrument};

pub mod discriminators {
    /// Launchpad `initialize`
    pub const INITIALIZE: [u8; 8] = [175, 175, 109, 31, 13, 251, 127, 237];
    /// Launchpad `buy_exact_in`
    pub const BUY_EXACT_IN: [u8; 8] = [250, 234, 13, 123, 213, 156, 19, 236];
}

// --- Launchpad initialize args ---

/// Mint and metadata the program creates for the new token.
#[derive(BorshSerialize)]
struct MintParams {
    decimals: u8,
    name: String,
    symbol: String,
    uri: String,
}

#[derive(BorshSerialize)]
struct ConstantCurve {
    supply: u64,
    total_base_sell: u64,
    total_quote_fund_raising: u64,
    migrate_type: u8,
}

#[derive(BorshSerialize)]
enum CurveParams {
    Constant { data: ConstantCurve },
}

#[derive(BorshSerialize)]
struct VestingParams {
    total_locked_amount: u64,
    cliff_period: u64,
    unlock_period: u64,
}

#[derive(BorshSerialize)]
struct InitializeArgs {
    base_mint_param: MintParams,
    curve_param: CurveParams,
    vesting_param: VestingParams,
}

fn encode<T: BorshSerialize>(prefix: &[u8], args: &T) -> LaunchpadResult<Vec<u8>> {
    let mut data = Vec::with_capacity(256);
    data.extend_from_slice(prefix);
    args.serialize(&mut data)
        .map_err(|e| LaunchpadError::internal(format!("failed to encode instruction data: {}", e)))?;
    Ok(data)
}

fn compute_budget(config: &EngineConfig) -> Vec<Instruction> {
    let mut instructions = Vec::with_capacity(2);
    if config.compute_unit_limit > 0 {
        instructions.push(ComputeBudgetInstruction::set_compute_unit_limit(config.compute_unit_limit));
    }
    if config.compute_unit_price_micro_lamports > 0 {
        instructions.push(ComputeBudgetInstruction::set_compute_unit_price(
            config.compute_unit_price_micro_lamports,
        ));
    }
    instructions
}

/// Token identity and metadata URI for a launch.
#[derive(Debug, Clone)]
pub struct LaunchPlanInput {
    pub name: String,
    pub symbol: String,
    pub uri: String,
    /// Fee payer and pool creator
    pub creator: Pubkey,
}

/// A launch plan plus the addresses it creates.
#[derive(Debug)]
pub struct LaunchPlan {
    pub plan: TransactionPlan,
    pub mint: Pubkey,
    pub pool_state: Pubkey,
}

/// Builds the launch transaction around a single launchpad `initialize`.
///
/// The program creates the mint (authority: the vault authority PDA), then
/// its Metaplex metadata, then seeds the pool, in that order and within the
/// one instruction. The mint account is a fresh keypair that co-signs.
#[instrument(skip(input, config, blockhash), fields(symbol = %input.symbol, creator = %input.creator))]
pub fn build_launch(
    input: &LaunchPlanInput,
    config: &EngineConfig,
    blockhash: RecentBlockhash,
) -> LaunchpadResult<LaunchPlan> {
    let addresses = ProgramAddresses::resolve(&config.programs)?;
    let mint_keypair = Keypair::new();
    let mint = mint_keypair.pubkey();
    let creator = input.creator;
    let token_program = spl_token::id();
    let pool_state = addresses.pool_state(&mint);
    let metadata_account = addresses.metadata_account(&mint);

    let initialize_args = InitializeArgs {
        base_mint_param: MintParams {
            decimals: config.curve.decimals,
            name: input.name.clone(),
            symbol: input.symbol.clone(),
            uri: input.uri.clone(),
        },
        curve_param: CurveParams::Constant {
            data: ConstantCurve {
                supply: config.curve.supply,
                total_base_sell: config.curve.total_base_sell,
                total_quote_fund_raising: config.curve.total_quote_fund_raising,
                migrate_type: config.curve.migrate_type,
            },
        },
        vesting_param: VestingParams {
            total_locked_amount: 0,
            cliff_period: 0,
            unlock_period: 0,
        },
    };

    let mut instructions = compute_budget(config);
    instructions.push(Instruction {
        program_id: addresses.launchpad_program,
        accounts: vec![
            AccountMeta::new(creator, true), // payer
            AccountMeta::new_readonly(creator, true), // creator
            AccountMeta::new_readonly(addresses.global_config, false),
            AccountMeta::new_readonly(addresses.platform_config, false),
            AccountMeta::new_readonly(addresses.vault_authority(), false),
            AccountMeta::new(pool_state, false),
            AccountMeta::new(mint, true), // created by the program
            AccountMeta::new_readonly(addresses.quote_mint, false),
            AccountMeta::new(addresses.pool_vault(&pool_state, &mint), false),
            AccountMeta::new(addresses.pool_vault(&pool_state, &addresses.quote_mint), false),
            AccountMeta::new(metadata_account, false),
            AccountMeta::new_readonly(token_program, false), // base token program
            AccountMeta::new_readonly(token_program, false), // quote token program
            AccountMeta::new_readonly(addresses.metadata_program, false),
            AccountMeta::new_readonly(system_program::id(), false),
            AccountMeta::new_readonly(sysvar::rent::id(), false),
            AccountMeta::new_readonly(addresses.event_authority(), false),
            AccountMeta::new_readonly(addresses.launchpad_program, false),
        ],
        data: encode(&discriminators::INITIALIZE, &initialize_args)?,
    });

    debug!(%mint, %pool_state, instructions = instructions.len(), "Built launch plan");

    Ok(LaunchPlan {
        plan: TransactionPlan::new(instructions, creator, blockhash, vec![mint_keypair]),
        mint,
        pool_state,
    })
}

/// What a buy spends and the minimum it must receive.
#[derive(Debug, Clone)]
pub struct BuyPlanInput {
    pub buyer: Pubkey,
    /// Base58 mint as supplied by the caller
    pub token_address: String,
    pub amount_in_lamports: u64,
    pub minimum_tokens: u64,
}

/// Builds the buy transaction around a single `buy_exact_in` swap.
#[instrument(skip(input, pool, config, blockhash), fields(token = %input.token_address, buyer = %input.buyer))]
pub fn build_buy(
    input: &BuyPlanInput,
    pool: &PoolState,
    config: &EngineConfig,
    blockhash: RecentBlockhash,
) -> LaunchpadResult<TransactionPlan> {
    let addresses = ProgramAddresses::resolve(&config.programs)?;
    let mint = parse_pubkey("token_address", &input.token_address)?;
    if input.amount_in_lamports == 0 {
        return Err(LaunchpadError::validation("amount_in must be > 0"));
    }
    if pool.base_mint != mint {
        return Err(LaunchpadError::InvalidPoolState(format!(
            "pool {} trades {}, not {}",
            pool.address, pool.base_mint, mint
        )));
    }
    if pool.quote_mint != addresses.quote_mint {
        return Err(LaunchpadError::InvalidPoolState(format!(
            "pool {} is quoted in {}, expected {}",
            pool.address, pool.quote_mint, addresses.quote_mint
        )));
    }
    let pool_state = addresses.pool_state(&mint);
    if pool.address != pool_state {
        return Err(LaunchpadError::InvalidPoolState(format!(
            "pool snapshot address {} does not match derived pool {}",
            pool.address, pool_state
        )));
    }

    let buyer = input.buyer;
    let token_program = spl_token::id();
    let quote_mint = addresses.quote_mint;
    let user_base_token = get_associated_token_address(&buyer, &mint);
    let user_quote_token = get_associated_token_address(&buyer, &quote_mint);

    let mut instructions = compute_budget(config);

    // buyer token account, created if absent
    instructions.push(create_associated_token_account_idempotent(&buyer, &buyer, &mint, &token_program));

    // wrap the SOL being spent
    instructions.push(create_associated_token_account_idempotent(
        &buyer,
        &buyer,
        &quote_mint,
        &token_program,
    ));
    instructions.push(system_instruction::transfer(&buyer, &user_quote_token, input.amount_in_lamports));
    instructions.push(
        spl_token::instruction::sync_native(&token_program, &user_quote_token)
            .map_err(|e| LaunchpadError::internal(format!("sync_native: {}", e)))?,
    );

    let mut data = Vec::with_capacity(32);
    data.extend_from_slice(&discriminators::BUY_EXACT_IN);
    data.extend_from_slice(&input.amount_in_lamports.to_le_bytes());
    data.extend_from_slice(&input.minimum_tokens.to_le_bytes());
    data.extend_from_slice(&0u64.to_le_bytes()); // share fee rate

    instructions.push(Instruction {
        program_id: addresses.launchpad_program,
        accounts: vec![
            AccountMeta::new(buyer, true),
            AccountMeta::new_readonly(addresses.vault_authority(), false),
            AccountMeta::new_readonly(pool.global_config, false),
            AccountMeta::new_readonly(pool.platform_config, false),
            AccountMeta::new(pool_state, false),
            AccountMeta::new(user_base_token, false),
            AccountMeta::new(user_quote_token, false),
            AccountMeta::new(addresses.pool_vault(&pool_state, &mint), false),
            AccountMeta::new(addresses.pool_vault(&pool_state, &quote_mint), false),
            AccountMeta::new_readonly(mint, false),
            AccountMeta::new_readonly(quote_mint, false),
            AccountMeta::new_readonly(token_program, false),
            AccountMeta::new_readonly(token_program, false),
            AccountMeta::new_readonly(addresses.event_authority(), false),
            AccountMeta::new_readonly(addresses.launchpad_program, false),
            AccountMeta::new_readonly(system_program::id(), false),
            AccountMeta::new(addresses.platform_fee_vault(&pool.platform_config), false),
            AccountMeta::new(addresses.creator_fee_vault(&pool.creator), false),
        ],
        data,
    });

    // unwrap whatever SOL is left
    instructions.push(
        spl_token::instruction::close_account(&token_program, &user_quote_token, &buyer, &buyer, &[])
            .map_err(|e| LaunchpadError::internal(format!("close_account: {}", e)))?,
    );

    debug!(%mint, %pool_state, minimum_tokens = input.minimum_tokens, "Built buy plan");
    Ok(TransactionPlan::new(instructions, buyer, blockhash, vec![]))
}
