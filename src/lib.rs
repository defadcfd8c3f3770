//! bonk-launcher - token launch and buy engine for the letsbonk.fun launchpad on Solana
//!
//! Turns a launch or buy request into one ordered, signed and confirmed
//! transaction, and reports a normalized result with a reason code on failure.

pub mod launchpad;
pub mod types;

// Re-export main types for convenience
pub use launchpad::{
    EngineConfig, ExecutionMode, LaunchpadBuilder, LaunchpadError, LaunchpadService, OperationResult, ReasonCode,
};
pub use types::{BuyIntent, BuyTokenRequest, Intent, LaunchIntent, LaunchTokenRequest, Request};
