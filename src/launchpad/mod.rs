//! Launch and buy core.
//!
//! One [`LaunchpadService`] is chosen at startup by [`LaunchpadBuilder`]:
//! [`Orchestrator`] drives real transactions through a [`ChainClient`],
//! [`SimulatedLaunchpad`] answers locally without any network access.

pub mod addresses;
pub mod calculator;
pub mod error;
pub mod instructions;
pub mod metadata;
pub mod network;
pub mod orchestrator;
pub mod pool;
pub mod signer;
pub mod simulation;
pub mod submitter;
pub mod types;

pub use error::{LaunchpadError, LaunchpadResult, ReasonCode};
pub use metadata::{HttpMetadataStore, MetadataStore, TokenMetadataDocument};
pub use network::{ChainClient, ChainError, RpcChainClient, SignatureState, TransactionReceipt};
pub use orchestrator::Orchestrator;
pub use signer::SecretMaterial;
pub use simulation::SimulatedLaunchpad;
pub use types::{
    BuyReceipt, EngineConfig, ExecutionMode, LaunchReceipt, OperationResult, PoolKind, PoolState, Quote, Receipt,
};

use crate::types::Intent;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// The single contract the outer layer talks to.
#[async_trait]
pub trait LaunchpadService: Send + Sync {
    /// Runs one intent to a terminal state. Never panics, never returns secrets.
    async fn execute(&self, intent: Intent) -> OperationResult;

    fn mode(&self) -> ExecutionMode;
}

/// Builder for the launch/buy service.
pub struct LaunchpadBuilder {
    config: EngineConfig,
    metadata_store: Option<Arc<dyn MetadataStore>>,
}

impl LaunchpadBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self::from_config(EngineConfig::default())
    }

    pub fn from_config(config: EngineConfig) -> Self {
        Self {
            config,
            metadata_store: None,
        }
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.config.mode = mode;
        self
    }

    /// Set the RPC endpoints.
    pub fn with_rpc_endpoints(mut self, endpoints: Vec<String>) -> Self {
        self.config.rpc_endpoints = endpoints;
        self
    }

    pub fn with_rate_limit(mut self, requests_per_second: u32) -> Self {
        self.config.rpc_rate_limit_per_second = requests_per_second;
        self
    }

    pub fn with_default_image_uri(mut self, uri: impl Into<String>) -> Self {
        self.config.default_image_uri = uri.into();
        self
    }

    pub fn with_metadata_upload_url(mut self, url: impl Into<String>) -> Self {
        self.config.metadata_upload_url = Some(url.into());
        self
    }

    /// Use a custom metadata store instead of the HTTP uploader.
    pub fn with_metadata_store(mut self, store: Arc<dyn MetadataStore>) -> Self {
        self.metadata_store = Some(store);
        self
    }

    /// Set the wallet that pays for launches.
    pub fn with_launcher_keypair(mut self, secret: SecretMaterial) -> Self {
        self.config.launcher_keypair = Some(secret);
        self
    }

    pub fn with_slippage_error_codes(mut self, codes: Vec<u32>) -> Self {
        self.config.slippage_error_codes = codes;
        self
    }

    /// Set send retries and the confirmation cap.
    pub fn with_submission(mut self, send_retry_attempts: usize, confirmation_timeout_secs: u64) -> Self {
        self.config.send_retry_attempts = send_retry_attempts;
        self.config.confirmation_timeout_secs = confirmation_timeout_secs;
        self
    }

    /// Build the configuration only.
    pub fn build_config(self) -> EngineConfig {
        self.config
    }

    fn metadata_store(&self) -> anyhow::Result<Option<Arc<dyn MetadataStore>>> {
        if let Some(store) = &self.metadata_store {
            return Ok(Some(store.clone()));
        }
        match &self.config.metadata_upload_url {
            Some(url) => {
                let store = HttpMetadataStore::new(url.clone(), Duration::from_secs(self.config.rpc_timeout_seconds))?;
                Ok(Some(Arc::new(store)))
            }
            None => Ok(None),
        }
    }

    /// Live mode over a caller-provided chain client.
    pub fn build_with_chain<C: ChainClient>(self, chain: Arc<C>) -> anyhow::Result<Orchestrator<C>> {
        self.config.validate()?;
        let store = self.metadata_store()?;
        let mut orchestrator = Orchestrator::new(chain, self.config);
        if let Some(store) = store {
            orchestrator = orchestrator.with_metadata_store(store);
        }
        Ok(orchestrator)
    }

    /// Build the service for the configured mode.
    pub fn build(self) -> anyhow::Result<Arc<dyn LaunchpadService>> {
        self.config.validate()?;
        match self.config.mode {
            ExecutionMode::Simulation => {
                info!("Launchpad running in simulation mode");
                Ok(Arc::new(SimulatedLaunchpad::new(self.config)))
            }
            ExecutionMode::Live => {
                let chain = Arc::new(RpcChainClient::new(&self.config)?);
                info!(endpoints = chain.endpoint_count(), "Launchpad running in live mode");
                Ok(Arc::new(self.build_with_chain(chain)?))
            }
        }
    }
}

impl Default for LaunchpadBuilder {
    fn default() -> Self {
        Self::new()
    }
}
