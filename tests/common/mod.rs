//! In-memory chain used by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bonk_launcher::launchpad::addresses::ProgramAddresses;
use bonk_launcher::launchpad::metadata::{MetadataStore, TokenMetadataDocument};
use bonk_launcher::launchpad::network::{ChainClient, ChainError, SignatureState, TransactionReceipt};
use bonk_launcher::launchpad::pool::{LaunchpadGlobalConfig, LaunchpadPoolAccount, STATUS_TRADING};
use bonk_launcher::launchpad::{EngineConfig, ExecutionMode, LaunchpadResult, SecretMaterial};
use borsh::BorshSerialize;
use solana_sdk::{
    hash::Hash,
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    transaction::{Transaction, TransactionError},
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub const LANDED_SLOT: u64 = 42;
pub const INITIAL_BLOCK_HEIGHT: u64 = 1_000;
pub const BLOCKHASH_VALIDITY: u64 = 150;

/// What happens to a transaction once the mock accepts it.
#[derive(Debug, Clone)]
pub enum Outcome {
    Land,
    Fail(TransactionError),
    Never,
}

/// A scripted result for one `send_transaction` call.
#[derive(Debug, Clone)]
pub enum SendScript {
    Error(ChainError),
    /// The node times out, but the transaction reached the leader anyway.
    TimeoutButLanded,
}

pub struct MockChain {
    accounts: Mutex<HashMap<Pubkey, Vec<u8>>>,
    block_height: AtomicU64,
    height_step: AtomicU64,
    outcome: Mutex<Outcome>,
    send_script: Mutex<VecDeque<SendScript>>,
    statuses: Mutex<HashMap<Signature, SignatureState>>,
    receipts: Mutex<HashMap<Signature, TransactionReceipt>>,
    landed_receipt: Mutex<Option<TransactionReceipt>>,
    failure_logs: Mutex<Vec<String>>,
    sent: Mutex<Vec<Transaction>>,
    calls: AtomicUsize,
    read_delay: Mutex<Duration>,
}

impl MockChain {
    pub fn new() -> Self {
        Self {
            accounts: Mutex::new(HashMap::new()),
            block_height: AtomicU64::new(INITIAL_BLOCK_HEIGHT),
            height_step: AtomicU64::new(0),
            outcome: Mutex::new(Outcome::Land),
            send_script: Mutex::new(VecDeque::new()),
            statuses: Mutex::new(HashMap::new()),
            receipts: Mutex::new(HashMap::new()),
            landed_receipt: Mutex::new(None),
            failure_logs: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            read_delay: Mutex::new(Duration::ZERO),
        }
    }

    pub fn set_account(&self, address: Pubkey, data: Vec<u8>) {
        self.accounts.lock().unwrap().insert(address, data);
    }

    pub fn set_outcome(&self, outcome: Outcome) {
        *self.outcome.lock().unwrap() = outcome;
    }

    pub fn script_send(&self, script: SendScript) {
        self.send_script.lock().unwrap().push_back(script);
    }

    /// Block height added on every height poll.
    pub fn advance_height_by(&self, step: u64) {
        self.height_step.store(step, Ordering::SeqCst);
    }

    /// Makes every account read take `delay`.
    pub fn delay_reads(&self, delay: Duration) {
        *self.read_delay.lock().unwrap() = delay;
    }

    /// Lands every transaction sent so far, as if the cluster caught up.
    pub fn land_sent(&self) {
        let signatures: Vec<Signature> = self.sent().iter().map(|tx| tx.signatures[0]).collect();
        let previous = self.outcome.lock().unwrap().clone();
        self.set_outcome(Outcome::Land);
        for signature in signatures {
            self.apply_outcome(signature);
        }
        self.set_outcome(previous);
    }

    pub fn set_landed_receipt(&self, receipt: TransactionReceipt) {
        *self.landed_receipt.lock().unwrap() = Some(receipt);
    }

    pub fn set_failure_logs(&self, logs: Vec<String>) {
        *self.failure_logs.lock().unwrap() = logs;
    }

    pub fn sent(&self) -> Vec<Transaction> {
        self.sent.lock().unwrap().clone()
    }

    pub fn send_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn apply_outcome(&self, signature: Signature) {
        let outcome = self.outcome.lock().unwrap().clone();
        match outcome {
            Outcome::Land => {
                self.statuses
                    .lock()
                    .unwrap()
                    .insert(signature, SignatureState::Landed { slot: LANDED_SLOT });
                if let Some(receipt) = self.landed_receipt.lock().unwrap().clone() {
                    self.receipts.lock().unwrap().insert(signature, receipt);
                }
            }
            Outcome::Fail(error) => {
                self.statuses
                    .lock()
                    .unwrap()
                    .insert(signature, SignatureState::Failed { slot: LANDED_SLOT, error });
                let logs = self.failure_logs.lock().unwrap().clone();
                self.receipts.lock().unwrap().insert(
                    signature,
                    TransactionReceipt {
                        slot: LANDED_SLOT,
                        logs,
                        ..Default::default()
                    },
                );
            }
            Outcome::Never => {}
        }
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn latest_blockhash(&self) -> Result<bonk_launcher::launchpad::types::RecentBlockhash, ChainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(bonk_launcher::launchpad::types::RecentBlockhash {
            hash: Hash::new_unique(),
            last_valid_block_height: self.block_height.load(Ordering::SeqCst) + BLOCKHASH_VALIDITY,
        })
    }

    async fn block_height(&self) -> Result<u64, ChainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self.height_step.load(Ordering::SeqCst);
        Ok(self.block_height.fetch_add(step, Ordering::SeqCst) + step)
    }

    async fn account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, ChainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.read_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(self.accounts.lock().unwrap().get(address).cloned())
    }

    async fn send_transaction(&self, transaction: &Transaction) -> Result<Signature, ChainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.sent.lock().unwrap().push(transaction.clone());
        let signature = transaction.signatures[0];

        let script = self.send_script.lock().unwrap().pop_front();
        match script {
            Some(SendScript::Error(error)) => Err(error),
            Some(SendScript::TimeoutButLanded) => {
                self.apply_outcome(signature);
                Err(ChainError::Transient("request timed out".to_string()))
            }
            None => {
                self.apply_outcome(signature);
                Ok(signature)
            }
        }
    }

    async fn signature_status(&self, signature: &Signature) -> Result<SignatureState, ChainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .statuses
            .lock()
            .unwrap()
            .get(signature)
            .cloned()
            .unwrap_or(SignatureState::Pending))
    }

    async fn transaction_receipt(&self, signature: &Signature) -> Result<Option<TransactionReceipt>, ChainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.receipts.lock().unwrap().get(signature).cloned())
    }
}

/// Metadata store that records what it was given.
pub struct RecordingMetadataStore {
    pub documents: Mutex<Vec<TokenMetadataDocument>>,
}

impl RecordingMetadataStore {
    pub fn new() -> Self {
        Self {
            documents: Mutex::new(Vec::new()),
        }
    }

    pub fn stored(&self) -> Vec<TokenMetadataDocument> {
        self.documents.lock().unwrap().clone()
    }
}

#[async_trait]
impl MetadataStore for RecordingMetadataStore {
    async fn store(&self, document: &TokenMetadataDocument) -> LaunchpadResult<String> {
        let mut documents = self.documents.lock().unwrap();
        documents.push(document.clone());
        Ok(format!("https://ipfs.io/ipfs/meta-{}.json", documents.len()))
    }
}

/// Live-mode configuration with fast polling and retries.
pub fn live_config() -> EngineConfig {
    EngineConfig {
        mode: ExecutionMode::Live,
        retry_base_delay_ms: 1,
        confirmation_poll_interval_ms: 1,
        confirmation_timeout_secs: 5,
        ..EngineConfig::default()
    }
}

pub fn secret_for(keypair: &Keypair) -> SecretMaterial {
    SecretMaterial::new(bs58::encode(keypair.to_bytes()).into_string())
}

fn with_discriminator<T: BorshSerialize>(value: &T) -> Vec<u8> {
    let mut data = vec![0u8; 8];
    value.serialize(&mut data).unwrap();
    data
}

/// Pool account for `mint` still trading on its curve.
pub fn trading_pool_account(mint: &Pubkey, addresses: &ProgramAddresses) -> LaunchpadPoolAccount {
    LaunchpadPoolAccount {
        status: STATUS_TRADING,
        base_decimals: 6,
        quote_decimals: 9,
        migrate_type: 1,
        supply: 1_000_000_000_000_000,
        total_base_sell: 793_100_000_000_000,
        virtual_base: 1_073_025_605_596_382,
        virtual_quote: 30_000_852_951,
        real_base: 0,
        real_quote: 0,
        total_quote_fund_raising: 85_000_000_000,
        global_config: addresses.global_config.to_bytes(),
        platform_config: addresses.platform_config.to_bytes(),
        base_mint: mint.to_bytes(),
        quote_mint: addresses.quote_mint.to_bytes(),
        creator: Pubkey::new_unique().to_bytes(),
        ..Default::default()
    }
}

/// Installs a trading pool for `mint` and a global config charging 0.25%.
/// Returns the raw account bodies so tests can price against them.
pub fn install_pool(chain: &MockChain, config: &EngineConfig, mint: &Pubkey) -> (Vec<u8>, Vec<u8>) {
    let addresses = ProgramAddresses::resolve(&config.programs).unwrap();
    let pool = with_discriminator(&trading_pool_account(mint, &addresses));
    let global = with_discriminator(&LaunchpadGlobalConfig {
        trade_fee_rate: 2_500,
        ..Default::default()
    });
    chain.set_account(addresses.pool_state(mint), pool.clone());
    chain.set_account(addresses.global_config, global.clone());
    (pool, global)
}

/// Program id and data of every instruction in a sent transaction.
pub fn instructions_of(transaction: &Transaction) -> Vec<(Pubkey, Vec<u8>)> {
    let keys = &transaction.message.account_keys;
    transaction
        .message
        .instructions
        .iter()
        .map(|ix| (keys[ix.program_id_index as usize], ix.data.clone()))
        .collect()
}
