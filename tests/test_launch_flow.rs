//! Launch flow against an in-memory chain and metadata store.

mod common;

use bonk_launcher::launchpad::addresses::ProgramAddresses;
use bonk_launcher::launchpad::instructions::discriminators;
use bonk_launcher::launchpad::{LaunchpadBuilder, LaunchpadService, OperationResult, ReasonCode, Receipt};
use bonk_launcher::{EngineConfig, Intent, LaunchIntent, LaunchTokenRequest};
use common::{instructions_of, live_config, secret_for, MockChain, RecordingMetadataStore};
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signer},
};
use std::str::FromStr;
use std::sync::Arc;

fn request() -> LaunchTokenRequest {
    LaunchTokenRequest {
        name: "Bonk Dog".to_string(),
        symbol: "BDOG".to_string(),
        description: Some("the goodest dog".to_string()),
        twitter: Some("https://x.com/bonkdog".to_string()),
        telegram: None,
        website: Some("https://bonkdog.fun".to_string()),
        image_url: None,
        idempotency_key: None,
    }
}

struct Fixture {
    chain: Arc<MockChain>,
    store: Arc<RecordingMetadataStore>,
    service: Arc<dyn LaunchpadService>,
    launcher: Keypair,
    config: EngineConfig,
}

fn fixture() -> Fixture {
    let launcher = Keypair::new();
    let chain = Arc::new(MockChain::new());
    let store = Arc::new(RecordingMetadataStore::new());
    let orchestrator = LaunchpadBuilder::from_config(live_config())
        .with_launcher_keypair(secret_for(&launcher))
        .with_metadata_store(store.clone())
        .build_with_chain(chain.clone())
        .unwrap();
    let config = orchestrator.config().clone();
    Fixture {
        chain,
        store,
        service: Arc::new(orchestrator),
        launcher,
        config,
    }
}

#[tokio::test]
async fn test_successful_launch() {
    let f = fixture();
    let result = f.service.execute(Intent::Launch(request().into())).await;
    let receipt = match result {
        OperationResult::Success(Receipt::Launch(receipt)) => receipt,
        other => panic!("unexpected result: {:?}", other),
    };

    let addresses = ProgramAddresses::resolve(&f.config.programs).unwrap();
    let mint = Pubkey::from_str(&receipt.mint_address).unwrap();
    assert_eq!(receipt.pool_state, addresses.pool_state(&mint).to_string());
    assert_eq!(receipt.uri, "https://ipfs.io/ipfs/meta-1.json");
    assert_eq!(receipt.image_url, f.config.default_image_uri);

    let sent = f.chain.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(receipt.transaction_hash, sent[0].signatures[0].to_string());
    // launcher pays, the fresh mint co-signs
    assert_eq!(sent[0].signatures.len(), 2);
    assert_eq!(sent[0].message.account_keys[0], f.launcher.pubkey());
    assert!(sent[0].message.account_keys.contains(&mint));
    assert!(sent[0].verify().is_ok());
}

#[tokio::test]
async fn test_launch_is_one_initialize_creating_mint_metadata_and_pool() {
    let f = fixture();
    let receipt = match f.service.execute(Intent::Launch(request().into())).await {
        OperationResult::Success(Receipt::Launch(receipt)) => receipt,
        other => panic!("unexpected result: {:?}", other),
    };

    let addresses = ProgramAddresses::resolve(&f.config.programs).unwrap();
    let transactions = f.chain.sent();
    let sent = &transactions[0];
    let instructions: Vec<(Pubkey, Vec<u8>)> = instructions_of(sent)
        .into_iter()
        .filter(|(program, _)| *program != solana_sdk::compute_budget::id())
        .collect();
    // nothing may create the mint or its metadata ahead of the program
    assert_eq!(instructions.len(), 1);
    assert_eq!(instructions[0].0, addresses.launchpad_program);
    assert_eq!(&instructions[0].1[..8], &discriminators::INITIALIZE);

    let mint = Pubkey::from_str(&receipt.mint_address).unwrap();
    let metadata = addresses.metadata_account(&mint);
    assert!(sent.message.account_keys.contains(&metadata));
    assert!(sent.message.account_keys.contains(&addresses.pool_state(&mint)));
}

#[tokio::test]
async fn test_metadata_document_carries_request_fields() {
    let f = fixture();
    let mut req = request();
    req.image_url = Some("https://arweave.net/custom.png".to_string());
    let result = f.service.execute(Intent::Launch(req.into())).await;
    assert!(result.is_success());

    let stored = f.store.stored();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].name, "Bonk Dog");
    assert_eq!(stored[0].symbol, "BDOG");
    assert_eq!(stored[0].description, "the goodest dog");
    assert_eq!(stored[0].image, "https://arweave.net/custom.png");
    assert_eq!(stored[0].extensions.twitter.as_deref(), Some("https://x.com/bonkdog"));
    assert_eq!(stored[0].extensions.telegram, None);

    let body = result.response_body();
    assert_eq!(body["image_url"], "https://arweave.net/custom.png");
}

#[tokio::test]
async fn test_empty_name_or_symbol_fails_before_anything_is_built() {
    let f = fixture();
    for (name, symbol) in [("", "BDOG"), ("Bonk Dog", "  ")] {
        let mut req = request();
        req.name = name.to_string();
        req.symbol = symbol.to_string();
        let result = f.service.execute(Intent::Launch(req.into())).await;
        assert_eq!(result.reason_code(), Some(ReasonCode::ValidationError));
        assert_eq!(result.http_status(), 400);
    }
    assert!(f.store.stored().is_empty());
    assert_eq!(f.chain.calls(), 0);
}

#[tokio::test]
async fn test_launch_without_launcher_wallet_is_internal() {
    let chain = Arc::new(MockChain::new());
    let service = LaunchpadBuilder::from_config(live_config())
        .with_metadata_store(Arc::new(RecordingMetadataStore::new()))
        .build_with_chain(chain.clone())
        .unwrap();

    let result = service.execute(Intent::Launch(request().into())).await;
    assert_eq!(result.reason_code(), Some(ReasonCode::Internal));
    assert_eq!(result.http_status(), 500);
    assert_eq!(chain.calls(), 0);
}

#[tokio::test]
async fn test_each_launch_creates_a_new_mint() {
    let f = fixture();
    let mut mints = Vec::new();
    for _ in 0..2 {
        match f.service.execute(Intent::Launch(LaunchIntent::from(request()))).await {
            OperationResult::Success(Receipt::Launch(receipt)) => mints.push(receipt.mint_address),
            other => panic!("unexpected result: {:?}", other),
        }
    }
    assert_ne!(mints[0], mints[1]);
}
