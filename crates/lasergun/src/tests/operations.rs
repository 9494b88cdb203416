//! Operation pipelines against the simulated chain.

use {
    super::{FakeChain, Fixture, TOKEN},
    crate::{
        error::ErrorKind,
        proxy::{ChainApi, MockChainApi},
        signer::LocalWalletSigner,
    },
    alloy::{
        primitives::{Address, B256, U256},
        signers::local::PrivateKeySigner,
    },
    model::{HdOperation, TransactionType},
    std::sync::Arc,
    storage::MemoryStorage,
};

#[tokio::test]
async fn shield_allocates_records_and_counts() {
    let chain = FakeChain::new();
    let f = Fixture::new(&chain, 0x41).await;
    f.fund(1_000_000);

    let result = f.sdk.shield(U256::from(100_000u64), TOKEN).await;
    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.fee, Some(U256::from(1_000u64)));
    assert_eq!(result.net_amount, Some(U256::from(99_000u64)));

    let shields = f.sdk.shields().await.unwrap();
    assert_eq!(shields.len(), 1);
    let shield = &shields[0];
    assert_eq!(shield.derivation_path.as_deref(), Some("shield/0"));
    assert_eq!(shield.amount, U256::from(99_000u64));
    assert_eq!(shield.commitment, result.commitment.unwrap());
    // The commitment reproduces from the stored coordinates.
    let (_, expected) = f
        .sdk
        .hd()
        .derive_with_commitment(HdOperation::Shield, 0)
        .unwrap();
    assert_eq!(shield.commitment, expected);

    let counts = f.sdk.event_counts().await.unwrap();
    assert_eq!(counts.shield, 1);
    assert!(counts.last_updated_block > 0);

    let transactions = f.sdk.transactions().await.unwrap();
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0].tx_type, TransactionType::Shield);
    assert_eq!(transactions[0].nonce, 0);
}

#[tokio::test]
async fn repeated_shields_use_prefix_indices() {
    let chain = FakeChain::new();
    let f = Fixture::new(&chain, 0x41).await;
    f.fund(1_000_000);

    for _ in 0..3 {
        let result = f.sdk.shield(U256::from(10_000u64), TOKEN).await;
        assert!(result.success, "{:?}", result.error);
    }

    let counts = f.sdk.event_counts().await.unwrap();
    assert_eq!(counts.shield, 3);

    let mut indices: Vec<u32> = f
        .sdk
        .shields()
        .await
        .unwrap()
        .iter()
        .map(|shield| shield.hd_index.unwrap())
        .collect();
    indices.sort_unstable();
    assert_eq!(indices, vec![0, 1, 2]);
}

#[tokio::test]
async fn rejections_happen_before_any_rpc() {
    // A mock with no call expectations beyond construction proves the
    // input checks fire first.
    let mut api = MockChainApi::new();
    api.expect_chain_id().returning(|| Ok(super::CHAIN_ID));
    let signer = LocalWalletSigner::new(
        PrivateKeySigner::from_bytes(&B256::repeat_byte(0x41)).unwrap(),
    );
    let config = crate::Config::new(super::CONTRACT, super::CHAIN_ID, signer.address());
    let sdk = crate::LaserGun::with_api(
        config,
        Arc::new(api),
        &signer,
        Arc::new(MemoryStorage::new()),
    )
    .await
    .unwrap();

    let result = sdk.shield(U256::ZERO, TOKEN).await;
    assert_eq!(result.error.unwrap().kind, ErrorKind::InvalidAmount);

    let result = sdk
        .unshield(B256::repeat_byte(0x01), U256::ZERO, Address::repeat_byte(0x02))
        .await;
    assert_eq!(result.error.unwrap().kind, ErrorKind::InvalidAmount);

    let result = sdk.consolidate(vec![], TOKEN).await;
    assert_eq!(result.error.unwrap().kind, ErrorKind::ValidationError);

    let result = sdk
        .consolidate(vec![B256::repeat_byte(0x01); 11], TOKEN)
        .await;
    assert_eq!(result.error.unwrap().kind, ErrorKind::ValidationError);
}

#[tokio::test]
async fn shield_requires_a_covering_balance() {
    let chain = FakeChain::new();
    let f = Fixture::new(&chain, 0x41).await;
    f.fund(50);

    let result = f.sdk.shield(U256::from(100u64), TOKEN).await;
    assert!(!result.success);
    assert_eq!(result.error.unwrap().kind, ErrorKind::InsufficientBalance);
    assert!(f.sdk.shields().await.unwrap().is_empty());
}

#[tokio::test]
async fn full_unshield_spends_the_commitment() {
    let chain = FakeChain::new();
    let f = Fixture::new(&chain, 0x41).await;
    f.fund(1_000_000);

    let shielded = f.sdk.shield(U256::from(100_000u64), TOKEN).await;
    let secret = shielded.secret.unwrap();
    let commitment = shielded.commitment.unwrap();

    let result = f
        .sdk
        .unshield(secret, U256::from(99_000u64), f.wallet)
        .await;
    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.remainder_commitment, None);
    assert_eq!(result.fee, Some(U256::from(1_980u64)));

    let counts = f.sdk.event_counts().await.unwrap();
    assert_eq!(counts.unshield, 1);
    assert_eq!(counts.remainder, 0);

    // The commitment is no longer active from the contract's point of
    // view.
    assert!(f.chain.shield_state(commitment).unwrap().spent);

    // Integrity flags the stale record; sync drops it.
    let report = f.sdk.validate_integrity().await.unwrap();
    assert!(!report.valid);
    let sync = f.sdk.sync_with_blockchain().await.unwrap();
    assert_eq!(sync.removed, 1);
    assert_eq!(sync.added, 0);
    assert!(f.sdk.shields().await.unwrap().is_empty());
}

#[tokio::test]
async fn partial_unshield_creates_a_remainder() {
    let chain = FakeChain::new();
    let f = Fixture::new(&chain, 0x41).await;
    f.fund(1_000_000);

    let shielded = f.sdk.shield(U256::from(100_000u64), TOKEN).await;
    let secret = shielded.secret.unwrap();

    // 99_000 shielded; withdraw 30_000, fee 2% of 30_000 = 600 comes out
    // of the change.
    let result = f
        .sdk
        .unshield(secret, U256::from(30_000u64), f.wallet)
        .await;
    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.remainder_amount, Some(U256::from(68_400u64)));

    let counts = f.sdk.event_counts().await.unwrap();
    assert_eq!(counts.unshield, 1);
    assert_eq!(counts.remainder, 1);

    let shields = f.sdk.shields().await.unwrap();
    let remainder = shields
        .iter()
        .find(|shield| shield.hd_operation == Some(HdOperation::Remainder))
        .unwrap();
    assert_eq!(remainder.derivation_path.as_deref(), Some("remainder/0"));
    assert_eq!(remainder.amount, U256::from(68_400u64));
    assert_eq!(
        remainder.commitment,
        result.remainder_commitment.unwrap()
    );

    // The public balance received exactly the requested amount.
    assert_eq!(
        f.chain
            .for_wallet(f.wallet)
            .token_balance(TOKEN, f.wallet)
            .await
            .unwrap(),
        U256::from(900_000u64 + 30_000u64)
    );
}

#[tokio::test]
async fn unshield_rejects_unknown_and_overdrawn_shields() {
    let chain = FakeChain::new();
    let f = Fixture::new(&chain, 0x41).await;
    f.fund(1_000_000);

    let result = f
        .sdk
        .unshield(B256::repeat_byte(0x99), U256::from(1u64), f.wallet)
        .await;
    assert_eq!(result.error.unwrap().kind, ErrorKind::ShieldNotFound);

    let shielded = f.sdk.shield(U256::from(100_000u64), TOKEN).await;
    let result = f
        .sdk
        .unshield(shielded.secret.unwrap(), U256::from(99_001u64), f.wallet)
        .await;
    assert_eq!(result.error.unwrap().kind, ErrorKind::InsufficientBalance);
}

#[tokio::test]
async fn consolidate_merges_shields() {
    let chain = FakeChain::new();
    let f = Fixture::new(&chain, 0x41).await;
    f.fund(1_000_000);

    let first = f.sdk.shield(U256::from(10_000u64), TOKEN).await;
    let second = f.sdk.shield(U256::from(20_000u64), TOKEN).await;

    let result = f
        .sdk
        .consolidate(
            vec![first.secret.unwrap(), second.secret.unwrap()],
            TOKEN,
        )
        .await;
    assert!(result.success, "{:?}", result.error);
    // 9_900 + 19_800 carried over in full.
    assert_eq!(result.total_amount, Some(U256::from(29_700u64)));

    let counts = f.sdk.event_counts().await.unwrap();
    assert_eq!(counts.consolidate, 1);

    let shields = f.sdk.shields().await.unwrap();
    let consolidated = shields
        .iter()
        .find(|shield| shield.hd_operation == Some(HdOperation::Consolidate))
        .unwrap();
    assert_eq!(
        consolidated.derivation_path.as_deref(),
        Some("consolidate/0")
    );
    assert_eq!(consolidated.amount, U256::from(29_700u64));

    // Inputs are spent on-chain.
    assert!(f.chain.shield_state(first.commitment.unwrap()).unwrap().spent);
    assert!(f.chain.shield_state(second.commitment.unwrap()).unwrap().spent);
}

#[tokio::test]
async fn consolidate_rejects_empty_inputs() {
    let chain = FakeChain::new();
    let f = Fixture::new(&chain, 0x41).await;
    f.fund(1_000_000);
    let shielded = f.sdk.shield(U256::from(10_000u64), TOKEN).await;

    // A spent or foreign secret holds no balance.
    let result = f
        .sdk
        .consolidate(
            vec![shielded.secret.unwrap(), B256::repeat_byte(0x99)],
            TOKEN,
        )
        .await;
    assert_eq!(result.error.unwrap().kind, ErrorKind::InsufficientBalance);
}

#[tokio::test]
async fn transfer_requires_a_registered_recipient() {
    let chain = FakeChain::new();
    let f = Fixture::new(&chain, 0x41).await;
    f.fund(1_000_000);
    let shielded = f.sdk.shield(U256::from(100_000u64), TOKEN).await;

    let result = f
        .sdk
        .transfer_to(
            shielded.secret.unwrap(),
            U256::from(1_000u64),
            Address::repeat_byte(0x99),
        )
        .await;
    assert!(!result.success);
    assert_eq!(result.error.unwrap().kind, ErrorKind::ValidationError);
    // Nothing was journaled for the failed attempt.
    assert_eq!(f.sdk.event_counts().await.unwrap().transfer, 0);
}

#[tokio::test]
async fn registration_is_idempotent() {
    let chain = FakeChain::new();
    let f = Fixture::new(&chain, 0x41).await;

    let first = f.sdk.register_public_key().await;
    assert!(first.success);
    assert!(first.tx_hash.is_some());

    // Already registered: succeeds without a transaction.
    let second = f.sdk.register_public_key().await;
    assert!(second.success);
    assert!(second.tx_hash.is_none());
}

#[tokio::test]
async fn chain_id_mismatch_aborts_construction() {
    let mut api = MockChainApi::new();
    api.expect_chain_id().returning(|| Ok(999));
    let signer = LocalWalletSigner::new(
        PrivateKeySigner::from_bytes(&B256::repeat_byte(0x41)).unwrap(),
    );
    let config = crate::Config::new(super::CONTRACT, super::CHAIN_ID, signer.address());
    let result = crate::LaserGun::with_api(
        config,
        Arc::new(api),
        &signer,
        Arc::new(MemoryStorage::new()),
    )
    .await;
    assert!(matches!(result, Err(crate::error::Error::Network(_))));
}

#[tokio::test]
async fn keys_are_written_once_and_reloaded() {
    let chain = FakeChain::new();
    let storage = Arc::new(MemoryStorage::new());
    let first = Fixture::with_storage(&chain, 0x41, storage.clone()).await;
    let keys = first.sdk.keys().clone();

    let second = Fixture::with_storage(&chain, 0x41, storage).await;
    assert_eq!(second.sdk.keys(), &keys);
}
