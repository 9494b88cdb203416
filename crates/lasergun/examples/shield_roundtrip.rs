//! Minimal end-to-end wiring: connect, register the wallet key, shield,
//! then scan with a recovery pass.
//!
//! Usage:
//!   RPC_URL=https://... PRIVATE_KEY=0x... CONTRACT_ADDRESS=0x... \
//!   TOKEN_ADDRESS=0x... CHAIN_ID=1 AMOUNT=1000000 \
//!   cargo run -p lasergun --example shield_roundtrip

use {
    alloy::{
        primitives::{Address, U256},
        providers::{Provider, ProviderBuilder},
        signers::local::PrivateKeySigner,
    },
    anyhow::Context,
    lasergun::{Config, LaserGun, LocalWalletSigner},
    std::sync::Arc,
    storage::MemoryStorage,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let rpc_url = std::env::var("RPC_URL").context("RPC_URL not set")?;
    let private_key = std::env::var("PRIVATE_KEY").context("PRIVATE_KEY not set")?;
    let contract: Address = std::env::var("CONTRACT_ADDRESS")
        .context("CONTRACT_ADDRESS not set")?
        .parse()?;
    let token: Address = std::env::var("TOKEN_ADDRESS")
        .context("TOKEN_ADDRESS not set")?
        .parse()?;
    let chain_id: u64 = std::env::var("CHAIN_ID")
        .unwrap_or_else(|_| "1".to_string())
        .parse()?;
    let amount: U256 = std::env::var("AMOUNT")
        .unwrap_or_else(|_| "1000000".to_string())
        .parse()?;

    let signer: PrivateKeySigner = private_key.parse()?;
    let wallet = signer.address();
    println!("wallet: {wallet}");

    let provider = ProviderBuilder::new()
        .wallet(signer.clone())
        .connect_http(rpc_url.parse()?)
        .erased();

    let config = Config::new(contract, chain_id, wallet);
    let sdk = LaserGun::connect(
        config,
        provider,
        &LocalWalletSigner::new(signer),
        Arc::new(MemoryStorage::new()),
    )
    .await?;

    let registration = sdk.register_public_key().await;
    println!("registration: {registration:?}");

    let shielded = sdk.shield(amount, token).await;
    println!("shield: {shielded:?}");

    // Replay history, then watch for inbound transfers for a while.
    sdk.start_scanning(true)?;
    tokio::time::sleep(std::time::Duration::from_secs(30)).await;
    sdk.stop_scanning().await?;

    let stats = sdk.stats().await?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
