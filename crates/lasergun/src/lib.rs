//! Client-side SDK for the LaserGun token mixer.
//!
//! One [`LaserGun`] instance is pinned to a `(chain, wallet)` pair. It
//! derives every shield secret from one master seed along `op/{index}`
//! paths, executes the user operations as allocate → submit → record
//! pipelines, scans the event log for inbound transfers, and can rebuild
//! its whole state from the chain by sequential replay.

use {
    crate::{
        error::{Error, Result},
        proxy::{ChainApi, OnchainApi},
        recovery::HistoricalRecovery,
        scanner::{ScanControl, ScanTask},
        token::TokenManager,
    },
    crypto::{HdSecretManager, WalletSigner},
    model::{CryptoKeys, EventCounts, Shield, TransactionRecord, WalletContext},
    std::sync::{Arc, atomic::Ordering},
    storage::StorageAdapter,
};

pub mod config;
pub mod error;
mod operations;
pub mod proxy;
pub mod recovery;
pub mod result;
pub mod scanner;
pub mod signer;
pub mod token;

#[cfg(test)]
mod tests;

pub use {
    crate::{
        config::Config,
        error::ErrorKind,
        proxy::{FeeConfig, ShieldInfo, Submitted, TokenMetadata},
        recovery::{IntegrityReport, RecoveryOutcome, SyncReport, WalletStats},
        result::{
            CallResult, ConsolidateResult, OperationError, ShieldResult, TransferResult,
            UnshieldResult,
        },
        scanner::{NoopObserver, ScanObserver, ScannerState},
        signer::LocalWalletSigner,
    },
    model::{HdOperation, TransactionType},
};

/// The SDK facade.
pub struct LaserGun {
    pub(crate) config: Arc<Config>,
    pub(crate) ctx: WalletContext,
    pub(crate) api: Arc<dyn ChainApi>,
    pub(crate) storage: Arc<dyn StorageAdapter>,
    pub(crate) keys: CryptoKeys,
    pub(crate) hd: Arc<HdSecretManager>,
    pub(crate) tokens: TokenManager,
    pub(crate) observer: Arc<dyn ScanObserver>,
    /// Held from HD allocation through count-persist in every operation;
    /// shared with the scanner and recovery so counter updates never
    /// interleave.
    pub(crate) allocation: Arc<tokio::sync::Mutex<()>>,
    pub(crate) scan: ScanControl,
}

impl LaserGun {
    /// Connects through an RPC provider, deriving (or reloading) the
    /// wallet's ECIES identity.
    pub async fn connect(
        config: Config,
        provider: contracts::Provider,
        signer: &dyn WalletSigner,
        storage: Arc<dyn StorageAdapter>,
    ) -> Result<Self> {
        let api = Arc::new(OnchainApi::new(
            provider,
            config.contract,
            config.receipt_timeout,
        ));
        Self::with_api(config, api, signer, storage).await
    }

    /// Same as [`Self::connect`] over an explicit chain API; the seam the
    /// tests drive.
    pub async fn with_api(
        config: Config,
        api: Arc<dyn ChainApi>,
        signer: &dyn WalletSigner,
        storage: Arc<dyn StorageAdapter>,
    ) -> Result<Self> {
        config.validate()?;

        let onchain = api.chain_id().await?;
        if onchain != config.chain_id {
            return Err(Error::Network(anyhow::anyhow!(
                "provider is on chain {onchain}, configured for chain {}",
                config.chain_id
            )));
        }

        let ctx = WalletContext::new(config.chain_id, config.wallet);
        let keys = match storage.load_keys(&ctx).await? {
            Some(keys) => keys,
            None => {
                let keys =
                    crypto::generate_keys(signer, config.chain_id, config.wallet, config.key_nonce)
                        .await?;
                storage.save_keys(&ctx, &keys).await?;
                tracing::info!(wallet = %config.wallet, "derived wallet keys");
                keys
            }
        };

        let hd = Arc::new(HdSecretManager::new(
            keys.private_key,
            config.wallet,
            config.chain_id,
        )?);

        Ok(Self {
            config: Arc::new(config),
            ctx,
            tokens: TokenManager::new(api.clone()),
            api,
            storage,
            keys,
            hd,
            observer: Arc::new(NoopObserver),
            allocation: Arc::new(tokio::sync::Mutex::new(())),
            scan: ScanControl::new(),
        })
    }

    /// Installs the callback sink for scanner and recovery events.
    pub fn with_observer(mut self, observer: Arc<dyn ScanObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn context(&self) -> WalletContext {
        self.ctx
    }

    /// The wallet's ECIES identity (public half is safe to share).
    pub fn keys(&self) -> &CryptoKeys {
        &self.keys
    }

    pub fn hd(&self) -> &HdSecretManager {
        &self.hd
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    pub async fn shields(&self) -> Result<Vec<Shield>> {
        Ok(self.storage.load_shields(&self.ctx).await?)
    }

    pub async fn transactions(&self) -> Result<Vec<TransactionRecord>> {
        Ok(self.storage.load_transactions(&self.ctx).await?)
    }

    pub async fn event_counts(&self) -> Result<EventCounts> {
        self.counts().await
    }

    pub async fn last_scanned_block(&self) -> Result<Option<u64>> {
        Ok(self.storage.load_scan_cursor(&self.ctx).await?)
    }

    /// Drops every record of this wallet context from storage.
    pub async fn clear_wallet_data(&self) -> Result<()> {
        Ok(self.storage.clear_wallet_data(&self.ctx).await?)
    }

    pub fn scanner_state(&self) -> ScannerState {
        self.scan.state()
    }

    /// Starts the background scan loop; optionally replays history first.
    pub fn start_scanning(&self, recover_first: bool) -> Result<()> {
        if self.scan.running.swap(true, Ordering::SeqCst) {
            return Err(Error::Scanner("scanner already running".into()));
        }
        let handle = tokio::spawn(self.scan_task().run(recover_first));
        *self
            .scan
            .handle
            .try_lock()
            .map_err(|_| Error::Scanner("scanner handle is busy".into()))? = Some(handle);
        Ok(())
    }

    /// Flips the stop flag and waits for the loop to reach its next
    /// boundary. A batch in flight finishes its writes first.
    pub async fn stop_scanning(&self) -> Result<()> {
        self.scan.running.store(false, Ordering::SeqCst);
        let handle = self.scan.handle.lock().await.take();
        if let Some(handle) = handle {
            handle
                .await
                .map_err(|err| Error::Scanner(format!("scan loop panicked: {err}")))?;
        }
        Ok(())
    }

    pub(crate) fn scan_task(&self) -> ScanTask {
        ScanTask {
            api: self.api.clone(),
            storage: self.storage.clone(),
            ctx: self.ctx,
            config: self.config.clone(),
            hd: self.hd.clone(),
            private_key: self.keys.private_key,
            observer: self.observer.clone(),
            allocation: self.allocation.clone(),
            running: self.scan.running.clone(),
            state: self.scan.state.clone(),
        }
    }

    pub(crate) fn historical(&self) -> HistoricalRecovery {
        HistoricalRecovery {
            api: self.api.clone(),
            storage: self.storage.clone(),
            ctx: self.ctx,
            hd: self.hd.clone(),
            private_key: self.keys.private_key,
            batch_size: self.config.batch_size,
            pause: self.config.recovery_pause,
            observer: self.observer.clone(),
            allocation: self.allocation.clone(),
        }
    }
}
