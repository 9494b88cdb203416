//! Ongoing event scanner.
//!
//! After recovery has caught the wallet up, `SecretDelivered` is the only
//! event kind that can surface new state the wallet cannot predict: an
//! inbound transfer. The scanner walks the log forward in batches, tries
//! every delivered secret against the wallet key, and persists the ones
//! that open.

use {
    crate::{
        config::Config,
        error::{Error, Result},
        proxy::ChainApi,
        recovery::HistoricalRecovery,
    },
    alloy::primitives::B256,
    crypto::HdSecretManager,
    model::{
        ChainEvent, EventMeta, HdOperation, Shield, TransactionRecord, TransactionType,
        WalletContext,
    },
    serde::Serialize,
    std::sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    storage::StorageAdapter,
    tokio::{sync::Mutex, task::JoinHandle},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScannerState {
    Idle,
    Recovering,
    Running,
}

/// Callbacks delivered from the scan loop. Single consumer; implementations
/// must not block.
pub trait ScanObserver: Send + Sync {
    fn on_transaction(&self, _record: &TransactionRecord) {}
    fn on_error(&self, _error: &Error) {}
    fn on_state(&self, _state: ScannerState) {}
    fn on_batch_scanned(&self, _end_block: u64) {}
}

pub struct NoopObserver;

impl ScanObserver for NoopObserver {}

/// Shared scanner control owned by the SDK facade.
pub(crate) struct ScanControl {
    pub(crate) running: Arc<AtomicBool>,
    pub(crate) state: Arc<std::sync::Mutex<ScannerState>>,
    pub(crate) handle: Mutex<Option<JoinHandle<()>>>,
}

impl ScanControl {
    pub(crate) fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            state: Arc::new(std::sync::Mutex::new(ScannerState::Idle)),
            handle: Mutex::new(None),
        }
    }

    pub(crate) fn state(&self) -> ScannerState {
        *self.state.lock().expect("scanner state lock poisoned")
    }
}

/// The loop body; owns clones of everything it touches so it can run as a
/// detached task.
pub(crate) struct ScanTask {
    pub(crate) api: Arc<dyn ChainApi>,
    pub(crate) storage: Arc<dyn StorageAdapter>,
    pub(crate) ctx: WalletContext,
    pub(crate) config: Arc<Config>,
    pub(crate) hd: Arc<HdSecretManager>,
    pub(crate) private_key: B256,
    pub(crate) observer: Arc<dyn ScanObserver>,
    /// Shared with the operations layer; counter updates never
    /// interleave.
    pub(crate) allocation: Arc<Mutex<()>>,
    pub(crate) running: Arc<AtomicBool>,
    pub(crate) state: Arc<std::sync::Mutex<ScannerState>>,
}

impl ScanTask {
    fn set_state(&self, state: ScannerState) {
        *self.state.lock().expect("scanner state lock poisoned") = state;
        self.observer.on_state(state);
    }

    /// Runs until the stop flag flips. The flag is only observed at
    /// iteration boundaries; a batch in flight always completes its
    /// writes.
    pub(crate) async fn run(self, recover_first: bool) {
        if recover_first {
            self.set_state(ScannerState::Recovering);
            let recovery = HistoricalRecovery {
                api: self.api.clone(),
                storage: self.storage.clone(),
                ctx: self.ctx,
                hd: self.hd.clone(),
                private_key: self.private_key,
                batch_size: self.config.batch_size,
                pause: self.config.recovery_pause,
                observer: self.observer.clone(),
                allocation: self.allocation.clone(),
            };
            match recovery.run(self.config.start_block).await {
                Ok(outcome) => {
                    // Ongoing scanning resumes where the replay ended.
                    if let Err(error) = self
                        .storage
                        .save_scan_cursor(&self.ctx, outcome.head)
                        .await
                    {
                        self.observer.on_error(&error.into());
                    }
                }
                Err(error) => {
                    tracing::error!(?error, "historical recovery failed");
                    self.observer.on_error(&error);
                }
            }
        }

        self.set_state(ScannerState::Running);
        while self.running.load(Ordering::Relaxed) {
            if let Err(error) = self.iteration().await {
                tracing::warn!(?error, "scan iteration failed");
                self.observer.on_error(&error);
            }
            tokio::time::sleep(self.config.scan_pause).await;
        }
        self.set_state(ScannerState::Idle);
    }

    /// One pass: scan the next batch when behind the head, otherwise idle.
    pub(crate) async fn iteration(&self) -> Result<()> {
        let head = self.api.current_block().await?;
        let next = match self.storage.load_scan_cursor(&self.ctx).await? {
            Some(last_scanned) => last_scanned + 1,
            None => self.config.start_block,
        };
        if next <= head {
            let to = (next + self.config.batch_size - 1).min(head);
            self.scan_range(next, to).await?;
            self.storage.save_scan_cursor(&self.ctx, to).await?;
            self.observer.on_batch_scanned(to);
        } else {
            tokio::time::sleep(self.config.scan_idle_interval).await;
        }
        Ok(())
    }

    /// Re-scanning any range is safe: duplicates short-circuit on the
    /// commitment lookup.
    pub(crate) async fn scan_range(&self, from: u64, to: u64) -> Result<()> {
        let events = self.api.secret_delivered_in_range(from, to).await?;
        for event in events {
            let ChainEvent::SecretDelivered {
                encrypted_secret,
                meta,
            } = event
            else {
                continue;
            };
            if let Err(error) = self.process_delivery(&encrypted_secret, &meta).await {
                tracing::warn!(
                    ?error,
                    block = meta.block_number,
                    "failed to process delivered secret"
                );
                self.observer.on_error(&error);
            }
        }
        Ok(())
    }

    async fn process_delivery(&self, payload: &[u8], meta: &EventMeta) -> Result<()> {
        // Not addressed to this wallet; nothing to distinguish, nothing to
        // log.
        let Some(secret) = crypto::ecies::decrypt_secret(payload, self.private_key) else {
            return Ok(());
        };

        let commitment = crypto::commitment(secret, self.ctx.wallet);
        let info = self.api.shield_info(commitment).await?;
        if !info.is_active() {
            return Ok(());
        }
        if self.storage.load_shield(&self.ctx, commitment).await?.is_some() {
            return Ok(());
        }

        let _allocation = self.allocation.lock().await;
        let mut counts = self
            .storage
            .load_event_counts(&self.ctx)
            .await?
            .unwrap_or_default();
        let index = counts.next_index(HdOperation::Received);

        let shield = Shield {
            secret,
            commitment,
            token: info.token,
            amount: info.amount,
            timestamp: info.timestamp,
            derivation_path: None,
            hd_index: None,
            hd_operation: None,
            tx_hash: Some(meta.transaction_hash),
            block_number: Some(meta.block_number),
        }
        .with_hd(HdOperation::Received, index);
        self.storage.save_shield(&self.ctx, &shield).await?;

        let record = TransactionRecord {
            nonce: index,
            tx_type: TransactionType::Received,
            tx_hash: meta.transaction_hash,
            block_number: meta.block_number,
            timestamp: info.timestamp,
            token: info.token,
            amount: info.amount,
            commitment: Some(commitment),
            from: None,
            to: None,
            fee: None,
            derivation_path: Some(HdOperation::Received.path(index)),
            hd_index: Some(index),
            hd_operation: Some(HdOperation::Received),
        };
        if self
            .storage
            .load_transaction(&self.ctx, TransactionType::Received, index)
            .await?
            .is_none()
        {
            self.storage.save_transaction(&self.ctx, &record).await?;
        }

        counts.bump(TransactionType::Received);
        counts.observe_block(meta.block_number);
        self.storage.save_event_counts(&self.ctx, &counts).await?;

        tracing::info!(
            %commitment,
            index,
            block = meta.block_number,
            "received inbound transfer"
        );
        self.observer.on_transaction(&record);
        Ok(())
    }
}
