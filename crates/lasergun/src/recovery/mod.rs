//! Historical recovery: sequential block-ordered replay.
//!
//! Rebuilds shields, transactions, and counters from the chain alone. The
//! load-bearing rule is the global event ordering `(block, tx index, log
//! index)`: HD indices are assigned by replaying claims in exactly the
//! order the chain produced them, so a fresh install derives the same
//! numbering the original wallet did.

pub mod manager;

use {
    crate::{error::Result, proxy::ChainApi, scanner::ScanObserver},
    alloy::primitives::{Address, B256, U256},
    crypto::HdSecretManager,
    model::{
        ChainEvent, EventCounts, EventMeta, HdOperation, Shield, TransactionRecord,
        TransactionType, WalletContext, events::sort_events,
    },
    std::{
        collections::{HashMap, HashSet},
        sync::Arc,
        time::Duration,
    },
    storage::StorageAdapter,
};

/// Observed totals after a replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryOutcome {
    pub counts: EventCounts,
    pub shields_added: usize,
    pub transactions_added: usize,
    pub head: u64,
}

/// One replay run. Counts are treated as a persistent watermark: local
/// indices seed from storage and only ever advance (append-to semantics).
pub(crate) struct HistoricalRecovery {
    pub(crate) api: Arc<dyn ChainApi>,
    pub(crate) storage: Arc<dyn StorageAdapter>,
    pub(crate) ctx: WalletContext,
    pub(crate) hd: Arc<HdSecretManager>,
    pub(crate) private_key: B256,
    pub(crate) batch_size: u64,
    pub(crate) pause: Duration,
    pub(crate) observer: Arc<dyn ScanObserver>,
    /// Held for the whole replay; user operations wait rather than race
    /// the watermark.
    pub(crate) allocation: Arc<tokio::sync::Mutex<()>>,
}

/// Mutable replay state threaded through the batches.
struct Replay {
    counts: EventCounts,
    /// Transactions scheduled during the walk; persisted at the end,
    /// skipping `(type, nonce)` rows already present.
    pending: Vec<TransactionRecord>,
    /// Rows already in storage, keyed by `(type, tx hash, commitment)`;
    /// used to keep non-HD nonce assignment idempotent across re-runs.
    existing: HashMap<(TransactionType, B256, Option<B256>), u32>,
    /// Block timestamps fetched so far.
    block_times: HashMap<u64, u64>,
    shields_added: usize,
}

impl Replay {
    /// The journal row for this event from a previous run or an
    /// optimistic write, if any. The journal outlives shield pruning, so
    /// it is what keeps replays idempotent after a sync.
    fn journaled(
        &self,
        tx_type: TransactionType,
        tx_hash: B256,
        commitment: B256,
    ) -> Option<u32> {
        self.existing
            .get(&(tx_type, tx_hash, Some(commitment)))
            .copied()
    }

    /// Advances a counter so an already-journaled nonce is never
    /// reassigned.
    fn bump_past(&mut self, tx_type: TransactionType, nonce: u32) {
        while self.counts.next_nonce(tx_type) <= nonce {
            self.counts.bump(tx_type);
        }
    }
}

impl HistoricalRecovery {
    pub(crate) async fn run(&self, start_block: u64) -> Result<RecoveryOutcome> {
        let _allocation = self.allocation.lock().await;
        let head = self.api.current_block().await?;
        let mut replay = Replay {
            counts: self
                .storage
                .load_event_counts(&self.ctx)
                .await?
                .unwrap_or_default(),
            pending: Vec::new(),
            existing: self
                .storage
                .load_transactions(&self.ctx)
                .await?
                .into_iter()
                .map(|record| {
                    (
                        (record.tx_type, record.tx_hash, record.commitment),
                        record.nonce,
                    )
                })
                .collect(),
            block_times: HashMap::new(),
            shields_added: 0,
        };
        tracing::info!(start_block, head, "starting historical recovery");

        let mut from = start_block;
        while from <= head {
            let to = (from + self.batch_size - 1).min(head);
            if let Err(error) = self.process_batch(from, to, &mut replay).await {
                tracing::warn!(?error, from, to, "recovery batch failed, continuing");
                self.observer.on_error(&error);
            }
            replay.counts.observe_block(to);
            self.storage
                .save_event_counts(&self.ctx, &replay.counts)
                .await?;
            self.observer.on_batch_scanned(to);
            if to < head {
                tokio::time::sleep(self.pause).await;
            }
            from = to + 1;
        }

        let mut transactions_added = 0;
        for record in &replay.pending {
            if self
                .storage
                .load_transaction(&self.ctx, record.tx_type, record.nonce)
                .await?
                .is_none()
            {
                self.storage.save_transaction(&self.ctx, record).await?;
                transactions_added += 1;
            }
        }

        tracing::info!(
            shields = replay.shields_added,
            transactions = transactions_added,
            counts = ?replay.counts,
            "historical recovery finished"
        );
        Ok(RecoveryOutcome {
            counts: replay.counts,
            shields_added: replay.shields_added,
            transactions_added,
            head,
        })
    }

    async fn process_batch(&self, from: u64, to: u64, replay: &mut Replay) -> Result<()> {
        let events = sort_events(self.api.events_in_range(from, to).await?);

        // A transfer emits `Unshielded` and `SecretDelivered` in the same
        // transaction; the co-occurrence is what tells the two apart.
        let delivered_in: HashSet<B256> = events
            .iter()
            .filter_map(|event| match event {
                ChainEvent::SecretDelivered { meta, .. } => Some(meta.transaction_hash),
                _ => None,
            })
            .collect();

        for event in &events {
            if let Err(error) = self.process_event(event, &delivered_in, replay).await {
                // A single corrupt event must never abort the replay.
                tracing::warn!(?error, key = ?event.ordering_key(), "skipping event");
            }
        }
        Ok(())
    }

    async fn process_event(
        &self,
        event: &ChainEvent,
        delivered_in: &HashSet<B256>,
        replay: &mut Replay,
    ) -> Result<()> {
        match event {
            ChainEvent::Shielded {
                commitment,
                token,
                amount,
                fee,
                meta,
            } => {
                self.on_shielded(*commitment, *token, *amount, *fee, meta, replay)
                    .await
            }
            ChainEvent::SecretDelivered {
                encrypted_secret,
                meta,
            } => self.on_secret_delivered(encrypted_secret, meta, replay).await,
            ChainEvent::Unshielded {
                commitment,
                token,
                amount,
                fee,
                meta,
            } => {
                self.on_unshielded(*commitment, *token, *amount, *fee, meta, delivered_in, replay)
                    .await
            }
            ChainEvent::Consolidated {
                new_commitment,
                meta,
            } => self.on_consolidated(*new_commitment, meta, replay).await,
        }
    }

    /// Ours iff the commitment reproduces from the next shield index.
    async fn on_shielded(
        &self,
        commitment: B256,
        token: Address,
        amount: U256,
        fee: U256,
        meta: &EventMeta,
        replay: &mut Replay,
    ) -> Result<()> {
        let index = replay.counts.next_index(HdOperation::Shield);
        let Ok((secret, expected)) = self.hd.derive_with_commitment(HdOperation::Shield, index)
        else {
            return Ok(());
        };
        if expected != commitment {
            return Ok(());
        }

        let info = self.api.shield_info(commitment).await?;
        let net = amount.saturating_sub(fee);
        let (amount, timestamp) = if info.exists {
            (info.amount, info.timestamp)
        } else {
            (net, self.block_timestamp(meta.block_number, replay).await)
        };

        if self
            .storage
            .load_shield(&self.ctx, commitment)
            .await?
            .is_none()
        {
            let shield = Shield {
                secret,
                commitment,
                token,
                amount,
                timestamp,
                derivation_path: None,
                hd_index: None,
                hd_operation: None,
                tx_hash: Some(meta.transaction_hash),
                block_number: Some(meta.block_number),
            }
            .with_hd(HdOperation::Shield, index);
            self.storage.save_shield(&self.ctx, &shield).await?;
            replay.shields_added += 1;
            tracing::debug!(%commitment, index, "recovered shield");
        }

        replay.pending.push(TransactionRecord {
            nonce: index,
            tx_type: TransactionType::Shield,
            tx_hash: meta.transaction_hash,
            block_number: meta.block_number,
            timestamp,
            token,
            amount,
            commitment: Some(commitment),
            from: None,
            to: None,
            fee: Some(fee),
            derivation_path: Some(HdOperation::Shield.path(index)),
            hd_index: Some(index),
            hd_operation: Some(HdOperation::Shield),
        });
        replay.counts.bump(TransactionType::Shield);
        Ok(())
    }

    /// Ours iff the payload opens with the wallet key.
    async fn on_secret_delivered(
        &self,
        payload: &[u8],
        meta: &EventMeta,
        replay: &mut Replay,
    ) -> Result<()> {
        let Some(secret) = crypto::ecies::decrypt_secret(payload, self.private_key) else {
            return Ok(());
        };
        let commitment = crypto::commitment(secret, self.ctx.wallet);
        if let Some(nonce) =
            replay.journaled(TransactionType::Received, meta.transaction_hash, commitment)
        {
            replay.bump_past(TransactionType::Received, nonce);
            return Ok(());
        }
        let info = self.api.shield_info(commitment).await?;
        // Replay keeps shields the history later spent; pruning those is
        // sync's job, and skipping them here would shift every later
        // received index.
        if !info.exists {
            return Ok(());
        }

        let index = replay.counts.next_index(HdOperation::Received);
        if self
            .storage
            .load_shield(&self.ctx, commitment)
            .await?
            .is_none()
        {
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
            replay.shields_added += 1;
            tracing::debug!(%commitment, index, "recovered received shield");
        }

        replay.pending.push(TransactionRecord {
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
        });
        replay.counts.bump(TransactionType::Received);
        Ok(())
    }

    /// Ours iff the spent commitment is in local storage. Classified as a
    /// transfer when a `SecretDelivered` shares the transaction, then
    /// probed for a remainder shield.
    async fn on_unshielded(
        &self,
        commitment: B256,
        token: Address,
        amount: U256,
        fee: U256,
        meta: &EventMeta,
        delivered_in: &HashSet<B256>,
        replay: &mut Replay,
    ) -> Result<()> {
        if self
            .storage
            .load_shield(&self.ctx, commitment)
            .await?
            .is_none()
        {
            return Ok(());
        }

        let tx_type = if delivered_in.contains(&meta.transaction_hash) {
            TransactionType::Transfer
        } else {
            TransactionType::Unshield
        };

        match replay.journaled(tx_type, meta.transaction_hash, commitment) {
            // Already journaled (an optimistic write or an earlier run);
            // just make sure the counter is past its nonce.
            Some(nonce) => replay.bump_past(tx_type, nonce),
            None => {
                let timestamp = self.block_timestamp(meta.block_number, replay).await;
                replay.pending.push(TransactionRecord {
                    nonce: replay.counts.next_nonce(tx_type),
                    tx_type,
                    tx_hash: meta.transaction_hash,
                    block_number: meta.block_number,
                    timestamp,
                    token,
                    amount,
                    commitment: Some(commitment),
                    from: None,
                    to: None,
                    fee: Some(fee),
                    derivation_path: None,
                    hd_index: None,
                    hd_operation: None,
                });
                replay.counts.bump(tx_type);
            }
        }

        self.probe_remainder(meta, replay).await
    }

    /// A partial unshield creates change at the next remainder index; the
    /// chain is consulted for its true amount. Any remainder that ever
    /// existed advances the counter, spent or not, so later indices keep
    /// lining up.
    async fn probe_remainder(&self, meta: &EventMeta, replay: &mut Replay) -> Result<()> {
        let index = replay.counts.next_index(HdOperation::Remainder);
        let Ok((secret, commitment)) = self
            .hd
            .derive_with_commitment(HdOperation::Remainder, index)
        else {
            return Ok(());
        };
        if let Some(nonce) =
            replay.journaled(TransactionType::Remainder, meta.transaction_hash, commitment)
        {
            replay.bump_past(TransactionType::Remainder, nonce);
            return Ok(());
        }
        let info = self.api.shield_info(commitment).await?;
        if !info.exists {
            return Ok(());
        }

        if self
            .storage
            .load_shield(&self.ctx, commitment)
            .await?
            .is_none()
        {
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
            .with_hd(HdOperation::Remainder, index);
            self.storage.save_shield(&self.ctx, &shield).await?;
            replay.shields_added += 1;
            tracing::debug!(%commitment, index, "recovered remainder shield");
        }

        replay.pending.push(TransactionRecord {
            nonce: index,
            tx_type: TransactionType::Remainder,
            tx_hash: meta.transaction_hash,
            block_number: meta.block_number,
            timestamp: info.timestamp,
            token: info.token,
            amount: info.amount,
            commitment: Some(commitment),
            from: None,
            to: None,
            fee: None,
            derivation_path: Some(HdOperation::Remainder.path(index)),
            hd_index: Some(index),
            hd_operation: Some(HdOperation::Remainder),
        });
        replay.counts.bump(TransactionType::Remainder);
        Ok(())
    }

    /// Ours iff the new commitment reproduces from the next consolidate
    /// index. The indexed old-commitment array is only a topic hash, so
    /// derivation is the sole way to claim the event.
    async fn on_consolidated(
        &self,
        new_commitment: B256,
        meta: &EventMeta,
        replay: &mut Replay,
    ) -> Result<()> {
        let index = replay.counts.next_index(HdOperation::Consolidate);
        let Ok((secret, expected)) = self
            .hd
            .derive_with_commitment(HdOperation::Consolidate, index)
        else {
            return Ok(());
        };
        if expected != new_commitment {
            return Ok(());
        }

        let info = self.api.shield_info(new_commitment).await?;
        if info.exists
            && self
                .storage
                .load_shield(&self.ctx, new_commitment)
                .await?
                .is_none()
        {
            let shield = Shield {
                secret,
                commitment: new_commitment,
                token: info.token,
                amount: info.amount,
                timestamp: info.timestamp,
                derivation_path: None,
                hd_index: None,
                hd_operation: None,
                tx_hash: Some(meta.transaction_hash),
                block_number: Some(meta.block_number),
            }
            .with_hd(HdOperation::Consolidate, index);
            self.storage.save_shield(&self.ctx, &shield).await?;
            replay.shields_added += 1;
            tracing::debug!(%new_commitment, index, "recovered consolidated shield");
        }

        replay.pending.push(TransactionRecord {
            nonce: index,
            tx_type: TransactionType::Consolidate,
            tx_hash: meta.transaction_hash,
            block_number: meta.block_number,
            timestamp: info.timestamp,
            token: info.token,
            amount: info.amount,
            commitment: Some(new_commitment),
            from: None,
            to: None,
            fee: None,
            derivation_path: Some(HdOperation::Consolidate.path(index)),
            hd_index: Some(index),
            hd_operation: Some(HdOperation::Consolidate),
        });
        replay.counts.bump(TransactionType::Consolidate);
        Ok(())
    }

    async fn block_timestamp(&self, block: u64, replay: &mut Replay) -> u64 {
        if let Some(cached) = replay.block_times.get(&block) {
            return *cached;
        }
        let timestamp = match self.api.block_timestamp(block).await {
            Ok(timestamp) => timestamp,
            Err(error) => {
                tracing::warn!(?error, block, "could not fetch block timestamp");
                0
            }
        };
        replay.block_times.insert(block, timestamp);
        timestamp
    }
}

pub use manager::{IntegrityReport, SyncReport, WalletStats};
