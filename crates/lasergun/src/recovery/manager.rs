//! Orchestration on top of the replay: integrity checking, chain sync,
//! and wallet statistics.

use {
    crate::{LaserGun, error::Result, proxy::TokenMetadata, recovery::RecoveryOutcome},
    alloy::primitives::{Address, U256},
    itertools::Itertools,
    model::{EventCounts, TransactionType},
    serde::Serialize,
    std::collections::{HashMap, HashSet},
    strum::IntoEnumIterator,
};

#[derive(Debug, Clone, Serialize)]
pub struct IntegrityReport {
    pub valid: bool,
    pub issues: Vec<String>,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub added: usize,
    pub removed: usize,
    pub updated: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletStats {
    pub shield_count: usize,
    pub active_shields: usize,
    pub total_by_token: HashMap<Address, U256>,
    /// Symbol/name/decimals for every token appearing in the totals.
    pub tokens: HashMap<Address, TokenMetadata>,
    pub transactions_by_type: HashMap<TransactionType, usize>,
    pub last_scanned_block: Option<u64>,
    pub counts: EventCounts,
}

impl LaserGun {
    /// Replays history from the configured start block.
    pub async fn recover(&self) -> Result<RecoveryOutcome> {
        self.historical().run(self.config.start_block).await
    }

    /// Cross-checks stored state against the chain and the HD invariants
    /// without changing anything.
    pub async fn validate_integrity(&self) -> Result<IntegrityReport> {
        let mut issues = Vec::new();
        let mut suggestions = Vec::new();

        let shields = self.storage.load_shields(&self.ctx).await?;
        let mut orphans = 0usize;
        let mut hd_slots = HashSet::new();
        for shield in &shields {
            match self.api.shield_info(shield.commitment).await {
                Ok(info) if !info.is_active() => orphans += 1,
                Ok(_) => {}
                Err(error) => issues.push(format!(
                    "could not verify shield {} on-chain: {error}",
                    shield.commitment
                )),
            }
            if let (Some(operation), Some(index)) = (shield.hd_operation, shield.hd_index) {
                if !hd_slots.insert((operation, index)) {
                    issues.push(format!(
                        "two shields claim derivation path {}",
                        operation.path(index)
                    ));
                }
                if let Ok((_, expected)) = self.hd.derive_with_commitment(operation, index) {
                    if expected != shield.commitment {
                        issues.push(format!(
                            "shield {} does not reproduce from {}",
                            shield.commitment,
                            operation.path(index)
                        ));
                    }
                }
            }
        }
        if orphans > 0 {
            issues.push(format!("{orphans} stored shields are no longer active on-chain"));
            suggestions.push("run sync_with_blockchain to drop orphaned shields".into());
        }

        let counts = self.storage.load_event_counts(&self.ctx).await?;
        match counts {
            None if !shields.is_empty() => {
                issues.push("event counts record is missing".into());
                suggestions.push("run recovery to rebuild the counters".into());
            }
            None => {}
            Some(counts) => {
                let transactions = self.storage.load_transactions(&self.ctx).await?;
                for tx_type in TransactionType::iter() {
                    let highest = transactions
                        .iter()
                        .filter(|record| record.tx_type == tx_type)
                        .map(|record| record.nonce)
                        .max();
                    if let Some(highest) = highest {
                        if counts.next_nonce(tx_type) <= highest {
                            issues.push(format!(
                                "{tx_type} counter {} is behind highest recorded nonce {highest}",
                                counts.next_nonce(tx_type)
                            ));
                            suggestions.push("run recovery to advance the counters".into());
                        }
                    }
                }
            }
        }

        suggestions.dedup();
        Ok(IntegrityReport {
            valid: issues.is_empty(),
            issues,
            suggestions,
        })
    }

    /// Makes storage agree with the chain: drops shields whose commitment
    /// is gone, adopts on-chain amounts, then replays to pull anything
    /// new.
    pub async fn sync_with_blockchain(&self) -> Result<SyncReport> {
        let mut removed = 0usize;
        let mut updated = 0usize;

        for mut shield in self.storage.load_shields(&self.ctx).await? {
            let info = match self.api.shield_info(shield.commitment).await {
                Ok(info) => info,
                Err(error) => {
                    tracing::warn!(?error, commitment = %shield.commitment, "skipping shield during sync");
                    continue;
                }
            };
            if !info.is_active() {
                self.storage
                    .delete_shield(&self.ctx, shield.commitment)
                    .await?;
                removed += 1;
                tracing::debug!(commitment = %shield.commitment, "dropped inactive shield");
            } else if info.amount != shield.amount {
                shield.amount = info.amount;
                self.storage.save_shield(&self.ctx, &shield).await?;
                updated += 1;
            }
        }

        let start = match self.storage.load_scan_cursor(&self.ctx).await? {
            Some(last_scanned) => last_scanned + 1,
            None => self.config.start_block,
        };
        let outcome = self.historical().run(start).await?;

        Ok(SyncReport {
            added: outcome.shields_added,
            removed,
            updated,
        })
    }

    pub async fn stats(&self) -> Result<WalletStats> {
        let shields = self.storage.load_shields(&self.ctx).await?;
        let mut active_shields = 0usize;
        let mut total_by_token: HashMap<Address, U256> = HashMap::new();
        for shield in &shields {
            if self.api.is_commitment_active(shield.commitment).await? {
                active_shields += 1;
                *total_by_token.entry(shield.token).or_default() += shield.amount;
            }
        }

        let mut tokens = HashMap::new();
        for token in total_by_token.keys() {
            match self.tokens.metadata(*token).await {
                Ok(metadata) => {
                    tokens.insert(*token, metadata);
                }
                Err(error) => {
                    tracing::warn!(?error, %token, "could not fetch token metadata")
                }
            }
        }

        let transactions_by_type = self
            .storage
            .load_transactions(&self.ctx)
            .await?
            .into_iter()
            .counts_by(|record| record.tx_type);

        Ok(WalletStats {
            shield_count: shields.len(),
            active_shields,
            total_by_token,
            tokens,
            transactions_by_type,
            last_scanned_block: self.storage.load_scan_cursor(&self.ctx).await?,
            counts: self
                .storage
                .load_event_counts(&self.ctx)
                .await?
                .unwrap_or_default(),
        })
    }
}
