//! Merging up to ten shields into one fresh commitment.

use {
    crate::{
        LaserGun,
        error::{Error, Result},
        result::ConsolidateResult,
    },
    alloy::primitives::{Address, B256, U256},
    model::{HdOperation, Shield, TransactionRecord, TransactionType},
};

/// Contract-imposed ceiling on inputs per consolidation.
const MAX_CONSOLIDATE_INPUTS: usize = 10;

impl LaserGun {
    /// Merges the shields opened by `secrets` (all on `token`) into one
    /// shield at the next `consolidate/{k}` path.
    pub async fn consolidate(&self, secrets: Vec<B256>, token: Address) -> ConsolidateResult {
        match self.try_consolidate(secrets, token).await {
            Ok(result) => result,
            Err(error) => {
                tracing::warn!(?error, %token, "consolidate failed");
                ConsolidateResult::failure(&error)
            }
        }
    }

    async fn try_consolidate(
        &self,
        secrets: Vec<B256>,
        token: Address,
    ) -> Result<ConsolidateResult> {
        if secrets.is_empty() || secrets.len() > MAX_CONSOLIDATE_INPUTS {
            return Err(Error::Validation(format!(
                "consolidate takes between 1 and {MAX_CONSOLIDATE_INPUTS} secrets, got {}",
                secrets.len()
            )));
        }

        let mut total = U256::ZERO;
        for (position, secret) in secrets.iter().enumerate() {
            let balance = self.api.shield_balance(*secret, token).await?;
            if balance.is_zero() {
                return Err(Error::InsufficientBalance(format!(
                    "secret at position {position} holds no balance of {token}"
                )));
            }
            total += balance;
        }

        let _allocation = self.allocation.lock().await;
        let mut counts = self.counts().await?;
        let index = counts.next_index(HdOperation::Consolidate);
        let (secret, commitment) = self
            .hd
            .derive_with_commitment(HdOperation::Consolidate, index)?;
        if self.api.shield_info(commitment).await?.exists {
            return Err(Error::CommitmentExists(commitment));
        }

        let submitted = self.api.submit_consolidate(secrets, commitment).await?;

        let info = self.api.shield_info(commitment).await?;
        let (amount, timestamp) = if info.exists {
            (info.amount, info.timestamp)
        } else {
            (total, self.timestamp_of(submitted.block_number).await)
        };

        let shield = Shield {
            secret,
            commitment,
            token,
            amount,
            timestamp,
            derivation_path: None,
            hd_index: None,
            hd_operation: None,
            tx_hash: Some(submitted.tx_hash),
            block_number: Some(submitted.block_number),
        }
        .with_hd(HdOperation::Consolidate, index);
        self.storage.save_shield(&self.ctx, &shield).await?;

        let record = TransactionRecord {
            nonce: index,
            tx_type: TransactionType::Consolidate,
            tx_hash: submitted.tx_hash,
            block_number: submitted.block_number,
            timestamp,
            token,
            amount,
            commitment: Some(commitment),
            from: None,
            to: None,
            fee: None,
            derivation_path: Some(HdOperation::Consolidate.path(index)),
            hd_index: Some(index),
            hd_operation: Some(HdOperation::Consolidate),
        };
        self.storage.save_transaction(&self.ctx, &record).await?;

        counts.bump(TransactionType::Consolidate);
        counts.observe_block(submitted.block_number);
        self.storage.save_event_counts(&self.ctx, &counts).await?;

        tracing::info!(%commitment, index, %amount, tx = %submitted.tx_hash, "consolidated");
        Ok(ConsolidateResult {
            success: true,
            tx_hash: Some(submitted.tx_hash),
            new_commitment: Some(commitment),
            secret: Some(secret),
            total_amount: Some(amount),
            error: None,
        })
    }
}
