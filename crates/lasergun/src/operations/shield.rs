//! Locking public tokens into a fresh commitment.

use {
    crate::{
        LaserGun,
        error::{Error, Result},
        result::ShieldResult,
    },
    alloy::primitives::{Address, U256},
    model::{HdOperation, Shield, TransactionRecord, TransactionType},
};

impl LaserGun {
    /// Locks `amount` of `token` into a new shield at the next
    /// `shield/{i}` path.
    pub async fn shield(&self, amount: U256, token: Address) -> ShieldResult {
        match self.try_shield(amount, token).await {
            Ok(result) => result,
            Err(error) => {
                tracing::warn!(?error, %token, "shield failed");
                ShieldResult::failure(&error)
            }
        }
    }

    async fn try_shield(&self, amount: U256, token: Address) -> Result<ShieldResult> {
        if amount.is_zero() {
            return Err(Error::InvalidAmount("amount must be positive".into()));
        }
        self.tokens
            .ensure_balance(token, self.ctx.wallet, amount)
            .await?;
        self.tokens
            .ensure_allowance(token, self.ctx.wallet, self.config.contract, amount)
            .await?;

        // Allocation through count-persist happens under the lock so two
        // pipelines can never consume the same index.
        let _allocation = self.allocation.lock().await;
        let mut counts = self.counts().await?;
        let index = counts.next_index(HdOperation::Shield);
        let (secret, commitment) = self.hd.derive_with_commitment(HdOperation::Shield, index)?;
        if self.api.shield_info(commitment).await?.exists {
            return Err(Error::CommitmentExists(commitment));
        }

        let submitted = self.api.submit_shield(amount, token, commitment).await?;

        let fees = self.api.fee_config().await?;
        let fee = fees.shield_fee(amount);
        let net = amount - fee;
        let timestamp = self.timestamp_of(submitted.block_number).await;

        let shield = Shield {
            secret,
            commitment,
            token,
            amount: net,
            timestamp,
            derivation_path: None,
            hd_index: None,
            hd_operation: None,
            tx_hash: Some(submitted.tx_hash),
            block_number: Some(submitted.block_number),
        }
        .with_hd(HdOperation::Shield, index);
        self.storage.save_shield(&self.ctx, &shield).await?;

        let record = TransactionRecord {
            nonce: index,
            tx_type: TransactionType::Shield,
            tx_hash: submitted.tx_hash,
            block_number: submitted.block_number,
            timestamp,
            token,
            amount: net,
            commitment: Some(commitment),
            from: Some(self.ctx.wallet),
            to: None,
            fee: Some(fee),
            derivation_path: Some(HdOperation::Shield.path(index)),
            hd_index: Some(index),
            hd_operation: Some(HdOperation::Shield),
        };
        self.storage.save_transaction(&self.ctx, &record).await?;

        counts.bump(TransactionType::Shield);
        counts.observe_block(submitted.block_number);
        self.storage.save_event_counts(&self.ctx, &counts).await?;

        tracing::info!(%commitment, index, tx = %submitted.tx_hash, "shielded");
        Ok(ShieldResult {
            success: true,
            tx_hash: Some(submitted.tx_hash),
            commitment: Some(commitment),
            secret: Some(secret),
            net_amount: Some(net),
            fee: Some(fee),
            error: None,
        })
    }
}
