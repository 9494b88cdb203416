//! Redeeming a shield back to a public balance, with change handling.

use {
    crate::{
        LaserGun,
        error::{Error, Result},
        proxy::NO_REMAINDER,
        result::UnshieldResult,
    },
    alloy::primitives::{Address, B256, U256},
    model::{HdOperation, Shield, TransactionRecord, TransactionType},
};

impl LaserGun {
    /// Redeems `amount` from the shield opened by `secret` to
    /// `recipient`'s public balance. A partial redemption allocates the
    /// next `remainder/{j}` path for the change.
    pub async fn unshield(&self, secret: B256, amount: U256, recipient: Address) -> UnshieldResult {
        match self.try_unshield(secret, amount, recipient).await {
            Ok(result) => result,
            Err(error) => {
                tracing::warn!(?error, "unshield failed");
                UnshieldResult::failure(&error)
            }
        }
    }

    async fn try_unshield(
        &self,
        secret: B256,
        amount: U256,
        recipient: Address,
    ) -> Result<UnshieldResult> {
        if amount.is_zero() {
            return Err(Error::InvalidAmount("amount must be positive".into()));
        }
        let commitment = crypto::commitment(secret, self.ctx.wallet);
        let info = self.active_shield(commitment).await?;
        if amount > info.amount {
            return Err(Error::InsufficientBalance(format!(
                "shield balance {} below requested {amount}",
                info.amount
            )));
        }

        let _allocation = self.allocation.lock().await;
        let mut counts = self.counts().await?;

        let remainder_amount = info.amount - amount;
        let remainder = if remainder_amount > U256::ZERO {
            let index = counts.next_index(HdOperation::Remainder);
            let (remainder_secret, remainder_commitment) = self
                .hd
                .derive_with_commitment(HdOperation::Remainder, index)?;
            Some((index, remainder_secret, remainder_commitment))
        } else {
            None
        };
        let new_commitment = remainder
            .as_ref()
            .map(|(_, _, commitment)| *commitment)
            .unwrap_or(NO_REMAINDER);

        let submitted = self
            .api
            .submit_unshield(secret, amount, recipient, new_commitment)
            .await?;

        let fees = self.api.fee_config().await?;
        let fee = fees.unshield_fee(amount);
        let timestamp = self.timestamp_of(submitted.block_number).await;

        let mut recorded_remainder = None;
        if let Some((index, remainder_secret, remainder_commitment)) = remainder {
            // The chain is authoritative for the change amount; fee
            // arithmetic is never reproduced locally.
            let remainder_info = self.api.shield_info(remainder_commitment).await?;
            if remainder_info.exists {
                let shield = Shield {
                    secret: remainder_secret,
                    commitment: remainder_commitment,
                    token: remainder_info.token,
                    amount: remainder_info.amount,
                    timestamp: remainder_info.timestamp,
                    derivation_path: None,
                    hd_index: None,
                    hd_operation: None,
                    tx_hash: Some(submitted.tx_hash),
                    block_number: Some(submitted.block_number),
                }
                .with_hd(HdOperation::Remainder, index);
                self.storage.save_shield(&self.ctx, &shield).await?;

                let record = TransactionRecord {
                    nonce: index,
                    tx_type: TransactionType::Remainder,
                    tx_hash: submitted.tx_hash,
                    block_number: submitted.block_number,
                    timestamp,
                    token: remainder_info.token,
                    amount: remainder_info.amount,
                    commitment: Some(remainder_commitment),
                    from: None,
                    to: None,
                    fee: None,
                    derivation_path: Some(HdOperation::Remainder.path(index)),
                    hd_index: Some(index),
                    hd_operation: Some(HdOperation::Remainder),
                };
                self.storage.save_transaction(&self.ctx, &record).await?;
                counts.bump(TransactionType::Remainder);
                recorded_remainder = Some((remainder_commitment, remainder_info.amount));
            } else {
                tracing::warn!(
                    %remainder_commitment,
                    "remainder commitment not found on-chain after unshield"
                );
            }
        }

        let record = TransactionRecord {
            nonce: counts.next_nonce(TransactionType::Unshield),
            tx_type: TransactionType::Unshield,
            tx_hash: submitted.tx_hash,
            block_number: submitted.block_number,
            timestamp,
            token: info.token,
            amount,
            commitment: Some(commitment),
            from: None,
            to: Some(recipient),
            fee: Some(fee),
            derivation_path: None,
            hd_index: None,
            hd_operation: None,
        };
        self.storage.save_transaction(&self.ctx, &record).await?;

        counts.bump(TransactionType::Unshield);
        counts.observe_block(submitted.block_number);
        self.storage.save_event_counts(&self.ctx, &counts).await?;

        tracing::info!(%commitment, %amount, tx = %submitted.tx_hash, "unshielded");
        Ok(UnshieldResult {
            success: true,
            tx_hash: Some(submitted.tx_hash),
            amount: Some(amount),
            fee: Some(fee),
            remainder_commitment: recorded_remainder.map(|(commitment, _)| commitment),
            remainder_amount: recorded_remainder.map(|(_, amount)| amount),
            error: None,
        })
    }
}
