//! Private hand-off of value to another wallet.
//!
//! The sender mints a fresh random secret for the recipient, commits it to
//! the recipient's address, and delivers it through an ECIES envelope the
//! contract re-emits as `SecretDelivered`. Only the recipient's scanner
//! can open it.

use {
    crate::{
        LaserGun,
        error::{Error, Result},
        result::TransferResult,
    },
    alloy::primitives::{Address, B256, Bytes, U256},
    model::{TransactionRecord, TransactionType},
    rand::RngCore,
};

impl LaserGun {
    /// Full composition: fetches the recipient's registered key, derives
    /// the payload, and submits.
    pub async fn transfer_to(
        &self,
        secret: B256,
        amount: U256,
        recipient: Address,
    ) -> TransferResult {
        let composed = match self.compose_transfer(recipient).await {
            Ok(composed) => composed,
            Err(error) => {
                tracing::warn!(?error, %recipient, "transfer composition failed");
                return TransferResult::failure(&error);
            }
        };
        let (recipient_commitment, encrypted_secret) = composed;
        self.transfer(secret, amount, recipient_commitment, encrypted_secret)
            .await
    }

    /// Low-level entry for callers that already hold the recipient
    /// commitment and envelope.
    pub async fn transfer(
        &self,
        secret: B256,
        amount: U256,
        recipient_commitment: B256,
        encrypted_secret: Bytes,
    ) -> TransferResult {
        match self
            .try_transfer(secret, amount, recipient_commitment, encrypted_secret)
            .await
        {
            Ok(result) => result,
            Err(error) => {
                tracing::warn!(?error, "transfer failed");
                TransferResult::failure(&error)
            }
        }
    }

    /// Derives `(recipient_commitment, encrypted_secret)` for a recipient
    /// with a registered public key.
    pub async fn compose_transfer(&self, recipient: Address) -> Result<(B256, Bytes)> {
        let recipient_key = self.api.registered_public_key(recipient).await?;
        if recipient_key.is_empty() {
            return Err(Error::Validation(format!(
                "recipient {recipient} has no registered public key"
            )));
        }

        let mut fresh = B256::ZERO;
        rand::rngs::OsRng.fill_bytes(fresh.as_mut_slice());
        let recipient_commitment = crypto::commitment(fresh, recipient);

        let envelope = crypto::ecies::encrypt_secret(fresh, &recipient_key)?;
        let payload = crypto::ecies::unwrap_payload(&envelope)
            .ok_or_else(|| Error::Scanner("freshly encoded envelope failed to unwrap".into()))?;
        Ok((recipient_commitment, Bytes::from(payload)))
    }

    async fn try_transfer(
        &self,
        secret: B256,
        amount: U256,
        recipient_commitment: B256,
        encrypted_secret: Bytes,
    ) -> Result<TransferResult> {
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

        let submitted = self
            .api
            .submit_transfer(secret, amount, recipient_commitment, encrypted_secret)
            .await?;

        let fees = self.api.fee_config().await?;
        let fee = fees.transfer_fee(amount);
        let timestamp = self.timestamp_of(submitted.block_number).await;

        let record = TransactionRecord {
            nonce: counts.next_nonce(TransactionType::Transfer),
            tx_type: TransactionType::Transfer,
            tx_hash: submitted.tx_hash,
            block_number: submitted.block_number,
            timestamp,
            token: info.token,
            amount,
            commitment: Some(commitment),
            from: Some(self.ctx.wallet),
            to: None,
            fee: Some(fee),
            derivation_path: None,
            hd_index: None,
            hd_operation: None,
        };
        self.storage.save_transaction(&self.ctx, &record).await?;

        counts.bump(TransactionType::Transfer);
        counts.observe_block(submitted.block_number);
        self.storage.save_event_counts(&self.ctx, &counts).await?;

        tracing::info!(%recipient_commitment, %amount, tx = %submitted.tx_hash, "transferred");
        Ok(TransferResult {
            success: true,
            tx_hash: Some(submitted.tx_hash),
            recipient_commitment: Some(recipient_commitment),
            error: None,
        })
    }
}
