//! User-facing operations.
//!
//! Every operation is the same three-phase pipeline: allocate an HD slot
//! under the allocation lock, submit and await the receipt, then record
//! shield, transaction, and counters. Counts persist last, so a crash in
//! between is healed by recovery re-deriving the same index. Nothing here
//! raises: each public method folds failures into its result envelope.

mod consolidate;
mod shield;
mod transfer;
mod unshield;

use {
    crate::{
        LaserGun,
        error::{Error, Result},
        proxy::ShieldInfo,
        result::CallResult,
    },
    alloy::primitives::B256,
    model::EventCounts,
};

impl LaserGun {
    /// Publishes the wallet's ECIES key so counterparties can transfer to
    /// it. A no-op when the registered key already matches.
    pub async fn register_public_key(&self) -> CallResult {
        match self.try_register_public_key().await {
            Ok(result) => result,
            Err(error) => {
                tracing::warn!(?error, "public key registration failed");
                CallResult::failure(&error)
            }
        }
    }

    async fn try_register_public_key(&self) -> Result<CallResult> {
        let registered = self.api.registered_public_key(self.ctx.wallet).await?;
        if registered.as_ref() == self.keys.public_key.as_ref() {
            return Ok(CallResult {
                success: true,
                tx_hash: None,
                error: None,
            });
        }
        let submitted = self
            .api
            .submit_register_public_key(self.keys.public_key.clone())
            .await?;
        tracing::info!(tx = %submitted.tx_hash, "registered public key");
        Ok(CallResult {
            success: true,
            tx_hash: Some(submitted.tx_hash),
            error: None,
        })
    }

    pub(crate) async fn counts(&self) -> Result<EventCounts> {
        Ok(self
            .storage
            .load_event_counts(&self.ctx)
            .await?
            .unwrap_or_default())
    }

    /// Fetches shield info, rejecting commitments that are absent or
    /// already spent.
    pub(crate) async fn active_shield(&self, commitment: B256) -> Result<ShieldInfo> {
        let info = self.api.shield_info(commitment).await?;
        if !info.is_active() {
            return Err(Error::ShieldNotFound(commitment));
        }
        Ok(info)
    }

    /// Best-effort block timestamp; records fall back to zero rather than
    /// failing an operation whose transaction already mined.
    pub(crate) async fn timestamp_of(&self, block: u64) -> u64 {
        match self.api.block_timestamp(block).await {
            Ok(timestamp) => timestamp,
            Err(error) => {
                tracing::warn!(?error, block, "could not fetch block timestamp");
                0
            }
        }
    }
}
