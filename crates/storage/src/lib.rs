//! Persistence boundary of the SDK.
//!
//! Every concrete backend stores the same five record kinds per wallet
//! context and honours the same idempotence rules; the SDK never sees
//! anything but this trait. The bundled [`MemoryStorage`] backend is the
//! reference for the canonical key scheme; [`FileStorage`] persists the
//! same layout on disk.

use {
    alloy_primitives::B256,
    model::{CryptoKeys, EventCounts, Shield, TransactionRecord, TransactionType, WalletContext},
    thiserror::Error,
};

pub mod file;
pub mod memory;

pub use {file::FileStorage, memory::MemoryStorage};

#[derive(Debug, Error)]
pub enum Error {
    #[error("storage backend failure")]
    Backend(#[source] anyhow::Error),
    #[error("corrupt record at `{key}`")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Abstract per-(chain, wallet) persistence.
///
/// Writes must be last-writer-wins per key; reads of absent keys return
/// `None` rather than an error.
#[async_trait::async_trait]
pub trait StorageAdapter: Send + Sync {
    async fn save_shield(&self, ctx: &WalletContext, shield: &Shield) -> Result<()>;
    async fn load_shield(&self, ctx: &WalletContext, commitment: B256) -> Result<Option<Shield>>;
    async fn delete_shield(&self, ctx: &WalletContext, commitment: B256) -> Result<()>;
    /// All shields of the context, in unspecified order.
    async fn load_shields(&self, ctx: &WalletContext) -> Result<Vec<Shield>>;

    /// Batch write; backends with transactions may override the
    /// one-by-one default.
    async fn save_shields(&self, ctx: &WalletContext, shields: &[Shield]) -> Result<()> {
        for shield in shields {
            self.save_shield(ctx, shield).await?;
        }
        Ok(())
    }

    async fn save_transaction(
        &self,
        ctx: &WalletContext,
        record: &TransactionRecord,
    ) -> Result<()>;

    async fn save_transactions(
        &self,
        ctx: &WalletContext,
        records: &[TransactionRecord],
    ) -> Result<()> {
        for record in records {
            self.save_transaction(ctx, record).await?;
        }
        Ok(())
    }

    async fn load_transaction(
        &self,
        ctx: &WalletContext,
        tx_type: TransactionType,
        nonce: u32,
    ) -> Result<Option<TransactionRecord>>;
    /// All records of the context, sorted by `(type, nonce)`.
    async fn load_transactions(&self, ctx: &WalletContext) -> Result<Vec<TransactionRecord>>;

    async fn save_event_counts(&self, ctx: &WalletContext, counts: &EventCounts) -> Result<()>;
    async fn load_event_counts(&self, ctx: &WalletContext) -> Result<Option<EventCounts>>;

    async fn save_scan_cursor(&self, ctx: &WalletContext, block: u64) -> Result<()>;
    async fn load_scan_cursor(&self, ctx: &WalletContext) -> Result<Option<u64>>;

    async fn save_keys(&self, ctx: &WalletContext, keys: &CryptoKeys) -> Result<()>;
    async fn load_keys(&self, ctx: &WalletContext) -> Result<Option<CryptoKeys>>;

    /// Removes everything stored for the context; other contexts are
    /// untouched.
    async fn clear_wallet_data(&self, ctx: &WalletContext) -> Result<()>;
}

/// Storage keys of the canonical scheme:
/// `lasergun_{chain}_{wallet_lower}_{kind}[_{id}]`.
pub mod key {
    use super::*;

    pub fn shield(ctx: &WalletContext, commitment: B256) -> String {
        format!("{}_shield_{commitment}", ctx.storage_prefix())
    }

    pub fn transaction(ctx: &WalletContext, tx_type: TransactionType, nonce: u32) -> String {
        format!("{}_tx_{tx_type}_{nonce}", ctx.storage_prefix())
    }

    pub fn event_counts(ctx: &WalletContext) -> String {
        format!("{}_eventCounts", ctx.storage_prefix())
    }

    pub fn scan_cursor(ctx: &WalletContext) -> String {
        format!("{}_lastBlock", ctx.storage_prefix())
    }

    pub fn keys(ctx: &WalletContext) -> String {
        format!("{}_keys", ctx.storage_prefix())
    }
}

#[cfg(test)]
mod tests {
    use {super::*, alloy_primitives::Address};

    #[test]
    fn key_scheme_matches_the_reference_layout() {
        let ctx = WalletContext::new(137, Address::repeat_byte(0xab));
        let prefix = "lasergun_137_0xabababababababababababababababababababab";
        assert_eq!(
            key::shield(&ctx, B256::repeat_byte(0x01)),
            format!(
                "{prefix}_shield_0x0101010101010101010101010101010101010101010101010101010101010101"
            )
        );
        assert_eq!(
            key::transaction(&ctx, TransactionType::Received, 4),
            format!("{prefix}_tx_received_4")
        );
        assert_eq!(key::event_counts(&ctx), format!("{prefix}_eventCounts"));
        assert_eq!(key::scan_cursor(&ctx), format!("{prefix}_lastBlock"));
        assert_eq!(key::keys(&ctx), format!("{prefix}_keys"));
    }
}
