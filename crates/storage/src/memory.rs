//! In-memory reference backend.
//!
//! A string-keyed map of JSON documents, exactly the shape of the
//! key-value stores the SDK is deployed against; other backends replicate
//! this layout byte for byte.

use {
    crate::{Error, Result, StorageAdapter, key},
    alloy_primitives::B256,
    model::{CryptoKeys, EventCounts, Shield, TransactionRecord, TransactionType, WalletContext},
    serde::{Serialize, de::DeserializeOwned},
    std::collections::BTreeMap,
    tokio::sync::RwLock,
};

#[derive(Debug, Default)]
pub struct MemoryStorage {
    records: RwLock<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held across all contexts.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    async fn put<T: Serialize>(&self, storage_key: String, value: &T) -> Result<()> {
        let json = serde_json::to_string(value).map_err(|source| Error::Corrupt {
            key: storage_key.clone(),
            source,
        })?;
        self.records.write().await.insert(storage_key, json);
        Ok(())
    }

    async fn get<T: DeserializeOwned>(&self, storage_key: &str) -> Result<Option<T>> {
        let records = self.records.read().await;
        let Some(json) = records.get(storage_key) else {
            return Ok(None);
        };
        serde_json::from_str(json)
            .map(Some)
            .map_err(|source| Error::Corrupt {
                key: storage_key.to_string(),
                source,
            })
    }

    async fn load_kind<T: DeserializeOwned>(&self, ctx: &WalletContext, kind: &str) -> Result<Vec<T>> {
        let prefix = format!("{}_{kind}_", ctx.storage_prefix());
        let records = self.records.read().await;
        records
            .range(prefix.clone()..)
            .take_while(|(storage_key, _)| storage_key.starts_with(&prefix))
            .map(|(storage_key, json)| {
                serde_json::from_str(json).map_err(|source| Error::Corrupt {
                    key: storage_key.clone(),
                    source,
                })
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl StorageAdapter for MemoryStorage {
    async fn save_shield(&self, ctx: &WalletContext, shield: &Shield) -> Result<()> {
        self.put(key::shield(ctx, shield.commitment), shield).await
    }

    async fn load_shield(&self, ctx: &WalletContext, commitment: B256) -> Result<Option<Shield>> {
        self.get(&key::shield(ctx, commitment)).await
    }

    async fn delete_shield(&self, ctx: &WalletContext, commitment: B256) -> Result<()> {
        self.records
            .write()
            .await
            .remove(&key::shield(ctx, commitment));
        Ok(())
    }

    async fn load_shields(&self, ctx: &WalletContext) -> Result<Vec<Shield>> {
        self.load_kind(ctx, "shield").await
    }

    async fn save_transaction(
        &self,
        ctx: &WalletContext,
        record: &TransactionRecord,
    ) -> Result<()> {
        self.put(key::transaction(ctx, record.tx_type, record.nonce), record)
            .await
    }

    async fn load_transaction(
        &self,
        ctx: &WalletContext,
        tx_type: TransactionType,
        nonce: u32,
    ) -> Result<Option<TransactionRecord>> {
        self.get(&key::transaction(ctx, tx_type, nonce)).await
    }

    async fn load_transactions(&self, ctx: &WalletContext) -> Result<Vec<TransactionRecord>> {
        let mut records: Vec<TransactionRecord> = self.load_kind(ctx, "tx").await?;
        records.sort_by_key(|record| (record.tx_type.to_string(), record.nonce));
        Ok(records)
    }

    async fn save_event_counts(&self, ctx: &WalletContext, counts: &EventCounts) -> Result<()> {
        self.put(key::event_counts(ctx), counts).await
    }

    async fn load_event_counts(&self, ctx: &WalletContext) -> Result<Option<EventCounts>> {
        self.get(&key::event_counts(ctx)).await
    }

    async fn save_scan_cursor(&self, ctx: &WalletContext, block: u64) -> Result<()> {
        self.put(key::scan_cursor(ctx), &block).await
    }

    async fn load_scan_cursor(&self, ctx: &WalletContext) -> Result<Option<u64>> {
        self.get(&key::scan_cursor(ctx)).await
    }

    async fn save_keys(&self, ctx: &WalletContext, keys: &CryptoKeys) -> Result<()> {
        self.put(key::keys(ctx), keys).await
    }

    async fn load_keys(&self, ctx: &WalletContext) -> Result<Option<CryptoKeys>> {
        self.get(&key::keys(ctx)).await
    }

    async fn clear_wallet_data(&self, ctx: &WalletContext) -> Result<()> {
        let prefix = format!("{}_", ctx.storage_prefix());
        self.records
            .write()
            .await
            .retain(|storage_key, _| !storage_key.starts_with(&prefix));
        Ok(())
    }
}
