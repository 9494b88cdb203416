//! File-backed reference backend.
//!
//! The same string-keyed JSON layout as [`crate::MemoryStorage`],
//! persisted as one JSON document on disk. Writes go through a temp file
//! and rename so a crash never leaves a torn store behind. Suitable for
//! CLI wallets and tests; heavier deployments bring their own adapter.

use {
    crate::{Error, Result, StorageAdapter, key},
    alloy_primitives::B256,
    anyhow::Context,
    model::{CryptoKeys, EventCounts, Shield, TransactionRecord, TransactionType, WalletContext},
    serde::{Serialize, de::DeserializeOwned},
    std::{collections::BTreeMap, path::PathBuf},
    tokio::sync::RwLock,
};

#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    records: RwLock<BTreeMap<String, String>>,
}

impl FileStorage {
    /// Opens (or creates) the store at `path`.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let records = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| Error::Corrupt {
                key: path.display().to_string(),
                source,
            })?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => {
                return Err(Error::Backend(
                    anyhow::Error::new(err)
                        .context(format!("could not read store at {}", path.display())),
                ));
            }
        };
        Ok(Self {
            path,
            records: RwLock::new(records),
        })
    }

    /// Serializes the whole map and atomically replaces the store file.
    async fn flush(&self, records: &BTreeMap<String, String>) -> Result<()> {
        let json = serde_json::to_vec_pretty(records).map_err(|source| Error::Corrupt {
            key: self.path.display().to_string(),
            source,
        })?;
        let tmp = self.path.with_extension("tmp");
        let write = async {
            tokio::fs::write(&tmp, &json)
                .await
                .context("could not write temp store")?;
            tokio::fs::rename(&tmp, &self.path)
                .await
                .context("could not move store into place")
        };
        write.await.map_err(Error::Backend)
    }

    async fn put<T: Serialize>(&self, storage_key: String, value: &T) -> Result<()> {
        let json = serde_json::to_string(value).map_err(|source| Error::Corrupt {
            key: storage_key.clone(),
            source,
        })?;
        let mut records = self.records.write().await;
        records.insert(storage_key, json);
        self.flush(&records).await
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

    async fn load_kind<T: DeserializeOwned>(
        &self,
        ctx: &WalletContext,
        kind: &str,
    ) -> Result<Vec<T>> {
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
impl StorageAdapter for FileStorage {
    async fn save_shield(&self, ctx: &WalletContext, shield: &Shield) -> Result<()> {
        self.put(key::shield(ctx, shield.commitment), shield).await
    }

    async fn load_shield(&self, ctx: &WalletContext, commitment: B256) -> Result<Option<Shield>> {
        self.get(&key::shield(ctx, commitment)).await
    }

    async fn delete_shield(&self, ctx: &WalletContext, commitment: B256) -> Result<()> {
        let mut records = self.records.write().await;
        if records.remove(&key::shield(ctx, commitment)).is_some() {
            self.flush(&records).await?;
        }
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
        let mut records = self.records.write().await;
        records.retain(|storage_key, _| !storage_key.starts_with(&prefix));
        self.flush(&records).await
    }
}
