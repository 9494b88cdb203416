//! Per-operation event counters: the HD allocation watermark.

use {
    crate::{hd::HdOperation, transaction::TransactionType},
    serde::{Deserialize, Serialize},
};

/// One record per wallet context. Counts never decrease and
/// `last_updated_block` only moves forward; the next HD index for an
/// operation is always the current count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventCounts {
    pub shield: u32,
    pub remainder: u32,
    pub received: u32,
    pub consolidate: u32,
    pub unshield: u32,
    pub transfer: u32,
    pub last_updated_block: u64,
}

impl EventCounts {
    /// Next free HD index for the operation.
    pub fn next_index(&self, operation: HdOperation) -> u32 {
        match operation {
            HdOperation::Shield => self.shield,
            HdOperation::Remainder => self.remainder,
            HdOperation::Received => self.received,
            HdOperation::Consolidate => self.consolidate,
        }
    }

    /// Next free nonce for a transaction type (HD index for HD-backed
    /// kinds, plain counter otherwise).
    pub fn next_nonce(&self, tx_type: TransactionType) -> u32 {
        match tx_type {
            TransactionType::Shield => self.shield,
            TransactionType::Remainder => self.remainder,
            TransactionType::Received => self.received,
            TransactionType::Consolidate => self.consolidate,
            TransactionType::Unshield => self.unshield,
            TransactionType::Transfer => self.transfer,
        }
    }

    pub fn bump(&mut self, tx_type: TransactionType) {
        match tx_type {
            TransactionType::Shield => self.shield += 1,
            TransactionType::Remainder => self.remainder += 1,
            TransactionType::Received => self.received += 1,
            TransactionType::Consolidate => self.consolidate += 1,
            TransactionType::Unshield => self.unshield += 1,
            TransactionType::Transfer => self.transfer += 1,
        }
    }

    /// Advances the watermark, never backwards.
    pub fn observe_block(&mut self, block: u64) {
        self.last_updated_block = self.last_updated_block.max(block);
    }

    pub fn total(&self) -> u64 {
        u64::from(self.shield)
            + u64::from(self.remainder)
            + u64::from(self.received)
            + u64::from(self.consolidate)
            + u64::from(self.unshield)
            + u64::from(self.transfer)
    }
}
