//! Tagged chain-event variants as consumed by the scanner and recovery.
//!
//! Raw logs arrive as weakly typed maps; the proxy converts each into one
//! of these variants, rejecting logs with missing meta fields instead of
//! silently defaulting them. The meta triple `(block, tx index, log index)`
//! is the global ordering recovery depends on.

use alloy_primitives::{Address, B256, Bytes, U256};

/// Position of a log in the canonical chain order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventMeta {
    pub block_number: u64,
    pub transaction_hash: B256,
    pub transaction_index: u64,
    pub log_index: u64,
}

impl EventMeta {
    /// Sort key implementing the mandatory block → tx → log ordering.
    pub fn ordering_key(&self) -> (u64, u64, u64) {
        (self.block_number, self.transaction_index, self.log_index)
    }
}

/// The four event kinds of the mixer contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainEvent {
    Shielded {
        commitment: B256,
        token: Address,
        amount: U256,
        fee: U256,
        meta: EventMeta,
    },
    Unshielded {
        commitment: B256,
        token: Address,
        amount: U256,
        fee: U256,
        meta: EventMeta,
    },
    SecretDelivered {
        encrypted_secret: Bytes,
        meta: EventMeta,
    },
    /// The indexed old-commitment array arrives only as a topic hash, so
    /// the variant carries the new commitment alone; matching is done by
    /// re-deriving the expected commitment.
    Consolidated {
        new_commitment: B256,
        meta: EventMeta,
    },
}

impl ChainEvent {
    pub fn meta(&self) -> &EventMeta {
        match self {
            Self::Shielded { meta, .. }
            | Self::Unshielded { meta, .. }
            | Self::SecretDelivered { meta, .. }
            | Self::Consolidated { meta, .. } => meta,
        }
    }

    pub fn ordering_key(&self) -> (u64, u64, u64) {
        self.meta().ordering_key()
    }
}

/// Merge-sorts event streams into the canonical replay order.
pub fn sort_events(mut events: Vec<ChainEvent>) -> Vec<ChainEvent> {
    events.sort_by_key(ChainEvent::ordering_key);
    events
}
