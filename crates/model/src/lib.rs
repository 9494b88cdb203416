//! Domain types shared by every crate of the LaserGun SDK.
//!
//! Everything the wallet persists lives under a [`WalletContext`], the
//! `(chain id, lowercased wallet address)` pair that scopes storage keys.

use alloy_primitives::Address;

pub mod counts;
pub mod events;
pub mod hd;
pub mod keys;
pub mod shield;
pub mod transaction;

pub use {
    counts::EventCounts,
    events::{ChainEvent, EventMeta},
    hd::HdOperation,
    keys::CryptoKeys,
    shield::Shield,
    transaction::{TransactionRecord, TransactionType},
};

/// The `(chain, wallet)` pair every persisted entity is keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WalletContext {
    pub chain_id: u64,
    pub wallet: Address,
}

impl WalletContext {
    pub fn new(chain_id: u64, wallet: Address) -> Self {
        Self { chain_id, wallet }
    }

    /// Canonical storage prefix: `lasergun_{chain}_{wallet_lower}`.
    ///
    /// `Address` renders mixed-case (EIP-55) via `Display`; storage keys use
    /// the plain lowercased form.
    pub fn storage_prefix(&self) -> String {
        format!(
            "lasergun_{}_0x{}",
            self.chain_id,
            hex::encode(self.wallet.as_slice())
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_prefix_lowercases_the_wallet() {
        let ctx = WalletContext::new(
            1,
            "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"
                .parse()
                .unwrap(),
        );
        assert_eq!(
            ctx.storage_prefix(),
            "lasergun_1_0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2"
        );
    }
}
