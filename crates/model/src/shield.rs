//! The shield record: one on-chain commitment privately held by the wallet.

use {
    crate::hd::HdOperation,
    alloy_primitives::{Address, B256, U256},
    serde::{Deserialize, Serialize},
};

/// A privately held balance, keyed by its commitment within a wallet context.
///
/// `amount` is the on-chain net amount after fees at creation time; the
/// chain stays authoritative for it afterwards. The HD fields are present
/// for every shield this SDK derives itself and absent only for records
/// imported from elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shield {
    pub secret: B256,
    pub commitment: B256,
    pub token: Address,
    pub amount: U256,
    /// Block timestamp of the creating transaction, seconds.
    pub timestamp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derivation_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hd_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hd_operation: Option<HdOperation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<B256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
}

impl Shield {
    /// Attaches the HD coordinates, rendering the derivation path.
    pub fn with_hd(mut self, operation: HdOperation, index: u32) -> Self {
        self.derivation_path = Some(operation.path(index));
        self.hd_index = Some(index);
        self.hd_operation = Some(operation);
        self
    }
}
