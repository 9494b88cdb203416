//! Durable transaction records, keyed by `(type, nonce)` within a context.

use {
    crate::hd::HdOperation,
    alloy_primitives::{Address, B256, U256},
    serde::{Deserialize, Serialize},
};

/// Every kind of row the wallet journals.
///
/// For the HD-backed kinds the nonce equals the HD index of the operation;
/// `unshield` and `transfer` consume plain per-type counters.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TransactionType {
    Shield,
    Unshield,
    Transfer,
    Received,
    Remainder,
    Consolidate,
}

impl TransactionType {
    /// The HD operation whose index doubles as this row's nonce, if any.
    pub fn hd_operation(&self) -> Option<HdOperation> {
        match self {
            Self::Shield => Some(HdOperation::Shield),
            Self::Received => Some(HdOperation::Received),
            Self::Remainder => Some(HdOperation::Remainder),
            Self::Consolidate => Some(HdOperation::Consolidate),
            Self::Unshield | Self::Transfer => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    /// Unique within `(context, type)`.
    pub nonce: u32,
    #[serde(rename = "type")]
    pub tx_type: TransactionType,
    pub tx_hash: B256,
    pub block_number: u64,
    pub timestamp: u64,
    pub token: Address,
    pub amount: U256,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commitment: Option<B256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derivation_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hd_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hd_operation: Option<HdOperation>,
}

impl TransactionRecord {
    /// The `(type, nonce)` storage key, rendered as `{type}_{nonce}`.
    pub fn storage_id(&self) -> String {
        format!("{}_{}", self.tx_type, self.nonce)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_field_serializes_as_type() {
        let record = TransactionRecord {
            nonce: 3,
            tx_type: TransactionType::Remainder,
            tx_hash: B256::repeat_byte(0xab),
            block_number: 123,
            timestamp: 456,
            token: Address::repeat_byte(0x01),
            amount: U256::from(77u64),
            commitment: None,
            from: None,
            to: None,
            fee: None,
            derivation_path: Some("remainder/3".into()),
            hd_index: Some(3),
            hd_operation: Some(HdOperation::Remainder),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "remainder");
        assert_eq!(json["nonce"], 3);
        assert_eq!(record.storage_id(), "remainder_3");
    }

    #[test]
    fn hd_backed_kinds() {
        assert_eq!(
            TransactionType::Shield.hd_operation(),
            Some(HdOperation::Shield)
        );
        assert_eq!(TransactionType::Unshield.hd_operation(), None);
        assert_eq!(TransactionType::Transfer.hd_operation(), None);
    }
}
