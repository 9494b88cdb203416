//! Success/failure envelopes returned by the user-facing operations.
//!
//! Failures carry the taxonomy kind plus the human-readable message; they
//! are values, never raised.

use {
    crate::error::{Error, ErrorKind},
    alloy::primitives::{B256, U256},
    serde::Serialize,
};

#[derive(Debug, Clone, Serialize)]
pub struct OperationError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&Error> for OperationError {
    fn from(error: &Error) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShieldResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<B256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commitment: Option<B256>,
    /// Returned so callers can back the secret up out of band.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<B256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub net_amount: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<OperationError>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnshieldResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<B256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee: Option<U256>,
    /// Present when the unshield was partial and change was created.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remainder_commitment: Option<B256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remainder_amount: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<OperationError>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<B256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_commitment: Option<B256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<OperationError>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidateResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<B256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_commitment: Option<B256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<B256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_amount: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<OperationError>,
}

/// Envelope for operations with no payload beyond the transaction.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<B256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<OperationError>,
}

macro_rules! failure_impl {
    ($($result:ident),*) => {
        $(
            impl $result {
                pub fn failure(error: &Error) -> Self {
                    Self {
                        success: false,
                        error: Some(OperationError::from(error)),
                        ..Self::empty()
                    }
                }
            }
        )*
    };
}

impl ShieldResult {
    fn empty() -> Self {
        Self {
            success: false,
            tx_hash: None,
            commitment: None,
            secret: None,
            net_amount: None,
            fee: None,
            error: None,
        }
    }
}

impl UnshieldResult {
    fn empty() -> Self {
        Self {
            success: false,
            tx_hash: None,
            amount: None,
            fee: None,
            remainder_commitment: None,
            remainder_amount: None,
            error: None,
        }
    }
}

impl TransferResult {
    fn empty() -> Self {
        Self {
            success: false,
            tx_hash: None,
            recipient_commitment: None,
            error: None,
        }
    }
}

impl ConsolidateResult {
    fn empty() -> Self {
        Self {
            success: false,
            tx_hash: None,
            new_commitment: None,
            secret: None,
            total_amount: None,
            error: None,
        }
    }
}

impl CallResult {
    fn empty() -> Self {
        Self {
            success: false,
            tx_hash: None,
            error: None,
        }
    }
}

failure_impl!(
    ShieldResult,
    UnshieldResult,
    TransferResult,
    ConsolidateResult,
    CallResult
);
