//! Unified error taxonomy.
//!
//! Internal helpers return [`Error`]; the operations layer folds it into
//! result envelopes so nothing user-facing ever throws. Wrapped causes are
//! kept as sources so the original RPC or storage message survives into
//! diagnostics.

use {
    alloy::primitives::B256,
    serde::{Deserialize, Serialize},
    thiserror::Error,
};

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("network error: {0}")]
    Network(#[source] anyhow::Error),
    #[error("contract error: {0}")]
    Contract(#[source] anyhow::Error),
    #[error("crypto error: {0}")]
    Crypto(#[from] crypto::Error),
    #[error("storage error: {0}")]
    Storage(#[from] storage::Error),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("insufficient balance: {0}")]
    InsufficientBalance(String),
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("scanner error: {0}")]
    Scanner(String),
    #[error("shield not found or spent: {0}")]
    ShieldNotFound(B256),
    #[error("commitment already exists: {0}")]
    CommitmentExists(B256),
    #[error("HD derivation error: {0}")]
    HdDerivation(#[from] crypto::hd::DerivationError),
    #[error("event counts error: {0}")]
    EventCounts(String),
}

/// Machine-readable category, the wire form of the taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidConfig,
    NetworkError,
    ContractError,
    CryptoError,
    StorageError,
    ValidationError,
    InsufficientBalance,
    InvalidAmount,
    ScannerError,
    ShieldNotFound,
    CommitmentExists,
    HdDerivationError,
    EventCountError,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidConfig(_) => ErrorKind::InvalidConfig,
            Self::Network(_) => ErrorKind::NetworkError,
            Self::Contract(_) => ErrorKind::ContractError,
            Self::Crypto(_) => ErrorKind::CryptoError,
            Self::Storage(_) => ErrorKind::StorageError,
            Self::Validation(_) => ErrorKind::ValidationError,
            Self::InsufficientBalance(_) => ErrorKind::InsufficientBalance,
            Self::InvalidAmount(_) => ErrorKind::InvalidAmount,
            Self::Scanner(_) => ErrorKind::ScannerError,
            Self::ShieldNotFound(_) => ErrorKind::ShieldNotFound,
            Self::CommitmentExists(_) => ErrorKind::CommitmentExists,
            Self::HdDerivation(_) => ErrorKind::HdDerivationError,
            Self::EventCounts(_) => ErrorKind::EventCountError,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
