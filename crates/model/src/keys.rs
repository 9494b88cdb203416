//! The wallet's derived ECIES identity.

use {
    alloy_primitives::{B256, Bytes},
    serde::{Deserialize, Serialize},
};

/// One record per wallet context, derived deterministically from a wallet
/// signature. Written once, read-only thereafter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CryptoKeys {
    /// secp256k1 scalar the wallet decrypts inbound secrets with.
    pub private_key: B256,
    /// Uncompressed EC point (65 bytes, `0x04` prefixed) counterparties
    /// encrypt to; also what `registerPublicKey` publishes.
    pub public_key: Bytes,
    /// Nonce baked into the canonical signing message the keys were
    /// derived from.
    pub key_nonce: u64,
}
