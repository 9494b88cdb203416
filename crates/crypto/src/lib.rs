//! Cryptographic primitives of the LaserGun SDK: commitments, ECIES secret
//! delivery, deterministic key generation, and HD secret derivation.

use {
    alloy_primitives::{Address, B256, keccak256},
    thiserror::Error,
};

pub mod ecies;
pub mod hd;
pub mod keys;

pub use {
    ecies::{decrypt_secret, encrypt_secret},
    hd::HdSecretManager,
    keys::{WalletSigner, generate_keys, key_derivation_message},
};

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid private key")]
    InvalidPrivateKey,
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),
    #[error("invalid address `{0}`")]
    InvalidAddress(String),
    #[error("invalid 32-byte hex `{0}`")]
    InvalidHex(String),
    #[error("chain id must be positive")]
    InvalidChainId,
    #[error("encryption failure: {0}")]
    Encryption(String),
    #[error("signer failure")]
    Signer(#[source] anyhow::Error),
}

/// The contract's shield identifier: `keccak256(secret ‖ owner)`.
///
/// Raw concatenation of the 32-byte secret and the 20-byte owner, no length
/// prefixes, matching the chain's packed ABI encoding. Binding the owner in
/// means the same secret commits differently per owner, which is how a
/// transfer changes hands without revealing linkage.
pub fn commitment(secret: B256, owner: Address) -> B256 {
    let mut packed = [0u8; 52];
    packed[..32].copy_from_slice(secret.as_slice());
    packed[32..].copy_from_slice(owner.as_slice());
    keccak256(packed)
}

/// Strict `0x`-prefixed 32-byte hex parser.
pub fn parse_hex32(value: &str) -> Result<B256, Error> {
    let raw = value
        .strip_prefix("0x")
        .ok_or_else(|| Error::InvalidHex(value.to_string()))?;
    if raw.len() != 64 {
        return Err(Error::InvalidHex(value.to_string()));
    }
    let bytes = hex::decode(raw).map_err(|_| Error::InvalidHex(value.to_string()))?;
    Ok(B256::from_slice(&bytes))
}

/// Strict `0x`-prefixed 20-byte address parser.
pub fn parse_address(value: &str) -> Result<Address, Error> {
    let raw = value
        .strip_prefix("0x")
        .ok_or_else(|| Error::InvalidAddress(value.to_string()))?;
    if raw.len() != 40 {
        return Err(Error::InvalidAddress(value.to_string()));
    }
    let bytes = hex::decode(raw).map_err(|_| Error::InvalidAddress(value.to_string()))?;
    Ok(Address::from_slice(&bytes))
}
