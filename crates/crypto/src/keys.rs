//! Deterministic key generation from a wallet signature.
//!
//! The wallet signs a canonical message embedding chain, wallet, and nonce;
//! the keccak of the 65-byte signature becomes the ECIES private key. ECDSA
//! signing is deterministic (RFC 6979), so the same wallet always derives
//! the same identity and a fresh install can regenerate it from nothing.

use {
    crate::Error,
    alloy_primitives::{Address, B256, Bytes, keccak256},
    k256::{SecretKey, elliptic_curve::sec1::ToEncodedPoint},
    model::CryptoKeys,
};

/// Signs a 32-byte digest, returning the 65-byte `r ‖ s ‖ v` signature.
///
/// The canonical message already carries the `\x19Ethereum Signed
/// Message:\n` prefix, so implementations sign its keccak directly rather
/// than prefixing a second time.
#[async_trait::async_trait]
pub trait WalletSigner: Send + Sync {
    async fn sign_digest(&self, digest: B256) -> anyhow::Result<Vec<u8>>;
}

/// Renders the canonical key-derivation message.
///
/// The wallet address is rendered lowercased, matching the context keying
/// convention used everywhere else.
pub fn key_derivation_message(chain_id: u64, wallet: Address, nonce: u64) -> String {
    format!(
        "\x19Ethereum Signed Message:\nLaserGun Key: \nChain: {chain_id}\nWallet: 0x{}\nNonce: {nonce}",
        hex::encode(wallet.as_slice()),
    )
}

/// Derives the wallet's ECIES identity.
pub async fn generate_keys(
    signer: &dyn WalletSigner,
    chain_id: u64,
    wallet: Address,
    nonce: u64,
) -> Result<CryptoKeys, Error> {
    if chain_id == 0 {
        return Err(Error::InvalidChainId);
    }
    let message = key_derivation_message(chain_id, wallet, nonce);
    let signature = signer
        .sign_digest(keccak256(message.as_bytes()))
        .await
        .map_err(Error::Signer)?;
    let private_key = keccak256(&signature);
    let public_key = public_key_from_private(private_key)?;
    Ok(CryptoKeys {
        private_key,
        public_key: Bytes::from(public_key),
        key_nonce: nonce,
    })
}

/// Uncompressed secp256k1 point (65 bytes, `0x04` prefixed) for a scalar.
pub fn public_key_from_private(private_key: B256) -> Result<Vec<u8>, Error> {
    let secret = SecretKey::from_slice(private_key.as_slice())
        .map_err(|_| Error::InvalidPrivateKey)?;
    Ok(secret
        .public_key()
        .to_encoded_point(false)
        .as_bytes()
        .to_vec())
}
