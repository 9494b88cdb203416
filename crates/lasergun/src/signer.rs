//! Bridges the local alloy signer into the key-derivation boundary.

use {
    alloy::{
        primitives::{Address, B256},
        signers::{SignerSync, local::PrivateKeySigner},
    },
    crypto::WalletSigner,
};

/// [`WalletSigner`] over an in-process private key.
pub struct LocalWalletSigner(PrivateKeySigner);

impl LocalWalletSigner {
    pub fn new(signer: PrivateKeySigner) -> Self {
        Self(signer)
    }

    pub fn address(&self) -> Address {
        self.0.address()
    }
}

#[async_trait::async_trait]
impl WalletSigner for LocalWalletSigner {
    async fn sign_digest(&self, digest: B256) -> anyhow::Result<Vec<u8>> {
        let signature = self.0.sign_hash_sync(&digest)?;
        Ok(signature.as_bytes().to_vec())
    }
}
