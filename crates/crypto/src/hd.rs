//! Hierarchical-deterministic secret derivation.
//!
//! One master seed per `(key, wallet, chain)`; every shield secret is
//! `keccak256(master_seed ‖ "{op}/{index}")`. Pure and stateless after
//! construction: given the same inputs the whole tree reproduces, which is
//! what lets recovery re-assign indices from the event log alone.

use {
    crate::{Error, commitment},
    alloy_primitives::{Address, B256, U256, keccak256},
    model::hd::{self, HdOperation, MAX_HD_INDEX, PathError},
};

/// Domain-separation tag folded into the master seed.
const HD_MASTER_CONTEXT: &str = "LASERGUN_HD_MASTER_V1";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DerivationError {
    #[error("HD index {0} outside [0, {MAX_HD_INDEX}]")]
    IndexOutOfRange(u32),
    #[error(transparent)]
    Path(#[from] PathError),
}

/// Derives every shield secret of one wallet context.
pub struct HdSecretManager {
    master_seed: B256,
    wallet: Address,
}

impl HdSecretManager {
    /// Reconstitutes the master seed. The seed itself is never persisted.
    pub fn new(private_key: B256, wallet: Address, chain_id: u64) -> Result<Self, Error> {
        if private_key == B256::ZERO {
            return Err(Error::InvalidPrivateKey);
        }
        if chain_id == 0 {
            return Err(Error::InvalidChainId);
        }
        // keccak256(bytes32 ‖ address ‖ uint256 ‖ string) under packed
        // encoding.
        let mut packed = Vec::with_capacity(32 + 20 + 32 + HD_MASTER_CONTEXT.len());
        packed.extend_from_slice(private_key.as_slice());
        packed.extend_from_slice(wallet.as_slice());
        packed.extend_from_slice(&U256::from(chain_id).to_be_bytes::<32>());
        packed.extend_from_slice(HD_MASTER_CONTEXT.as_bytes());
        Ok(Self {
            master_seed: keccak256(&packed),
            wallet,
        })
    }

    pub fn wallet(&self) -> Address {
        self.wallet
    }

    /// `keccak256(master_seed ‖ utf8("{op}/{index}"))`.
    pub fn derive(&self, operation: HdOperation, index: u32) -> Result<B256, DerivationError> {
        if index > MAX_HD_INDEX {
            return Err(DerivationError::IndexOutOfRange(index));
        }
        let path = operation.path(index);
        let mut packed = Vec::with_capacity(32 + path.len());
        packed.extend_from_slice(self.master_seed.as_slice());
        packed.extend_from_slice(path.as_bytes());
        Ok(keccak256(&packed))
    }

    /// Derives the secret together with its commitment for this wallet.
    pub fn derive_with_commitment(
        &self,
        operation: HdOperation,
        index: u32,
    ) -> Result<(B256, B256), DerivationError> {
        let secret = self.derive(operation, index)?;
        Ok((secret, commitment(secret, self.wallet)))
    }

    /// Parses `"{op}/{index}"` and delegates to [`Self::derive`].
    pub fn recover_by_path(&self, path: &str) -> Result<(B256, HdOperation, u32), DerivationError> {
        let (operation, index) = hd::parse_path(path)?;
        Ok((self.derive(operation, index)?, operation, index))
    }

    /// Ordered lazy sequence of `(secret, index, path)` for an operation.
    pub fn sequence(
        &self,
        operation: HdOperation,
        count: u32,
    ) -> impl Iterator<Item = (B256, u32, String)> + '_ {
        (0..count.min(MAX_HD_INDEX + 1)).map(move |index| {
            let secret = self
                .derive(operation, index)
                .expect("index bounded by the clamp above");
            (secret, index, operation.path(index))
        })
    }
}
