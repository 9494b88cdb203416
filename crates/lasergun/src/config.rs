//! SDK configuration.

use {
    crate::error::{Error, Result},
    alloy::primitives::Address,
    serde::{Deserialize, Serialize},
    std::time::Duration,
};

fn default_batch_size() -> u64 {
    1000
}

fn default_receipt_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_scan_idle_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_scan_pause() -> Duration {
    Duration::from_millis(100)
}

fn default_recovery_pause() -> Duration {
    Duration::from_millis(50)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    /// Address of the deployed mixer contract.
    pub contract: Address,

    /// Chain the contract lives on; verified against the provider at
    /// construction.
    pub chain_id: u64,

    /// The wallet this SDK instance is pinned to.
    pub wallet: Address,

    /// First block worth scanning, usually the contract deployment block.
    #[serde(default)]
    pub start_block: u64,

    /// Blocks per event-query batch during scanning and recovery.
    #[serde(default = "default_batch_size")]
    pub batch_size: u64,

    /// Nonce embedded in the key-derivation message.
    #[serde(default)]
    pub key_nonce: u64,

    /// Ceiling on waiting for a submitted transaction's receipt.
    #[serde(with = "humantime_serde", default = "default_receipt_timeout")]
    pub receipt_timeout: Duration,

    /// Sleep when the scanner has caught up to the chain head.
    #[serde(with = "humantime_serde", default = "default_scan_idle_interval")]
    pub scan_idle_interval: Duration,

    /// Pause between scanner iterations.
    #[serde(with = "humantime_serde", default = "default_scan_pause")]
    pub scan_pause: Duration,

    /// Pause between recovery batches.
    #[serde(with = "humantime_serde", default = "default_recovery_pause")]
    pub recovery_pause: Duration,
}

impl Config {
    pub fn new(contract: Address, chain_id: u64, wallet: Address) -> Self {
        Self {
            contract,
            chain_id,
            wallet,
            start_block: 0,
            batch_size: default_batch_size(),
            key_nonce: 0,
            receipt_timeout: default_receipt_timeout(),
            scan_idle_interval: default_scan_idle_interval(),
            scan_pause: default_scan_pause(),
            recovery_pause: default_recovery_pause(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.chain_id == 0 {
            return Err(Error::InvalidConfig("chain id must be positive".into()));
        }
        if self.contract == Address::ZERO {
            return Err(Error::InvalidConfig(
                "contract address must not be zero".into(),
            ));
        }
        if self.wallet == Address::ZERO {
            return Err(Error::InvalidConfig("wallet address must not be zero".into()));
        }
        if self.batch_size == 0 {
            return Err(Error::InvalidConfig("batch size must be positive".into()));
        }
        Ok(())
    }
}
