//! The chain surface the SDK talks through.
//!
//! [`ChainApi`] is everything the operations, scanner, and recovery need
//! from the chain, narrow enough to mock. [`OnchainApi`] is the production
//! implementation over the typed contract bindings: it classifies RPC
//! failures into the taxonomy, retries reads on the fixed backoff
//! schedule, converts raw logs into tagged [`ChainEvent`]s, and caches the
//! fee configuration.

use {
    crate::error::{Error, Result},
    alloy::{
        primitives::{Address, B256, Bytes, U256},
        providers::Provider,
        rpc::types::Log,
    },
    contracts::{IERC20, ILaserGun, ZERO_COMMITMENT},
    model::{ChainEvent, EventMeta},
    std::time::Duration,
    tokio::sync::OnceCell,
};

/// On-chain state of one commitment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShieldInfo {
    pub exists: bool,
    pub token: Address,
    pub amount: U256,
    pub timestamp: u64,
    pub spent: bool,
}

impl ShieldInfo {
    pub fn is_active(&self) -> bool {
        self.exists && !self.spent
    }
}

/// The contract's fee schedule, fetched once per SDK instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeConfig {
    pub shield_percent: U256,
    pub unshield_percent: U256,
    pub transfer_percent: U256,
    pub denominator: U256,
}

impl FeeConfig {
    /// `amount * percent / denominator`, zero when the denominator is
    /// degenerate.
    pub fn fee(&self, amount: U256, percent: U256) -> U256 {
        if self.denominator.is_zero() {
            return U256::ZERO;
        }
        amount * percent / self.denominator
    }

    pub fn shield_fee(&self, amount: U256) -> U256 {
        self.fee(amount, self.shield_percent)
    }

    pub fn unshield_fee(&self, amount: U256) -> U256 {
        self.fee(amount, self.unshield_percent)
    }

    pub fn transfer_fee(&self, amount: U256) -> U256 {
        self.fee(amount, self.transfer_percent)
    }
}

/// Essentials of a mined submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Submitted {
    pub tx_hash: B256,
    pub block_number: u64,
}

/// Cached ERC-20 descriptors.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct TokenMetadata {
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
}

/// Everything the SDK asks of the chain.
#[cfg_attr(any(test, feature = "test-util"), mockall::automock)]
#[async_trait::async_trait]
pub trait ChainApi: Send + Sync {
    async fn chain_id(&self) -> Result<u64>;
    async fn current_block(&self) -> Result<u64>;
    async fn block_timestamp(&self, block: u64) -> Result<u64>;

    async fn fee_config(&self) -> Result<FeeConfig>;
    async fn shield_info(&self, commitment: B256) -> Result<ShieldInfo>;
    async fn shield_balance(&self, secret: B256, token: Address) -> Result<U256>;
    async fn is_commitment_active(&self, commitment: B256) -> Result<bool>;
    /// Registered ECIES key of a wallet; empty bytes when unregistered.
    async fn registered_public_key(&self, owner: Address) -> Result<Bytes>;

    async fn submit_shield(
        &self,
        amount: U256,
        token: Address,
        commitment: B256,
    ) -> Result<Submitted>;
    async fn submit_unshield(
        &self,
        secret: B256,
        amount: U256,
        recipient: Address,
        new_commitment: B256,
    ) -> Result<Submitted>;
    async fn submit_transfer(
        &self,
        secret: B256,
        amount: U256,
        recipient_commitment: B256,
        encrypted_secret: Bytes,
    ) -> Result<Submitted>;
    async fn submit_consolidate(
        &self,
        secrets: Vec<B256>,
        new_commitment: B256,
    ) -> Result<Submitted>;
    async fn submit_register_public_key(&self, public_key: Bytes) -> Result<Submitted>;

    /// All four event kinds in the inclusive range, unordered; callers
    /// sort.
    async fn events_in_range(&self, from: u64, to: u64) -> Result<Vec<ChainEvent>>;
    /// Only `SecretDelivered` events, for the ongoing scan.
    async fn secret_delivered_in_range(&self, from: u64, to: u64) -> Result<Vec<ChainEvent>>;

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256>;
    async fn token_allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256>;
    async fn approve_token(
        &self,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> Result<Submitted>;
    async fn token_metadata(&self, token: Address) -> Result<TokenMetadata>;
}

/// Messages that mark an error as permanent; retrying cannot help.
const NON_RETRYABLE: &[&str] = &[
    "insufficient funds",
    "nonce too low",
    "replacement underpriced",
    "execution reverted",
    "invalid commitment",
    "shield not found",
    "insufficient balance",
];

const RETRY_SCHEDULE: &[Duration] = &[
    Duration::from_secs(1),
    Duration::from_secs(2),
    Duration::from_secs(4),
];

pub(crate) fn is_non_retryable(error: &Error) -> bool {
    let message = error.to_string().to_lowercase();
    NON_RETRYABLE.iter().any(|needle| message.contains(needle))
}

/// Runs a read up to four times (initial try plus the 1 s / 2 s / 4 s
/// schedule), bailing early on non-retryable failures.
pub(crate) async fn with_retry<T, F, Fut>(operation: &str, call: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_error = None;
    for (attempt, pause) in RETRY_SCHEDULE
        .iter()
        .map(Some)
        .chain(std::iter::once(None))
        .enumerate()
    {
        match call().await {
            Ok(value) => return Ok(value),
            Err(error) if is_non_retryable(&error) => return Err(error),
            Err(error) => {
                tracing::warn!(operation, attempt, ?error, "chain read failed");
                last_error = Some(error);
            }
        }
        if let Some(pause) = pause {
            tokio::time::sleep(*pause).await;
        }
    }
    Err(last_error.expect("loop ran at least once"))
}

fn classify(error: alloy::contract::Error) -> Error {
    match error {
        alloy::contract::Error::TransportError(transport) => {
            Error::Network(anyhow::Error::new(transport))
        }
        other => Error::Contract(anyhow::Error::new(other)),
    }
}

fn meta_from_log(log: &Log) -> Result<EventMeta> {
    let missing = |field: &str| Error::Scanner(format!("event log missing {field}"));
    Ok(EventMeta {
        block_number: log.block_number.ok_or_else(|| missing("block number"))?,
        transaction_hash: log
            .transaction_hash
            .ok_or_else(|| missing("transaction hash"))?,
        transaction_index: log
            .transaction_index
            .ok_or_else(|| missing("transaction index"))?,
        log_index: log.log_index.ok_or_else(|| missing("log index"))?,
    })
}

/// Production [`ChainApi`] over an RPC provider.
pub struct OnchainApi {
    provider: contracts::Provider,
    lasergun: contracts::LaserGun,
    fees: OnceCell<FeeConfig>,
    receipt_timeout: Duration,
}

impl OnchainApi {
    pub fn new(
        provider: contracts::Provider,
        contract: Address,
        receipt_timeout: Duration,
    ) -> Self {
        Self {
            lasergun: ILaserGun::new(contract, provider.clone()),
            provider,
            fees: OnceCell::new(),
            receipt_timeout,
        }
    }

    fn erc20(&self, token: Address) -> contracts::Erc20 {
        IERC20::new(token, self.provider.clone())
    }

    /// Awaits the receipt within the configured ceiling and rejects
    /// non-success receipts. Receipt waits are never retried.
    async fn confirm(
        &self,
        pending: std::result::Result<
            alloy::providers::PendingTransactionBuilder<alloy::network::Ethereum>,
            alloy::contract::Error,
        >,
    ) -> Result<Submitted> {
        let pending = pending.map_err(classify)?;
        let receipt = tokio::time::timeout(self.receipt_timeout, pending.get_receipt())
            .await
            .map_err(|_| {
                Error::Network(anyhow::anyhow!(
                    "timed out waiting for transaction receipt after {:?}",
                    self.receipt_timeout
                ))
            })?
            .map_err(|err| Error::Network(anyhow::Error::new(err)))?;
        if !receipt.status() {
            return Err(Error::Contract(anyhow::anyhow!(
                "transaction {} reverted",
                receipt.transaction_hash
            )));
        }
        Ok(Submitted {
            tx_hash: receipt.transaction_hash,
            block_number: receipt.block_number.unwrap_or_default(),
        })
    }
}

#[async_trait::async_trait]
impl ChainApi for OnchainApi {
    async fn chain_id(&self) -> Result<u64> {
        with_retry("chain_id", || async {
            self.provider
                .get_chain_id()
                .await
                .map_err(|err| Error::Network(anyhow::Error::new(err)))
        })
        .await
    }

    async fn current_block(&self) -> Result<u64> {
        with_retry("current_block", || async {
            self.provider
                .get_block_number()
                .await
                .map_err(|err| Error::Network(anyhow::Error::new(err)))
        })
        .await
    }

    async fn block_timestamp(&self, block: u64) -> Result<u64> {
        with_retry("block_timestamp", || async {
            let block = self
                .provider
                .get_block_by_number(block.into())
                .await
                .map_err(|err| Error::Network(anyhow::Error::new(err)))?
                .ok_or_else(|| Error::Network(anyhow::anyhow!("block {block} not found")))?;
            Ok(block.header.timestamp)
        })
        .await
    }

    async fn fee_config(&self) -> Result<FeeConfig> {
        self.fees
            .get_or_try_init(|| async {
                with_retry("fee_config", || async {
                    let (shield_percent, unshield_percent, transfer_percent, denominator) =
                        futures::try_join!(
                            async { self.lasergun.shieldFeePercent().call().await },
                            async { self.lasergun.unshieldFeePercent().call().await },
                            async { self.lasergun.transferFeePercent().call().await },
                            async { self.lasergun.FEE_DENOMINATOR().call().await },
                        )
                        .map_err(classify)?;
                    Ok(FeeConfig {
                        shield_percent,
                        unshield_percent,
                        transfer_percent,
                        denominator,
                    })
                })
                .await
            })
            .await
            .copied()
    }

    async fn shield_info(&self, commitment: B256) -> Result<ShieldInfo> {
        with_retry("shield_info", || async {
            let info = self
                .lasergun
                .getShieldInfo(commitment)
                .call()
                .await
                .map_err(classify)?;
            Ok(ShieldInfo {
                exists: info.exists,
                token: info.token,
                amount: info.amount,
                timestamp: u64::try_from(info.timestamp).unwrap_or(u64::MAX),
                spent: info.spent,
            })
        })
        .await
    }

    async fn shield_balance(&self, secret: B256, token: Address) -> Result<U256> {
        with_retry("shield_balance", || async {
            self.lasergun
                .getShieldBalance(secret, token)
                .call()
                .await
                .map_err(classify)
        })
        .await
    }

    async fn is_commitment_active(&self, commitment: B256) -> Result<bool> {
        with_retry("is_commitment_active", || async {
            self.lasergun
                .isCommitmentActive(commitment)
                .call()
                .await
                .map_err(classify)
        })
        .await
    }

    async fn registered_public_key(&self, owner: Address) -> Result<Bytes> {
        with_retry("registered_public_key", || async {
            self.lasergun
                .publicKeys(owner)
                .call()
                .await
                .map_err(classify)
        })
        .await
    }

    async fn submit_shield(
        &self,
        amount: U256,
        token: Address,
        commitment: B256,
    ) -> Result<Submitted> {
        self.confirm(self.lasergun.shield(amount, token, commitment).send().await)
            .await
    }

    async fn submit_unshield(
        &self,
        secret: B256,
        amount: U256,
        recipient: Address,
        new_commitment: B256,
    ) -> Result<Submitted> {
        self.confirm(
            self.lasergun
                .unshield(secret, amount, recipient, new_commitment)
                .send()
                .await,
        )
        .await
    }

    async fn submit_transfer(
        &self,
        secret: B256,
        amount: U256,
        recipient_commitment: B256,
        encrypted_secret: Bytes,
    ) -> Result<Submitted> {
        self.confirm(
            self.lasergun
                .transfer(secret, amount, recipient_commitment, encrypted_secret)
                .send()
                .await,
        )
        .await
    }

    async fn submit_consolidate(
        &self,
        secrets: Vec<B256>,
        new_commitment: B256,
    ) -> Result<Submitted> {
        self.confirm(
            self.lasergun
                .consolidate(secrets, new_commitment)
                .send()
                .await,
        )
        .await
    }

    async fn submit_register_public_key(&self, public_key: Bytes) -> Result<Submitted> {
        self.confirm(self.lasergun.registerPublicKey(public_key).send().await)
            .await
    }

    async fn events_in_range(&self, from: u64, to: u64) -> Result<Vec<ChainEvent>> {
        with_retry("events_in_range", || async {
            let (shielded, unshielded, delivered, consolidated) = futures::try_join!(
                async {
                    self.lasergun
                        .Shielded_filter()
                        .from_block(from)
                        .to_block(to)
                        .query()
                        .await
                },
                async {
                    self.lasergun
                        .Unshielded_filter()
                        .from_block(from)
                        .to_block(to)
                        .query()
                        .await
                },
                async {
                    self.lasergun
                        .SecretDelivered_filter()
                        .from_block(from)
                        .to_block(to)
                        .query()
                        .await
                },
                async {
                    self.lasergun
                        .ShieldConsolidated_filter()
                        .from_block(from)
                        .to_block(to)
                        .query()
                        .await
                },
            )
            .map_err(classify)?;

            let mut events = Vec::with_capacity(
                shielded.len() + unshielded.len() + delivered.len() + consolidated.len(),
            );
            for (event, log) in shielded {
                events.push(ChainEvent::Shielded {
                    commitment: event.commitment,
                    token: event.token,
                    amount: event.amount,
                    fee: event.fee,
                    meta: meta_from_log(&log)?,
                });
            }
            for (event, log) in unshielded {
                events.push(ChainEvent::Unshielded {
                    commitment: event.commitment,
                    token: event.token,
                    amount: event.amount,
                    fee: event.fee,
                    meta: meta_from_log(&log)?,
                });
            }
            for (event, log) in delivered {
                events.push(ChainEvent::SecretDelivered {
                    encrypted_secret: event.encryptedSecret,
                    meta: meta_from_log(&log)?,
                });
            }
            for (event, log) in consolidated {
                events.push(ChainEvent::Consolidated {
                    new_commitment: event.newCommitment,
                    meta: meta_from_log(&log)?,
                });
            }
            Ok(events)
        })
        .await
    }

    async fn secret_delivered_in_range(&self, from: u64, to: u64) -> Result<Vec<ChainEvent>> {
        with_retry("secret_delivered_in_range", || async {
            let delivered = self
                .lasergun
                .SecretDelivered_filter()
                .from_block(from)
                .to_block(to)
                .query()
                .await
                .map_err(classify)?;
            delivered
                .into_iter()
                .map(|(event, log)| {
                    Ok(ChainEvent::SecretDelivered {
                        encrypted_secret: event.encryptedSecret,
                        meta: meta_from_log(&log)?,
                    })
                })
                .collect()
        })
        .await
    }

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256> {
        with_retry("token_balance", || async {
            self.erc20(token)
                .balanceOf(owner)
                .call()
                .await
                .map_err(classify)
        })
        .await
    }

    async fn token_allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256> {
        with_retry("token_allowance", || async {
            self.erc20(token)
                .allowance(owner, spender)
                .call()
                .await
                .map_err(classify)
        })
        .await
    }

    async fn approve_token(
        &self,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> Result<Submitted> {
        self.confirm(self.erc20(token).approve(spender, amount).send().await)
            .await
    }

    async fn token_metadata(&self, token: Address) -> Result<TokenMetadata> {
        with_retry("token_metadata", || async {
            let erc20 = self.erc20(token);
            let (symbol, name, decimals) = futures::try_join!(
                async { erc20.symbol().call().await },
                async { erc20.name().call().await },
                async { erc20.decimals().call().await },
            )
            .map_err(classify)?;
            Ok(TokenMetadata {
                symbol,
                name,
                decimals,
            })
        })
        .await
    }
}

/// Sentinel passed to `unshield` when no remainder is created.
pub const NO_REMAINDER: B256 = ZERO_COMMITMENT;
