//! Scenario tests over a simulated chain.
//!
//! [`FakeChain`] reproduces the contract's observable behavior in memory
//! (shields, fees, spends, event emission in canonical order), so every
//! flow from the operations through recovery runs end to end without a
//! node.

mod operations;

use {
    crate::{
        config::Config,
        error::{Error, Result},
        proxy::{ChainApi, FeeConfig, ShieldInfo, Submitted, TokenMetadata},
        signer::LocalWalletSigner,
    },
    alloy::{
        primitives::{Address, B256, Bytes, U256},
        signers::local::PrivateKeySigner,
    },
    model::{ChainEvent, EventMeta, WalletContext},
    std::{
        collections::HashMap,
        sync::{Arc, Mutex},
    },
    storage::MemoryStorage,
};

pub(crate) const CHAIN_ID: u64 = 1;
pub(crate) const TOKEN: Address = Address::repeat_byte(0x70);
pub(crate) const CONTRACT: Address = Address::repeat_byte(0xc0);

/// Fee schedule used across the scenarios: 1% shield, 2% unshield, 0.5%
/// transfer.
const FEES: FeeConfig = FeeConfig {
    shield_percent: U256::from_limbs([100, 0, 0, 0]),
    unshield_percent: U256::from_limbs([200, 0, 0, 0]),
    transfer_percent: U256::from_limbs([50, 0, 0, 0]),
    denominator: U256::from_limbs([10_000, 0, 0, 0]),
};

struct ChainState {
    head: u64,
    shields: HashMap<B256, ShieldInfo>,
    events: Vec<ChainEvent>,
    balances: HashMap<(Address, Address), U256>,
    allowances: HashMap<(Address, Address), U256>,
    registered: HashMap<Address, Bytes>,
    next_tx: u64,
}

impl ChainState {
    /// Opens the next block and returns its meta; every submission mines
    /// alone.
    fn next_block(&mut self) -> EventMeta {
        self.head += 1;
        self.next_tx += 1;
        EventMeta {
            block_number: self.head,
            transaction_hash: B256::with_last_byte(self.next_tx as u8),
            transaction_index: 0,
            log_index: 0,
        }
    }

    fn timestamp(block: u64) -> u64 {
        1_700_000_000 + block * 12
    }
}

/// In-memory stand-in for the deployed contract, shared between wallets.
#[derive(Clone)]
pub(crate) struct FakeChain {
    state: Arc<Mutex<ChainState>>,
    /// `msg.sender` for submissions issued through this handle.
    sender: Address,
}

impl FakeChain {
    pub(crate) fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ChainState {
                head: 0,
                shields: HashMap::new(),
                events: Vec::new(),
                balances: HashMap::new(),
                allowances: HashMap::new(),
                registered: HashMap::new(),
                next_tx: 0,
            })),
            sender: Address::ZERO,
        }
    }

    /// A handle submitting as `wallet`, sharing the same chain.
    pub(crate) fn for_wallet(&self, wallet: Address) -> Self {
        Self {
            state: self.state.clone(),
            sender: wallet,
        }
    }

    pub(crate) fn fund(&self, token: Address, owner: Address, amount: U256) {
        let mut state = self.state.lock().unwrap();
        *state.balances.entry((token, owner)).or_default() += amount;
    }

    pub(crate) fn head(&self) -> u64 {
        self.state.lock().unwrap().head
    }

    pub(crate) fn shield_state(&self, commitment: B256) -> Option<ShieldInfo> {
        self.state.lock().unwrap().shields.get(&commitment).copied()
    }

    /// Injects an event without any contract bookkeeping; used to model
    /// garbage other parties manage to get on-chain.
    pub(crate) fn push_event(&self, build: impl FnOnce(EventMeta) -> ChainEvent) {
        let mut state = self.state.lock().unwrap();
        let meta = state.next_block();
        let event = build(meta);
        state.events.push(event);
    }

    fn fail(message: &str) -> Error {
        Error::Contract(anyhow::anyhow!("execution reverted: {message}"))
    }
}

#[async_trait::async_trait]
impl ChainApi for FakeChain {
    async fn chain_id(&self) -> Result<u64> {
        Ok(CHAIN_ID)
    }

    async fn current_block(&self) -> Result<u64> {
        Ok(self.state.lock().unwrap().head)
    }

    async fn block_timestamp(&self, block: u64) -> Result<u64> {
        Ok(ChainState::timestamp(block))
    }

    async fn fee_config(&self) -> Result<FeeConfig> {
        Ok(FEES)
    }

    async fn shield_info(&self, commitment: B256) -> Result<ShieldInfo> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .shields
            .get(&commitment)
            .copied()
            .unwrap_or(ShieldInfo {
                exists: false,
                token: Address::ZERO,
                amount: U256::ZERO,
                timestamp: 0,
                spent: false,
            }))
    }

    async fn shield_balance(&self, secret: B256, token: Address) -> Result<U256> {
        let commitment = crypto::commitment(secret, self.sender);
        let state = self.state.lock().unwrap();
        Ok(state
            .shields
            .get(&commitment)
            .filter(|info| info.exists && !info.spent && info.token == token)
            .map(|info| info.amount)
            .unwrap_or_default())
    }

    async fn is_commitment_active(&self, commitment: B256) -> Result<bool> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .shields
            .get(&commitment)
            .is_some_and(|info| info.exists && !info.spent))
    }

    async fn registered_public_key(&self, owner: Address) -> Result<Bytes> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .registered
            .get(&owner)
            .cloned()
            .unwrap_or_default())
    }

    async fn submit_shield(
        &self,
        amount: U256,
        token: Address,
        commitment: B256,
    ) -> Result<Submitted> {
        let mut state = self.state.lock().unwrap();
        if state.shields.contains_key(&commitment) {
            return Err(Self::fail("invalid commitment"));
        }
        let balance = state.balances.entry((token, self.sender)).or_default();
        if *balance < amount {
            return Err(Self::fail("insufficient balance"));
        }
        *balance -= amount;

        let meta = state.next_block();
        let fee = FEES.shield_fee(amount);
        state.shields.insert(
            commitment,
            ShieldInfo {
                exists: true,
                token,
                amount: amount - fee,
                timestamp: ChainState::timestamp(meta.block_number),
                spent: false,
            },
        );
        state.events.push(ChainEvent::Shielded {
            commitment,
            token,
            amount,
            fee,
            meta,
        });
        Ok(Submitted {
            tx_hash: meta.transaction_hash,
            block_number: meta.block_number,
        })
    }

    async fn submit_unshield(
        &self,
        secret: B256,
        amount: U256,
        recipient: Address,
        new_commitment: B256,
    ) -> Result<Submitted> {
        let commitment = crypto::commitment(secret, self.sender);
        let mut state = self.state.lock().unwrap();
        let info = *state
            .shields
            .get(&commitment)
            .filter(|info| info.exists && !info.spent)
            .ok_or_else(|| Self::fail("shield not found"))?;
        if amount > info.amount {
            return Err(Self::fail("insufficient balance"));
        }

        let meta = state.next_block();
        let fee = FEES.unshield_fee(amount);
        state.shields.get_mut(&commitment).unwrap().spent = true;
        *state.balances.entry((info.token, recipient)).or_default() += amount;

        // Change stays shielded; the fee comes out of it.
        let remainder = info.amount - amount;
        if new_commitment != B256::ZERO && remainder > fee {
            state.shields.insert(
                new_commitment,
                ShieldInfo {
                    exists: true,
                    token: info.token,
                    amount: remainder - fee,
                    timestamp: ChainState::timestamp(meta.block_number),
                    spent: false,
                },
            );
        }
        state.events.push(ChainEvent::Unshielded {
            commitment,
            token: info.token,
            amount,
            fee,
            meta,
        });
        Ok(Submitted {
            tx_hash: meta.transaction_hash,
            block_number: meta.block_number,
        })
    }

    async fn submit_transfer(
        &self,
        secret: B256,
        amount: U256,
        recipient_commitment: B256,
        encrypted_secret: Bytes,
    ) -> Result<Submitted> {
        let commitment = crypto::commitment(secret, self.sender);
        let mut state = self.state.lock().unwrap();
        let info = *state
            .shields
            .get(&commitment)
            .filter(|info| info.exists && !info.spent)
            .ok_or_else(|| Self::fail("shield not found"))?;
        if amount > info.amount {
            return Err(Self::fail("insufficient balance"));
        }

        let meta = state.next_block();
        let fee = FEES.transfer_fee(amount);
        state.shields.get_mut(&commitment).unwrap().spent = true;
        state.shields.insert(
            recipient_commitment,
            ShieldInfo {
                exists: true,
                token: info.token,
                amount: amount - fee,
                timestamp: ChainState::timestamp(meta.block_number),
                spent: false,
            },
        );
        state.events.push(ChainEvent::Unshielded {
            commitment,
            token: info.token,
            amount,
            fee,
            meta,
        });
        state.events.push(ChainEvent::SecretDelivered {
            encrypted_secret,
            meta: EventMeta {
                log_index: meta.log_index + 1,
                ..meta
            },
        });
        Ok(Submitted {
            tx_hash: meta.transaction_hash,
            block_number: meta.block_number,
        })
    }

    async fn submit_consolidate(
        &self,
        secrets: Vec<B256>,
        new_commitment: B256,
    ) -> Result<Submitted> {
        let mut state = self.state.lock().unwrap();
        let mut total = U256::ZERO;
        let mut token = Address::ZERO;
        for secret in &secrets {
            let commitment = crypto::commitment(*secret, self.sender);
            let info = *state
                .shields
                .get(&commitment)
                .filter(|info| info.exists && !info.spent)
                .ok_or_else(|| Self::fail("shield not found"))?;
            total += info.amount;
            token = info.token;
        }
        for secret in &secrets {
            let commitment = crypto::commitment(*secret, self.sender);
            state.shields.get_mut(&commitment).unwrap().spent = true;
        }

        let meta = state.next_block();
        state.shields.insert(
            new_commitment,
            ShieldInfo {
                exists: true,
                token,
                amount: total,
                timestamp: ChainState::timestamp(meta.block_number),
                spent: false,
            },
        );
        state.events.push(ChainEvent::Consolidated {
            new_commitment,
            meta,
        });
        Ok(Submitted {
            tx_hash: meta.transaction_hash,
            block_number: meta.block_number,
        })
    }

    async fn submit_register_public_key(&self, public_key: Bytes) -> Result<Submitted> {
        let mut state = self.state.lock().unwrap();
        let meta = state.next_block();
        state.registered.insert(self.sender, public_key);
        Ok(Submitted {
            tx_hash: meta.transaction_hash,
            block_number: meta.block_number,
        })
    }

    async fn events_in_range(&self, from: u64, to: u64) -> Result<Vec<ChainEvent>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .events
            .iter()
            .filter(|event| (from..=to).contains(&event.meta().block_number))
            .cloned()
            .collect())
    }

    async fn secret_delivered_in_range(&self, from: u64, to: u64) -> Result<Vec<ChainEvent>> {
        Ok(self
            .events_in_range(from, to)
            .await?
            .into_iter()
            .filter(|event| matches!(event, ChainEvent::SecretDelivered { .. }))
            .collect())
    }

    async fn token_balance(&self, token: Address, owner: Address) -> Result<U256> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .balances
            .get(&(token, owner))
            .copied()
            .unwrap_or_default())
    }

    async fn token_allowance(
        &self,
        token: Address,
        owner: Address,
        _spender: Address,
    ) -> Result<U256> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .allowances
            .get(&(token, owner))
            .copied()
            .unwrap_or_default())
    }

    async fn approve_token(
        &self,
        token: Address,
        _spender: Address,
        amount: U256,
    ) -> Result<Submitted> {
        let mut state = self.state.lock().unwrap();
        state.allowances.insert((token, self.sender), amount);
        let meta = state.next_block();
        Ok(Submitted {
            tx_hash: meta.transaction_hash,
            block_number: meta.block_number,
        })
    }

    async fn token_metadata(&self, _token: Address) -> Result<TokenMetadata> {
        Ok(TokenMetadata {
            symbol: "TST".into(),
            name: "Test Token".into(),
            decimals: 18,
        })
    }
}

/// Observer capturing everything the scanner and recovery report.
#[derive(Default)]
pub(crate) struct Recording {
    pub(crate) transactions: Mutex<Vec<model::TransactionRecord>>,
    pub(crate) states: Mutex<Vec<crate::scanner::ScannerState>>,
    pub(crate) errors: Mutex<Vec<String>>,
    pub(crate) batch_ends: Mutex<Vec<u64>>,
}

impl crate::scanner::ScanObserver for Recording {
    fn on_transaction(&self, record: &model::TransactionRecord) {
        self.transactions.lock().unwrap().push(record.clone());
    }

    fn on_state(&self, state: crate::scanner::ScannerState) {
        self.states.lock().unwrap().push(state);
    }

    fn on_error(&self, error: &Error) {
        self.errors.lock().unwrap().push(error.to_string());
    }

    fn on_batch_scanned(&self, end_block: u64) {
        self.batch_ends.lock().unwrap().push(end_block);
    }
}

/// One wallet's worth of SDK wired to the shared fake chain.
pub(crate) struct Fixture {
    pub(crate) sdk: crate::LaserGun,
    pub(crate) chain: FakeChain,
    pub(crate) wallet: Address,
}

impl Fixture {
    pub(crate) async fn new(chain: &FakeChain, key_byte: u8) -> Self {
        Self::build(chain, key_byte, Arc::new(MemoryStorage::new()), 100).await
    }

    pub(crate) async fn with_storage(
        chain: &FakeChain,
        key_byte: u8,
        storage: Arc<MemoryStorage>,
    ) -> Self {
        Self::build(chain, key_byte, storage, 100).await
    }

    pub(crate) async fn with_batch_size(
        chain: &FakeChain,
        key_byte: u8,
        batch_size: u64,
    ) -> Self {
        Self::build(chain, key_byte, Arc::new(MemoryStorage::new()), batch_size).await
    }

    async fn build(
        chain: &FakeChain,
        key_byte: u8,
        storage: Arc<MemoryStorage>,
        batch_size: u64,
    ) -> Self {
        let signer = LocalWalletSigner::new(
            PrivateKeySigner::from_bytes(&B256::repeat_byte(key_byte)).unwrap(),
        );
        let wallet = signer.address();
        let chain = chain.for_wallet(wallet);

        let mut config = Config::new(CONTRACT, CHAIN_ID, wallet);
        config.start_block = 0;
        config.batch_size = batch_size;
        // Keep the loops snappy under paused test time.
        config.scan_idle_interval = std::time::Duration::from_millis(50);
        config.scan_pause = std::time::Duration::from_millis(1);
        config.recovery_pause = std::time::Duration::from_millis(1);

        let sdk = crate::LaserGun::with_api(config, Arc::new(chain.clone()), &signer, storage)
            .await
            .unwrap();
        Self { sdk, chain, wallet }
    }

    pub(crate) fn ctx(&self) -> WalletContext {
        self.sdk.context()
    }

    pub(crate) fn fund(&self, amount: u64) {
        self.chain.fund(TOKEN, self.wallet, U256::from(amount));
    }
}
