//! ERC-20 access: balances, allowance gating, and a metadata cache.

use {
    crate::{
        error::{Error, Result},
        proxy::{ChainApi, TokenMetadata},
    },
    alloy::primitives::{Address, U256},
    std::{collections::HashMap, sync::Arc},
    tokio::sync::Mutex,
};

pub struct TokenManager {
    api: Arc<dyn ChainApi>,
    metadata: Mutex<HashMap<Address, TokenMetadata>>,
}

impl TokenManager {
    pub fn new(api: Arc<dyn ChainApi>) -> Self {
        Self {
            api,
            metadata: Mutex::new(HashMap::new()),
        }
    }

    /// Symbol, name, and decimals; fetched once per token per SDK
    /// instance.
    pub async fn metadata(&self, token: Address) -> Result<TokenMetadata> {
        if let Some(cached) = self.metadata.lock().await.get(&token) {
            return Ok(cached.clone());
        }
        let fetched = self.api.token_metadata(token).await?;
        self.metadata.lock().await.insert(token, fetched.clone());
        Ok(fetched)
    }

    pub async fn balance(&self, token: Address, owner: Address) -> Result<U256> {
        self.api.token_balance(token, owner).await
    }

    /// Fails with `insufficient_balance` when the public balance cannot
    /// cover `amount`.
    pub async fn ensure_balance(&self, token: Address, owner: Address, amount: U256) -> Result<()> {
        let balance = self.balance(token, owner).await?;
        if balance < amount {
            return Err(Error::InsufficientBalance(format!(
                "token balance {balance} below required {amount}"
            )));
        }
        Ok(())
    }

    /// Renders an amount scaled by the token's cached decimals, e.g.
    /// `1500000` with 6 decimals becomes `"1.5"`.
    pub async fn format_amount(&self, token: Address, amount: U256) -> Result<String> {
        let metadata = self.metadata(token).await?;
        Ok(format_units(amount, metadata.decimals))
    }

    /// Approves the spender when the current allowance is short.
    pub async fn ensure_allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
        amount: U256,
    ) -> Result<()> {
        let allowance = self.api.token_allowance(token, owner, spender).await?;
        if allowance >= amount {
            return Ok(());
        }
        tracing::debug!(%token, %spender, %allowance, %amount, "approving allowance");
        self.api.approve_token(token, spender, amount).await?;
        Ok(())
    }
}

fn format_units(amount: U256, decimals: u8) -> String {
    if decimals == 0 {
        return amount.to_string();
    }
    let divisor = U256::from(10u64).pow(U256::from(decimals));
    let whole = amount / divisor;
    let frac = amount % divisor;
    if frac.is_zero() {
        return whole.to_string();
    }
    let frac = format!("{frac:0>width$}", width = decimals as usize);
    format!("{whole}.{}", frac.trim_end_matches('0'))
}
