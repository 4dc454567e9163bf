//! Last-known balances and allowances for the active account.
//!
//! The cache is display-grade: both legs are read concurrently and a failed
//! leg goes stale (`None`, rendered as `"-"`) instead of poisoning the other.
//! Orchestrators never base a go/no-go decision on it; they re-read the
//! authoritative value immediately before a write.

use std::collections::HashMap;

use tracing::warn;

use crate::{
    amount::TokenAmount,
    chain::{Address, ChainRead},
    error::AppError,
};

#[derive(Clone, Debug, Default)]
pub struct BalanceCache {
    native: Option<TokenAmount>,
    token: Option<TokenAmount>,
    allowances: HashMap<Address, TokenAmount>,
}

impl BalanceCache {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn native(&self) -> Option<TokenAmount> {
        self.native
    }

    pub fn token(&self) -> Option<TokenAmount> {
        self.token
    }

    pub fn allowance(&self, spender: Address) -> Option<TokenAmount> {
        self.allowances.get(&spender).copied()
    }

    /// Drops everything. Called on disconnect and before re-deriving state
    /// for a new account.
    pub fn clear(&mut self) {
        self.native = None;
        self.token = None;
        self.allowances.clear();
    }

    /// Refreshes both balance legs concurrently. A failed leg is marked
    /// stale while the successful one still lands.
    pub async fn refresh<R: ChainRead>(&mut self, read: &R, account: Address) {
        let (native, token) =
            futures::join!(read.native_balance_of(account), read.balance_of(account));
        self.native = match native {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(%err, "native balance read failed; marking stale");
                None
            }
        };
        self.token = match token {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(%err, "token balance read failed; marking stale");
                None
            }
        };
    }

    /// Re-reads one spender's allowance and caches it. The cached value is a
    /// display hint; spend decisions re-read through `ChainRead` directly.
    pub async fn refresh_allowance<R: ChainRead>(
        &mut self,
        read: &R,
        owner: Address,
        spender: Address,
    ) -> Result<TokenAmount, AppError> {
        match read.allowance(owner, spender).await {
            Ok(value) => {
                self.allowances.insert(spender, value);
                Ok(value)
            }
            Err(err) => {
                self.allowances.remove(&spender);
                Err(AppError::ProviderUnavailable(err.to_string()))
            }
        }
    }
}

/// Renders a possibly-stale amount, with `"-"` for the stale sentinel.
pub fn display_amount(value: Option<TokenAmount>, fraction_digits: u8) -> String {
    match value {
        Some(amount) => amount.format(fraction_digits),
        None => "-".to_string(),
    }
}
