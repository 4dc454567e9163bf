//! Chain capability layer: the wallet, read, and write interfaces the
//! orchestrators are written against, plus the wire-level types they share.
//!
//! Production adapters bind these traits to a real provider; tests bind them
//! to the in-memory fakes in [`crate::test_helpers`].

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::amount::TokenAmount;

/// A 20-byte account or contract identifier, rendered as `0x`-prefixed hex.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Address(pub [u8; 20]);

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("invalid address: {0:?}")]
pub struct AddressParseError(String);

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        let bytes =
            hex::decode(stripped).map_err(|_| AddressParseError(s.to_string()))?;
        let bytes: [u8; 20] = bytes
            .try_into()
            .map_err(|_| AddressParseError(s.to_string()))?;
        Ok(Address(bytes))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworkId(pub u64);

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to a submitted transaction.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TxRef(pub [u8; 32]);

impl fmt::Display for TxRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// A parity wager or result.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Parity {
    Even,
    Odd,
}

impl Parity {
    pub fn of_even(even: bool) -> Self {
        if even { Parity::Even } else { Parity::Odd }
    }

    pub fn is_even(&self) -> bool {
        matches!(self, Parity::Even)
    }
}

impl fmt::Display for Parity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Parity::Even => f.write_str("Even"),
            Parity::Odd => f.write_str("Odd"),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TxStatus {
    Success,
    Reverted,
}

/// One log entry emitted during transaction execution. `event` is the
/// emitting contract's event signature; `data` is the word-encoded payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogEntry {
    pub source: Address,
    pub event: String,
    pub data: Vec<u8>,
}

/// Terminal record of a submitted transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Receipt {
    pub status: TxStatus,
    pub logs: Vec<LogEntry>,
    pub tx_ref: TxRef,
}

/// Transport-level failure from a capability call. Orchestrators translate
/// these into the user-facing taxonomy in [`crate::error`].
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("user rejected the wallet prompt")]
    Rejected,
    #[error("execution reverted{}", reason.as_deref().map(|r| format!(": {r}")).unwrap_or_default())]
    Reverted { reason: Option<String> },
    #[error("provider error: {0}")]
    Provider(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WalletEvent {
    AccountsChanged(Vec<Address>),
    ChainChanged(NetworkId),
}

/// Wallet connection and network control.
pub trait WalletProvider {
    async fn request_accounts(&mut self) -> Result<Vec<Address>, ChainError>;
    async fn network_id(&self) -> Result<NetworkId, ChainError>;
    async fn switch_network(&mut self, id: NetworkId) -> Result<(), ChainError>;
}

/// Externally-triggered wallet notifications (account and chain changes).
pub trait WalletEvents {
    /// Waits for the next notification; `None` once the source is closed.
    async fn next_event(&mut self) -> Option<WalletEvent>;

    /// Returns an already-queued notification without waiting.
    fn try_next_event(&mut self) -> Option<WalletEvent>;
}

/// Read-only contract state. All reads are free and may be issued without a
/// connected signer.
pub trait ChainRead {
    async fn balance_of(&self, account: Address) -> Result<TokenAmount, ChainError>;
    async fn native_balance_of(
        &self,
        account: Address,
    ) -> Result<TokenAmount, ChainError>;
    async fn allowance(
        &self,
        owner: Address,
        spender: Address,
    ) -> Result<TokenAmount, ChainError>;
    async fn min_bet(&self) -> Result<TokenAmount, ChainError>;
    async fn bankroll(&self) -> Result<TokenAmount, ChainError>;
}

/// A submitted transaction awaiting its terminal receipt. Confirmation waits
/// indefinitely; liveness is the provider's concern.
pub trait TxHandle {
    async fn await_confirmation(self) -> Result<Receipt, ChainError>;
}

/// State-changing contract calls, signed by `from`. Submission returns once
/// the wallet has accepted the transaction; a declined prompt resolves with
/// [`ChainError::Rejected`], never a hang.
pub trait ChainWrite {
    type Tx: TxHandle;

    async fn approve(
        &self,
        from: Address,
        spender: Address,
        amount: TokenAmount,
    ) -> Result<Self::Tx, ChainError>;

    async fn swap_native_for_token(
        &self,
        from: Address,
        value: TokenAmount,
    ) -> Result<Self::Tx, ChainError>;

    async fn swap_token_for_native(
        &self,
        from: Address,
        amount: TokenAmount,
    ) -> Result<Self::Tx, ChainError>;

    async fn place_bet(
        &self,
        from: Address,
        amount: TokenAmount,
        guess: Parity,
    ) -> Result<Self::Tx, ChainError>;

    /// Speculative dry run of `place_bet`. A [`ChainError::Reverted`] result
    /// means the real submission would revert; no gas is spent.
    async fn estimate_place_bet(
        &self,
        from: Address,
        amount: TokenAmount,
        guess: Parity,
    ) -> Result<(), ChainError>;
}
