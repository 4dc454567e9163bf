//! The user-facing failure taxonomy. Every orchestration step resolves into
//! one of these variants; nothing is surfaced as a raw provider error string
//! without classification.

use thiserror::Error;

use crate::{
    amount::{AmountError, TokenAmount},
    chain::{Address, NetworkId, TxRef},
};

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum AppError {
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("wallet is not connected")]
    NotConnected,
    #[error("wrong network: connected to chain {actual}, expected {expected}")]
    WrongNetwork {
        expected: NetworkId,
        actual: NetworkId,
    },
    #[error("insufficient balance: have {available}, need {requested}")]
    InsufficientBalance {
        available: TokenAmount,
        requested: TokenAmount,
    },
    #[error("bet is below the minimum of {min}")]
    BelowMinimum { min: TokenAmount },
    #[error("bankroll {bankroll} cannot cover a worst-case payout of {required}")]
    BankrollTooLow {
        bankroll: TokenAmount,
        required: TokenAmount,
    },
    #[error("approval of {required} required for spender {spender}")]
    ApprovalRequired {
        spender: Address,
        required: TokenAmount,
    },
    #[error("transaction would revert{}", reason.as_deref().map(|r| format!(": {r}")).unwrap_or_default())]
    WouldRevert { reason: Option<String> },
    #[error("user rejected the wallet prompt")]
    UserRejected,
    #[error("swap reverted on-chain in {0}")]
    SwapReverted(TxRef),
    #[error("bet reverted on-chain in {0}")]
    BetReverted(TxRef),
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),
}

impl From<AmountError> for AppError {
    fn from(err: AmountError) -> Self {
        AppError::InvalidAmount(err.to_string())
    }
}
