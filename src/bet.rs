//! The bet orchestrator: a parity-guess wager sequenced through ordered,
//! short-circuiting precondition checks — cheapest first — then speculative
//! estimation, submission, confirmation, and outcome decoding.

use tracing::{debug, info, warn};

use crate::{
    amount::{self, TokenAmount},
    chain::{
        Address, ChainError, ChainRead, ChainWrite, Parity, TxHandle, TxRef, TxStatus,
    },
    error::AppError,
    lock::OpLock,
    outcome::{self, PlayedEvent},
};

/// Phases of a bet run, reported through the progress callback.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BetPhase {
    Validating,
    CheckingLimits,
    CheckingAllowance,
    EstimatingFeasibility,
    Submitting,
    Confirming,
    DecodingOutcome,
    Settled,
}

/// The decoded result of one settled wager. Immutable; replaces the previous
/// session outcome.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BetOutcome {
    pub wagered: TokenAmount,
    pub guess: Parity,
    pub result: Parity,
    pub won: bool,
    pub payout: TokenAmount,
    pub tx_ref: TxRef,
}

/// A confirmed bet. `outcome` is `None` when the receipt succeeded but no
/// decodable settlement event was found — the wager stands on-chain, only
/// the client-side decoding came up empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BetSettlement {
    pub tx_ref: TxRef,
    pub outcome: Option<BetOutcome>,
}

pub struct BetFlow<'a, R, W> {
    read: &'a R,
    write: &'a W,
    dice_contract: Address,
    decimals: u8,
    lock: &'a OpLock,
}

impl<'a, R: ChainRead, W: ChainWrite> BetFlow<'a, R, W> {
    pub fn new(
        read: &'a R,
        write: &'a W,
        dice_contract: Address,
        decimals: u8,
        lock: &'a OpLock,
    ) -> Self {
        Self {
            read,
            write,
            dice_contract,
            decimals,
            lock,
        }
    }

    /// Places one wager to settlement. Returns `None` when a bet is already
    /// in flight for this session: the second invocation is a no-op, never
    /// queued.
    ///
    /// Precondition order matters: local parse, then fresh chain reads from
    /// cheapest consequence to most expensive, each short-circuiting before
    /// anything is submitted. Approval is deliberately not automated here —
    /// an insufficient allowance blocks with `ApprovalRequired` and the user
    /// grants it as a separate, explicit action.
    pub async fn place(
        &self,
        owner: Address,
        input: &str,
        guess: Parity,
        mut phase: impl FnMut(BetPhase),
    ) -> Result<Option<BetSettlement>, AppError> {
        let Some(_guard) = self.lock.try_acquire() else {
            debug!("bet already in flight; ignoring");
            return Ok(None);
        };

        phase(BetPhase::Validating);
        let wagered = amount::parse(input, self.decimals)?;
        if wagered.is_zero() {
            return Err(AppError::InvalidAmount(
                "bet must be positive".to_string(),
            ));
        }

        phase(BetPhase::CheckingLimits);
        let min = self.read.min_bet().await.map_err(provider)?;
        if wagered < min {
            return Err(AppError::BelowMinimum { min });
        }

        let available = self.read.balance_of(owner).await.map_err(provider)?;
        if available < wagered {
            return Err(AppError::InsufficientBalance {
                available,
                requested: wagered,
            });
        }

        // Worst-case payout is 2x the wager. The chain enforces this too;
        // failing here just avoids gas on a guaranteed revert.
        let required = wagered
            .checked_double()
            .ok_or_else(|| AppError::InvalidAmount("bet too large".to_string()))?;
        let bankroll = self.read.bankroll().await.map_err(provider)?;
        if bankroll < required {
            return Err(AppError::BankrollTooLow { bankroll, required });
        }

        phase(BetPhase::CheckingAllowance);
        let allowance = self
            .read
            .allowance(owner, self.dice_contract)
            .await
            .map_err(provider)?;
        if allowance < wagered {
            return Err(AppError::ApprovalRequired {
                spender: self.dice_contract,
                required: wagered,
            });
        }

        phase(BetPhase::EstimatingFeasibility);
        match self.write.estimate_place_bet(owner, wagered, guess).await {
            Ok(()) => {}
            Err(ChainError::Reverted { reason }) => {
                return Err(AppError::WouldRevert { reason });
            }
            Err(ChainError::Rejected) => return Err(AppError::UserRejected),
            Err(err) => return Err(provider(err)),
        }

        phase(BetPhase::Submitting);
        let tx = match self.write.place_bet(owner, wagered, guess).await {
            Ok(tx) => tx,
            Err(ChainError::Rejected) => return Err(AppError::UserRejected),
            Err(ChainError::Reverted { reason }) => {
                return Err(AppError::WouldRevert { reason });
            }
            Err(err) => return Err(provider(err)),
        };

        phase(BetPhase::Confirming);
        let receipt = match tx.await_confirmation().await {
            Ok(receipt) => receipt,
            Err(ChainError::Rejected) => return Err(AppError::UserRejected),
            Err(err) => return Err(provider(err)),
        };
        if receipt.status != TxStatus::Success {
            return Err(AppError::BetReverted(receipt.tx_ref));
        }

        phase(BetPhase::DecodingOutcome);
        let outcome = outcome::decode_played(&receipt.logs, self.dice_contract)
            .and_then(|event| self.settle(event, guess, receipt.tx_ref));
        if outcome.is_none() {
            // The transaction succeeded on-chain; only the structured result
            // is missing. Recoverable, not a failure.
            warn!(tx = %receipt.tx_ref, "no decodable outcome event in receipt");
        }

        phase(BetPhase::Settled);
        Ok(Some(BetSettlement {
            tx_ref: receipt.tx_ref,
            outcome,
        }))
    }

    fn settle(
        &self,
        event: PlayedEvent,
        guess: Parity,
        tx_ref: TxRef,
    ) -> Option<BetOutcome> {
        let wagered = TokenAmount::from_units(event.amount, self.decimals);
        let payout = if event.win {
            wagered.checked_double()?
        } else {
            TokenAmount::zero(self.decimals)
        };
        let outcome = BetOutcome {
            wagered,
            guess,
            result: Parity::of_even(event.result_even),
            won: event.win,
            payout,
            tx_ref,
        };
        info!(
            tx = %tx_ref,
            wagered = %outcome.wagered,
            result = %outcome.result,
            won = outcome.won,
            payout = %outcome.payout,
            "bet settled"
        );
        Some(outcome)
    }
}

fn provider(err: ChainError) -> AppError {
    AppError::ProviderUnavailable(err.to_string())
}
