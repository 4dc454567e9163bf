//! The swap orchestrator: one-directional native↔token exchange at the fixed
//! 1:1 rate, sequenced as validate → balance check → (approve) → submit →
//! confirm.

use tracing::{debug, info};

use crate::{
    amount,
    approval::{ApprovalGate, ApprovalOutcome, ApprovalPolicy},
    chain::{Address, ChainError, ChainRead, ChainWrite, TxHandle, TxRef, TxStatus},
    error::AppError,
    lock::OpLock,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SwapDirection {
    NativeToToken,
    TokenToNative,
}

/// Phases of a swap run, reported through the progress callback so the
/// presentation layer can show a pending indicator per step.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SwapPhase {
    ValidatingInput,
    CheckingBalance,
    Approving,
    Submitting,
    Confirming,
    Settled,
}

/// Terminal result of a swap invocation that did not fail.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SwapOutcome {
    Settled(TxRef),
    /// Another swap holds the slot; the call was a no-op.
    SwapInFlight,
    /// Another approval holds the approval slot; the call was a no-op.
    ApprovalInFlight,
}

pub struct SwapFlow<'a, R, W> {
    read: &'a R,
    write: &'a W,
    swap_contract: Address,
    decimals: u8,
    approval_policy: ApprovalPolicy,
    lock: &'a OpLock,
    approval_lock: &'a OpLock,
}

impl<'a, R: ChainRead, W: ChainWrite> SwapFlow<'a, R, W> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        read: &'a R,
        write: &'a W,
        swap_contract: Address,
        decimals: u8,
        approval_policy: ApprovalPolicy,
        lock: &'a OpLock,
        approval_lock: &'a OpLock,
    ) -> Self {
        Self {
            read,
            write,
            swap_contract,
            decimals,
            approval_policy,
            lock,
            approval_lock,
        }
    }

    /// Runs one swap to settlement. A held swap or approval slot makes the
    /// call a no-op (never queued), reported as the matching in-flight
    /// outcome.
    pub async fn execute(
        &self,
        owner: Address,
        direction: SwapDirection,
        input: &str,
        mut phase: impl FnMut(SwapPhase),
    ) -> Result<SwapOutcome, AppError> {
        let Some(_guard) = self.lock.try_acquire() else {
            debug!("swap already in flight; ignoring");
            return Ok(SwapOutcome::SwapInFlight);
        };

        phase(SwapPhase::ValidatingInput);
        let requested = amount::parse(input, self.decimals)?;
        if requested.is_zero() {
            return Err(AppError::InvalidAmount(
                "amount must be positive".to_string(),
            ));
        }

        phase(SwapPhase::CheckingBalance);
        // Authoritative re-read of the source asset; the display cache is
        // not trusted this close to a write.
        let available = match direction {
            SwapDirection::NativeToToken => self.read.native_balance_of(owner).await,
            SwapDirection::TokenToNative => self.read.balance_of(owner).await,
        }
        .map_err(provider)?;
        if available < requested {
            return Err(AppError::InsufficientBalance {
                available,
                requested,
            });
        }

        // Native→Token attaches value directly to the call and never needs
        // an allowance; Token→Native spends through the swap contract.
        if direction == SwapDirection::TokenToNative {
            phase(SwapPhase::Approving);
            let gate = ApprovalGate::new(
                self.read,
                self.write,
                self.approval_lock,
                self.approval_policy,
            );
            match gate.ensure(owner, self.swap_contract, requested).await? {
                ApprovalOutcome::AlreadySufficient | ApprovalOutcome::Approved => {}
                ApprovalOutcome::Rejected => return Err(AppError::UserRejected),
                ApprovalOutcome::Failed => {
                    return Err(AppError::WouldRevert {
                        reason: Some("token approval reverted".to_string()),
                    });
                }
                ApprovalOutcome::InFlight => return Ok(SwapOutcome::ApprovalInFlight),
            }
        }

        phase(SwapPhase::Submitting);
        let tx = match direction {
            SwapDirection::NativeToToken => {
                self.write.swap_native_for_token(owner, requested).await
            }
            SwapDirection::TokenToNative => {
                self.write.swap_token_for_native(owner, requested).await
            }
        };
        let tx = match tx {
            Ok(tx) => tx,
            Err(ChainError::Rejected) => return Err(AppError::UserRejected),
            Err(ChainError::Reverted { reason }) => {
                // Pre-flight estimation failure; nothing was submitted.
                return Err(AppError::WouldRevert { reason });
            }
            Err(err) => return Err(provider(err)),
        };

        phase(SwapPhase::Confirming);
        let receipt = match tx.await_confirmation().await {
            Ok(receipt) => receipt,
            Err(ChainError::Rejected) => return Err(AppError::UserRejected),
            Err(err) => return Err(provider(err)),
        };
        if receipt.status != TxStatus::Success {
            return Err(AppError::SwapReverted(receipt.tx_ref));
        }

        info!(tx = %receipt.tx_ref, ?direction, amount = %requested, "swap settled");
        phase(SwapPhase::Settled);
        Ok(SwapOutcome::Settled(receipt.tx_ref))
    }
}

/// Projected output of a swap at the fixed 1:1 rate: the parsed input echoed
/// back in canonical form, or `None` for empty/invalid/zero input.
pub fn preview_output(input: &str, decimals: u8) -> Option<String> {
    let amount = amount::parse(input, decimals).ok()?;
    if amount.is_zero() {
        return None;
    }
    Some(amount.format_full())
}

fn provider(err: ChainError) -> AppError {
    AppError::ProviderUnavailable(err.to_string())
}
