//! The approval gate: decides whether a spender needs a fresh token
//! allowance before a dependent operation, and drives the approval
//! transaction to its terminal receipt when it does.

use tracing::{debug, info};

use crate::{
    amount::TokenAmount,
    chain::{Address, ChainError, ChainRead, ChainWrite, TxHandle, TxStatus},
    error::AppError,
    lock::OpLock,
};

/// How much to approve when the current allowance falls short.
///
/// `Exact` grants only what the pending operation needs and re-prompts on the
/// next one; `Ceiling` grants a large fixed quota once and trades repeat
/// prompts for a standing authorization. The choice is configuration, made
/// explicit at every call site through [`crate::config::AppConfig`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ApprovalPolicy {
    Exact,
    Ceiling(TokenAmount),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ApprovalOutcome {
    /// The freshly-read allowance already covers the requirement; nothing
    /// was submitted.
    AlreadySufficient,
    Approved,
    Rejected,
    Failed,
    /// Another approval is in flight; this call was a no-op.
    InFlight,
}

pub struct ApprovalGate<'a, R, W> {
    read: &'a R,
    write: &'a W,
    lock: &'a OpLock,
    policy: ApprovalPolicy,
}

impl<'a, R: ChainRead, W: ChainWrite> ApprovalGate<'a, R, W> {
    pub fn new(read: &'a R, write: &'a W, lock: &'a OpLock, policy: ApprovalPolicy) -> Self {
        Self {
            read,
            write,
            lock,
            policy,
        }
    }

    /// Ensures `spender` may move `required` of the owner's tokens.
    ///
    /// The allowance is re-read here, never trusted from a cache: it must be
    /// authoritative at the moment the decision is made. When it already
    /// covers the requirement no transaction is submitted.
    pub async fn ensure(
        &self,
        owner: Address,
        spender: Address,
        required: TokenAmount,
    ) -> Result<ApprovalOutcome, AppError> {
        let Some(_guard) = self.lock.try_acquire() else {
            debug!(%spender, "approval already in flight; skipping");
            return Ok(ApprovalOutcome::InFlight);
        };

        let allowance = self
            .read
            .allowance(owner, spender)
            .await
            .map_err(provider)?;
        if allowance >= required {
            debug!(%spender, %allowance, "allowance already sufficient");
            return Ok(ApprovalOutcome::AlreadySufficient);
        }

        let grant = match self.policy {
            ApprovalPolicy::Exact => required,
            // A configured ceiling below the requirement would brick the
            // dependent operation; grant the requirement instead.
            ApprovalPolicy::Ceiling(ceiling) => ceiling.max(required),
        };

        info!(%spender, %grant, "submitting approval");
        let tx = match self.write.approve(owner, spender, grant).await {
            Ok(tx) => tx,
            Err(ChainError::Rejected) => return Ok(ApprovalOutcome::Rejected),
            Err(ChainError::Reverted { .. }) => return Ok(ApprovalOutcome::Failed),
            Err(err) => return Err(provider(err)),
        };

        let receipt = match tx.await_confirmation().await {
            Ok(receipt) => receipt,
            Err(ChainError::Rejected) => return Ok(ApprovalOutcome::Rejected),
            Err(err) => return Err(provider(err)),
        };

        match receipt.status {
            TxStatus::Success => Ok(ApprovalOutcome::Approved),
            TxStatus::Reverted => Ok(ApprovalOutcome::Failed),
        }
    }
}

fn provider(err: ChainError) -> AppError {
    AppError::ProviderUnavailable(err.to_string())
}
