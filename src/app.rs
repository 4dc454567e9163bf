//! The application facade: owns the session, the balance cache, the
//! per-operation locks, and the last bet outcome, and wires user intents
//! through the orchestrators. After every transition it pushes a fresh
//! [`AppSnapshot`] through the [`Render`] collaborator; presentation is
//! entirely on the other side of that seam.

use tracing::{error, warn};

use crate::{
    amount::{self, TokenAmount},
    approval::{ApprovalGate, ApprovalOutcome},
    balances::BalanceCache,
    bet::{BetFlow, BetOutcome, BetPhase},
    chain::{
        Address, ChainRead, ChainWrite, NetworkId, Parity, WalletEvent, WalletEvents,
        WalletProvider,
    },
    config::AppConfig,
    error::AppError,
    lock::OpLock,
    session::{ChainSession, SessionState},
    swap::{self, SwapDirection, SwapFlow, SwapOutcome, SwapPhase},
};

const MAX_ERRORS: usize = 50;
const SNAPSHOT_ERRORS: usize = 5;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PendingOps {
    pub swap: bool,
    pub bet: bool,
    pub approval: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SessionView {
    Disconnected,
    Connecting,
    Connected {
        account: Address,
        network: NetworkId,
        network_ok: bool,
    },
}

/// Everything the presentation layer needs, emitted after every transition.
#[derive(Clone, Debug)]
pub struct AppSnapshot {
    pub session: SessionView,
    pub native_balance: Option<TokenAmount>,
    pub token_balance: Option<TokenAmount>,
    pub swap_allowance: Option<TokenAmount>,
    pub dice_allowance: Option<TokenAmount>,
    pub min_bet: Option<TokenAmount>,
    pub bankroll: Option<TokenAmount>,
    pub pending: PendingOps,
    pub last_outcome: Option<BetOutcome>,
    pub projected_output: Option<String>,
    pub status: String,
    pub errors: Vec<String>,
}

/// Presentation seam. The implementation draws; it never drives state.
pub trait Render {
    fn render(&mut self, snapshot: &AppSnapshot);
}

pub struct App<W, E, R, X, V> {
    session: ChainSession<W>,
    events: E,
    read: R,
    write: X,
    view: V,
    config: AppConfig,
    balances: BalanceCache,
    min_bet: Option<TokenAmount>,
    bankroll: Option<TokenAmount>,
    swap_lock: OpLock,
    bet_lock: OpLock,
    approval_lock: OpLock,
    last_outcome: Option<BetOutcome>,
    last_bet_input: Option<String>,
    projected_output: Option<String>,
    status: String,
    errors: Vec<String>,
}

impl<W, E, R, X, V> App<W, E, R, X, V>
where
    W: WalletProvider,
    E: WalletEvents,
    R: ChainRead,
    X: ChainWrite,
    V: Render,
{
    pub fn new(config: AppConfig, wallet: W, events: E, read: R, write: X, view: V) -> Self {
        let target = config.network_id;
        Self {
            session: ChainSession::new(wallet, target),
            events,
            read,
            write,
            view,
            config,
            balances: BalanceCache::empty(),
            min_bet: None,
            bankroll: None,
            swap_lock: OpLock::new(),
            bet_lock: OpLock::new(),
            approval_lock: OpLock::new(),
            last_outcome: None,
            last_bet_input: None,
            projected_output: None,
            status: String::from("Ready"),
            errors: Vec::new(),
        }
    }

    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    pub fn last_outcome(&self) -> Option<&BetOutcome> {
        self.last_outcome.as_ref()
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    /// Connects the wallet and derives the full session view. A wrong
    /// network after a declined switch is a connected-but-blocked state,
    /// not a connect failure.
    pub async fn connect(&mut self) -> Result<(), AppError> {
        self.status = String::from("Connecting wallet...");
        self.render_now();
        match self.session.connect().await {
            Ok(()) => {
                self.status = if self.session.network_ok() {
                    String::from("Connected")
                } else {
                    format!(
                        "Connected to the wrong network; switch to chain {}",
                        self.session.target_network()
                    )
                };
                self.refresh().await;
                Ok(())
            }
            Err(err) => {
                self.fail(&err);
                Err(err)
            }
        }
    }

    pub fn disconnect(&mut self) {
        self.session.disconnect();
        self.reset_account_state();
        self.status = String::from("Disconnected");
        self.render_now();
    }

    /// Refreshes dice limits (readable without a wallet), then balances and
    /// allowances for the active account. Read failures go stale, never
    /// fatal. Renders the result.
    pub async fn refresh(&mut self) {
        self.min_bet = match self.read.min_bet().await {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(%err, "min bet read failed");
                None
            }
        };
        self.bankroll = match self.read.bankroll().await {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(%err, "bankroll read failed");
                None
            }
        };
        if let Some(account) = self.session.account() {
            self.balances.refresh(&self.read, account).await;
            for spender in [self.config.swap_contract, self.config.dice_contract] {
                if let Err(err) = self
                    .balances
                    .refresh_allowance(&self.read, account, spender)
                    .await
                {
                    warn!(%err, %spender, "allowance refresh failed");
                }
            }
        } else {
            self.balances.clear();
        }
        self.render_now();
    }

    /// Applies one external wallet notification and re-derives dependent
    /// state.
    pub async fn handle_wallet_event(&mut self, event: WalletEvent) {
        self.apply_event(event).await;
        self.refresh().await;
    }

    /// Waits for the next wallet notification; `false` once the source is
    /// closed.
    pub async fn wait_wallet_event(&mut self) -> bool {
        match self.events.next_event().await {
            Some(event) => {
                self.handle_wallet_event(event).await;
                true
            }
            None => false,
        }
    }

    /// Updates the 1:1 projected swap output for the current input.
    pub fn preview_swap(&mut self, input: &str) {
        self.projected_output = swap::preview_output(input, self.config.token_decimals);
        self.render_now();
    }

    /// Runs one swap to settlement.
    pub async fn swap(
        &mut self,
        direction: SwapDirection,
        input: &str,
    ) -> Result<(), AppError> {
        let owner = match self.session.writable_account() {
            Ok(account) => account,
            Err(err) => {
                self.fail(&err);
                return Err(err);
            }
        };

        let mut progress = self.snapshot();
        let result = {
            let view = &mut self.view;
            let flow = SwapFlow::new(
                &self.read,
                &self.write,
                self.config.swap_contract,
                self.config.token_decimals,
                self.config.approval_policy,
                &self.swap_lock,
                &self.approval_lock,
            );
            flow.execute(owner, direction, input, |ph| {
                progress.pending.swap = ph != SwapPhase::Settled;
                progress.pending.approval = ph == SwapPhase::Approving;
                progress.status = swap_phase_line(ph, direction);
                view.render(&progress);
            })
            .await
        };

        if !self.still_signing_as(owner).await {
            return Err(AppError::NotConnected);
        }

        match result {
            Ok(SwapOutcome::Settled(tx_ref)) => {
                self.projected_output = None;
                self.status =
                    format!("Swap {} settled in {tx_ref}", direction_label(direction));
                self.refresh().await;
                Ok(())
            }
            Ok(SwapOutcome::SwapInFlight) => {
                self.status = String::from("A swap is already in progress");
                self.render_now();
                Ok(())
            }
            Ok(SwapOutcome::ApprovalInFlight) => {
                self.status = String::from("An approval is already in progress");
                self.render_now();
                Ok(())
            }
            Err(err) => {
                self.fail(&err);
                Err(err)
            }
        }
    }

    /// Explicit, user-initiated approval of the dice contract. The bet flow
    /// never approves on its own; this is the one place that authorization
    /// is granted.
    pub async fn approve_for_betting(
        &mut self,
        input: &str,
    ) -> Result<ApprovalOutcome, AppError> {
        let owner = match self.session.writable_account() {
            Ok(account) => account,
            Err(err) => {
                self.fail(&err);
                return Err(err);
            }
        };
        let required = match amount::parse(input, self.config.token_decimals) {
            Ok(amount) if !amount.is_zero() => amount,
            Ok(_) => {
                let err =
                    AppError::InvalidAmount("approval must be positive".to_string());
                self.fail(&err);
                return Err(err);
            }
            Err(err) => {
                let err = AppError::from(err);
                self.fail(&err);
                return Err(err);
            }
        };

        let mut progress = self.snapshot();
        progress.pending.approval = true;
        progress.status = String::from("Waiting for approval confirmation...");
        self.view.render(&progress);

        let result = {
            let gate = ApprovalGate::new(
                &self.read,
                &self.write,
                &self.approval_lock,
                self.config.approval_policy,
            );
            gate.ensure(owner, self.config.dice_contract, required).await
        };

        if !self.still_signing_as(owner).await {
            return Err(AppError::NotConnected);
        }

        match result {
            Ok(outcome) => {
                self.status = match &outcome {
                    ApprovalOutcome::AlreadySufficient => {
                        String::from("Allowance already sufficient")
                    }
                    ApprovalOutcome::Approved => String::from("Approval confirmed"),
                    ApprovalOutcome::Rejected => String::from("Approval rejected"),
                    ApprovalOutcome::Failed => String::from("Approval reverted"),
                    ApprovalOutcome::InFlight => {
                        String::from("An approval is already in progress")
                    }
                };
                self.refresh().await;
                Ok(outcome)
            }
            Err(err) => {
                self.fail(&err);
                Err(err)
            }
        }
    }

    /// Places one parity wager to settlement.
    pub async fn place_bet(&mut self, input: &str, guess: Parity) -> Result<(), AppError> {
        let owner = match self.session.writable_account() {
            Ok(account) => account,
            Err(err) => {
                self.fail(&err);
                return Err(err);
            }
        };

        let mut progress = self.snapshot();
        let result = {
            let view = &mut self.view;
            let flow = BetFlow::new(
                &self.read,
                &self.write,
                self.config.dice_contract,
                self.config.token_decimals,
                &self.bet_lock,
            );
            flow.place(owner, input, guess, |ph| {
                progress.pending.bet = ph != BetPhase::Settled;
                progress.status = bet_phase_line(ph);
                view.render(&progress);
            })
            .await
        };

        if !self.still_signing_as(owner).await {
            return Err(AppError::NotConnected);
        }

        match result {
            Ok(Some(settlement)) => {
                self.last_bet_input = Some(input.trim().to_string());
                match settlement.outcome {
                    Some(outcome) => {
                        self.status = if outcome.won {
                            format!("{} — you won {}", outcome.result, outcome.payout)
                        } else {
                            format!("{} — you lost {}", outcome.result, outcome.wagered)
                        };
                        self.last_outcome = Some(outcome);
                    }
                    None => {
                        // Confirmed on-chain, result not decodable. Balances
                        // still refresh below.
                        self.status = format!(
                            "Bet confirmed in {}; outcome undetermined",
                            settlement.tx_ref
                        );
                    }
                }
                self.refresh().await;
                Ok(())
            }
            Ok(None) => {
                self.status = String::from("A bet is already in progress");
                self.render_now();
                Ok(())
            }
            Err(err) => {
                self.fail(&err);
                Err(err)
            }
        }
    }

    /// Formatted full token balance, for the "max" bet shortcut.
    pub fn max_bet_input(&self) -> Option<String> {
        self.balances.token().map(|balance| balance.format_full())
    }

    /// The last successfully wagered input, for the "repeat" shortcut.
    pub fn repeat_bet_input(&self) -> Option<String> {
        self.last_bet_input.clone()
    }

    pub fn halve_bet_input(&self, input: &str) -> Result<String, AppError> {
        Ok(amount::halve(input, self.config.token_decimals)?)
    }

    pub fn double_bet_input(&self, input: &str) -> Result<String, AppError> {
        Ok(amount::double(input, self.config.token_decimals)?)
    }

    pub fn snapshot(&self) -> AppSnapshot {
        let session = match self.session.state() {
            SessionState::Disconnected => SessionView::Disconnected,
            SessionState::Connecting => SessionView::Connecting,
            SessionState::Connected { account, network } => SessionView::Connected {
                account,
                network,
                network_ok: network == self.config.network_id,
            },
        };
        AppSnapshot {
            session,
            native_balance: self.balances.native(),
            token_balance: self.balances.token(),
            swap_allowance: self.balances.allowance(self.config.swap_contract),
            dice_allowance: self.balances.allowance(self.config.dice_contract),
            min_bet: self.min_bet,
            bankroll: self.bankroll,
            pending: PendingOps {
                swap: self.swap_lock.is_held(),
                bet: self.bet_lock.is_held(),
                approval: self.approval_lock.is_held(),
            },
            last_outcome: self.last_outcome.clone(),
            projected_output: self.projected_output.clone(),
            status: self.status.clone(),
            errors: self
                .errors
                .iter()
                .rev()
                .take(SNAPSHOT_ERRORS)
                .cloned()
                .collect(),
        }
    }

    /// Applies queued wallet notifications, then checks that the signer an
    /// in-flight operation started with is still active. A confirmation
    /// that lands after an account change is discarded rather than
    /// attributed to the new account.
    async fn still_signing_as(&mut self, owner: Address) -> bool {
        while let Some(event) = self.events.try_next_event() {
            self.apply_event(event).await;
        }
        if self.session.account() == Some(owner) {
            return true;
        }
        warn!(%owner, "account changed during an in-flight operation; discarding result");
        self.status = String::from("Account changed; operation result discarded");
        self.refresh().await;
        false
    }

    async fn apply_event(&mut self, event: WalletEvent) {
        let identity_changed = self.session.apply_event(event).await;
        if identity_changed {
            self.reset_account_state();
        }
    }

    fn reset_account_state(&mut self) {
        self.balances.clear();
        self.last_outcome = None;
        self.last_bet_input = None;
        self.projected_output = None;
    }

    fn fail(&mut self, err: &AppError) {
        error!("{err}");
        self.status = err.to_string();
        self.errors.push(err.to_string());
        if self.errors.len() > MAX_ERRORS {
            let excess = self.errors.len() - MAX_ERRORS;
            self.errors.drain(0..excess);
        }
        self.render_now();
    }

    fn render_now(&mut self) {
        let snapshot = self.snapshot();
        self.view.render(&snapshot);
    }
}

fn direction_label(direction: SwapDirection) -> &'static str {
    match direction {
        SwapDirection::NativeToToken => "native → token",
        SwapDirection::TokenToNative => "token → native",
    }
}

fn swap_phase_line(phase: SwapPhase, direction: SwapDirection) -> String {
    let label = direction_label(direction);
    match phase {
        SwapPhase::ValidatingInput => format!("Validating swap {label}..."),
        SwapPhase::CheckingBalance => String::from("Checking balance..."),
        SwapPhase::Approving => String::from("Waiting for token approval..."),
        SwapPhase::Submitting => format!("Submitting swap {label}..."),
        SwapPhase::Confirming => String::from("Waiting for confirmation..."),
        SwapPhase::Settled => format!("Swap {label} settled"),
    }
}

fn bet_phase_line(phase: BetPhase) -> String {
    String::from(match phase {
        BetPhase::Validating => "Validating bet...",
        BetPhase::CheckingLimits => "Checking limits and bankroll...",
        BetPhase::CheckingAllowance => "Checking allowance...",
        BetPhase::EstimatingFeasibility => "Estimating transaction...",
        BetPhase::Submitting => "Submitting bet...",
        BetPhase::Confirming => "Waiting for confirmation...",
        BetPhase::DecodingOutcome => "Reading outcome...",
        BetPhase::Settled => "Bet settled",
    })
}
