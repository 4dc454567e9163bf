//! In-memory fakes for the wallet and chain capabilities, plus a wired-up
//! test application. Used by the integration tests and the scripted demo
//! binary; none of this talks to a real provider.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
};

use tokio::sync::mpsc;

use crate::{
    amount::TokenAmount,
    app::{App, AppSnapshot, Render},
    chain::{
        Address, ChainError, ChainRead, ChainWrite, LogEntry, NetworkId, Parity,
        Receipt, TxHandle, TxRef, TxStatus, WalletEvent, WalletEvents, WalletProvider,
    },
    config::AppConfig,
    outcome::PlayedEvent,
};

pub fn addr(byte: u8) -> Address {
    Address([byte; 20])
}

/// `whole` tokens at `decimals` precision.
pub fn tokens(whole: u64, decimals: u8) -> TokenAmount {
    TokenAmount::from_units(whole as u128 * 10u128.pow(decimals as u32), decimals)
}

/// Capability-level write calls observed by the fake chain. The zero-write
/// assertions in the tests count these.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub approve: u32,
    pub swap_native: u32,
    pub swap_token: u32,
    pub place_bet: u32,
    pub estimate: u32,
}

#[derive(Debug, Default)]
struct ChainState {
    native: HashMap<Address, u128>,
    token: HashMap<Address, u128>,
    allowances: HashMap<(Address, Address), u128>,
    min_bet: u128,
    bankroll: u128,
    parities: VecDeque<Parity>,
    counts: CallCounts,
    next_tx: u64,
    reject_approve: bool,
    reject_swap: bool,
    reject_bet: bool,
    revert_approve: bool,
    revert_estimate: Option<String>,
    suppress_bet_log: bool,
    fail_native_reads: bool,
    fail_token_reads: bool,
}

/// An in-memory stand-in for the token, swap, and dice contracts. Clones
/// share state, so the same instance serves as both the read and the write
/// capability.
#[derive(Clone)]
pub struct FakeChain {
    dice: Address,
    swap: Address,
    decimals: u8,
    state: Arc<Mutex<ChainState>>,
}

impl FakeChain {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            dice: config.dice_contract,
            swap: config.swap_contract,
            decimals: config.token_decimals,
            state: Arc::new(Mutex::new(ChainState::default())),
        }
    }

    fn amt(&self, units: u128) -> TokenAmount {
        TokenAmount::from_units(units, self.decimals)
    }

    pub fn set_native_balance(&self, account: Address, amount: TokenAmount) {
        self.state.lock().unwrap().native.insert(account, amount.units());
    }

    pub fn set_token_balance(&self, account: Address, amount: TokenAmount) {
        self.state.lock().unwrap().token.insert(account, amount.units());
    }

    pub fn set_allowance(&self, owner: Address, spender: Address, amount: TokenAmount) {
        self.state
            .lock()
            .unwrap()
            .allowances
            .insert((owner, spender), amount.units());
    }

    pub fn set_min_bet(&self, amount: TokenAmount) {
        self.state.lock().unwrap().min_bet = amount.units();
    }

    pub fn set_bankroll(&self, amount: TokenAmount) {
        self.state.lock().unwrap().bankroll = amount.units();
    }

    /// Queues the parity the next bet settles with. Defaults to `Even` when
    /// the queue is empty.
    pub fn push_parity(&self, parity: Parity) {
        self.state.lock().unwrap().parities.push_back(parity);
    }

    pub fn set_reject_approve(&self, reject: bool) {
        self.state.lock().unwrap().reject_approve = reject;
    }

    pub fn set_reject_swap(&self, reject: bool) {
        self.state.lock().unwrap().reject_swap = reject;
    }

    pub fn set_reject_bet(&self, reject: bool) {
        self.state.lock().unwrap().reject_bet = reject;
    }

    /// Makes approvals confirm with a reverted receipt.
    pub fn set_revert_approve(&self, revert: bool) {
        self.state.lock().unwrap().revert_approve = revert;
    }

    /// Makes the speculative bet estimate fail with `reason`, the way a
    /// provider surfaces a contract require-string from a dry run.
    pub fn set_revert_estimate(&self, reason: &str) {
        self.state.lock().unwrap().revert_estimate = Some(reason.to_string());
    }

    /// Confirms bets successfully but without the settlement event log.
    pub fn set_suppress_bet_log(&self, suppress: bool) {
        self.state.lock().unwrap().suppress_bet_log = suppress;
    }

    pub fn set_fail_native_reads(&self, fail: bool) {
        self.state.lock().unwrap().fail_native_reads = fail;
    }

    pub fn set_fail_token_reads(&self, fail: bool) {
        self.state.lock().unwrap().fail_token_reads = fail;
    }

    pub fn counts(&self) -> CallCounts {
        self.state.lock().unwrap().counts
    }

    pub fn token_balance(&self, account: Address) -> TokenAmount {
        self.amt(balance(&self.state.lock().unwrap().token, account))
    }

    pub fn native_balance(&self, account: Address) -> TokenAmount {
        self.amt(balance(&self.state.lock().unwrap().native, account))
    }

    pub fn allowance_of(&self, owner: Address, spender: Address) -> TokenAmount {
        self.amt(
            self.state
                .lock()
                .unwrap()
                .allowances
                .get(&(owner, spender))
                .copied()
                .unwrap_or(0),
        )
    }

    pub fn bankroll_value(&self) -> TokenAmount {
        self.amt(self.state.lock().unwrap().bankroll)
    }

    fn next_tx_ref(state: &mut ChainState) -> TxRef {
        state.next_tx += 1;
        let mut bytes = [0u8; 32];
        bytes[24..].copy_from_slice(&state.next_tx.to_be_bytes());
        TxRef(bytes)
    }

    fn confirmed(status: TxStatus, logs: Vec<LogEntry>, tx_ref: TxRef) -> FakeTx {
        FakeTx {
            result: Ok(Receipt {
                status,
                logs,
                tx_ref,
            }),
        }
    }

    /// The dice contract's own precondition checks, shared between the
    /// speculative estimate and real submission.
    fn bet_violation(
        state: &ChainState,
        owner: Address,
        wager: u128,
        dice: Address,
    ) -> Option<&'static str> {
        if wager < state.min_bet {
            return Some("BET_BELOW_MIN");
        }
        if balance(&state.token, owner) < wager {
            return Some("INSUFFICIENT_BALANCE");
        }
        if state.bankroll < wager * 2 {
            return Some("BANK_NOT_ENOUGH");
        }
        if state.allowances.get(&(owner, dice)).copied().unwrap_or(0) < wager {
            return Some("ALLOWANCE_TOO_LOW");
        }
        None
    }
}

fn balance(map: &HashMap<Address, u128>, account: Address) -> u128 {
    map.get(&account).copied().unwrap_or(0)
}

impl ChainRead for FakeChain {
    async fn balance_of(&self, account: Address) -> Result<TokenAmount, ChainError> {
        let state = self.state.lock().unwrap();
        if state.fail_token_reads {
            return Err(ChainError::Provider("token read failed".to_string()));
        }
        Ok(self.amt(balance(&state.token, account)))
    }

    async fn native_balance_of(
        &self,
        account: Address,
    ) -> Result<TokenAmount, ChainError> {
        let state = self.state.lock().unwrap();
        if state.fail_native_reads {
            return Err(ChainError::Provider("native read failed".to_string()));
        }
        Ok(self.amt(balance(&state.native, account)))
    }

    async fn allowance(
        &self,
        owner: Address,
        spender: Address,
    ) -> Result<TokenAmount, ChainError> {
        let state = self.state.lock().unwrap();
        Ok(self.amt(state.allowances.get(&(owner, spender)).copied().unwrap_or(0)))
    }

    async fn min_bet(&self) -> Result<TokenAmount, ChainError> {
        Ok(self.amt(self.state.lock().unwrap().min_bet))
    }

    async fn bankroll(&self) -> Result<TokenAmount, ChainError> {
        Ok(self.amt(self.state.lock().unwrap().bankroll))
    }
}

impl ChainWrite for FakeChain {
    type Tx = FakeTx;

    async fn approve(
        &self,
        from: Address,
        spender: Address,
        amount: TokenAmount,
    ) -> Result<FakeTx, ChainError> {
        let mut state = self.state.lock().unwrap();
        state.counts.approve += 1;
        if state.reject_approve {
            return Err(ChainError::Rejected);
        }
        let tx_ref = Self::next_tx_ref(&mut state);
        if state.revert_approve {
            return Ok(Self::confirmed(TxStatus::Reverted, vec![], tx_ref));
        }
        state.allowances.insert((from, spender), amount.units());
        Ok(Self::confirmed(TxStatus::Success, vec![], tx_ref))
    }

    async fn swap_native_for_token(
        &self,
        from: Address,
        value: TokenAmount,
    ) -> Result<FakeTx, ChainError> {
        let mut state = self.state.lock().unwrap();
        state.counts.swap_native += 1;
        if state.reject_swap {
            return Err(ChainError::Rejected);
        }
        let tx_ref = Self::next_tx_ref(&mut state);
        if balance(&state.native, from) < value.units() {
            return Ok(Self::confirmed(TxStatus::Reverted, vec![], tx_ref));
        }
        *state.native.entry(from).or_default() -= value.units();
        *state.token.entry(from).or_default() += value.units();
        Ok(Self::confirmed(TxStatus::Success, vec![], tx_ref))
    }

    async fn swap_token_for_native(
        &self,
        from: Address,
        amount: TokenAmount,
    ) -> Result<FakeTx, ChainError> {
        let mut state = self.state.lock().unwrap();
        state.counts.swap_token += 1;
        if state.reject_swap {
            return Err(ChainError::Rejected);
        }
        let tx_ref = Self::next_tx_ref(&mut state);
        let allowance = state
            .allowances
            .get(&(from, self.swap))
            .copied()
            .unwrap_or(0);
        if balance(&state.token, from) < amount.units() || allowance < amount.units() {
            return Ok(Self::confirmed(TxStatus::Reverted, vec![], tx_ref));
        }
        state
            .allowances
            .insert((from, self.swap), allowance - amount.units());
        *state.token.entry(from).or_default() -= amount.units();
        *state.native.entry(from).or_default() += amount.units();
        Ok(Self::confirmed(TxStatus::Success, vec![], tx_ref))
    }

    async fn place_bet(
        &self,
        from: Address,
        amount: TokenAmount,
        guess: Parity,
    ) -> Result<FakeTx, ChainError> {
        let mut state = self.state.lock().unwrap();
        state.counts.place_bet += 1;
        if state.reject_bet {
            return Err(ChainError::Rejected);
        }
        let tx_ref = Self::next_tx_ref(&mut state);
        if Self::bet_violation(&state, from, amount.units(), self.dice).is_some() {
            return Ok(Self::confirmed(TxStatus::Reverted, vec![], tx_ref));
        }

        let result = state.parities.pop_front().unwrap_or(Parity::Even);
        let win = guess == result;
        let wager = amount.units();

        let allowance = state
            .allowances
            .get(&(from, self.dice))
            .copied()
            .unwrap_or(0);
        state.allowances.insert((from, self.dice), allowance - wager);
        *state.token.entry(from).or_default() -= wager;
        if win {
            *state.token.entry(from).or_default() += wager * 2;
            state.bankroll -= wager;
        } else {
            state.bankroll += wager;
        }

        let logs = if state.suppress_bet_log {
            vec![]
        } else {
            vec![
                PlayedEvent {
                    player: from,
                    amount: wager,
                    guess_even: guess.is_even(),
                    result_even: result.is_even(),
                    win,
                }
                .encode(self.dice),
            ]
        };
        Ok(Self::confirmed(TxStatus::Success, logs, tx_ref))
    }

    async fn estimate_place_bet(
        &self,
        from: Address,
        amount: TokenAmount,
        _guess: Parity,
    ) -> Result<(), ChainError> {
        let mut state = self.state.lock().unwrap();
        state.counts.estimate += 1;
        if let Some(reason) = &state.revert_estimate {
            return Err(ChainError::Reverted {
                reason: Some(reason.clone()),
            });
        }
        match Self::bet_violation(&state, from, amount.units(), self.dice) {
            None => Ok(()),
            Some(reason) => Err(ChainError::Reverted {
                reason: Some(reason.to_string()),
            }),
        }
    }
}

pub struct FakeTx {
    result: Result<Receipt, ChainError>,
}

impl TxHandle for FakeTx {
    async fn await_confirmation(self) -> Result<Receipt, ChainError> {
        self.result
    }
}

#[derive(Debug)]
struct WalletState {
    accounts: Vec<Address>,
    network: NetworkId,
    allow_switch: bool,
    reject_connect: bool,
}

#[derive(Clone)]
pub struct FakeWallet {
    state: Arc<Mutex<WalletState>>,
}

impl WalletProvider for FakeWallet {
    async fn request_accounts(&mut self) -> Result<Vec<Address>, ChainError> {
        let state = self.state.lock().unwrap();
        if state.reject_connect {
            return Err(ChainError::Rejected);
        }
        Ok(state.accounts.clone())
    }

    async fn network_id(&self) -> Result<NetworkId, ChainError> {
        Ok(self.state.lock().unwrap().network)
    }

    async fn switch_network(&mut self, id: NetworkId) -> Result<(), ChainError> {
        let mut state = self.state.lock().unwrap();
        if state.allow_switch {
            state.network = id;
            Ok(())
        } else {
            Err(ChainError::Rejected)
        }
    }
}

pub struct FakeWalletEvents {
    rx: mpsc::UnboundedReceiver<WalletEvent>,
}

impl WalletEvents for FakeWalletEvents {
    async fn next_event(&mut self) -> Option<WalletEvent> {
        self.rx.recv().await
    }

    fn try_next_event(&mut self) -> Option<WalletEvent> {
        self.rx.try_recv().ok()
    }
}

/// Test-side handle that mutates wallet state and injects the matching
/// notifications, the way a real wallet extension would.
pub struct WalletCtl {
    state: Arc<Mutex<WalletState>>,
    tx: mpsc::UnboundedSender<WalletEvent>,
}

impl WalletCtl {
    pub fn switch_accounts(&self, accounts: Vec<Address>) {
        self.state.lock().unwrap().accounts = accounts.clone();
        let _ = self.tx.send(WalletEvent::AccountsChanged(accounts));
    }

    pub fn disconnect_wallet(&self) {
        self.state.lock().unwrap().accounts.clear();
        let _ = self.tx.send(WalletEvent::AccountsChanged(vec![]));
    }

    pub fn change_network(&self, id: NetworkId) {
        self.state.lock().unwrap().network = id;
        let _ = self.tx.send(WalletEvent::ChainChanged(id));
    }

    pub fn set_allow_switch(&self, allow: bool) {
        self.state.lock().unwrap().allow_switch = allow;
    }

    pub fn set_reject_connect(&self, reject: bool) {
        self.state.lock().unwrap().reject_connect = reject;
    }
}

pub fn fake_wallet(
    accounts: Vec<Address>,
    network: NetworkId,
) -> (FakeWallet, FakeWalletEvents, WalletCtl) {
    let state = Arc::new(Mutex::new(WalletState {
        accounts,
        network,
        allow_switch: true,
        reject_connect: false,
    }));
    let (tx, rx) = mpsc::unbounded_channel();
    (
        FakeWallet {
            state: Arc::clone(&state),
        },
        FakeWalletEvents { rx },
        WalletCtl { state, tx },
    )
}

/// Captures every emitted snapshot for assertions.
pub struct RecordingRender {
    log: Arc<Mutex<Vec<AppSnapshot>>>,
}

impl RecordingRender {
    pub fn new() -> (Self, Arc<Mutex<Vec<AppSnapshot>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                log: Arc::clone(&log),
            },
            log,
        )
    }
}

impl Render for RecordingRender {
    fn render(&mut self, snapshot: &AppSnapshot) {
        self.log.lock().unwrap().push(snapshot.clone());
    }
}

pub type TestApp = App<FakeWallet, FakeWalletEvents, FakeChain, FakeChain, RecordingRender>;

pub struct TestContext {
    pub chain: FakeChain,
    pub ctl: WalletCtl,
    pub renders: Arc<Mutex<Vec<AppSnapshot>>>,
    pub alice: Address,
    pub config: AppConfig,
}

impl TestContext {
    /// An app wired to fresh fakes: one account, right network, empty chain
    /// state. Tests fund and configure the chain explicitly.
    pub fn new() -> (TestApp, TestContext) {
        let config = AppConfig::default();
        let alice = addr(0xaa);
        let chain = FakeChain::new(&config);
        let (wallet, events, ctl) = fake_wallet(vec![alice], config.network_id);
        let (render, renders) = RecordingRender::new();
        let app = App::new(
            config.clone(),
            wallet,
            events,
            chain.clone(),
            chain.clone(),
            render,
        );
        (
            app,
            TestContext {
                chain,
                ctl,
                renders,
                alice,
                config,
            },
        )
    }
}
