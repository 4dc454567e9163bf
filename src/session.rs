//! The chain session: the single owned home of the connected account and
//! active network. Orchestrators read it through accessors and never write
//! it; all transitions happen here, driven by connect/disconnect and wallet
//! notifications.

use tracing::{info, warn};

use crate::{
    chain::{Address, ChainError, NetworkId, WalletEvent, WalletProvider},
    error::AppError,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected {
        account: Address,
        network: NetworkId,
    },
}

pub struct ChainSession<W> {
    wallet: W,
    target: NetworkId,
    state: SessionState,
}

impl<W> ChainSession<W> {
    pub fn new(wallet: W, target: NetworkId) -> Self {
        Self {
            wallet,
            target,
            state: SessionState::Disconnected,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn target_network(&self) -> NetworkId {
        self.target
    }

    pub fn account(&self) -> Option<Address> {
        match self.state {
            SessionState::Connected { account, .. } => Some(account),
            _ => None,
        }
    }

    pub fn network_ok(&self) -> bool {
        matches!(self.state, SessionState::Connected { network, .. } if network == self.target)
    }

    /// The account writes may be signed with. Fails locally with
    /// `NotConnected` or `WrongNetwork` without contacting the chain.
    pub fn writable_account(&self) -> Result<Address, AppError> {
        match self.state {
            SessionState::Disconnected | SessionState::Connecting => {
                Err(AppError::NotConnected)
            }
            SessionState::Connected { account, network } => {
                if network == self.target {
                    Ok(account)
                } else {
                    Err(AppError::WrongNetwork {
                        expected: self.target,
                        actual: network,
                    })
                }
            }
        }
    }

    /// Fails with `NotConnected` when the active account is no longer the one
    /// an in-flight operation started with.
    pub fn verify_account(&self, expected: Address) -> Result<(), AppError> {
        if self.account() == Some(expected) {
            Ok(())
        } else {
            Err(AppError::NotConnected)
        }
    }

    pub fn disconnect(&mut self) {
        self.state = SessionState::Disconnected;
    }
}

impl<W: WalletProvider> ChainSession<W> {
    /// Requests account access and resolves the network. A mismatched network
    /// triggers one switch attempt; if the user refuses, the session stays
    /// `Connected` on the wrong network and writes are rejected locally.
    pub async fn connect(&mut self) -> Result<(), AppError> {
        self.state = SessionState::Connecting;

        let accounts = match self.wallet.request_accounts().await {
            Ok(accounts) => accounts,
            Err(err) => {
                self.state = SessionState::Disconnected;
                return Err(classify(err));
            }
        };
        let Some(account) = accounts.into_iter().next() else {
            self.state = SessionState::Disconnected;
            return Err(AppError::ProviderUnavailable(
                "wallet returned no accounts".to_string(),
            ));
        };

        let mut network = match self.wallet.network_id().await {
            Ok(id) => id,
            Err(err) => {
                self.state = SessionState::Disconnected;
                return Err(classify(err));
            }
        };

        if network != self.target {
            match self.wallet.switch_network(self.target).await {
                Ok(()) => match self.wallet.network_id().await {
                    Ok(id) => network = id,
                    Err(err) => {
                        warn!(%err, "network re-read after switch failed");
                    }
                },
                Err(err) => {
                    warn!(%err, target = %self.target, "network switch declined");
                }
            }
        }

        info!(account = %account, network = %network, "wallet connected");
        self.state = SessionState::Connected { account, network };
        Ok(())
    }

    /// Re-derives the session from an external wallet notification. An empty
    /// account list is a disconnect; the caller owns clearing cached
    /// balances. Returns `true` when the signer identity changed.
    pub async fn apply_event(&mut self, event: WalletEvent) -> bool {
        let before = self.account();
        match event {
            WalletEvent::AccountsChanged(accounts) => {
                match accounts.into_iter().next() {
                    None => {
                        info!("wallet disconnected");
                        self.state = SessionState::Disconnected;
                    }
                    Some(account) => {
                        let network = match self.wallet.network_id().await {
                            Ok(id) => id,
                            Err(err) => {
                                warn!(%err, "network re-read after account change failed");
                                self.current_network().unwrap_or(self.target)
                            }
                        };
                        self.state = SessionState::Connected { account, network };
                    }
                }
            }
            WalletEvent::ChainChanged(network) => {
                if let SessionState::Connected { account, .. } = self.state {
                    info!(%network, "chain changed");
                    self.state = SessionState::Connected { account, network };
                }
            }
        }
        self.account() != before
    }

    fn current_network(&self) -> Option<NetworkId> {
        match self.state {
            SessionState::Connected { network, .. } => Some(network),
            _ => None,
        }
    }
}

fn classify(err: ChainError) -> AppError {
    match err {
        ChainError::Rejected => AppError::UserRejected,
        other => AppError::ProviderUnavailable(other.to_string()),
    }
}
