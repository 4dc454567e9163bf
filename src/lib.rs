//! Client-side orchestration for a fixed-rate token swap and parity dice
//! game: wallet session tracking, balance caching, allowance gating, and
//! the swap/bet transaction flows, all behind capability traits so the
//! chain itself can be faked in tests.

pub mod amount;
pub mod app;
pub mod approval;
pub mod balances;
pub mod bet;
pub mod chain;
pub mod config;
pub mod error;
pub mod lock;
pub mod outcome;
pub mod session;
pub mod swap;
pub mod test_helpers;

pub use amount::TokenAmount;
pub use app::{App, AppSnapshot, Render};
pub use chain::{Address, NetworkId, Parity};
pub use config::AppConfig;
pub use error::AppError;
