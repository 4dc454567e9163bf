//! Scripted demonstration against the in-memory fakes: connect, preview and
//! run both swap directions, grant a dice allowance, and settle a couple of
//! wagers, printing each emitted snapshot.

use color_eyre::eyre::Result;
use tracing_subscriber::EnvFilter;

use vindice::{
    app::{App, AppSnapshot, Render, SessionView},
    balances,
    chain::Parity,
    config::AppConfig,
    swap::SwapDirection,
    test_helpers::{FakeChain, addr, fake_wallet, tokens},
};

struct StatusRender {
    last: String,
}

impl Render for StatusRender {
    fn render(&mut self, snapshot: &AppSnapshot) {
        if snapshot.status == self.last {
            return;
        }
        self.last = snapshot.status.clone();
        let account = match snapshot.session {
            SessionView::Connected { account, .. } => account.to_string(),
            SessionView::Connecting => String::from("(connecting)"),
            SessionView::Disconnected => String::from("(disconnected)"),
        };
        println!(
            "[{account}] mon={} vin={} | {}",
            balances::display_amount(snapshot.native_balance, 4),
            balances::display_amount(snapshot.token_balance, 4),
            snapshot.status
        );
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    let decimals = config.token_decimals;

    let player = addr(0xaa);
    let chain = FakeChain::new(&config);
    chain.set_native_balance(player, tokens(100, decimals));
    chain.set_min_bet(tokens(1, decimals));
    chain.set_bankroll(tokens(1_000, decimals));
    chain.push_parity(Parity::Even);
    chain.push_parity(Parity::Odd);

    let (wallet, events, _ctl) = fake_wallet(vec![player], config.network_id);
    let view = StatusRender {
        last: String::new(),
    };
    let mut app = App::new(config, wallet, events, chain.clone(), chain, view);

    app.connect().await?;

    app.preview_swap("40");
    app.swap(SwapDirection::NativeToToken, "40").await?;

    app.approve_for_betting("40").await?;
    app.place_bet("10", Parity::Even).await?;

    if let Some(repeat) = app.repeat_bet_input() {
        let raised = app.double_bet_input(&repeat)?;
        app.place_bet(&raised, Parity::Even).await.ok();
    }

    app.swap(SwapDirection::TokenToNative, "5").await?;
    app.disconnect();
    Ok(())
}
