#![allow(non_snake_case)]
use vindice::{
    bet::BetFlow,
    chain::Parity,
    error::AppError,
    lock::OpLock,
    session::SessionState,
    test_helpers::{TestContext, addr, tokens},
};

const DECIMALS: u8 = 18;

#[tokio::test]
async fn place_bet__win_pays_double_and_refreshes_balances() {
    let (mut app, ctx) = TestContext::new();
    // given
    ctx.chain.set_token_balance(ctx.alice, tokens(100, DECIMALS));
    ctx.chain.set_min_bet(tokens(1, DECIMALS));
    ctx.chain.set_bankroll(tokens(1_000, DECIMALS));
    ctx.chain
        .set_allowance(ctx.alice, ctx.config.dice_contract, tokens(50, DECIMALS));
    ctx.chain.push_parity(Parity::Even);
    app.connect().await.unwrap();

    // when
    app.place_bet("10", Parity::Even).await.unwrap();

    // then
    let outcome = app.last_outcome().unwrap();
    assert!(outcome.won);
    assert_eq!(outcome.wagered, tokens(10, DECIMALS));
    assert_eq!(outcome.payout, tokens(20, DECIMALS));
    assert_eq!(outcome.result, Parity::Even);
    let snapshot = app.snapshot();
    assert_eq!(snapshot.token_balance, Some(tokens(110, DECIMALS)));
    assert_eq!(snapshot.bankroll, Some(tokens(990, DECIMALS)));
    assert_eq!(
        snapshot.dice_allowance,
        Some(tokens(40, DECIMALS)),
        "wager spends from the allowance"
    );
}

#[tokio::test]
async fn place_bet__loss_forfeits_the_wager() {
    let (mut app, ctx) = TestContext::new();
    // given
    ctx.chain.set_token_balance(ctx.alice, tokens(100, DECIMALS));
    ctx.chain.set_min_bet(tokens(1, DECIMALS));
    ctx.chain.set_bankroll(tokens(1_000, DECIMALS));
    ctx.chain
        .set_allowance(ctx.alice, ctx.config.dice_contract, tokens(50, DECIMALS));
    ctx.chain.push_parity(Parity::Odd);
    app.connect().await.unwrap();

    // when
    app.place_bet("10", Parity::Even).await.unwrap();

    // then
    let outcome = app.last_outcome().unwrap();
    assert!(!outcome.won);
    assert_eq!(outcome.payout, tokens(0, DECIMALS));
    assert_eq!(outcome.result, Parity::Odd);
    let snapshot = app.snapshot();
    assert_eq!(snapshot.token_balance, Some(tokens(90, DECIMALS)));
    assert_eq!(snapshot.bankroll, Some(tokens(1_010, DECIMALS)));
}

#[tokio::test]
async fn place_bet__missing_allowance_blocks_before_any_write() {
    let (mut app, ctx) = TestContext::new();
    // given: funds and limits fine, but no allowance granted
    ctx.chain.set_token_balance(ctx.alice, tokens(100, DECIMALS));
    ctx.chain.set_min_bet(tokens(1, DECIMALS));
    ctx.chain.set_bankroll(tokens(1_000, DECIMALS));
    app.connect().await.unwrap();

    // when
    let err = app.place_bet("10", Parity::Even).await.unwrap_err();

    // then: the flow never approves on its own and never submits
    assert_eq!(
        err,
        AppError::ApprovalRequired {
            spender: ctx.config.dice_contract,
            required: tokens(10, DECIMALS),
        }
    );
    let counts = ctx.chain.counts();
    assert_eq!(counts.approve, 0);
    assert_eq!(counts.place_bet, 0);
    assert_eq!(counts.estimate, 0);
}

#[tokio::test]
async fn place_bet__bankroll_below_double_wager_blocks() {
    let (mut app, ctx) = TestContext::new();
    // given: bankroll cannot cover a 2x payout on this wager
    ctx.chain.set_token_balance(ctx.alice, tokens(100, DECIMALS));
    ctx.chain.set_min_bet(tokens(1, DECIMALS));
    ctx.chain.set_bankroll(tokens(15, DECIMALS));
    ctx.chain
        .set_allowance(ctx.alice, ctx.config.dice_contract, tokens(50, DECIMALS));
    app.connect().await.unwrap();

    // when
    let err = app.place_bet("10", Parity::Even).await.unwrap_err();

    // then
    assert_eq!(
        err,
        AppError::BankrollTooLow {
            bankroll: tokens(15, DECIMALS),
            required: tokens(20, DECIMALS),
        }
    );
    assert_eq!(ctx.chain.counts().place_bet, 0);
}

#[tokio::test]
async fn place_bet__below_minimum_blocks() {
    let (mut app, ctx) = TestContext::new();
    // given
    ctx.chain.set_token_balance(ctx.alice, tokens(100, DECIMALS));
    ctx.chain.set_min_bet(tokens(5, DECIMALS));
    ctx.chain.set_bankroll(tokens(1_000, DECIMALS));
    app.connect().await.unwrap();

    // when
    let err = app.place_bet("2", Parity::Odd).await.unwrap_err();

    // then
    assert_eq!(
        err,
        AppError::BelowMinimum {
            min: tokens(5, DECIMALS)
        }
    );
    assert_eq!(ctx.chain.counts().place_bet, 0);
}

#[tokio::test]
async fn place_bet__insufficient_balance_blocks() {
    let (mut app, ctx) = TestContext::new();
    // given
    ctx.chain.set_token_balance(ctx.alice, tokens(5, DECIMALS));
    ctx.chain.set_min_bet(tokens(1, DECIMALS));
    ctx.chain.set_bankroll(tokens(1_000, DECIMALS));
    app.connect().await.unwrap();

    // when
    let err = app.place_bet("10", Parity::Even).await.unwrap_err();

    // then
    assert_eq!(
        err,
        AppError::InsufficientBalance {
            available: tokens(5, DECIMALS),
            requested: tokens(10, DECIMALS),
        }
    );
    assert_eq!(ctx.chain.counts().place_bet, 0);
}

#[tokio::test]
async fn place_bet__wallet_dismissal_surfaces_as_rejection() {
    let (mut app, ctx) = TestContext::new();
    // given
    ctx.chain.set_token_balance(ctx.alice, tokens(100, DECIMALS));
    ctx.chain.set_min_bet(tokens(1, DECIMALS));
    ctx.chain.set_bankroll(tokens(1_000, DECIMALS));
    ctx.chain
        .set_allowance(ctx.alice, ctx.config.dice_contract, tokens(50, DECIMALS));
    ctx.chain.set_reject_bet(true);
    app.connect().await.unwrap();

    // when
    let err = app.place_bet("10", Parity::Even).await.unwrap_err();

    // then: nothing changed on chain and nothing is stuck pending
    assert_eq!(err, AppError::UserRejected);
    assert_eq!(ctx.chain.token_balance(ctx.alice), tokens(100, DECIMALS));
    assert!(!app.snapshot().pending.bet);
}

#[tokio::test]
async fn place_bet__missing_event_settles_as_undetermined_not_an_error() {
    let (mut app, ctx) = TestContext::new();
    // given: a valid wager whose success receipt carries no settlement event
    ctx.chain.set_token_balance(ctx.alice, tokens(100, DECIMALS));
    ctx.chain.set_min_bet(tokens(1, DECIMALS));
    ctx.chain.set_bankroll(tokens(1_000, DECIMALS));
    ctx.chain
        .set_allowance(ctx.alice, ctx.config.dice_contract, tokens(50, DECIMALS));
    ctx.chain.set_suppress_bet_log(true);
    app.connect().await.unwrap();

    // when
    app.place_bet("10", Parity::Even).await.unwrap();

    // then: no decoded outcome, but the wager stands and balances refresh
    assert!(app.last_outcome().is_none());
    assert!(app.status().contains("undetermined"), "{}", app.status());
    let snapshot = app.snapshot();
    assert_eq!(snapshot.token_balance, Some(tokens(110, DECIMALS)));
    assert_eq!(snapshot.bankroll, Some(tokens(990, DECIMALS)));
    assert_eq!(ctx.chain.counts().place_bet, 1);
}

#[tokio::test]
async fn place_bet__estimate_failure_carries_the_revert_reason() {
    let (mut app, ctx) = TestContext::new();
    // given: every local precondition passes, but the dry run reverts
    ctx.chain.set_token_balance(ctx.alice, tokens(100, DECIMALS));
    ctx.chain.set_min_bet(tokens(1, DECIMALS));
    ctx.chain.set_bankroll(tokens(1_000, DECIMALS));
    ctx.chain
        .set_allowance(ctx.alice, ctx.config.dice_contract, tokens(50, DECIMALS));
    ctx.chain.set_revert_estimate("BANK_NOT_ENOUGH");
    app.connect().await.unwrap();

    // when
    let err = app.place_bet("10", Parity::Even).await.unwrap_err();

    // then: the reason surfaces and nothing was submitted
    assert_eq!(
        err,
        AppError::WouldRevert {
            reason: Some("BANK_NOT_ENOUGH".to_string()),
        }
    );
    let counts = ctx.chain.counts();
    assert_eq!(counts.estimate, 1);
    assert_eq!(counts.place_bet, 0);
    assert_eq!(ctx.chain.token_balance(ctx.alice), tokens(100, DECIMALS));
}

#[tokio::test]
async fn place_bet__account_change_mid_flight_discards_the_result() {
    let (mut app, ctx) = TestContext::new();
    // given: a valid wager, and an account switch already queued when the
    // confirmation lands
    ctx.chain.set_token_balance(ctx.alice, tokens(100, DECIMALS));
    ctx.chain.set_min_bet(tokens(1, DECIMALS));
    ctx.chain.set_bankroll(tokens(1_000, DECIMALS));
    ctx.chain
        .set_allowance(ctx.alice, ctx.config.dice_contract, tokens(50, DECIMALS));
    app.connect().await.unwrap();
    let bob = addr(0xbb);
    ctx.ctl.switch_accounts(vec![bob]);

    // when
    let err = app.place_bet("10", Parity::Even).await.unwrap_err();

    // then: the wager did reach the chain as the original signer, but its
    // result is discarded rather than attributed to the new account
    assert_eq!(err, AppError::NotConnected);
    assert_eq!(ctx.chain.counts().place_bet, 1);
    assert!(app.last_outcome().is_none());
    assert_eq!(app.repeat_bet_input(), None);
    assert_eq!(
        app.session_state(),
        SessionState::Connected {
            account: bob,
            network: ctx.config.network_id,
        }
    );
    assert_eq!(app.snapshot().token_balance, Some(tokens(0, DECIMALS)));
}

#[tokio::test]
async fn place_bet__repeat_and_double_shortcuts_track_the_last_wager() {
    let (mut app, ctx) = TestContext::new();
    // given
    ctx.chain.set_token_balance(ctx.alice, tokens(100, DECIMALS));
    ctx.chain.set_min_bet(tokens(1, DECIMALS));
    ctx.chain.set_bankroll(tokens(1_000, DECIMALS));
    ctx.chain
        .set_allowance(ctx.alice, ctx.config.dice_contract, tokens(50, DECIMALS));
    app.connect().await.unwrap();
    assert_eq!(app.repeat_bet_input(), None);

    // when
    app.place_bet("10", Parity::Even).await.unwrap();

    // then
    assert_eq!(app.repeat_bet_input().as_deref(), Some("10"));
    assert_eq!(app.double_bet_input("10").unwrap(), "20");
    assert_eq!(app.halve_bet_input("10").unwrap(), "5");
}

#[tokio::test]
async fn place_bet__zero_or_garbage_input_fails_validation() {
    let (mut app, ctx) = TestContext::new();
    // given
    ctx.chain.set_token_balance(ctx.alice, tokens(100, DECIMALS));
    app.connect().await.unwrap();

    // when / then
    let err = app.place_bet("0", Parity::Even).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidAmount(_)));
    let err = app.place_bet("ten", Parity::Even).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidAmount(_)));
    assert_eq!(ctx.chain.counts().place_bet, 0);
}

#[tokio::test]
async fn place_bet__second_invocation_is_a_no_op_while_one_is_in_flight() {
    let (_, ctx) = TestContext::new();
    // given: everything in place for a valid wager, but the bet slot is held
    ctx.chain.set_token_balance(ctx.alice, tokens(100, DECIMALS));
    ctx.chain.set_min_bet(tokens(1, DECIMALS));
    ctx.chain.set_bankroll(tokens(1_000, DECIMALS));
    ctx.chain
        .set_allowance(ctx.alice, ctx.config.dice_contract, tokens(50, DECIMALS));
    let lock = OpLock::new();
    let _in_flight = lock.try_acquire().unwrap();
    let flow = BetFlow::new(
        &ctx.chain,
        &ctx.chain,
        ctx.config.dice_contract,
        DECIMALS,
        &lock,
    );

    // when
    let settlement = flow
        .place(ctx.alice, "10", Parity::Even, |_| {})
        .await
        .unwrap();

    // then: dropped, not queued
    assert_eq!(settlement, None);
    let counts = ctx.chain.counts();
    assert_eq!(counts.place_bet, 0);
    assert_eq!(counts.estimate, 0);
}

#[tokio::test]
async fn place_bet__while_disconnected_fails_locally() {
    let (mut app, ctx) = TestContext::new();

    // when: no connect() happened
    let err = app.place_bet("10", Parity::Even).await.unwrap_err();

    // then
    assert_eq!(err, AppError::NotConnected);
    assert_eq!(ctx.chain.counts().place_bet, 0);
}
