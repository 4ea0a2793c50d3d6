//! End-to-end pipeline scenarios against the in-memory mock services.

use std::sync::Arc;

use deckwatch::engine::dispatcher::TradeDispatcher;
use deckwatch::engine::filter::{MatchFilter, SkipReason};
use deckwatch::engine::ledger::InMemoryLedger;
use deckwatch::engine::pipeline::{MatchOutcome, Pipeline};
use deckwatch::types::*;

use crate::mock_services::*;

const PLAYER_ID: &str = "2YLCP0R8";

struct Harness {
    source: MockSource,
    decoder: MockDecoder,
    trading: MockTrading,
    pipeline: Pipeline,
}

fn harness(
    initial: Vec<Match>,
    trading: MockTrading,
    policy: OutcomePolicy,
    seed: LedgerSeed,
) -> Harness {
    build_harness(initial, trading, policy, seed, false)
}

fn build_harness(
    initial: Vec<Match>,
    trading: MockTrading,
    policy: OutcomePolicy,
    seed: LedgerSeed,
    dry_run: bool,
) -> Harness {
    let source = MockSource::new(initial);
    let decoder = MockDecoder::new(TradeInstruction {
        ticker: "MSFT".into(),
        side: Side::Buy,
        shares: 16,
    });
    let pipeline = Pipeline::new(
        Arc::new(source.clone()),
        Arc::new(decoder.clone()),
        TradeDispatcher::new(Arc::new(trading.clone()), PLAYER_ID, dry_run),
        MatchFilter::new(policy),
        Box::new(InMemoryLedger::new()),
        seed,
    );
    Harness { source, decoder, trading, pipeline }
}

fn wins_harness(initial: Vec<Match>) -> Harness {
    harness(initial, MockTrading::default(), OutcomePolicy::Wins, LedgerSeed::History)
}

#[tokio::test]
async fn new_win_after_seed_is_traded_once() {
    let a = battle("20250301T180000.000Z", 30, &[11, 12, 13, 14, 15, 16, 17, 18]);
    let b = battle("20250301T181000.000Z", -30, &[21, 22, 23, 24, 25, 26, 27, 28]);
    let c = battle("20250301T182000.000Z", 29, &[1, 2, 3, 4, 5, 6, 7, 8]);

    let mut h = wins_harness(vec![b.clone(), a.clone()]);
    assert_eq!(h.pipeline.seed().await.unwrap(), 2);

    h.source.set_battles(vec![c, b, a]);
    let report = h.pipeline.run_iteration().await.unwrap();
    assert_eq!(report.forwarded(), 1);

    assert_eq!(h.decoder.calls(), vec![vec![1, 2, 3, 4, 5, 6, 7, 8]]);
    assert_eq!(h.trading.create_calls(), 1);
    let trades = h.trading.trades();
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].player_id, PLAYER_ID);
    assert_eq!(trades[0].symbol, "MSFT");
    assert_eq!(trades[0].side, "buy");
    assert_eq!(trades[0].quantity, 16);
    assert!((0..86_400).contains(&trades[0].t));

    // Further ticks see the same log and do nothing.
    for _ in 0..3 {
        h.pipeline.run_iteration().await.unwrap();
    }
    assert_eq!(h.decoder.calls().len(), 1);
    assert_eq!(h.trading.trades().len(), 1);
}

#[tokio::test]
async fn seeded_history_never_traded() {
    let history = vec![
        battle("20250301T180000.000Z", 30, &[1]),
        battle("20250301T181000.000Z", 30, &[2]),
    ];
    let mut h = wins_harness(history);
    h.pipeline.seed().await.unwrap();

    for _ in 0..5 {
        h.pipeline.run_iteration().await.unwrap();
    }
    assert!(h.decoder.calls().is_empty());
    assert!(h.trading.trades().is_empty());
}

#[tokio::test]
async fn empty_seed_mode_trades_visible_history() {
    let history = vec![
        battle("20250301T180000.000Z", 30, &[1]),
        battle("20250301T181000.000Z", -30, &[2]),
        battle("20250301T182000.000Z", 30, &[3]),
    ];
    let mut h = harness(
        history,
        MockTrading::default(),
        OutcomePolicy::Wins,
        LedgerSeed::Empty,
    );
    h.pipeline.seed().await.unwrap();
    assert_eq!(h.source.fetch_count(), 0);

    let report = h.pipeline.run_iteration().await.unwrap();
    assert_eq!(report.forwarded(), 2);
    assert_eq!(h.decoder.calls(), vec![vec![1], vec![3]]);
}

#[tokio::test]
async fn loss_policy_trades_losses_only() {
    let mut h = harness(
        vec![],
        MockTrading::default(),
        OutcomePolicy::Losses,
        LedgerSeed::History,
    );
    h.pipeline.seed().await.unwrap();

    h.source.set_battles(vec![
        battle("20250301T180000.000Z", 30, &[1]),
        battle("20250301T181000.000Z", -30, &[2]),
        battle("20250301T182000.000Z", 0, &[3]),
    ]);
    h.pipeline.run_iteration().await.unwrap();
    assert_eq!(h.decoder.calls(), vec![vec![2], vec![3]]);
}

#[tokio::test]
async fn same_identity_with_other_differences_is_duplicate() {
    let mut h = wins_harness(vec![]);
    h.pipeline.seed().await.unwrap();

    let original = battle("20250301T180000.000Z", 30, &[1, 2]);
    h.source.set_battles(vec![original.clone()]);
    h.pipeline.run_iteration().await.unwrap();

    let mut variant = original;
    variant.kind = "pathOfLegend".into();
    variant.team[0].trophy_change = 31;
    variant.team[0].cards.reverse();
    variant.opponent[0].name = "renamed".into();
    h.source.set_battles(vec![variant]);
    let report = h.pipeline.run_iteration().await.unwrap();

    assert!(matches!(report.outcomes[0], MatchOutcome::Skipped(SkipReason::AlreadySeen)));
    assert_eq!(h.decoder.calls().len(), 1);
}

#[tokio::test]
async fn decode_failure_is_isolated_and_not_retried() {
    let mut h = wins_harness(vec![]);
    h.pipeline.seed().await.unwrap();
    h.decoder.fail_on_first_card(99);

    h.source.set_battles(vec![
        battle("20250301T180000.000Z", 30, &[99, 1]),
        battle("20250301T181000.000Z", 30, &[2, 3]),
    ]);
    let report = h.pipeline.run_iteration().await.unwrap();
    assert_eq!(report.decode_failures(), 1);
    assert_eq!(report.forwarded(), 1);
    assert_eq!(h.trading.trades().len(), 1);

    h.pipeline.run_iteration().await.unwrap();
    assert_eq!(h.decoder.calls().len(), 2);
    assert_eq!(h.pipeline.stats().decode_failures, 1);
}

#[tokio::test]
async fn dispatch_failure_is_isolated_and_not_retried() {
    let trading = MockTrading::with_player(PLAYER_ID);
    let mut h = harness(vec![], trading, OutcomePolicy::Wins, LedgerSeed::History);
    h.pipeline.seed().await.unwrap();
    h.trading.fail_next_trades(1);

    h.source.set_battles(vec![
        battle("20250301T180000.000Z", 30, &[1]),
        battle("20250301T181000.000Z", 30, &[2]),
    ]);
    let report = h.pipeline.run_iteration().await.unwrap();
    assert!(matches!(report.outcomes[0], MatchOutcome::DispatchFailed { .. }));
    assert!(report.outcomes[1].is_forwarded());

    h.pipeline.run_iteration().await.unwrap();
    assert_eq!(h.trading.trades().len(), 1);
    assert_eq!(h.pipeline.stats().dispatch_failures, 1);
}

#[tokio::test]
async fn existing_account_does_not_block_trade() {
    let trading = MockTrading::with_player(PLAYER_ID);
    let mut h = harness(vec![], trading, OutcomePolicy::Wins, LedgerSeed::History);
    h.pipeline.seed().await.unwrap();

    h.source.set_battles(vec![battle("20250301T180000.000Z", 30, &[1])]);
    let report = h.pipeline.run_iteration().await.unwrap();

    match &report.outcomes[0] {
        MatchOutcome::Forwarded { receipt, .. } => {
            assert_eq!(receipt.account, AccountStatus::AlreadyExists);
        }
        other => panic!("expected a forward, got {other:?}"),
    }
    assert_eq!(h.trading.trades().len(), 1);
}

#[tokio::test]
async fn failed_account_call_still_submits_trade() {
    let trading = MockTrading::with_player(PLAYER_ID);
    trading.set_create_failure(true);
    let mut h = harness(vec![], trading, OutcomePolicy::Wins, LedgerSeed::History);
    h.pipeline.seed().await.unwrap();

    h.source.set_battles(vec![battle("20250301T180000.000Z", 30, &[1])]);
    let report = h.pipeline.run_iteration().await.unwrap();
    assert_eq!(report.forwarded(), 1);
    assert_eq!(h.trading.trades().len(), 1);
}

#[tokio::test]
async fn duo_battles_always_skipped_and_never_recorded() {
    let mut h = wins_harness(vec![]);
    h.pipeline.seed().await.unwrap();

    h.source.set_battles(vec![
        duo_battle("20250301T180000.000Z", 30),
        duo_battle("20250301T181000.000Z", -30),
    ]);
    for _ in 0..3 {
        let report = h.pipeline.run_iteration().await.unwrap();
        assert!(report
            .outcomes
            .iter()
            .all(|o| matches!(o, MatchOutcome::Skipped(SkipReason::TeamMode))));
    }
    assert_eq!(h.pipeline.ledger_len(), 0);
    assert!(h.decoder.calls().is_empty());
}

#[tokio::test]
async fn malformed_team_is_anomaly_and_never_recorded() {
    let mut h = wins_harness(vec![]);
    h.pipeline.seed().await.unwrap();

    let mut odd = battle("20250301T180000.000Z", 30, &[1]);
    odd.team.clear();
    let good = battle("20250301T181000.000Z", 30, &[2]);
    h.source.set_battles(vec![odd, good]);

    let report = h.pipeline.run_iteration().await.unwrap();
    assert_eq!(report.anomalies(), 1);
    assert_eq!(report.forwarded(), 1);
    assert_eq!(h.pipeline.ledger_len(), 1);
}

#[tokio::test]
async fn fetch_error_skips_tick_without_losing_battles() {
    let mut h = wins_harness(vec![]);
    h.pipeline.seed().await.unwrap();

    h.source.set_battles(vec![battle("20250301T180000.000Z", 30, &[1])]);
    h.source.set_error("connection reset by peer");
    let err = h.pipeline.run_iteration().await.unwrap_err();
    assert!(matches!(err, PipelineError::Fetch(_)));
    assert_eq!(h.pipeline.ledger_len(), 0);

    h.source.clear_error();
    let report = h.pipeline.run_iteration().await.unwrap();
    assert_eq!(report.forwarded(), 1);
}

#[tokio::test]
async fn failed_seed_does_not_treat_history_as_new() {
    let mut h = wins_harness(vec![battle("20250301T180000.000Z", 30, &[1])]);
    h.source.set_error("timeout");
    assert!(h.pipeline.seed().await.is_err());

    h.source.clear_error();
    let report = h.pipeline.run_iteration().await.unwrap();
    assert_eq!(report.seeded, Some(1));

    h.pipeline.run_iteration().await.unwrap();
    assert!(h.decoder.calls().is_empty());
}

#[tokio::test]
async fn batch_order_is_preserved() {
    let mut h = wins_harness(vec![]);
    h.pipeline.seed().await.unwrap();

    h.source.set_battles(vec![
        battle("20250301T183000.000Z", 30, &[3]),
        battle("20250301T182000.000Z", 30, &[2]),
        battle("20250301T181000.000Z", 30, &[1]),
    ]);
    h.pipeline.run_iteration().await.unwrap();
    assert_eq!(h.decoder.calls(), vec![vec![3], vec![2], vec![1]]);
}

#[tokio::test]
async fn dry_run_decodes_but_never_calls_trading() {
    let mut h = build_harness(
        vec![],
        MockTrading::default(),
        OutcomePolicy::Wins,
        LedgerSeed::History,
        true,
    );
    h.pipeline.seed().await.unwrap();

    h.source.set_battles(vec![battle("20250301T180000.000Z", 30, &[1, 2, 3])]);
    let report = h.pipeline.run_iteration().await.unwrap();

    match &report.outcomes[0] {
        MatchOutcome::Forwarded { receipt, .. } => {
            assert!(receipt.dry_run);
            assert!(receipt.order_id.starts_with("dry-run-"));
            assert_eq!(receipt.request.symbol, "MSFT");
            assert_eq!(receipt.request.quantity, 16);
        }
        other => panic!("expected a forward, got {other:?}"),
    }
    assert_eq!(h.decoder.calls(), vec![vec![1, 2, 3]]);
    assert_eq!(h.trading.create_calls(), 0);
    assert!(h.trading.trades().is_empty());

    // Still deduplicated like a live run.
    h.pipeline.run_iteration().await.unwrap();
    assert_eq!(h.decoder.calls().len(), 1);
}
