//! Property tests for consensus aggregation and trade simulation.
//!
//! Checks the invariants that must hold for any input, not just the
//! hand-picked cases in the unit tests.

use chrono::NaiveDate;
use proptest::prelude::*;

use quorum_common::ConsensusThresholds;
use quorum_trading::backtest::{
    cagr, HistoricalSignal, MetricsCalculator, PriceSeries, SignalProvenance, SignalSeries,
    StrategyPolicy, TradeSide, TradeSimulator,
};
use quorum_trading::consensus::{Opinion, SignalAggregator, DISSENT_THRESHOLD};
use quorum_trading::signal::{Confidence, Signal};

// ============================================================================
// Strategies
// ============================================================================

fn any_signal() -> impl Strategy<Value = Signal> {
    prop::sample::select(Signal::ALL.to_vec())
}

fn any_confidence() -> impl Strategy<Value = Confidence> {
    prop::sample::select(Confidence::ALL.to_vec())
}

fn any_opinion() -> impl Strategy<Value = Opinion> {
    (0usize..6, any_signal(), any_confidence(), prop::collection::vec("[a-c]", 0..3))
        .prop_map(|(agent, signal, confidence, factors)| {
            Opinion::new(format!("agent_{}", agent), signal, confidence).with_factors(factors)
        })
}

fn any_weight() -> impl Strategy<Value = f64> {
    0.1f64..5.0
}

fn day(offset: usize) -> NaiveDate {
    NaiveDate::from_ymd_opt(2022, 1, 3).unwrap() + chrono::Duration::days(offset as i64)
}

/// Prices with an optional signal on each day.
fn any_market() -> impl Strategy<Value = Vec<(f64, f64, Option<Signal>)>> {
    prop::collection::vec(
        (1.0f64..500.0, 1.0f64..500.0, prop::option::of(any_signal())),
        1..120,
    )
}

fn build_series(market: &[(f64, f64, Option<Signal>)]) -> (PriceSeries, PriceSeries, SignalSeries) {
    let mut prices = PriceSeries::new();
    let mut benchmark = PriceSeries::new();
    let mut signals = SignalSeries::new();

    for (i, (price, bench, signal)) in market.iter().enumerate() {
        prices.insert(day(i), *price);
        benchmark.insert(day(i), *bench);
        if let Some(signal) = signal {
            signals.insert(
                day(i),
                HistoricalSignal::new(
                    day(i),
                    *signal,
                    signal.score() as f64,
                    0.7,
                    SignalProvenance::Simulated,
                ),
            );
        }
    }

    (prices, benchmark, signals)
}

// ============================================================================
// Consensus Properties
// ============================================================================

proptest! {
    #[test]
    fn test_vote_tally_sums_to_opinion_count(
        opinions in prop::collection::vec(any_opinion(), 1..30),
        weight in any_weight(),
    ) {
        let outcome = SignalAggregator::default()
            .aggregate("PROP", &opinions, |_| weight)
            .unwrap();

        prop_assert_eq!(outcome.votes.total(), opinions.len());
        prop_assert_eq!(outcome.opinion_count, opinions.len());
    }

    #[test]
    fn test_weighted_score_within_bounds(
        opinions in prop::collection::vec(any_opinion(), 1..30),
        weights in prop::collection::vec(any_weight(), 6),
    ) {
        let outcome = SignalAggregator::default()
            .aggregate("PROP", &opinions, |id| {
                let idx: usize = id.trim_start_matches("agent_").parse().unwrap_or(0);
                weights[idx]
            })
            .unwrap();

        prop_assert!(outcome.weighted_score >= -100.0);
        prop_assert!(outcome.weighted_score <= 100.0);
    }

    #[test]
    fn test_final_signal_matches_thresholds(
        opinions in prop::collection::vec(any_opinion(), 1..30),
    ) {
        let aggregator = SignalAggregator::new(ConsensusThresholds::default());
        let outcome = aggregator.aggregate("PROP", &opinions, |_| 1.0).unwrap();

        prop_assert_eq!(outcome.final_signal, aggregator.score_to_signal(outcome.weighted_score));
    }

    #[test]
    fn test_dissenters_are_far_from_consensus(
        opinions in prop::collection::vec(any_opinion(), 1..30),
    ) {
        let outcome = SignalAggregator::default()
            .aggregate("PROP", &opinions, |_| 1.0)
            .unwrap();
        let reference = outcome.final_signal.score();

        let expected: Vec<String> = opinions
            .iter()
            .filter(|o| (o.signal.score() - reference).abs() > DISSENT_THRESHOLD)
            .map(|o| o.agent_id.clone())
            .collect();

        prop_assert_eq!(&outcome.dissenters, &expected);
        prop_assert!(outcome.agreement_ratio() >= 0.0 && outcome.agreement_ratio() <= 1.0);
        prop_assert!(outcome.key_themes.len() <= 5);
    }

    #[test]
    fn test_unanimous_opinions_never_dissent(
        signal in any_signal(),
        confidence in any_confidence(),
        n in 1usize..20,
    ) {
        let opinions: Vec<Opinion> = (0..n)
            .map(|i| Opinion::new(format!("agent_{}", i), signal, confidence))
            .collect();

        let outcome = SignalAggregator::default()
            .aggregate("PROP", &opinions, |_| 1.0)
            .unwrap();

        prop_assert_eq!(outcome.final_signal, signal);
        prop_assert!(outcome.dissenters.is_empty());
    }
}

// ============================================================================
// Simulation Properties
// ============================================================================

proptest! {
    #[test]
    fn test_simulation_ledger_invariants(
        market in any_market(),
        slippage_pct in 0.0f64..2.0,
        use_threshold in any::<bool>(),
    ) {
        let (prices, benchmark, signals) = build_series(&market);
        let policy = if use_threshold {
            StrategyPolicy::score_threshold(50.0, None)
        } else {
            StrategyPolicy::SignalDirection
        };

        let ledger = TradeSimulator::with_slippage_pct(policy, 10_000.0, slippage_pct)
            .run(&prices, &benchmark, &signals);

        prop_assert_eq!(ledger.snapshots.len(), market.len());
        prop_assert!(ledger.cash >= 0.0);
        if let Some(position) = &ledger.position {
            prop_assert!(position.quantity > 0.0);
        }

        for snapshot in &ledger.snapshots {
            prop_assert!(snapshot.drawdown >= 0.0);
            prop_assert!(snapshot.cash >= 0.0);
            prop_assert!(snapshot.position_value >= 0.0);
        }

        // Single position: fills strictly alternate, starting with a buy
        for (i, trade) in ledger.trades.iter().enumerate() {
            let expected = if i % 2 == 0 { TradeSide::Buy } else { TradeSide::Sell };
            prop_assert_eq!(trade.side, expected);
            prop_assert_eq!(trade.realized_pnl.is_some(), trade.side == TradeSide::Sell);
        }
    }

    #[test]
    fn test_drawdown_zero_at_new_peak(market in any_market()) {
        let (prices, benchmark, signals) = build_series(&market);
        let ledger = TradeSimulator::new(StrategyPolicy::SignalDirection, 10_000.0, 0.0)
            .run(&prices, &benchmark, &signals);

        let mut peak = 10_000.0_f64;
        for snapshot in &ledger.snapshots {
            if snapshot.portfolio_value >= peak {
                prop_assert_eq!(snapshot.drawdown, 0.0);
            }
            peak = peak.max(snapshot.portfolio_value);
        }
    }

    #[test]
    fn test_metrics_never_fail(market in any_market()) {
        let (prices, benchmark, signals) = build_series(&market);
        let ledger = TradeSimulator::new(StrategyPolicy::SignalDirection, 10_000.0, 0.001)
            .run(&prices, &benchmark, &signals);

        let report =
            MetricsCalculator::default().calculate(10_000.0, &ledger.snapshots, &ledger.trades);

        prop_assert!(report.max_drawdown_pct >= 0.0);
        prop_assert!(report.var_pct >= 0.0);
        prop_assert!(report.win_rate >= 0.0 && report.win_rate <= 100.0);
        prop_assert!(report.sharpe_ratio.is_finite());
        prop_assert!(report.beta.is_finite());
        prop_assert_eq!(report.total_trades, ledger.trades.len());
    }

    #[test]
    fn test_cagr_flat_is_zero(capital in 1.0f64..1e7, days in 1usize..2000) {
        prop_assert_eq!(cagr(capital, capital, days as f64 / 252.0), 0.0);
    }
}
