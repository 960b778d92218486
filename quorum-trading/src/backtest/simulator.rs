//! Trade simulation over a historical price series.
//!
//! One long-only position at a time, always all-in. Every simulated date
//! produces exactly one [`DailySnapshot`].

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use super::strategy::{HistoricalSignal, StrategyPolicy, TradeAction};
use crate::signal::Signal;

/// Date-keyed close prices.
pub type PriceSeries = BTreeMap<NaiveDate, f64>;

/// Date-keyed signals.
pub type SignalSeries = BTreeMap<NaiveDate, HistoricalSignal>;

// ============================================================================
// Ledger Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeSide {
    Buy,
    Sell,
}

/// The single open position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub quantity: f64,
    /// Entry fill price, slippage included
    pub avg_cost: f64,
    pub entry_date: NaiveDate,
}

impl Position {
    pub fn cost_basis(&self) -> f64 {
        self.quantity * self.avg_cost
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity * price
    }
}

/// One executed fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub date: NaiveDate,
    pub side: TradeSide,
    /// Fill price, slippage included
    pub price: f64,
    pub quantity: f64,
    /// Signal that triggered the fill
    pub signal: Signal,
    pub score: f64,
    /// Set on exits only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realized_pnl: Option<f64>,
    /// Calendar days the closed position was held, set on exits only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub holding_days: Option<i64>,
}

impl Trade {
    pub fn is_exit(&self) -> bool {
        self.side == TradeSide::Sell
    }

    pub fn value(&self) -> f64 {
        self.price * self.quantity
    }
}

/// End-of-day portfolio state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySnapshot {
    pub date: NaiveDate,
    pub portfolio_value: f64,
    pub cash: f64,
    pub position_value: f64,
    /// Buy-and-hold benchmark scaled to the same starting capital
    pub benchmark_value: f64,
    /// Fractional decline from the running peak, always >= 0
    pub drawdown: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionPhase {
    Flat,
    Long,
}

/// Mutable state of one simulation run.
#[derive(Debug, Clone)]
pub struct LedgerState {
    pub cash: f64,
    pub position: Option<Position>,
    pub trades: Vec<Trade>,
    pub snapshots: Vec<DailySnapshot>,
    pub peak_value: f64,
}

impl LedgerState {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            cash: initial_capital,
            position: None,
            trades: Vec::new(),
            snapshots: Vec::new(),
            peak_value: initial_capital,
        }
    }

    pub fn phase(&self) -> PositionPhase {
        if self.position.is_some() {
            PositionPhase::Long
        } else {
            PositionPhase::Flat
        }
    }

    pub fn has_position(&self) -> bool {
        self.position.is_some()
    }

    /// Portfolio value of the last snapshot, or cash before any.
    pub fn total_value(&self) -> f64 {
        self.snapshots
            .last()
            .map(|s| s.portfolio_value)
            .unwrap_or(self.cash)
    }

    /// Spend all cash at `fill_price`. No-op when there is nothing to spend.
    fn enter(&mut self, date: NaiveDate, fill_price: f64, signal: &HistoricalSignal) {
        if self.has_position() || self.cash <= 0.0 || fill_price <= 0.0 {
            return;
        }

        let quantity = self.cash / fill_price;
        self.cash = 0.0;
        self.position = Some(Position {
            quantity,
            avg_cost: fill_price,
            entry_date: date,
        });

        debug!(%date, price = fill_price, quantity, "Entered position");

        self.trades.push(Trade {
            date,
            side: TradeSide::Buy,
            price: fill_price,
            quantity,
            signal: signal.signal,
            score: signal.score,
            realized_pnl: None,
            holding_days: None,
        });
    }

    /// Liquidate the position at `fill_price`. No-op when flat.
    fn exit(&mut self, date: NaiveDate, fill_price: f64, signal: &HistoricalSignal) {
        let Some(position) = self.position.take() else {
            return;
        };

        let quantity = position.quantity;
        let realized_pnl = (fill_price - position.avg_cost) * quantity;
        let holding_days = (date - position.entry_date).num_days();
        self.cash = quantity * fill_price;

        debug!(%date, price = fill_price, quantity, realized_pnl, "Exited position");

        self.trades.push(Trade {
            date,
            side: TradeSide::Sell,
            price: fill_price,
            quantity,
            signal: signal.signal,
            score: signal.score,
            realized_pnl: Some(realized_pnl),
            holding_days: Some(holding_days),
        });
    }

    fn record_snapshot(&mut self, date: NaiveDate, price: f64, benchmark_value: f64) {
        let position_value = self
            .position
            .as_ref()
            .map(|p| p.market_value(price))
            .unwrap_or(0.0);
        let portfolio_value = self.cash + position_value;

        if portfolio_value > self.peak_value {
            self.peak_value = portfolio_value;
        }

        let drawdown = if self.peak_value > 0.0 {
            ((self.peak_value - portfolio_value) / self.peak_value).max(0.0)
        } else {
            0.0
        };

        self.snapshots.push(DailySnapshot {
            date,
            portfolio_value,
            cash: self.cash,
            position_value,
            benchmark_value,
            drawdown,
        });
    }
}

// ============================================================================
// Simulator
// ============================================================================

/// Replays a signal series against prices under one policy.
#[derive(Debug, Clone)]
pub struct TradeSimulator {
    policy: StrategyPolicy,
    initial_capital: f64,
    /// Fractional slippage (0.001 = 0.1%)
    slippage: f64,
}

impl TradeSimulator {
    pub fn new(policy: StrategyPolicy, initial_capital: f64, slippage: f64) -> Self {
        Self {
            policy,
            initial_capital,
            slippage,
        }
    }

    /// Build from a slippage given in percent.
    pub fn with_slippage_pct(
        policy: StrategyPolicy,
        initial_capital: f64,
        slippage_pct: f64,
    ) -> Self {
        Self::new(policy, initial_capital, slippage_pct / 100.0)
    }

    pub fn policy(&self) -> &StrategyPolicy {
        &self.policy
    }

    pub fn initial_capital(&self) -> f64 {
        self.initial_capital
    }

    pub fn slippage(&self) -> f64 {
        self.slippage
    }

    /// Run the simulation over every date present in both price series.
    pub fn run(
        &self,
        prices: &PriceSeries,
        benchmark: &PriceSeries,
        signals: &SignalSeries,
    ) -> LedgerState {
        let mut ledger = LedgerState::new(self.initial_capital);

        let (days, dropped) = aligned_closes(prices, benchmark);
        if dropped > 0 {
            warn!(
                dropped,
                simulated = days.len(),
                "Skipping dates missing from the instrument or benchmark series"
            );
        }

        let Some(&(_, _, first_benchmark)) = days.first() else {
            return ledger;
        };

        let benchmark_shares = if first_benchmark > 0.0 {
            Some(self.initial_capital / first_benchmark)
        } else {
            warn!(
                price = first_benchmark,
                "Non-positive first benchmark price, benchmark held flat"
            );
            None
        };

        for &(date, price, benchmark_price) in &days {
            if let Some(signal) = signals.get(&date) {
                match self.policy.decide(signal, ledger.has_position()) {
                    TradeAction::Enter => ledger.enter(date, price * (1.0 + self.slippage), signal),
                    TradeAction::Exit => ledger.exit(date, price * (1.0 - self.slippage), signal),
                    TradeAction::None => {}
                }
            }

            let benchmark_value = benchmark_shares
                .map(|shares| shares * benchmark_price)
                .unwrap_or(self.initial_capital);
            ledger.record_snapshot(date, price, benchmark_value);
        }

        debug!(
            days = ledger.snapshots.len(),
            trades = ledger.trades.len(),
            final_value = ledger.total_value(),
            "Simulation finished"
        );

        ledger
    }
}

/// `(date, close, benchmark close)` for every date both series share, in
/// date order, plus the count of dates only one side has.
pub fn aligned_closes(
    prices: &PriceSeries,
    benchmark: &PriceSeries,
) -> (Vec<(NaiveDate, f64, f64)>, usize) {
    let days: Vec<(NaiveDate, f64, f64)> = prices
        .iter()
        .filter_map(|(date, price)| benchmark.get(date).map(|b| (*date, *price, *b)))
        .collect();
    let dropped = prices.len() + benchmark.len() - 2 * days.len();
    (days, dropped)
}

// ============================================================================
// Tests
// ============================================================================
