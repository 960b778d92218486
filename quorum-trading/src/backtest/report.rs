//! Backtest report generation.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::metrics::PerformanceReport;
use super::simulator::{DailySnapshot, Trade, TradeSide};

/// Result of one backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestReport {
    /// Run identifier
    pub run_id: String,
    pub subject: String,
    pub benchmark: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Human-readable strategy description
    pub strategy: String,
    pub initial_capital: f64,
    pub final_value: f64,
    pub metrics: PerformanceReport,
    pub trades: Vec<Trade>,
    pub snapshots: Vec<DailySnapshot>,
}

impl BacktestReport {
    pub fn total_pnl(&self) -> f64 {
        self.final_value - self.initial_capital
    }

    /// Calendar days covered by the requested range.
    pub fn duration_days(&self) -> i64 {
        (self.end_date - self.start_date).num_days()
    }

    /// Replace the snapshot log with a down-sampled copy.
    pub fn with_sampled_snapshots(mut self, target_points: usize) -> Self {
        self.snapshots = sample_snapshots(&self.snapshots, target_points);
        self
    }

    /// Format as text report
    pub fn to_text(&self) -> String {
        let m = &self.metrics;
        let rule = "───────────────────────────────────────────────────────────────\n";
        let mut report = String::new();

        report.push_str("═══════════════════════════════════════════════════════════════\n");
        report.push_str(&format!(
            "               BACKTEST: {} vs {}\n",
            self.subject, self.benchmark
        ));
        report.push_str("═══════════════════════════════════════════════════════════════\n\n");

        report.push_str(&format!(
            "Period:    {} to {} ({} days)\n",
            self.start_date,
            self.end_date,
            self.duration_days()
        ));
        report.push_str(&format!("Strategy:  {}\n", self.strategy));
        report.push_str(&format!("Run:       {}\n\n", self.run_id));

        report.push_str("Returns\n");
        report.push_str(rule);
        report.push_str(&format!("  Initial capital:   ${:>14.2}\n", self.initial_capital));
        report.push_str(&format!("  Final value:       ${:>14.2}\n", self.final_value));
        report.push_str(&format!("  Total P&L:         ${:>14.2}\n", self.total_pnl()));
        report.push_str(&format!("  Total return:      {:>14.2}%\n", m.total_return_pct));
        report.push_str(&format!("  CAGR:              {:>14.2}%\n", m.cagr));
        report.push_str(&format!("  Benchmark return:  {:>14.2}%\n", m.benchmark_return_pct));
        report.push_str(&format!("  Excess return:     {:>14.2}%\n\n", m.excess_return_pct));

        report.push_str("Risk\n");
        report.push_str(rule);
        report.push_str(&format!("  Sharpe ratio:      {:>14.2}\n", m.sharpe_ratio));
        report.push_str(&format!("  Sortino ratio:     {:>14.2}\n", m.sortino_ratio));
        report.push_str(&format!("  Calmar ratio:      {:>14.2}\n", m.calmar_ratio));
        report.push_str(&format!("  Max drawdown:      {:>14.2}%\n", m.max_drawdown_pct));
        report.push_str(&format!("  Drawdown duration: {:>14}\n", m.max_drawdown_duration));
        report.push_str(&format!("  VaR (1-day):       {:>14.2}%\n", m.var_pct));
        report.push_str(&format!("  Alpha:             {:>14.2}%\n", m.alpha));
        report.push_str(&format!("  Beta:              {:>14.2}\n\n", m.beta));

        report.push_str("Trades\n");
        report.push_str(rule);
        report.push_str(&format!("  Total trades:      {:>14}\n", m.total_trades));
        report.push_str(&format!("  Win rate:          {:>14.2}%\n", m.win_rate));
        report.push_str(&format!("  Profit factor:     {:>14.2}\n", m.profit_factor));
        report.push_str(&format!("  Avg win:           ${:>14.2}\n", m.avg_win));
        report.push_str(&format!("  Avg loss:          ${:>14.2}\n", m.avg_loss));
        report.push_str(&format!("  Risk/reward:       {:>14.2}\n", m.risk_reward_ratio()));
        report.push_str(&format!("  Avg holding days:  {:>14.1}\n\n", m.avg_holding_days));

        let exits: Vec<&Trade> = self.trades.iter().filter(|t| t.is_exit()).collect();
        if !exits.is_empty() {
            report.push_str("Recent exits\n");
            report.push_str(rule);
            for trade in exits.iter().rev().take(10) {
                let pnl = trade.realized_pnl.unwrap_or_default();
                let marker = if pnl > 0.0 { "+" } else { "-" };
                report.push_str(&format!(
                    "  {} {} | {} @ {:.2} | held {}d | P&L: ${:.2}\n",
                    marker,
                    trade.date,
                    side_label(trade.side),
                    trade.price,
                    trade.holding_days.unwrap_or_default(),
                    pnl
                ));
            }
        }

        report.push_str("═══════════════════════════════════════════════════════════════\n");
        report
    }
}

fn side_label(side: TradeSide) -> &'static str {
    match side {
        TradeSide::Buy => "BUY",
        TradeSide::Sell => "SELL",
    }
}

/// Keep the first and last snapshot plus every `max(1, len / target_points)`-th one.
pub fn sample_snapshots(snapshots: &[DailySnapshot], target_points: usize) -> Vec<DailySnapshot> {
    let len = snapshots.len();
    let stride = (len / target_points.max(1)).max(1);

    snapshots
        .iter()
        .enumerate()
        .filter(|(i, _)| *i == 0 || *i == len - 1 || i % stride == 0)
        .map(|(_, s)| s.clone())
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
