//! Backtest performance metrics.
//!
//! All ratios are computed from daily simple returns of the snapshot log.
//! Percent-valued fields are already multiplied by 100. Every statistic
//! with an undefined denominator or too few samples falls back to a
//! neutral value instead of failing.

use quorum_common::BacktestSettings;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use super::simulator::{DailySnapshot, Trade, TradeSide};

/// Annualisation factor.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Annual risk-free rate used when none is configured.
pub const DEFAULT_RISK_FREE_RATE: f64 = 0.04;

/// Historical VaR confidence used when none is configured.
pub const DEFAULT_VAR_CONFIDENCE: f64 = 0.95;

/// Minimum daily returns for VaR and alpha/beta.
const MIN_RISK_SAMPLES: usize = 10;

/// Risk/return summary of one backtest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    /// Final value minus initial capital
    pub total_return: f64,
    /// Total return (percentage)
    pub total_return_pct: f64,
    /// Compound annual growth rate (percentage)
    pub cagr: f64,
    /// Benchmark total return (percentage)
    pub benchmark_return_pct: f64,
    /// Strategy minus benchmark return (percentage points)
    pub excess_return_pct: f64,
    /// Annualised Jensen's alpha (percentage)
    pub alpha: f64,
    pub beta: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub calmar_ratio: f64,
    /// Maximum drawdown (percentage)
    pub max_drawdown_pct: f64,
    /// Longest run of snapshots spent below the running peak
    pub max_drawdown_duration: usize,
    /// Historical one-day VaR as a positive percentage
    pub var_pct: f64,
    /// Every fill, entries and exits
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    /// Winning exits / exits (percentage)
    pub win_rate: f64,
    /// Gross profit / gross loss
    pub profit_factor: f64,
    pub avg_holding_days: f64,
    pub avg_win: f64,
    /// Mean loss as a positive amount
    pub avg_loss: f64,
}

impl PerformanceReport {
    /// Report for a run with no snapshots.
    pub fn empty() -> Self {
        Self {
            total_return: 0.0,
            total_return_pct: 0.0,
            cagr: 0.0,
            benchmark_return_pct: 0.0,
            excess_return_pct: 0.0,
            alpha: 0.0,
            beta: 1.0,
            sharpe_ratio: 0.0,
            sortino_ratio: 0.0,
            calmar_ratio: 0.0,
            max_drawdown_pct: 0.0,
            max_drawdown_duration: 0,
            var_pct: 0.0,
            total_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            win_rate: 0.0,
            profit_factor: 0.0,
            avg_holding_days: 0.0,
            avg_win: 0.0,
            avg_loss: 0.0,
        }
    }

    /// |avg_win / avg_loss|, 0 without losses.
    pub fn risk_reward_ratio(&self) -> f64 {
        if self.avg_loss == 0.0 {
            0.0
        } else {
            (self.avg_win / self.avg_loss).abs()
        }
    }
}

/// Win/loss figures derived from the trade log.
#[derive(Debug, Clone, Default, PartialEq)]
struct TradeStats {
    winning_trades: usize,
    losing_trades: usize,
    win_rate: f64,
    profit_factor: f64,
    avg_holding_days: f64,
    avg_win: f64,
    avg_loss: f64,
}

/// Computes a [`PerformanceReport`] from a simulation's output.
#[derive(Debug, Clone)]
pub struct MetricsCalculator {
    /// Annual risk-free rate as a fraction
    risk_free_rate: f64,
    var_confidence: f64,
}

impl Default for MetricsCalculator {
    fn default() -> Self {
        Self::new(DEFAULT_RISK_FREE_RATE, DEFAULT_VAR_CONFIDENCE)
    }
}

impl MetricsCalculator {
    pub fn new(risk_free_rate: f64, var_confidence: f64) -> Self {
        Self {
            risk_free_rate,
            var_confidence,
        }
    }

    pub fn from_settings(settings: &BacktestSettings) -> Self {
        Self::new(settings.risk_free_rate, settings.var_confidence)
    }

    fn daily_risk_free(&self) -> f64 {
        self.risk_free_rate / TRADING_DAYS_PER_YEAR
    }

    /// Calculate the full report.
    ///
    /// Pass the full daily snapshot log. CAGR takes its period from the
    /// snapshot count, the return-based ratios (Sharpe, Sortino, VaR,
    /// alpha/beta) use the returns between adjacent snapshots, and drawdown
    /// duration counts observations, so all of them change on a
    /// down-sampled log. Sample for output only after calculating.
    pub fn calculate(
        &self,
        initial_capital: f64,
        snapshots: &[DailySnapshot],
        trades: &[Trade],
    ) -> PerformanceReport {
        let Some(last) = snapshots.last() else {
            return PerformanceReport::empty();
        };

        let portfolio: Vec<f64> = snapshots.iter().map(|s| s.portfolio_value).collect();
        let benchmark: Vec<f64> = snapshots.iter().map(|s| s.benchmark_value).collect();
        let portfolio_returns = daily_returns(&portfolio);
        let benchmark_returns = daily_returns(&benchmark);

        let final_value = last.portfolio_value;
        let total_return = final_value - initial_capital;
        let (total_return_pct, benchmark_return_pct) = if initial_capital > 0.0 {
            (
                total_return / initial_capital * 100.0,
                (last.benchmark_value - initial_capital) / initial_capital * 100.0,
            )
        } else {
            (0.0, 0.0)
        };

        let years = snapshots.len() as f64 / TRADING_DAYS_PER_YEAR;
        let cagr = cagr(initial_capital, final_value, years);
        let (alpha, beta) = self.alpha_beta(&portfolio_returns, &benchmark_returns);
        let (max_drawdown, max_drawdown_duration) = max_drawdown(snapshots);
        let max_drawdown_pct = max_drawdown * 100.0;
        let stats = trade_stats(trades);

        PerformanceReport {
            total_return,
            total_return_pct,
            cagr,
            benchmark_return_pct,
            excess_return_pct: total_return_pct - benchmark_return_pct,
            alpha,
            beta,
            sharpe_ratio: self.sharpe(&portfolio_returns),
            sortino_ratio: self.sortino(&portfolio_returns),
            calmar_ratio: calmar(cagr, max_drawdown_pct),
            max_drawdown_pct,
            max_drawdown_duration,
            var_pct: historical_var(&portfolio_returns, self.var_confidence),
            total_trades: trades.len(),
            winning_trades: stats.winning_trades,
            losing_trades: stats.losing_trades,
            win_rate: stats.win_rate,
            profit_factor: stats.profit_factor,
            avg_holding_days: stats.avg_holding_days,
            avg_win: stats.avg_win,
            avg_loss: stats.avg_loss,
        }
    }

    /// Annualised Sharpe ratio; 0 below two returns or with zero volatility.
    pub fn sharpe(&self, returns: &[f64]) -> f64 {
        if returns.len() < 2 {
            return 0.0;
        }
        let std_dev = returns.iter().std_dev();
        if std_dev <= 0.0 || std_dev.is_nan() {
            return 0.0;
        }
        let excess = returns.iter().mean() - self.daily_risk_free();
        excess / std_dev * TRADING_DAYS_PER_YEAR.sqrt()
    }

    /// Annualised Sortino ratio over returns below the daily risk-free rate.
    pub fn sortino(&self, returns: &[f64]) -> f64 {
        if returns.len() < 2 {
            return 0.0;
        }
        let daily_rf = self.daily_risk_free();
        let downside: Vec<f64> = returns.iter().copied().filter(|r| *r < daily_rf).collect();
        if downside.len() < 2 {
            return 0.0;
        }
        let downside_dev = downside.iter().std_dev();
        if downside_dev <= 0.0 || downside_dev.is_nan() {
            return 0.0;
        }
        let excess = returns.iter().mean() - daily_rf;
        excess / downside_dev * TRADING_DAYS_PER_YEAR.sqrt()
    }

    /// Single-factor regression of excess returns; `(alpha %, beta)`.
    pub fn alpha_beta(&self, portfolio: &[f64], benchmark: &[f64]) -> (f64, f64) {
        if portfolio.len() < MIN_RISK_SAMPLES || benchmark.len() < MIN_RISK_SAMPLES {
            return (0.0, 1.0);
        }

        let n = portfolio.len().min(benchmark.len());
        let p = &portfolio[..n];
        let b = &benchmark[..n];

        let variance_b = b.iter().variance();
        if variance_b <= 0.0 || variance_b.is_nan() {
            return (0.0, 1.0);
        }

        let beta = p.iter().covariance(b.iter()) / variance_b;
        let daily_rf = self.daily_risk_free();
        let alpha = (p.iter().mean() - daily_rf) - beta * (b.iter().mean() - daily_rf);

        (alpha * TRADING_DAYS_PER_YEAR * 100.0, beta)
    }
}

/// Simple percentage change, skipping steps from a zero value.
pub fn daily_returns(values: &[f64]) -> Vec<f64> {
    values
        .windows(2)
        .filter(|w| w[0] != 0.0)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect()
}

/// CAGR in percent; 0 for non-positive capital or period.
pub fn cagr(initial: f64, final_value: f64, years: f64) -> f64 {
    if initial <= 0.0 || years <= 0.0 {
        return 0.0;
    }
    let growth = (final_value / initial).powf(1.0 / years) - 1.0;
    if growth.is_finite() {
        growth * 100.0
    } else {
        0.0
    }
}

/// `(max drawdown fraction, longest positive-drawdown run)`.
pub fn max_drawdown(snapshots: &[DailySnapshot]) -> (f64, usize) {
    let mut max_dd = 0.0_f64;
    let mut longest = 0;
    let mut current = 0;

    for snapshot in snapshots {
        max_dd = max_dd.max(snapshot.drawdown);
        if snapshot.drawdown > 0.0 {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }

    (max_dd, longest)
}

/// |CAGR / max drawdown|, both in percent; 0 without drawdown.
pub fn calmar(cagr: f64, max_drawdown_pct: f64) -> f64 {
    if max_drawdown_pct == 0.0 {
        0.0
    } else {
        (cagr / max_drawdown_pct).abs()
    }
}

/// Historical VaR as a positive percentage; 0 below ten returns.
pub fn historical_var(returns: &[f64], confidence: f64) -> f64 {
    if returns.len() < MIN_RISK_SAMPLES {
        return 0.0;
    }
    let mut sorted = returns.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let index = (((1.0 - confidence) * sorted.len() as f64).floor() as usize).min(sorted.len() - 1);
    sorted[index].abs() * 100.0
}

fn trade_stats(trades: &[Trade]) -> TradeStats {
    let realized: Vec<f64> = trades
        .iter()
        .filter(|t| t.side == TradeSide::Sell)
        .filter_map(|t| t.realized_pnl)
        .collect();

    if realized.is_empty() {
        return TradeStats::default();
    }

    let wins: Vec<f64> = realized.iter().copied().filter(|p| *p > 0.0).collect();
    let losses: Vec<f64> = realized.iter().copied().filter(|p| *p < 0.0).collect();

    let gross_profit: f64 = wins.iter().sum();
    let gross_loss: f64 = losses.iter().sum::<f64>().abs();

    let profit_factor = if gross_loss > 0.0 {
        gross_profit / gross_loss
    } else {
        0.0
    };

    TradeStats {
        winning_trades: wins.len(),
        losing_trades: losses.len(),
        win_rate: wins.len() as f64 / realized.len() as f64 * 100.0,
        profit_factor,
        avg_holding_days: paired_holding_days(trades),
        avg_win: if wins.is_empty() { 0.0 } else { gross_profit / wins.len() as f64 },
        avg_loss: if losses.is_empty() { 0.0 } else { gross_loss / losses.len() as f64 },
    }
}

/// Mean days between the i-th buy and the i-th sell.
fn paired_holding_days(trades: &[Trade]) -> f64 {
    let buys = trades.iter().filter(|t| t.side == TradeSide::Buy);
    let sells = trades.iter().filter(|t| t.side == TradeSide::Sell);

    let days: Vec<f64> = sells
        .zip(buys)
        .map(|(sell, buy)| (sell.date - buy.date).num_days() as f64)
        .collect();

    if days.is_empty() {
        0.0
    } else {
        days.iter().sum::<f64>() / days.len() as f64
    }
}

// ============================================================================
// Tests
// ============================================================================
