//! Signal-driven strategy backtesting.
//!
//! Replays a dated signal series against historical closes with a single
//! long-only, all-in position and scores the result against a buy-and-hold
//! benchmark.

mod engine;
mod metrics;
mod report;
mod schedule;
mod simulator;
mod strategy;

pub use engine::{
    BacktestCoordinator, BacktestRequest, PriceProvider, ProviderError, SignalSource,
    StaticPriceProvider, StaticSignalSource,
};
pub use metrics::{
    cagr, calmar, daily_returns, historical_var, max_drawdown, MetricsCalculator,
    PerformanceReport, DEFAULT_RISK_FREE_RATE, DEFAULT_VAR_CONFIDENCE, TRADING_DAYS_PER_YEAR,
};
pub use report::{sample_snapshots, BacktestReport};
pub use schedule::{date_schedule, parse_period, simulated_signals, SignalGranularity};
pub use simulator::{
    aligned_closes, DailySnapshot, LedgerState, Position, PositionPhase, PriceSeries,
    SignalSeries, Trade, TradeSide, TradeSimulator,
};
pub use strategy::{
    HistoricalSignal, SignalProvenance, StrategyKind, StrategyPolicy, TradeAction,
    DEFAULT_BUY_THRESHOLD,
};
