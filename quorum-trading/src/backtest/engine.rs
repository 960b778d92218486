//! Backtest coordination.
//!
//! Pulls prices and recorded signals from external collaborators, then runs
//! the simulator and metrics. All I/O happens before the simulation starts.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use quorum_common::logging::generate_run_id;
use quorum_common::{BacktestSettings, Error};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use super::metrics::MetricsCalculator;
use super::report::BacktestReport;
use super::schedule::{parse_period, simulated_signals};
use super::simulator::{PriceSeries, SignalSeries, TradeSimulator};
use super::strategy::{HistoricalSignal, StrategyPolicy};

/// Look-back used when a request names neither dates nor a period.
const DEFAULT_PERIOD: &str = "1y";

// ============================================================================
// Provider Error
// ============================================================================

/// Errors reported by price and signal providers.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    /// Network error (connection failed, timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// Data not available for the requested symbol or range
    #[error("Data not available: {0}")]
    DataNotAvailable(String),

    /// Provider is temporarily unavailable
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    /// Invalid request parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ProviderError {
    /// Check if the error is recoverable (worth retrying)
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Unavailable(_))
    }
}

// ============================================================================
// Provider Traits
// ============================================================================

/// Source of daily close prices.
#[async_trait]
pub trait PriceProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Daily closes for `symbol` between `start` and `end` inclusive.
    async fn daily_closes(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, ProviderError>;
}

/// Source of previously recorded consensus signals.
#[async_trait]
pub trait SignalSource: Send + Sync {
    /// Recorded signals for `subject` in the range, optionally restricted to
    /// the listed agents.
    async fn recorded_signals(
        &self,
        subject: &str,
        start: NaiveDate,
        end: NaiveDate,
        agent_filter: Option<&[String]>,
    ) -> Result<Vec<HistoricalSignal>, ProviderError>;
}

// ============================================================================
// In-memory Providers
// ============================================================================

/// Price provider over pre-loaded series, keyed by upper-case symbol.
#[derive(Debug, Clone, Default)]
pub struct StaticPriceProvider {
    series: HashMap<String, PriceSeries>,
}

impl StaticPriceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_series(mut self, symbol: &str, series: PriceSeries) -> Self {
        self.series.insert(symbol.trim().to_uppercase(), series);
        self
    }
}

#[async_trait]
impl PriceProvider for StaticPriceProvider {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn daily_closes(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, ProviderError> {
        let series = self
            .series
            .get(&symbol.trim().to_uppercase())
            .ok_or_else(|| {
                ProviderError::DataNotAvailable(format!("no prices loaded for {}", symbol))
            })?;

        Ok(series
            .range(start..=end)
            .map(|(date, price)| (*date, *price))
            .collect())
    }
}

/// Signal source over a fixed list.
#[derive(Debug, Clone, Default)]
pub struct StaticSignalSource {
    signals: Vec<HistoricalSignal>,
}

impl StaticSignalSource {
    pub fn new(signals: Vec<HistoricalSignal>) -> Self {
        Self { signals }
    }
}

#[async_trait]
impl SignalSource for StaticSignalSource {
    async fn recorded_signals(
        &self,
        _subject: &str,
        start: NaiveDate,
        end: NaiveDate,
        _agent_filter: Option<&[String]>,
    ) -> Result<Vec<HistoricalSignal>, ProviderError> {
        Ok(self
            .signals
            .iter()
            .filter(|s| s.date >= start && s.date <= end)
            .cloned()
            .collect())
    }
}

// ============================================================================
// Request
// ============================================================================

fn default_strategy() -> String {
    "signal".into()
}

/// Parameters of one backtest run. Unset fields fall back to configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestRequest {
    /// Instrument to trade
    pub subject: String,
    #[serde(default)]
    pub benchmark: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    /// Look-back such as "1y", "6m", "30d"; ignored when both dates are set
    #[serde(default)]
    pub period: Option<String>,
    /// "signal" or "threshold"
    #[serde(default = "default_strategy")]
    pub strategy: String,
    /// Buy cutoff for the threshold strategy
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde(default)]
    pub initial_capital: Option<f64>,
    /// Slippage in percent (0.1 = 0.1%)
    #[serde(default)]
    pub slippage_pct: Option<f64>,
    /// Restrict recorded signals to these agents
    #[serde(default)]
    pub agent_filter: Option<Vec<String>>,
}

impl BacktestRequest {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            benchmark: None,
            start_date: None,
            end_date: None,
            period: None,
            strategy: default_strategy(),
            threshold: None,
            initial_capital: None,
            slippage_pct: None,
            agent_filter: None,
        }
    }

    pub fn with_range(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.start_date = Some(start);
        self.end_date = Some(end);
        self
    }

    pub fn with_period(mut self, period: impl Into<String>) -> Self {
        self.period = Some(period.into());
        self
    }

    pub fn with_strategy(mut self, strategy: impl Into<String>, threshold: Option<f64>) -> Self {
        self.strategy = strategy.into();
        self.threshold = threshold;
        self
    }

    /// Resolve the simulated date range.
    ///
    /// Explicit dates win; otherwise the period (default one year) counts
    /// back from `end_date` or `today`.
    pub fn resolve_range(&self, today: NaiveDate) -> quorum_common::Result<(NaiveDate, NaiveDate)> {
        let (start, end) = match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => (start, end),
            (start, end) => {
                let anchor = end.unwrap_or(today);
                let period = self.period.as_deref().unwrap_or(DEFAULT_PERIOD);
                let (from, to) = parse_period(period, anchor)?;
                (start.unwrap_or(from), to)
            }
        };

        if start > end {
            return Err(Error::invalid_input(format!(
                "start date {} is after end date {}",
                start, end
            )));
        }
        Ok((start, end))
    }
}

// ============================================================================
// Coordinator
// ============================================================================

/// Composes providers, simulator and metrics into one backtest run.
pub struct BacktestCoordinator {
    prices: Arc<dyn PriceProvider>,
    signals: Arc<dyn SignalSource>,
    settings: BacktestSettings,
}

impl BacktestCoordinator {
    pub fn new(
        prices: Arc<dyn PriceProvider>,
        signals: Arc<dyn SignalSource>,
        settings: BacktestSettings,
    ) -> Self {
        Self {
            prices,
            signals,
            settings,
        }
    }

    pub fn settings(&self) -> &BacktestSettings {
        &self.settings
    }

    /// Run a backtest ending no later than today.
    pub async fn run(&self, request: &BacktestRequest) -> Result<BacktestReport> {
        self.run_as_of(request, Local::now().date_naive()).await
    }

    /// Run a backtest with `today` as the anchor for relative periods.
    pub async fn run_as_of(
        &self,
        request: &BacktestRequest,
        today: NaiveDate,
    ) -> Result<BacktestReport> {
        let run_id = generate_run_id();
        let subject = request.subject.trim().to_uppercase();
        if subject.is_empty() {
            return Err(Error::invalid_input("backtest subject is empty").into());
        }
        let benchmark = request
            .benchmark
            .as_deref()
            .unwrap_or(&self.settings.benchmark)
            .trim()
            .to_uppercase();

        let (start, end) = request.resolve_range(today)?;
        let initial_capital = request.initial_capital.unwrap_or(self.settings.initial_capital);
        let slippage_pct = request.slippage_pct.unwrap_or(self.settings.slippage_pct);
        if !(initial_capital.is_finite() && initial_capital > 0.0) {
            return Err(Error::invalid_input(format!(
                "initial capital must be positive, got {}",
                initial_capital
            ))
            .into());
        }
        if !(0.0..100.0).contains(&slippage_pct) {
            return Err(Error::invalid_input(format!(
                "slippage must be within [0, 100) percent, got {}",
                slippage_pct
            ))
            .into());
        }
        let policy = StrategyPolicy::from_kind(&request.strategy, request.threshold)?;

        info!(
            run_id = %run_id,
            subject = %subject,
            benchmark = %benchmark,
            %start,
            %end,
            strategy = policy.name(),
            "Starting backtest"
        );

        let prices = self.fetch_prices(&subject, start, end).await?;
        let benchmark_prices = self.fetch_prices(&benchmark, start, end).await?;
        let signals = self
            .load_signals(&subject, start, end, request.agent_filter.as_deref())
            .await;

        let simulator = TradeSimulator::with_slippage_pct(policy, initial_capital, slippage_pct);
        let ledger = simulator.run(&prices, &benchmark_prices, &signals);

        let metrics = MetricsCalculator::from_settings(&self.settings).calculate(
            initial_capital,
            &ledger.snapshots,
            &ledger.trades,
        );
        let final_value = ledger.total_value();

        info!(
            run_id = %run_id,
            final_value,
            total_return_pct = metrics.total_return_pct,
            trades = ledger.trades.len(),
            "Backtest complete"
        );

        Ok(BacktestReport {
            run_id,
            subject,
            benchmark,
            start_date: start,
            end_date: end,
            strategy: policy.to_string(),
            initial_capital,
            final_value,
            metrics,
            trades: ledger.trades,
            snapshots: ledger.snapshots,
        })
    }

    async fn fetch_prices(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries> {
        let series = self
            .prices
            .daily_closes(symbol, start, end)
            .await
            .map_err(|e| Error::External(e.to_string()))
            .with_context(|| {
                format!(
                    "Failed to fetch prices for {} from {}",
                    symbol,
                    self.prices.name()
                )
            })?;

        if series.is_empty() {
            return Err(Error::NotFound(format!(
                "no historical prices for {} between {} and {}",
                symbol, start, end
            ))
            .into());
        }
        Ok(series)
    }

    /// Recorded signals in range, or simulated ones when too few exist.
    async fn load_signals(
        &self,
        subject: &str,
        start: NaiveDate,
        end: NaiveDate,
        agent_filter: Option<&[String]>,
    ) -> SignalSeries {
        let recorded: SignalSeries = match self
            .signals
            .recorded_signals(subject, start, end, agent_filter)
            .await
        {
            Ok(signals) => signals
                .into_iter()
                .filter(|s| s.date >= start && s.date <= end)
                .map(|s| (s.date, s))
                .collect(),
            Err(e) => {
                warn!(
                    subject = %subject,
                    error = %e,
                    "Signal source failed, continuing without recorded signals"
                );
                SignalSeries::new()
            }
        };

        if recorded.len() < self.settings.min_recorded_signals {
            info!(
                subject = %subject,
                recorded = recorded.len(),
                required = self.settings.min_recorded_signals,
                "Too few recorded signals, using simulated signals"
            );
            return simulated_signals(start, end);
        }

        recorded
    }
}

// ============================================================================
// Tests
// ============================================================================
