//! JSON job files accepted by the command-line interface.

use chrono::NaiveDate;
use quorum_common::{Result, ResultExt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::backtest::{
    BacktestRequest, HistoricalSignal, PriceSeries, StaticPriceProvider, StaticSignalSource,
};
use crate::consensus::Opinion;

/// Opinions on one subject to aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusJob {
    pub subject: String,
    pub opinions: Vec<Opinion>,
}

/// A backtest request with its price and signal data inlined.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestJob {
    #[serde(flatten)]
    pub request: BacktestRequest,
    /// Instrument closes keyed by ISO date
    pub prices: PriceSeries,
    /// Benchmark closes keyed by ISO date
    pub benchmark_prices: PriceSeries,
    /// Recorded signals; simulated ones are used when too few are given
    #[serde(default)]
    pub signals: Vec<HistoricalSignal>,
}

impl BacktestJob {
    /// Benchmark symbol the job resolves to.
    pub fn benchmark_symbol<'a>(&'a self, default: &'a str) -> &'a str {
        self.request.benchmark.as_deref().unwrap_or(default)
    }

    /// In-memory providers serving this job's data.
    pub fn providers(&self, default_benchmark: &str) -> (StaticPriceProvider, StaticSignalSource) {
        let prices = StaticPriceProvider::new()
            .with_series(&self.request.subject, self.prices.clone())
            .with_series(self.benchmark_symbol(default_benchmark), self.benchmark_prices.clone());
        (prices, StaticSignalSource::new(self.signals.clone()))
    }

    /// First and last date with an instrument price.
    pub fn price_span(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first = self.prices.keys().next()?;
        let last = self.prices.keys().next_back()?;
        Some((*first, *last))
    }
}

/// Read and parse a JSON job file.
pub fn load<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content =
        std::fs::read_to_string(path).context(format!("Failed to read {}", path.display()))?;

    serde_json::from_str(&content).context(format!("Failed to parse {}", path.display()))
}

// ============================================================================
// Tests
// ============================================================================
