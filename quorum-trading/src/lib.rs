//! Quorum Trading Library
//!
//! Weighted analyst consensus and signal-driven strategy backtesting.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                         quorum-trading                              │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────┐      │
//! │  │  Consensus      │→ │  Strategy       │→ │  Simulator      │      │
//! │  │  Aggregator     │  │  Policy         │  │  + Metrics      │      │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────┘      │
//! │           ↑                                         ↑               │
//! │      Opinions                          PriceProvider / SignalSource │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Concepts
//!
//! ## Consensus
//! - Each opinion votes with `agent weight × confidence multiplier`
//! - The weighted score maps onto STRONG_SELL..STRONG_BUY through four cutoffs
//! - Opinions more than 50 points from the result are dissenters
//!
//! ## Backtesting
//! - Long-only, one all-in position, no partial fills
//! - Slippage worsens every fill
//! - Results are scored against a buy-and-hold benchmark

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod backtest;
pub mod consensus;
pub mod job;
pub mod signal;

use anyhow::Result;
use quorum_common::config::Config;
use std::sync::Arc;

use crate::backtest::{BacktestCoordinator, BacktestReport, PriceProvider, SignalSource};
use crate::consensus::{ConsensusOutcome, Opinion, SignalAggregator};
use crate::job::BacktestJob;

/// Configured entry point for consensus and backtest runs.
pub struct Quorum {
    config: Config,
    aggregator: SignalAggregator,
}

impl Quorum {
    pub fn new(config: Config) -> Self {
        let aggregator = SignalAggregator::new(config.consensus.thresholds);
        Self { config, aggregator }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Aggregate opinions using the configured thresholds and agent weights.
    pub fn aggregate(
        &self,
        subject: &str,
        opinions: &[Opinion],
    ) -> quorum_common::Result<ConsensusOutcome> {
        let weights = &self.config.consensus.weights;
        self.aggregator
            .aggregate(subject, opinions, |agent_id| weights.get_weight(agent_id))
    }

    /// Backtest coordinator over the given collaborators.
    pub fn coordinator(
        &self,
        prices: Arc<dyn PriceProvider>,
        signals: Arc<dyn SignalSource>,
    ) -> BacktestCoordinator {
        BacktestCoordinator::new(prices, signals, self.config.backtest.clone())
    }

    /// Run a self-contained backtest job.
    ///
    /// Relative periods count back from the job's last price date. Metrics
    /// are calculated on the full daily log; only the returned snapshot log
    /// is down-sampled for output.
    pub async fn run_job(&self, job: BacktestJob) -> Result<BacktestReport> {
        let settings = &self.config.backtest;
        let (prices, signals) = job.providers(&settings.benchmark);
        let coordinator = self.coordinator(Arc::new(prices), Arc::new(signals));

        let mut request = job.request.clone();
        if request.end_date.is_none() {
            request.end_date = job.price_span().map(|(_, last)| last);
        }

        let report = coordinator.run(&request).await?;
        Ok(report.with_sampled_snapshots(settings.snapshot_sample_points))
    }
}
