//! Point-in-time signals and the trading policies that act on them.

use chrono::NaiveDate;
use quorum_common::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::consensus::ConsensusOutcome;
use crate::signal::Signal;

/// Default score cutoff for the threshold policy.
pub const DEFAULT_BUY_THRESHOLD: f64 = 50.0;

// ============================================================================
// Historical Signal
// ============================================================================

/// How a historical signal was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalProvenance {
    /// Stored from a live consensus run on that date
    Recorded,
    /// Generated after the fact for a past date
    Retroactive,
    /// Synthetic placeholder used when too few recorded signals exist
    Simulated,
}

/// A dated signal fed into the simulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalSignal {
    pub date: NaiveDate,
    pub signal: Signal,
    /// Weighted consensus score in [-100, 100]
    pub score: f64,
    /// Confidence multiplier in [0.3, 1.0]
    pub confidence: f64,
    pub provenance: SignalProvenance,
}

impl HistoricalSignal {
    pub fn new(
        date: NaiveDate,
        signal: Signal,
        score: f64,
        confidence: f64,
        provenance: SignalProvenance,
    ) -> Self {
        Self {
            date,
            signal,
            score,
            confidence,
            provenance,
        }
    }

    /// Capture a consensus outcome as a simulation input.
    pub fn from_outcome(
        date: NaiveDate,
        outcome: &ConsensusOutcome,
        provenance: SignalProvenance,
    ) -> Self {
        Self::new(
            date,
            outcome.final_signal,
            outcome.weighted_score,
            outcome.confidence.multiplier(),
            provenance,
        )
    }

    pub fn is_buy_signal(&self) -> bool {
        self.signal.is_bullish()
    }

    pub fn is_sell_signal(&self) -> bool {
        self.signal.is_bearish()
    }
}

// ============================================================================
// Strategy Policy
// ============================================================================

/// Action a policy requests for one signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeAction {
    None,
    Enter,
    Exit,
}

/// Named strategy selector, as it appears in requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Signal,
    Threshold,
}

impl StrategyKind {
    /// Parse a strategy name.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] for an unknown name.
    pub fn parse(name: &str) -> Result<Self> {
        match name.trim().to_lowercase().as_str() {
            "signal" | "signal_based" => Ok(Self::Signal),
            "threshold" | "score_threshold" => Ok(Self::Threshold),
            other => Err(Error::invalid_input(format!(
                "unknown strategy '{}' (expected 'signal' or 'threshold')",
                other
            ))),
        }
    }
}

/// Stateless entry/exit rule over (signal, position state).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategyPolicy {
    /// Enter on bullish signals, exit on bearish ones
    SignalDirection,
    /// Enter at `score >= buy_threshold`, exit at `score <= sell_threshold`
    ScoreThreshold {
        buy_threshold: f64,
        sell_threshold: f64,
    },
}

impl StrategyPolicy {
    /// Threshold policy; the sell cutoff mirrors the buy cutoff when omitted.
    pub fn score_threshold(buy_threshold: f64, sell_threshold: Option<f64>) -> Self {
        Self::ScoreThreshold {
            buy_threshold,
            sell_threshold: sell_threshold.unwrap_or(-buy_threshold),
        }
    }

    /// Build a policy from a strategy name and optional buy threshold.
    pub fn from_kind(name: &str, threshold: Option<f64>) -> Result<Self> {
        Ok(match StrategyKind::parse(name)? {
            StrategyKind::Signal => Self::SignalDirection,
            StrategyKind::Threshold => {
                Self::score_threshold(threshold.unwrap_or(DEFAULT_BUY_THRESHOLD), None)
            }
        })
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            Self::SignalDirection => StrategyKind::Signal,
            Self::ScoreThreshold { .. } => StrategyKind::Threshold,
        }
    }

    /// Decide what to do with `signal` given the current position state.
    pub fn decide(&self, signal: &HistoricalSignal, has_position: bool) -> TradeAction {
        match *self {
            Self::SignalDirection => {
                if signal.is_buy_signal() && !has_position {
                    TradeAction::Enter
                } else if signal.is_sell_signal() && has_position {
                    TradeAction::Exit
                } else {
                    TradeAction::None
                }
            }
            Self::ScoreThreshold {
                buy_threshold,
                sell_threshold,
            } => {
                if signal.score >= buy_threshold && !has_position {
                    TradeAction::Enter
                } else if signal.score <= sell_threshold && has_position {
                    TradeAction::Exit
                } else {
                    TradeAction::None
                }
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::SignalDirection => "Signal-Based",
            Self::ScoreThreshold { .. } => "Score Threshold",
        }
    }

    pub fn description(&self) -> String {
        match self {
            Self::SignalDirection => {
                "Buy on BUY/STRONG_BUY signals, sell on SELL/STRONG_SELL signals".to_string()
            }
            Self::ScoreThreshold {
                buy_threshold,
                sell_threshold,
            } => format!(
                "Buy when score >= {}, sell when score <= {}",
                buy_threshold, sell_threshold
            ),
        }
    }
}

impl std::fmt::Display for StrategyPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name(), self.description())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::{Opinion, SignalAggregator};
    use crate::signal::Confidence;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    fn sig(signal: Signal, score: f64) -> HistoricalSignal {
        HistoricalSignal::new(day(), signal, score, 0.7, SignalProvenance::Recorded)
    }

    #[test]
    fn test_signal_direction_policy() {
        let policy = StrategyPolicy::SignalDirection;

        assert_eq!(policy.decide(&sig(Signal::Buy, 50.0), false), TradeAction::Enter);
        assert_eq!(policy.decide(&sig(Signal::StrongBuy, 100.0), true), TradeAction::None);
        assert_eq!(policy.decide(&sig(Signal::Sell, -50.0), true), TradeAction::Exit);
        assert_eq!(policy.decide(&sig(Signal::StrongSell, -100.0), false), TradeAction::None);
        assert_eq!(policy.decide(&sig(Signal::Hold, 0.0), false), TradeAction::None);
        assert_eq!(policy.decide(&sig(Signal::Hold, 0.0), true), TradeAction::None);
    }

    #[test]
    fn test_threshold_policy_inclusive_boundary() {
        let policy = StrategyPolicy::score_threshold(50.0, None);

        assert_eq!(policy.decide(&sig(Signal::Buy, 49.9), false), TradeAction::None);
        assert_eq!(policy.decide(&sig(Signal::Buy, 50.0), false), TradeAction::Enter);
        assert_eq!(policy.decide(&sig(Signal::Sell, -49.9), true), TradeAction::None);
        assert_eq!(policy.decide(&sig(Signal::Sell, -50.0), true), TradeAction::Exit);
    }

    #[test]
    fn test_threshold_policy_ignores_signal_label() {
        let policy = StrategyPolicy::score_threshold(30.0, Some(-10.0));

        // The label says HOLD but the score clears the cutoff
        assert_eq!(policy.decide(&sig(Signal::Hold, 35.0), false), TradeAction::Enter);
        assert_eq!(policy.decide(&sig(Signal::Hold, -10.0), true), TradeAction::Exit);
    }

    #[test]
    fn test_from_kind() {
        assert_eq!(
            StrategyPolicy::from_kind("signal", None).unwrap(),
            StrategyPolicy::SignalDirection
        );
        assert_eq!(
            StrategyPolicy::from_kind("Threshold", None).unwrap(),
            StrategyPolicy::ScoreThreshold {
                buy_threshold: 50.0,
                sell_threshold: -50.0
            }
        );
        assert_eq!(
            StrategyPolicy::from_kind("threshold", Some(30.0)).unwrap().kind(),
            StrategyKind::Threshold
        );
    }

    #[test]
    fn test_unknown_strategy_is_input_error() {
        let err = StrategyPolicy::from_kind("momentum", None).unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[test]
    fn test_historical_signal_from_outcome() {
        let aggregator = SignalAggregator::default();
        let opinions = vec![Opinion::new("a", Signal::Buy, Confidence::High)];
        let outcome = aggregator.aggregate("AAPL", &opinions, |_| 1.0).unwrap();

        let hs = HistoricalSignal::from_outcome(day(), &outcome, SignalProvenance::Retroactive);

        assert_eq!(hs.signal, Signal::Buy);
        assert_eq!(hs.score, 50.0);
        // Single agreeing opinion at HIGH -> 0.85 -> HIGH
        assert_eq!(hs.confidence, 0.85);
        assert!(hs.is_buy_signal());
        assert!(!hs.is_sell_signal());
    }

    #[test]
    fn test_policy_description() {
        let policy = StrategyPolicy::score_threshold(40.0, None);
        assert_eq!(policy.description(), "Buy when score >= 40, sell when score <= -40");
    }
}
