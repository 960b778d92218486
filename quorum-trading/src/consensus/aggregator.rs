//! Signal aggregator implementation.

use quorum_common::{ConsensusThresholds, Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::signal::{Confidence, Signal};

/// Score distance from the final signal beyond which an opinion dissents.
pub const DISSENT_THRESHOLD: i32 = 50;

/// Number of themes and risks reported.
pub const TOP_THEMES: usize = 5;

// ============================================================================
// Input Types
// ============================================================================

/// One agent's view on one subject. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opinion {
    /// Agent identifier, used for weight lookup and dissent reporting
    pub agent_id: String,
    /// Human-readable agent name
    #[serde(default)]
    pub agent_name: String,
    pub signal: Signal,
    pub confidence: Confidence,
    #[serde(default)]
    pub target_price: Option<f64>,
    #[serde(default)]
    pub reasoning: String,
    /// Free-text supporting factors
    #[serde(default)]
    pub key_factors: Vec<String>,
    /// Free-text risks
    #[serde(default)]
    pub risks: Vec<String>,
    #[serde(default)]
    pub time_horizon: Option<String>,
}

impl Opinion {
    /// Create an opinion with no target, factors or risks.
    pub fn new(agent_id: impl Into<String>, signal: Signal, confidence: Confidence) -> Self {
        Self {
            agent_id: agent_id.into(),
            agent_name: String::new(),
            signal,
            confidence,
            target_price: None,
            reasoning: String::new(),
            key_factors: Vec::new(),
            risks: Vec::new(),
            time_horizon: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.agent_name = name.into();
        self
    }

    pub fn with_target(mut self, target_price: f64) -> Self {
        self.target_price = Some(target_price);
        self
    }

    pub fn with_factors<I, S>(mut self, factors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.key_factors = factors.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_risks<I, S>(mut self, risks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.risks = risks.into_iter().map(Into::into).collect();
        self
    }

    /// Name for narrative output, falling back to the id.
    pub fn display_name(&self) -> &str {
        if self.agent_name.is_empty() {
            &self.agent_id
        } else {
            &self.agent_name
        }
    }

    /// Signal score scaled by the confidence multiplier (agent weight not applied).
    pub fn confidence_weighted_score(&self) -> f64 {
        self.signal.score() as f64 * self.confidence.multiplier()
    }
}

// ============================================================================
// Output Types
// ============================================================================

/// Votes grouped by direction bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTally {
    pub buy: usize,
    pub hold: usize,
    pub sell: usize,
}

impl VoteTally {
    fn record(&mut self, signal: Signal) {
        if signal.is_bullish() {
            self.buy += 1;
        } else if signal.is_bearish() {
            self.sell += 1;
        } else {
            self.hold += 1;
        }
    }

    pub fn total(&self) -> usize {
        self.buy + self.hold + self.sell
    }
}

/// Aggregated recommendation for one subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusOutcome {
    /// Normalised subject id (trimmed, upper-case)
    pub subject: String,
    pub final_signal: Signal,
    /// Weighted score in [-100, 100]
    pub weighted_score: f64,
    pub confidence: Confidence,
    pub votes: VoteTally,
    pub opinion_count: usize,
    /// Agent ids whose signal is more than 50 points from the final signal
    pub dissenters: Vec<String>,
    /// Most frequent key factors
    pub key_themes: Vec<String>,
    /// Most frequent risks
    pub primary_risks: Vec<String>,
    /// Mean of the target prices that were provided
    pub average_target_price: Option<f64>,
    /// Narrative summary
    pub reasoning: String,
}

impl ConsensusOutcome {
    /// Share of opinions that do not dissent.
    pub fn agreement_ratio(&self) -> f64 {
        if self.opinion_count == 0 {
            return 0.0;
        }
        (self.opinion_count - self.dissenters.len()) as f64 / self.opinion_count as f64
    }
}

// ============================================================================
// Aggregator
// ============================================================================

/// Weighted-vote consensus over a set of opinions.
#[derive(Debug, Clone)]
pub struct SignalAggregator {
    thresholds: ConsensusThresholds,
}

impl Default for SignalAggregator {
    fn default() -> Self {
        Self::new(ConsensusThresholds::default())
    }
}

impl SignalAggregator {
    pub fn new(thresholds: ConsensusThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &ConsensusThresholds {
        &self.thresholds
    }

    /// Aggregate opinions on `subject` into a consensus outcome.
    ///
    /// `weight_of` resolves an agent id to its positive voting weight.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] when `opinions` is empty or a resolved weight
    /// is not a positive finite number.
    pub fn aggregate<F>(
        &self,
        subject: &str,
        opinions: &[Opinion],
        weight_of: F,
    ) -> Result<ConsensusOutcome>
    where
        F: Fn(&str) -> f64,
    {
        let subject = subject.trim().to_uppercase();

        if opinions.is_empty() {
            return Err(Error::invalid_input(format!(
                "no opinions to aggregate for {}",
                subject
            )));
        }

        let mut total_weight = 0.0;
        let mut weighted_sum = 0.0;
        let mut votes = VoteTally::default();

        for opinion in opinions {
            let agent_weight = weight_of(&opinion.agent_id);
            if !(agent_weight.is_finite() && agent_weight > 0.0) {
                return Err(Error::invalid_input(format!(
                    "agent '{}' resolved to non-positive weight {}",
                    opinion.agent_id, agent_weight
                )));
            }

            let effective_weight = agent_weight * opinion.confidence.multiplier();
            weighted_sum += opinion.signal.score() as f64 * effective_weight;
            total_weight += effective_weight;
            votes.record(opinion.signal);
        }

        let weighted_score = if total_weight > 0.0 {
            (weighted_sum / total_weight).clamp(-100.0, 100.0)
        } else {
            0.0
        };

        let final_signal = self.score_to_signal(weighted_score);
        let dissenters = find_dissenters(opinions, final_signal);
        let confidence = overall_confidence(opinions, final_signal);
        let key_themes = top_by_frequency(opinions.iter().flat_map(|o| o.key_factors.iter()));
        let primary_risks = top_by_frequency(opinions.iter().flat_map(|o| o.risks.iter()));

        let targets: Vec<f64> = opinions.iter().filter_map(|o| o.target_price).collect();
        let average_target_price = if targets.is_empty() {
            None
        } else {
            Some(targets.iter().sum::<f64>() / targets.len() as f64)
        };

        let reasoning = narrative(&subject, final_signal, weighted_score, opinions, &dissenters);

        debug!(
            subject = %subject,
            opinions = opinions.len(),
            weighted_score,
            final_signal = %final_signal,
            confidence = %confidence,
            dissenters = dissenters.len(),
            "Consensus aggregated"
        );

        Ok(ConsensusOutcome {
            subject,
            final_signal,
            weighted_score,
            confidence,
            votes,
            opinion_count: opinions.len(),
            dissenters,
            key_themes,
            primary_risks,
            average_target_price,
            reasoning,
        })
    }

    /// Map a weighted score onto the signal scale.
    ///
    /// Buy-side cutoffs are inclusive, sell-side cutoffs are exclusive.
    pub fn score_to_signal(&self, score: f64) -> Signal {
        let t = &self.thresholds;
        if score >= t.strong_buy {
            Signal::StrongBuy
        } else if score >= t.buy {
            Signal::Buy
        } else if score > t.sell {
            Signal::Hold
        } else if score > t.strong_sell {
            Signal::Sell
        } else {
            Signal::StrongSell
        }
    }
}

fn find_dissenters(opinions: &[Opinion], final_signal: Signal) -> Vec<String> {
    let reference = final_signal.score();
    opinions
        .iter()
        .filter(|o| (o.signal.score() - reference).abs() > DISSENT_THRESHOLD)
        .map(|o| o.agent_id.clone())
        .collect()
}

/// Agreement ratio times the mean multiplier of the agreeing subset.
fn overall_confidence(opinions: &[Opinion], final_signal: Signal) -> Confidence {
    let direction = final_signal.direction();
    let agreeing: Vec<f64> = opinions
        .iter()
        .filter(|o| o.signal.direction() == direction)
        .map(|o| o.confidence.multiplier())
        .collect();

    if agreeing.is_empty() {
        return Confidence::VeryLow;
    }

    let agreement_ratio = agreeing.len() as f64 / opinions.len() as f64;
    let avg_confidence = agreeing.iter().sum::<f64>() / agreeing.len() as f64;

    Confidence::from_agreement(agreement_ratio * avg_confidence)
}

/// Exact-string frequency count, ties kept in first-seen order.
fn top_by_frequency<'a, I>(items: I) -> Vec<String>
where
    I: Iterator<Item = &'a String>,
{
    let mut counts: Vec<(&'a str, usize)> = Vec::new();
    let mut index: HashMap<&'a str, usize> = HashMap::new();

    for item in items {
        match index.get(item.as_str()) {
            Some(&i) => counts[i].1 += 1,
            None => {
                index.insert(item.as_str(), counts.len());
                counts.push((item.as_str(), 1));
            }
        }
    }

    // sort_by is stable
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
        .into_iter()
        .take(TOP_THEMES)
        .map(|(s, _)| s.to_string())
        .collect()
}

fn narrative(
    subject: &str,
    final_signal: Signal,
    score: f64,
    opinions: &[Opinion],
    dissenters: &[String],
) -> String {
    let total = opinions.len();
    let agreement = total - dissenters.len();

    let mut text = format!(
        "Consensus for {}: {} (weighted score: {:.1}). {}/{} agents agree with this assessment.",
        subject, final_signal, score, agreement, total
    );

    if !dissenters.is_empty() {
        let names: Vec<&str> = opinions
            .iter()
            .filter(|o| dissenters.contains(&o.agent_id))
            .map(Opinion::display_name)
            .collect();
        text.push_str(&format!(" Dissenters: {}.", names.join(", ")));
    }

    text
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn equal_weight(_: &str) -> f64 {
        1.0
    }

    fn opinion(id: &str, signal: Signal, confidence: Confidence) -> Opinion {
        Opinion::new(id, signal, confidence).with_name(format!("Agent {}", id))
    }

    #[test]
    fn test_empty_opinions_is_input_error() {
        let aggregator = SignalAggregator::default();
        let err = aggregator.aggregate("AAPL", &[], equal_weight).unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[test]
    fn test_non_positive_weight_is_input_error() {
        let aggregator = SignalAggregator::default();
        let opinions = vec![opinion("a", Signal::Buy, Confidence::High)];
        let err = aggregator.aggregate("AAPL", &opinions, |_| 0.0).unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[test]
    fn test_unanimous_strong_buy() {
        let aggregator = SignalAggregator::default();
        let opinions: Vec<Opinion> = (0..5)
            .map(|i| opinion(&format!("agent_{}", i), Signal::StrongBuy, Confidence::VeryHigh))
            .collect();

        let outcome = aggregator.aggregate("test", &opinions, equal_weight).unwrap();

        assert_eq!(outcome.subject, "TEST");
        assert_eq!(outcome.final_signal, Signal::StrongBuy);
        assert_eq!(outcome.weighted_score, 100.0);
        assert!(outcome.dissenters.is_empty());
        assert!(matches!(outcome.confidence, Confidence::VeryHigh | Confidence::High));
        assert_eq!(outcome.votes, VoteTally { buy: 5, hold: 0, sell: 0 });
        assert_eq!(outcome.agreement_ratio(), 1.0);
    }

    #[test]
    fn test_opposing_extremes_cancel_to_hold() {
        let aggregator = SignalAggregator::default();
        let opinions = vec![
            opinion("bull", Signal::StrongBuy, Confidence::VeryHigh),
            opinion("bear", Signal::StrongSell, Confidence::VeryHigh),
        ];

        let outcome = aggregator.aggregate("XYZ", &opinions, equal_weight).unwrap();

        assert!(outcome.weighted_score.abs() < 1e-9);
        assert_eq!(outcome.final_signal, Signal::Hold);
        // Both extremes are 100 points from HOLD
        assert_eq!(outcome.dissenters, vec!["bull".to_string(), "bear".to_string()]);
        assert_eq!(outcome.confidence, Confidence::VeryLow);
        assert!(outcome.reasoning.contains("Dissenters: Agent bull, Agent bear."));
    }

    #[test]
    fn test_weighted_score_applies_agent_and_confidence_weights() {
        let aggregator = SignalAggregator::default();
        let opinions = vec![
            opinion("heavy", Signal::Buy, Confidence::VeryHigh),
            opinion("light", Signal::Sell, Confidence::Low),
        ];
        let weights = |id: &str| if id == "heavy" { 2.0 } else { 1.0 };

        let outcome = aggregator.aggregate("XYZ", &opinions, weights).unwrap();

        // (50*2.0 - 50*0.5) / (2.0 + 0.5) = 30
        assert!((outcome.weighted_score - 30.0).abs() < 1e-9);
        assert_eq!(outcome.final_signal, Signal::Buy);
        assert_eq!(outcome.votes, VoteTally { buy: 1, hold: 0, sell: 1 });
        // SELL is exactly 100 points from BUY
        assert_eq!(outcome.dissenters, vec!["light".to_string()]);
    }

    #[test]
    fn test_threshold_boundaries() {
        let aggregator = SignalAggregator::default();
        assert_eq!(aggregator.score_to_signal(60.0), Signal::StrongBuy);
        assert_eq!(aggregator.score_to_signal(59.999), Signal::Buy);
        assert_eq!(aggregator.score_to_signal(20.0), Signal::Buy);
        assert_eq!(aggregator.score_to_signal(19.999), Signal::Hold);
        assert_eq!(aggregator.score_to_signal(-19.999), Signal::Hold);
        assert_eq!(aggregator.score_to_signal(-20.0), Signal::Sell);
        assert_eq!(aggregator.score_to_signal(-59.999), Signal::Sell);
        assert_eq!(aggregator.score_to_signal(-60.0), Signal::StrongSell);
    }

    #[test]
    fn test_hold_opinion_is_not_dissenter_of_buy() {
        let aggregator = SignalAggregator::default();
        let opinions = vec![
            opinion("a", Signal::Buy, Confidence::High),
            opinion("b", Signal::Buy, Confidence::High),
            opinion("c", Signal::Hold, Confidence::Medium),
        ];

        let outcome = aggregator.aggregate("AAPL", &opinions, equal_weight).unwrap();

        assert_eq!(outcome.final_signal, Signal::Buy);
        assert!(outcome.dissenters.is_empty());
        // 2/3 agree at 0.85 mean -> 0.567 -> MEDIUM
        assert_eq!(outcome.confidence, Confidence::Medium);
    }

    #[test]
    fn test_themes_ranked_by_frequency_then_first_seen() {
        let aggregator = SignalAggregator::default();
        let opinions = vec![
            opinion("a", Signal::Buy, Confidence::High)
                .with_factors(["moat", "buybacks", "margins"])
                .with_risks(["regulation"]),
            opinion("b", Signal::Buy, Confidence::High)
                .with_factors(["margins", "pricing", "moat"])
                .with_risks(["china", "regulation"]),
            opinion("c", Signal::Hold, Confidence::Low)
                .with_factors(["valuation", "cash", "Moat"]),
        ];

        let outcome = aggregator.aggregate("AAPL", &opinions, equal_weight).unwrap();

        assert_eq!(
            outcome.key_themes,
            vec!["moat", "margins", "buybacks", "pricing", "valuation"]
        );
        assert_eq!(outcome.primary_risks, vec!["regulation", "china"]);
    }

    #[test]
    fn test_average_target_price() {
        let aggregator = SignalAggregator::default();
        let opinions = vec![
            opinion("a", Signal::Buy, Confidence::High).with_target(200.0),
            opinion("b", Signal::Buy, Confidence::High).with_target(190.0),
            opinion("c", Signal::Hold, Confidence::Medium),
        ];

        let outcome = aggregator.aggregate("AAPL", &opinions, equal_weight).unwrap();
        assert_eq!(outcome.average_target_price, Some(195.0));

        let bare = vec![opinion("a", Signal::Buy, Confidence::High)];
        let outcome = aggregator.aggregate("AAPL", &bare, equal_weight).unwrap();
        assert_eq!(outcome.average_target_price, None);
    }

    #[test]
    fn test_narrative_without_dissent() {
        let aggregator = SignalAggregator::default();
        let opinions = vec![opinion("a", Signal::Buy, Confidence::High)];

        let outcome = aggregator.aggregate(" msft ", &opinions, equal_weight).unwrap();

        assert_eq!(
            outcome.reasoning,
            "Consensus for MSFT: BUY (weighted score: 50.0). 1/1 agents agree with this assessment."
        );
    }

    #[test]
    fn test_outcome_serializes() {
        let aggregator = SignalAggregator::default();
        let opinions = vec![opinion("a", Signal::StrongSell, Confidence::VeryLow)];
        let outcome = aggregator.aggregate("XYZ", &opinions, equal_weight).unwrap();

        let json = serde_json::to_string(&outcome).unwrap();
        assert!(json.contains("\"final_signal\":\"STRONG_SELL\""));
        assert!(json.contains("\"confidence\":\"VERY_LOW\""));
    }
}
