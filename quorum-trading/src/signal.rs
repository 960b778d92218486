//! Directional signal and confidence scales.
//!
//! Both scales are closed enums so the score and multiplier tables are
//! exhaustive matches.

use serde::{Deserialize, Serialize};

/// Five-point directional recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Signal {
    StrongSell,
    Sell,
    Hold,
    Buy,
    StrongBuy,
}

/// Coarse direction bucket used for agreement checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Bullish,
    Neutral,
    Bearish,
}

impl Signal {
    /// Every signal, from most bearish to most bullish.
    pub const ALL: [Signal; 5] = [
        Signal::StrongSell,
        Signal::Sell,
        Signal::Hold,
        Signal::Buy,
        Signal::StrongBuy,
    ];

    /// Fixed numeric score in [-100, 100].
    pub const fn score(self) -> i32 {
        match self {
            Self::StrongBuy => 100,
            Self::Buy => 50,
            Self::Hold => 0,
            Self::Sell => -50,
            Self::StrongSell => -100,
        }
    }

    pub const fn direction(self) -> Direction {
        match self {
            Self::StrongBuy | Self::Buy => Direction::Bullish,
            Self::Hold => Direction::Neutral,
            Self::Sell | Self::StrongSell => Direction::Bearish,
        }
    }

    pub const fn is_bullish(self) -> bool {
        matches!(self.direction(), Direction::Bullish)
    }

    pub const fn is_bearish(self) -> bool {
        matches!(self.direction(), Direction::Bearish)
    }

    /// Canonical upper-case name (e.g. "STRONG_BUY").
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StrongBuy => "STRONG_BUY",
            Self::Buy => "BUY",
            Self::Hold => "HOLD",
            Self::Sell => "SELL",
            Self::StrongSell => "STRONG_SELL",
        }
    }

    /// Parse from string (e.g. "STRONG_BUY", "strong buy", "buy")
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().replace([' ', '-'], "_").as_str() {
            "STRONG_BUY" => Some(Self::StrongBuy),
            "BUY" => Some(Self::Buy),
            "HOLD" => Some(Self::Hold),
            "SELL" => Some(Self::Sell),
            "STRONG_SELL" => Some(Self::StrongSell),
            _ => None,
        }
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Five-point certainty scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Confidence {
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl Confidence {
    pub const ALL: [Confidence; 5] = [
        Confidence::VeryLow,
        Confidence::Low,
        Confidence::Medium,
        Confidence::High,
        Confidence::VeryHigh,
    ];

    /// Weighting multiplier in [0.3, 1.0].
    pub const fn multiplier(self) -> f64 {
        match self {
            Self::VeryHigh => 1.0,
            Self::High => 0.85,
            Self::Medium => 0.7,
            Self::Low => 0.5,
            Self::VeryLow => 0.3,
        }
    }

    /// Map a combined agreement score onto the scale.
    pub fn from_agreement(combined: f64) -> Self {
        if combined >= 0.8 {
            Self::VeryHigh
        } else if combined >= 0.65 {
            Self::High
        } else if combined >= 0.5 {
            Self::Medium
        } else if combined >= 0.35 {
            Self::Low
        } else {
            Self::VeryLow
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::VeryHigh => "VERY_HIGH",
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
            Self::VeryLow => "VERY_LOW",
        }
    }

    /// Parse from string (e.g. "VERY_HIGH", "medium")
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().replace([' ', '-'], "_").as_str() {
            "VERY_HIGH" => Some(Self::VeryHigh),
            "HIGH" => Some(Self::High),
            "MEDIUM" => Some(Self::Medium),
            "LOW" => Some(Self::Low),
            "VERY_LOW" => Some(Self::VeryLow),
            _ => None,
        }
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Tests
// ============================================================================
