//! Configuration management for Quorum.
//!
//! Configuration lives at `~/.quorum/config.json`, optionally overlaid by
//! `thresholds.json` and `weights.json` in the same directory.
//!
//! # Configuration Priority
//!
//! 1. Environment variables (QUORUM_* prefix)
//! 2. Modular files (`thresholds.json`, `weights.json`)
//! 3. `config.json`
//! 4. Default values
//!
//! # Environment Variable Mapping
//!
//! - `QUORUM_LOG_LEVEL` → observability.log_level
//! - `QUORUM_LOG_FORMAT` → observability.log_format
//! - `QUORUM_THRESHOLD_STRONG_BUY` → consensus.thresholds.strong_buy
//! - `QUORUM_THRESHOLD_BUY` → consensus.thresholds.buy
//! - `QUORUM_THRESHOLD_SELL` → consensus.thresholds.sell
//! - `QUORUM_THRESHOLD_STRONG_SELL` → consensus.thresholds.strong_sell
//! - `QUORUM_WEIGHT_<AGENT>` → consensus.weights.agents.<agent>
//! - `QUORUM_RISK_FREE_RATE` → backtest.risk_free_rate

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config_loader::load_modular_config;

/// Prefix for per-agent weight environment overrides.
const WEIGHT_ENV_PREFIX: &str = "QUORUM_WEIGHT_";

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".quorum"),
        |dirs| dirs.home_dir().join(".quorum"),
    )
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// JSON Schema reference
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Consensus aggregation configuration
    #[serde(default)]
    pub consensus: ConsensusConfig,

    /// Backtest defaults
    #[serde(default)]
    pub backtest: BacktestSettings,
}

impl Config {
    /// Load configuration from the default directory.
    ///
    /// A missing directory or `config.json` yields defaults.
    pub fn load() -> Result<Self> {
        Self::load_dir(&config_dir())
    }

    /// Load configuration from a specific directory, merging modular files.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let value = load_modular_config(Some(dir.to_path_buf()))?;
        serde_json::from_value(value)
            .with_context(|| format!("Failed to parse config from {}", dir.display()))
    }

    /// Load configuration from a specific file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(std::env::vars());
    }

    /// Apply overrides from an arbitrary set of `(key, value)` pairs.
    ///
    /// Unparseable numeric values are ignored with a warning.
    pub fn apply_overrides<I>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            match key.as_str() {
                "QUORUM_LOG_LEVEL" => self.observability.log_level = value,
                "QUORUM_LOG_FORMAT" => self.observability.log_format = value,
                "QUORUM_THRESHOLD_STRONG_BUY" => {
                    set_f64(&key, &value, &mut self.consensus.thresholds.strong_buy)
                }
                "QUORUM_THRESHOLD_BUY" => set_f64(&key, &value, &mut self.consensus.thresholds.buy),
                "QUORUM_THRESHOLD_SELL" => {
                    set_f64(&key, &value, &mut self.consensus.thresholds.sell)
                }
                "QUORUM_THRESHOLD_STRONG_SELL" => {
                    set_f64(&key, &value, &mut self.consensus.thresholds.strong_sell)
                }
                "QUORUM_RISK_FREE_RATE" => {
                    set_f64(&key, &value, &mut self.backtest.risk_free_rate)
                }
                _ => {
                    if let Some(agent) = key.strip_prefix(WEIGHT_ENV_PREFIX) {
                        match value.parse::<f64>() {
                            Ok(weight) => {
                                self.consensus
                                    .weights
                                    .agents
                                    .insert(agent.to_lowercase(), weight);
                            }
                            Err(_) => tracing::warn!(
                                key = %key,
                                value = %value,
                                "Ignoring unparseable weight override"
                            ),
                        }
                    }
                }
            }
        }
    }
}

fn set_f64(key: &str, value: &str, target: &mut f64) {
    match value.parse::<f64>() {
        Ok(v) => *target = v,
        Err(_) => {
            tracing::warn!(key = %key, value = %value, "Ignoring unparseable numeric override")
        }
    }
}

// ============================================================================
// Observability
// ============================================================================

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

// ============================================================================
// Consensus
// ============================================================================

/// Consensus aggregation configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConsensusConfig {
    /// Score cutoffs for mapping a weighted score onto the signal scale
    #[serde(default)]
    pub thresholds: ConsensusThresholds,

    /// Per-agent voting weights
    #[serde(default)]
    pub weights: AgentWeights,
}

/// Four-point threshold configuration for signal mapping.
///
/// A score maps to STRONG_BUY when `>= strong_buy`, BUY when `>= buy`,
/// HOLD when `> sell`, SELL when `> strong_sell`, otherwise STRONG_SELL.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConsensusThresholds {
    #[serde(default = "default_strong_buy")]
    pub strong_buy: f64,
    #[serde(default = "default_buy")]
    pub buy: f64,
    #[serde(default = "default_sell")]
    pub sell: f64,
    #[serde(default = "default_strong_sell")]
    pub strong_sell: f64,
}

impl Default for ConsensusThresholds {
    fn default() -> Self {
        Self {
            strong_buy: default_strong_buy(),
            buy: default_buy(),
            sell: default_sell(),
            strong_sell: default_strong_sell(),
        }
    }
}

/// Built-in agent roster weights, consulted when an agent has no explicit entry.
pub const DEFAULT_AGENT_WEIGHTS: &[(&str, f64)] = &[
    // Investors
    ("buffett", 2.0),
    ("munger", 1.8),
    ("graham", 1.5),
    ("damodaran", 1.5),
    ("ackman", 1.2),
    ("wood", 1.0),
    ("burry", 1.3),
    ("pabrai", 1.2),
    ("lynch", 1.5),
    ("fisher", 1.3),
    ("jhunjhunwala", 1.0),
    ("druckenmiller", 1.5),
    ("simons", 1.8),
    // Specialists
    ("valuation", 1.5),
    ("fundamentals", 1.5),
    ("technicals", 1.0),
    ("sentiment", 0.8),
    ("risk", 1.2),
    ("portfolio", 1.0),
    ("political", 1.1),
];

/// Agent weight table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentWeights {
    /// Weight for agents that appear neither in `agents` nor in the built-in roster
    #[serde(default = "default_agent_weight")]
    pub default_weight: f64,

    /// Explicit per-agent weights, keyed by lower-case agent id
    #[serde(default)]
    pub agents: HashMap<String, f64>,
}

impl Default for AgentWeights {
    fn default() -> Self {
        Self {
            default_weight: default_agent_weight(),
            agents: HashMap::new(),
        }
    }
}

impl AgentWeights {
    /// Resolve the weight for an agent id (case-insensitive).
    pub fn get_weight(&self, agent_id: &str) -> f64 {
        let key = agent_id.trim().to_lowercase();
        if let Some(weight) = self.agents.get(&key) {
            return *weight;
        }
        DEFAULT_AGENT_WEIGHTS
            .iter()
            .find(|(id, _)| *id == key)
            .map(|(_, weight)| *weight)
            .unwrap_or(self.default_weight)
    }
}

// ============================================================================
// Backtest
// ============================================================================

/// Backtest defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestSettings {
    /// Starting cash
    #[serde(default = "default_initial_capital")]
    pub initial_capital: f64,

    /// Slippage applied to each fill, in percent (0.1 = 0.1%)
    #[serde(default = "default_slippage_pct")]
    pub slippage_pct: f64,

    /// Benchmark symbol
    #[serde(default = "default_benchmark")]
    pub benchmark: String,

    /// Annual risk-free rate as a fraction (0.04 = 4%)
    #[serde(default = "default_risk_free_rate")]
    pub risk_free_rate: f64,

    /// Confidence level for historical VaR
    #[serde(default = "default_var_confidence")]
    pub var_confidence: f64,

    /// Below this many recorded signals the coordinator falls back to simulated ones
    #[serde(default = "default_min_recorded_signals")]
    pub min_recorded_signals: usize,

    /// Target number of snapshots kept when down-sampling for output
    #[serde(default = "default_snapshot_sample_points")]
    pub snapshot_sample_points: usize,
}

impl Default for BacktestSettings {
    fn default() -> Self {
        Self {
            initial_capital: default_initial_capital(),
            slippage_pct: default_slippage_pct(),
            benchmark: default_benchmark(),
            risk_free_rate: default_risk_free_rate(),
            var_confidence: default_var_confidence(),
            min_recorded_signals: default_min_recorded_signals(),
            snapshot_sample_points: default_snapshot_sample_points(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "pretty".into()
}
fn default_strong_buy() -> f64 {
    60.0
}
fn default_buy() -> f64 {
    20.0
}
fn default_sell() -> f64 {
    -20.0
}
fn default_strong_sell() -> f64 {
    -60.0
}
fn default_agent_weight() -> f64 {
    1.0
}
fn default_initial_capital() -> f64 {
    100_000.0
}
fn default_slippage_pct() -> f64 {
    0.1
}
fn default_benchmark() -> String {
    "SPY".into()
}
fn default_risk_free_rate() -> f64 {
    0.04
}
fn default_var_confidence() -> f64 {
    0.95
}
fn default_min_recorded_signals() -> usize {
    10
}
fn default_snapshot_sample_points() -> usize {
    100
}
