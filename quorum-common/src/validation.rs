//! Configuration validation.
//!
//! Checks that thresholds are ordered, weights are usable and backtest
//! defaults are within range before any run starts.

use thiserror::Error;

use crate::config::{
    AgentWeights, BacktestSettings, Config, ConsensusThresholds, ObservabilityConfig,
};

/// Configuration validation error.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Configuration conflict: {reason}")]
    Conflict { reason: String },

    #[error("Multiple validation errors: {0:?}")]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trait for validatable configuration sections.
pub trait Validate {
    /// Validate this configuration section.
    fn validate(&self) -> ValidationResult<()>;
}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the entire configuration.
    pub fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if let Err(e) = self.observability.validate() {
            errors.push(e);
        }
        if let Err(e) = self.consensus.thresholds.validate() {
            errors.push(e);
        }
        if let Err(e) = self.consensus.weights.validate() {
            errors.push(e);
        }
        if let Err(e) = self.backtest.validate() {
            errors.push(e);
        }

        if errors.is_empty() {
            Ok(())
        } else if errors.len() == 1 {
            Err(errors.remove(0))
        } else {
            Err(ValidationError::Multiple(errors))
        }
    }
}

impl Validate for ObservabilityConfig {
    fn validate(&self) -> ValidationResult<()> {
        // RUST_LOG-style directives ("info,quorum_trading=debug") start with the base level
        let base = self.log_level.split(',').next().unwrap_or_default();
        if !LOG_LEVELS.contains(&base.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_level".into(),
                reason: format!("'{}' is not one of {:?}", self.log_level, LOG_LEVELS),
            });
        }
        Ok(())
    }
}

impl Validate for ConsensusThresholds {
    fn validate(&self) -> ValidationResult<()> {
        let fields = [
            ("strong_buy", self.strong_buy),
            ("buy", self.buy),
            ("sell", self.sell),
            ("strong_sell", self.strong_sell),
        ];
        for (name, value) in fields {
            if !value.is_finite() || !(-100.0..=100.0).contains(&value) {
                return Err(ValidationError::InvalidValue {
                    field: format!("consensus.thresholds.{}", name),
                    reason: format!("{} must be within [-100, 100]", value),
                });
            }
        }

        if !(self.strong_sell <= self.sell && self.sell < self.buy && self.buy <= self.strong_buy) {
            return Err(ValidationError::Conflict {
                reason: format!(
                    "thresholds must satisfy strong_sell <= sell < buy <= strong_buy \
                     (got {}, {}, {}, {})",
                    self.strong_sell, self.sell, self.buy, self.strong_buy
                ),
            });
        }
        Ok(())
    }
}

impl Validate for AgentWeights {
    fn validate(&self) -> ValidationResult<()> {
        if !(self.default_weight.is_finite() && self.default_weight > 0.0) {
            return Err(ValidationError::InvalidValue {
                field: "consensus.weights.default_weight".into(),
                reason: "must be a positive number".into(),
            });
        }
        for (agent, weight) in &self.agents {
            if !(weight.is_finite() && *weight > 0.0) {
                return Err(ValidationError::InvalidValue {
                    field: format!("consensus.weights.agents.{}", agent),
                    reason: format!("{} is not a positive number", weight),
                });
            }
        }
        Ok(())
    }
}

impl Validate for BacktestSettings {
    fn validate(&self) -> ValidationResult<()> {
        if !(self.initial_capital.is_finite() && self.initial_capital > 0.0) {
            return Err(ValidationError::InvalidValue {
                field: "backtest.initial_capital".into(),
                reason: "must be positive".into(),
            });
        }
        if !(0.0..100.0).contains(&self.slippage_pct) {
            return Err(ValidationError::InvalidValue {
                field: "backtest.slippage_pct".into(),
                reason: format!("{} must be within [0, 100)", self.slippage_pct),
            });
        }
        if !(self.var_confidence > 0.0 && self.var_confidence < 1.0) {
            return Err(ValidationError::InvalidValue {
                field: "backtest.var_confidence".into(),
                reason: format!("{} must be within (0, 1)", self.var_confidence),
            });
        }
        if !self.risk_free_rate.is_finite() {
            return Err(ValidationError::InvalidValue {
                field: "backtest.risk_free_rate".into(),
                reason: "must be finite".into(),
            });
        }
        if self.benchmark.trim().is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "backtest.benchmark".into(),
                reason: "must not be empty".into(),
            });
        }
        Ok(())
    }
}
