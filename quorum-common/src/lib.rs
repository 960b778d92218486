//! Quorum Common - shared configuration, error types and logging.
//!
//! This crate provides:
//! - Configuration types and modular loading
//! - Configuration validation
//! - Error types and handling utilities
//! - Logging setup

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod config_loader;
pub mod error;
pub mod logging;
pub mod validation;

pub use config::{
    AgentWeights, BacktestSettings, Config, ConsensusConfig, ConsensusThresholds,
    ObservabilityConfig,
};
pub use error::{Error, Result, ResultExt};
pub use validation::{Validate, ValidationError, ValidationResult};

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::config::{AgentWeights, BacktestSettings, Config, ConsensusThresholds};
    pub use crate::error::{Error, Result, ResultExt};
    pub use crate::logging::init_logging;
    pub use crate::validation::{Validate, ValidationError};
}
