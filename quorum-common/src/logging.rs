//! Logging utilities.
//!
//! Provides structured logging through `tracing-subscriber`, with either a
//! JSON or a human-readable formatter.
//!
//! # Noise Filtering
//!
//! The configured level applies to the Quorum crates only; every other
//! target is held at `warn` so business logs stay readable at `debug`.
//! Setting `RUST_LOG` overrides the whole filter.

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Crates whose logs follow the configured level.
pub const APP_MODULES: &[&str] = &["quorum_common", "quorum_trading"];

/// Build the filter directive string with noise suppression.
fn build_directives(log_level: &str) -> String {
    let others = if log_level == "error" { "error" } else { "warn" };
    let mut directives = String::from(others);

    for module in APP_MODULES {
        directives.push_str(&format!(",{}={}", module, log_level));
    }

    directives
}

/// Build the default EnvFilter with noise suppression.
fn build_filter(log_level: &str) -> EnvFilter {
    // Environment variable wins
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    EnvFilter::new(build_directives(log_level))
}

/// Initialize logging with the given configuration.
///
/// # Arguments
///
/// * `log_level` - Base log level (trace, debug, info, warn, error)
/// * `log_format` - Output format: "json" for structured JSON, anything else for pretty output
///
/// Calling this more than once is harmless; later calls are ignored.
pub fn init_logging(log_level: &str, log_format: &str) {
    let filter = build_filter(log_level);

    let subscriber = tracing_subscriber::registry().with(filter);

    if log_format == "json" {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_span_events(FmtSpan::CLOSE)
            .with_current_span(true)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_writer(std::io::stderr);
        let _ = subscriber.with(fmt_layer).try_init();
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_ansi(true)
            .with_target(true)
            .with_file(false)
            .with_line_number(false)
            .with_writer(std::io::stderr);
        let _ = subscriber.with(fmt_layer).try_init();
    }

    tracing::debug!(
        log_level = %log_level,
        log_format = %log_format,
        app_modules = APP_MODULES.len(),
        "Logging initialized"
    );
}

/// Generate a new run ID for tagging one aggregation or backtest run.
pub fn generate_run_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
