//! Modular configuration loader.
//!
//! Supports loading configuration from multiple files:
//! - `config.json` - Core configuration
//! - `thresholds.json` - Consensus signal cutoffs (merged into `consensus.thresholds`)
//! - `weights.json` - Flat `agent -> weight` map (merged into `consensus.weights.agents`)
//!
//! Files are loaded from `~/.quorum/` unless another directory is given.

use anyhow::{Context, Result};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::config_dir;

/// Load a JSON file and return its contents as a Value.
/// Returns None if file doesn't exist.
fn load_json_file(path: &Path) -> Result<Option<Value>> {
    if !path.exists() {
        return Ok(None);
    }

    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;

    let value: Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    Ok(Some(value))
}

/// Deep merge two JSON values.
/// Source values override target values, with object merging at each level.
fn merge_json(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target_map), Value::Object(source_map)) => {
            for (key, source_value) in source_map {
                match target_map.get_mut(&key) {
                    Some(target_value) => {
                        merge_json(target_value, source_value);
                    }
                    None => {
                        target_map.insert(key, source_value);
                    }
                }
            }
        }
        (target, source) => {
            *target = source;
        }
    }
}

/// Merge `overlay` into the object found at `path` inside `config`,
/// creating intermediate objects as needed.
fn merge_at(config: &mut Value, path: &[&str], overlay: Value) {
    let mut cursor = config;
    for segment in path {
        let Some(obj) = cursor.as_object_mut() else {
            return;
        };
        cursor = obj
            .entry(segment.to_string())
            .or_insert(Value::Object(Default::default()));
    }
    merge_json(cursor, overlay);
}

/// Load modular configuration from the config directory.
///
/// Priority (lowest to highest):
/// 1. `config.json`
/// 2. Modular files (`thresholds.json`, `weights.json`)
/// 3. Environment variables (applied separately)
pub fn load_modular_config(dir: Option<PathBuf>) -> Result<Value> {
    let cfg_dir = dir.unwrap_or_else(config_dir);

    let mut config = load_json_file(&cfg_dir.join("config.json"))?
        .unwrap_or(Value::Object(Default::default()));

    tracing::debug!("Loading modular config from {}", cfg_dir.display());

    if let Some(thresholds) = load_json_file(&cfg_dir.join("thresholds.json"))? {
        merge_at(&mut config, &["consensus", "thresholds"], thresholds);
        tracing::debug!("Loaded thresholds.json");
    }

    if let Some(weights) = load_json_file(&cfg_dir.join("weights.json"))? {
        // Drop meta-fields ($schema, _comment, ...) and normalise agent ids
        let filtered = match weights {
            Value::Object(obj) => Value::Object(
                obj.into_iter()
                    .filter(|(key, _)| !key.starts_with('$') && !key.starts_with('_'))
                    .map(|(k, v)| (k.to_lowercase(), v))
                    .collect(),
            ),
            other => other,
        };
        merge_at(&mut config, &["consensus", "weights", "agents"], filtered);
        tracing::debug!("Loaded weights.json");
    }

    Ok(config)
}
