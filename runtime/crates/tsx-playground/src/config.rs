//! Engine configuration
//!
//! Read-only settings for execution limits, auto-run scheduling and the
//! transpile failure policy. Persisting them is the host's job; the engine
//! only parses TOML.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct EngineConfig {
    #[serde(default)]
    pub execution: ExecutionConfig,

    #[serde(default)]
    pub auto_run: AutoRunConfig,

    #[serde(default)]
    pub transpile: TranspileConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionConfig {
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_max_output_lines")]
    pub max_output_lines: usize,

    #[serde(default = "default_max_loop_iterations")]
    pub max_loop_iterations: u64,

    /// Heap cap handed to QuickJS. Unset means the engine default.
    #[serde(default)]
    pub memory_limit_bytes: Option<usize>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            max_output_lines: default_max_output_lines(),
            max_loop_iterations: default_max_loop_iterations(),
            memory_limit_bytes: None,
        }
    }
}

impl ExecutionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_timeout_ms() -> u64 {
    5_000
}

fn default_max_output_lines() -> usize {
    1_000
}

fn default_max_loop_iterations() -> u64 {
    100_000
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AutoRunConfig {
    #[serde(default = "default_auto_run_enabled")]
    pub enabled: bool,

    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for AutoRunConfig {
    fn default() -> Self {
        Self {
            enabled: default_auto_run_enabled(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl AutoRunConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

fn default_auto_run_enabled() -> bool {
    true
}

fn default_debounce_ms() -> u64 {
    500
}

/// What to do when TypeScript fails to transpile.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TranspileFailurePolicy {
    /// Report a friendly compile error and do not run.
    #[default]
    Report,
    /// Run the original source as JavaScript.
    Fallback,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct TranspileConfig {
    #[serde(default)]
    pub on_failure: TranspileFailurePolicy,
}

impl EngineConfig {
    /// Load config from a TOML string, falling back to defaults when it
    /// does not parse.
    pub fn from_toml(toml_str: &str) -> Self {
        toml::from_str(toml_str).unwrap_or_else(|e| {
            tracing::warn!("invalid engine config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Load config from a file. Unlike [`EngineConfig::from_toml`], parse
    /// errors are returned.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Ok(toml::from_str(&text)?)
    }

    /// Serialize to TOML string
    pub fn to_toml(&self) -> Option<String> {
        toml::to_string_pretty(self).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.execution.timeout(), Duration::from_secs(5));
        assert_eq!(config.execution.max_output_lines, 1000);
        assert_eq!(config.execution.max_loop_iterations, 100_000);
        assert!(config.auto_run.enabled);
        assert_eq!(config.transpile.on_failure, TranspileFailurePolicy::Report);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml(
            r#"
            [execution]
            max_loop_iterations = 5

            [transpile]
            on_failure = "fallback"
            "#,
        );
        assert_eq!(config.execution.max_loop_iterations, 5);
        assert_eq!(config.execution.timeout_ms, 5_000);
        assert_eq!(config.auto_run.debounce_ms, 500);
        assert_eq!(config.transpile.on_failure, TranspileFailurePolicy::Fallback);
    }

    #[test]
    fn test_invalid_toml_falls_back() {
        let config = EngineConfig::from_toml("execution = [");
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_round_trip_through_toml() {
        let mut config = EngineConfig::default();
        config.auto_run.enabled = false;
        let text = config.to_toml().unwrap();
        assert_eq!(EngineConfig::from_toml(&text), config);
    }

    #[test]
    fn test_load_missing_file_is_error() {
        let err = EngineConfig::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
