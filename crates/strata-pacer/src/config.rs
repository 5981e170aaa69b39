use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

pub const CONFIG_VERSION: u32 = 1;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid config TOML: {0}")]
    Toml(String),
    #[error("unsupported config version {0}")]
    UnsupportedVersion(u32),
    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),
    #[error("pace multiplier must be finite and positive, got {0}")]
    InvalidMultiplier(f32),
}

/// On-disk form. Every field is optional and falls back to the default.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PacerConfigInput {
    pub version: u32,
    pub initial_target_kbps: Option<u32>,
    pub pace_multiplier: Option<f32>,
    pub min_tick_interval_ms: Option<u64>,
    pub max_tick_elapsed_ms: Option<u64>,
    pub max_queue_time_without_send_ms: Option<u64>,
    pub max_padding_kbps: Option<u32>,
}

/// Pacer policy. Defaults match a 5 ms pacing cadence.
#[derive(Debug, Clone, PartialEq)]
pub struct PacerConfig {
    /// Media target before the first rate update.
    pub initial_target_kbps: u32,
    /// Media budget runs at `target × pace_multiplier` to drain backlog.
    pub pace_multiplier: f32,
    /// Shortest spacing between ticks.
    pub min_tick_interval: Duration,
    /// Longest elapsed time credited to budgets by a single tick.
    pub max_tick_elapsed: Duration,
    /// After this long without a send, High and Normal packets go out
    /// regardless of budget.
    pub max_queue_time_without_send: Duration,
    /// Ceiling for padding traffic.
    pub max_padding_kbps: u32,
}

impl Default for PacerConfig {
    fn default() -> Self {
        PacerConfig {
            initial_target_kbps: 300,
            pace_multiplier: 2.5,
            min_tick_interval: Duration::from_millis(5),
            max_tick_elapsed: Duration::from_millis(30),
            max_queue_time_without_send: Duration::from_millis(30),
            max_padding_kbps: 800,
        }
    }
}

impl PacerConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        if input.trim().is_empty() {
            return Ok(PacerConfig::default());
        }
        let parsed: PacerConfigInput =
            toml::from_str(input).map_err(|e| ConfigError::Toml(e.to_string()))?;
        parsed.resolve()
    }

    /// Media budget rate for a given target.
    pub fn paced_rate_kbps(&self, target_kbps: u32) -> i64 {
        (self.pace_multiplier * target_kbps as f32) as i64
    }

    pub(crate) fn min_tick_interval_ms(&self) -> i64 {
        self.min_tick_interval.as_millis() as i64
    }

    pub(crate) fn max_tick_elapsed_ms(&self) -> i64 {
        self.max_tick_elapsed.as_millis() as i64
    }

    pub(crate) fn max_queue_time_without_send_ms(&self) -> i64 {
        self.max_queue_time_without_send.as_millis() as i64
    }
}

impl PacerConfigInput {
    pub fn resolve(self) -> Result<PacerConfig, ConfigError> {
        let version = if self.version == 0 {
            CONFIG_VERSION
        } else {
            self.version
        };
        if version != CONFIG_VERSION {
            return Err(ConfigError::UnsupportedVersion(version));
        }

        let defaults = PacerConfig::default();
        let millis = |value: Option<u64>, default: Duration, name: &'static str| match value {
            Some(0) => Err(ConfigError::ZeroInterval(name)),
            Some(ms) => Ok(Duration::from_millis(ms)),
            None => Ok(default),
        };

        let pace_multiplier = self.pace_multiplier.unwrap_or(defaults.pace_multiplier);
        if !pace_multiplier.is_finite() || pace_multiplier <= 0.0 {
            return Err(ConfigError::InvalidMultiplier(pace_multiplier));
        }

        Ok(PacerConfig {
            initial_target_kbps: self
                .initial_target_kbps
                .unwrap_or(defaults.initial_target_kbps),
            pace_multiplier,
            min_tick_interval: millis(
                self.min_tick_interval_ms,
                defaults.min_tick_interval,
                "min_tick_interval_ms",
            )?,
            max_tick_elapsed: millis(
                self.max_tick_elapsed_ms,
                defaults.max_tick_elapsed,
                "max_tick_elapsed_ms",
            )?,
            max_queue_time_without_send: millis(
                self.max_queue_time_without_send_ms,
                defaults.max_queue_time_without_send,
                "max_queue_time_without_send_ms",
            )?,
            max_padding_kbps: self.max_padding_kbps.unwrap_or(defaults.max_padding_kbps),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_gives_defaults() {
        let cfg = PacerConfig::from_toml_str("  \n").unwrap();
        assert_eq!(cfg, PacerConfig::default());
        assert_eq!(cfg.min_tick_interval, Duration::from_millis(5));
        assert_eq!(cfg.max_tick_elapsed, Duration::from_millis(30));
        assert_eq!(cfg.max_queue_time_without_send, Duration::from_millis(30));
        assert_eq!(cfg.max_padding_kbps, 800);
    }

    #[test]
    fn parse_toml_config_overrides() {
        let toml = r#"
            version = 1
            initial_target_kbps = 1200
            pace_multiplier = 1.0
            min_tick_interval_ms = 2
            max_padding_kbps = 400
        "#;

        let cfg = PacerConfig::from_toml_str(toml).unwrap();
        assert_eq!(cfg.initial_target_kbps, 1200);
        assert_eq!(cfg.pace_multiplier, 1.0);
        assert_eq!(cfg.min_tick_interval, Duration::from_millis(2));
        assert_eq!(cfg.max_padding_kbps, 400);
        // untouched fields keep their defaults
        assert_eq!(cfg.max_tick_elapsed, Duration::from_millis(30));
    }

    #[test]
    fn rejects_unknown_version() {
        let err = PacerConfig::from_toml_str("version = 7").unwrap_err();
        assert_eq!(err, ConfigError::UnsupportedVersion(7));
    }

    #[test]
    fn rejects_zero_interval() {
        let err = PacerConfig::from_toml_str("max_tick_elapsed_ms = 0").unwrap_err();
        assert_eq!(err, ConfigError::ZeroInterval("max_tick_elapsed_ms"));
    }

    #[test]
    fn rejects_non_positive_multiplier() {
        let err = PacerConfig::from_toml_str("pace_multiplier = -1.5").unwrap_err();
        assert_eq!(err, ConfigError::InvalidMultiplier(-1.5));
    }

    #[test]
    fn rejects_malformed_toml() {
        let err = PacerConfig::from_toml_str("pace_multiplier = ").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn paced_rate_applies_multiplier() {
        let cfg = PacerConfig {
            pace_multiplier: 2.5,
            ..PacerConfig::default()
        };
        assert_eq!(cfg.paced_rate_kbps(400), 1000);
    }
}
