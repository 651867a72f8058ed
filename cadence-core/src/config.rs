//! Configuration management.
//!
//! Loaded once at startup from YAML and never reloaded. Each controller gets
//! an immutable [`ControllerSettings`] derived from it.

use crate::alarm::AlarmPolicy;
use crate::error::{CadenceError, Result};
use crate::paths;
use crate::policy::PolicyConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration for cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub thresholds: Thresholds,
    /// Length of one time unit in milliseconds. Intervals are counted in these.
    pub tick_ms: u64,
    pub policy: PolicyConfig,
    pub alarm: AlarmPolicy,
    pub logs: LogsConfig,
    pub telemetry: TelemetryConfig,
    /// Query expressions to monitor, one controller each.
    pub metrics: Vec<String>,
}

/// Where and how to query the metrics source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Base URL; `/api/v1/query` is appended.
    pub url: String,
    /// Per-request timeout. A timed-out fetch is a transport failure.
    pub timeout_ms: u64,
    /// Sent as `X-Script-ID` so the source can attribute query load.
    pub client_id: Option<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self { url: "http://localhost:9090".to_string(), timeout_ms: 5_000, client_id: None }
    }
}

/// Numeric policy knobs. Intervals are in ticks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Relative change (fraction) above which a transition is significant.
    pub update_threshold: f64,
    /// Absolute threshold on the metric's own unit.
    pub cumulative_threshold: f64,
    pub default_scrape_interval: u64,
    pub min_scrape_interval: u64,
    pub max_scrape_interval: u64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            update_threshold: 0.10,
            cumulative_threshold: 90.0,
            default_scrape_interval: 15,
            min_scrape_interval: 10,
            max_scrape_interval: 900,
        }
    }
}

/// Durable record log locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogsConfig {
    pub samples: PathBuf,
    pub alerts: PathBuf,
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self { samples: paths::sample_log_path(), alerts: paths::alert_log_path() }
    }
}

/// Self-metrics export.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Prometheus exporter listen address. Disabled when unset.
    pub metrics_listen: Option<SocketAddr>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            thresholds: Thresholds::default(),
            tick_ms: 1_000,
            policy: PolicyConfig::default(),
            alarm: AlarmPolicy::default(),
            logs: LogsConfig::default(),
            telemetry: TelemetryConfig::default(),
            metrics: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file.
    ///
    /// A missing file yields the defaults. The result is validated.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| CadenceError::ConfigRead { path: path.to_path_buf(), source: e })?;
        Self::from_yaml_str(&content)
    }

    /// Parse and validate configuration from YAML text.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Self = if content.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(content).map_err(|e| {
                CadenceError::invalid_config(format!("Failed to parse config: {}", e))
            })?
        };
        config.validate()?;
        Ok(config)
    }

    /// Check numeric invariants.
    pub fn validate(&self) -> Result<()> {
        let t = &self.thresholds;

        if t.min_scrape_interval == 0 {
            return Err(CadenceError::invalid_config("min_scrape_interval must be at least 1"));
        }
        if t.min_scrape_interval > t.max_scrape_interval {
            return Err(CadenceError::invalid_config(format!(
                "min_scrape_interval ({}) exceeds max_scrape_interval ({})",
                t.min_scrape_interval, t.max_scrape_interval
            )));
        }
        if t.default_scrape_interval < t.min_scrape_interval
            || t.default_scrape_interval > t.max_scrape_interval
        {
            return Err(CadenceError::invalid_config(format!(
                "default_scrape_interval ({}) must lie within [{}, {}]",
                t.default_scrape_interval, t.min_scrape_interval, t.max_scrape_interval
            )));
        }
        if !(t.update_threshold.is_finite() && t.update_threshold > 0.0) {
            return Err(CadenceError::invalid_config("update_threshold must be a positive number"));
        }
        if !(t.cumulative_threshold.is_finite() && t.cumulative_threshold > 0.0) {
            return Err(CadenceError::invalid_config(
                "cumulative_threshold must be a positive number",
            ));
        }
        if self.tick_ms == 0 {
            return Err(CadenceError::invalid_config("tick_ms must be at least 1"));
        }
        if self.source.timeout_ms == 0 {
            return Err(CadenceError::invalid_config("source.timeout_ms must be at least 1"));
        }
        if self.metrics.iter().any(|m| m.trim().is_empty()) {
            return Err(CadenceError::invalid_config("metric expressions must not be empty"));
        }
        self.policy.validate()
    }

    /// Length of one time unit.
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    /// Immutable per-controller settings derived from this config.
    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            update_threshold: self.thresholds.update_threshold,
            cumulative_threshold: self.thresholds.cumulative_threshold,
            default_interval: self.thresholds.default_scrape_interval,
            min_interval: self.thresholds.min_scrape_interval,
            max_interval: self.thresholds.max_scrape_interval,
            tick: self.tick(),
            alarm: self.alarm,
        }
    }
}

/// Everything an interval controller needs to know, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerSettings {
    pub update_threshold: f64,
    pub cumulative_threshold: f64,
    pub default_interval: u64,
    pub min_interval: u64,
    pub max_interval: u64,
    pub tick: Duration,
    pub alarm: AlarmPolicy,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Config::default().controller_settings()
    }
}

impl ControllerSettings {
    /// Clamp an interval into `[min_interval, max_interval]`.
    pub fn clamp(&self, interval: u64) -> u64 {
        interval.clamp(self.min_interval, self.max_interval)
    }

    /// Wall-clock length of `ticks` time units.
    pub fn ticks(&self, ticks: u64) -> Duration {
        self.tick.saturating_mul(u32::try_from(ticks).unwrap_or(u32::MAX))
    }
}
