//! Configuration file parsing and structures.
//!
//! brewd uses a single TOML file. Every section except `[sensor]` is optional
//! and falls back to the values the brewer was calibrated with.

use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::filter::Targets;

/// Top-level configuration structure
#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,

    pub sensor: SensorConfig,

    #[serde(default)]
    pub timing: TimingConfig,

    /// Lighting is disabled when this section is missing
    #[serde(default)]
    pub hue: Option<HueConfig>,
}

#[derive(Debug, Default, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default)]
    pub level: LogLevel,

    /// Per-target levels, e.g. `"brewd::sampler" = "debug"`
    #[serde(default)]
    pub overrides: HashMap<String, LogLevel>,
}

impl LoggingConfig {
    /// Build the subscriber filter for this config
    pub fn targets(&self) -> Targets {
        self.overrides
            .iter()
            .fold(
                Targets::new().with_default(LevelFilter::from(self.level)),
                |targets, (target, level)| {
                    targets.with_target(target.clone(), LevelFilter::from(*level))
                },
            )
    }
}

fn default_sensor_timeout() -> f64 {
    3.0
}

fn default_connect_attempts() -> u32 {
    5
}

/// Smart plug that measures the brewer
#[derive(Debug, Clone, Deserialize)]
pub struct SensorConfig {
    /// Endpoint returning JSON with a `power` (or `apower`) field in watts
    pub url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_sensor_timeout")]
    pub timeout_secs: f64,

    /// Reachability attempts at startup before giving up
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,
}

impl SensorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_secs)
    }
}

/// What to do after a zero reading while the brewer is already off
#[derive(Debug, Default, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IdlePolicy {
    /// Sample again straight away
    #[default]
    Spin,
    /// Wait a full cadence like every other branch
    Cadence,
}

fn default_measure_interval() -> f64 {
    5.0
}

fn default_drip_down() -> f64 {
    30.0
}

fn default_blink() -> f64 {
    1.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimingConfig {
    /// Gap between the two reads of a sample, and between samples
    #[serde(default = "default_measure_interval")]
    pub measure_interval_secs: f64,

    /// Delay between the heater stopping and announcing fresh coffee
    #[serde(default = "default_drip_down")]
    pub drip_down_secs: f64,

    /// Dark period of the still-brewing blink
    #[serde(default = "default_blink")]
    pub blink_secs: f64,

    #[serde(default)]
    pub idle_policy: IdlePolicy,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            measure_interval_secs: default_measure_interval(),
            drip_down_secs: default_drip_down(),
            blink_secs: default_blink(),
            idle_policy: IdlePolicy::default(),
        }
    }
}

impl TimingConfig {
    pub fn measure_interval(&self) -> Duration {
        Duration::from_secs_f64(self.measure_interval_secs)
    }

    /// Wait after an inconclusive sample: half the measure interval
    pub fn backoff(&self) -> Duration {
        self.measure_interval() / 2
    }

    pub fn drip_down(&self) -> Duration {
        Duration::from_secs_f64(self.drip_down_secs)
    }

    pub fn blink(&self) -> Duration {
        Duration::from_secs_f64(self.blink_secs)
    }
}

fn default_true() -> bool {
    true
}

/// Philips Hue bridge
#[derive(Debug, Clone, Deserialize)]
pub struct HueConfig {
    /// Enable lighting (default: true when section is present)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Bridge hostname or IP address
    #[serde(default)]
    pub bridge: String,

    /// API username issued by the bridge
    #[serde(default)]
    pub username: String,

    /// Light ids to drive; empty means every light on the bridge
    #[serde(default)]
    pub lights: Vec<String>,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(path.as_ref().to_path_buf(), e))?;

        Self::parse(&contents)
    }

    /// Parse and validate configuration from TOML source
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Hue settings, if lighting is configured and enabled
    pub fn enabled_hue(&self) -> Option<&HueConfig> {
        self.hue.as_ref().filter(|hue| hue.enabled)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let url = self.sensor.url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "sensor.url must be an http(s) URL, got '{}'",
                self.sensor.url
            )));
        }

        if self.sensor.connect_attempts == 0 {
            return Err(ConfigError::Invalid(
                "sensor.connect_attempts must be at least 1".to_string(),
            ));
        }

        let durations = [
            ("sensor.timeout_secs", self.sensor.timeout_secs),
            ("timing.measure_interval_secs", self.timing.measure_interval_secs),
            ("timing.drip_down_secs", self.timing.drip_down_secs),
            ("timing.blink_secs", self.timing.blink_secs),
        ];
        for (field, secs) in durations {
            if !secs.is_finite() || secs <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{} must be a positive number of seconds, got {}",
                    field, secs
                )));
            }
            Duration::try_from_secs_f64(secs).map_err(|e| {
                ConfigError::Invalid(format!("{} is out of range ({}): {}", field, secs, e))
            })?;
        }

        if let Some(hue) = self.enabled_hue() {
            if hue.bridge.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "hue.bridge is required when hue is enabled".to_string(),
                ));
            }
            if hue.username.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "hue.username is required when hue is enabled".to_string(),
                ));
            }
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
