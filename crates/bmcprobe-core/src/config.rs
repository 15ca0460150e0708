//! Immutable run configuration.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::engine::EngineConfig;
use crate::error::ConfigError;

/// What to do when discovery finds nothing to sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyDiscoveryPolicy {
    /// Abort before sampling.
    #[default]
    Fatal,
    /// Log a warning and run anyway, producing an empty store.
    Warn,
}

impl FromStr for EmptyDiscoveryPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fatal" => Ok(Self::Fatal),
            "warn" | "warning" => Ok(Self::Warn),
            other => Err(ConfigError::new(
                "on_empty",
                format!("expected `fatal` or `warn`, got `{other}`"),
            )),
        }
    }
}

impl fmt::Display for EmptyDiscoveryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fatal => write!(f, "fatal"),
            Self::Warn => write!(f, "warn"),
        }
    }
}

/// Everything a collection run needs, fixed before the first request.
#[derive(Debug, Clone)]
pub struct CollectConfig {
    pub duration: Duration,
    pub sample_hz: f64,
    pub max_workers: usize,
    pub request_timeout: Duration,
    pub on_empty: EmptyDiscoveryPolicy,
    pub output_dir: PathBuf,
    pub verify_tls: bool,
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(300),
            sample_hz: 1.0,
            max_workers: 8,
            request_timeout: Duration::from_secs(10),
            on_empty: EmptyDiscoveryPolicy::Fatal,
            output_dir: PathBuf::from("."),
            verify_tls: false,
        }
    }
}

impl CollectConfig {
    /// Build from raw command-line numbers, rejecting non-positive values.
    pub fn from_args(
        collect_duration_secs: i64,
        sample_hz: f64,
        max_workers: usize,
        request_timeout_secs: f64,
    ) -> Result<Self, ConfigError> {
        if collect_duration_secs <= 0 {
            return Err(ConfigError::new(
                "collect_duration",
                format!("must be a positive number of seconds, got {collect_duration_secs}"),
            ));
        }
        if !request_timeout_secs.is_finite() || request_timeout_secs <= 0.0 {
            return Err(ConfigError::new(
                "request_timeout",
                format!("must be positive, got {request_timeout_secs}"),
            ));
        }
        let request_timeout = Duration::try_from_secs_f64(request_timeout_secs).map_err(|_| {
            ConfigError::new(
                "request_timeout",
                format!("{request_timeout_secs} seconds is out of range"),
            )
        })?;
        let config = Self {
            duration: Duration::from_secs(collect_duration_secs as u64),
            sample_hz,
            max_workers,
            request_timeout,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.duration.is_zero() {
            return Err(ConfigError::new("collect_duration", "must be greater than zero"));
        }
        if !self.sample_hz.is_finite() || self.sample_hz <= 0.0 {
            return Err(ConfigError::new(
                "sample_hz",
                format!("must be positive, got {}", self.sample_hz),
            ));
        }
        if Duration::try_from_secs_f64(1.0 / self.sample_hz).is_err() {
            return Err(ConfigError::new(
                "sample_hz",
                format!("{} Hz gives a tick period out of range", self.sample_hz),
            ));
        }
        if self.max_workers == 0 {
            return Err(ConfigError::new("max_workers", "must be at least 1"));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::new("request_timeout", "must be greater than zero"));
        }
        Ok(())
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            duration: self.duration,
            cadence_hz: self.sample_hz,
            max_workers: self.max_workers,
        }
    }
}
