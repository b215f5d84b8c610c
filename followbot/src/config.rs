// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Runtime configuration loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file at all) yields the stock robot:
//!
//! ```toml
//! [board]
//! pwm_frequency_hz = 1000.0
//!
//! [tracking]
//! pan_gains = { kp = 250, kd = 200 }
//! power_divisor = 500.0
//! ```

use core::fmt;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::hw::pins::BoardConfig;

/// Fixed-point PD gains (1024 = unity).
#[derive(Copy, Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct Gains {
    pub kp: i32,
    pub kd: i32,
}

/// Tracking loop tuning.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrackingConfig {
    /// Image-space target for the block centre (320x200 frame).
    pub x_center: i32,
    pub y_center: i32,

    pub pan_gains: Gains,
    pub tilt_gains: Gains,

    /// Longest a single sensor poll may block.
    pub poll_timeout_ms: u64,
    /// Minimum spacing between tracking updates.
    pub min_frame_interval_ms: u64,
    /// Wheels start decaying once no target has been seen for this long.
    pub stale_after_ms: u64,
    /// Power removed from each wheel per idle cycle.
    pub decay_step: f32,
    /// Wheel speed that maps to full power.
    pub power_divisor: f32,

    /// Seed for the running target-size estimate.
    pub initial_size: i64,
    /// Interval between frame-rate log lines.
    pub stats_interval_s: u64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            x_center: 160,
            y_center: 100,
            pan_gains: Gains { kp: 200, kd: 200 },
            tilt_gains: Gains { kp: 150, kd: 200 },
            poll_timeout_ms: 10,
            min_frame_interval_ms: 20,
            stale_after_ms: 100,
            decay_step: 0.05,
            power_divisor: 400.0,
            initial_size: 400,
            stats_interval_s: 5,
        }
    }
}

impl TrackingConfig {
    /// Reject tuning that would break the loop's guarantees: decay must strictly reduce power,
    /// the divisor must map speed onto a finite power, and polls and the stale window need a
    /// non-zero length.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.decay_step > 0.0 && self.decay_step <= 1.0) {
            return Err(ConfigError::Invalid("tracking.decay_step must be in (0, 1]"));
        }
        if !(self.power_divisor.is_finite() && self.power_divisor > 0.0) {
            return Err(ConfigError::Invalid(
                "tracking.power_divisor must be positive and finite",
            ));
        }
        if self.poll_timeout_ms == 0 {
            return Err(ConfigError::Invalid("tracking.poll_timeout_ms must be non-zero"));
        }
        if self.stale_after_ms == 0 {
            return Err(ConfigError::Invalid("tracking.stale_after_ms must be non-zero"));
        }
        Ok(())
    }

    #[inline]
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    #[inline]
    pub fn min_frame_interval(&self) -> Duration {
        Duration::from_millis(self.min_frame_interval_ms)
    }

    #[inline]
    pub fn stale_after(&self) -> Duration {
        Duration::from_millis(self.stale_after_ms)
    }

    #[inline]
    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_s)
    }
}

/// Complete configuration file.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub board: BoardConfig,
    pub tracking: TrackingConfig,
}

/// Error type for loading a `Config`.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    /// A value parsed but is out of range.
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "cannot read configuration: {e}"),
            ConfigError::Parse(e) => write!(f, "invalid configuration: {e}"),
            ConfigError::Invalid(msg) => write!(f, "invalid configuration: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            ConfigError::Invalid(_) => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.tracking.validate()?;
        Ok(config)
    }
}
