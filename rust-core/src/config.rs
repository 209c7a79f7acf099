//! Monitor configuration
//!
//! Loaded from JSON; every section falls back to its defaults when omitted.

use crate::scoring::{FrequencyInterval, ScoringError};
use crate::spectrum::WindowType;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Synthetic sources inject at most this many tones
pub const MAX_TONES: usize = 3;

/// Upper bound for the averaging and trend windows
pub const MAX_HISTORY_FRAMES: usize = 10_000;

/// Smallest block the transform accepts (peak detection needs two neighbours)
pub const MIN_BLOCK_SIZE: usize = 3;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error(transparent)]
    Scoring(#[from] ScoringError),
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Injected sinusoid for synthetic sources
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToneConfig {
    /// Offset from the center frequency in Hz (may be negative)
    pub offset_hz: f64,
    /// Linear amplitude; reads as 20*log10(amplitude) dB in the spectrum
    pub amplitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub center_freq_hz: f64,
    pub sample_rate_hz: f64,
    pub block_size: usize,
    /// Standard deviation of I and Q noise
    pub noise_std: f64,
    pub tones: Vec<ToneConfig>,
    pub seed: Option<u64>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            center_freq_hz: 433.92e6,
            sample_rate_hz: 2.0e6,
            block_size: 1024,
            noise_std: 1e-3,
            tones: Vec::new(),
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrumConfig {
    /// Number of power vectors averaged into each displayed frame
    pub averaging_window: usize,
    pub peak_threshold_db: f64,
    /// Minimum index distance between accepted peaks
    pub peak_min_distance: usize,
    pub window: WindowType,
}

impl Default for SpectrumConfig {
    fn default() -> Self {
        Self {
            averaging_window: 10,
            peak_threshold_db: -60.0,
            peak_min_distance: 10,
            window: WindowType::Hann,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub high_power_threshold_db: f64,
    pub moderate_power_threshold_db: f64,
    pub restricted: Vec<FrequencyInterval>,
    pub allowed: Vec<FrequencyInterval>,
    /// Frames per side of the trend comparison
    pub trend_window: usize,
    pub trend_delta_db: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            high_power_threshold_db: -30.0,
            moderate_power_threshold_db: -50.0,
            restricted: Vec::new(),
            allowed: Vec::new(),
            trend_window: 10,
            trend_delta_db: 15.0,
        }
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<(), ScoringError> {
        for threshold in [
            self.high_power_threshold_db,
            self.moderate_power_threshold_db,
            self.trend_delta_db,
        ] {
            if !threshold.is_finite() {
                return Err(ScoringError::NonFiniteThreshold(threshold));
            }
        }
        if self.moderate_power_threshold_db > self.high_power_threshold_db {
            return Err(ScoringError::ThresholdOrder {
                moderate_db: self.moderate_power_threshold_db,
                high_db: self.high_power_threshold_db,
            });
        }
        for interval in self.restricted.iter().chain(self.allowed.iter()) {
            interval.validate()?;
        }
        if self.trend_window == 0 {
            return Err(ScoringError::EmptyTrendWindow);
        }
        if self.trend_window > MAX_HISTORY_FRAMES {
            return Err(ScoringError::TrendWindowTooLarge {
                window: self.trend_window,
                max: MAX_HISTORY_FRAMES,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    pub tick_interval_ms: u64,
    pub max_consecutive_failures: u32,
    pub queue_capacity: usize,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 100,
            max_consecutive_failures: 3,
            queue_capacity: 1000,
        }
    }
}

impl LoopConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

/// Full configuration consumed by the monitor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub source: SourceConfig,
    pub spectrum: SpectrumConfig,
    pub scoring: ScoringConfig,
    #[serde(rename = "monitor")]
    pub looping: LoopConfig,
}

impl MonitorConfig {
    /// Parse and validate a JSON document
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: MonitorConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let source = &self.source;
        if !(source.center_freq_hz.is_finite() && source.center_freq_hz >= 0.0) {
            return Err(ConfigError::invalid(
                "source.center_freq_hz",
                format!("{} is not a non-negative frequency", source.center_freq_hz),
            ));
        }
        if !(source.sample_rate_hz.is_finite() && source.sample_rate_hz > 0.0) {
            return Err(ConfigError::invalid(
                "source.sample_rate_hz",
                format!("{} must be positive", source.sample_rate_hz),
            ));
        }
        if source.block_size < MIN_BLOCK_SIZE {
            return Err(ConfigError::invalid(
                "source.block_size",
                format!("{} is below the minimum of {}", source.block_size, MIN_BLOCK_SIZE),
            ));
        }
        if !(source.noise_std.is_finite() && source.noise_std >= 0.0) {
            return Err(ConfigError::invalid(
                "source.noise_std",
                format!("{} must be finite and non-negative", source.noise_std),
            ));
        }
        if source.tones.len() > MAX_TONES {
            return Err(ConfigError::invalid(
                "source.tones",
                format!("{} tones given, at most {} supported", source.tones.len(), MAX_TONES),
            ));
        }
        if source
            .tones
            .iter()
            .any(|t| !t.offset_hz.is_finite() || !t.amplitude.is_finite())
        {
            return Err(ConfigError::invalid("source.tones", "non-finite tone parameter"));
        }

        let spectrum = &self.spectrum;
        if spectrum.averaging_window == 0 {
            return Err(ConfigError::invalid("spectrum.averaging_window", "must be at least 1"));
        }
        if spectrum.averaging_window > MAX_HISTORY_FRAMES {
            return Err(ConfigError::invalid(
                "spectrum.averaging_window",
                format!(
                    "{} exceeds the maximum of {}",
                    spectrum.averaging_window, MAX_HISTORY_FRAMES
                ),
            ));
        }
        if !spectrum.peak_threshold_db.is_finite() {
            return Err(ConfigError::invalid(
                "spectrum.peak_threshold_db",
                format!("{} is not finite", spectrum.peak_threshold_db),
            ));
        }

        self.scoring.validate()?;

        let looping = &self.looping;
        if looping.tick_interval_ms == 0 {
            return Err(ConfigError::invalid("monitor.tick_interval_ms", "must be positive"));
        }
        if looping.max_consecutive_failures == 0 {
            return Err(ConfigError::invalid(
                "monitor.max_consecutive_failures",
                "must be at least 1",
            ));
        }
        if looping.queue_capacity == 0 {
            return Err(ConfigError::invalid("monitor.queue_capacity", "must be at least 1"));
        }
        Ok(())
    }
}
