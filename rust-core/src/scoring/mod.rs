//! Heuristic anomaly scoring of spectrum frames
//!
//! Additive bonuses for power, restricted bands and sudden regime change,
//! suppressed for allow-listed frequencies, clamped to [0, 1].

pub mod intervals;

pub use intervals::{any_contains, FrequencyInterval};

use crate::config::{ScoringConfig, MAX_HISTORY_FRAMES};
use crate::spectrum::SpectrumFrame;
use chrono::{DateTime, Utc};
use ringbuf::{HeapRb, Rb};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub const HIGH_POWER_BONUS: f64 = 0.5;
pub const MODERATE_POWER_BONUS: f64 = 0.3;
pub const RESTRICTED_BONUS: f64 = 0.4;
pub const REGIME_CHANGE_BONUS: f64 = 0.15;
pub const ALLOW_LIST_FACTOR: f64 = 0.1;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScoringError {
    #[error("Malformed frequency interval [{low_hz}, {high_hz}]")]
    MalformedInterval { low_hz: f64, high_hz: f64 },

    #[error("Moderate threshold {moderate_db} dB is above high threshold {high_db} dB")]
    ThresholdOrder { moderate_db: f64, high_db: f64 },

    #[error("Threshold {0} is not finite")]
    NonFiniteThreshold(f64),

    #[error("Trend window must hold at least one frame")]
    EmptyTrendWindow,

    #[error("Trend window of {window} frames exceeds the maximum of {max}")]
    TrendWindowTooLarge { window: usize, max: usize },
}

/// Severity derived from the score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreatLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl ThreatLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.7 {
            ThreatLevel::Critical
        } else if score >= 0.5 {
            ThreatLevel::High
        } else if score >= 0.3 {
            ThreatLevel::Medium
        } else {
            ThreatLevel::Low
        }
    }

    /// Whether frames at this level produce an event
    pub fn is_reportable(self) -> bool {
        self >= ThreatLevel::Medium
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ThreatLevel::Low => "low",
            ThreatLevel::Medium => "medium",
            ThreatLevel::High => "high",
            ThreatLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for ThreatLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Heuristic that contributed most to a score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyCategory {
    /// Peak above the high-power threshold
    StrongTransmitter,
    /// Center frequency inside a restricted interval
    RestrictedBand,
    /// Peak above the moderate threshold only
    ModerateEmission,
    /// Mean power jumped against the prior window
    RegimeChange,
}

impl AnomalyCategory {
    pub fn describe(self) -> &'static str {
        match self {
            AnomalyCategory::StrongTransmitter => "likely unauthorized strong transmitter",
            AnomalyCategory::RestrictedBand => "activity in restricted band",
            AnomalyCategory::ModerateEmission => "moderate emission",
            AnomalyCategory::RegimeChange => "sudden change in band power",
        }
    }
}

/// Which heuristics fired for a frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Contributions {
    pub high_power: bool,
    pub moderate_power: bool,
    pub restricted: bool,
    pub regime_change: bool,
    pub allowed: bool,
}

impl Contributions {
    /// Sum of bonuses before allow-list suppression and clamping
    pub fn additive(&self) -> f64 {
        let mut raw = 0.0;
        if self.high_power {
            raw += HIGH_POWER_BONUS;
        }
        if self.moderate_power {
            raw += MODERATE_POWER_BONUS;
        }
        if self.restricted {
            raw += RESTRICTED_BONUS;
        }
        if self.regime_change {
            raw += REGIME_CHANGE_BONUS;
        }
        raw
    }

    /// Final score in [0, 1]
    pub fn score(&self) -> f64 {
        let mut raw = self.additive();
        if self.allowed {
            raw *= ALLOW_LIST_FACTOR;
        }
        raw.clamp(0.0, 1.0)
    }

    /// Largest contributing bonus
    pub fn dominant(&self) -> Option<AnomalyCategory> {
        if self.high_power {
            Some(AnomalyCategory::StrongTransmitter)
        } else if self.restricted {
            Some(AnomalyCategory::RestrictedBand)
        } else if self.moderate_power {
            Some(AnomalyCategory::ModerateEmission)
        } else if self.regime_change {
            Some(AnomalyCategory::RegimeChange)
        } else {
            None
        }
    }
}

/// Evaluate the heuristics for one set of inputs
///
/// Both power bonuses fire when the peak clears the high threshold.
pub fn evaluate(
    peak_power_db: f64,
    center_freq_hz: f64,
    regime_change: bool,
    config: &ScoringConfig,
) -> Contributions {
    Contributions {
        high_power: peak_power_db > config.high_power_threshold_db,
        moderate_power: peak_power_db > config.moderate_power_threshold_db,
        restricted: any_contains(&config.restricted, center_freq_hz),
        regime_change,
        allowed: any_contains(&config.allowed, center_freq_hz),
    }
}

/// Score for one set of inputs, see [`evaluate`]
pub fn score(
    peak_power_db: f64,
    center_freq_hz: f64,
    regime_change: bool,
    config: &ScoringConfig,
) -> f64 {
    evaluate(peak_power_db, center_freq_hz, regime_change, config).score()
}

/// Result of scoring one frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assessment {
    pub score: f64,
    pub level: ThreatLevel,
    pub contributions: Contributions,
    pub peak_power_db: f64,
    /// Frequency of the strongest bin
    pub peak_freq_hz: f64,
    /// Recent minus prior mean power, once enough frames are recorded
    pub trend_delta_db: Option<f64>,
}

/// Record emitted for frames scored medium or above
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyEvent {
    pub timestamp: DateTime<Utc>,
    pub frequency: f64,
    pub score: f64,
    pub level: ThreatLevel,
    pub category: AnomalyCategory,
    pub description: String,
}

/// Scores frames and tracks the mean-power trend across them
pub struct AnomalyScorer {
    trend_window: usize,
    means: HeapRb<f64>,
}

impl AnomalyScorer {
    /// Create a scorer comparing the last `trend_window` frames to the prior `trend_window`
    ///
    /// The window is clamped to `1..=MAX_HISTORY_FRAMES`.
    pub fn new(trend_window: usize) -> Self {
        let trend_window = Self::clamp_window(trend_window);
        Self {
            trend_window,
            means: HeapRb::new(trend_window.saturating_mul(2)),
        }
    }

    fn clamp_window(trend_window: usize) -> usize {
        trend_window.clamp(1, MAX_HISTORY_FRAMES)
    }

    /// Score a frame and record its mean power
    pub fn assess(&mut self, frame: &SpectrumFrame, config: &ScoringConfig) -> Assessment {
        if Self::clamp_window(config.trend_window) != self.trend_window {
            *self = Self::new(config.trend_window);
        }

        self.means.push_overwrite(frame.mean_power_db());
        let trend_delta_db = self.trend_delta_db();
        let regime_change = trend_delta_db
            .map(|delta| delta.abs() > config.trend_delta_db)
            .unwrap_or(false);

        let (peak_freq_hz, max_db) = frame
            .max_bin()
            .map(|(i, p)| (frame.frequencies[i], p))
            .unwrap_or((frame.center_freq_hz, f64::NEG_INFINITY));
        let peak_power_db = frame.peak_power_db().unwrap_or(max_db);

        let contributions = evaluate(peak_power_db, frame.center_freq_hz, regime_change, config);
        let score = contributions.score();

        Assessment {
            score,
            level: ThreatLevel::from_score(score),
            contributions,
            peak_power_db,
            peak_freq_hz,
            trend_delta_db,
        }
    }

    /// Build the event for an assessment, if it is reportable
    pub fn event_for(frame: &SpectrumFrame, assessment: &Assessment) -> Option<AnomalyEvent> {
        if !assessment.level.is_reportable() {
            return None;
        }
        let category = assessment.contributions.dominant()?;

        let mut description = format!(
            "{}: peak {:.1} dB at {:.4} MHz (center {:.4} MHz)",
            category.describe(),
            assessment.peak_power_db,
            assessment.peak_freq_hz / 1e6,
            frame.center_freq_hz / 1e6,
        );
        if assessment.contributions.restricted && category != AnomalyCategory::RestrictedBand {
            description.push_str(", restricted band");
        }
        if let Some(delta) = assessment.trend_delta_db {
            if assessment.contributions.regime_change {
                description.push_str(&format!(", band power moved {:+.1} dB", delta));
            }
        }

        Some(AnomalyEvent {
            timestamp: frame.timestamp,
            frequency: assessment.peak_freq_hz,
            score: assessment.score,
            level: assessment.level,
            category,
            description,
        })
    }

    fn trend_delta_db(&self) -> Option<f64> {
        let w = self.trend_window;
        if self.means.len() < w.saturating_mul(2) {
            return None;
        }

        let values: Vec<f64> = self.means.iter().copied().collect();
        let prior = values[..w].iter().sum::<f64>() / w as f64;
        let recent = values[w..].iter().sum::<f64>() / w as f64;
        Some(recent - prior)
    }

    /// Frames currently recorded for the trend comparison
    pub fn trend_len(&self) -> usize {
        self.means.len()
    }

    pub fn reset(&mut self) {
        self.means.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CENTER: f64 = 433.92e6;

    /// 64-bin frame with a flat floor and one peak at bin 40
    fn frame(center_freq_hz: f64, floor_db: f64, peak_db: f64) -> SpectrumFrame {
        let mut power_db = vec![floor_db; 64];
        power_db[40] = peak_db;
        let frequencies = (0..64)
            .map(|k| center_freq_hz + (k as f64 - 32.0) * 1_000.0)
            .collect();

        SpectrumFrame {
            frequencies,
            power_db,
            peaks: vec![40],
            center_freq_hz,
            sample_rate_hz: 64_000.0,
            sequence: 0,
            averaged_over: 1,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_levels() {
        assert_eq!(ThreatLevel::from_score(0.0), ThreatLevel::Low);
        assert_eq!(ThreatLevel::from_score(0.29), ThreatLevel::Low);
        assert_eq!(ThreatLevel::from_score(0.3), ThreatLevel::Medium);
        assert_eq!(ThreatLevel::from_score(0.5), ThreatLevel::High);
        assert_eq!(ThreatLevel::from_score(0.7), ThreatLevel::Critical);
        assert_eq!(ThreatLevel::from_score(1.0), ThreatLevel::Critical);
        assert!(!ThreatLevel::Low.is_reportable());
        assert!(ThreatLevel::Medium.is_reportable());
    }

    #[test]
    fn test_power_bonuses_overlap() {
        let config = ScoringConfig::default();

        assert_eq!(score(-70.0, CENTER, false, &config), 0.0);
        assert!((score(-40.0, CENTER, false, &config) - 0.3).abs() < 1e-12);
        // Both the high and moderate bonuses fire
        assert!((score(-20.0, CENTER, false, &config) - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_score_monotone_in_peak_power() {
        let mut config = ScoringConfig::default();
        config.restricted = vec![FrequencyInterval::new(433.0e6, 435.0e6)];

        for regime_change in [false, true] {
            let mut previous = 0.0;
            let mut power = -120.0;
            while power <= 10.0 {
                let s = score(power, CENTER, regime_change, &config);
                assert!(s >= previous);
                assert!((0.0..=1.0).contains(&s));
                previous = s;
                power += 0.5;
            }
        }
    }

    #[test]
    fn test_restricted_contributes_regardless_of_power() {
        let mut config = ScoringConfig::default();
        config.restricted = vec![FrequencyInterval::new(433.05e6, 434.79e6)];

        for power in [-150.0, -55.0, -45.0, -10.0] {
            for freq in [433.05e6, 433.92e6, 434.79e6] {
                let c = evaluate(power, freq, false, &config);
                assert!(c.restricted);
                assert!(c.additive() >= RESTRICTED_BONUS);
            }
        }

        let outside = evaluate(-150.0, 434.8e6, false, &config);
        assert!(!outside.restricted);
    }

    #[test]
    fn test_allow_list_suppresses() {
        let mut config = ScoringConfig::default();
        config.allowed = vec![FrequencyInterval::new(433.9e6, 434.0e6)];
        config.restricted = vec![FrequencyInterval::new(433.0e6, 435.0e6)];

        // 0.5 + 0.3 + 0.4 = 1.2 before suppression
        let c = evaluate(-10.0, CENTER, false, &config);
        assert!((c.score() - 0.12).abs() < 1e-12);
        assert!(!ThreatLevel::from_score(c.score()).is_reportable());
    }

    #[test]
    fn test_clamped_to_one() {
        let mut config = ScoringConfig::default();
        config.restricted = vec![FrequencyInterval::new(433.0e6, 435.0e6)];

        assert_eq!(score(0.0, CENTER, true, &config), 1.0);
    }

    #[test]
    fn test_dominant_category() {
        let config = ScoringConfig::default();
        assert_eq!(
            evaluate(-20.0, CENTER, false, &config).dominant(),
            Some(AnomalyCategory::StrongTransmitter)
        );
        assert_eq!(
            evaluate(-45.0, CENTER, true, &config).dominant(),
            Some(AnomalyCategory::ModerateEmission)
        );
        assert_eq!(
            evaluate(-90.0, CENTER, true, &config).dominant(),
            Some(AnomalyCategory::RegimeChange)
        );
        assert_eq!(evaluate(-90.0, CENTER, false, &config).dominant(), None);
    }

    #[test]
    fn test_assess_and_event() {
        let config = ScoringConfig::default();
        let mut scorer = AnomalyScorer::new(10);
        let f = frame(CENTER, -90.0, -20.0);

        let assessment = scorer.assess(&f, &config);

        assert_eq!(assessment.level, ThreatLevel::Critical);
        assert_eq!(assessment.peak_power_db, -20.0);
        assert_eq!(assessment.peak_freq_hz, f.frequencies[40]);
        assert_eq!(assessment.trend_delta_db, None);

        let event = AnomalyScorer::event_for(&f, &assessment).unwrap();
        assert_eq!(event.category, AnomalyCategory::StrongTransmitter);
        assert_eq!(event.frequency, f.frequencies[40]);
        assert_eq!(event.level, ThreatLevel::Critical);
        assert!(event.description.contains("strong transmitter"));
    }

    #[test]
    fn test_low_frames_emit_nothing() {
        let config = ScoringConfig::default();
        let mut scorer = AnomalyScorer::new(10);
        let f = frame(CENTER, -95.0, -70.0);

        let assessment = scorer.assess(&f, &config);
        assert_eq!(assessment.level, ThreatLevel::Low);
        assert!(AnomalyScorer::event_for(&f, &assessment).is_none());
    }

    #[test]
    fn test_regime_change_detection() {
        let config = ScoringConfig::default();
        let mut scorer = AnomalyScorer::new(10);

        let quiet = frame(CENTER, -90.0, -89.0);
        let loud = frame(CENTER, -70.0, -69.0);

        for _ in 0..10 {
            let a = scorer.assess(&quiet, &config);
            assert!(!a.contributions.regime_change);
        }
        // Fewer than 20 means recorded: no comparison yet
        for _ in 0..9 {
            let a = scorer.assess(&loud, &config);
            assert_eq!(a.trend_delta_db, None);
        }

        let a = scorer.assess(&loud, &config);
        let delta = a.trend_delta_db.unwrap();
        assert!((delta - 20.0).abs() < 0.5);
        assert!(a.contributions.regime_change);
        assert!((a.score - REGIME_CHANGE_BONUS).abs() < 1e-12);
        assert_eq!(scorer.trend_len(), 20);

        // Once the history is all loud, the trend settles
        for _ in 0..10 {
            scorer.assess(&loud, &config);
        }
        let settled = scorer.assess(&loud, &config);
        assert!(!settled.contributions.regime_change);
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let mut config = ScoringConfig::default();
        config.restricted = vec![FrequencyInterval::new(433.0e6, 435.0e6)];
        let f = frame(CENTER, -90.0, -45.0);

        let a = AnomalyScorer::new(10).assess(&f, &config);
        let b = AnomalyScorer::new(10).assess(&f, &config);
        assert_eq!(a, b);
    }

    #[test]
    fn test_huge_trend_window_is_clamped() {
        let mut config = ScoringConfig::default();
        config.trend_window = usize::MAX / 2 + 1;
        let mut scorer = AnomalyScorer::new(config.trend_window);

        let f = frame(CENTER, -90.0, -89.0);
        let a = scorer.assess(&f, &config);
        assert_eq!(a.trend_delta_db, None);
        assert_eq!(scorer.trend_len(), 1);
    }
}
