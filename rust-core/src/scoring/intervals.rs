//! Closed frequency intervals for restricted and allow lists

use super::ScoringError;
use serde::{Deserialize, Serialize};

/// Frequency range `[low_hz, high_hz]`, inclusive on both ends
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrequencyInterval {
    pub low_hz: f64,
    pub high_hz: f64,
}

impl FrequencyInterval {
    pub fn new(low_hz: f64, high_hz: f64) -> Self {
        Self { low_hz, high_hz }
    }

    pub fn contains(&self, freq_hz: f64) -> bool {
        self.low_hz <= freq_hz && freq_hz <= self.high_hz
    }

    /// Both bounds finite and ordered
    pub fn validate(&self) -> Result<(), ScoringError> {
        if !self.low_hz.is_finite() || !self.high_hz.is_finite() || self.low_hz > self.high_hz {
            return Err(ScoringError::MalformedInterval {
                low_hz: self.low_hz,
                high_hz: self.high_hz,
            });
        }
        Ok(())
    }
}

/// Linear scan; the lists are short
pub fn any_contains(intervals: &[FrequencyInterval], freq_hz: f64) -> bool {
    intervals.iter().any(|interval| interval.contains(freq_hz))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edges_inclusive() {
        let ism = FrequencyInterval::new(433.05e6, 434.79e6);

        assert!(ism.contains(433.05e6));
        assert!(ism.contains(434.79e6));
        assert!(ism.contains(433.92e6));
        assert!(!ism.contains(433.049_999e6));
        assert!(!ism.contains(434.790_001e6));
    }

    #[test]
    fn test_single_point_interval() {
        let point = FrequencyInterval::new(100e6, 100e6);
        assert!(point.validate().is_ok());
        assert!(point.contains(100e6));
    }

    #[test]
    fn test_malformed() {
        assert!(FrequencyInterval::new(2.0, 1.0).validate().is_err());
        assert!(FrequencyInterval::new(f64::NAN, 1.0).validate().is_err());
        assert!(FrequencyInterval::new(0.0, f64::INFINITY).validate().is_err());
    }

    #[test]
    fn test_any_contains() {
        let list = vec![
            FrequencyInterval::new(100e6, 101e6),
            FrequencyInterval::new(200e6, 201e6),
        ];
        assert!(any_contains(&list, 200.5e6));
        assert!(!any_contains(&list, 150e6));
        assert!(!any_contains(&[], 150e6));
    }
}
