//! Block-to-frame spectrum transform
//!
//! Combines windowing, FFT, rolling averaging and peak detection

use super::fft::{FftEngine, NOISE_FLOOR_DB};
use super::history::PowerHistory;
use super::peaks::find_peaks;
use super::windows::Window;
use crate::config::{SpectrumConfig, MIN_BLOCK_SIZE};
use crate::source::SampleBlock;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    #[error("Block #{sequence} is empty")]
    Empty { sequence: u64 },

    #[error("Block #{sequence} has {len} samples, minimum is {min}")]
    Undersized { sequence: u64, len: usize, min: usize },

    #[error("Block #{sequence} has {got} samples, expected {expected}")]
    WrongLength {
        sequence: u64,
        expected: usize,
        got: usize,
    },

    #[error("Block #{sequence} has invalid sample rate {sample_rate_hz} Hz")]
    InvalidSampleRate { sequence: u64, sample_rate_hz: f64 },

    #[error("Block #{sequence} produced no finite power values")]
    Degenerate { sequence: u64 },
}

/// Averaged spectrum for one tick
#[derive(Debug, Clone, Serialize)]
pub struct SpectrumFrame {
    /// Absolute bin frequencies in Hz, strictly increasing
    pub frequencies: Vec<f64>,
    /// Averaged power per bin in dB, same length as `frequencies`
    pub power_db: Vec<f64>,
    /// Indices of detected peaks, ascending
    pub peaks: Vec<usize>,
    pub center_freq_hz: f64,
    pub sample_rate_hz: f64,
    /// Sequence number of the newest block folded in
    pub sequence: u64,
    /// Number of power vectors averaged
    pub averaged_over: usize,
    pub timestamp: DateTime<Utc>,
}

impl SpectrumFrame {
    pub fn len(&self) -> usize {
        self.power_db.len()
    }

    pub fn is_empty(&self) -> bool {
        self.power_db.is_empty()
    }

    /// Index and power of the strongest bin
    pub fn max_bin(&self) -> Option<(usize, f64)> {
        self.power_db
            .iter()
            .copied()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
    }

    /// Strongest detected peak, or the strongest bin when no peak was detected
    pub fn peak_power_db(&self) -> Option<f64> {
        self.peaks
            .iter()
            .map(|&i| self.power_db[i])
            .max_by(|a, b| a.total_cmp(b))
            .or_else(|| self.max_bin().map(|(_, p)| p))
    }

    /// Mean of the power vector in dB
    pub fn mean_power_db(&self) -> f64 {
        if self.power_db.is_empty() {
            return NOISE_FLOOR_DB;
        }
        self.power_db.iter().sum::<f64>() / self.power_db.len() as f64
    }

    /// Peak frequencies in Hz
    pub fn peak_frequencies(&self) -> Vec<f64> {
        self.peaks.iter().map(|&i| self.frequencies[i]).collect()
    }
}

/// Stateful transform from sample blocks to averaged spectrum frames
pub struct SpectrumTransform {
    config: SpectrumConfig,
    block_size: usize,
    window: Window,
    fft: FftEngine,
    history: PowerHistory,
    /// Center and rate of the blocks currently averaged
    tuning: Option<(f64, f64)>,
}

impl SpectrumTransform {
    /// Create a transform for blocks of `block_size` samples
    pub fn new(config: SpectrumConfig, block_size: usize) -> Self {
        Self {
            window: Window::new(config.window, block_size),
            fft: FftEngine::new(block_size),
            history: PowerHistory::new(config.averaging_window),
            tuning: None,
            block_size,
            config,
        }
    }

    /// Apply a new configuration
    ///
    /// Changing the block size, window type or averaging window starts a fresh history.
    pub fn reconfigure(&mut self, config: &SpectrumConfig, block_size: usize) {
        let reshape = block_size != self.block_size || config.window != self.config.window;
        if reshape {
            self.window = Window::new(config.window, block_size);
            self.fft = FftEngine::new(block_size);
            self.block_size = block_size;
        }
        if reshape || config.averaging_window != self.config.averaging_window {
            self.history = PowerHistory::new(config.averaging_window);
            self.tuning = None;
        }
        self.config = config.clone();
    }

    /// Transform one block into an averaged frame
    ///
    /// Malformed blocks are rejected without touching the history. A block
    /// tuned to a different center frequency or sample rate than the averaged
    /// ones starts a fresh history.
    pub fn transform(&mut self, block: &SampleBlock) -> Result<SpectrumFrame, TransformError> {
        self.check_block(block)?;

        let mut buffer = block.samples().to_vec();
        self.window.apply(&mut buffer);
        let mut power = self
            .fft
            .magnitude_db_shifted(&mut buffer, self.window.coherent_gain());

        let mut finite = 0;
        for p in power.iter_mut() {
            if p.is_finite() {
                finite += 1;
            } else {
                *p = NOISE_FLOOR_DB;
            }
        }
        if finite == 0 {
            return Err(TransformError::Degenerate {
                sequence: block.sequence(),
            });
        }
        if finite < power.len() {
            log::debug!(
                "Block #{}: clamped {} non-finite bins to {} dB",
                block.sequence(),
                power.len() - finite,
                NOISE_FLOOR_DB
            );
        }

        let tuning = (block.center_freq_hz(), block.sample_rate_hz());
        if self.tuning.is_some_and(|current| current != tuning) {
            log::debug!(
                "Block #{}: retuned to {:.4} MHz @ {} Hz, clearing history",
                block.sequence(),
                tuning.0 / 1e6,
                tuning.1
            );
            self.history.clear();
        }
        self.tuning = Some(tuning);

        self.history.push(power);
        let averaged = self.history.mean();

        let peaks = find_peaks(
            &averaged,
            self.config.peak_threshold_db,
            self.config.peak_min_distance,
        );
        let frequencies = self
            .fft
            .frequency_axis(block.center_freq_hz(), block.sample_rate_hz());

        Ok(SpectrumFrame {
            frequencies,
            power_db: averaged,
            peaks,
            center_freq_hz: block.center_freq_hz(),
            sample_rate_hz: block.sample_rate_hz(),
            sequence: block.sequence(),
            averaged_over: self.history.len(),
            timestamp: Utc::now(),
        })
    }

    fn check_block(&self, block: &SampleBlock) -> Result<(), TransformError> {
        let sequence = block.sequence();
        if block.is_empty() {
            return Err(TransformError::Empty { sequence });
        }
        if block.len() < MIN_BLOCK_SIZE {
            return Err(TransformError::Undersized {
                sequence,
                len: block.len(),
                min: MIN_BLOCK_SIZE,
            });
        }
        if block.len() != self.block_size {
            return Err(TransformError::WrongLength {
                sequence,
                expected: self.block_size,
                got: block.len(),
            });
        }
        let rate = block.sample_rate_hz();
        if !(rate.is_finite() && rate > 0.0) {
            return Err(TransformError::InvalidSampleRate {
                sequence,
                sample_rate_hz: rate,
            });
        }
        Ok(())
    }

    /// Drop all averaged history
    pub fn reset(&mut self) {
        self.history.clear();
        self.tuning = None;
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn config(&self) -> &SpectrumConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ToneConfig;
    use crate::source::{BlockOrigin, SyntheticSource};
    use num_complex::Complex64;

    const CENTER: f64 = 433.92e6;
    const RATE: f64 = 2.0e6;

    fn tone_block(offset_hz: f64, amplitude: f64, size: usize, seed: u64) -> SampleBlock {
        let mut source = SyntheticSource::new(
            1e-3,
            vec![ToneConfig {
                offset_hz,
                amplitude,
            }],
            Some(seed),
        );
        source.block(CENTER, RATE, size, 0, BlockOrigin::Synthetic)
    }

    #[test]
    fn test_frequency_axis_increasing_for_any_size() {
        for size in [3usize, 4, 7, 64, 255, 1024] {
            let mut transform = SpectrumTransform::new(SpectrumConfig::default(), size);
            let mut source = SyntheticSource::new(1e-3, Vec::new(), Some(size as u64));
            let block = source.block(CENTER, RATE, size, 0, BlockOrigin::Synthetic);

            let frame = transform.transform(&block).unwrap();

            assert_eq!(frame.frequencies.len(), frame.power_db.len());
            assert_eq!(frame.frequencies.len(), size);
            assert!(frame.frequencies.windows(2).all(|w| w[1] > w[0]));
        }
    }

    #[test]
    fn test_single_tone_single_peak() {
        let mut transform = SpectrumTransform::new(SpectrumConfig::default(), 1024);
        let block = tone_block(50_000.0, 0.1, 1024, 11);

        let frame = transform.transform(&block).unwrap();

        assert_eq!(frame.peaks.len(), 1);
        let bin_width = RATE / 1024.0;
        let found = frame.frequencies[frame.peaks[0]];
        assert!((found - (CENTER + 50_000.0)).abs() <= bin_width);

        // Amplitude 0.1 reads close to -20 dB after coherent-gain normalization
        let peak_db = frame.power_db[frame.peaks[0]];
        assert!(peak_db > -24.0 && peak_db < -19.0);
    }

    #[test]
    fn test_negative_offset_tone() {
        let mut transform = SpectrumTransform::new(SpectrumConfig::default(), 512);
        let block = tone_block(-300_000.0, 0.05, 512, 2);

        let frame = transform.transform(&block).unwrap();

        assert_eq!(frame.peaks.len(), 1);
        let found = frame.frequencies[frame.peaks[0]];
        assert!((found - (CENTER - 300_000.0)).abs() <= RATE / 512.0);
    }

    #[test]
    fn test_noise_only_has_no_peaks() {
        let mut transform = SpectrumTransform::new(SpectrumConfig::default(), 1024);
        let mut source = SyntheticSource::new(1e-3, Vec::new(), Some(99));

        let block = source.block(CENTER, RATE, 1024, 0, BlockOrigin::Synthetic);
        let frame = transform.transform(&block).unwrap();

        assert!(frame.peaks.is_empty());
        assert!(frame.mean_power_db() < -70.0);
    }

    #[test]
    fn test_averaging_constant_input_is_idempotent() {
        let mut transform = SpectrumTransform::new(SpectrumConfig::default(), 256);
        let block = tone_block(100_000.0, 0.2, 256, 4);

        let first = transform.transform(&block).unwrap();
        let mut last = first.clone();
        for _ in 0..15 {
            last = transform.transform(&block).unwrap();
        }

        assert_eq!(last.averaged_over, 10);
        for (a, b) in first.power_db.iter().zip(last.power_db.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn test_history_bounded() {
        let config = SpectrumConfig {
            averaging_window: 4,
            ..SpectrumConfig::default()
        };
        let mut transform = SpectrumTransform::new(config, 64);
        let mut source = SyntheticSource::new(1e-3, Vec::new(), Some(1));

        for seq in 0..20 {
            let block = source.block(CENTER, RATE, 64, seq, BlockOrigin::Synthetic);
            transform.transform(&block).unwrap();
            assert!(transform.history_len() <= 4);
        }
    }

    #[test]
    fn test_rejects_malformed_blocks() {
        let mut transform = SpectrumTransform::new(SpectrumConfig::default(), 1024);

        let empty = SampleBlock::new(Vec::new(), RATE, CENTER, 1, BlockOrigin::Synthetic);
        assert_eq!(
            transform.transform(&empty).unwrap_err(),
            TransformError::Empty { sequence: 1 }
        );

        let tiny = SampleBlock::new(
            vec![Complex64::new(0.0, 0.0); 2],
            RATE,
            CENTER,
            2,
            BlockOrigin::Synthetic,
        );
        assert!(matches!(
            transform.transform(&tiny),
            Err(TransformError::Undersized { len: 2, .. })
        ));

        let short = SampleBlock::new(
            vec![Complex64::new(0.0, 0.0); 512],
            RATE,
            CENTER,
            3,
            BlockOrigin::Synthetic,
        );
        assert!(matches!(
            transform.transform(&short),
            Err(TransformError::WrongLength {
                expected: 1024,
                got: 512,
                ..
            })
        ));

        assert_eq!(transform.history_len(), 0);
    }

    #[test]
    fn test_all_nan_block_is_degenerate() {
        let mut transform = SpectrumTransform::new(SpectrumConfig::default(), 64);
        let block = SampleBlock::new(
            vec![Complex64::new(f64::NAN, f64::NAN); 64],
            RATE,
            CENTER,
            5,
            BlockOrigin::Device,
        );

        assert_eq!(
            transform.transform(&block).unwrap_err(),
            TransformError::Degenerate { sequence: 5 }
        );
        assert_eq!(transform.history_len(), 0);
    }

    #[test]
    fn test_reconfigure_block_size_clears_history() {
        let mut transform = SpectrumTransform::new(SpectrumConfig::default(), 128);
        let block = tone_block(0.0, 0.1, 128, 8);
        transform.transform(&block).unwrap();
        assert_eq!(transform.history_len(), 1);

        transform.reconfigure(&SpectrumConfig::default(), 256);
        assert_eq!(transform.history_len(), 0);
        assert_eq!(transform.block_size(), 256);

        let block = tone_block(0.0, 0.1, 256, 8);
        let frame = transform.transform(&block).unwrap();
        assert_eq!(frame.len(), 256);
    }

    #[test]
    fn test_retune_does_not_carry_old_peaks() {
        let mut transform = SpectrumTransform::new(SpectrumConfig::default(), 1024);
        let block = tone_block(50_000.0, 0.1, 1024, 21);
        for _ in 0..5 {
            let frame = transform.transform(&block).unwrap();
            assert_eq!(frame.peaks.len(), 1);
        }

        let mut quiet = SyntheticSource::new(1e-3, Vec::new(), Some(22));
        let retuned = quiet.block(868.3e6, RATE, 1024, 5, BlockOrigin::Synthetic);
        let frame = transform.transform(&retuned).unwrap();

        assert_eq!(frame.averaged_over, 1);
        assert!(frame.peaks.is_empty());
        assert!(frame.power_db.iter().all(|&p| p < -50.0));
    }

    #[test]
    fn test_rate_change_clears_history() {
        let mut transform = SpectrumTransform::new(SpectrumConfig::default(), 256);
        let mut source = SyntheticSource::new(1e-3, Vec::new(), Some(3));
        for seq in 0..3 {
            let block = source.block(CENTER, RATE, 256, seq, BlockOrigin::Synthetic);
            transform.transform(&block).unwrap();
        }
        assert_eq!(transform.history_len(), 3);

        let block = source.block(CENTER, 1.0e6, 256, 3, BlockOrigin::Synthetic);
        let frame = transform.transform(&block).unwrap();
        assert_eq!(frame.averaged_over, 1);
    }
}
