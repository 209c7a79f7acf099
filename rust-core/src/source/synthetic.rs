//! Synthetic sample generation: Gaussian noise floor plus injected tones

use super::{BlockOrigin, SampleBlock, SampleSource, SourceError};
use crate::config::{SourceConfig, ToneConfig};
use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use std::f64::consts::PI;
use std::time::Duration;

/// Noise-plus-tones generator
///
/// Tone phase carries over between blocks so consecutive blocks form one
/// continuous signal.
pub struct SyntheticSource {
    rng: StdRng,
    noise: Option<Normal<f64>>,
    tones: Vec<ToneConfig>,
    phases: Vec<f64>,
    sequence: u64,
}

impl SyntheticSource {
    /// Create a generator
    ///
    /// # Arguments
    /// * `noise_std` - Standard deviation of each of I and Q
    /// * `tones` - Injected sinusoids (offset from center, linear amplitude)
    /// * `seed` - Fixed RNG seed; `None` seeds from entropy
    pub fn new(noise_std: f64, tones: Vec<ToneConfig>, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let noise = if noise_std > 0.0 {
            match Normal::new(0.0, noise_std) {
                Ok(normal) => Some(normal),
                Err(e) => {
                    log::warn!("Invalid noise level {}: {}, generating tones only", noise_std, e);
                    None
                }
            }
        } else {
            None
        };

        let phases = vec![0.0; tones.len()];

        Self {
            rng,
            noise,
            tones,
            phases,
            sequence: 0,
        }
    }

    pub fn from_config(config: &SourceConfig) -> Self {
        Self::new(config.noise_std, config.tones.clone(), config.seed)
    }

    /// Generate `block_size` samples at the given rate
    pub fn generate(&mut self, sample_rate_hz: f64, block_size: usize) -> Vec<Complex64> {
        let mut samples = vec![Complex64::new(0.0, 0.0); block_size];

        for (tone, phase) in self.tones.iter().zip(self.phases.iter_mut()) {
            let step = 2.0 * PI * tone.offset_hz / sample_rate_hz;
            for s in samples.iter_mut() {
                *s += Complex64::from_polar(tone.amplitude, *phase);
                *phase = (*phase + step).rem_euclid(2.0 * PI);
            }
        }

        if let Some(noise) = &self.noise {
            for s in samples.iter_mut() {
                s.re += noise.sample(&mut self.rng);
                s.im += noise.sample(&mut self.rng);
            }
        }

        samples
    }

    /// Generate a full block tagged with `sequence` and `origin`
    pub(crate) fn block(
        &mut self,
        center_freq_hz: f64,
        sample_rate_hz: f64,
        block_size: usize,
        sequence: u64,
        origin: BlockOrigin,
    ) -> SampleBlock {
        let samples = self.generate(sample_rate_hz, block_size);
        SampleBlock::new(samples, sample_rate_hz, center_freq_hz, sequence, origin)
    }

    pub fn tones(&self) -> &[ToneConfig] {
        &self.tones
    }
}

impl SampleSource for SyntheticSource {
    fn next_block(
        &mut self,
        center_freq_hz: f64,
        sample_rate_hz: f64,
        block_size: usize,
        _budget: Duration,
    ) -> Result<SampleBlock, SourceError> {
        let sequence = self.sequence;
        self.sequence += 1;
        Ok(self.block(
            center_freq_hz,
            sample_rate_hz,
            block_size,
            sequence,
            BlockOrigin::Synthetic,
        ))
    }

    fn name(&self) -> &str {
        "synthetic"
    }
}
