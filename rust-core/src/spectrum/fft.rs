//! FFT engine using rustfft for complex baseband samples
//!
//! Produces a center-shifted power spectrum in dB

use num_complex::Complex64;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

/// Added to |X| before taking the log
pub const EPSILON: f64 = 1e-10;

/// Power assigned to bins that come out NaN or infinite: 20*log10(EPSILON)
pub const NOISE_FLOOR_DB: f64 = -200.0;

/// FFT engine for complex-valued signals
pub struct FftEngine {
    /// FFT size (number of samples)
    fft_size: usize,

    /// Forward complex FFT plan
    fft: Arc<dyn Fft<f64>>,

    /// Scratch space reused across calls
    scratch: Vec<Complex64>,
}

impl FftEngine {
    /// Create new FFT engine
    ///
    /// # Arguments
    /// * `fft_size` - FFT size (number of samples)
    pub fn new(fft_size: usize) -> Self {
        let mut planner = FftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(fft_size);
        let scratch = vec![Complex64::new(0.0, 0.0); fft.get_inplace_scratch_len()];

        Self {
            fft_size,
            fft,
            scratch,
        }
    }

    /// Transform `buffer` in place and return the shifted magnitude in dB
    ///
    /// # Arguments
    /// * `buffer` - Windowed samples, exactly `fft_size` long
    /// * `gain` - Divisor applied to |X| before conversion (window coherent gain)
    ///
    /// # Returns
    /// `20*log10(|X|/gain + EPSILON)` with the zero-frequency bin moved to index N/2.
    /// Non-finite results are left as-is for the caller to clamp.
    pub fn magnitude_db_shifted(&mut self, buffer: &mut [Complex64], gain: f64) -> Vec<f64> {
        debug_assert_eq!(buffer.len(), self.fft_size);

        self.fft.process_with_scratch(buffer, &mut self.scratch);

        let inv_gain = if gain > 0.0 { 1.0 / gain } else { 1.0 };
        let mut power: Vec<f64> = buffer
            .iter()
            .map(|c| 20.0 * (c.norm() * inv_gain + EPSILON).log10())
            .collect();

        fft_shift(&mut power);
        power
    }

    /// Get FFT size
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Absolute frequency axis for a shifted spectrum
    ///
    /// `f[k] = center + (k - N/2) * fs / N`, strictly increasing for fs > 0.
    pub fn frequency_axis(&self, center_freq_hz: f64, sample_rate_hz: f64) -> Vec<f64> {
        let n = self.fft_size;
        let bin_width = sample_rate_hz / n as f64;
        let half = (n / 2) as f64;

        (0..n)
            .map(|k| center_freq_hz + (k as f64 - half) * bin_width)
            .collect()
    }
}

/// Move the zero-frequency bin to the center
///
/// For odd lengths the result matches the usual convention: index `k` holds
/// frequency bin `k - N/2` (integer division).
pub fn fft_shift<T>(values: &mut [T]) {
    let half = values.len() / 2;
    values.rotate_right(half);
}
