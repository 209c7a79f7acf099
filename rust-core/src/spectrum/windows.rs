//! Window functions for spectral analysis
//!
//! Tapers a sample block before the DFT to reduce spectral leakage

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Window function types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowType {
    /// Hann window: w[n] = 0.5 - 0.5*cos(2πn/(M-1))
    /// Sidelobe attenuation: ~31 dB, rolloff 18 dB/octave
    #[default]
    Hann,

    /// Hamming window: w[n] = 0.54 - 0.46*cos(2πn/(M-1))
    Hamming,

    /// Blackman window: w[n] = 0.42 - 0.5*cos(2πn/(M-1)) + 0.08*cos(4πn/(M-1))
    Blackman,

    /// Rectangular window (no windowing)
    Rectangular,
}

impl WindowType {
    /// Coefficient for sample `n` of an `m`-point window
    fn coefficient(self, n: usize, m: usize) -> f64 {
        if m < 2 {
            return 1.0;
        }
        let angle = 2.0 * PI * n as f64 / (m - 1) as f64;
        match self {
            WindowType::Hann => 0.5 - 0.5 * angle.cos(),
            WindowType::Hamming => 0.54 - 0.46 * angle.cos(),
            WindowType::Blackman => 0.42 - 0.5 * angle.cos() + 0.08 * (2.0 * angle).cos(),
            WindowType::Rectangular => 1.0,
        }
    }
}

/// Generate window coefficients
///
/// # Arguments
/// * `window_type` - Type of window function
/// * `length` - Number of samples (M)
///
/// # Returns
/// Vector of window coefficients w[n] for n = 0..M-1
pub fn generate_window(window_type: WindowType, length: usize) -> Vec<f64> {
    (0..length)
        .map(|n| window_type.coefficient(n, length))
        .collect()
}

/// Precomputed window of a fixed length
#[derive(Debug, Clone)]
pub struct Window {
    window_type: WindowType,
    coefficients: Vec<f64>,
    coherent_gain: f64,
}

impl Window {
    pub fn new(window_type: WindowType, length: usize) -> Self {
        let coefficients = generate_window(window_type, length);
        let coherent_gain = coefficients.iter().sum();

        Self {
            window_type,
            coefficients,
            coherent_gain,
        }
    }

    /// Multiply `samples` by the window in place
    ///
    /// `samples` must have the window's length; extra samples are left untouched.
    pub fn apply(&self, samples: &mut [Complex64]) {
        for (s, &w) in samples.iter_mut().zip(self.coefficients.iter()) {
            *s *= w;
        }
    }

    /// Sum of the coefficients
    ///
    /// Dividing a DFT bin by this maps a tone of amplitude A back to A.
    pub fn coherent_gain(&self) -> f64 {
        self.coherent_gain
    }

    pub fn window_type(&self) -> WindowType {
        self.window_type
    }

    pub fn len(&self) -> usize {
        self.coefficients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coefficients.is_empty()
    }
}
