//! Spectral analysis: window, FFT, rolling average, peaks

pub mod analysis;
pub mod fft;
pub mod history;
pub mod peaks;
pub mod windows;

pub use analysis::{SpectrumFrame, SpectrumTransform, TransformError};
pub use fft::FftEngine;
pub use history::PowerHistory;
pub use peaks::find_peaks;
pub use windows::{generate_window, Window, WindowType};
