//! Sample acquisition: synthetic generator and device-backed source

pub mod device;
pub mod synthetic;

pub use device::{DeviceSource, SampleDevice};
pub use synthetic::SyntheticSource;

use num_complex::Complex64;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    #[error("Device read failed: {0}")]
    Device(String),

    #[error("Device returned {got} samples, expected {expected}")]
    ShortRead { expected: usize, got: usize },

    #[error("Device read took {elapsed:?}, budget was {budget:?}")]
    Timeout { elapsed: Duration, budget: Duration },
}

/// Where a block's samples came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockOrigin {
    /// Read from a device
    Device,
    /// Generated by a synthetic source
    Synthetic,
    /// Generated because a device read failed
    Fallback,
}

/// One tick's worth of complex samples
///
/// Immutable once built; the transform reads it and it is dropped afterwards.
#[derive(Debug, Clone)]
pub struct SampleBlock {
    samples: Vec<Complex64>,
    sample_rate_hz: f64,
    center_freq_hz: f64,
    sequence: u64,
    origin: BlockOrigin,
}

impl SampleBlock {
    pub fn new(
        samples: Vec<Complex64>,
        sample_rate_hz: f64,
        center_freq_hz: f64,
        sequence: u64,
        origin: BlockOrigin,
    ) -> Self {
        Self {
            samples,
            sample_rate_hz,
            center_freq_hz,
            sequence,
            origin,
        }
    }

    pub fn samples(&self) -> &[Complex64] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn sample_rate_hz(&self) -> f64 {
        self.sample_rate_hz
    }

    pub fn center_freq_hz(&self) -> f64 {
        self.center_freq_hz
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn origin(&self) -> BlockOrigin {
        self.origin
    }
}

/// Produces one block per tick
pub trait SampleSource: Send {
    /// Produce the next block
    ///
    /// # Arguments
    /// * `center_freq_hz` - Nominal center frequency
    /// * `sample_rate_hz` - Sample rate
    /// * `block_size` - Number of complex samples
    /// * `budget` - Time the call may take (one tick period)
    fn next_block(
        &mut self,
        center_freq_hz: f64,
        sample_rate_hz: f64,
        block_size: usize,
        budget: Duration,
    ) -> Result<SampleBlock, SourceError>;

    /// Short name for logs
    fn name(&self) -> &str;
}

impl<S: SampleSource + ?Sized> SampleSource for Box<S> {
    fn next_block(
        &mut self,
        center_freq_hz: f64,
        sample_rate_hz: f64,
        block_size: usize,
        budget: Duration,
    ) -> Result<SampleBlock, SourceError> {
        (**self).next_block(center_freq_hz, sample_rate_hz, block_size, budget)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
