//! Device-backed sample source with synthetic fallback

use super::{BlockOrigin, SampleBlock, SampleSource, SourceError, SyntheticSource};
use num_complex::Complex64;
use std::time::{Duration, Instant};

/// Receive-side contract of a radio
///
/// Implementations return exactly `block_size` samples within `timeout`, or fail.
/// The timeout must be enforced by the implementation itself: [`DeviceSource`]
/// only discards a late read after it returns, so a read that hangs stalls the
/// monitor tick.
pub trait SampleDevice: Send {
    fn read_samples(
        &mut self,
        center_freq_hz: f64,
        sample_rate_hz: f64,
        block_size: usize,
        timeout: Duration,
    ) -> Result<Vec<Complex64>, SourceError>;

    fn name(&self) -> &str;
}

/// Reads from a device, substituting synthetic blocks when a read fails
pub struct DeviceSource<D: SampleDevice> {
    device: D,
    fallback: SyntheticSource,
    sequence: u64,
    fallbacks: u64,
}

impl<D: SampleDevice> DeviceSource<D> {
    pub fn new(device: D, fallback: SyntheticSource) -> Self {
        Self {
            device,
            fallback,
            sequence: 0,
            fallbacks: 0,
        }
    }

    /// Number of blocks that were synthesized because the device failed
    pub fn fallback_count(&self) -> u64 {
        self.fallbacks
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    fn read_checked(
        &mut self,
        center_freq_hz: f64,
        sample_rate_hz: f64,
        block_size: usize,
        budget: Duration,
    ) -> Result<Vec<Complex64>, SourceError> {
        let started = Instant::now();
        let samples = self
            .device
            .read_samples(center_freq_hz, sample_rate_hz, block_size, budget)?;

        let elapsed = started.elapsed();
        if elapsed > budget {
            return Err(SourceError::Timeout { elapsed, budget });
        }
        if samples.len() != block_size {
            return Err(SourceError::ShortRead {
                expected: block_size,
                got: samples.len(),
            });
        }
        Ok(samples)
    }
}

impl<D: SampleDevice> SampleSource for DeviceSource<D> {
    fn next_block(
        &mut self,
        center_freq_hz: f64,
        sample_rate_hz: f64,
        block_size: usize,
        budget: Duration,
    ) -> Result<SampleBlock, SourceError> {
        let sequence = self.sequence;
        self.sequence += 1;

        match self.read_checked(center_freq_hz, sample_rate_hz, block_size, budget) {
            Ok(samples) => Ok(SampleBlock::new(
                samples,
                sample_rate_hz,
                center_freq_hz,
                sequence,
                BlockOrigin::Device,
            )),
            Err(e) => {
                self.fallbacks += 1;
                log::warn!(
                    "{}: {} (block #{}, {:.3} MHz), falling back to synthetic samples",
                    self.device.name(),
                    e,
                    sequence,
                    center_freq_hz / 1e6
                );
                Ok(self.fallback.block(
                    center_freq_hz,
                    sample_rate_hz,
                    block_size,
                    sequence,
                    BlockOrigin::Fallback,
                ))
            }
        }
    }

    fn name(&self) -> &str {
        self.device.name()
    }
}
