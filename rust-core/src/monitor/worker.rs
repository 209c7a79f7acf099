//! Tick loop executed on the monitor's background thread

use super::queue::{DisplayQueue, MonitorOutput};
use super::{LoopFatal, Shared, TickError};
use crate::config::MonitorConfig;
use crate::scoring::AnomalyScorer;
use crate::source::{BlockOrigin, SampleSource};
use crate::spectrum::SpectrumTransform;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

/// Everything owned by the tick loop
///
/// Moved into the thread on start and handed back when the thread exits.
pub(crate) struct Worker {
    source: Box<dyn SampleSource>,
    transform: SpectrumTransform,
    scorer: AnomalyScorer,
    /// Last configuration that passed validation
    config: MonitorConfig,
    config_generation: u64,
    queue: DisplayQueue,
}

impl Worker {
    pub(crate) fn new(
        source: Box<dyn SampleSource>,
        config: MonitorConfig,
        config_generation: u64,
        queue: DisplayQueue,
    ) -> Self {
        Self {
            source,
            transform: SpectrumTransform::new(config.spectrum.clone(), config.source.block_size),
            scorer: AnomalyScorer::new(config.scoring.trend_window),
            config,
            config_generation,
            queue,
        }
    }

    /// Run ticks until the running flag clears or failures pile up
    pub(crate) fn run(mut self, shared: Arc<Shared>) -> Self {
        log::info!(
            "Monitoring {:.4} MHz from {} source",
            self.config.source.center_freq_hz / 1e6,
            self.source.name()
        );

        while shared.running.load(Ordering::SeqCst) {
            self.refresh_config(&shared);
            let interval = self.config.looping.tick_interval();

            shared.counters.ticks.fetch_add(1, Ordering::Relaxed);
            match self.tick(&shared, interval) {
                Ok(()) => shared.failures.store(0, Ordering::SeqCst),
                Err(e) => {
                    shared.counters.failed_ticks.fetch_add(1, Ordering::Relaxed);
                    let failures = shared.failures.fetch_add(1, Ordering::SeqCst) + 1;
                    let limit = self.config.looping.max_consecutive_failures;
                    log::warn!("Tick failed ({}/{}): {}", failures, limit, e);

                    if failures >= limit {
                        self.fail(&shared, LoopFatal {
                            failures,
                            last_error: e,
                        });
                        break;
                    }
                }
            }

            std::thread::sleep(interval);
        }

        log::info!("Monitor loop exited");
        self
    }

    fn tick(&mut self, shared: &Shared, budget: Duration) -> Result<(), TickError> {
        let source = &self.config.source;
        let block = self.source.next_block(
            source.center_freq_hz,
            source.sample_rate_hz,
            source.block_size,
            budget,
        )?;
        if block.origin() == BlockOrigin::Fallback {
            shared.counters.source_fallbacks.fetch_add(1, Ordering::Relaxed);
        }

        let frame = match self.transform.transform(&block) {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!(
                    "Skipping block #{} ({} samples @ {:.4} MHz, {} Hz, {:?}): {}",
                    block.sequence(),
                    block.len(),
                    block.center_freq_hz() / 1e6,
                    block.sample_rate_hz(),
                    block.origin(),
                    e
                );
                return Err(e.into());
            }
        };

        let assessment = self.scorer.assess(&frame, &self.config.scoring);
        let event = AnomalyScorer::event_for(&frame, &assessment);
        log::debug!(
            "Frame #{}: {} peaks, peak {:.1} dB, score {:.2} ({})",
            frame.sequence,
            frame.peaks.len(),
            assessment.peak_power_db,
            assessment.score,
            assessment.level
        );

        shared.counters.frames.fetch_add(1, Ordering::Relaxed);
        let mut evicted = self.queue.push(MonitorOutput::Frame(frame));
        if let Some(event) = event {
            shared.counters.events.fetch_add(1, Ordering::Relaxed);
            evicted += self.queue.push(MonitorOutput::Event(event));
        }
        if evicted > 0 {
            shared.counters.dropped_outputs.fetch_add(evicted, Ordering::Relaxed);
        }
        Ok(())
    }

    /// Adopt a newly posted configuration if it validates
    fn refresh_config(&mut self, shared: &Shared) {
        if shared.generation.load(Ordering::Acquire) == self.config_generation {
            return;
        }

        // Generation and snapshot are read under the same lock
        let (generation, candidate) = match shared.pending.lock() {
            Ok(pending) => (shared.generation.load(Ordering::Acquire), pending.clone()),
            Err(poisoned) => (
                shared.generation.load(Ordering::Acquire),
                poisoned.into_inner().clone(),
            ),
        };
        self.config_generation = generation;

        match candidate.validate() {
            Ok(()) => {
                let retuned = candidate.source.center_freq_hz != self.config.source.center_freq_hz
                    || candidate.source.sample_rate_hz != self.config.source.sample_rate_hz;
                if retuned {
                    self.scorer.reset();
                }
                self.transform
                    .reconfigure(&candidate.spectrum, candidate.source.block_size);
                log::info!("Applied configuration update #{}", generation);
                self.config = candidate;
            }
            Err(e) => {
                shared.counters.rejected_configs.fetch_add(1, Ordering::Relaxed);
                log::warn!(
                    "Rejected configuration update #{}: {}; keeping last known good",
                    generation,
                    e
                );
            }
        }
    }

    fn fail(&mut self, shared: &Shared, fatal: LoopFatal) {
        log::error!("{}", fatal);
        if let Ok(mut slot) = shared.fatal.lock() {
            *slot = Some(fatal.clone());
        }
        self.queue.push(MonitorOutput::Stopped(fatal));
        shared.running.store(false, Ordering::SeqCst);
    }

    /// Clear averaging and trend state between runs
    pub(crate) fn reset(&mut self) {
        self.transform.reset();
        self.scorer.reset();
    }
}
