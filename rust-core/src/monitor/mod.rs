//! Spectrum monitoring loop
//!
//! One background worker runs source → transform → scorer every tick and hands
//! frames and events to the display side through a bounded queue.

pub mod queue;
mod worker;

pub use queue::{display_queue, DisplayQueue, DisplayReceiver, MonitorOutput};

use crate::config::{ConfigError, MonitorConfig};
use crate::source::{SampleSource, SourceError, SyntheticSource};
use crate::spectrum::TransformError;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use thiserror::Error;
use worker::Worker;

/// Failure of a single tick
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TickError {
    #[error("source: {0}")]
    Source(#[from] SourceError),

    #[error("transform: {0}")]
    Transform(#[from] TransformError),
}

/// The loop gave up after too many consecutive failed ticks
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Monitoring stopped after {failures} consecutive failed ticks (last: {last_error})")]
pub struct LoopFatal {
    pub failures: u32,
    pub last_error: TickError,
}

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error(transparent)]
    LoopFatal(#[from] LoopFatal),

    #[error("Monitor is already running")]
    AlreadyRunning,

    #[error("Monitor worker thread panicked")]
    WorkerPanicked,

    #[error("Failed to spawn monitor thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MonitorState {
    Idle,
    Running,
}

impl fmt::Display for MonitorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorState::Idle => f.write_str("idle"),
            MonitorState::Running => f.write_str("running"),
        }
    }
}

#[derive(Default)]
pub(crate) struct Counters {
    pub(crate) ticks: AtomicU64,
    pub(crate) frames: AtomicU64,
    pub(crate) events: AtomicU64,
    pub(crate) failed_ticks: AtomicU64,
    pub(crate) source_fallbacks: AtomicU64,
    pub(crate) dropped_outputs: AtomicU64,
    pub(crate) rejected_configs: AtomicU64,
}

/// Counter snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MonitorStats {
    pub ticks: u64,
    pub frames: u64,
    pub events: u64,
    pub failed_ticks: u64,
    pub source_fallbacks: u64,
    pub dropped_outputs: u64,
    pub rejected_configs: u64,
}

/// State shared between the owner and the worker thread
pub(crate) struct Shared {
    pub(crate) running: AtomicBool,
    pub(crate) failures: AtomicU32,
    pub(crate) counters: Counters,
    /// Latest posted configuration, validated by the worker
    pub(crate) pending: Mutex<MonitorConfig>,
    pub(crate) generation: AtomicU64,
    pub(crate) fatal: Mutex<Option<LoopFatal>>,
}

/// Monitoring context: create → start → stop → dispose
pub struct SpectrumMonitor {
    shared: Arc<Shared>,
    /// Present while idle
    worker: Option<Worker>,
    /// Present while a worker thread exists
    handle: Option<JoinHandle<Worker>>,
    receiver: DisplayReceiver,
}

impl SpectrumMonitor {
    /// Create an idle monitor reading from `source`
    pub fn new<S>(config: MonitorConfig, source: S) -> Result<Self, MonitorError>
    where
        S: SampleSource + 'static,
    {
        config.validate()?;

        let (queue, receiver) = display_queue(config.looping.queue_capacity);
        let shared = Arc::new(Shared {
            running: AtomicBool::new(false),
            failures: AtomicU32::new(0),
            counters: Counters::default(),
            pending: Mutex::new(config.clone()),
            generation: AtomicU64::new(0),
            fatal: Mutex::new(None),
        });
        let worker = Worker::new(Box::new(source), config, 0, queue);

        Ok(Self {
            shared,
            worker: Some(worker),
            handle: None,
            receiver,
        })
    }

    /// Create an idle monitor with a synthetic source built from `config.source`
    pub fn synthetic(config: MonitorConfig) -> Result<Self, MonitorError> {
        let source = SyntheticSource::from_config(&config.source);
        Self::new(config, source)
    }

    /// Idle → Running
    ///
    /// Resets the consecutive-failure counter and spawns the tick loop. A
    /// worker that stopped itself is reclaimed first.
    pub fn start(&mut self) -> Result<(), MonitorError> {
        if self.shared.running.load(Ordering::SeqCst) {
            return Err(MonitorError::AlreadyRunning);
        }

        let mut worker = self.reclaim_worker()?;
        worker.reset();

        self.shared.failures.store(0, Ordering::SeqCst);
        if let Ok(mut fatal) = self.shared.fatal.lock() {
            *fatal = None;
        }
        self.shared.running.store(true, Ordering::SeqCst);

        let shared = Arc::clone(&self.shared);
        let spawned = std::thread::Builder::new()
            .name("spectrum-monitor".into())
            .spawn(move || worker.run(shared));

        match spawned {
            Ok(handle) => {
                self.handle = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.shared.running.store(false, Ordering::SeqCst);
                Err(MonitorError::Spawn(e))
            }
        }
    }

    /// Running → Idle
    ///
    /// Waits for the in-flight tick to finish. Stopping an idle monitor is a
    /// no-op. Joining a loop that already stopped itself returns its
    /// [`LoopFatal`].
    pub fn stop(&mut self) -> Result<(), MonitorError> {
        self.shared.running.store(false, Ordering::SeqCst);

        if self.handle.is_some() {
            let worker = self.reclaim_worker()?;
            self.worker = Some(worker);
            log::info!("Monitor stopped");

            if let Some(fatal) = self.last_fatal() {
                return Err(MonitorError::LoopFatal(fatal));
            }
        }
        Ok(())
    }

    /// Stop and release the monitor
    pub fn dispose(mut self) -> Result<(), MonitorError> {
        self.stop()
    }

    pub fn state(&self) -> MonitorState {
        if self.shared.running.load(Ordering::SeqCst) {
            MonitorState::Running
        } else {
            MonitorState::Idle
        }
    }

    /// Why the loop last stopped itself, cleared by `start()`
    pub fn last_fatal(&self) -> Option<LoopFatal> {
        self.shared.fatal.lock().ok().and_then(|fatal| fatal.clone())
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.shared.failures.load(Ordering::SeqCst)
    }

    /// Post a configuration for the worker to pick up at its next tick
    ///
    /// Invalid configurations are rejected by the worker, which keeps the
    /// last one that validated. Source tone and noise settings are fixed at
    /// creation; center frequency, rate and block size follow the update.
    pub fn update_config(&self, config: MonitorConfig) {
        let mut pending = match self.shared.pending.lock() {
            Ok(pending) => pending,
            Err(poisoned) => poisoned.into_inner(),
        };
        *pending = config;
        self.shared.generation.fetch_add(1, Ordering::Release);
    }

    /// Most recently posted configuration
    pub fn config(&self) -> MonitorConfig {
        match self.shared.pending.lock() {
            Ok(pending) => pending.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Display side of the output queue
    pub fn receiver(&self) -> &DisplayReceiver {
        &self.receiver
    }

    pub fn stats(&self) -> MonitorStats {
        let c = &self.shared.counters;
        MonitorStats {
            ticks: c.ticks.load(Ordering::Relaxed),
            frames: c.frames.load(Ordering::Relaxed),
            events: c.events.load(Ordering::Relaxed),
            failed_ticks: c.failed_ticks.load(Ordering::Relaxed),
            source_fallbacks: c.source_fallbacks.load(Ordering::Relaxed),
            dropped_outputs: c.dropped_outputs.load(Ordering::Relaxed),
            rejected_configs: c.rejected_configs.load(Ordering::Relaxed),
        }
    }

    fn reclaim_worker(&mut self) -> Result<Worker, MonitorError> {
        if let Some(worker) = self.worker.take() {
            return Ok(worker);
        }
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| {
                log::error!("Monitor worker thread panicked");
                MonitorError::WorkerPanicked
            }),
            None => Err(MonitorError::WorkerPanicked),
        }
    }
}

impl Drop for SpectrumMonitor {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
