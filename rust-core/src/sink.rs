//! Display sinks fed from the monitor's output queue

use crate::monitor::LoopFatal;
use crate::scoring::{AnomalyEvent, ThreatLevel};
use crate::spectrum::SpectrumFrame;
use std::io::Write;

/// Consumer of monitor output, driven from the display side
pub trait DisplaySink {
    fn on_frame(&mut self, frame: &SpectrumFrame);

    fn on_event(&mut self, event: &AnomalyEvent);

    fn on_stopped(&mut self, fatal: &LoopFatal) {
        log::error!("{}", fatal);
    }
}

impl<S: DisplaySink + ?Sized> DisplaySink for &mut S {
    fn on_frame(&mut self, frame: &SpectrumFrame) {
        (**self).on_frame(frame);
    }

    fn on_event(&mut self, event: &AnomalyEvent) {
        (**self).on_event(event);
    }

    fn on_stopped(&mut self, fatal: &LoopFatal) {
        (**self).on_stopped(fatal);
    }
}

/// Feed both sinks, in order
impl<A: DisplaySink, B: DisplaySink> DisplaySink for (A, B) {
    fn on_frame(&mut self, frame: &SpectrumFrame) {
        self.0.on_frame(frame);
        self.1.on_frame(frame);
    }

    fn on_event(&mut self, event: &AnomalyEvent) {
        self.0.on_event(event);
        self.1.on_event(event);
    }

    fn on_stopped(&mut self, fatal: &LoopFatal) {
        self.0.on_stopped(fatal);
        self.1.on_stopped(fatal);
    }
}

/// Writes events to the log
#[derive(Debug, Default)]
pub struct LogSink {
    frames: u64,
    events: u64,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn events(&self) -> u64 {
        self.events
    }
}

impl DisplaySink for LogSink {
    fn on_frame(&mut self, frame: &SpectrumFrame) {
        self.frames += 1;
        log::debug!(
            "Frame #{} @ {:.4} MHz: peaks at {:?} MHz",
            frame.sequence,
            frame.center_freq_hz / 1e6,
            frame
                .peak_frequencies()
                .iter()
                .map(|f| (f / 1e3).round() / 1e3)
                .collect::<Vec<_>>()
        );
    }

    fn on_event(&mut self, event: &AnomalyEvent) {
        self.events += 1;
        let level = if event.level >= ThreatLevel::High {
            log::Level::Warn
        } else {
            log::Level::Info
        };
        log::log!(
            level,
            "[{}] score {:.2} {}",
            event.level,
            event.score,
            event.description
        );
    }
}

/// Appends each event as one JSON line
pub struct JsonLinesSink<W: Write> {
    writer: W,
    written: u64,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    /// Events written successfully
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_event(&mut self, event: &AnomalyEvent) -> std::io::Result<()> {
        serde_json::to_writer(&mut self.writer, event)?;
        self.writer.write_all(b"\n")
    }
}

impl<W: Write> DisplaySink for JsonLinesSink<W> {
    fn on_frame(&mut self, _frame: &SpectrumFrame) {}

    fn on_event(&mut self, event: &AnomalyEvent) {
        match self.write_event(event) {
            Ok(()) => self.written += 1,
            Err(e) => log::warn!("Failed to record event: {}", e),
        }
    }
}

/// Keeps copies of everything it receives
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub frames: Vec<SpectrumFrame>,
    pub events: Vec<AnomalyEvent>,
    pub stopped: Vec<LoopFatal>,
}

impl DisplaySink for RecordingSink {
    fn on_frame(&mut self, frame: &SpectrumFrame) {
        self.frames.push(frame.clone());
    }

    fn on_event(&mut self, event: &AnomalyEvent) {
        self.events.push(event.clone());
    }

    fn on_stopped(&mut self, fatal: &LoopFatal) {
        self.stopped.push(fatal.clone());
    }
}
