//! Spectrum Watch - simulated spectrum monitoring core
//!
//! Sample source → spectrum transform → anomaly scorer → display sink,
//! run on a background tick loop.

pub mod config;
pub mod monitor;
pub mod scoring;
pub mod sink;
pub mod source;
pub mod spectrum;

pub use config::{ConfigError, MonitorConfig};
pub use monitor::{LoopFatal, MonitorError, MonitorOutput, MonitorState, SpectrumMonitor};
pub use scoring::{AnomalyEvent, AnomalyScorer, ThreatLevel};
pub use sink::DisplaySink;
pub use source::{SampleBlock, SampleSource, SyntheticSource};
pub use spectrum::{SpectrumFrame, SpectrumTransform};
