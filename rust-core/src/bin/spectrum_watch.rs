//! Run the monitor against a synthetic source and report anomalies

use anyhow::{bail, Context};
use clap::Parser;
use log::{info, LevelFilter};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};
use spectrum_watch::config::{MonitorConfig, ToneConfig};
use spectrum_watch::sink::{JsonLinesSink, LogSink};
use spectrum_watch::{MonitorState, SpectrumMonitor};
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(name = "spectrum-watch", about = "Simulated spectrum monitor with anomaly scoring")]
struct Args {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Center frequency override in Hz
    #[arg(long)]
    center_freq: Option<f64>,

    /// Injected tone as OFFSET_HZ:AMPLITUDE, repeatable
    #[arg(long = "tone", value_parser = parse_tone)]
    tones: Vec<ToneConfig>,

    /// RNG seed for the synthetic source
    #[arg(long)]
    seed: Option<u64>,

    /// How long to monitor, in seconds
    #[arg(short, long, default_value_t = 5.0)]
    duration: f64,

    /// Append events as JSON lines to this file
    #[arg(long)]
    events_out: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", value_parser = parse_level)]
    log_level: LevelFilter,
}

fn parse_tone(s: &str) -> Result<ToneConfig, String> {
    let (offset, amplitude) = s
        .split_once(':')
        .ok_or_else(|| format!("expected OFFSET_HZ:AMPLITUDE, got '{}'", s))?;
    let offset_hz = offset
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("bad offset '{}': {}", offset, e))?;
    let amplitude = amplitude
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("bad amplitude '{}': {}", amplitude, e))?;
    Ok(ToneConfig {
        offset_hz,
        amplitude,
    })
}

fn parse_level(s: &str) -> Result<LevelFilter, String> {
    s.parse::<LevelFilter>()
        .map_err(|_| format!("unknown log level '{}'", s))
}

fn drain<W: std::io::Write>(
    monitor: &SpectrumMonitor,
    log_sink: &mut LogSink,
    json_sink: Option<&mut JsonLinesSink<W>>,
) {
    match json_sink {
        Some(json) => {
            let mut both = (log_sink, json);
            monitor.receiver().drain_into(&mut both);
        }
        None => {
            monitor.receiver().drain_into(log_sink);
        }
    }
}

fn run_duration(secs: f64) -> anyhow::Result<Duration> {
    if !(secs.is_finite() && secs > 0.0) {
        bail!("Duration must be a positive number of seconds");
    }
    Duration::try_from_secs_f64(secs).context("Duration is out of range")
}

fn init_logger(level: LevelFilter) -> anyhow::Result<()> {
    TermLogger::init(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )
    .context("Failed to initialize logger")
}

fn load_config(args: &Args) -> anyhow::Result<MonitorConfig> {
    let mut config = match &args.config {
        Some(path) => MonitorConfig::from_file(path)
            .with_context(|| format!("Loading {}", path.display()))?,
        None => MonitorConfig::default(),
    };

    if let Some(center) = args.center_freq {
        config.source.center_freq_hz = center;
    }
    if !args.tones.is_empty() {
        config.source.tones = args.tones.clone();
    }
    if args.seed.is_some() {
        config.source.seed = args.seed;
    }

    config.validate()?;
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logger(args.log_level)?;

    let run_for = run_duration(args.duration)?;
    let config = load_config(&args)?;
    let drain_every = config.looping.tick_interval() / 2;

    let mut monitor = SpectrumMonitor::synthetic(config)?;
    let mut log_sink = LogSink::new();
    let mut json_sink = match &args.events_out {
        Some(path) => {
            let file = File::options()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Opening {}", path.display()))?;
            Some(JsonLinesSink::new(BufWriter::new(file)))
        }
        None => None,
    };

    monitor.start()?;
    let deadline = Instant::now()
        .checked_add(run_for)
        .context("Duration is out of range")?;

    while Instant::now() < deadline && monitor.state() == MonitorState::Running {
        std::thread::sleep(drain_every);
        drain(&monitor, &mut log_sink, json_sink.as_mut());
    }

    let stopped = monitor.stop();
    drain(&monitor, &mut log_sink, json_sink.as_mut());

    if let Some(json) = json_sink.as_mut() {
        json.flush().context("Flushing event log")?;
        info!("Wrote {} events", json.written());
    }

    let stats = monitor.stats();
    info!(
        "{} ticks, {} frames, {} events, {} failed ticks, {} dropped outputs",
        stats.ticks, stats.frames, stats.events, stats.failed_ticks, stats.dropped_outputs
    );

    stopped?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_duration() {
        assert_eq!(run_duration(2.5).unwrap(), Duration::from_millis(2500));
        assert!(run_duration(0.0).is_err());
        assert!(run_duration(-1.0).is_err());
        assert!(run_duration(f64::NAN).is_err());
        assert!(run_duration(1e30).is_err());
    }

    #[test]
    fn test_parse_tone() {
        let tone = parse_tone("50000:0.1").unwrap();
        assert_eq!(tone.offset_hz, 50_000.0);
        assert_eq!(tone.amplitude, 0.1);
        assert!(parse_tone("50000").is_err());
    }
}
