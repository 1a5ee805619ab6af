use std::error::Error;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crtmon::config::MonitorConfig;
use crtmon::controls::Controls;
use crtmon::display::{Display, TermDisplay};
use crtmon::ingest::{sample_channel, spawn_tcp_feeder};
use crtmon::input::{Controller, Input, TermInput};
use crtmon::monitor::{MonitorStats, VideoMonitor};
use crtmon::signal::{ChannelSignal, NoiseSignal, Signal, TestPattern};
use crtmon::timekeeper::{TimeKeeper, WallClock};
use crtmon::timing::{Standard, TimingConfig};
use crtmon::tube::Tube;

/// screen refresh period
const DRAW_INTERVAL: Duration = Duration::from_millis(33);
/// how often headless runs log progress
const STATS_INTERVAL: Duration = Duration::from_millis(500);
/// how long to wait for the simulation thread to notice it's been cancelled
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Source {
    /// built-in test card
    Pattern,
    /// random samples; the monitor never locks
    Noise,
    /// raw 8-bit samples from a TCP server
    Tcp,
}

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to config TOML; written with defaults if missing
    #[arg(long, default_value = "crtmon.toml")]
    config: PathBuf,

    /// Video standard (overrides config)
    #[arg(long, value_enum)]
    standard: Option<Standard>,

    /// Simulated seconds per real second, up to 1; 0 single-steps (overrides config)
    #[arg(long)]
    dilation: Option<f64>,

    /// Phosphor glow time in seconds (overrides config)
    #[arg(long)]
    glow: Option<f64>,

    /// Where the composite signal comes from
    #[arg(long, value_enum, default_value_t = Source::Pattern)]
    source: Source,

    /// Sample server for `--source tcp`
    #[arg(long, default_value = "127.0.0.1:10000")]
    addr: String,

    /// Run without a screen for this many seconds, logging statistics
    #[arg(long, value_name = "SECONDS")]
    headless: Option<f64>,
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();
    let args = Args::parse();

    // initialise
    let mut cfg = MonitorConfig::load_or_default(&args.config);
    if let Some(standard) = args.standard {
        cfg.timing.standard = standard;
    }
    if let Some(dilation) = args.dilation {
        cfg.time.dilation = dilation;
    }
    if let Some(glow) = args.glow {
        cfg.tube.glow_time = Some(glow);
    }
    let timing = Arc::new(cfg.timing()?);
    let tube = Arc::new(Tube::new(cfg.glow_time(&timing)?)?);
    let controls = Arc::new(Controls::new(cfg.dilation()?));
    let headless = args.headless.map(Duration::try_from_secs_f64).transpose()?;

    let mut feeder = None;
    let signal: Box<dyn Signal> = match args.source {
        Source::Pattern => Box::new(TestPattern::new(timing.clone())),
        Source::Noise => Box::new(NoiseSignal::new()),
        Source::Tcp => {
            let (tx, rx) = sample_channel(&timing);
            feeder = Some(spawn_tcp_feeder(args.addr.clone(), tx));
            Box::new(ChannelSignal::new(rx, timing.dot_time))
        }
    };

    let mut monitor = VideoMonitor::new(timing.clone(), tube.clone(), signal);
    let stats = monitor.stats();
    let cancel = Arc::new(AtomicBool::new(false));
    let simulation = {
        let mut keeper = TimeKeeper::new(timing.clone(), controls.clone(), WallClock::new());
        let cancel = cancel.clone();
        thread::Builder::new()
            .name("simulation".to_string())
            .spawn(move || monitor.run(&mut keeper, &cancel))?
    };

    // main loop
    let result = match headless {
        Some(length) => {
            run_headless(length, &timing, &tube, &stats);
            Ok(())
        }
        None => TermDisplay::new("composite video monitor", timing.black_level).and_then(
            |mut display| {
                let mut input = TermInput::new()?;
                present(&mut display, &mut input, &timing, &tube, &stats, controls)
            },
        ),
    };

    cancel.store(true, Ordering::Relaxed);
    shut_down(simulation, feeder);
    log_stats(&timing, &tube, &stats);
    result?;
    Ok(())
}

/// draw the tube and act on key presses until asked to quit
fn present(
    display: &mut impl Display,
    input: &mut impl Input,
    timing: &TimingConfig,
    tube: &Tube,
    stats: &MonitorStats,
    controls: Arc<Controls>,
) -> Result<(), io::Error> {
    let mut controller = Controller::new(controls.clone());
    loop {
        for cmd in input.poll_commands()? {
            if !controller.apply(cmd) {
                return Ok(());
            }
        }
        let info = format!(
            "{} frame {} x{}",
            timing.describe(),
            stats.frame_count(timing),
            controls.dilation()
        );
        display.draw(&tube.snapshot(), &info)?;
        spin_sleep::sleep(DRAW_INTERVAL);
    }
}

fn run_headless(length: Duration, timing: &TimingConfig, tube: &Tube, stats: &MonitorStats) {
    let start = Instant::now();
    while start.elapsed() < length {
        thread::sleep(STATS_INTERVAL.min(length.saturating_sub(start.elapsed())));
        log_stats(timing, tube, stats);
    }
}

fn log_stats(timing: &TimingConfig, tube: &Tube, stats: &MonitorStats) {
    let (h_locks, v_locks) = stats.locks();
    info!(
        frames = stats.frame_count(timing),
        iterations = stats.iterations(),
        dots = stats.dots(),
        lit = tube.snapshot().dot_count(),
        h_locks,
        v_locks,
        h_phase = stats.h_phase(),
        skipped = stats.skipped_time(),
        "stats"
    );
}

/// A network source can leave the simulation blocked waiting for a sample,
/// and the feeder blocked on its socket; neither gets waited on forever.
fn shut_down(simulation: JoinHandle<()>, feeder: Option<JoinHandle<Result<(), io::Error>>>) {
    let deadline = Instant::now() + SHUTDOWN_GRACE;
    while !simulation.is_finished() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }
    if !simulation.is_finished() {
        warn!("simulation still waiting on its signal; not waiting for it");
    } else if simulation.join().is_err() {
        warn!("simulation thread panicked");
    }
    if let Some(feeder) = feeder.filter(|f| f.is_finished()) {
        match feeder.join() {
            Ok(Err(e)) => warn!("sample feeder failed: {}", e),
            Err(_) => warn!("sample feeder panicked"),
            Ok(Ok(())) => {}
        }
    }
}
