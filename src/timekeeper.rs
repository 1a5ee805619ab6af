use crate::controls::Controls;
use crate::timing::TimingConfig;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// shortest wall-clock wait between simulation iterations
pub const QUANTUM: Duration = Duration::from_millis(5);
/// how often to look for a requested single step
pub const STEP_LATENCY: Duration = Duration::from_millis(200);

/// A monotonic clock the simulation can wait on. Abstracted so tests can run
/// in virtual time.
pub trait Clock: Send {
    /// time since the clock was created
    fn now(&self) -> Duration;

    /// block the calling thread for `duration`
    fn sleep(&mut self, duration: Duration);
}

/// the real thing; sleeps with `spin_sleep` so short quanta stay accurate
pub struct WallClock {
    origin: Instant,
}

impl WallClock {
    pub fn new() -> Self {
        WallClock {
            origin: Instant::now(),
        }
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for WallClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&mut self, duration: Duration) {
        spin_sleep::sleep(duration);
    }
}

/// useful for testing: virtual time that only moves when slept on (or when a
/// stall is injected)
#[derive(Debug, Default)]
pub struct DummyClock {
    now: Duration,
    sleeps: usize,
}

impl DummyClock {
    pub fn new() -> Self {
        DummyClock::default()
    }

    /// pretend the OS didn't schedule us for a while
    pub fn stall(&mut self, duration: Duration) {
        self.now += duration;
    }

    /// how many times something waited on this clock
    pub fn sleeps(&self) -> usize {
        self.sleeps
    }
}

impl Clock for DummyClock {
    fn now(&self) -> Duration {
        self.now
    }

    fn sleep(&mut self, duration: Duration) {
        self.now += duration;
        self.sleeps += 1;
    }
}

/// Result of one pacing call: simulated seconds to run now, and seconds of
/// backlog that were thrown away instead of being simulated.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Elapsed {
    pub simulated: f64,
    pub skipped: f64,
}

/// Decides how much simulated time each iteration of the monitor covers.
///
/// * dilation 1: real time. Waits a quantum, then reports the wall-clock time
///   since the last call. Anything more than a frame behind is skipped in
///   whole frames rather than replayed.
/// * dilation 0: single step. Waits `STEP_LATENCY`, then reports one dot per
///   requested step.
/// * anything else: slow motion or fast forward. Waits a quantum (scaled up
///   if a quantum is less than a dot) and reports the matching simulated
///   time; nothing is ever skipped.
pub struct TimeKeeper<C: Clock> {
    timing: Arc<TimingConfig>,
    controls: Arc<Controls>,
    clock: C,
    quantum: Duration,
    last: Duration,
}

impl<C: Clock> TimeKeeper<C> {
    pub fn new(timing: Arc<TimingConfig>, controls: Arc<Controls>, clock: C) -> Self {
        let last = clock.now();
        TimeKeeper {
            timing,
            controls,
            clock,
            quantum: QUANTUM,
            last,
        }
    }

    pub fn with_quantum(mut self, quantum: Duration) -> Self {
        self.quantum = quantum;
        self
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    /// wait as appropriate, then report how far to advance
    pub fn elapsed(&mut self) -> Elapsed {
        let dilation = self.controls.dilation();
        if dilation == 1.0 {
            self.real_time()
        } else if dilation == 0.0 {
            self.single_step()
        } else {
            self.dilated(dilation)
        }
    }

    fn real_time(&mut self) -> Elapsed {
        let dots = self.quantum.as_secs_f64() / self.timing.dot_time;
        let wait = if dots < 1.0 {
            self.stretched_quantum(dots)
        } else {
            self.quantum
        };
        self.clock.sleep(wait);
        let now = self.clock.now();
        let delta = now.saturating_sub(self.last).as_secs_f64();
        self.last = now;
        split_backlog(delta, self.timing.frame_time)
    }

    fn dilated(&mut self, dilation: f64) -> Elapsed {
        let real_dot_time = self.timing.dot_time / dilation;
        let dots = self.quantum.as_secs_f64() / real_dot_time;
        let simulated = if dots < 1.0 {
            self.clock.sleep(self.stretched_quantum(dots));
            self.timing.dot_time
        } else {
            self.clock.sleep(self.quantum);
            // fast forward still only covers a frame per iteration
            (dots * self.timing.dot_time).min(self.timing.frame_time)
        };
        self.last = self.clock.now();
        Elapsed {
            simulated,
            skipped: 0.0,
        }
    }

    /// Wait long enough for one whole dot when a quantum holds only `dots`.
    /// Past STEP_LATENCY this just behaves like a very slow single step.
    fn stretched_quantum(&self, dots: f64) -> Duration {
        let secs = self.quantum.as_secs_f64() / dots;
        Duration::from_secs_f64(secs.min(STEP_LATENCY.as_secs_f64()))
    }

    fn single_step(&mut self) -> Elapsed {
        self.clock.sleep(STEP_LATENCY);
        self.last = self.clock.now();
        Elapsed {
            simulated: if self.controls.take_step() {
                self.timing.dot_time
            } else {
                0.0
            },
            skipped: 0.0,
        }
    }
}

/// keep at most one frame of `delta`; the rest goes, a whole frame at a time
fn split_backlog(delta: f64, frame_time: f64) -> Elapsed {
    let excess_frames = ((delta / frame_time).ceil() - 1.0).max(0.0);
    let skipped = excess_frames * frame_time;
    if skipped > 0.0 {
        tracing::debug!(skipped, "simulation fell behind");
    }
    Elapsed {
        simulated: delta - skipped,
        skipped,
    }
}
