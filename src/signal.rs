use crate::timing::TimingConfig;
use crossbeam_channel::Receiver;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

/// A voltage-like value that varies over simulated time. The monitor samples
/// its composite input through this, once per dot, always with increasing
/// `time`.
pub trait Signal: Send {
    /// sample the signal at `time` (seconds)
    fn get(&mut self, time: f64) -> f64;

    /// the monitor fell behind and threw away `seconds` of simulated time;
    /// sources with a backlog should discard the same amount
    #[allow(unused)]
    fn skip(&mut self, seconds: f64) {}
}

/// lets the source be picked at run time
impl Signal for Box<dyn Signal> {
    fn get(&mut self, time: f64) -> f64 {
        (**self).get(time)
    }

    fn skip(&mut self, seconds: f64) {
        (**self).skip(seconds)
    }
}

/// a signal with a live-adjustable frequency and phase
pub trait Periodic {
    fn frequency(&self) -> f64;
    fn set_frequency(&mut self, hz: f64);
    fn phase(&self) -> f64;
    fn set_phase(&mut self, phase: f64);
}

/// rectangular pulse train: `amplitude` for `on_time` out of every period,
/// starting at `on_start`, zero otherwise
pub struct SquareSignal {
    on_start: f64,
    on_time: f64,
    off_time: f64,
    amplitude: f64,
}

impl SquareSignal {
    pub fn new(frequency: f64, on_time: f64, on_start: f64, amplitude: f64) -> Self {
        SquareSignal {
            on_start,
            on_time,
            off_time: 1.0 / frequency - on_time,
            amplitude,
        }
    }
}

impl Signal for SquareSignal {
    fn get(&mut self, time: f64) -> f64 {
        let period = self.on_time + self.off_time;
        if (time - self.on_start).rem_euclid(period) < self.on_time {
            self.amplitude
        } else {
            0.0
        }
    }
}

/// uniform noise in [0, 1); what an unplugged set shows
pub struct NoiseSignal {
    rng: StdRng,
}

impl NoiseSignal {
    pub fn new() -> Self {
        NoiseSignal {
            rng: StdRng::from_entropy(),
        }
    }

    /// repeatable noise for tests
    pub fn with_seed(seed: u64) -> Self {
        NoiseSignal {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for NoiseSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl Signal for NoiseSignal {
    fn get(&mut self, _time: f64) -> f64 {
        self.rng.gen::<f64>()
    }
}

/// level of the sync tip
const SYNC_LEVEL: f64 = 0.0;
/// porches as a fraction of the line; PAL is 5.7us and 1.65us out of 64us
const BACK_PORCH_FRACTION: f64 = 5.7 / 64.0;
const FRONT_PORCH_FRACTION: f64 = 1.65 / 64.0;
/// lines at the top of each frame given over to broad vertical pulses
const VSYNC_LINES: usize = 3;
const BAR_COUNT: f64 = 8.0;

/// Synthesised composite test card: grey-scale bars with proper line sync,
/// and broad vertical sync pulses every half line for the first few lines of
/// each frame. Bars run dark-to-light in the top half of the picture and
/// light-to-dark in the bottom half.
pub struct TestPattern {
    timing: Arc<TimingConfig>,
}

impl TestPattern {
    pub fn new(timing: Arc<TimingConfig>) -> Self {
        TestPattern { timing }
    }

    fn bars(&self, line: usize, line_pos: f64) -> f64 {
        let t = &self.timing;
        let active_start = t.h_sync_time + t.line_time * BACK_PORCH_FRACTION;
        let active_end = t.line_time * (1.0 - FRONT_PORCH_FRACTION);
        if line_pos < active_start || line_pos >= active_end {
            return t.black_level;
        }
        let x = (line_pos - active_start) / (active_end - active_start);
        let mut bar = (x * BAR_COUNT).floor() / (BAR_COUNT - 1.0);
        let lines_per_frame = t.frame_time / t.line_time;
        if line as f64 > lines_per_frame / 2.0 {
            bar = 1.0 - bar;
        }
        t.black_level + (1.0 - t.black_level) * bar.min(1.0)
    }
}

impl Signal for TestPattern {
    fn get(&mut self, time: f64) -> f64 {
        let t = &self.timing;
        let frame_pos = time.rem_euclid(t.frame_time);
        let line = (frame_pos / t.line_time) as usize;
        let line_pos = frame_pos - line as f64 * t.line_time;
        if line < VSYNC_LINES {
            let half_pos = line_pos % (t.line_time / 2.0);
            return if half_pos < t.v_sync_time {
                SYNC_LEVEL
            } else {
                t.black_level
            };
        }
        if line_pos < t.h_sync_time {
            SYNC_LEVEL
        } else {
            self.bars(line, line_pos)
        }
    }
}

/// Samples arriving from somewhere else (usually the network) as raw bytes,
/// one per dot. Blocks until the next byte turns up; once the sender goes
/// away the last value is held.
pub struct ChannelSignal {
    rx: Receiver<u8>,
    dot_time: f64,
    last: f64,
}

impl ChannelSignal {
    pub fn new(rx: Receiver<u8>, dot_time: f64) -> Self {
        ChannelSignal {
            rx,
            dot_time,
            last: 0.0,
        }
    }
}

impl Signal for ChannelSignal {
    fn get(&mut self, _time: f64) -> f64 {
        if let Ok(byte) = self.rx.recv() {
            self.last = byte as f64 / 255.0;
        }
        self.last
    }

    fn skip(&mut self, seconds: f64) {
        let samples = (seconds / self.dot_time).round() as usize;
        let dropped = self.rx.try_iter().take(samples).count();
        if dropped > 0 {
            tracing::debug!(dropped, "discarded backlog samples");
        }
    }
}

/// useful for testing; always returns the same value
pub struct DummySignal(pub f64);

impl Signal for DummySignal {
    fn get(&mut self, _time: f64) -> f64 {
        self.0
    }
}
