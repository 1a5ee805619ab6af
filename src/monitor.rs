use crate::oscillator::Oscillator;
use crate::signal::Signal;
use crate::sync::SyncEngine;
use crate::timekeeper::{Clock, Elapsed, TimeKeeper};
use crate::timing::TimingConfig;
use crate::tube::{FrameSection, PhosphorDot, Tube};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

/// rounding allowance when working out how many dots fit in an interval
const DOT_SLACK: f64 = 1e-6;

/// dots needed to get from `start` to at least `end`; at least one if there's
/// any time to cover at all
fn dot_count(start: f64, end: f64, dot_time: f64) -> usize {
    if end <= start {
        return 0;
    }
    ((end - start) / dot_time - DOT_SLACK).ceil().max(1.0) as usize
}

/// Running totals from the simulation thread, readable from anywhere.
#[derive(Debug, Default)]
pub struct MonitorStats {
    iterations: AtomicU64,
    dots: AtomicU64,
    h_locks: AtomicU64,
    v_locks: AtomicU64,
    // f64 bits
    simulated_time: AtomicU64,
    skipped_time: AtomicU64,
    h_phase: AtomicU64,
}

impl MonitorStats {
    pub fn iterations(&self) -> u64 {
        self.iterations.load(Ordering::Relaxed)
    }

    /// dots scanned since start
    pub fn dots(&self) -> u64 {
        self.dots.load(Ordering::Relaxed)
    }

    /// accepted sync pulses, horizontal and vertical
    pub fn locks(&self) -> (u64, u64) {
        (
            self.h_locks.load(Ordering::Relaxed),
            self.v_locks.load(Ordering::Relaxed),
        )
    }

    pub fn simulated_time(&self) -> f64 {
        f64::from_bits(self.simulated_time.load(Ordering::Relaxed))
    }

    /// total time thrown away because the simulation fell behind
    pub fn skipped_time(&self) -> f64 {
        f64::from_bits(self.skipped_time.load(Ordering::Relaxed))
    }

    /// last horizontal phase correction
    pub fn h_phase(&self) -> f64 {
        f64::from_bits(self.h_phase.load(Ordering::Relaxed))
    }

    /// whole frames simulated so far
    pub fn frame_count(&self, timing: &TimingConfig) -> u64 {
        (self.simulated_time() / timing.frame_time) as u64
    }
}

/// The receiver itself: scans the composite signal onto the tube, one dot per
/// sample, with the deflection oscillators kept in step by the sync engine.
pub struct VideoMonitor<S: Signal> {
    timing: Arc<TimingConfig>,
    tube: Arc<Tube>,
    signal: S,
    h_osc: Oscillator,
    v_osc: Oscillator,
    sync: SyncEngine,
    time: f64,
    stats: Arc<MonitorStats>,
}

impl<S: Signal> VideoMonitor<S> {
    pub fn new(timing: Arc<TimingConfig>, tube: Arc<Tube>, signal: S) -> Self {
        VideoMonitor {
            h_osc: Oscillator::new(timing.h_freq),
            v_osc: Oscillator::new(timing.v_freq),
            sync: SyncEngine::new(&timing),
            timing,
            tube,
            signal,
            time: 0.0,
            stats: Arc::new(MonitorStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<MonitorStats> {
        self.stats.clone()
    }

    pub fn tube(&self) -> Arc<Tube> {
        self.tube.clone()
    }

    /// simulated time reached so far
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn h_osc(&self) -> &Oscillator {
        &self.h_osc
    }

    pub fn v_osc(&self) -> &Oscillator {
        &self.v_osc
    }

    pub fn sync(&self) -> &SyncEngine {
        &self.sync
    }

    /// Scan from `start` up to `end`, a line-length section at a time, and
    /// commit the lot to the tube. Returns the time just after the last dot,
    /// which is where the next call should start.
    pub fn elapse(&mut self, start: f64, end: f64) -> f64 {
        let dot_time = self.timing.dot_time;
        let count = dot_count(start, end, dot_time);
        let per_line = self.timing.dots_per_line().max(1);
        let mut sections = Vec::with_capacity(count / per_line + 1);
        let mut first = 0;
        while first < count {
            let last = (first + per_line).min(count);
            let dots = (first..last)
                .map(|n| self.scan(start + n as f64 * dot_time))
                .collect();
            sections.extend(FrameSection::from_dots(dots));
            first = last;
        }
        let time = start + count as f64 * dot_time;
        self.tube.commit(sections, time);
        self.stats.dots.fetch_add(count as u64, Ordering::Relaxed);
        time
    }

    /// One dot. The beam position comes from the oscillators as they stand,
    /// so a sync correction found in this sample only moves the next one.
    fn scan(&mut self, time: f64) -> PhosphorDot {
        let h = self.h_osc.value_at(time);
        let v = self.v_osc.value_at(time);
        let brightness = self.signal.get(time);
        self.sync
            .observe(time, brightness, &mut self.h_osc, &mut self.v_osc);
        PhosphorDot {
            time,
            h,
            v,
            brightness,
        }
    }

    /// one iteration: wait for the time keeper, then simulate what it says
    pub fn step<C: Clock>(&mut self, keeper: &mut TimeKeeper<C>) -> Elapsed {
        let elapsed = keeper.elapsed();
        if elapsed.skipped > 0.0 {
            self.signal.skip(elapsed.skipped);
            let total = self.stats.skipped_time() + elapsed.skipped;
            self.stats
                .skipped_time
                .store(total.to_bits(), Ordering::Relaxed);
        }
        if elapsed.simulated > 0.0 {
            let end = self.time + elapsed.simulated;
            self.time = self.elapse(self.time, end);
        }
        self.publish_stats();
        elapsed
    }

    fn publish_stats(&self) {
        let (h_locks, v_locks) = self.sync.locks();
        let s = &self.stats;
        s.iterations.fetch_add(1, Ordering::Relaxed);
        s.h_locks.store(h_locks, Ordering::Relaxed);
        s.v_locks.store(v_locks, Ordering::Relaxed);
        s.simulated_time
            .store(self.time.to_bits(), Ordering::Relaxed);
        if let (Some(phase), _) = self.sync.last_phases() {
            s.h_phase.store(phase.to_bits(), Ordering::Relaxed);
        }
    }

    /// Keep stepping until `cancel` is set. The flag is only looked at between
    /// iterations, so whatever was scanned last still gets committed.
    pub fn run<C: Clock>(&mut self, keeper: &mut TimeKeeper<C>, cancel: &AtomicBool) {
        info!(timing = %self.timing.describe(), "monitor running");
        while !cancel.load(Ordering::Relaxed) {
            self.step(keeper);
        }
        info!(
            time = self.time,
            iterations = self.stats.iterations(),
            skipped = self.stats.skipped_time(),
            "monitor stopped"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controls::Controls;
    use crate::signal::{DummySignal, Periodic, SquareSignal};
    use crate::timekeeper::DummyClock;
    use approx::assert_abs_diff_eq;
    use std::time::Duration;

    /// 1kHz lines, 50Hz frames, 100kHz samples: 100 dots a line
    fn timing() -> Arc<TimingConfig> {
        Arc::new(TimingConfig::new(1000.0, 50.0, 1e5, 1e-4, 0.3).unwrap())
    }

    fn monitor<S: Signal>(signal: S) -> VideoMonitor<S> {
        let timing = timing();
        let tube = Arc::new(Tube::new(timing.frame_time).unwrap());
        VideoMonitor::new(timing, tube, signal)
    }

    #[test]
    fn test_dot_count() {
        assert_eq!(dot_count(0.0, 0.0025, 1e-5), 250);
        assert_eq!(dot_count(0.0, 0.3e-5, 1e-5), 1);
        assert_eq!(dot_count(1.0, 1.0, 1e-5), 0);
        assert_eq!(dot_count(0.00055, 0.001, 1e-5), 45);
    }

    #[test]
    fn test_elapse_splits_into_lines() {
        let mut m = monitor(DummySignal(0.5));
        let end = m.elapse(0.0, 0.0025);
        assert_abs_diff_eq!(end, 0.0025, epsilon = 1e-9);
        let f = m.tube().snapshot();
        assert_eq!(f.sections.len(), 3);
        assert_eq!(f.sections[0].dots.len(), 100);
        assert_eq!(f.sections[1].dots.len(), 100);
        assert_eq!(f.sections[2].dots.len(), 50);
        assert_eq!(f.dot_count(), 250);
    }

    #[test]
    fn test_elapse_chains() {
        let mut m = monitor(DummySignal(0.5));
        let mid = m.elapse(0.0, 0.00055);
        let end = m.elapse(mid, 0.001);
        let f = m.tube().snapshot();
        let times: Vec<f64> = f.dots().map(|d| d.time).collect();
        assert!(times.windows(2).all(|w| w[1] > w[0]));
        assert_abs_diff_eq!(end, 0.001, epsilon = 1e-9);
        assert_eq!(f.dot_count(), 100);
    }

    #[test]
    fn test_dots_carry_deflection() {
        let mut m = monitor(DummySignal(0.7));
        m.elapse(0.0, 0.0005);
        let f = m.tube().snapshot();
        let first = f.dots().next().unwrap();
        assert_abs_diff_eq!(first.h, -1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(first.v, -1.0, epsilon = 1e-12);
        assert_eq!(first.brightness, 0.7);
        let last = f.dots().last().unwrap();
        // 49 dots into a 100-dot line
        assert_abs_diff_eq!(last.h, -0.02, epsilon = 1e-9);
    }

    #[test]
    fn test_lock_moves_only_later_dots() {
        // sync pulses covering dots 25..35 of each line
        let sync = SquareSignal::new(1000.0, 1e-4, 2.45e-4, 1.0);
        struct Inverted(SquareSignal);
        impl Signal for Inverted {
            fn get(&mut self, time: f64) -> f64 {
                1.0 - self.0.get(time)
            }
        }
        let mut m = monitor(Inverted(sync));
        m.elapse(0.0, 0.002);
        assert_abs_diff_eq!(m.h_osc().phase(), -std::f64::consts::FRAC_PI_4, epsilon = 1e-6);
        let f = m.tube().snapshot();
        // the pulse closes at dot 35; dot 36 is the first one drawn with the
        // corrected phase
        let dots: Vec<_> = f.dots().collect();
        assert_abs_diff_eq!(dots[35].h, -0.3, epsilon = 1e-6);
        assert_abs_diff_eq!(dots[36].h, -0.78, epsilon = 1e-6);
    }

    #[test]
    fn test_step_accounts_skipped_time() {
        let timing = timing();
        let tube = Arc::new(Tube::new(timing.frame_time).unwrap());
        let mut m = VideoMonitor::new(timing.clone(), tube, DummySignal(0.5));
        let controls = Arc::new(Controls::default());
        let mut k = TimeKeeper::new(timing, controls, DummyClock::new());
        k.clock_mut().stall(Duration::from_millis(50));
        let e = m.step(&mut k);
        assert_abs_diff_eq!(e.skipped, 0.04, epsilon = 1e-9);
        let stats = m.stats();
        assert_abs_diff_eq!(stats.skipped_time(), 0.04, epsilon = 1e-9);
        assert_abs_diff_eq!(m.time(), e.simulated, epsilon = 1e-9);
        assert_eq!(stats.iterations(), 1);
    }

    #[test]
    fn test_paused_step_commits_nothing() {
        let timing = timing();
        let tube = Arc::new(Tube::new(timing.frame_time).unwrap());
        let mut m = VideoMonitor::new(timing.clone(), tube, DummySignal(0.5));
        let controls = Arc::new(Controls::new(0.0));
        let mut k = TimeKeeper::new(timing, controls.clone(), DummyClock::new());
        m.step(&mut k);
        assert!(m.tube().snapshot().is_empty());
        controls.request_step();
        m.step(&mut k);
        assert_eq!(m.tube().snapshot().dot_count(), 1);
        assert_eq!(m.stats().dots(), 1);
    }

    #[test]
    fn test_fast_forward_step_scans_at_most_a_frame() {
        let timing = timing();
        let tube = Arc::new(Tube::new(timing.frame_time).unwrap());
        let mut m = VideoMonitor::new(timing.clone(), tube, DummySignal(0.5));
        let controls = Arc::new(Controls::new(1e9));
        let mut k = TimeKeeper::new(timing, controls, DummyClock::new());
        let e = m.step(&mut k);
        assert_abs_diff_eq!(e.simulated, 0.02, epsilon = 1e-12);
        assert_eq!(m.stats().dots(), 2000);
    }

    #[test]
    fn test_run_stops_when_cancelled() {
        let timing = timing();
        let tube = Arc::new(Tube::new(timing.frame_time).unwrap());
        let mut m = VideoMonitor::new(timing.clone(), tube, DummySignal(0.5));
        let controls = Arc::new(Controls::default());
        let mut k = TimeKeeper::new(timing, controls, DummyClock::new());
        let cancel = AtomicBool::new(true);
        m.run(&mut k, &cancel);
        assert_eq!(m.stats().iterations(), 0);
    }
}
