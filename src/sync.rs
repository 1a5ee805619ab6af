//! Sync separation: find sync pulses in the composite signal and pull the
//! deflection oscillators into line with them.
//!
//! There is no loop filter. Every accepted pulse replaces the oscillator's
//! phase outright, so the loop locks on the first good pulse and holds its
//! last correction for as long as the signal is lost.

use crate::signal::Periodic;
use crate::timing::TimingConfig;
use std::f64::consts::{FRAC_PI_2, PI};

/// how far a pulse may stray from its expected width and still count
const SYNC_TOLERANCE: f64 = 0.1;

/// Edge-triggered pulse-width classifier for one axis. Watches for the signal
/// dropping below black, times how long it stays there, and when the width is
/// plausible turns the pulse's start time into a phase correction.
#[derive(Debug, Clone)]
pub struct PhaseDetector {
    frequency: f64,
    expected_width: f64,
    black_level: f64,
    asserted: bool,
    start: Option<f64>,
    end: Option<f64>,
}

impl PhaseDetector {
    pub fn new(frequency: f64, expected_width: f64, black_level: f64) -> Self {
        PhaseDetector {
            frequency,
            expected_width,
            black_level,
            asserted: false,
            start: None,
            end: None,
        }
    }

    pub fn expected_width(&self) -> f64 {
        self.expected_width
    }

    /// true while a pulse has started but not yet finished
    pub fn is_open(&self) -> bool {
        self.start.is_some()
    }

    /// Feed one sample. Returns the phase of a pulse that has just ended, if
    /// it was the right width. The result is always in (-PI/2, PI/2].
    pub fn observe(&mut self, time: f64, value: f64) -> Option<f64> {
        let asserted = value < self.black_level;
        if asserted && !self.asserted {
            self.start = Some(time);
            self.end = None;
        } else if !asserted && self.asserted && self.start.is_some() {
            self.end = Some(time);
        }
        self.asserted = asserted;

        let (start, end) = (self.start?, self.end?);
        self.start = None;
        self.end = None;

        let duration = end - start;
        let min = (1.0 - SYNC_TOLERANCE) * self.expected_width;
        let max = (1.0 + SYNC_TOLERANCE) * self.expected_width;
        if duration < min || duration > max {
            tracing::trace!(start, duration, "rejected sync pulse");
            return None;
        }

        let sync_time = start.rem_euclid(1.0 / self.frequency);
        let mut phase = PI * sync_time * self.frequency;
        // fold into the nearer half cycle
        if phase > FRAC_PI_2 {
            phase -= PI;
        }
        Some(phase)
    }
}

/// Horizontal and vertical sync separators, wired to the oscillators they
/// correct.
#[derive(Debug, Clone)]
pub struct SyncEngine {
    horizontal: PhaseDetector,
    vertical: PhaseDetector,
    h_phase: Option<f64>,
    v_phase: Option<f64>,
    h_locks: u64,
    v_locks: u64,
}

impl SyncEngine {
    pub fn new(timing: &TimingConfig) -> Self {
        SyncEngine {
            horizontal: PhaseDetector::new(timing.h_freq, timing.h_sync_time, timing.black_level),
            // broad pulses: half a line less the line sync
            vertical: PhaseDetector::new(timing.v_freq, timing.v_sync_time, timing.black_level),
            h_phase: None,
            v_phase: None,
            h_locks: 0,
            v_locks: 0,
        }
    }

    /// Look at one sample and correct whichever oscillator it completes a
    /// sync pulse for.
    pub fn observe(
        &mut self,
        time: f64,
        value: f64,
        h_osc: &mut impl Periodic,
        v_osc: &mut impl Periodic,
    ) {
        if let Some(phase) = self.horizontal.observe(time, value) {
            h_osc.set_phase(-phase);
            self.h_phase = Some(phase);
            self.h_locks += 1;
        }
        if let Some(phase) = self.vertical.observe(time, value) {
            v_osc.set_phase(-phase);
            self.v_phase = Some(phase);
            self.v_locks += 1;
            tracing::trace!(time, phase, "vertical lock");
        }
    }

    pub fn horizontal(&self) -> &PhaseDetector {
        &self.horizontal
    }

    pub fn vertical(&self) -> &PhaseDetector {
        &self.vertical
    }

    /// last phase measured on each axis, if any pulse has been accepted yet
    pub fn last_phases(&self) -> (Option<f64>, Option<f64>) {
        (self.h_phase, self.v_phase)
    }

    /// number of accepted pulses on each axis
    pub fn locks(&self) -> (u64, u64) {
        (self.h_locks, self.v_locks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oscillator::Oscillator;
    use approx::assert_abs_diff_eq;

    const DOT: f64 = 1e-5;

    /// feed a pulse of `width` dots starting at dot `start`, surrounded by
    /// black, and collect whatever phases come out
    fn feed_pulse(d: &mut PhaseDetector, start: usize, width: usize) -> Vec<f64> {
        feed_pulse_with_dot(d, start, width, DOT)
    }

    fn feed_pulse_with_dot(
        d: &mut PhaseDetector,
        start: usize,
        width: usize,
        dot: f64,
    ) -> Vec<f64> {
        let mut phases = Vec::new();
        for i in 0..(start + width + 5) {
            let v = if i >= start && i < start + width { 0.0 } else { 0.3 };
            phases.extend(d.observe(i as f64 * dot, v));
        }
        phases
    }

    fn detector() -> PhaseDetector {
        // 1kHz lines, 100us sync, 100kHz samples
        PhaseDetector::new(1000.0, 1e-4, 0.3)
    }

    #[test]
    fn test_exact_width_accepted() {
        let mut d = detector();
        let phases = feed_pulse(&mut d, 0, 10);
        assert_eq!(phases.len(), 1);
        assert_abs_diff_eq!(phases[0], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_half_width_rejected() {
        let mut d = detector();
        assert!(feed_pulse(&mut d, 0, 5).is_empty());
        assert!(!d.is_open());
    }

    #[test]
    fn test_tolerance_band() {
        // 1us resolution so the widths land either side of +/-10%
        let fine = 1e-6;
        assert!(feed_pulse_with_dot(&mut detector(), 3, 89, fine).is_empty());
        assert_eq!(feed_pulse_with_dot(&mut detector(), 3, 91, fine).len(), 1);
        assert_eq!(feed_pulse_with_dot(&mut detector(), 3, 109, fine).len(), 1);
        assert!(feed_pulse_with_dot(&mut detector(), 3, 111, fine).is_empty());
    }

    #[test]
    fn test_black_level_is_not_sync() {
        let mut d = detector();
        for i in 0..100 {
            assert_eq!(d.observe(i as f64 * DOT, 0.3), None);
        }
        assert!(!d.is_open());
    }

    #[test]
    fn test_phase_of_late_pulse() {
        // a quarter of a line in: PI/4
        let mut d = detector();
        let phases = feed_pulse(&mut d, 25, 10);
        assert_abs_diff_eq!(phases[0], PI / 4.0, epsilon = 1e-9);
    }

    #[test]
    fn test_phase_folds_into_near_half() {
        // three quarters of a line in: 3PI/4 folds to -PI/4
        let mut d = detector();
        let phases = feed_pulse(&mut d, 75, 10);
        assert_abs_diff_eq!(phases[0], -PI / 4.0, epsilon = 1e-9);
    }

    #[test]
    fn test_phase_always_within_bounds() {
        for start in 0..100 {
            let mut d = detector();
            for phase in feed_pulse(&mut d, start, 10) {
                assert!(phase > -FRAC_PI_2 && phase <= FRAC_PI_2, "{}", phase);
            }
        }
    }

    #[test]
    fn test_detector_resets_between_pulses() {
        let mut d = detector();
        let mut phases = Vec::new();
        for i in 0..400 {
            // a good pulse at the start of every 100-dot line
            let v = if i % 100 < 10 { 0.0 } else { 0.5 };
            phases.extend(d.observe(i as f64 * DOT, v));
        }
        assert_eq!(phases.len(), 4);
        for p in phases {
            assert_abs_diff_eq!(p, 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_bad_pulse_then_good_pulse() {
        let mut d = detector();
        assert!(feed_pulse(&mut d, 0, 3).is_empty());
        let mut phases = Vec::new();
        for i in 20..40 {
            let v = if (25..35).contains(&i) { 0.0 } else { 0.3 };
            phases.extend(d.observe(i as f64 * DOT, v));
        }
        assert_eq!(phases.len(), 1);
    }

    #[test]
    fn test_vertical_expects_broad_pulse() {
        let timing = TimingConfig::new(1000.0, 50.0, 1e5, 1e-4, 0.3).unwrap();
        let s = SyncEngine::new(&timing);
        assert_abs_diff_eq!(s.horizontal().expected_width(), 1e-4, epsilon = 1e-15);
        assert_abs_diff_eq!(s.vertical().expected_width(), 4e-4, epsilon = 1e-15);
    }

    #[test]
    fn test_engine_applies_negated_phase() {
        let timing = TimingConfig::new(1000.0, 50.0, 1e5, 1e-4, 0.3).unwrap();
        let mut s = SyncEngine::new(&timing);
        let mut h = Oscillator::new(1000.0);
        let mut v = Oscillator::new(50.0);
        for i in 0..60 {
            let value = if (25..35).contains(&i) { 0.0 } else { 0.3 };
            s.observe(i as f64 * DOT, value, &mut h, &mut v);
        }
        assert_abs_diff_eq!(h.phase(), -PI / 4.0, epsilon = 1e-9);
        assert_eq!(v.phase(), 0.0);
        assert_eq!(s.locks(), (1, 0));
        // the corrected oscillator restarted its sweep at the pulse
        assert_abs_diff_eq!(h.value_at(26.0 * DOT), -0.98, epsilon = 1e-6);
    }
}
