use crate::signal::{Periodic, Signal};
use std::f64::consts::PI;

/// Sawtooth deflection oscillator. Rises linearly from -1 to +1 over one
/// period then snaps back to -1. The phase is stored in radians-equivalent
/// units and applied as a time shift of `phase / frequency / PI`, which is
/// what the sync engine's corrections are expressed in.
#[derive(Debug, Clone, PartialEq)]
pub struct Oscillator {
    frequency: f64,
    phase: f64,
}

impl Oscillator {
    /// `frequency` must be > 0
    pub fn new(frequency: f64) -> Self {
        Oscillator {
            frequency,
            phase: 0.0,
        }
    }

    /// deflection at `time`, in [-1, 1)
    pub fn value_at(&self, time: f64) -> f64 {
        let period = 1.0 / self.frequency;
        let shifted = time + self.phase / self.frequency / PI;
        2.0 * self.frequency * shifted.rem_euclid(period) - 1.0
    }
}

impl Signal for Oscillator {
    fn get(&mut self, time: f64) -> f64 {
        self.value_at(time)
    }
}

impl Periodic for Oscillator {
    fn frequency(&self) -> f64 {
        self.frequency
    }

    fn set_frequency(&mut self, hz: f64) {
        self.frequency = hz;
    }

    fn phase(&self) -> f64 {
        self.phase
    }

    fn set_phase(&mut self, phase: f64) {
        self.phase = phase;
    }
}
