use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Knobs on the front of the set. Written from the UI thread, read by the
/// simulation thread once per iteration; everything is a plain atomic so
/// neither side ever waits on the other.
#[derive(Debug)]
pub struct Controls {
    /// f64 bits
    dilation: AtomicU64,
    step_pending: AtomicBool,
}

impl Controls {
    pub fn new(dilation: f64) -> Self {
        Controls {
            dilation: AtomicU64::new(dilation.to_bits()),
            step_pending: AtomicBool::new(false),
        }
    }

    /// simulated seconds per wall-clock second; 0 means single-step
    pub fn dilation(&self) -> f64 {
        f64::from_bits(self.dilation.load(Ordering::Relaxed))
    }

    pub fn set_dilation(&self, dilation: f64) {
        self.dilation.store(dilation.to_bits(), Ordering::Relaxed);
    }

    /// ask for a dot while single-stepping; requests made before the next
    /// step is taken count as one
    pub fn request_step(&self) {
        self.step_pending.store(true, Ordering::Relaxed);
    }

    /// whether a step was requested, clearing the request
    pub fn take_step(&self) -> bool {
        self.step_pending.swap(false, Ordering::Relaxed)
    }
}

impl Default for Controls {
    fn default() -> Self {
        Controls::new(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_real_time() {
        assert_eq!(Controls::default().dilation(), 1.0);
    }

    #[test]
    fn test_dilation_round_trips_exactly() {
        let c = Controls::default();
        c.set_dilation(0.001);
        assert_eq!(c.dilation(), 0.001);
    }

    #[test]
    fn test_step_is_consumed() {
        let c = Controls::new(0.0);
        assert!(!c.take_step());
        c.request_step();
        assert!(c.take_step());
        assert!(!c.take_step());
    }

    #[test]
    fn test_repeated_requests_make_one_step() {
        let c = Controls::new(0.0);
        c.request_step();
        c.request_step();
        assert!(c.take_step());
        assert!(!c.take_step());
    }
}
