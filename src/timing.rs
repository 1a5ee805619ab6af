use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// rounding allowance when counting dots
const DOT_SLACK: f64 = 1e-6;

/// named broadcast standards; only the numbers the monitor cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Standard {
    Pal,
    Ntsc,
}

impl Standard {
    pub fn timing(self) -> TimingConfig {
        // the presets are known-good, so they skip validation
        match self {
            Standard::Pal => TimingConfig::derive(15_625.0, 50.0, 5e6, 4.7e-6, 0.3),
            Standard::Ntsc => TimingConfig::derive(15_734.264, 59.94, 4.2e6, 4.7e-6, 0.3),
        }
    }
}

/// Timing of the incoming composite signal. Built once, then shared read-only
/// between the oscillators, the sync detectors and the tube.
#[derive(Debug, Clone, PartialEq)]
pub struct TimingConfig {
    /// line frequency (Hz)
    pub h_freq: f64,
    /// field frequency (Hz)
    pub v_freq: f64,
    /// sample rate of the signal (Hz); one dot per sample
    pub bandwidth: f64,
    pub line_time: f64,
    pub frame_time: f64,
    pub dot_time: f64,
    /// expected width of a line sync pulse
    pub h_sync_time: f64,
    /// expected width of a broad vertical sync pulse
    pub v_sync_time: f64,
    /// anything below this is sync
    pub black_level: f64,
}

impl TimingConfig {
    pub fn new(
        h_freq: f64,
        v_freq: f64,
        bandwidth: f64,
        h_sync_time: f64,
        black_level: f64,
    ) -> Result<TimingConfig, ConfigError> {
        ConfigError::check_positive("h_freq", h_freq)?;
        ConfigError::check_positive("v_freq", v_freq)?;
        ConfigError::check_positive("bandwidth", bandwidth)?;
        ConfigError::check_positive("h_sync_time", h_sync_time)?;
        let line_time = 1.0 / h_freq;
        if h_sync_time >= line_time / 2.0 {
            return Err(ConfigError::SyncWidth {
                sync_time: h_sync_time,
                line_time,
            });
        }
        if !(0.0..=1.0).contains(&black_level) {
            return Err(ConfigError::BlackLevel(black_level));
        }
        Ok(Self::derive(h_freq, v_freq, bandwidth, h_sync_time, black_level))
    }

    fn derive(
        h_freq: f64,
        v_freq: f64,
        bandwidth: f64,
        h_sync_time: f64,
        black_level: f64,
    ) -> TimingConfig {
        let line_time = 1.0 / h_freq;
        TimingConfig {
            h_freq,
            v_freq,
            bandwidth,
            line_time,
            frame_time: 1.0 / v_freq,
            dot_time: 1.0 / bandwidth,
            h_sync_time,
            // non-interlaced approximation of a broad pulse
            v_sync_time: line_time / 2.0 - h_sync_time,
            black_level,
        }
    }

    /// how many dots it takes to cover one scan line; a part dot counts as
    /// a whole one
    pub fn dots_per_line(&self) -> usize {
        (self.line_time / self.dot_time - DOT_SLACK).ceil() as usize
    }

    /// short status line, e.g. "5MHz (15625/50)"
    pub fn describe(&self) -> String {
        format!(
            "{}MHz ({}/{})",
            self.bandwidth / 1e6,
            self.h_freq,
            self.v_freq.round()
        )
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Standard::Pal.timing()
    }
}
