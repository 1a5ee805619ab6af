use crate::error::ConfigError;
use crate::timing::{Standard, TimingConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::warn;

/// signal timing: a named standard, optionally with individual numbers
/// overridden
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingSettings {
    #[serde(default = "TimingSettings::default_standard")]
    pub standard: Standard,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub h_freq: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v_freq: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bandwidth: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub h_sync_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub black_level: Option<f64>,
}

impl TimingSettings {
    fn default_standard() -> Standard {
        Standard::Pal
    }

    /// the standard's numbers with any overrides applied, checked
    pub fn timing(&self) -> Result<TimingConfig, ConfigError> {
        let base = self.standard.timing();
        TimingConfig::new(
            self.h_freq.unwrap_or(base.h_freq),
            self.v_freq.unwrap_or(base.v_freq),
            self.bandwidth.unwrap_or(base.bandwidth),
            self.h_sync_time.unwrap_or(base.h_sync_time),
            self.black_level.unwrap_or(base.black_level),
        )
    }
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            standard: Self::default_standard(),
            h_freq: None,
            v_freq: None,
            bandwidth: None,
            h_sync_time: None,
            black_level: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TubeSettings {
    /// seconds a dot stays lit; one frame if unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub glow_time: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSettings {
    /// 1 is real time, 0 single-steps
    #[serde(default = "TimeSettings::default_dilation")]
    pub dilation: f64,
}

impl TimeSettings {
    fn default_dilation() -> f64 {
        1.0
    }
}

impl Default for TimeSettings {
    fn default() -> Self {
        Self {
            dilation: Self::default_dilation(),
        }
    }
}

/// Everything the monitor can be told from outside, as read from TOML.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default)]
    pub timing: TimingSettings,
    #[serde(default)]
    pub tube: TubeSettings,
    #[serde(default)]
    pub time: TimeSettings,
}

impl MonitorConfig {
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// read and parse `path`, failing on any problem
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Read `path` if it exists, falling back to defaults if it can't be
    /// used. A missing file gets created with the defaults commented out, as a
    /// starting point for editing.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            return match Self::load(path) {
                Ok(cfg) => cfg,
                Err(err) => {
                    warn!("can't use config {}: {}; using defaults", path.display(), err);
                    Self::default()
                }
            };
        }
        let default_cfg = Self::default();
        match toml::to_string_pretty(&default_cfg) {
            Ok(text) => {
                if let Err(err) = fs::write(path, commented(&text)) {
                    warn!("failed to write default config to {}: {}", path.display(), err);
                }
            }
            Err(err) => warn!("failed to serialize default config: {}", err),
        }
        default_cfg
    }

    /// checked timing for the configured standard
    pub fn timing(&self) -> Result<TimingConfig, ConfigError> {
        self.timing.timing()
    }

    /// glow time to use with `timing`
    pub fn glow_time(&self, timing: &TimingConfig) -> Result<f64, ConfigError> {
        let glow = self.tube.glow_time.unwrap_or(timing.frame_time);
        ConfigError::check_positive("glow_time", glow)
    }

    /// starting dilation; anywhere from single step (0) to real time (1)
    pub fn dilation(&self) -> Result<f64, ConfigError> {
        let d = self.time.dilation;
        if (0.0..=1.0).contains(&d) {
            Ok(d)
        } else {
            Err(ConfigError::Dilation(d))
        }
    }
}

/// comment out every key, leaving table headers alone
fn commented(text: &str) -> String {
    let mut out = String::new();
    for line in text.lines() {
        let trimmed = line.trim();
        if !trimmed.is_empty() && !trimmed.starts_with('[') {
            out.push_str("# ");
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}
