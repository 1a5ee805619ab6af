use std::io;
use thiserror::Error;

/// Reasons a monitor can't be built from the settings it was given. These are
/// all caught at construction time; nothing in the simulation loop fails.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// a frequency or duration that must be strictly positive wasn't
    #[error("{name} must be a positive, finite number (got {value})")]
    NotPositive { name: &'static str, value: f64 },

    /// horizontal sync has to fit inside half a line, or vertical sync ends
    /// up with no width at all
    #[error("line sync time {sync_time}s doesn't fit in half a line of {line_time}s")]
    SyncWidth { sync_time: f64, line_time: f64 },

    #[error("black level must be within [0, 1] (got {0})")]
    BlackLevel(f64),

    #[error("dilation must be within [0, 1] (got {0})")]
    Dilation(f64),

    #[error("config file error: {0}")]
    Io(#[from] io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

impl ConfigError {
    /// check `value` is usable as a frequency or duration
    pub fn check_positive(name: &'static str, value: f64) -> Result<f64, ConfigError> {
        if value.is_finite() && value > 0.0 {
            Ok(value)
        } else {
            Err(ConfigError::NotPositive { name, value })
        }
    }
}
