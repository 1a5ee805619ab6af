//! The phosphor screen.
//!
//! Dots are committed a batch at a time by the simulation thread and fade out
//! once they're older than the glow time. Readers never see the list being
//! edited: every commit builds a new [`Frame`] and swaps the shared pointer,
//! so a reader holding a snapshot keeps a consistent picture for as long as it
//! likes.

use crate::error::ConfigError;
use parking_lot::RwLock;
use std::sync::Arc;

/// physical tube size in metres
pub const TUBE_WIDTH: f64 = 0.4;
pub const TUBE_HEIGHT: f64 = 0.34;
const H_GAIN: f64 = 40.0;
const V_GAIN: f64 = 40.0;
const FULL_DEFLECTION_VOLTAGE: f64 = 40.0;

/// horizontal beam position (m from centre) for a deflection value in [-1, 1]
pub fn h_pos(deflection: f64) -> f64 {
    0.5 * deflection * H_GAIN * TUBE_WIDTH / FULL_DEFLECTION_VOLTAGE
}

/// vertical beam position (m from centre) for a deflection value in [-1, 1]
pub fn v_pos(deflection: f64) -> f64 {
    0.5 * deflection * V_GAIN * TUBE_HEIGHT / FULL_DEFLECTION_VOLTAGE
}

/// one sample's worth of glowing phosphor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhosphorDot {
    /// simulated time the beam was here
    pub time: f64,
    /// horizontal deflection, [-1, 1]
    pub h: f64,
    /// vertical deflection, [-1, 1]
    pub v: f64,
    /// [0, 1]
    pub brightness: f64,
}

/// Dots from (at most) one scan line, with the time span they cover. Never
/// modified once built; decay makes a trimmed copy.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSection {
    pub oldest: f64,
    pub newest: f64,
    pub dots: Vec<PhosphorDot>,
}

impl FrameSection {
    /// wrap up a run of dots; `None` if there aren't any
    pub fn from_dots(dots: Vec<PhosphorDot>) -> Option<FrameSection> {
        let oldest = dots.first()?.time;
        let newest = dots.last()?.time;
        Some(FrameSection {
            oldest,
            newest,
            dots,
        })
    }

    /// what's left of this section once everything at or before `boundary`
    /// has faded
    fn decay(&self, boundary: f64) -> Option<FrameSection> {
        if self.newest <= boundary {
            None
        } else if self.oldest > boundary {
            Some(self.clone())
        } else {
            let dots: Vec<_> = self
                .dots
                .iter()
                .filter(|d| d.time > boundary)
                .copied()
                .collect();
            if dots.is_empty() {
                return None;
            }
            Some(FrameSection {
                oldest: boundary,
                newest: self.newest,
                dots,
            })
        }
    }
}

/// An immutable snapshot of everything still glowing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    /// simulated time of the commit that produced this frame
    pub time: f64,
    /// in time order
    pub sections: Vec<FrameSection>,
}

impl Frame {
    pub fn dots(&self) -> impl Iterator<Item = &PhosphorDot> {
        self.sections.iter().flat_map(|s| s.dots.iter())
    }

    pub fn dot_count(&self) -> usize {
        self.sections.iter().map(|s| s.dots.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

/// The phosphor buffer: one writer, any number of readers. The lock only
/// guards cloning or swapping the frame pointer, never reading a frame.
#[derive(Debug)]
pub struct Tube {
    glow_time: f64,
    frame: RwLock<Arc<Frame>>,
}

impl Tube {
    /// `glow_time` is how long a dot stays visible, in simulated seconds
    pub fn new(glow_time: f64) -> Result<Tube, ConfigError> {
        ConfigError::check_positive("glow_time", glow_time)?;
        Ok(Tube {
            glow_time,
            frame: RwLock::new(Arc::new(Frame::default())),
        })
    }

    pub fn glow_time(&self) -> f64 {
        self.glow_time
    }

    /// the current picture; cheap, and unaffected by later commits
    pub fn snapshot(&self) -> Arc<Frame> {
        self.frame.read().clone()
    }

    /// Add freshly scanned sections covering up to `end_time`, drop whatever
    /// has faded by then, and publish the result. Only the simulation thread
    /// calls this.
    pub fn commit(&self, sections: Vec<FrameSection>, end_time: f64) {
        let boundary = end_time - self.glow_time;
        let current = self.snapshot();
        let mut glowing: Vec<FrameSection> = current
            .sections
            .iter()
            .filter_map(|s| s.decay(boundary))
            .collect();
        for section in sections {
            if section.oldest > boundary {
                glowing.push(section);
            } else if let Some(s) = section.decay(boundary) {
                glowing.push(s);
            }
        }
        let next = Arc::new(Frame {
            time: end_time,
            sections: glowing,
        });
        *self.frame.write() = next;
    }
}
