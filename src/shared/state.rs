//! Operator-controlled and runtime state shared with the scan loop

use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::config::PreprocessSettings;

/// Fixed rotation applied after binarization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rotation {
    /// Leave the image as captured
    #[default]
    None,
    /// Rotate 90 degrees clockwise
    Cw90,
    /// Rotate 180 degrees
    Cw180,
    /// Rotate 270 degrees clockwise
    Cw270,
}

impl Rotation {
    /// The next state in the operator's rotate cycle, wrapping back to `None`
    pub fn next(self) -> Self {
        match self {
            Rotation::None => Rotation::Cw90,
            Rotation::Cw90 => Rotation::Cw180,
            Rotation::Cw180 => Rotation::Cw270,
            Rotation::Cw270 => Rotation::None,
        }
    }

    /// Rotation in degrees clockwise
    pub fn degrees(self) -> u32 {
        match self {
            Rotation::None => 0,
            Rotation::Cw90 => 90,
            Rotation::Cw180 => 180,
            Rotation::Cw270 => 270,
        }
    }

    /// Parse a rotation from a degree value (0, 90, 180, 270)
    pub fn from_degrees(degrees: u32) -> Option<Self> {
        match degrees % 360 {
            0 => Some(Rotation::None),
            90 => Some(Rotation::Cw90),
            180 => Some(Rotation::Cw180),
            270 => Some(Rotation::Cw270),
            _ => None,
        }
    }
}

impl std::fmt::Display for Rotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rotation::None => f.write_str("none"),
            other => write!(f, "{}°", other.degrees()),
        }
    }
}

/// Clamp a requested binarization threshold into 0..=255
pub fn clamp_threshold(value: i64) -> u8 {
    value.clamp(0, 255) as u8
}

/// Preprocessing parameters the operator adjusts between ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatorControls {
    /// Binarization threshold
    pub threshold: u8,
    /// Fixed rotation state
    pub rotation: Rotation,
    /// Step used by [`nudge_threshold`](Self::nudge_threshold) callers
    pub threshold_step: i32,
}

impl Default for OperatorControls {
    fn default() -> Self {
        Self::from_settings(&PreprocessSettings::default())
    }
}

impl OperatorControls {
    /// Build the initial controls from configuration
    pub fn from_settings(settings: &PreprocessSettings) -> Self {
        Self {
            threshold: settings.threshold,
            rotation: settings.rotation,
            threshold_step: settings.threshold_step,
        }
    }

    /// Set the threshold, clamping into 0..=255
    pub fn set_threshold(&mut self, value: i32) -> u8 {
        self.threshold = clamp_threshold(value.into());
        self.threshold
    }

    /// Move the threshold by `delta`, clamping into 0..=255
    pub fn nudge_threshold(&mut self, delta: i32) -> u8 {
        self.set_threshold(self.threshold as i32 + delta)
    }

    /// Advance the rotation cycle
    pub fn advance_rotation(&mut self) -> Rotation {
        self.rotation = self.rotation.next();
        self.rotation
    }
}

/// Runtime state that is not persisted
#[derive(Debug, Clone)]
pub struct RuntimeState {
    /// Ticks run so far
    pub ticks: u64,
    /// Ticks where no frame could be acquired
    pub missed_frames: u64,
    /// Measured loop rate
    pub fps: f32,
    /// Start of the previous tick
    last_tick: Option<Instant>,
    /// Last report text shown to the operator
    pub last_report: String,
}

impl Default for RuntimeState {
    fn default() -> Self {
        Self {
            ticks: 0,
            missed_frames: 0,
            fps: 0.0,
            last_tick: None,
            last_report: String::new(),
        }
    }
}

impl RuntimeState {
    /// Record the start of a tick and update the measured rate
    pub fn mark_tick(&mut self, now: Instant) {
        if let Some(previous) = self.last_tick {
            let elapsed = now.duration_since(previous).as_secs_f32();
            if elapsed > 0.0 {
                self.fps = 1.0 / elapsed;
            }
        }
        self.last_tick = Some(now);
        self.ticks += 1;
    }

    /// Store a report, returning whether it differs from the previous one
    pub fn update_report(&mut self, text: &str) -> bool {
        if self.last_report == text {
            return false;
        }
        self.last_report = text.to_string();
        true
    }
}
