//! # Velocity Module
//!
//! Maps a peak magnitude to a MIDI velocity between the calibration bounds.

use serde::{Deserialize, Serialize};

use crate::calibration::CalibrationState;

/// Highest MIDI velocity.
pub const MAX_VELOCITY: u8 = 127;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VelocityConfig {
    /// When false every note is either dropped or sent at full velocity.
    pub keyboard_has_velocity: bool,
    /// Cut-off used when `keyboard_has_velocity` is false.
    pub velocity_threshold: u8,
}

impl Default for VelocityConfig {
    fn default() -> Self {
        Self {
            keyboard_has_velocity: false,
            velocity_threshold: 64,
        }
    }
}

impl VelocityConfig {
    pub fn set_velocity_threshold(&mut self, threshold: u8) {
        self.velocity_threshold = threshold.min(MAX_VELOCITY);
    }
}

/// Returns the velocity for a peak, or `None` if the peak is not sounded.
///
/// Magnitudes below the minimum are dropped. The rest interpolate linearly
/// from 0 at the minimum to 127 at the maximum, truncated and clamped. A
/// zero-width range maps everything to 127.
pub fn velocity_for(
    magnitude: f32,
    calibration: &CalibrationState,
    config: &VelocityConfig,
) -> Option<u8> {
    let minimum = calibration.minimum_magnitude;
    let maximum = calibration.maximum_magnitude;

    if magnitude.is_nan() || magnitude < minimum {
        return None;
    }

    let range = maximum - minimum;
    let velocity = if range == 0.0 {
        MAX_VELOCITY
    } else {
        let scaled = MAX_VELOCITY as f32 * (magnitude - minimum) / range;
        if scaled.is_nan() {
            0
        } else {
            scaled.clamp(0.0, MAX_VELOCITY as f32) as u8
        }
    };

    if config.keyboard_has_velocity {
        Some(velocity)
    } else if velocity < config.velocity_threshold {
        None
    } else {
        Some(MAX_VELOCITY)
    }
}
