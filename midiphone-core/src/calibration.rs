//! # Calibration Module
//!
//! Learns the minimum and maximum peak magnitudes used to gate and scale
//! velocities. The user holds a reference sound (room noise for the
//! minimum, the loudest expected note for the maximum) while a countdown
//! runs, and each frame of the countdown overwrites the bound with that
//! frame's loudest peak.
//!
//! Nothing orders the two bounds: learning the minimum after the maximum
//! can leave `minimum > maximum` for a while. Velocity mapping clamps in
//! that case instead of this module correcting it.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::audio::{CHUNK_SIZE, SAMPLE_RATE};
use crate::spectral::SpectralPeak;

/// Default length of a listen window.
pub const DEFAULT_LISTEN_SECONDS: f32 = 5.0;

/// Number of whole frames captured in `duration`.
pub fn frames_for_duration(duration: Duration) -> u32 {
    (duration.as_secs_f64() * SAMPLE_RATE as f64 / CHUNK_SIZE as f64).floor() as u32
}

/// Current magnitude bounds, as published to the control surface.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CalibrationBounds {
    pub minimum: f32,
    pub maximum: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalibrationState {
    pub minimum_magnitude: f32,
    pub maximum_magnitude: f32,
    pub min_listen_frames_remaining: u32,
    pub max_listen_frames_remaining: u32,
}

impl CalibrationState {
    pub fn new(minimum_magnitude: f32, maximum_magnitude: f32) -> Self {
        Self {
            minimum_magnitude,
            maximum_magnitude,
            ..Self::default()
        }
    }

    pub fn bounds(&self) -> CalibrationBounds {
        CalibrationBounds {
            minimum: self.minimum_magnitude,
            maximum: self.maximum_magnitude,
        }
    }

    pub fn set_minimum(&mut self, magnitude: f32) {
        self.minimum_magnitude = magnitude;
    }

    pub fn set_maximum(&mut self, magnitude: f32) {
        self.maximum_magnitude = magnitude;
    }

    /// Arms the minimum countdown, or cancels it if it is already running.
    pub fn begin_listen_minimum(&mut self, duration_frames: u32) {
        self.min_listen_frames_remaining = toggle(self.min_listen_frames_remaining, duration_frames);
    }

    /// Arms the maximum countdown, or cancels it if it is already running.
    pub fn begin_listen_maximum(&mut self, duration_frames: u32) {
        self.max_listen_frames_remaining = toggle(self.max_listen_frames_remaining, duration_frames);
    }

    pub fn is_listening_minimum(&self) -> bool {
        self.min_listen_frames_remaining > 0
    }

    pub fn is_listening_maximum(&self) -> bool {
        self.max_listen_frames_remaining > 0
    }

    /// Feeds one frame's peaks to any running countdown.
    ///
    /// Returns `true` when either bound now holds a different value.
    pub fn observe(&mut self, peaks: &[SpectralPeak]) -> bool {
        let before = self.bounds();
        let loudest = peaks
            .iter()
            .map(|p| p.magnitude)
            .fold(0.0_f32, f32::max);

        if self.min_listen_frames_remaining > 0 {
            self.minimum_magnitude = loudest;
            self.min_listen_frames_remaining -= 1;
        }
        if self.max_listen_frames_remaining > 0 {
            self.maximum_magnitude = loudest;
            self.max_listen_frames_remaining -= 1;
        }

        self.bounds() != before
    }
}

fn toggle(remaining: u32, duration_frames: u32) -> u32 {
    if remaining > 0 { 0 } else { duration_frames }
}
