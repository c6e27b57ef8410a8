//! # Settings Module
//!
//! User settings saved between runs as pretty-printed JSON. Fields missing
//! from an older file fall back to their defaults.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::calibration::{self, CalibrationState, DEFAULT_LISTEN_SECONDS};
use crate::midi::DEFAULT_PORT_NAME;
use crate::session::Session;
use crate::velocity::{MAX_VELOCITY, VelocityConfig};

/// Default settings file, relative to the working directory.
pub const DEFAULT_SETTINGS_PATH: &str = "midiphone_settings.json";

/// Upper end of the magnitude sliders, in raw FFT units.
pub const MAX_MAGNITUDE: f32 = 4_000_000.0;

/// Longest accepted listen window.
pub const MAX_LISTEN_SECONDS: f32 = 600.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Input device name; `None` uses the host default.
    pub input_device: Option<String>,
    pub midi_port_name: String,
    pub minimum_magnitude: f32,
    pub maximum_magnitude: f32,
    pub keyboard_has_velocity: bool,
    pub velocity_threshold: u8,
    /// Length of a calibration listen window.
    pub listen_seconds: f32,
}

impl Default for Settings {
    fn default() -> Self {
        let velocity = VelocityConfig::default();
        Self {
            input_device: None,
            midi_port_name: DEFAULT_PORT_NAME.to_string(),
            minimum_magnitude: 0.0,
            maximum_magnitude: MAX_MAGNITUDE,
            keyboard_has_velocity: velocity.keyboard_has_velocity,
            velocity_threshold: velocity.velocity_threshold,
            listen_seconds: DEFAULT_LISTEN_SECONDS,
        }
    }
}

impl Settings {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut file =
            File::open(path).with_context(|| format!("Failed to open settings file {:?}", path))?;
        let mut data = String::new();
        file.read_to_string(&mut data)?;
        let mut settings: Settings = serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse settings file {:?}", path))?;
        settings.velocity_threshold = settings.velocity_threshold.min(MAX_VELOCITY);
        settings.listen_seconds = settings.listen_duration().as_secs_f32();
        Ok(settings)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json_string = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)
            .with_context(|| format!("Failed to create settings file {:?}", path))?;
        file.write_all(json_string.as_bytes())?;
        Ok(())
    }

    pub fn velocity_config(&self) -> VelocityConfig {
        let mut config = VelocityConfig {
            keyboard_has_velocity: self.keyboard_has_velocity,
            velocity_threshold: 0,
        };
        config.set_velocity_threshold(self.velocity_threshold);
        config
    }

    /// Listen window length, limited to `0..=MAX_LISTEN_SECONDS`.
    pub fn listen_duration(&self) -> Duration {
        let seconds = if self.listen_seconds.is_finite() {
            self.listen_seconds.clamp(0.0, MAX_LISTEN_SECONDS)
        } else {
            DEFAULT_LISTEN_SECONDS
        };
        Duration::from_secs_f32(seconds)
    }

    /// Listen window length in frames.
    pub fn listen_frames(&self) -> u32 {
        calibration::frames_for_duration(self.listen_duration())
    }

    /// A fresh session seeded from these settings.
    pub fn session(&self) -> Session {
        Session::new(
            CalibrationState::new(self.minimum_magnitude, self.maximum_magnitude),
            self.velocity_config(),
        )
    }
}
