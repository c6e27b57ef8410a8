//! # Session Module
//!
//! A [`Session`] owns all per-stream mutable state: calibration, velocity
//! configuration and the sounding notes. It lives on the worker thread for
//! as long as one capture stream runs. The control surface never touches it
//! directly; it sends [`ControlMessage`]s that the worker applies between
//! frames.

use std::collections::BTreeMap;

use tracing::debug;

use crate::calibration::{CalibrationBounds, CalibrationState};
use crate::midi::NoteEvent;
use crate::notes::NoteStateTracker;
use crate::spectral::SpectralPeak;
use crate::tuning::{self, MidiNote};
use crate::velocity::{self, VelocityConfig};

/// A change requested by the control surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlMessage {
    SetKeyboardHasVelocity(bool),
    SetVelocityThreshold(u8),
    SetMinimumMagnitude(f32),
    SetMaximumMagnitude(f32),
    /// Start (or cancel) learning the minimum for this many frames.
    ToggleListenMinimum(u32),
    /// Start (or cancel) learning the maximum for this many frames.
    ToggleListenMaximum(u32),
}

/// What one frame of peaks did to the session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameOutcome {
    /// Note-offs first, then note-ons, each in ascending note order.
    pub events: Vec<NoteEvent>,
    /// Set when either calibration bound moved during this frame.
    pub calibration_changed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Session {
    pub calibration: CalibrationState,
    pub velocity: VelocityConfig,
    notes: NoteStateTracker,
}

impl Session {
    pub fn new(calibration: CalibrationState, velocity: VelocityConfig) -> Self {
        Self {
            calibration,
            velocity,
            notes: NoteStateTracker::new(),
        }
    }

    pub fn apply(&mut self, message: ControlMessage) {
        debug!("Applying control message: {:?}", message);
        match message {
            ControlMessage::SetKeyboardHasVelocity(enabled) => {
                self.velocity.keyboard_has_velocity = enabled;
            }
            ControlMessage::SetVelocityThreshold(threshold) => {
                self.velocity.set_velocity_threshold(threshold);
            }
            ControlMessage::SetMinimumMagnitude(magnitude) => self.calibration.set_minimum(magnitude),
            ControlMessage::SetMaximumMagnitude(magnitude) => self.calibration.set_maximum(magnitude),
            ControlMessage::ToggleListenMinimum(frames) => self.calibration.begin_listen_minimum(frames),
            ControlMessage::ToggleListenMaximum(frames) => self.calibration.begin_listen_maximum(frames),
        }
    }

    pub fn bounds(&self) -> CalibrationBounds {
        self.calibration.bounds()
    }

    pub fn notes(&self) -> &NoteStateTracker {
        &self.notes
    }

    /// Maps each peak to a note and velocity, keeping the loudest velocity
    /// when several peaks land on the same note.
    pub fn notes_for_peaks(&self, peaks: &[SpectralPeak]) -> BTreeMap<MidiNote, u8> {
        let mut seen: BTreeMap<MidiNote, u8> = BTreeMap::new();
        for peak in peaks {
            let Some(velocity) = velocity::velocity_for(peak.magnitude, &self.calibration, &self.velocity)
            else {
                continue;
            };
            let Some(note) = tuning::midi_note_for_frequency(peak.frequency) else {
                continue;
            };
            seen.entry(note)
                .and_modify(|v| *v = (*v).max(velocity))
                .or_insert(velocity);
        }
        seen
    }

    /// Runs calibration, note mapping and note tracking for one frame.
    pub fn process_peaks(&mut self, peaks: &[SpectralPeak]) -> FrameOutcome {
        let calibration_changed = self.calibration.observe(peaks);
        if calibration_changed {
            debug!("Calibration changed: {:?}", self.calibration.bounds());
        }

        let seen = self.notes_for_peaks(peaks);
        let transitions = self.notes.step(&seen.keys().copied().collect());

        let mut events = Vec::with_capacity(transitions.note_offs.len() + transitions.note_ons.len());
        events.extend(
            transitions
                .note_offs
                .into_iter()
                .map(|note| NoteEvent::NoteOff { note }),
        );
        events.extend(transitions.note_ons.into_iter().map(|note| NoteEvent::NoteOn {
            note,
            velocity: seen[&note],
        }));

        FrameOutcome {
            events,
            calibration_changed,
        }
    }

    /// Marks a note as never having started, so the next frame that still
    /// detects it sends a fresh note-on.
    pub fn forget_note(&mut self, note: MidiNote) -> bool {
        self.notes.forget(note)
    }

    /// Note-offs for every note still sounding.
    pub fn drain(&mut self) -> Vec<NoteEvent> {
        self.notes
            .drain()
            .into_iter()
            .map(|note| NoteEvent::NoteOff { note })
            .collect()
    }
}
