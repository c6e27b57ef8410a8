// midiphone-core/src/lib.rs

//! The core logic for MIDIPhone.
//! This crate turns a live audio stream into MIDI note-on / note-off
//! events: spectral peak picking, frequency-to-note mapping, velocity
//! scaling, self-calibration and note state tracking. It is completely
//! headless and contains no GUI code.

pub mod audio;
pub mod calibration;
pub mod driver;
pub mod error;
pub mod midi;
pub mod notes;
pub mod session;
pub mod settings;
pub mod spectral;
pub mod tuning;
pub mod velocity;
pub mod worker;

use calibration::CalibrationBounds;
use spectral::SpectralPeak;
use tuning::MidiNote;

/// Notifications published by the audio thread.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// The driver loop entered its running state.
    Started,
    /// A listen window moved one of the calibration bounds.
    CalibrationChanged(CalibrationBounds),
    /// Display data for the frame just processed.
    Frame {
        peaks: Vec<SpectralPeak>,
        active_notes: Vec<MidiNote>,
    },
    /// The audio thread is done; `error` is set when it did not stop on request.
    Stopped { error: Option<String> },
}
