//! # Tuning Module
//!
//! Conversions between frequencies and MIDI note numbers in twelve-tone
//! equal temperament with A4 = 440 Hz (MIDI note 69).
//!
//! ## Rounding
//! Frequencies map to the nearest note with ties rounded away from zero:
//! a value of exactly 69.5 semitones becomes note 70. Truncation is never
//! used, so a pitch a few cents flat of A4 still maps to 69 rather than 68.

use once_cell::sync::Lazy;
use std::fmt;

/// Reference pitch for A4 in Hz.
pub const A4_FREQUENCY: f64 = 440.0;
/// MIDI note number of A4.
pub const A4_NOTE: i32 = 69;

/// Lowest key of a regular 88-key keyboard (A0).
pub const MIDI_NOTE_MIN: u8 = 21;
/// Highest key of a regular 88-key keyboard (C8).
pub const MIDI_NOTE_MAX: u8 = 108;

const PITCH_CLASSES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Names for all 128 MIDI notes, computed once ("C-1" through "G9").
static NOTE_NAMES: Lazy<Vec<String>> = Lazy::new(|| {
    (0..128)
        .map(|note: i32| format!("{}{}", PITCH_CLASSES[(note % 12) as usize], note / 12 - 1))
        .collect()
});

/// Equal temperament frequencies for all 128 MIDI notes.
static NOTE_FREQUENCIES: Lazy<Vec<f32>> =
    Lazy::new(|| (0..128).map(frequency_for_note).collect());

/// A MIDI note number, guaranteed to lie in `0..=127`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MidiNote(u8);

impl MidiNote {
    /// Returns `None` for values outside the MIDI range. Out-of-range notes
    /// are discarded, never clamped.
    pub fn new(value: i32) -> Option<Self> {
        u8::try_from(value).ok().filter(|&v| v <= 127).map(MidiNote)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Note name such as "A4" or "C#3".
    pub fn name(self) -> &'static str {
        &NOTE_NAMES[self.0 as usize]
    }

    /// Equal temperament frequency of this note in Hz.
    pub fn frequency(self) -> f32 {
        NOTE_FREQUENCIES[self.0 as usize]
    }

    /// Whether the note lies on a regular 88-key keyboard.
    pub fn is_on_keyboard(self) -> bool {
        (MIDI_NOTE_MIN..=MIDI_NOTE_MAX).contains(&self.0)
    }
}

impl fmt::Display for MidiNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.0)
    }
}

/// Rounds a fractional note number to the nearest integer, ties away from zero.
pub fn round_semitone(semitones: f64) -> i32 {
    semitones.round() as i32
}

/// Returns `round(69 + 12 * log2(frequency / 440))`.
///
/// `frequency` must be positive and finite. Other inputs have no meaningful
/// note; use [`midi_note_for_frequency`] when the input is not already
/// filtered.
pub fn note_for_frequency(frequency: f32) -> i32 {
    let semitones = A4_NOTE as f64 + 12.0 * (frequency as f64 / A4_FREQUENCY).log2();
    round_semitone(semitones)
}

/// Maps a frequency to a MIDI note, discarding non-positive, non-finite
/// and out-of-range results.
pub fn midi_note_for_frequency(frequency: f32) -> Option<MidiNote> {
    if !frequency.is_finite() || frequency <= 0.0 {
        return None;
    }
    MidiNote::new(note_for_frequency(frequency))
}

/// Returns `440 * 2^((note - 69) / 12)`.
pub fn frequency_for_note(note: i32) -> f32 {
    (A4_FREQUENCY * 2.0_f64.powf((note - A4_NOTE) as f64 / 12.0)) as f32
}
