//! End-to-end behaviour of one session fed with known spectral peaks.

use midiphone_core::calibration::CalibrationState;
use midiphone_core::midi::NoteEvent;
use midiphone_core::session::{ControlMessage, Session};
use midiphone_core::spectral::SpectralPeak;
use midiphone_core::tuning::MidiNote;
use midiphone_core::velocity::VelocityConfig;

fn peak(frequency: f32, magnitude: f32) -> SpectralPeak {
    SpectralPeak {
        frequency,
        magnitude,
    }
}

fn a4() -> MidiNote {
    MidiNote::new(69).unwrap()
}

fn session(keyboard_has_velocity: bool, velocity_threshold: u8) -> Session {
    Session::new(
        CalibrationState::new(0.0, 2000.0),
        VelocityConfig {
            keyboard_has_velocity,
            velocity_threshold,
        },
    )
}

#[test]
fn velocity_keyboard_plays_a4_at_half_velocity() {
    let mut session = session(true, 64);

    let first = session.process_peaks(&[peak(440.0, 1000.0)]);
    match first.events.as_slice() {
        [NoteEvent::NoteOn { note, velocity }] => {
            assert_eq!(*note, a4());
            assert!((63..=64).contains(velocity));
        }
        other => panic!("expected a single note on, got {:?}", other),
    }

    let second = session.process_peaks(&[]);
    assert_eq!(second.events, vec![NoteEvent::NoteOff { note: a4() }]);
}

#[test]
fn binary_keyboard_sends_full_velocity_or_nothing() {
    // 127 * 1000 / 2000 = 63.5, which does not reach a threshold of 64.
    let mut session = session(false, 64);
    assert!(session.process_peaks(&[peak(440.0, 1000.0)]).events.is_empty());
    assert!(session.notes().active().is_empty());

    // A louder peak clears the threshold and is sent at 127.
    let louder = session.process_peaks(&[peak(440.0, 1200.0)]);
    assert_eq!(louder.events, vec![NoteEvent::NoteOn { note: a4(), velocity: 127 }]);
}

#[test]
fn repeated_detection_sends_one_note_on() {
    let mut session = session(true, 64);
    let c4 = MidiNote::new(60).unwrap();

    let mut events = session.process_peaks(&[peak(261.63, 1500.0)]).events;
    events.extend(session.process_peaks(&[peak(261.63, 1500.0)]).events);

    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], NoteEvent::NoteOn { note, .. } if note == c4));
}

#[test]
fn listening_for_the_minimum_keeps_the_last_frame() {
    let mut session = Session::default();
    session.apply(ControlMessage::ToggleListenMinimum(3));

    let changed: Vec<bool> = [50.0, 80.0, 30.0]
        .into_iter()
        .map(|loudest| {
            session
                .process_peaks(&[peak(100.0, loudest / 3.0), peak(200.0, loudest)])
                .calibration_changed
        })
        .collect();

    assert_eq!(session.bounds().minimum, 30.0);
    assert!(changed.contains(&true));

    // The window is closed now.
    let after = session.process_peaks(&[peak(100.0, 500.0)]);
    assert!(!after.calibration_changed);
    assert_eq!(session.bounds().minimum, 30.0);
}

#[test]
fn inverted_bounds_are_tolerated() {
    let mut session = Session::new(
        CalibrationState::new(1500.0, 500.0),
        VelocityConfig {
            keyboard_has_velocity: true,
            velocity_threshold: 64,
        },
    );
    let outcome = session.process_peaks(&[peak(440.0, 2000.0), peak(880.0, 1000.0)]);
    // Only the peak above the minimum sounds, clamped to velocity 0.
    assert_eq!(outcome.events, vec![NoteEvent::NoteOn { note: a4(), velocity: 0 }]);
}
