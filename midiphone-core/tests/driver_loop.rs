mod fixtures;

use std::time::Duration;

use anyhow::anyhow;
use crossbeam_channel::Receiver;
use fixtures::{RecordingSink, ScriptedSource, note, silent_frame, tone_frame};
use midiphone_core::EngineEvent;
use midiphone_core::audio::Frame;
use midiphone_core::calibration::CalibrationState;
use midiphone_core::driver::{DriverLoop, LoopState, stop_signal};
use midiphone_core::error::SourceError;
use midiphone_core::midi::NoteEvent;
use midiphone_core::session::{ControlMessage, Session};
use midiphone_core::spectral::SpectralAnalyzer;
use midiphone_core::velocity::VelocityConfig;
use midiphone_core::worker::AudioWorker;

/// Bin 10 is ~430.7 Hz, which rounds to A4.
const A4_BIN: usize = 10;
/// Bin 6 is ~258.4 Hz, which rounds to C4.
const C4_BIN: usize = 6;

/// Gate out quantization noise, send every remaining note at full velocity.
fn session() -> Session {
    Session::new(
        CalibrationState::new(1_000.0, 1.0e7),
        VelocityConfig {
            keyboard_has_velocity: false,
            velocity_threshold: 0,
        },
    )
}

fn driver_with(
    session: Session,
    sink: RecordingSink,
) -> (
    DriverLoop<RecordingSink>,
    crossbeam_channel::Sender<ControlMessage>,
    crossbeam_channel::Sender<()>,
) {
    let (control_tx, control_rx) = crossbeam_channel::unbounded();
    let (stop_tx, stop_rx) = stop_signal();
    let driver = DriverLoop::new(session, SpectralAnalyzer::default(), sink, control_rx, stop_rx);
    (driver, control_tx, stop_tx)
}

fn drain_events(rx: &Receiver<EngineEvent>) -> Vec<EngineEvent> {
    rx.try_iter().collect()
}

#[test]
fn tone_then_silence_turns_a4_on_and_off() {
    let (mut driver, _controls, _stop) = driver_with(session(), RecordingSink::default());
    let mut source = ScriptedSource::new([tone_frame(A4_BIN, 10_000.0), silent_frame()]);

    assert_eq!(driver.run(&mut source), Err(SourceError::Disconnected));
    assert_eq!(driver.state(), LoopState::Stopped);
    assert_eq!(
        driver.sink().events,
        vec![
            NoteEvent::NoteOn { note: note(69), velocity: 127 },
            NoteEvent::NoteOff { note: note(69) },
        ]
    );
}

#[test]
fn sustained_note_sends_one_note_on() {
    let (mut driver, _controls, _stop) = driver_with(session(), RecordingSink::default());
    let mut source = ScriptedSource::new([tone_frame(C4_BIN, 8_000.0), tone_frame(C4_BIN, 8_000.0)]);

    let _ = driver.run(&mut source);

    let sink = driver.into_sink();
    assert_eq!(sink.note_ons(60), 1);
    // The only note-off comes from the shutdown drain.
    assert_eq!(sink.note_offs(60), 1);
    assert_eq!(sink.events.last(), Some(&NoteEvent::NoteOff { note: note(60) }));
}

#[test]
fn stop_request_drains_sounding_notes() {
    let (mut driver, _controls, stop) = driver_with(session(), RecordingSink::default());
    let mut source = ScriptedSource::new(vec![tone_frame(A4_BIN, 10_000.0); 3]).stop_after(1, stop);

    assert_eq!(driver.run(&mut source), Ok(()));
    assert_eq!(source.delivered(), 1);
    assert_eq!(driver.state(), LoopState::Stopped);
    assert_eq!(
        driver.sink().events,
        vec![
            NoteEvent::NoteOn { note: note(69), velocity: 127 },
            NoteEvent::NoteOff { note: note(69) },
        ]
    );
}

#[test]
fn malformed_frame_does_not_end_the_session() {
    let (mut driver, _controls, _stop) = driver_with(session(), RecordingSink::default());
    let mut source = ScriptedSource::new([
        tone_frame(A4_BIN, 10_000.0),
        Frame::silent(100),
        tone_frame(A4_BIN, 10_000.0),
    ]);

    let _ = driver.run(&mut source);

    assert_eq!(source.delivered(), 3);
    let sink = driver.into_sink();
    // The short frame is skipped entirely; it does not release A4.
    assert_eq!(sink.note_ons(69), 1);
    assert_eq!(sink.note_offs(69), 1);
}

#[test]
fn rejected_note_on_is_retried_on_the_next_frame() {
    let (mut driver, _controls, _stop) = driver_with(session(), RecordingSink::rejecting_note_ons(1));
    let mut source = ScriptedSource::new([tone_frame(A4_BIN, 10_000.0), tone_frame(A4_BIN, 10_000.0)]);

    let _ = driver.run(&mut source);

    assert_eq!(
        driver.sink().events,
        vec![
            NoteEvent::NoteOn { note: note(69), velocity: 127 },
            NoteEvent::NoteOff { note: note(69) },
        ]
    );
}

#[test]
fn control_messages_apply_before_the_next_frame() {
    let mut strict = session();
    strict.velocity.velocity_threshold = 127;
    let (mut driver, controls, _stop) = driver_with(strict, RecordingSink::default());
    controls.send(ControlMessage::SetVelocityThreshold(0)).unwrap();

    let mut source = ScriptedSource::new([tone_frame(A4_BIN, 10_000.0)]);
    let _ = driver.run(&mut source);

    assert_eq!(driver.sink().note_ons(69), 1);
    assert_eq!(driver.session().velocity.velocity_threshold, 0);
}

#[test]
fn listen_window_publishes_calibration_changes() {
    let (events_tx, events_rx) = crossbeam_channel::unbounded();
    let (driver, controls, _stop) = driver_with(session(), RecordingSink::default());
    let mut driver = driver.with_events(Some(events_tx));
    controls.send(ControlMessage::ToggleListenMinimum(2)).unwrap();

    let mut source = ScriptedSource::new([
        tone_frame(A4_BIN, 10_000.0),
        tone_frame(A4_BIN, 5_000.0),
        silent_frame(),
    ]);
    let _ = driver.run(&mut source);

    let minimum = driver.session().bounds().minimum;
    let expected = 5_000.0 * 1024.0 / 2.0;
    assert!((minimum - expected).abs() / expected < 0.01);
    assert!(!driver.session().calibration.is_listening_minimum());

    let events = drain_events(&events_rx);
    assert_eq!(events.first(), Some(&EngineEvent::Started));
    let changes = events
        .iter()
        .filter(|e| matches!(e, EngineEvent::CalibrationChanged(_)))
        .count();
    assert_eq!(changes, 2);
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, EngineEvent::Frame { .. }))
            .count(),
        3
    );
    assert_eq!(
        events.last(),
        Some(&EngineEvent::Stopped {
            error: Some(SourceError::Disconnected.to_string())
        })
    );
}

#[test]
fn frame_events_report_active_notes() {
    let (events_tx, events_rx) = crossbeam_channel::unbounded();
    let (driver, _controls, _stop) = driver_with(session(), RecordingSink::default());
    let mut driver = driver.with_events(Some(events_tx));

    let _ = driver.run(&mut ScriptedSource::new([tone_frame(A4_BIN, 10_000.0)]));

    let active: Vec<_> = drain_events(&events_rx)
        .into_iter()
        .filter_map(|e| match e {
            EngineEvent::Frame { active_notes, .. } => Some(active_notes),
            _ => None,
        })
        .collect();
    assert_eq!(active, vec![vec![note(69)]]);
}

#[test]
fn worker_returns_the_sink_after_the_source_ends() {
    let (events_tx, events_rx) = crossbeam_channel::unbounded();
    let worker = AudioWorker::spawn(
        || Ok(ScriptedSource::new([tone_frame(A4_BIN, 10_000.0), silent_frame()])),
        RecordingSink::default(),
        session(),
        Some(events_tx),
    )
    .unwrap();

    let stopped = events_rx
        .iter()
        .find(|e| matches!(e, EngineEvent::Stopped { .. }));
    assert!(stopped.is_some());

    let sink = worker.join().unwrap();
    assert_eq!(sink.note_ons(69), 1);
    assert_eq!(sink.note_offs(69), 1);
}

#[test]
fn worker_reports_source_open_failure() {
    let (events_tx, events_rx) = crossbeam_channel::unbounded();
    let worker = AudioWorker::spawn(
        || -> anyhow::Result<ScriptedSource> { Err(anyhow!("no input device")) },
        RecordingSink::default(),
        session(),
        Some(events_tx),
    )
    .unwrap();

    let event = events_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    match event {
        EngineEvent::Stopped { error: Some(message) } => assert!(message.contains("no input device")),
        other => panic!("unexpected event: {:?}", other),
    }

    let sink = worker.join().unwrap();
    assert!(sink.events.is_empty());
}

#[test]
fn worker_control_handle_reaches_the_session() {
    let (events_tx, events_rx) = crossbeam_channel::unbounded();
    let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(0);

    // Hold the first frame back until the control message has been queued.
    struct Gated {
        release: Receiver<()>,
        inner: ScriptedSource,
    }
    impl midiphone_core::driver::FrameSource for Gated {
        fn next_frame(&mut self) -> Result<Frame, SourceError> {
            let _ = self.release.recv();
            self.inner.next_frame()
        }
    }

    let mut strict = session();
    strict.velocity.velocity_threshold = 127;
    let worker = AudioWorker::spawn(
        move || {
            Ok(Gated {
                release: release_rx,
                inner: ScriptedSource::new([tone_frame(A4_BIN, 10_000.0)]),
            })
        },
        RecordingSink::default(),
        strict,
        Some(events_tx),
    )
    .unwrap();

    assert!(worker.control().set_velocity_threshold(0));
    drop(release_tx);

    assert!(
        events_rx
            .iter()
            .any(|e| matches!(e, EngineEvent::Stopped { .. }))
    );
    let sink = worker.join().unwrap();
    assert_eq!(sink.note_ons(69), 1);
}
