//! # Driver Loop Module
//!
//! The blocking, single-threaded frame pump. Each iteration pulls one
//! frame, runs analysis, calibration, velocity mapping and note tracking,
//! and forwards the resulting note events to the MIDI sink.
//!
//! ## Failure policy
//! - A frame that fails to analyse, or panics while being processed, is
//!   logged and skipped. The session is restored to its state before the
//!   frame, so a bad frame leaves no trace.
//! - A rejected MIDI message is logged. A rejected note-on is forgotten by
//!   the note tracker so it is retried while the note is still detected.
//! - A failing frame source ends the loop.
//!
//! Whatever ends the loop, every note still sounding is released before
//! the loop reports [`LoopState::Stopped`].

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use tracing::{debug, error, info, warn};

use crate::EngineEvent;
use crate::audio::Frame;
use crate::error::{AnalysisError, FrameError, SourceError};
use crate::midi::{MidiSink, NoteEvent};
use crate::session::{ControlMessage, Session};
use crate::spectral::{SpectralAnalyzer, SpectralPeak};

/// Supplier of fixed-size audio frames. `next_frame` may block.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Frame, SourceError>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn next_frame(&mut self) -> Result<Frame, SourceError> {
        (**self).next_frame()
    }
}

/// Turns one frame into spectral peaks.
pub trait FrameAnalyzer {
    fn analyze(&mut self, frame: &Frame) -> Result<Vec<SpectralPeak>, AnalysisError>;
}

impl FrameAnalyzer for SpectralAnalyzer {
    fn analyze(&mut self, frame: &Frame) -> Result<Vec<SpectralPeak>, AnalysisError> {
        SpectralAnalyzer::analyze(self, frame)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
    Stopping,
    Stopped,
}

/// Creates the stop signal pair for a [`DriverLoop`].
///
/// Sending on the sender, or dropping it, asks the loop to stop before it
/// pulls its next frame.
pub fn stop_signal() -> (Sender<()>, Receiver<()>) {
    crossbeam_channel::bounded(1)
}

pub struct DriverLoop<K: MidiSink, A: FrameAnalyzer = SpectralAnalyzer> {
    session: Session,
    analyzer: A,
    sink: K,
    controls: Receiver<ControlMessage>,
    shutdown: Receiver<()>,
    events: Option<Sender<EngineEvent>>,
    state: LoopState,
}

impl<K: MidiSink, A: FrameAnalyzer> DriverLoop<K, A> {
    pub fn new(
        session: Session,
        analyzer: A,
        sink: K,
        controls: Receiver<ControlMessage>,
        shutdown: Receiver<()>,
    ) -> Self {
        Self {
            session,
            analyzer,
            sink,
            controls,
            shutdown,
            events: None,
            state: LoopState::Idle,
        }
    }

    /// Publishes [`EngineEvent`]s to `events` while running.
    pub fn with_events(mut self, events: Option<Sender<EngineEvent>>) -> Self {
        self.events = events;
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn into_sink(self) -> K {
        self.sink
    }

    /// Runs until the stop signal fires or the source fails.
    ///
    /// Returns `Ok(())` after a requested stop and the source error
    /// otherwise. Sounding notes are released in both cases.
    pub fn run<S: FrameSource + ?Sized>(&mut self, source: &mut S) -> Result<(), SourceError> {
        self.transition(LoopState::Running);
        self.publish(EngineEvent::Started);

        let result = loop {
            if self.stop_requested() {
                info!("Stop requested, leaving the frame loop");
                break Ok(());
            }

            let frame = match source.next_frame() {
                Ok(frame) => frame,
                Err(e) => {
                    error!("Frame source failed: {}", e);
                    break Err(e);
                }
            };

            self.apply_controls();
            if let Err(e) = self.process_frame(&frame) {
                warn!("Skipping frame: {}", e);
            }
        };

        self.transition(LoopState::Stopping);
        self.drain();
        self.transition(LoopState::Stopped);
        self.publish(EngineEvent::Stopped {
            error: result.as_ref().err().map(ToString::to_string),
        });

        result
    }

    fn transition(&mut self, state: LoopState) {
        debug!("Driver loop {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    fn stop_requested(&self) -> bool {
        match self.shutdown.try_recv() {
            Ok(()) | Err(TryRecvError::Disconnected) => true,
            Err(TryRecvError::Empty) => false,
        }
    }

    fn apply_controls(&mut self) {
        while let Ok(message) = self.controls.try_recv() {
            self.session.apply(message);
        }
    }

    /// Processes one frame, rolling the session back if anything fails.
    pub fn process_frame(&mut self, frame: &Frame) -> Result<(), FrameError> {
        let snapshot = self.session.clone();

        let processed = panic::catch_unwind(AssertUnwindSafe(|| {
            self.analyzer
                .analyze(frame)
                .map(|peaks| {
                    let outcome = self.session.process_peaks(&peaks);
                    (peaks, outcome)
                })
        }));

        let (peaks, outcome) = match processed {
            Ok(Ok(processed)) => processed,
            Ok(Err(e)) => {
                self.session = snapshot;
                return Err(e.into());
            }
            Err(payload) => {
                self.session = snapshot;
                return Err(FrameError::Panicked(panic_message(payload.as_ref())));
            }
        };

        for event in &outcome.events {
            self.emit(event);
        }

        if outcome.calibration_changed {
            self.publish(EngineEvent::CalibrationChanged(self.session.bounds()));
        }
        if self.events.is_some() {
            let active_notes = self.session.notes().active().iter().copied().collect();
            self.publish(EngineEvent::Frame { peaks, active_notes });
        }

        Ok(())
    }

    fn emit(&mut self, event: &NoteEvent) {
        match (self.sink.send(event), *event) {
            (Ok(()), NoteEvent::NoteOn { note, velocity }) => {
                info!("Note On: {}, Velocity: {}", note, velocity);
            }
            (Ok(()), NoteEvent::NoteOff { note }) => {
                info!("Note Off: {}", note);
            }
            (Err(e), NoteEvent::NoteOn { note, .. }) => {
                warn!("Dropping note on for {}: {}", note, e);
                self.session.forget_note(note);
            }
            (Err(e), NoteEvent::NoteOff { note }) => {
                warn!("Failed to send note off for {}: {}", note, e);
            }
        }
    }

    fn drain(&mut self) {
        let releases = self.session.drain();
        if !releases.is_empty() {
            info!("Releasing {} sounding note(s)", releases.len());
        }
        for event in &releases {
            self.emit(event);
        }
    }

    fn publish(&mut self, event: EngineEvent) {
        if let Some(events) = &self.events {
            if events.send(event).is_err() {
                debug!("Engine event receiver dropped, no longer publishing");
                self.events = None;
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
