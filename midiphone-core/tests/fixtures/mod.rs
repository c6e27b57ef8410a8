//! Shared helpers for driver loop tests: synthetic frames, scripted frame
//! sources and a sink that records what it was sent.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::f32::consts::PI;

use crossbeam_channel::Sender;
use midiphone_core::audio::{CHUNK_SIZE, Frame};
use midiphone_core::driver::FrameSource;
use midiphone_core::error::{MidiError, SourceError};
use midiphone_core::midi::{MidiSink, NoteEvent};
use midiphone_core::tuning::MidiNote;

/// A sine at the centre of FFT bin `bin`, so all its energy lands in one bin.
pub fn tone_frame(bin: usize, amplitude: f32) -> Frame {
    Frame::new(
        (0..CHUNK_SIZE)
            .map(|n| {
                (amplitude * (2.0 * PI * bin as f32 * n as f32 / CHUNK_SIZE as f32).sin()).round()
                    as i16
            })
            .collect(),
    )
}

pub fn silent_frame() -> Frame {
    Frame::silent(CHUNK_SIZE)
}

pub fn note(value: i32) -> MidiNote {
    MidiNote::new(value).unwrap()
}

/// Plays back a fixed list of frames, then reports a disconnect.
///
/// With `stop_after`, the stop signal is raised right after frame `n`
/// (counting from 1) has been handed out.
pub struct ScriptedSource {
    frames: VecDeque<Frame>,
    delivered: usize,
    stop_after: Option<(usize, Sender<()>)>,
}

impl ScriptedSource {
    pub fn new(frames: impl IntoIterator<Item = Frame>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
            delivered: 0,
            stop_after: None,
        }
    }

    pub fn stop_after(mut self, frames: usize, stop: Sender<()>) -> Self {
        self.stop_after = Some((frames, stop));
        self
    }

    pub fn delivered(&self) -> usize {
        self.delivered
    }
}

impl FrameSource for ScriptedSource {
    fn next_frame(&mut self) -> Result<Frame, SourceError> {
        let frame = self.frames.pop_front().ok_or(SourceError::Disconnected)?;
        self.delivered += 1;
        if let Some((n, stop)) = &self.stop_after {
            if *n == self.delivered {
                let _ = stop.try_send(());
            }
        }
        Ok(frame)
    }
}

/// Records every event it accepts. Can be told to reject note-ons.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<NoteEvent>,
    pub reject_note_ons: usize,
}

impl RecordingSink {
    pub fn rejecting_note_ons(count: usize) -> Self {
        Self {
            events: Vec::new(),
            reject_note_ons: count,
        }
    }

    pub fn note_ons(&self, value: i32) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, NoteEvent::NoteOn { note: n, .. } if *n == note(value)))
            .count()
    }

    pub fn note_offs(&self, value: i32) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, NoteEvent::NoteOff { note: n } if *n == note(value)))
            .count()
    }
}

impl MidiSink for RecordingSink {
    fn note_on(&mut self, note: MidiNote, velocity: u8) -> Result<(), MidiError> {
        if self.reject_note_ons > 0 {
            self.reject_note_ons -= 1;
            return Err(MidiError::Send("port busy".to_string()));
        }
        self.events.push(NoteEvent::NoteOn { note, velocity });
        Ok(())
    }

    fn note_off(&mut self, note: MidiNote) -> Result<(), MidiError> {
        self.events.push(NoteEvent::NoteOff { note });
        Ok(())
    }
}
