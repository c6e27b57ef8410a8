//! MIDI output
//!
//! The engine emits structured [`NoteEvent`]s to a [`MidiSink`]. The sink
//! used by the application, [`VirtualMidiOutput`], publishes a virtual
//! port through midir where the platform supports it and otherwise
//! connects to an existing port (e.g. a loopback driver) by name.

use midir::{MidiOutput, MidiOutputConnection};
use tracing::info;

use crate::error::MidiError;
use crate::tuning::MidiNote;

/// Default name of the virtual output port.
pub const DEFAULT_PORT_NAME: &str = "MIDIPhone";

const NOTE_ON: u8 = 0x90;
const NOTE_OFF: u8 = 0x80;

/// A note event produced by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteEvent {
    NoteOn { note: MidiNote, velocity: u8 },
    NoteOff { note: MidiNote },
}

impl NoteEvent {
    pub fn note(&self) -> MidiNote {
        match *self {
            NoteEvent::NoteOn { note, .. } | NoteEvent::NoteOff { note } => note,
        }
    }
}

/// Receiver of note events. Implementations may fail per message; the
/// engine logs the failure and carries on with the next frame.
pub trait MidiSink {
    fn note_on(&mut self, note: MidiNote, velocity: u8) -> Result<(), MidiError>;

    fn note_off(&mut self, note: MidiNote) -> Result<(), MidiError>;

    fn send(&mut self, event: &NoteEvent) -> Result<(), MidiError> {
        match *event {
            NoteEvent::NoteOn { note, velocity } => self.note_on(note, velocity),
            NoteEvent::NoteOff { note } => self.note_off(note),
        }
    }
}

impl<S: MidiSink + ?Sized> MidiSink for Box<S> {
    fn note_on(&mut self, note: MidiNote, velocity: u8) -> Result<(), MidiError> {
        (**self).note_on(note, velocity)
    }

    fn note_off(&mut self, note: MidiNote) -> Result<(), MidiError> {
        (**self).note_off(note)
    }
}

/// Encode a note event as a channel voice message on `channel`.
///
/// Note-on velocity is raised to at least 1: receivers treat a velocity 0
/// note-on as a note-off.
pub fn encode_note_event(event: &NoteEvent, channel: u8) -> [u8; 3] {
    match *event {
        NoteEvent::NoteOn { note, velocity } => {
            [NOTE_ON | (channel & 0x0F), note.value(), velocity.clamp(1, 127)]
        }
        NoteEvent::NoteOff { note } => [NOTE_OFF | (channel & 0x0F), note.value(), 0],
    }
}

/// MIDI output port backed by midir.
pub struct VirtualMidiOutput {
    connection: MidiOutputConnection,
    port_name: String,
    channel: u8,
}

impl VirtualMidiOutput {
    /// Creates a virtual output port called `port_name`.
    #[cfg(unix)]
    pub fn open(port_name: &str) -> Result<Self, MidiError> {
        use midir::os::unix::VirtualOutput;

        let midi_out = MidiOutput::new(port_name).map_err(|e| MidiError::Init(e.to_string()))?;
        let connection = midi_out
            .create_virtual(port_name)
            .map_err(|e| MidiError::Connect(e.to_string()))?;

        info!("Created virtual MIDI output: {}", port_name);

        Ok(Self {
            connection,
            port_name: port_name.to_string(),
            channel: 0,
        })
    }

    /// Connects to the first existing output port whose name contains
    /// `port_name`; this platform cannot publish virtual ports.
    #[cfg(not(unix))]
    pub fn open(port_name: &str) -> Result<Self, MidiError> {
        let midi_out = MidiOutput::new(port_name).map_err(|e| MidiError::Init(e.to_string()))?;

        let ports = midi_out.ports();
        let port = ports
            .iter()
            .find(|p| {
                midi_out
                    .port_name(p)
                    .map(|n| n.contains(port_name))
                    .unwrap_or(false)
            })
            .ok_or_else(|| MidiError::PortNotFound(port_name.to_string()))?;

        let connected_name = midi_out
            .port_name(port)
            .map_err(|e| MidiError::Connect(e.to_string()))?;
        let connection = midi_out
            .connect(port, port_name)
            .map_err(|e| MidiError::Connect(e.to_string()))?;

        info!("Opened MIDI output: {}", connected_name);

        Ok(Self {
            connection,
            port_name: connected_name,
            channel: 0,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    fn send_event(&mut self, event: &NoteEvent) -> Result<(), MidiError> {
        let bytes = encode_note_event(event, self.channel);
        self.connection
            .send(&bytes)
            .map_err(|e| MidiError::Send(e.to_string()))
    }
}

impl MidiSink for VirtualMidiOutput {
    fn note_on(&mut self, note: MidiNote, velocity: u8) -> Result<(), MidiError> {
        self.send_event(&NoteEvent::NoteOn { note, velocity })
    }

    fn note_off(&mut self, note: MidiNote) -> Result<(), MidiError> {
        self.send_event(&NoteEvent::NoteOff { note })
    }
}
