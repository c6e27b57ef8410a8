//! Error types for the MIDIPhone engine.
//!
//! Errors are split by how the driver loop treats them: analysis and send
//! failures only cost the current frame, source failures end the loop.

use thiserror::Error;

/// A frame could not be turned into spectral peaks.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    #[error("frame has {actual} samples, analyzer expects {expected}")]
    FrameLength { expected: usize, actual: usize },
}

/// The frame source can no longer deliver audio.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SourceError {
    #[error("audio source disconnected")]
    Disconnected,
}

/// Errors raised by the MIDI output collaborator.
#[derive(Debug, Error)]
pub enum MidiError {
    #[error("failed to initialize MIDI: {0}")]
    Init(String),

    #[error("MIDI port not found: {0}")]
    PortNotFound(String),

    #[error("MIDI connection failed: {0}")]
    Connect(String),

    #[error("MIDI send failed: {0}")]
    Send(String),
}

/// Anything that can abort the processing of a single frame.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error("frame processing panicked: {0}")]
    Panicked(String),
}
