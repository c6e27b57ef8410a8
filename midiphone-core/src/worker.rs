//! # Audio Worker Module
//!
//! Runs one [`DriverLoop`] on a dedicated thread. The worker is the only
//! writer of session state; everything else talks to it through a
//! [`ControlHandle`] and listens to [`EngineEvent`]s.
//!
//! The MIDI sink is moved into the thread and handed back by
//! [`AudioWorker::join`], so one output port can outlive many capture
//! sessions (e.g. when the input device changes).

use std::thread::{self, JoinHandle};

use crossbeam_channel::Sender;
use tracing::{error, info, warn};

use crate::EngineEvent;
use crate::driver::{self, DriverLoop, FrameSource};
use crate::midi::MidiSink;
use crate::session::{ControlMessage, Session};
use crate::spectral::SpectralAnalyzer;

/// Cloneable handle for adjusting a running session from other threads.
///
/// Messages are applied by the worker at the next frame boundary. Sending
/// to a worker that has already stopped is a no-op.
#[derive(Debug, Clone)]
pub struct ControlHandle {
    sender: Sender<ControlMessage>,
}

impl ControlHandle {
    pub fn send(&self, message: ControlMessage) -> bool {
        self.sender.send(message).is_ok()
    }

    pub fn set_keyboard_has_velocity(&self, enabled: bool) -> bool {
        self.send(ControlMessage::SetKeyboardHasVelocity(enabled))
    }

    pub fn set_velocity_threshold(&self, threshold: u8) -> bool {
        self.send(ControlMessage::SetVelocityThreshold(threshold))
    }

    pub fn set_minimum_magnitude(&self, magnitude: f32) -> bool {
        self.send(ControlMessage::SetMinimumMagnitude(magnitude))
    }

    pub fn set_maximum_magnitude(&self, magnitude: f32) -> bool {
        self.send(ControlMessage::SetMaximumMagnitude(magnitude))
    }

    pub fn toggle_listen_minimum(&self, frames: u32) -> bool {
        self.send(ControlMessage::ToggleListenMinimum(frames))
    }

    pub fn toggle_listen_maximum(&self, frames: u32) -> bool {
        self.send(ControlMessage::ToggleListenMaximum(frames))
    }
}

/// Handle to the audio thread.
#[derive(Debug)]
pub struct AudioWorker<K> {
    shutdown_tx: Sender<()>,
    control: ControlHandle,
    thread_handle: Option<JoinHandle<K>>,
}

impl<K> AudioWorker<K>
where
    K: MidiSink + Send + 'static,
{
    /// Spawns the audio thread.
    ///
    /// `open_source` runs on the new thread, because capture streams may
    /// not be movable between threads. If it fails the thread publishes
    /// [`EngineEvent::Stopped`] with the error and returns the sink.
    pub fn spawn<S, F>(
        open_source: F,
        sink: K,
        session: Session,
        events: Option<Sender<EngineEvent>>,
    ) -> std::io::Result<Self>
    where
        S: FrameSource,
        F: FnOnce() -> anyhow::Result<S> + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = driver::stop_signal();
        let (control_tx, control_rx) = crossbeam_channel::unbounded();

        let thread_handle = thread::Builder::new()
            .name("midiphone-audio".to_string())
            .spawn(move || {
                info!("Starting audio thread...");
                let mut source = match open_source() {
                    Ok(source) => source,
                    Err(e) => {
                        error!("Fatal error starting audio: {:#}", e);
                        if let Some(events) = &events {
                            let _ = events.send(EngineEvent::Stopped {
                                error: Some(format!("{:#}", e)),
                            });
                        }
                        return sink;
                    }
                };

                let mut driver = DriverLoop::new(
                    session,
                    SpectralAnalyzer::default(),
                    sink,
                    control_rx,
                    shutdown_rx,
                )
                .with_events(events);

                match driver.run(&mut source) {
                    Ok(()) => info!("Audio thread finished"),
                    Err(e) => warn!("Audio thread finished after source error: {}", e),
                }
                drop(source);
                driver.into_sink()
            })?;

        Ok(Self {
            shutdown_tx,
            control: ControlHandle { sender: control_tx },
            thread_handle: Some(thread_handle),
        })
    }

    pub fn control(&self) -> ControlHandle {
        self.control.clone()
    }

    /// Asks the loop to stop after its current frame. Does not wait.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.try_send(());
    }

    pub fn is_finished(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(JoinHandle::is_finished)
            .unwrap_or(true)
    }

    /// Stops the loop and waits for the thread, returning the MIDI sink.
    ///
    /// Blocks for as long as the frame source blocks. Returns `None` if
    /// the audio thread panicked.
    pub fn join(mut self) -> Option<K> {
        self.stop();
        let handle = self.thread_handle.take()?;
        match handle.join() {
            Ok(sink) => Some(sink),
            Err(_) => {
                error!("Audio thread panicked");
                None
            }
        }
    }
}

impl<K> Drop for AudioWorker<K> {
    fn drop(&mut self) {
        // A worker dropped without `join` still releases its notes.
        let _ = self.shutdown_tx.try_send(());
    }
}
