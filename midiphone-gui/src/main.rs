//! # MIDIPhone - Audio to MIDI GUI
//!
//! This module contains the control surface for MIDIPhone. It lets the user
//! pick an input device, start and restart capture, calibrate the magnitude
//! range and choose how velocities are sent to the virtual MIDI port.
//!
//! ## Architecture
//! - **Main Thread**: Iced GUI application with dark theme
//! - **Audio Thread**: `AudioWorker` running the capture-to-MIDI loop
//! - **Communication**: control messages in, engine events out, both over crossbeam channels
//! - **Updates**: 60 FPS polling of engine events via subscription

mod ui;
mod widgets;

use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use iced::{Element, Subscription, Task, Theme};
use midiphone_core::{
    EngineEvent,
    audio::{self, CaptureSource},
    midi::VirtualMidiOutput,
    settings::{DEFAULT_SETTINGS_PATH, Settings},
    spectral::SpectralPeak,
    tuning::MidiNote,
    worker::AudioWorker,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;
use ui::main_display::create_main_view;

/// Main entry point for the MIDIPhone application.
///
/// Installs logging, then runs the Iced GUI with a dark theme and
/// continuous updates. Closing the window goes through [`Message::Exit`]
/// so the audio thread can release its notes first.
pub fn main() -> iced::Result {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(), // RUST_LOG env var takes precedence
        )
        .init();

    info!("Starting MIDIPhone...");
    let result = iced::application("MIDIPhone", MidiPhoneApp::update, MidiPhoneApp::view)
        .subscription(MidiPhoneApp::subscription)
        .theme(MidiPhoneApp::theme)
        .exit_on_close_request(false)
        .run();
    info!("Application finished with result: {:?}", result);
    result
}

/// Application message types for the Iced GUI framework.
#[derive(Debug, Clone)]
pub enum Message {
    // Audio input
    DeviceSelected(String),
    RefreshDevices,
    StartRestart,

    // Calibration
    MinimumMagnitudeChanged(f32),
    MaximumMagnitudeChanged(f32),
    ToggleListenMinimum,
    ToggleListenMaximum,

    // Velocity
    KeyboardHasVelocityToggled(bool),
    VelocityThresholdChanged(u8),

    // Settings file
    SaveSettings,
    LoadSettings,

    // Application control
    Exit,
    Tick,
}

/// Everything the view needs to render the interface.
#[derive(Debug, Clone, Default)]
pub struct AppDisplayData {
    /// Current user settings, mirrored into the running session.
    pub settings: Settings,
    pub input_devices: Vec<String>,
    pub audio_worker_active: bool,
    pub status: String,
    /// End of the running listen windows, as far as the GUI knows.
    pub listen_minimum_until: Option<Instant>,
    pub listen_maximum_until: Option<Instant>,
    pub peaks: Vec<SpectralPeak>,
    pub active_notes: Vec<MidiNote>,
}

/// Main application state.
struct MidiPhoneApp {
    /// MIDI output held while no audio thread owns it.
    midi_output: Option<VirtualMidiOutput>,
    audio_worker: Option<AudioWorker<VirtualMidiOutput>>,
    event_receiver: Option<Receiver<EngineEvent>>,
    display_data: AppDisplayData,
}

impl Default for MidiPhoneApp {
    /// Loads saved settings when present, lists input devices and opens
    /// the MIDI output. Capture starts when the user presses Start.
    fn default() -> Self {
        let settings = match Settings::load(DEFAULT_SETTINGS_PATH) {
            Ok(settings) => {
                info!("Loaded settings from {}", DEFAULT_SETTINGS_PATH);
                settings
            }
            Err(e) => {
                info!("Using default settings ({:#})", e);
                Settings::default()
            }
        };

        let mut app = Self {
            midi_output: None,
            audio_worker: None,
            event_receiver: None,
            display_data: AppDisplayData {
                settings,
                status: "Not listening for audio".to_string(),
                ..AppDisplayData::default()
            },
        };
        app.refresh_devices();
        app.open_midi_output();
        app
    }
}

impl MidiPhoneApp {
    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::DeviceSelected(name) => {
                self.display_data.settings.input_device = Some(name);
            }
            Message::RefreshDevices => self.refresh_devices(),
            Message::StartRestart => self.start_audio_processing(),
            Message::MinimumMagnitudeChanged(magnitude) => {
                self.display_data.settings.minimum_magnitude = magnitude;
                if let Some(worker) = &self.audio_worker {
                    worker.control().set_minimum_magnitude(magnitude);
                }
            }
            Message::MaximumMagnitudeChanged(magnitude) => {
                self.display_data.settings.maximum_magnitude = magnitude;
                if let Some(worker) = &self.audio_worker {
                    worker.control().set_maximum_magnitude(magnitude);
                }
            }
            Message::ToggleListenMinimum => {
                if let Some(worker) = &self.audio_worker {
                    let frames = self.display_data.settings.listen_frames();
                    worker.control().toggle_listen_minimum(frames);
                    self.display_data.listen_minimum_until =
                        toggle_deadline(self.display_data.listen_minimum_until, &self.display_data.settings);
                }
            }
            Message::ToggleListenMaximum => {
                if let Some(worker) = &self.audio_worker {
                    let frames = self.display_data.settings.listen_frames();
                    worker.control().toggle_listen_maximum(frames);
                    self.display_data.listen_maximum_until =
                        toggle_deadline(self.display_data.listen_maximum_until, &self.display_data.settings);
                }
            }
            Message::KeyboardHasVelocityToggled(enabled) => {
                self.display_data.settings.keyboard_has_velocity = enabled;
                if let Some(worker) = &self.audio_worker {
                    worker.control().set_keyboard_has_velocity(enabled);
                }
            }
            Message::VelocityThresholdChanged(threshold) => {
                self.display_data.settings.velocity_threshold = threshold;
                if let Some(worker) = &self.audio_worker {
                    worker.control().set_velocity_threshold(threshold);
                }
            }
            Message::SaveSettings => match self.display_data.settings.save(DEFAULT_SETTINGS_PATH) {
                Ok(()) => info!("Settings saved to {}", DEFAULT_SETTINGS_PATH),
                Err(e) => {
                    error!("Error saving settings: {:#}", e);
                    self.display_data.status = format!("Error saving settings: {}", e);
                }
            },
            Message::LoadSettings => match Settings::load(DEFAULT_SETTINGS_PATH) {
                Ok(settings) => {
                    info!("Settings loaded from {}", DEFAULT_SETTINGS_PATH);
                    self.display_data.settings = settings;
                    self.push_settings_to_worker();
                }
                Err(e) => {
                    error!("Error loading settings: {:#}", e);
                    self.display_data.status = format!("Error loading settings: {}", e);
                }
            },
            Message::Exit => {
                info!("Window close requested - stopping audio...");
                self.stop_audio_processing();
                return iced::exit();
            }
            Message::Tick => {
                let events: Vec<EngineEvent> = self
                    .event_receiver
                    .as_ref()
                    .map(|receiver| receiver.try_iter().collect())
                    .unwrap_or_default();
                for event in events {
                    self.process_engine_event(event);
                }
                expire_deadline(&mut self.display_data.listen_minimum_until);
                expire_deadline(&mut self.display_data.listen_maximum_until);
            }
        }
        Task::none()
    }

    fn refresh_devices(&mut self) {
        match audio::list_input_devices() {
            Ok(devices) => {
                info!("Found {} input device(s)", devices.len());
                let data = &mut self.display_data;
                if data.settings.input_device.is_none() {
                    data.settings.input_device = devices.first().cloned();
                }
                data.input_devices = devices;
            }
            Err(e) => {
                error!("Could not list input devices: {:#}", e);
                self.display_data.status = format!("Could not list input devices: {}", e);
            }
        }
    }

    fn open_midi_output(&mut self) {
        let port_name = &self.display_data.settings.midi_port_name;
        match VirtualMidiOutput::open(port_name) {
            Ok(output) => self.midi_output = Some(output),
            Err(e) => {
                error!("Could not open MIDI output {}: {}", port_name, e);
                self.display_data.status = format!("Could not open MIDI output: {}", e);
            }
        }
    }

    /// Stops any running audio thread, then starts a new one on the
    /// selected device with a fresh session seeded from the settings.
    fn start_audio_processing(&mut self) {
        self.stop_audio_processing();

        if self.midi_output.is_none() {
            self.open_midi_output();
        }
        let Some(sink) = self.midi_output.take() else {
            return;
        };

        let device = self.display_data.settings.input_device.clone();
        info!("Starting audio capture on {:?}", device);
        let (event_tx, event_rx) = crossbeam_channel::unbounded();
        let open_source = move || CaptureSource::open(device.as_deref());

        match AudioWorker::spawn(
            open_source,
            sink,
            self.display_data.settings.session(),
            Some(event_tx),
        ) {
            Ok(worker) => {
                self.audio_worker = Some(worker);
                self.event_receiver = Some(event_rx);
                self.display_data.status = "Starting...".to_string();
            }
            Err(e) => {
                error!("Failed to spawn audio thread: {}", e);
                self.display_data.status = format!("Failed to start audio thread: {}", e);
            }
        }
    }

    /// Stops the audio thread and waits for it, so every sounding note has
    /// been released and the MIDI output is back in our hands.
    fn stop_audio_processing(&mut self) {
        if let Some(worker) = self.audio_worker.take() {
            info!("Shutting down audio worker...");
            match worker.join() {
                Some(sink) => self.midi_output = Some(sink),
                None => warn!("MIDI output lost with the audio thread; it will be reopened"),
            }
        }
        if let Some(receiver) = self.event_receiver.take() {
            for event in receiver.try_iter() {
                self.process_engine_event(event);
            }
        }
        let data = &mut self.display_data;
        data.audio_worker_active = false;
        data.listen_minimum_until = None;
        data.listen_maximum_until = None;
        data.peaks.clear();
        data.active_notes.clear();
    }

    fn push_settings_to_worker(&self) {
        if let Some(worker) = &self.audio_worker {
            let settings = &self.display_data.settings;
            let control = worker.control();
            control.set_minimum_magnitude(settings.minimum_magnitude);
            control.set_maximum_magnitude(settings.maximum_magnitude);
            control.set_keyboard_has_velocity(settings.keyboard_has_velocity);
            control.set_velocity_threshold(settings.velocity_threshold);
        }
    }

    /// Applies one notification from the audio thread to the display data.
    fn process_engine_event(&mut self, event: EngineEvent) {
        let data = &mut self.display_data;
        match event {
            EngineEvent::Started => {
                data.audio_worker_active = true;
                data.status = "Listening for audio...".to_string();
            }
            EngineEvent::CalibrationChanged(bounds) => {
                data.settings.minimum_magnitude = bounds.minimum;
                data.settings.maximum_magnitude = bounds.maximum;
            }
            EngineEvent::Frame {
                peaks,
                active_notes,
            } => {
                data.peaks = peaks;
                data.active_notes = active_notes;
            }
            EngineEvent::Stopped { error } => {
                data.audio_worker_active = false;
                data.active_notes.clear();
                data.status = match error {
                    Some(e) => format!("Not listening for audio ({})", e),
                    None => "Not listening for audio".to_string(),
                };
            }
        }
    }

    fn view(&self) -> Element<'_, Message> {
        create_main_view(&self.display_data)
    }

    /// Polls engine events every 16ms (60 FPS) and turns window close
    /// requests into [`Message::Exit`].
    fn subscription(&self) -> Subscription<Message> {
        Subscription::batch([
            iced::time::every(Duration::from_millis(16)).map(|_| Message::Tick),
            iced::window::close_requests().map(|_| Message::Exit),
        ])
    }

    fn theme(&self) -> Theme {
        Theme::Dark
    }
}

fn toggle_deadline(current: Option<Instant>, settings: &Settings) -> Option<Instant> {
    match current {
        Some(_) => None,
        None => Some(Instant::now() + settings.listen_duration()),
    }
}

fn expire_deadline(deadline: &mut Option<Instant>) {
    if deadline.is_some_and(|until| Instant::now() >= until) {
        *deadline = None;
    }
}
