//! # Audio Capture Module
//!
//! This module handles real-time audio capture using CPAL (Cross-Platform Audio Library).
//! Captured audio is regrouped into fixed-size [`Frame`]s of signed 16-bit mono samples
//! and handed to the driver loop through a channel.
//!
//! ## Features
//! - Input device enumeration and selection by name
//! - i16 and f32 device formats, downmixed to mono i16
//! - A lost device ends the source; other stream errors are logged and capture goes on

use anyhow::{Context, Result, anyhow};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample, SupportedStreamConfigRange};
use crossbeam_channel::{Receiver, Sender};
use tracing::{error, info, warn};

use crate::driver::FrameSource;
use crate::error::SourceError;

/// Number of samples per analysis frame.
pub const CHUNK_SIZE: usize = 1024;

/// Capture sample rate in Hz, fixed for the whole process.
pub const SAMPLE_RATE: u32 = 44_100;

/// One fixed-size block of consecutively sampled mono audio.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    samples: Vec<i16>,
}

impl Frame {
    pub fn new(samples: Vec<i16>) -> Self {
        Self { samples }
    }

    /// A frame of digital silence.
    pub fn silent(len: usize) -> Self {
        Self { samples: vec![0; len] }
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Item type carried from the cpal callback thread to the driver loop.
type CapturedFrame = std::result::Result<Frame, SourceError>;

/// Lists the names of all devices that can record audio on the default host.
pub fn list_input_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .context("Failed to enumerate input devices")?;

    Ok(devices.filter_map(|device| device.name().ok()).collect())
}

/// A live capture stream, consumed one [`Frame`] at a time.
///
/// The cpal stream is owned here so that dropping the source stops capture.
/// cpal streams are not `Send` on every platform, so a `CaptureSource` must
/// be opened on the thread that reads from it.
pub struct CaptureSource {
    _stream: cpal::Stream,
    frames: Receiver<CapturedFrame>,
    device_name: String,
}

impl CaptureSource {
    /// Opens the named input device, or the default input device when `None`.
    pub fn open(device_name: Option<&str>) -> Result<Self> {
        let host = cpal::default_host();
        let device = match device_name {
            Some(name) => host
                .input_devices()?
                .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                .ok_or_else(|| anyhow!("Input device not found: {}", name))?,
            None => host
                .default_input_device()
                .ok_or_else(|| anyhow!("No input device available"))?,
        };
        let device_name = device.name()?;

        let configs = device.supported_input_configs()?.collect::<Vec<_>>();
        let supported_config = find_supported_config(configs, SAMPLE_RATE)
            .ok_or_else(|| anyhow!("No {} Hz i16/f32 input format on {}", SAMPLE_RATE, device_name))?;

        let sample_format = supported_config.sample_format();
        let config: cpal::StreamConfig = supported_config
            .with_sample_rate(cpal::SampleRate(SAMPLE_RATE))
            .into();

        info!(
            "Using audio input device: {} ({} channel(s), {:?}, {} Hz)",
            device_name, config.channels, sample_format, config.sample_rate.0
        );

        let (tx, rx) = crossbeam_channel::unbounded();
        let stream = match sample_format {
            cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, tx)?,
            cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, tx)?,
            other => return Err(anyhow!("Unsupported sample format: {:?}", other)),
        };
        stream.play().context("Failed to start audio stream")?;

        Ok(Self {
            _stream: stream,
            frames: rx,
            device_name,
        })
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }
}

impl FrameSource for CaptureSource {
    fn next_frame(&mut self) -> std::result::Result<Frame, SourceError> {
        match self.frames.recv() {
            Ok(captured) => captured,
            Err(_) => Err(SourceError::Disconnected),
        }
    }
}

/// Builds an input stream that downmixes to mono i16 and emits `CHUNK_SIZE` frames.
fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sender: Sender<CapturedFrame>,
) -> Result<cpal::Stream>
where
    T: SizedSample,
    i16: FromSample<T>,
{
    let channels = config.channels.max(1) as usize;
    let error_sender = sender.clone();
    let err_fn = move |err: cpal::StreamError| {
        if let Some(fatal) = fatal_stream_error(&err) {
            error!("Audio stream lost: {}", err);
            let _ = error_sender.send(Err(fatal));
        } else {
            warn!("An error occurred on the audio stream: {}", err);
        }
    };

    // This buffer will accumulate audio data from the callback.
    let mut audio_buffer: Vec<i16> = Vec::with_capacity(CHUNK_SIZE * 2);

    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            // Only the first channel of each interleaved sample group is kept.
            audio_buffer.extend(
                data.chunks(channels)
                    .filter_map(|group| group.first())
                    .map(|&sample| i16::from_sample(sample)),
            );

            while audio_buffer.len() >= CHUNK_SIZE {
                let frame: Vec<i16> = audio_buffer.drain(..CHUNK_SIZE).collect();
                if sender.send(Ok(Frame::new(frame))).is_err() {
                    warn!("Frame receiver dropped, discarding captured audio");
                    audio_buffer.clear();
                    return;
                }
            }
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}

/// Maps a cpal stream error to the source error that ends capture.
///
/// Backends keep streaming after reporting xruns and poll failures, so
/// only a vanished device is fatal.
fn fatal_stream_error(err: &cpal::StreamError) -> Option<SourceError> {
    matches!(err, cpal::StreamError::DeviceNotAvailable).then_some(SourceError::Disconnected)
}

/// Finds the best supported input configuration for the target sample rate.
///
/// Candidates must cover `target_rate` and deliver i16 or f32 samples.
/// Mono configurations win over multi-channel ones, then i16 wins over f32
/// so the original sample values reach the analyzer untouched.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| {
            matches!(c.sample_format(), cpal::SampleFormat::I16 | cpal::SampleFormat::F32)
                && c.min_sample_rate().0 <= target_rate
                && c.max_sample_rate().0 >= target_rate
        })
        .min_by_key(|c| {
            let format_rank = if c.sample_format() == cpal::SampleFormat::I16 { 0 } else { 1 };
            (c.channels(), format_rank)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_accessors() {
        let frame = Frame::new(vec![1, -2, 3]);
        assert_eq!(frame.len(), 3);
        assert_eq!(frame.samples(), &[1, -2, 3]);
        assert!(!frame.is_empty());
        assert!(Frame::silent(CHUNK_SIZE).samples().iter().all(|&s| s == 0));
    }

    #[test]
    fn only_a_lost_device_ends_capture() {
        assert_eq!(
            fatal_stream_error(&cpal::StreamError::DeviceNotAvailable),
            Some(SourceError::Disconnected)
        );

        let xrun = cpal::StreamError::BackendSpecific {
            err: cpal::BackendSpecificError {
                description: "buffer overrun".to_string(),
            },
        };
        assert_eq!(fatal_stream_error(&xrun), None);
    }

    #[test]
    fn frames_last_about_23_milliseconds() {
        let seconds = CHUNK_SIZE as f64 / SAMPLE_RATE as f64;
        assert!((seconds - 0.0232).abs() < 1e-3);
    }
}
