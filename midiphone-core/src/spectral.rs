//! # Spectral Analysis Module
//!
//! Turns one [`Frame`] into the local maxima of its magnitude spectrum.
//!
//! The frame is transformed as-is: no window and no DC removal, so peak
//! magnitudes are raw FFT units (a full-scale sine at an exact bin reaches
//! roughly `32767 * N / 2`). Calibration bounds are learned in the same units.

use std::sync::Arc;

use rustfft::{Fft, FftPlanner, num_complex::Complex};

use crate::audio::{CHUNK_SIZE, Frame, SAMPLE_RATE};
use crate::error::AnalysisError;

/// A local maximum of the magnitude spectrum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectralPeak {
    /// Bin frequency in Hz.
    pub frequency: f32,
    /// Magnitude in raw FFT units.
    pub magnitude: f32,
}

/// Computes spectral peaks for frames of one fixed length.
///
/// The FFT plan and working buffers are allocated once, so per-frame cost
/// is the transform itself plus a linear peak scan.
pub struct SpectralAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    frame_length: usize,
    sample_rate: u32,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    magnitudes: Vec<f32>,
}

impl SpectralAnalyzer {
    /// `frame_length` should be even; only the first `frame_length / 2` bins are scanned.
    pub fn new(frame_length: usize, sample_rate: u32) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(frame_length);
        let scratch = vec![Complex::default(); fft.get_inplace_scratch_len()];

        Self {
            fft,
            frame_length,
            sample_rate,
            buffer: vec![Complex::default(); frame_length],
            scratch,
            magnitudes: Vec::with_capacity(frame_length / 2),
        }
    }

    pub fn frame_length(&self) -> usize {
        self.frame_length
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Frequency in Hz of FFT bin `index`.
    pub fn bin_frequency(&self, index: usize) -> f32 {
        index as f32 * self.sample_rate as f32 / self.frame_length as f32
    }

    /// Returns the peaks of the positive-frequency half of the spectrum,
    /// in ascending frequency order.
    pub fn analyze(&mut self, frame: &Frame) -> Result<Vec<SpectralPeak>, AnalysisError> {
        self.compute_magnitudes(frame)?;

        let peaks = find_peaks(&self.magnitudes)
            .map(|index| SpectralPeak {
                frequency: self.bin_frequency(index),
                magnitude: self.magnitudes[index],
            })
            .collect();

        Ok(peaks)
    }

    fn compute_magnitudes(&mut self, frame: &Frame) -> Result<(), AnalysisError> {
        if frame.len() != self.frame_length {
            return Err(AnalysisError::FrameLength {
                expected: self.frame_length,
                actual: frame.len(),
            });
        }

        for (slot, &sample) in self.buffer.iter_mut().zip(frame.samples()) {
            *slot = Complex {
                re: sample as f32,
                im: 0.0,
            };
        }
        self.fft
            .process_with_scratch(&mut self.buffer, &mut self.scratch);

        self.magnitudes.clear();
        self.magnitudes.extend(
            self.buffer
                .iter()
                .take(self.frame_length / 2)
                .map(|c| c.norm()), // .norm() is sqrt(re^2 + im^2)
        );
        Ok(())
    }
}

impl Default for SpectralAnalyzer {
    fn default() -> Self {
        Self::new(CHUNK_SIZE, SAMPLE_RATE)
    }
}

/// Indices of samples strictly greater than both neighbours.
/// The first and last samples are never peaks.
pub fn find_peaks(values: &[f32]) -> impl Iterator<Item = usize> + '_ {
    values
        .windows(3)
        .enumerate()
        .filter(|(_, w)| w[1] > w[0] && w[1] > w[2])
        .map(|(i, _)| i + 1)
}
