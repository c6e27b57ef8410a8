//! # Spectrum Widget
//!
//! Draws the spectral peaks of the last processed frame as vertical bars
//! on a logarithmic frequency axis, together with the calibration bounds
//! as horizontal lines. Magnitudes use a logarithmic scale as well, since
//! raw FFT magnitudes span several orders of magnitude.

use iced::widget::canvas::{self, Geometry, Path, Stroke};
use iced::widget::container;
use iced::{Color, Element, Point, Rectangle, Renderer, Size, Theme, mouse};
use midiphone_core::spectral::SpectralPeak;
use midiphone_core::tuning::{MIDI_NOTE_MAX, MIDI_NOTE_MIN, frequency_for_note};

const BAR_WIDTH: f32 = 3.0;

pub struct Spectrum {
    peaks: Vec<SpectralPeak>,
    minimum_magnitude: f32,
    maximum_magnitude: f32,
}

impl Spectrum {
    pub fn new(peaks: Vec<SpectralPeak>, minimum_magnitude: f32, maximum_magnitude: f32) -> Self {
        Self {
            peaks,
            minimum_magnitude,
            maximum_magnitude,
        }
    }

    pub fn view(self) -> Element<'static, crate::Message> {
        container(
            canvas::Canvas::new(self)
                .width(iced::Length::Fill)
                .height(iced::Length::Fill),
        )
        .into()
    }

    /// Top of the magnitude axis: the loudest peak or the maximum bound.
    fn magnitude_scale(&self) -> f32 {
        self.peaks
            .iter()
            .map(|peak| peak.magnitude)
            .filter(|magnitude| magnitude.is_finite())
            .fold(self.maximum_magnitude.max(1.0), f32::max)
    }
}

/// Position of `magnitude` on a log axis, 0.0 at the bottom and 1.0 at `scale`.
fn magnitude_fraction(magnitude: f32, scale: f32) -> f32 {
    ((1.0 + magnitude.max(0.0)).ln() / (1.0 + scale).ln()).clamp(0.0, 1.0)
}

/// Position of `frequency` across the piano range, on a log axis.
fn frequency_fraction(frequency: f32) -> f32 {
    let low = frequency_for_note(MIDI_NOTE_MIN as i32).ln();
    let high = frequency_for_note(MIDI_NOTE_MAX as i32).ln();
    (frequency.max(1.0).ln() - low) / (high - low)
}

impl<Message> canvas::Program<Message> for Spectrum {
    type State = ();

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<Geometry> {
        let mut frame = canvas::Frame::new(renderer, bounds.size());

        if !bounds.width.is_finite() || !bounds.height.is_finite() {
            return vec![frame.into_geometry()];
        }

        let scale = self.magnitude_scale();

        for peak in &self.peaks {
            let x = frequency_fraction(peak.frequency) * bounds.width;
            if !(0.0..=bounds.width).contains(&x) {
                continue;
            }
            let height = magnitude_fraction(peak.magnitude, scale) * bounds.height;
            if height.is_finite() && height > 0.0 {
                let in_range = peak.magnitude >= self.minimum_magnitude;
                let color = if in_range {
                    Color::from_rgb8(0x34, 0x98, 0xDB)
                } else {
                    Color::from_rgb8(0x55, 0x5B, 0x66)
                };
                frame.fill_rectangle(
                    Point::new(x - BAR_WIDTH / 2.0, bounds.height - height),
                    Size::new(BAR_WIDTH, height),
                    color,
                );
            }
        }

        for (bound, color) in [
            (self.minimum_magnitude, Color::from_rgb8(0x34, 0xDB, 0x98)),
            (self.maximum_magnitude, Color::from_rgb8(0xFF, 0x33, 0x33)),
        ] {
            let y = bounds.height - magnitude_fraction(bound, scale) * bounds.height;
            frame.stroke(
                &Path::line(Point::new(0.0, y), Point::new(bounds.width, y)),
                Stroke::default().with_color(color).with_width(1.0),
            );
        }

        vec![frame.into_geometry()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn piano_range_spans_the_frequency_axis() {
        assert!(frequency_fraction(27.5).abs() < 1e-4);
        assert!((frequency_fraction(4186.01) - 1.0).abs() < 1e-4);
        assert!(frequency_fraction(440.0) > 0.5);
    }

    #[test]
    fn magnitudes_are_clamped_to_the_axis() {
        assert_eq!(magnitude_fraction(0.0, 1000.0), 0.0);
        assert_eq!(magnitude_fraction(-5.0, 1000.0), 0.0);
        assert_eq!(magnitude_fraction(5000.0, 1000.0), 1.0);
        assert!((magnitude_fraction(1000.0, 1000.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn scale_covers_loud_peaks_and_the_maximum_bound() {
        let peaks = vec![SpectralPeak {
            frequency: 440.0,
            magnitude: 5e6,
        }];
        assert_eq!(Spectrum::new(peaks, 0.0, 1e6).magnitude_scale(), 5e6);
        assert_eq!(Spectrum::new(Vec::new(), 0.0, 1e6).magnitude_scale(), 1e6);
        assert_eq!(Spectrum::new(Vec::new(), 0.0, 0.0).magnitude_scale(), 1.0);
    }
}
