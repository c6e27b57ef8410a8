//! # Piano Keyboard Widget
//!
//! An 88-key keyboard (MIDI 21 to 108) that lights up the notes the
//! engine currently holds on. Display only.

use iced::widget::canvas::{self, Fill, Geometry, Path, Stroke};
use iced::widget::container;
use iced::{Color, Element, Point, Rectangle, Renderer, Size, Theme, mouse};
use midiphone_core::tuning::{MIDI_NOTE_MAX, MIDI_NOTE_MIN, MidiNote};

/// Number of white keys on an 88-key piano.
const WHITE_KEY_COUNT: usize = 52;

/// Which pitch classes are black keys, starting from C.
const IS_BLACK: [bool; 12] = [
    false, true, false, true, false, false, true, false, true, false, true, false,
];

const ACTIVE_COLOR: Color = Color::from_rgb(0.204, 0.859, 0.596);

fn is_black(note: u8) -> bool {
    IS_BLACK[(note % 12) as usize]
}

#[derive(Debug, Clone)]
pub struct PianoKeyboard {
    active_notes: Vec<MidiNote>,
}

impl PianoKeyboard {
    pub fn new(active_notes: Vec<MidiNote>) -> Self {
        Self { active_notes }
    }

    pub fn view(self) -> Element<'static, crate::Message> {
        container(
            canvas::Canvas::new(self)
                .width(iced::Length::Fill)
                .height(iced::Length::Fixed(120.0)),
        )
        .into()
    }

    fn is_active(&self, note: u8) -> bool {
        self.active_notes.iter().any(|active| active.value() == note)
    }
}

impl<Message> canvas::Program<Message> for PianoKeyboard {
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

        let white_key_width = bounds.width / WHITE_KEY_COUNT as f32;
        let black_key_width = white_key_width * 0.6;
        let black_key_height = bounds.height * 0.6;

        // White keys first, black keys are drawn on top.
        let mut white_key_x = 0.0;
        for note in (MIDI_NOTE_MIN..=MIDI_NOTE_MAX).filter(|&note| !is_black(note)) {
            let color = if self.is_active(note) {
                ACTIVE_COLOR
            } else {
                Color::WHITE
            };
            let origin = Point::new(white_key_x, 0.0);
            let size = Size::new(white_key_width, bounds.height);
            frame.fill_rectangle(origin, size, Fill::from(color));
            frame.stroke(
                &Path::rectangle(origin, size),
                Stroke::default().with_color(Color::BLACK),
            );
            white_key_x += white_key_width;
        }

        let mut white_keys_passed: f32 = 0.0;
        for note in MIDI_NOTE_MIN..=MIDI_NOTE_MAX {
            if !is_black(note) {
                white_keys_passed += 1.0;
                continue;
            }
            let color = if self.is_active(note) {
                ACTIVE_COLOR
            } else {
                Color::BLACK
            };
            frame.fill_rectangle(
                Point::new(white_keys_passed * white_key_width - black_key_width / 2.0, 0.0),
                Size::new(black_key_width, black_key_height),
                Fill::from(color),
            );
        }

        vec![frame.into_geometry()]
    }
}
