//! # Main Display Module
//!
//! This module contains the main layout of the MIDIPhone window: the
//! spectrum and keyboard panels on the left and the control sidebar on
//! the right.

use iced::widget::{
    button, checkbox, column, container, horizontal_space, pick_list, row, slider, text, Space,
};
use iced::{Alignment, Color, Element, Length};
use midiphone_core::settings::MAX_MAGNITUDE;
use midiphone_core::velocity::MAX_VELOCITY;

use crate::widgets::{piano_keyboard, spectrum};
use crate::{AppDisplayData, Message};

/// Creates the complete main application view
pub fn create_main_view(data: &AppDisplayData) -> Element<'static, Message> {
    let title = text("MIDIPhone").size(28);

    let main_content = row![
        column![
            title,
            Space::with_height(20),
            create_spectrum_panel(data),
            Space::with_height(10),
            create_keyboard_panel(data),
        ]
        .width(Length::Fill)
        .spacing(10),
        Space::with_width(10),
        create_sidebar(data),
    ]
    .align_y(Alignment::Start)
    .padding(20);

    container(main_content)
        .width(Length::Fill)
        .height(Length::Fill)
        .into()
}

fn create_spectrum_panel(data: &AppDisplayData) -> Element<'static, Message> {
    let spectrum = spectrum::Spectrum::new(
        data.peaks.clone(),
        data.settings.minimum_magnitude,
        data.settings.maximum_magnitude,
    );

    container(
        column![
            text("Spectral peaks").size(18),
            Space::with_height(10),
            container(spectrum.view())
                .width(Length::Fill)
                .height(Length::Fill),
        ]
        .spacing(5)
        .padding(15),
    )
    .width(Length::Fill)
    .height(Length::Fixed(300.0))
    .into()
}

fn create_keyboard_panel(data: &AppDisplayData) -> Element<'static, Message> {
    let keyboard = piano_keyboard::PianoKeyboard::new(data.active_notes.clone());

    container(
        column![
            text("Sounding notes").size(18),
            Space::with_height(10),
            keyboard.view(),
        ]
        .spacing(5)
        .padding(15),
    )
    .width(Length::Fill)
    .height(Length::Fixed(200.0))
    .into()
}

/// Creates the control sidebar.
///
/// Listen buttons and live parameter changes only act on a running audio
/// thread, so the listen buttons are inactive while nothing is captured.
fn create_sidebar(data: &AppDisplayData) -> Element<'static, Message> {
    let settings = &data.settings;

    let audio_section = section(
        "Audio input",
        column![
            pick_list(
                data.input_devices.clone(),
                settings.input_device.clone(),
                Message::DeviceSelected,
            )
            .placeholder("Select an input device")
            .width(Length::Fill),
            row![
                sidebar_button("Refresh devices", Some(Message::RefreshDevices)),
                sidebar_button("Start/Restart", Some(Message::StartRestart)),
            ]
            .spacing(8),
            text(data.status.clone()).size(14),
        ]
        .spacing(8),
    );

    let calibration_section = section(
        "Calibration",
        column![
            magnitude_control(
                "Minimum magnitude",
                "Listen for Minimum Magnitude",
                settings.minimum_magnitude,
                Message::MinimumMagnitudeChanged,
                data.listen_minimum_until.is_some(),
                data.audio_worker_active.then_some(Message::ToggleListenMinimum),
            ),
            magnitude_control(
                "Maximum magnitude",
                "Listen for Maximum Magnitude",
                settings.maximum_magnitude,
                Message::MaximumMagnitudeChanged,
                data.listen_maximum_until.is_some(),
                data.audio_worker_active.then_some(Message::ToggleListenMaximum),
            ),
        ]
        .spacing(12),
    );

    let velocity_section = section(
        "Velocity",
        column![
            checkbox("Keyboard Has Velocity", settings.keyboard_has_velocity)
                .on_toggle(Message::KeyboardHasVelocityToggled),
            row![
                text("Velocity Threshold").size(14),
                horizontal_space(),
                text(settings.velocity_threshold.to_string()).size(14),
            ],
            slider(
                0..=MAX_VELOCITY,
                settings.velocity_threshold,
                Message::VelocityThresholdChanged,
            ),
        ]
        .spacing(8),
    );

    let settings_section = section(
        "Program",
        column![
            sidebar_button("Save Settings", Some(Message::SaveSettings)),
            sidebar_button("Load Settings", Some(Message::LoadSettings)),
        ]
        .spacing(8),
    );

    container(
        column![
            audio_section,
            calibration_section,
            velocity_section,
            settings_section,
        ]
        .spacing(20)
        .padding(15),
    )
    .width(Length::Fixed(300.0))
    .height(Length::Fill)
    .into()
}

/// Slider plus listen button for one calibration bound.
fn magnitude_control(
    label: &'static str,
    listen_label: &'static str,
    value: f32,
    on_change: fn(f32) -> Message,
    listening: bool,
    on_listen: Option<Message>,
) -> Element<'static, Message> {
    let listen_label = if listening { "Stop listening" } else { listen_label };
    let mut listen = button(text(listen_label).size(14).width(Length::Fill)).padding([6, 10]);
    if listening {
        listen = listen.style(|_theme, _status| button::Style {
            background: Some(iced::Background::Color(Color::from_rgb(0.8, 0.2, 0.2))),
            text_color: Color::WHITE,
            ..button::Style::default()
        });
    }

    column![
        row![
            text(label).size(14),
            horizontal_space(),
            text(format!("{:.0}", value)).size(14),
        ],
        slider(0.0..=MAX_MAGNITUDE, value, on_change).step(1.0),
        listen.on_press_maybe(on_listen),
    ]
    .spacing(6)
    .into()
}

fn sidebar_button(label: &'static str, message: Option<Message>) -> Element<'static, Message> {
    button(text(label).size(14).width(Length::Fill))
        .padding([6, 10])
        .on_press_maybe(message)
        .into()
}

/// Creates a sidebar section with a title above its controls.
fn section<'a>(
    title: &'static str,
    content: impl Into<Element<'a, Message>>,
) -> Element<'a, Message> {
    column![text(title).size(18), Space::with_height(10), content.into()]
        .spacing(5)
        .into()
}
