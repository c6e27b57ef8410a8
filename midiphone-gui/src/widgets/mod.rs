//! Canvas widgets drawn from engine display data.

pub mod piano_keyboard;
pub mod spectrum;
