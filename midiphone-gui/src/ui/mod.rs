//! # UI Module
//!
//! Layout and panels for the MIDIPhone control surface.

pub mod main_display;
