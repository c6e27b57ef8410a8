//! # Note State Module
//!
//! Tracks which notes are sounding and turns each frame's detected set into
//! note-on / note-off transitions. A note stays on for as long as it keeps
//! being detected; re-detection never re-triggers it.

use std::collections::BTreeSet;

use crate::tuning::MidiNote;

/// Transitions produced by one [`NoteStateTracker::step`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteTransitions {
    pub note_ons: BTreeSet<MidiNote>,
    pub note_offs: BTreeSet<MidiNote>,
}

impl NoteTransitions {
    pub fn is_empty(&self) -> bool {
        self.note_ons.is_empty() && self.note_offs.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct NoteStateTracker {
    active: BTreeSet<MidiNote>,
}

impl NoteStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Diffs `seen` against the notes active after the previous frame.
    /// Afterwards the active set equals `seen`.
    pub fn step(&mut self, seen: &BTreeSet<MidiNote>) -> NoteTransitions {
        let note_ons = seen.difference(&self.active).copied().collect();
        let note_offs = self.active.difference(seen).copied().collect();
        self.active.clone_from(seen);

        NoteTransitions {
            note_ons,
            note_offs,
        }
    }

    /// Releases every active note, returning them in ascending order.
    pub fn drain(&mut self) -> Vec<MidiNote> {
        std::mem::take(&mut self.active).into_iter().collect()
    }

    /// Drops a note without producing a note-off, used when its note-on
    /// never reached the MIDI output.
    pub fn forget(&mut self, note: MidiNote) -> bool {
        self.active.remove(&note)
    }

    pub fn is_active(&self, note: MidiNote) -> bool {
        self.active.contains(&note)
    }

    pub fn active(&self) -> &BTreeSet<MidiNote> {
        &self.active
    }
}
