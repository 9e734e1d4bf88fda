//! Standard MIDI File decoding and note extraction.
//!
//! [`smf::parse`] turns a byte buffer into timed raw events, recovering from
//! corrupt bytes instead of failing. [`analyze::extract_notes`] pairs note-on
//! and note-off events into [`NoteEvent`]s with absolute times in seconds.

pub mod analyze;
pub mod midi_writer;
pub mod note;
pub mod smf;

pub use analyze::{analyze, extract_notes, profile_tracks, MidiAnalysis, MidiFileContext, TrackProfile};
pub use midi_writer::{notes_to_midi, ExportOptions};
pub use note::{midi_to_note_name, pitch_class_name, NoteEvent};
pub use smf::{parse, DecodeFault, EventKind, FaultKind, ParsedSmf, RawEvent};

/// Errors from MIDI analysis operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("not a Standard MIDI File: expected MThd header, found {found:02x?}")]
    MissingHeader { found: Vec<u8> },
}

pub type Result<T> = std::result::Result<T, Error>;
