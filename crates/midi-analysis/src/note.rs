use serde::{Deserialize, Serialize};

const NOTE_NAMES_SHARP: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Pitch-class name with sharps (`1` → `"C#"`).
pub fn pitch_class_name(pitch_class: u8) -> &'static str {
    NOTE_NAMES_SHARP[(pitch_class % 12) as usize]
}

/// Scientific pitch name for a MIDI note number (`60` → `"C4"`).
pub fn midi_to_note_name(pitch: u8) -> String {
    let octave = i16::from(pitch) / 12 - 1;
    format!("{}{}", pitch_class_name(pitch % 12), octave)
}

/// A resolved note with absolute timing in seconds.
///
/// Built once by the reducer when a note-on/note-off pair resolves and never
/// modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    pub pitch: u8,
    pub pitch_class: u8,
    pub note_name: String,
    pub start_time: f64,
    pub end_time: f64,
    pub velocity: u8,
    pub channel: u8,
    pub track_index: usize,
}

impl NoteEvent {
    /// `end_time` is clamped so it never precedes `start_time`.
    pub fn new(
        pitch: u8,
        start_time: f64,
        end_time: f64,
        velocity: u8,
        channel: u8,
        track_index: usize,
    ) -> Self {
        let pitch = pitch.min(127);
        Self {
            pitch,
            pitch_class: pitch % 12,
            note_name: midi_to_note_name(pitch),
            start_time,
            end_time: end_time.max(start_time),
            velocity: velocity.min(127),
            channel,
            track_index,
        }
    }

    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}
