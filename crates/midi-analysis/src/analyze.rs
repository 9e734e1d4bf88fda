use crate::note::NoteEvent;
use crate::smf::{self, EventKind, ParsedSmf};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Seconds added past a track's last event when closing notes that never
/// received a note-off.
pub const FORCE_CLOSE_SECONDS: f64 = 1.0;

/// Parsed MIDI file context: timing, format, and decode health.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MidiFileContext {
    pub ppq: u16,
    pub format: u16,
    pub declared_tracks: u16,
    pub track_count: usize,
    /// The single time base for the file (first Set-Tempo, or 120 BPM).
    pub tempo_microseconds: u32,
    pub bpm: f64,
    pub tempo_from_file: bool,
    /// Set-Tempo events after the first, which do not affect timing.
    pub ignored_tempo_changes: usize,
    pub decode_faults: usize,
    pub total_ticks: u64,
}

/// Per-track decode health: how many notes the track yielded and how many
/// events were skipped or faulted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackProfile {
    pub track_index: usize,
    pub note_count: usize,
    pub skipped_events: usize,
    pub decode_faults: usize,
}

/// Notes decoded from a MIDI file, with file and per-track context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MidiAnalysis {
    pub context: MidiFileContext,
    pub notes: Vec<NoteEvent>,
    pub tracks: Vec<TrackProfile>,
}

/// A note-on waiting for its note-off.
#[derive(Debug, Clone, Copy)]
struct PendingNote {
    start_tick: u64,
    velocity: u8,
    channel: u8,
}

/// Pair note-on/note-off events into notes, track by track.
///
/// A repeated note-on on a sounding pitch closes the earlier note at the new
/// onset. Notes still open when a track ends are closed
/// [`FORCE_CLOSE_SECONDS`] after the track's last event. The result is sorted
/// by `(start_time, pitch)`.
pub fn extract_notes(parsed: &ParsedSmf) -> (Vec<NoteEvent>, MidiFileContext) {
    let mut notes = Vec::new();
    let mut total_ticks = 0u64;

    for track in &parsed.tracks {
        let mut pending: BTreeMap<u8, PendingNote> = BTreeMap::new();

        for event in parsed.track_events(track.index) {
            match event.kind {
                EventKind::NoteOn {
                    channel,
                    pitch,
                    velocity,
                } if velocity > 0 => {
                    let next = PendingNote {
                        start_tick: event.tick,
                        velocity,
                        channel,
                    };
                    if let Some(stuck) = pending.insert(pitch, next) {
                        debug!(track = track.index, pitch, "overlapping note-on, closing earlier note");
                        let end_time = parsed.ticks_to_seconds(event.tick);
                        notes.push(resolve(parsed, pitch, stuck, end_time, track.index));
                    }
                }
                EventKind::NoteOn { pitch, .. } | EventKind::NoteOff { pitch, .. } => {
                    if let Some(open) = pending.remove(&pitch) {
                        let end_time = parsed.ticks_to_seconds(event.tick);
                        notes.push(resolve(parsed, pitch, open, end_time, track.index));
                    }
                }
                EventKind::SetTempo { .. } => {}
            }
        }

        if !pending.is_empty() {
            let close_at = parsed.ticks_to_seconds(track.end_tick) + FORCE_CLOSE_SECONDS;
            debug!(
                track = track.index,
                count = pending.len(),
                close_at,
                "force-closing unterminated notes"
            );
            for (pitch, open) in std::mem::take(&mut pending) {
                notes.push(resolve(parsed, pitch, open, close_at, track.index));
            }
        }

        total_ticks = total_ticks.max(track.end_tick);
    }

    notes.sort_by(|a, b| {
        a.start_time
            .total_cmp(&b.start_time)
            .then(a.pitch.cmp(&b.pitch))
    });

    let tempo_microseconds = parsed.tempo_microseconds();
    let context = MidiFileContext {
        ppq: parsed.header.ticks_per_beat,
        format: parsed.header.format,
        declared_tracks: parsed.header.declared_tracks,
        track_count: parsed.tracks.len(),
        tempo_microseconds,
        bpm: 60_000_000.0 / tempo_microseconds as f64,
        tempo_from_file: parsed.first_tempo.is_some(),
        ignored_tempo_changes: parsed.ignored_tempo_changes,
        decode_faults: parsed.faults.len(),
        total_ticks,
    };

    (notes, context)
}

fn resolve(
    parsed: &ParsedSmf,
    pitch: u8,
    open: PendingNote,
    end_time: f64,
    track_index: usize,
) -> NoteEvent {
    NoteEvent::new(
        pitch,
        parsed.ticks_to_seconds(open.start_tick),
        end_time,
        open.velocity,
        open.channel,
        track_index,
    )
}

/// Count notes per decoded track alongside the scanner's skip and fault tallies.
pub fn profile_tracks(parsed: &ParsedSmf, notes: &[NoteEvent]) -> Vec<TrackProfile> {
    let mut note_counts = vec![0usize; parsed.tracks.len()];
    for note in notes {
        if let Some(count) = note_counts.get_mut(note.track_index) {
            *count += 1;
        }
    }

    parsed
        .tracks
        .iter()
        .map(|track| TrackProfile {
            track_index: track.index,
            note_count: note_counts.get(track.index).copied().unwrap_or(0),
            skipped_events: track.skipped_events,
            decode_faults: track.faults,
        })
        .collect()
}

/// Parse, pair notes and profile each track.
pub fn analyze(midi_bytes: &[u8]) -> crate::Result<MidiAnalysis> {
    let parsed = smf::parse(midi_bytes)?;
    let (notes, context) = extract_notes(&parsed);
    let tracks = profile_tracks(&parsed, &notes);

    Ok(MidiAnalysis {
        context,
        notes,
        tracks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn smf(ppq: u16, tracks: &[Vec<u8>]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"MThd");
        buf.extend_from_slice(&6u32.to_be_bytes());
        buf.extend_from_slice(&1u16.to_be_bytes());
        buf.extend_from_slice(&(tracks.len() as u16).to_be_bytes());
        buf.extend_from_slice(&ppq.to_be_bytes());
        for track in tracks {
            buf.extend_from_slice(b"MTrk");
            buf.extend_from_slice(&(track.len() as u32).to_be_bytes());
            buf.extend_from_slice(track);
        }
        buf
    }

    fn tempo_track() -> Vec<u8> {
        vec![
            0x00, 0xFF, 0x51, 0x03, 0x07, 0xA1, 0x20, // 120 BPM
            0x00, 0xFF, 0x58, 0x04, 0x04, 0x02, 0x18, 0x08, // 4/4
            0x00, 0xFF, 0x2F, 0x00,
        ]
    }

    fn melody_track() -> Vec<u8> {
        vec![
            0x00, 0x90, 60, 100, //
            0x83, 0x60, 0x80, 60, 0, //
            0x00, 0x90, 64, 90, //
            0x83, 0x60, 0x80, 64, 0, //
            0x00, 0x90, 67, 80, //
            0x83, 0x60, 0x80, 67, 0, //
            0x00, 0xFF, 0x2F, 0x00,
        ]
    }

    #[test]
    fn extract_notes_from_format1() {
        let parsed = smf::parse(&smf(480, &[tempo_track(), melody_track()])).unwrap();
        let (notes, context) = extract_notes(&parsed);

        assert_eq!(context.ppq, 480);
        assert_eq!(context.format, 1);
        assert_eq!(context.track_count, 2);
        assert!(context.tempo_from_file);
        assert!((context.bpm - 120.0).abs() < 1e-9);
        assert_eq!(notes.len(), 3);
        assert!(notes.iter().all(|n| n.track_index == 1));

        let pitches: Vec<u8> = notes.iter().map(|n| n.pitch).collect();
        assert_eq!(pitches, vec![60, 64, 67]);
        assert!((notes[1].start_time - 0.5).abs() < 1e-12);
        assert!((notes[1].end_time - 1.0).abs() < 1e-12);
        assert_eq!(notes[1].velocity, 90);
    }

    #[test]
    fn note_count_matches_sounding_note_ons() {
        let parsed = smf::parse(&smf(480, &[melody_track()])).unwrap();
        let note_ons = parsed
            .events
            .iter()
            .filter(|e| matches!(e.kind, EventKind::NoteOn { velocity, .. } if velocity > 0))
            .count();
        let (notes, _) = extract_notes(&parsed);
        assert_eq!(notes.len(), note_ons);
    }

    #[test]
    fn velocity_zero_note_on_closes_note() {
        let track = vec![0x00, 0x90, 62, 70, 0x60, 62, 0, 0x00, 0xFF, 0x2F, 0x00];
        let parsed = smf::parse(&smf(96, &[track])).unwrap();
        let (notes, context) = extract_notes(&parsed);

        assert!(!context.tempo_from_file);
        assert_eq!(notes.len(), 1);
        assert!((notes[0].end_time - 0.5).abs() < 1e-12);
    }

    #[test]
    fn overlapping_note_on_closes_previous_at_new_start() {
        let track = vec![
            0x00, 0x90, 60, 100, //
            0x60, 0x90, 60, 50, // restrike before any note-off
            0x60, 0x80, 60, 0, //
            0x00, 0xFF, 0x2F, 0x00,
        ];
        let parsed = smf::parse(&smf(96, &[track])).unwrap();
        let (notes, _) = extract_notes(&parsed);

        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].start_time, 0.0);
        assert!((notes[0].end_time - 0.5).abs() < 1e-12);
        assert_eq!(notes[0].velocity, 100);
        assert!((notes[1].start_time - 0.5).abs() < 1e-12);
        assert!((notes[1].end_time - 1.0).abs() < 1e-12);
        assert_eq!(notes[1].velocity, 50);
    }

    #[test]
    fn unterminated_notes_close_one_second_after_track_end() {
        let track = vec![
            0x00, 0x90, 60, 100, //
            0x00, 0x90, 64, 100, //
            0x60, 0x80, 64, 0, //
            0x00, 0xFF, 0x2F, 0x00,
        ];
        let parsed = smf::parse(&smf(96, &[track])).unwrap();
        let (notes, _) = extract_notes(&parsed);

        assert_eq!(notes.len(), 2);
        let held = notes.iter().find(|n| n.pitch == 60).unwrap();
        assert!((held.end_time - 1.5).abs() < 1e-12);
    }

    #[test]
    fn note_off_without_note_on_is_ignored() {
        let track = vec![0x00, 0x80, 60, 0, 0x00, 0xFF, 0x2F, 0x00];
        let parsed = smf::parse(&smf(96, &[track])).unwrap();
        let (notes, _) = extract_notes(&parsed);
        assert!(notes.is_empty());
    }

    #[test]
    fn pending_state_does_not_leak_across_tracks() {
        let first = vec![0x00, 0x90, 60, 100, 0x00, 0xFF, 0x2F, 0x00];
        let second = vec![0x60, 0x80, 60, 0, 0x00, 0xFF, 0x2F, 0x00];
        let parsed = smf::parse(&smf(96, &[first, second])).unwrap();
        let (notes, _) = extract_notes(&parsed);

        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].track_index, 0);
        assert!((notes[0].end_time - 1.0).abs() < 1e-12);
    }

    #[test]
    fn notes_sorted_by_start_then_pitch() {
        let track = vec![
            0x00, 0x90, 67, 100, //
            0x00, 0x90, 60, 100, //
            0x00, 0x90, 64, 100, //
            0x60, 0x80, 60, 0, //
            0x00, 0x80, 64, 0, //
            0x00, 0x80, 67, 0, //
        ];
        let parsed = smf::parse(&smf(96, &[track])).unwrap();
        let (notes, _) = extract_notes(&parsed);
        let pitches: Vec<u8> = notes.iter().map(|n| n.pitch).collect();
        assert_eq!(pitches, vec![60, 64, 67]);
    }

    #[test]
    fn analyze_profiles_each_track() {
        let analysis = analyze(&smf(480, &[tempo_track(), melody_track()])).unwrap();

        assert_eq!(analysis.tracks.len(), 2);
        assert_eq!(analysis.tracks[0].note_count, 0);
        assert_eq!(analysis.tracks[1].note_count, 3);
        assert!(analysis.tracks.iter().all(|t| t.decode_faults == 0));
    }

    #[test]
    fn profile_counts_faults_on_the_damaged_track() {
        let damaged = vec![
            0x00, 0x90, 60, 100, //
            0x60, 0x80, 60, 0, //
            0x00, 0xF4, // undefined status byte
            0x00, 0x90, 64, 100, //
            0x60, 0x80, 64, 0, //
            0x00, 0xFF, 0x2F, 0x00,
        ];
        let analysis = analyze(&smf(96, &[melody_track(), damaged])).unwrap();

        assert_eq!(analysis.tracks[0].decode_faults, 0);
        assert!(analysis.tracks[1].decode_faults > 0);
        assert_eq!(analysis.tracks[1].note_count, 2);
        assert_eq!(analysis.context.decode_faults, analysis.tracks[1].decode_faults);
    }

    #[test]
    fn analyze_rejects_non_midi() {
        assert!(analyze(b"not a midi file").is_err());
    }
}
