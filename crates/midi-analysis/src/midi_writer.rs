use crate::note::NoteEvent;
use crate::smf::{DEFAULT_TEMPO_MICROSECONDS, DEFAULT_TICKS_PER_BEAT};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Options for MIDI export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportOptions {
    /// Division written to the header. Default: 480.
    pub ticks_per_beat: u16,
    /// Tempo used to convert seconds back to ticks. Default: 500000 (120 BPM).
    pub tempo_microseconds: u32,
    /// Emit a leading tempo track with a Set-Tempo event. Default: true.
    pub include_tempo_map: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            ticks_per_beat: DEFAULT_TICKS_PER_BEAT,
            tempo_microseconds: DEFAULT_TEMPO_MICROSECONDS,
            include_tempo_map: true,
        }
    }
}

/// Write notes to Standard MIDI File format 1 bytes.
///
/// Track 0: tempo (when enabled).
/// Tracks 1+: one per distinct `track_index`, in ascending order.
pub fn notes_to_midi(notes: &[NoteEvent], options: &ExportOptions) -> Vec<u8> {
    let mut tracks: Vec<Vec<u8>> = Vec::new();

    if options.include_tempo_map {
        tracks.push(build_tempo_track(options.tempo_microseconds));
    }

    let mut by_track: BTreeMap<usize, Vec<&NoteEvent>> = BTreeMap::new();
    for note in notes {
        by_track.entry(note.track_index).or_default().push(note);
    }

    for track_notes in by_track.values() {
        tracks.push(build_note_track(track_notes, options));
    }

    build_midi_file(options.ticks_per_beat, &tracks)
}

fn build_tempo_track(usec: u32) -> Vec<u8> {
    let mut track_data = Vec::new();
    write_vlq(&mut track_data, 0);
    track_data.extend_from_slice(&[
        0xFF,
        0x51,
        0x03,
        (usec >> 16) as u8,
        (usec >> 8) as u8,
        usec as u8,
    ]);

    // End of track
    write_vlq(&mut track_data, 0);
    track_data.extend_from_slice(&[0xFF, 0x2F, 0x00]);

    track_data
}

fn seconds_to_ticks(seconds: f64, options: &ExportOptions) -> u64 {
    let ticks = seconds * options.ticks_per_beat as f64 * 1_000_000.0
        / options.tempo_microseconds.max(1) as f64;
    ticks.max(0.0).round() as u64
}

fn build_note_track(notes: &[&NoteEvent], options: &ExportOptions) -> Vec<u8> {
    let mut events: Vec<(u64, [u8; 3])> = Vec::with_capacity(notes.len() * 2);

    for note in notes {
        let channel = note.channel & 0x0F;
        events.push((
            seconds_to_ticks(note.start_time, options),
            [0x90 | channel, note.pitch & 0x7F, note.velocity.clamp(1, 127)],
        ));
        events.push((
            seconds_to_ticks(note.end_time, options),
            [0x80 | channel, note.pitch & 0x7F, 0],
        ));
    }

    // Sort by tick, with note-offs before note-ons at the same tick
    events.sort_by(|a, b| {
        a.0.cmp(&b.0).then_with(|| {
            let a_is_off = a.1[0] & 0xF0 == 0x80;
            let b_is_off = b.1[0] & 0xF0 == 0x80;
            b_is_off.cmp(&a_is_off)
        })
    });

    let mut track_data = Vec::new();
    let mut last_tick = 0u64;

    for (tick, data) in events {
        let delta = tick.saturating_sub(last_tick);
        write_vlq(&mut track_data, delta as u32);
        track_data.extend_from_slice(&data);
        last_tick = tick;
    }

    // End of track
    write_vlq(&mut track_data, 0);
    track_data.extend_from_slice(&[0xFF, 0x2F, 0x00]);

    track_data
}

/// Assemble a complete MIDI file from track data blobs.
fn build_midi_file(ppq: u16, tracks: &[Vec<u8>]) -> Vec<u8> {
    let mut buf = Vec::new();

    buf.extend_from_slice(b"MThd");
    buf.extend_from_slice(&6u32.to_be_bytes());
    buf.extend_from_slice(&1u16.to_be_bytes()); // format 1
    buf.extend_from_slice(&(tracks.len() as u16).to_be_bytes());
    buf.extend_from_slice(&ppq.to_be_bytes());

    for track_data in tracks {
        buf.extend_from_slice(b"MTrk");
        buf.extend_from_slice(&(track_data.len() as u32).to_be_bytes());
        buf.extend_from_slice(track_data);
    }

    buf
}

/// Write a variable-length quantity to a byte buffer.
pub fn write_vlq(buf: &mut Vec<u8>, mut value: u32) {
    if value == 0 {
        buf.push(0);
        return;
    }

    let mut bytes = Vec::new();
    bytes.push((value & 0x7F) as u8);
    value >>= 7;

    while value > 0 {
        bytes.push((value & 0x7F) as u8 | 0x80);
        value >>= 7;
    }

    bytes.reverse();
    buf.extend_from_slice(&bytes);
}
