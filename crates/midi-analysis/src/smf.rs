//! Tolerant Standard MIDI File decoder.
//!
//! Walks the chunk structure byte by byte. The only fatal condition is a
//! missing `MThd` magic; anything that goes wrong inside a track is recorded
//! as a [`DecodeFault`], the cursor advances one byte, and decoding resumes.
//! Every loop iteration consumes at least one byte, so decoding terminates in
//! O(input) steps on any input.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{Error, Result};

/// 120 BPM, used when a file carries no Set-Tempo event.
pub const DEFAULT_TEMPO_MICROSECONDS: u32 = 500_000;

/// Division used when the header is truncated, zero, or SMPTE-based.
pub const DEFAULT_TICKS_PER_BEAT: u16 = 480;

/// A VLQ longer than this is treated as garbage.
const MAX_VLQ_BYTES: usize = 4;

/// The events the rest of the pipeline consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum EventKind {
    NoteOn { channel: u8, pitch: u8, velocity: u8 },
    NoteOff { channel: u8, pitch: u8, velocity: u8 },
    SetTempo { microseconds_per_beat: u32 },
}

/// A decoded event with its track and absolute tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    pub track: usize,
    pub tick: u64,
    pub kind: EventKind,
}

/// Why a single decode step failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    #[error("variable-length quantity longer than 4 bytes")]
    VlqOverflow,
    #[error("event runs past the end of the track")]
    Truncated,
    #[error("undefined status byte {0:#04x}")]
    UndefinedStatus(u8),
    #[error("data byte without a running status")]
    MissingStatus,
    #[error("status-range byte {0:#04x} where a data byte was expected")]
    BadDataByte(u8),
}

/// A recoverable fault, located by track and byte offset within the track payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeFault {
    pub track: usize,
    pub offset: usize,
    pub kind: FaultKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmfHeader {
    pub format: u16,
    pub declared_tracks: u16,
    pub ticks_per_beat: u16,
}

/// Per-track bookkeeping gathered while scanning an `MTrk` chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackScan {
    pub index: usize,
    /// Tick of the last decoded event (the track's observed extent).
    pub end_tick: u64,
    pub skipped_events: usize,
    pub faults: usize,
}

/// Everything the decoder recovered from a byte buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedSmf {
    pub header: SmfHeader,
    pub tracks: Vec<TrackScan>,
    /// Ordered by track, then by absolute tick within the track.
    pub events: Vec<RawEvent>,
    /// Tempo of the first Set-Tempo event, if any.
    pub first_tempo: Option<u32>,
    pub ignored_tempo_changes: usize,
    pub faults: Vec<DecodeFault>,
}

impl ParsedSmf {
    /// Microseconds per beat for the whole file.
    pub fn tempo_microseconds(&self) -> u32 {
        self.first_tempo.unwrap_or(DEFAULT_TEMPO_MICROSECONDS)
    }

    pub fn seconds_per_tick(&self) -> f64 {
        self.tempo_microseconds() as f64 / (self.header.ticks_per_beat as f64 * 1_000_000.0)
    }

    pub fn ticks_to_seconds(&self, tick: u64) -> f64 {
        tick as f64 * self.tempo_microseconds() as f64
            / (self.header.ticks_per_beat as f64 * 1_000_000.0)
    }

    /// Events belonging to one track.
    pub fn track_events(&self, track: usize) -> &[RawEvent] {
        let start = self.events.partition_point(|e| e.track < track);
        let end = self.events.partition_point(|e| e.track <= track);
        &self.events[start..end]
    }
}

/// Result of one decode step inside a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoded {
    Event(EventKind),
    /// A well-formed event the pipeline has no use for.
    Skipped,
    EndOfTrack,
}

/// One successful decode step: the delta, what was decoded, where the next
/// event starts, and the running status to carry into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub delta: u32,
    pub decoded: Decoded,
    pub next: usize,
    pub running_status: Option<u8>,
}

/// Parse a Standard MIDI File.
///
/// Fails only when the buffer does not start with `MThd`.
pub fn parse(bytes: &[u8]) -> Result<ParsedSmf> {
    if bytes.get(0..4) != Some(b"MThd".as_slice()) {
        return Err(Error::MissingHeader {
            found: bytes.iter().take(4).copied().collect(),
        });
    }

    let header_len = read_u32(bytes, 4).unwrap_or(6) as usize;
    let format = read_u16(bytes, 8).unwrap_or(0);
    let declared_tracks = read_u16(bytes, 10).unwrap_or(0);
    let division = read_u16(bytes, 12).unwrap_or(DEFAULT_TICKS_PER_BEAT);

    let ticks_per_beat = if division == 0 || division & 0x8000 != 0 {
        warn!(division, "unsupported division, assuming {DEFAULT_TICKS_PER_BEAT} ticks per beat");
        DEFAULT_TICKS_PER_BEAT
    } else {
        division
    };

    let mut parsed = ParsedSmf {
        header: SmfHeader {
            format,
            declared_tracks,
            ticks_per_beat,
        },
        tracks: Vec::new(),
        events: Vec::new(),
        first_tempo: None,
        ignored_tempo_changes: 0,
        faults: Vec::new(),
    };

    let mut pos = 8usize.saturating_add(header_len);
    while pos.saturating_add(8) <= bytes.len() {
        let chunk_id = &bytes[pos..pos + 4];
        let chunk_len = read_u32(bytes, pos + 4).unwrap_or(0) as usize;
        let body_start = pos + 8;
        let body_end = body_start.saturating_add(chunk_len).min(bytes.len());

        if chunk_id == b"MTrk" {
            if body_start + chunk_len > bytes.len() {
                debug!(
                    track = parsed.tracks.len(),
                    declared = chunk_len,
                    available = body_end - body_start,
                    "track chunk truncated"
                );
            }
            let index = parsed.tracks.len();
            scan_track(index, &bytes[body_start..body_end], &mut parsed);
        } else {
            debug!(chunk = ?String::from_utf8_lossy(chunk_id), len = chunk_len, "skipping unknown chunk");
        }

        pos = body_start.saturating_add(chunk_len);
    }

    if !parsed.faults.is_empty() {
        warn!(
            faults = parsed.faults.len(),
            tracks = parsed.tracks.len(),
            "MIDI decoded with recoverable faults"
        );
    }

    Ok(parsed)
}

/// Decode every event in one track payload into `parsed`.
fn scan_track(index: usize, data: &[u8], parsed: &mut ParsedSmf) {
    let mut scan = TrackScan {
        index,
        end_tick: 0,
        skipped_events: 0,
        faults: 0,
    };
    let mut pos = 0usize;
    let mut tick = 0u64;
    let mut running_status: Option<u8> = None;

    while pos < data.len() {
        match decode_event(data, pos, running_status) {
            Ok(step) => {
                tick += u64::from(step.delta);
                pos = step.next;
                running_status = step.running_status;
                scan.end_tick = tick;

                match step.decoded {
                    Decoded::EndOfTrack => break,
                    Decoded::Skipped => scan.skipped_events += 1,
                    Decoded::Event(kind) => {
                        if let EventKind::SetTempo {
                            microseconds_per_beat,
                        } = kind
                        {
                            if parsed.first_tempo.is_none() && microseconds_per_beat > 0 {
                                parsed.first_tempo = Some(microseconds_per_beat);
                            } else {
                                parsed.ignored_tempo_changes += 1;
                            }
                        }
                        parsed.events.push(RawEvent {
                            track: index,
                            tick,
                            kind,
                        });
                    }
                }
            }
            Err(kind) => {
                debug!(track = index, offset = pos, %kind, "decode fault, skipping one byte");
                parsed.faults.push(DecodeFault {
                    track: index,
                    offset: pos,
                    kind,
                });
                scan.faults += 1;
                pos += 1;
            }
        }
    }

    parsed.tracks.push(scan);
}

/// Decode the event starting at `pos`.
///
/// Pure in `(data, pos, running_status)`: the caller threads the returned
/// running status into the next call.
pub fn decode_event(
    data: &[u8],
    pos: usize,
    running_status: Option<u8>,
) -> std::result::Result<Step, FaultKind> {
    let (delta, cursor) = read_vlq(data, pos)?;
    let first = *data.get(cursor).ok_or(FaultKind::Truncated)?;

    match first {
        0xFF => {
            let meta_type = *data.get(cursor + 1).ok_or(FaultKind::Truncated)?;
            let (len, body) = read_vlq(data, cursor + 2)?;
            let end = checked_end(data, body, len)?;
            let decoded = match meta_type {
                0x2F => Decoded::EndOfTrack,
                0x51 if len >= 3 => {
                    let microseconds_per_beat = u32::from(data[body]) << 16
                        | u32::from(data[body + 1]) << 8
                        | u32::from(data[body + 2]);
                    Decoded::Event(EventKind::SetTempo {
                        microseconds_per_beat,
                    })
                }
                _ => Decoded::Skipped,
            };
            Ok(Step {
                delta,
                decoded,
                next: end,
                running_status,
            })
        }
        0xF0 | 0xF7 => {
            let (len, body) = read_vlq(data, cursor + 1)?;
            let end = checked_end(data, body, len)?;
            Ok(Step {
                delta,
                decoded: Decoded::Skipped,
                next: end,
                running_status,
            })
        }
        0xF1..=0xFE => Err(FaultKind::UndefinedStatus(first)),
        0x80..=0xEF => {
            let (decoded, next) = decode_channel_message(data, cursor + 1, first)?;
            Ok(Step {
                delta,
                decoded,
                next,
                running_status: Some(first),
            })
        }
        _ => {
            let status = running_status.ok_or(FaultKind::MissingStatus)?;
            let (decoded, next) = decode_channel_message(data, cursor, status)?;
            Ok(Step {
                delta,
                decoded,
                next,
                running_status: Some(status),
            })
        }
    }
}

/// Decode the data bytes of a channel voice message.
fn decode_channel_message(
    data: &[u8],
    cursor: usize,
    status: u8,
) -> std::result::Result<(Decoded, usize), FaultKind> {
    let len = match status & 0xF0 {
        0xC0 | 0xD0 => 1,
        _ => 2,
    };
    let bytes = data
        .get(cursor..cursor + len)
        .ok_or(FaultKind::Truncated)?;
    if let Some(&bad) = bytes.iter().find(|&&b| b & 0x80 != 0) {
        return Err(FaultKind::BadDataByte(bad));
    }

    let channel = status & 0x0F;
    let decoded = match status & 0xF0 {
        0x90 => Decoded::Event(EventKind::NoteOn {
            channel,
            pitch: bytes[0],
            velocity: bytes[1],
        }),
        0x80 => Decoded::Event(EventKind::NoteOff {
            channel,
            pitch: bytes[0],
            velocity: bytes[1],
        }),
        // aftertouch, control change, program change, pitch bend
        _ => Decoded::Skipped,
    };

    Ok((decoded, cursor + len))
}

/// Read a variable-length quantity, returning the value and the next offset.
pub fn read_vlq(data: &[u8], pos: usize) -> std::result::Result<(u32, usize), FaultKind> {
    let mut value = 0u32;
    for i in 0..MAX_VLQ_BYTES {
        let byte = *data.get(pos + i).ok_or(FaultKind::Truncated)?;
        value = (value << 7) | u32::from(byte & 0x7F);
        if byte & 0x80 == 0 {
            return Ok((value, pos + i + 1));
        }
    }
    Err(FaultKind::VlqOverflow)
}

fn checked_end(data: &[u8], start: usize, len: u32) -> std::result::Result<usize, FaultKind> {
    start
        .checked_add(len as usize)
        .filter(|&end| end <= data.len())
        .ok_or(FaultKind::Truncated)
}

fn read_u16(bytes: &[u8], at: usize) -> Option<u16> {
    let b = bytes.get(at..at + 2)?;
    Some(u16::from_be_bytes([b[0], b[1]]))
}

fn read_u32(bytes: &[u8], at: usize) -> Option<u32> {
    let b = bytes.get(at..at + 4)?;
    Some(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}
