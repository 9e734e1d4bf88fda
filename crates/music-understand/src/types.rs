use std::fmt;
use std::str::FromStr;

use midi_analysis::{MidiFileContext, NoteEvent, TrackProfile};
use serde::{Deserialize, Serialize};

use crate::chord_templates::root_name;
use crate::Error;

/// Complete analysis of one MIDI performance.
///
/// Owns every note and chord it reports; nothing borrows from the input
/// buffer once this is returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub context: MidiFileContext,
    /// Note, skip and fault counts per decoded track.
    pub tracks: Vec<TrackProfile>,
    pub total_notes: usize,
    /// Seconds from zero to the latest note end.
    pub duration: f64,
    pub tempo_bpm: f64,
    pub pitch_range: Option<PitchSpan>,
    pub most_common_notes: Vec<String>,
    pub notes: Vec<NoteEvent>,
    pub chords: Vec<ChordLabel>,
    pub key: KeyEstimate,
    /// `"<Root> Major"` or `"<Root> Minor"`.
    pub detected_key: String,
    pub progression: ProgressionSummary,
    pub voice_leading: Vec<VoiceLeadingStep>,
    /// `None` with fewer than two notes.
    pub timing: Option<TimingStats>,
    /// `None` without notes.
    pub dynamics: Option<DynamicsStats>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyMode {
    Major,
    Minor,
}

impl fmt::Display for KeyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyMode::Major => write!(f, "Major"),
            KeyMode::Minor => write!(f, "Minor"),
        }
    }
}

/// Where a key estimate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeySource {
    /// No notes to analyze.
    Default,
    /// Krumhansl-Kessler correlation over the pitch-class histogram.
    Histogram,
    /// A ii-V-I (or ii-V-i) among the leading chords.
    Cadence,
    /// Supplied by the caller.
    Caller,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyEstimate {
    /// Root note name: "C", "Bb", "F#", etc.
    pub tonic: String,
    /// Pitch class 0–11 (C=0, C#=1, ...)
    pub tonic_pitch_class: u8,
    pub mode: KeyMode,
    /// Pearson correlation of the histogram with this key's profile.
    pub confidence: f64,
    pub source: KeySource,
}

impl KeyEstimate {
    pub fn new(tonic_pitch_class: u8, mode: KeyMode, confidence: f64, source: KeySource) -> Self {
        let tonic_pitch_class = tonic_pitch_class % 12;
        Self {
            tonic: root_name(tonic_pitch_class).to_string(),
            tonic_pitch_class,
            mode,
            confidence,
            source,
        }
    }
}

impl Default for KeyEstimate {
    /// C Major, used when there is nothing to analyze.
    fn default() -> Self {
        Self::new(0, KeyMode::Major, 0.0, KeySource::Default)
    }
}

impl fmt::Display for KeyEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.tonic, self.mode)
    }
}

impl FromStr for KeyEstimate {
    type Err = Error;

    /// Accepts `"C Major"`, `"bb minor"`, `"F#m"`, `"Eb"`, `"A min"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidKey(s.to_string());
        let mut parts = s.split_whitespace();
        let root_token = parts.next().ok_or_else(invalid)?;
        let mode_token = parts.next();
        if parts.next().is_some() {
            return Err(invalid());
        }

        let mut chars = root_token.chars();
        let letter = chars.next().ok_or_else(invalid)?;
        let natural: u8 = match letter.to_ascii_uppercase() {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            'B' => 11,
            _ => return Err(invalid()),
        };

        let rest: String = chars.collect();
        let (pitch_class, rest) = if let Some(r) = rest.strip_prefix(['#', '♯']) {
            ((natural + 1) % 12, r)
        } else if let Some(r) = rest.strip_prefix(['b', '♭']) {
            ((natural + 11) % 12, r)
        } else {
            (natural, rest.as_str())
        };

        let mode = match (rest, mode_token) {
            ("", None) => KeyMode::Major,
            ("", Some(token)) => parse_mode(token).ok_or_else(invalid)?,
            (suffix, None) => parse_mode(suffix).ok_or_else(invalid)?,
            _ => return Err(invalid()),
        };

        Ok(KeyEstimate::new(pitch_class, mode, 1.0, KeySource::Caller))
    }
}

fn parse_mode(token: &str) -> Option<KeyMode> {
    if token == "m" {
        return Some(KeyMode::Minor);
    }
    match token.to_ascii_lowercase().as_str() {
        "major" | "maj" | "dur" => Some(KeyMode::Major),
        "minor" | "min" | "moll" => Some(KeyMode::Minor),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChordQuality {
    Major,
    Minor,
    Diminished,
    Augmented,
    Suspended4,
    Suspended2,
    Major6,
    Minor6,
    Dominant7,
    Major7,
    Minor7,
    MinorMajor7,
    HalfDiminished7,
    Diminished7,
    Dominant7Flat9,
    Dominant7Sharp9,
    Dominant7Flat5,
    Dominant7Sharp5,
    Dominant9,
    Major9,
    Minor9,
    Dominant13,
    /// No template matched.
    Unknown,
}

impl ChordQuality {
    /// Suffix for chord symbol display
    pub fn suffix(&self) -> &'static str {
        match self {
            ChordQuality::Major => "",
            ChordQuality::Minor => "m",
            ChordQuality::Diminished => "dim",
            ChordQuality::Augmented => "aug",
            ChordQuality::Suspended4 => "sus4",
            ChordQuality::Suspended2 => "sus2",
            ChordQuality::Major6 => "6",
            ChordQuality::Minor6 => "m6",
            ChordQuality::Dominant7 => "7",
            ChordQuality::Major7 => "maj7",
            ChordQuality::Minor7 => "m7",
            ChordQuality::MinorMajor7 => "m(maj7)",
            ChordQuality::HalfDiminished7 => "m7b5",
            ChordQuality::Diminished7 => "dim7",
            ChordQuality::Dominant7Flat9 => "7b9",
            ChordQuality::Dominant7Sharp9 => "7#9",
            ChordQuality::Dominant7Flat5 => "7b5",
            ChordQuality::Dominant7Sharp5 => "7#5",
            ChordQuality::Dominant9 => "9",
            ChordQuality::Major9 => "maj9",
            ChordQuality::Minor9 => "m9",
            ChordQuality::Dominant13 => "13",
            ChordQuality::Unknown => "?",
        }
    }

    /// Human-readable chord type, e.g. "Minor 7".
    pub fn name(&self) -> &'static str {
        match self {
            ChordQuality::Major => "Major",
            ChordQuality::Minor => "Minor",
            ChordQuality::Diminished => "Diminished",
            ChordQuality::Augmented => "Augmented",
            ChordQuality::Suspended4 => "Sus4",
            ChordQuality::Suspended2 => "Sus2",
            ChordQuality::Major6 => "Major 6",
            ChordQuality::Minor6 => "Minor 6",
            ChordQuality::Dominant7 => "Dominant 7",
            ChordQuality::Major7 => "Major 7",
            ChordQuality::Minor7 => "Minor 7",
            ChordQuality::MinorMajor7 => "Minor-Major 7",
            ChordQuality::HalfDiminished7 => "Half-Diminished 7",
            ChordQuality::Diminished7 => "Diminished 7",
            ChordQuality::Dominant7Flat9 => "Dominant 7 b9",
            ChordQuality::Dominant7Sharp9 => "Dominant 7 #9",
            ChordQuality::Dominant7Flat5 => "Dominant 7 b5",
            ChordQuality::Dominant7Sharp5 => "Dominant 7 #5",
            ChordQuality::Dominant9 => "Dominant 9",
            ChordQuality::Major9 => "Major 9",
            ChordQuality::Minor9 => "Minor 9",
            ChordQuality::Dominant13 => "Dominant 13",
            ChordQuality::Unknown => "Unknown",
        }
    }

    /// Qualities written with a lower-case Roman numeral.
    pub fn is_minor_family(&self) -> bool {
        matches!(
            self,
            ChordQuality::Minor
                | ChordQuality::Minor6
                | ChordQuality::Minor7
                | ChordQuality::MinorMajor7
                | ChordQuality::Minor9
                | ChordQuality::HalfDiminished7
                | ChordQuality::Diminished
                | ChordQuality::Diminished7
        )
    }

    pub fn is_dominant_family(&self) -> bool {
        matches!(
            self,
            ChordQuality::Dominant7
                | ChordQuality::Dominant7Flat9
                | ChordQuality::Dominant7Sharp9
                | ChordQuality::Dominant7Flat5
                | ChordQuality::Dominant7Sharp5
                | ChordQuality::Dominant9
                | ChordQuality::Dominant13
        )
    }

    /// Chords that can act as the ii of a major ii-V-I.
    pub fn is_minor_seventh_family(&self) -> bool {
        matches!(self, ChordQuality::Minor7 | ChordQuality::Minor9)
    }

    /// Chords that can act as a major tonic.
    pub fn is_major_tonic_family(&self) -> bool {
        matches!(
            self,
            ChordQuality::Major7 | ChordQuality::Major9 | ChordQuality::Major6 | ChordQuality::Major
        )
    }

    /// Chords that can act as a minor tonic.
    pub fn is_minor_tonic_family(&self) -> bool {
        matches!(
            self,
            ChordQuality::Minor
                | ChordQuality::Minor6
                | ChordQuality::Minor7
                | ChordQuality::MinorMajor7
                | ChordQuality::Minor9
        )
    }
}

/// A labelled chord built from one segmentation cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChordLabel {
    /// Full chord symbol: "Cmaj7", "Dm", "G7/B", "E?"
    pub symbol: String,
    pub root: String,
    pub root_pitch_class: u8,
    pub quality: ChordQuality,
    #[serde(rename = "type")]
    pub chord_type: String,
    pub bass: String,
    pub bass_pitch_class: u8,
    /// Sorted ascending.
    pub pitches: Vec<u8>,
    pub note_names: Vec<String>,
    pub start_time: f64,
    pub end_time: f64,
    pub mean_velocity: f64,
    pub note_count: usize,
    /// Filled in once the key is known.
    pub roman_numeral: Option<String>,
}

/// Canonical progression shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgressionPattern {
    #[serde(rename = "ii-V-I")]
    MajorTwoFiveOne,
    #[serde(rename = "ii-V-i")]
    MinorTwoFiveOne,
    Blues,
    /// I-vi-ii-V
    Turnaround,
    Custom,
}

impl fmt::Display for ProgressionPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ProgressionPattern::MajorTwoFiveOne => "ii-V-I",
            ProgressionPattern::MinorTwoFiveOne => "ii-V-i",
            ProgressionPattern::Blues => "Blues",
            ProgressionPattern::Turnaround => "Turnaround",
            ProgressionPattern::Custom => "Custom",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressionSummary {
    #[serde(rename = "type")]
    pub pattern: ProgressionPattern,
    /// Chord symbols in performance order.
    pub chords: Vec<String>,
    pub roman_numerals: Vec<String>,
    pub summary_text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PitchSpan {
    pub min: u8,
    pub max: u8,
    pub min_note: String,
    pub max_note: String,
}

/// Inter-onset interval statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingStats {
    /// 1.0 for perfectly even onsets, falling toward 0.0 as spread grows.
    pub precision_score: f64,
    pub mean_interval: f64,
    pub std_interval: f64,
    pub total_intervals: usize,
}

/// Velocity statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicsStats {
    pub min: u8,
    pub max: u8,
    pub mean: f64,
    pub range: u8,
    pub std: f64,
}

/// Motion from one chord to the next.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceLeadingStep {
    pub from_chord: String,
    pub to_chord: String,
    /// Pitches sounding in both chords.
    pub common_tones: usize,
    /// For each pitch of the first chord, semitones to the nearest pitch of the second.
    pub movements: Vec<i16>,
    /// Every movement is a step (two semitones) or less.
    pub smooth: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_display() {
        assert_eq!(KeyEstimate::default().to_string(), "C Major");
        let key = KeyEstimate::new(10, KeyMode::Minor, 0.5, KeySource::Histogram);
        assert_eq!(key.to_string(), "Bb Minor");
    }

    #[test]
    fn key_parsing_accepts_common_spellings() {
        let cases = [
            ("C Major", 0, KeyMode::Major),
            ("bb minor", 10, KeyMode::Minor),
            ("F#m", 6, KeyMode::Minor),
            ("Eb", 3, KeyMode::Major),
            ("A min", 9, KeyMode::Minor),
            ("Dbmaj", 1, KeyMode::Major),
            ("b", 11, KeyMode::Major),
        ];
        for (text, pc, mode) in cases {
            let key: KeyEstimate = text.parse().unwrap();
            assert_eq!(key.tonic_pitch_class, pc, "{text}");
            assert_eq!(key.mode, mode, "{text}");
            assert_eq!(key.source, KeySource::Caller);
        }
    }

    #[test]
    fn key_parsing_rejects_garbage() {
        for text in ["", "H major", "C lydian", "C major extra", "Cm minor"] {
            assert!(text.parse::<KeyEstimate>().is_err(), "{text}");
        }
    }

    #[test]
    fn quality_families() {
        assert!(ChordQuality::HalfDiminished7.is_minor_family());
        assert!(!ChordQuality::Dominant7.is_minor_family());
        assert!(ChordQuality::Dominant13.is_dominant_family());
        assert!(ChordQuality::Major9.is_major_tonic_family());
    }

    #[test]
    fn progression_pattern_serializes_as_label() {
        let json = serde_json::to_string(&ProgressionPattern::MajorTwoFiveOne).unwrap();
        assert_eq!(json, "\"ii-V-I\"");
        assert_eq!(ProgressionPattern::Blues.to_string(), "Blues");
    }
}
