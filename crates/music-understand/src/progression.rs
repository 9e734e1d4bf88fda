use tracing::debug;

use crate::key::two_five_one;
use crate::types::{ChordLabel, ChordQuality, KeyEstimate, KeyMode, ProgressionPattern, ProgressionSummary};

/// Scale-degree numerals by semitone distance from the tonic.
const DEGREE_NUMERALS: [&str; 12] = [
    "I", "bII", "II", "bIII", "III", "IV", "#IV", "V", "bVI", "VI", "bVII", "VII",
];

/// Consecutive dominant-family chords that read as blues harmony.
const BLUES_RUN: usize = 3;

/// Roman numeral of a chord relative to a key.
///
/// Minor-family chords take a lower-case numeral and drop the leading "m"
/// of their suffix: Dm7 in C is "ii7", Bm7b5 is "vii7b5". Unknown chords
/// are "?".
pub fn roman_numeral(chord: &ChordLabel, key: &KeyEstimate) -> String {
    if chord.quality == ChordQuality::Unknown {
        return "?".to_string();
    }

    let degree = (chord.root_pitch_class % 12 + 12 - key.tonic_pitch_class % 12) % 12;
    let numeral = DEGREE_NUMERALS[degree as usize];
    let suffix = chord.quality.suffix();

    if chord.quality.is_minor_family() {
        let suffix = match suffix.strip_prefix('m') {
            Some(rest) if !suffix.starts_with("maj") => rest,
            _ => suffix,
        };
        format!("{}{}", numeral.to_lowercase(), suffix)
    } else {
        format!("{}{}", numeral, suffix)
    }
}

/// Classify a chord sequence in a key.
///
/// Checked in order: major ii-V-I, minor ii-V-i, a run of dominant chords
/// (blues), I-vi-ii-V turnaround. Anything else is custom.
pub fn classify_progression(chords: &[ChordLabel], key: &KeyEstimate) -> ProgressionPattern {
    let cadences: Vec<KeyMode> = chords
        .windows(3)
        .filter_map(two_five_one)
        .map(|(_, mode)| mode)
        .collect();

    if cadences.contains(&KeyMode::Major) {
        ProgressionPattern::MajorTwoFiveOne
    } else if cadences.contains(&KeyMode::Minor) {
        ProgressionPattern::MinorTwoFiveOne
    } else if has_dominant_run(chords) {
        ProgressionPattern::Blues
    } else if chords.windows(4).any(|w| is_turnaround(w, key)) {
        ProgressionPattern::Turnaround
    } else {
        ProgressionPattern::Custom
    }
}

/// Annotate each chord with its Roman numeral and summarize the sequence.
pub fn analyze_progression(chords: &mut [ChordLabel], key: &KeyEstimate) -> ProgressionSummary {
    if chords.is_empty() {
        return ProgressionSummary {
            pattern: ProgressionPattern::Custom,
            chords: Vec::new(),
            roman_numerals: Vec::new(),
            summary_text: "No chords detected".to_string(),
        };
    }

    let roman_numerals: Vec<String> = chords
        .iter_mut()
        .map(|chord| {
            let numeral = roman_numeral(chord, key);
            chord.roman_numeral = Some(numeral.clone());
            numeral
        })
        .collect();

    let pattern = classify_progression(chords, key);
    let summary_text = format!("{} progression in {}: {}", pattern, key, roman_numerals.join(" "));
    debug!(%pattern, chords = chords.len(), "classified progression");

    ProgressionSummary {
        pattern,
        chords: chords.iter().map(|c| c.symbol.clone()).collect(),
        roman_numerals,
        summary_text,
    }
}

fn has_dominant_run(chords: &[ChordLabel]) -> bool {
    let mut run = 0;
    for chord in chords {
        if chord.quality.is_dominant_family() {
            run += 1;
            if run >= BLUES_RUN {
                return true;
            }
        } else {
            run = 0;
        }
    }
    false
}

/// I-vi-ii-V relative to the key's tonic.
fn is_turnaround(window: &[ChordLabel], key: &KeyEstimate) -> bool {
    let [one, six, two, five] = window else {
        return false;
    };
    let degree = |chord: &ChordLabel| (chord.root_pitch_class % 12 + 12 - key.tonic_pitch_class % 12) % 12;

    degree(one) == 0
        && one.quality.is_major_tonic_family()
        && degree(six) == 9
        && six.quality.is_minor_family()
        && degree(two) == 2
        && two.quality.is_minor_family()
        && degree(five) == 7
        && (five.quality.is_dominant_family() || five.quality == ChordQuality::Major)
}
