use midi_analysis::NoteEvent;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{ChordLabel, ChordQuality, KeyEstimate, KeyMode, KeySource};

/// Krumhansl-Kessler major key profile.
const MAJOR_PROFILE: [f64; 12] = [6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88];

/// Krumhansl-Kessler minor key profile.
const MINOR_PROFILE: [f64; 12] = [6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17];

/// Tonics favoured by the jazz bias: C, F, Bb, Eb, G, D, Ab.
pub const COMMON_JAZZ_KEYS: [u8; 7] = [0, 5, 10, 3, 7, 2, 8];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyParams {
    /// Added to the correlation of keys on [`COMMON_JAZZ_KEYS`]. Default: 0.02
    pub jazz_key_bias: f64,
    /// Leading chords searched for a ii-V-I. Default: 8
    pub cadence_window: usize,
}

impl Default for KeyParams {
    fn default() -> Self {
        Self {
            jazz_key_bias: 0.02,
            cadence_window: 8,
        }
    }
}

/// Estimate the key of a performance.
///
/// A ii-V-I (or ii-V-i) among the first `cadence_window` chords decides the
/// key outright. Otherwise the pitch-class histogram is correlated against
/// all 24 Krumhansl-Kessler profiles, with a small bonus for common jazz keys.
pub fn detect_key(notes: &[NoteEvent], chords: &[ChordLabel], params: &KeyParams) -> KeyEstimate {
    if notes.is_empty() {
        return KeyEstimate::default();
    }

    let histogram = pitch_class_histogram(notes);

    if let Some((tonic, mode)) = find_cadence(chords, params.cadence_window) {
        let confidence = round4(correlation(&histogram, tonic, mode));
        let key = KeyEstimate::new(tonic, mode, confidence, KeySource::Cadence);
        debug!(key = %key, "key taken from cadence");
        return key;
    }

    let key = key_from_histogram(&histogram, params.jazz_key_bias);
    debug!(key = %key, confidence = key.confidence, "key taken from histogram");
    key
}

/// Note-count histogram over pitch classes, normalized to sum to 1.
pub fn pitch_class_histogram(notes: &[NoteEvent]) -> [f64; 12] {
    let mut histogram = [0.0_f64; 12];
    for note in notes {
        histogram[(note.pitch_class % 12) as usize] += 1.0;
    }

    let total: f64 = histogram.iter().sum();
    if total > 0.0 {
        for h in &mut histogram {
            *h /= total;
        }
    }
    histogram
}

/// Best of the 24 major/minor keys for a histogram.
///
/// `jazz_bias` only affects selection; the reported confidence is the plain
/// correlation.
pub fn key_from_histogram(histogram: &[f64; 12], jazz_bias: f64) -> KeyEstimate {
    let mut best_root: u8 = 0;
    let mut best_mode = KeyMode::Major;
    let mut best_score = f64::NEG_INFINITY;
    let mut best_corr = 0.0;

    for root in 0..12u8 {
        let bias = if COMMON_JAZZ_KEYS.contains(&root) {
            jazz_bias
        } else {
            0.0
        };

        for mode in [KeyMode::Major, KeyMode::Minor] {
            let corr = correlation(histogram, root, mode);
            if corr + bias > best_score {
                best_score = corr + bias;
                best_corr = corr;
                best_root = root;
                best_mode = mode;
            }
        }
    }

    KeyEstimate::new(best_root, best_mode, round4(best_corr), KeySource::Histogram)
}

/// Tonic and mode of the first ii-V-I among the leading `window` chords.
pub fn find_cadence(chords: &[ChordLabel], window: usize) -> Option<(u8, KeyMode)> {
    let leading = &chords[..chords.len().min(window)];
    leading.windows(3).find_map(two_five_one)
}

/// Recognize a three-chord ii-V-I.
///
/// Major: minor seventh, dominant, major tonic. Minor: half-diminished,
/// dominant, minor tonic. Each root must rise a fourth.
pub fn two_five_one(window: &[ChordLabel]) -> Option<(u8, KeyMode)> {
    let [ii, v, i] = window else {
        return None;
    };

    let fourth_up = |from: &ChordLabel, to: &ChordLabel| (from.root_pitch_class + 5) % 12 == to.root_pitch_class;
    if !fourth_up(ii, v) || !fourth_up(v, i) || !v.quality.is_dominant_family() {
        return None;
    }

    if ii.quality.is_minor_seventh_family() && i.quality.is_major_tonic_family() {
        Some((i.root_pitch_class, KeyMode::Major))
    } else if ii.quality == ChordQuality::HalfDiminished7 && i.quality.is_minor_tonic_family() {
        Some((i.root_pitch_class, KeyMode::Minor))
    } else {
        None
    }
}

fn correlation(histogram: &[f64; 12], root: u8, mode: KeyMode) -> f64 {
    // Rotate histogram so root = index 0
    let mut rotated = [0.0; 12];
    for (i, slot) in rotated.iter_mut().enumerate() {
        *slot = histogram[(i + root as usize) % 12];
    }

    let profile = match mode {
        KeyMode::Major => &MAJOR_PROFILE,
        KeyMode::Minor => &MINOR_PROFILE,
    };
    pearson(&rotated, profile)
}

/// Pearson correlation coefficient between two 12-element arrays.
fn pearson(x: &[f64; 12], y: &[f64; 12]) -> f64 {
    let x_mean: f64 = x.iter().sum::<f64>() / 12.0;
    let y_mean: f64 = y.iter().sum::<f64>() / 12.0;

    let mut num = 0.0;
    let mut x_sq = 0.0;
    let mut y_sq = 0.0;

    for i in 0..12 {
        let xd = x[i] - x_mean;
        let yd = y[i] - y_mean;
        num += xd * yd;
        x_sq += xd * xd;
        y_sq += yd * yd;
    }

    let denom = (x_sq * y_sq).sqrt();
    if denom < 1e-10 {
        return 0.0;
    }
    num / denom
}

fn round4(value: f64) -> f64 {
    (value * 10000.0).round() / 10000.0
}
