//! Timing, dynamics and register statistics over the note list.

use std::collections::HashMap;

use midi_analysis::{midi_to_note_name, NoteEvent};

use crate::types::{DynamicsStats, PitchSpan, TimingStats};

/// Number of entries reported by [`most_common_notes`] in an analysis.
pub const MOST_COMMON_NOTES: usize = 5;

/// Inter-onset interval statistics.
///
/// Intervals are differences between consecutive sorted start times, so
/// notes of one chord contribute zero-length intervals. Precision is
/// `1 - min(std / (mean + 0.001), 1)` with the population deviation.
pub fn timing_stats(notes: &[NoteEvent]) -> Option<TimingStats> {
    if notes.len() < 2 {
        return None;
    }

    let mut starts: Vec<f64> = notes.iter().map(|n| n.start_time).collect();
    starts.sort_by(f64::total_cmp);

    let intervals: Vec<f64> = starts.windows(2).map(|w| w[1] - w[0]).collect();
    let (mean, std) = mean_and_std(&intervals);
    let precision_score = 1.0 - (std / (mean + 0.001)).min(1.0);

    Some(TimingStats {
        precision_score,
        mean_interval: mean,
        std_interval: std,
        total_intervals: intervals.len(),
    })
}

pub fn dynamics_stats(notes: &[NoteEvent]) -> Option<DynamicsStats> {
    let min = notes.iter().map(|n| n.velocity).min()?;
    let max = notes.iter().map(|n| n.velocity).max()?;
    let velocities: Vec<f64> = notes.iter().map(|n| n.velocity as f64).collect();
    let (mean, std) = mean_and_std(&velocities);

    Some(DynamicsStats {
        min,
        max,
        mean,
        range: max - min,
        std,
    })
}

pub fn pitch_span(notes: &[NoteEvent]) -> Option<PitchSpan> {
    let min = notes.iter().map(|n| n.pitch).min()?;
    let max = notes.iter().map(|n| n.pitch).max()?;
    Some(PitchSpan {
        min,
        max,
        min_note: midi_to_note_name(min),
        max_note: midi_to_note_name(max),
    })
}

/// The `limit` most frequent note names, ties in order of first appearance.
pub fn most_common_notes(notes: &[NoteEvent], limit: usize) -> Vec<String> {
    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();

    for note in notes {
        let count = counts.entry(note.note_name.as_str()).or_insert(0);
        if *count == 0 {
            order.push(note.note_name.as_str());
        }
        *count += 1;
    }

    // Stable sort keeps first-appearance order among equal counts
    order.sort_by_key(|name| std::cmp::Reverse(counts[name]));
    order.into_iter().take(limit).map(str::to_string).collect()
}

/// Seconds from zero to the latest note end.
pub fn duration(notes: &[NoteEvent]) -> f64 {
    notes.iter().map(|n| n.end_time).fold(0.0, f64::max)
}

fn mean_and_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}
