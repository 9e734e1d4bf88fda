use std::ops::Range;

use midi_analysis::NoteEvent;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Thresholds for grouping notes into chords.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationParams {
    /// Seconds within which notes count as one onset. Default: 0.1
    pub onset_window: f64,
    /// Onset groups starting within this many seconds merge. Default: 0.3
    pub gap_threshold: f64,
    /// Merging never grows a cluster past this many notes. Default: 8
    pub max_chord_size: usize,
}

impl Default for SegmentationParams {
    fn default() -> Self {
        Self {
            onset_window: 0.1,
            gap_threshold: 0.3,
            max_chord_size: 8,
        }
    }
}

/// A run of notes heard as one chord.
///
/// Borrows a contiguous window of the start-sorted note list.
#[derive(Debug, Clone, Copy)]
pub struct ChordCluster<'a> {
    pub notes: &'a [NoteEvent],
}

impl<'a> ChordCluster<'a> {
    pub fn start_time(&self) -> f64 {
        self.notes
            .iter()
            .map(|n| n.start_time)
            .fold(f64::INFINITY, f64::min)
    }

    pub fn end_time(&self) -> f64 {
        self.notes
            .iter()
            .map(|n| n.end_time)
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Lowest sounding pitch.
    pub fn bass_pitch(&self) -> Option<u8> {
        self.notes.iter().map(|n| n.pitch).min()
    }

    /// Distinct pitch classes, ascending.
    pub fn pitch_classes(&self) -> Vec<u8> {
        let mut pcs: Vec<u8> = self.notes.iter().map(|n| n.pitch_class).collect();
        pcs.sort_unstable();
        pcs.dedup();
        pcs
    }

    /// Pitches, ascending, duplicates kept.
    pub fn pitches(&self) -> Vec<u8> {
        let mut pitches: Vec<u8> = self.notes.iter().map(|n| n.pitch).collect();
        pitches.sort_unstable();
        pitches
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}

/// Group start-sorted notes into chord clusters.
///
/// Notes within `onset_window` of an onset group's first note join that
/// group. Consecutive groups whose starts are at most `gap_threshold` apart
/// merge, unless the merged cluster would exceed `max_chord_size` notes. A
/// single onset group is never split. Clusters with fewer than two notes are
/// dropped.
pub fn segment_chords<'a>(notes: &'a [NoteEvent], params: &SegmentationParams) -> Vec<ChordCluster<'a>> {
    debug_assert!(
        notes.windows(2).all(|w| w[0].start_time <= w[1].start_time),
        "notes must be sorted by start time"
    );

    let groups = onset_groups(notes, params.onset_window);

    let mut merged: Vec<Range<usize>> = Vec::new();
    let mut current: Option<Range<usize>> = None;
    let mut previous_start = 0.0;

    for group in groups {
        let group_start = notes[group.start].start_time;
        current = match current {
            Some(cluster)
                if group_start - previous_start <= params.gap_threshold
                    && group.end - cluster.start <= params.max_chord_size =>
            {
                Some(cluster.start..group.end)
            }
            Some(cluster) => {
                merged.push(cluster);
                Some(group)
            }
            None => Some(group),
        };
        previous_start = group_start;
    }
    merged.extend(current);

    let clusters: Vec<ChordCluster<'a>> = merged
        .into_iter()
        .filter(|range| range.len() >= 2)
        .map(|range| ChordCluster {
            notes: &notes[range],
        })
        .collect();

    debug!(notes = notes.len(), clusters = clusters.len(), "segmented chords");
    clusters
}

fn onset_groups(notes: &[NoteEvent], onset_window: f64) -> Vec<Range<usize>> {
    let mut groups = Vec::new();
    let mut group_start = 0;

    for (i, note) in notes.iter().enumerate().skip(1) {
        if note.start_time - notes[group_start].start_time > onset_window {
            groups.push(group_start..i);
            group_start = i;
        }
    }
    if !notes.is_empty() {
        groups.push(group_start..notes.len());
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(pitch: u8, start: f64) -> NoteEvent {
        NoteEvent::new(pitch, start, start + 0.5, 80, 0, 0)
    }

    fn params(onset_window: f64, gap_threshold: f64, max_chord_size: usize) -> SegmentationParams {
        SegmentationParams {
            onset_window,
            gap_threshold,
            max_chord_size,
        }
    }

    #[test]
    fn empty_input() {
        assert!(segment_chords(&[], &SegmentationParams::default()).is_empty());
    }

    #[test]
    fn near_simultaneous_notes_form_one_chord() {
        let notes = vec![note(60, 0.0), note(64, 0.02)];
        let clusters = segment_chords(&notes, &params(0.08, 0.0, 8));
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].len(), 2);
    }

    #[test]
    fn distant_single_notes_are_not_chords() {
        let notes = vec![note(60, 0.0), note(64, 1.0)];
        let clusters = segment_chords(&notes, &params(0.1, 0.4, 8));
        assert!(clusters.is_empty());
    }

    #[test]
    fn close_groups_merge() {
        // Arpeggio: each note is its own onset group, all within the gap
        let notes = vec![note(60, 0.0), note(64, 0.2), note(67, 0.4)];
        let clusters = segment_chords(&notes, &params(0.1, 0.3, 8));
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].pitch_classes(), vec![0, 4, 7]);
    }

    #[test]
    fn gap_splits_clusters() {
        let notes = vec![
            note(62, 0.0),
            note(65, 0.01),
            note(69, 0.02),
            note(67, 1.0),
            note(71, 1.01),
        ];
        let clusters = segment_chords(&notes, &SegmentationParams::default());
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].len(), 3);
        assert_eq!(clusters[1].bass_pitch(), Some(67));
        assert!((clusters[1].start_time() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn size_cap_stops_merging() {
        let notes = vec![
            note(48, 0.0),
            note(52, 0.0),
            note(55, 0.0),
            note(60, 0.2),
            note(64, 0.2),
        ];
        let clusters = segment_chords(&notes, &params(0.1, 0.3, 4));
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].len(), 3);
        assert_eq!(clusters[1].len(), 2);
    }

    #[test]
    fn oversized_onset_group_is_kept_whole() {
        let notes: Vec<NoteEvent> = (0..5).map(|i| note(60 + i * 2, 0.0)).collect();
        let clusters = segment_chords(&notes, &params(0.1, 0.3, 3));
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].len(), 5);
    }

    #[test]
    fn onset_window_measured_from_group_start() {
        // 0.0 / 0.06 / 0.12: third note is outside the first note's window
        let notes = vec![note(60, 0.0), note(64, 0.06), note(67, 0.12)];
        let clusters = segment_chords(&notes, &params(0.1, 0.0, 8));
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].len(), 2);
    }
}
