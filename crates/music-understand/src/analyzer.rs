use midi_analysis::NoteEvent;

use crate::chords::identify_chords;
use crate::key::{detect_key, KeyParams};
use crate::progression::analyze_progression;
use crate::segment::{segment_chords, ChordCluster, SegmentationParams};
use crate::types::{ChordLabel, KeyEstimate, ProgressionSummary};

/// Trait for music analysis backends.
///
/// Each stage is a separate call so a backend can replace one heuristic
/// (say, chord naming) and delegate the rest to [`HeuristicAnalyzer`].
pub trait MusicAnalyzer: Send + Sync {
    fn segment<'a>(&self, notes: &'a [NoteEvent], params: &SegmentationParams) -> Vec<ChordCluster<'a>>;

    fn identify_chords(&self, clusters: &[ChordCluster<'_>]) -> Vec<ChordLabel>;

    fn analyze_key(&self, notes: &[NoteEvent], chords: &[ChordLabel], params: &KeyParams) -> KeyEstimate;

    /// Fills in each chord's Roman numeral.
    fn analyze_progression(&self, chords: &mut [ChordLabel], key: &KeyEstimate) -> ProgressionSummary;
}

/// Onset-window segmentation, template-matching chord naming,
/// Krumhansl-Schmuckler key detection with cadence override.
pub struct HeuristicAnalyzer;

impl MusicAnalyzer for HeuristicAnalyzer {
    fn segment<'a>(&self, notes: &'a [NoteEvent], params: &SegmentationParams) -> Vec<ChordCluster<'a>> {
        segment_chords(notes, params)
    }

    fn identify_chords(&self, clusters: &[ChordCluster<'_>]) -> Vec<ChordLabel> {
        identify_chords(clusters)
    }

    fn analyze_key(&self, notes: &[NoteEvent], chords: &[ChordLabel], params: &KeyParams) -> KeyEstimate {
        detect_key(notes, chords, params)
    }

    fn analyze_progression(&self, chords: &mut [ChordLabel], key: &KeyEstimate) -> ProgressionSummary {
        analyze_progression(chords, key)
    }
}
