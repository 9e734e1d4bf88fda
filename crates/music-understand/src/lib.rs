//! Harmonic analysis of jazz MIDI performances.
//!
//! [`MusicUnderstandingEngine::compute`] decodes a Standard MIDI File,
//! groups its notes into chords, names them, estimates the key and
//! classifies the progression.

pub mod analyzer;
pub mod chord_templates;
pub mod chords;
pub mod key;
pub mod performance;
pub mod progression;
pub mod segment;
pub mod types;
pub mod voice_leading;

pub use analyzer::{HeuristicAnalyzer, MusicAnalyzer};
pub use key::KeyParams;
pub use segment::{ChordCluster, SegmentationParams};
pub use types::{
    AnalysisResult, ChordLabel, ChordQuality, DynamicsStats, KeyEstimate, KeyMode, KeySource,
    PitchSpan, ProgressionPattern, ProgressionSummary, TimingStats, VoiceLeadingStep,
};

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Errors from music understanding.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Midi(#[from] midi_analysis::Error),

    #[error("invalid key {0:?}: expected a root such as \"C\", \"Bb\" or \"F#\" with an optional major/minor mode")]
    InvalidKey(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Tunable thresholds for a whole analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisParams {
    pub segmentation: SegmentationParams,
    pub key: KeyParams,
}

/// Unified music understanding engine.
///
/// Composes MIDI decoding, chord segmentation and naming, key detection and
/// progression analysis into a single [`AnalysisResult`].
pub struct MusicUnderstandingEngine {
    analyzer: Arc<dyn MusicAnalyzer>,
    params: AnalysisParams,
}

impl Default for MusicUnderstandingEngine {
    fn default() -> Self {
        Self::new(AnalysisParams::default())
    }
}

impl MusicUnderstandingEngine {
    /// Create with the default heuristic analyzer.
    pub fn new(params: AnalysisParams) -> Self {
        Self {
            analyzer: Arc::new(HeuristicAnalyzer),
            params,
        }
    }

    /// Create with a custom analyzer.
    pub fn with_analyzer(analyzer: Arc<dyn MusicAnalyzer>, params: AnalysisParams) -> Self {
        Self { analyzer, params }
    }

    pub fn params(&self) -> &AnalysisParams {
        &self.params
    }

    /// Analyze raw MIDI bytes.
    ///
    /// With `key` set, detection is skipped and the given key is used for
    /// Roman numerals. Only a missing `MThd` header fails; any other damage
    /// is skipped and counted in the result's context.
    pub fn compute(&self, midi_bytes: &[u8], key: Option<KeyEstimate>) -> Result<AnalysisResult> {
        let midi_analysis::MidiAnalysis {
            context,
            notes,
            tracks,
        } = midi_analysis::analyze(midi_bytes)?;
        debug!(
            format = context.format,
            tracks = tracks.len(),
            notes = notes.len(),
            bpm = context.bpm,
            "decoded MIDI"
        );

        if context.decode_faults > 0 {
            warn!(faults = context.decode_faults, "recovered from corrupt MIDI bytes");
        }

        let mut chords = {
            let clusters = self.analyzer.segment(&notes, &self.params.segmentation);
            self.analyzer.identify_chords(&clusters)
        };

        let key = match key {
            Some(key) => key,
            None => self.analyzer.analyze_key(&notes, &chords, &self.params.key),
        };

        let progression = self.analyzer.analyze_progression(&mut chords, &key);
        let voice_leading = voice_leading::analyze_voice_leading(&chords);

        info!(
            notes = notes.len(),
            chords = chords.len(),
            key = %key,
            progression = %progression.pattern,
            "analyzed MIDI performance"
        );

        Ok(AnalysisResult {
            total_notes: notes.len(),
            duration: performance::duration(&notes),
            tempo_bpm: context.bpm,
            pitch_range: performance::pitch_span(&notes),
            most_common_notes: performance::most_common_notes(&notes, performance::MOST_COMMON_NOTES),
            timing: performance::timing_stats(&notes),
            dynamics: performance::dynamics_stats(&notes),
            detected_key: key.to_string(),
            context,
            tracks,
            notes,
            chords,
            key,
            progression,
            voice_leading,
        })
    }
}

/// Analyze MIDI bytes with default thresholds.
pub fn analyze_midi(midi_bytes: &[u8]) -> Result<AnalysisResult> {
    MusicUnderstandingEngine::default().compute(midi_bytes, None)
}
