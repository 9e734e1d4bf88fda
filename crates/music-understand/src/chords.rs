use midi_analysis::midi_to_note_name;
use tracing::trace;

use crate::chord_templates::{match_chord, root_name};
use crate::segment::ChordCluster;
use crate::types::{ChordLabel, ChordQuality};

/// Name the chord a cluster spells.
///
/// The bass is the lowest sounding pitch. When the chosen root differs from
/// the bass the symbol carries a slash bass ("C7/E"). Clusters no template
/// fits are labelled with the bass and a question mark ("E?").
pub fn identify_chord(cluster: &ChordCluster<'_>) -> ChordLabel {
    let pitches = cluster.pitches();
    let bass_pitch = pitches.first().copied().unwrap_or_default();
    let bass_pc = bass_pitch % 12;
    let bass = root_name(bass_pc);

    let (root_pc, quality, symbol) = match match_chord(&cluster.pitch_classes(), bass_pc) {
        Some(found) => {
            let root = root_name(found.root);
            let mut symbol = format!("{}{}", root, found.quality.suffix());
            if found.root != bass_pc {
                symbol.push('/');
                symbol.push_str(bass);
            }
            (found.root, found.quality, symbol)
        }
        None => (
            bass_pc,
            ChordQuality::Unknown,
            format!("{}{}", bass, ChordQuality::Unknown.suffix()),
        ),
    };

    let mean_velocity = if cluster.is_empty() {
        0.0
    } else {
        cluster.notes.iter().map(|n| n.velocity as f64).sum::<f64>() / cluster.len() as f64
    };

    trace!(%symbol, notes = cluster.len(), "identified chord");

    ChordLabel {
        symbol,
        root: root_name(root_pc).to_string(),
        root_pitch_class: root_pc,
        quality,
        chord_type: quality.name().to_string(),
        bass: bass.to_string(),
        bass_pitch_class: bass_pc,
        note_names: pitches.iter().map(|&p| midi_to_note_name(p)).collect(),
        pitches,
        start_time: cluster.start_time(),
        end_time: cluster.end_time(),
        mean_velocity,
        note_count: cluster.len(),
        roman_numeral: None,
    }
}

/// Label every cluster, preserving order.
pub fn identify_chords(clusters: &[ChordCluster<'_>]) -> Vec<ChordLabel> {
    clusters.iter().map(identify_chord).collect()
}
