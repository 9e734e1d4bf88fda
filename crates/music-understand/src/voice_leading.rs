use crate::types::{ChordLabel, VoiceLeadingStep};

/// Largest move, in semitones, still counted as smooth.
const SMOOTH_STEP: i16 = 2;

/// Describe the motion between each pair of consecutive chords.
///
/// Every pitch of the first chord moves to the nearest pitch of the second
/// (the lower candidate on ties). Common tones are pitches sounding in both.
pub fn analyze_voice_leading(chords: &[ChordLabel]) -> Vec<VoiceLeadingStep> {
    chords
        .windows(2)
        .map(|pair| voice_leading_step(&pair[0], &pair[1]))
        .collect()
}

pub fn voice_leading_step(from: &ChordLabel, to: &ChordLabel) -> VoiceLeadingStep {
    let movements: Vec<i16> = from
        .pitches
        .iter()
        .filter_map(|&p| {
            to.pitches
                .iter()
                .map(|&q| q as i16 - p as i16)
                .min_by_key(|m| m.abs())
        })
        .collect();

    let mut shared: Vec<u8> = from
        .pitches
        .iter()
        .copied()
        .filter(|p| to.pitches.contains(p))
        .collect();
    shared.dedup();

    VoiceLeadingStep {
        from_chord: from.symbol.clone(),
        to_chord: to.symbol.clone(),
        common_tones: shared.len(),
        smooth: movements.iter().all(|m| m.abs() <= SMOOTH_STEP),
        movements,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chords::identify_chord;
    use crate::segment::ChordCluster;
    use midi_analysis::NoteEvent;

    fn chord(pitches: &[u8]) -> ChordLabel {
        let notes: Vec<NoteEvent> = pitches
            .iter()
            .map(|&p| NoteEvent::new(p, 0.0, 1.0, 80, 0, 0))
            .collect();
        identify_chord(&ChordCluster { notes: &notes })
    }

    #[test]
    fn two_five_voicings_move_smoothly() {
        // Dm7 (D F A C) to G7 (D F G B)
        let steps = analyze_voice_leading(&[chord(&[62, 65, 69, 72]), chord(&[62, 65, 67, 71])]);
        assert_eq!(steps.len(), 1);

        let step = &steps[0];
        assert_eq!(step.from_chord, "Dm7");
        assert_eq!(step.to_chord, "G7/D");
        assert_eq!(step.common_tones, 2);
        assert_eq!(step.movements, vec![0, 0, -2, -1]);
        assert!(step.smooth);
    }

    #[test]
    fn leaps_are_not_smooth() {
        let step = voice_leading_step(&chord(&[60, 64, 67]), &chord(&[66, 70, 73]));
        assert_eq!(step.common_tones, 0);
        assert!(!step.smooth);
    }

    #[test]
    fn ties_resolve_downward() {
        // 64 sits between 62 and 66
        let step = voice_leading_step(&chord(&[60, 64, 67]), &chord(&[62, 66, 69]));
        assert_eq!(step.movements, vec![2, -2, -1]);
    }

    #[test]
    fn fewer_than_two_chords() {
        assert!(analyze_voice_leading(&[]).is_empty());
        assert!(analyze_voice_leading(&[chord(&[60, 64, 67])]).is_empty());
    }
}
