use std::cmp::Reverse;

use crate::types::ChordQuality;

/// A chord template: quality enum + interval set from root (as bitmask over 12 pitch classes).
pub struct ChordTemplate {
    pub quality: ChordQuality,
    pub intervals: u16, // bitmask: bit i set means interval i is in the template
    pub size: usize,
}

impl ChordTemplate {
    const fn new(quality: ChordQuality, intervals: &[u8]) -> Self {
        let mut mask = 0u16;
        let mut i = 0;
        while i < intervals.len() {
            mask |= 1 << intervals[i];
            i += 1;
        }
        Self {
            quality,
            intervals: mask,
            size: intervals.len(),
        }
    }
}

/// All recognized chord templates in tie-break priority order.
///
/// Coverage decides first (a complete 9th beats the 7th inside it); this
/// order only separates candidates that cover the same number of tones.
pub static TEMPLATES: &[ChordTemplate] = &[
    // Sevenths and sixths
    ChordTemplate::new(ChordQuality::Dominant7, &[0, 4, 7, 10]),
    ChordTemplate::new(ChordQuality::Major7, &[0, 4, 7, 11]),
    ChordTemplate::new(ChordQuality::Minor7, &[0, 3, 7, 10]),
    ChordTemplate::new(ChordQuality::HalfDiminished7, &[0, 3, 6, 10]),
    ChordTemplate::new(ChordQuality::Diminished7, &[0, 3, 6, 9]),
    ChordTemplate::new(ChordQuality::MinorMajor7, &[0, 3, 7, 11]),
    ChordTemplate::new(ChordQuality::Major6, &[0, 4, 7, 9]),
    ChordTemplate::new(ChordQuality::Minor6, &[0, 3, 7, 9]),
    // Extensions
    ChordTemplate::new(ChordQuality::Dominant9, &[0, 2, 4, 7, 10]),
    ChordTemplate::new(ChordQuality::Major9, &[0, 2, 4, 7, 11]),
    ChordTemplate::new(ChordQuality::Minor9, &[0, 2, 3, 7, 10]),
    ChordTemplate::new(ChordQuality::Dominant13, &[0, 2, 4, 7, 9, 10]),
    // Altered dominants
    ChordTemplate::new(ChordQuality::Dominant7Flat9, &[0, 1, 4, 7, 10]),
    ChordTemplate::new(ChordQuality::Dominant7Sharp9, &[0, 3, 4, 7, 10]),
    ChordTemplate::new(ChordQuality::Dominant7Flat5, &[0, 4, 6, 10]),
    ChordTemplate::new(ChordQuality::Dominant7Sharp5, &[0, 4, 8, 10]),
    // Triads
    ChordTemplate::new(ChordQuality::Major, &[0, 4, 7]),
    ChordTemplate::new(ChordQuality::Minor, &[0, 3, 7]),
    ChordTemplate::new(ChordQuality::Diminished, &[0, 3, 6]),
    ChordTemplate::new(ChordQuality::Augmented, &[0, 4, 8]),
    ChordTemplate::new(ChordQuality::Suspended4, &[0, 5, 7]),
    ChordTemplate::new(ChordQuality::Suspended2, &[0, 2, 7]),
];

/// Chord and key roots, spelled the way lead sheets usually spell them.
const ROOT_NAMES: [&str; 12] = [
    "C", "Db", "D", "Eb", "E", "F", "F#", "G", "Ab", "A", "Bb", "B",
];

pub fn root_name(pitch_class: u8) -> &'static str {
    ROOT_NAMES[(pitch_class % 12) as usize]
}

/// Convert a set of pitch classes to an interval bitmask relative to a root.
pub fn to_interval_mask(pitch_classes: &[u8], root: u8) -> u16 {
    let mut mask = 0u16;
    for &pc in pitch_classes {
        let interval = (pc % 12 + 12 - root) % 12;
        mask |= 1 << interval;
    }
    mask
}

/// Best template found for a pitch-class set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemplateMatch {
    pub root: u8,
    pub quality: ChordQuality,
    /// Template tones present in the observed set.
    pub covered: usize,
    /// Every template tone is present.
    pub complete: bool,
}

/// Match a set of pitch classes against chord templates.
///
/// Tries all 12 roots against every template. A template is a candidate when
/// all of its tones are present, or all but one (and at least two). Ranking:
/// complete over partial, then more covered tones, then root equal to `bass`,
/// then template order, then the lowest root.
pub fn match_chord(pitch_classes: &[u8], bass: u8) -> Option<TemplateMatch> {
    let mut best: Option<(TemplateMatch, (bool, usize, bool, Reverse<usize>))> = None;

    for root in 0..12u8 {
        let intervals = to_interval_mask(pitch_classes, root);

        for (priority, template) in TEMPLATES.iter().enumerate() {
            let covered = (intervals & template.intervals).count_ones() as usize;
            let complete = covered == template.size;
            if !complete && (covered + 1 < template.size || covered < 2) {
                continue;
            }

            let rank = (complete, covered, bass % 12 == root, Reverse(priority));
            if best.as_ref().is_none_or(|(_, best_rank)| rank > *best_rank) {
                best = Some((
                    TemplateMatch {
                        root,
                        quality: template.quality,
                        covered,
                        complete,
                    },
                    rank,
                ));
            }
        }
    }

    best.map(|(found, _)| found)
}
