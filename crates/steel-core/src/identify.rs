//! Reverse chord lookup: name the chord a set of played strings produces

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::debug;

use crate::chord::{CHORD_TYPES, ChordType, degree_label};
use crate::combinations::ControlCombination;
use crate::copedent::Copedent;
use crate::note::{Pitch, PitchClass};
use crate::resolver::resolve_fretted_notes;

/// Maximum candidates returned
pub const MAX_CANDIDATES: usize = 6;

const BOTH_THIRD_AND_SEVENTH_BONUS: f64 = 30.0;
const ROOT_BONUS: f64 = 15.0;
const MISSING_THIRD_PENALTY: f64 = 25.0;
const MISSING_SEVENTH_PENALTY: f64 = 20.0;
const MISSING_TENSION_PENALTY: f64 = 30.0;
const SIZE_PENALTY: f64 = 2.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChordCandidate {
    pub root: PitchClass,
    pub chord_type: &'static str,
    /// Name adjusted for omitted notes, e.g. "Cadd9 (no 5)"
    pub display_name: String,
    pub score: f64,
    /// Raw intervals of the full chord that are not sounding
    pub missing: Vec<u8>,
}

/// Which chord types a root may still take, judged on the played
/// intervals alone. Both sevenths rule the root out; both thirds leave
/// only types that spell the minor third as a sharp ninth.
fn quality_gate(played: &BTreeSet<u8>) -> Option<fn(&ChordType) -> bool> {
    fn any_type(_: &ChordType) -> bool {
        true
    }
    fn sharp_nine(t: &ChordType) -> bool {
        t.intervals.contains(&15)
    }

    if played.contains(&10) && played.contains(&11) {
        return None;
    }
    if played.contains(&3) && played.contains(&4) {
        return Some(sharp_nine);
    }
    Some(any_type)
}

fn score_candidate(chord_type: &ChordType, played: &BTreeSet<u8>) -> f64 {
    let full = chord_type.pitch_classes();
    let sounding = |raw: u8| played.contains(&(raw % 12));

    let mut score = 100.0 * played.len() as f64 / full.len() as f64;

    let third = chord_type.third();
    let seventh = chord_type.seventh();
    let has_third = third.is_some_and(sounding);
    let has_seventh = seventh.is_some_and(sounding);

    if has_third && has_seventh {
        score += BOTH_THIRD_AND_SEVENTH_BONUS;
    }
    if played.contains(&0) {
        score += ROOT_BONUS;
    }
    if third.is_some() && !has_third {
        score -= MISSING_THIRD_PENALTY;
    }
    if seventh.is_some() && !has_seventh {
        score -= MISSING_SEVENTH_PENALTY;
    }
    if chord_type.defining_tensions().into_iter().any(|t| !sounding(t)) {
        score -= MISSING_TENSION_PENALTY;
    }
    score - SIZE_PENALTY * full.len() as f64
}

/// Triad symbol for a base interval set, falling back on the third
fn triad_symbol(base: &[u8]) -> &'static str {
    CHORD_TYPES
        .iter()
        .filter(|t| t.intervals.len() == 3)
        .find(|t| t.intervals == base)
        .map(|t| t.symbol)
        .unwrap_or(if base.contains(&3) { "m" } else { "" })
}

/// Name a chord given which of its intervals actually sound. A seventh
/// chord missing its seventh becomes its triad with "add" extensions;
/// any remaining gaps are listed as "(no X, no Y)".
pub fn display_name(root: PitchClass, chord_type: &ChordType, played: &BTreeSet<u8>) -> String {
    let sounding = |raw: u8| played.contains(&(raw % 12));

    let (mut name, components): (String, Vec<u8>) = match chord_type.seventh() {
        Some(seventh) if !sounding(seventh) => {
            let base: Vec<u8> = chord_type.intervals.iter().copied().filter(|&i| i < 9).collect();
            let extensions: Vec<u8> = chord_type.intervals.iter().copied().filter(|&i| i >= 12).collect();
            let mut name = format!("{}{}", root.display_name(), triad_symbol(&base));
            for ext in &extensions {
                name.push_str("add");
                name.push_str(degree_label(*ext));
            }
            (name, base.into_iter().chain(extensions).collect())
        }
        _ => (
            format!("{}{}", root.display_name(), chord_type.symbol),
            chord_type.intervals.to_vec(),
        ),
    };

    let gaps: Vec<String> = components
        .into_iter()
        .filter(|&i| !sounding(i))
        .map(|i| format!("no {}", degree_label(i)))
        .collect();
    if !gaps.is_empty() {
        name.push_str(&format!(" ({})", gaps.join(", ")));
    }
    name
}

/// Rank chord interpretations of a set of pitches. Needs at least three
/// distinct pitches.
pub fn identify_pitches(pitches: &[Pitch]) -> Vec<ChordCandidate> {
    let distinct: BTreeSet<Pitch> = pitches.iter().copied().collect();
    if distinct.len() < 3 {
        return Vec::new();
    }
    let classes: BTreeSet<PitchClass> = distinct.iter().map(|p| p.class).collect();

    let mut candidates: Vec<ChordCandidate> = PitchClass::ALL
        .iter()
        .filter_map(|&root| {
            let played: BTreeSet<u8> = classes.iter().map(|c| c.interval_from(root)).collect();
            let admits = quality_gate(&played)?;
            CHORD_TYPES
                .iter()
                .filter(|t| admits(t))
                .filter(|t| played.is_subset(&t.pitch_classes()))
                .map(|t| (t, score_candidate(t, &played)))
                .fold(None, |best: Option<(&ChordType, f64)>, (t, s)| match best {
                    Some((_, b)) if b >= s => best,
                    _ => Some((t, s)),
                })
                .map(|(t, score)| ChordCandidate {
                    root,
                    chord_type: t.name,
                    display_name: display_name(root, t, &played),
                    score,
                    missing: t
                        .intervals
                        .iter()
                        .copied()
                        .filter(|i| !played.contains(&(i % 12)))
                        .collect(),
                })
        })
        .collect();

    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
    candidates.truncate(MAX_CANDIDATES);
    candidates
}

/// Identify the chord sounded by the given strings at a fret with the
/// given controls engaged
pub fn identify_chord(
    copedent: &Copedent,
    fret: u8,
    played_string_ids: &[u8],
    combo: &ControlCombination,
) -> Vec<ChordCandidate> {
    let pitches: Vec<Pitch> = resolve_fretted_notes(played_string_ids, copedent, combo, PitchClass::C, fret)
        .into_iter()
        .filter_map(|n| n.pitch)
        .collect();
    let candidates = identify_pitches(&pitches);
    debug!(
        fret,
        strings = ?played_string_ids,
        controls = %combo.label(),
        candidates = candidates.len(),
        "Chord identification"
    );
    candidates
}
