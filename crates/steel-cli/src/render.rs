//! Plain-text tables for terminal output

use steel_core::chord::degree_label;
use steel_core::{
    Chord, ChordCandidate, Conflict, ControlCombination, OptimizedPath, Pitch, PitchClass,
    ScoredVoicing, Voicing,
};

fn note_name(pitch: Pitch, key: PitchClass) -> String {
    format!("{}{}", pitch.class.spell_in_key(key), pitch.octave)
}

fn voicing_notes(voicing: &Voicing, key: PitchClass) -> String {
    voicing
        .played_notes()
        .filter_map(|n| {
            let pitch = n.pitch?;
            let degree = n.interval.map(degree_label).unwrap_or("?");
            Some(format!("{}:{}({})", n.string_id, note_name(pitch, key), degree))
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn combinations(combos: &[ControlCombination]) -> String {
    let mut lines = vec![format!("{} combinations", combos.len())];
    lines.extend(combos.iter().map(ControlCombination::label));
    lines.join("\n")
}

pub fn conflicts(conflicts: &[Conflict]) -> String {
    if conflicts.is_empty() {
        return "No unresolved conflicts".to_string();
    }
    let mut lines = vec![format!("{:>6}  {}", "string", "controls")];
    for c in conflicts {
        let controls: Vec<&str> = c.controls.iter().map(String::as_str).collect();
        lines.push(format!("{:>6}  {}", c.string_id, controls.join("+")));
    }
    lines.join("\n")
}

pub fn voicings(voicings: &[Voicing], key: PitchClass) -> String {
    if voicings.is_empty() {
        return "No voicings found".to_string();
    }
    let mut lines = vec![format!("{:>4}  {:<16} {}", "fret", "controls", "notes")];
    for v in voicings {
        lines.push(format!("{:>4}  {:<16} {}", v.fret, v.controls.label(), voicing_notes(v, key)));
    }
    lines.join("\n")
}

pub fn candidates(candidates: &[ChordCandidate]) -> String {
    if candidates.is_empty() {
        return "No chord identified (need at least three distinct notes)".to_string();
    }
    let mut lines = vec![format!("{:<24} {:<20} {:>7}", "name", "type", "score")];
    for c in candidates {
        lines.push(format!("{:<24} {:<20} {:>7.1}", c.display_name, c.chord_type, c.score));
    }
    lines.join("\n")
}

pub fn path(chords: &[Chord], path: &OptimizedPath) -> String {
    let mut lines = vec![format!("{:>4}  {:<10} {:>4}  {:<16} {}", "step", "chord", "fret", "controls", "notes")];
    for (step, (chord, v)) in chords.iter().zip(&path.path).enumerate() {
        lines.push(format!(
            "{:>4}  {:<10} {:>4}  {:<16} {}",
            step + 1,
            chord.to_string(),
            v.fret,
            v.controls.label(),
            voicing_notes(v, chord.root)
        ));
    }
    lines.push(format!("total cost {:.1}", path.total_cost));
    lines.join("\n")
}

pub fn alternatives(ranked: &[ScoredVoicing], key: PitchClass) -> String {
    let mut lines = vec![format!("{:>8}  {:>4}  {:<16} {}", "cost", "fret", "controls", "notes")];
    for s in ranked {
        lines.push(format!(
            "{:>8.1}  {:>4}  {:<16} {}",
            s.cost,
            s.voicing.fret,
            s.voicing.controls.label(),
            voicing_notes(&s.voicing, key)
        ));
    }
    lines.join("\n")
}
