//! Voicing search: frets x control combinations, filtered, ranked and pruned

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::combinations::{ControlCombination, generate_valid_control_combinations};
use crate::copedent::Copedent;
use crate::note::{Pitch, PitchClass};
use crate::resolver::resolve_all;
use crate::voicing::{Voicing, VoicingNote, largest_gap};

/// Frets searched. Higher positions are octave duplicates.
pub const SEARCH_FRETS: RangeInclusive<u8> = 0..=11;

/// Which part of the engine a caller may use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessTier {
    #[default]
    Full,
    /// No mechanisms, one voicing per fret
    Limited,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchOptions {
    pub max_per_fret: usize,
    pub tier: AccessTier,
    pub collapse_unisons: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            max_per_fret: 3,
            tier: AccessTier::Full,
            collapse_unisons: false,
        }
    }
}

impl SearchOptions {
    pub fn new(max_per_fret: usize, tier: AccessTier) -> Self {
        Self {
            max_per_fret,
            tier,
            ..Default::default()
        }
    }

    pub fn with_unison_collapse(mut self, collapse: bool) -> Self {
        self.collapse_unisons = collapse;
        self
    }

    /// Per-fret limit after the tier cap
    pub fn effective_max(&self) -> usize {
        match self.tier {
            AccessTier::Full => self.max_per_fret,
            AccessTier::Limited => self.max_per_fret.min(1),
        }
    }
}

/// Interval classes a chord needs
pub fn target_set(intervals: &[u8]) -> BTreeSet<u8> {
    intervals.iter().map(|i| i % 12).collect()
}

/// Combinations available to a tier
pub fn combinations_for_tier(copedent: &Copedent, tier: AccessTier) -> Vec<ControlCombination> {
    let combos = generate_valid_control_combinations(copedent);
    match tier {
        AccessTier::Full => combos,
        AccessTier::Limited => combos.into_iter().filter(|c| c.mechanisms.is_empty()).collect(),
    }
}

fn build_notes(
    copedent: &Copedent,
    combo: &ControlCombination,
    root: PitchClass,
    fret: u8,
    targets: &BTreeSet<u8>,
) -> Vec<VoicingNote> {
    resolve_all(copedent, combo, root, fret)
        .into_iter()
        .map(|n| VoicingNote::from_resolved(n, targets))
        .collect()
}

// ============================================================================
// Unison collapse
// ============================================================================

/// Preference class for keeping a string out of a unison group
fn keep_preference(notes: &[VoicingNote], idx: usize) -> u8 {
    let note = &notes[idx];
    if note.active_controls.is_empty() {
        return 1;
    }
    let shared = notes.iter().enumerate().any(|(other, n)| {
        other != idx
            && n.played
            && n.active_controls.iter().any(|c| note.active_controls.contains(c))
    });
    if shared { 0 } else { 2 }
}

/// Silence all but one string of every group of played strings sounding
/// the identical pitch. Keeps, in order of preference: a string whose
/// control is reused by other played strings, an open string, then any
/// other engaged string. Ties go to the smallest resulting gap, then to
/// the higher string id.
pub fn collapse_unisons(notes: &mut [VoicingNote]) {
    let mut groups: BTreeMap<Pitch, Vec<usize>> = BTreeMap::new();
    for (idx, note) in notes.iter().enumerate() {
        if let (true, Some(pitch)) = (note.played, note.pitch) {
            groups.entry(pitch).or_default().push(idx);
        }
    }

    for group in groups.values().filter(|g| g.len() > 1) {
        let keep = group.iter().copied().min_by_key(|&candidate| {
            let remaining: Vec<u8> = notes
                .iter()
                .enumerate()
                .filter(|(idx, n)| n.played && (*idx == candidate || !group.contains(idx)))
                .map(|(_, n)| n.string_id)
                .collect();
            (
                keep_preference(notes, candidate),
                largest_gap(&remaining),
                Reverse(notes[candidate].string_id),
            )
        });

        for &idx in group {
            if Some(idx) != keep {
                notes[idx].played = false;
            }
        }
    }
}

// ============================================================================
// Search
// ============================================================================

/// Rank, superset-filter, dedupe and cap the qualifying voicings of one fret
fn prune_fret(mut candidates: Vec<Voicing>, max: usize) -> Vec<Voicing> {
    candidates.sort_by(|a, b| a.score.rank(&b.score));

    let mut accepted: Vec<(BTreeSet<String>, Voicing)> = Vec::new();
    for voicing in candidates {
        let set = voicing.controls.id_set();
        let dominated = accepted
            .iter()
            .any(|(kept, _)| kept.len() < set.len() && kept.is_subset(&set));
        if !dominated {
            accepted.push((set, voicing));
        }
    }

    let mut seen = BTreeSet::new();
    accepted
        .into_iter()
        .map(|(_, v)| v)
        .filter(|v| seen.insert(v.signature()))
        .take(max)
        .collect()
}

/// Find voicings of the chord built from `intervals` above `root`,
/// at most `max_per_fret` per fret, in fret order.
pub fn find_voicings(
    copedent: &Copedent,
    root: PitchClass,
    intervals: &[u8],
    options: &SearchOptions,
) -> Vec<Voicing> {
    let targets = target_set(intervals);
    if targets.is_empty() {
        return Vec::new();
    }
    let combos = combinations_for_tier(copedent, options.tier);
    let max = options.effective_max();

    let mut results = Vec::new();
    for fret in SEARCH_FRETS {
        let candidates: Vec<Voicing> = combos
            .iter()
            .filter_map(|combo| {
                let mut notes = build_notes(copedent, combo, root, fret, &targets);
                if options.collapse_unisons {
                    collapse_unisons(&mut notes);
                }
                let voicing = Voicing::new(fret, combo.clone(), notes);
                voicing.covers(&targets).then_some(voicing)
            })
            .collect();
        results.extend(prune_fret(candidates, max));
    }

    debug!(
        copedent = %copedent.id,
        root = %root,
        intervals = ?targets,
        combos = combos.len(),
        found = results.len(),
        "Voicing search complete"
    );
    results
}

/// Best single voicing per fret using only the given strings
pub fn find_voicings_on_strings(
    copedent: &Copedent,
    root: PitchClass,
    intervals: &[u8],
    string_ids: &[u8],
    tier: AccessTier,
) -> Vec<Voicing> {
    let targets = target_set(intervals);
    if targets.is_empty() || string_ids.is_empty() {
        return Vec::new();
    }
    let combos = combinations_for_tier(copedent, tier);

    let mut results = Vec::new();
    for fret in SEARCH_FRETS {
        let best = combos
            .iter()
            .filter_map(|combo| {
                let mut notes = build_notes(copedent, combo, root, fret, &targets);
                for note in &mut notes {
                    if !string_ids.contains(&note.string_id) {
                        note.played = false;
                    }
                }
                let voicing = Voicing::new(fret, combo.clone(), notes);
                voicing.covers(&targets).then_some(voicing)
            })
            .reduce(|best, v| if v.score.rank(&best.score).is_lt() { v } else { best });
        results.extend(best);
    }

    debug!(
        copedent = %copedent.id,
        root = %root,
        strings = ?string_ids,
        found = results.len(),
        "String-subset search complete"
    );
    results
}
