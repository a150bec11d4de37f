//! Voice-leading optimizer: shortest path through per-chord voicing
//! candidates (Viterbi over a layered graph)

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::chord::Chord;
use crate::voicing::Voicing;

/// Multiplier on the fret term for a move against the requested direction.
/// Large enough that any compliant path wins.
pub const DIRECTION_PENALTY: f64 = 1_000_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionWeights {
    pub fret: f64,
    pub control: f64,
    pub voice_leading: f64,
}

impl Default for TransitionWeights {
    fn default() -> Self {
        Self {
            fret: 10.0,
            control: 5.0,
            voice_leading: 1.5,
        }
    }
}

/// Preferred bar movement between consecutive chords
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Any,
    Ascending,
    Descending,
    /// Stay on the same fret
    Minimal,
}

impl Direction {
    fn violated_by(self, fret_move: i32) -> bool {
        match self {
            Self::Any => false,
            Self::Ascending => fret_move < 0,
            Self::Descending => fret_move > 0,
            Self::Minimal => fret_move != 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectionalHints {
    #[serde(default)]
    pub global: Direction,
    /// Overrides for the move into a given step
    #[serde(default)]
    pub per_step: BTreeMap<usize, Direction>,
}

impl DirectionalHints {
    pub fn global(direction: Direction) -> Self {
        Self {
            global: direction,
            per_step: BTreeMap::new(),
        }
    }

    /// Direction for the transition from step `to_step - 1` into `to_step`
    pub fn for_transition(&self, to_step: usize) -> Direction {
        self.per_step.get(&to_step).copied().unwrap_or(self.global)
    }
}

/// Cost of moving from voicing `a` to voicing `b`
pub fn transition_cost(a: &Voicing, b: &Voicing, weights: &TransitionWeights, direction: Direction) -> f64 {
    let fret_move = b.fret as i32 - a.fret as i32;
    let penalty = if direction.violated_by(fret_move) { DIRECTION_PENALTY } else { 1.0 };
    let fret_cost = fret_move.unsigned_abs() as f64 * weights.fret * penalty;

    let controls_a = a.controls.id_set();
    let controls_b = b.controls.id_set();
    let control_cost = controls_a.symmetric_difference(&controls_b).count() as f64 * weights.control;

    let movement: i32 = a
        .played_notes()
        .filter_map(|na| {
            let nb = b.note(na.string_id).filter(|n| n.played)?;
            Some(na.pitch?.semitones_to(nb.pitch?).abs())
        })
        .sum();

    fret_cost + control_cost + movement as f64 * weights.voice_leading
}

/// Total transition cost along a chosen path
pub fn path_cost(path: &[Voicing], weights: &TransitionWeights, hints: &DirectionalHints) -> f64 {
    path.windows(2)
        .enumerate()
        .map(|(i, w)| transition_cost(&w[0], &w[1], weights, hints.for_transition(i + 1)))
        .sum()
}

// ============================================================================
// Path search
// ============================================================================

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProgressionError {
    #[error("No voicing found for step {step}")]
    Unvoiceable { step: usize, chord: Option<Chord> },
    #[error("No path through the progression")]
    NoPath,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizedPath {
    pub path: Vec<Voicing>,
    /// Index into each step's candidate list
    pub choices: Vec<usize>,
    pub total_cost: f64,
}

/// Choose one voicing per step minimising the summed transition cost
pub fn optimize_path(
    candidates: &[Vec<Voicing>],
    weights: &TransitionWeights,
    hints: &DirectionalHints,
) -> Result<OptimizedPath, ProgressionError> {
    if let Some(step) = candidates.iter().position(Vec::is_empty) {
        return Err(ProgressionError::Unvoiceable { step, chord: None });
    }
    if candidates.is_empty() {
        return Ok(OptimizedPath { path: Vec::new(), choices: Vec::new(), total_cost: 0.0 });
    }

    let mut cost: Vec<Vec<f64>> = vec![vec![0.0; candidates[0].len()]];
    let mut back: Vec<Vec<usize>> = vec![vec![0; candidates[0].len()]];

    for step in 1..candidates.len() {
        let direction = hints.for_transition(step);
        let prev_cost = &cost[step - 1];
        let mut layer_cost = Vec::with_capacity(candidates[step].len());
        let mut layer_back = Vec::with_capacity(candidates[step].len());

        for to in &candidates[step] {
            let (best_k, best) = candidates[step - 1]
                .iter()
                .enumerate()
                .map(|(k, from)| (k, prev_cost[k] + transition_cost(from, to, weights, direction)))
                .fold((0, f64::INFINITY), |acc, (k, c)| if c < acc.1 { (k, c) } else { acc });
            layer_cost.push(best);
            layer_back.push(best_k);
        }
        cost.push(layer_cost);
        back.push(layer_back);
    }

    let last = cost.len() - 1;
    let (mut idx, total_cost) = cost[last]
        .iter()
        .copied()
        .enumerate()
        .fold((usize::MAX, f64::INFINITY), |acc, (j, c)| if c < acc.1 { (j, c) } else { acc });
    if idx == usize::MAX {
        return Err(ProgressionError::NoPath);
    }

    let mut choices = vec![0; candidates.len()];
    for step in (0..candidates.len()).rev() {
        choices[step] = idx;
        idx = back[step][idx];
    }

    let path = choices
        .iter()
        .enumerate()
        .map(|(step, &j)| candidates[step][j].clone())
        .collect();

    debug!(steps = candidates.len(), total_cost, "Progression optimized");
    Ok(OptimizedPath { path, choices, total_cost })
}

/// A candidate voicing with its cost against fixed neighbours
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredVoicing {
    pub voicing: Voicing,
    pub cost: f64,
}

/// Rank replacements for one step, given the voicings chosen before and
/// after it. The rest of the path is left untouched.
pub fn rank_alternatives(
    candidates: Vec<Voicing>,
    step: usize,
    prev: Option<&Voicing>,
    next: Option<&Voicing>,
    weights: &TransitionWeights,
    hints: &DirectionalHints,
) -> Vec<ScoredVoicing> {
    let mut scored: Vec<ScoredVoicing> = candidates
        .into_iter()
        .map(|voicing| {
            let cost_in = prev.map_or(0.0, |p| {
                transition_cost(p, &voicing, weights, hints.for_transition(step))
            });
            let cost_out = next.map_or(0.0, |n| {
                transition_cost(&voicing, n, weights, hints.for_transition(step + 1))
            });
            ScoredVoicing { voicing, cost: cost_in + cost_out }
        })
        .collect();

    scored.sort_by(|a, b| a.cost.total_cmp(&b.cost));
    let mut seen = BTreeSet::new();
    scored.retain(|s| seen.insert((s.voicing.fret, s.voicing.signature())));
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combinations::ControlCombination;
    use crate::note::Pitch;
    use crate::voicing::VoicingNote;

    fn voicing(fret: u8, controls: &[&str], pitches: &[(u8, &str)]) -> Voicing {
        let notes = pitches
            .iter()
            .map(|&(string_id, p)| VoicingNote {
                string_id,
                pitch: Some(Pitch::parse(p).unwrap()),
                interval: Some(0),
                is_chord_tone: true,
                played: true,
                active_controls: Vec::new(),
            })
            .collect();
        Voicing::new(fret, ControlCombination::new(controls, &[], &[]), notes)
    }

    #[test]
    fn test_transition_cost_terms() {
        let a = voicing(3, &["P1"], &[(4, "G4"), (5, "E4")]);
        let b = voicing(5, &["P2"], &[(4, "A4"), (5, "E4"), (6, "C4")]);
        let weights = TransitionWeights::default();
        // 2 frets * 10 + 2 controls * 5 + 2 semitones * 1.5
        assert_eq!(transition_cost(&a, &b, &weights, Direction::Any), 33.0);
        let backwards = transition_cost(&b, &a, &weights, Direction::Ascending);
        assert_eq!(backwards, 2.0 * 10.0 * DIRECTION_PENALTY + 10.0 + 3.0);
        assert_eq!(transition_cost(&a, &a, &weights, Direction::Minimal), 0.0);
    }

    #[test]
    fn test_unplayed_strings_do_not_count() {
        let a = voicing(0, &[], &[(4, "E4"), (5, "B3")]);
        let mut b = voicing(0, &[], &[(4, "F4"), (5, "C4")]);
        b.set_played(5, false);
        assert_eq!(transition_cost(&a, &b, &TransitionWeights::default(), Direction::Any), 1.5);
    }

    #[test]
    fn test_two_step_optimum_matches_brute_force() {
        let step0 = vec![
            voicing(3, &[], &[(4, "G4"), (5, "D4")]),
            voicing(8, &["P1"], &[(4, "C5"), (5, "A4")]),
        ];
        let step1 = vec![
            voicing(10, &["P2"], &[(4, "D5"), (5, "A4")]),
            voicing(5, &[], &[(4, "A4"), (5, "E4")]),
        ];
        let weights = TransitionWeights::default();
        let hints = DirectionalHints::default();

        let mut best = f64::INFINITY;
        for a in &step0 {
            for b in &step1 {
                best = best.min(transition_cost(a, b, &weights, Direction::Any));
            }
        }

        let result = optimize_path(&[step0, step1], &weights, &hints).unwrap();
        assert_eq!(result.total_cost, best);
        assert_eq!(path_cost(&result.path, &weights, &hints), best);
    }

    #[test]
    fn test_three_step_path_and_backtracking() {
        let layers = vec![
            vec![voicing(0, &[], &[(1, "E4")]), voicing(7, &[], &[(1, "B4")])],
            vec![voicing(2, &[], &[(1, "F#4")]), voicing(7, &[], &[(1, "B4")])],
            vec![voicing(7, &[], &[(1, "B4")]), voicing(1, &[], &[(1, "F4")])],
        ];
        let result = optimize_path(&layers, &TransitionWeights::default(), &DirectionalHints::default()).unwrap();
        assert_eq!(result.choices, vec![1, 1, 0]);
        assert_eq!(result.total_cost, 0.0);
        assert_eq!(result.path.len(), 3);
    }

    #[test]
    fn test_direction_hint_is_absolute() {
        let layers = vec![
            vec![voicing(8, &[], &[(4, "C5")])],
            vec![voicing(3, &[], &[(4, "G4")]), voicing(10, &["P1", "P2"], &[(4, "D5")])],
        ];
        let weights = TransitionWeights::default();
        let free = optimize_path(&layers, &weights, &DirectionalHints::default()).unwrap();
        assert_eq!(free.path[1].fret, 10);

        let descending = optimize_path(&layers, &weights, &DirectionalHints::global(Direction::Descending)).unwrap();
        assert_eq!(descending.path[1].fret, 3);

        let mut hints = DirectionalHints::global(Direction::Descending);
        hints.per_step.insert(1, Direction::Ascending);
        let overridden = optimize_path(&layers, &weights, &hints).unwrap();
        assert_eq!(overridden.path[1].fret, 10);
    }

    #[test]
    fn test_empty_step_reports_index() {
        let layers = vec![vec![voicing(0, &[], &[(1, "E4")])], Vec::new()];
        let err = optimize_path(&layers, &TransitionWeights::default(), &DirectionalHints::default()).unwrap_err();
        assert_eq!(err, ProgressionError::Unvoiceable { step: 1, chord: None });
        assert!(optimize_path(&[], &TransitionWeights::default(), &DirectionalHints::default()).unwrap().path.is_empty());
    }

    #[test]
    fn test_rank_alternatives_sums_both_sides() {
        let prev = voicing(3, &[], &[(4, "G4")]);
        let next = voicing(5, &[], &[(4, "A4")]);
        let options = vec![
            voicing(10, &[], &[(4, "D5")]),
            voicing(4, &[], &[(4, "G#4")]),
            voicing(4, &[], &[(4, "G#4")]),
        ];
        let ranked = rank_alternatives(
            options,
            1,
            Some(&prev),
            Some(&next),
            &TransitionWeights::default(),
            &DirectionalHints::default(),
        );
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].voicing.fret, 4);
        // in: 10 + 1.5, out: 10 + 1.5
        assert_eq!(ranked[0].cost, 23.0);
        assert!(ranked[0].cost <= ranked[1].cost);
    }
}
