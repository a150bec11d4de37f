use std::sync::Arc;

use steel_core::{
    AccessTier, Chord, Copedent, Direction, DirectionalHints, Pitch, PitchClass, ProgressionError,
    SearchOptions, SteelString, TransitionWeights, generate_valid_control_combinations, optimizer,
};
use steel_services::{EngineConfig, ProgressionPlanner, VoicingCache};

fn planner() -> ProgressionPlanner {
    ProgressionPlanner::new(Arc::new(VoicingCache::new()), EngineConfig::default())
}

fn chord(spec: &str) -> Chord {
    Chord::parse_spec(spec).unwrap()
}

fn three_string_copedent() -> Copedent {
    Copedent {
        id: "three".to_string(),
        name: "Three strings".to_string(),
        strings: ["E4", "B3", "G#3"]
            .iter()
            .zip(1..)
            .map(|(p, id)| SteelString { id, open: Pitch::parse(p).unwrap() })
            .collect(),
        pedals: Vec::new(),
        levers: Vec::new(),
        mechanisms: Vec::new(),
        splits: Vec::new(),
    }
}

#[test]
fn test_generated_combinations_are_playable() {
    let copedent = Copedent::standard_e9();
    for combo in generate_valid_control_combinations(&copedent) {
        let numbers: Vec<u32> = combo
            .pedals
            .iter()
            .filter_map(|id| copedent.pedal(id).and_then(|p| p.number()))
            .collect();
        if let &[a, b] = numbers.as_slice() {
            assert_eq!(a.abs_diff(b), 1, "{}", combo.label());
        }
        assert!(combo.pedals.len() <= 2);
    }
}

#[test]
fn test_ascending_hint_never_moves_down() {
    let planner = planner();
    let e9 = Copedent::standard_e9();
    let chords = [chord("C:Major Triad"), chord("G:Major Triad")];
    let options = planner.default_options();

    let path = planner
        .optimize_progression(&e9, &chords, None, &DirectionalHints::global(Direction::Ascending), &options)
        .unwrap();
    assert!(path.path[1].fret >= path.path[0].fret);
    assert!(path.total_cost < optimizer::DIRECTION_PENALTY);
}

#[test]
fn test_unvoiceable_step_is_reported() {
    let planner = planner();
    let copedent = three_string_copedent();
    let chords = [chord("C:Major Triad"), chord("C:Dominant 7th")];

    let err = planner
        .optimize_progression(
            &copedent,
            &chords,
            None,
            &DirectionalHints::default(),
            &SearchOptions::default(),
        )
        .unwrap_err();
    assert_eq!(err, ProgressionError::Unvoiceable { step: 1, chord: Some(chords[1]) });
}

#[test]
fn test_two_by_two_optimum() {
    let planner = planner();
    let e9 = Copedent::standard_e9();
    let options = SearchOptions::new(1, AccessTier::Full);
    let pick_two = |c: &Chord| -> Vec<_> {
        planner.candidates_for(&e9, c, None, &options).into_iter().take(2).collect()
    };
    let steps = vec![pick_two(&chord("A:Major Triad")), pick_two(&chord("D:Major Triad"))];
    assert!(steps.iter().all(|s| s.len() == 2));

    let weights = TransitionWeights::default();
    let mut best = f64::INFINITY;
    for a in &steps[0] {
        for b in &steps[1] {
            best = best.min(steel_core::transition_cost(a, b, &weights, Direction::Any));
        }
    }
    let result = optimizer::optimize_path(&steps, &weights, &DirectionalHints::default()).unwrap();
    assert_eq!(result.total_cost, best);
}

#[test]
fn test_cached_results_are_independent() {
    let cache = VoicingCache::new();
    let e9 = Copedent::standard_e9();
    let options = SearchOptions::default();

    let mut first = cache.find_voicings(&e9, PitchClass::G, &[0, 4, 7], &options);
    let expected = first.clone();
    for voicing in &mut first {
        for id in voicing.played_string_ids() {
            voicing.set_played(id, false);
        }
    }
    let second = cache.find_voicings(&e9, PitchClass::G, &[0, 4, 7], &options);
    assert_eq!(second, expected);
    assert_ne!(first, second);

    assert_eq!(cache.invalidate_copedent(&e9.id), 1);
    assert!(cache.is_empty());
}

#[test]
fn test_string_subset_progression() {
    let planner = planner();
    let e9 = Copedent::standard_e9();
    let strings = [3, 4, 5, 6];
    let chords = [chord("E:Major Triad"), chord("A:Major Triad")];

    let result = planner
        .optimize_progression(
            &e9,
            &chords,
            Some(&strings),
            &DirectionalHints::default(),
            &planner.default_options(),
        )
        .unwrap();
    for voicing in &result.path {
        assert!(voicing.played_string_ids().iter().all(|id| strings.contains(id)));
    }
    // A chord on the same fret with the A and B pedals beats a five-fret move
    assert_eq!(result.path[0].fret, result.path[1].fret);
}
