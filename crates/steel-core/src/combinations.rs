//! Enumeration of mechanically legal pedal/lever/mechanism combinations

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::copedent::{Copedent, Knee, KneeLever, LeverDirection, Mechanism};

/// One set of simultaneously engaged controls
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ControlCombination {
    pub pedals: Vec<String>,
    pub levers: Vec<String>,
    pub mechanisms: Vec<String>,
}

impl ControlCombination {
    pub fn new(pedals: &[&str], levers: &[&str], mechanisms: &[&str]) -> Self {
        let owned = |ids: &[&str]| ids.iter().map(|id| id.to_string()).collect();
        Self {
            pedals: owned(pedals),
            levers: owned(levers),
            mechanisms: owned(mechanisms),
        }
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.pedals
            .iter()
            .chain(&self.levers)
            .chain(&self.mechanisms)
            .map(String::as_str)
    }

    pub fn id_set(&self) -> BTreeSet<String> {
        self.ids().map(str::to_string).collect()
    }

    /// Number of engaged controls
    pub fn len(&self) -> usize {
        self.pedals.len() + self.levers.len() + self.mechanisms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids().any(|c| c == id)
    }

    /// Human-readable label ("open" for no controls)
    pub fn label(&self) -> String {
        if self.is_empty() {
            "open".to_string()
        } else {
            self.ids().collect::<Vec<_>>().join("+")
        }
    }
}

// ============================================================================
// Generator
// ============================================================================

/// No pedal, each pedal alone, and each pair of adjacent pedals
fn pedal_combinations(copedent: &Copedent) -> Vec<Vec<String>> {
    let mut combos = vec![Vec::new()];
    combos.extend(copedent.pedals.iter().map(|p| vec![p.id.clone()]));

    for (i, a) in copedent.pedals.iter().enumerate() {
        for b in &copedent.pedals[i + 1..] {
            let (Some(na), Some(nb)) = (a.number(), b.number()) else {
                continue;
            };
            if na.abs_diff(nb) == 1 {
                combos.push(vec![a.id.clone(), b.id.clone()]);
            }
        }
    }
    combos
}

/// A knee can only move one way at a time; vertical levers never conflict
fn levers_compatible(levers: &[&KneeLever]) -> bool {
    let mut directions: HashMap<Knee, (bool, bool)> = HashMap::new();
    for lever in levers {
        let entry = directions.entry(lever.knee).or_default();
        match lever.direction {
            LeverDirection::Left => entry.0 = true,
            LeverDirection::Right => entry.1 = true,
            LeverDirection::Vertical => {}
        }
    }
    directions.values().all(|&(left, right)| !(left && right))
}

fn powerset<T: Copy>(items: &[T]) -> Vec<Vec<T>> {
    let mut sets: Vec<Vec<T>> = vec![Vec::new()];
    for &item in items {
        let extended: Vec<Vec<T>> = sets
            .iter()
            .map(|set| {
                let mut next = set.clone();
                next.push(item);
                next
            })
            .collect();
        sets.extend(extended);
    }
    sets
}

fn lever_combinations(copedent: &Copedent) -> Vec<Vec<String>> {
    let active: Vec<&KneeLever> = copedent.levers.iter().filter(|l| l.enabled).collect();
    powerset(&active)
        .into_iter()
        .filter(|set| levers_compatible(set))
        .map(|set| set.iter().map(|l| l.id.clone()).collect())
        .collect()
}

/// Non-empty mechanism sets where every pair lists each other
fn mechanism_combinations(copedent: &Copedent) -> Vec<Vec<&Mechanism>> {
    let all: Vec<&Mechanism> = copedent.mechanisms.iter().collect();
    powerset(&all)
        .into_iter()
        .filter(|set| !set.is_empty())
        .filter(|set| {
            set.iter().enumerate().all(|(i, a)| {
                set[i + 1..]
                    .iter()
                    .all(|b| a.allows(&b.id) && b.allows(&a.id))
            })
        })
        .collect()
}

/// Every combination the voicing search should try. Duplicates in
/// resulting notes are removed later, not here.
pub fn generate_valid_control_combinations(copedent: &Copedent) -> Vec<ControlCombination> {
    let pedal_sets = pedal_combinations(copedent);
    let lever_sets = lever_combinations(copedent);

    let mut base = Vec::with_capacity(pedal_sets.len() * lever_sets.len());
    for pedals in &pedal_sets {
        for levers in &lever_sets {
            base.push(ControlCombination {
                pedals: pedals.clone(),
                levers: levers.clone(),
                mechanisms: Vec::new(),
            });
        }
    }

    let mechanism_sets = mechanism_combinations(copedent);
    let mut combos = base.clone();

    for mechanisms in &mechanism_sets {
        let mechanism_ids: Vec<String> = mechanisms.iter().map(|m| m.id.clone()).collect();

        combos.push(ControlCombination {
            mechanisms: mechanism_ids.clone(),
            ..Default::default()
        });

        for combo in base.iter().filter(|c| !c.is_empty()) {
            let allowed = combo
                .ids()
                .all(|id| mechanisms.iter().all(|m| m.allows(id)));
            if allowed {
                combos.push(ControlCombination {
                    mechanisms: mechanism_ids.clone(),
                    ..combo.clone()
                });
            }
        }
    }

    debug!(
        copedent = %copedent.id,
        base = base.len(),
        mechanism_sets = mechanism_sets.len(),
        total = combos.len(),
        "Generated control combinations"
    );
    combos
}

// ============================================================================
// Conflict detection
// ============================================================================

/// Several controls of one legal combination acting on the same string
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Conflict {
    pub string_id: u8,
    pub controls: BTreeSet<String>,
}

/// Conflicts with no declared split. These fall back to summing deltas at
/// resolve time, so an editor should offer them for resolution.
pub fn detect_conflicts(copedent: &Copedent) -> Vec<Conflict> {
    let mut conflicts = BTreeSet::new();
    for combo in generate_valid_control_combinations(copedent) {
        for string in &copedent.strings {
            let controls: BTreeSet<String> = combo
                .ids()
                .filter(|id| copedent.change(id, string.id).is_some())
                .map(str::to_string)
                .collect();
            if controls.len() >= 2 && copedent.find_split(string.id, &controls).is_none() {
                conflicts.insert(Conflict { string_id: string.id, controls });
            }
        }
    }
    conflicts.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::copedent::{Pedal, SteelString};
    use crate::note::Pitch;

    fn mechanism(id: &str, compatible_with: &[&str]) -> Mechanism {
        Mechanism {
            id: id.to_string(),
            name: id.to_string(),
            changes: [(1, 1)].into_iter().collect(),
            compatible_with: compatible_with.iter().map(|c| c.to_string()).collect(),
        }
    }

    fn with_mechanisms() -> Copedent {
        let mut copedent = Copedent::standard_e9();
        copedent.mechanisms = vec![
            mechanism("M1", &["P1", "M2"]),
            mechanism("M2", &["P1", "M1", "LKL"]),
            mechanism("M3", &["M1"]),
        ];
        copedent
    }

    fn check_legal(copedent: &Copedent, combo: &ControlCombination) {
        let numbers: Vec<u32> = combo
            .pedals
            .iter()
            .filter_map(|id| copedent.pedal(id).and_then(|p| p.number()))
            .collect();
        assert!(numbers.len() <= 2);
        if numbers.len() == 2 {
            assert_eq!(numbers[0].abs_diff(numbers[1]), 1);
        }

        let levers: Vec<&KneeLever> = combo.levers.iter().filter_map(|id| copedent.lever(id)).collect();
        assert!(levers_compatible(&levers), "knee conflict in {}", combo.label());

        for (i, a) in combo.mechanisms.iter().enumerate() {
            let ma = copedent.mechanism(a).unwrap();
            for b in &combo.mechanisms[i + 1..] {
                let mb = copedent.mechanism(b).unwrap();
                assert!(ma.allows(b) && mb.allows(a));
            }
            for id in combo.pedals.iter().chain(&combo.levers) {
                assert!(ma.allows(id));
            }
        }
    }

    #[test]
    fn test_pedal_pairs_are_adjacent() {
        let combos = pedal_combinations(&Copedent::standard_e9());
        // none, three singles, P1+P2, P2+P3
        assert_eq!(combos.len(), 6);
        assert!(!combos.contains(&vec!["P1".to_string(), "P3".to_string()]));
    }

    #[test]
    fn test_lever_knee_direction_rule() {
        let combos = lever_combinations(&Copedent::standard_e9());
        // Left knee: none, LKL, LKR, LKV, LKL+LKV, LKR+LKV = 6
        // Right knee: none, RKL, RKR = 3
        assert_eq!(combos.len(), 18);
        assert!(combos.iter().all(|c| !(c.contains(&"LKL".to_string()) && c.contains(&"LKR".to_string()))));
    }

    #[test]
    fn test_disabled_levers_are_skipped() {
        let mut copedent = Copedent::standard_e9();
        for lever in &mut copedent.levers {
            lever.enabled = lever.knee == Knee::Right;
        }
        assert_eq!(lever_combinations(&copedent).len(), 3);
    }

    #[test]
    fn test_standard_e9_combination_count() {
        let combos = generate_valid_control_combinations(&Copedent::standard_e9());
        assert_eq!(combos.len(), 6 * 18);
        assert!(combos.contains(&ControlCombination::default()));
    }

    #[test]
    fn test_mechanisms_pairwise_and_merge() {
        let copedent = with_mechanisms();
        let combos = generate_valid_control_combinations(&copedent);

        // M3 lists M1 but M1 does not list M3
        assert!(!combos.iter().any(|c| c.contains("M1") && c.contains("M3")));
        assert!(combos.contains(&ControlCombination::new(&[], &[], &["M1", "M2"])));
        assert!(combos.contains(&ControlCombination::new(&["P1"], &[], &["M1", "M2"])));
        assert!(combos.contains(&ControlCombination::new(&[], &["LKL"], &["M2"])));
        assert!(!combos.contains(&ControlCombination::new(&[], &["LKL"], &["M1", "M2"])));

        for combo in &combos {
            check_legal(&copedent, combo);
        }
    }

    #[test]
    fn test_unknown_compatibility_fails_closed() {
        let mut copedent = Copedent::standard_e9();
        copedent.mechanisms = vec![mechanism("M1", &["GHOST"])];
        let combos = generate_valid_control_combinations(&copedent);
        let with_m1: Vec<_> = combos.iter().filter(|c| c.contains("M1")).collect();
        assert_eq!(with_m1.len(), 1);
        assert_eq!(with_m1[0].len(), 1);
    }

    #[test]
    fn test_unnumbered_pedals_do_not_pair() {
        let copedent = Copedent {
            id: "odd".to_string(),
            name: "Odd".to_string(),
            strings: vec![SteelString { id: 1, open: Pitch::parse("E4").unwrap() }],
            pedals: vec![
                Pedal { id: "A".to_string(), name: "A".to_string(), changes: Default::default() },
                Pedal { id: "B".to_string(), name: "B".to_string(), changes: Default::default() },
            ],
            levers: Vec::new(),
            mechanisms: Vec::new(),
            splits: Vec::new(),
        };
        assert_eq!(pedal_combinations(&copedent).len(), 3);
    }

    #[test]
    fn test_detect_conflicts_skips_declared_splits() {
        let conflicts = detect_conflicts(&Copedent::standard_e9());
        let p3_lkr: BTreeSet<String> = ["P3".to_string(), "LKR".to_string()].into_iter().collect();
        assert!(!conflicts.iter().any(|c| c.string_id == 4 && c.controls == p3_lkr));
        let p3_lkl: BTreeSet<String> = ["P3".to_string(), "LKL".to_string()].into_iter().collect();
        assert!(conflicts.iter().any(|c| c.string_id == 4 && c.controls == p3_lkl));
    }
}
