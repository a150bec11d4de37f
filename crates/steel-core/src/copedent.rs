//! Copedent model: strings, pedals, knee levers, mechanisms and splits

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::note::{Pitch, PitchClass};

/// Per-string semitone changes, keyed by string id
pub type ChangeMap = BTreeMap<u8, i8>;

/// A string with its open pitch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SteelString {
    pub id: u8,
    pub open: Pitch,
}

/// A foot pedal. Pedals numbered consecutively (P1, P2) are adjacent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pedal {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub changes: ChangeMap,
}

impl Pedal {
    /// Trailing number of the id ("P3" -> 3)
    pub fn number(&self) -> Option<u32> {
        let digits: String = self
            .id
            .chars()
            .rev()
            .take_while(|c| c.is_ascii_digit())
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        digits.parse().ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Knee {
    Left,
    Right,
}

/// Direction a knee moves to engage a lever
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeverDirection {
    Left,
    Right,
    Vertical,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KneeLever {
    pub id: String,
    pub name: String,
    pub knee: Knee,
    pub direction: LeverDirection,
    #[serde(default)]
    pub changes: ChangeMap,
    /// Levers can be disconnected without removing them from the copedent
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Auxiliary control that may only combine with the listed controls
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mechanism {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub changes: ChangeMap,
    #[serde(default)]
    pub compatible_with: BTreeSet<String>,
}

impl Mechanism {
    pub fn allows(&self, control_id: &str) -> bool {
        self.compatible_with.contains(control_id)
    }
}

/// How a declared split resolves a string hit by several controls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "lowercase")]
pub enum SplitResolution {
    /// Play the string with a hand-tuned net change
    Include { net_change: i8 },
    /// Mute the string
    Exclude,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Split {
    pub string_id: u8,
    pub controls: BTreeSet<String>,
    pub resolution: SplitResolution,
}

// ============================================================================
// Copedent
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Copedent {
    pub id: String,
    pub name: String,
    pub strings: Vec<SteelString>,
    #[serde(default)]
    pub pedals: Vec<Pedal>,
    #[serde(default)]
    pub levers: Vec<KneeLever>,
    #[serde(default)]
    pub mechanisms: Vec<Mechanism>,
    #[serde(default)]
    pub splits: Vec<Split>,
}

impl Copedent {
    pub fn string(&self, id: u8) -> Option<&SteelString> {
        self.strings.iter().find(|s| s.id == id)
    }

    pub fn string_ids(&self) -> Vec<u8> {
        self.strings.iter().map(|s| s.id).collect()
    }

    pub fn pedal(&self, id: &str) -> Option<&Pedal> {
        self.pedals.iter().find(|p| p.id == id)
    }

    pub fn lever(&self, id: &str) -> Option<&KneeLever> {
        self.levers.iter().find(|l| l.id == id)
    }

    pub fn mechanism(&self, id: &str) -> Option<&Mechanism> {
        self.mechanisms.iter().find(|m| m.id == id)
    }

    /// Change map of any control by id
    pub fn changes_for(&self, control_id: &str) -> Option<&ChangeMap> {
        self.pedal(control_id)
            .map(|p| &p.changes)
            .or_else(|| self.lever(control_id).map(|l| &l.changes))
            .or_else(|| self.mechanism(control_id).map(|m| &m.changes))
    }

    /// Semitone change a control applies to a string (None if untouched)
    pub fn change(&self, control_id: &str, string_id: u8) -> Option<i8> {
        self.changes_for(control_id)
            .and_then(|c| c.get(&string_id).copied())
            .filter(|&delta| delta != 0)
    }

    /// Declared split for exactly this set of conflicting controls
    pub fn find_split(&self, string_id: u8, controls: &BTreeSet<String>) -> Option<&Split> {
        self.splits
            .iter()
            .find(|s| s.string_id == string_id && &s.controls == controls)
    }

    fn all_control_ids(&self) -> impl Iterator<Item = &str> {
        self.pedals
            .iter()
            .map(|p| p.id.as_str())
            .chain(self.levers.iter().map(|l| l.id.as_str()))
            .chain(self.mechanisms.iter().map(|m| m.id.as_str()))
    }

    /// Report inconsistent configuration. Searches never fail on these:
    /// inconsistent entries simply never match.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        let mut seen_strings = HashSet::new();
        for s in &self.strings {
            if !seen_strings.insert(s.id) {
                problems.push(format!("duplicate string id {}", s.id));
            }
        }

        let mut seen_controls = HashSet::new();
        for id in self.all_control_ids() {
            if !seen_controls.insert(id) {
                problems.push(format!("duplicate control id {id}"));
            }
            if let Some(changes) = self.changes_for(id) {
                for string_id in changes.keys() {
                    if !seen_strings.contains(string_id) {
                        problems.push(format!("control {id} changes unknown string {string_id}"));
                    }
                }
            }
        }

        for pedal in &self.pedals {
            if pedal.number().is_none() {
                problems.push(format!("pedal {} has no number and cannot pair", pedal.id));
            }
        }

        for mechanism in &self.mechanisms {
            for other in &mechanism.compatible_with {
                if !seen_controls.contains(other.as_str()) {
                    problems.push(format!(
                        "mechanism {} lists unknown control {other}",
                        mechanism.id
                    ));
                }
            }
        }

        for split in &self.splits {
            if !seen_strings.contains(&split.string_id) {
                problems.push(format!("split on unknown string {}", split.string_id));
            }
            if split.controls.len() < 2 {
                problems.push(format!(
                    "split on string {} needs at least two controls",
                    split.string_id
                ));
            }
            for control in &split.controls {
                if !seen_controls.contains(control.as_str()) {
                    problems.push(format!(
                        "split on string {} lists unknown control {control}",
                        split.string_id
                    ));
                }
            }
        }

        for problem in &problems {
            warn!(copedent = %self.id, "{}", problem);
        }
        problems
    }

    /// Standard Nashville E9 setup: ten strings, A/B/C pedals and five levers
    pub fn standard_e9() -> Self {
        use PitchClass::*;

        let open = [
            (1, Fs, 4),
            (2, Ds, 4),
            (3, Gs, 4),
            (4, E, 4),
            (5, B, 3),
            (6, Gs, 3),
            (7, Fs, 3),
            (8, E, 3),
            (9, D, 3),
            (10, B, 2),
        ];
        let strings = open
            .into_iter()
            .map(|(id, class, octave)| SteelString { id, open: Pitch::new(class, octave) })
            .collect();

        let pedal = |id: &str, name: &str, changes: &[(u8, i8)]| Pedal {
            id: id.to_string(),
            name: name.to_string(),
            changes: changes.iter().copied().collect(),
        };
        let lever = |id: &str, knee: Knee, direction: LeverDirection, changes: &[(u8, i8)]| KneeLever {
            id: id.to_string(),
            name: id.to_string(),
            knee,
            direction,
            changes: changes.iter().copied().collect(),
            enabled: true,
        };
        let split = |string_id: u8, controls: &[&str], resolution: SplitResolution| Split {
            string_id,
            controls: controls.iter().map(|c| c.to_string()).collect(),
            resolution,
        };

        Self {
            id: "e9-standard".to_string(),
            name: "E9 Nashville".to_string(),
            strings,
            pedals: vec![
                pedal("P1", "A", &[(5, 2), (10, 2)]),
                pedal("P2", "B", &[(3, 1), (6, 1)]),
                pedal("P3", "C", &[(4, 2), (5, 2)]),
            ],
            levers: vec![
                lever("LKL", Knee::Left, LeverDirection::Left, &[(4, 1), (8, 1)]),
                lever("LKR", Knee::Left, LeverDirection::Right, &[(4, -1), (8, -1)]),
                lever("LKV", Knee::Left, LeverDirection::Vertical, &[(5, -1), (10, -1)]),
                lever("RKL", Knee::Right, LeverDirection::Left, &[(1, 2), (7, 2)]),
                lever("RKR", Knee::Right, LeverDirection::Right, &[(2, -1), (9, -1)]),
            ],
            mechanisms: Vec::new(),
            splits: vec![
                split(4, &["P3", "LKR"], SplitResolution::Include { net_change: 1 }),
                split(5, &["P1", "LKV"], SplitResolution::Exclude),
            ],
        }
    }
}
