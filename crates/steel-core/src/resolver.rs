//! Fretted-note resolution: the pitch each string sounds for a fret and
//! a set of engaged controls

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::combinations::ControlCombination;
use crate::copedent::{Copedent, SplitResolution, SteelString};
use crate::note::{Pitch, PitchClass};

/// Result of resolving one string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedNote {
    pub string_id: u8,
    /// None when a split mutes the string
    pub pitch: Option<Pitch>,
    /// Interval class above the chord root
    pub interval: Option<u8>,
    /// Engaged controls that change this string
    pub active_controls: Vec<String>,
    pub muted: bool,
}

/// Resolve a single string.
///
/// One affecting control applies its change directly. Two or more use a
/// declared split for exactly that control set if there is one, and
/// otherwise sum every control's change.
pub fn resolve_string(
    copedent: &Copedent,
    string: &SteelString,
    combo: &ControlCombination,
    root: PitchClass,
    fret: u8,
) -> ResolvedNote {
    let fretted = string.open.transpose(fret as i32);

    let affecting: Vec<(&str, i8)> = combo
        .ids()
        .filter_map(|id| copedent.change(id, string.id).map(|delta| (id, delta)))
        .collect();
    let active_controls: Vec<String> = affecting.iter().map(|(id, _)| id.to_string()).collect();

    let delta = match affecting.as_slice() {
        [] => Some(0),
        [(_, delta)] => Some(*delta as i32),
        _ => {
            let ids: BTreeSet<String> = active_controls.iter().cloned().collect();
            match copedent.find_split(string.id, &ids).map(|s| s.resolution) {
                Some(SplitResolution::Include { net_change }) => Some(net_change as i32),
                Some(SplitResolution::Exclude) => None,
                None => Some(affecting.iter().map(|(_, d)| *d as i32).sum()),
            }
        }
    };

    let pitch = delta.map(|d| fretted.transpose(d));
    ResolvedNote {
        string_id: string.id,
        pitch,
        interval: pitch.map(|p| p.class.interval_from(root)),
        active_controls,
        muted: pitch.is_none(),
    }
}

/// Resolve the requested strings in copedent order. Unknown ids are skipped.
pub fn resolve_fretted_notes(
    string_ids: &[u8],
    copedent: &Copedent,
    combo: &ControlCombination,
    root: PitchClass,
    fret: u8,
) -> Vec<ResolvedNote> {
    copedent
        .strings
        .iter()
        .filter(|s| string_ids.contains(&s.id))
        .map(|s| resolve_string(copedent, s, combo, root, fret))
        .collect()
}

/// Resolve every string on the copedent
pub fn resolve_all(
    copedent: &Copedent,
    combo: &ControlCombination,
    root: PitchClass,
    fret: u8,
) -> Vec<ResolvedNote> {
    copedent
        .strings
        .iter()
        .map(|s| resolve_string(copedent, s, combo, root, fret))
        .collect()
}
