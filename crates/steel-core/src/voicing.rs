//! Voicing: a fret, the engaged controls, and per-string played state

use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::combinations::ControlCombination;
use crate::note::Pitch;
use crate::resolver::ResolvedNote;

/// One string within a voicing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoicingNote {
    pub string_id: u8,
    pub pitch: Option<Pitch>,
    /// Interval class above the chord root
    pub interval: Option<u8>,
    /// Theoretical chord tone at this position
    pub is_chord_tone: bool,
    /// Currently sounded in this voicing
    pub played: bool,
    pub active_controls: Vec<String>,
}

impl VoicingNote {
    pub fn from_resolved(note: ResolvedNote, targets: &BTreeSet<u8>) -> Self {
        let is_chord_tone = !note.muted && note.interval.is_some_and(|i| targets.contains(&i));
        Self {
            string_id: note.string_id,
            pitch: note.pitch,
            interval: note.interval,
            is_chord_tone,
            played: is_chord_tone,
            active_controls: note.active_controls,
        }
    }
}

/// Ranking data. Longer contiguous runs, then more strings, then fewer
/// controls rank first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoicingScore {
    pub contiguous_run: usize,
    pub played_count: usize,
    pub control_count: usize,
}

impl VoicingScore {
    /// Less means better
    pub fn rank(&self, other: &Self) -> Ordering {
        other
            .contiguous_run
            .cmp(&self.contiguous_run)
            .then(other.played_count.cmp(&self.played_count))
            .then(self.control_count.cmp(&other.control_count))
    }
}

/// Longest run of consecutive string ids
pub fn largest_contiguous_run(string_ids: &[u8]) -> usize {
    let mut ids = string_ids.to_vec();
    ids.sort_unstable();
    ids.dedup();

    let mut best = 0;
    let mut run = 0;
    let mut prev: Option<u8> = None;
    for id in ids {
        run = match prev {
            Some(p) if p + 1 == id => run + 1,
            _ => 1,
        };
        best = best.max(run);
        prev = Some(id);
    }
    best
}

/// Widest distance between neighbouring played string ids
pub fn largest_gap(string_ids: &[u8]) -> u8 {
    let mut ids = string_ids.to_vec();
    ids.sort_unstable();
    ids.windows(2).map(|w| w[1] - w[0]).max().unwrap_or(0)
}

// ============================================================================
// Voicing
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voicing {
    pub fret: u8,
    pub controls: ControlCombination,
    pub notes: Vec<VoicingNote>,
    pub score: VoicingScore,
}

impl Voicing {
    pub fn new(fret: u8, controls: ControlCombination, notes: Vec<VoicingNote>) -> Self {
        let mut voicing = Self {
            fret,
            controls,
            notes,
            score: VoicingScore::default(),
        };
        voicing.rescore();
        voicing
    }

    pub fn played_notes(&self) -> impl Iterator<Item = &VoicingNote> {
        self.notes.iter().filter(|n| n.played && n.pitch.is_some())
    }

    pub fn played_string_ids(&self) -> Vec<u8> {
        self.played_notes().map(|n| n.string_id).collect()
    }

    /// Interval classes currently sounded
    pub fn played_intervals(&self) -> BTreeSet<u8> {
        self.played_notes().filter_map(|n| n.interval).collect()
    }

    /// True when the played notes realise every interval class in `targets`
    pub fn covers(&self, targets: &BTreeSet<u8>) -> bool {
        let played = self.played_intervals();
        !played.is_empty() && targets.is_subset(&played)
    }

    /// Played (string, pitch) pairs, used to spot duplicate voicings
    pub fn signature(&self) -> BTreeSet<(u8, Pitch)> {
        self.played_notes()
            .filter_map(|n| n.pitch.map(|p| (n.string_id, p)))
            .collect()
    }

    pub fn note(&self, string_id: u8) -> Option<&VoicingNote> {
        self.notes.iter().find(|n| n.string_id == string_id)
    }

    /// Toggle a string on or off. Muted strings cannot be played.
    pub fn set_played(&mut self, string_id: u8, played: bool) {
        if let Some(note) = self.notes.iter_mut().find(|n| n.string_id == string_id) {
            note.played = played && note.pitch.is_some();
        }
        self.rescore();
    }

    pub fn rescore(&mut self) {
        let played = self.played_string_ids();
        self.score = VoicingScore {
            contiguous_run: largest_contiguous_run(&played),
            played_count: played.len(),
            control_count: self.controls.len(),
        };
    }

    /// The same shape twelve frets higher
    pub fn octave_up(&self) -> Self {
        let mut up = self.clone();
        up.fret += 12;
        for note in &mut up.notes {
            note.pitch = note.pitch.map(|p| p.transpose(12));
        }
        up
    }
}

/// Append the fret 12-23 duplicates of fret 0-11 results, for display
pub fn extend_to_upper_octave(voicings: &[Voicing]) -> Vec<Voicing> {
    let mut extended = voicings.to_vec();
    extended.extend(voicings.iter().filter(|v| v.fret < 12).map(Voicing::octave_up));
    extended
}
