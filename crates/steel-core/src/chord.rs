//! Chord types and the chord library used for search and identification

use std::collections::BTreeSet;
use std::fmt;

use crate::error::{Result, SteelError};
use crate::note::PitchClass;

// ============================================================================
// Chord Types
// ============================================================================

/// A named chord quality. Intervals are semitones above the root and may
/// exceed the octave for extensions (14 = 9th, 17 = 11th, 21 = 13th).
#[derive(Debug, PartialEq, Eq)]
pub struct ChordType {
    pub name: &'static str,
    pub symbol: &'static str,
    pub intervals: &'static [u8],
}

const fn chord(name: &'static str, symbol: &'static str, intervals: &'static [u8]) -> ChordType {
    ChordType { name, symbol, intervals }
}

pub static CHORD_TYPES: &[ChordType] = &[
    chord("Major Triad", "", &[0, 4, 7]),
    chord("Minor Triad", "m", &[0, 3, 7]),
    chord("Diminished Triad", "dim", &[0, 3, 6]),
    chord("Augmented Triad", "aug", &[0, 4, 8]),
    chord("Sus2", "sus2", &[0, 2, 7]),
    chord("Sus4", "sus4", &[0, 5, 7]),
    chord("Power Chord", "5", &[0, 7]),
    chord("Major 6th", "6", &[0, 4, 7, 9]),
    chord("Minor 6th", "m6", &[0, 3, 7, 9]),
    chord("6/9", "6/9", &[0, 4, 7, 9, 14]),
    chord("Add9", "add9", &[0, 4, 7, 14]),
    chord("Minor Add9", "madd9", &[0, 3, 7, 14]),
    chord("Dominant 7th", "7", &[0, 4, 7, 10]),
    chord("Major 7th", "maj7", &[0, 4, 7, 11]),
    chord("Minor 7th", "m7", &[0, 3, 7, 10]),
    chord("Minor Major 7th", "m(maj7)", &[0, 3, 7, 11]),
    chord("Half-Diminished 7th", "m7b5", &[0, 3, 6, 10]),
    chord("Diminished 7th", "dim7", &[0, 3, 6, 9]),
    chord("7sus4", "7sus4", &[0, 5, 7, 10]),
    chord("Augmented 7th", "7#5", &[0, 4, 8, 10]),
    chord("7b5", "7b5", &[0, 4, 6, 10]),
    chord("Dominant 9th", "9", &[0, 4, 7, 10, 14]),
    chord("Major 9th", "maj9", &[0, 4, 7, 11, 14]),
    chord("Minor 9th", "m9", &[0, 3, 7, 10, 14]),
    chord("7b9", "7b9", &[0, 4, 7, 10, 13]),
    chord("7#9", "7#9", &[0, 4, 7, 10, 15]),
    chord("Dominant 11th", "11", &[0, 4, 7, 10, 14, 17]),
    chord("Minor 11th", "m11", &[0, 3, 7, 10, 14, 17]),
    chord("7#11", "7#11", &[0, 4, 7, 10, 18]),
    chord("Dominant 13th", "13", &[0, 4, 7, 10, 14, 21]),
    chord("Major 13th", "maj13", &[0, 4, 7, 11, 14, 21]),
    chord("Minor 13th", "m13", &[0, 3, 7, 10, 14, 21]),
];

impl ChordType {
    pub fn by_name(name: &str) -> Result<&'static ChordType> {
        CHORD_TYPES
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name) || (!t.symbol.is_empty() && t.symbol == name))
            .ok_or_else(|| SteelError::UnknownChordType(name.to_string()))
    }

    /// Interval classes (mod 12) of this chord
    pub fn pitch_classes(&self) -> BTreeSet<u8> {
        self.intervals.iter().map(|i| i % 12).collect()
    }

    /// The raw third interval (3 or 4), if any
    pub fn third(&self) -> Option<u8> {
        self.intervals.iter().copied().find(|&i| i == 3 || i == 4)
    }

    /// The raw seventh interval. The diminished 7th (9) only counts when
    /// the chord also carries a flat fifth.
    pub fn seventh(&self) -> Option<u8> {
        self.intervals
            .iter()
            .copied()
            .find(|&i| i == 10 || i == 11)
            .or_else(|| {
                (self.intervals.contains(&9) && self.intervals.contains(&6)).then_some(9)
            })
    }

    /// Tensions the name promises: upper extensions plus altered fifths
    /// spelled out in the symbol.
    pub fn defining_tensions(&self) -> Vec<u8> {
        let mut tensions: Vec<u8> = self.intervals.iter().copied().filter(|&i| i >= 12).collect();
        if self.symbol.contains("b5") {
            tensions.push(6);
        }
        if self.symbol.contains("#5") {
            tensions.push(8);
        }
        tensions
    }

    pub fn is_extended(&self) -> bool {
        !self.defining_tensions().is_empty()
    }

    /// Intervals for a simplification retry: drop the perfect fifth, then
    /// the 11th and 9th of large chords.
    pub fn reduced_intervals(&self) -> Vec<u8> {
        let mut reduced = self.intervals.to_vec();
        if reduced.len() > 3 {
            reduced.retain(|&i| i != 7);
        }
        for drop in [17, 14] {
            if reduced.len() > 4 {
                reduced.retain(|&i| i != drop);
            }
        }
        reduced
    }
}

/// Remove every interval whose class is in `drop`
pub fn filter_intervals(intervals: &[u8], drop: &[u8]) -> Vec<u8> {
    let drop: BTreeSet<u8> = drop.iter().map(|i| i % 12).collect();
    intervals
        .iter()
        .copied()
        .filter(|i| !drop.contains(&(i % 12)))
        .collect()
}

/// Degree label for an interval, as used in "no X" qualifiers
pub fn degree_label(interval: u8) -> &'static str {
    match interval {
        0 => "root",
        1 => "b2",
        2 => "2",
        3 | 4 => "3",
        5 => "4",
        6 | 7 | 8 => "5",
        9 => "6",
        10 | 11 => "7",
        13 => "b9",
        14 => "9",
        15 => "#9",
        17 => "11",
        18 => "#11",
        20 => "b13",
        21 => "13",
        _ => "?",
    }
}

// ============================================================================
// Chord
// ============================================================================

/// A root plus chord type, built once at the input boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chord {
    pub root: PitchClass,
    pub chord_type: &'static ChordType,
}

impl Chord {
    pub fn new(root: PitchClass, chord_type: &'static ChordType) -> Self {
        Self { root, chord_type }
    }

    pub fn parse(root: &str, type_name: &str) -> Result<Self> {
        Ok(Self::new(PitchClass::parse(root)?, ChordType::by_name(type_name)?))
    }

    /// Parse "C:Major Triad" or "Bb:m7"
    pub fn parse_spec(spec: &str) -> Result<Self> {
        let (root, type_name) = spec
            .split_once(':')
            .ok_or_else(|| SteelError::UnknownChordType(spec.to_string()))?;
        Self::parse(root, type_name)
    }

    pub fn intervals(&self) -> &'static [u8] {
        self.chord_type.intervals
    }
}

impl fmt::Display for Chord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.root.display_name(), self.chord_type.symbol)
    }
}
