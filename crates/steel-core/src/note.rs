//! Pitch model: pitch classes, octaves, enharmonic parsing and spelling

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SteelError};

// ============================================================================
// Pitch Class
// ============================================================================

/// One of the twelve chromatic pitch classes, stored with sharp spelling
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PitchClass {
    C,
    Cs,
    D,
    Ds,
    E,
    F,
    Fs,
    G,
    Gs,
    A,
    As,
    B,
}

impl PitchClass {
    pub const ALL: [PitchClass; 12] = [
        Self::C,
        Self::Cs,
        Self::D,
        Self::Ds,
        Self::E,
        Self::F,
        Self::Fs,
        Self::G,
        Self::Gs,
        Self::A,
        Self::As,
        Self::B,
    ];

    /// Semitones above C (0-11)
    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn from_index(index: i32) -> Self {
        Self::ALL[index.rem_euclid(12) as usize]
    }

    /// Move by a number of semitones, wrapping around the octave
    pub fn transpose(self, semitones: i32) -> Self {
        Self::from_index(self.index() as i32 + semitones)
    }

    /// Interval class of `self` above `root` (0-11)
    pub fn interval_from(self, root: PitchClass) -> u8 {
        (self.index() as i32 - root.index() as i32).rem_euclid(12) as u8
    }

    /// Internal sharp spelling
    pub fn sharp_name(self) -> &'static str {
        match self {
            Self::C => "C",
            Self::Cs => "C#",
            Self::D => "D",
            Self::Ds => "D#",
            Self::E => "E",
            Self::F => "F",
            Self::Fs => "F#",
            Self::G => "G",
            Self::Gs => "G#",
            Self::A => "A",
            Self::As => "A#",
            Self::B => "B",
        }
    }

    pub fn flat_name(self) -> &'static str {
        match self {
            Self::Cs => "Db",
            Self::Ds => "Eb",
            Self::Fs => "Gb",
            Self::Gs => "Ab",
            Self::As => "Bb",
            other => other.sharp_name(),
        }
    }

    /// Root spelling with the fewest accidentals in its major key.
    /// F# is kept over Gb (six of each).
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Fs => "F#",
            other => other.flat_name(),
        }
    }

    /// Spell this pitch class inside the major key rooted at `key`
    pub fn spell_in_key(self, key: PitchClass) -> &'static str {
        if key.uses_flats() {
            self.flat_name()
        } else {
            self.sharp_name()
        }
    }

    fn uses_flats(self) -> bool {
        matches!(self, Self::F | Self::As | Self::Ds | Self::Gs | Self::Cs)
    }

    /// Parse a note name without octave. Accepts sharps, flats and
    /// double accidentals ("C#", "Bb", "Fx", "Ebb", "B♭").
    pub fn parse(text: &str) -> Result<Self> {
        let (letter, accidental, rest) = split_name(text)?;
        if !rest.is_empty() {
            return Err(SteelError::UnknownPitch(text.to_string()));
        }
        Ok(Self::from_index(letter + accidental))
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sharp_name())
    }
}

impl TryFrom<String> for PitchClass {
    type Error = SteelError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<PitchClass> for String {
    fn from(value: PitchClass) -> Self {
        value.sharp_name().to_string()
    }
}

/// Split "Bb3" into (letter semitone, accidental offset, remainder)
fn split_name(text: &str) -> Result<(i32, i32, &str)> {
    let text = text.trim();
    let mut chars = text.char_indices();
    let letter = match chars.next().map(|(_, c)| c.to_ascii_uppercase()) {
        Some('C') => 0,
        Some('D') => 2,
        Some('E') => 4,
        Some('F') => 5,
        Some('G') => 7,
        Some('A') => 9,
        Some('B') => 11,
        _ => return Err(SteelError::UnknownPitch(text.to_string())),
    };

    let mut accidental = 0;
    let mut end = text.len();
    for (idx, c) in chars {
        match c {
            '#' | '♯' => accidental += 1,
            'x' | '𝄪' => accidental += 2,
            'b' | '♭' => accidental -= 1,
            _ => {
                end = idx;
                break;
            }
        }
    }

    Ok((letter, accidental, &text[end..]))
}

// ============================================================================
// Pitch
// ============================================================================

/// A pitch class in a specific octave (scientific pitch notation, C4 = MIDI 60)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pitch {
    // Field order gives Ord by height
    pub octave: i8,
    pub class: PitchClass,
}

impl Pitch {
    pub fn new(class: PitchClass, octave: i8) -> Self {
        Self { class, octave }
    }

    pub fn midi(self) -> i32 {
        (self.octave as i32 + 1) * 12 + self.class.index() as i32
    }

    pub fn from_midi(midi: i32) -> Self {
        Self {
            class: PitchClass::from_index(midi),
            octave: (midi.div_euclid(12) - 1) as i8,
        }
    }

    /// `from_midi` that refuses octaves outside `i8`
    fn checked_from_midi(midi: i32) -> Option<Self> {
        let octave = i8::try_from(midi.div_euclid(12) - 1).ok()?;
        Some(Self { class: PitchClass::from_index(midi), octave })
    }

    pub fn transpose(self, semitones: i32) -> Self {
        Self::from_midi(self.midi() + semitones)
    }

    /// Signed semitone distance from `self` up to `other`
    pub fn semitones_to(self, other: Pitch) -> i32 {
        other.midi() - self.midi()
    }

    /// Parse "E4", "Bb3", "Cb4" (= B3), "B#3" (= C4)
    pub fn parse(text: &str) -> Result<Self> {
        let (letter, accidental, rest) = split_name(text)?;
        let unknown = || SteelError::UnknownPitch(text.to_string());
        let octave: i8 = rest.parse().map_err(|_| unknown())?;
        let midi = (octave as i32 + 1) * 12 + letter + accidental;
        Self::checked_from_midi(midi).ok_or_else(unknown)
    }

    /// Display spelling using the major-key-correct root name
    pub fn display_name(self) -> String {
        format!("{}{}", self.class.display_name(), self.octave)
    }
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.class, self.octave)
    }
}

impl TryFrom<String> for Pitch {
    type Error = SteelError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Pitch> for String {
    fn from(value: Pitch) -> Self {
        value.to_string()
    }
}
