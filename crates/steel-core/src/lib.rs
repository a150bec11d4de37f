//! steel-core: Pedal steel voicing search and voice-leading engine

pub mod chord;
pub mod combinations;
pub mod copedent;
mod error;
pub mod identify;
pub mod note;
pub mod optimizer;
pub mod resolver;
pub mod search;
pub mod voicing;

pub use chord::{filter_intervals, Chord, ChordType, CHORD_TYPES};
pub use combinations::{detect_conflicts, generate_valid_control_combinations, Conflict, ControlCombination};
pub use copedent::{
    Copedent, Knee, KneeLever, LeverDirection, Mechanism, Pedal, Split, SplitResolution, SteelString,
};
pub use error::{Result, SteelError};
pub use identify::{identify_chord, identify_pitches, ChordCandidate};
pub use note::{Pitch, PitchClass};
pub use optimizer::{
    optimize_path, path_cost, rank_alternatives, transition_cost, Direction, DirectionalHints,
    OptimizedPath, ProgressionError, ScoredVoicing, TransitionWeights,
};
pub use resolver::{resolve_fretted_notes, ResolvedNote};
pub use search::{find_voicings, find_voicings_on_strings, AccessTier, SearchOptions};
pub use voicing::{extend_to_upper_octave, Voicing, VoicingNote, VoicingScore};
