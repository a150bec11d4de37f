//! Progression planner: cached candidate search feeding the path optimizer

use std::sync::Arc;

use steel_core::optimizer::{self, OptimizedPath, ProgressionError, ScoredVoicing};
use steel_core::{Chord, Copedent, DirectionalHints, SearchOptions, Voicing};
use tracing::{info, warn};

use crate::cache::VoicingCache;
use crate::config::EngineConfig;

/// Finds candidates per chord through a shared cache and chooses the
/// cheapest voice-leading path through them
pub struct ProgressionPlanner {
    cache: Arc<VoicingCache>,
    config: EngineConfig,
}

impl ProgressionPlanner {
    pub fn new(cache: Arc<VoicingCache>, config: EngineConfig) -> Self {
        Self { cache, config }
    }

    pub fn cache(&self) -> &Arc<VoicingCache> {
        &self.cache
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn default_options(&self) -> SearchOptions {
        self.config.search_options()
    }

    /// Candidate voicings for one chord. With a string subset the search
    /// keeps the single best voicing per fret on those strings.
    pub fn candidates_for(
        &self,
        copedent: &Copedent,
        chord: &Chord,
        strings: Option<&[u8]>,
        options: &SearchOptions,
    ) -> Vec<Voicing> {
        match strings {
            Some(ids) => self.cache.find_voicings_on_strings(
                copedent,
                chord.root,
                chord.intervals(),
                ids,
                options.tier,
            ),
            None => self.cache.find_voicings(copedent, chord.root, chord.intervals(), options),
        }
    }

    /// Voice a whole progression. Fails on the first chord that has no
    /// voicing, naming the step and chord.
    pub fn optimize_progression(
        &self,
        copedent: &Copedent,
        chords: &[Chord],
        strings: Option<&[u8]>,
        hints: &DirectionalHints,
        options: &SearchOptions,
    ) -> Result<OptimizedPath, ProgressionError> {
        let mut candidates = Vec::with_capacity(chords.len());
        for (step, chord) in chords.iter().enumerate() {
            let voicings = self.candidates_for(copedent, chord, strings, options);
            if voicings.is_empty() {
                warn!(step, chord = %chord, copedent = %copedent.id, "No voicing for progression step");
                return Err(ProgressionError::Unvoiceable { step, chord: Some(*chord) });
            }
            candidates.push(voicings);
        }

        let result = optimizer::optimize_path(&candidates, &self.config.weights, hints);
        if let Ok(path) = &result {
            let frets: Vec<u8> = path.path.iter().map(|v| v.fret).collect();
            info!(steps = chords.len(), ?frets, total_cost = path.total_cost, "Progression planned");
        }
        result
    }

    /// Alternatives for one step of an existing path, ranked by their cost
    /// against the neighbouring voicings. The caller's path is not changed.
    #[allow(clippy::too_many_arguments)]
    pub fn rank_alternatives_for_step(
        &self,
        copedent: &Copedent,
        step: usize,
        chord: &Chord,
        prev: Option<&Voicing>,
        next: Option<&Voicing>,
        strings: Option<&[u8]>,
        hints: &DirectionalHints,
        options: &SearchOptions,
    ) -> Vec<ScoredVoicing> {
        let candidates = self.candidates_for(copedent, chord, strings, options);
        optimizer::rank_alternatives(candidates, step, prev, next, &self.config.weights, hints)
    }
}
