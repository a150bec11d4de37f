//! Engine tuning shared by the planner and front-ends

use std::time::Duration;

use serde::{Deserialize, Serialize};
use steel_core::{AccessTier, SearchOptions, TransitionWeights};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub max_per_fret: usize,
    pub tier: AccessTier,
    pub collapse_unisons: bool,
    pub weights: TransitionWeights,
    pub cache: CacheConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_per_fret: 3,
            tier: AccessTier::Full,
            collapse_unisons: false,
            weights: TransitionWeights::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn search_options(&self) -> SearchOptions {
        SearchOptions::new(self.max_per_fret, self.tier).with_unison_collapse(self.collapse_unisons)
    }
}

/// Limits for the optional cleanup pass. Nothing expires when unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub max_entries: Option<usize>,
    pub max_age_secs: Option<u64>,
}

impl CacheConfig {
    pub fn max_age(&self) -> Option<Duration> {
        self.max_age_secs.map(Duration::from_secs)
    }
}
