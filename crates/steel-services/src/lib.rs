//! steel-services: Voicing cache, progression planner and engine config

pub mod cache;
pub mod config;
pub mod copedent_file;
mod error;
pub mod planner;

pub use cache::{CacheKey, CacheStats, SearchMode, VoicingCache};
pub use config::{CacheConfig, EngineConfig};
pub use copedent_file::{load_copedent, parse_copedent, save_copedent};
pub use error::{Result, ServiceError};
pub use planner::ProgressionPlanner;
