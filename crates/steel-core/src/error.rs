//! Error types for steel-core

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SteelError {
    #[error("Unknown pitch: {0}")]
    UnknownPitch(String),
    #[error("Unknown chord type: {0}")]
    UnknownChordType(String),
    #[error("String not found: {0}")]
    UnknownString(u8),
    #[error("Control not found: {0}")]
    UnknownControl(String),
    #[error("Invalid copedent: {0}")]
    InvalidCopedent(String),
}

pub type Result<T> = std::result::Result<T, SteelError>;
