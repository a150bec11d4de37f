//! Error types for steel-services

use steel_core::SteelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Copedent parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Core(#[from] SteelError),
}

pub type Result<T> = std::result::Result<T, ServiceError>;
