//! Error types for the fingerprinting engine.

use thiserror::Error;

/// Errors surfaced by the core engine (spec.md §7).
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("failed to decode audio: {0}")]
    Decode(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("index error: {0}")]
    Index(#[from] rusqlite::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;
