//! Error types for the engagement tracker

use thiserror::Error;

/// Errors surfaced by configuration, parsing and persistence.
///
/// Event handling itself never fails; these only come out of the edges
/// of the crate.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid host event: {0}")]
    InvalidEvent(String),

    #[error("Fallback storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
