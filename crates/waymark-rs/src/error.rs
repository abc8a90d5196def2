//! Error types for waymark-rs.
//!
//! Only construction-time contract violations and I/O at the edges (loading
//! transcripts, installing a subscriber) surface as errors. Rendering problems
//! inside a step are recovered locally and never reach the caller.

use thiserror::Error;

/// Result type alias using waymark's [`ContextError`].
pub type Result<T> = std::result::Result<T, ContextError>;

/// Errors surfaced by the context engine and its collaborators.
#[derive(Error, Debug)]
pub enum ContextError {
    /// The visible-history cap must be unset or strictly greater than 5.
    #[error("max_history_items must be None or greater than 5, got {cap}")]
    InvalidHistoryCap { cap: usize },

    /// A history entry cannot carry both an error and a system marker.
    #[error("history entry for step {} cannot have both an error and a system message", step_label(.step))]
    ConflictingEntry { step: Option<u32> },

    /// Model output was not parseable JSON.
    #[error("invalid model output: {0}")]
    InvalidOutput(String),

    /// Model output parsed but did not match the decision schema.
    #[error("model output does not match the expected schema:\n{0}")]
    SchemaViolation(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem error while loading a transcript.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The logging sink could not be installed.
    #[error("logging setup failed: {0}")]
    Logging(String),
}

fn step_label(step: &Option<u32>) -> String {
    step.map_or_else(|| "unknown".to_string(), |s| s.to_string())
}
