//! Error types for pupilcourse
//!
//! Errors only arise at the edges (file I/O, CSV framing, configuration).
//! The analysis passes themselves never fail: missing or malformed data on a
//! single trial degrades to unset output fields, never to an aborted run.

use thiserror::Error;

/// Errors that can occur while reading input or writing output
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}
