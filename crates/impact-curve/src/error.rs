//! Error types for the impact-curve engine.

use chrono::NaiveDate;
use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur while scoring events and building the impact curve.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed or incomplete event record. Recoverable: the event is skipped.
    #[error("Invalid event {id}: {reason}")]
    InvalidEvent {
        /// Event identifier, or a positional placeholder when the id is missing
        id: String,
        /// What failed validation
        reason: String,
    },

    /// Event references a factor code the catalog does not define.
    #[error("Unknown factor code {factor_code} referenced by event {event_id}")]
    UnknownFactor {
        /// Offending event identifier
        event_id: String,
        /// Factor code missing from the catalog
        factor_code: String,
    },

    /// Not enough input to produce a result
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Catalog or engine parameters are missing or invalid
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Market series row that cannot be used
    #[error("Invalid market row {date}: {reason}")]
    InvalidMarketRow {
        /// Trading day of the row
        date: NaiveDate,
        /// What is wrong with it
        reason: String,
    },

    /// JSON decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error while reading a configuration artifact
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars DataFrame error
    #[error("DataFrame error: {0}")]
    Polars(#[from] polars::error::PolarsError),
}

impl EngineError {
    /// Whether the batch may continue after this error.
    ///
    /// Only per-event validation failures are recovered locally; everything
    /// else propagates to the caller unmodified.
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::InvalidEvent { .. })
    }

    pub(crate) fn invalid_event(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidEvent {
            id: id.into(),
            reason: reason.into(),
        }
    }
}
