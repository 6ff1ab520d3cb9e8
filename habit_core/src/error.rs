//! Error types for the habit_core library.

use chrono::NaiveDate;
use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for habit_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Progress was logged on a day that is already frozen
    #[error("{0} is a freeze day; remove the freeze before logging progress")]
    FrozenDay(NaiveDate),

    /// Freeze requested on a day that already meets its target
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Monthly freeze allowance used up
    #[error("Freeze quota exceeded: {quota} freezes already used in {month}")]
    QuotaExceeded { month: String, quota: u32 },

    /// Operation not available for this kind of habit
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Malformed input (negative count, zero target, bad date)
    #[error("Validation error: {0}")]
    Validation(String),

    /// No habit matches the given id
    #[error("Habit not found: {0}")]
    NotFound(String),

    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Habit store is unreadable or inconsistent
    #[error("Store error: {0}")]
    Store(String),
}

impl Error {
    /// True for errors caused by the request itself rather than by the
    /// environment (disk, config, corrupted data).
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Error::FrozenDay(_)
                | Error::Conflict(_)
                | Error::QuotaExceeded { .. }
                | Error::UnsupportedOperation(_)
                | Error::Validation(_)
                | Error::NotFound(_)
        )
    }
}
