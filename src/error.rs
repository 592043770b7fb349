//! Custom error types for the flight log pipeline.
//!
//! This module defines the primary error type, `FlightLogError`, for the entire
//! crate. Using the `thiserror` crate, it provides a centralized and consistent
//! way to handle the different failure modes of the parsing pipeline, from I/O
//! problems to structural violations of the raw log formats.
//!
//! ## Error Hierarchy
//!
//! `FlightLogError` is an enum that consolidates the pipeline's failure modes:
//!
//! - **`UnknownDevice`**: A device state file matches neither known hardware
//!   generation.
//! - **`NoLogsFound`** / **`MultipleChildLogs`** / **`NoProcessedFlightLog`**:
//!   Directory-resolution failures: nothing to parse, an ambiguous candidate
//!   set, or a missing serialized session.
//! - **`RawLogParse`**: Structural violations of the raw line format, such as a
//!   missing section delimiter or a row that fails numeric conversion.
//! - **`HeaderParse`**: A header is present but missing required identity
//!   fields, or channel schema rows are incomplete.
//! - **`ColumnShape`**: A channel's declared schema width disagrees with the
//!   width of its parsed rows; carries both counts plus the approximate elapsed
//!   time of the first offending row for diagnostics.
//! - **`InvalidArgument`**: Caller usage errors (negative trim indices, missing
//!   required files). These are always raised before any file mutation occurs.
//! - **`Processing`**: Failures inside derived-quantity computation, e.g. a
//!   filter function returning a series of the wrong length.
//!
//! All parse failures are non-retryable and surfaced to the caller immediately;
//! the pipeline performs no automatic retries and no partial-result recovery.
//! By using `#[from]`, `FlightLogError` can be seamlessly created from the
//! underlying I/O and serialization error types with the `?` operator.

use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type LogResult<T> = std::result::Result<T, FlightLogError>;

#[derive(Error, Debug)]
#[allow(missing_docs)]
pub enum FlightLogError {
    #[error("Could not identify hardware type from device state")]
    UnknownDevice,

    #[error("Could not locate a device state file in the provided directory")]
    NoDeviceState,

    #[error("No log files found in provided log directory")]
    NoLogsFound,

    #[error("Must specify a base dir with only one child data directory")]
    MultipleChildLogs,

    #[error("Raw log parse error: {0}")]
    RawLogParse(String),

    #[error("Header parse error: {0}")]
    HeaderParse(String),

    #[error(
        "Mismatched row length for channel '{channel}'. \
         First encountered at t~={first_bad_time:.2}: contains: {actual}, expected: {expected}"
    )]
    ColumnShape {
        channel: String,
        expected: usize,
        actual: usize,
        first_bad_time: f64,
    },

    #[error("No processed flight log found: {0}")]
    NoProcessedFlightLog(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Data processing error: {0}")]
    Processing(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
