//! Error types for gammarec-core.

use thiserror::Error;

/// Result type alias for gammarec operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types.
///
/// Everything except [`Error::EventShape`] is raised while building a
/// [`DetectorSetup`](crate::DetectorSetup).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The addback window matrix has the wrong number of rows.
    #[error(
        "detector '{detector}': with {channels} channels the addback coincidence window \
         matrix must have exactly {expected} rows, found {found}"
    )]
    AddbackWindowRows {
        detector: String,
        channels: usize,
        expected: usize,
        found: usize,
    },

    /// One row of the addback window matrix has the wrong number of entries.
    #[error(
        "detector '{detector}': row {row} of the addback coincidence window matrix \
         must have exactly {expected} entries, found {found}"
    )]
    AddbackWindowEntries {
        detector: String,
        row: usize,
        expected: usize,
        found: usize,
    },

    /// A window with `lower > upper` (or a NaN edge).
    #[error("{context}: invalid window [{lower}, {upper}]")]
    InvalidWindow {
        context: String,
        lower: f64,
        upper: f64,
    },

    /// A detector without channels.
    #[error("detector '{0}' has no channels")]
    EmptyDetector(String),

    /// A counter detector whose trigger frequency is not positive.
    #[error(
        "counter detector '{detector}': trigger frequency must be positive, got {frequency}"
    )]
    InvalidTriggerFrequency { detector: String, frequency: f64 },

    /// A detector references a group that does not exist.
    #[error(
        "detector '{detector}' references group {group}, but only {groups} groups are configured"
    )]
    UnknownGroup {
        detector: String,
        group: usize,
        groups: usize,
    },

    /// A coincidence matrix references a detector index that does not exist.
    #[error(
        "coincidence matrix '{matrix}': {axis} detector index {index} is out of range \
         ({detectors} detectors configured)"
    )]
    DetectorIndexOutOfRange {
        matrix: String,
        axis: &'static str,
        index: usize,
        detectors: usize,
    },

    /// A coincidence matrix references a counter detector.
    #[error(
        "coincidence matrix '{matrix}': detector '{detector}' is not energy sensitive"
    )]
    NotEnergySensitive { matrix: String, detector: String },

    /// Invalid group parameter.
    #[error("group '{group}': {message}")]
    InvalidGroup { group: String, message: String },

    /// Calibration inversion failed.
    #[error("calibration inversion: {0}")]
    Inversion(String),

    /// A raw event does not match the setup's channel layout.
    #[error(
        "raw event has {samples} samples and {counts} counter values, \
         setup expects {expected_samples} and {expected_counts}"
    )]
    EventShape {
        samples: usize,
        counts: usize,
        expected_samples: usize,
        expected_counts: usize,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),
}
