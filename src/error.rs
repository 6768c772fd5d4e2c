// Error types for the assembly/pairing pipeline

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors raised by the pipeline components.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    /// A point arrived earlier than the latest point already accepted.
    ///
    /// This is a contract violation by the caller; the component state is left
    /// untouched and the point is not processed.
    #[error("point for '{key}' at {time} precedes latest accepted time {latest}")]
    OutOfOrder {
        key: String,
        time: DateTime<Utc>,
        latest: DateTime<Utc>,
    },

    /// The lane's bounded input queue is full; a flush has been requested.
    #[error("lane '{lane}' input queue is full")]
    QueueFull { lane: String },

    /// The lane task has finished and no longer accepts points.
    #[error("lane '{lane}' is closed")]
    LaneClosed { lane: String },

    /// A track was built from zero points.
    #[error("a track needs at least one point")]
    EmptyTrack,

    /// A track was built from points carrying different identity keys.
    #[error("track for '{expected}' contains a point keyed '{found}'")]
    MixedKeys { expected: String, found: String },

    /// A track was built from points that are not in time order.
    #[error("track for '{key}' is not in time order")]
    UnsortedTrack { key: String },
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// A duration that must be positive was zero.
    #[error("{name} must be greater than zero")]
    ZeroDuration { name: &'static str },

    /// A numeric parameter was negative, NaN or infinite.
    #[error("{name} must be finite and non-negative (got {value})")]
    InvalidNumber { name: &'static str, value: f64 },
}

/// Result alias used by the pipeline components.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors reading one input record.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("invalid record: {0}")]
    Json(#[from] serde_json::Error),

    #[error("timestamp {0} is out of range")]
    BadTimestamp(f64),
}
