use thiserror::Error;

/// Errors returned by the scheduling entry points.
///
/// Unreachable calendars and conflict-free outcomes are not errors: the former
/// degrade to warnings on the decision, the latter are `Outcome` variants.
#[derive(Debug, Error)]
pub enum SchedulingError {
    /// Malformed meeting request; never retried.
    #[error("invalid meeting request: {0}")]
    InvalidRequest(String),

    /// The booking sink permanently refused the booking.
    #[error("booking rejected: {0}")]
    BookingRejected(String),

    /// The caller cancelled the request before a booking was issued.
    #[error("scheduling request cancelled")]
    Cancelled,
}

/// Failure to read a participant's calendar.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    #[error("availability for {participant} unavailable: {reason}")]
    Unavailable { participant: String, reason: String },

    #[error("availability request for {participant} timed out")]
    Timeout { participant: String },

    #[error("malformed availability response: {0}")]
    Malformed(String),
}

/// Failure reported by a booking sink.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BookingError {
    /// Another writer booked an overlapping meeting first.
    #[error("booking conflict: {0}")]
    Conflict(String),

    /// Permanent refusal, e.g. permission denied.
    #[error("booking rejected: {0}")]
    Rejected(String),
}

/// Invalid configuration detected at load time.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    Invalid { key: String, value: String },

    #[error("missing required setting {0}")]
    Missing(String),

    #[error("scoring weights invalid: {0}")]
    Weights(String),

    #[error("working hours invalid: {0}")]
    WorkingHours(String),
}
