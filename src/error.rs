use crate::access::{Capability, PlanTier};
use thiserror::Error;

/// Failure classes for a record-transcribe-translate turn.
///
/// Every failure is terminal for the turn it occurred in: the orchestrator
/// surfaces it as a status event and returns to `Idle`. There are no
/// automatic retries anywhere; a fresh user action is required.
#[derive(Debug, Error)]
pub enum TurnError {
    /// The user declined microphone access, or the OS refused the stream.
    #[error("microphone access denied: {0}")]
    PermissionDenied(String),

    /// No usable audio input device exists.
    #[error("no audio input device available: {0}")]
    DeviceUnavailable(String),

    /// A backend request failed in transport or returned a non-success status.
    #[error("network error: {0}")]
    Network(String),

    /// The backend answered, but with no usable text.
    #[error("backend returned no usable text")]
    EmptyResult,

    /// The access gate refused the action for the current role/plan.
    #[error("plan '{required_plan}' required for {capability}")]
    AccessDenied {
        capability: Capability,
        required_plan: PlanTier,
    },

    /// A turn is already recording or processing; no overlap is permitted.
    #[error("a turn is already in progress")]
    Busy,

    /// Stop was requested but no capture session is active.
    #[error("no recording in progress")]
    NoActiveRecording,

    /// A backend request exceeded the configured deadline.
    #[error("backend request timed out")]
    Timeout,

    /// Plumbing failure that does not map to a user-facing class
    /// (in-memory encoding, joined-task errors).
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for TurnError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TurnError::Timeout
        } else {
            TurnError::Network(err.to_string())
        }
    }
}
