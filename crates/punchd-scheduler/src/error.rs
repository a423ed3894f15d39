use chrono::NaiveDateTime;
use punchd_core::types::EventKind;
use thiserror::Error;

/// Errors that can occur within the scheduling core.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// An action was about to run outside its allowed window. This is a
    /// programming error in the state machine, not an operational failure.
    #[error("Policy violation: {event} attempted at {at}")]
    PolicyViolation {
        event: EventKind,
        at: NaiveDateTime,
    },
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
