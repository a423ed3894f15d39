use std::time::Duration;

use chrono::{NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

/// Recurring daily policy window: a wall-clock time range plus the weekdays
/// on which it applies.
///
/// Built by [`crate::config::PolicyConfig::window`], which guarantees
/// `start < end` and a non-empty weekday set.
#[derive(Debug, Clone)]
pub struct TimeWindow {
    /// Start of the daily range (inclusive).
    pub start: NaiveTime,
    /// End of the daily range (exclusive for the in-window check).
    pub end: NaiveTime,
    /// Weekdays on which the window is active.
    pub weekdays: Vec<Weekday>,
}

/// Bounded-retry settings for one action invocation.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Always >= 1 after validation;
    /// 1 means "no retry".
    pub max_attempts: u32,
    /// Wait between consecutive attempts.
    pub backoff: Duration,
}

/// Which of the two daily actions an event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    SignIn,
    SignOut,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::SignIn => write!(f, "sign-in"),
            EventKind::SignOut => write!(f, "sign-out"),
        }
    }
}

/// A single-day scheduling decision: which action fires, and when.
///
/// Created fresh each cycle by the orchestrator and discarded after the
/// action runs (or fails terminally).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledEvent {
    pub kind: EventKind,
    pub target: NaiveDateTime,
}

/// Outcome of one external action invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    Success,
    Failure,
}

/// Result returned by an action collaborator.
///
/// Failures carry a human-readable detail string for logs and
/// notifications; they are never `Err`, since retryability is the runner's
/// decision, not the collaborator's.
#[derive(Debug, Clone)]
pub struct ActionResult {
    pub outcome: ActionOutcome,
    pub detail: Option<String>,
}

impl ActionResult {
    pub fn success() -> Self {
        Self {
            outcome: ActionOutcome::Success,
            detail: None,
        }
    }

    pub fn success_with(detail: impl Into<String>) -> Self {
        Self {
            outcome: ActionOutcome::Success,
            detail: Some(detail.into()),
        }
    }

    pub fn failure(detail: impl Into<String>) -> Self {
        Self {
            outcome: ActionOutcome::Failure,
            detail: Some(detail.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == ActionOutcome::Success
    }
}
