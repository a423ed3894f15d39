//! `punchd-core` — shared configuration, errors and domain types.
//!
//! Everything the other punchd crates agree on lives here: the validated
//! config surface (`punchd.toml` + `PUNCHD_*` env overrides), the policy
//! types ([`types::TimeWindow`], [`types::RetryPolicy`]), the action/result
//! vocabulary, and the two collaborator traits the scheduling core consumes
//! ([`action::TimesheetActions`], [`notify::Notifier`]).

pub mod action;
pub mod config;
pub mod error;
pub mod notify;
pub mod types;

pub use action::TimesheetActions;
pub use config::PunchdConfig;
pub use error::{PunchdError, Result};
pub use notify::Notifier;
pub use types::{ActionOutcome, ActionResult, EventKind, RetryPolicy, ScheduledEvent, TimeWindow};
