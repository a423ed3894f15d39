//! `punchd-scheduler` — the when-and-how-often core of punchd.
//!
//! # Overview
//!
//! Four layers, composed leaf-first:
//!
//! | Module         | Responsibility                                          |
//! |----------------|---------------------------------------------------------|
//! | `calendar`     | Pure wall-clock policy: in-window checks, next occurrence |
//! | `jitter`       | Randomized target instants + the cancellable wait        |
//! | `retry`        | Bounded retries around one opaque action                 |
//! | `orchestrator` | One day's sign-in/sign-out cycle as a state machine      |
//!
//! Everything is a single sequential task; the only suspension points are
//! the scheduler wait and the retry backoff, both raced against the
//! process-wide shutdown `watch` channel.

pub mod calendar;
pub mod error;
pub mod jitter;
pub mod orchestrator;
pub mod retry;

pub use error::{Result, SchedulerError};
pub use jitter::{FixedSource, RandomSource, ThreadRngSource, WaitOutcome};
pub use orchestrator::{DayOutcome, DayState, Orchestrator};
pub use retry::{run_with_retry, RetryOutcome};
