//! Randomized target instants and the cancellable wait.
//!
//! Jitter keeps the daily punch from firing at a perfectly fixed,
//! detectable time. The randomness source is a trait so tests pin the
//! offset instead of sampling.

use std::time::Duration as StdDuration;

use chrono::{Duration, NaiveDateTime};
use rand::Rng;
use tokio::sync::watch;

/// Source of uniform random minute offsets.
pub trait RandomSource: Send {
    /// Uniform integer in `[0, bound]` inclusive.
    fn minutes_up_to(&mut self, bound: u32) -> u32;
}

/// Production source backed by the thread-local RNG.
pub struct ThreadRngSource;

impl RandomSource for ThreadRngSource {
    fn minutes_up_to(&mut self, bound: u32) -> u32 {
        rand::rng().random_range(0..=bound)
    }
}

/// Deterministic source for tests: always returns the stored offset,
/// clamped to the requested bound.
pub struct FixedSource(pub u32);

impl RandomSource for FixedSource {
    fn minutes_up_to(&mut self, bound: u32) -> u32 {
        self.0.min(bound)
    }
}

/// `start` plus a uniformly random whole-minute offset in
/// `[0, window_minutes]`.
pub fn pick_instant_in_window(
    start: NaiveDateTime,
    window_minutes: u32,
    rng: &mut dyn RandomSource,
) -> NaiveDateTime {
    start + Duration::minutes(rng.minutes_up_to(window_minutes) as i64)
}

/// `max(0, target - now)` as a std duration. Never negative.
pub fn delay_until(target: NaiveDateTime, now: NaiveDateTime) -> StdDuration {
    (target - now).to_std().unwrap_or(StdDuration::ZERO)
}

/// How a wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The delay ran out naturally.
    Elapsed,
    /// Shutdown was signalled before the delay ran out.
    Cancelled,
}

/// Sleep for `delay`, resolving early into [`WaitOutcome::Cancelled`] when
/// the shutdown channel flips to `true`.
///
/// A shutdown already signalled at entry cancels without sleeping at all.
/// A dropped sender is treated as shutdown.
pub async fn wait_until_cancellable(
    delay: StdDuration,
    shutdown: &mut watch::Receiver<bool>,
) -> WaitOutcome {
    if *shutdown.borrow() {
        return WaitOutcome::Cancelled;
    }

    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            _ = &mut sleep => return WaitOutcome::Elapsed,
            changed = shutdown.changed() => match changed {
                Ok(()) => {
                    if *shutdown.borrow() {
                        return WaitOutcome::Cancelled;
                    }
                }
                Err(_) => return WaitOutcome::Cancelled,
            },
        }
    }
}
