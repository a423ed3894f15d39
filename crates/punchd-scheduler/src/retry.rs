//! Bounded retries around one opaque action.
//!
//! The runner is pure orchestration: it holds no resources, and every
//! attempt is an independent call into the collaborator.

use std::future::Future;

use tokio::sync::watch;
use tracing::{info, warn};

use punchd_core::types::{ActionResult, RetryPolicy};

use crate::jitter::{wait_until_cancellable, WaitOutcome};

/// How a retry sequence ended.
#[derive(Debug)]
pub enum RetryOutcome {
    /// The action ran to a final result: either a success, or the last
    /// failure after `max_attempts` attempts. Never thrown past this
    /// boundary; the caller decides how to surface a failure.
    Finished(ActionResult),
    /// Shutdown was signalled during a backoff wait; no further attempt
    /// was made.
    Cancelled,
}

/// Invoke `action` up to `policy.max_attempts` times, waiting
/// `policy.backoff` between attempts.
///
/// Success returns immediately. The backoff wait is a suspension point and
/// is cancellable like the scheduler wait.
pub async fn run_with_retry<F, Fut>(
    mut action: F,
    policy: &RetryPolicy,
    shutdown: &mut watch::Receiver<bool>,
) -> RetryOutcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ActionResult>,
{
    let mut last = ActionResult::failure("action was never attempted");

    for attempt in 1..=policy.max_attempts {
        let result = action().await;
        if result.is_success() {
            if attempt > 1 {
                info!(attempt, "action succeeded after retry");
            }
            return RetryOutcome::Finished(result);
        }

        warn!(
            attempt,
            max_attempts = policy.max_attempts,
            detail = result.detail.as_deref().unwrap_or("no detail"),
            "action attempt failed"
        );
        last = result;

        if attempt < policy.max_attempts {
            if wait_until_cancellable(policy.backoff, shutdown).await == WaitOutcome::Cancelled {
                return RetryOutcome::Cancelled;
            }
        }
    }

    RetryOutcome::Finished(last)
}
