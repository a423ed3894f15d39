//! The action collaborator interface consumed by the scheduling core.

use async_trait::async_trait;

use crate::types::ActionResult;

/// An opaque, possibly-flaky pair of timesheet operations.
///
/// Implementations are free to use any mechanism (HTTP, browser
/// automation); the core never inspects how a punch happens, only the
/// returned [`ActionResult`]. Every call must be a complete, self-contained
/// sequence:
/// the retry runner assumes an implementation releases whatever it acquired
/// before returning, so attempts stay independent.
#[async_trait]
pub trait TimesheetActions: Send + Sync {
    async fn sign_in(&self) -> ActionResult;
    async fn sign_out(&self) -> ActionResult;
}
