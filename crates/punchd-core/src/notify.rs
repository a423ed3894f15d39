//! The notification collaborator interface.

use async_trait::async_trait;

/// Best-effort outcome delivery (day completed, retries exhausted, …).
///
/// Implementations log their own delivery failures; nothing propagates back
/// into the orchestrator's state machine.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, subject: &str, body: &str);
}
