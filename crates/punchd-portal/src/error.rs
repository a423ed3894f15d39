use thiserror::Error;

/// Errors from the portal HTTP client.
///
/// These never cross the `TimesheetActions` boundary as errors: the trait
/// impl folds them into `ActionResult::failure` so the retry runner only
/// ever sees the success/failure contract.
#[derive(Debug, Error)]
pub enum PortalError {
    /// Transport-level failure (connect, timeout, TLS).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The portal answered with a non-success status.
    #[error("Portal API error: status {status}: {message}")]
    Api { status: u16, message: String },

    /// The response arrived but the expected confirmation marker did not.
    #[error("Verification failed: {0}")]
    Verify(String),
}

pub type Result<T> = std::result::Result<T, PortalError>;
