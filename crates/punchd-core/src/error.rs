use thiserror::Error;

/// Errors shared across the punchd workspace.
#[derive(Debug, Error)]
pub enum PunchdError {
    /// Configuration could not be loaded or failed startup validation.
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, PunchdError>;
