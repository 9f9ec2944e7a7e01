//! Error types for control-plane calls.

use thiserror::Error;

/// Result type alias for control-plane calls.
pub type CloudResult<T> = Result<T, CloudError>;

/// Errors returned by a single control-plane request.
#[derive(Debug, Error)]
pub enum CloudError {
    /// The control plane answered with an explicit error (bad input, limits, ...).
    #[error("request rejected ({code}): {message}")]
    Rejected { code: String, message: String },

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("resource already exists: {0}")]
    AlreadyExists(String),

    /// The request never got an answer (SDK, network, credentials plumbing).
    #[error("transport error: {0}")]
    Transport(#[from] anyhow::Error),
}

impl CloudError {
    /// Build a `Rejected` error.
    pub fn rejected(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rejected {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Provider-style error code for attribution in reports.
    pub fn code(&self) -> &str {
        match self {
            Self::Rejected { code, .. } => code,
            Self::NotFound(_) => "NotFound",
            Self::AlreadyExists(_) => "AlreadyExists",
            Self::Transport(_) => "Transport",
        }
    }

    /// Human-readable message without the code prefix.
    pub fn message(&self) -> String {
        match self {
            Self::Rejected { message, .. } => message.clone(),
            Self::NotFound(resource) => format!("{resource} not found"),
            Self::AlreadyExists(resource) => format!("{resource} already exists"),
            Self::Transport(e) => e.to_string(),
        }
    }
}
