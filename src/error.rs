//! Error types for the VictoriaMetrics Cloud provider.

use thiserror::Error;

/// Errors that can occur while serving the provider protocol.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested remote object was not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A validation error occurred.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An internal provider error occurred.
    #[error("SDK error: {0}")]
    Sdk(String),

    /// A configuration error occurred.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested resource or data source type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Resource already exists (create conflict).
    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    /// Permission denied (authentication/authorization failure).
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Quota or rate limit exceeded.
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Service temporarily unavailable.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Operation timed out.
    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// Operation failed due to current state (precondition not met).
    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    /// Operation not implemented.
    #[error("Unimplemented: {0}")]
    Unimplemented(String),

    /// The API rejected the request as malformed.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// An operation failed; `summary` names the operation for the user.
    #[error("{summary}: {source}")]
    Operation {
        /// Short, user-facing summary (e.g. "Error creating deployment").
        summary: String,
        /// The underlying failure.
        #[source]
        source: Box<ProviderError>,
    },
}

impl ProviderError {
    /// Map a non-success HTTP status from the vendor API into an error.
    ///
    /// `body` should already be truncated for logging.
    pub fn from_status(status: u16, body: &str) -> Self {
        let msg = if body.is_empty() {
            format!("HTTP {}", status)
        } else {
            format!("HTTP {}: {}", status, body)
        };
        match status {
            400 | 422 => Self::InvalidRequest(msg),
            401 | 403 => Self::PermissionDenied(msg),
            404 => Self::NotFound(msg),
            409 => Self::AlreadyExists(msg),
            412 => Self::FailedPrecondition(msg),
            429 => Self::ResourceExhausted(msg),
            501 => Self::Unimplemented(msg),
            500..=599 => Self::Unavailable(msg),
            _ => Self::Sdk(msg),
        }
    }

    /// Wrap this error with a user-facing operation summary.
    pub fn with_summary(self, summary: impl Into<String>) -> Self {
        Self::Operation {
            summary: summary.into(),
            source: Box::new(self),
        }
    }

    /// Returns true if this error (or the error it wraps) is a not-found error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Operation { source, .. } => source.is_not_found(),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::DeadlineExceeded(err.to_string())
        } else if err.is_decode() {
            Self::Sdk(format!("failed to decode response: {}", err))
        } else {
            Self::Unavailable(err.to_string())
        }
    }
}
