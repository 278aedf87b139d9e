//! Error types for the Terraxcel provider.

use thiserror::Error;

use crate::client::ApiError;
use crate::schema::Diagnostic;

/// Errors that can occur while serving a provider request.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested resource was not found remotely.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Declared input failed a construction rule.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The provider is missing configuration or was configured twice.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The spreadsheet API rejected or failed a call.
    #[error("{title}: {source}")]
    Remote {
        /// Short description of the operation that failed.
        title: String,
        /// The underlying client error.
        #[source]
        source: ApiError,
    },

    /// The requested resource type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// Invalid request from the engine.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A gRPC transport error occurred.
    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),
}

impl ProviderError {
    /// Wrap a client error as a remote failure, whatever its kind.
    pub fn remote(title: impl Into<String>, source: ApiError) -> Self {
        Self::Remote {
            title: title.into(),
            source,
        }
    }

    /// Like [`ProviderError::remote`], but a missing resource becomes
    /// [`ProviderError::NotFound`] so the engine can drop it from state.
    pub fn classify(title: impl Into<String>, source: ApiError) -> Self {
        match source {
            ApiError::NotFound { .. } => Self::NotFound(source.to_string()),
            source => Self::remote(title, source),
        }
    }

    /// Whether this error means the resource no longer exists.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Short title for this error, suitable as a diagnostic summary.
    pub fn title(&self) -> &str {
        match self {
            Self::NotFound(_) => "Resource not found",
            Self::Validation(_) => "Invalid resource configuration",
            Self::Configuration(_) => "Provider configuration error",
            Self::Remote { title, .. } => title,
            Self::UnknownResource(_) => "Unknown resource type",
            Self::InvalidRequest(_) => "Invalid request",
            Self::Serialization(_) => "Serialization error",
            Self::Transport(_) => "Transport error",
        }
    }

    /// Get the underlying error message without the title.
    pub fn message(&self) -> String {
        match self {
            Self::NotFound(msg)
            | Self::Validation(msg)
            | Self::Configuration(msg)
            | Self::UnknownResource(msg)
            | Self::InvalidRequest(msg) => msg.clone(),
            Self::Remote { source, .. } => source.to_string(),
            Self::Serialization(err) => err.to_string(),
            Self::Transport(err) => err.to_string(),
        }
    }

    /// Convert into an error diagnostic with the title as summary and
    /// the underlying message as detail.
    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::error(self.title()).with_detail(self.message())
    }
}

impl From<ProviderError> for Diagnostic {
    fn from(err: ProviderError) -> Self {
        err.to_diagnostic()
    }
}
