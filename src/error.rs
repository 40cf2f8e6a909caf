//! Error types for remote-resource adapters.
//!
//! [`ApiError`] is what a [`RemoteApi`](crate::client::RemoteApi) returns.
//! [`ProviderError`] is what adapters and the provider surface return to the
//! host; every variant carries enough context (operation, entity kind, lookup
//! key) to be shown to a user as-is.

use std::fmt;

use thiserror::Error;

use crate::schema::Diagnostic;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ProviderError>;

/// The remote operation an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Creating a remote entity.
    Create,
    /// Fetching a single remote entity by id.
    Read,
    /// Updating a remote entity in place.
    Update,
    /// Deleting a remote entity.
    Delete,
    /// Listing remote entities for a name lookup.
    List,
    /// Importing an existing remote entity.
    Import,
}

impl Operation {
    /// Lowercase verb used in messages and log fields.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::List => "list",
            Self::Import => "import",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors reported by a remote API client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The entity does not exist (HTTP 404 or equivalent).
    #[error("not found")]
    NotFound,

    /// The API answered with a non-success status.
    #[error("status {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body or reason phrase.
        message: String,
    },

    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),
}

impl ApiError {
    /// Whether this error means the entity is gone.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound | Self::Status { status: 404, .. })
    }
}

/// Errors surfaced by adapters and the provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// No entity matched the lookup key.
    #[error("{kind} not found: {key}")]
    NotFound {
        /// Entity kind, e.g. `credentials`.
        kind: &'static str,
        /// Rendered lookup key.
        key: String,
    },

    /// A name lookup matched more than one entity.
    #[error("found {count} {kind} entries matching {key}, expected exactly one")]
    AmbiguousResult {
        /// Entity kind.
        kind: &'static str,
        /// Rendered lookup key.
        key: String,
        /// Number of matching candidates.
        count: usize,
    },

    /// The caller supplied an invalid or contradictory set of attributes.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A discriminator value has no known payload shape.
    #[error("Unhandled {field} value: {value}")]
    UnhandledVariant {
        /// Name of the discriminator field (`type`, `provider`).
        field: &'static str,
        /// The value that was not recognised.
        value: String,
    },

    /// The remote API failed.
    #[error("failed to {operation} {kind} {identifier}: {source}")]
    Upstream {
        /// Operation that was attempted.
        operation: Operation,
        /// Entity kind.
        kind: &'static str,
        /// Id or name the operation targeted.
        identifier: String,
        /// The underlying API error.
        #[source]
        source: ApiError,
    },

    /// The provider is missing configuration or was not configured yet.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No adapter is registered for the requested type.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// Attribute validation against the schema failed.
    #[error("Validation failed with {} error(s)", .0.len())]
    Validation(Vec<Diagnostic>),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ProviderError {
    /// Build an [`Upstream`](Self::Upstream) error.
    pub fn upstream(
        operation: Operation,
        kind: &'static str,
        identifier: impl Into<String>,
        source: ApiError,
    ) -> Self {
        Self::Upstream {
            operation,
            kind,
            identifier: identifier.into(),
            source,
        }
    }

    /// Shorthand for a missing required attribute.
    pub fn missing_attribute(name: &str) -> Self {
        Self::InvalidArgument(format!("missing required attribute '{}'", name))
    }

    /// Whether the error means a lookup found nothing.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Upstream { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    /// Render the error as host diagnostics.
    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        match self {
            Self::Validation(diagnostics) => diagnostics,
            other => vec![Diagnostic::error(other.to_string())],
        }
    }
}

impl From<ProviderError> for tonic::Status {
    fn from(err: ProviderError) -> Self {
        let message = err.to_string();
        match err {
            ProviderError::NotFound { .. } => tonic::Status::not_found(message),
            ProviderError::AmbiguousResult { .. } => tonic::Status::failed_precondition(message),
            ProviderError::InvalidArgument(_) | ProviderError::Validation(_) => {
                tonic::Status::invalid_argument(message)
            },
            ProviderError::UnhandledVariant { .. } => tonic::Status::unimplemented(message),
            ProviderError::Upstream { source, .. } => match source {
                ApiError::Transport(_) => tonic::Status::unavailable(message),
                ApiError::Status { status: 401, .. } => tonic::Status::unauthenticated(message),
                ApiError::Status { status: 403, .. } => tonic::Status::permission_denied(message),
                ApiError::Status { status: 409, .. } => tonic::Status::already_exists(message),
                ApiError::Status { status: 429, .. } => tonic::Status::resource_exhausted(message),
                ref s if s.is_not_found() => tonic::Status::not_found(message),
                _ => tonic::Status::internal(message),
            },
            ProviderError::Configuration(_) => tonic::Status::failed_precondition(message),
            ProviderError::UnknownResource(_) => tonic::Status::not_found(message),
            ProviderError::Serialization(_) => tonic::Status::invalid_argument(message),
        }
    }
}
