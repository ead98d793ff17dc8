/*!
 * Error types for the zotcite application.
 *
 * This module contains custom error types for different parts of the application,
 * using the thiserror crate for ergonomic error definitions.
 */

use thiserror::Error;

/// Errors that can occur when talking to the bibliographic service
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the HTTP layer itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// JSON-RPC error payload returned by the service
    #[error("{message}")]
    RpcError {
        /// JSON-RPC error code
        code: i64,
        /// Error message from the service
        message: String,
    },
}

impl ProviderError {
    /// Whether retrying the same request could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ConnectionError(_) | Self::RequestFailed(_) => true,
            Self::ApiError { status_code, .. } => *status_code >= 500,
            Self::ParseError(_) | Self::RpcError { .. } => false,
        }
    }
}

/// Errors produced by the citation commands
#[derive(Error, Debug)]
pub enum CiteError {
    /// The interactive picker returned nothing
    #[error("No item is selected.")]
    NoSelection,

    /// The bibliographic service failed or returned an error payload
    #[error("{0}")]
    Service(String),

    /// A key could not be resolved to a collection
    #[error("'{0}' is not found.")]
    NotFound(String),

    /// Invalid user input or document state, raised before any side effect
    #[error("{0}")]
    Validation(String),

    /// Reading or writing a bibliography file failed
    #[error("File error: {0}")]
    File(String),
}

impl CiteError {
    /// Whether this error belongs in the user-facing error summary
    pub fn is_reportable(&self) -> bool {
        !matches!(self, Self::NotFound(_))
    }
}

impl From<ProviderError> for CiteError {
    fn from(error: ProviderError) -> Self {
        match error {
            ProviderError::RpcError { message, .. } => Self::Service(message),
            other => Self::Service(other.to_string()),
        }
    }
}
