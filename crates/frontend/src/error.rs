//! HTTP client error types

use tenure_core::{RenewalError, ServerError};
use thiserror::Error;

/// Errors raised by [`ApiClient`](crate::client::ApiClient)
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network or request error
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Server returned an error status
    #[error("Server error {status}: {message}")]
    ServerError { status: u16, message: String },

    /// Credential missing, expired or rejected
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Response body could not be decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

impl ClientError {
    /// Create error from HTTP status code
    pub fn from_status(status: reqwest::StatusCode, message: String) -> Self {
        match status.as_u16() {
            400 => Self::BadRequest(message),
            401 => Self::AuthenticationFailed(message),
            403 => Self::Forbidden(message),
            404 => Self::NotFound(message),
            _ => Self::ServerError {
                status: status.as_u16(),
                message,
            },
        }
    }

    /// HTTP status behind this error, if the server answered at all
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::BadRequest(_) => Some(400),
            Self::AuthenticationFailed(_) => Some(401),
            Self::Forbidden(_) => Some(403),
            Self::NotFound(_) => Some(404),
            Self::ServerError { status, .. } => Some(*status),
            Self::Request(_) | Self::Serialization(_) | Self::Configuration(_) => None,
        }
    }

    /// The server no longer accepts the session's credential
    pub const fn is_auth_expired(&self) -> bool {
        matches!(self, Self::AuthenticationFailed(_))
    }

    /// Form published on the server error bus; transport failures have none
    pub fn to_server_error(&self) -> Option<ServerError> {
        let status = self.status()?;
        let message = match self {
            Self::BadRequest(message)
            | Self::AuthenticationFailed(message)
            | Self::Forbidden(message)
            | Self::NotFound(message)
            | Self::ServerError { message, .. } => message.clone(),
            _ => self.to_string(),
        };
        Some(ServerError::new(status, message))
    }
}

impl From<ClientError> for RenewalError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::AuthenticationFailed(_) | ClientError::Forbidden(_) => {
                Self::CredentialExpired
            }
            ClientError::Request(e) => Self::Network(e.to_string()),
            ClientError::Configuration(message) => Self::Network(message),
            ClientError::Serialization(e) => Self::InvalidResponse(e.to_string()),
            ClientError::BadRequest(message) => Self::Rejected {
                status: 400,
                message,
            },
            ClientError::NotFound(message) => Self::Rejected {
                status: 404,
                message,
            },
            ClientError::ServerError { status, message } => Self::Rejected { status, message },
        }
    }
}
