//! Error types shared by the session lifecycle core

/// Standard result type for session operations
pub type SessionResult<T> = std::result::Result<T, SessionError>;

/// Errors raised by the session core and its host adapters
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Storage operation failed: {message}")]
    Storage { message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Invalid credential: {message}")]
    InvalidCredential { message: String },

    #[error("Host facility unavailable: {message}")]
    Unavailable { message: String },
}

impl SessionError {
    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an invalid credential error
    pub fn invalid_credential(message: impl Into<String>) -> Self {
        Self::InvalidCredential {
            message: message.into(),
        }
    }

    /// Create an error for a missing host facility (no window, no storage)
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

impl From<config::ConfigError> for SessionError {
    fn from(err: config::ConfigError) -> Self {
        Self::invalid_config(err.to_string())
    }
}

/// Failure of the renewal network operation.
///
/// The scheduler does not distinguish between variants: every one of them
/// means the user has to be asked.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenewalError {
    /// Transport failure (offline, DNS, timeout)
    #[error("Renewal request failed: {0}")]
    Network(String),

    /// The refresh credential is expired or invalid
    #[error("Refresh credential expired or invalid")]
    CredentialExpired,

    /// The authority answered with a non-success status
    #[error("Renewal rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    /// The authority answered successfully but the credential is unusable
    #[error("Renewal returned an unusable credential: {0}")]
    InvalidResponse(String),
}

impl RenewalError {
    /// Whether the failure was caused by the credential rather than the transport
    pub const fn is_credential_error(&self) -> bool {
        matches!(self, Self::CredentialExpired)
    }
}
