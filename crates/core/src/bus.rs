//! Shared server error bus
//!
//! HTTP collaborators publish failed responses here; the session manager and
//! any UI component that wants to surface errors subscribe. The bus is passed
//! explicitly to whoever needs it.

use crate::notify::{Channel, Subscription};

/// A failed response from the application's server
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerError {
    pub status: u16,
    pub message: String,
}

impl ServerError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// The server no longer accepts the session's credential
    pub const fn is_auth_expired(&self) -> bool {
        self.status == 401
    }
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Server error {}: {}", self.status, self.message)
    }
}

/// Subscribe/notify bus for [`ServerError`]s
#[derive(Clone, Default)]
pub struct ServerErrorBus {
    channel: Channel<ServerError>,
}

impl ServerErrorBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: impl Fn(&ServerError) + 'static) -> Subscription {
        self.channel.subscribe(listener)
    }

    pub fn notify(&self, error: ServerError) {
        tracing::debug!(status = error.status, "Server error published");
        self.channel.notify(&error);
    }
}
