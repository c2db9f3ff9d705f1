//! Renewal network operation consumed by the scheduler and bootstrap

use crate::error::RenewalError;
use crate::session::{Credential, SessionRecord};
use async_trait::async_trait;

/// Exchanges the current session's refresh credential for a fresh one.
///
/// Timeouts and retries belong to the implementation's transport; callers
/// only observe success or failure.
#[async_trait(?Send)]
pub trait TokenRenewer {
    async fn renew(&self, session: &SessionRecord) -> Result<Credential, RenewalError>;
}

/// Result of one renewal attempt as seen by the session
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenewalAttempt {
    /// The new credential was applied
    Applied,
    /// The session changed while the request was in flight; result discarded
    Stale,
    /// The operation failed
    Failed(RenewalError),
}
