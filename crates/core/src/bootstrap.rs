//! Session bootstrap
//!
//! Runs once at application start: reconstructs the session from storage
//! and decides whether to resume it, renew it or end it. The outcome is
//! reported to the caller; navigation is left to route guards.

use crate::renewal::RenewalAttempt;
use crate::scheduler::RenewalScheduler;
use crate::session::{SessionState, SignOutReason};
use tracing::{info, warn};

/// Result of [`init_session`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// Nothing persisted, or the persisted session was signed out
    Unauthenticated,
    /// A live session was resumed
    Resumed { expires_at: i64 },
    /// An expired session was renewed on start
    Renewed { expires_at: i64 },
    /// An expired session could not be renewed and was signed out
    SignedOut,
}

impl BootstrapOutcome {
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Resumed { .. } | Self::Renewed { .. })
    }
}

/// Rebuild session state from the persistent store.
///
/// Restoring the record notifies session listeners, which is how the
/// scheduler gets armed and the activity monitor started for a live session.
pub async fn init_session(
    session: &SessionState,
    scheduler: &RenewalScheduler,
    now_secs: i64,
) -> BootstrapOutcome {
    let Some(record) = session.load_persisted() else {
        info!("No persisted session");
        return BootstrapOutcome::Unauthenticated;
    };

    if !record.is_authenticated {
        session.restore(record);
        return BootstrapOutcome::Unauthenticated;
    }

    if record.is_valid_at(now_secs) {
        let expires_at = record.expires_at;
        info!(user_id = %record.user_id, expires_at, "Resuming persisted session");
        session.restore(record);
        return BootstrapOutcome::Resumed { expires_at };
    }

    let stay_signed_in = record.stay_signed_in;
    session.restore(record.clone());

    if !stay_signed_in {
        info!("Persisted session expired; signing out");
        session.apply_signout(SignOutReason::Expired);
        return BootstrapOutcome::SignedOut;
    }

    info!("Persisted session expired; attempting renewal");
    match scheduler.try_renew(record).await {
        RenewalAttempt::Applied => BootstrapOutcome::Renewed {
            expires_at: session.raw().expires_at,
        },
        RenewalAttempt::Stale => {
            let current = session.session();
            if current.is_authenticated {
                BootstrapOutcome::Resumed {
                    expires_at: current.expires_at,
                }
            } else {
                BootstrapOutcome::Unauthenticated
            }
        }
        RenewalAttempt::Failed(e) => {
            warn!(error = %e, "Renewal on start failed; signing out");
            session.apply_signout(SignOutReason::RenewalFailed);
            BootstrapOutcome::SignedOut
        }
    }
}
