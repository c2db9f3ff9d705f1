//! Tenure session lifecycle core
//!
//! Tracks whether the user holds a valid credential, renews it at expiry,
//! watches for idleness through a storage-shared activity clock and, when
//! renewal fails, gives the user a bounded window to stay signed in.

pub mod activity;
pub mod bootstrap;
pub mod bus;
pub mod config;
pub mod error;
pub mod manager;
pub mod notify;
pub mod prompt;
pub mod renewal;
pub mod runtime;
pub mod scheduler;
pub mod session;
pub mod store;

#[cfg(any(test, feature = "tests"))]
pub mod tests;

pub use activity::{ActivitySource, ActivityStream, IdleMonitor, ListenerGuard};
pub use bootstrap::BootstrapOutcome;
pub use bus::{ServerError, ServerErrorBus};
pub use config::SessionConfig;
pub use error::{RenewalError, SessionError, SessionResult};
pub use manager::{SessionManager, SessionManagerBuilder};
pub use notify::Subscription;
pub use prompt::{ExpiryPrompt, PromptEvent, PromptOutcome, PromptState};
pub use renewal::{RenewalAttempt, TokenRenewer};
pub use runtime::{Runtime, TimerHandle};
pub use scheduler::RenewalScheduler;
pub use session::{
    ChangeReason, Credential, SessionChange, SessionRecord, SessionState, SignOutReason,
};
pub use store::{KeyValueStore, MemoryStore, PrefixedStore};
