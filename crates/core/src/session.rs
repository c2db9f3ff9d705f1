//! Session state container
//!
//! Holds the canonical [`SessionRecord`], applies every mutation through
//! [`SessionRecord::reduce`], persists the full record after each change and
//! publishes a single [`SessionChange`] notification per change.

use crate::error::{SessionError, SessionResult};
use crate::notify::{Channel, Subscription};
use crate::runtime::Runtime;
use crate::store::{AUTH_KEY, PrefixedStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing::{info, warn};

/// Persisted session record
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionRecord {
    pub is_authenticated: bool,
    /// Opaque credential, empty when absent
    pub access_token: String,
    /// Expiry instant in seconds since the epoch, `0` when there is no session
    pub expires_at: i64,
    pub user_id: String,
    /// Remember the username for the next visit
    pub remember_me: bool,
    /// Attempt renewal automatically, including across reloads
    pub stay_signed_in: bool,
    /// Lifetime granted with the last credential, in seconds
    pub lifetime_secs: i64,
    pub remembered_username: Option<String>,
}

/// A state transition of the session record
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn {
        access_token: String,
        expires_at: i64,
        lifetime_secs: i64,
        user_id: String,
        stay_signed_in: bool,
    },
    Extended {
        expires_at: i64,
    },
    SignedOut,
    RememberMe {
        remember_me: bool,
        username: Option<String>,
    },
}

impl SessionRecord {
    /// Pure reducer: the only way a record changes
    #[must_use]
    pub fn reduce(self, event: &SessionEvent) -> Self {
        match event {
            SessionEvent::SignedIn {
                access_token,
                expires_at,
                lifetime_secs,
                user_id,
                stay_signed_in,
            } => Self {
                is_authenticated: true,
                access_token: access_token.clone(),
                expires_at: *expires_at,
                lifetime_secs: *lifetime_secs,
                user_id: user_id.clone(),
                stay_signed_in: *stay_signed_in,
                ..self
            },
            SessionEvent::Extended { expires_at } => Self {
                expires_at: *expires_at,
                ..self
            },
            // Remembered-username preferences survive sign-out
            SessionEvent::SignedOut => Self {
                remember_me: self.remember_me,
                remembered_username: self.remembered_username,
                ..Self::default()
            },
            SessionEvent::RememberMe {
                remember_me,
                username,
            } => Self {
                remember_me: *remember_me,
                remembered_username: if *remember_me {
                    username.clone()
                } else {
                    None
                },
                ..self
            },
        }
    }

    /// Derived validity: authenticated, well-formed and not yet expired
    pub fn is_valid_at(&self, now_secs: i64) -> bool {
        self.is_authenticated
            && !self.access_token.is_empty()
            && self.expires_at > 0
            && now_secs < self.expires_at
    }

    /// Drop authentication from records that violate the record invariant
    #[must_use]
    pub fn sanitized(self) -> Self {
        if self.is_authenticated && (self.access_token.is_empty() || self.expires_at <= 0) {
            warn!("Discarding persisted session without token or expiry");
            return self.reduce(&SessionEvent::SignedOut);
        }
        self
    }
}

/// Expiry instant as a UTC timestamp for log fields
fn expiry_utc(expires_at: i64) -> Option<DateTime<Utc>> {
    if expires_at > 0 {
        DateTime::from_timestamp(expires_at, 0)
    } else {
        None
    }
}

/// A fresh credential returned by sign-in, sign-up or renewal
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub token: String,
    /// Lifetime in seconds from now
    pub expires_in: i64,
    /// Present on sign-in; renewals may omit it
    #[serde(default)]
    pub user_id: Option<String>,
}

impl Credential {
    pub fn new(token: impl Into<String>, expires_in: i64) -> Self {
        Self {
            token: token.into(),
            expires_in,
            user_id: None,
        }
    }

    #[must_use]
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

/// Why the session was ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignOutReason {
    User,
    Expired,
    Idle,
    RenewalFailed,
    PromptTimedOut,
    PromptDismissed,
}

/// What caused a [`SessionChange`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeReason {
    SignedIn,
    Renewed,
    Extended,
    Restored,
    SignedOut(SignOutReason),
    Preferences,
}

/// Notification emitted once per state change
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionChange {
    pub authenticated: bool,
    pub generation: u64,
    pub expires_at: i64,
    pub reason: ChangeReason,
}

struct SessionInner {
    record: RefCell<SessionRecord>,
    generation: Cell<u64>,
    store: PrefixedStore,
    runtime: Rc<dyn Runtime>,
    changes: Channel<SessionChange>,
}

/// Shared handle to the session state container
#[derive(Clone)]
pub struct SessionState {
    inner: Rc<SessionInner>,
}

impl SessionState {
    pub fn new(runtime: Rc<dyn Runtime>, store: PrefixedStore) -> Self {
        Self {
            inner: Rc::new(SessionInner {
                record: RefCell::new(SessionRecord::default()),
                generation: Cell::new(0),
                store,
                runtime,
                changes: Channel::new(),
            }),
        }
    }

    /// Current session, with authentication re-derived against the clock
    pub fn session(&self) -> SessionRecord {
        let mut record = self.raw();
        record.is_authenticated = record.is_valid_at(self.inner.runtime.now_secs());
        record
    }

    /// Current record exactly as stored
    pub fn raw(&self) -> SessionRecord {
        self.inner.record.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner
            .record
            .borrow()
            .is_valid_at(self.inner.runtime.now_secs())
    }

    /// Incremented on every credential change; used to detect stale results
    pub fn generation(&self) -> u64 {
        self.inner.generation.get()
    }

    pub fn subscribe(&self, listener: impl Fn(&SessionChange) + 'static) -> Subscription {
        self.inner.changes.subscribe(listener)
    }

    /// Start a session from a fresh credential
    pub fn apply_signin(
        &self,
        token: impl Into<String>,
        expires_in_secs: i64,
        user_id: impl Into<String>,
        stay_signed_in: bool,
    ) -> SessionResult<()> {
        let token = token.into();
        if token.is_empty() {
            return Err(SessionError::invalid_credential("token is empty"));
        }
        if expires_in_secs <= 0 {
            return Err(SessionError::invalid_credential(format!(
                "expires_in must be positive, got {expires_in_secs}"
            )));
        }

        let user_id = user_id.into();
        let expires_at = self.inner.runtime.now_secs() + expires_in_secs;
        info!(
            user_id = %user_id,
            expires_in_secs,
            expires = ?expiry_utc(expires_at),
            stay_signed_in,
            "Signed in"
        );
        self.apply(
            &SessionEvent::SignedIn {
                access_token: token,
                expires_at,
                lifetime_secs: expires_in_secs,
                user_id,
                stay_signed_in,
            },
            ChangeReason::SignedIn,
            true,
        );
        Ok(())
    }

    /// Replace the credential of the current session with a renewed one
    pub fn apply_renewal(&self, credential: &Credential) -> SessionResult<()> {
        if credential.token.is_empty() || credential.expires_in <= 0 {
            return Err(SessionError::invalid_credential(
                "renewal returned an empty token or non-positive lifetime",
            ));
        }

        let current = self.raw();
        let user_id = credential
            .user_id
            .clone()
            .unwrap_or_else(|| current.user_id.clone());
        let expires_at = self.inner.runtime.now_secs() + credential.expires_in;
        info!(
            user_id = %user_id,
            expires_in = credential.expires_in,
            expires = ?expiry_utc(expires_at),
            "Session renewed"
        );
        self.apply(
            &SessionEvent::SignedIn {
                access_token: credential.token.clone(),
                expires_at,
                lifetime_secs: credential.expires_in,
                user_id,
                stay_signed_in: current.stay_signed_in,
            },
            ChangeReason::Renewed,
            true,
        );
        Ok(())
    }

    /// Keep the currently known credential for another full lifetime.
    /// Returns `false` when there is no credential to extend.
    pub fn extend(&self) -> bool {
        let current = self.raw();
        if !current.is_authenticated || current.access_token.is_empty() {
            return false;
        }

        let lifetime = current.lifetime_secs.max(1);
        let expires_at = self.inner.runtime.now_secs() + lifetime;
        info!(
            user_id = %current.user_id,
            lifetime,
            expires = ?expiry_utc(expires_at),
            "Session extended"
        );
        self.apply(
            &SessionEvent::Extended { expires_at },
            ChangeReason::Extended,
            true,
        );
        true
    }

    /// End the session and persist the cleared record
    pub fn apply_signout(&self, reason: SignOutReason) {
        info!(?reason, "Signed out");
        self.apply(
            &SessionEvent::SignedOut,
            ChangeReason::SignedOut(reason),
            true,
        );
    }

    /// Remember (or forget) the username for the next visit
    pub fn set_remembered_username(&self, username: Option<String>) {
        let remember_me = username.is_some();
        self.apply(
            &SessionEvent::RememberMe {
                remember_me,
                username,
            },
            ChangeReason::Preferences,
            false,
        );
    }

    /// Read the persisted record, sanitised; `None` on first run or corruption
    pub fn load_persisted(&self) -> Option<SessionRecord> {
        self.inner
            .store
            .read::<SessionRecord>(AUTH_KEY)
            .map(SessionRecord::sanitized)
    }

    /// Install a record read back from storage
    pub fn restore(&self, record: SessionRecord) {
        *self.inner.record.borrow_mut() = record;
        self.publish(ChangeReason::Restored, true);
    }

    fn apply(&self, event: &SessionEvent, reason: ChangeReason, bump_generation: bool) {
        let next = self.raw().reduce(event);
        *self.inner.record.borrow_mut() = next;
        self.persist();
        self.publish(reason, bump_generation);
    }

    fn persist(&self) {
        let record = self.raw();
        if let Err(e) = self.inner.store.write(AUTH_KEY, &record) {
            warn!(error = %e, "Failed to persist session; continuing in memory");
        }
    }

    fn publish(&self, reason: ChangeReason, bump_generation: bool) {
        if bump_generation {
            self.inner.generation.set(self.inner.generation.get() + 1);
        }
        let change = SessionChange {
            authenticated: self.is_authenticated(),
            generation: self.generation(),
            expires_at: self.inner.record.borrow().expires_at,
            reason,
        };
        self.inner.changes.notify(&change);
    }
}
