//! Composition root of the session lifecycle
//!
//! Wires the container, monitor, scheduler, prompt and server error bus
//! together and keeps them in step with session changes:
//! an authenticated change arms the scheduler, starts the monitor and
//! closes a prompt the change made moot; a sign-out cancels the scheduler,
//! tears down any prompt and stops the monitor. Preference changes leave
//! the lifecycle alone.

use crate::activity::{ActivitySource, IdleMonitor, MonitorSettings};
use crate::bootstrap::{self, BootstrapOutcome};
use crate::bus::ServerErrorBus;
use crate::config::SessionConfig;
use crate::error::{SessionError, SessionResult};
use crate::notify::Subscription;
use crate::prompt::ExpiryPrompt;
use crate::renewal::TokenRenewer;
use crate::runtime::Runtime;
use crate::scheduler::RenewalScheduler;
use crate::session::{
    ChangeReason, Credential, SessionChange, SessionRecord, SessionState, SignOutReason,
};
use crate::store::{KeyValueStore, PrefixedStore};
use futures::StreamExt;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use tracing::{debug, info};

struct ManagerInner {
    config: SessionConfig,
    runtime: Rc<dyn Runtime>,
    session: SessionState,
    monitor: IdleMonitor,
    scheduler: RenewalScheduler,
    prompt: ExpiryPrompt,
    errors: ServerErrorBus,
    subscriptions: RefCell<Vec<Subscription>>,
    idle_watch: Cell<Option<u64>>,
    next_idle_watch: Cell<u64>,
    bootstrapped: Cell<bool>,
}

/// Handle to a fully wired session lifecycle
#[derive(Clone)]
pub struct SessionManager {
    inner: Rc<ManagerInner>,
}

impl PartialEq for SessionManager {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Builder for [`SessionManager`]
#[derive(Default)]
pub struct SessionManagerBuilder {
    config: SessionConfig,
    runtime: Option<Rc<dyn Runtime>>,
    store: Option<Rc<dyn KeyValueStore>>,
    activity: Option<Rc<dyn ActivitySource>>,
    renewer: Option<Rc<dyn TokenRenewer>>,
    errors: Option<ServerErrorBus>,
}

impl SessionManagerBuilder {
    #[must_use]
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn runtime(mut self, runtime: Rc<dyn Runtime>) -> Self {
        self.runtime = Some(runtime);
        self
    }

    #[must_use]
    pub fn store(mut self, store: Rc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn activity_source(mut self, source: Rc<dyn ActivitySource>) -> Self {
        self.activity = Some(source);
        self
    }

    #[must_use]
    pub fn renewer(mut self, renewer: Rc<dyn TokenRenewer>) -> Self {
        self.renewer = Some(renewer);
        self
    }

    /// Share an existing error bus instead of creating one
    #[must_use]
    pub fn error_bus(mut self, errors: ServerErrorBus) -> Self {
        self.errors = Some(errors);
        self
    }

    /// Validate the configuration and wire every component
    pub fn build(self) -> SessionResult<SessionManager> {
        self.config.validate()?;
        let runtime = self
            .runtime
            .ok_or_else(|| SessionError::invalid_config("runtime is required"))?;
        let backend = self
            .store
            .ok_or_else(|| SessionError::invalid_config("store is required"))?;
        let source = self
            .activity
            .ok_or_else(|| SessionError::invalid_config("activity source is required"))?;
        let renewer = self
            .renewer
            .ok_or_else(|| SessionError::invalid_config("renewer is required"))?;

        let store = PrefixedStore::new(backend, self.config.storage_prefix.clone());
        let session = SessionState::new(runtime.clone(), store.clone());
        let monitor = IdleMonitor::new(
            runtime.clone(),
            store,
            source,
            MonitorSettings {
                idle_timeout: self.config.idle_timeout(),
                check_interval: self.config.check_interval(),
                coalesce: self.config.activity_coalesce(),
            },
        );
        let prompt = ExpiryPrompt::new(
            runtime.clone(),
            session.clone(),
            monitor.clone(),
            self.config.dialog_timeout_secs,
        );
        let scheduler = RenewalScheduler::new(
            runtime.clone(),
            session.clone(),
            monitor.clone(),
            prompt.clone(),
            renewer,
        );

        let manager = SessionManager {
            inner: Rc::new(ManagerInner {
                config: self.config,
                runtime,
                session,
                monitor,
                scheduler,
                prompt,
                errors: self.errors.unwrap_or_default(),
                subscriptions: RefCell::new(Vec::new()),
                idle_watch: Cell::new(None),
                next_idle_watch: Cell::new(0),
                bootstrapped: Cell::new(false),
            }),
        };
        manager.connect();
        Ok(manager)
    }
}

impl SessionManager {
    pub fn builder() -> SessionManagerBuilder {
        SessionManagerBuilder::default()
    }

    fn connect(&self) {
        let weak = Rc::downgrade(&self.inner);
        let on_change = self.inner.session.subscribe(move |change| {
            if let Some(inner) = weak.upgrade() {
                Self::on_session_change(&inner, change);
            }
        });

        let weak = Rc::downgrade(&self.inner);
        let on_error = self.inner.errors.subscribe(move |error| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if error.is_auth_expired() && inner.session.is_authenticated() && !inner.prompt.is_open()
            {
                info!("Server rejected the credential; running expiry handling");
                inner.scheduler.expire_now();
            }
        });

        self.inner
            .subscriptions
            .borrow_mut()
            .extend([on_change, on_error]);
    }

    fn on_session_change(inner: &Rc<ManagerInner>, change: &SessionChange) {
        if change.reason == ChangeReason::Preferences {
            return;
        }
        let signed_out = matches!(change.reason, ChangeReason::SignedOut(_));
        if !change.authenticated || signed_out {
            Self::tear_down(inner);
            return;
        }

        if inner.prompt.is_open() {
            debug!(
                generation = change.generation,
                "Session moved on; closing expiry prompt"
            );
            inner.prompt.supersede();
        }
        inner.scheduler.arm(change.expires_at);
        inner.monitor.start();
        if inner.config.sign_out_when_idle {
            Self::watch_idle(inner);
        }
    }

    fn tear_down(inner: &Rc<ManagerInner>) {
        inner.idle_watch.set(None);
        inner.scheduler.cancel();
        inner.prompt.dismiss();
        inner.monitor.stop();
    }

    /// Sign out on the first idle report of the activity poll
    fn watch_idle(inner: &Rc<ManagerInner>) {
        if inner.idle_watch.get().is_some() {
            return;
        }
        let id = inner.next_idle_watch.get();
        inner.next_idle_watch.set(id + 1);
        inner.idle_watch.set(Some(id));

        let mut stream = inner.monitor.is_active();
        let weak: Weak<ManagerInner> = Rc::downgrade(inner);
        debug!(watch = id, "Idle watch started");
        inner.runtime.spawn_local(Box::pin(async move {
            while let Some(active) = stream.next().await {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                if inner.idle_watch.get() != Some(id) {
                    return;
                }
                if active {
                    continue;
                }
                if inner.session.is_authenticated() && !inner.prompt.is_open() {
                    info!("User idle; signing out");
                    inner.session.apply_signout(SignOutReason::Idle);
                }
                break;
            }
            if let Some(inner) = weak.upgrade() {
                if inner.idle_watch.get() == Some(id) {
                    inner.idle_watch.set(None);
                }
            }
        }));
    }

    /// Reconstruct the session from storage. Only the first call has any
    /// effect; later calls report the current state.
    pub async fn init_session(&self) -> BootstrapOutcome {
        if self.inner.bootstrapped.replace(true) {
            let current = self.inner.session.session();
            return if current.is_authenticated {
                BootstrapOutcome::Resumed {
                    expires_at: current.expires_at,
                }
            } else {
                BootstrapOutcome::Unauthenticated
            };
        }

        bootstrap::init_session(
            &self.inner.session,
            &self.inner.scheduler,
            self.inner.runtime.now_secs(),
        )
        .await
    }

    /// Start a session from a sign-in or sign-up response. Submitting the
    /// sign-in counts as user activity.
    pub fn sign_in(&self, credential: &Credential, stay_signed_in: bool) -> SessionResult<()> {
        self.inner.monitor.record_interaction();
        self.inner.session.apply_signin(
            credential.token.clone(),
            credential.expires_in,
            credential.user_id.clone().unwrap_or_default(),
            stay_signed_in,
        )
    }

    /// Explicit sign-out by the user
    pub fn sign_out(&self) {
        self.inner.session.apply_signout(SignOutReason::User);
    }

    pub fn set_remembered_username(&self, username: Option<String>) {
        self.inner.session.set_remembered_username(username);
    }

    /// Current session with validity re-derived against the clock
    pub fn session(&self) -> SessionRecord {
        self.inner.session.session()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.session.is_authenticated()
    }

    pub fn subscribe(&self, listener: impl Fn(&SessionChange) + 'static) -> Subscription {
        self.inner.session.subscribe(listener)
    }

    pub fn state(&self) -> &SessionState {
        &self.inner.session
    }

    pub fn monitor(&self) -> &IdleMonitor {
        &self.inner.monitor
    }

    pub fn scheduler(&self) -> &RenewalScheduler {
        &self.inner.scheduler
    }

    pub fn prompt(&self) -> &ExpiryPrompt {
        &self.inner.prompt
    }

    pub fn errors(&self) -> &ServerErrorBus {
        &self.inner.errors
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Release every timer and listener. An open prompt is torn down, which
    /// ends the session.
    pub fn shutdown(&self) {
        self.inner.prompt.dismiss();
        self.inner.idle_watch.set(None);
        self.inner.scheduler.cancel();
        self.inner.monitor.stop();
        let subscriptions = std::mem::take(&mut *self.inner.subscriptions.borrow_mut());
        drop(subscriptions);
        debug!("Session manager shut down");
    }
}
