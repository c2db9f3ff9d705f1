//! Token renewal scheduler
//!
//! Owns the single one-shot timer armed at the session's expiry instant.
//! When it fires the session is either ended (no stay-signed-in, or the user
//! is idle) or renewed once; a failed renewal escalates to the expiry prompt.

use crate::activity::IdleMonitor;
use crate::error::RenewalError;
use crate::prompt::ExpiryPrompt;
use crate::renewal::{RenewalAttempt, TokenRenewer};
use crate::runtime::{Runtime, TimerHandle, clamp_delay};
use crate::session::{SessionRecord, SessionState, SignOutReason};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, info, warn};

struct SchedulerInner {
    runtime: Rc<dyn Runtime>,
    session: SessionState,
    monitor: IdleMonitor,
    prompt: ExpiryPrompt,
    renewer: Rc<dyn TokenRenewer>,
    timer: RefCell<Option<TimerHandle>>,
    armed_for: Cell<Option<i64>>,
    /// Generation of the session a renewal request is running for
    renewing: Cell<Option<u64>>,
}

/// Shared handle to the renewal scheduler
#[derive(Clone)]
pub struct RenewalScheduler {
    inner: Rc<SchedulerInner>,
}

impl RenewalScheduler {
    pub fn new(
        runtime: Rc<dyn Runtime>,
        session: SessionState,
        monitor: IdleMonitor,
        prompt: ExpiryPrompt,
        renewer: Rc<dyn TokenRenewer>,
    ) -> Self {
        Self {
            inner: Rc::new(SchedulerInner {
                runtime,
                session,
                monitor,
                prompt,
                renewer,
                timer: RefCell::new(None),
                armed_for: Cell::new(None),
                renewing: Cell::new(None),
            }),
        }
    }

    /// Arm the timer for `expires_at` (seconds since the epoch), replacing
    /// any timer armed before
    pub fn arm(&self, expires_at: i64) {
        let now_ms = self.inner.runtime.now_ms();
        let remaining_ms = expires_at.saturating_mul(1000).saturating_sub(now_ms).max(0);
        let delay = clamp_delay(Duration::from_millis(remaining_ms.unsigned_abs()));

        let weak = Rc::downgrade(&self.inner);
        let handle = self.inner.runtime.set_timeout(
            delay,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    RenewalScheduler { inner }.fire();
                }
            }),
        );

        let previous = self.inner.timer.borrow_mut().replace(handle);
        drop(previous);
        self.inner.armed_for.set(Some(expires_at));
        debug!(expires_at, delay_ms = delay.as_millis(), "Renewal timer armed");
    }

    /// Clear the pending timer. Safe to call when nothing is armed.
    pub fn cancel(&self) {
        let previous = self.inner.timer.borrow_mut().take();
        self.inner.armed_for.set(None);
        if previous.is_some() {
            debug!("Renewal timer cancelled");
        }
        drop(previous);
    }

    pub fn is_armed(&self) -> bool {
        self.inner.timer.borrow().is_some()
    }

    /// Expiry instant of the pending timer
    pub fn armed_for(&self) -> Option<i64> {
        self.inner.armed_for.get()
    }

    /// Whether a renewal request for the current session is in flight
    pub fn is_renewing(&self) -> bool {
        self.inner.renewing.get() == Some(self.inner.session.generation())
    }

    fn fire(&self) {
        let fired = self.inner.timer.borrow_mut().take();
        drop(fired);
        let armed_for = self.inner.armed_for.take();

        // Delays longer than the host maximum fire early; wait out the rest
        if let Some(expires_at) = armed_for {
            if self.inner.runtime.now_ms() < expires_at.saturating_mul(1000) {
                self.arm(expires_at);
                return;
            }
        }

        self.expire_now();
    }

    /// Run expiry handling immediately, e.g. after the server reported the
    /// credential as expired. Does nothing while a renewal for the current
    /// session is already in flight.
    pub fn expire_now(&self) {
        let record = self.inner.session.raw();
        if !record.is_authenticated {
            debug!("Expiry fired without a session");
            return;
        }
        if self.is_renewing() {
            debug!("Renewal already in flight; joining it");
            return;
        }

        if !record.stay_signed_in {
            info!("Session expired without stay-signed-in; signing out");
            self.inner.session.apply_signout(SignOutReason::Expired);
            return;
        }

        if !self.inner.monitor.is_active_now() {
            info!("Session expired while idle; signing out");
            self.inner.session.apply_signout(SignOutReason::Idle);
            return;
        }

        self.inner
            .renewing
            .set(Some(self.inner.session.generation()));
        let scheduler = self.clone();
        self.inner.runtime.spawn_local(Box::pin(async move {
            if let RenewalAttempt::Failed(e) = scheduler.try_renew(record).await {
                warn!(error = %e, "Renewal failed; asking the user");
                scheduler.inner.prompt.open();
            }
        }));
    }

    /// Invoke the renewal operation once for `record` and apply the result
    /// if the session is still the one that started the request.
    pub async fn try_renew(&self, record: SessionRecord) -> RenewalAttempt {
        let generation = self.inner.session.generation();
        let renewer = self.inner.renewer.clone();
        self.inner.renewing.set(Some(generation));
        debug!(generation, "Renewal started");

        let result = renewer.renew(&record).await;
        if self.inner.renewing.get() == Some(generation) {
            self.inner.renewing.set(None);
        }

        if self.inner.session.generation() != generation {
            debug!(generation, "Discarding stale renewal result");
            return RenewalAttempt::Stale;
        }

        match result {
            Ok(credential) => match self.inner.session.apply_renewal(&credential) {
                Ok(()) => RenewalAttempt::Applied,
                Err(e) => RenewalAttempt::Failed(RenewalError::InvalidResponse(e.to_string())),
            },
            Err(e) => RenewalAttempt::Failed(e),
        }
    }
}
