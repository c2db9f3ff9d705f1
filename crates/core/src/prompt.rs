//! Expiry decision flow
//!
//! A bounded-time choice between extending the session and signing out.
//! While the prompt is open the idle monitor's polling is paused so an
//! idle-triggered sign-out cannot race the user's answer. Timing out and
//! external dismissal both end the session.

use crate::activity::IdleMonitor;
use crate::notify::{Channel, Subscription};
use crate::runtime::{Runtime, TimerHandle};
use crate::session::{SessionState, SignOutReason};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, info};

/// Current state of the prompt
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PromptState {
    Idle,
    Prompting { seconds_remaining: u64 },
}

/// How a prompt ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PromptOutcome {
    StaySignedIn,
    SignOut,
    TimedOut,
    /// Torn down from outside, e.g. by navigation
    Dismissed,
    /// The session was renewed or replaced while prompting
    Superseded,
}

/// Prompt lifecycle notification
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PromptEvent {
    Opened { seconds_remaining: u64 },
    Tick { seconds_remaining: u64 },
    Closed(PromptOutcome),
}

struct PromptInner {
    runtime: Rc<dyn Runtime>,
    session: SessionState,
    monitor: IdleMonitor,
    dialog_timeout_secs: u64,
    state: Cell<PromptState>,
    countdown: RefCell<Option<TimerHandle>>,
    opened_generation: Cell<u64>,
    events: Channel<PromptEvent>,
}

/// Shared handle to the expiry prompt
#[derive(Clone)]
pub struct ExpiryPrompt {
    inner: Rc<PromptInner>,
}

impl ExpiryPrompt {
    pub fn new(
        runtime: Rc<dyn Runtime>,
        session: SessionState,
        monitor: IdleMonitor,
        dialog_timeout_secs: u64,
    ) -> Self {
        Self {
            inner: Rc::new(PromptInner {
                runtime,
                session,
                monitor,
                dialog_timeout_secs,
                state: Cell::new(PromptState::Idle),
                countdown: RefCell::new(None),
                opened_generation: Cell::new(0),
                events: Channel::new(),
            }),
        }
    }

    pub fn state(&self) -> PromptState {
        self.inner.state.get()
    }

    pub fn is_open(&self) -> bool {
        matches!(self.inner.state.get(), PromptState::Prompting { .. })
    }

    pub fn seconds_remaining(&self) -> Option<u64> {
        match self.inner.state.get() {
            PromptState::Prompting { seconds_remaining } => Some(seconds_remaining),
            PromptState::Idle => None,
        }
    }

    pub fn subscribe(&self, listener: impl Fn(&PromptEvent) + 'static) -> Subscription {
        self.inner.events.subscribe(listener)
    }

    /// Open the prompt. A second call while open is coalesced into the
    /// existing prompt and returns `false`.
    pub fn open(&self) -> bool {
        if self.is_open() {
            debug!("Expiry prompt already open; coalescing");
            return false;
        }

        let seconds_remaining = self.inner.dialog_timeout_secs;
        info!(seconds_remaining, "Opening expiry prompt");
        self.inner.monitor.pause();
        self.inner
            .opened_generation
            .set(self.inner.session.generation());
        self.inner
            .state
            .set(PromptState::Prompting { seconds_remaining });

        let weak = Rc::downgrade(&self.inner);
        let handle = self.inner.runtime.set_interval(
            Duration::from_secs(1),
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    ExpiryPrompt { inner }.tick();
                }
            }),
        );
        let previous = self.inner.countdown.borrow_mut().replace(handle);
        drop(previous);

        self.inner
            .events
            .notify(&PromptEvent::Opened { seconds_remaining });
        true
    }

    /// User chose to stay signed in
    pub fn stay_signed_in(&self) -> bool {
        self.resolve(PromptOutcome::StaySignedIn)
    }

    /// User chose to sign out
    pub fn sign_out(&self) -> bool {
        self.resolve(PromptOutcome::SignOut)
    }

    /// Tear the prompt down from outside; counts as signing out
    pub fn dismiss(&self) -> bool {
        self.resolve(PromptOutcome::Dismissed)
    }

    /// Close the prompt without touching the session, which has already
    /// moved on
    pub fn supersede(&self) -> bool {
        self.resolve(PromptOutcome::Superseded)
    }

    fn tick(&self) {
        let PromptState::Prompting { seconds_remaining } = self.inner.state.get() else {
            return;
        };

        let seconds_remaining = seconds_remaining.saturating_sub(1);
        if seconds_remaining == 0 {
            self.resolve(PromptOutcome::TimedOut);
            return;
        }

        self.inner
            .state
            .set(PromptState::Prompting { seconds_remaining });
        self.inner
            .events
            .notify(&PromptEvent::Tick { seconds_remaining });
    }

    fn resolve(&self, outcome: PromptOutcome) -> bool {
        if !self.is_open() {
            return false;
        }

        self.inner.state.set(PromptState::Idle);
        let countdown = self.inner.countdown.borrow_mut().take();
        drop(countdown);
        self.inner.monitor.resume();
        info!(?outcome, "Expiry prompt closed");
        self.inner.events.notify(&PromptEvent::Closed(outcome));

        match outcome {
            PromptOutcome::Superseded => return true,
            PromptOutcome::SignOut => {
                if self.inner.session.raw().is_authenticated {
                    self.inner.session.apply_signout(SignOutReason::User);
                }
                return true;
            }
            _ => {}
        }

        if self.inner.session.generation() != self.inner.opened_generation.get() {
            debug!(?outcome, "Session changed while prompting; outcome not applied");
            return true;
        }

        match outcome {
            PromptOutcome::StaySignedIn => {
                if !self.inner.session.extend() {
                    self.inner.session.apply_signout(SignOutReason::Expired);
                }
            }
            PromptOutcome::TimedOut => self
                .inner
                .session
                .apply_signout(SignOutReason::PromptTimedOut),
            PromptOutcome::Dismissed => self
                .inner
                .session
                .apply_signout(SignOutReason::PromptDismissed),
            PromptOutcome::SignOut | PromptOutcome::Superseded => {}
        }
        true
    }
}
