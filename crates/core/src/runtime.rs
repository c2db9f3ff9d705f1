//! Host runtime abstraction: clock, timers and local task spawning
//!
//! Everything in the core runs on a single cooperative event loop. The
//! browser binding backs this trait with `setTimeout`/`setInterval` and
//! `spawn_local`; tests back it with a virtual clock.

use futures::future::LocalBoxFuture;
use std::time::Duration;

/// Largest delay a browser timer accepts (`2^31 - 1` milliseconds)
pub const MAX_TIMER_DELAY: Duration = Duration::from_millis(2_147_483_647);

/// Single-threaded host services used by the lifecycle core
pub trait Runtime {
    /// Current wall-clock time in milliseconds since the Unix epoch
    fn now_ms(&self) -> i64;

    /// Run `callback` once after `delay`
    fn set_timeout(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> TimerHandle;

    /// Run `callback` every `period` until the handle is dropped
    fn set_interval(&self, period: Duration, callback: Box<dyn FnMut()>) -> TimerHandle;

    /// Run a future to completion on the local event loop
    fn spawn_local(&self, task: LocalBoxFuture<'static, ()>);

    /// Current wall-clock time in whole seconds since the Unix epoch
    fn now_secs(&self) -> i64 {
        self.now_ms().div_euclid(1000)
    }
}

/// Owner of a pending timer. Dropping the handle cancels the timer.
#[must_use = "dropping a TimerHandle cancels the timer"]
pub struct TimerHandle {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl TimerHandle {
    /// Wrap the host-specific cancellation routine
    pub fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A handle that owns nothing
    pub const fn noop() -> Self {
        Self { cancel: None }
    }

    /// Cancel the timer now
    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerHandle")
            .field("armed", &self.cancel.is_some())
            .finish()
    }
}

/// Clamp a delay to what the host timer can represent
pub fn clamp_delay(delay: Duration) -> Duration {
    delay.min(MAX_TIMER_DELAY)
}
