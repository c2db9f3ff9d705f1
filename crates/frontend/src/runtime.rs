//! Browser event loop backing for the lifecycle core

use futures::future::LocalBoxFuture;
use gloo::timers::callback::{Interval, Timeout};
use std::time::Duration;
use tenure_core::runtime::clamp_delay;
use tenure_core::{Runtime, TimerHandle};

/// [`Runtime`] on top of `Date.now`, `setTimeout`/`setInterval` and the
/// microtask queue
#[derive(Clone, Copy, Debug, Default)]
pub struct BrowserRuntime;

impl BrowserRuntime {
    pub const fn new() -> Self {
        Self
    }
}

fn to_millis(delay: Duration) -> u32 {
    u32::try_from(clamp_delay(delay).as_millis()).unwrap_or(u32::MAX)
}

impl Runtime for BrowserRuntime {
    #[allow(clippy::cast_possible_truncation)]
    fn now_ms(&self) -> i64 {
        js_sys::Date::now() as i64
    }

    fn set_timeout(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> TimerHandle {
        let timeout = Timeout::new(to_millis(delay), callback);
        TimerHandle::new(move || drop(timeout))
    }

    fn set_interval(&self, period: Duration, callback: Box<dyn FnMut()>) -> TimerHandle {
        let interval = Interval::new(to_millis(period).max(1), callback);
        TimerHandle::new(move || drop(interval))
    }

    fn spawn_local(&self, task: LocalBoxFuture<'static, ()>) {
        wasm_bindgen_futures::spawn_local(task);
    }
}
