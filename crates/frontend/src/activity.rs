//! DOM input listeners feeding the idle monitor

use gloo::events::EventListener;
use std::rc::Rc;
use tenure_core::{ActivitySource, ListenerGuard, SessionError, SessionResult};
use tracing::debug;

/// Window events that count as user activity
pub const ACTIVITY_EVENTS: [&str; 5] = ["mousemove", "click", "keypress", "scroll", "touchmove"];

/// [`ActivitySource`] listening on `window`
#[derive(Clone, Copy, Debug, Default)]
pub struct DomActivitySource;

impl DomActivitySource {
    pub const fn new() -> Self {
        Self
    }
}

impl ActivitySource for DomActivitySource {
    fn attach(&self, on_activity: Rc<dyn Fn()>) -> SessionResult<ListenerGuard> {
        let window =
            web_sys::window().ok_or_else(|| SessionError::unavailable("no window to listen on"))?;

        let listeners: Vec<EventListener> = ACTIVITY_EVENTS
            .iter()
            .map(|event| {
                let on_activity = on_activity.clone();
                EventListener::new(&window, *event, move |_| on_activity())
            })
            .collect();
        debug!(count = listeners.len(), "Window activity listeners attached");

        Ok(ListenerGuard::new(move || drop(listeners)))
    }
}
