//! Idle activity monitor
//!
//! Input listeners push a shared "active until" instant forward in the
//! persistent store; pollers read it back. Because the instant lives in
//! storage rather than in memory, every tab of the same origin agrees on one
//! idle clock without any cross-tab messaging.

use crate::error::SessionResult;
use crate::runtime::{Runtime, TimerHandle};
use crate::store::{ACTIVE_UNTIL_KEY, PrefixedStore};
use futures::Stream;
use futures::channel::mpsc;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll};
use std::time::Duration;
use tracing::{debug, warn};

/// Source of user-interaction signals (pointer, keyboard, scroll, touch)
pub trait ActivitySource {
    /// Attach listeners that call `on_activity` for every signal.
    /// Dropping the guard detaches them.
    fn attach(&self, on_activity: Rc<dyn Fn()>) -> SessionResult<ListenerGuard>;
}

/// Keeps attached listeners alive; detaches them on drop
#[must_use = "dropping a ListenerGuard detaches the listeners"]
pub struct ListenerGuard {
    detach: Option<Box<dyn FnOnce()>>,
}

impl ListenerGuard {
    pub fn new(detach: impl FnOnce() + 'static) -> Self {
        Self {
            detach: Some(Box::new(detach)),
        }
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

/// Timing parameters of the monitor
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MonitorSettings {
    pub idle_timeout: Duration,
    pub check_interval: Duration,
    pub coalesce: Duration,
}

struct MonitorInner {
    runtime: Rc<dyn Runtime>,
    store: PrefixedStore,
    source: Rc<dyn ActivitySource>,
    settings: MonitorSettings,
    listeners: RefCell<Option<ListenerGuard>>,
    pending_write: RefCell<Option<TimerHandle>>,
    pollers: RefCell<HashMap<u64, TimerHandle>>,
    next_poller: Cell<u64>,
    paused: Cell<bool>,
    last_known: Cell<bool>,
}

/// Shared handle to the idle activity monitor
#[derive(Clone)]
pub struct IdleMonitor {
    inner: Rc<MonitorInner>,
}

impl IdleMonitor {
    pub fn new(
        runtime: Rc<dyn Runtime>,
        store: PrefixedStore,
        source: Rc<dyn ActivitySource>,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            inner: Rc::new(MonitorInner {
                runtime,
                store,
                source,
                settings,
                listeners: RefCell::new(None),
                pending_write: RefCell::new(None),
                pollers: RefCell::new(HashMap::new()),
                next_poller: Cell::new(0),
                paused: Cell::new(false),
                last_known: Cell::new(true),
            }),
        }
    }

    /// Attach input listeners.
    ///
    /// Calling `start` on a running monitor does nothing. Without an input
    /// surface (no DOM) the monitor stays detached instead of failing.
    pub fn start(&self) {
        if self.inner.listeners.borrow().is_some() {
            return;
        }

        let weak = Rc::downgrade(&self.inner);
        let on_activity: Rc<dyn Fn()> = Rc::new(move || {
            if let Some(inner) = weak.upgrade() {
                MonitorInner::signal(&inner);
            }
        });

        match self.inner.source.attach(on_activity) {
            Ok(guard) => {
                *self.inner.listeners.borrow_mut() = Some(guard);
                debug!("Activity listeners attached");
            }
            Err(e) => {
                debug!(error = %e, "No input surface; activity monitor is inactive");
            }
        }
    }

    /// Record an interaction observed outside the input listeners, such as
    /// a submitted sign-in form
    pub fn record_interaction(&self) {
        self.inner.record_activity();
    }

    /// Detach listeners, drop any pending write and end every poll stream.
    /// Safe to call any number of times.
    pub fn stop(&self) {
        let listeners = self.inner.listeners.borrow_mut().take();
        let pending = self.inner.pending_write.borrow_mut().take();
        let pollers = std::mem::take(&mut *self.inner.pollers.borrow_mut());
        self.inner.paused.set(false);

        if listeners.is_some() {
            debug!("Activity listeners detached");
        }
        drop(listeners);
        drop(pending);
        drop(pollers);
    }

    /// Suspend polling without detaching listeners
    pub fn pause(&self) {
        self.inner.paused.set(true);
    }

    pub fn resume(&self) {
        self.inner.paused.set(false);
    }

    pub fn is_paused(&self) -> bool {
        self.inner.paused.get()
    }

    /// Whether input listeners are currently attached
    pub fn is_listening(&self) -> bool {
        self.inner.listeners.borrow().is_some()
    }

    /// Read the shared clock now. A missing record counts as active.
    pub fn is_active_now(&self) -> bool {
        self.inner.check()
    }

    /// Value produced by the most recent poll
    pub fn last_known(&self) -> bool {
        self.inner.last_known.get()
    }

    /// The stored "active until" instant in milliseconds
    pub fn active_until(&self) -> Option<i64> {
        self.inner.store.read::<i64>(ACTIVE_UNTIL_KEY)
    }

    /// Lazy stream of activity flags: `true` immediately, then the shared
    /// clock re-read every check interval. Each call starts an independent
    /// poller, which ends when the stream is dropped or the monitor stops.
    pub fn is_active(&self) -> ActivityStream {
        let (tx, rx) = mpsc::unbounded();
        // Cannot fail: the receiver is alive
        let _ = tx.unbounded_send(true);

        let id = self.inner.next_poller.get();
        self.inner.next_poller.set(id + 1);

        let weak = Rc::downgrade(&self.inner);
        let handle = self.inner.runtime.set_interval(
            self.inner.settings.check_interval,
            Box::new(move || {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                if inner.paused.get() {
                    return;
                }
                let active = inner.check();
                inner.last_known.set(active);
                if tx.unbounded_send(active).is_err() {
                    debug!("Activity stream receiver gone");
                }
            }),
        );
        self.inner.pollers.borrow_mut().insert(id, handle);

        ActivityStream {
            receiver: rx,
            poller: id,
            monitor: Rc::downgrade(&self.inner),
        }
    }

    /// Number of running pollers
    pub fn poller_count(&self) -> usize {
        self.inner.pollers.borrow().len()
    }
}

impl MonitorInner {
    fn signal(inner: &Rc<Self>) {
        if inner.pending_write.borrow().is_some() {
            return;
        }

        let weak = Rc::downgrade(inner);
        let handle = inner.runtime.set_timeout(
            inner.settings.coalesce,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    let fired = inner.pending_write.borrow_mut().take();
                    drop(fired);
                    inner.record_activity();
                }
            }),
        );
        *inner.pending_write.borrow_mut() = Some(handle);
    }

    /// Push "active until" forward; never moves it backwards
    fn record_activity(&self) {
        let idle_ms = i64::try_from(self.settings.idle_timeout.as_millis()).unwrap_or(i64::MAX);
        let candidate = self.runtime.now_ms().saturating_add(idle_ms);
        if let Some(current) = self.store.read::<i64>(ACTIVE_UNTIL_KEY) {
            if current >= candidate {
                return;
            }
        }
        if let Err(e) = self.store.write(ACTIVE_UNTIL_KEY, &candidate) {
            warn!(error = %e, "Failed to record activity");
        }
    }

    fn check(&self) -> bool {
        self.store
            .read::<i64>(ACTIVE_UNTIL_KEY)
            .is_none_or(|until| self.runtime.now_ms() < until)
    }
}

/// Stream returned by [`IdleMonitor::is_active`]
pub struct ActivityStream {
    receiver: mpsc::UnboundedReceiver<bool>,
    poller: u64,
    monitor: Weak<MonitorInner>,
}

impl Stream for ActivityStream {
    type Item = bool;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.receiver).poll_next(cx)
    }
}

impl Drop for ActivityStream {
    fn drop(&mut self) {
        if let Some(inner) = self.monitor.upgrade() {
            let handle = inner.pollers.borrow_mut().remove(&self.poller);
            drop(handle);
        }
    }
}
