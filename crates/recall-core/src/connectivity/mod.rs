//! Connectivity monitor
//!
//! Single authoritative answer to "are we online". The host platform feeds
//! transitions either by calling [`ConnectivityMonitor::set_online`] from its
//! own event callbacks or by handing over a `watch` channel with
//! [`ConnectivityMonitor::attach`]. Nothing here polls.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::observer::{Listeners, Subscription};

pub struct ConnectivityMonitor {
    online: AtomicBool,
    /// Held across the state swap and listener delivery.
    transition: Mutex<()>,
    listeners: Listeners<bool>,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectivityMonitor {
    /// Create a monitor from the platform's initial signal.
    ///
    /// When the platform cannot tell (`None`) the monitor starts online, so a
    /// host without a connectivity signal still attempts to sync.
    #[must_use]
    pub fn new(initial: Option<bool>) -> Self {
        let online = initial.unwrap_or(true);
        if initial.is_none() {
            tracing::debug!("No initial connectivity signal; assuming online");
        }
        Self {
            online: AtomicBool::new(online),
            transition: Mutex::new(()),
            listeners: Listeners::new(),
            watcher: Mutex::new(None),
        }
    }

    /// Create a monitor driven by a platform `watch` channel.
    ///
    /// Must be called inside a tokio runtime.
    pub fn with_signal(signal: watch::Receiver<bool>) -> Arc<Self> {
        let initial = *signal.borrow();
        let monitor = Arc::new(Self::new(Some(initial)));
        monitor.attach(signal);
        monitor
    }

    /// Last known connectivity state.
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Record a platform connectivity event.
    ///
    /// Listeners are invoked synchronously, and only when the state flips.
    /// Concurrent callers are serialized, so listeners see transitions in the
    /// order they were applied and the last delivered value matches
    /// [`is_online`](Self::is_online). A listener must not call `set_online`.
    pub fn set_online(&self, online: bool) {
        let _transition = self
            .transition
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let previous = self.online.swap(online, Ordering::SeqCst);
        if previous == online {
            return;
        }

        if online {
            tracing::info!("Connectivity restored");
        } else {
            tracing::warn!("Connectivity lost");
        }
        self.listeners.notify(&online);
    }

    /// Register a listener for online/offline transitions.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.listeners.subscribe(move |online: &bool| listener(*online))
    }

    /// Forward a platform `watch` channel into this monitor.
    ///
    /// Replaces any previously attached channel.
    pub fn attach(self: &Arc<Self>, mut signal: watch::Receiver<bool>) {
        let monitor = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            while signal.changed().await.is_ok() {
                let online = *signal.borrow_and_update();
                let Some(monitor) = monitor.upgrade() else {
                    break;
                };
                monitor.set_online(online);
            }
            tracing::debug!("Connectivity signal closed");
        });

        let previous = self
            .watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Tear down the platform listener. Idempotent.
    pub fn shutdown(&self) {
        let handle = self
            .watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
            tracing::debug!("Connectivity monitor shut down");
        }
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Drop for ConnectivityMonitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}
