//! Status fan-out: synchronous listeners plus a `watch` channel

use tokio::sync::watch;

use crate::models::SyncStatus;
use crate::observer::{Listeners, Subscription};

pub(super) struct StatusPublisher {
    listeners: Listeners<SyncStatus>,
    sender: watch::Sender<SyncStatus>,
}

impl StatusPublisher {
    pub(super) fn new(initial: SyncStatus) -> Self {
        let (sender, _receiver) = watch::channel(initial);
        Self {
            listeners: Listeners::new(),
            sender,
        }
    }

    /// Broadcast `status` to every listener and watcher.
    pub(super) fn publish(&self, status: SyncStatus) {
        self.sender.send_replace(status.clone());
        self.listeners.notify(&status);
    }

    pub(super) fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&SyncStatus) + Send + Sync + 'static,
    {
        self.listeners.subscribe(listener)
    }

    pub(super) fn watch(&self) -> watch::Receiver<SyncStatus> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_publish_reaches_listeners_and_watchers() {
        let publisher = StatusPublisher::new(SyncStatus::default());
        let receiver = publisher.watch();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        let _sub = publisher.subscribe(move |status| {
            sink.lock().unwrap().push(status.queue_length);
        });

        publisher.publish(SyncStatus {
            queue_length: 2,
            ..SyncStatus::default()
        });

        assert_eq!(*seen.lock().unwrap(), vec![2]);
        assert_eq!(receiver.borrow().queue_length, 2);
    }
}
