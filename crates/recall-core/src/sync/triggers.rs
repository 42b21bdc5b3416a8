//! Flush triggers: reconnect, periodic timer, visibility, focus, startup

use std::fmt;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::config::{SyncConfig, MIN_FLUSH_INTERVAL};

use super::{lock, EngineInner, SyncEngine};

/// Why a background flush was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Trigger {
    Reconnect,
    Periodic,
    Visibility,
    Focus,
    Startup,
    Enqueue,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Reconnect => "reconnect",
            Self::Periodic => "periodic",
            Self::Visibility => "visibility",
            Self::Focus => "focus",
            Self::Startup => "startup",
            Self::Enqueue => "enqueue",
        };
        f.write_str(label)
    }
}

impl SyncEngine {
    /// Arm the automatic triggers: periodic timer, startup flush, focus and
    /// visibility, plus reconnect and enqueue when they are not already armed
    /// by `eager_triggers`. Idempotent.
    pub fn start(&self) {
        let inner = &self.inner;
        if inner.shut_down.load(Ordering::SeqCst) || inner.started.swap(true, Ordering::SeqCst) {
            return;
        }

        let weak = Arc::downgrade(inner);
        let period = periodic_interval(&inner.config);
        let periodic = inner.runtime.spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(engine) = weak.upgrade() else {
                    break;
                };
                engine.run_trigger(Trigger::Periodic).await;
            }
        });
        inner.track(periodic);

        inner.spawn_trigger(Trigger::Startup);
        tracing::info!(
            "Sync engine started (flush every {}s)",
            period.as_secs()
        );
    }

    /// Host visibility changed; a foreground transition flushes after a
    /// short settle delay.
    pub fn notify_visibility(&self, visible: bool) {
        if visible {
            self.inner.spawn_trigger(Trigger::Visibility);
        }
    }

    /// Host window or app gained focus.
    pub fn notify_focus(&self) {
        self.inner.spawn_trigger(Trigger::Focus);
    }

    /// Cancel every timer and pending trigger and detach from the monitor.
    ///
    /// Explicit calls (`process_queue`, `manual_sync`) keep working; automatic
    /// triggers are ignored from now on.
    pub fn shutdown(&self) {
        let inner = &self.inner;
        if inner.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Some(subscription) = lock(&inner.connectivity).take() {
            subscription.unsubscribe();
        }
        let tasks: Vec<JoinHandle<()>> = lock(&inner.tasks).drain(..).collect();
        for task in tasks {
            task.abort();
        }
        inner.monitor.shutdown();
        tracing::info!("Sync engine shut down");
    }
}

/// The configured flush interval, raised to [`MIN_FLUSH_INTERVAL`].
fn periodic_interval(config: &SyncConfig) -> Duration {
    if config.flush_interval < MIN_FLUSH_INTERVAL {
        tracing::warn!(
            "Flush interval {:?} is too short; using {:?}",
            config.flush_interval,
            MIN_FLUSH_INTERVAL
        );
        return MIN_FLUSH_INTERVAL;
    }
    config.flush_interval
}

impl EngineInner {
    const fn settle_delay(&self, trigger: Trigger) -> Duration {
        match trigger {
            Trigger::Visibility => self.config.visibility_settle,
            Trigger::Focus => self.config.focus_settle,
            Trigger::Startup => self.config.startup_delay,
            Trigger::Reconnect | Trigger::Periodic | Trigger::Enqueue => Duration::ZERO,
        }
    }

    fn is_armed(&self, trigger: Trigger) -> bool {
        if self.shut_down.load(Ordering::SeqCst) {
            return false;
        }
        self.started.load(Ordering::SeqCst)
            || (self.config.eager_triggers
                && matches!(trigger, Trigger::Reconnect | Trigger::Enqueue))
    }

    /// Run `trigger` in the background after its settle delay.
    pub(super) fn spawn_trigger(self: &Arc<Self>, trigger: Trigger) {
        if !self.is_armed(trigger) {
            return;
        }

        let engine = Arc::clone(self);
        let delay = self.settle_delay(trigger);
        let task = self.runtime.spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            engine.run_trigger(trigger).await;
        });
        self.track(task);
    }

    /// Passive flush: never fails, silently skips when nobody is signed in.
    async fn run_trigger(&self, trigger: Trigger) {
        if self.shut_down.load(Ordering::SeqCst) {
            return;
        }
        if !self.identity.is_authenticated() {
            tracing::debug!("Skipping {trigger} flush: no signed-in user");
            return;
        }
        if matches!(trigger, Trigger::Periodic | Trigger::Startup)
            && (!self.monitor.is_online() || self.is_syncing() || self.queue.is_empty())
        {
            return;
        }

        tracing::debug!("Flush requested by {trigger} trigger");
        self.process_queue().await;
    }

    fn track(&self, task: JoinHandle<()>) {
        let mut tasks = lock(&self.tasks);
        tasks.retain(|existing| !existing.is_finished());
        tasks.push(task);
    }
}
