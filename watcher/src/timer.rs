//! Repeating timer that drives the polling cycle.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::trace;

/// Calls an async callback every `period` while enabled.
///
/// The callback is awaited before the next period starts, so two runs never
/// overlap and a slow run simply pushes the next one back. Timers start
/// disabled and referenced; dropping the timer cancels it.
pub struct RepeatingTimer {
    enabled: watch::Sender<bool>,
    referenced: watch::Sender<bool>,
    cancelled: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl RepeatingTimer {
    /// Spawn the timer task on the current tokio runtime.
    pub fn spawn<F, Fut>(period: Duration, mut callback: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (enabled, mut enabled_rx) = watch::channel(false);
        let (referenced, _) = watch::channel(true);

        let task = tokio::spawn(async move {
            loop {
                if enabled_rx.wait_for(|enabled| *enabled).await.is_err() {
                    break;
                }

                tokio::select! {
                    _ = tokio::time::sleep(period) => {}
                    changed = enabled_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        continue;
                    }
                }

                if !*enabled_rx.borrow_and_update() {
                    continue;
                }

                trace!("Timer fired after {period:?}");
                callback().await;
            }
        });

        Self {
            enabled,
            referenced,
            cancelled: Arc::new(AtomicBool::new(false)),
            task,
        }
    }

    /// Start firing. Idempotent.
    pub fn enable(&self) {
        if !self.is_cancelled() {
            self.enabled.send_if_modified(|enabled| !std::mem::replace(enabled, true));
        }
    }

    /// Stop firing after any run in progress. Idempotent.
    pub fn disable(&self) {
        self.enabled
            .send_if_modified(|enabled| std::mem::replace(enabled, false));
    }

    pub fn is_enabled(&self) -> bool {
        *self.enabled.borrow()
    }

    /// Mark the timer as one the host should stay alive for.
    pub fn reference(&self) {
        if !self.is_cancelled() {
            self.referenced
                .send_if_modified(|referenced| !std::mem::replace(referenced, true));
        }
    }

    /// Mark the timer as not keeping the host alive.
    pub fn unreference(&self) {
        self.referenced
            .send_if_modified(|referenced| std::mem::replace(referenced, false));
    }

    pub fn is_referenced(&self) -> bool {
        *self.referenced.borrow()
    }

    /// Resolves once the timer is unreferenced or cancelled.
    pub async fn unreferenced(&self) {
        let mut referenced = self.referenced.subscribe();
        // The sender lives in `self`, so this only errors during teardown.
        let _ = referenced.wait_for(|referenced| !*referenced).await;
    }

    /// Stop the timer for good, aborting any run in progress.
    pub fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        self.task.abort();
        self.disable();
        self.unreference();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Drop for RepeatingTimer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl std::fmt::Debug for RepeatingTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepeatingTimer")
            .field("enabled", &self.is_enabled())
            .field("referenced", &self.is_referenced())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
